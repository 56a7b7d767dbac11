//! Terminal implementations of the presentation-side collaborators.

use async_trait::async_trait;
use project_hub_core::gates::auth::{AuthToken, CredentialIssuer};
use project_hub_core::ui::{
    ChoiceDialog, Confirmation, DocumentChooser, Message, Presentation, SaveAsFlow, UndoHistory,
};
use project_hub_core::DocumentRef;
use std::io::{BufRead, Write};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Print `prompt` and read one trimmed line from stdin.
async fn read_line(prompt: String) -> String {
    tokio::task::spawn_blocking(move || {
        print!("{prompt} ");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        let _ = std::io::stdin().lock().read_line(&mut line);
        line.trim().to_string()
    })
    .await
    .unwrap_or_default()
}

pub struct TerminalPresentation {
    /// Answer every question with its default instead of prompting.
    pub assume_defaults: bool,
}

#[async_trait]
impl Presentation for TerminalPresentation {
    async fn show_confirmation(&self, question: &Message) -> Confirmation {
        if self.assume_defaults {
            return Confirmation::Yes;
        }
        let answer = read_line(format!("{question} [Y/n/c]")).await;
        match answer.to_ascii_lowercase().as_str() {
            "" | "y" | "yes" => Confirmation::Yes,
            "n" | "no" => Confirmation::No,
            _ => Confirmation::Cancel,
        }
    }

    async fn show_error(&self, error: &(dyn std::error::Error + Send + Sync)) {
        eprintln!("error: {error}");
        let mut source = error.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
    }

    async fn show_choice(&self, dialog: &ChoiceDialog) -> usize {
        println!("{}", dialog.title);
        if let Some(help) = &dialog.help {
            println!("  {help}");
        }
        for (i, option) in dialog.options.iter().enumerate() {
            let marker = if i == dialog.default { "*" } else { " " };
            println!(" {marker}{}) {option}", i + 1);
        }
        if self.assume_defaults {
            return dialog.default;
        }
        let answer = read_line("choice:".to_string()).await;
        match answer.parse::<usize>() {
            Ok(n) if (1..=dialog.options.len()).contains(&n) => n - 1,
            _ => dialog.default,
        }
    }

    fn set_window_title(&self, title: &str) {
        info!(title, "window title");
    }

    fn set_status_text(&self, text: &Message) {
        println!("* {text}");
    }
}

pub struct TerminalSaveAs {
    pub target: Option<DocumentRef>,
    pub assume_defaults: bool,
}

#[async_trait]
impl SaveAsFlow for TerminalSaveAs {
    async fn choose_target(&self, current: Option<&DocumentRef>) -> Option<DocumentRef> {
        if let Some(target) = &self.target {
            return Some(target.clone());
        }
        if self.assume_defaults {
            return None;
        }
        let hint = current.map(|c| format!(" (was {c})")).unwrap_or_default();
        let answer = read_line(format!("save as{hint}, empty to cancel:")).await;
        (!answer.is_empty()).then(|| DocumentRef::parse(&answer))
    }
}

pub struct TerminalChooser;

#[async_trait]
impl DocumentChooser for TerminalChooser {
    async fn choose_document(&self, working_directory: Option<&Path>) -> Option<DocumentRef> {
        let dir = working_directory
            .map(|d| format!(" [{}]", d.display()))
            .unwrap_or_default();
        let answer = read_line(format!("open{dir}, empty to cancel:")).await;
        if answer.is_empty() {
            return None;
        }
        let target = match working_directory {
            Some(dir) if !answer.contains("://") && Path::new(&answer).is_relative() => {
                dir.join(&answer).display().to_string()
            }
            _ => answer,
        };
        Some(DocumentRef::parse(&target))
    }
}

/// Reads an access token from the terminal.
pub struct TerminalSignIn {
    pub assume_defaults: bool,
}

#[async_trait]
impl CredentialIssuer for TerminalSignIn {
    async fn begin_sign_in(&self) -> anyhow::Result<Option<AuthToken>> {
        if self.assume_defaults {
            return Ok(None);
        }
        let token = read_line("access token, empty to cancel:".to_string()).await;
        if token.is_empty() {
            return Ok(None);
        }
        Ok(Some(AuthToken {
            token,
            validity: Duration::from_secs(3600),
            user_id: whoami(),
            websocket_token: None,
        }))
    }
}

fn whoami() -> String {
    std::env::var("USER").unwrap_or_else(|_| "cli".to_string())
}

pub struct LoggingUndo;

impl UndoHistory for LoggingUndo {
    fn terminate(&self) {
        debug!("undo history discarded");
    }
}
