//! Project Hub command line
//!
//! Opens, normalizes and saves project documents on the local filesystem.

use anyhow::Result;
use clap::{Parser, Subcommand};
use project_hub_core::store::local::LocalFsStore;
use project_hub_core::store::recent::RecentDocumentsFile;
use project_hub_core::ui::UiContext;
use project_hub_core::{
    Collaborators, DocumentRef, HubConfig, OpenOutcome, Project, ProjectHub, SaveOutcome,
    SharedProject,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod terminal;

use terminal::{LoggingUndo, TerminalChooser, TerminalPresentation, TerminalSaveAs, TerminalSignIn};

#[derive(Parser)]
#[command(name = "project-hub")]
#[command(about = "Open, normalize and save project documents")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Where the recent documents list is kept
    #[arg(long, global = true, default_value = ".project-hub")]
    state_dir: PathBuf,

    /// Answer every question with its default
    #[arg(short, long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a document and print a summary
    Open {
        /// Path or URL; omit to be asked
        target: Option<String>,

        /// Keep running and reopen the document when it changes on disk
        #[arg(short, long)]
        watch: bool,
    },

    /// Open a document, apply the post-open normalizations and save it back
    Normalize { target: String },

    /// Start an empty project and save it
    New {
        #[arg(long)]
        name: Option<String>,

        /// Target path; asked for when omitted
        #[arg(long)]
        save_to: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = HubConfig::load(cli.config.as_deref())?;
    apply_cli_overrides(&mut config, &cli.command);

    let save_target = match &cli.command {
        Commands::New { save_to, .. } => save_to.as_deref().map(DocumentRef::parse),
        _ => None,
    };
    let recent =
        RecentDocumentsFile::open(cli.state_dir.join("recent.json"), config.recent_limit).await?;
    let (ui, _ui_task) = UiContext::spawn();
    let hub = ProjectHub::new(
        config,
        Collaborators {
            presentation: Arc::new(TerminalPresentation {
                assume_defaults: cli.yes,
            }),
            store: Arc::new(LocalFsStore::new()),
            recent: Arc::new(recent),
            issuer: Arc::new(TerminalSignIn {
                assume_defaults: cli.yes,
            }),
            undo: Arc::new(LoggingUndo),
            save_as: Arc::new(TerminalSaveAs {
                target: save_target,
                assume_defaults: cli.yes,
            }),
            chooser: Arc::new(TerminalChooser),
        },
        ui,
    );
    let project = Project::new().shared();

    let code = match cli.command {
        Commands::Open { target, watch } => {
            let opened = match target {
                Some(target) => hub.open(DocumentRef::parse(&target), &project).await,
                None => hub.open_interactive(&project).await,
            };
            match opened {
                Ok(OpenOutcome::Opened(doc)) => {
                    print_summary(&doc, &project);
                    if watch {
                        info!(document = %doc, "watching for changes, ctrl-c to stop");
                        tokio::signal::ctrl_c().await?;
                    }
                    ExitCode::SUCCESS
                }
                Ok(OpenOutcome::Cancelled) => ExitCode::SUCCESS,
                Err(_) => ExitCode::FAILURE,
            }
        }
        Commands::Normalize { target } => {
            match hub.open(DocumentRef::parse(&target), &project).await {
                Ok(OpenOutcome::Opened(_)) => {
                    hub.edit(&project, |p| p.set_modified(true)).await?;
                    exit_for(hub.save(&project).await)
                }
                Ok(OpenOutcome::Cancelled) => ExitCode::SUCCESS,
                Err(_) => ExitCode::FAILURE,
            }
        }
        Commands::New { name, .. } => {
            if !hub.create_project(&project).await {
                return Ok(ExitCode::SUCCESS);
            }
            hub.edit(&project, move |p| p.model_mut().name = name).await?;
            exit_for(hub.save(&project).await)
        }
    };
    Ok(code)
}

/// Reopening on change needs both the configuration and `open --watch`.
fn apply_cli_overrides(config: &mut HubConfig, command: &Commands) {
    config.reopen_on_change &= matches!(command, Commands::Open { watch: true, .. });
}

fn exit_for(outcome: SaveOutcome) -> ExitCode {
    match outcome {
        SaveOutcome::Saved(doc) => {
            println!("saved {doc}");
            ExitCode::SUCCESS
        }
        SaveOutcome::Cancelled => ExitCode::SUCCESS,
        SaveOutcome::Rejected | SaveOutcome::Failed(_) => ExitCode::FAILURE,
    }
}

fn print_summary(doc: &DocumentRef, project: &SharedProject) {
    let project = project.lock();
    let model = project.model();
    println!(
        "{} ({}): {} tasks",
        model.name.as_deref().unwrap_or("untitled"),
        doc,
        model.tasks.len()
    );
    for task in &model.tasks {
        let milestone = if task.milestone == Some(true) { " [milestone]" } else { "" };
        println!("  - {} ({}d){milestone}", task.name, task.duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(args: &[&str]) -> Commands {
        let mut argv = vec!["project-hub"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv).command
    }

    #[test]
    fn watch_respects_configured_reopen() {
        let mut config = HubConfig {
            reopen_on_change: false,
            ..HubConfig::default()
        };
        apply_cli_overrides(&mut config, &command(&["open", "--watch", "plan.json"]));
        assert!(!config.reopen_on_change);

        let mut config = HubConfig::default();
        apply_cli_overrides(&mut config, &command(&["open", "--watch", "plan.json"]));
        assert!(config.reopen_on_change);
    }

    #[test]
    fn reopen_needs_watch() {
        let mut config = HubConfig::default();
        apply_cli_overrides(&mut config, &command(&["open", "plan.json"]));
        assert!(!config.reopen_on_change);

        let mut config = HubConfig::default();
        apply_cli_overrides(&mut config, &command(&["normalize", "plan.json"]));
        assert!(!config.reopen_on_change);
    }
}
