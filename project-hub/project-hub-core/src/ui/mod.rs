//! Presentation-side collaborators. Dialog rendering and localization live
//! outside this crate; the hub hands over message keys and receives answers.

mod context;

pub use context::UiContext;

use crate::document::DocumentRef;
use crate::error::{DocumentError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// A localizable text: a message key plus positional arguments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Message {
    pub key: String,
    pub args: Vec<String>,
}

impl Message {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl ToString) -> Self {
        self.args.push(arg.to_string());
        self
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            write!(f, "{}", self.key)
        } else {
            write!(f, "{}({})", self.key, self.args.join(", "))
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confirmation {
    Yes,
    No,
    Cancel,
}

/// What the presentation layer renders for a choice question.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChoiceDialog {
    pub title: Message,
    pub help: Option<Message>,
    pub options: Vec<Message>,
    /// Index of the preselected option.
    pub default: usize,
}

/// A closed set of typed choices, in display order.
#[derive(Clone, Debug)]
pub struct ChoiceSet<C> {
    pub title: Message,
    pub help: Option<Message>,
    pub options: Vec<(Message, C)>,
    pub default: usize,
}

impl<C: Copy> ChoiceSet<C> {
    pub fn dialog(&self) -> ChoiceDialog {
        ChoiceDialog {
            title: self.title.clone(),
            help: self.help.clone(),
            options: self.options.iter().map(|(label, _)| label.clone()).collect(),
            default: self.default,
        }
    }

    pub fn values(&self) -> Vec<C> {
        self.options.iter().map(|(_, value)| *value).collect()
    }

    pub fn default_choice(&self) -> Result<C> {
        self.choice(self.default)
    }

    /// Map the index answered by the presentation layer back to a choice.
    pub fn choice(&self, index: usize) -> Result<C> {
        self.options
            .get(index)
            .map(|(_, value)| *value)
            .ok_or_else(|| {
                DocumentError::Programming(format!(
                    "dialog answered option {index} of {}",
                    self.options.len()
                ))
            })
    }
}

#[async_trait]
pub trait Presentation: Send + Sync {
    async fn show_confirmation(&self, question: &Message) -> Confirmation;
    async fn show_error(&self, error: &(dyn std::error::Error + Send + Sync));
    /// Returns the index of the selected option.
    async fn show_choice(&self, dialog: &ChoiceDialog) -> usize;
    fn set_window_title(&self, title: &str);
    fn set_status_text(&self, text: &Message);
}

pub trait UndoHistory: Send + Sync {
    /// Discard the undo history of the project being closed.
    fn terminate(&self);
}

/// Target selection for "save as". Returning `None` means the user gave up.
#[async_trait]
pub trait SaveAsFlow: Send + Sync {
    async fn choose_target(&self, current: Option<&DocumentRef>) -> Option<DocumentRef>;
}

#[async_trait]
pub trait DocumentChooser: Send + Sync {
    async fn choose_document(&self, working_directory: Option<&Path>) -> Option<DocumentRef>;
}
