//! Choice sets for blocked writes and version conflicts, and the
//! continuation each answer leads to. No I/O here.

use crate::document::{DocumentRef, WriteErrorCode};
use crate::error::Result;
use crate::ui::{ChoiceSet, Message};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CantWriteChoice {
    MakeCopy,
    Cancel,
    Retry,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VersionMismatchChoice {
    Overwrite,
    MakeCopy,
}

/// Where the save sequence goes after the user answered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Continuation {
    RetryProbe,
    SaveAs,
    ForceWrite,
    Abort,
}

impl CantWriteChoice {
    pub fn continuation(self) -> Continuation {
        match self {
            CantWriteChoice::MakeCopy => Continuation::SaveAs,
            CantWriteChoice::Cancel => Continuation::Abort,
            CantWriteChoice::Retry => Continuation::RetryProbe,
        }
    }
}

impl VersionMismatchChoice {
    pub fn continuation(self) -> Continuation {
        match self {
            VersionMismatchChoice::Overwrite => Continuation::ForceWrite,
            VersionMismatchChoice::MakeCopy => Continuation::SaveAs,
        }
    }
}

pub struct WriteResolver;

impl WriteResolver {
    /// Localized explanation of a blocked write:
    /// `document.error.write.<reason>` with the document name and the store's
    /// message as arguments.
    pub fn format_write_status(doc: &DocumentRef, code: u32, message: &str) -> Result<Message> {
        let reason = WriteErrorCode::from_code(code)?;
        Ok(Message::new(format!("document.error.write.{}", reason.as_str()))
            .arg(doc.name())
            .arg(message))
    }

    /// Make a copy (preselected), cancel, or retry.
    pub fn cant_write_choices(
        doc: &DocumentRef,
        code: u32,
        message: &str,
    ) -> Result<ChoiceSet<CantWriteChoice>> {
        let help = Self::format_write_status(doc, code, message)?;
        Ok(ChoiceSet {
            title: Message::new("document.error.write.cantWrite.title").arg(doc.name()),
            help: Some(help),
            options: vec![
                (Message::new("document.option.makeCopy"), CantWriteChoice::MakeCopy),
                (Message::new("cancel"), CantWriteChoice::Cancel),
                (Message::new("generic.retry"), CantWriteChoice::Retry),
            ],
            default: 0,
        })
    }

    /// Overwrite the remote copy, or make a copy (preselected).
    pub fn version_mismatch_choices(doc: &DocumentRef) -> ChoiceSet<VersionMismatchChoice> {
        ChoiceSet {
            title: Message::new("cloud.versionMismatch.title").arg(doc.name()),
            help: Some(Message::new("cloud.versionMismatch.help")),
            options: vec![
                (Message::new("option.overwrite"), VersionMismatchChoice::Overwrite),
                (Message::new("document.option.makeCopy"), VersionMismatchChoice::MakeCopy),
            ],
            default: 1,
        }
    }
}
