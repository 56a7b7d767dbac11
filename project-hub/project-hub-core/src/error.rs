//! Error taxonomy shared by the save and open sequences.
//!
//! `WriteBlocked`, `VersionMismatch` and `Forbidden` are resolved inside the
//! orchestrators (dialogs, sign-in). The remaining kinds end the sequence and
//! are reported to the presentation layer once.

use crate::document::DocumentRef;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// The store refused write access. `code` indexes [`crate::document::WriteErrorCode`].
    #[error("document is not writable: {message}")]
    WriteBlocked { code: u32, message: String },

    /// The remote copy changed since it was last read.
    #[error("the stored copy was changed by someone else")]
    VersionMismatch,

    /// Credentials are missing or expired.
    #[error("access forbidden, sign-in required")]
    Forbidden,

    #[error("unsupported document format")]
    MalformedContent(#[source] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// Broken internal contract. Never retried or swallowed.
    #[error("programming error: {0}")]
    Programming(String),
}

impl DocumentError {
    /// Whether the orchestrators can recover from this error on their own.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DocumentError::WriteBlocked { .. }
                | DocumentError::VersionMismatch
                | DocumentError::Forbidden
        )
    }
}

impl From<std::io::Error> for DocumentError {
    fn from(err: std::io::Error) -> Self {
        DocumentError::Other(err.into())
    }
}

/// The single failure type of the open sequence.
#[derive(Debug, thiserror::Error)]
#[error("can't open document {document}")]
pub struct OpenError {
    pub document: DocumentRef,
    #[source]
    pub source: DocumentError,
}

impl OpenError {
    pub fn new(document: DocumentRef, source: DocumentError) -> Self {
        Self { document, source }
    }
}

pub type Result<T, E = DocumentError> = std::result::Result<T, E>;
