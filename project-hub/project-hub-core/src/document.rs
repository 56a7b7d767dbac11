//! Persistence targets and their write-permission status.
//! A [`DocumentRef`] names a target; a [`Document`] is a fetched, fully
//! materialized copy of one.

use crate::error::{DocumentError, Result};
use crate::project::ProjectModel;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Where a document lives.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "lowercase")]
pub enum Location {
    Local(PathBuf),
    Online(String),
}

/// Identity of a persistence target. Two refs are the same document when
/// their locations match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentRef {
    name: String,
    location: Location,
}

impl PartialEq for DocumentRef {
    fn eq(&self, other: &Self) -> bool {
        self.location == other.location
    }
}

impl Eq for DocumentRef {}

impl std::hash::Hash for DocumentRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.location.hash(state);
    }
}

impl DocumentRef {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self {
            name,
            location: Location::Local(path),
        }
    }

    pub fn online(url: impl Into<String>) -> Self {
        let url = url.into();
        let name = url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(url.as_str())
            .to_string();
        Self {
            name,
            location: Location::Online(url),
        }
    }

    /// Parses a user supplied target: http(s) URLs are online, anything else
    /// is a local path.
    pub fn parse(target: &str) -> Self {
        let lower = target.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::online(target)
        } else {
            Self::local(target)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn is_local(&self) -> bool {
        matches!(self.location, Location::Local(_))
    }

    pub fn is_online(&self) -> bool {
        !self.is_local()
    }

    pub fn local_path(&self) -> Option<&Path> {
        match &self.location {
            Location::Local(path) => Some(path),
            Location::Online(_) => None,
        }
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Location::Local(path) => write!(f, "{}", path.display()),
            Location::Online(url) => write!(f, "{url}"),
        }
    }
}

/// A document as returned by a store fetch. Immutable once built; a project
/// replaces it wholesale rather than editing it.
#[derive(Clone, Debug)]
pub struct Document {
    reference: DocumentRef,
    content: Bytes,
    fetched_at: DateTime<Utc>,
    notices: Vec<String>,
}

impl Document {
    pub fn new(reference: DocumentRef, content: impl Into<Bytes>) -> Self {
        Self {
            reference,
            content: content.into(),
            fetched_at: Utc::now(),
            notices: Vec::new(),
        }
    }

    /// Attach a note for the user, shown after the document is applied.
    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notices.push(notice.into());
        self
    }

    pub fn reference(&self) -> &DocumentRef {
        &self.reference
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn notices(&self) -> &[String] {
        &self.notices
    }

    /// Parse the content into the project model. Fails with
    /// [`DocumentError::MalformedContent`] keeping the parser error as cause.
    pub fn check_well_formed(&self) -> Result<ProjectModel> {
        serde_json::from_slice(&self.content).map_err(DocumentError::MalformedContent)
    }
}

/// Closed catalog of reasons a store may refuse a write. The numeric code
/// carried by [`WritePermission::Blocked`] is an index into [`Self::ALL`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteErrorCode {
    NotWritable,
    IsDirectory,
    LostUpdate,
    CantCreate,
    GenericNetworkError,
}

impl WriteErrorCode {
    pub const ALL: [WriteErrorCode; 5] = [
        WriteErrorCode::NotWritable,
        WriteErrorCode::IsDirectory,
        WriteErrorCode::LostUpdate,
        WriteErrorCode::CantCreate,
        WriteErrorCode::GenericNetworkError,
    ];

    pub fn from_code(code: u32) -> Result<Self> {
        Self::ALL
            .get(code as usize)
            .copied()
            .ok_or_else(|| {
                DocumentError::Programming(format!(
                    "write status code {code} is outside the catalog (0..{})",
                    Self::ALL.len()
                ))
            })
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WriteErrorCode::NotWritable => "not_writable",
            WriteErrorCode::IsDirectory => "is_directory",
            WriteErrorCode::LostUpdate => "lost_update",
            WriteErrorCode::CantCreate => "cant_create",
            WriteErrorCode::GenericNetworkError => "generic_network_error",
        }
    }
}

/// Result of a write-permission probe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WritePermission {
    Granted,
    Blocked {
        code: u32,
        message: String,
        cause: Option<String>,
    },
}

impl WritePermission {
    pub fn blocked(code: WriteErrorCode, message: impl Into<String>) -> Self {
        WritePermission::Blocked {
            code: code.code(),
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(self, cause: impl Into<String>) -> Self {
        match self {
            WritePermission::Blocked { code, message, .. } => WritePermission::Blocked {
                code,
                message,
                cause: Some(cause.into()),
            },
            granted => granted,
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, WritePermission::Granted)
    }
}
