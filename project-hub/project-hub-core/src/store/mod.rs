pub mod local;
pub mod recent;

use crate::document::{Document, DocumentRef, WritePermission};
use crate::error::Result;
use crate::events::DocumentEvent;
use crate::gates::auth::AuthToken;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::broadcast;

/// Storage backend seen by the orchestrators. Implementations cover the
/// transport (local filesystem, remote document service); the hub only
/// drives them.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn probe_write_permission(&self, doc: &DocumentRef) -> WritePermission;

    /// Persist `content`. Errors with [`crate::DocumentError::VersionMismatch`]
    /// when an online copy changed since it was last read and `force` is
    /// false, and with [`crate::DocumentError::Forbidden`] when credentials
    /// are needed.
    async fn write(&self, doc: &DocumentRef, content: Bytes, force: bool) -> Result<()>;

    /// Fetch a fully materialized document.
    async fn fetch(&self, doc: &DocumentRef) -> Result<Document>;

    fn is_local(&self, doc: &DocumentRef) -> bool {
        doc.is_local()
    }

    async fn can_read(&self, doc: &DocumentRef) -> bool;

    /// Change notifications for documents this store serves.
    fn subscribe(&self) -> broadcast::Receiver<DocumentEvent>;

    /// Start reporting external changes of `doc` through [`Self::subscribe`].
    async fn watch(&self, _doc: &DocumentRef) -> Result<()> {
        Ok(())
    }

    /// Credentials obtained by a sign-in flow.
    async fn install_token(&self, _token: &AuthToken) {}
}
