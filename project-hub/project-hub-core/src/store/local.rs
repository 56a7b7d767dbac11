//! Filesystem-backed document store.
//!
//! Writes go through a temp file and a rename. The store remembers a CRC32 of
//! the last content it read or wrote per path, so watcher events caused by its
//! own writes are not reported as external changes.

use crate::document::{Document, DocumentRef, WriteErrorCode, WritePermission};
use crate::error::{DocumentError, Result};
use crate::events::{DocumentEvent, EventBus};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use bytes::Bytes;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use super::DocumentStore;

pub struct LocalFsStore {
    events: EventBus,
    known: Arc<Mutex<HashMap<PathBuf, u32>>>,
    watchers: Mutex<HashMap<PathBuf, RecommendedWatcher>>,
}

impl Default for LocalFsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalFsStore {
    pub fn new() -> Self {
        Self {
            events: EventBus::new(),
            known: Arc::new(Mutex::new(HashMap::new())),
            watchers: Mutex::new(HashMap::new()),
        }
    }

    fn path_of(doc: &DocumentRef) -> Result<&Path> {
        doc.local_path()
            .ok_or_else(|| DocumentError::Other(anyhow!("{doc} is not a local document")))
    }

    fn remember(known: &Mutex<HashMap<PathBuf, u32>>, path: &Path, content: &[u8]) {
        known
            .lock()
            .insert(path.to_path_buf(), crc32fast::hash(content));
    }

    /// Compare the file on disk with what this store last saw. Returns a
    /// change event when they differ and records the new checksum.
    pub async fn check_external_change(&self, path: &Path) -> Option<DocumentEvent> {
        Self::detect_change(&self.known, path).await
    }

    async fn detect_change(
        known: &Mutex<HashMap<PathBuf, u32>>,
        path: &Path,
    ) -> Option<DocumentEvent> {
        let content = tokio::fs::read(path).await.ok()?;
        let crc = crc32fast::hash(&content);
        let previous = known.lock().insert(path.to_path_buf(), crc);
        if previous == Some(crc) {
            return None;
        }
        Some(DocumentEvent::ContentChanged {
            document: DocumentRef::local(path),
        })
    }
}

#[async_trait]
impl DocumentStore for LocalFsStore {
    async fn probe_write_permission(&self, doc: &DocumentRef) -> WritePermission {
        let path = match doc.local_path() {
            Some(path) => path,
            None => {
                return WritePermission::blocked(
                    WriteErrorCode::GenericNetworkError,
                    "online documents are not served by the local store",
                )
            }
        };
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => {
                WritePermission::blocked(WriteErrorCode::IsDirectory, path.display().to_string())
            }
            Ok(meta) if meta.permissions().readonly() => {
                WritePermission::blocked(WriteErrorCode::NotWritable, path.display().to_string())
            }
            Ok(_) => WritePermission::Granted,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let parent_is_dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    Some(parent) => tokio::fs::metadata(parent)
                        .await
                        .map(|m| m.is_dir())
                        .unwrap_or(false),
                    None => true,
                };
                if parent_is_dir {
                    WritePermission::Granted
                } else {
                    WritePermission::blocked(WriteErrorCode::CantCreate, path.display().to_string())
                        .with_cause(err.to_string())
                }
            }
            Err(err) => {
                WritePermission::blocked(WriteErrorCode::NotWritable, path.display().to_string())
                    .with_cause(err.to_string())
            }
        }
    }

    async fn write(&self, doc: &DocumentRef, content: Bytes, _force: bool) -> Result<()> {
        let path = Self::path_of(doc)?;
        // Recorded up front so the watcher sees our own write as known.
        Self::remember(&self.known, path, &content);

        let file_name = path
            .file_name()
            .ok_or_else(|| anyhow!("{} has no file name", path.display()))?;
        let tmp = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));
        tokio::fs::write(&tmp, &content)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("failed to replace {}", path.display()))?;

        debug!(document = %doc, bytes = content.len(), "document written");
        self.events.send(DocumentEvent::Written {
            document: doc.clone(),
        });
        Ok(())
    }

    async fn fetch(&self, doc: &DocumentRef) -> Result<Document> {
        let path = Self::path_of(doc)?;
        let content = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::remember(&self.known, path, &content);
        Ok(Document::new(doc.clone(), content))
    }

    async fn can_read(&self, doc: &DocumentRef) -> bool {
        let Some(path) = doc.local_path() else {
            return false;
        };
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => tokio::fs::File::open(path).await.is_ok(),
            _ => false,
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<DocumentEvent> {
        self.events.subscribe()
    }

    async fn watch(&self, doc: &DocumentRef) -> Result<()> {
        let path = Self::path_of(doc)?.to_path_buf();
        let file_name = path
            .file_name()
            .ok_or_else(|| anyhow!("{} has no file name to watch", path.display()))?
            .to_os_string();
        if self.watchers.lock().contains_key(&path) {
            return Ok(());
        }
        // Editors often replace files, so watch the directory, not the file.
        let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.to_path_buf(),
            None => PathBuf::from("."),
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<PathBuf>();
        let target = path.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if is_content_event(&event.kind) => {
                    if event.paths.iter().any(|p| p.file_name() == Some(file_name.as_os_str())) {
                        let _ = tx.send(target.clone());
                    }
                }
                Ok(_) => {}
                Err(err) => warn!("file watcher error: {err}"),
            },
            notify::Config::default(),
        )
        .context("failed to create file watcher")?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", dir.display()))?;

        let known = self.known.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            while let Some(path) = rx.recv().await {
                if let Some(event) = Self::detect_change(&known, &path).await {
                    debug!(path = %path.display(), "external change detected");
                    events.send(event);
                }
            }
        });

        self.watchers.lock().insert(path, watcher);
        Ok(())
    }
}

fn is_content_event(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}
