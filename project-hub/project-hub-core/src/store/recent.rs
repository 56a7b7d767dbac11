//! Recently used documents and the remembered working directory.

use crate::document::DocumentRef;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

#[async_trait]
pub trait RecentDocuments: Send + Sync {
    async fn record(&self, doc: &DocumentRef) -> Result<()>;
    async fn set_working_directory(&self, dir: &Path) -> Result<()>;
    async fn working_directory(&self) -> Option<PathBuf>;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecentEntry {
    pub document: DocumentRef,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct RecentState {
    #[serde(default)]
    entries: Vec<RecentEntry>,
    #[serde(default)]
    working_directory: Option<PathBuf>,
}

/// Recent list persisted as a JSON file, newest entry first.
pub struct RecentDocumentsFile {
    path: PathBuf,
    limit: usize,
    state: Mutex<RecentState>,
}

impl RecentDocumentsFile {
    /// Load the list from `path`; a missing file starts an empty list.
    pub async fn open(path: impl AsRef<Path>, limit: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = match tokio::fs::read(&path).await {
            Ok(raw) => serde_json::from_slice(&raw)
                .with_context(|| format!("corrupt recent documents file {}", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => RecentState::default(),
            Err(err) => return Err(err).context("failed to read recent documents"),
        };
        Ok(Self {
            path,
            limit: limit.max(1),
            state: Mutex::new(state),
        })
    }

    pub async fn entries(&self) -> Vec<RecentEntry> {
        self.state.lock().await.entries.clone()
    }

    async fn persist(&self, state: &RecentState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_vec_pretty(state)?;
        tokio::fs::write(&self.path, raw)
            .await
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl RecentDocuments for RecentDocumentsFile {
    async fn record(&self, doc: &DocumentRef) -> Result<()> {
        let mut state = self.state.lock().await;
        state.entries.retain(|e| &e.document != doc);
        state.entries.insert(
            0,
            RecentEntry {
                document: doc.clone(),
                recorded_at: Utc::now(),
            },
        );
        state.entries.truncate(self.limit);
        self.persist(&state).await
    }

    async fn set_working_directory(&self, dir: &Path) -> Result<()> {
        let mut state = self.state.lock().await;
        state.working_directory = Some(dir.to_path_buf());
        self.persist(&state).await
    }

    async fn working_directory(&self) -> Option<PathBuf> {
        self.state.lock().await.working_directory.clone()
    }
}
