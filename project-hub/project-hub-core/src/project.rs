//! In-memory project state: the open document, the task model and the
//! modified flag.

use crate::document::Document;
use crate::error::Result;
use anyhow::Context;
use bytes::Bytes;
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Project handle shared between the orchestrators and the UI context.
/// The lock is never held across an await.
pub type SharedProject = Arc<Mutex<Project>>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub name: String,
    #[serde(default)]
    pub duration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestone: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earliest_start: Option<NaiveDate>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The part of a project document the hub understands. Unknown fields are
/// carried through untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub tasks: Vec<TaskRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

type CloseListener = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
pub struct Project {
    document: Option<Arc<Document>>,
    model: ProjectModel,
    modified: bool,
    close_listeners: Vec<CloseListener>,
}

impl Project {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedProject {
        Arc::new(Mutex::new(self))
    }

    pub fn document(&self) -> Option<&Arc<Document>> {
        self.document.as_ref()
    }

    pub fn model(&self) -> &ProjectModel {
        &self.model
    }

    /// Mutable access to the model. Marks the project modified.
    pub fn model_mut(&mut self) -> &mut ProjectModel {
        self.modified = true;
        &mut self.model
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn set_modified(&mut self, modified: bool) {
        self.modified = modified;
    }

    /// Register a hook run every time the project is closed.
    pub fn on_close(&mut self, listener: impl Fn() + Send + Sync + 'static) {
        self.close_listeners.push(Box::new(listener));
    }

    /// Drop the document and model. Close listeners stay registered.
    pub fn close(&mut self) {
        for listener in &self.close_listeners {
            listener();
        }
        self.document = None;
        self.model = ProjectModel::default();
        self.modified = false;
    }

    /// Install a fetched document and the model parsed from it.
    pub fn apply(&mut self, document: Arc<Document>, model: ProjectModel) {
        self.document = Some(document);
        self.model = model;
        self.modified = false;
    }

    /// Rewrite the model in place without marking the project modified.
    pub(crate) fn normalize<T>(&mut self, f: impl FnOnce(&mut ProjectModel) -> T) -> T {
        f(&mut self.model)
    }

    /// Swap the backing document after a save to a new target.
    pub(crate) fn replace_document(&mut self, document: Arc<Document>) {
        self.document = Some(document);
    }

    /// Serialize the model for a write.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let bytes = serde_json::to_vec_pretty(&self.model).context("failed to serialize project")?;
        Ok(Bytes::from(bytes))
    }
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("document", &self.document.as_ref().map(|d| d.reference().clone()))
            .field("tasks", &self.model.tasks.len())
            .field("modified", &self.modified)
            .finish()
    }
}
