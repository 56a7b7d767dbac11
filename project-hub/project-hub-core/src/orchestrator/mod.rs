//! Save and open sequences for a project document.
//!
//! [`ProjectHub`] owns the collaborators and runs both sequences. Store I/O
//! happens on background tasks; dialogs, title updates and every project
//! mutation run on the [`UiContext`].

mod open;
mod save;

use crate::config::HubConfig;
use crate::document::DocumentRef;
use crate::error::{DocumentError, OpenError, Result};
use crate::gates::auth::{AuthGate, CredentialIssuer};
use crate::gates::confirm::ConfirmationGate;
use crate::project::{Project, SharedProject};
use crate::store::recent::RecentDocuments;
use crate::store::DocumentStore;
use crate::transforms::PostOpenChain;
use crate::ui::{
    ChoiceSet, Confirmation, DocumentChooser, Message, Presentation, SaveAsFlow, UiContext,
    UndoHistory,
};
use parking_lot::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// External capabilities the hub drives.
#[derive(Clone)]
pub struct Collaborators {
    pub presentation: Arc<dyn Presentation>,
    pub store: Arc<dyn DocumentStore>,
    pub recent: Arc<dyn RecentDocuments>,
    pub issuer: Arc<dyn CredentialIssuer>,
    pub undo: Arc<dyn UndoHistory>,
    pub save_as: Arc<dyn SaveAsFlow>,
    pub chooser: Arc<dyn DocumentChooser>,
}

#[derive(Debug)]
pub enum SaveOutcome {
    Saved(DocumentRef),
    /// The user cancelled somewhere along the way. Nothing was written.
    Cancelled,
    /// Another save was running and `exclusive_saves` is set.
    Rejected,
    /// The error has already been reported to the user.
    Failed(DocumentError),
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OpenOutcome {
    Opened(DocumentRef),
    Cancelled,
}

pub struct ProjectHub {
    config: HubConfig,
    presentation: Arc<dyn Presentation>,
    store: Arc<dyn DocumentStore>,
    recent: Arc<dyn RecentDocuments>,
    undo: Arc<dyn UndoHistory>,
    save_as: Arc<dyn SaveAsFlow>,
    chooser: Arc<dyn DocumentChooser>,
    ui: UiContext,
    auth: AuthGate,
    confirm: ConfirmationGate,
    transforms: PostOpenChain,
    saves_in_flight: AtomicUsize,
    change_listener: Mutex<Option<JoinHandle<()>>>,
}

impl ProjectHub {
    pub fn new(config: HubConfig, collaborators: Collaborators, ui: UiContext) -> Arc<Self> {
        let Collaborators {
            presentation,
            store,
            recent,
            issuer,
            undo,
            save_as,
            chooser,
        } = collaborators;
        Arc::new(Self {
            auth: AuthGate::new(issuer, store.clone()),
            confirm: ConfirmationGate::new(presentation.clone(), ui.clone()),
            transforms: PostOpenChain::from_config(&config),
            config,
            presentation,
            store,
            recent,
            undo,
            save_as,
            chooser,
            ui,
            saves_in_flight: AtomicUsize::new(0),
            change_listener: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn auth(&self) -> &AuthGate {
        &self.auth
    }

    /// True when the project may be replaced: it is unmodified, the user
    /// agreed to discard it, or it was saved.
    pub async fn ensure_project_saved(self: &Arc<Self>, project: &SharedProject) -> bool {
        let modified = project.lock().is_modified();
        if !modified {
            return true;
        }
        match self.confirm.confirm_discard().await {
            Ok(Confirmation::Cancel) => false,
            Ok(Confirmation::No) => true,
            Ok(Confirmation::Yes) => {
                let outcome = self.save(project).await;
                debug!(?outcome, "save before discard finished");
                let still_modified = project.lock().is_modified();
                !still_modified
            }
            Err(err) => {
                warn!("discard confirmation failed: {err}");
                false
            }
        }
    }

    /// Close the current project and start an empty one.
    pub async fn create_project(self: &Arc<Self>, project: &SharedProject) -> bool {
        if !self.ensure_project_saved(project).await {
            return false;
        }
        let hub = self.clone();
        let project = project.clone();
        let created = self
            .ui
            .run(move || async move {
                hub.teardown();
                project.lock().close();
                hub.presentation
                    .set_status_text(&Message::new("project.new.description"));
            })
            .await;
        created.is_ok()
    }

    /// Apply an edit to the project on the UI context.
    pub async fn edit<F>(&self, project: &SharedProject, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Project) + Send + 'static,
    {
        let project = project.clone();
        self.ui.run(move || async move { edit(&mut project.lock()) }).await
    }

    /// Reset the title, drop undo history and stop watching the old
    /// document. Runs on the UI context.
    fn teardown(&self) {
        self.presentation.set_window_title(&self.config.app_title);
        self.undo.terminate();
        if let Some(listener) = self.change_listener.lock().take() {
            listener.abort();
        }
    }

    /// Ask a choice question on the UI context.
    async fn ask<C>(&self, choices: ChoiceSet<C>) -> Result<C>
    where
        C: Copy + Send + 'static,
    {
        let presentation = self.presentation.clone();
        let dialog = choices.dialog();
        let index = self
            .ui
            .run(move || async move { presentation.show_choice(&dialog).await })
            .await?;
        choices.choice(index)
    }

    /// Log a terminal error and show it to the user once.
    async fn report(&self, err: DocumentError) -> DocumentError {
        self.show_error(err).await.unwrap_or_else(|closed| closed)
    }

    async fn report_open(&self, document: DocumentRef, source: DocumentError) -> OpenError {
        let err = OpenError::new(document.clone(), source);
        self.show_error(err)
            .await
            .unwrap_or_else(|closed| OpenError::new(document, closed))
    }

    /// Hands the error back unless the UI context is gone.
    async fn show_error<E>(&self, err: E) -> Result<E>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        error!(error = %err, source = ?err.source().map(ToString::to_string), "reporting error");
        let presentation = self.presentation.clone();
        self.ui
            .run(move || async move {
                presentation.show_error(&err).await;
                err
            })
            .await
    }
}
