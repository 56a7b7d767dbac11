use super::{OpenOutcome, ProjectHub};
use crate::document::{Document, DocumentRef};
use crate::error::{DocumentError, OpenError};
use crate::events::DocumentEvent;
use crate::project::{ProjectModel, SharedProject};
use crate::ui::Message;
use anyhow::anyhow;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

impl ProjectHub {
    /// Start opening `document` into `project` in the background.
    pub fn open_project(
        self: &Arc<Self>,
        document: DocumentRef,
        project: SharedProject,
    ) -> oneshot::Receiver<Result<OpenOutcome, OpenError>> {
        let (tx, rx) = oneshot::channel();
        let hub = self.clone();
        tokio::spawn(async move {
            let outcome = hub.open(document, &project).await;
            let _ = tx.send(outcome);
        });
        rx
    }

    /// Replace the current project with `document`. A cancelled
    /// confirmation or sign-in is `Ok(OpenOutcome::Cancelled)`.
    pub async fn open(
        self: &Arc<Self>,
        document: DocumentRef,
        project: &SharedProject,
    ) -> Result<OpenOutcome, OpenError> {
        if !self.ensure_project_saved(project).await {
            info!(document = %document, "open cancelled, current project kept");
            return Ok(OpenOutcome::Cancelled);
        }
        self.fetch_and_apply(document, project.clone()).await
    }

    /// Let the user pick a document, starting in the remembered working
    /// directory, then open it.
    pub async fn open_interactive(
        self: &Arc<Self>,
        project: &SharedProject,
    ) -> Result<OpenOutcome, OpenError> {
        if !self.ensure_project_saved(project).await {
            return Ok(OpenOutcome::Cancelled);
        }
        let dir = self.recent.working_directory().await;
        let chooser = self.chooser.clone();
        let chosen = self
            .ui
            .run(move || async move { chooser.choose_document(dir.as_deref()).await })
            .await;
        match chosen {
            Ok(Some(document)) => self.fetch_and_apply(document, project.clone()).await,
            Ok(None) => Ok(OpenOutcome::Cancelled),
            Err(err) => {
                warn!("document chooser unavailable: {err}");
                Ok(OpenOutcome::Cancelled)
            }
        }
    }

    async fn fetch_and_apply(
        self: &Arc<Self>,
        request: DocumentRef,
        project: SharedProject,
    ) -> Result<OpenOutcome, OpenError> {
        let session = Uuid::new_v4();
        let span = info_span!("open", %session, document = %request);
        async move {
            let (document, model) = match self.fetch_checked(&request).await? {
                Some(fetched) => fetched,
                None => return Ok(OpenOutcome::Cancelled),
            };
            let reference = document.reference().clone();
            self.apply_fetched(document, model, &project)
                .await
                .map_err(|err| OpenError::new(reference.clone(), err))?;
            info!("document opened");
            if self.config.reopen_on_change {
                self.listen_for_changes(reference.clone(), project).await;
            }

            if let Err(err) = self.recent.record(&reference).await {
                warn!("failed to record recent document: {err:#}");
            }
            if let Some(dir) = reference
                .local_path()
                .and_then(|p| p.parent())
                .filter(|p| !p.as_os_str().is_empty())
            {
                if let Err(err) = self.recent.set_working_directory(dir).await {
                    warn!("failed to remember working directory: {err:#}");
                }
            }
            Ok(OpenOutcome::Opened(reference))
        }
        .instrument(span)
        .await
    }

    /// Fetch on a background task until the content is well formed, signing
    /// in when the store asks for it. `None` means the sign-in was abandoned.
    async fn fetch_checked(
        &self,
        request: &DocumentRef,
    ) -> Result<Option<(Document, ProjectModel)>, OpenError> {
        let mut auth_attempts = 0;
        loop {
            let (tx, rx) = oneshot::channel();
            let store = self.store.clone();
            let target = request.clone();
            tokio::spawn(async move {
                let _ = tx.send(store.fetch(&target).await);
            });
            let fetched = rx
                .await
                .unwrap_or_else(|_| Err(DocumentError::Other(anyhow!("fetch task ended early"))));
            let checked = fetched.and_then(|document| {
                let model = document.check_well_formed()?;
                Ok((document, model))
            });

            match checked {
                Ok(pair) => return Ok(Some(pair)),
                Err(DocumentError::Forbidden) => {
                    if auth_attempts >= self.config.max_auth_attempts {
                        let err = DocumentError::Other(anyhow!(
                            "still forbidden after {auth_attempts} sign-in attempts"
                        ));
                        return Err(self.report_open(request.clone(), err).await);
                    }
                    auth_attempts += 1;
                    match self.auth.with_auth(|| async {}).await {
                        Ok(Some(())) => debug!("signed in, fetching again"),
                        Ok(None) => {
                            info!("sign-in abandoned, open cancelled");
                            return Ok(None);
                        }
                        Err(err) => return Err(self.report_open(request.clone(), err).await),
                    }
                }
                Err(err) => return Err(self.report_open(request.clone(), err).await),
            }
        }
    }

    /// Swap the fetched document into the project on the UI context.
    async fn apply_fetched(
        self: &Arc<Self>,
        document: Document,
        model: ProjectModel,
        project: &SharedProject,
    ) -> crate::error::Result<()> {
        let notices: Vec<Message> = document
            .notices()
            .iter()
            .map(|notice| Message::new("document.open.notice").arg(notice))
            .collect();
        let title = self.config.title_for(document.reference().name());
        let document = Arc::new(document);
        let hub = self.clone();
        let project = project.clone();
        self.ui
            .run(move || async move {
                hub.teardown();
                let notes = {
                    let mut project = project.lock();
                    project.close();
                    project.apply(document, model);
                    project.normalize(|model| hub.transforms.run(model))
                };
                for note in notes.iter().chain(&notices) {
                    hub.presentation.set_status_text(note);
                }
                hub.presentation.set_window_title(&title);
            })
            .await
    }

    /// Re-open `document` the first time the store reports a change to it.
    /// Replaces any listener registered earlier.
    pub(super) async fn listen_for_changes(
        self: &Arc<Self>,
        document: DocumentRef,
        project: SharedProject,
    ) {
        let mut events = self.store.subscribe();
        if let Err(err) = self.store.watch(&document).await {
            warn!(document = %document, "cannot watch for changes: {err}");
        }
        let hub = Arc::downgrade(self);
        let listener = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(DocumentEvent::ContentChanged { document: changed })
                        if changed == document =>
                    {
                        let Some(hub) = hub.upgrade() else {
                            return;
                        };
                        info!(document = %document, "content changed in store, reopening");
                        tokio::spawn(hub.reopen(document, project));
                        return;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "change listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });
        if let Some(previous) = self.change_listener.lock().replace(listener) {
            previous.abort();
        }
    }

    /// Silent reopen, without the discard confirmation.
    fn reopen(
        self: Arc<Self>,
        document: DocumentRef,
        project: SharedProject,
    ) -> BoxFuture<'static, ()> {
        async move {
            if let Err(err) = self.fetch_and_apply(document, project).await {
                debug!("reopen failed: {err}");
            }
        }
        .boxed()
    }
}
