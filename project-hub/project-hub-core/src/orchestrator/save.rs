use super::{ProjectHub, SaveOutcome};
use crate::document::{Document, DocumentRef, WritePermission};
use crate::error::{DocumentError, Result};
use crate::project::SharedProject;
use crate::resolver::{Continuation, WriteResolver};
use anyhow::anyhow;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Position in the save sequence.
#[derive(Debug)]
enum Step {
    SaveAs,
    Probe(DocumentRef),
    Write { target: DocumentRef, force: bool },
}

impl Step {
    fn follow(continuation: Continuation, target: DocumentRef) -> Option<Step> {
        match continuation {
            Continuation::RetryProbe => Some(Step::Probe(target)),
            Continuation::SaveAs => Some(Step::SaveAs),
            Continuation::ForceWrite => Some(Step::Write {
                target,
                force: true,
            }),
            Continuation::Abort => None,
        }
    }
}

/// Marks a save as in flight until dropped.
struct SaveGuard<'a> {
    in_flight: &'a AtomicUsize,
}

impl Drop for SaveGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ProjectHub {
    /// Start saving `project` in the background.
    pub fn save_project(
        self: &Arc<Self>,
        project: SharedProject,
    ) -> oneshot::Receiver<SaveOutcome> {
        let (tx, rx) = oneshot::channel();
        let hub = self.clone();
        tokio::spawn(async move {
            let outcome = hub.save(&project).await;
            let _ = tx.send(outcome);
        });
        rx
    }

    pub fn is_saving(&self) -> bool {
        self.saves_in_flight.load(Ordering::SeqCst) > 0
    }

    /// Save `project` to its document, asking for a target when there is
    /// none. Every error is reported before this returns.
    pub async fn save(self: &Arc<Self>, project: &SharedProject) -> SaveOutcome {
        let Some(_guard) = self.acquire_save_guard() else {
            return SaveOutcome::Rejected;
        };
        let session = Uuid::new_v4();
        self.run_save(project)
            .instrument(info_span!("save", %session))
            .await
    }

    fn acquire_save_guard(&self) -> Option<SaveGuard<'_>> {
        let running = self.saves_in_flight.fetch_add(1, Ordering::SeqCst);
        if running > 0 {
            if self.config.exclusive_saves {
                self.saves_in_flight.fetch_sub(1, Ordering::SeqCst);
                warn!(running, "save rejected, another save is in progress");
                return None;
            }
            warn!(running, "another save is in progress, saving anyway");
        }
        Some(SaveGuard {
            in_flight: &self.saves_in_flight,
        })
    }

    async fn run_save(self: &Arc<Self>, project: &SharedProject) -> SaveOutcome {
        let current = project.lock().document().map(|d| d.reference().clone());
        let mut step = match current.clone() {
            None => Step::SaveAs,
            Some(doc) => {
                if self.store.is_local(&doc) && !self.store.can_read(&doc).await {
                    debug!(document = %doc, "local document is gone, asking for a new target");
                    Step::SaveAs
                } else {
                    Step::Probe(doc)
                }
            }
        };
        let mut auth_attempts = 0;

        loop {
            debug!(?step, "save step");
            step = match step {
                Step::SaveAs => {
                    let save_as = self.save_as.clone();
                    let current = current.clone();
                    let chosen = self
                        .ui
                        .run(move || async move { save_as.choose_target(current.as_ref()).await })
                        .await;
                    match chosen {
                        Ok(Some(target)) => Step::Probe(target),
                        Ok(None) => {
                            info!("save as dismissed");
                            return SaveOutcome::Cancelled;
                        }
                        Err(err) => return SaveOutcome::Failed(self.report(err).await),
                    }
                }

                Step::Probe(target) => match self.store.probe_write_permission(&target).await {
                    WritePermission::Granted => Step::Write {
                        target,
                        force: false,
                    },
                    WritePermission::Blocked {
                        code,
                        message,
                        cause,
                    } => {
                        info!(
                            document = %target,
                            code,
                            cause = cause.as_deref().unwrap_or("none"),
                            "write blocked: {message}"
                        );
                        let choices = WriteResolver::cant_write_choices(&target, code, &message);
                        let answer = match choices {
                            Ok(choices) => self.ask(choices).await,
                            Err(err) => Err(err),
                        };
                        match answer {
                            Ok(choice) => match Step::follow(choice.continuation(), target) {
                                Some(next) => next,
                                None => return SaveOutcome::Cancelled,
                            },
                            Err(err) => return SaveOutcome::Failed(self.report(err).await),
                        }
                    }
                },

                Step::Write { target, force } => {
                    let content = project.lock().to_bytes();
                    let content = match content {
                        Ok(content) => content,
                        Err(err) => return SaveOutcome::Failed(self.report(err).await),
                    };
                    match self.store.write(&target, content.clone(), force).await {
                        Ok(()) => {
                            return match self.after_save(project, &target, content).await {
                                Ok(()) => {
                                    info!(document = %target, force, "saved");
                                    SaveOutcome::Saved(target)
                                }
                                Err(err) => SaveOutcome::Failed(self.report(err).await),
                            };
                        }
                        Err(DocumentError::VersionMismatch) if self.store.is_local(&target) => {
                            let err = DocumentError::Programming(format!(
                                "version mismatch reported for local document {target}"
                            ));
                            return SaveOutcome::Failed(self.report(err).await);
                        }
                        Err(DocumentError::VersionMismatch) => {
                            info!(document = %target, "stored copy changed since it was read");
                            let choices = WriteResolver::version_mismatch_choices(&target);
                            match self.ask(choices).await {
                                Ok(choice) => match Step::follow(choice.continuation(), target) {
                                    Some(next) => next,
                                    None => return SaveOutcome::Cancelled,
                                },
                                Err(err) => return SaveOutcome::Failed(self.report(err).await),
                            }
                        }
                        Err(DocumentError::Forbidden) => {
                            if auth_attempts >= self.config.max_auth_attempts {
                                let err = DocumentError::Other(anyhow!(
                                    "still forbidden after {auth_attempts} sign-in attempts"
                                ));
                                return SaveOutcome::Failed(self.report(err).await);
                            }
                            auth_attempts += 1;
                            let retry = self
                                .auth
                                .with_auth(move || async move { Step::Write { target, force } })
                                .await;
                            match retry {
                                Ok(Some(next)) => next,
                                Ok(None) => return SaveOutcome::Cancelled,
                                Err(err) => return SaveOutcome::Failed(self.report(err).await),
                            }
                        }
                        Err(err) => return SaveOutcome::Failed(self.report(err).await),
                    }
                }
            };
        }
    }

    /// Bookkeeping after a successful write.
    async fn after_save(
        self: &Arc<Self>,
        project: &SharedProject,
        target: &DocumentRef,
        content: Bytes,
    ) -> Result<()> {
        if let Err(err) = self.recent.record(target).await {
            warn!(document = %target, "failed to record recent document: {err:#}");
        }

        let retargeted = {
            let presentation = self.presentation.clone();
            let project = project.clone();
            let target = target.clone();
            let title = self.config.title_for(target.name());
            self.ui
                .run(move || async move {
                    let mut project = project.lock();
                    let retargeted = project.document().map(|d| d.reference()) != Some(&target);
                    if retargeted {
                        project.replace_document(Arc::new(Document::new(target, content)));
                    }
                    project.set_modified(false);
                    drop(project);
                    presentation.set_window_title(&title);
                    retargeted
                })
                .await?
        };

        if let Some(dir) = target
            .local_path()
            .and_then(|p| p.parent())
            .filter(|p| !p.as_os_str().is_empty())
        {
            if let Err(err) = self.recent.set_working_directory(dir).await {
                warn!(dir = %dir.display(), "failed to remember working directory: {err:#}");
            }
        }

        if retargeted && self.config.reopen_on_change {
            self.listen_for_changes(target.clone(), project.clone()).await;
        }
        Ok(())
    }
}
