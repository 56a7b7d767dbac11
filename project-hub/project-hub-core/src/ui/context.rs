//! The UI-affine execution context: a single task that runs posted jobs one
//! at a time, in order. Everything that touches presentation state or
//! mutates the project goes through here.

use crate::error::{DocumentError, Result};
use anyhow::anyhow;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

type UiJob = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

tokio::task_local! {
    static ON_UI_CONTEXT: ();
}

#[derive(Clone)]
pub struct UiContext {
    tx: mpsc::UnboundedSender<UiJob>,
}

impl UiContext {
    /// Start the UI loop on the current runtime. The loop ends when every
    /// handle has been dropped.
    pub fn spawn() -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<UiJob>();
        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                ON_UI_CONTEXT.scope((), job()).await;
            }
        });
        (Self { tx }, handle)
    }

    /// True while running inside a job of some UI context.
    pub fn is_current() -> bool {
        ON_UI_CONTEXT.try_with(|_| ()).is_ok()
    }

    /// Queue a job without waiting for it.
    pub fn post<F, Fut>(&self, job: F) -> Result<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.tx
            .send(Box::new(move || job().boxed()))
            .map_err(|_| closed())
    }

    /// Run a job on the UI context and wait for its result. Called from a UI
    /// job it runs inline, since queueing would wait on itself.
    pub async fn run<F, Fut, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if Self::is_current() {
            return Ok(job().await);
        }
        let (tx, rx) = oneshot::channel();
        self.post(move || async move {
            let _ = tx.send(job().await);
        })?;
        rx.await.map_err(|_| closed())
    }
}

fn closed() -> DocumentError {
    DocumentError::Other(anyhow!("UI context has shut down"))
}
