//! Interactive sign-in for stores that answer "forbidden".
//!
//! Concurrent requests share one flow: the first caller starts it, later
//! callers wait on the same result. Each caller observes the outcome once,
//! so each continuation runs at most once.

use crate::error::{DocumentError, Result};
use crate::store::DocumentStore;
use anyhow::anyhow;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthToken {
    pub token: String,
    pub validity: Duration,
    pub user_id: String,
    pub websocket_token: Option<String>,
}

#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    /// Run the user-facing sign-in. `Ok(None)` means the user dismissed it.
    async fn begin_sign_in(&self) -> anyhow::Result<Option<AuthToken>>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignIn {
    Authorized,
    Abandoned,
    Failed(String),
}

type Flow = Shared<BoxFuture<'static, SignIn>>;
type Slot = Arc<Mutex<Option<(u64, Flow)>>>;

pub struct AuthGate {
    issuer: Arc<dyn CredentialIssuer>,
    store: Arc<dyn DocumentStore>,
    inflight: Slot,
    flows_started: AtomicU64,
}

impl AuthGate {
    pub fn new(issuer: Arc<dyn CredentialIssuer>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            issuer,
            store,
            inflight: Arc::new(Mutex::new(None)),
            flows_started: AtomicU64::new(0),
        }
    }

    /// Number of interactive flows presented so far.
    pub fn flows_started(&self) -> u64 {
        self.flows_started.load(Ordering::SeqCst)
    }

    /// True while a sign-in flow is on screen.
    pub fn is_signing_in(&self) -> bool {
        self.inflight.lock().is_some()
    }

    /// Obtain credentials, joining a flow that is already on screen.
    pub async fn sign_in(&self) -> SignIn {
        let flow = {
            let mut slot = self.inflight.lock();
            match slot.as_ref() {
                Some((id, flow)) => {
                    debug!(flow = id, "joining sign-in in progress");
                    flow.clone()
                }
                None => {
                    let id = self.flows_started.fetch_add(1, Ordering::SeqCst);
                    let flow = Self::start_flow(
                        self.issuer.clone(),
                        self.store.clone(),
                        self.inflight.clone(),
                        id,
                    );
                    *slot = Some((id, flow.clone()));
                    flow
                }
            }
        };
        flow.await
    }

    /// Run `continuation` once credentials are obtained. Returns `Ok(None)`
    /// without running it when the user abandons the sign-in.
    pub async fn with_auth<F, Fut, T>(&self, continuation: F) -> Result<Option<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        match self.sign_in().await {
            SignIn::Authorized => Ok(Some(continuation().await)),
            SignIn::Abandoned => Ok(None),
            SignIn::Failed(reason) => {
                Err(DocumentError::Other(anyhow!("sign-in failed: {reason}")))
            }
        }
    }

    /// The flow task clears its own slot before publishing the outcome.
    fn start_flow(
        issuer: Arc<dyn CredentialIssuer>,
        store: Arc<dyn DocumentStore>,
        inflight: Slot,
        id: u64,
    ) -> Flow {
        let handle = tokio::spawn(async move {
            info!(flow = id, "starting sign-in");
            let outcome = match issuer.begin_sign_in().await {
                Ok(Some(token)) => {
                    store.install_token(&token).await;
                    info!(flow = id, user = %token.user_id, "signed in");
                    SignIn::Authorized
                }
                Ok(None) => {
                    info!(flow = id, "sign-in abandoned");
                    SignIn::Abandoned
                }
                Err(err) => {
                    warn!(flow = id, "sign-in failed: {err:#}");
                    SignIn::Failed(format!("{err:#}"))
                }
            };
            let mut slot = inflight.lock();
            if matches!(slot.as_ref(), Some((current, _)) if *current == id) {
                *slot = None;
            }
            outcome
        });
        async move {
            handle
                .await
                .unwrap_or_else(|err| SignIn::Failed(err.to_string()))
        }
        .boxed()
        .shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, DocumentRef, WritePermission};
    use crate::events::{DocumentEvent, EventBus};
    use bytes::Bytes;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::{broadcast, Notify};

    struct GatedIssuer {
        release: Arc<Notify>,
        answer: Option<AuthToken>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CredentialIssuer for GatedIssuer {
        async fn begin_sign_in(&self) -> anyhow::Result<Option<AuthToken>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
            Ok(self.answer.clone())
        }
    }

    #[derive(Default)]
    struct TokenSink {
        installed: Mutex<Vec<String>>,
        events: EventBus,
    }

    #[async_trait]
    impl DocumentStore for TokenSink {
        async fn probe_write_permission(&self, _doc: &DocumentRef) -> WritePermission {
            WritePermission::Granted
        }
        async fn write(&self, _doc: &DocumentRef, _content: Bytes, _force: bool) -> Result<()> {
            Ok(())
        }
        async fn fetch(&self, doc: &DocumentRef) -> Result<Document> {
            Ok(Document::new(doc.clone(), "{}"))
        }
        async fn can_read(&self, _doc: &DocumentRef) -> bool {
            true
        }
        fn subscribe(&self) -> broadcast::Receiver<DocumentEvent> {
            self.events.subscribe()
        }
        async fn install_token(&self, token: &AuthToken) {
            self.installed.lock().push(token.token.clone());
        }
    }

    fn token() -> AuthToken {
        AuthToken {
            token: "t-1".into(),
            validity: Duration::from_secs(3600),
            user_id: "ana".into(),
            websocket_token: None,
        }
    }

    fn gate(
        answer: Option<AuthToken>,
    ) -> (Arc<AuthGate>, Arc<GatedIssuer>, Arc<TokenSink>, Arc<Notify>) {
        let release = Arc::new(Notify::new());
        let issuer = Arc::new(GatedIssuer {
            release: release.clone(),
            answer,
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(TokenSink::default());
        let gate = Arc::new(AuthGate::new(issuer.clone(), store.clone()));
        (gate, issuer, store, release)
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_flow() {
        let (gate, issuer, store, release) = gate(Some(token()));
        let resumed = Arc::new(AtomicUsize::new(0));

        let mut waiters = Vec::new();
        for _ in 0..3 {
            let gate = gate.clone();
            let resumed = resumed.clone();
            waiters.push(tokio::spawn(async move {
                gate.with_auth(|| async move {
                    resumed.fetch_add(1, Ordering::SeqCst);
                })
                .await
            }));
        }
        while issuer.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        // give the other waiters a chance to join
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        release.notify_one();
        for waiter in waiters {
            assert_eq!(waiter.await.unwrap().unwrap(), Some(()));
        }

        assert_eq!(issuer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(gate.flows_started(), 1);
        assert_eq!(resumed.load(Ordering::SeqCst), 3);
        assert_eq!(*store.installed.lock(), vec!["t-1".to_string()]);
    }

    #[tokio::test]
    async fn abandoned_sign_in_skips_continuation() {
        let (gate, _issuer, store, release) = gate(None);
        release.notify_one();
        let ran = AtomicUsize::new(0);
        let counter = &ran;
        let result = gate
            .with_auth(|| async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
        assert_eq!(result, None);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert!(store.installed.lock().is_empty());
    }

    #[tokio::test]
    async fn dropped_waiter_does_not_pin_finished_flow() {
        let (gate, issuer, _store, release) = gate(Some(token()));
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.sign_in().await })
        };
        while issuer.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        waiter.abort();
        release.notify_one();
        while gate.is_signing_in() {
            tokio::task::yield_now().await;
        }

        release.notify_one();
        assert_eq!(gate.sign_in().await, SignIn::Authorized);
        assert_eq!(issuer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(gate.flows_started(), 2);
    }

    #[tokio::test]
    async fn finished_flow_is_not_reused() {
        let (gate, issuer, _store, release) = gate(Some(token()));
        release.notify_one();
        assert_eq!(gate.sign_in().await, SignIn::Authorized);
        release.notify_one();
        assert_eq!(gate.sign_in().await, SignIn::Authorized);
        assert_eq!(issuer.calls.load(Ordering::SeqCst), 2);
    }
}
