// src/session/store_server.rs — Async message passing for TurnStore
//
// One task owns the SQLite connection and applies commands in arrival order,
// so appends and purges on the same key never interleave.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::{SessionKey, SessionStore, Turn, TurnMatcher, TurnStore, TurnTtl};
use crate::infra::errors::TripwiseError;

type Reply<T> = oneshot::Sender<Result<T, TripwiseError>>;

#[derive(Debug)]
pub enum StoreCommand {
    Append {
        key: SessionKey,
        turn: Turn,
        ttl: TurnTtl,
        resp: Reply<()>,
    },
    ReadAll {
        key: SessionKey,
        resp: Reply<Vec<Turn>>,
    },
    Purge {
        key: SessionKey,
        matcher: TurnMatcher,
        resp: Reply<usize>,
    },
    SweepExpired {
        resp: Reply<usize>,
    },
}

/// A handle to the TurnStore that uses message passing.
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<StoreCommand>,
}

impl StoreHandle {
    pub fn new(tx: mpsc::Sender<StoreCommand>) -> Self {
        Self { tx }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> StoreCommand,
    ) -> Result<T, TripwiseError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(build(resp_tx))
            .await
            .map_err(|_| TripwiseError::Store("store server is not running".into()))?;
        resp_rx
            .await
            .map_err(|_| TripwiseError::Store("store server dropped the request".into()))?
    }

    /// Remove every expired log.
    pub async fn sweep_expired(&self) -> Result<usize, TripwiseError> {
        self.request(|resp| StoreCommand::SweepExpired { resp }).await
    }
}

#[async_trait]
impl SessionStore for StoreHandle {
    async fn append(&self, key: &SessionKey, turn: Turn, ttl: TurnTtl) -> Result<(), TripwiseError> {
        let key = key.clone();
        self.request(|resp| StoreCommand::Append {
            key,
            turn,
            ttl,
            resp,
        })
        .await
    }

    async fn read_all(&self, key: &SessionKey) -> Result<Vec<Turn>, TripwiseError> {
        let key = key.clone();
        self.request(|resp| StoreCommand::ReadAll { key, resp }).await
    }

    async fn purge(&self, key: &SessionKey, matcher: TurnMatcher) -> Result<usize, TripwiseError> {
        let key = key.clone();
        self.request(|resp| StoreCommand::Purge { key, matcher, resp })
            .await
    }
}

/// Helper to spawn the store server and return a handle.
pub fn spawn_store_server(store: TurnStore) -> (StoreHandle, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(100);
    let handle = StoreHandle::new(tx);
    let join_handle = tokio::spawn(run_store_server(store, rx));
    (handle, join_handle)
}

/// The background task that owns the TurnStore.
pub async fn run_store_server(store: TurnStore, mut rx: mpsc::Receiver<StoreCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            StoreCommand::Append {
                key,
                turn,
                ttl,
                resp,
            } => {
                let res = store.append(&key, &turn, ttl);
                let _ = resp.send(res);
            }
            StoreCommand::ReadAll { key, resp } => {
                let res = store.read_all(&key);
                let _ = resp.send(res);
            }
            StoreCommand::Purge { key, matcher, resp } => {
                let res = store.purge(&key, &matcher);
                if let Ok(n) = &res {
                    tracing::debug!(session = %key, removed = n, "Purged turns");
                }
                let _ = resp.send(res);
            }
            StoreCommand::SweepExpired { resp } => {
                let res = store.sweep_expired();
                let _ = resp.send(res);
            }
        }
    }
    tracing::debug!("Store server stopped");
}
