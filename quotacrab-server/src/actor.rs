//! Admission actors
//!
//! Requests for the same key are funnelled through one actor so they are
//! decided in arrival order. Keys are spread over several actors by hash,
//! which keeps unrelated keys from queueing behind each other. The store work
//! itself runs on the blocking pool since SQLite calls block the thread.

use crate::types::AdmitRequest;
use ahash::RandomState;
use anyhow::Result;
use quotacrab::{Admission, Decision, Store};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Message types for the admission actor
pub enum AdmissionMessage {
    Admit {
        request: AdmitRequest,
        response_tx: oneshot::Sender<Decision>,
    },
}

/// Handle to communicate with the admission actors
#[derive(Clone)]
pub struct AdmissionHandle {
    shards: Arc<[mpsc::Sender<AdmissionMessage>]>,
    hasher: RandomState,
}

impl AdmissionHandle {
    /// Decide whether a request is admitted
    ///
    /// # Errors
    ///
    /// Fails only when the actor serving the key is gone. Store failures come
    /// back as [`Decision::Error`].
    pub async fn admit(&self, request: AdmitRequest) -> Result<Decision> {
        let (response_tx, response_rx) = oneshot::channel();
        let shard = self.shard_for(request.key.as_deref());

        self.shards[shard]
            .send(AdmissionMessage::Admit {
                request,
                response_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("Admission actor has shut down"))?;

        response_rx
            .await
            .map_err(|_| anyhow::anyhow!("Admission actor dropped response channel"))
    }

    /// Number of actors behind this handle
    pub fn shards(&self) -> usize {
        self.shards.len()
    }

    fn shard_for(&self, key: Option<&str>) -> usize {
        match key {
            Some(key) => (self.hasher.hash_one(key) % self.shards.len() as u64) as usize,
            None => 0,
        }
    }
}

/// The admission actor
pub struct AdmissionActor;

impl AdmissionActor {
    /// Spawn `shards` actors sharing one admission engine
    pub fn spawn<S: Store + 'static>(
        shards: usize,
        buffer_size: usize,
        admission: Admission<S>,
    ) -> AdmissionHandle {
        let senders: Vec<_> = (0..shards.max(1))
            .map(|shard| {
                let (tx, rx) = mpsc::channel(buffer_size);
                tokio::spawn(run_actor(shard, rx, admission.clone()));
                tx
            })
            .collect();

        AdmissionHandle {
            shards: senders.into(),
            hasher: RandomState::new(),
        }
    }
}

async fn run_actor<S: Store + 'static>(
    shard: usize,
    mut rx: mpsc::Receiver<AdmissionMessage>,
    admission: Admission<S>,
) {
    while let Some(msg) = rx.recv().await {
        match msg {
            AdmissionMessage::Admit {
                request,
                response_tx,
            } => {
                let decision = handle_admit(&admission, request).await;
                // Ignore send errors - the caller may have gone away
                let _ = response_tx.send(decision);
            }
        }
    }

    tracing::info!(shard, "Admission actor shutting down");
}

async fn handle_admit<S: Store + 'static>(
    admission: &Admission<S>,
    request: AdmitRequest,
) -> Decision {
    let admission = admission.clone();
    tokio::task::spawn_blocking(move || admission.admit(request.key.as_deref(), request.now))
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "admission task failed");
            Decision::Error(format!("admission task failed: {e}"))
        })
}
