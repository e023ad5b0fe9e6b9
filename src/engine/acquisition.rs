// src/engine/acquisition.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::dag::AcquisitionStep;
use crate::errors::NodeError;

type Slot<V> = watch::Receiver<Option<Result<V, NodeError>>>;

/// Runs the extra acquisition of task groups.
///
/// With sharing enabled, producers tagged with the same share key are
/// fetched once per resolution and every task group sees that one value
/// (or that one error). The shared fetch runs on its own task, so a sharer
/// that times out or is cancelled does not restart it for the others.
/// Untagged producers always run once per node, inside the node's task.
pub struct SharedAcquisitions<V> {
    enabled: bool,
    slots: Mutex<HashMap<String, Slot<V>>>,
    fetches: Mutex<Vec<AbortHandle>>,
}

impl<V: Clone + Send + Sync + 'static> SharedAcquisitions<V> {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            slots: Mutex::new(HashMap::new()),
            fetches: Mutex::new(Vec::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn acquire(&self, node: &str, step: &AcquisitionStep<V>) -> Result<V, NodeError> {
        let share_key = match (&step.share_key, self.enabled) {
            (Some(share_key), true) => share_key,
            _ => return fetch(node, step).await,
        };

        let mut slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            match slots.get(share_key) {
                Some(slot) => {
                    debug!(node = %node, share_key = %share_key, "reusing shared acquisition");
                    slot.clone()
                }
                None => {
                    let slot = self.spawn_fetch(node, share_key, step);
                    slots.insert(share_key.clone(), slot.clone());
                    slot
                }
            }
        };

        let settled = slot
            .wait_for(Option::is_some)
            .await
            .map(|outcome| (*outcome).clone())
            .ok()
            .flatten();

        settled.unwrap_or_else(|| {
            Err(NodeError::acquisition(anyhow::anyhow!(
                "shared acquisition '{share_key}' ended without a value"
            )))
        })
    }

    fn spawn_fetch(&self, node: &str, share_key: &str, step: &AcquisitionStep<V>) -> Slot<V> {
        let (tx, rx) = watch::channel(None);
        let producer = Arc::clone(&step.producer);
        debug!(node = %node, share_key = %share_key, "starting shared acquisition");

        let handle = tokio::spawn(async move {
            let outcome = producer.fetch().await.map_err(NodeError::acquisition);
            tx.send_replace(Some(outcome));
        });

        self.fetches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(handle.abort_handle());
        rx
    }
}

// Shared fetches never outlive the resolution that started them.
impl<V> Drop for SharedAcquisitions<V> {
    fn drop(&mut self) {
        let fetches = self.fetches.get_mut().unwrap_or_else(|e| e.into_inner());
        for fetch in fetches.drain(..) {
            fetch.abort();
        }
    }
}

async fn fetch<V>(node: &str, step: &AcquisitionStep<V>) -> Result<V, NodeError> {
    debug!(node = %node, share_key = ?step.share_key, "running extra acquisition");
    step.producer.fetch().await.map_err(NodeError::acquisition)
}
