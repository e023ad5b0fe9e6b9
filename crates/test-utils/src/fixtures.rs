//! A sandwich whose bread slice comes from a store rather than from the
//! graph, used to exercise task groups.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use taskdag::exec::Inputs;
use taskdag::{Acquisition, NodeSpec};

use crate::recorder::render;

/// Hands out bread slices and counts how often it was asked.
#[derive(Debug, Clone)]
pub struct BreadStore {
    name: String,
    fetches: Arc<AtomicUsize>,
    delay: Option<Duration>,
    fail_with: Option<String>,
}

impl BreadStore {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fetches: Arc::new(AtomicUsize::new(0)),
            delay: None,
            fail_with: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.fail_with = Some(message.to_string());
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// A zero-argument producer suitable for `with_extra_acquisition`.
    pub fn fetcher(&self) -> impl Acquisition<String> + 'static {
        let store = self.clone();
        move || {
            let store = store.clone();
            async move {
                let n = store.fetches.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(delay) = store.delay {
                    tokio::time::sleep(delay).await;
                }
                if let Some(message) = &store.fail_with {
                    anyhow::bail!("{}: {}", store.name, message);
                }
                anyhow::Ok(format!("{}#{}", store.name, n))
            }
        }
    }
}

/// The sandwich node: waits for its declared dependencies, fetches a slice
/// from `store`, and combines both.
pub fn sandwich(key: &str, store: &BreadStore) -> NodeSpec<String> {
    NodeSpec::from_fn(key, |inputs: Inputs<String>| async move {
        let slice = inputs
            .acquired()
            .ok_or_else(|| anyhow::anyhow!("sandwich made without bread"))?;
        anyhow::ensure!(!slice.is_empty(), "empty slice");
        anyhow::Ok(render(inputs.key(), &inputs))
    })
    .with_extra_acquisition(store.fetcher())
}

/// Like [`sandwich`], but the slice may be shared with other sandwiches
/// using the same `share_key`.
pub fn shared_sandwich(key: &str, share_key: &str, store: &BreadStore) -> NodeSpec<String> {
    sandwich(key, store).with_shared_acquisition(share_key, store.fetcher())
}
