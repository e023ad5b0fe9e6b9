// src/exec/runner.rs

//! Execution of a single scheduled node.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::dag::ScheduledNode;
use crate::engine::SharedAcquisitions;
use crate::errors::NodeError;
use crate::exec::Inputs;

/// Run a scheduled node: extra acquisition (task groups only), then the
/// action, all under the node's deadline.
pub async fn run_node<V>(
    node: ScheduledNode<V>,
    shared: Arc<SharedAcquisitions<V>>,
    cancellation: CancellationToken,
) -> Result<V, NodeError>
where
    V: Clone + Send + Sync + 'static,
{
    let key = node.key.clone();
    let timeout = node.timeout;
    let work = run_node_inner(node, shared, cancellation);

    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, work).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(node = %key, timeout = ?limit, "node exceeded its deadline");
                Err(NodeError::Timeout(limit))
            }
        },
        None => work.await,
    };

    debug!(node = %key, success = outcome.is_ok(), "node work finished");
    outcome
}

async fn run_node_inner<V>(
    node: ScheduledNode<V>,
    shared: Arc<SharedAcquisitions<V>>,
    cancellation: CancellationToken,
) -> Result<V, NodeError>
where
    V: Clone + Send + Sync + 'static,
{
    let acquired = match &node.acquisition {
        Some(step) => Some(shared.acquire(&node.key, step).await?),
        None => None,
    };

    debug!(
        node = %node.key,
        dependencies = node.dependencies.len(),
        acquired = acquired.is_some(),
        "starting node action"
    );

    let inputs = Inputs::new(node.key, node.dependencies, acquired, cancellation);
    node.action.execute(inputs).await.map_err(NodeError::action)
}
