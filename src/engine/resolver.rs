// src/engine/resolver.rs

use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ConfigFile;
use crate::dag::{Graph, Scheduler, SchedulerStep};
use crate::engine::context::ExecutionContext;
use crate::engine::{ResolveOptions, ResultMap};
use crate::errors::{NodeError, ResolveFailure};
use crate::exec::run_node;

/// Drives a [`Graph`] to completion.
///
/// The resolver is the single coordinator of a resolution: it owns the
/// [`Scheduler`] and is the only code that changes node state. Node work runs
/// on Tokio tasks and reports back through a `JoinSet`.
#[derive(Debug, Clone)]
pub struct Resolver {
    options: ResolveOptions,
    cancellation: CancellationToken,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(ResolveOptions::default())
    }
}

enum Wake<V> {
    Joined(Option<Result<(tokio::task::Id, Result<V, NodeError>), tokio::task::JoinError>>),
    Cancelled,
    DeadlineElapsed,
}

impl Resolver {
    pub fn new(options: ResolveOptions) -> Self {
        Self {
            options,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self::new(ResolveOptions::from(cfg))
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Token that cancels every resolution run by this resolver.
    ///
    /// Once cancelled it stays cancelled; later resolutions fail every node
    /// that has not started with [`NodeError::Cancelled`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Execute every node of `graph` that has not started yet.
    ///
    /// Returns all results, or every failure together with the results that
    /// did complete. Node state, results and errors stay recorded in the
    /// graph.
    pub async fn resolve<V>(&self, graph: &mut Graph<V>) -> Result<ResultMap<V>, ResolveFailure<V>>
    where
        V: Clone + Send + Sync + 'static,
    {
        let mut scheduler = Scheduler::new(graph, &self.options);
        let mut ctx = ExecutionContext::new(&self.options, self.cancellation.child_token());
        let mut tasks: JoinSet<Result<V, NodeError>> = JoinSet::new();
        let deadline = self.options.resolution_timeout.map(|d| Instant::now() + d);

        let step = scheduler.start();
        log_step(&step);

        loop {
            if ctx.cancellation_pending() {
                info!(in_flight = ctx.in_flight(), "resolution cancelled; no further dispatch");
                let step = scheduler.cancel_unstarted(NodeError::Cancelled);
                log_step(&step);
                ctx.mark_cancellation_applied();
            }

            if !ctx.is_cancelled() {
                self.dispatch_ready(&mut scheduler, &mut ctx, &mut tasks);
            }

            if tasks.is_empty() {
                if !scheduler.is_finished() {
                    error!("no node in flight but resolution unfinished; abandoning the rest");
                    let step = scheduler.abandon(NodeError::Cancelled);
                    log_step(&step);
                }
                break;
            }

            let wake = tokio::select! {
                joined = tasks.join_next_with_id() => Wake::Joined(joined),
                _ = ctx.cancellation().cancelled(), if !ctx.is_cancelled() => Wake::Cancelled,
                _ = sleep_until(deadline) => Wake::DeadlineElapsed,
            };

            match wake {
                Wake::Joined(Some(joined)) => self.handle_joined(&mut scheduler, &mut ctx, joined),
                Wake::Joined(None) | Wake::Cancelled => {}
                Wake::DeadlineElapsed => {
                    let limit = self.options.resolution_timeout.unwrap_or_default();
                    warn!(
                        timeout = ?limit,
                        in_flight = ctx.in_flight(),
                        "resolution deadline elapsed; aborting in-flight nodes"
                    );
                    tasks.shutdown().await;
                    let step = scheduler.abandon(NodeError::Timeout(limit));
                    log_step(&step);
                    break;
                }
            }
        }

        info!(
            peak_in_flight = ctx.peak_in_flight(),
            completed = scheduler.results().len(),
            failed = scheduler.failures().len(),
            "resolution finished"
        );
        scheduler.into_outcome()
    }

    fn dispatch_ready<V>(
        &self,
        scheduler: &mut Scheduler<'_, V>,
        ctx: &mut ExecutionContext<V>,
        tasks: &mut JoinSet<Result<V, NodeError>>,
    ) where
        V: Clone + Send + Sync + 'static,
    {
        while ctx.has_capacity() {
            let Some(node) = scheduler.dispatch_next() else {
                break;
            };

            let ix = node.index;
            let key = node.key.clone();
            let handle = tasks.spawn(run_node(
                node,
                ctx.shared_acquisitions(),
                ctx.cancellation().clone(),
            ));
            ctx.track(handle.id(), ix, key.clone());
            debug!(node = %key, in_flight = ctx.in_flight(), "node dispatched");
        }

        if scheduler.has_ready() {
            debug!(in_flight = ctx.in_flight(), "concurrency limit reached; ready nodes wait");
        }
    }

    fn handle_joined<V>(
        &self,
        scheduler: &mut Scheduler<'_, V>,
        ctx: &mut ExecutionContext<V>,
        joined: Result<(tokio::task::Id, Result<V, NodeError>), tokio::task::JoinError>,
    ) where
        V: Clone + Send + Sync + 'static,
    {
        let (id, outcome) = match joined {
            Ok((id, outcome)) => (id, outcome),
            Err(join_err) => {
                let outcome = if join_err.is_panic() {
                    Err(NodeError::action(anyhow::anyhow!("node action panicked")))
                } else {
                    Err(NodeError::Cancelled)
                };
                (join_err.id(), outcome)
            }
        };

        let Some((ix, key)) = ctx.untrack(id) else {
            warn!(task_id = %id, "joined task that is not tracked; ignoring");
            return;
        };

        // Work that finishes after cancellation is discarded.
        let outcome = if ctx.is_cancelled() {
            if outcome.is_ok() {
                debug!(node = %key, "discarding result of node finished after cancellation");
            }
            Err(NodeError::Cancelled)
        } else {
            outcome
        };

        let failed = outcome.is_err();
        let step = scheduler.complete_index(ix, outcome);
        log_step(&step);

        if failed && self.options.fail_fast && !ctx.is_cancelled() {
            info!(node = %key, "fail-fast: cancelling the rest of the resolution");
            ctx.cancellation().cancel();
        }
    }
}

fn log_step(step: &SchedulerStep) {
    if !step.newly_ready.is_empty() {
        debug!(nodes = ?step.newly_ready, "nodes ready");
    }
    if !step.newly_failed.is_empty() {
        debug!(nodes = ?step.newly_failed, "nodes failed");
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

/// Resolve `graph` with default options: unbounded concurrency, no
/// deadlines, no fail-fast.
pub async fn resolve<V>(graph: &mut Graph<V>) -> Result<ResultMap<V>, ResolveFailure<V>>
where
    V: Clone + Send + Sync + 'static,
{
    Resolver::default().resolve(graph).await
}

/// Resolve `graph`, failing any resolution that takes longer than `limit`.
pub async fn resolve_within<V>(
    graph: &mut Graph<V>,
    limit: Duration,
) -> Result<ResultMap<V>, ResolveFailure<V>>
where
    V: Clone + Send + Sync + 'static,
{
    Resolver::new(ResolveOptions {
        resolution_timeout: Some(limit),
        ..ResolveOptions::default()
    })
    .resolve(graph)
    .await
}
