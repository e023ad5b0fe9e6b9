use std::num::NonZeroUsize;
use std::time::Duration;

use taskdag::{NodeError, NodeState, ResolveOptions, Resolver, resolve_within};
use taskdag_test_utils::builders::{GraphBuilder, chain};
use taskdag_test_utils::init_tracing;
use taskdag_test_utils::recorder::Recorder;
use tokio::time::Instant;

fn resolver(options: ResolveOptions) -> Resolver {
    Resolver::new(options)
}

#[tokio::test]
async fn fail_fast_stops_dispatch_of_ready_nodes() {
    init_tracing();
    let rec = Recorder::new();
    let mut graph = GraphBuilder::new(&rec)
        .with_failing_node("A", "boom")
        .with_nodes(&["B", "C"])
        .build();

    let failure = resolver(ResolveOptions {
        fail_fast: true,
        max_concurrency: NonZeroUsize::new(1),
        ..ResolveOptions::default()
    })
    .resolve(&mut graph)
    .await
    .unwrap_err();

    assert!(matches!(failure.error_of("A"), Some(NodeError::Action(_))));
    assert!(matches!(failure.error_of("B"), Some(NodeError::Cancelled)));
    assert!(matches!(failure.error_of("C"), Some(NodeError::Cancelled)));
    assert!(!rec.was_started("B"));
    assert!(!rec.was_started("C"));
}

#[tokio::test]
async fn without_fail_fast_independent_nodes_still_run() {
    let rec = Recorder::new();
    let mut graph = GraphBuilder::new(&rec)
        .with_failing_node("A", "boom")
        .with_nodes(&["B", "C"])
        .build();

    let failure = resolver(ResolveOptions {
        max_concurrency: NonZeroUsize::new(1),
        ..ResolveOptions::default()
    })
    .resolve(&mut graph)
    .await
    .unwrap_err();

    assert_eq!(failure.failures.len(), 1);
    assert_eq!(failure.completed.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn fail_fast_discards_in_flight_results() {
    init_tracing();
    let rec = Recorder::new();
    let mut graph = GraphBuilder::new(&rec)
        .with_failing_node("A", "boom")
        .with_spec(rec.cancellable_node("slow", Duration::from_secs(60)))
        .with_node("after")
        .depends("after", "slow")
        .build();

    let started = Instant::now();
    let failure = resolver(ResolveOptions {
        fail_fast: true,
        ..ResolveOptions::default()
    })
    .resolve(&mut graph)
    .await
    .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(60));
    assert!(rec.was_started("slow"));
    assert!(matches!(failure.error_of("slow"), Some(NodeError::Cancelled)));
    let after = failure.error_of("after").unwrap();
    assert_eq!(after.origin(), Some("slow"));
    assert!(matches!(after.root_cause(), NodeError::Cancelled));
    assert!(graph.result_of("slow").is_none());
}

#[tokio::test(start_paused = true)]
async fn external_cancellation_fails_unfinished_nodes() {
    init_tracing();
    let rec = Recorder::new();
    let mut graph = GraphBuilder::new(&rec)
        .with_node("done")
        .with_spec(rec.cancellable_node("A", Duration::from_secs(60)))
        .with_node("B")
        .depends("B", "A")
        .build();

    let resolver = Resolver::default();
    let token = resolver.cancellation_token();
    let (outcome, ()) = tokio::join!(resolver.resolve(&mut graph), async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let failure = outcome.unwrap_err();
    assert_eq!(failure.completed["done"], "done()");
    assert!(matches!(failure.error_of("A"), Some(NodeError::Cancelled)));
    assert_eq!(failure.error_of("B").unwrap().origin(), Some("A"));
    assert!(!rec.was_started("B"));
}

#[tokio::test]
async fn cancelled_resolver_starts_nothing() {
    let rec = Recorder::new();
    let mut graph = chain(&rec, &["A", "B"]);

    let resolver = Resolver::default();
    resolver.cancellation_token().cancel();
    let failure = resolver.resolve(&mut graph).await.unwrap_err();

    assert!(rec.started().is_empty());
    assert!(matches!(failure.error_of("A"), Some(NodeError::Cancelled)));
    assert_eq!(failure.error_of("B").unwrap().origin(), Some("A"));
}

#[tokio::test(start_paused = true)]
async fn node_timeout_fails_node_and_dependents() {
    init_tracing();
    let rec = Recorder::new();
    let mut graph = GraphBuilder::new(&rec)
        .with_spec(
            rec.slow_node("slow", Duration::from_secs(60))
                .with_timeout(Duration::from_millis(100)),
        )
        .with_slow_node("fine", Duration::from_millis(500))
        .with_node("after")
        .depends("after", "slow")
        .build();

    let failure = Resolver::default().resolve(&mut graph).await.unwrap_err();

    assert!(matches!(
        failure.error_of("slow"),
        Some(NodeError::Timeout(d)) if *d == Duration::from_millis(100)
    ));
    let after = failure.error_of("after").unwrap();
    assert!(matches!(after.root_cause(), NodeError::Timeout(_)));
    assert_eq!(failure.completed["fine"], "fine()");
    assert!(!rec.was_started("after"));
}

#[tokio::test(start_paused = true)]
async fn default_node_timeout_applies_to_nodes_without_their_own() {
    let rec = Recorder::new();
    let mut graph = GraphBuilder::new(&rec)
        .with_slow_node("slow", Duration::from_secs(10))
        .with_spec(
            rec.slow_node("patient", Duration::from_secs(2))
                .with_timeout(Duration::from_secs(5)),
        )
        .build();

    let failure = resolver(ResolveOptions {
        node_timeout: Some(Duration::from_secs(1)),
        ..ResolveOptions::default()
    })
    .resolve(&mut graph)
    .await
    .unwrap_err();

    assert!(matches!(failure.error_of("slow"), Some(NodeError::Timeout(_))));
    assert_eq!(failure.completed["patient"], "patient()");
}

#[tokio::test(start_paused = true)]
async fn resolution_deadline_fails_everything_unfinished() {
    init_tracing();
    let rec = Recorder::new();
    let mut graph = GraphBuilder::new(&rec)
        .with_slow_node("slow", Duration::from_secs(60))
        .with_node("after")
        .with_node("quick")
        .depends("after", "slow")
        .build();

    let started = Instant::now();
    let failure = resolve_within(&mut graph, Duration::from_millis(200))
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(failure.completed["quick"], "quick()");
    assert!(matches!(
        failure.error_of("slow"),
        Some(NodeError::Timeout(d)) if *d == Duration::from_millis(200)
    ));
    assert_eq!(failure.error_of("after").unwrap().origin(), Some("slow"));
    assert_eq!(graph.state_of("slow"), Some(NodeState::Failed));
}

#[tokio::test]
async fn pruning_drops_consumed_results_from_the_graph() {
    init_tracing();
    let rec = Recorder::new();
    let mut graph = chain(&rec, &["A", "B", "C"]);

    let results = resolver(ResolveOptions {
        prune_completed: true,
        ..ResolveOptions::default()
    })
    .resolve(&mut graph)
    .await
    .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results["C"], "C(B(A()))");
    assert_eq!(graph.len(), 1);
    assert!(graph.contains("C"));
    assert!(!graph.contains("A"));
}

#[tokio::test]
async fn pruning_keeps_results_still_needed() {
    let rec = Recorder::new();
    let mut graph = GraphBuilder::new(&rec)
        .with_nodes(&["A", "B", "C"])
        .depends("B", "A")
        .depends("C", "A")
        .depends("C", "B")
        .build();

    let results = resolver(ResolveOptions {
        prune_completed: true,
        max_concurrency: NonZeroUsize::new(1),
        ..ResolveOptions::default()
    })
    .resolve(&mut graph)
    .await
    .unwrap();

    assert_eq!(results["C"], "C(A(),B(A()))");
    assert_eq!(graph.keys().collect::<Vec<_>>(), vec!["C"]);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_resolve_future_cancels_unfinished_nodes() {
    init_tracing();
    let rec = Recorder::new();
    let mut graph = GraphBuilder::new(&rec)
        .with_node("quick")
        .with_slow_node("slow", Duration::from_secs(60))
        .with_node("after")
        .depends("after", "slow")
        .build();

    let resolver = Resolver::default();
    let outcome =
        tokio::time::timeout(Duration::from_millis(10), resolver.resolve(&mut graph)).await;
    assert!(outcome.is_err());

    assert_eq!(graph.state_of("quick"), Some(NodeState::Completed));
    assert_eq!(graph.state_of("slow"), Some(NodeState::Failed));
    assert!(matches!(graph.error_of("slow"), Some(NodeError::Cancelled)));
    let after = graph.error_of("after").unwrap();
    assert_eq!(after.origin(), Some("slow"));
    assert!(!rec.was_started("after"));

    // Nothing is left half-started for a later resolution.
    let again = resolver.resolve(&mut graph).await.unwrap();
    assert!(again.is_empty());

    graph.add_node(rec.node("late")).unwrap();
    graph.add_dependency("late", "slow").unwrap();
    let failure = resolver.resolve(&mut graph).await.unwrap_err();
    assert_eq!(failure.error_of("late").unwrap().origin(), Some("slow"));
}
