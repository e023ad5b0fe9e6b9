use std::collections::HashSet;

use taskdag::{Graph, Inputs, NodeError, NodeSpec, NodeState, resolve};
use taskdag_test_utils::builders::{GraphBuilder, chain};
use taskdag_test_utils::recorder::Recorder;
use taskdag_test_utils::{init_tracing, with_timeout};

#[tokio::test]
async fn failing_dependency_short_circuits_dependent() {
    init_tracing();
    let rec = Recorder::new();
    let mut graph = GraphBuilder::new(&rec)
        .with_failing_node("A", "boom")
        .with_node("B")
        .depends("B", "A")
        .build();

    let failure = with_timeout(resolve(&mut graph)).await.unwrap_err();

    assert!(matches!(failure.error_of("A"), Some(NodeError::Action(_))));
    let b = failure.error_of("B").unwrap();
    assert_eq!(b.origin(), Some("A"));
    assert!(matches!(b.root_cause(), NodeError::Action(_)));
    assert!(b.to_string().contains("boom"));

    let source = std::error::Error::source(b).unwrap();
    assert_eq!(source.to_string(), "action failed: boom");

    assert!(rec.was_started("A"));
    assert!(!rec.was_started("B"));
    assert_eq!(graph.state_of("A"), Some(NodeState::Failed));
    assert_eq!(graph.state_of("B"), Some(NodeState::Failed));
    assert!(graph.error_of("B").unwrap().is_short_circuit());
    assert_eq!(failure.origins().collect::<Vec<_>>(), vec!["A"]);
}

#[tokio::test]
async fn short_circuit_reaches_every_transitive_dependent() {
    init_tracing();
    let rec = Recorder::new();
    let mut graph = GraphBuilder::new(&rec)
        .with_failing_node("A", "boom")
        .with_nodes(&["B", "C", "D"])
        .depends("B", "A")
        .depends("C", "B")
        .depends("D", "B")
        .depends("D", "C")
        .build();

    let failure = with_timeout(resolve(&mut graph)).await.unwrap_err();

    for key in ["B", "C", "D"] {
        let err = failure.error_of(key).unwrap();
        assert_eq!(err.origin(), Some("A"), "{key} should name A as origin");
        assert!(!rec.was_started(key));
    }
    assert_eq!(failure.failures.len(), 4);
    assert!(failure.completed.is_empty());
}

#[tokio::test]
async fn independent_branch_still_completes() {
    let rec = Recorder::new();
    let mut graph = GraphBuilder::new(&rec)
        .with_failing_node("A", "boom")
        .with_nodes(&["B", "X", "Y"])
        .depends("B", "A")
        .depends("Y", "X")
        .build();

    let failure = with_timeout(resolve(&mut graph)).await.unwrap_err();

    let failed: HashSet<&str> = failure.failed_keys().collect();
    assert_eq!(failed, HashSet::from(["A", "B"]));
    assert_eq!(failure.completed["Y"], "Y(X())");
    assert_eq!(graph.state_of("Y"), Some(NodeState::Completed));
}

#[tokio::test]
async fn every_failure_is_reported() {
    init_tracing();
    let rec = Recorder::new();
    let mut graph = GraphBuilder::new(&rec)
        .with_failing_node("P", "first")
        .with_failing_node("Q", "second")
        .with_nodes(&["P1", "Q1", "PQ"])
        .depends("P1", "P")
        .depends("Q1", "Q")
        .depends("PQ", "P")
        .depends("PQ", "Q")
        .build();

    let failure = with_timeout(resolve(&mut graph)).await.unwrap_err();

    let origins: HashSet<&str> = failure.origins().collect();
    assert_eq!(origins, HashSet::from(["P", "Q"]));
    assert_eq!(failure.failures.len(), 5);
    assert_eq!(failure.error_of("P1").unwrap().origin(), Some("P"));
    assert_eq!(failure.error_of("Q1").unwrap().origin(), Some("Q"));
    let pq = failure.error_of("PQ").unwrap().origin().unwrap();
    assert!(pq == "P" || pq == "Q");

    let rendered = failure.to_string();
    assert!(rendered.starts_with("5 node(s) failed"));
    assert!(rendered.contains("first"));
    assert!(rendered.contains("second"));
}

#[tokio::test]
async fn panicking_action_is_recorded_as_failure() {
    init_tracing();
    let rec = Recorder::new();
    let mut graph = GraphBuilder::new(&rec)
        .with_spec(NodeSpec::from_fn("P", |inputs: Inputs<String>| async move {
            if inputs.key() == "P" {
                panic!("kaboom");
            }
            anyhow::Ok(String::new())
        }))
        .with_node("after")
        .depends("after", "P")
        .build();

    let failure = with_timeout(resolve(&mut graph)).await.unwrap_err();

    let err = failure.error_of("P").unwrap();
    assert!(matches!(err, NodeError::Action(_)));
    assert!(err.to_string().contains("panicked"));
    assert_eq!(failure.error_of("after").unwrap().origin(), Some("P"));
    assert!(!rec.was_started("after"));
}

#[tokio::test]
async fn nodes_added_after_a_failure_are_short_circuited() {
    let rec = Recorder::new();
    let mut graph: Graph<String> = GraphBuilder::new(&rec)
        .with_failing_node("A", "boom")
        .build();
    with_timeout(resolve(&mut graph)).await.unwrap_err();

    graph.add_node(rec.node("late")).unwrap();
    graph.add_dependency("late", "A").unwrap();
    let failure = with_timeout(resolve(&mut graph)).await.unwrap_err();

    assert_eq!(failure.failures.len(), 1);
    assert_eq!(failure.error_of("late").unwrap().origin(), Some("A"));
    assert!(!rec.was_started("late"));
    assert_eq!(rec.start_count("A"), 1);
}

#[tokio::test]
async fn chain_failure_in_the_middle_keeps_upstream_results() {
    let rec = Recorder::new();
    let mut graph = chain(&rec, &["A", "B"]);
    graph.add_node(rec.failing_node("C", "mid")).unwrap();
    graph.add_node(rec.node("D")).unwrap();
    graph.add_dependency("C", "B").unwrap();
    graph.add_dependency("D", "C").unwrap();

    let failure = with_timeout(resolve(&mut graph)).await.unwrap_err();

    assert_eq!(failure.completed.len(), 2);
    assert_eq!(failure.completed["B"], "B(A())");
    assert_eq!(failure.error_of("D").unwrap().origin(), Some("C"));
    assert!(rec.was_started("C"));
    assert!(!rec.was_started("D"));
}
