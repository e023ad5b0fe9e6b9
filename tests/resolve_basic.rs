use std::time::Duration;

use taskdag::{Graph, Inputs, NodeSpec, NodeState, resolve, resolve_within};
use taskdag_test_utils::builders::{GraphBuilder, chain};
use taskdag_test_utils::recorder::Recorder;
use taskdag_test_utils::{init_tracing, with_timeout};

#[tokio::test]
async fn diamond_runs_in_dependency_order() {
    init_tracing();
    let rec = Recorder::new();
    let mut graph = GraphBuilder::new(&rec)
        .with_nodes(&["A", "B", "C"])
        .depends("B", "A")
        .depends("C", "A")
        .depends("C", "B")
        .build();

    let results = with_timeout(resolve(&mut graph)).await.unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results["A"], "A()");
    assert_eq!(results["B"], "B(A())");
    assert_eq!(results["C"], "C(A(),B(A()))");

    assert!(rec.finished_at("A").unwrap() < rec.started_at("B").unwrap());
    assert!(rec.finished_at("B").unwrap() < rec.started_at("C").unwrap());
    assert_eq!(rec.started(), vec!["A", "B", "C"]);

    for key in ["A", "B", "C"] {
        assert_eq!(graph.state_of(key), Some(NodeState::Completed));
        assert_eq!(graph.result_of(key), Some(&results[key]));
    }
}

#[tokio::test]
async fn empty_graph_resolves_to_nothing() {
    let mut graph: Graph<String> = Graph::new();
    let results = resolve(&mut graph).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn isolated_nodes_all_run_once() {
    init_tracing();
    let rec = Recorder::new();
    let mut graph = GraphBuilder::new(&rec).with_nodes(&["X", "Y", "Z"]).build();

    let results = with_timeout(resolve(&mut graph)).await.unwrap();

    assert_eq!(results.len(), 3);
    for key in ["X", "Y", "Z"] {
        assert_eq!(rec.start_count(key), 1);
        assert_eq!(results[key], format!("{key}()"));
    }
}

#[tokio::test]
async fn shared_node_runs_once_for_all_dependents() {
    let rec = Recorder::new();
    let mut graph = GraphBuilder::new(&rec).with_nodes(&["B", "C"]).build();
    graph.add_or_reuse(rec.node("shared"));
    graph.add_or_reuse(rec.node("shared"));
    graph.add_dependency("B", "shared").unwrap();
    graph.add_dependency("C", "shared").unwrap();

    let results = with_timeout(resolve(&mut graph)).await.unwrap();

    assert_eq!(rec.start_count("shared"), 1);
    assert_eq!(results["B"], "B(shared())");
    assert_eq!(results["C"], "C(shared())");
}

#[tokio::test]
async fn action_receives_exactly_its_dependencies() {
    init_tracing();
    let mut graph: Graph<u64> = Graph::new();
    graph
        .add_node(NodeSpec::from_fn("two", |_| async { anyhow::Ok(2) }))
        .unwrap();
    graph
        .add_node(NodeSpec::from_fn("three", |_| async { anyhow::Ok(3) }))
        .unwrap();
    graph
        .add_node(NodeSpec::from_fn("unrelated", |_| async { anyhow::Ok(100) }))
        .unwrap();
    graph
        .add_node(NodeSpec::from_fn("product", |inputs: Inputs<u64>| async move {
            anyhow::ensure!(inputs.dependencies().len() == 2, "unexpected inputs");
            anyhow::ensure!(inputs.get("unrelated").is_none(), "leaked input");
            let two = *inputs.require("two")?;
            let three = *inputs.require("three")?;
            anyhow::Ok(two * three)
        }))
        .unwrap();
    graph.add_dependency("product", "two").unwrap();
    graph.add_dependency("product", "three").unwrap();

    let results = with_timeout(resolve(&mut graph)).await.unwrap();
    assert_eq!(results["product"], 6);
    assert_eq!(results["unrelated"], 100);
}

#[tokio::test]
async fn requiring_an_undeclared_dependency_fails_the_node() {
    let mut graph: Graph<u64> = Graph::new();
    graph
        .add_node(NodeSpec::from_fn("lonely", |inputs: Inputs<u64>| async move {
            let value = *inputs.require("ghost")?;
            anyhow::Ok(value)
        }))
        .unwrap();

    let failure = resolve(&mut graph).await.unwrap_err();
    let err = failure.error_of("lonely").unwrap();
    assert!(err.to_string().contains("no dependency named 'ghost'"));
}

#[tokio::test]
async fn later_resolution_reuses_completed_results() {
    init_tracing();
    let rec = Recorder::new();
    let mut graph = GraphBuilder::new(&rec).with_node("A").build();
    with_timeout(resolve(&mut graph)).await.unwrap();

    graph.add_node(rec.node("B")).unwrap();
    graph.add_dependency("B", "A").unwrap();
    let results = with_timeout(resolve(&mut graph)).await.unwrap();

    assert_eq!(rec.start_count("A"), 1);
    assert_eq!(results.len(), 1);
    assert_eq!(results["B"], "B(A())");
}

#[tokio::test]
async fn resolve_within_completes_fast_graphs() {
    let rec = Recorder::new();
    let mut graph = chain(&rec, &["A", "B", "C"]);

    let results = resolve_within(&mut graph, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(results["C"], "C(B(A()))");
}
