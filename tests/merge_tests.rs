use relgraph::{GraphError, GraphStore, MergeOptions, Properties};
use serde_json::json;

fn props(value: serde_json::Value) -> Properties {
    value.as_object().cloned().expect("object literal")
}

#[test]
fn test_merge_node_creates_then_matches() {
    let graph = GraphStore::open_in_memory().expect("graph");
    let matcher = props(json!({"name": "Acme"}));
    let base = props(json!({"name": "Acme", "size": 10}));
    let options = MergeOptions::new().on_match(props(json!({"size": 20})));

    let first = graph
        .merge_node("Company", &matcher, Some(&base), &MergeOptions::new())
        .expect("create");
    assert!(first.created);
    assert_eq!(first.value.property("size"), Some(&json!(10)));
    assert_eq!(first.value.property("name"), Some(&json!("Acme")));

    let second = graph
        .merge_node("Company", &matcher, Some(&base), &options)
        .expect("match");
    assert!(!second.created);
    assert_eq!(second.value.id, first.value.id);
    assert_eq!(second.value.property("size"), Some(&json!(20)));
    assert_eq!(second.value.property("name"), Some(&json!("Acme")));
    assert_eq!(graph.node_count().expect("count"), 1);
}

#[test]
fn test_merge_node_layers_base_and_on_create() {
    let graph = GraphStore::open_in_memory().expect("graph");
    let base = props(json!({"tier": "free", "region": "eu"}));
    let outcome = graph
        .merge_node(
            "Account",
            &props(json!({"email": "a@x"})),
            Some(&base),
            &MergeOptions::new().on_create(props(json!({"tier": "trial"}))),
        )
        .expect("merge");
    assert!(outcome.created);
    assert_eq!(
        outcome.value.properties,
        props(json!({"email": "a@x", "tier": "trial", "region": "eu"}))
    );
}

#[test]
fn test_merge_without_on_match_leaves_node_alone() {
    let graph = GraphStore::open_in_memory().expect("graph");
    let existing = graph
        .create_node("Company", props(json!({"name": "Acme", "size": 3})))
        .expect("create");
    let outcome = graph
        .merge_node("Company", &props(json!({"name": "Acme"})), None, &MergeOptions::default())
        .expect("merge");
    assert!(!outcome.created);
    assert_eq!(outcome.value, existing);
}

#[test]
fn test_merge_kind_scopes_the_match() {
    let graph = GraphStore::open_in_memory().expect("graph");
    graph
        .create_node("Person", props(json!({"name": "Acme"})))
        .expect("person");
    let outcome = graph
        .merge_node("Company", &props(json!({"name": "Acme"})), None, &MergeOptions::new())
        .expect("merge");
    assert!(outcome.created);
    assert_eq!(graph.node_count().expect("count"), 2);
}

#[test]
fn test_empty_match_criteria_is_rejected() {
    let graph = GraphStore::open_in_memory().expect("graph");
    let err = graph
        .merge_node("Company", &Properties::new(), None, &MergeOptions::new())
        .expect_err("empty match");
    assert!(matches!(err, GraphError::Validation(_)));
    assert_eq!(graph.node_count().expect("count"), 0);
}

#[test]
fn test_ambiguous_merge_reports_conflict_and_writes_nothing() {
    let graph = GraphStore::open_in_memory().expect("graph");
    let a = graph
        .create_node("Company", props(json!({"name": "Acme", "city": "Oslo"})))
        .expect("a");
    let b = graph
        .create_node("Company", props(json!({"name": "Acme", "city": "Rome"})))
        .expect("b");
    let err = graph
        .merge_node(
            "Company",
            &props(json!({"name": "Acme"})),
            None,
            &MergeOptions::new().on_match(props(json!({"touched": true}))),
        )
        .expect_err("conflict");
    match &err {
        GraphError::MergeConflict {
            kind,
            conflicting_ids,
            ..
        } => {
            assert_eq!(kind, "Company");
            assert_eq!(conflicting_ids, &vec![a.id, b.id]);
        }
        other => panic!("expected merge conflict, got {other:?}"),
    }
    assert!(err.to_string().contains("2 Company entities"));
    assert_eq!(graph.node_count().expect("count"), 2);
    assert!(graph.nodes("Company").where_eq("touched", true).exec().expect("query").is_empty());
}

#[test]
fn test_merge_edge_create_match_and_conflict() {
    let graph = GraphStore::open_in_memory().expect("graph");
    let a = graph.create_node("Person", Properties::new()).expect("a");
    let b = graph.create_node("Person", Properties::new()).expect("b");
    let options = MergeOptions::new()
        .on_create(props(json!({"since": 2020})))
        .on_match(props(json!({"seen": 2})));

    let created = graph
        .merge_edge(a.id, "KNOWS", b.id, None, &options)
        .expect("create");
    assert!(created.created);
    assert_eq!(created.value.properties, Some(props(json!({"since": 2020}))));

    let matched = graph
        .merge_edge(a.id, "KNOWS", b.id, None, &options)
        .expect("match");
    assert!(!matched.created);
    assert_eq!(matched.value.id, created.value.id);
    assert_eq!(
        matched.value.properties,
        Some(props(json!({"since": 2020, "seen": 2})))
    );

    // The opposite direction is a different triple.
    let reverse = graph
        .merge_edge(b.id, "KNOWS", a.id, None, &MergeOptions::new())
        .expect("reverse");
    assert!(reverse.created);
    assert_eq!(reverse.value.properties, None);

    graph.create_edge(a.id, "KNOWS", b.id, None).expect("parallel");
    let err = graph
        .merge_edge(a.id, "KNOWS", b.id, None, &options)
        .expect_err("conflict");
    assert!(matches!(err, GraphError::MergeConflict { ref conflicting_ids, .. } if conflicting_ids.len() == 2));
    assert_eq!(graph.edge_count().expect("count"), 3);
}

#[test]
fn test_merge_edge_requires_existing_endpoints() {
    let graph = GraphStore::open_in_memory().expect("graph");
    let a = graph.create_node("Person", Properties::new()).expect("a");
    let err = graph
        .merge_edge(a.id, "KNOWS", 404, None, &MergeOptions::new())
        .expect_err("missing endpoint");
    assert!(matches!(err, GraphError::Referential(_)));
    assert_eq!(graph.edge_count().expect("count"), 0);
}

#[test]
fn test_merges_are_counted_in_metrics() {
    let graph = GraphStore::open_in_memory().expect("graph");
    let matcher = props(json!({"name": "Acme"}));
    graph.merge_node("Company", &matcher, None, &MergeOptions::new()).expect("create");
    graph.merge_node("Company", &matcher, None, &MergeOptions::new()).expect("match");
    let snapshot = graph.metrics_snapshot();
    assert_eq!(snapshot.merges_created, 1);
    assert_eq!(snapshot.merges_matched, 1);
}
