use relgraph::{GraphError, GraphStore, Properties, SortOrder};
use serde_json::json;

fn props(value: serde_json::Value) -> Properties {
    value.as_object().cloned().expect("object literal")
}

#[test]
fn test_single_knows_edge_yields_one_match() {
    let graph = GraphStore::open_in_memory().expect("graph");
    let ada = graph.create_node("Person", props(json!({"name": "Ada"}))).expect("ada");
    let bob = graph.create_node("Person", props(json!({"name": "Bob"}))).expect("bob");
    let edge = graph.create_edge(ada.id, "KNOWS", bob.id, None).expect("knows");

    let matches = graph
        .pattern()
        .start("p", "Person")
        .through("KNOWS", "out")
        .end("f", "Person")
        .exec()
        .expect("exec");
    assert_eq!(matches.len(), 1);
    let found = &matches[0];
    assert_eq!(found.get("p").map(|n| n.id), Some(ada.id));
    assert_eq!(found.get("f").map(|n| n.id), Some(bob.id));
    assert_eq!(found.get("f").and_then(|n| n.property("name")), Some(&json!("Bob")));
    assert_eq!(found.path_length, 1);
    assert_eq!(found.edges, vec![edge.id]);
}

#[test]
fn test_filters_and_operators_on_variables() {
    let graph = GraphStore::open_in_memory().expect("graph");
    let ada = graph.create_node("Person", props(json!({"name": "Ada", "age": 36}))).expect("ada");
    let bob = graph.create_node("Person", props(json!({"name": "Bob", "age": 17}))).expect("bob");
    let cyd = graph.create_node("Person", props(json!({"name": "Cyd", "age": 45}))).expect("cyd");
    let acme = graph.create_node("Company", props(json!({"name": "Acme"}))).expect("acme");
    for person in [&ada, &bob, &cyd] {
        graph.create_edge(person.id, "WORKS_AT", acme.id, None).expect("works");
    }
    let adults = graph
        .pattern()
        .start("p", "Person")
        .through("WORKS_AT", "out")
        .end("c", "Company")
        .where_var("p", props(json!({"age": {"$gte": 18}})))
        .where_var("c", props(json!({"name": "Acme"})))
        .order_by("p", "age", SortOrder::Desc)
        .exec()
        .expect("exec");
    let names: Vec<_> = adults
        .iter()
        .filter_map(|m| m.get("p").and_then(|n| n.property("name")).cloned())
        .collect();
    assert_eq!(names, vec![json!("Cyd"), json!("Ada")]);

    let excluded = graph
        .pattern()
        .start("p", "Person")
        .through("WORKS_AT", "out")
        .end("c", "Company")
        .where_var("p", props(json!({"name": {"$in": ["Bob", "Cyd"]}, "age": {"$ne": 17}})))
        .count()
        .expect("count");
    assert_eq!(excluded, 1);
}

#[test]
fn test_incoming_and_undirected_hops() {
    let graph = GraphStore::open_in_memory().expect("graph");
    let a = graph.create_node("Person", Properties::new()).expect("a");
    let b = graph.create_node("Person", Properties::new()).expect("b");
    graph.create_edge(a.id, "KNOWS", b.id, None).expect("edge");

    let incoming = graph
        .pattern()
        .start("x", "Person")
        .through("KNOWS", "in")
        .end("y", "Person")
        .exec()
        .expect("exec");
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].get("x").map(|n| n.id), Some(b.id));

    let either = graph
        .pattern()
        .start("x", "Person")
        .through("KNOWS", "both")
        .end("y", "Person")
        .count()
        .expect("count");
    assert_eq!(either, 2);
}

#[test]
fn test_two_hop_chain_with_select() {
    let graph = GraphStore::open_in_memory().expect("graph");
    let a = graph.create_node("Person", Properties::new()).expect("a");
    let b = graph.create_node("Person", Properties::new()).expect("b");
    let acme = graph.create_node("Company", Properties::new()).expect("acme");
    graph.create_edge(a.id, "KNOWS", b.id, None).expect("knows");
    graph.create_edge(b.id, "WORKS_AT", acme.id, None).expect("works");

    let matches = graph
        .pattern()
        .start("me", "Person")
        .through("KNOWS", "out")
        .node("friend", "Person")
        .through("WORKS_AT", "out")
        .end("company", "Company")
        .select(["me", "company"])
        .exec()
        .expect("exec");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].bindings.len(), 2);
    assert!(matches[0].get("friend").is_none());
    assert_eq!(matches[0].get("company").map(|n| n.id), Some(acme.id));
    assert_eq!(matches[0].path_length, 2);
    assert_eq!(matches[0].edges.len(), 2);
}

#[test]
fn test_mutual_knows_cycle_reported_once() {
    let graph = GraphStore::open_in_memory().expect("graph");
    let a = graph.create_node("Person", Properties::new()).expect("a");
    let b = graph.create_node("Person", Properties::new()).expect("b");
    let c = graph.create_node("Person", Properties::new()).expect("c");
    graph.create_edge(a.id, "KNOWS", b.id, None).expect("a->b");
    graph.create_edge(b.id, "KNOWS", a.id, None).expect("b->a");
    graph.create_edge(b.id, "KNOWS", c.id, None).expect("b->c");

    let mutual = graph
        .pattern()
        .start("x", "Person")
        .through("KNOWS", "out")
        .node("y", "Person")
        .through("KNOWS", "out")
        .end("x", None)
        .exec()
        .expect("exec");
    assert_eq!(mutual.len(), 1);
    assert_eq!(mutual[0].get("x").map(|n| n.id), Some(a.id));
    assert_eq!(mutual[0].get("y").map(|n| n.id), Some(b.id));
}

#[test]
fn test_same_type_hops_need_distinct_edges() {
    let graph = GraphStore::open_in_memory().expect("graph");
    let a = graph.create_node("Person", Properties::new()).expect("a");
    let b = graph.create_node("Person", Properties::new()).expect("b");
    let first = graph.create_edge(a.id, "T", b.id, None).expect("a-b");
    let back_and_forth = || {
        graph
            .pattern()
            .start("x", "Person")
            .through("T", "both")
            .node("y", "Person")
            .through("T", "both")
            .end("x", None)
    };
    assert_eq!(back_and_forth().count().expect("count"), 0);

    let second = graph.create_edge(b.id, "T", a.id, None).expect("b-a");
    let matches = back_and_forth().exec().expect("exec");
    assert_eq!(matches.len(), 1);
    let mut edges = matches[0].edges.clone();
    edges.sort_unstable();
    assert_eq!(edges, vec![first.id, second.id]);
}

#[test]
fn test_triangle_reported_once_per_direction_class() {
    let graph = GraphStore::open_in_memory().expect("graph");
    let ids: Vec<i64> = (0..3)
        .map(|_| graph.create_node("Person", Properties::new()).expect("node").id)
        .collect();
    graph.create_edge(ids[0], "KNOWS", ids[1], None).expect("0->1");
    graph.create_edge(ids[1], "KNOWS", ids[2], None).expect("1->2");
    graph.create_edge(ids[2], "KNOWS", ids[0], None).expect("2->0");

    let directed = graph
        .pattern()
        .start("a", "Person")
        .through("KNOWS", "out")
        .node("b", "Person")
        .through("KNOWS", "out")
        .node("c", "Person")
        .through("KNOWS", "out")
        .end("a", "Person");
    assert_eq!(directed.count().expect("count"), 1);

    let undirected = graph
        .pattern()
        .start("a", "Person")
        .through("KNOWS", "both")
        .node("b", "Person")
        .through("KNOWS", "both")
        .node("c", "Person")
        .through("KNOWS", "both")
        .end("a", "Person");
    let found = undirected.exec().expect("exec");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get("a").map(|n| n.id), Some(ids[0]));
}

#[test]
fn test_single_node_pattern_is_a_filtered_scan() {
    let graph = GraphStore::open_in_memory().expect("graph");
    graph.create_node("Person", props(json!({"age": 20}))).expect("young");
    let old = graph.create_node("Person", props(json!({"age": 70}))).expect("old");
    let pattern = graph
        .pattern()
        .start("p", "Person")
        .end("p", None)
        .where_var("p", props(json!({"age": {"$gt": 65}})));
    let found = pattern.exec().expect("exec");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get("p").map(|n| n.id), Some(old.id));
    assert_eq!(found[0].path_length, 0);
    assert!(found[0].edges.is_empty());
    let plan = pattern.explain().expect("explain");
    assert!(!plan.sql.contains("WITH"));
    assert_eq!(plan.join_order, vec!["n0"]);
}

#[test]
fn test_first_exists_and_pagination() {
    let graph = GraphStore::open_in_memory().expect("graph");
    let hub = graph.create_node("Person", Properties::new()).expect("hub");
    let mut friends = Vec::new();
    for _ in 0..4 {
        let friend = graph.create_node("Person", Properties::new()).expect("friend");
        graph.create_edge(hub.id, "KNOWS", friend.id, None).expect("edge");
        friends.push(friend.id);
    }
    let pattern = || {
        graph
            .pattern()
            .start("p", "Person")
            .through("KNOWS", "out")
            .end("f", "Person")
    };
    assert!(pattern().exists().expect("exists"));
    assert_eq!(pattern().count().expect("count"), 4);
    let first = pattern().first().expect("first").expect("some");
    assert_eq!(first.get("f").map(|n| n.id), Some(friends[0]));
    let page = pattern().limit(2).offset(1).exec().expect("page");
    let page_ids: Vec<_> = page.iter().filter_map(|m| m.get("f").map(|n| n.id)).collect();
    assert_eq!(page_ids, vec![friends[1], friends[2]]);
    assert!(!pattern().where_var("f", props(json!({"missing": 1}))).exists().expect("exists"));
}

#[test]
fn test_explain_reports_stages_without_executing() {
    let graph = GraphStore::open_in_memory().expect("graph");
    let plan = graph
        .pattern()
        .start("p", "Person")
        .through("KNOWS", "out")
        .node("f", "Person")
        .through("KNOWS", "out")
        .end("p", None)
        .explain()
        .expect("explain");
    assert_eq!(plan.join_order, vec!["n0", "h0", "n1", "h1"]);
    assert_eq!(plan.stages.len(), 4);
    assert!(plan.sql.starts_with("WITH n0 AS"));
    assert!(plan.sql.contains("h1.dst = n0.id"));
    assert!(plan.sql.contains("<="));
    assert_eq!(graph.node_count().expect("count"), 0);
}

#[test]
fn test_structural_errors_fail_before_io() {
    let graph = GraphStore::open_in_memory().expect("graph");
    let no_start = graph.pattern().through("KNOWS", "out").end("f", None).exec();
    assert!(matches!(no_start, Err(GraphError::Pattern(_))));
    let undeclared = graph
        .pattern()
        .start("p", None)
        .through("KNOWS", "out")
        .end("f", None)
        .select(["nobody"])
        .count();
    match undeclared {
        Err(GraphError::Pattern(message)) => assert!(message.contains("nobody")),
        other => panic!("expected pattern error, got {other:?}"),
    }
    let bad_operator = graph
        .pattern()
        .start("p", None)
        .end("p", None)
        .where_var("p", props(json!({"age": {"$regex": "1.*"}})))
        .exec();
    assert!(matches!(bad_operator, Err(GraphError::Validation(_))));
}
