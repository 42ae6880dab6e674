use std::sync::Arc;

use pathdb_core::{
    Binding, DirectedGraph, Edge, Error, GraphStore, Node, Options, UndirectedGraph, Value,
};
use tempfile::{TempDir, tempdir};

fn open(name: &str) -> (TempDir, DirectedGraph) {
    let dir = tempdir().unwrap();
    let graph = DirectedGraph::open(Options::new(dir.path().join(name))).unwrap();
    (dir, graph)
}

/// A -E-> B, A -E2-> C
fn fan_out() -> (TempDir, DirectedGraph) {
    let (dir, mut graph) = open("fan.redb");
    graph
        .set_nodes_bundle(&[
            Node::new("A").with_property("len", 3),
            Node::new("B").with_property("len", 1),
            Node::new("C").with_property("len", 5),
        ])
        .unwrap();
    graph
        .set_edges_bundle(&[
            Edge::new("E", "A", "B").with_property("w", 2.0f64),
            Edge::new("E2", "A", "C").with_property("w", 0.5f64),
        ])
        .unwrap();
    (dir, graph)
}

/// A -e-> B -e2-> C
fn chain() -> (TempDir, DirectedGraph) {
    let (dir, mut graph) = open("chain.redb");
    graph
        .set_nodes_bundle(&[Node::new("A"), Node::new("B"), Node::new("C")])
        .unwrap();
    graph
        .set_edges_bundle(&[Edge::new("e", "A", "B"), Edge::new("e2", "B", "C")])
        .unwrap();
    (dir, graph)
}

fn collect<S: GraphStore>(graph: &S, text: &str) -> Vec<Binding> {
    graph
        .query(text)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

fn node_ids(bindings: &[Binding], variable: &str) -> Vec<String> {
    bindings
        .iter()
        .map(|b| b.node(variable).unwrap().id.clone())
        .collect()
}

fn edge_ids(bindings: &[Binding], variable: &str) -> Vec<String> {
    bindings
        .iter()
        .map(|b| b.edge(variable).unwrap().id.clone())
        .collect()
}

#[test]
fn anchored_fan_out_yields_each_edge_in_order() {
    let (_dir, graph) = fan_out();
    let bindings = collect(&graph, r#"select (id="A")-[e]->(b) return e, b"#);

    assert_eq!(bindings.len(), 2);
    assert_eq!(edge_ids(&bindings, "e"), vec!["E", "E2"]);
    assert_eq!(node_ids(&bindings, "b"), vec!["B", "C"]);

    // Only returned variables are bound, in return order.
    let first = &bindings[0];
    assert_eq!(first.edges.keys().collect::<Vec<_>>(), vec!["e"]);
    assert_eq!(first.nodes.keys().collect::<Vec<_>>(), vec!["b"]);
    assert_eq!(first.edge("e").unwrap().property("w"), Some(&Value::Double(2.0)));
}

#[test]
fn two_hop_path_from_an_anchor() {
    let (_dir, graph) = chain();
    let bindings = collect(&graph, r#"select (id="A")-[:e]->()-[:e2]->(c) return c"#);
    assert_eq!(node_ids(&bindings, "c"), vec!["C"]);

    let bindings = collect(&graph, r#"select (id="B")-[x]->()-[y]->(c) return c"#);
    assert!(bindings.is_empty());
}

#[test]
fn anchor_at_the_far_end_walks_backwards() {
    let (_dir, graph) = chain();
    let bindings = collect(&graph, r#"select (a)-[p]->(b)-[q]->(id="C") return a, b, p"#);
    assert_eq!(node_ids(&bindings, "a"), vec!["A"]);
    assert_eq!(node_ids(&bindings, "b"), vec!["B"]);
    assert_eq!(edge_ids(&bindings, "p"), vec!["e"]);
}

#[test]
fn incoming_and_bidirectional_edges() {
    let (_dir, graph) = fan_out();

    let bindings = collect(&graph, r#"select (id="B")<-[e]-(x) return x"#);
    assert_eq!(node_ids(&bindings, "x"), vec!["A"]);

    let bindings = collect(&graph, r#"select (id="B")-[e]-(x) return x"#);
    assert_eq!(node_ids(&bindings, "x"), vec!["A"]);

    let bindings = collect(&graph, r#"select (id="B")-[e]->(x) return x"#);
    assert!(bindings.is_empty());

    // Both edges meet at A when walked against their direction.
    let bindings = collect(&graph, r#"select (id="B")-[p]-(hub)-[q]-(id="C") return hub, p, q"#);
    assert_eq!(node_ids(&bindings, "hub"), vec!["A"]);
    assert_eq!(edge_ids(&bindings, "p"), vec!["E"]);
    assert_eq!(edge_ids(&bindings, "q"), vec!["E2"]);
}

#[test]
fn anchored_edge_pins_both_ends() {
    let (_dir, graph) = fan_out();
    let bindings = collect(&graph, r#"select (a)-[id="E2"]->(b) return a, b"#);
    assert_eq!(node_ids(&bindings, "a"), vec!["A"]);
    assert_eq!(node_ids(&bindings, "b"), vec!["C"]);

    let bindings = collect(&graph, r#"select (a)<-[id="E2"]-(b) return a, b"#);
    assert_eq!(node_ids(&bindings, "a"), vec!["C"]);
    assert_eq!(node_ids(&bindings, "b"), vec!["A"]);

    assert!(collect(&graph, r#"select (a)-[id="missing"]->(b) return a"#).is_empty());
}

#[test]
fn unanchored_patterns_scan_the_store() {
    let (_dir, graph) = fan_out();

    let bindings = collect(&graph, "select (n) return n");
    assert_eq!(node_ids(&bindings, "n"), vec!["A", "B", "C"]);

    let bindings = collect(&graph, "select (x)-[e]->(y) return e");
    assert_eq!(edge_ids(&bindings, "e"), vec!["E", "E2"]);

    let bindings = collect(&graph, "select (x)-[e w>1]->(y) return x, y");
    assert_eq!(node_ids(&bindings, "x"), vec!["A"]);
    assert_eq!(node_ids(&bindings, "y"), vec!["B"]);
}

#[test]
fn node_predicates_filter_candidates() {
    let (_dir, graph) = fan_out();
    let bindings = collect(&graph, r#"select (id="A")-[e]->(b len>2) return b"#);
    assert_eq!(node_ids(&bindings, "b"), vec!["C"]);

    let bindings = collect(&graph, r#"select (n len<4) return n"#);
    assert_eq!(node_ids(&bindings, "n"), vec!["A", "B"]);

    assert!(collect(&graph, r#"select (a id="A" len=4) return a"#).is_empty());
}

#[test]
fn missing_anchor_yields_nothing() {
    let (_dir, graph) = fan_out();
    let iter = graph.query(r#"select (id="Z")-[e]->(b) return b"#).unwrap();
    assert!(iter.is_end());
    assert!(iter == graph.end());
}

#[test]
fn undirected_store_ignores_arrow_heads() {
    let dir = tempdir().unwrap();
    let mut graph = UndirectedGraph::open(Options::new(dir.path().join("u.redb"))).unwrap();
    graph
        .set_nodes_bundle(&[Node::new("a"), Node::new("b"), Node::new("c")])
        .unwrap();
    graph
        .set_edges_bundle(&[Edge::new("ab", "a", "b"), Edge::new("ca", "c", "a")])
        .unwrap();

    let bindings = collect(&graph, r#"select (id="a")-[e]->(x) return x"#);
    assert_eq!(node_ids(&bindings, "x"), vec!["b", "c"]);

    // Paths may walk the same edge twice: b-a-b comes back over `ab`.
    let bindings = collect(&graph, r#"select (id="b")-[p]-(y)-[q]-(z) return y, z"#);
    assert_eq!(node_ids(&bindings, "y"), vec!["a", "a"]);
    assert_eq!(node_ids(&bindings, "z"), vec!["b", "c"]);
}

#[test]
fn cursor_api_walks_to_the_end() {
    let (_dir, graph) = fan_out();
    let mut iter = graph.query(r#"select (id="A")-[e]->(b) return b"#).unwrap();

    assert!(!iter.is_end());
    assert_eq!(iter.get().unwrap().node("b").unwrap().id, "B");
    iter.advance().unwrap();
    assert_eq!(iter.get().unwrap().node("b").unwrap().id, "C");
    iter.advance().unwrap();
    assert!(iter.is_end());

    assert!(matches!(iter.get(), Err(Error::InvalidIteratorUse(_))));
    assert!(matches!(iter.advance(), Err(Error::InvalidIteratorUse(_))));
    assert!(iter == graph.end());
}

#[test]
fn end_iterators_compare_equal() {
    let (_dir, graph) = fan_out();
    assert!(graph.end() == graph.end());
    assert!(matches!(graph.end().get(), Err(Error::InvalidIteratorUse(_))));
    assert!(graph.end().next().is_none());

    let text = r#"select (id="A")-[e]->(b) return b"#;
    let mut first = graph.query(text).unwrap();
    let second = graph.query(text).unwrap();
    assert!(first == second);
    assert!(first != graph.end());

    first.advance().unwrap();
    assert!(first != second);

    let mut drained = graph.query(text).unwrap();
    while drained.next().is_some() {}
    assert!(drained == graph.end());
    assert!(drained.next().is_none());
}

#[test]
fn same_text_reuses_the_plan() {
    let (_dir, graph) = fan_out();
    let text = "select (n) return n";
    assert!(Arc::ptr_eq(&graph.plan(text).unwrap(), &graph.plan(text).unwrap()));

    let other = graph.plan("select (m) return m").unwrap();
    assert!(!Arc::ptr_eq(&graph.plan(text).unwrap(), &other));
}

#[test]
fn malformed_queries_report_where() {
    let (_dir, graph) = fan_out();
    match graph.query(r#"select (a)-[e]->(b) return a, zz"#) {
        Err(Error::Parse { message, .. }) => assert!(message.contains("zz")),
        other => panic!("expected a parse error, got {other:?}"),
    }
    match graph.query(r#"select (a)<-[e]->(b) return a"#) {
        Err(Error::Parse { nearby, .. }) => assert!(nearby.contains("<-[e]->")),
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn predicate_type_errors_surface_and_the_search_continues() {
    let (_dir, mut graph) = open("mixed.redb");
    graph
        .set_nodes_bundle(&[
            Node::new("A").with_property("len", 3),
            Node::new("B").with_property("len", true),
            Node::new("C").with_property("len", 5),
        ])
        .unwrap();

    let mut iter = graph.query("select (n len>2) return n").unwrap();
    assert_eq!(iter.next().unwrap().unwrap().node("n").unwrap().id, "A");
    assert!(matches!(
        iter.next(),
        Some(Err(Error::PredicateType { .. }))
    ));
    assert_eq!(iter.next().unwrap().unwrap().node("n").unwrap().id, "C");
    assert!(iter.next().is_none());

    // Error on the very first candidate comes straight out of `query`.
    assert!(matches!(
        graph.query(r#"select (n len="x") return n"#),
        Err(Error::PredicateType { .. })
    ));
}

#[test]
fn dangling_index_entries_do_not_match() {
    let (_dir, mut graph) = fan_out();
    // Index entries point at nodes that were never stored.
    graph.set_edge(&Edge::new("E3", "A", "ghost")).unwrap();

    let bindings = collect(&graph, r#"select (id="A")-[e]->(b) return e"#);
    assert_eq!(edge_ids(&bindings, "e"), vec!["E", "E2"]);
}

#[test]
fn numeric_looking_ids_anchor_and_filter() {
    let (_dir, mut graph) = open("numeric.redb");
    graph
        .set_nodes_bundle(&[Node::new("1"), Node::new("2"), Node::new("3")])
        .unwrap();
    graph
        .set_edges_bundle(&[Edge::new("10", "1", "2"), Edge::new("11", "1", "3")])
        .unwrap();

    let bindings = collect(&graph, "select (id=1)-[e]->(b) return e, b");
    assert_eq!(edge_ids(&bindings, "e"), vec!["10", "11"]);
    assert_eq!(node_ids(&bindings, "b"), vec!["2", "3"]);

    let bindings = collect(&graph, "select (a)-[e]->(b id=2) return a, e");
    assert_eq!(node_ids(&bindings, "a"), vec!["1"]);
    assert_eq!(edge_ids(&bindings, "e"), vec!["10"]);

    let bindings = collect(&graph, "select (a)-[e to=3]->(b) return e");
    assert_eq!(edge_ids(&bindings, "e"), vec!["11"]);
}

#[test]
fn edge_between_two_anchors_respects_direction() {
    let (_dir, mut graph) = open("parallel.redb");
    graph
        .set_nodes_bundle(&[Node::new("A"), Node::new("B"), Node::new("C")])
        .unwrap();
    graph
        .set_edges_bundle(&[
            Edge::new("p1", "A", "B"),
            Edge::new("p2", "A", "B"),
            Edge::new("q", "B", "A"),
            Edge::new("r", "A", "C"),
        ])
        .unwrap();

    let forward = collect(&graph, r#"select (id="A")-[e]->(id="B") return e"#);
    assert_eq!(edge_ids(&forward, "e"), vec!["p1", "p2"]);

    let backward = collect(&graph, r#"select (id="A")<-[e]-(id="B") return e"#);
    assert_eq!(edge_ids(&backward, "e"), vec!["q"]);

    let either = collect(&graph, r#"select (id="A")-[e]-(id="B") return e"#);
    assert_eq!(edge_ids(&either, "e"), vec!["p1", "p2", "q"]);
}
