use dfglin::{
    AnalyzerOptions, DependencyGraph, LinearityPolicy, analyze_graph, build_graph, classify_all,
    parse,
};
use std::collections::BTreeMap;

fn analyze_edges(edges: &[(&str, &str)]) -> dfglin::GraphAnalysis {
    let graph = DependencyGraph::from_edges(edges.iter().copied());
    analyze_graph(&graph, &BTreeMap::new(), &AnalyzerOptions::default())
}

#[test]
fn test_three_node_cycle() {
    let analysis = analyze_edges(&[("a", "b"), ("b", "c"), ("c", "a")]);
    assert!(analysis.topo_order.is_empty());
    assert_eq!(analysis.kahn_resolved, 0);
    assert_eq!(analysis.cyclic_nodes, vec!["a", "b", "c"]);
    assert_eq!(analysis.sccs, vec![vec!["a", "b", "c"]]);
    assert!(!analysis.is_acyclic());
}

#[test]
fn test_acyclic_graph_fully_ordered() {
    let analysis = analyze_edges(&[("a", "c"), ("b", "c"), ("c", "d"), ("a", "d")]);
    assert_eq!(analysis.topo_order, vec!["a", "b", "c", "d"]);
    assert_eq!(analysis.kahn_resolved, 4);
    assert!(analysis.unresolved.is_empty());
    assert!(analysis.is_acyclic());
    assert_eq!(analysis.fan_in["d"], 2);
    assert_eq!(analysis.fan_out["a"], 2);
}

#[test]
fn test_two_cycles_in_sequence() {
    // (a <-> b) -> m -> (c <-> d) -> z
    let analysis = analyze_edges(&[
        ("a", "b"),
        ("b", "a"),
        ("b", "m"),
        ("m", "c"),
        ("c", "d"),
        ("d", "c"),
        ("d", "z"),
    ]);
    assert_eq!(analysis.sccs, vec![vec!["a", "b"], vec!["c", "d"]]);
    assert_eq!(analysis.topo_order, vec!["m", "z"]);
    assert_eq!(analysis.kahn_resolved, 0);
}

#[test]
fn test_primary_input_is_linear_leaf() {
    let text = "\
(Term name:in type:['Input'] msb:(IntConst 3) lsb:(IntConst 0))
(Bind dest:x tree:(Operator Plus Next:(Terminal in),(IntConst 1)))
(Bind dest:y tree:(Operator Sll Next:(Terminal x),(IntConst 2)))
(Bind dest:z tree:(Operator Times Next:(Terminal y),(Terminal in)))
";
    let dfg = parse(text).unwrap();
    let policy = LinearityPolicy::default();
    let verdicts = classify_all(&dfg.bindings, &policy);
    let graph = build_graph(&dfg.descriptors, &dfg.bindings);
    let analysis = analyze_graph(&graph, &verdicts, &AnalyzerOptions::default());

    assert_eq!(analysis.fan_in["in"], 0);
    assert_eq!(analysis.fan_out["in"], 2);
    assert_eq!(analysis.longest_linear_chain.length, 3);
    assert_eq!(analysis.longest_linear_chain.path, vec!["in", "x", "y"]);
}

#[test]
fn test_no_linear_nodes() {
    let text = "\
(Bind dest:x tree:(Operator And Next:(Terminal x2),(Terminal x3)))
(Bind dest:x2 tree:(Operator Or Next:(Terminal x),(Terminal x3)))
(Bind dest:x3 tree:(Operator Xor Next:(Terminal x),(Terminal x2)))
";
    let dfg = parse(text).unwrap();
    let verdicts = classify_all(&dfg.bindings, &LinearityPolicy::default());
    let graph = build_graph(&dfg.descriptors, &dfg.bindings);
    let analysis = analyze_graph(&graph, &verdicts, &AnalyzerOptions::default());
    assert_eq!(analysis.longest_linear_chain.length, 0);
    assert!(analysis.longest_linear_chain.path.is_empty());
    assert_eq!(analysis.sccs.len(), 1);
}

#[test]
fn test_linearity_filter_and_focus() {
    let text = "\
(Bind dest:s tree:(Operator Plus Next:(Terminal a),(Terminal b)))
(Bind dest:p tree:(Operator Times Next:(Terminal s),(Terminal b)))
(Bind dest:q tree:(Operator Minus Next:(Terminal p),(Terminal s)))
";
    let dfg = parse(text).unwrap();
    let verdicts = classify_all(&dfg.bindings, &LinearityPolicy::default());
    let graph = build_graph(&dfg.descriptors, &dfg.bindings);

    let linear = graph.filter_by_linearity(&verdicts, true);
    assert_eq!(linear.names().collect::<Vec<_>>(), vec!["s", "a", "b", "q"]);
    assert!(linear.contains_edge("s", "q"));
    assert!(!linear.contains_edge("p", "q"));

    let nonlinear = graph.filter_by_linearity(&verdicts, false);
    assert_eq!(nonlinear.names().collect::<Vec<_>>(), vec!["p"]);

    let focused = graph.focus("s", 1).unwrap();
    assert_eq!(
        focused.names().collect::<Vec<_>>(),
        vec!["s", "a", "b", "p", "q"]
    );
    let focused = graph.focus("p", 0).unwrap();
    assert_eq!(focused.names().collect::<Vec<_>>(), vec!["s", "b", "p"]);
}
