use dfglin::{
    AnalyzerOptions, Binding, DependencyGraph, ExpressionError, LinearityPolicy, LinearitySummary,
    Node, OperatorKind, Trigger, analyze_graph, classify, classify_all, parse_expression,
};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn arb_kind() -> impl Strategy<Value = OperatorKind> {
    prop::sample::select(OperatorKind::ALL.to_vec())
}

fn arb_leaf() -> impl Strategy<Value = Node> {
    prop_oneof![
        "[a-z]{1,3}(\\.[a-z]{1,3})?".prop_map(Node::terminal),
        (0u32..256).prop_map(|v| Node::constant(format!("8'd{v}"))),
    ]
}

fn arb_tree() -> impl Strategy<Value = Node> {
    arb_leaf().prop_recursive(4, 48, 4, |inner| {
        prop_oneof![
            (arb_kind(), prop::collection::vec(inner.clone(), 1..4))
                .prop_map(|(kind, operands)| Node::operator(kind, operands)),
            (inner.clone(), inner.clone(), prop::option::of(inner))
                .prop_map(|(c, t, f)| Node::branch(c, t, f)),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn test_classify_is_idempotent(tree in arb_tree()) {
        let policy = LinearityPolicy::default();
        prop_assert_eq!(classify(&tree, &policy), classify(&tree, &policy));
    }

    #[test]
    fn test_nonlinear_operand_poisons_parent(
        kind in arb_kind(),
        operands in prop::collection::vec(arb_tree(), 1..4),
    ) {
        let policy = LinearityPolicy::default();
        let any_nonlinear = operands.iter().any(|o| !classify(o, &policy).is_linear);
        let verdict = classify(&Node::operator(kind, operands), &policy);
        if any_nonlinear {
            prop_assert!(!verdict.is_linear);
        }
        if !policy.is_linear(kind) {
            prop_assert_eq!(verdict.trigger, Some(Trigger::Operator(kind)));
        }
    }

    #[test]
    fn test_branch_is_never_linear(
        cond in arb_leaf(),
        t in arb_leaf(),
        f in prop::option::of(arb_leaf()),
    ) {
        let verdict = classify(&Node::branch(cond, t, f), &LinearityPolicy::default());
        prop_assert!(!verdict.is_linear);
        prop_assert_eq!(verdict.trigger, Some(Trigger::Branch));
    }

    #[test]
    fn test_summary_ratio_bounds(
        entries in prop::collection::vec(prop::option::of(arb_tree()), 0..12),
    ) {
        let bindings: Vec<Binding> = entries
            .into_iter()
            .enumerate()
            .map(|(i, tree)| Binding {
                dest: format!("s{i}"),
                tree: tree.ok_or(ExpressionError::UnknownConstruct {
                    tag: "Pointer".to_string(),
                    offset: i,
                }),
            })
            .collect();
        let verdicts = classify_all(&bindings, &LinearityPolicy::default());
        let summary = LinearitySummary::from_verdicts(verdicts.values());

        prop_assert_eq!(summary.total, bindings.len());
        prop_assert_eq!(
            summary.linear_count + summary.nonlinear_count + summary.parse_error_count,
            summary.total
        );
        prop_assert!((0.0..=1.0).contains(&summary.linearity_ratio));
        prop_assert!((0.0..=1.0).contains(&summary.nonlinearity_ratio));
    }

    #[test]
    fn test_order_and_cycles_cover_every_node_once(
        edges in prop::collection::vec((0usize..8, 0usize..8), 0..24),
    ) {
        let names: Vec<(String, String)> = edges
            .iter()
            .map(|(a, b)| (format!("n{a}"), format!("n{b}")))
            .collect();
        let graph = DependencyGraph::from_edges(names.iter().map(|(a, b)| (a.as_str(), b.as_str())));
        let analysis = analyze_graph(&graph, &BTreeMap::new(), &AnalyzerOptions::default());

        let mut covered: Vec<&str> = analysis.topo_order.iter().map(String::as_str).collect();
        covered.extend(analysis.sccs.iter().flatten().map(String::as_str));
        covered.sort_unstable();
        let mut expected: Vec<&str> = graph.names().collect();
        expected.sort_unstable();
        prop_assert_eq!(covered, expected);

        for scc in &analysis.sccs {
            prop_assert!(scc.len() > 1);
        }
    }

    #[test]
    fn test_rendered_tree_parses_back(tree in arb_tree()) {
        let text = tree.to_string();
        prop_assert_eq!(parse_expression(&text), Ok(tree));
    }
}
