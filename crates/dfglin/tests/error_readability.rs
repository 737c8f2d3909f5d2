use dfglin::{AnalyzerOptions, analyze, parse, parse_expression};
use insta::assert_snapshot;

#[test]
fn test_unbalanced_expression_readability() {
    let err = parse_expression("(Operator Plus Next:(Terminal a),(Terminal b)").unwrap_err();
    assert_snapshot!(err.to_string(), @"Malformed expression at byte 0: unbalanced parentheses in `(Operator Plus Next:(Terminal a),(Terminal b)`");
}

#[test]
fn test_long_span_is_shortened() {
    let err = parse_expression(
        "(Operator Plus Next:(Terminal alu.first_operand),(Operator Times Next:(Terminal alu.second_operand),(Terminal alu.third)",
    )
    .unwrap_err();
    assert_snapshot!(err.to_string(), @"Malformed expression at byte 0: unbalanced parentheses in `(Operator Plus Next:(Terminal alu.first_operand)...`");
}

#[test]
fn test_nested_error_points_at_operand() {
    let err = parse_expression("(Operator Plus Next:(Terminal a),(Terminal))").unwrap_err();
    assert_snapshot!(err.to_string(), @"Malformed expression at byte 33: missing terminal name in `(Terminal)`");
}

#[test]
fn test_missing_branch_condition_readability() {
    let err = parse_expression("(Branch True:(Terminal a))").unwrap_err();
    assert_snapshot!(err.to_string(), @"Malformed expression at byte 0: missing `Cond:` field in `(Branch True:(Terminal a))`");
}

#[test]
fn test_unknown_operator_readability() {
    let err = parse_expression("(Operator Frob Next:(Terminal a))").unwrap_err();
    assert_snapshot!(err.to_string(), @"Unknown operator kind `Frob` at byte 10");
}

#[test]
fn test_no_bindings_readability() {
    let err = analyze(
        "(Bind dest:y tree:(Pointer Var:(Terminal m) Ptr:(Terminal i)))\n",
        &AnalyzerOptions::default(),
    )
    .unwrap_err();
    assert_snapshot!(err.to_string(), @"No binding could be parsed: 1 of 1 bind entries failed (first: Unknown construct `Pointer` at byte 19)");
}

#[test]
fn test_rejected_entry_readability() {
    let dfg = parse("(Bind dest:a tree:(Terminal b))\n(Bind tree:(Terminal c))\n").unwrap();
    let rejected: Vec<String> = dfg.rejected.iter().map(ToString::to_string).collect();
    assert_snapshot!(rejected.join("\n"), @"Malformed binding at byte 32: missing `dest:` field");
}
