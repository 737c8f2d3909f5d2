use dfglin::{
    ConstantKind, EntryError, ExpressionError, Node, OperatorKind, ParserError, parse, parse_expression,
};

#[test]
fn test_commas_inside_operands_are_not_separators() {
    let tree = parse_expression(
        "(Operator Plus Next:(Concat Next:(Terminal a),(Terminal b)),(Operator Minus Next:(Terminal c),(IntConst 1)))",
    )
    .unwrap();
    let Node::Operator { kind, operands } = tree else {
        panic!("expected operator");
    };
    assert_eq!(kind, OperatorKind::Plus);
    assert_eq!(operands.len(), 2);
    assert_eq!(
        operands[0],
        Node::operator(
            OperatorKind::Concat,
            vec![Node::terminal("a"), Node::terminal("b")]
        )
    );
}

#[test]
fn test_branch_chain() {
    let tree = parse_expression(
        "(Branch Cond:(Terminal s0) True:(Terminal a) False:(Branch Cond:(Terminal s1) True:(Terminal b) False:(Terminal c)))",
    )
    .unwrap();
    assert_eq!(
        tree,
        Node::branch(
            Node::terminal("s0"),
            Node::terminal("a"),
            Some(Node::branch(
                Node::terminal("s1"),
                Node::terminal("b"),
                Some(Node::terminal("c"))
            ))
        )
    );
}

#[test]
fn test_empty_false_field_is_absent() {
    let tree = parse_expression("(Branch Cond:(Terminal s) True:(Terminal a) False:)").unwrap();
    assert_eq!(
        tree,
        Node::branch(Node::terminal("s"), Node::terminal("a"), None)
    );
}

#[test]
fn test_float_and_string_constants() {
    assert_eq!(
        parse_expression("(FloatConst 1.5)").unwrap(),
        Node::typed_constant(ConstantKind::Float, "1.5")
    );
    assert_eq!(
        parse_expression("(StringConst \"hi\")").unwrap(),
        Node::typed_constant(ConstantKind::String, "\"hi\"")
    );
}

#[test]
fn test_constant_tags_survive_rendering() {
    for text in ["(FloatConst 1.5)", "(StringConst \"hi\")", "(IntConst 4'd3)"] {
        assert_eq!(parse_expression(text).unwrap().to_string(), text);
    }
    // Misspelled integer tags come back in their canonical spelling.
    assert_eq!(
        parse_expression("(IntCost 1)").unwrap().to_string(),
        "(IntConst 1)"
    );
    assert_eq!(
        parse_expression("(IntCon st 1'b0)").unwrap().to_string(),
        "(IntConst 1'b0)"
    );
}

#[test]
fn test_operator_aliases() {
    let tree = parse_expression("(Operator GreaterEq Next:(Terminal a),(Terminal b))").unwrap();
    assert_eq!(
        tree,
        Node::operator(
            OperatorKind::Gte,
            vec![Node::terminal("a"), Node::terminal("b")]
        )
    );
}

#[test]
fn test_bad_trees_stay_per_binding() {
    let text = "\
(Bind dest:good tree:(Operator Plus Next:(Terminal a),(Terminal b)))
(Bind dest:trunc tree:(Operator Plus Next:(Terminal a),))
(Bind dest:unknown tree:(Pointer Var:(Terminal mem) Ptr:(Terminal a)))
(Bind dest:kind tree:(Operator Shuffle Next:(Terminal a)))
";
    let dfg = parse(text).unwrap();
    assert_eq!(dfg.bindings.len(), 4);
    assert_eq!(dfg.parsed_bindings().count(), 1);

    let errors: Vec<_> = dfg.failed_bindings().collect();
    assert!(matches!(
        errors[0],
        ("trunc", ExpressionError::MalformedExpression { .. })
    ));
    assert!(matches!(
        errors[1],
        ("unknown", ExpressionError::UnknownConstruct { .. })
    ));
    assert!(matches!(
        errors[2],
        ("kind", ExpressionError::UnknownOperatorKind { .. })
    ));
}

#[test]
fn test_stray_lines_and_unknown_sections() {
    let text = "\
# produced by dataflow analyzer
Directive:
Bind:
(Bind dest:y tree:(Terminal x))
Branch:
(Branch dest:y cond:(Terminal s))
";
    let dfg = parse(text).unwrap();
    assert_eq!(dfg.bindings.len(), 1);
    assert!(matches!(
        dfg.rejected.as_slice(),
        [EntryError::UnknownEntry { tag, .. }] if tag == "Branch"
    ));
}

#[test]
fn test_truncated_declaration() {
    let text = "\
(Term name:a type:['Input'] msb:(IntConst 3) lsb:(IntConst 0)
(Bind dest:y tree:(Terminal a))
";
    let dfg = parse(text).unwrap();
    assert!(dfg.descriptors.is_empty());
    assert!(matches!(
        dfg.rejected.as_slice(),
        [EntryError::MalformedDeclaration { offset: 0, .. }]
    ));
}

#[test]
fn test_only_failures_is_fatal() {
    let err = parse("(Bind dest:y tree:(Operator Plus Next:))\n").unwrap_err();
    assert!(matches!(
        err,
        ParserError::NoBindings {
            entries: 1,
            failed: 1,
            ..
        }
    ));
}

#[test]
fn test_non_ascii_names() {
    let dfg =
        parse("(Bind dest:sígnal tree:(Operator Plus Next:(Terminal ü),(Terminal b)))\n").unwrap();
    assert_eq!(
        dfg.binding("sígnal").unwrap().tree,
        Ok(Node::operator(
            OperatorKind::Plus,
            vec![Node::terminal("ü"), Node::terminal("b")]
        ))
    );
}
