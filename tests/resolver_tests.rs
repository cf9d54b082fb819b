// tests/resolver_tests.rs
//
// Multi-form canonicalization: every surface form of a node resolves to
// the same AST, and everything that is not a form of exactly one node
// fails with a diagnostic worth reading.

use std::collections::BTreeMap;

use sprig_lang::ast::{Kind, LiteralValue, Node};
use sprig_lang::registry::Registry;
use sprig_lang::resolver::{ResolveError, Resolver};
use sprig_lang::schema::Schema;
use sprig_lang::value::{RawValue, Scalar};

fn resolve(raw: &RawValue) -> Node {
    Resolver::new(Registry::builtin())
        .resolve(raw)
        .expect("resolve failure")
}

fn resolve_err(raw: &RawValue) -> ResolveError {
    Resolver::new(Registry::builtin())
        .resolve(raw)
        .expect_err("expected resolve failure")
}

fn map(entries: Vec<(&str, RawValue)>) -> RawValue {
    RawValue::Map(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

// ============================================================================
// POD values resolve to literals
// ============================================================================

#[test]
fn test_pod_scalars_resolve_to_equal_literals() {
    let cases = vec![
        Scalar::Null,
        Scalar::Bool(true),
        Scalar::Int(-7),
        Scalar::Float(2.5),
    ];
    for scalar in cases {
        let node = resolve(&RawValue::Scalar(scalar.clone()));
        assert_eq!(node.literal_scalar(), Some(&scalar));
    }
}

#[test]
fn test_set_literal_short_form() {
    let raw = RawValue::short_form(
        "literal",
        RawValue::List(vec![RawValue::int(1), RawValue::int(2)]),
    );
    let node = resolve(&raw);
    match node.as_literal().unwrap().value() {
        LiteralValue::List(items) => assert_eq!(items.len(), 2),
        other => panic!("expected set literal, got {:?}", other),
    }
}

// ============================================================================
// Form equivalence
// ============================================================================

#[test]
fn test_short_and_resolved_forms_are_equivalent() {
    let short = RawValue::short_form(
        "add",
        RawValue::List(vec![RawValue::int(1), RawValue::int(2)]),
    );
    let resolved = RawValue::short_form(
        "expression",
        map(vec![
            ("type", RawValue::str("add")),
            (
                "arguments",
                RawValue::List(vec![RawValue::int(1), RawValue::int(2)]),
            ),
        ]),
    );
    assert_eq!(resolve(&short), resolve(&resolved));
}

#[test]
fn test_keyword_forms_are_equivalent() {
    let short = RawValue::short_form(
        "conditional",
        map(vec![
            ("when", RawValue::Scalar(Scalar::Bool(true))),
            ("then", RawValue::int(1)),
        ]),
    );
    let resolved = RawValue::short_form(
        "expression",
        map(vec![
            ("type", RawValue::str("conditional")),
            (
                "arguments",
                map(vec![
                    ("when", RawValue::Scalar(Scalar::Bool(true))),
                    ("then", RawValue::int(1)),
                ]),
            ),
        ]),
    );
    assert_eq!(resolve(&short), resolve(&resolved));
}

#[test]
fn test_class_form_passes_through() {
    let node = Node::expr(Kind::Add, vec![Node::int(1), Node::int(2)]).unwrap();
    let resolved = resolve(&RawValue::Node(node.clone()));
    assert_eq!(resolved, node);
}

#[test]
fn test_class_form_nested_in_arguments() {
    let inner = Node::int(2);
    let raw = RawValue::short_form(
        "add",
        RawValue::List(vec![RawValue::int(1), RawValue::Node(inner)]),
    );
    let node = resolve(&raw);
    let expr = node.as_expr().unwrap();
    assert_eq!(expr.args().len(), 2);
}

// ============================================================================
// Round-trip through canonical export
// ============================================================================

#[test]
fn test_round_trip_structural_equality() {
    let sources = vec![
        RawValue::int(42),
        RawValue::short_form(
            "add",
            RawValue::List(vec![
                RawValue::int(1),
                RawValue::short_form(
                    "multiply",
                    RawValue::List(vec![RawValue::int(2), RawValue::int(3)]),
                ),
            ]),
        ),
        RawValue::short_form(
            "conditional",
            map(vec![
                ("when", RawValue::Scalar(Scalar::Bool(false))),
                ("then", RawValue::int(1)),
                ("otherwise", RawValue::int(0)),
            ]),
        ),
        RawValue::short_form("column", map(vec![
            ("name", RawValue::str("age")),
            ("type", RawValue::str("int")),
        ])),
    ];
    for raw in sources {
        let node = resolve(&raw);
        let round_tripped = resolve(&node.to_raw());
        assert_eq!(node, round_tripped, "round trip changed {:?}", node);
    }
}

// ============================================================================
// Strings route through the grammar
// ============================================================================

#[test]
fn test_string_input_parses_as_expression() {
    let node = resolve(&RawValue::str("1 + 2 * 3"));
    assert_eq!(node.kind(), Kind::Add);
}

#[test]
fn test_nested_strings_parse_too() {
    let raw = RawValue::short_form(
        "add",
        RawValue::List(vec![RawValue::str("1 * 2"), RawValue::str("2 - 3")]),
    );
    let node = resolve(&raw);
    let expr = node.as_expr().unwrap();
    assert_eq!(expr.args()[0].kind(), Kind::Multiply);
    assert_eq!(expr.args()[1].kind(), Kind::Subtract);
}

#[test]
fn test_unparseable_string_falls_back_to_literal() {
    let node = resolve(&RawValue::str("just some words"));
    assert_eq!(
        node.literal_scalar(),
        Some(&Scalar::Str("just some words".to_string()))
    );
}

#[test]
fn test_schema_turns_names_into_columns() {
    let schema = Schema::new([("col1", "int")]).unwrap();
    let registry = Registry::builtin();
    let resolver = Resolver::with_schema(registry, &schema);

    let known = resolver.resolve(&RawValue::str("col1")).unwrap();
    assert_eq!(known.as_column().unwrap().name(), "col1");

    let unknown = resolver.resolve(&RawValue::str("hello")).unwrap();
    assert_eq!(
        unknown.literal_scalar(),
        Some(&Scalar::Str("hello".to_string()))
    );
}

#[test]
fn test_bare_list_resolves_to_coalesce() {
    let raw = RawValue::List(vec![RawValue::str("@col1"), RawValue::str("@col2")]);
    let node = resolve(&raw);
    assert_eq!(node.kind(), Kind::Coalesce);
}

// ============================================================================
// Failure modes
// ============================================================================

#[test]
fn test_unknown_key_reports_no_match() {
    let raw = RawValue::short_form(
        "fake_node",
        RawValue::List(vec![RawValue::int(1), RawValue::int(2)]),
    );
    let err = resolve_err(&raw);
    match &err {
        ResolveError::NoMatch { value, attempts } => {
            assert!(value.contains("fake_node"));
            assert!(attempts.is_empty());
        }
        other => panic!("expected NoMatch, got {:?}", other),
    }
}

#[test]
fn test_two_key_mapping_is_no_match_not_a_guess() {
    let raw = map(vec![
        ("col1", RawValue::str("foo")),
        ("str", RawValue::str("bar")),
    ]);
    assert!(matches!(resolve_err(&raw), ResolveError::NoMatch { .. }));
}

#[test]
fn test_nested_failure_names_the_attempted_candidate() {
    let raw = RawValue::short_form(
        "add",
        RawValue::List(vec![
            RawValue::int(1),
            RawValue::short_form("fake_node", RawValue::List(vec![])),
        ]),
    );
    let err = resolve_err(&raw);
    let rendered = err.to_string();
    assert!(rendered.contains("no matching node found"));
    assert!(rendered.contains("- add:"));
    assert!(rendered.contains("fake_node"));
}

#[test]
fn test_arity_failure_surfaces_through_no_match() {
    // subtract with three arguments
    let raw = RawValue::short_form(
        "subtract",
        RawValue::List(vec![RawValue::int(1), RawValue::int(2), RawValue::int(3)]),
    );
    let rendered = resolve_err(&raw).to_string();
    assert!(rendered.contains("subtract"));
    assert!(rendered.contains("exactly two"));
}

#[test]
fn test_missing_keyword_failure() {
    let raw = RawValue::short_form("conditional", map(vec![("when", RawValue::int(1))]));
    let rendered = resolve_err(&raw).to_string();
    assert!(rendered.contains("then"));
}

#[test]
fn test_unexpected_keyword_failure() {
    let raw = RawValue::short_form(
        "conditional",
        map(vec![
            ("when", RawValue::int(1)),
            ("then", RawValue::int(2)),
            ("surprise", RawValue::int(3)),
        ]),
    );
    let rendered = resolve_err(&raw).to_string();
    assert!(rendered.contains("surprise"));
}

// ============================================================================
// Schema validation
// ============================================================================

#[test]
fn test_schema_validation_backfills_types() {
    let schema = Schema::new([("col1", "int")]).unwrap();
    let mut node = Node::column("col1").unwrap();
    sprig_lang::schema::validate(&mut node, &schema).unwrap();
    assert_eq!(node.as_column().unwrap().dtype(), Some("int"));
}

#[test]
fn test_schema_validation_rejects_unknown_column_with_path() {
    let schema = Schema::new([("col1", "int")]).unwrap();
    let mut nodes: BTreeMap<String, Node> = BTreeMap::new();
    nodes.insert(
        "a".to_string(),
        Node::expr(
            Kind::Add,
            vec![Node::column("col1").unwrap(), Node::column("mystery").unwrap()],
        )
        .unwrap(),
    );
    let err = sprig_lang::schema::validate_map(&mut nodes, &schema).unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains("mystery"));
    assert!(rendered.contains("a -> add[1]"), "got: {}", rendered);
}

#[test]
fn test_schema_validation_rejects_type_mismatch() {
    let schema = Schema::new([("col1", "int")]).unwrap();
    let mut node = Node::Column(
        sprig_lang::ast::Column::with_type("col1", "str").unwrap(),
    );
    let err = sprig_lang::schema::validate(&mut node, &schema).unwrap_err();
    assert!(err.to_string().contains("expected type 'int'"));
}

#[test]
fn test_schema_validation_accepts_alias_types() {
    // "int" and "integer" both mean Int32; declaring either is fine.
    let schema = Schema::new([("col1", "integer")]).unwrap();
    let mut node = Node::Column(
        sprig_lang::ast::Column::with_type("col1", "int").unwrap(),
    );
    sprig_lang::schema::validate(&mut node, &schema).unwrap();
}
