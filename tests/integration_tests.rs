// tests/integration_tests.rs
//
// End-to-end: YAML configuration text in, canonical nodes and executable
// Polars expressions out.

use polars::prelude::*;

use sprig_lang::ast::Kind;
use sprig_lang::schema::Schema;
use sprig_lang::{Error, compiler, from_yaml, output, to_exprs};

fn run(config: &str, schema: &Schema, df: DataFrame) -> DataFrame {
    let exprs = to_exprs(config, Some(schema)).expect("pipeline failure");
    df.lazy()
        .with_columns(exprs.into_values().collect::<Vec<_>>())
        .collect()
        .expect("collect failure")
}

fn series(df: &DataFrame, name: &str) -> Series {
    df.column(name).unwrap().as_materialized_series().clone()
}

// ============================================================================
// Parse phase
// ============================================================================

#[test]
fn test_parse_addition_of_columns() {
    let schema = Schema::new([("col1", "int"), ("col2", "int")]).unwrap();
    let nodes = from_yaml("a: col1 + col2", Some(&schema)).unwrap();
    let expr = nodes["a"].as_expr().unwrap();
    assert_eq!(expr.kind(), Kind::Add);
    assert_eq!(expr.args()[0].as_column().unwrap().name(), "col1");
    assert_eq!(expr.args()[1].as_column().unwrap().name(), "col2");
}

#[test]
fn test_parse_bare_word_is_a_literal_without_schema() {
    let nodes = from_yaml("a: hello", None).unwrap();
    assert_eq!(nodes["a"].kind(), Kind::Literal);
}

#[test]
fn test_parse_mixed_config() {
    let config = "
a: col1 - col2
b: col3 as float
c: col1 if flag else col2
";
    let schema = Schema::new([
        ("col1", "int"),
        ("col2", "int"),
        ("col3", "str"),
        ("flag", "bool"),
    ])
    .unwrap();
    let nodes = from_yaml(config, Some(&schema)).unwrap();
    assert_eq!(nodes["a"].kind(), Kind::Subtract);
    assert_eq!(nodes["b"].kind(), Kind::Cast);
    assert_eq!(nodes["c"].kind(), Kind::Conditional);
}

#[test]
fn test_schema_validation_backfills_parsed_columns() {
    let schema = Schema::new([("col1", "int")]).unwrap();
    let nodes = from_yaml("a: col1", Some(&schema)).unwrap();
    assert_eq!(nodes["a"].as_column().unwrap().dtype(), Some("int"));
}

#[test]
fn test_unknown_column_fails_the_whole_call() {
    let schema = Schema::new([("col1", "int")]).unwrap();
    let err = from_yaml("a: col1 + @mystery", Some(&schema)).unwrap_err();
    assert!(matches!(err, Error::Schema(_)));
    assert!(err.to_string().contains("mystery"));
}

#[test]
fn test_non_mapping_config_rejected() {
    let err = from_yaml("- 1\n- 2", None).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_canonical_json_export() {
    let nodes = from_yaml("a: 1 + 2 * 3", None).unwrap();
    assert_eq!(
        output::to_json(&nodes["a"]).to_string(),
        r#"{"add":[1,{"multiply":[2,3]}]}"#
    );
}

// ============================================================================
// Execution
// ============================================================================

#[test]
fn test_arithmetic_and_shorthand_agree() {
    let schema = Schema::new([("col1", "int"), ("col2", "int")]).unwrap();
    let df = df!("col1" => &[1i64, 2], "col2" => &[3i64, 4]).unwrap();
    let out = run("a: col1 + col2\nb: add(col1, col2)", &schema, df);
    assert_eq!(
        series(&out, "a").i64().unwrap().to_vec(),
        series(&out, "b").i64().unwrap().to_vec()
    );
}

#[test]
fn test_boolean_coalesce_and_membership_config() {
    let config = "
a: flag1 and flag2
b: not flag1
c:
  - col1
  - col2
d:
  value_in_literal_set:
    value: col1
    set:
      literal: [1, 2]
e:
  value_in_range:
    value: col1
    min: 0
    max: 2
f:
  value_in_literal_set:
    value: col1
    set: [1, 2]
";
    let schema = Schema::new([
        ("flag1", "bool"),
        ("flag2", "bool"),
        ("col1", "int"),
        ("col2", "int"),
    ])
    .unwrap();
    let df = df!(
        "flag1" => &[true, false],
        "flag2" => &[true, true],
        "col1" => &[1i64, 3],
        "col2" => &[5i64, 6]
    )
    .unwrap();

    let out = run(config, &schema, df);
    assert_eq!(
        series(&out, "a").bool().unwrap().iter().collect::<Vec<_>>(),
        vec![Some(true), Some(false)]
    );
    assert_eq!(
        series(&out, "b").bool().unwrap().iter().collect::<Vec<_>>(),
        vec![Some(false), Some(true)]
    );
    assert_eq!(
        series(&out, "c").i64().unwrap().to_vec(),
        vec![Some(1), Some(3)]
    );
    assert_eq!(
        series(&out, "d").bool().unwrap().iter().collect::<Vec<_>>(),
        vec![Some(true), Some(false)]
    );
    assert_eq!(
        series(&out, "e").bool().unwrap().iter().collect::<Vec<_>>(),
        vec![Some(true), Some(false)]
    );
    // a bare YAML list as the set resolves through coalesce and still
    // lowers as a constant membership check
    assert_eq!(
        series(&out, "f").bool().unwrap().iter().collect::<Vec<_>>(),
        vec![Some(true), Some(false)]
    );
}

#[test]
fn test_regex_config() {
    let config = r"
a: extract /(\d+)/ from col1
b: match /foo/ against col2
c: not match /foo/ against col2
";
    let schema = Schema::new([("col1", "str"), ("col2", "str")]).unwrap();
    let df = df!(
        "col1" => &["abc123", "def456"],
        "col2" => &["foo", "bar"]
    )
    .unwrap();

    let out = run(config, &schema, df);
    assert_eq!(
        series(&out, "a").str().unwrap().get(0),
        Some("123")
    );
    assert_eq!(
        series(&out, "b").bool().unwrap().iter().collect::<Vec<_>>(),
        vec![Some(true), Some(false)]
    );
    assert_eq!(
        series(&out, "c").bool().unwrap().iter().collect::<Vec<_>>(),
        vec![Some(false), Some(true)]
    );
}

#[test]
fn test_string_interpolation_config() {
    let schema = Schema::new([("col1", "int")]).unwrap();
    let df = df!("col1" => &[1i64, 2]).unwrap();
    let out = run("a: f'hey {@col1}!'", &schema, df);
    assert_eq!(series(&out, "a").str().unwrap().get(0), Some("hey 1!"));
    assert_eq!(series(&out, "a").str().unwrap().get(1), Some("hey 2!"));
}

#[test]
fn test_expressions_are_aliased_to_result_names() {
    let exprs = to_exprs("total: 1 + 2", None).unwrap();
    let df = df!("x" => &[0i64]).unwrap();
    let out = df
        .lazy()
        .select(exprs.into_values().collect::<Vec<_>>())
        .collect()
        .unwrap();
    assert!(out.column("total").is_ok());
}

#[test]
fn test_lowering_failure_names_the_requirement() {
    // cast target resolved from a column: not literal-evaluable
    let schema = Schema::new([("col1", "int"), ("ty", "str")]).unwrap();
    let nodes = from_yaml("a:\n  cast:\n    - col1\n    - ty", Some(&schema)).unwrap();
    let err = compiler::compile_map(&nodes).unwrap_err();
    assert!(err.to_string().contains("literal-evaluate"));
}

// ============================================================================
// Whole-call failure (no partial success)
// ============================================================================

#[test]
fn test_one_bad_expression_fails_everything() {
    let config = "good: 1 + 2\nbad:\n  fake_node: [1, 2]";
    let err = from_yaml(config, None).unwrap_err();
    assert!(err.to_string().contains("fake_node"));
}
