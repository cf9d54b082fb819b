//! Lowering canonical AST nodes into Polars expressions.
//!
//! This is the only module that knows about the execution backend: it
//! consumes resolved [`Node`] trees and emits `polars::prelude::Expr`
//! values, plus the set of input columns each expression reads. The walk
//! is post-order, pure, and repeatable — the AST is never mutated.
//!
//! Some arguments must be known at compile time rather than per row: a
//! cast's target type, a regex pattern and group index, a strptime format,
//! a string-interpolation pattern, and range-inclusivity flags. These are
//! required to be `literal` nodes; anything else is reported as an unmet
//! literal-evaluation requirement naming the offending node.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use polars::prelude::{
    DataType, DatetimeArgs, Expr, NamedFrom, NULL, Series, StrptimeOptions, TimeUnit, coalesce,
    col, concat_str, datetime, lit, max_horizontal, min_horizontal, when,
};
use thiserror::Error;

use crate::ast::{ExprNode, Kind, Literal, LiteralValue, Node};
use crate::schema::{ColumnType, TYPE_NAMES, column_type};
use crate::value::Scalar;

/// Errors raised while lowering a node to a Polars expression.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompileError {
    /// A compile-time-constant argument was not a literal of the right
    /// shape
    #[error("'{key}' requires {argument} to literal-evaluate to {expected}; got {got}")]
    RequiresLiteral {
        key: &'static str,
        argument: &'static str,
        expected: &'static str,
        got: String,
    },

    /// Cast target is not in the fixed type table
    #[error("unsupported cast type '{type_name}'; supported: {}", TYPE_NAMES.join(", "))]
    UnsupportedCastType { type_name: String },

    /// A regex pattern failed to compile
    #[error("invalid regex pattern '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },

    /// Interpolation pattern placeholders do not line up with the fields
    #[error(
        "string_interpolate pattern has {placeholders} '{{}}' placeholder(s) but {fields} field(s)"
    )]
    PlaceholderMismatch { placeholders: usize, fields: usize },

    /// A set literal could not be turned into a series
    #[error("unsupported set literal: {reason}")]
    InvalidSet { reason: String },

    /// A node shape that construction should have ruled out
    #[error("'{key}' arguments malformed at lowering: {reason}")]
    Malformed { key: &'static str, reason: String },

    /// The backend rejected an expression
    #[error("backend error: {0}")]
    Backend(String),
}

/// A lowered expression plus the input columns it references.
#[derive(Debug, Clone)]
pub struct Lowered {
    pub expr: Expr,
    pub columns: BTreeSet<String>,
}

/// Lower a node and report the columns it reads.
pub fn lower(node: &Node) -> Result<Lowered, CompileError> {
    Ok(Lowered {
        expr: to_polars(node)?,
        columns: referenced_columns(node),
    })
}

/// Lower a mapping of result-name to node; each expression is aliased to
/// its result name.
pub fn compile_map(nodes: &BTreeMap<String, Node>) -> Result<BTreeMap<String, Expr>, CompileError> {
    let mut out = BTreeMap::new();
    for (name, node) in nodes {
        debug!("lowering expression '{}'", name);
        out.insert(name.clone(), to_polars(node)?.alias(name.as_str()));
    }
    Ok(out)
}

/// The set of columns a node's expression reads from its input frame.
pub fn referenced_columns(node: &Node) -> BTreeSet<String> {
    let mut columns = BTreeSet::new();
    collect_columns(node, &mut columns);
    columns
}

fn collect_columns(node: &Node, columns: &mut BTreeSet<String>) {
    match node {
        Node::Literal(_) => {}
        Node::Column(column) => {
            columns.insert(column.name().to_string());
        }
        Node::Expr(expr) => {
            for child in expr.args() {
                collect_columns(child, columns);
            }
            for child in expr.kwargs().values() {
                collect_columns(child, columns);
            }
        }
    }
}

/// Map an engine-neutral column type onto a Polars dtype.
pub fn dtype(ty: ColumnType) -> DataType {
    match ty {
        ColumnType::UInt8 => DataType::UInt8,
        ColumnType::UInt16 => DataType::UInt16,
        ColumnType::UInt32 => DataType::UInt32,
        ColumnType::UInt64 => DataType::UInt64,
        ColumnType::Int8 => DataType::Int8,
        ColumnType::Int16 => DataType::Int16,
        ColumnType::Int32 => DataType::Int32,
        ColumnType::Int64 => DataType::Int64,
        ColumnType::Float32 => DataType::Float32,
        ColumnType::Float64 => DataType::Float64,
        ColumnType::Boolean => DataType::Boolean,
        ColumnType::String => DataType::String,
        ColumnType::Date => DataType::Date,
        ColumnType::Datetime => DataType::Datetime(TimeUnit::Microseconds, None),
        ColumnType::Duration => DataType::Duration(TimeUnit::Microseconds),
        ColumnType::Time => DataType::Time,
    }
}

/// Convert a node to a Polars expression.
pub fn to_polars(node: &Node) -> Result<Expr, CompileError> {
    match node {
        Node::Literal(literal) => literal_expr(literal),
        Node::Column(column) => Ok(col(column.name())),
        Node::Expr(expr) => expr_to_polars(expr),
    }
}

fn literal_expr(literal: &Literal) -> Result<Expr, CompileError> {
    match literal.value() {
        LiteralValue::Scalar(scalar) => Ok(scalar_expr(scalar)),
        LiteralValue::List(items) => Ok(lit(series_from_scalars(items)?)),
    }
}

fn scalar_expr(scalar: &Scalar) -> Expr {
    match scalar {
        Scalar::Null => lit(NULL),
        Scalar::Bool(b) => lit(*b),
        Scalar::Int(n) => lit(*n),
        Scalar::Float(n) => lit(*n),
        Scalar::Str(s) => lit(s.clone()),
        Scalar::Timestamp(ts) => lit(*ts),
    }
}

/// Build a series for a set literal. Sets must be homogeneous, except
/// that mixed int/float sets widen to floats.
fn series_from_scalars(items: &[Scalar]) -> Result<Series, CompileError> {
    if items.is_empty() {
        return Err(CompileError::InvalidSet {
            reason: "set literal is empty".to_string(),
        });
    }

    if items.iter().all(|s| matches!(s, Scalar::Int(_))) {
        let values: Vec<i64> = items.iter().filter_map(Scalar::as_int).collect();
        return Ok(Series::new("".into(), values));
    }
    if items
        .iter()
        .all(|s| matches!(s, Scalar::Int(_) | Scalar::Float(_)))
    {
        let values: Vec<f64> = items
            .iter()
            .map(|s| match s {
                Scalar::Int(n) => *n as f64,
                Scalar::Float(n) => *n,
                _ => f64::NAN,
            })
            .collect();
        return Ok(Series::new("".into(), values));
    }
    if items.iter().all(|s| matches!(s, Scalar::Str(_))) {
        let values: Vec<&str> = items.iter().filter_map(Scalar::as_str).collect();
        return Ok(Series::new("".into(), values));
    }
    if items.iter().all(|s| matches!(s, Scalar::Bool(_))) {
        let values: Vec<bool> = items.iter().filter_map(Scalar::as_bool).collect();
        return Ok(Series::new("".into(), values));
    }

    Err(CompileError::InvalidSet {
        reason: format!(
            "elements must share a type (int, float, str, or bool); got [{}]",
            items
                .iter()
                .map(Scalar::type_name)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    })
}

fn expr_to_polars(expr: &ExprNode) -> Result<Expr, CompileError> {
    let args: Vec<Expr> = expr
        .args()
        .iter()
        .map(to_polars)
        .collect::<Result<_, _>>()?;

    match expr.kind() {
        Kind::Add => Ok(fold_binary(args, |a, b| a + b)),
        Kind::Subtract => binary(expr, args, |a, b| a - b),
        Kind::Multiply => Ok(fold_binary(args, |a, b| a * b)),
        // True division regardless of input dtype; bare `/` on two integer
        // expressions would truncate.
        Kind::Divide => binary(expr, args, |a, b| a.cast(DataType::Float64) / b),
        Kind::Negate => unary(expr, args, |a| -a),
        Kind::Mean => {
            let count = args.len();
            let sum = fold_binary(args, |a, b| a + b);
            Ok(sum / lit(count as f64))
        }
        Kind::Min => min_horizontal(&args).map_err(backend),
        Kind::Max => max_horizontal(&args).map_err(backend),

        Kind::And => Ok(fold_binary(args, |a, b| a.and(b))),
        Kind::Or => Ok(fold_binary(args, |a, b| a.or(b))),
        Kind::Not => unary(expr, args, |a| a.not()),

        Kind::Equal => binary(expr, args, |a, b| a.eq(b)),
        Kind::NotEqual => binary(expr, args, |a, b| a.neq(b)),
        Kind::GreaterThan => binary(expr, args, |a, b| a.gt(b)),
        Kind::LessThan => binary(expr, args, |a, b| a.lt(b)),
        Kind::GreaterThanOrEqual => binary(expr, args, |a, b| a.gt_eq(b)),
        Kind::LessThanOrEqual => binary(expr, args, |a, b| a.lt_eq(b)),

        Kind::Cast => lower_cast(expr, args),
        Kind::Coalesce => Ok(coalesce(&args)),
        Kind::Conditional => lower_conditional(expr),
        Kind::StringInterpolate => lower_interpolate(expr, args),
        Kind::RegexExtract => lower_regex_extract(expr),
        Kind::RegexMatch => lower_regex_match(expr),
        Kind::Strptime => lower_strptime(expr),
        Kind::ResolveTimestamp => lower_resolve_timestamp(expr),
        Kind::ValueInLiteralSet => lower_in_set(expr),
        Kind::ValueInRange => lower_in_range(expr),

        Kind::Literal | Kind::Column => Err(CompileError::Malformed {
            key: expr.kind().key(),
            reason: "terminal kind in operator node".to_string(),
        }),
    }
}

fn backend(err: polars::prelude::PolarsError) -> CompileError {
    CompileError::Backend(err.to_string())
}

fn fold_binary(args: Vec<Expr>, op: impl Fn(Expr, Expr) -> Expr) -> Expr {
    let mut iter = args.into_iter();
    let first = iter.next().unwrap_or_else(|| lit(NULL));
    iter.fold(first, op)
}

fn unary(
    node: &ExprNode,
    args: Vec<Expr>,
    op: impl FnOnce(Expr) -> Expr,
) -> Result<Expr, CompileError> {
    let mut iter = args.into_iter();
    match (iter.next(), iter.next()) {
        (Some(a), None) => Ok(op(a)),
        _ => Err(malformed(node, "expected exactly one argument")),
    }
}

fn binary(
    node: &ExprNode,
    args: Vec<Expr>,
    op: impl FnOnce(Expr, Expr) -> Expr,
) -> Result<Expr, CompileError> {
    let mut iter = args.into_iter();
    match (iter.next(), iter.next(), iter.next()) {
        (Some(a), Some(b), None) => Ok(op(a, b)),
        _ => Err(malformed(node, "expected exactly two arguments")),
    }
}

fn malformed(node: &ExprNode, reason: &str) -> CompileError {
    CompileError::Malformed {
        key: node.kind().key(),
        reason: reason.to_string(),
    }
}

fn required<'n>(node: &'n ExprNode, name: &'static str) -> Result<&'n Node, CompileError> {
    node.kwarg(name)
        .ok_or_else(|| malformed(node, &format!("missing keyword '{}'", name)))
}

// Literal-evaluation helpers: compile-time constants must be literal
// nodes.

fn literal_str<'n>(
    node: &'n ExprNode,
    argument: &'static str,
    value: &'n Node,
) -> Result<&'n str, CompileError> {
    value
        .literal_scalar()
        .and_then(Scalar::as_str)
        .ok_or_else(|| CompileError::RequiresLiteral {
            key: node.kind().key(),
            argument,
            expected: "a string",
            got: value.key().to_string(),
        })
}

fn literal_group_index(node: &ExprNode, value: &Node) -> Result<usize, CompileError> {
    value
        .literal_scalar()
        .and_then(Scalar::as_int)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| CompileError::RequiresLiteral {
            key: node.kind().key(),
            argument: "group_index",
            expected: "a non-negative integer",
            got: value.key().to_string(),
        })
}

fn literal_bool_or(
    node: &ExprNode,
    argument: &'static str,
    value: Option<&Node>,
    default: bool,
) -> Result<bool, CompileError> {
    match value {
        None => Ok(default),
        Some(value) => value.literal_scalar().and_then(Scalar::as_bool).ok_or_else(|| {
            CompileError::RequiresLiteral {
                key: node.kind().key(),
                argument,
                expected: "a boolean",
                got: value.key().to_string(),
            }
        }),
    }
}

fn checked_pattern(node: &ExprNode, value: &Node) -> Result<String, CompileError> {
    let pattern = literal_str(node, "pattern", value)?;
    regex::Regex::new(pattern).map_err(|err| CompileError::InvalidRegex {
        pattern: pattern.to_string(),
        message: err.to_string(),
    })?;
    Ok(pattern.to_string())
}

// Node-specific lowerings.

fn lower_cast(node: &ExprNode, args: Vec<Expr>) -> Result<Expr, CompileError> {
    let target = node.args().get(1).ok_or_else(|| {
        malformed(node, "expected exactly two arguments")
    })?;
    let type_name = literal_str(node, "its target type", target)?;
    let ty = column_type(type_name).ok_or_else(|| CompileError::UnsupportedCastType {
        type_name: type_name.to_string(),
    })?;
    let mut iter = args.into_iter();
    let input = iter
        .next()
        .ok_or_else(|| malformed(node, "expected exactly two arguments"))?;
    Ok(input.cast(dtype(ty)))
}

fn lower_conditional(node: &ExprNode) -> Result<Expr, CompileError> {
    let when_expr = to_polars(required(node, "when")?)?;
    let then_expr = to_polars(required(node, "then")?)?;
    let otherwise_expr = match node.kwarg("otherwise") {
        Some(otherwise) => to_polars(otherwise)?,
        None => lit(NULL),
    };
    Ok(when(when_expr).then(then_expr).otherwise(otherwise_expr))
}

fn lower_interpolate(node: &ExprNode, args: Vec<Expr>) -> Result<Expr, CompileError> {
    let pattern_node = node
        .args()
        .first()
        .ok_or_else(|| malformed(node, "missing pattern argument"))?;
    let pattern = literal_str(node, "its pattern", pattern_node)?;

    let mut fields = args.into_iter();
    fields.next(); // the pattern's own expression is unused

    let parts: Vec<&str> = pattern.split("{}").collect();
    let placeholders = parts.len() - 1;
    let field_exprs: Vec<Expr> = fields.collect();
    if placeholders != field_exprs.len() {
        return Err(CompileError::PlaceholderMismatch {
            placeholders,
            fields: field_exprs.len(),
        });
    }

    let mut pieces = Vec::new();
    let mut field_iter = field_exprs.into_iter();
    for (i, part) in parts.iter().enumerate() {
        if !part.is_empty() {
            pieces.push(lit(part.to_string()));
        }
        if i < placeholders {
            if let Some(field) = field_iter.next() {
                pieces.push(field);
            }
        }
    }
    Ok(concat_str(&pieces, "", false))
}

fn lower_regex_extract(node: &ExprNode) -> Result<Expr, CompileError> {
    let pattern = checked_pattern(node, required(node, "pattern")?)?;
    let group_index = match node.kwarg("group_index") {
        Some(value) => literal_group_index(node, value)?,
        None => 1,
    };
    let source = to_polars(required(node, "source")?)?;
    Ok(source.str().extract(lit(pattern), group_index))
}

fn lower_regex_match(node: &ExprNode) -> Result<Expr, CompileError> {
    let pattern = checked_pattern(node, required(node, "pattern")?)?;
    let source = to_polars(required(node, "source")?)?;
    Ok(source.str().contains(lit(pattern), true))
}

fn lower_strptime(node: &ExprNode) -> Result<Expr, CompileError> {
    let format = literal_str(node, "its format", required(node, "format")?)?.to_string();
    let source = to_polars(required(node, "source")?)?;
    let options = StrptimeOptions {
        format: Some(format.into()),
        ..Default::default()
    };
    Ok(source.str().strptime(
        DataType::Datetime(TimeUnit::Microseconds, None),
        options,
        lit("raise"),
    ))
}

fn lower_resolve_timestamp(node: &ExprNode) -> Result<Expr, CompileError> {
    let date = to_polars(required(node, "date")?)?;
    let clock = |name: &'static str| -> Result<Expr, CompileError> {
        match node.kwarg(name) {
            Some(value) => to_polars(value),
            None => Ok(lit(0)),
        }
    };

    let args = DatetimeArgs::new(
        date.clone().dt().year(),
        date.clone().dt().month(),
        date.dt().day(),
    )
    .with_hms(clock("hour")?, clock("minute")?, clock("second")?);
    Ok(datetime(args))
}

fn lower_in_set(node: &ExprNode) -> Result<Expr, CompileError> {
    let value = to_polars(required(node, "value")?)?;
    let set_node = required(node, "set")?;

    // The set is a compile-time constant: either a literal list, or (what
    // a bare YAML list resolves to) a coalesce whose arguments are all
    // scalar literals.
    let scalars: Option<Vec<Scalar>> = match set_node {
        Node::Literal(literal) => match literal.value() {
            LiteralValue::List(items) => Some(items.clone()),
            LiteralValue::Scalar(s) => Some(vec![s.clone()]),
        },
        Node::Expr(expr) if expr.kind() == Kind::Coalesce => expr
            .args()
            .iter()
            .map(|arg| arg.literal_scalar().cloned())
            .collect(),
        _ => None,
    };
    let scalars = scalars.ok_or_else(|| CompileError::RequiresLiteral {
        key: node.kind().key(),
        argument: "set",
        expected: "a list of scalar literals",
        got: set_node.key().to_string(),
    })?;

    Ok(value.is_in(lit(series_from_scalars(&scalars)?)))
}

fn lower_in_range(node: &ExprNode) -> Result<Expr, CompileError> {
    let value = to_polars(required(node, "value")?)?;
    let min_inclusive = literal_bool_or(node, "min_inclusive", node.kwarg("min_inclusive"), true)?;
    let max_inclusive = literal_bool_or(node, "max_inclusive", node.kwarg("max_inclusive"), true)?;

    let mut out = lit(true);
    if let Some(min_node) = node.kwarg("min") {
        let min = to_polars(min_node)?;
        let check = if min_inclusive {
            value.clone().gt_eq(min)
        } else {
            value.clone().gt(min)
        };
        out = out.and(check);
    }
    if let Some(max_node) = node.kwarg("max") {
        let max = to_polars(max_node)?;
        let check = if max_inclusive {
            value.clone().lt_eq(max)
        } else {
            value.clone().lt(max)
        };
        out = out.and(check);
    }
    Ok(out)
}
