//! # sprig-lang
//!
//! A configuration expression language: YAML mappings, compact short
//! forms, and infix expression strings are parsed into one canonical AST
//! and compiled into Polars expressions.
//!
//! ```
//! use sprig_lang::schema::Schema;
//!
//! let schema = Schema::new([("col1", "int"), ("col2", "int")]).unwrap();
//! let nodes = sprig_lang::from_yaml("a: col1 + col2", Some(&schema)).unwrap();
//! let exprs = sprig_lang::compiler::compile_map(&nodes).unwrap();
//! assert!(exprs.contains_key("a"));
//! ```

pub mod ast;
pub mod compiler;
pub mod lexer;
pub mod output;
pub mod parser;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

use std::collections::BTreeMap;

use log::debug;
use thiserror::Error;

pub use ast::{Column, Contract, ExprNode, Kind, Literal, LiteralValue, Node, NodeError};
pub use compiler::{CompileError, Lowered};
pub use lexer::{LexError, Lexer, Token};
pub use output::ConfigError;
pub use parser::{ParseError, Parser};
pub use registry::{Registry, RegistryError};
pub use resolver::{ResolveError, Resolver};
pub use schema::{ColumnType, Schema, SchemaError};
pub use value::{RawValue, Scalar};

/// Any failure of the parse → resolve → validate → compile pipeline.
///
/// Each stage keeps its own error type; this umbrella exists for the
/// entry points below, which cross stages.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Parse a single expression string into a canonical node.
///
/// The schema, when given, both disambiguates bare names (column vs.
/// literal) and validates/back-fills column types on the result.
///
/// # Examples
///
/// ```
/// use sprig_lang::ast::Kind;
/// use sprig_lang::schema::Schema;
///
/// let schema = Schema::new([("price", "float")]).unwrap();
/// let node = sprig_lang::parse("price * 1.1", Some(&schema)).unwrap();
/// assert_eq!(node.kind(), Kind::Multiply);
/// ```
pub fn parse(source: &str, schema: Option<&Schema>) -> Result<Node, Error> {
    let registry = Registry::builtin();
    let resolver = match schema {
        Some(schema) => Resolver::with_schema(registry, schema),
        None => Resolver::new(registry),
    };
    let mut node = resolver.resolve(&RawValue::str(source))?;
    if let Some(schema) = schema {
        schema::validate(&mut node, schema)?;
    }
    Ok(node)
}

/// Parse a YAML configuration — a mapping of result name to raw
/// expression value — into canonical nodes.
///
/// A call either fully succeeds or fails on the first bad expression;
/// there is no partial output.
///
/// # Examples
///
/// ```
/// use sprig_lang::ast::Kind;
///
/// let nodes = sprig_lang::from_yaml("a: 1 + 2\nb: 'hello'", None).unwrap();
/// assert_eq!(nodes["a"].kind(), Kind::Add);
/// assert_eq!(nodes["b"].kind(), Kind::Literal);
/// ```
pub fn from_yaml(
    text: &str,
    schema: Option<&Schema>,
) -> Result<BTreeMap<String, Node>, Error> {
    let registry = Registry::builtin();
    let resolver = match schema {
        Some(schema) => Resolver::with_schema(registry, schema),
        None => Resolver::new(registry),
    };

    let raw = output::mapping_from_yaml_str(text)?;
    debug!("resolving {} configuration expression(s)", raw.len());

    let mut nodes = BTreeMap::new();
    for (name, value) in &raw {
        let node = resolver.resolve(value)?;
        nodes.insert(name.clone(), node);
    }
    if let Some(schema) = schema {
        schema::validate_map(&mut nodes, schema)?;
    }
    Ok(nodes)
}

/// Full pipeline: YAML configuration to aliased Polars expressions.
pub fn to_exprs(
    text: &str,
    schema: Option<&Schema>,
) -> Result<BTreeMap<String, polars::prelude::Expr>, Error> {
    let nodes = from_yaml(text, schema)?;
    Ok(compiler::compile_map(&nodes)?)
}
