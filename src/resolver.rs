use std::collections::BTreeMap;
use std::fmt;

use log::trace;

use crate::ast::{Column, ExprNode, Kind, Literal, Node, NodeError};
use crate::parser;
use crate::registry::Registry;
use crate::schema::Schema;
use crate::value::{RawValue, Scalar};

/// Maximum nesting depth of a raw expression.
///
/// Resolution is recursive; adversarially deep input fails with a clear
/// error instead of exhausting the stack.
pub const MAX_DEPTH: usize = 128;

/// Errors that can occur while resolving a raw value into a node.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveError {
    /// No registered node type accepted the value. When a candidate did
    /// match but failed during nested resolution or construction, its
    /// error is attached under the candidate's key.
    NoMatch {
        value: String,
        attempts: Vec<(String, Box<ResolveError>)>,
    },

    /// More than one registered node type accepted the value. This is a
    /// node-form design defect, not a user error: forms must be mutually
    /// exclusive by construction.
    Ambiguous {
        value: String,
        candidates: Vec<String>,
    },

    /// A matching node type rejected its extracted arguments
    Construction(NodeError),

    /// The expression nests deeper than [`MAX_DEPTH`]
    TooDeep { limit: usize },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::NoMatch { value, attempts } => {
                write!(f, "no matching node found for value: {}.", value)?;
                if !attempts.is_empty() {
                    write!(f, "\nerrors from attempted matches:")?;
                    for (key, err) in attempts {
                        write!(f, "\n- {}: {}", key, err)?;
                    }
                }
                Ok(())
            }
            ResolveError::Ambiguous { value, candidates } => write!(
                f,
                "multiple matching node types for value {}: [{}]",
                value,
                candidates.join(", ")
            ),
            ResolveError::Construction(err) => write!(f, "{}", err),
            ResolveError::TooDeep { limit } => {
                write!(f, "expression too deeply nested (limit {})", limit)
            }
        }
    }
}

impl std::error::Error for ResolveError {}

impl From<NodeError> for ResolveError {
    fn from(err: NodeError) -> Self {
        ResolveError::Construction(err)
    }
}

/// Resolves raw surface values into canonical AST nodes.
///
/// The resolver is the single funnel for all four surface forms: strings
/// run through the grammar first, mappings and lists are matched against
/// the registry, already-built nodes pass through, and bare identifiers
/// are disambiguated against the optional column schema.
///
/// # Examples
///
/// ```
/// use sprig_lang::ast::Kind;
/// use sprig_lang::registry::Registry;
/// use sprig_lang::resolver::Resolver;
/// use sprig_lang::{RawValue, Scalar};
///
/// let resolver = Resolver::new(Registry::builtin());
///
/// // Bare scalars resolve to literals.
/// let node = resolver.resolve(&RawValue::Scalar(Scalar::Int(42))).unwrap();
/// assert_eq!(node.kind(), Kind::Literal);
///
/// // Strings run through the grammar.
/// let node = resolver.resolve(&RawValue::str("1 + 2 * 3")).unwrap();
/// assert_eq!(node.kind(), Kind::Add);
/// ```
pub struct Resolver<'a> {
    registry: &'a Registry,
    schema: Option<&'a Schema>,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Resolver {
            registry,
            schema: None,
        }
    }

    /// A resolver that disambiguates bare names against `schema`.
    pub fn with_schema(registry: &'a Registry, schema: &'a Schema) -> Self {
        Resolver {
            registry,
            schema: Some(schema),
        }
    }

    /// Resolve a raw value into the unique matching node, recursively
    /// resolving nested arguments.
    pub fn resolve(&self, value: &RawValue) -> Result<Node, ResolveError> {
        self.resolve_at(value, 0)
    }

    fn resolve_at(&self, value: &RawValue, depth: usize) -> Result<Node, ResolveError> {
        if depth > MAX_DEPTH {
            return Err(ResolveError::TooDeep { limit: MAX_DEPTH });
        }

        match value {
            // Class form passes through untouched.
            RawValue::Node(node) => Ok(node.clone()),

            // Strings go through the grammar; a string the grammar cannot
            // parse falls back to a whole-string column or literal.
            RawValue::Scalar(Scalar::Str(source)) => {
                match parser::parse_str(source, self.registry) {
                    Ok(parsed) => self.resolve_at(&parsed, depth + 1),
                    Err(err) => {
                        trace!("grammar rejected {:?} ({}); treating as name", source, err);
                        self.resolve_name(source)
                    }
                }
            }

            // Bare identifiers from the grammar: column if the schema
            // knows the name, literal otherwise.
            RawValue::Name(name) => self.resolve_name(name),

            other => self.resolve_match(other, depth),
        }
    }

    fn resolve_name(&self, name: &str) -> Result<Node, ResolveError> {
        if self.schema.is_some_and(|schema| schema.contains(name)) {
            Ok(Node::Column(Column::new(name)?))
        } else {
            Ok(Node::Literal(Literal::new(name)))
        }
    }

    fn resolve_match(&self, value: &RawValue, depth: usize) -> Result<Node, ResolveError> {
        let candidates = self.registry.matching(value);

        match candidates.as_slice() {
            [] => Err(ResolveError::NoMatch {
                value: value.to_string(),
                attempts: Vec::new(),
            }),
            [kind] => self
                .resolve_candidate(*kind, value, depth)
                .map_err(|err| ResolveError::NoMatch {
                    value: value.to_string(),
                    attempts: vec![(kind.key().to_string(), Box::new(err))],
                }),
            many => Err(ResolveError::Ambiguous {
                value: value.to_string(),
                candidates: many.iter().map(|k| k.key().to_string()).collect(),
            }),
        }
    }

    fn resolve_candidate(
        &self,
        kind: Kind,
        value: &RawValue,
        depth: usize,
    ) -> Result<Node, ResolveError> {
        let (raw_args, raw_kwargs) = kind.args_from_value(value)?;

        if kind.is_terminal() {
            // Terminals receive exactly one raw payload argument and keep
            // it raw: their arguments are values, not nested nodes.
            let payload = raw_args.first().cloned().unwrap_or(RawValue::Scalar(Scalar::Null));
            let node = match kind {
                Kind::Literal => Node::Literal(Literal::from_raw(&payload)?),
                Kind::Column => Node::Column(Column::from_raw(&payload)?),
                _ => unreachable!("only literal and column are terminal"),
            };
            return Ok(node);
        }

        let args: Vec<Node> = raw_args
            .iter()
            .map(|arg| self.resolve_at(arg, depth + 1))
            .collect::<Result<_, _>>()?;
        let kwargs: BTreeMap<String, Node> = raw_kwargs
            .iter()
            .map(|(name, arg)| Ok((name.clone(), self.resolve_at(arg, depth + 1)?)))
            .collect::<Result<_, ResolveError>>()?;

        Ok(Node::Expr(ExprNode::new(kind, args, kwargs)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> Resolver<'static> {
        Resolver::new(Registry::builtin())
    }

    #[test]
    fn test_depth_limit() {
        // negate(negate(...(1)...)) past the limit
        let mut raw = RawValue::int(1);
        for _ in 0..(MAX_DEPTH + 2) {
            raw = RawValue::short_form("negate", raw);
        }
        let err = resolver().resolve(&raw).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("too deeply nested"), "got: {}", text);
    }

    #[test]
    fn test_nested_failure_reports_candidate_chain() {
        let raw = RawValue::short_form(
            "add",
            RawValue::List(vec![
                RawValue::int(1),
                RawValue::short_form("fake_node", RawValue::List(vec![])),
            ]),
        );
        let err = resolver().resolve(&raw).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("fake_node"), "got: {}", text);
        assert!(text.contains("- add:"), "got: {}", text);
    }
}
