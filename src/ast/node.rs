use std::collections::BTreeMap;

use thiserror::Error;

use crate::ast::kind::{Contract, Kind};
use crate::value::{RawValue, Scalar};

/// Errors raised while constructing a node from extracted arguments.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum NodeError {
    /// A value does not match the node type's accepted surface forms
    #[error("input must match node type '{key}' but be unresolved; got {value}")]
    FormMismatch { key: &'static str, value: String },

    /// Wrong number of positional arguments
    #[error("'{key}' requires {expected} positional argument(s); got {got}")]
    Arity {
        key: &'static str,
        expected: String,
        got: usize,
    },

    /// Keyword arguments supplied to a positional-only node
    #[error("'{key}' does not accept keyword arguments")]
    NoKeywords { key: &'static str },

    /// Positional arguments supplied to a keyword-only node
    #[error("'{key}' does not accept positional arguments")]
    NoPositional { key: &'static str },

    /// Required keyword arguments absent
    #[error("missing required keys for '{key}': {missing}")]
    MissingKeywords { key: &'static str, missing: String },

    /// Unrecognized keyword arguments present
    #[error("extra unallowed keys for '{key}': {extra}")]
    UnexpectedKeywords { key: &'static str, extra: String },

    /// Literal payload is neither a scalar nor a list of scalars
    #[error("'literal' takes a scalar or a list of scalars; got {got}")]
    LiteralPayload { got: String },

    /// Column payload is neither a name string nor a {name, type} mapping
    #[error("'column' takes a name string or a {{name, type}} mapping; got {got}")]
    ColumnPayload { got: String },

    /// Column name is empty
    #[error("column name must be a non-empty string")]
    EmptyColumnName,
}

/// The payload of a `literal` node: one scalar, or a list of scalars for
/// set literals.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Scalar(Scalar),
    List(Vec<Scalar>),
}

/// A terminal node wrapping a plain-old-data value.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    value: LiteralValue,
}

impl Literal {
    pub fn new(value: impl Into<Scalar>) -> Self {
        Literal {
            value: LiteralValue::Scalar(value.into()),
        }
    }

    pub fn list(values: Vec<Scalar>) -> Self {
        Literal {
            value: LiteralValue::List(values),
        }
    }

    /// Build from the single positional payload extracted by
    /// [`Kind::args_from_value`].
    ///
    /// Accepts scalars and lists whose elements are all scalars; anything
    /// nested deeper has no literal representation.
    pub fn from_raw(payload: &RawValue) -> Result<Self, NodeError> {
        match payload {
            RawValue::Scalar(s) => Ok(Literal {
                value: LiteralValue::Scalar(s.clone()),
            }),
            RawValue::List(items) => {
                let scalars: Option<Vec<Scalar>> = items
                    .iter()
                    .map(|item| item.as_scalar().cloned())
                    .collect();
                match scalars {
                    Some(values) => Ok(Literal {
                        value: LiteralValue::List(values),
                    }),
                    None => Err(NodeError::LiteralPayload {
                        got: payload.to_string(),
                    }),
                }
            }
            other => Err(NodeError::LiteralPayload {
                got: other.to_string(),
            }),
        }
    }

    pub fn value(&self) -> &LiteralValue {
        &self.value
    }

    /// The wrapped scalar, if this is not a set literal.
    pub fn scalar(&self) -> Option<&Scalar> {
        match &self.value {
            LiteralValue::Scalar(s) => Some(s),
            LiteralValue::List(_) => None,
        }
    }
}

/// A terminal node referencing a dataframe column, with an optional
/// declared type name.
///
/// The type name is not interpreted at construction; schema validation
/// back-fills it from the schema or rejects a mismatch, and the compiler
/// never needs it (Polars resolves column dtypes itself).
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    dtype: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Result<Self, NodeError> {
        let name = name.into();
        if name.is_empty() {
            return Err(NodeError::EmptyColumnName);
        }
        Ok(Column { name, dtype: None })
    }

    pub fn with_type(
        name: impl Into<String>,
        dtype: impl Into<String>,
    ) -> Result<Self, NodeError> {
        let mut column = Column::new(name)?;
        column.dtype = Some(dtype.into());
        Ok(column)
    }

    /// Build from the single positional payload extracted by
    /// [`Kind::args_from_value`]: either a bare name string or a
    /// `{name: ..., type: ...}` mapping.
    pub fn from_raw(payload: &RawValue) -> Result<Self, NodeError> {
        let mismatch = || NodeError::ColumnPayload {
            got: payload.to_string(),
        };
        match payload {
            RawValue::Scalar(Scalar::Str(name)) | RawValue::Name(name) => Column::new(name.clone()),
            RawValue::Map(entries) => {
                let name = match entries.get("name") {
                    Some(RawValue::Scalar(Scalar::Str(name))) => name.clone(),
                    _ => return Err(mismatch()),
                };
                let dtype = match entries.get("type") {
                    None | Some(RawValue::Scalar(Scalar::Null)) => None,
                    Some(RawValue::Scalar(Scalar::Str(ty))) => Some(ty.clone()),
                    _ => return Err(mismatch()),
                };
                if entries.keys().any(|k| k != "name" && k != "type") {
                    return Err(mismatch());
                }
                match dtype {
                    Some(ty) => Column::with_type(name, ty),
                    None => Column::new(name),
                }
            }
            _ => Err(mismatch()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> Option<&str> {
        self.dtype.as_deref()
    }

    /// Back-fill the declared type. Used by schema validation only.
    pub(crate) fn set_dtype(&mut self, dtype: impl Into<String>) {
        self.dtype = Some(dtype.into());
    }
}

/// A non-terminal node: an operator applied to nested nodes.
///
/// Construction validates the kind's [`Contract`]; a constructed value is
/// immutable and always well-formed.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprNode {
    kind: Kind,
    args: Vec<Node>,
    kwargs: BTreeMap<String, Node>,
}

impl ExprNode {
    /// Construct and validate a non-terminal node.
    ///
    /// # Errors
    ///
    /// Any violation of the kind's contract: wrong positional arity,
    /// keywords where none are accepted, positional arguments on a
    /// keyword-only node, missing required keywords, or unrecognized
    /// keywords.
    ///
    /// # Examples
    ///
    /// ```
    /// use sprig_lang::ast::{ExprNode, Kind, Node};
    ///
    /// let ok = ExprNode::new(
    ///     Kind::Subtract,
    ///     vec![Node::int(5), Node::int(3)],
    ///     Default::default(),
    /// );
    /// assert!(ok.is_ok());
    ///
    /// let too_few = ExprNode::new(Kind::Subtract, vec![Node::int(5)], Default::default());
    /// assert!(too_few.is_err());
    /// ```
    pub fn new(
        kind: Kind,
        args: Vec<Node>,
        kwargs: BTreeMap<String, Node>,
    ) -> Result<Self, NodeError> {
        let key = kind.key();
        match kind.contract() {
            Contract::Unary => {
                if !kwargs.is_empty() {
                    return Err(NodeError::NoKeywords { key });
                }
                if args.len() != 1 {
                    return Err(NodeError::Arity {
                        key,
                        expected: "exactly one".to_string(),
                        got: args.len(),
                    });
                }
            }
            Contract::Binary => {
                if !kwargs.is_empty() {
                    return Err(NodeError::NoKeywords { key });
                }
                if args.len() != 2 {
                    return Err(NodeError::Arity {
                        key,
                        expected: "exactly two".to_string(),
                        got: args.len(),
                    });
                }
            }
            Contract::Variadic { min } => {
                if !kwargs.is_empty() {
                    return Err(NodeError::NoKeywords { key });
                }
                if args.len() < min {
                    return Err(NodeError::Arity {
                        key,
                        expected: format!("at least {}", min),
                        got: args.len(),
                    });
                }
            }
            Contract::Keywords { required, optional } => {
                if !args.is_empty() {
                    return Err(NodeError::NoPositional { key });
                }
                let missing: Vec<&str> = required
                    .iter()
                    .copied()
                    .filter(|name| !kwargs.contains_key(*name))
                    .collect();
                if !missing.is_empty() {
                    return Err(NodeError::MissingKeywords {
                        key,
                        missing: missing.join(", "),
                    });
                }
                let extra: Vec<&str> = kwargs
                    .keys()
                    .map(String::as_str)
                    .filter(|name| !required.contains(name) && !optional.contains(name))
                    .collect();
                if !extra.is_empty() {
                    return Err(NodeError::UnexpectedKeywords {
                        key,
                        extra: extra.join(", "),
                    });
                }
            }
        }
        Ok(ExprNode { kind, args, kwargs })
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn args(&self) -> &[Node] {
        &self.args
    }

    pub fn kwargs(&self) -> &BTreeMap<String, Node> {
        &self.kwargs
    }

    pub fn kwarg(&self, name: &str) -> Option<&Node> {
        self.kwargs.get(name)
    }

    // Mutable child access for schema validation's type back-fill; the
    // argument structure itself stays fixed.
    pub(crate) fn args_mut(&mut self) -> &mut [Node] {
        &mut self.args
    }

    pub(crate) fn kwargs_mut(&mut self) -> &mut BTreeMap<String, Node> {
        &mut self.kwargs
    }
}

/// One element of the canonical AST.
///
/// Constructed once by the resolver, immutable thereafter (schema
/// validation may back-fill a column's declared type), and read any number
/// of times by the compiler.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Literal(Literal),
    Column(Column),
    Expr(ExprNode),
}

impl Node {
    /// Convenience constructor for integer literals.
    pub fn int(n: i64) -> Node {
        Node::Literal(Literal::new(n))
    }

    /// Convenience constructor for string literals.
    pub fn str(s: impl Into<String>) -> Node {
        Node::Literal(Literal::new(s.into()))
    }

    /// Convenience constructor for boolean literals.
    pub fn bool(b: bool) -> Node {
        Node::Literal(Literal::new(b))
    }

    /// Convenience constructor for column references.
    pub fn column(name: impl Into<String>) -> Result<Node, NodeError> {
        Ok(Node::Column(Column::new(name)?))
    }

    /// Convenience constructor for positional operator nodes.
    pub fn expr(kind: Kind, args: Vec<Node>) -> Result<Node, NodeError> {
        Ok(Node::Expr(ExprNode::new(kind, args, BTreeMap::new())?))
    }

    /// Convenience constructor for keyword operator nodes.
    pub fn expr_kw<I, S>(kind: Kind, kwargs: I) -> Result<Node, NodeError>
    where
        I: IntoIterator<Item = (S, Node)>,
        S: Into<String>,
    {
        let kwargs = kwargs
            .into_iter()
            .map(|(name, node)| (name.into(), node))
            .collect();
        Ok(Node::Expr(ExprNode::new(kind, Vec::new(), kwargs)?))
    }

    pub fn kind(&self) -> Kind {
        match self {
            Node::Literal(_) => Kind::Literal,
            Node::Column(_) => Kind::Column,
            Node::Expr(expr) => expr.kind(),
        }
    }

    pub fn key(&self) -> &'static str {
        self.kind().key()
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Node::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    pub fn as_column(&self) -> Option<&Column> {
        match self {
            Node::Column(col) => Some(col),
            _ => None,
        }
    }

    pub fn as_expr(&self) -> Option<&ExprNode> {
        match self {
            Node::Expr(expr) => Some(expr),
            _ => None,
        }
    }

    /// Literal-evaluation: the compile-time scalar value of this node, if
    /// it has one.
    ///
    /// Only literal nodes evaluate outside row context. Arguments that must
    /// be compile-time constants (cast targets, regex group indices, format
    /// and pattern strings) are required to be literals; the compiler
    /// reports anything else as an unmet requirement rather than deferring
    /// it to row-wise execution.
    pub fn literal_scalar(&self) -> Option<&Scalar> {
        self.as_literal().and_then(Literal::scalar)
    }

    /// Export the canonical short-form representation of this node.
    ///
    /// Feeding the result back through the resolver reproduces a
    /// structurally equal node.
    ///
    /// # Examples
    ///
    /// ```
    /// use sprig_lang::ast::{Kind, Node};
    /// use sprig_lang::{RawValue, Scalar};
    ///
    /// let node = Node::expr(Kind::Add, vec![Node::int(1), Node::int(2)]).unwrap();
    /// let raw = node.to_raw();
    /// assert!(Kind::Add.matches(&raw));
    ///
    /// // Scalar literals export as the bare scalar.
    /// assert_eq!(Node::int(7).to_raw(), RawValue::Scalar(Scalar::Int(7)));
    /// ```
    pub fn to_raw(&self) -> RawValue {
        match self {
            Node::Literal(lit) => match lit.value() {
                LiteralValue::Scalar(s) => RawValue::Scalar(s.clone()),
                LiteralValue::List(items) => RawValue::short_form(
                    Kind::Literal.key(),
                    RawValue::List(
                        items.iter().cloned().map(RawValue::Scalar).collect(),
                    ),
                ),
            },
            Node::Column(col) => match col.dtype() {
                None => RawValue::short_form(Kind::Column.key(), RawValue::str(col.name())),
                Some(ty) => {
                    let mut entries = BTreeMap::new();
                    entries.insert("name".to_string(), RawValue::str(col.name()));
                    entries.insert("type".to_string(), RawValue::str(ty));
                    RawValue::short_form(Kind::Column.key(), RawValue::Map(entries))
                }
            },
            Node::Expr(expr) => {
                let payload = if expr.kwargs().is_empty() {
                    RawValue::List(expr.args().iter().map(Node::to_raw).collect())
                } else {
                    RawValue::Map(
                        expr.kwargs()
                            .iter()
                            .map(|(name, node)| (name.clone(), node.to_raw()))
                            .collect(),
                    )
                };
                RawValue::short_form(expr.kind().key(), payload)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_arity_enforced() {
        for count in [0, 1, 3] {
            let args: Vec<Node> = (0..count).map(|i| Node::int(i as i64)).collect();
            let err = ExprNode::new(Kind::Subtract, args, BTreeMap::new()).unwrap_err();
            assert!(matches!(err, NodeError::Arity { key: "subtract", .. }));
        }
    }

    #[test]
    fn test_keyword_contract_enforced() {
        let missing = ExprNode::new(
            Kind::Conditional,
            Vec::new(),
            [("when".to_string(), Node::bool(true))].into(),
        )
        .unwrap_err();
        assert!(matches!(missing, NodeError::MissingKeywords { .. }));

        let extra = ExprNode::new(
            Kind::Conditional,
            Vec::new(),
            [
                ("when".to_string(), Node::bool(true)),
                ("then".to_string(), Node::int(1)),
                ("surprise".to_string(), Node::int(2)),
            ]
            .into(),
        )
        .unwrap_err();
        assert!(matches!(extra, NodeError::UnexpectedKeywords { .. }));
    }

    #[test]
    fn test_interpolate_requires_fields() {
        let err = ExprNode::new(
            Kind::StringInterpolate,
            vec![Node::str("hello {}")],
            BTreeMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, NodeError::Arity { .. }));
    }

    #[test]
    fn test_column_payload_forms() {
        let bare = Column::from_raw(&RawValue::str("age")).unwrap();
        assert_eq!(bare.name(), "age");
        assert_eq!(bare.dtype(), None);

        let mut entries = BTreeMap::new();
        entries.insert("name".to_string(), RawValue::str("age"));
        entries.insert("type".to_string(), RawValue::str("int"));
        let typed = Column::from_raw(&RawValue::Map(entries)).unwrap();
        assert_eq!(typed.dtype(), Some("int"));

        assert!(Column::from_raw(&RawValue::int(3)).is_err());
    }
}
