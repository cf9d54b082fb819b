use std::collections::BTreeMap;
use std::fmt;

use crate::ast::node::NodeError;
use crate::value::{RawValue, Scalar};

/// Key of the resolved-form wrapper mapping (`{"expression": {...}}`).
pub const EXPRESSION_KEY: &str = "expression";

/// Key of the node-type tag inside a resolved-form mapping.
pub const EXPRESSION_TYPE_KEY: &str = "type";

/// Key of the argument payload inside a resolved-form mapping.
pub const EXPRESSION_ARGS_KEY: &str = "arguments";

/// Argument contract of a node type, enforced at construction.
///
/// The original design crossed unary/binary/args-only/kwargs-only base
/// classes with terminal/non-terminal mixins; here the same rules are plain
/// data selected per [`Kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contract {
    /// Exactly one positional argument, no keywords
    Unary,

    /// Exactly two positional arguments, no keywords
    Binary,

    /// Any number of positional arguments (at least `min`), no keywords
    Variadic { min: usize },

    /// Keyword arguments only: every name in `required` must be present,
    /// and no name outside `required` + `optional` is accepted
    Keywords {
        required: &'static [&'static str],
        optional: &'static [&'static str],
    },
}

/// The closed set of node types understood by the resolver and compiler.
///
/// A `Kind` is a descriptor: it knows its unique lowercase `key`, its
/// operator symbols (if any), its [`Contract`], and how to recognize and
/// deconstruct the surface forms of its nodes. The registry is built from
/// [`Kind::ALL`] at startup.
///
/// # Examples
///
/// ```
/// use sprig_lang::ast::Kind;
///
/// assert_eq!(Kind::Add.key(), "add");
/// assert_eq!(Kind::Add.infix_symbols(), &["+"]);
/// assert!(Kind::Literal.is_terminal());
/// assert!(!Kind::Divide.is_terminal());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    // Terminals
    Literal,
    Column,

    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Negate,
    Mean,
    Min,
    Max,

    // Boolean
    And,
    Or,
    Not,

    // Comparison
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,

    // Structure
    Cast,
    Coalesce,
    Conditional,

    // Strings
    StringInterpolate,
    RegexExtract,
    RegexMatch,

    // Timestamps
    Strptime,
    ResolveTimestamp,

    // Membership
    ValueInLiteralSet,
    ValueInRange,
}

impl Kind {
    /// Every registered node type, in registry order.
    pub const ALL: &'static [Kind] = &[
        Kind::Literal,
        Kind::Column,
        Kind::Add,
        Kind::Subtract,
        Kind::Multiply,
        Kind::Divide,
        Kind::Negate,
        Kind::Mean,
        Kind::Min,
        Kind::Max,
        Kind::And,
        Kind::Or,
        Kind::Not,
        Kind::Equal,
        Kind::NotEqual,
        Kind::GreaterThan,
        Kind::LessThan,
        Kind::GreaterThanOrEqual,
        Kind::LessThanOrEqual,
        Kind::Cast,
        Kind::Coalesce,
        Kind::Conditional,
        Kind::StringInterpolate,
        Kind::RegexExtract,
        Kind::RegexMatch,
        Kind::Strptime,
        Kind::ResolveTimestamp,
        Kind::ValueInLiteralSet,
        Kind::ValueInRange,
    ];

    /// The unique lowercase key identifying this node type in short and
    /// resolved forms.
    pub fn key(self) -> &'static str {
        match self {
            Kind::Literal => "literal",
            Kind::Column => "column",
            Kind::Add => "add",
            Kind::Subtract => "subtract",
            Kind::Multiply => "multiply",
            Kind::Divide => "divide",
            Kind::Negate => "negate",
            Kind::Mean => "mean",
            Kind::Min => "min",
            Kind::Max => "max",
            Kind::And => "and",
            Kind::Or => "or",
            Kind::Not => "not",
            Kind::Equal => "equal",
            Kind::NotEqual => "not_equal",
            Kind::GreaterThan => "greater_than",
            Kind::LessThan => "less_than",
            Kind::GreaterThanOrEqual => "greater_than_or_equal",
            Kind::LessThanOrEqual => "less_than_or_equal",
            Kind::Cast => "cast",
            Kind::Coalesce => "coalesce",
            Kind::Conditional => "conditional",
            Kind::StringInterpolate => "string_interpolate",
            Kind::RegexExtract => "regex_extract",
            Kind::RegexMatch => "regex_match",
            Kind::Strptime => "strptime",
            Kind::ResolveTimestamp => "resolve_timestamp",
            Kind::ValueInLiteralSet => "value_in_literal_set",
            Kind::ValueInRange => "value_in_range",
        }
    }

    /// Infix operator symbols registered for this node type.
    ///
    /// A node type may register several symbols (`cast` owns both `::` and
    /// `as`); most register none.
    pub fn infix_symbols(self) -> &'static [&'static str] {
        match self {
            Kind::Add => &["+"],
            Kind::Subtract => &["-"],
            Kind::Multiply => &["*"],
            Kind::Divide => &["/"],
            Kind::And => &["and"],
            Kind::Or => &["or"],
            Kind::Equal => &["=="],
            Kind::NotEqual => &["!="],
            Kind::GreaterThan => &[">"],
            Kind::LessThan => &["<"],
            Kind::GreaterThanOrEqual => &[">="],
            Kind::LessThanOrEqual => &["<="],
            Kind::Cast => &["::", "as"],
            _ => &[],
        }
    }

    /// Prefix operator symbol registered for this node type, if any.
    ///
    /// `-` is deliberately both a prefix symbol (negate) and an infix
    /// symbol (subtract); uniqueness is enforced per table.
    pub fn prefix_symbol(self) -> Option<&'static str> {
        match self {
            Kind::Negate => Some("-"),
            Kind::Not => Some("not"),
            _ => None,
        }
    }

    /// Terminal node types take raw payloads; non-terminals take only
    /// nested nodes.
    pub fn is_terminal(self) -> bool {
        matches!(self, Kind::Literal | Kind::Column)
    }

    /// The argument contract enforced when a node of this type is built.
    pub fn contract(self) -> Contract {
        match self {
            Kind::Literal => Contract::Unary,
            Kind::Column => Contract::Unary,
            Kind::Subtract | Kind::Divide | Kind::Cast => Contract::Binary,
            Kind::Negate | Kind::Not => Contract::Unary,
            Kind::Add
            | Kind::Multiply
            | Kind::Mean
            | Kind::Min
            | Kind::Max
            | Kind::And
            | Kind::Or
            | Kind::Coalesce => Contract::Variadic { min: 1 },
            Kind::Equal
            | Kind::NotEqual
            | Kind::GreaterThan
            | Kind::LessThan
            | Kind::GreaterThanOrEqual
            | Kind::LessThanOrEqual => Contract::Binary,
            Kind::StringInterpolate => Contract::Variadic { min: 2 },
            Kind::Conditional => Contract::Keywords {
                required: &["when", "then"],
                optional: &["otherwise"],
            },
            Kind::RegexExtract => Contract::Keywords {
                required: &["pattern", "source"],
                optional: &["group_index"],
            },
            Kind::RegexMatch => Contract::Keywords {
                required: &["pattern", "source"],
                optional: &[],
            },
            Kind::Strptime => Contract::Keywords {
                required: &["format", "source"],
                optional: &[],
            },
            Kind::ResolveTimestamp => Contract::Keywords {
                required: &["date"],
                optional: &["hour", "minute", "second"],
            },
            Kind::ValueInLiteralSet => Contract::Keywords {
                required: &["value", "set"],
                optional: &[],
            },
            Kind::ValueInRange => Contract::Keywords {
                required: &["value"],
                optional: &["min", "max", "min_inclusive", "max_inclusive"],
            },
        }
    }

    /// Returns true if `value` is in this node type's resolved form:
    /// a single-key `{"expression": {"type": <key>, ...}}` mapping.
    fn is_resolved_form(self, value: &RawValue) -> bool {
        let Some((key, inner)) = value.single_entry() else {
            return false;
        };
        if key != EXPRESSION_KEY {
            return false;
        }
        let Some(inner) = inner.as_map() else {
            return false;
        };
        matches!(
            inner.get(EXPRESSION_TYPE_KEY),
            Some(RawValue::Scalar(Scalar::Str(ty))) if ty == self.key()
        )
    }

    /// Returns true if `value` is in this node type's short form:
    /// a single-key `{<key>: <payload>}` mapping.
    fn is_short_form(self, value: &RawValue) -> bool {
        matches!(value.single_entry(), Some((key, _)) if key == self.key())
    }

    /// Returns true if `value` matches any accepted form of this node type.
    ///
    /// Two node types carry extra implicit forms: any bare scalar matches
    /// `literal`, and any bare list matches `coalesce` (the default
    /// combine-first-non-null semantics of a YAML list value).
    ///
    /// # Examples
    ///
    /// ```
    /// use sprig_lang::ast::Kind;
    /// use sprig_lang::{RawValue, Scalar};
    ///
    /// let short = RawValue::short_form("add", RawValue::List(vec![]));
    /// assert!(Kind::Add.matches(&short));
    /// assert!(!Kind::Multiply.matches(&short));
    ///
    /// assert!(Kind::Literal.matches(&RawValue::Scalar(Scalar::Int(3))));
    /// assert!(Kind::Coalesce.matches(&RawValue::List(vec![])));
    /// ```
    pub fn matches(self, value: &RawValue) -> bool {
        match value {
            RawValue::Node(node) => node.kind() == self,
            RawValue::Scalar(_) => self == Kind::Literal,
            RawValue::List(_) => self == Kind::Coalesce,
            RawValue::Map(_) => self.is_resolved_form(value) || self.is_short_form(value),
            RawValue::Name(_) => false,
        }
    }

    /// Extracts raw (not yet resolved) positional and keyword arguments
    /// from any matching surface form except class form.
    ///
    /// A mapping payload becomes keyword arguments, a list payload becomes
    /// positional arguments, and any other payload becomes a single
    /// positional argument — except for terminals, whose payload is always
    /// boxed as one positional argument, and `coalesce`, which accepts a
    /// bare list as its positional arguments.
    ///
    /// # Errors
    ///
    /// [`NodeError::FormMismatch`] if `value` does not match this node
    /// type or is in class form.
    pub fn args_from_value(
        self,
        value: &RawValue,
    ) -> Result<(Vec<RawValue>, BTreeMap<String, RawValue>), NodeError> {
        let mismatch = || NodeError::FormMismatch {
            key: self.key(),
            value: value.to_string(),
        };

        // Implicit forms first: bare scalars for literal, bare lists for
        // coalesce.
        if self == Kind::Literal {
            if let RawValue::Scalar(_) = value {
                return Ok((vec![value.clone()], BTreeMap::new()));
            }
        }
        if self == Kind::Coalesce {
            if let RawValue::List(items) = value {
                return Ok((items.clone(), BTreeMap::new()));
            }
        }

        let payload = if self.is_resolved_form(value) {
            let (_, inner) = value.single_entry().ok_or_else(mismatch)?;
            inner
                .as_map()
                .ok_or_else(mismatch)?
                .get(EXPRESSION_ARGS_KEY)
                .cloned()
                .unwrap_or(RawValue::Scalar(Scalar::Null))
        } else if self.is_short_form(value) {
            let (_, payload) = value.single_entry().ok_or_else(mismatch)?;
            payload.clone()
        } else {
            return Err(mismatch());
        };

        // Terminal payloads are always a single positional argument, even
        // when the payload is itself a mapping (typed columns) or a list
        // (set literals).
        if self.is_terminal() {
            return Ok((vec![payload], BTreeMap::new()));
        }

        match payload {
            RawValue::Scalar(Scalar::Null) => Ok((Vec::new(), BTreeMap::new())),
            RawValue::Map(entries) => Ok((Vec::new(), entries)),
            RawValue::List(items) => Ok((items, BTreeMap::new())),
            other => Ok((vec![other], BTreeMap::new())),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
