use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::ast::Node;

/// Engine-neutral column type, the target of the fixed type-name table.
///
/// Both the `cast` target argument and declared/schema column types name
/// these; the compiler maps them onto Polars dtypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Boolean,
    String,
    Date,
    Datetime,
    Duration,
    Time,
}

/// Look up a type name in the fixed table of supported type names.
///
/// Aliases follow common usage: `int` and `integer` are 32-bit, `long` is
/// 64-bit, `float` is 32-bit, `double` is 64-bit.
///
/// # Examples
///
/// ```
/// use sprig_lang::schema::{column_type, ColumnType};
///
/// assert_eq!(column_type("int"), Some(ColumnType::Int32));
/// assert_eq!(column_type("double"), Some(ColumnType::Float64));
/// assert_eq!(column_type("utf8"), Some(ColumnType::String));
/// assert_eq!(column_type("complex"), None);
/// ```
pub fn column_type(name: &str) -> Option<ColumnType> {
    let ty = match name {
        "uint8" => ColumnType::UInt8,
        "uint16" => ColumnType::UInt16,
        "uint" | "uint32" => ColumnType::UInt32,
        "uint64" => ColumnType::UInt64,
        "int8" => ColumnType::Int8,
        "int16" => ColumnType::Int16,
        "int" | "int32" | "integer" => ColumnType::Int32,
        "int64" | "long" => ColumnType::Int64,
        "float" | "float32" => ColumnType::Float32,
        "float64" | "double" => ColumnType::Float64,
        "bool" | "boolean" => ColumnType::Boolean,
        "str" | "string" | "utf8" => ColumnType::String,
        "date" => ColumnType::Date,
        "datetime" => ColumnType::Datetime,
        "duration" => ColumnType::Duration,
        "time" => ColumnType::Time,
        _ => return None,
    };
    Some(ty)
}

/// Every supported type name, for diagnostics.
pub const TYPE_NAMES: &[&str] = &[
    "uint8", "uint16", "uint", "uint32", "uint64", "int8", "int16", "int", "int32", "integer",
    "int64", "long", "float", "float32", "float64", "double", "bool", "boolean", "str", "string",
    "utf8", "date", "datetime", "duration", "time",
];

/// Errors from schema construction and schema validation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
    #[error("unsupported type '{type_name}' for column '{column}'; supported: {}", TYPE_NAMES.join(", "))]
    UnknownType { column: String, type_name: String },

    #[error("unknown column '{column}' referenced at {path}")]
    UnknownColumn { column: String, path: String },

    #[error(
        "column '{column}' at {path} expected type '{expected}' but found '{found}'"
    )]
    TypeMismatch {
        column: String,
        path: String,
        expected: String,
        found: String,
    },

    #[error("schema must be a mapping of column names to type names: {reason}")]
    Malformed { reason: String },
}

/// A mapping of known column names to their type names.
///
/// Used to disambiguate bare names in the grammar (column vs. literal) and
/// to validate and back-fill the declared types of `column` nodes.
///
/// # Examples
///
/// ```
/// use sprig_lang::schema::Schema;
///
/// let schema = Schema::new([("age", "int"), ("name", "str")]).unwrap();
/// assert!(schema.contains("age"));
/// assert_eq!(schema.get("name"), Some("str"));
///
/// assert!(Schema::new([("age", "complex")]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    columns: BTreeMap<String, String>,
}

impl Schema {
    /// Build a schema, validating every type name against the fixed table.
    pub fn new<I, K, V>(columns: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut out = BTreeMap::new();
        for (name, type_name) in columns {
            let (name, type_name) = (name.into(), type_name.into());
            if column_type(&type_name).is_none() {
                return Err(SchemaError::UnknownType {
                    column: name,
                    type_name,
                });
            }
            out.insert(name, type_name);
        }
        Ok(Schema { columns: out })
    }

    /// Parse a schema from a YAML mapping of column name to type name.
    pub fn from_yaml_str(text: &str) -> Result<Self, SchemaError> {
        let parsed: BTreeMap<String, String> =
            serde_yaml::from_str(text).map_err(|err| SchemaError::Malformed {
                reason: err.to_string(),
            })?;
        Schema::new(parsed)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.columns.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Location of a node within a tree, for error messages.
struct Path<'a> {
    segments: &'a [String],
}

impl fmt::Display for Path<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("<root>");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

/// Validate every column reference in `node` against `schema`.
///
/// Unknown columns are an error naming the column and its path in the
/// tree. A column without a declared type is back-filled from the schema;
/// a declared type that disagrees with the schema (after alias
/// normalization, so `int` and `integer` agree) is an error.
///
/// # Examples
///
/// ```
/// use sprig_lang::ast::Node;
/// use sprig_lang::schema::{validate, Schema};
///
/// let schema = Schema::new([("col1", "int")]).unwrap();
///
/// let mut known = Node::column("col1").unwrap();
/// validate(&mut known, &schema).unwrap();
/// assert_eq!(known.as_column().unwrap().dtype(), Some("int"));
///
/// let mut unknown = Node::column("unknown_col").unwrap();
/// assert!(validate(&mut unknown, &schema).is_err());
/// ```
pub fn validate(node: &mut Node, schema: &Schema) -> Result<(), SchemaError> {
    let mut path = Vec::new();
    validate_at(node, schema, &mut path)
}

/// Validate a mapping of named trees; paths are rooted at the result name.
pub fn validate_map(
    nodes: &mut BTreeMap<String, Node>,
    schema: &Schema,
) -> Result<(), SchemaError> {
    for (name, node) in nodes.iter_mut() {
        let mut path = vec![name.clone()];
        validate_at(node, schema, &mut path)?;
    }
    Ok(())
}

fn validate_at(
    node: &mut Node,
    schema: &Schema,
    path: &mut Vec<String>,
) -> Result<(), SchemaError> {
    match node {
        Node::Literal(_) => Ok(()),
        Node::Column(column) => {
            let location = Path {
                segments: path.as_slice(),
            }
            .to_string();
            let Some(expected) = schema.get(column.name()) else {
                return Err(SchemaError::UnknownColumn {
                    column: column.name().to_string(),
                    path: location,
                });
            };
            match column.dtype() {
                None => {
                    let expected = expected.to_string();
                    column.set_dtype(expected);
                    Ok(())
                }
                Some(declared) => {
                    if column_type(declared) == column_type(expected) {
                        Ok(())
                    } else {
                        Err(SchemaError::TypeMismatch {
                            column: column.name().to_string(),
                            path: location,
                            expected: expected.to_string(),
                            found: declared.to_string(),
                        })
                    }
                }
            }
        }
        Node::Expr(expr) => {
            let kind_key = expr.kind().key();
            for (index, child) in expr.args_mut().iter_mut().enumerate() {
                path.push(format!("{}[{}]", kind_key, index));
                validate_at(child, schema, path)?;
                path.pop();
            }
            for (name, child) in expr.kwargs_mut().iter_mut() {
                path.push(format!("{}.{}", kind_key, name));
                validate_at(child, schema, path)?;
                path.pop();
            }
            Ok(())
        }
    }
}
