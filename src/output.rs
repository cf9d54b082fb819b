//! Configuration I/O: YAML values in, canonical-form JSON out.
//!
//! The resolver works on [`RawValue`]; this module converts between that
//! model and the serde ecosystem. Input side: `serde_yaml` values from
//! configuration files. Output side: deterministic JSON renderings of a
//! node's canonical short form, for CLI display and round-trip tests.
//!
//! # Examples
//!
//! ```
//! use sprig_lang::output::{raw_from_yaml_str, to_json};
//! use sprig_lang::registry::Registry;
//! use sprig_lang::resolver::Resolver;
//!
//! let raw = raw_from_yaml_str("add: [1, 2]").unwrap();
//! let node = Resolver::new(Registry::builtin()).resolve(&raw).unwrap();
//! assert_eq!(to_json(&node).to_string(), r#"{"add":[1,2]}"#);
//! ```

use std::collections::BTreeMap;

use thiserror::Error;

use crate::ast::Node;
use crate::value::{RawValue, Scalar};

/// Errors from the YAML configuration layer.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid YAML: {0}")]
    Yaml(String),

    #[error("configuration must be a mapping of result names to expressions; got {got}")]
    NotAMapping { got: String },

    #[error("mapping keys must be strings; got {got}")]
    NonStringKey { got: String },

    #[error("unsupported YAML value: {reason}")]
    UnsupportedValue { reason: String },
}

/// Convert a parsed YAML value into a raw value.
pub fn raw_from_yaml(value: &serde_yaml::Value) -> Result<RawValue, ConfigError> {
    match value {
        serde_yaml::Value::Null => Ok(RawValue::Scalar(Scalar::Null)),
        serde_yaml::Value::Bool(b) => Ok(RawValue::Scalar(Scalar::Bool(*b))),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(RawValue::Scalar(Scalar::Int(i)))
            } else if let Some(f) = n.as_f64() {
                Ok(RawValue::Scalar(Scalar::Float(f)))
            } else {
                Err(ConfigError::UnsupportedValue {
                    reason: format!("number {} does not fit i64 or f64", n),
                })
            }
        }
        serde_yaml::Value::String(s) => Ok(RawValue::Scalar(Scalar::Str(s.clone()))),
        serde_yaml::Value::Sequence(items) => {
            let items: Result<Vec<RawValue>, ConfigError> =
                items.iter().map(raw_from_yaml).collect();
            Ok(RawValue::List(items?))
        }
        serde_yaml::Value::Mapping(entries) => {
            let mut map = BTreeMap::new();
            for (key, value) in entries {
                let serde_yaml::Value::String(key) = key else {
                    return Err(ConfigError::NonStringKey {
                        got: format!("{:?}", key),
                    });
                };
                map.insert(key.clone(), raw_from_yaml(value)?);
            }
            Ok(RawValue::Map(map))
        }
        serde_yaml::Value::Tagged(tagged) => Err(ConfigError::UnsupportedValue {
            reason: format!("YAML tags are not supported (tag {})", tagged.tag),
        }),
    }
}

/// Parse one YAML document into a raw value.
pub fn raw_from_yaml_str(text: &str) -> Result<RawValue, ConfigError> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|err| ConfigError::Yaml(err.to_string()))?;
    raw_from_yaml(&value)
}

/// Parse a YAML document that must be a mapping of result name to raw
/// expression value — the shape of a configuration file.
pub fn mapping_from_yaml_str(text: &str) -> Result<BTreeMap<String, RawValue>, ConfigError> {
    match raw_from_yaml_str(text)? {
        RawValue::Map(entries) => Ok(entries),
        other => Err(ConfigError::NotAMapping {
            got: other.to_string(),
        }),
    }
}

fn raw_to_json(raw: &RawValue) -> serde_json::Value {
    match raw {
        RawValue::Scalar(Scalar::Null) => serde_json::Value::Null,
        RawValue::Scalar(Scalar::Bool(b)) => serde_json::Value::Bool(*b),
        RawValue::Scalar(Scalar::Int(n)) => serde_json::Value::from(*n),
        RawValue::Scalar(Scalar::Float(n)) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        RawValue::Scalar(Scalar::Str(s)) => serde_json::Value::String(s.clone()),
        RawValue::Scalar(Scalar::Timestamp(ts)) => serde_json::Value::String(ts.to_string()),
        RawValue::Name(name) => serde_json::Value::String(name.clone()),
        RawValue::Node(node) => raw_to_json(&node.to_raw()),
        RawValue::List(items) => serde_json::Value::Array(items.iter().map(raw_to_json).collect()),
        RawValue::Map(entries) => serde_json::Value::Object(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), raw_to_json(value)))
                .collect(),
        ),
    }
}

/// Render a node's canonical short form as a JSON value.
///
/// Output is deterministic: mapping keys are sorted. Feeding the rendered
/// form back through the resolver reproduces a structurally equal node.
pub fn to_json(node: &Node) -> serde_json::Value {
    raw_to_json(&node.to_raw())
}

/// Render a node's canonical short form as pretty-printed JSON.
pub fn to_json_pretty(node: &Node) -> String {
    serde_json::to_string_pretty(&to_json(node)).unwrap_or_else(|_| "null".to_string())
}
