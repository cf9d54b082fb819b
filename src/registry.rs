use std::collections::BTreeMap;

use log::debug;
use once_cell::sync::Lazy;
use thiserror::Error;

use crate::ast::Kind;
use crate::value::RawValue;

/// Errors raised while building a [`Registry`].
///
/// These are configuration errors: they can only be produced by a broken
/// node-type table, never by user input, and they abort initialization.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RegistryError {
    #[error("node key must be a non-empty string")]
    EmptyKey,

    #[error("node key must be lowercase; got '{key}'")]
    NonLowercaseKey { key: &'static str },

    #[error("multiple node types registered with key '{key}'")]
    DuplicateKey { key: &'static str },

    #[error("multiple node types registered with {table} symbol '{symbol}'")]
    DuplicateSymbol {
        table: &'static str,
        symbol: &'static str,
    },
}

/// The node-type lookup tables: by key, by infix symbol, and by prefix
/// symbol.
///
/// Built once from an explicit list of [`Kind`]s, validated for
/// collisions, and read-only thereafter. The process-wide instance over
/// [`Kind::ALL`] is available through [`Registry::builtin`].
///
/// `-` appears in both symbol tables (infix subtract, prefix negate);
/// uniqueness is enforced within each table, not across them.
///
/// # Examples
///
/// ```
/// use sprig_lang::ast::Kind;
/// use sprig_lang::registry::Registry;
///
/// let registry = Registry::builtin();
/// assert_eq!(registry.by_key("add"), Some(Kind::Add));
/// assert_eq!(registry.infix("::"), Some(Kind::Cast));
/// assert_eq!(registry.infix("as"), Some(Kind::Cast));
/// assert_eq!(registry.prefix("-"), Some(Kind::Negate));
/// assert_eq!(registry.by_key("fake_node"), None);
/// ```
#[derive(Debug, Clone)]
pub struct Registry {
    by_key: BTreeMap<&'static str, Kind>,
    infix: BTreeMap<&'static str, Kind>,
    prefix: BTreeMap<&'static str, Kind>,
}

impl Registry {
    /// Build a registry from an explicit list of node types.
    ///
    /// # Errors
    ///
    /// [`RegistryError`] if any key is empty or not lowercase, or if two
    /// node types share a key or a symbol within one table.
    pub fn new(kinds: &[Kind]) -> Result<Self, RegistryError> {
        let mut by_key = BTreeMap::new();
        let mut infix = BTreeMap::new();
        let mut prefix = BTreeMap::new();

        for &kind in kinds {
            let key = kind.key();
            if key.is_empty() {
                return Err(RegistryError::EmptyKey);
            }
            if key.chars().any(|c| c.is_uppercase()) {
                return Err(RegistryError::NonLowercaseKey { key });
            }
            if by_key.insert(key, kind).is_some() {
                return Err(RegistryError::DuplicateKey { key });
            }

            for &symbol in kind.infix_symbols() {
                if infix.insert(symbol, kind).is_some() {
                    return Err(RegistryError::DuplicateSymbol {
                        table: "infix",
                        symbol,
                    });
                }
            }
            if let Some(symbol) = kind.prefix_symbol() {
                if prefix.insert(symbol, kind).is_some() {
                    return Err(RegistryError::DuplicateSymbol {
                        table: "prefix",
                        symbol,
                    });
                }
            }
        }

        debug!(
            "registry built: {} keys, {} infix symbols, {} prefix symbols",
            by_key.len(),
            infix.len(),
            prefix.len()
        );

        Ok(Registry {
            by_key,
            infix,
            prefix,
        })
    }

    /// The process-wide registry over [`Kind::ALL`].
    ///
    /// A collision in the builtin table is a defect in this crate, not in
    /// user input; it aborts at first use.
    pub fn builtin() -> &'static Registry {
        static BUILTIN: Lazy<Registry> = Lazy::new(|| {
            Registry::new(Kind::ALL).expect("builtin node-type table is collision-free")
        });
        &BUILTIN
    }

    pub fn by_key(&self, key: &str) -> Option<Kind> {
        self.by_key.get(key).copied()
    }

    pub fn infix(&self, symbol: &str) -> Option<Kind> {
        self.infix.get(symbol).copied()
    }

    pub fn prefix(&self, symbol: &str) -> Option<Kind> {
        self.prefix.get(symbol).copied()
    }

    /// All registered keys, for "supported alternatives" diagnostics.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.by_key.keys().copied()
    }

    /// All infix symbols, for "supported alternatives" diagnostics.
    pub fn infix_symbols(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.infix.keys().copied()
    }

    /// Every node type whose `matches` accepts `value`.
    pub fn matching(&self, value: &RawValue) -> Vec<Kind> {
        self.by_key
            .values()
            .copied()
            .filter(|kind| kind.matches(value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_is_collision_free() {
        let registry = Registry::builtin();
        assert_eq!(registry.by_key("add"), Some(Kind::Add));
        assert_eq!(registry.by_key("greater_than"), Some(Kind::GreaterThan));
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let err = Registry::new(&[Kind::Add, Kind::Add]).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateKey { key: "add" });
    }

    #[test]
    fn test_symbol_tables() {
        let registry = Registry::builtin();
        assert_eq!(registry.infix("-"), Some(Kind::Subtract));
        assert_eq!(registry.prefix("-"), Some(Kind::Negate));
        assert_eq!(registry.prefix("not"), Some(Kind::Not));
        assert_eq!(registry.infix("nonsense"), None);
    }

    #[test]
    fn test_matching_single_key_mapping() {
        let registry = Registry::builtin();
        let raw = RawValue::short_form("divide", RawValue::List(vec![]));
        assert_eq!(registry.matching(&raw), vec![Kind::Divide]);

        let unknown = RawValue::short_form("fake_node", RawValue::List(vec![]));
        assert!(registry.matching(&unknown).is_empty());
    }
}
