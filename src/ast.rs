//! # Sprig Expression Language - Abstract Syntax Tree
//!
//! This module defines the canonical AST for the sprig expression language:
//! a small, closed set of node types that every surface form (YAML short
//! form, resolved form, infix string form, or an already-built node) is
//! canonicalized into.
//!
//! ## Architecture Overview
//!
//! The AST module is organized into focused submodules:
//!
//! - **[kind]** - Node-type descriptors: keys, operator symbols, arity
//!   contracts, and surface-form matching
//! - **[node]** - The node values themselves (literals, column references,
//!   operator nodes) with construction-time validation
//!
//! ## Core Concepts
//!
//! ### Surface Forms
//!
//! Every node can be written four ways, and all of them resolve to the same
//! canonical tree:
//!
//! ```text
//! {"expression": {"type": "add", "arguments": [1, 2]}}   // resolved form
//! {"add": [1, 2]}                                        // short form
//! "1 + 2"                                                // string form
//! Node::expr(Kind::Add, vec![...])                       // class form
//! ```
//!
//! ### Terminals and Non-Terminals
//!
//! Terminal nodes (`literal`, `column`) take raw payloads. Non-terminal
//! nodes take only other nodes — the resolver recursively resolves every
//! argument before a non-terminal is constructed, so an `ExprNode` can only
//! ever hold `Node` children.
//!
//! ### Contracts
//!
//! Arity and keyword rules are data, not inheritance: each [`Kind`] declares
//! a [`Contract`] (unary, binary, variadic, or keyword-based) that is
//! enforced once, at construction.
pub mod kind;
pub mod node;

pub use kind::{Contract, Kind};
pub use node::{Column, ExprNode, Literal, LiteralValue, Node, NodeError};
