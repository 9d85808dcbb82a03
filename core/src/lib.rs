//! Core catalog types and shared catalog package primitives.
//!
//! This crate defines the declarative model of a command's parameters:
//!
//! - [`KeywordDef`]: one keyword of a command: scalar ([`KeywordKind::Simple`]),
//!   sub-block ([`KeywordKind::Factor`]), conditional grouping
//!   ([`KeywordKind::Bloc`]) or the command root ([`KeywordKind::Command`]).
//! - [`RuleDef`]: a constraint among sibling keywords ([`RuleKind`]).
//! - [`Condition`]: the boolean expression gating a bloc.
//! - [`CatalogPackage`]: a versioned bundle of command definitions for
//!   distribution.
//! - [`KeywordProvider`]: lookup seam implemented by catalog databases.
//!
//! Validation ([`validate_keyword`], [`validate_package`]) catches structural
//! errors in catalogs. Checking ([`SchemaChecker`]) verifies a value
//! [`Document`] against the catalog.
//!
//! # Example
//!
//! ```
//! use command_params_core::*;
//! use serde_json::json;
//!
//! let command = KeywordDef::command("STATIC")
//!     .with_keyword(KeywordDef::simple("MODEL", ValueType::Object).required())
//!     .with_keyword(KeywordDef::simple("MESH", ValueType::Object))
//!     .with_keyword(KeywordDef::simple("GROUP", ValueType::Text))
//!     .with_rule(RuleDef::new(RuleKind::AtMostOne, &["MESH", "GROUP"]));
//!
//! assert!(validate_keyword(&command).is_empty());
//!
//! let doc = json!({ "MODEL": "mo", "MESH": "ma", "GROUP": "all" });
//! let failure = SchemaChecker.check(&command, &doc, &Context::new()).unwrap_err();
//! assert_eq!(failure.rule, Some(RuleKind::AtMostOne));
//! ```

mod check;
mod expr;
mod package;
mod types;
mod validate;

pub use check::{CheckFailure, DocumentChecker, SchemaChecker};
pub use expr::{CompareOp, Condition, Expr, ExprError};
pub use package::CatalogPackage;
pub use types::*;
pub use validate::{CatalogError, validate_keyword, validate_package};
