//! Catalog-driven parameter constraint engine.
//!
//! Builds a tree of editable items from a command's keyword catalog and keeps
//! it consistent under edits:
//!
//! - **Usage**: optional keywords are checked or unchecked; rules between
//!   sibling keywords ([`RuleKind`](command_params_core::RuleKind)) propagate
//!   usage changes, cycle-safe.
//! - **Conditions**: blocs are Excluded while their condition is false in
//!   the defaulted context of their scope.
//! - **Values**: [`ItemTree::item_value`] and [`ItemTree::set_item_value`]
//!   convert between the tree and a JSON value document.
//! - **Linked views**: an item can be opened in a detached view whose edits
//!   are read globally until the view is closed or committed.
//! - **Validation**: [`ItemTree::validate`] runs a
//!   [`DocumentChecker`](command_params_core::DocumentChecker) and locates
//!   the failing item.
//!
//! # Quick start
//!
//! ```
//! use std::sync::Arc;
//! use command_params_core::{KeywordDef, RuleDef, RuleKind, SchemaChecker, ValueType};
//! use command_params_engine::ItemTree;
//! use serde_json::json;
//!
//! let command = KeywordDef::command("STATIC")
//!     .with_keyword(KeywordDef::simple("MODEL", ValueType::Object).required())
//!     .with_keyword(KeywordDef::simple("CHAM_MATER", ValueType::Object))
//!     .with_keyword(KeywordDef::simple("CARA_ELEM", ValueType::Object))
//!     .with_rule(RuleDef::new(RuleKind::AtMostOne, &["CHAM_MATER", "CARA_ELEM"]));
//!
//! let mut tree = ItemTree::new();
//! let root = tree.build(Arc::new(command));
//! tree.set_item_value(root, json!({ "MODEL": "mo", "CHAM_MATER": "ch" })).unwrap();
//!
//! let cara = tree.find(root, "CARA_ELEM").unwrap();
//! tree.set_item_value(cara, json!("ca")).unwrap();
//!
//! assert_eq!(tree.item_value(root).unwrap(), Some(json!({ "MODEL": "mo", "CARA_ELEM": "ca" })));
//! assert!(tree.validate(root, &SchemaChecker).unwrap().is_pass());
//! ```

mod condition;
mod config;
mod error;
mod event;
mod flags;
mod item;
mod linked;
mod path;
mod rule;
mod sequence;
mod serialize;
mod session;
mod tree;
mod validate;
mod view;

pub use config::EditorConfig;
pub use error::{EngineError, Result};
pub use event::{ItemEvent, RefreshQueue};
pub use flags::ItemFlags;
pub use item::{ItemId, ItemKind};
pub use path::SchemaPath;
pub use serialize::ValueOptions;
pub use session::{CommandStorage, EditSession, StoredCommand};
pub use tree::ItemTree;
pub use validate::Validation;
