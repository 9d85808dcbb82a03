//! Catalog loading and keyword lookup for command parameter editors.
//!
//! This crate provides the keyword provider consumed by the editing engine:
//! it loads command catalogs from a directory of per-command files or from a
//! versioned [`CatalogPackage`](command_params_core::CatalogPackage) bundle,
//! validates them, and serves definitions by command name.
//!
//! # Quick start
//!
//! ```no_run
//! use command_params_core::KeywordProvider;
//! use command_params_db::CatalogDatabase;
//!
//! // Load catalogs from a directory
//! let db = CatalogDatabase::from_dir("catalogs/").unwrap();
//! if let Some(command) = db.command("STATIC") {
//!     println!("STATIC has {} keywords", command.keywords.len());
//! }
//!
//! // Use the builder for fallback chains
//! let db = CatalogDatabase::builder()
//!     .from_dir("catalogs/")
//!     .from_bundle("catalog.json")
//!     .build()
//!     .unwrap();
//! ```

mod error;
mod loader;

pub use error::{DatabaseError, Result};
pub use loader::{CatalogDatabase, DatabaseBuilder, DatabaseSource, compute_bundle_hash};
