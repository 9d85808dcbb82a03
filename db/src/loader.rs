//! Catalog database loading with builder pattern and fallback chains.
//!
//! Provides [`CatalogDatabase`] for in-memory keyword lookup and
//! [`DatabaseBuilder`] for constructing a database from multiple sources with
//! automatic fallback.
//!
//! # Loading patterns
//!
//! ```no_run
//! use command_params_db::CatalogDatabase;
//!
//! // One command definition per *.json / *.yaml file
//! let db = CatalogDatabase::from_dir("catalogs/").unwrap();
//! assert!(db.get("STATIC").is_some());
//!
//! // A single CatalogPackage bundle
//! let db = CatalogDatabase::from_bundle("catalog.json").unwrap();
//! ```
//!
//! Every definition is validated with
//! [`validate_keyword`](command_params_core::validate_keyword) before it is
//! indexed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use command_params_core::{
    CatalogPackage, KeywordDef, KeywordProvider, validate_keyword, validate_package,
};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{DatabaseError, Result};

/// Describes where a [`CatalogDatabase`] was loaded from.
#[derive(Debug, Clone)]
pub enum DatabaseSource {
    /// Loaded from a directory of per-command files.
    Directory(PathBuf),
    /// Loaded from a single [`CatalogPackage`] file.
    Bundle(PathBuf),
    /// Built in memory from definitions.
    Memory,
    /// Loaded via a fallback chain of multiple sources.
    Multiple(Vec<DatabaseSource>),
}

/// In-memory collection of command definitions keyed by command name.
///
/// Definitions are shared as [`Arc`]s so editors can hold them for as long as
/// their items live.
#[derive(Debug)]
pub struct CatalogDatabase {
    commands: HashMap<String, Arc<KeywordDef>>,
    source: DatabaseSource,
}

impl CatalogDatabase {
    /// Returns a new [`DatabaseBuilder`] for configuring a fallback chain.
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new()
    }

    /// Builds a database from in-memory definitions.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::InvalidCatalog`] for the first definition that
    /// fails validation.
    ///
    /// # Examples
    ///
    /// ```
    /// use command_params_core::KeywordDef;
    /// use command_params_db::CatalogDatabase;
    ///
    /// let db = CatalogDatabase::from_definitions(vec![KeywordDef::command("STATIC")]).unwrap();
    /// assert!(db.contains("STATIC"));
    /// ```
    pub fn from_definitions(definitions: Vec<KeywordDef>) -> Result<Self> {
        let mut db = Self {
            commands: HashMap::new(),
            source: DatabaseSource::Memory,
        };
        for def in definitions {
            db.insert(def)?;
        }
        Ok(db)
    }

    /// Loads definitions from a directory of `*.json`, `*.yaml` and `*.yml`
    /// files, one command per file.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::IoError`] if the directory or a file cannot be
    /// read, a parse error if a file is malformed, or
    /// [`DatabaseError::InvalidCatalog`] if a definition fails validation.
    pub fn from_dir(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut db = Self {
            commands: HashMap::new(),
            source: DatabaseSource::Directory(path.to_path_buf()),
        };

        let mut files: Vec<PathBuf> = std::fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<_>>()?;
        files.sort();

        for file_path in files {
            let def: KeywordDef = match file_path.extension().and_then(|e| e.to_str()) {
                Some("json") => {
                    let reader = std::io::BufReader::new(std::fs::File::open(&file_path)?);
                    serde_json::from_reader(reader)?
                }
                Some("yaml" | "yml") => {
                    let content = std::fs::read_to_string(&file_path)?;
                    serde_yaml::from_str(&content)?
                }
                _ => continue,
            };
            debug!(file = %file_path.display(), command = %def.name, "loaded catalog file");
            db.insert(def)?;
        }

        Ok(db)
    }

    /// Loads definitions from a single [`CatalogPackage`] JSON file.
    ///
    /// When the package declares a `bundle_hash`, it must match the SHA-256
    /// computed by [`compute_bundle_hash`].
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::InvalidChecksum`] on a hash mismatch and
    /// [`DatabaseError::InvalidCatalog`] for a package that fails
    /// [`validate_package`] (duplicate commands, empty version), in
    /// addition to the I/O, parse and validation errors of
    /// [`from_dir`](Self::from_dir).
    pub fn from_bundle(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = std::io::BufReader::new(std::fs::File::open(path)?);
        let package: CatalogPackage = serde_json::from_reader(reader)?;

        if let Some(expected) = &package.bundle_hash {
            let actual = compute_bundle_hash(&package.commands)?;
            if &actual != expected {
                warn!(bundle = %path.display(), "catalog bundle hash mismatch");
                return Err(DatabaseError::InvalidChecksum {
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        if let Some(error) = validate_package(&package).into_iter().next() {
            return Err(DatabaseError::InvalidCatalog {
                command: package.name.unwrap_or_else(|| path.display().to_string()),
                error,
            });
        }

        let mut db = Self::from_definitions(package.commands)?;
        db.source = DatabaseSource::Bundle(path.to_path_buf());
        Ok(db)
    }

    /// Validates and inserts a definition, replacing any existing entry for
    /// the same command name.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::InvalidCatalog`] if the definition fails
    /// validation; the database is left unchanged.
    pub fn insert(&mut self, def: KeywordDef) -> Result<()> {
        if let Some(error) = validate_keyword(&def).into_iter().next() {
            return Err(DatabaseError::InvalidCatalog {
                command: def.name,
                error,
            });
        }
        if self.commands.contains_key(&def.name) {
            warn!(command = %def.name, "replacing existing catalog definition");
        }
        self.commands.insert(def.name.clone(), Arc::new(def));
        Ok(())
    }

    /// Looks up a definition by command name.
    pub fn get(&self, command: &str) -> Option<&Arc<KeywordDef>> {
        self.commands.get(command)
    }

    /// Returns `true` if the database knows `command`.
    pub fn contains(&self, command: &str) -> bool {
        self.commands.contains_key(command)
    }

    /// Returns the number of commands in the database.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if the database contains no commands.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Returns an iterator over command names.
    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(|s| s.as_str())
    }

    /// Returns a reference to the source metadata.
    pub fn source(&self) -> &DatabaseSource {
        &self.source
    }

    /// Packs every definition into a [`CatalogPackage`] with its bundle hash
    /// filled in. Commands are sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::JsonError`] if hashing fails to serialize.
    pub fn to_package(
        &self,
        version: impl Into<String>,
        generated_at: impl Into<String>,
    ) -> Result<CatalogPackage> {
        let mut package = CatalogPackage::new(version, generated_at);
        let mut names: Vec<&String> = self.commands.keys().collect();
        names.sort();
        package.commands = names
            .into_iter()
            .map(|name| self.commands[name].as_ref().clone())
            .collect();
        package.bundle_hash = Some(compute_bundle_hash(&package.commands)?);
        Ok(package)
    }
}

impl KeywordProvider for CatalogDatabase {
    fn command(&self, name: &str) -> Option<Arc<KeywordDef>> {
        self.commands.get(name).cloned()
    }

    fn command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Computes the SHA-256 of the canonical JSON of `commands`, as a lowercase
/// hex string.
///
/// # Errors
///
/// Returns [`DatabaseError::JsonError`] if serialization fails.
pub fn compute_bundle_hash(commands: &[KeywordDef]) -> Result<String> {
    let bytes = serde_json::to_vec(commands)?;
    let hash = Sha256::digest(&bytes);
    Ok(format!("{:x}", hash))
}

/// Builder for constructing a [`CatalogDatabase`] with a fallback chain.
///
/// Sources are tried in the order they are added. The first successful load
/// wins; if all fail, [`DatabaseError::NoSourcesAvailable`] is returned.
pub struct DatabaseBuilder {
    sources: Vec<DatabaseSource>,
}

impl DatabaseBuilder {
    /// Creates a new builder with no sources.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Adds a directory of per-command files as a source.
    pub fn from_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(DatabaseSource::Directory(path.into()));
        self
    }

    /// Adds a [`CatalogPackage`] bundle file as a source.
    pub fn from_bundle(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(DatabaseSource::Bundle(path.into()));
        self
    }

    /// Attempts to load definitions from configured sources in order.
    pub fn build(self) -> Result<CatalogDatabase> {
        if self.sources.is_empty() {
            return Err(DatabaseError::NoSourcesAvailable);
        }

        let all_sources = self.sources.clone();

        for source in &self.sources {
            let result = match source {
                DatabaseSource::Directory(path) => CatalogDatabase::from_dir(path),
                DatabaseSource::Bundle(path) => CatalogDatabase::from_bundle(path),
                DatabaseSource::Memory | DatabaseSource::Multiple(_) => continue,
            };

            match result {
                Ok(mut db) => {
                    db.source = DatabaseSource::Multiple(all_sources);
                    return Ok(db);
                }
                Err(error) => debug!(?source, %error, "catalog source failed, trying next"),
            }
        }

        Err(DatabaseError::NoSourcesAvailable)
    }
}

impl Default for DatabaseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use command_params_core::{RuleDef, RuleKind, ValueType};

    use super::*;

    fn static_command() -> KeywordDef {
        KeywordDef::command("STATIC")
            .with_keyword(KeywordDef::simple("MODEL", ValueType::Object).required())
            .with_keyword(KeywordDef::simple("INFO", ValueType::Int))
    }

    #[test]
    fn test_from_definitions_indexes_by_name() {
        let db = CatalogDatabase::from_definitions(vec![
            static_command(),
            KeywordDef::command("MODAL"),
        ])
        .unwrap();

        assert_eq!(db.len(), 2);
        assert!(db.get("STATIC").is_some());
        assert_eq!(db.command_names(), vec!["MODAL", "STATIC"]);
    }

    #[test]
    fn test_insert_rejects_invalid_definition() {
        let bad = KeywordDef::command("BAD")
            .with_keyword(KeywordDef::simple("A", ValueType::Int))
            .with_rule(RuleDef::new(RuleKind::ExactlyOne, &["A", "B"]));

        let mut db = CatalogDatabase::from_definitions(Vec::new()).unwrap();
        let err = db.insert(bad).unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidCatalog { ref command, .. } if command == "BAD"));
        assert!(db.is_empty());
    }

    #[test]
    fn test_bundle_hash_is_stable() {
        let commands = vec![static_command()];
        let first = compute_bundle_hash(&commands).unwrap();
        let second = compute_bundle_hash(&commands).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert_ne!(first, compute_bundle_hash(&[]).unwrap());
    }

    #[test]
    fn test_to_package_fills_hash() {
        let db = CatalogDatabase::from_definitions(vec![static_command()]).unwrap();
        let package = db.to_package("1.0.0", "2026-01-01T00:00:00Z").unwrap();

        assert_eq!(package.command_count(), 1);
        assert_eq!(
            package.bundle_hash,
            Some(compute_bundle_hash(&package.commands).unwrap())
        );
    }

    #[test]
    fn test_builder_without_sources_fails() {
        assert!(matches!(
            CatalogDatabase::builder().build(),
            Err(DatabaseError::NoSourcesAvailable)
        ));
    }
}
