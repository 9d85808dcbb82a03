use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{KeywordDef, KeywordProvider};

/// Serializable catalog bundle used for curation and distribution.
///
/// A package groups the keyword definitions of several commands with version
/// metadata, making it suitable for serializing to JSON and distributing as a
/// single bundle file.
///
/// # Examples
///
/// ```
/// use command_params_core::*;
///
/// let mut package = CatalogPackage::new("1.0.0", "2024-01-15T10:30:00Z");
/// package.name = Some("mechanics".into());
/// package.commands.push(KeywordDef::command("STATIC"));
/// package.commands.push(KeywordDef::command("MODAL"));
///
/// assert_eq!(package.command_count(), 2);
/// assert!(package.find_command("MODAL").is_some());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogPackage {
    /// Catalog contract version (populated from
    /// [`CATALOG_CONTRACT_VERSION`](crate::CATALOG_CONTRACT_VERSION)).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    /// Package format version (semver string).
    pub version: String,
    /// Optional package name.
    pub name: Option<String>,
    /// Optional package description.
    pub description: Option<String>,
    /// ISO-8601 timestamp for package creation.
    pub generated_at: String,
    /// Optional SHA-256 of the canonical JSON of `commands`.
    pub bundle_hash: Option<String>,
    /// Command keyword definitions included in this package.
    pub commands: Vec<KeywordDef>,
}

impl CatalogPackage {
    /// Creates a package with required fields.
    ///
    /// The `schema_version` is automatically set from
    /// [`CATALOG_CONTRACT_VERSION`](crate::CATALOG_CONTRACT_VERSION).
    pub fn new(version: impl Into<String>, generated_at: impl Into<String>) -> Self {
        Self {
            schema_version: Some(crate::CATALOG_CONTRACT_VERSION.to_string()),
            version: version.into(),
            name: None,
            description: None,
            generated_at: generated_at.into(),
            bundle_hash: None,
            commands: Vec::new(),
        }
    }

    /// Returns the number of commands in this package.
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    /// Finds a command definition by name.
    pub fn find_command(&self, name: &str) -> Option<&KeywordDef> {
        self.commands.iter().find(|c| c.name == name)
    }
}

impl KeywordProvider for CatalogPackage {
    fn command(&self, name: &str) -> Option<Arc<KeywordDef>> {
        self.find_command(name).cloned().map(Arc::new)
    }

    fn command_names(&self) -> Vec<String> {
        self.commands.iter().map(|c| c.name.clone()).collect()
    }
}
