//! Editor preferences.
//!
//! # Example YAML
//!
//! ```yaml
//! external_list_editor: false
//! hide_unused: true
//! filter: pivot
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Preferences that shape how item trees are built and displayed.
///
/// Every field has a default, so an empty YAML document is a valid
/// configuration.
///
/// # Examples
///
/// ```
/// use command_params_engine::EditorConfig;
///
/// let config: EditorConfig = serde_yaml::from_str("hide_unused: true").unwrap();
/// assert!(config.hide_unused);
/// assert!(!config.external_list_editor);
/// assert_eq!(config.filter, None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Repeatable factors are edited as one composite value instead of a
    /// sequence of element items.
    pub external_list_editor: bool,
    /// Start with unused optional keywords hidden.
    pub hide_unused: bool,
    /// Initial text filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl EditorConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::EngineError::IoError) if the file cannot
    /// be read, or [`YamlError`](crate::EngineError::YamlError) if parsing
    /// fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::EngineError::IoError) if the file cannot
    /// be written, or [`YamlError`](crate::EngineError::YamlError) if
    /// serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Sets the filter, treating blank text as no filter.
    pub fn with_filter(mut self, filter: &str) -> Self {
        let filter = filter.trim();
        self.filter = (!filter.is_empty()).then(|| filter.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("editor.yml");

        let config = EditorConfig {
            external_list_editor: true,
            hide_unused: false,
            filter: None,
        }
        .with_filter("  pivot ");
        config.save(&path).unwrap();

        let loaded = EditorConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.filter.as_deref(), Some("pivot"));
    }

    #[test]
    fn test_blank_filter_is_none() {
        assert_eq!(EditorConfig::default().with_filter("   ").filter, None);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(EditorConfig::load(dir.path().join("missing.yml")).is_err());
    }
}
