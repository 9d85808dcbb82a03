//! Editing sessions over a stored command.
//!
//! A session reads the command's stored document once, edits it through an
//! [`ItemTree`], and writes the serialized result back on save. Reverting
//! discards the tree and rebuilds it from the stored document.

use std::sync::Arc;

use command_params_core::{Document, DocumentChecker, KeywordDef, KeywordProvider};
use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::item::ItemId;
use crate::{EditorConfig, ItemTree, Validation, ValueOptions};

/// Owner of a command's persisted state.
pub trait CommandStorage {
    /// Catalog name of the command, e.g. `STATIC`.
    fn catalog_name(&self) -> &str;

    /// User-given name of the command result.
    fn name(&self) -> &str;

    /// Last stored document, `None` for a new command.
    fn document(&self) -> Option<Document>;

    /// Writes back a (possibly renamed) command.
    fn store(&mut self, name: &str, document: Document);
}

/// In-memory [`CommandStorage`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCommand {
    pub catalog_name: String,
    pub name: String,
    pub document: Option<Document>,
}

impl StoredCommand {
    pub fn new(catalog_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            catalog_name: catalog_name.into(),
            name: name.into(),
            document: None,
        }
    }

    pub fn with_document(mut self, document: Document) -> Self {
        self.document = Some(document);
        self
    }
}

impl CommandStorage for StoredCommand {
    fn catalog_name(&self) -> &str {
        &self.catalog_name
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn document(&self) -> Option<Document> {
        self.document.clone()
    }

    fn store(&mut self, name: &str, document: Document) {
        self.name = name.to_string();
        self.document = Some(document);
    }
}

/// One command being edited.
///
/// # Examples
///
/// ```
/// use command_params_core::{CatalogPackage, KeywordDef, ValueType};
/// use command_params_engine::{EditSession, EditorConfig, StoredCommand};
/// use serde_json::json;
///
/// let mut catalog = CatalogPackage::new("1.0.0", "2026-01-01T00:00:00Z");
/// catalog.commands.push(
///     KeywordDef::command("STATIC")
///         .with_keyword(KeywordDef::simple("MODEL", ValueType::Object).required()),
/// );
/// let mut stored = StoredCommand::new("STATIC", "resu").with_document(json!({ "MODEL": "mo" }));
///
/// let mut session = EditSession::open(&catalog, &stored, EditorConfig::default()).unwrap();
/// session.rename("resu2");
/// session.save(&mut stored).unwrap();
/// assert_eq!(stored.name, "resu2");
/// assert_eq!(stored.document, Some(json!({ "MODEL": "mo" })));
/// ```
#[derive(Debug)]
pub struct EditSession {
    command: Arc<KeywordDef>,
    config: EditorConfig,
    tree: ItemTree,
    root: ItemId,
    name: String,
}

impl EditSession {
    /// Builds the tree for the stored command and loads its document.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownCommand`] if the provider does not know
    /// the command, or [`EngineError::InvalidDocument`] if the stored
    /// document does not fit the catalog shape.
    pub fn open(
        provider: &dyn KeywordProvider,
        storage: &dyn CommandStorage,
        config: EditorConfig,
    ) -> Result<Self> {
        let command = provider
            .command(storage.catalog_name())
            .ok_or_else(|| EngineError::UnknownCommand(storage.catalog_name().to_string()))?;
        let (tree, root) = Self::load(&command, storage.document(), &config)?;
        debug!(command = %command.name, name = storage.name(), "opened edit session");
        Ok(Self {
            command,
            config,
            tree,
            root,
            name: storage.name().to_string(),
        })
    }

    fn load(
        command: &Arc<KeywordDef>,
        document: Option<Document>,
        config: &EditorConfig,
    ) -> Result<(ItemTree, ItemId)> {
        let mut tree = ItemTree::with_config(config.clone());
        let root = tree.build(command.clone());
        if let Some(document) = document {
            tree.set_item_value(root, document)?;
        }
        tree.take_events();
        tree.flush_refresh();
        Ok((tree, root))
    }

    pub fn tree(&self) -> &ItemTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut ItemTree {
        &mut self.tree
    }

    pub fn root(&self) -> ItemId {
        self.root
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rename(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Current document, read through open linked views.
    pub fn value(&self) -> Result<Document> {
        Ok(self
            .tree
            .item_value_with(self.root, ValueOptions::default().global())?
            .unwrap_or_else(|| Document::Object(Default::default())))
    }

    pub fn validate(&self, checker: &dyn DocumentChecker) -> Result<Validation> {
        self.tree.validate(self.root, checker)
    }

    /// Writes the current document and name back to storage.
    pub fn save(&self, storage: &mut dyn CommandStorage) -> Result<()> {
        let document = self.value()?;
        storage.store(&self.name, document);
        info!(command = %self.command.name, name = %self.name, "saved command");
        Ok(())
    }

    /// Discards every edit and rebuilds from the stored document.
    pub fn revert(&mut self, storage: &dyn CommandStorage) -> Result<()> {
        let (tree, root) = Self::load(&self.command, storage.document(), &self.config)?;
        self.tree = tree;
        self.root = root;
        self.name = storage.name().to_string();
        debug!(command = %self.command.name, "reverted edit session");
        Ok(())
    }
}
