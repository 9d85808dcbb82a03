//! Conversion between item trees and value documents.
//!
//! Serialization rules:
//!
//! - an edit item yields its value, or the catalog default when it has none;
//! - a block yields a mapping of its used children; bloc children are
//!   flattened into it and excluded blocs are skipped; unused children
//!   contribute their default only when defaults are requested;
//! - lists and sequences yield arrays; an array holding a single mapping or
//!   array is unwrapped to that element.
//!
//! Loading reverses this: lists are reshaped to the incoming length, every
//! key of a mapping checks its keyword, and keys absent from the mapping are
//! unchecked.

use std::collections::HashSet;

use command_params_core::{Document, KeywordKind};
use serde_json::Map;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::item::{ItemId, ItemKind};
use crate::{ItemFlags, ItemTree};

/// Options for [`ItemTree::item_value_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValueOptions {
    /// Include catalog defaults of unused optional keywords.
    pub with_defaults: bool,
    /// Read through open linked views, as top-level serialization does.
    pub global: bool,
}

impl ValueOptions {
    pub fn with_defaults(mut self) -> Self {
        self.with_defaults = true;
        self
    }

    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }
}

impl ItemTree {
    /// Serialized value of an item, without defaults and ignoring linked
    /// views. `None` when the item holds nothing (an edit item with neither
    /// value nor default).
    pub fn item_value(&self, id: ItemId) -> Result<Option<Document>> {
        self.item_value_with(id, ValueOptions::default())
    }

    /// Serialized value of an item.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use command_params_core::{KeywordDef, ValueType};
    /// use command_params_engine::{ItemTree, ValueOptions};
    /// use serde_json::json;
    ///
    /// let command = KeywordDef::command("CMD")
    ///     .with_keyword(KeywordDef::simple("INFO", ValueType::Int).with_default(json!(1)));
    ///
    /// let mut tree = ItemTree::new();
    /// let root = tree.build(Arc::new(command));
    ///
    /// assert_eq!(tree.item_value(root).unwrap(), Some(json!({})));
    /// assert_eq!(
    ///     tree.item_value_with(root, ValueOptions::default().with_defaults()).unwrap(),
    ///     Some(json!({ "INFO": 1 }))
    /// );
    /// ```
    pub fn item_value_with(&self, id: ItemId, options: ValueOptions) -> Result<Option<Document>> {
        self.item(id)?;
        Ok(self.value_of(id, options))
    }

    pub(crate) fn value_of(&self, id: ItemId, options: ValueOptions) -> Option<Document> {
        let item = self.get(id)?;
        if options.global {
            if let Some(slave) = item.slave() {
                return self.value_of(slave, options);
            }
        }

        if item.is_mapping() {
            let mut map = Map::new();
            self.collect_mapping(id, options, &mut map);
            return Some(Document::Object(map));
        }
        if item.is_container() {
            let mut values: Vec<Document> = item
                .children
                .iter()
                .filter_map(|c| self.value_of(*c, options))
                .collect();
            if let [single @ (Document::Object(_) | Document::Array(_))] = values.as_mut_slice() {
                return Some(std::mem::take(single));
            }
            return Some(Document::Array(values));
        }

        match item.kind {
            ItemKind::Edit => item
                .value
                .clone()
                .or_else(|| item.keyword().and_then(|k| k.default.clone())),
            _ => item.value.clone(),
        }
    }

    fn collect_mapping(&self, id: ItemId, options: ValueOptions, map: &mut Map<String, Document>) {
        let Some(item) = self.get(id) else {
            return;
        };
        for child in item.children.iter().copied() {
            let Some(child_item) = self.get(child) else {
                continue;
            };
            if child_item.flags.contains(ItemFlags::EXCLUDED) {
                continue;
            }
            if child_item.is_bloc() {
                self.collect_mapping(child, options, map);
                continue;
            }
            let name = child_item.path.name().to_string();
            let value = if self.used(child) {
                self.value_of(child, options)
            } else if options.with_defaults {
                child_item.keyword().and_then(|k| k.default.clone())
            } else {
                None
            };
            if let Some(value) = value {
                map.insert(name, value);
            }
        }
    }

    /// Loads a value document into an item and its subtree.
    ///
    /// The item itself becomes checked. Lists are reshaped to the incoming
    /// length; mappings check the keywords they name and uncheck the others;
    /// undeclared keys become opaque edit items kept as-is. Rules of the
    /// loaded subtree are re-applied, conditions re-evaluated, and an open
    /// linked view receives the same value.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidDocument`] when a block receives
    /// something other than a mapping. Items loaded before the offending
    /// value keep their new content.
    pub fn set_item_value(&mut self, id: ItemId, document: Document) -> Result<()> {
        self.item(id)?;
        let usage_changed = self.set_checked(id, true);
        self.load(id, document)?;

        self.apply_initial_rules(id);
        self.update_all_conditions(id);
        if usage_changed {
            self.update_rules(id, true);
        }
        self.value_changed(id);
        Ok(())
    }

    fn load(&mut self, id: ItemId, document: Document) -> Result<()> {
        let Some(item) = self.get(id) else {
            return Ok(());
        };

        if item.is_mapping() {
            let map = match document {
                Document::Object(map) => map,
                other => {
                    return Err(EngineError::InvalidDocument {
                        path: item.path.to_string(),
                        message: format!("expected a mapping, got {other}"),
                    });
                }
            };
            return self.load_mapping(id, &map);
        }

        if item.is_container() {
            let elements = match document {
                Document::Array(elements) => elements,
                Document::Null => Vec::new(),
                single => vec![single],
            };
            self.reshape(id, elements.len());
            let children = self.get(id).map(|i| i.children.clone()).unwrap_or_default();
            for (child, element) in children.into_iter().zip(elements) {
                self.load(child, element)?;
            }
            return Ok(());
        }

        if let Some(item) = self.get_mut(id) {
            item.value = (!document.is_null()).then_some(document);
        }
        Ok(())
    }

    fn load_mapping(&mut self, id: ItemId, map: &Map<String, Document>) -> Result<()> {
        self.load_named(id, map)?;

        // Blocs activate as the loaded values feed their conditions.
        let mut loaded: HashSet<ItemId> = HashSet::new();
        loop {
            self.update_conditions(id);
            let pending: Vec<ItemId> = self
                .active_blocs(id)
                .into_iter()
                .filter(|b| !loaded.contains(b))
                .collect();
            if pending.is_empty() {
                break;
            }
            for bloc in pending {
                loaded.insert(bloc);
                self.load_named(bloc, map)?;
            }
        }

        let Some(path) = self.get(id).map(|i| i.path.clone()) else {
            return Ok(());
        };
        let Some(def) = path.resolve() else {
            return Ok(());
        };
        for (key, value) in map {
            if def.find_flattened(key).is_some() {
                if self.child_flattened_active(id, key).is_none() {
                    warn!(keyword = %key, "keyword not allowed in the current context, dropped");
                }
                continue;
            }
            let opaque = match self.child(id, key) {
                Some(existing) => existing,
                None => {
                    debug!(keyword = %key, "keeping undeclared keyword as opaque value");
                    self.create(path.absolute(key), Some(id))
                }
            };
            self.set_checked(opaque, true);
            self.load(opaque, value.clone())?;
        }

        let stale: Vec<ItemId> = self
            .get(id)
            .map(|i| i.children.clone())
            .unwrap_or_default()
            .into_iter()
            .filter(|c| {
                self.get(*c)
                    .is_some_and(|item| item.is_opaque() && !map.contains_key(item.path.name()))
            })
            .collect();
        for child in stale {
            self.destroy_item(child);
        }
        Ok(())
    }

    /// Loads the declared non-bloc children of a block or bloc.
    fn load_named(&mut self, id: ItemId, map: &Map<String, Document>) -> Result<()> {
        let children = self.get(id).map(|i| i.children.clone()).unwrap_or_default();
        for child in children {
            let Some(item) = self.get(child) else {
                continue;
            };
            if item.is_bloc() || item.is_opaque() {
                continue;
            }
            match map.get(item.path.name()) {
                Some(value) => {
                    self.set_checked(child, true);
                    self.load(child, value.clone())?;
                }
                None => {
                    self.set_checked(child, false);
                }
            }
        }
        Ok(())
    }

    /// Blocs under `id` whose conditions hold, through active blocs only.
    fn active_blocs(&self, id: ItemId) -> Vec<ItemId> {
        let mut out = Vec::new();
        let Some(item) = self.get(id) else {
            return out;
        };
        for child in item.children.iter().copied() {
            let active = self
                .get(child)
                .is_some_and(|c| c.is_bloc() && !c.flags.contains(ItemFlags::EXCLUDED));
            if active {
                out.push(child);
                out.extend(self.active_blocs(child));
            }
        }
        out
    }

    fn child_flattened_active(&self, id: ItemId, name: &str) -> Option<ItemId> {
        if let Some(child) = self.child(id, name) {
            return Some(child);
        }
        self.active_blocs(id)
            .into_iter()
            .find_map(|bloc| self.child(bloc, name))
    }

    /// Returns the keyword kind at an item, for callers deciding how to
    /// render it.
    pub fn keyword_kind(&self, id: ItemId) -> Result<Option<KeywordKind>> {
        Ok(self.item(id)?.keyword().map(|k| k.kind))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use command_params_core::{KeywordDef, ValueType};
    use serde_json::json;

    use super::*;

    fn command() -> Arc<KeywordDef> {
        Arc::new(
            KeywordDef::command("CMD")
                .with_keyword(KeywordDef::simple("GROUPS", ValueType::Text).with_cardinality(1, None))
                .with_keyword(
                    KeywordDef::factor("LOAD")
                        .with_cardinality(1, None)
                        .with_keyword(KeywordDef::simple("CHARGE", ValueType::Object).required())
                        .with_keyword(KeywordDef::simple("COEF", ValueType::Real).with_default(json!(1.0))),
                ),
        )
    }

    #[test]
    fn test_single_factor_element_is_unwrapped() {
        let mut tree = ItemTree::new();
        let root = tree.build(command());
        let load = tree.find(root, "LOAD").unwrap();

        tree.set_item_value(load, json!([{ "CHARGE": "ch1" }])).unwrap();
        assert_eq!(tree.item_value(load).unwrap(), Some(json!({ "CHARGE": "ch1" })));

        tree.set_item_value(load, json!([{ "CHARGE": "ch1" }, { "CHARGE": "ch2" }]))
            .unwrap();
        assert_eq!(tree.children(load).unwrap().len(), 2);
    }

    #[test]
    fn test_scalar_list_keeps_array() {
        let mut tree = ItemTree::new();
        let root = tree.build(command());
        let groups = tree.find(root, "GROUPS").unwrap();

        tree.set_item_value(groups, json!(["g1"])).unwrap();
        assert_eq!(tree.item_value(groups).unwrap(), Some(json!(["g1"])));

        // A bare scalar is read as a list of one.
        tree.set_item_value(groups, json!("g2")).unwrap();
        assert_eq!(tree.item_value(groups).unwrap(), Some(json!(["g2"])));
    }

    #[test]
    fn test_unknown_keys_become_opaque_items() {
        let mut tree = ItemTree::new();
        let root = tree.build(command());

        tree.set_item_value(root, json!({ "GROUPS": ["g"], "LEGACY": { "a": 1 } }))
            .unwrap();
        let legacy = tree.child(root, "LEGACY").unwrap();
        assert_eq!(tree.kind(legacy).unwrap(), ItemKind::Edit);
        assert!(tree.keyword(legacy).unwrap().is_none());
        assert_eq!(
            tree.item_value(root).unwrap(),
            Some(json!({ "GROUPS": ["g"], "LEGACY": { "a": 1 } }))
        );

        tree.set_item_value(root, json!({ "GROUPS": ["g"] })).unwrap();
        assert!(!tree.contains(legacy));
    }

    #[test]
    fn test_digit_keys_outside_lists_stay_opaque() {
        let mut tree = ItemTree::new();
        let root = tree.build(command());

        tree.set_item_value(root, json!({ "GROUPS": ["g"], "7": 5 })).unwrap();
        let seven = tree.child(root, "7").unwrap();
        assert_eq!(tree.kind(seven).unwrap(), ItemKind::Edit);
        assert!(tree.keyword(seven).unwrap().is_none());
        assert_eq!(
            tree.item_value(root).unwrap(),
            Some(json!({ "GROUPS": ["g"], "7": 5 }))
        );

        let before = tree.len();
        tree.set_item_value(root, json!({ "GROUPS": ["g"], "7": { "GROUPS": ["h"] } }))
            .unwrap();
        assert_eq!(tree.len(), before);
        assert!(tree.children(seven).unwrap().is_empty());

        tree.set_item_value(root, json!({ "GROUPS": ["g"] })).unwrap();
        assert!(!tree.contains(seven));
    }

    #[test]
    fn test_block_rejects_scalar_document() {
        let mut tree = ItemTree::new();
        let root = tree.build(command());

        let err = tree.set_item_value(root, json!(3)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidDocument { .. }));
    }
}
