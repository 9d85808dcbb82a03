//! Element management for lists and sequences.
//!
//! After every insert, remove or move, element paths end in `0..n-1` in list
//! order, and every element carries CantRemove while the list is at its
//! minimum length.

use tracing::debug;

use crate::error::{EngineError, Result};
use crate::item::ItemId;
use crate::{ItemEvent, ItemFlags, ItemTree, SchemaPath};

struct Bounds {
    path: String,
    min: usize,
    max: Option<usize>,
    len: usize,
}

impl ItemTree {
    fn bounds(&self, id: ItemId) -> Result<Bounds> {
        let item = self.item(id)?;
        let def = match item.keyword() {
            Some(def) if item.is_container() => def,
            _ => return Err(EngineError::NotAContainer(item.path.to_string())),
        };
        Ok(Bounds {
            path: item.path.to_string(),
            min: def.min,
            max: def.max,
            len: item.children.len(),
        })
    }

    /// Number of elements of a list or sequence.
    pub fn element_count(&self, id: ItemId) -> Result<usize> {
        Ok(self.bounds(id)?.len)
    }

    /// Returns `true` if one more element fits.
    pub fn can_append(&self, id: ItemId) -> Result<bool> {
        let bounds = self.bounds(id)?;
        Ok(bounds.max.is_none_or(|max| bounds.len < max))
    }

    /// Returns `true` if an element can be removed.
    pub fn can_remove(&self, id: ItemId) -> Result<bool> {
        let bounds = self.bounds(id)?;
        Ok(bounds.len > bounds.min)
    }

    /// Appends a new element.
    pub fn append_element(&mut self, id: ItemId) -> Result<ItemId> {
        let len = self.bounds(id)?.len;
        self.insert_element(id, len)
    }

    /// Inserts a new element at `index`, shifting later elements.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CardinalityViolation`] when the list is at its
    /// maximum length, or [`EngineError::IndexOutOfRange`] when `index` is
    /// past the end.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use command_params_core::{KeywordDef, ValueType};
    /// use command_params_engine::ItemTree;
    ///
    /// let command = KeywordDef::command("CMD").with_keyword(
    ///     KeywordDef::simple("GROUPS", ValueType::Text).with_cardinality(1, Some(2)),
    /// );
    ///
    /// let mut tree = ItemTree::new();
    /// let root = tree.build(Arc::new(command));
    /// let groups = tree.find(root, "GROUPS").unwrap();
    ///
    /// let first = tree.insert_element(groups, 0).unwrap();
    /// assert_eq!(tree.name(first).unwrap(), "0");
    /// assert!(tree.append_element(groups).is_err());
    /// ```
    pub fn insert_element(&mut self, id: ItemId, index: usize) -> Result<ItemId> {
        let bounds = self.bounds(id)?;
        if index > bounds.len {
            return Err(EngineError::IndexOutOfRange {
                path: bounds.path,
                index,
                len: bounds.len,
            });
        }
        if let Some(max) = bounds.max.filter(|max| bounds.len >= *max) {
            return Err(EngineError::CardinalityViolation {
                path: bounds.path,
                action: "add",
                limit: max,
            });
        }

        let path = self.item(id)?.path.absolute(&bounds.len.to_string());
        let element = self.create(path, Some(id));
        if let Some(item) = self.get_mut(id) {
            item.children.retain(|c| *c != element);
            item.children.insert(index, element);
        }
        self.reindex(id);
        self.update_floor(id);
        self.apply_initial_rules(element);
        self.update_all_conditions(element);
        self.refresh_view(element);
        self.value_changed(id);
        debug!(sequence = %bounds.path, index, "inserted element");
        Ok(element)
    }

    /// Removes the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CardinalityViolation`] when the list is at its
    /// minimum length, or [`EngineError::IndexOutOfRange`].
    pub fn remove_element(&mut self, id: ItemId, index: usize) -> Result<()> {
        let bounds = self.bounds(id)?;
        if index >= bounds.len {
            return Err(EngineError::IndexOutOfRange {
                path: bounds.path,
                index,
                len: bounds.len,
            });
        }
        if bounds.len <= bounds.min {
            return Err(EngineError::CardinalityViolation {
                path: bounds.path,
                action: "remove",
                limit: bounds.min,
            });
        }

        let element = self.item(id)?.children[index];
        self.destroy_item(element);
        self.reindex(id);
        self.update_floor(id);
        self.value_changed(id);
        debug!(sequence = %bounds.path, index, "removed element");
        Ok(())
    }

    /// Moves the element at `from` to position `to`.
    pub fn move_element(&mut self, id: ItemId, from: usize, to: usize) -> Result<()> {
        let bounds = self.bounds(id)?;
        if let Some(index) = [from, to].into_iter().find(|i| *i >= bounds.len) {
            return Err(EngineError::IndexOutOfRange {
                path: bounds.path,
                index,
                len: bounds.len,
            });
        }
        if from == to {
            return Ok(());
        }

        if let Some(item) = self.get_mut(id) {
            let element = item.children.remove(from);
            item.children.insert(to, element);
        }
        self.reindex(id);
        self.value_changed(id);
        Ok(())
    }

    /// Creates or destroys trailing elements so the container holds `len`
    /// elements. Bounds are not enforced; loaded documents may be invalid.
    pub(crate) fn reshape(&mut self, id: ItemId, len: usize) {
        let Some(item) = self.get(id) else {
            return;
        };
        let path = item.path.clone();
        let current = item.children.clone();

        for element in current.iter().skip(len).rev() {
            self.destroy_item(*element);
        }
        for index in current.len()..len {
            self.create(path.absolute(&index.to_string()), Some(id));
        }
        self.update_floor(id);
    }

    /// Renames element paths to their positions.
    fn reindex(&mut self, id: ItemId) {
        let Some(item) = self.get(id) else {
            return;
        };
        let path = item.path.clone();
        let children = item.children.clone();

        for (index, element) in children.into_iter().enumerate() {
            let expected = path.absolute(&index.to_string());
            if self.get(element).is_some_and(|e| e.path != expected) {
                self.rederive(element, expected);
                self.events.push(ItemEvent::Reindexed {
                    item: element,
                    index,
                });
                self.refresh.schedule(element);
            }
        }
    }

    /// Moves an item to a new path, re-deriving every descendant path.
    fn rederive(&mut self, id: ItemId, path: SchemaPath) {
        let Some(item) = self.get_mut(id) else {
            return;
        };
        item.path = path.clone();
        for child in item.children.clone() {
            let Some(name) = self.get(child).map(|c| c.path.name().to_string()) else {
                continue;
            };
            self.rederive(child, path.absolute(&name));
        }
    }

    pub(crate) fn update_floor(&mut self, id: ItemId) {
        let Ok(bounds) = self.bounds(id) else {
            return;
        };
        let at_floor = bounds.len <= bounds.min;
        let children = self.get(id).map(|i| i.children.clone()).unwrap_or_default();
        for element in children {
            self.set_flag(element, ItemFlags::CANT_REMOVE, at_floor);
        }
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
            KeywordDef::command("CMD").with_keyword(
                KeywordDef::factor("LOAD")
                    .with_cardinality(1, Some(3))
                    .with_keyword(KeywordDef::simple("CHARGE", ValueType::Text)),
            ),
        )
    }

    fn charges(tree: &ItemTree, load: ItemId) -> Vec<String> {
        tree.children(load)
            .unwrap()
            .iter()
            .map(|e| tree.path(tree.find(*e, "CHARGE").unwrap()).unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_insert_rederives_descendant_paths() {
        let mut tree = ItemTree::new();
        let root = tree.build(command());
        let load = tree.find(root, "LOAD").unwrap();

        tree.insert_element(load, 0).unwrap();
        assert_eq!(charges(&tree, load), vec!["CMD.LOAD.0.CHARGE", "CMD.LOAD.1.CHARGE"]);
    }

    #[test]
    fn test_move_keeps_values_with_elements() {
        let mut tree = ItemTree::new();
        let root = tree.build(command());
        let load = tree.find(root, "LOAD").unwrap();
        tree.set_item_value(
            load,
            json!([{ "CHARGE": "a" }, { "CHARGE": "b" }, { "CHARGE": "c" }]),
        )
        .unwrap();

        tree.move_element(load, 0, 2).unwrap();
        assert_eq!(
            tree.item_value(load).unwrap(),
            Some(json!([{ "CHARGE": "b" }, { "CHARGE": "c" }, { "CHARGE": "a" }]))
        );
        let names: Vec<&str> = tree
            .children(load)
            .unwrap()
            .iter()
            .map(|e| tree.name(*e).unwrap())
            .collect();
        assert_eq!(names, vec!["0", "1", "2"]);
    }

    #[test]
    fn test_bounds_are_enforced() {
        let mut tree = ItemTree::new();
        let root = tree.build(command());
        let load = tree.find(root, "LOAD").unwrap();

        assert!(matches!(
            tree.remove_element(load, 0),
            Err(EngineError::CardinalityViolation { action: "remove", limit: 1, .. })
        ));
        tree.append_element(load).unwrap();
        tree.append_element(load).unwrap();
        assert!(!tree.can_append(load).unwrap());
        assert!(matches!(
            tree.append_element(load),
            Err(EngineError::CardinalityViolation { action: "add", limit: 3, .. })
        ));
        assert!(matches!(
            tree.move_element(load, 0, 5),
            Err(EngineError::IndexOutOfRange { index: 5, len: 3, .. })
        ));
        assert!(matches!(
            tree.append_element(root),
            Err(EngineError::NotAContainer(_))
        ));
    }
}
