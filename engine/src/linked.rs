//! Detached views of one item.
//!
//! Opening a linked view builds a second, parentless tree at the same schema
//! path and pairs it with the origin item: the origin is the master, the new
//! root its slave. While the view is open, global reads of the master return
//! the slave's value, so any change inside the master's subtree is copied
//! into the slave as it happens. Closing discards the slave; committing
//! copies its value into the master first.

use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::item::{ItemId, Link};
use crate::{ItemTree, ValueOptions};

impl ItemTree {
    /// Opens a linked view of `master` and returns its root.
    ///
    /// An already open view of the same item is closed first, discarding
    /// its edits.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use command_params_core::{KeywordDef, ValueType};
    /// use command_params_engine::{ItemTree, ValueOptions};
    /// use serde_json::json;
    ///
    /// let command = KeywordDef::command("CMD").with_keyword(
    ///     KeywordDef::factor("SOLVER").with_keyword(KeywordDef::simple("METHOD", ValueType::Text)),
    /// );
    /// let mut tree = ItemTree::new();
    /// let root = tree.build(Arc::new(command));
    /// let solver = tree.find(root, "SOLVER").unwrap();
    /// tree.set_item_value(solver, json!({ "METHOD": "MUMPS" })).unwrap();
    ///
    /// let view = tree.create_linked_view(solver).unwrap();
    /// let method = tree.find(view, "METHOD").unwrap();
    /// tree.set_item_value(method, json!("LDLT")).unwrap();
    ///
    /// let global = ValueOptions::default().global();
    /// assert_eq!(tree.item_value_with(solver, global).unwrap(), Some(json!({ "METHOD": "LDLT" })));
    /// assert_eq!(tree.item_value(solver).unwrap(), Some(json!({ "METHOD": "MUMPS" })));
    /// ```
    pub fn create_linked_view(&mut self, master: ItemId) -> Result<ItemId> {
        let item = self.item(master)?;
        let path = item.path.clone();
        if item.slave().is_some() {
            self.close_linked_view(master)?;
        }

        let value = self.value_of(master, ValueOptions::default());
        let slave = self.build_root(path.clone());
        if let Some(value) = value {
            self.mirroring = true;
            let loaded = self.set_item_value(slave, value);
            self.mirroring = false;
            if let Err(error) = loaded {
                self.destroy_item(slave);
                return Err(error);
            }
        }

        if let Some(item) = self.get_mut(master) {
            item.link = Some(Link::Master(slave));
        }
        if let Some(item) = self.get_mut(slave) {
            item.link = Some(Link::Slave(master));
        }
        debug!(master = %master, slave = %slave, path = %path, "opened linked view");
        Ok(slave)
    }

    /// Closes the linked view of `master`, discarding its edits.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotLinked`] if no view is open.
    pub fn close_linked_view(&mut self, master: ItemId) -> Result<()> {
        let slave = self.slave_of(master)?;
        self.destroy_item(slave);
        debug!(master = %master, slave = %slave, "closed linked view");
        Ok(())
    }

    /// Copies the linked view's value into `master`, then closes the view.
    pub fn commit_linked_view(&mut self, master: ItemId) -> Result<()> {
        let slave = self.slave_of(master)?;
        let value = self.value_of(slave, ValueOptions::default());
        self.close_linked_view(master)?;
        if let Some(value) = value {
            self.set_item_value(master, value)?;
        }
        Ok(())
    }

    /// Returns `true` if the item is a master or slave of an open view.
    pub fn is_linked(&self, id: ItemId) -> Result<bool> {
        Ok(self.item(id)?.link.is_some())
    }

    /// Root of the open linked view of `master`, if any.
    pub fn linked_view(&self, master: ItemId) -> Result<Option<ItemId>> {
        Ok(self.item(master)?.slave())
    }

    /// Origin item of a linked view root, if `id` is one.
    pub fn master_of(&self, id: ItemId) -> Result<Option<ItemId>> {
        Ok(self.item(id)?.master())
    }

    /// Copies the current value of `master` into its open linked view.
    pub(crate) fn mirror_to_slave(&mut self, master: ItemId) {
        if self.mirroring {
            return;
        }
        let Some(slave) = self.get(master).and_then(|i| i.slave()) else {
            return;
        };
        let Some(value) = self.value_of(master, ValueOptions::default()) else {
            return;
        };
        self.mirroring = true;
        if let Err(error) = self.set_item_value(slave, value) {
            warn!(item = %master, %error, "could not mirror value into linked view");
        }
        self.mirroring = false;
    }

    fn slave_of(&self, master: ItemId) -> Result<ItemId> {
        let item = self.item(master)?;
        item.slave()
            .ok_or_else(|| EngineError::NotLinked(item.path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use command_params_core::{KeywordDef, ValueType};
    use serde_json::json;

    use crate::ItemEvent;

    use super::*;

    fn command() -> Arc<KeywordDef> {
        Arc::new(
            KeywordDef::command("CMD").with_keyword(
                KeywordDef::factor("SOLVER")
                    .with_keyword(KeywordDef::simple("METHOD", ValueType::Text))
                    .with_keyword(KeywordDef::simple("RESI", ValueType::Real)),
            ),
        )
    }

    fn open(tree: &mut ItemTree) -> (ItemId, ItemId, ItemId) {
        let root = tree.build(command());
        let solver = tree.find(root, "SOLVER").unwrap();
        tree.set_item_value(solver, json!({ "METHOD": "MUMPS" })).unwrap();
        let view = tree.create_linked_view(solver).unwrap();
        (root, solver, view)
    }

    #[test]
    fn test_slave_edit_raises_one_linked_event() {
        let mut tree = ItemTree::new();
        let (_, solver, view) = open(&mut tree);
        tree.take_events();

        let resi = tree.find(view, "RESI").unwrap();
        tree.set_item_value(resi, json!(1e-6)).unwrap();

        let linked: Vec<ItemEvent> = tree
            .take_events()
            .into_iter()
            .filter(|e| matches!(e, ItemEvent::LinkedValueChanged { .. }))
            .collect();
        assert_eq!(
            linked,
            vec![ItemEvent::LinkedValueChanged { master: solver, slave: view }]
        );
    }

    #[test]
    fn test_master_edit_is_mirrored_without_echo() {
        let mut tree = ItemTree::new();
        let (_, solver, view) = open(&mut tree);
        tree.take_events();

        tree.set_item_value(solver, json!({ "METHOD": "LDLT" })).unwrap();

        assert_eq!(tree.item_value(view).unwrap(), Some(json!({ "METHOD": "LDLT" })));
        assert!(
            !tree
                .take_events()
                .iter()
                .any(|e| matches!(e, ItemEvent::LinkedValueChanged { .. }))
        );
    }

    #[test]
    fn test_master_descendant_edits_reach_view() {
        let mut tree = ItemTree::new();
        let (root, solver, view) = open(&mut tree);
        tree.take_events();

        let method = tree.find(root, "SOLVER.METHOD").unwrap();
        tree.set_item_value(method, json!("LDLT")).unwrap();

        let global = ValueOptions::default().global();
        assert_eq!(
            tree.item_value_with(root, global).unwrap(),
            Some(json!({ "SOLVER": { "METHOD": "LDLT" } }))
        );
        assert_eq!(tree.item_value(view).unwrap(), tree.item_value(solver).unwrap());

        tree.set_used(method, false).unwrap();
        assert_eq!(
            tree.item_value_with(solver, global).unwrap(),
            Some(json!({}))
        );
        assert!(
            !tree
                .take_events()
                .iter()
                .any(|e| matches!(e, ItemEvent::LinkedValueChanged { .. }))
        );
    }

    #[test]
    fn test_commit_and_reopen() {
        let mut tree = ItemTree::new();
        let (root, solver, view) = open(&mut tree);
        let method = tree.find(view, "METHOD").unwrap();
        tree.set_item_value(method, json!("LDLT")).unwrap();

        tree.commit_linked_view(solver).unwrap();
        assert!(!tree.contains(view));
        assert!(!tree.is_linked(solver).unwrap());
        assert_eq!(
            tree.item_value(root).unwrap(),
            Some(json!({ "SOLVER": { "METHOD": "LDLT" } }))
        );

        let first = tree.create_linked_view(solver).unwrap();
        let second = tree.create_linked_view(solver).unwrap();
        assert!(!tree.contains(first));
        assert_eq!(tree.linked_view(solver).unwrap(), Some(second));
        assert_eq!(tree.master_of(second).unwrap(), Some(solver));
    }

    #[test]
    fn test_close_without_view_fails() {
        let mut tree = ItemTree::new();
        let root = tree.build(command());
        assert!(matches!(
            tree.close_linked_view(root),
            Err(EngineError::NotLinked(_))
        ));
    }

    #[test]
    fn test_destroying_master_closes_view() {
        let mut tree = ItemTree::new();
        let (root, _, view) = open(&mut tree);

        tree.destroy(root).unwrap();
        assert!(!tree.contains(view));
        assert!(tree.is_empty());
    }
}
