//! View toggles: text filter and "hide unused".

use crate::item::ItemId;
use crate::{ItemFlags, ItemTree};

impl ItemTree {
    /// Sets the tree-wide text filter. Items whose name does not contain the
    /// text (case-insensitive), and that have no matching ancestor or
    /// descendant, become Filtered. `None` or blank text clears the filter.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use command_params_core::{KeywordDef, ValueType};
    /// use command_params_engine::{ItemFlags, ItemTree};
    ///
    /// let command = KeywordDef::command("CMD")
    ///     .with_keyword(KeywordDef::simple("PIVOT", ValueType::Int))
    ///     .with_keyword(KeywordDef::simple("NMAX", ValueType::Int));
    ///
    /// let mut tree = ItemTree::new();
    /// let root = tree.build(Arc::new(command));
    /// tree.set_filter(Some("piv"));
    ///
    /// let nmax = tree.find(root, "NMAX").unwrap();
    /// assert!(tree.flags(nmax).unwrap().contains(ItemFlags::FILTERED));
    /// assert!(!tree.flags(root).unwrap().contains(ItemFlags::FILTERED));
    /// ```
    pub fn set_filter(&mut self, text: Option<&str>) {
        let text = text.map(str::trim).filter(|t| !t.is_empty());
        self.config.filter = text.map(str::to_string);
        for root in self.roots() {
            self.apply_filter_from(root);
        }
    }

    /// Toggles "hide unused": unused items become HideUnused, and stay in
    /// sync as usage changes.
    pub fn set_hide_unused(&mut self, on: bool) {
        self.config.hide_unused = on;
        for root in self.roots() {
            self.apply_hide_unused(root);
        }
    }

    /// Applies both view toggles to a freshly built subtree.
    pub(crate) fn refresh_view(&mut self, id: ItemId) {
        self.apply_filter_from(self.root_of(id));
        self.apply_hide_unused(id);
    }

    fn apply_filter_from(&mut self, root: ItemId) {
        let needle = self.config.filter.as_ref().map(|f| f.to_lowercase());
        let children = self.get(root).map(|i| i.children.clone()).unwrap_or_default();
        // Roots stay visible.
        for child in children {
            self.apply_filter(child, needle.as_deref(), false);
        }
    }

    /// Returns `true` if the item or a descendant matches.
    fn apply_filter(&mut self, id: ItemId, needle: Option<&str>, ancestor_matches: bool) -> bool {
        let Some(item) = self.get(id) else {
            return false;
        };
        let self_matches = needle.is_none_or(|n| item.path.name().to_lowercase().contains(n));
        let mut descendant_matches = false;
        for child in item.children.clone() {
            descendant_matches |= self.apply_filter(child, needle, ancestor_matches || self_matches);
        }
        let visible = ancestor_matches || self_matches || descendant_matches;
        self.set_flag(id, ItemFlags::FILTERED, !visible);
        self_matches || descendant_matches
    }

    fn apply_hide_unused(&mut self, id: ItemId) {
        let on = self.config.hide_unused;
        for item in self.subtree(id) {
            let hide = on && !self.used(item);
            self.set_flag(item, ItemFlags::HIDE_UNUSED, hide);
        }
    }
}
