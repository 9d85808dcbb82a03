//! The item arena: construction, navigation, usage and lifecycle.
//!
//! Other modules extend [`ItemTree`] with rule propagation, condition
//! evaluation, serialization, sequences, linked views and validation.

use std::collections::HashMap;
use std::sync::Arc;

use command_params_core::{Condition, Document, KeywordDef};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::event::{ItemEvent, RefreshQueue};
use crate::item::{Item, ItemId, ItemKind, Link};
use crate::rule::Rule;
use crate::{EditorConfig, ItemFlags, SchemaPath};

/// Arena owning every item built from a catalog, plus the rules attached to
/// them.
///
/// All mutation goes through `&mut self`; after any public method returns,
/// values, usage and flags are consistent. Renderers learn about changes by
/// draining [`take_events`](ItemTree::take_events) and
/// [`flush_refresh`](ItemTree::flush_refresh).
///
/// Events are buffered until drained. A host must call `take_events` after
/// each batch of edits, even if it ignores the result; otherwise the buffer
/// grows with every change.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use command_params_core::{KeywordDef, ValueType};
/// use command_params_engine::ItemTree;
/// use serde_json::json;
///
/// let command = KeywordDef::command("STATIC")
///     .with_keyword(KeywordDef::simple("MODEL", ValueType::Object).required())
///     .with_keyword(KeywordDef::simple("INFO", ValueType::Int).with_default(json!(1)));
///
/// let mut tree = ItemTree::new();
/// let root = tree.build(Arc::new(command));
/// tree.set_item_value(root, json!({ "MODEL": "mo" })).unwrap();
///
/// let info = tree.find(root, "INFO").unwrap();
/// assert!(!tree.is_used(info).unwrap());
/// assert_eq!(tree.item_value(root).unwrap(), Some(json!({ "MODEL": "mo" })));
/// ```
#[derive(Debug, Default)]
pub struct ItemTree {
    pub(crate) items: Vec<Option<Item>>,
    pub(crate) rules: Vec<Option<Rule>>,
    pub(crate) config: EditorConfig,
    /// Pending notifications; only `take_events` empties this.
    pub(crate) events: Vec<ItemEvent>,
    pub(crate) refresh: RefreshQueue,
    /// Parsed bloc conditions by source; `None` when unparsable.
    pub(crate) conditions: HashMap<String, Option<Condition>>,
    /// Set while a value is copied between a master and its linked view.
    pub(crate) mirroring: bool,
}

impl ItemTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EditorConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Builds the item tree of a command and returns its root.
    ///
    /// Rules are applied once (an ExactlyOne group with nothing used selects
    /// its first keyword) and bloc conditions are evaluated against the
    /// catalog defaults.
    pub fn build(&mut self, command: Arc<KeywordDef>) -> ItemId {
        self.build_root(SchemaPath::root(command))
    }

    pub(crate) fn build_root(&mut self, path: SchemaPath) -> ItemId {
        let root = self.create(path, None);
        self.apply_initial_rules(root);
        self.update_all_conditions(root);
        self.refresh_view(root);
        if let Some(item) = self.get(root) {
            debug!(root = %item.path, items = self.subtree(root).len(), "built item tree");
        }
        root
    }

    /// Creates an item with its schema-shaped children and appends it to
    /// `parent`. Rules are attached but not applied.
    pub(crate) fn create(&mut self, path: SchemaPath, parent: Option<ItemId>) -> ItemId {
        let kind = ItemKind::for_path(&path, &self.config);
        let id = ItemId(self.items.len());
        self.items.push(Some(Item::new(path, kind, parent)));
        if let Some(parent) = parent.and_then(|p| self.get_mut(p)) {
            parent.children.push(id);
        }
        self.populate(id);
        id
    }

    fn populate(&mut self, id: ItemId) {
        let Some(item) = self.get(id) else {
            return;
        };
        let path = item.path.clone();
        let (mapping, container) = (item.is_mapping(), item.is_container());
        let Some(def) = path.resolve() else {
            return;
        };

        if mapping {
            for keyword in &def.keywords {
                self.create(path.absolute(&keyword.name), Some(id));
            }
            for rule in &def.rules {
                self.attach_rule(id, rule);
            }
        } else if container {
            for index in 0..def.min {
                self.create(path.absolute(&index.to_string()), Some(id));
            }
            self.update_floor(id);
        }
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    pub(crate) fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.get(id.0).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.get_mut(id.0).and_then(Option::as_mut)
    }

    pub(crate) fn item(&self, id: ItemId) -> Result<&Item> {
        self.get(id).ok_or(EngineError::UnknownItem(id))
    }

    /// Returns `true` if `id` names a live item.
    pub fn contains(&self, id: ItemId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live items.
    pub fn len(&self) -> usize {
        self.items.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every live root: command trees and detached linked views.
    pub fn roots(&self) -> Vec<ItemId> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| item.as_ref().filter(|i| i.parent.is_none()).map(|_| ItemId(index)))
            .collect()
    }

    pub fn kind(&self, id: ItemId) -> Result<ItemKind> {
        Ok(self.item(id)?.kind)
    }

    pub fn path(&self, id: ItemId) -> Result<&SchemaPath> {
        Ok(&self.item(id)?.path)
    }

    /// Last path segment: keyword name or element index.
    pub fn name(&self, id: ItemId) -> Result<&str> {
        Ok(self.item(id)?.path.name())
    }

    /// Catalog keyword of the item; `None` for undeclared keywords.
    pub fn keyword(&self, id: ItemId) -> Result<Option<&KeywordDef>> {
        Ok(self.item(id)?.keyword())
    }

    pub fn parent(&self, id: ItemId) -> Result<Option<ItemId>> {
        Ok(self.item(id)?.parent)
    }

    pub fn children(&self, id: ItemId) -> Result<&[ItemId]> {
        Ok(&self.item(id)?.children)
    }

    /// Direct child by name.
    pub fn child(&self, id: ItemId, name: &str) -> Option<ItemId> {
        self.get(id)?
            .children
            .iter()
            .copied()
            .find(|c| self.get(*c).is_some_and(|item| item.path.name() == name))
    }

    /// Finds an item by dot-path relative to `id`. Blocs are transparent:
    /// `SOLVER.PIVOT` finds `PIVOT` even when it lives in a bloc of
    /// `SOLVER`.
    pub fn find(&self, id: ItemId, relative: &str) -> Option<ItemId> {
        let mut current = id;
        for segment in relative.split(crate::path::DELIMITER).filter(|s| !s.is_empty()) {
            current = self.child_flattened(current, segment)?;
        }
        Some(current)
    }

    pub(crate) fn child_flattened(&self, id: ItemId, name: &str) -> Option<ItemId> {
        if let Some(child) = self.child(id, name) {
            return Some(child);
        }
        self.get(id)?
            .children
            .iter()
            .filter(|c| self.get(**c).is_some_and(Item::is_bloc))
            .find_map(|bloc| self.child_flattened(*bloc, name))
    }

    /// `id` and all its descendants, parents before children.
    pub(crate) fn subtree(&self, id: ItemId) -> Vec<ItemId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(item) = self.get(current) else {
                continue;
            };
            out.push(current);
            stack.extend(item.children.iter().rev().copied());
        }
        out
    }

    /// Root of the tree containing `id`.
    pub(crate) fn root_of(&self, id: ItemId) -> ItemId {
        let mut current = id;
        while let Some(parent) = self.get(current).and_then(|i| i.parent) {
            current = parent;
        }
        current
    }

    // -----------------------------------------------------------------------
    // Flags
    // -----------------------------------------------------------------------

    /// Effective flags: the item's own flags plus Excluded, Disabled and
    /// Mandatory inherited from its ancestors.
    pub fn flags(&self, id: ItemId) -> Result<ItemFlags> {
        let item = self.item(id)?;
        Ok(item.flags | self.inherited_flags(item.parent))
    }

    /// Flags set on the item itself.
    pub fn own_flags(&self, id: ItemId) -> Result<ItemFlags> {
        Ok(self.item(id)?.flags)
    }

    fn inherited_flags(&self, mut parent: Option<ItemId>) -> ItemFlags {
        let mut flags = ItemFlags::empty();
        while let Some(item) = parent.and_then(|p| self.get(p)) {
            flags |= item.flags & ItemFlags::INHERITED;
            parent = item.parent;
        }
        flags
    }

    /// Sets or clears an own flag. Returns `true` if it changed.
    pub(crate) fn set_flag(&mut self, id: ItemId, flag: ItemFlags, on: bool) -> bool {
        let was_used = self.used(id);
        let Some(item) = self.get_mut(id) else {
            return false;
        };
        if item.flags.contains(flag) == on {
            return false;
        }
        item.flags.set(flag, on);

        let affected = if flag.intersects(ItemFlags::INHERITED) {
            self.subtree(id)
        } else {
            vec![id]
        };
        for item in affected {
            if let Ok(flags) = self.flags(item) {
                self.events.push(ItemEvent::FlagsChanged { item, flags });
                self.refresh.schedule(item);
            }
        }

        if self.used(id) != was_used {
            self.usage_changed(id);
        }
        true
    }

    // -----------------------------------------------------------------------
    // Usage
    // -----------------------------------------------------------------------

    pub(crate) fn used(&self, id: ItemId) -> bool {
        let Some(item) = self.get(id) else {
            return false;
        };
        if item.flags.contains(ItemFlags::DISABLED) {
            return false;
        }
        if item.kind == ItemKind::ListElement {
            return true;
        }
        if item.is_bloc() {
            return !item.flags.contains(ItemFlags::EXCLUDED);
        }
        if item.parent.is_none() {
            return true;
        }
        match item.keyword() {
            Some(def) => def.required || item.flags.contains(ItemFlags::MANDATORY) || item.checked,
            None => item.checked,
        }
    }

    /// Returns `true` if the item contributes to its parent's value.
    ///
    /// Usage is: required by the catalog, forced Mandatory by a rule, checked
    /// by the user, or a list element; and never when Disabled. Blocs are used
    /// while their condition holds; roots are always used.
    pub fn is_used(&self, id: ItemId) -> Result<bool> {
        self.item(id)?;
        Ok(self.used(id))
    }

    /// Returns `true` if the user checked the item.
    pub fn is_checked(&self, id: ItemId) -> Result<bool> {
        Ok(self.item(id)?.checked)
    }

    /// Checks or unchecks an item, then propagates rule effects to its rule
    /// siblings and re-evaluates conditions.
    ///
    /// This is the direct user toggle: an ExactlyOne group left empty by it
    /// re-selects its first keyword.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use command_params_core::{KeywordDef, RuleDef, RuleKind, ValueType};
    /// use command_params_engine::ItemTree;
    ///
    /// let command = KeywordDef::command("CMD")
    ///     .with_keyword(KeywordDef::simple("A", ValueType::Int))
    ///     .with_keyword(KeywordDef::simple("B", ValueType::Int))
    ///     .with_rule(RuleDef::new(RuleKind::ExactlyOne, &["A", "B"]));
    ///
    /// let mut tree = ItemTree::new();
    /// let root = tree.build(Arc::new(command));
    /// let (a, b) = (tree.find(root, "A").unwrap(), tree.find(root, "B").unwrap());
    /// assert!(tree.is_used(a).unwrap());
    ///
    /// tree.set_used(b, true).unwrap();
    /// assert!(!tree.is_used(a).unwrap());
    /// assert!(tree.is_used(b).unwrap());
    /// ```
    pub fn set_used(&mut self, id: ItemId, on: bool) -> Result<()> {
        self.item(id)?;
        if self.set_checked(id, on) {
            self.update_rules(id, true);
            self.value_changed(id);
        }
        Ok(())
    }

    /// Sets the checked state. Returns `true` if usage changed.
    pub(crate) fn set_checked(&mut self, id: ItemId, on: bool) -> bool {
        let was_used = self.used(id);
        let Some(item) = self.get_mut(id) else {
            return false;
        };
        if item.checked == on {
            return false;
        }
        item.checked = on;
        if self.used(id) == was_used {
            return false;
        }
        self.usage_changed(id);
        true
    }

    fn usage_changed(&mut self, id: ItemId) {
        let used = self.used(id);
        self.events.push(ItemEvent::UsageChanged { item: id, used });
        self.refresh.schedule(id);
        if self.config.hide_unused {
            self.set_flag(id, ItemFlags::HIDE_UNUSED, !used);
        }
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    /// Notifies dependents of `id` and bubbles the change to the root,
    /// re-evaluating bloc conditions at every scope on the way.
    pub(crate) fn value_changed(&mut self, id: ItemId) {
        let mut linked_master = None;
        let mut current = Some(id);
        while let Some(cur) = current {
            let Some(item) = self.get(cur) else {
                break;
            };
            let parent = item.parent;
            let master = item.master();
            if linked_master.is_none() && item.slave().is_some() {
                linked_master = Some(cur);
            }
            let dependents = item.dependents.clone();
            let scope = item.is_mapping() && !item.is_bloc();

            self.events.push(ItemEvent::ValueChanged(cur));
            self.refresh.schedule(cur);
            for dependent in dependents {
                self.events.push(ItemEvent::DependChanged {
                    item: dependent,
                    source: cur,
                });
                self.refresh.schedule(dependent);
            }
            if scope {
                self.update_conditions(cur);
            }
            if let (None, Some(master), false) = (parent, master, self.mirroring) {
                self.events.push(ItemEvent::LinkedValueChanged { master, slave: cur });
                self.refresh.schedule(master);
            }
            current = parent;
        }

        // Only the nearest open view is refreshed.
        if let Some(master) = linked_master {
            self.mirror_to_slave(master);
        }
    }

    /// Drains pending change notifications.
    ///
    /// Nothing else clears the buffer, so call this after every batch of
    /// edits.
    pub fn take_events(&mut self) -> Vec<ItemEvent> {
        std::mem::take(&mut self.events)
    }

    /// Schedules a coalesced visual refresh of `id`.
    pub fn update_item(&mut self, id: ItemId) -> Result<()> {
        self.item(id)?;
        self.refresh.schedule(id);
        Ok(())
    }

    /// Returns every item whose refresh is due, once each.
    pub fn flush_refresh(&mut self) -> Vec<ItemId> {
        self.refresh.drain()
    }

    // -----------------------------------------------------------------------
    // Dependencies
    // -----------------------------------------------------------------------

    /// Registers `dependent` to receive
    /// [`DependChanged`](ItemEvent::DependChanged) whenever `source` changes
    /// value.
    pub fn add_dependency(&mut self, source: ItemId, dependent: ItemId) -> Result<()> {
        self.item(dependent)?;
        let item = self.get_mut(source).ok_or(EngineError::UnknownItem(source))?;
        if !item.dependents.contains(&dependent) {
            item.dependents.push(dependent);
        }
        if let Some(item) = self.get_mut(dependent) {
            if !item.depends_on.contains(&source) {
                item.depends_on.push(source);
            }
        }
        Ok(())
    }

    pub fn remove_dependency(&mut self, source: ItemId, dependent: ItemId) -> Result<()> {
        self.item(dependent)?;
        let item = self.get_mut(source).ok_or(EngineError::UnknownItem(source))?;
        item.dependents.retain(|d| *d != dependent);
        if let Some(item) = self.get_mut(dependent) {
            item.depends_on.retain(|s| *s != source);
        }
        Ok(())
    }

    /// Items registered as depending on `id`.
    pub fn dependents(&self, id: ItemId) -> Result<&[ItemId]> {
        Ok(&self.item(id)?.dependents)
    }

    // -----------------------------------------------------------------------
    // Destruction
    // -----------------------------------------------------------------------

    /// Removes an item and its subtree.
    ///
    /// Flags are cleared, dependency edges released, an open linked view is
    /// closed, owned rules are dropped and pending refreshes cancelled. Every
    /// removed item emits [`Destroyed`](ItemEvent::Destroyed).
    pub fn destroy(&mut self, id: ItemId) -> Result<()> {
        self.item(id)?;
        self.destroy_item(id);
        Ok(())
    }

    pub(crate) fn destroy_item(&mut self, id: ItemId) {
        let Some(item) = self.get(id) else {
            return;
        };
        for child in item.children.clone() {
            self.destroy_item(child);
        }

        let Some(item) = self.get(id) else {
            return;
        };
        let parent = item.parent;
        let link = item.link;
        let dependents = item.dependents.clone();
        let depends_on = item.depends_on.clone();
        let owned_rules = item.owned_rules.clone();
        let rules = item.rules.clone();
        let flags = item.flags;

        if let Some(parent) = parent.and_then(|p| self.get_mut(p)) {
            parent.children.retain(|c| *c != id);
        }
        if !flags.is_empty() {
            if let Some(item) = self.get_mut(id) {
                item.flags = ItemFlags::empty();
            }
            self.events.push(ItemEvent::FlagsChanged {
                item: id,
                flags: ItemFlags::empty(),
            });
        }
        for dependent in dependents {
            if let Some(item) = self.get_mut(dependent) {
                item.depends_on.retain(|s| *s != id);
            }
        }
        for source in depends_on {
            if let Some(item) = self.get_mut(source) {
                item.dependents.retain(|d| *d != id);
            }
        }
        match link {
            Some(Link::Master(slave)) => self.destroy_item(slave),
            Some(Link::Slave(master)) => {
                if let Some(item) = self.get_mut(master) {
                    item.link = None;
                }
            }
            None => {}
        }
        for rule in owned_rules {
            self.drop_rule(rule);
        }
        for rule in rules {
            if let Some(rule) = self.rules.get_mut(rule.0).and_then(Option::as_mut) {
                rule.items.retain(|i| *i != id);
            }
        }

        self.refresh.cancel(id);
        self.events.push(ItemEvent::Destroyed(id));
        self.items[id.0] = None;
    }

    /// Stored value of an `Edit` or scalar `ListElement` item, without
    /// catalog default.
    pub(crate) fn raw_value(&self, id: ItemId) -> Option<&Document> {
        self.get(id)?.value.as_ref()
    }
}
