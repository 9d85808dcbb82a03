use std::fmt;

use command_params_core::{Document, KeywordDef, KeywordKind};

use crate::rule::RuleId;
use crate::{EditorConfig, ItemFlags, SchemaPath};

/// Stable handle to an item in an [`ItemTree`](crate::ItemTree).
///
/// Handles are never reused, so a handle to a destroyed item keeps failing
/// with [`UnknownItem`](crate::EngineError::UnknownItem).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub(crate) usize);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Node variants of the item tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// A single value: scalar, object reference, composite edited as a whole,
    /// or an undeclared keyword kept as-is.
    Edit,
    /// One element of a list or sequence. Holds a scalar for lists of simple
    /// values, or keyword children for repeated factors.
    ListElement,
    /// Command, factor or bloc (`list: false`), or a list of simple values
    /// (`list: true`).
    Block { list: bool },
    /// Repeated factor edited element by element.
    Sequence,
}

impl ItemKind {
    /// Picks the variant for a catalog location.
    pub(crate) fn for_path(path: &SchemaPath, config: &EditorConfig) -> Self {
        let Some(def) = path.resolve() else {
            return ItemKind::Edit;
        };
        if path.is_sequence_element() {
            return ItemKind::ListElement;
        }
        match def.kind {
            KeywordKind::Command | KeywordKind::Bloc => ItemKind::Block { list: false },
            KeywordKind::Factor if def.is_list() && config.external_list_editor => ItemKind::Edit,
            KeywordKind::Factor if def.is_list() => ItemKind::Sequence,
            KeywordKind::Factor => ItemKind::Block { list: false },
            KeywordKind::Simple if def.is_list() => ItemKind::Block { list: true },
            KeywordKind::Simple => ItemKind::Edit,
        }
    }
}

/// Pairing between an item and its detached view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Link {
    Master(ItemId),
    Slave(ItemId),
}

#[derive(Debug)]
pub(crate) struct Item {
    pub(crate) path: SchemaPath,
    pub(crate) kind: ItemKind,
    pub(crate) parent: Option<ItemId>,
    pub(crate) children: Vec<ItemId>,
    /// Own flags; see `ItemTree::flags` for the effective set.
    pub(crate) flags: ItemFlags,
    pub(crate) checked: bool,
    pub(crate) value: Option<Document>,
    pub(crate) dependents: Vec<ItemId>,
    pub(crate) depends_on: Vec<ItemId>,
    pub(crate) link: Option<Link>,
    /// Rules attached at the parent level that reference this item.
    pub(crate) rules: Vec<RuleId>,
    /// Rules declared on this item's keyword.
    pub(crate) owned_rules: Vec<RuleId>,
}

impl Item {
    pub(crate) fn new(path: SchemaPath, kind: ItemKind, parent: Option<ItemId>) -> Self {
        Self {
            path,
            kind,
            parent,
            children: Vec::new(),
            flags: ItemFlags::empty(),
            checked: false,
            value: None,
            dependents: Vec::new(),
            depends_on: Vec::new(),
            link: None,
            rules: Vec::new(),
            owned_rules: Vec::new(),
        }
    }

    pub(crate) fn keyword(&self) -> Option<&KeywordDef> {
        self.path.resolve()
    }

    /// Undeclared keyword kept as a raw value.
    pub(crate) fn is_opaque(&self) -> bool {
        self.keyword().is_none()
    }

    pub(crate) fn is_bloc(&self) -> bool {
        self.keyword().is_some_and(|k| k.kind == KeywordKind::Bloc)
    }

    /// Serializes as a mapping of keyword children.
    pub(crate) fn is_mapping(&self) -> bool {
        match self.kind {
            ItemKind::Block { list } => !list,
            ItemKind::ListElement => self.keyword().is_some_and(|k| k.kind.is_block()),
            ItemKind::Edit | ItemKind::Sequence => false,
        }
    }

    /// Holds list elements.
    pub(crate) fn is_container(&self) -> bool {
        matches!(self.kind, ItemKind::Block { list: true } | ItemKind::Sequence)
    }

    pub(crate) fn master(&self) -> Option<ItemId> {
        match self.link {
            Some(Link::Slave(master)) => Some(master),
            _ => None,
        }
    }

    pub(crate) fn slave(&self) -> Option<ItemId> {
        match self.link {
            Some(Link::Master(slave)) => Some(slave),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use command_params_core::ValueType;

    use super::*;

    fn command() -> Arc<KeywordDef> {
        Arc::new(
            KeywordDef::command("CMD")
                .with_keyword(KeywordDef::simple("N", ValueType::Int))
                .with_keyword(KeywordDef::simple("GROUPS", ValueType::Text).with_cardinality(1, None))
                .with_keyword(KeywordDef::factor("SOLVER"))
                .with_keyword(KeywordDef::factor("LOAD").with_cardinality(1, None))
                .with_keyword(KeywordDef::bloc("b_n", "N == 1")),
        )
    }

    #[test]
    fn test_kind_selection() {
        let config = EditorConfig::default();
        let root = SchemaPath::root(command());
        let kind = |rel: &str| ItemKind::for_path(&root.absolute(rel), &config);

        assert_eq!(ItemKind::for_path(&root, &config), ItemKind::Block { list: false });
        assert_eq!(kind("N"), ItemKind::Edit);
        assert_eq!(kind("GROUPS"), ItemKind::Block { list: true });
        assert_eq!(kind("GROUPS.0"), ItemKind::ListElement);
        assert_eq!(kind("SOLVER"), ItemKind::Block { list: false });
        assert_eq!(kind("LOAD"), ItemKind::Sequence);
        assert_eq!(kind("b_n"), ItemKind::Block { list: false });
        assert_eq!(kind("UNKNOWN"), ItemKind::Edit);
    }

    #[test]
    fn test_external_list_editor_makes_composite_edit() {
        let config = EditorConfig {
            external_list_editor: true,
            ..EditorConfig::default()
        };
        let path = SchemaPath::root(command()).absolute("LOAD");

        assert_eq!(ItemKind::for_path(&path, &config), ItemKind::Edit);
    }
}
