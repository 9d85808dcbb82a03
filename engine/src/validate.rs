//! Document validation with failure location.

use command_params_core::{Context, Document, DocumentChecker, RuleKind};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::item::ItemId;
use crate::{ItemFlags, ItemTree, ValueOptions};

/// Outcome of [`ItemTree::validate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Pass,
    Fail {
        /// Most specific live item on the failure path.
        item: ItemId,
        /// Failure path reported by the checker, relative to the validated
        /// item.
        path: Vec<String>,
        /// Violated rule, when a rule failed.
        rule: Option<RuleKind>,
        message: String,
    },
}

impl Validation {
    pub fn is_pass(&self) -> bool {
        matches!(self, Validation::Pass)
    }
}

impl ItemTree {
    /// Checks the global value of `id` with `checker`, in the defaulted
    /// context of its parent scope (of the master's parent scope for a linked
    /// view root).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnresolvedPath`] for items without a catalog
    /// keyword. A failed check is a [`Validation::Fail`], not an error.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use command_params_core::{KeywordDef, SchemaChecker, ValueType};
    /// use command_params_engine::{ItemTree, Validation};
    /// use serde_json::json;
    ///
    /// let command = KeywordDef::command("CMD")
    ///     .with_keyword(KeywordDef::simple("N", ValueType::Int).with_range(Some(0.0), None));
    /// let mut tree = ItemTree::new();
    /// let root = tree.build(Arc::new(command));
    /// let n = tree.find(root, "N").unwrap();
    /// tree.set_item_value(n, json!(-1)).unwrap();
    ///
    /// match tree.validate(root, &SchemaChecker).unwrap() {
    ///     Validation::Fail { item, .. } => assert_eq!(item, n),
    ///     Validation::Pass => unreachable!(),
    /// }
    /// ```
    pub fn validate(&self, id: ItemId, checker: &dyn DocumentChecker) -> Result<Validation> {
        let item = self.item(id)?;
        let Some(def) = item.keyword() else {
            return Err(EngineError::UnresolvedPath(item.path.to_string()));
        };

        let document = self
            .value_of(id, ValueOptions::default().global())
            .unwrap_or(Document::Null);
        let outer = item.master().unwrap_or(id);
        let context = match self.get(outer).and_then(|i| i.parent) {
            Some(parent) => self.defaulted_context(parent)?,
            None => Context::new(),
        };

        match checker.check(def, &document, &context) {
            Ok(()) => Ok(Validation::Pass),
            Err(failure) => {
                let located = self.locate(id, &failure.path);
                debug!(item = %located, path = ?failure.path, message = %failure.message, "validation failed");
                Ok(Validation::Fail {
                    item: located,
                    path: failure.path,
                    rule: failure.rule,
                    message: failure.message,
                })
            }
        }
    }

    /// Walks a failure path from `start`, skipping hidden items, and returns
    /// the deepest item reached.
    pub fn locate(&self, start: ItemId, path: &[String]) -> ItemId {
        let mut current = self.follow_view(start);
        for segment in path {
            let next = match self.get(current) {
                Some(item) if item.is_container() => segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| item.children.get(index).copied())
                    .filter(|c| self.is_visible(*c)),
                // Single mappings of repeatable factors still report an index.
                Some(_) if segment.bytes().all(|b| b.is_ascii_digit()) => continue,
                Some(_) => self.visible_child(current, segment),
                None => None,
            };
            match next {
                Some(next) => current = self.follow_view(next),
                None => break,
            }
        }
        current
    }

    fn follow_view(&self, id: ItemId) -> ItemId {
        self.get(id).and_then(|i| i.slave()).unwrap_or(id)
    }

    fn is_visible(&self, id: ItemId) -> bool {
        self.get(id)
            .is_some_and(|i| !i.flags.intersects(ItemFlags::FILTERED | ItemFlags::EXCLUDED))
    }

    /// Named child, looking through visible blocs.
    fn visible_child(&self, id: ItemId, name: &str) -> Option<ItemId> {
        let item = self.get(id)?;
        let mut blocs = Vec::new();
        for child in item.children.iter().copied() {
            let Some(child_item) = self.get(child) else {
                continue;
            };
            if !self.is_visible(child) {
                continue;
            }
            if child_item.is_bloc() {
                blocs.push(child);
            } else if child_item.path.name() == name {
                return Some(child);
            }
        }
        blocs.into_iter().find_map(|bloc| self.visible_child(bloc, name))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use command_params_core::{KeywordDef, RuleDef, SchemaChecker, ValueType};
    use serde_json::json;

    use super::*;

    fn command() -> Arc<KeywordDef> {
        Arc::new(
            KeywordDef::command("CMD")
                .with_keyword(KeywordDef::simple("MODEL", ValueType::Object).required())
                .with_keyword(
                    KeywordDef::factor("LOAD")
                        .with_cardinality(1, None)
                        .with_keyword(KeywordDef::simple("CHARGE", ValueType::Object))
                        .with_keyword(KeywordDef::simple("COEF", ValueType::Real))
                        .with_rule(RuleDef::new(RuleKind::AllTogether, &["CHARGE", "COEF"])),
                ),
        )
    }

    #[test]
    fn test_missing_mandatory_locates_keyword() {
        let mut tree = ItemTree::new();
        let root = tree.build(command());
        let model = tree.find(root, "MODEL").unwrap();

        let result = tree.validate(root, &SchemaChecker).unwrap();
        assert!(matches!(result, Validation::Fail { item, .. } if item == model));
    }

    #[test]
    fn test_failure_inside_sequence_element() {
        let mut tree = ItemTree::new();
        let root = tree.build(command());
        tree.set_item_value(
            root,
            json!({
                "MODEL": "mo",
                "LOAD": [{ "CHARGE": "c1", "COEF": 1.0 }, { "CHARGE": "c2", "COEF": "x" }],
            }),
        )
        .unwrap();

        let load = tree.find(root, "LOAD").unwrap();
        let second = tree.children(load).unwrap()[1];
        let coef = tree.find(second, "COEF").unwrap();
        match tree.validate(root, &SchemaChecker).unwrap() {
            Validation::Fail { item, path, .. } => {
                assert_eq!(item, coef);
                assert_eq!(path, vec!["LOAD", "1", "COEF"]);
            }
            Validation::Pass => panic!("expected failure"),
        }
    }

    #[test]
    fn test_valid_document_passes() {
        let mut tree = ItemTree::new();
        let root = tree.build(command());
        tree.set_item_value(root, json!({ "MODEL": "mo", "LOAD": { "CHARGE": "c", "COEF": 2.0 } }))
            .unwrap();

        assert!(tree.validate(root, &SchemaChecker).unwrap().is_pass());
    }

    #[test]
    fn test_opaque_item_cannot_be_validated() {
        let mut tree = ItemTree::new();
        let root = tree.build(command());
        tree.set_item_value(root, json!({ "MODEL": "mo", "EXTRA": 1 })).unwrap();
        let extra = tree.child(root, "EXTRA").unwrap();

        assert!(matches!(
            tree.validate(extra, &SchemaChecker),
            Err(EngineError::UnresolvedPath(_))
        ));
    }
}
