//! Bloc visibility.
//!
//! A bloc is Excluded while its condition is false. Conditions are evaluated
//! against the defaulted context of the bloc's scope, the nearest enclosing
//! command, factor or factor element: values of used keywords, plus catalog
//! defaults of unused ones. Blocs flatten into their scope, so one bloc's
//! keywords can feed another bloc's condition; evaluation repeats until no
//! flag changes.

use command_params_core::{Condition, Context};
use tracing::warn;

use crate::item::ItemId;
use crate::{ItemFlags, ItemTree, ValueOptions};

impl ItemTree {
    /// Nearest ancestor-or-self holding keywords: a command, factor or factor
    /// element. Falls back to `id` when there is none.
    pub(crate) fn scope_of(&self, id: ItemId) -> ItemId {
        let mut current = id;
        while let Some(item) = self.get(current) {
            if item.is_mapping() && !item.is_bloc() {
                return current;
            }
            match item.parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        id
    }

    /// One-level context of the scope containing `id`: used keywords with
    /// their values, unused keywords with their catalog defaults, flattened
    /// through active blocs.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use command_params_core::{KeywordDef, ValueType};
    /// use command_params_engine::ItemTree;
    /// use serde_json::json;
    ///
    /// let command = KeywordDef::command("CMD")
    ///     .with_keyword(KeywordDef::simple("X", ValueType::Int).with_default(json!(0)))
    ///     .with_keyword(KeywordDef::simple("Y", ValueType::Int));
    ///
    /// let mut tree = ItemTree::new();
    /// let root = tree.build(Arc::new(command));
    /// let context = tree.defaulted_context(root).unwrap();
    /// assert_eq!(context.get("X"), Some(&json!(0)));
    /// assert!(!context.contains_key("Y"));
    /// ```
    pub fn defaulted_context(&self, id: ItemId) -> crate::Result<Context> {
        self.item(id)?;
        let mut context = Context::new();
        self.collect_context(self.scope_of(id), &mut context);
        Ok(context)
    }

    fn collect_context(&self, id: ItemId, context: &mut Context) {
        let Some(item) = self.get(id) else {
            return;
        };
        for child in item.children.iter().copied() {
            let Some(child_item) = self.get(child) else {
                continue;
            };
            if child_item.is_bloc() {
                if !child_item.flags.contains(ItemFlags::EXCLUDED) {
                    self.collect_context(child, context);
                }
                continue;
            }
            let name = child_item.path.name().to_string();
            let value = if self.used(child) {
                self.value_of(child, ValueOptions::default())
            } else {
                child_item.keyword().and_then(|k| k.default.clone())
            };
            if let Some(value) = value {
                context.insert(name, value);
            }
        }
    }

    /// Blocs under `scope`, parents before nested blocs.
    fn scope_blocs(&self, scope: ItemId) -> Vec<ItemId> {
        let mut out = Vec::new();
        let mut stack: Vec<ItemId> = self
            .get(scope)
            .map(|i| i.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(current) = stack.pop() {
            let Some(item) = self.get(current) else {
                continue;
            };
            if item.is_bloc() {
                out.push(current);
                stack.extend(item.children.iter().rev().copied());
            }
        }
        out
    }

    /// Re-evaluates every bloc condition of a scope until stable.
    pub(crate) fn update_conditions(&mut self, scope: ItemId) {
        let blocs = self.scope_blocs(scope);
        if blocs.is_empty() {
            return;
        }

        for _ in 0..=blocs.len() {
            let context = self.collect_scope_context(scope);
            let mut changed = false;
            for bloc in &blocs {
                let parent_excluded = self
                    .get(*bloc)
                    .and_then(|i| i.parent)
                    .and_then(|p| self.get(p))
                    .is_some_and(|p| p.is_bloc() && p.flags.contains(ItemFlags::EXCLUDED));
                let excluded = parent_excluded || !self.condition_holds(*bloc, &context);
                changed |= self.set_flag(*bloc, ItemFlags::EXCLUDED, excluded);
            }
            if !changed {
                break;
            }
        }
    }

    fn collect_scope_context(&self, scope: ItemId) -> Context {
        let mut context = Context::new();
        self.collect_context(scope, &mut context);
        context
    }

    /// Re-evaluates conditions in every scope of a subtree, outermost first.
    pub(crate) fn update_all_conditions(&mut self, id: ItemId) {
        let scopes: Vec<ItemId> = self
            .subtree(id)
            .into_iter()
            .filter(|i| self.get(*i).is_some_and(|item| item.is_mapping() && !item.is_bloc()))
            .collect();
        for scope in scopes {
            self.update_conditions(scope);
        }
    }

    /// Unparsable conditions keep the bloc visible.
    fn condition_holds(&mut self, bloc: ItemId, context: &Context) -> bool {
        let Some(source) = self
            .get(bloc)
            .and_then(|i| i.keyword())
            .and_then(|k| k.condition.clone())
        else {
            return true;
        };
        if !self.conditions.contains_key(&source) {
            let parsed = match Condition::parse(&source) {
                Ok(condition) => Some(condition),
                Err(error) => {
                    warn!(condition = %source, %error, "unparsable bloc condition, keeping bloc visible");
                    None
                }
            };
            self.conditions.insert(source.clone(), parsed);
        }
        match self.conditions.get(&source) {
            Some(Some(condition)) => condition.evaluate(context),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use command_params_core::{KeywordDef, ValueType};
    use serde_json::json;

    use super::*;

    #[test]
    fn test_chained_blocs_reach_fixpoint() {
        // b_second depends on a default that only b_first provides.
        let command = KeywordDef::command("CMD")
            .with_keyword(KeywordDef::simple("MODE", ValueType::Text).with_default(json!("A")))
            .with_keyword(
                KeywordDef::bloc("b_second", "LEVEL == 2")
                    .with_keyword(KeywordDef::simple("DEPTH", ValueType::Int)),
            )
            .with_keyword(
                KeywordDef::bloc("b_first", "MODE == 'A'")
                    .with_keyword(KeywordDef::simple("LEVEL", ValueType::Int).with_default(json!(2))),
            );

        let mut tree = ItemTree::new();
        let root = tree.build(Arc::new(command));
        let first = tree.child(root, "b_first").unwrap();
        let second = tree.child(root, "b_second").unwrap();

        assert!(tree.is_used(first).unwrap());
        assert!(tree.is_used(second).unwrap());

        let mode = tree.find(root, "MODE").unwrap();
        tree.set_item_value(mode, json!("B")).unwrap();
        assert!(!tree.is_used(first).unwrap());
        assert!(!tree.is_used(second).unwrap());
    }

    #[test]
    fn test_nested_bloc_excluded_with_parent() {
        let command = KeywordDef::command("CMD")
            .with_keyword(KeywordDef::simple("X", ValueType::Int).with_default(json!(0)))
            .with_keyword(
                KeywordDef::bloc("b_outer", "X == 1").with_keyword(
                    KeywordDef::bloc("b_inner", "True")
                        .with_keyword(KeywordDef::simple("Y", ValueType::Int)),
                ),
            );

        let mut tree = ItemTree::new();
        let root = tree.build(Arc::new(command));
        let inner = tree.find(root, "b_outer.b_inner").unwrap();
        assert!(tree.own_flags(inner).unwrap().contains(ItemFlags::EXCLUDED));

        let x = tree.find(root, "X").unwrap();
        tree.set_item_value(x, json!(1)).unwrap();
        assert!(tree.flags(inner).unwrap().is_empty());
    }

    #[test]
    fn test_unparsable_condition_keeps_bloc_visible() {
        let command = KeywordDef::command("CMD").with_keyword(
            KeywordDef::bloc("b_broken", "X ==").with_keyword(KeywordDef::simple("Y", ValueType::Int)),
        );

        let mut tree = ItemTree::new();
        let root = tree.build(Arc::new(command));
        let bloc = tree.child(root, "b_broken").unwrap();

        assert!(tree.is_used(bloc).unwrap());
        assert_eq!(tree.conditions.get("X =="), Some(&None));
    }

    #[test]
    fn test_context_prefers_used_value_over_default() {
        let command = KeywordDef::command("CMD")
            .with_keyword(KeywordDef::simple("X", ValueType::Int).with_default(json!(0)));

        let mut tree = ItemTree::new();
        let root = tree.build(Arc::new(command));
        let x = tree.find(root, "X").unwrap();
        tree.set_item_value(x, json!(5)).unwrap();

        assert_eq!(tree.defaulted_context(x).unwrap().get("X"), Some(&json!(5)));
    }
}
