//! Rule propagation between sibling items.
//!
//! A rule declared on a block keyword becomes one [`Rule`] referencing the
//! block's items (looking through blocs). When an item's usage changes, every
//! rule referencing it reacts, possibly changing the usage of its other
//! items, which wakes their rules in turn.
//!
//! Propagation runs in waves. A rule joins the wave's visited set while it
//! reacts and leaves it on return; a rule already in the set is skipped. Each
//! rule therefore runs at most once per chain of reactions, which bounds the
//! work even when rules form cycles.

use std::collections::HashSet;

use command_params_core::{RuleDef, RuleKind};
use tracing::{debug, trace, warn};

use crate::item::ItemId;
use crate::{ItemFlags, ItemTree};

/// Handle to a rule attached in an [`ItemTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct RuleId(pub(crate) usize);

#[derive(Debug)]
pub(crate) struct Rule {
    pub(crate) kind: RuleKind,
    /// Owning block.
    pub(crate) block: ItemId,
    /// Referenced items, in declaration order.
    pub(crate) items: Vec<ItemId>,
}

/// One propagation wave.
#[derive(Debug, Default)]
struct Wave {
    visited: HashSet<RuleId>,
    steps: usize,
}

impl ItemTree {
    pub(crate) fn attach_rule(&mut self, block: ItemId, def: &RuleDef) {
        let items: Option<Vec<ItemId>> = def
            .keywords
            .iter()
            .map(|name| self.child_flattened(block, name))
            .collect();
        let Some(items) = items else {
            warn!(rule = ?def.kind, keywords = ?def.keywords, "rule references missing keywords, skipped");
            return;
        };

        let id = RuleId(self.rules.len());
        for item in &items {
            if let Some(item) = self.get_mut(*item) {
                item.rules.push(id);
            }
        }
        if let Some(block) = self.get_mut(block) {
            block.owned_rules.push(id);
        }
        self.rules.push(Some(Rule {
            kind: def.kind,
            block,
            items,
        }));
    }

    pub(crate) fn drop_rule(&mut self, id: RuleId) {
        let Some(rule) = self.rules.get_mut(id.0).and_then(Option::take) else {
            return;
        };
        for item in rule.items {
            if let Some(item) = self.get_mut(item) {
                item.rules.retain(|r| *r != id);
            }
        }
        if let Some(block) = self.get_mut(rule.block) {
            block.owned_rules.retain(|r| *r != id);
        }
    }

    fn rule(&self, id: RuleId) -> Option<&Rule> {
        self.rules.get(id.0).and_then(Option::as_ref)
    }

    /// Kinds of the rules referencing an item, in attachment order.
    pub fn rule_kinds(&self, id: ItemId) -> Vec<RuleKind> {
        self.get(id)
            .map(|item| {
                item.rules
                    .iter()
                    .filter_map(|r| self.rule(*r))
                    .map(|r| r.kind)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Starts a propagation wave for a usage change of `trigger`.
    ///
    /// `direct` marks a user toggle; only then may an emptied ExactlyOne or
    /// AtLeastOne group re-select its first item.
    pub(crate) fn update_rules(&mut self, trigger: ItemId, direct: bool) {
        let mut wave = Wave::default();
        self.propagate(trigger, direct, &mut wave);
        if wave.steps > 0 {
            debug!(item = %trigger, direct, steps = wave.steps, "rule wave finished");
        }
    }

    fn propagate(&mut self, trigger: ItemId, direct: bool, wave: &mut Wave) {
        let rules = match self.get(trigger) {
            Some(item) => item.rules.clone(),
            None => return,
        };
        for rule in rules {
            if !wave.visited.contains(&rule) {
                self.state_changed(rule, trigger, direct, wave);
            }
        }
    }

    fn state_changed(&mut self, id: RuleId, trigger: ItemId, direct: bool, wave: &mut Wave) {
        let Some(rule) = self.rule(id) else {
            return;
        };
        let kind = rule.kind;
        let items = rule.items.clone();
        wave.visited.insert(id);
        wave.steps += 1;
        trace!(rule = ?kind, trigger = %trigger, direct, "rule reacting");

        let mut changed = Vec::new();
        match kind {
            RuleKind::ExactlyOne => {
                self.at_most_one(&items, trigger, &mut changed);
                if direct {
                    self.at_least_one(&items, &mut changed);
                }
            }
            RuleKind::AtMostOne => self.at_most_one(&items, trigger, &mut changed),
            RuleKind::AtLeastOne => {
                if direct {
                    self.at_least_one(&items, &mut changed);
                }
            }
            RuleKind::AllTogether => self.all_together(&items, trigger, &mut changed),
            RuleKind::IfFirstAllPresent | RuleKind::OnlyFirstPresent => {
                if items.first() == Some(&trigger) {
                    self.force_followers(kind, &items, &mut changed);
                }
            }
        }

        for item in changed {
            self.propagate(item, false, wave);
        }
        wave.visited.remove(&id);
    }

    fn at_most_one(&mut self, items: &[ItemId], trigger: ItemId, changed: &mut Vec<ItemId>) {
        if !self.used(trigger) {
            return;
        }
        for other in items.iter().copied().filter(|i| *i != trigger) {
            if self.used(other) && self.set_checked(other, false) {
                changed.push(other);
            }
        }
    }

    fn at_least_one(&mut self, items: &[ItemId], changed: &mut Vec<ItemId>) {
        if items.iter().any(|i| self.used(*i)) {
            return;
        }
        let first = items.iter().copied().find(|i| {
            self.get(*i)
                .is_some_and(|item| !item.flags.contains(ItemFlags::DISABLED))
        });
        if let Some(first) = first {
            if self.set_checked(first, true) {
                changed.push(first);
            }
        }
    }

    fn all_together(&mut self, items: &[ItemId], trigger: ItemId, changed: &mut Vec<ItemId>) {
        let target = self.used(trigger);
        for other in items.iter().copied().filter(|i| *i != trigger) {
            if self.used(other) != target && self.set_checked(other, target) {
                changed.push(other);
            }
        }
    }

    /// Recomputes Mandatory (IfFirstAllPresent) or Disabled
    /// (OnlyFirstPresent) on every follower of a rule.
    fn force_followers(&mut self, kind: RuleKind, items: &[ItemId], changed: &mut Vec<ItemId>) {
        let flag = match kind {
            RuleKind::IfFirstAllPresent => ItemFlags::MANDATORY,
            _ => ItemFlags::DISABLED,
        };
        for follower in items.iter().skip(1).copied() {
            let forced = self.forced_by(kind, follower);
            let was_used = self.used(follower);
            self.set_flag(follower, flag, forced);
            if self.used(follower) != was_used {
                changed.push(follower);
            }
        }
    }

    /// A follower is forced when any rule of `kind` lists it after a first
    /// item that is used.
    fn forced_by(&self, kind: RuleKind, follower: ItemId) -> bool {
        let Some(item) = self.get(follower) else {
            return false;
        };
        item.rules
            .iter()
            .filter_map(|r| self.rule(*r))
            .filter(|r| r.kind == kind)
            .any(|r| match r.items.first() {
                Some(first) => *first != follower && self.used(*first),
                None => false,
            })
    }

    /// Applies every rule owned in the subtree of `id` as if freshly
    /// attached: empty ExactlyOne / AtLeastOne groups select their first
    /// item, and forced flags are recomputed.
    pub(crate) fn apply_initial_rules(&mut self, id: ItemId) {
        let owned: Vec<RuleId> = self
            .subtree(id)
            .into_iter()
            .filter_map(|i| self.get(i).map(|item| item.owned_rules.clone()))
            .flatten()
            .collect();

        for rule_id in owned {
            let Some(rule) = self.rule(rule_id) else {
                continue;
            };
            let kind = rule.kind;
            let items = rule.items.clone();
            let mut wave = Wave::default();
            wave.visited.insert(rule_id);

            let mut changed = Vec::new();
            match kind {
                RuleKind::ExactlyOne | RuleKind::AtLeastOne => {
                    self.at_least_one(&items, &mut changed)
                }
                RuleKind::IfFirstAllPresent | RuleKind::OnlyFirstPresent => {
                    self.force_followers(kind, &items, &mut changed)
                }
                RuleKind::AtMostOne | RuleKind::AllTogether => {}
            }
            for item in changed {
                self.propagate(item, false, &mut wave);
            }
        }
    }
}
