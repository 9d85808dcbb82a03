//! Change notifications and the coalesced refresh queue.

use crate::{ItemFlags, ItemId};

/// Notification for the rendering layer, drained with
/// [`ItemTree::take_events`](crate::ItemTree::take_events).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemEvent {
    /// The item's serialized value may have changed.
    ValueChanged(ItemId),
    /// The item became used or unused.
    UsageChanged { item: ItemId, used: bool },
    /// The item's effective flags changed.
    FlagsChanged { item: ItemId, flags: ItemFlags },
    /// An item `item` depends on changed its value.
    DependChanged { item: ItemId, source: ItemId },
    /// A list element moved to a new index.
    Reindexed { item: ItemId, index: usize },
    /// The linked view of `master` changed its value.
    LinkedValueChanged { master: ItemId, slave: ItemId },
    /// The item was removed from the tree.
    Destroyed(ItemId),
}

/// Pending visual refreshes, at most one per item.
///
/// Scheduling an item that is already pending moves it to the back of the
/// queue, so a burst of changes to one item is rendered once, after the
/// burst.
#[derive(Debug, Default)]
pub struct RefreshQueue {
    pending: Vec<ItemId>,
}

impl RefreshQueue {
    /// Schedules a refresh of `item`.
    pub fn schedule(&mut self, item: ItemId) {
        self.cancel(item);
        self.pending.push(item);
    }

    /// Drops a pending refresh.
    pub fn cancel(&mut self, item: ItemId) {
        self.pending.retain(|p| *p != item);
    }

    /// Returns `true` if `item` has a pending refresh.
    pub fn is_pending(&self, item: ItemId) -> bool {
        self.pending.contains(&item)
    }

    /// Takes every pending refresh in firing order.
    pub fn drain(&mut self) -> Vec<ItemId> {
        std::mem::take(&mut self.pending)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reschedule_moves_to_back() {
        let mut queue = RefreshQueue::default();
        queue.schedule(ItemId(1));
        queue.schedule(ItemId(2));
        queue.schedule(ItemId(1));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.drain(), vec![ItemId(2), ItemId(1)]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_cancel() {
        let mut queue = RefreshQueue::default();
        queue.schedule(ItemId(4));
        queue.cancel(ItemId(4));

        assert!(!queue.is_pending(ItemId(4)));
    }
}
