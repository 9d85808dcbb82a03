use bitflags::bitflags;

bitflags! {
    /// State flags carried by every item.
    ///
    /// Excluded, Disabled and Mandatory cascade: an item's effective flags
    /// include those set on any of its ancestors.
    ///
    /// # Example
    ///
    /// ```
    /// use command_params_engine::ItemFlags;
    ///
    /// let flags = ItemFlags::EXCLUDED | ItemFlags::CANT_REMOVE;
    /// assert!(flags.is_hidden());
    /// assert!(!ItemFlags::CANT_REMOVE.is_hidden());
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ItemFlags: u8 {
        /// Hidden by the text filter.
        const FILTERED = 1 << 0;
        /// Hidden because an enclosing bloc condition is false.
        const EXCLUDED = 1 << 1;
        /// Forced off by a rule.
        const DISABLED = 1 << 2;
        /// Forced on by a rule.
        const MANDATORY = 1 << 3;
        /// Hidden by the "hide unused" view toggle.
        const HIDE_UNUSED = 1 << 4;
        /// List element floor reached.
        const CANT_REMOVE = 1 << 5;

        /// Flags pushed down to descendants.
        const INHERITED = Self::EXCLUDED.bits() | Self::DISABLED.bits() | Self::MANDATORY.bits();
    }
}

impl ItemFlags {
    /// Returns `true` if a renderer should not show the item.
    pub fn is_hidden(self) -> bool {
        self.intersects(Self::FILTERED | Self::EXCLUDED | Self::HIDE_UNUSED)
    }
}
