//! Keep rules state of classes and members.
//!
//! Members matched by keep rules (entry points, reflection targets, resources references)
//! may neither be removed nor renamed by optimizations. The state records the matched
//! rules and their modifiers; the `unset` variants of modifiers always win over the `set`
//! ones, whatever the order rules were applied in.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KeepState {
    keep: bool,
    keep_name: bool,
    by_type: bool,
    by_string: bool,
    by_resources: bool,
    set_allowshrinking: bool,
    unset_allowshrinking: bool,
    set_allowobfuscation: bool,
    unset_allowobfuscation: bool,
}

impl KeepState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the member as an entry point, that cannot be deleted nor renamed.
    pub fn set_root(&mut self) {
        self.keep = true;
        self.unset_allowshrinking();
        self.unset_allowobfuscation();
    }

    /// Records a matching keep rule, modifiers aside.
    pub fn set_has_keep(&mut self) {
        self.keep = true;
    }

    pub fn set_keep_name(&mut self) {
        self.keep_name = true;
    }

    /// Class names found in strings (reflection).
    pub fn ref_by_string(&mut self) {
        self.by_type = true;
        self.by_string = true;
    }

    pub fn ref_by_type(&mut self) {
        self.by_type = true;
    }

    pub fn set_referenced_by_resources(&mut self) {
        self.by_resources = true;
    }

    pub fn set_allowshrinking(&mut self) {
        self.set_allowshrinking = true;
    }

    pub fn unset_allowshrinking(&mut self) {
        self.unset_allowshrinking = true;
    }

    pub fn set_allowobfuscation(&mut self) {
        self.set_allowobfuscation = true;
    }

    pub fn unset_allowobfuscation(&mut self) {
        self.unset_allowobfuscation = true;
    }

    #[must_use]
    pub const fn allowshrinking(&self) -> bool {
        !self.unset_allowshrinking && self.set_allowshrinking && !self.by_resources
    }

    #[must_use]
    pub const fn allowobfuscation(&self) -> bool {
        !self.unset_allowobfuscation && self.set_allowobfuscation && !self.by_resources
    }

    #[must_use]
    pub const fn can_delete(&self) -> bool {
        !self.by_type && !self.by_resources && (!self.keep || self.allowshrinking())
    }

    #[must_use]
    pub const fn can_rename(&self) -> bool {
        !self.keep_name
            && !self.by_string
            && (!self.keep || self.allowobfuscation())
            && !self.allowshrinking()
    }

    #[must_use]
    pub const fn has_keep(&self) -> bool {
        self.keep || self.by_resources
    }

    #[must_use]
    pub const fn is_referenced_by_string(&self) -> bool {
        self.by_string
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state() {
        let state = KeepState::new();
        assert!(state.can_rename());
        assert!(state.can_delete());
        assert!(!state.has_keep());
    }

    #[test]
    fn roots_are_pinned() {
        let mut state = KeepState::new();
        state.set_root();
        assert!(!state.can_rename());
        assert!(!state.can_delete());
        assert!(state.has_keep());

        // unset wins over set
        state.set_allowobfuscation();
        state.set_allowshrinking();
        assert!(!state.can_rename());
        assert!(!state.can_delete());
    }

    #[test]
    fn modifiers() {
        let mut state = KeepState::new();
        state.set_has_keep();
        assert!(!state.can_rename());
        state.set_allowobfuscation();
        assert!(state.can_rename());
        state.set_allowshrinking();
        assert!(!state.can_rename());
        assert!(state.can_delete());

        let mut state = KeepState::new();
        state.ref_by_string();
        assert!(!state.can_rename());
        assert!(!state.can_delete());

        let mut state = KeepState::new();
        state.set_keep_name();
        assert!(!state.can_rename());
        assert!(state.can_delete());

        let mut state = KeepState::new();
        state.set_has_keep();
        state.set_allowobfuscation();
        state.set_referenced_by_resources();
        assert!(!state.can_rename());
        assert!(state.has_keep());
    }
}
