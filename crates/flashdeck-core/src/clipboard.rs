//! # Clipboard / Transfer
//!
//! Holds at most one pending cut or copy selection and applies it on paste.
//!
//! ```text
//!   mark(ids, Cut)  ──► paste(target) ──► store.move_items()  ──► cleared
//!   mark(ids, Copy) ──► paste(target) ──► store.copy_items()  ──► kept
//!                       paste(target) ──► store.copy_items()  ──► kept
//! ```

use tracing::debug;

use crate::store::ItemStore;
use crate::types::{ClipboardAction, ClipboardEntry, ItemId};

/// Result of a paste.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasteOutcome {
    /// Nothing was marked.
    Empty,
    /// Cut-paste; number of items reparented.
    Moved(usize),
    /// Copy-paste; ids of every clone created.
    Copied(Vec<ItemId>),
}

impl PasteOutcome {
    /// True if the store was modified.
    pub fn changed(&self) -> bool {
        match self {
            PasteOutcome::Empty => false,
            PasteOutcome::Moved(count) => *count > 0,
            PasteOutcome::Copied(ids) => !ids.is_empty(),
        }
    }
}

/// The pending selection.
#[derive(Debug, Clone, Default)]
pub struct Clipboard {
    entry: Option<ClipboardEntry>,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces whatever was marked before. An empty selection clears.
    pub fn mark<S: AsRef<str>>(&mut self, ids: &[S], action: ClipboardAction) {
        let mut item_ids: Vec<ItemId> = Vec::with_capacity(ids.len());
        for id in ids {
            let id = id.as_ref();
            if !item_ids.iter().any(|existing| existing == id) {
                item_ids.push(id.to_string());
            }
        }

        if item_ids.is_empty() {
            self.entry = None;
            return;
        }

        debug!(count = item_ids.len(), ?action, "Clipboard marked");
        self.entry = Some(ClipboardEntry { action, item_ids });
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }

    pub fn entry(&self) -> Option<&ClipboardEntry> {
        self.entry.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }

    /// Applies the pending selection to `store` under `target_id`.
    ///
    /// A cut is cleared once the target has been accepted as a folder, even
    /// if every marked item was skipped. A copy stays marked.
    pub fn paste(&mut self, store: &mut ItemStore, target_id: &str) -> PasteOutcome {
        let Some(entry) = self.entry.as_ref() else {
            return PasteOutcome::Empty;
        };

        match entry.action {
            ClipboardAction::Cut => {
                let moved = store.move_items(entry.item_ids.as_slice(), target_id);
                let target_ok = store.get(target_id).is_some_and(|item| item.is_folder());
                if target_ok {
                    self.entry = None;
                }
                PasteOutcome::Moved(moved)
            }
            ClipboardAction::Copy => {
                PasteOutcome::Copied(store.copy_items(entry.item_ids.as_slice(), target_id))
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{ManualClock, Timestamp};
    use crate::types::{ItemKind, ROOT_ID};
    use std::sync::Arc;

    fn store() -> ItemStore {
        ItemStore::new(Arc::new(ManualClock::new(Timestamp::zero())))
    }

    #[test]
    fn test_paste_with_empty_clipboard() {
        let mut store = store();
        let mut clipboard = Clipboard::new();

        assert_eq!(clipboard.paste(&mut store, ROOT_ID), PasteOutcome::Empty);
        assert_eq!(store.item_count(), 1);
    }

    #[test]
    fn test_cut_paste_moves_and_clears() {
        let mut store = store();
        let a = store.create(ItemKind::Folder, "A", ROOT_ID, None).unwrap();
        let s = store.create(ItemKind::Set, "S", ROOT_ID, None).unwrap();

        let mut clipboard = Clipboard::new();
        clipboard.mark(&[s.clone()], ClipboardAction::Cut);

        let outcome = clipboard.paste(&mut store, &a);
        assert_eq!(outcome, PasteOutcome::Moved(1));
        assert!(outcome.changed());
        assert!(clipboard.is_empty());
        assert_eq!(store.get(&s).unwrap().parent_id.as_deref(), Some(a.as_str()));
    }

    #[test]
    fn test_cut_paste_onto_set_keeps_selection() {
        let mut store = store();
        let s = store.create(ItemKind::Set, "S", ROOT_ID, None).unwrap();
        let t = store.create(ItemKind::Set, "T", ROOT_ID, None).unwrap();

        let mut clipboard = Clipboard::new();
        clipboard.mark(&[s], ClipboardAction::Cut);

        assert_eq!(clipboard.paste(&mut store, &t), PasteOutcome::Moved(0));
        assert!(!clipboard.is_empty());
    }

    #[test]
    fn test_copy_paste_can_repeat() {
        let mut store = store();
        let s = store.create(ItemKind::Set, "S", ROOT_ID, None).unwrap();

        let mut clipboard = Clipboard::new();
        clipboard.mark(&[s.as_str(), s.as_str()], ClipboardAction::Copy);
        assert_eq!(clipboard.entry().unwrap().item_ids.len(), 1);

        let first = clipboard.paste(&mut store, ROOT_ID);
        let second = clipboard.paste(&mut store, ROOT_ID);

        assert!(first.changed() && second.changed());
        assert!(!clipboard.is_empty());
        assert_eq!(store.item_count(), 4);

        let names: Vec<&str> = store
            .children_of(ROOT_ID)
            .iter()
            .map(|item| item.name.as_str())
            .collect();
        assert_eq!(names, vec!["S", "S (Copy)", "S (Copy)"]);
    }

    #[test]
    fn test_mark_replaces_previous_entry() {
        let mut clipboard = Clipboard::new();
        clipboard.mark(&["a"], ClipboardAction::Copy);
        clipboard.mark(&["b"], ClipboardAction::Cut);

        let entry = clipboard.entry().unwrap();
        assert_eq!(entry.action, ClipboardAction::Cut);
        assert_eq!(entry.item_ids, vec!["b".to_string()]);

        clipboard.mark::<&str>(&[], ClipboardAction::Copy);
        assert!(clipboard.is_empty());
    }
}
