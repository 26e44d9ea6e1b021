//! # Snapshot Reconciliation
//!
//! Decides how an incoming remote snapshot changes the local tree.
//!
//! ## Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     reconcile(local, remote, now, window)               │
//! │                                                                         │
//! │  For each id in REMOTE:                                                 │
//! │  ├── absent locally                        → adopt                     │
//! │  ├── remote.modified > local.modified                                  │
//! │  │   and remote != local                   → adopt (overwrite)         │
//! │  └── otherwise                             → keep local                │
//! │                                                                         │
//! │  For each id only in LOCAL (never root):                               │
//! │  ├── modified or created within window     → keep (not yet synced)     │
//! │  ├── ancestor of a kept item               → keep (no orphans)         │
//! │  └── otherwise                             → remove (deleted remotely) │
//! │                                                                         │
//! │  Empty plan → caller skips the update entirely                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Whole-item last-writer-wins. There is no field-level merge; two clients
//! editing the same item concurrently will lose one of the edits.
//!
//! ## Idempotence
//! Once a plan is applied, reconciling the same remote snapshot again yields
//! an empty plan: adopted items now compare equal, removed items are gone.

use std::collections::HashSet;
use std::time::Duration;

use crate::time::Timestamp;
use crate::types::{Item, ItemId, Snapshot, ROOT_ID};

/// The changes a remote snapshot implies for the local tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePlan {
    /// Remote items to insert or overwrite locally.
    pub adopt: Vec<Item>,
    /// Local ids treated as deleted on the remote.
    pub remove: Vec<ItemId>,
}

impl MergePlan {
    /// True when applying the plan would change nothing.
    pub fn is_empty(&self) -> bool {
        self.adopt.is_empty() && self.remove.is_empty()
    }

    /// Total number of adoptions plus removals.
    pub fn change_count(&self) -> usize {
        self.adopt.len() + self.remove.len()
    }
}

/// Computes the merge of `remote` into `local` as of `now`.
///
/// Remote records are skipped when they would break the tree shape:
/// a `root` entry that is not a parentless folder, any other entry with no
/// parent or with itself as parent, and entries whose key does not match
/// their id.
///
/// A stale local-only folder survives while a kept item still sits under
/// it, so no kept item is left pointing at a removed parent.
pub fn reconcile(local: &Snapshot, remote: &Snapshot, now: Timestamp, window: Duration) -> MergePlan {
    let mut plan = MergePlan::default();

    for (id, incoming) in remote {
        if !is_acceptable(id, incoming) {
            continue;
        }

        match local.get(id) {
            None => plan.adopt.push(incoming.clone()),
            Some(existing) => {
                if incoming.modified > existing.modified && incoming != existing {
                    plan.adopt.push(incoming.clone());
                }
            }
        }
    }

    let mut stale: HashSet<&str> = HashSet::new();
    let mut kept: Vec<&Item> = Vec::new();
    for (id, existing) in local {
        if id == ROOT_ID || remote.contains_key(id) {
            continue;
        }
        if is_recent(existing, now, window) {
            kept.push(existing);
        } else {
            stale.insert(id.as_str());
        }
    }

    // A kept item needs its whole parent chain.
    for item in kept {
        let mut current = item.parent_id.as_deref();
        let mut steps = 0;
        while let Some(parent) = current {
            steps += 1;
            if steps > local.len() {
                break;
            }
            stale.remove(parent);
            current = local.get(parent).and_then(|p| p.parent_id.as_deref());
        }
    }

    plan.remove = local
        .keys()
        .filter(|id| stale.contains(id.as_str()))
        .cloned()
        .collect();
    plan
}

/// True while an item is young enough to be an unsynced local write.
///
/// Timestamps ahead of `now` (clock skew) count as recent.
pub fn is_recent(item: &Item, now: Timestamp, window: Duration) -> bool {
    now.since(item.modified) <= window || now.since(item.created) <= window
}

fn is_acceptable(key: &str, item: &Item) -> bool {
    if item.id != key {
        return false;
    }
    if key == ROOT_ID {
        item.is_valid_root()
    } else {
        item.parent_id.as_deref().is_some_and(|parent| parent != key)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{root_only_snapshot, ItemKind, Permission, SetContent};

    const WINDOW: Duration = Duration::from_secs(10);

    fn set_item(id: &str, name: &str, created: i64, modified: i64) -> Item {
        Item {
            id: id.to_string(),
            kind: ItemKind::Set,
            name: name.to_string(),
            parent_id: Some(ROOT_ID.to_string()),
            content: None,
            permissions: Permission::Private,
            created: Timestamp::from_millis(created),
            modified: Timestamp::from_millis(modified),
        }
    }

    fn with(items: Vec<Item>) -> Snapshot {
        let mut snapshot = root_only_snapshot();
        for item in items {
            snapshot.insert(item.id.clone(), item);
        }
        snapshot
    }

    #[test]
    fn test_absent_locally_is_adopted() {
        let local = root_only_snapshot();
        let remote = with(vec![set_item("x", "X", 0, 0)]);

        let plan = reconcile(&local, &remote, Timestamp::zero(), WINDOW);
        assert_eq!(plan.adopt.len(), 1);
        assert!(plan.remove.is_empty());
    }

    #[test]
    fn test_last_writer_wins() {
        let local = with(vec![set_item("x", "Local", 0, 1_000)]);

        // newer and different: remote wins
        let remote = with(vec![set_item("x", "Remote", 0, 2_000)]);
        let plan = reconcile(&local, &remote, Timestamp::zero(), WINDOW);
        assert_eq!(plan.adopt[0].name, "Remote");

        // older: local wins
        let remote = with(vec![set_item("x", "Remote", 0, 500)]);
        assert!(reconcile(&local, &remote, Timestamp::zero(), WINDOW).is_empty());

        // same instant: local wins
        let remote = with(vec![set_item("x", "Remote", 0, 1_000)]);
        assert!(reconcile(&local, &remote, Timestamp::zero(), WINDOW).is_empty());
    }

    #[test]
    fn test_newer_but_equal_is_not_adopted() {
        let mut newer = set_item("x", "Same", 0, 5_000);
        newer.content = Some(SetContent::from_text("a, b"));
        let local = with(vec![newer.clone()]);
        let remote = with(vec![newer]);

        assert!(reconcile(&local, &remote, Timestamp::zero(), WINDOW).is_empty());
    }

    #[test]
    fn test_recency_window_protects_local_items() {
        let local = with(vec![set_item("x", "X", 0, 0)]);
        let remote = root_only_snapshot();

        let plan = reconcile(&local, &remote, Timestamp::from_millis(3_000), WINDOW);
        assert!(plan.is_empty());

        let plan = reconcile(&local, &remote, Timestamp::from_millis(10_000), WINDOW);
        assert!(plan.is_empty(), "window boundary is inclusive");

        let plan = reconcile(&local, &remote, Timestamp::from_millis(15_000), WINDOW);
        assert_eq!(plan.remove, vec!["x".to_string()]);
    }

    #[test]
    fn test_recent_edit_protects_old_item() {
        let local = with(vec![set_item("x", "X", 0, 12_000)]);
        let remote = root_only_snapshot();

        let plan = reconcile(&local, &remote, Timestamp::from_millis(15_000), WINDOW);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_root_is_never_removed() {
        let local = root_only_snapshot();
        let remote = Snapshot::new();

        let plan = reconcile(&local, &remote, Timestamp::from_millis(60_000), WINDOW);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_malformed_remote_records_are_skipped() {
        let local = root_only_snapshot();

        let mut bad_root = crate::types::Item::root();
        bad_root.parent_id = Some("x".to_string());
        bad_root.modified = Timestamp::from_millis(99);

        let mut orphan = set_item("y", "Y", 0, 0);
        orphan.parent_id = None;

        let mut remote = Snapshot::new();
        remote.insert(ROOT_ID.to_string(), bad_root);
        remote.insert("y".to_string(), orphan);
        remote.insert("mismatch".to_string(), set_item("z", "Z", 0, 0));

        assert!(reconcile(&local, &remote, Timestamp::zero(), WINDOW).is_empty());
    }

    #[test]
    fn test_self_parented_record_is_skipped() {
        let mut looped = set_item("x", "X", 0, 0);
        looped.kind = ItemKind::Folder;
        looped.parent_id = Some("x".to_string());
        let remote = with(vec![looped]);

        assert!(reconcile(&root_only_snapshot(), &remote, Timestamp::zero(), WINDOW).is_empty());
    }

    #[test]
    fn test_recent_child_keeps_stale_ancestors() {
        let mut outer = set_item("a", "A", 0, 0);
        outer.kind = ItemKind::Folder;
        let mut inner = set_item("b", "B", 0, 0);
        inner.kind = ItemKind::Folder;
        inner.parent_id = Some("a".to_string());
        let mut fresh = set_item("s", "S", 12_000, 12_000);
        fresh.parent_id = Some("b".to_string());
        let other = set_item("old", "Old", 0, 0);
        let local = with(vec![outer, inner, fresh, other]);

        let plan = reconcile(&local, &root_only_snapshot(), Timestamp::from_millis(15_000), WINDOW);
        assert_eq!(plan.remove, vec!["old".to_string()]);

        // once the child ages out the whole branch goes
        let plan = reconcile(&local, &root_only_snapshot(), Timestamp::from_millis(30_000), WINDOW);
        assert_eq!(plan.remove.len(), 4);
    }

    #[test]
    fn test_applying_plan_is_idempotent() {
        let local = with(vec![set_item("a", "A", 0, 1_000), set_item("old", "Old", 0, 0)]);
        let remote = with(vec![set_item("a", "A2", 0, 2_000), set_item("b", "B", 0, 0)]);
        let now = Timestamp::from_millis(30_000);

        let plan = reconcile(&local, &remote, now, WINDOW);
        assert_eq!(plan.change_count(), 3);

        let mut merged = local.clone();
        for item in plan.adopt {
            merged.insert(item.id.clone(), item);
        }
        for id in &plan.remove {
            merged.shift_remove(id);
        }

        assert!(reconcile(&merged, &remote, now, WINDOW).is_empty());
    }
}
