//! # Item Store
//!
//! The authoritative in-memory tree for one owner.
//!
//! ## Operation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Item Store                                      │
//! │                                                                         │
//! │   UI mutation                         Remote snapshot                   │
//! │       │                                     │                           │
//! │       ▼                                     ▼                           │
//! │   create / rename / move / delete     merge::reconcile()                │
//! │   update_content / update_permissions       │                           │
//! │   copy_items / split_set                    ▼                           │
//! │       │                               apply_merge(plan)                 │
//! │       ▼                                     │                           │
//! │   ┌─────────────────────────────────────────▼───────────────────────┐  │
//! │   │          Snapshot (IndexMap<ItemId, Item>)                       │  │
//! │   │   "root" ─┬─ folder A ─── set S                                  │  │
//! │   │           └─ set T                                               │  │
//! │   └─────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Availability First
//! Every mutation is synchronous and visible to the next read. Operations on
//! unknown ids, moves that would create a cycle and moves of the root are
//! ignored instead of failing. Mutators report whether anything changed so
//! the caller knows when to persist and push.
//!
//! ## Timestamps
//! Every write to an item sets `modified = max(now, modified)`, so a clock
//! that steps backwards never makes a local edit look older than it is.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::merge::MergePlan;
use crate::time::{Clock, Timestamp};
use crate::types::{
    root_only_snapshot, Item, ItemId, ItemKind, Permission, SetContent, Snapshot, ROOT_ID,
};
use crate::validation::validate_item_name;

// =============================================================================
// Item Store
// =============================================================================

/// Flat id → item map plus the clock used to stamp writes.
pub struct ItemStore {
    items: Snapshot,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for ItemStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemStore")
            .field("items", &self.items.len())
            .finish()
    }
}

impl ItemStore {
    /// Creates a store holding only the root folder.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        ItemStore {
            items: root_only_snapshot(),
            clock,
        }
    }

    /// Creates a store from a previously persisted snapshot.
    ///
    /// A missing or malformed root record is replaced with a fresh root.
    pub fn from_snapshot(snapshot: Snapshot, clock: Arc<dyn Clock>) -> Self {
        let mut store = ItemStore {
            items: snapshot,
            clock,
        };
        store.ensure_root();
        store
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Borrowed view of the whole tree.
    pub fn snapshot(&self) -> &Snapshot {
        &self.items
    }

    /// Owned copy of the whole tree (for persistence and push).
    pub fn to_snapshot(&self) -> Snapshot {
        self.items.clone()
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    /// Number of items including the root.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Current instant according to the store's clock.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Items whose parent is `folder_id`, in insertion order.
    pub fn children_of(&self, folder_id: &str) -> Vec<&Item> {
        self.items
            .values()
            .filter(|item| item.parent_id.as_deref() == Some(folder_id))
            .collect()
    }

    /// Children with folders first, then by case-insensitive name, then by
    /// creation time.
    pub fn children_of_sorted(&self, folder_id: &str) -> Vec<&Item> {
        let mut children = self.children_of(folder_id);
        children.sort_by(|a, b| {
            b.is_folder()
                .cmp(&a.is_folder())
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
                .then_with(|| a.created.cmp(&b.created))
        });
        children
    }

    /// Every item whose parent chain reaches `id` (excluding `id` itself).
    ///
    /// Iterative depth-first walk over a parent → children index, so deep
    /// trees cannot overflow the stack.
    pub fn descendants_of(&self, id: &str) -> Vec<ItemId> {
        let index = self.children_index();
        let mut result = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = vec![id];

        while let Some(current) = stack.pop() {
            if let Some(children) = index.get(current) {
                for &child in children.iter().rev() {
                    if seen.insert(child) {
                        result.push(child.to_string());
                        stack.push(child);
                    }
                }
            }
        }

        result
    }

    /// Returns true if `ancestor` appears on the parent chain of `id`.
    ///
    /// An item is not its own ancestor. A corrupt chain (cycle introduced by
    /// a remote snapshot) terminates after visiting every item once.
    pub fn is_ancestor_of(&self, ancestor: &str, id: &str) -> bool {
        let mut current = self.items.get(id).and_then(|item| item.parent_id.as_deref());
        let mut steps = 0;

        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.items.len() {
                return false;
            }
            current = self.items.get(parent).and_then(|item| item.parent_id.as_deref());
        }

        false
    }

    /// Breadcrumb path from the root down to `id` (inclusive).
    ///
    /// Empty if `id` is unknown. Stops early at a dangling parent reference.
    pub fn path_to(&self, id: &str) -> Vec<&Item> {
        let mut path = Vec::new();
        let mut current = self.items.get(id);

        while let Some(item) = current {
            if path.len() > self.items.len() {
                break;
            }
            path.push(item);
            current = item.parent_id.as_deref().and_then(|p| self.items.get(p));
        }

        path.reverse();
        path
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Inserts a new folder or set under `parent_id` and returns its id.
    ///
    /// ## Errors
    /// - `Validation` if the trimmed name is empty or too long
    /// - `ItemNotFound` if the parent does not exist
    /// - `ParentNotFolder` if the parent is a set
    ///
    /// Content passed for a folder is dropped.
    pub fn create(
        &mut self,
        kind: ItemKind,
        name: &str,
        parent_id: &str,
        content: Option<SetContent>,
    ) -> CoreResult<ItemId> {
        let name = validate_item_name(name)?;
        self.check_folder(parent_id)?;

        let now = self.clock.now();
        let id = Uuid::new_v4().to_string();
        let item = Item {
            id: id.clone(),
            kind,
            name,
            parent_id: Some(parent_id.to_string()),
            content: match kind {
                ItemKind::Set => content,
                ItemKind::Folder => None,
            },
            permissions: Permission::Private,
            created: now,
            modified: now,
        };

        debug!(item_id = %id, kind = %kind, parent_id = %parent_id, "Item created");
        self.items.insert(id.clone(), item);
        Ok(id)
    }

    /// Renames an item. Unknown ids and invalid names are ignored.
    pub fn rename(&mut self, id: &str, name: &str) -> bool {
        let Ok(name) = validate_item_name(name) else {
            debug!(item_id = %id, "Rename ignored: invalid name");
            return false;
        };
        let now = self.clock.now();

        match self.items.get_mut(id) {
            Some(item) => {
                item.name = name;
                touch(item, now);
                debug!(item_id = %id, "Item renamed");
                true
            }
            None => false,
        }
    }

    /// Replaces the content of a set. Folders and unknown ids are ignored.
    ///
    /// The store does not debounce; each call is one write.
    pub fn update_content(&mut self, id: &str, content: SetContent) -> bool {
        let now = self.clock.now();

        match self.items.get_mut(id) {
            Some(item) if item.kind == ItemKind::Set => {
                item.content = Some(content);
                touch(item, now);
                debug!(item_id = %id, "Set content updated");
                true
            }
            _ => false,
        }
    }

    /// Changes the sharing level of an item.
    pub fn update_permissions(&mut self, id: &str, permission: Permission) -> bool {
        let now = self.clock.now();

        match self.items.get_mut(id) {
            Some(item) => {
                item.permissions = permission;
                touch(item, now);
                debug!(item_id = %id, permission = %permission, "Permissions updated");
                true
            }
            None => false,
        }
    }

    /// Removes every listed item and all of its descendants in one step.
    ///
    /// The root is never removed. Returns the ids that were removed, in map
    /// order; empty when nothing matched.
    pub fn delete<S: AsRef<str>>(&mut self, ids: &[S]) -> Vec<ItemId> {
        let mut doomed: HashSet<ItemId> = HashSet::new();

        for id in ids {
            let id = id.as_ref();
            if id == ROOT_ID || !self.items.contains_key(id) || doomed.contains(id) {
                continue;
            }
            doomed.insert(id.to_string());
            doomed.extend(self.descendants_of(id));
        }

        if doomed.is_empty() {
            return Vec::new();
        }

        let mut removed = Vec::with_capacity(doomed.len());
        self.items.retain(|id, _| {
            if doomed.contains(id) {
                removed.push(id.clone());
                false
            } else {
                true
            }
        });

        debug!(count = removed.len(), "Items deleted");
        removed
    }

    /// Reparents every listed item under `target_id`.
    ///
    /// Skipped silently:
    /// - the root
    /// - unknown ids
    /// - the target itself, or any ancestor of the target (would be a cycle)
    /// - items already directly under the target (no timestamp bump)
    ///
    /// Nothing moves if the target is missing or not a folder. Returns the
    /// number of items moved.
    pub fn move_items<S: AsRef<str>>(&mut self, ids: &[S], target_id: &str) -> usize {
        if self.check_folder(target_id).is_err() {
            debug!(target_id = %target_id, "Move ignored: target is not a folder");
            return 0;
        }

        let now = self.clock.now();
        let mut moved = 0;

        for id in ids {
            let id = id.as_ref();
            if id == ROOT_ID || id == target_id || self.is_ancestor_of(id, target_id) {
                continue;
            }

            if let Some(item) = self.items.get_mut(id) {
                if item.parent_id.as_deref() == Some(target_id) {
                    continue;
                }
                item.parent_id = Some(target_id.to_string());
                touch(item, now);
                moved += 1;
            }
        }

        if moved > 0 {
            debug!(count = moved, target_id = %target_id, "Items moved");
        }
        moved
    }

    /// Deep-clones every listed item under `target_id`.
    ///
    /// Each clone gets a fresh id and `created = modified = now`; folder
    /// clones take copies of all descendants with the relative structure
    /// kept. A top-level clone landing in its original parent gets a
    /// `" (Copy)"` suffix.
    ///
    /// The walk runs over the tree as it was before the paste, so copying a
    /// folder into its own descendant terminates. Returns the ids of all
    /// clones; empty if the target is not a folder.
    pub fn copy_items<S: AsRef<str>>(&mut self, ids: &[S], target_id: &str) -> Vec<ItemId> {
        if self.check_folder(target_id).is_err() {
            debug!(target_id = %target_id, "Copy ignored: target is not a folder");
            return Vec::new();
        }

        let now = self.clock.now();
        let mut clones: Vec<Item> = Vec::new();
        {
            let index = self.children_index();
            for id in ids {
                let id = id.as_ref();
                if id == ROOT_ID {
                    continue;
                }
                if let Some(original) = self.items.get(id) {
                    self.clone_subtree(&index, original, target_id, now, &mut clones);
                }
            }
        }

        let created: Vec<ItemId> = clones.iter().map(|item| item.id.clone()).collect();
        for clone in clones {
            self.items.insert(clone.id.clone(), clone);
        }

        debug!(count = created.len(), target_id = %target_id, "Items copied");
        created
    }

    // -------------------------------------------------------------------------
    // Bulk replacement
    // -------------------------------------------------------------------------

    /// Applies a reconciliation result in one batch.
    ///
    /// Returns false (and touches nothing) when the plan is empty.
    pub fn apply_merge(&mut self, plan: MergePlan) -> bool {
        if plan.is_empty() {
            return false;
        }

        let adopted = plan.adopt.len();
        let removed = plan.remove.len();

        for item in plan.adopt {
            self.items.insert(item.id.clone(), item);
        }
        for id in &plan.remove {
            if id != ROOT_ID {
                self.items.shift_remove(id);
            }
        }
        self.ensure_root();

        debug!(adopted, removed, "Remote merge applied");
        true
    }

    /// Discards the whole tree in favour of `snapshot` (owner switch).
    pub fn replace_all(&mut self, snapshot: Snapshot) {
        self.items = snapshot;
        self.ensure_root();
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn check_folder(&self, id: &str) -> CoreResult<()> {
        match self.items.get(id) {
            Some(item) if item.is_folder() => Ok(()),
            Some(_) => Err(CoreError::ParentNotFolder(id.to_string())),
            None => Err(CoreError::ItemNotFound(id.to_string())),
        }
    }

    fn ensure_root(&mut self) {
        let valid = self.items.get(ROOT_ID).is_some_and(Item::is_valid_root);
        if !valid {
            let root = Item::root();
            self.items.insert(root.id.clone(), root);
        }
    }

    /// parent id → child ids, in map order.
    fn children_index(&self) -> HashMap<&str, Vec<&str>> {
        let mut index: HashMap<&str, Vec<&str>> = HashMap::new();
        for item in self.items.values() {
            if let Some(parent) = item.parent_id.as_deref() {
                index.entry(parent).or_default().push(item.id.as_str());
            }
        }
        index
    }

    /// Clones `original` and, for folders, everything under it.
    ///
    /// Iterative pre-order walk; each source item is cloned at most once, so
    /// a parent cycle adopted from a remote snapshot cannot loop.
    fn clone_subtree<'a>(
        &'a self,
        index: &HashMap<&str, Vec<&'a str>>,
        original: &'a Item,
        new_parent: &str,
        now: Timestamp,
        out: &mut Vec<Item>,
    ) {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<(&'a Item, String)> = vec![(original, new_parent.to_string())];

        while let Some((item, parent)) = stack.pop() {
            if !visited.insert(item.id.as_str()) {
                continue;
            }

            let new_id = Uuid::new_v4().to_string();
            let name = if item.parent_id.as_deref() == Some(parent.as_str()) {
                format!("{} (Copy)", item.name)
            } else {
                item.name.clone()
            };

            out.push(Item {
                id: new_id.clone(),
                kind: item.kind,
                name,
                parent_id: Some(parent),
                content: item.content.clone(),
                permissions: item.permissions,
                created: now,
                modified: now,
            });

            if !item.is_folder() {
                continue;
            }
            if let Some(children) = index.get(item.id.as_str()) {
                for child_id in children.iter().rev() {
                    if let Some(child) = self.items.get(*child_id) {
                        stack.push((child, new_id.clone()));
                    }
                }
            }
        }
    }
}

/// Bumps `modified` without ever moving it backwards.
fn touch(item: &mut Item, now: Timestamp) {
    item.modified = now.max(item.modified);
}

// =============================================================================
// Unit Tests
// =============================================================================
