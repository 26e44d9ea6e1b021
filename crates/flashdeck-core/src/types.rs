//! # Domain Types
//!
//! Core domain types used throughout Flashdeck.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Item       │   │   SetContent    │   │ ClipboardEntry  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  text           │   │  action         │       │
//! │  │  type           │   │  languages      │   │  item_ids       │       │
//! │  │  parentId       │   └─────────────────┘   └─────────────────┘       │
//! │  │  content        │                                                    │
//! │  │  permissions    │   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  created        │   │    ItemKind     │   │   Permission    │       │
//! │  │  modified       │   │  Folder | Set   │   │ Private | Link   │       │
//! │  └─────────────────┘   └─────────────────┘   │ Public          │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Flat Map, Parent Pointers
//! The tree is never stored as nested children. A [`Snapshot`] is a flat
//! id → [`Item`] map and the structure lives entirely in `parent_id`. Moving
//! or deleting never leaves a dangling child array behind.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::time::Timestamp;

// =============================================================================
// Identifiers
// =============================================================================

/// Opaque item identifier. UUID v4 strings for everything except the root.
pub type ItemId = String;

/// Id of the distinguished root folder.
pub const ROOT_ID: &str = "root";

/// Display name of the root folder for fresh trees.
pub const ROOT_NAME: &str = "Main";

// =============================================================================
// Item Kind
// =============================================================================

/// What an item is: a container or a flashcard set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// Holds other items.
    Folder,
    /// A flashcard set. Only sets carry content.
    Set,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Folder => write!(f, "folder"),
            ItemKind::Set => write!(f, "set"),
        }
    }
}

// =============================================================================
// Permission
// =============================================================================

/// Sharing level of an item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Only the owner can see it.
    #[default]
    Private,
    /// Anyone holding the link can see it.
    Link,
    /// Listed publicly.
    Public,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Private => write!(f, "private"),
            Permission::Link => write!(f, "link"),
            Permission::Public => write!(f, "public"),
        }
    }
}

impl FromStr for Permission {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "private" => Ok(Permission::Private),
            "link" => Ok(Permission::Link),
            "public" => Ok(Permission::Public),
            _ => Err(ValidationError::NotAllowed {
                field: "permissions".to_string(),
                allowed: vec!["private".into(), "link".into(), "public".into()],
            }),
        }
    }
}

// =============================================================================
// Set Content
// =============================================================================

/// Language tags used for text-to-speech on each side of a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LanguagePair {
    pub term: String,
    pub definition: String,
}

impl Default for LanguagePair {
    fn default() -> Self {
        LanguagePair {
            term: "en-US".to_string(),
            definition: "en-US".to_string(),
        }
    }
}

/// The payload of a flashcard set.
///
/// `text` is the raw editor source: one card per line, `term, definition`.
/// The store treats it as opaque; only [`crate::mass_create`] looks inside.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SetContent {
    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub languages: Option<LanguagePair>,
}

impl SetContent {
    /// Creates content from editor text with no language tags.
    pub fn from_text(text: impl Into<String>) -> Self {
        SetContent {
            text: text.into(),
            languages: None,
        }
    }

    /// Non-blank lines of the source text, one per card.
    pub fn card_lines(&self) -> impl Iterator<Item = &str> {
        self.text.lines().filter(|line| !line.trim().is_empty())
    }

    /// Number of cards in the source text.
    pub fn card_count(&self) -> usize {
        self.card_lines().count()
    }
}

// =============================================================================
// Item
// =============================================================================

/// A node in the tree: a folder or a flashcard set.
///
/// Field names on the wire match the cache format written by earlier
/// clients (`type`, `parentId`, epoch-millisecond timestamps).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Stable for the item's lifetime.
    pub id: ItemId,

    #[serde(rename = "type")]
    pub kind: ItemKind,

    /// Display name.
    pub name: String,

    /// Owning folder. `None` only for the root.
    pub parent_id: Option<ItemId>,

    /// Present only for sets that have been edited.
    #[serde(default)]
    pub content: Option<SetContent>,

    #[serde(default)]
    pub permissions: Permission,

    /// When the item was created (client clock).
    #[serde(default)]
    pub created: Timestamp,

    /// Last write to any field (client clock).
    #[serde(default)]
    pub modified: Timestamp,
}

impl Item {
    /// The root folder of a fresh tree.
    pub fn root() -> Self {
        Item {
            id: ROOT_ID.to_string(),
            kind: ItemKind::Folder,
            name: ROOT_NAME.to_string(),
            parent_id: None,
            content: None,
            permissions: Permission::Private,
            created: Timestamp::zero(),
            modified: Timestamp::zero(),
        }
    }

    /// Returns true for folders (including the root).
    #[inline]
    pub fn is_folder(&self) -> bool {
        self.kind == ItemKind::Folder
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.id == ROOT_ID
    }

    /// A root record is only trusted if it still looks like a root.
    pub fn is_valid_root(&self) -> bool {
        self.is_root() && self.is_folder() && self.parent_id.is_none()
    }

    /// Most recent of `created` and `modified`.
    pub fn last_touched(&self) -> Timestamp {
        self.created.max(self.modified)
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// The complete id → item mapping for one owner.
///
/// Insertion-ordered: `children_of` returns children in the order they were
/// inserted, and JSON round trips keep key order.
pub type Snapshot = IndexMap<ItemId, Item>;

/// A tree containing only the root folder.
pub fn root_only_snapshot() -> Snapshot {
    let mut snapshot = Snapshot::new();
    let root = Item::root();
    snapshot.insert(root.id.clone(), root);
    snapshot
}

// =============================================================================
// Clipboard
// =============================================================================

/// What a paste should do with the marked items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ClipboardAction {
    /// Reparent on paste, then clear.
    Cut,
    /// Deep-clone on paste; stays marked for repeated pasting.
    Copy,
}

/// The pending clipboard selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ClipboardEntry {
    pub action: ClipboardAction,
    /// Marked ids, deduplicated, in selection order.
    pub item_ids: Vec<ItemId>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_wire_format() {
        let item = Item {
            id: "abc".into(),
            kind: ItemKind::Set,
            name: "Animals".into(),
            parent_id: Some(ROOT_ID.into()),
            content: Some(SetContent::from_text("cat, felino")),
            permissions: Permission::Link,
            created: Timestamp::from_millis(1),
            modified: Timestamp::from_millis(2),
        };

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "set");
        assert_eq!(json["parentId"], "root");
        assert_eq!(json["permissions"], "link");
        assert_eq!(json["modified"], 2);
        assert_eq!(json["content"]["text"], "cat, felino");
    }

    #[test]
    fn test_legacy_root_without_timestamps_parses() {
        let json = r#"{"id":"root","type":"folder","name":"Main","parentId":null,"permissions":"private"}"#;
        let root: Item = serde_json::from_str(json).unwrap();

        assert!(root.is_valid_root());
        assert_eq!(root.created, Timestamp::zero());
        assert_eq!(root.content, None);
    }

    #[test]
    fn test_content_with_null_languages() {
        let json = r#"{"text":"dog, perro","languages":null}"#;
        let content: SetContent = serde_json::from_str(json).unwrap();
        assert_eq!(content.languages, None);
        assert_eq!(content.card_count(), 1);
    }

    #[test]
    fn test_card_lines_skip_blank_lines() {
        let content = SetContent::from_text("a, b\n\n   \nc, d\n");
        let lines: Vec<&str> = content.card_lines().collect();
        assert_eq!(lines, vec!["a, b", "c, d"]);
    }

    #[test]
    fn test_permission_parsing() {
        assert_eq!("public".parse::<Permission>().unwrap(), Permission::Public);
        assert_eq!(" Link ".parse::<Permission>().unwrap(), Permission::Link);
        assert!("everyone".parse::<Permission>().is_err());
        assert_eq!(Permission::default(), Permission::Private);
    }

    #[test]
    fn test_root_only_snapshot() {
        let snapshot = root_only_snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[ROOT_ID].is_valid_root());
    }
}
