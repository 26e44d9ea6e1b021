//! # Mass Create
//!
//! Splits an oversized set into several sibling sets.
//!
//! A pasted vocabulary list of 75 lines with a limit of 30 becomes:
//! ```text
//!   "Verbs"    lines  1..30   (the original set, content replaced)
//!   "Verbs 2"  lines 31..60   (new set, same parent, same languages)
//!   "Verbs 3"  lines 61..75
//! ```
//! Blank lines are dropped while splitting.

use tracing::info;

use crate::error::{CoreError, CoreResult};
use crate::store::ItemStore;
use crate::types::{ItemId, ItemKind, SetContent, ROOT_ID};
use crate::validation::validate_max_cards;
use crate::MAX_NAME_LEN;

/// Groups the non-blank lines of `text` into chunks of at most `max_cards`.
///
/// ```rust
/// use flashdeck_core::mass_create::chunk_cards;
///
/// let chunks = chunk_cards("a, 1\nb, 2\n\nc, 3", 2);
/// assert_eq!(chunks, vec!["a, 1\nb, 2".to_string(), "c, 3".to_string()]);
/// ```
pub fn chunk_cards(text: &str, max_cards: usize) -> Vec<String> {
    let lines: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();
    lines
        .chunks(max_cards.max(1))
        .map(|chunk| chunk.join("\n"))
        .collect()
}

/// Name of the `index`-th overflow set (0-based), e.g. `"Verbs 2"` for 0.
///
/// The base is shortened if the suffix would push the name past the limit.
pub fn continuation_name(base: &str, index: usize) -> String {
    let suffix = format!(" {}", index + 2);
    let room = MAX_NAME_LEN.saturating_sub(suffix.chars().count());
    let trimmed: String = base.trim().chars().take(room).collect();
    format!("{}{}", trimmed.trim_end(), suffix)
}

impl ItemStore {
    /// Splits a set whose content holds more than `max_cards` cards.
    ///
    /// The first chunk replaces the set's own content; every further chunk
    /// is created as a new set next to it. Returns the ids of the new sets,
    /// empty when the set already fits.
    ///
    /// ## Errors
    /// - `Validation` if `max_cards` is 0 or unreasonably large
    /// - `ItemNotFound` if `id` is not a set
    pub fn split_set(&mut self, id: &str, max_cards: usize) -> CoreResult<Vec<ItemId>> {
        validate_max_cards(max_cards)?;

        let (name, parent_id, content) = match self.get(id) {
            Some(item) if item.kind == ItemKind::Set => (
                item.name.clone(),
                item.parent_id.clone().unwrap_or_else(|| ROOT_ID.to_string()),
                item.content.clone().unwrap_or_default(),
            ),
            _ => return Err(CoreError::ItemNotFound(id.to_string())),
        };

        if content.card_count() <= max_cards {
            return Ok(Vec::new());
        }

        let chunks = chunk_cards(&content.text, max_cards);
        let mut rest = chunks.into_iter();
        let first = rest.next().unwrap_or_default();

        self.update_content(
            id,
            SetContent {
                text: first,
                languages: content.languages.clone(),
            },
        );

        let mut created = Vec::new();
        for (index, text) in rest.enumerate() {
            let new_id = self.create(
                ItemKind::Set,
                &continuation_name(&name, index),
                &parent_id,
                Some(SetContent {
                    text,
                    languages: content.languages.clone(),
                }),
            )?;
            created.push(new_id);
        }

        info!(item_id = %id, new_sets = created.len(), "Set split into chunks");
        Ok(created)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{ManualClock, Timestamp};
    use crate::types::LanguagePair;
    use std::sync::Arc;

    fn numbered_lines(count: usize) -> String {
        (1..=count)
            .map(|n| format!("term{n}, def{n}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_chunk_cards() {
        assert!(chunk_cards("", 30).is_empty());
        assert_eq!(chunk_cards(&numbered_lines(75), 30).len(), 3);
        assert_eq!(chunk_cards(&numbered_lines(60), 30).len(), 2);
    }

    #[test]
    fn test_continuation_name() {
        assert_eq!(continuation_name("Verbs", 0), "Verbs 2");
        assert_eq!(continuation_name("Verbs", 3), "Verbs 5");

        let long = continuation_name(&"x".repeat(MAX_NAME_LEN), 0);
        assert_eq!(long.chars().count(), MAX_NAME_LEN);
        assert!(long.ends_with(" 2"));
    }

    #[test]
    fn test_split_set() {
        let mut store = ItemStore::new(Arc::new(ManualClock::new(Timestamp::zero())));
        let folder = store.create(ItemKind::Folder, "Spanish", ROOT_ID, None).unwrap();
        let languages = Some(LanguagePair {
            term: "es-ES".into(),
            definition: "en-US".into(),
        });
        let id = store
            .create(
                ItemKind::Set,
                "Verbs",
                &folder,
                Some(SetContent {
                    text: numbered_lines(75),
                    languages: languages.clone(),
                }),
            )
            .unwrap();

        let created = store.split_set(&id, 30).unwrap();
        assert_eq!(created.len(), 2);

        let original = store.get(&id).unwrap();
        assert_eq!(original.content.as_ref().unwrap().card_count(), 30);

        let second = store.get(&created[0]).unwrap();
        assert_eq!(second.name, "Verbs 2");
        assert_eq!(second.parent_id.as_deref(), Some(folder.as_str()));
        assert_eq!(second.content.as_ref().unwrap().languages, languages);

        let third = store.get(&created[1]).unwrap();
        assert_eq!(third.name, "Verbs 3");
        assert_eq!(third.content.as_ref().unwrap().card_count(), 15);
    }

    #[test]
    fn test_split_set_that_fits_is_untouched() {
        let mut store = ItemStore::new(Arc::new(ManualClock::new(Timestamp::zero())));
        let id = store
            .create(ItemKind::Set, "Small", ROOT_ID, Some(SetContent::from_text(numbered_lines(5))))
            .unwrap();
        let before = store.to_snapshot();

        assert!(store.split_set(&id, 30).unwrap().is_empty());
        assert_eq!(store.snapshot(), &before);
    }

    #[test]
    fn test_split_rejects_folders_and_zero() {
        let mut store = ItemStore::new(Arc::new(ManualClock::new(Timestamp::zero())));
        let folder = store.create(ItemKind::Folder, "F", ROOT_ID, None).unwrap();

        assert!(matches!(store.split_set(&folder, 30), Err(CoreError::ItemNotFound(_))));
        assert!(matches!(store.split_set(&folder, 0), Err(CoreError::Validation(_))));
    }
}
