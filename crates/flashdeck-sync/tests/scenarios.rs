//! End-to-end scenarios: a `Session` over an in-memory SQLite cache and the
//! in-process remote, with simulated time.

use std::sync::Arc;
use std::time::Duration;

use flashdeck_core::{
    root_only_snapshot, ClipboardAction, ItemKind, ItemStore, ManualClock, SetContent, Snapshot,
    Timestamp, ROOT_ID,
};
use flashdeck_db::{Database, DbConfig, LocalCache};
use flashdeck_sync::{MemoryRemote, Session, SessionDeps};

struct Harness {
    _db: Database,
    cache: LocalCache,
    clock: ManualClock,
    remote: MemoryRemote,
}

impl Harness {
    async fn new() -> Self {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let cache = LocalCache::new(&db);
        Harness {
            _db: db,
            cache,
            clock: ManualClock::new(Timestamp::zero()),
            remote: MemoryRemote::new(),
        }
    }

    fn deps(&self) -> SessionDeps {
        SessionDeps::new(self.cache.clone(), Arc::new(self.clock.clone()))
            .with_remote(Arc::new(self.remote.clone()))
    }

    async fn open(&self, owner: &str) -> Session {
        Session::open(Some(owner), self.deps()).await.unwrap()
    }

    /// A tree as another device would have built it.
    fn foreign_store(&self) -> ItemStore {
        ItemStore::new(Arc::new(self.clock.clone()))
    }
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

#[tokio::test]
async fn tree_operations_end_to_end() {
    let h = Harness::new().await;
    let mut session = Session::open(None, SessionDeps::new(h.cache.clone(), Arc::new(h.clock.clone())))
        .await
        .unwrap();

    let a = session.create(ItemKind::Folder, "A", ROOT_ID, None).unwrap();
    let s = session
        .create(ItemKind::Set, "S", &a, Some(SetContent::from_text("cat, felino")))
        .unwrap();

    assert_eq!(session.move_items(&[s.as_str()], ROOT_ID), 1);
    assert_eq!(session.delete(&[a.as_str()]), vec![a.clone()]);

    assert_eq!(session.item_count(), 2);
    assert!(session.contains(ROOT_ID));
    assert!(!session.contains(&a));

    let set = session.get(&s).unwrap();
    assert_eq!(set.parent_id.as_deref(), Some(ROOT_ID));
    assert_eq!(set.content.unwrap().text, "cat, felino");

    // The cache holds the same tree after close.
    let expected = session.snapshot();
    session.close().await;
    assert_eq!(h.cache.load("flashcards_data_local").await, expected);
}

#[tokio::test]
async fn recent_local_item_survives_stale_snapshot() {
    let h = Harness::new().await;
    let mut session = h.open("u1").await;

    let x = session.create(ItemKind::Set, "X", ROOT_ID, None).unwrap();
    session.flush().await;

    // t=3000: a snapshot from before X was pushed arrives.
    h.clock.set(Timestamp::from_millis(3_000));
    assert!(!session.apply_remote_snapshot(&root_only_snapshot()));
    assert!(session.contains(&x));

    // t=15000: the same snapshot now reads as a remote deletion.
    h.clock.set(Timestamp::from_millis(15_000));
    h.remote.publish("u1", root_only_snapshot());
    wait_for(|| !session.contains(&x)).await;

    assert_eq!(session.item_count(), 1);
    assert!(session.status().merges_applied >= 1);
}

#[tokio::test]
async fn applying_the_same_snapshot_twice_changes_nothing() {
    let h = Harness::new().await;
    let session = h.open("u1").await;

    let mut other = h.foreign_store();
    other.create(ItemKind::Folder, "Shared", ROOT_ID, None).unwrap();
    let remote: Snapshot = other.to_snapshot();

    assert!(session.apply_remote_snapshot(&remote));
    let after_first = session.snapshot();
    let writes = h.cache.writes_queued();

    assert!(!session.apply_remote_snapshot(&remote));
    assert_eq!(session.snapshot(), after_first);
    assert_eq!(h.cache.writes_queued(), writes);
}

#[tokio::test]
async fn newer_remote_copy_wins_older_is_ignored() {
    let h = Harness::new().await;
    h.clock.set(Timestamp::from_millis(1_000));
    let mut session = h.open("u1").await;
    let s = session.create(ItemKind::Set, "Local name", ROOT_ID, None).unwrap();

    let mut stale = session.snapshot();
    if let Some(item) = stale.get_mut(&s) {
        item.name = "Stale".into();
        item.modified = Timestamp::from_millis(500);
    }
    assert!(!session.apply_remote_snapshot(&stale));
    assert_eq!(session.get(&s).unwrap().name, "Local name");

    let unchanged = session.snapshot();
    assert!(!session.apply_remote_snapshot(&unchanged));

    let mut newer = session.snapshot();
    if let Some(item) = newer.get_mut(&s) {
        item.name = "Remote name".into();
        item.modified = Timestamp::from_millis(2_000);
    }
    assert!(session.apply_remote_snapshot(&newer));
    assert_eq!(session.get(&s).unwrap(), newer[&s]);
}

#[tokio::test]
async fn first_push_creates_the_remote_document() {
    let h = Harness::new().await;
    let mut session = h.open("u1").await;

    session.create(ItemKind::Folder, "Spanish", ROOT_ID, None).unwrap();
    session.flush().await;

    assert_eq!(h.remote.creates(), 1);
    assert_eq!(h.remote.writes(), 0);
    assert_eq!(h.remote.document("u1"), Some(session.snapshot()));

    session.create(ItemKind::Folder, "German", ROOT_ID, None).unwrap();
    session.flush().await;

    assert_eq!(h.remote.writes(), 1);
    assert_eq!(h.remote.document("u1"), Some(session.snapshot()));

    let status = session.status();
    assert_eq!(status.pushes, 2);
    assert_eq!(status.documents_created, 1);
}

#[tokio::test]
async fn failed_push_keeps_local_state() {
    let h = Harness::new().await;
    h.remote.fail_writes(Some("service unavailable"));
    let mut session = h.open("u1").await;

    let folder = session.create(ItemKind::Folder, "Offline work", ROOT_ID, None).unwrap();
    session.flush().await;

    assert!(session.contains(&folder));
    assert!(h.remote.document("u1").is_none());
    let status = session.status();
    assert_eq!(status.failed_pushes, 1);
    assert!(status.last_error.unwrap().contains("service unavailable"));

    // Nothing is retried; the next change pushes the whole tree.
    h.remote.fail_writes(None);
    session.rename(&folder, "Synced work");
    session.flush().await;
    assert_eq!(h.remote.document("u1"), Some(session.snapshot()));

    session.close().await;
    let reopened = h.open("u1").await;
    assert_eq!(reopened.get(&folder).unwrap().name, "Synced work");
}

#[tokio::test]
async fn remote_changes_merge_without_echo() {
    let h = Harness::new().await;
    let session = h.open("u1").await;

    let mut other = h.foreign_store();
    let shared = other.create(ItemKind::Folder, "From laptop", ROOT_ID, None).unwrap();
    h.remote.publish("u1", other.to_snapshot());

    wait_for(|| session.contains(&shared)).await;
    session.flush().await;

    assert_eq!(h.remote.writes() + h.remote.creates(), 0);
    assert_eq!(session.status().pushes, 0);
}

#[tokio::test]
async fn stream_error_leaves_tree_untouched() {
    let h = Harness::new().await;
    let mut session = h.open("u1").await;
    session.create(ItemKind::Folder, "Keep me", ROOT_ID, None).unwrap();
    let before = session.snapshot();

    h.remote.fail_stream("u1", "listener reset");
    wait_for(|| session.status().last_error.is_some()).await;

    assert_eq!(session.snapshot(), before);
}

#[tokio::test]
async fn switching_owner_swaps_trees() {
    let h = Harness::new().await;
    let mut session = h.open("u1").await;
    let a = session.create(ItemKind::Folder, "Mine", ROOT_ID, None).unwrap();
    session.mark(&[a.as_str()], ClipboardAction::Copy);

    session.switch_owner(Some("u2")).await.unwrap();
    assert_eq!(session.owner(), Some("u2"));
    assert_eq!(session.item_count(), 1);
    assert!(session.clipboard().is_none());

    assert!(session.switch_owner(Some("")).await.is_err());
    assert_eq!(session.owner(), Some("u2"));

    session.switch_owner(Some("u1")).await.unwrap();
    assert!(session.contains(&a));

    session.switch_owner(None).await.unwrap();
    assert!(!session.is_syncing());
    assert_eq!(session.cache_key(), "flashcards_data_local");
}

#[tokio::test]
async fn cut_and_copy_through_the_session() {
    let h = Harness::new().await;
    let mut session = h.open("u1").await;

    let decks = session.create(ItemKind::Folder, "Decks", ROOT_ID, None).unwrap();
    let inner = session.create(ItemKind::Folder, "Inner", &decks, None).unwrap();
    let set = session.create(ItemKind::Set, "Words", &inner, None).unwrap();
    let archive = session.create(ItemKind::Folder, "Archive", ROOT_ID, None).unwrap();

    // Moving a folder into its own descendant is refused.
    session.mark(&[decks.as_str()], ClipboardAction::Cut);
    assert_eq!(session.move_items(&[decks.as_str()], &inner), 0);

    session.paste(&archive);
    assert_eq!(session.get(&decks).unwrap().parent_id.as_deref(), Some(archive.as_str()));
    assert!(session.clipboard().is_none());

    session.mark(&[decks.as_str()], ClipboardAction::Copy);
    session.paste(ROOT_ID);

    let copies = session.children_of(ROOT_ID);
    let copy = copies.iter().find(|item| item.name == "Decks").unwrap();
    assert_ne!(copy.id, decks);
    let copied_inner = session.children_of(&copy.id);
    assert_eq!(copied_inner.len(), 1);
    assert_ne!(copied_inner[0].id, inner);
    let copied_set = session.children_of(&copied_inner[0].id);
    assert_eq!(copied_set.len(), 1);
    assert_ne!(copied_set[0].id, set);

    session.flush().await;
    assert_eq!(h.remote.document("u1"), Some(session.snapshot()));
}

#[tokio::test]
async fn recent_set_keeps_its_old_folder() {
    let h = Harness::new().await;
    let mut session = h.open("u1").await;
    let folder = session.create(ItemKind::Folder, "Old", ROOT_ID, None).unwrap();

    h.clock.set(Timestamp::from_millis(12_000));
    let set = session.create(ItemKind::Set, "Fresh", &folder, None).unwrap();

    h.clock.set(Timestamp::from_millis(15_000));
    assert!(!session.apply_remote_snapshot(&root_only_snapshot()));

    let kept = session.get(&set).unwrap();
    assert_eq!(kept.parent_id.as_deref(), Some(folder.as_str()));
    assert_eq!(session.path_to(&set).len(), 3);
}
