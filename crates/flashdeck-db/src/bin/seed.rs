//! # Seed Data Generator
//!
//! Writes a demo item tree into the local cache for development.
//!
//! ## Usage
//! ```bash
//! # Seed the anonymous tree in ./flashdeck_dev.db
//! cargo run -p flashdeck-db --bin seed
//!
//! # Seed a specific owner
//! cargo run -p flashdeck-db --bin seed -- --owner user-42
//!
//! # Specify database path
//! cargo run -p flashdeck-db --bin seed -- --db ./data/flashdeck.db
//! ```
//!
//! ## Generated Tree
//! ```text
//! Main
//! ├── Spanish
//! │   ├── Animals      (set)
//! │   └── Verbs        (set, 75 cards → split into Verbs, Verbs 2, Verbs 3)
//! ├── German
//! │   └── Basics       (set)
//! └── Scratch          (set, empty)
//! ```

use std::env;
use std::sync::Arc;

use flashdeck_core::{
    ItemKind, ItemStore, LanguagePair, Permission, SetContent, SystemClock,
    DEFAULT_CACHE_NAMESPACE, DEFAULT_MASS_CREATE_MAX, ROOT_ID,
};
use flashdeck_db::{cache_key, Database, DbConfig, LocalCache};
use tracing::info;
use tracing_subscriber::EnvFilter;

const VERBS: &[(&str, &str)] = &[
    ("ser", "to be"),
    ("estar", "to be (state)"),
    ("tener", "to have"),
    ("hacer", "to do"),
    ("ir", "to go"),
    ("poder", "to be able"),
    ("decir", "to say"),
    ("dar", "to give"),
    ("saber", "to know"),
    ("querer", "to want"),
    ("llegar", "to arrive"),
    ("pasar", "to pass"),
    ("deber", "to owe"),
    ("poner", "to put"),
    ("parecer", "to seem"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,flashdeck=debug,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut owner: Option<String> = None;
    let mut db_path = String::from("./flashdeck_dev.db");
    let mut namespace = String::from(DEFAULT_CACHE_NAMESPACE);

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--owner" | "-o" => {
                if i + 1 < args.len() {
                    owner = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--namespace" | "-n" => {
                if i + 1 < args.len() {
                    namespace = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Flashdeck Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -o, --owner <ID>       Owner id (default: anonymous)");
                println!("  -d, --db <PATH>        Database file path (default: ./flashdeck_dev.db)");
                println!("  -n, --namespace <NS>   Cache namespace (default: {})", DEFAULT_CACHE_NAMESPACE);
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let cache = LocalCache::new(&db);
    let key = cache_key(&namespace, owner.as_deref());

    let existing = cache.load(&key).await;
    if existing.len() > 1 {
        println!("⚠ {} already holds {} items", key, existing.len());
        println!("  Skipping seed to avoid clobbering it.");
        return Ok(());
    }

    let store = build_demo_tree()?;
    cache.save(&key, store.snapshot());
    cache.flush().await;

    info!(cache_key = %key, items = store.item_count(), "Seeded demo tree");
    println!("✓ Seeded {} items into {} ({})", store.item_count(), key, db_path);

    db.close().await;
    Ok(())
}

fn build_demo_tree() -> Result<ItemStore, Box<dyn std::error::Error>> {
    let mut store = ItemStore::new(Arc::new(SystemClock));
    let spanish_tags = Some(LanguagePair {
        term: "es-ES".to_string(),
        definition: "en-US".to_string(),
    });

    let spanish = store.create(ItemKind::Folder, "Spanish", ROOT_ID, None)?;
    store.create(
        ItemKind::Set,
        "Animals",
        &spanish,
        Some(SetContent {
            text: "gato, cat\nperro, dog\ncaballo, horse\npájaro, bird".to_string(),
            languages: spanish_tags.clone(),
        }),
    )?;

    let verbs_text = (0..5)
        .flat_map(|round| {
            VERBS
                .iter()
                .map(move |(term, definition)| format!("{term} ({}), {definition}", round + 1))
        })
        .collect::<Vec<_>>()
        .join("\n");
    let verbs = store.create(
        ItemKind::Set,
        "Verbs",
        &spanish,
        Some(SetContent {
            text: verbs_text,
            languages: spanish_tags,
        }),
    )?;
    store.split_set(&verbs, DEFAULT_MASS_CREATE_MAX)?;

    let german = store.create(ItemKind::Folder, "German", ROOT_ID, None)?;
    let basics = store.create(
        ItemKind::Set,
        "Basics",
        &german,
        Some(SetContent::from_text("Hallo, hello\nDanke, thanks")),
    )?;
    store.update_permissions(&basics, Permission::Link);

    store.create(ItemKind::Set, "Scratch", ROOT_ID, None)?;

    Ok(store)
}
