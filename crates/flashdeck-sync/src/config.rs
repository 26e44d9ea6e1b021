//! # Flashdeck Configuration
//!
//! Configuration for the local cache and the sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     FLASHDECK_SYNC_MODE=offline                                        │
//! │     FLASHDECK_REMOTE_URL=wss://sync.example.com/docs                   │
//! │     FLASHDECK_RECENCY_WINDOW_MS=10000                                  │
//! │     FLASHDECK_CACHE_NAMESPACE=flashcards_data                          │
//! │     FLASHDECK_DB_PATH=/tmp/flashdeck.db                                │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/flashdeck/flashdeck.toml (Linux)                         │
//! │     ~/Library/Application Support/com.flashdeck.flashdeck/... (macOS)  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     SyncMode::Auto, no remote, 10 s recency window                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # flashdeck.toml
//! [cache]
//! namespace = "flashcards_data"
//! database_path = "/home/me/.local/share/flashdeck/flashdeck.db"
//!
//! [sync]
//! mode = "auto"  # auto | offline
//! remote_url = "wss://sync.example.com/docs"
//! recency_window_ms = 10000
//! connect_timeout_secs = 10
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use flashdeck_core::{DEFAULT_CACHE_NAMESPACE, DEFAULT_RECENCY_WINDOW};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Sync Mode
// =============================================================================

/// Whether this client talks to the remote at all.
///
/// ```text
/// AUTO (Default)                      OFFLINE
/// ──────────────                      ───────
/// • Pushes every local change         • Local cache only
/// • Merges remote snapshots           • No remote traffic
/// • Runs local-only if no remote      • Use for testing or isolated mode
///   is configured
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Sync whenever a remote is available.
    #[default]
    Auto,

    /// Sync disabled - local cache only.
    Offline,
}

impl SyncMode {
    /// Returns true if sync is enabled at all.
    pub fn is_sync_enabled(&self) -> bool {
        !matches!(self, SyncMode::Offline)
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::Auto => write!(f, "auto"),
            SyncMode::Offline => write!(f, "offline"),
        }
    }
}

impl std::str::FromStr for SyncMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" | "online" => Ok(SyncMode::Auto),
            "offline" | "disabled" => Ok(SyncMode::Offline),
            other => Err(SyncError::InvalidConfig(format!(
                "Unknown sync mode: '{}'. Valid options: auto, offline",
                other
            ))),
        }
    }
}

// =============================================================================
// Cache Settings
// =============================================================================

/// Local cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Prefix of every cache key.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// SQLite file. Defaults to `flashdeck.db` in the platform data dir.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

fn default_namespace() -> String {
    DEFAULT_CACHE_NAMESPACE.to_string()
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            namespace: default_namespace(),
            database_path: None,
        }
    }
}

impl CacheSettings {
    /// The configured database path, or the platform default.
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        self.database_path.clone().or_else(|| {
            directories::ProjectDirs::from("com", "flashdeck", "flashdeck")
                .map(|dirs| dirs.data_dir().join("flashdeck.db"))
        })
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Sync behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Sync mode for this client.
    #[serde(default)]
    pub mode: SyncMode,

    /// WebSocket URL of the remote document service.
    #[serde(default)]
    pub remote_url: Option<String>,

    /// How long a local item missing from a remote snapshot survives
    /// (milliseconds).
    #[serde(default = "default_recency_window")]
    pub recency_window_ms: u64,

    /// Connection timeout (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Maximum reconnection attempts before giving up.
    /// Set to 0 for infinite retries.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff duration (milliseconds) for reconnection.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration (seconds) for reconnection.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_recency_window() -> u64 {
    DEFAULT_RECENCY_WINDOW.as_millis() as u64
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_max_retries() -> u32 {
    0 // Infinite
}
fn default_initial_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    60
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            mode: SyncMode::default(),
            remote_url: None,
            recency_window_ms: default_recency_window(),
            connect_timeout_secs: default_connect_timeout(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete Flashdeck configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlashdeckConfig {
    /// Local cache settings.
    #[serde(default)]
    pub cache: CacheSettings,

    /// Sync behavior settings.
    #[serde(default)]
    pub sync: SyncSettings,
}

impl FlashdeckConfig {
    /// Creates a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (flashdeck.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        let namespace = &self.cache.namespace;
        if namespace.is_empty() || namespace.chars().any(char::is_whitespace) {
            return Err(SyncError::InvalidConfig(
                "cache namespace must be non-empty and contain no whitespace".into(),
            ));
        }

        if let Some(ref url) = self.sync.remote_url {
            if !url.starts_with("ws://") && !url.starts_with("wss://") {
                return Err(SyncError::InvalidUrl(format!(
                    "Remote URL must start with ws:// or wss://, got: {}",
                    url
                )));
            }
            url::Url::parse(url)?;
        }

        if self.sync.recency_window_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "recency_window_ms must be greater than 0".into(),
            ));
        }

        if self.sync.initial_backoff_ms > self.sync.max_backoff_secs.saturating_mul(1000) {
            return Err(SyncError::InvalidConfig(
                "initial_backoff_ms must not exceed max_backoff_secs".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key → value lookup.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(mode) = lookup("FLASHDECK_SYNC_MODE") {
            match mode.parse() {
                Ok(parsed) => {
                    debug!(mode = %mode, "Overriding sync mode from environment");
                    self.sync.mode = parsed;
                }
                Err(_) => warn!(mode = %mode, "Unknown sync mode in environment"),
            }
        }

        if let Some(url) = lookup("FLASHDECK_REMOTE_URL") {
            debug!(url = %url, "Overriding remote URL from environment");
            self.sync.remote_url = Some(url);
        }

        if let Some(window) = lookup("FLASHDECK_RECENCY_WINDOW_MS") {
            match window.parse::<u64>() {
                Ok(ms) => self.sync.recency_window_ms = ms,
                Err(_) => warn!(value = %window, "Invalid recency window in environment"),
            }
        }

        if let Some(namespace) = lookup("FLASHDECK_CACHE_NAMESPACE") {
            self.cache.namespace = namespace;
        }

        if let Some(path) = lookup("FLASHDECK_DB_PATH") {
            self.cache.database_path = Some(PathBuf::from(path));
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "flashdeck", "flashdeck")
            .map(|dirs| dirs.config_dir().join("flashdeck.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the sync mode.
    pub fn mode(&self) -> SyncMode {
        self.sync.mode
    }

    /// Returns true if sync is enabled.
    pub fn is_sync_enabled(&self) -> bool {
        self.sync.mode.is_sync_enabled()
    }

    /// Returns the remote URL if configured.
    pub fn remote_url(&self) -> Option<&str> {
        self.sync.remote_url.as_deref()
    }

    /// Returns the cache namespace.
    pub fn namespace(&self) -> &str {
        &self.cache.namespace
    }

    /// Returns the merge recency window.
    pub fn recency_window(&self) -> Duration {
        Duration::from_millis(self.sync.recency_window_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_sync_mode_parsing() {
        assert_eq!("auto".parse::<SyncMode>().unwrap(), SyncMode::Auto);
        assert_eq!("OFFLINE".parse::<SyncMode>().unwrap(), SyncMode::Offline);
        assert_eq!("disabled".parse::<SyncMode>().unwrap(), SyncMode::Offline);
        assert!("primary".parse::<SyncMode>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = FlashdeckConfig::default();
        assert_eq!(config.mode(), SyncMode::Auto);
        assert_eq!(config.namespace(), "flashcards_data");
        assert_eq!(config.recency_window(), Duration::from_secs(10));
        assert!(config.remote_url().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = FlashdeckConfig::default();

        config.sync.remote_url = Some("http://invalid".to_string());
        assert!(config.validate().is_err());

        config.sync.remote_url = Some("wss://sync.example.com/docs".to_string());
        assert!(config.validate().is_ok());

        config.sync.recency_window_ms = 0;
        assert!(config.validate().is_err());

        config.sync.recency_window_ms = 10_000;
        config.cache.namespace = "has space".to_string();
        assert!(config.validate().unwrap_err().is_config_error());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("FLASHDECK_SYNC_MODE", "offline"),
            ("FLASHDECK_REMOTE_URL", "ws://localhost:9000"),
            ("FLASHDECK_RECENCY_WINDOW_MS", "2500"),
            ("FLASHDECK_CACHE_NAMESPACE", "test_ns"),
            ("FLASHDECK_DB_PATH", "/tmp/fd.db"),
        ]
        .into_iter()
        .collect();

        let mut config = FlashdeckConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.mode(), SyncMode::Offline);
        assert_eq!(config.remote_url(), Some("ws://localhost:9000"));
        assert_eq!(config.recency_window(), Duration::from_millis(2500));
        assert_eq!(config.namespace(), "test_ns");
        assert_eq!(config.cache.database_path, Some(PathBuf::from("/tmp/fd.db")));
    }

    #[test]
    fn test_bad_override_is_ignored() {
        let mut config = FlashdeckConfig::default();
        config.apply_overrides(|key| match key {
            "FLASHDECK_RECENCY_WINDOW_MS" => Some("soon".to_string()),
            "FLASHDECK_SYNC_MODE" => Some("sideways".to_string()),
            _ => None,
        });

        assert_eq!(config.recency_window(), Duration::from_secs(10));
        assert_eq!(config.mode(), SyncMode::Auto);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: FlashdeckConfig = toml::from_str(
            r#"
            [sync]
            mode = "offline"
            "#,
        )
        .unwrap();

        assert_eq!(config.mode(), SyncMode::Offline);
        assert_eq!(config.sync.recency_window_ms, 10_000);
        assert_eq!(config.namespace(), "flashcards_data");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("flashdeck.toml");

        let mut config = FlashdeckConfig::default();
        config.sync.remote_url = Some("ws://127.0.0.1:8765/docs".to_string());
        config.sync.recency_window_ms = 4_000;
        config.save(Some(path.clone())).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[cache]"));
        assert!(text.contains("[sync]"));

        let loaded: FlashdeckConfig = toml::from_str(&text).unwrap();
        assert_eq!(loaded.remote_url(), Some("ws://127.0.0.1:8765/docs"));
        assert_eq!(loaded.recency_window(), Duration::from_millis(4_000));
    }

    #[test]
    fn test_invalid_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flashdeck.toml");
        std::fs::write(&path, "[sync]\nmode = 42\n").unwrap();

        assert!(FlashdeckConfig::load(Some(path.clone())).is_err());
        let config = FlashdeckConfig::load_or_default(Some(path));
        assert_eq!(config.namespace(), "flashcards_data");
    }
}
