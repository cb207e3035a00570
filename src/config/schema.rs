use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::playback::PlayMode;

/// Top-level settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/segue/config.toml` or `~/.config/segue/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `SEGUE__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub library: LibrarySettings,
    pub playback: PlaybackSettings,
    pub import: ImportSettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// File extensions to treat as audio (case-insensitive, without dot).
    pub extensions: Vec<String>,
    /// Whether to follow symlinks during scanning. Symlink loops are detected
    /// by the walker and counted as skipped entries.
    pub follow_links: bool,
    /// Whether to include hidden files/directories (dotfiles).
    pub include_hidden: bool,
    /// Cap on directory recursion depth. `None` means unbounded.
    pub max_depth: Option<usize>,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            extensions: ["mp3", "flac", "aac", "ogg", "wav", "m4a", "wma", "opus"]
                .into_iter()
                .map(String::from)
                .collect(),
            follow_links: true,
            include_hidden: false,
            max_depth: Some(32),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Play mode the session starts in.
    pub play_mode: PlayMode,
    /// How often the worker polls the transport for position/duration while playing.
    pub poll_interval_ms: u64,
    /// Fixed seed for shuffle navigation. Unset means seeded from the OS.
    pub shuffle_seed: Option<u64>,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            play_mode: PlayMode::Sequential,
            poll_interval_ms: 250,
            shuffle_seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ImportSettings {
    /// How many times a single persistence step is attempted before the
    /// import gives up and rolls back.
    pub persist_attempts: u32,
    /// Pause between attempts (milliseconds).
    pub retry_backoff_ms: u64,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            persist_attempts: 3,
            retry_backoff_ms: 25,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Where the library file lives. Falls back to the XDG data directory.
    pub library_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "segue=info".to_string(),
        }
    }
}
