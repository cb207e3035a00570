use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use xxhash_rust::xxh3::xxh3_64;

use super::metadata::TrackMetadata;

/// Stable track identifier, derived from the file's absolute path.
///
/// Re-importing the same file always yields the same id, so re-scans upsert
/// instead of duplicating.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn for_path(path: &Path) -> Self {
        Self(format!("{:016x}", xxh3_64(path.as_os_str().as_encoded_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TrackId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaylistId(String);

impl PlaylistId {
    /// A fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PlaylistId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PlaylistId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_ms: u64,
    /// Absolute path of the audio file.
    pub path: PathBuf,
    /// Directory containing the file.
    pub folder: PathBuf,
    pub size_bytes: u64,
    pub added_at: DateTime<Utc>,
}

impl Track {
    pub fn from_file(
        path: &Path,
        size_bytes: u64,
        meta: TrackMetadata,
        added_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TrackId::for_path(path),
            title: meta.title,
            artist: meta.artist,
            album: meta.album,
            duration_ms: meta.duration_ms,
            path: path.to_path_buf(),
            folder: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            size_bytes,
            added_at,
        }
    }

    /// "Artist - Title", or just the title when there is no artist.
    pub fn display_name(&self) -> String {
        match self.artist.as_deref().map(str::trim) {
            Some(a) if !a.is_empty() => format!("{a} - {}", self.title),
            _ => self.title.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: PlaylistId,
    pub name: String,
    /// Folder the playlist was imported from. `None` for hand-built playlists.
    pub source_folder: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    /// Bumped on every membership change.
    pub updated_at: DateTime<Utc>,
}

impl Playlist {
    pub fn manual(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: PlaylistId::generate(),
            name: name.into(),
            source_folder: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn for_folder(name: impl Into<String>, folder: PathBuf, now: DateTime<Utc>) -> Self {
        Self {
            source_folder: Some(folder),
            ..Self::manual(name, now)
        }
    }
}

/// One row of a playlist's ordering. Positions of a playlist are always `0..count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistMembership {
    pub playlist_id: PlaylistId,
    pub track_id: TrackId,
    pub position: usize,
}
