//! Persistence of tracks, playlists and playlist ordering.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::library::{Playlist, PlaylistId, PlaylistMembership, Track, TrackId};

mod memory;

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown playlist {0}")]
    UnknownPlaylist(PlaylistId),

    #[error("unknown track {0}")]
    UnknownTrack(TrackId),

    #[error("track {0} appears more than once in the membership list")]
    DuplicateMembership(TrackId),

    #[error("library file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("library file is malformed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether repeating the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

/// Storage of the catalog.
///
/// Every mutating call is atomic: it either applies completely or leaves the
/// store as it was. Deleting tracks or playlists removes the membership rows
/// that reference them and keeps the remaining positions dense.
pub trait LibraryStore: Send + Sync {
    fn upsert_track(&self, track: &Track) -> Result<(), StoreError> {
        self.upsert_tracks(std::slice::from_ref(track))
    }

    /// Insert or replace by id.
    fn upsert_tracks(&self, tracks: &[Track]) -> Result<(), StoreError>;

    fn get_track(&self, id: &TrackId) -> Result<Option<Track>, StoreError>;

    /// Delete every track whose folder is `folder` or lies beneath it.
    /// Returns how many were removed.
    fn delete_tracks_by_folder(&self, folder: &Path) -> Result<usize, StoreError>;

    fn delete_tracks(&self, ids: &[TrackId]) -> Result<usize, StoreError>;

    /// All tracks, ordered by path.
    fn list_tracks(&self) -> Result<Vec<Track>, StoreError>;

    fn upsert_playlist(&self, playlist: &Playlist) -> Result<(), StoreError>;

    /// Delete a playlist with its membership. Returns whether it existed.
    fn delete_playlist(&self, id: &PlaylistId) -> Result<bool, StoreError>;

    fn get_playlist(&self, id: &PlaylistId) -> Result<Option<Playlist>, StoreError>;

    /// All playlists, most recently updated first.
    fn list_playlists(&self) -> Result<Vec<Playlist>, StoreError>;

    /// Replace a playlist's membership with `track_ids`, in order.
    fn set_membership(
        &self,
        playlist: &PlaylistId,
        track_ids: &[TrackId],
    ) -> Result<(), StoreError>;

    fn clear_membership(&self, playlist: &PlaylistId) -> Result<(), StoreError>;

    /// The playlist's tracks in play order.
    fn get_membership(&self, playlist: &PlaylistId) -> Result<Vec<Track>, StoreError>;

    /// The playlist's raw membership rows, ordered by position.
    fn membership_rows(
        &self,
        playlist: &PlaylistId,
    ) -> Result<Vec<PlaylistMembership>, StoreError>;

    /// Ids of every track that belongs to at least one playlist.
    fn referenced_tracks(&self) -> Result<HashSet<TrackId>, StoreError>;
}

#[cfg(test)]
mod tests;
