//! Folder imports and playlist membership edits.
//!
//! All membership changes for one playlist go through a per-playlist lock,
//! so an import and a manual add/remove on the same playlist never interleave.
//! Persistence steps that fail with a transient error are retried a few
//! times before the operation gives up.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::ImportSettings;
use crate::library::{LibraryScanner, Playlist, PlaylistId, Track, TrackId};
use crate::store::{LibraryStore, StoreError};

mod locks;

use locks::PlaylistLocks;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("playlist {0} not found")]
    PlaylistNotFound(PlaylistId),

    #[error("playlist {0} was not imported from a folder")]
    NotFolderBacked(PlaylistId),

    #[error("track {0} not found")]
    TrackNotFound(TrackId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ImportError {
    /// Persistence failures may go through on a later attempt; the others will not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

pub struct ImportCoordinator {
    store: Arc<dyn LibraryStore>,
    scanner: LibraryScanner,
    locks: PlaylistLocks,
    settings: ImportSettings,
}

impl ImportCoordinator {
    pub fn new(
        store: Arc<dyn LibraryStore>,
        scanner: LibraryScanner,
        settings: ImportSettings,
    ) -> Self {
        Self {
            store,
            scanner,
            locks: PlaylistLocks::default(),
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn LibraryStore> {
        &self.store
    }

    /// Import `path` as a new playlist named `name` (default: the folder name).
    ///
    /// Tracks are upserted, so re-importing known files does not duplicate
    /// them. If the membership cannot be written the new playlist is removed
    /// again and the error returned.
    pub fn add_folder(&self, path: &Path, name: Option<&str>) -> Result<PlaylistId, ImportError> {
        let report = self.scanner.scan(path);
        let folder = self.scanner.resolve(path);
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| folder_name(&folder));

        let tracks = self.keep_added_at(report.tracks)?;
        let track_ids = unique_ids(&tracks);
        let playlist = Playlist::for_folder(name, folder, Utc::now());

        let lock = self.locks.lock_for(&playlist.id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        self.with_retry("upsert tracks", || self.store.upsert_tracks(&tracks))?;
        self.with_retry("create playlist", || self.store.upsert_playlist(&playlist))?;

        if let Err(e) = self.with_retry("publish membership", || {
            self.store.set_membership(&playlist.id, &track_ids)
        }) {
            warn!(playlist = %playlist.id, error = %e, "import failed; removing playlist");
            if let Err(rb) = self.store.delete_playlist(&playlist.id) {
                error!(playlist = %playlist.id, error = %rb, "rollback failed");
            }
            self.locks.forget(&playlist.id);
            return Err(e.into());
        }

        info!(
            playlist = %playlist.id,
            name = %playlist.name,
            tracks = track_ids.len(),
            skipped = report.skipped,
            "folder imported"
        );
        Ok(playlist.id)
    }

    /// Re-scan a folder-backed playlist and republish its membership.
    ///
    /// Tracks that lived under the folder, are gone from disk and no longer
    /// belong to any playlist are removed afterwards. Returns the new track count.
    pub fn refresh_folder(&self, id: &PlaylistId) -> Result<usize, ImportError> {
        let playlist = self.require_playlist(id)?;
        let folder = playlist
            .source_folder
            .clone()
            .ok_or_else(|| ImportError::NotFolderBacked(id.clone()))?;

        let report = self.scanner.scan(&folder);
        let tracks = self.keep_added_at(report.tracks)?;
        let track_ids = unique_ids(&tracks);

        self.edit_membership(id, |current, _| {
            self.with_retry("upsert tracks", || self.store.upsert_tracks(&tracks))?;
            self.publish(current, &track_ids)?;

            let keep: HashSet<&TrackId> = track_ids.iter().collect();
            if let Err(e) = self.prune_missing(&folder, &keep) {
                warn!(playlist = %id, error = %e, "could not prune removed tracks");
            }
            Ok(())
        })?;

        info!(playlist = %id, tracks = track_ids.len(), "folder refreshed");
        Ok(track_ids.len())
    }

    /// Create an empty playlist not tied to any folder.
    pub fn create_playlist(&self, name: &str) -> Result<PlaylistId, ImportError> {
        let playlist = Playlist::manual(name, Utc::now());
        self.with_retry("create playlist", || self.store.upsert_playlist(&playlist))?;
        info!(playlist = %playlist.id, name, "playlist created");
        Ok(playlist.id)
    }

    /// Delete a playlist and its membership. Tracks stay in the library.
    pub fn delete_playlist(&self, id: &PlaylistId) -> Result<bool, ImportError> {
        let lock = self.locks.lock_for(id);
        let existed = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.with_retry("delete playlist", || self.store.delete_playlist(id))?
        };
        self.locks.forget(id);
        if existed {
            info!(playlist = %id, "playlist deleted");
        }
        Ok(existed)
    }

    /// Append a track. Returns `false` when it already was in the playlist.
    pub fn add_track_to_playlist(
        &self,
        id: &PlaylistId,
        track: &TrackId,
    ) -> Result<bool, ImportError> {
        self.edit_membership(id, |playlist, ids| {
            if self.store.get_track(track)?.is_none() {
                return Err(ImportError::TrackNotFound(track.clone()));
            }
            if ids.contains(track) {
                return Ok(false);
            }
            ids.push(track.clone());
            self.publish(playlist, ids)?;
            Ok(true)
        })
    }

    /// Remove a track. Returns `false` when it was not in the playlist.
    pub fn remove_track_from_playlist(
        &self,
        id: &PlaylistId,
        track: &TrackId,
    ) -> Result<bool, ImportError> {
        self.edit_membership(id, |playlist, ids| {
            let before = ids.len();
            ids.retain(|t| t != track);
            if ids.len() == before {
                return Ok(false);
            }
            self.publish(playlist, ids)?;
            Ok(true)
        })
    }

    /// Add one audio file to the library without touching any playlist.
    pub fn import_file(&self, path: &Path) -> Result<Option<Track>, ImportError> {
        let Some(mut track) = self.scanner.scan_file(path) else {
            warn!(path = %path.display(), "not an audio file");
            return Ok(None);
        };
        if let Some(known) = self.store.get_track(&track.id)? {
            track.added_at = known.added_at;
        }
        self.with_retry("upsert track", || self.store.upsert_track(&track))?;
        Ok(Some(track))
    }

    /// All playlists, most recently updated first.
    pub fn playlists(&self) -> Result<Vec<Playlist>, ImportError> {
        Ok(self.store.list_playlists()?)
    }

    pub fn playlist(&self, id: &PlaylistId) -> Result<Playlist, ImportError> {
        self.require_playlist(id)
    }

    /// The playlist's tracks in play order.
    pub fn playlist_tracks(&self, id: &PlaylistId) -> Result<Vec<Track>, ImportError> {
        self.require_playlist(id)?;
        Ok(self.store.get_membership(id)?)
    }

    pub fn tracks(&self) -> Result<Vec<Track>, ImportError> {
        Ok(self.store.list_tracks()?)
    }

    /// [`add_folder`](Self::add_folder) on a background thread.
    pub fn spawn_add_folder(
        self: &Arc<Self>,
        path: PathBuf,
        name: Option<String>,
    ) -> io::Result<JoinHandle<Result<PlaylistId, ImportError>>> {
        let this = Arc::clone(self);
        thread::Builder::new()
            .name("segue-import".to_string())
            .spawn(move || this.add_folder(&path, name.as_deref()))
    }

    /// [`refresh_folder`](Self::refresh_folder) on a background thread.
    pub fn spawn_refresh_folder(
        self: &Arc<Self>,
        id: PlaylistId,
    ) -> io::Result<JoinHandle<Result<usize, ImportError>>> {
        let this = Arc::clone(self);
        thread::Builder::new()
            .name("segue-refresh".to_string())
            .spawn(move || this.refresh_folder(&id))
    }

    fn require_playlist(&self, id: &PlaylistId) -> Result<Playlist, ImportError> {
        self.store
            .get_playlist(id)?
            .ok_or_else(|| ImportError::PlaylistNotFound(id.clone()))
    }

    /// Run `edit` on the playlist's current member ids while holding its lock.
    ///
    /// Unknown playlists are rejected before a lock entry is created; one
    /// deleted while we waited for the lock has its entry dropped again.
    fn edit_membership<T>(
        &self,
        id: &PlaylistId,
        edit: impl FnOnce(&Playlist, &mut Vec<TrackId>) -> Result<T, ImportError>,
    ) -> Result<T, ImportError> {
        self.require_playlist(id)?;
        let lock = self.locks.lock_for(id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let playlist = match self.require_playlist(id) {
            Ok(p) => p,
            Err(e) => {
                self.locks.forget(id);
                return Err(e);
            }
        };
        let mut ids = self.member_ids(id)?;
        edit(&playlist, &mut ids)
    }

    fn member_ids(&self, id: &PlaylistId) -> Result<Vec<TrackId>, StoreError> {
        Ok(self
            .store
            .membership_rows(id)?
            .into_iter()
            .map(|m| m.track_id)
            .collect())
    }

    /// Keep the original ingestion time of tracks the library already knows.
    fn keep_added_at(&self, mut tracks: Vec<Track>) -> Result<Vec<Track>, StoreError> {
        for t in &mut tracks {
            if let Some(known) = self.store.get_track(&t.id)? {
                t.added_at = known.added_at;
            }
        }
        Ok(tracks)
    }

    fn prune_missing(&self, folder: &Path, keep: &HashSet<&TrackId>) -> Result<usize, StoreError> {
        let referenced = self.store.referenced_tracks()?;
        let stale: Vec<TrackId> = self
            .store
            .list_tracks()?
            .into_iter()
            .filter(|t| t.folder.starts_with(folder))
            .filter(|t| !keep.contains(&t.id) && !referenced.contains(&t.id))
            .filter(|t| !self.scanner.exists(&t.path))
            .map(|t| t.id)
            .collect();
        if stale.is_empty() {
            return Ok(0);
        }
        let removed = self.with_retry("prune tracks", || self.store.delete_tracks(&stale))?;
        info!(folder = %folder.display(), removed, "pruned tracks no longer on disk");
        Ok(removed)
    }

    /// Replace `playlist`'s membership with `track_ids` and bump its `updated_at`.
    ///
    /// The bumped row is written first. If the membership then cannot be
    /// written, the previous row is put back, so a failed call leaves the
    /// playlist as it was.
    fn publish(&self, playlist: &Playlist, track_ids: &[TrackId]) -> Result<(), StoreError> {
        let mut touched = playlist.clone();
        touched.updated_at = bumped(playlist.updated_at, Utc::now());
        self.with_retry("update playlist", || self.store.upsert_playlist(&touched))?;

        if let Err(e) = self.with_retry("publish membership", || {
            self.store.set_membership(&playlist.id, track_ids)
        }) {
            warn!(
                playlist = %playlist.id,
                error = %e,
                "membership not published; restoring playlist"
            );
            if let Err(rb) = self.store.upsert_playlist(playlist) {
                error!(playlist = %playlist.id, error = %rb, "restoring playlist failed");
            }
            return Err(e);
        }
        Ok(())
    }

    fn with_retry<T>(
        &self,
        step: &'static str,
        mut op: impl FnMut() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let attempts = self.settings.persist_attempts.max(1);
        let backoff = Duration::from_millis(self.settings.retry_backoff_ms);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(step, attempt, error = %e, "persist step failed; retrying");
                    if !backoff.is_zero() {
                        thread::sleep(backoff);
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// `now`, or just past `previous` if the clock has not moved beyond it.
fn bumped(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + chrono::Duration::milliseconds(1)
    }
}

fn unique_ids(tracks: &[Track]) -> Vec<TrackId> {
    let mut seen = HashSet::with_capacity(tracks.len());
    tracks
        .iter()
        .filter(|t| seen.insert(&t.id))
        .map(|t| t.id.clone())
        .collect()
}

fn folder_name(folder: &Path) -> String {
    folder
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| folder.display().to_string())
}
