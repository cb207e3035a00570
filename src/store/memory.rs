use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::library::{Playlist, PlaylistId, PlaylistMembership, Track, TrackId};

use super::{LibraryStore, StoreError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct LibraryData {
    tracks: BTreeMap<TrackId, Track>,
    playlists: BTreeMap<PlaylistId, Playlist>,
    memberships: Vec<PlaylistMembership>,
}

impl LibraryData {
    fn remove_tracks(&mut self, ids: &HashSet<TrackId>) -> usize {
        let before = self.tracks.len();
        self.tracks.retain(|id, _| !ids.contains(id));
        self.memberships.retain(|m| !ids.contains(&m.track_id));
        self.renumber();
        before - self.tracks.len()
    }

    /// Close gaps left by removed rows, keeping relative order.
    fn renumber(&mut self) {
        self.memberships.sort_by(|a, b| {
            a.playlist_id
                .cmp(&b.playlist_id)
                .then(a.position.cmp(&b.position))
        });
        let mut next: HashMap<PlaylistId, usize> = HashMap::new();
        for m in &mut self.memberships {
            let slot = next.entry(m.playlist_id.clone()).or_insert(0);
            m.position = *slot;
            *slot += 1;
        }
    }

    fn rows(&self, playlist: &PlaylistId) -> Vec<PlaylistMembership> {
        let mut rows: Vec<_> = self
            .memberships
            .iter()
            .filter(|m| &m.playlist_id == playlist)
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.position);
        rows
    }
}

/// In-memory store, optionally mirrored to a JSON file.
///
/// Mutations are applied to a copy, written out, and only then made
/// visible, so a failed write leaves both the file and the in-memory state
/// untouched.
#[derive(Debug)]
pub struct MemoryStore {
    data: Mutex<LibraryData>,
    path: Option<PathBuf>,
}

impl MemoryStore {
    pub fn in_memory() -> Self {
        Self {
            data: Mutex::new(LibraryData::default()),
            path: None,
        }
    }

    /// Open the library file at `path`, starting empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data: LibraryData = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => LibraryData::default(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        info!(
            path = %path.display(),
            tracks = data.tracks.len(),
            playlists = data.playlists.len(),
            "library opened"
        );
        Ok(Self {
            data: Mutex::new(data),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, LibraryData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read<R>(&self, f: impl FnOnce(&LibraryData) -> R) -> Result<R, StoreError> {
        Ok(f(&self.lock()))
    }

    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut LibraryData) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut guard = self.lock();
        let mut next = guard.clone();
        let out = f(&mut next)?;
        self.persist(&next)?;
        *guard = next;
        Ok(out)
    }

    fn persist(&self, data: &LibraryData) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: io::Error| StoreError::Io { path, source }
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        let raw = serde_json::to_vec_pretty(data)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, raw).map_err(io_err(&tmp))?;
        fs::rename(&tmp, path).map_err(io_err(path))?;
        debug!(path = %path.display(), "library saved");
        Ok(())
    }
}

impl LibraryStore for MemoryStore {
    fn upsert_tracks(&self, tracks: &[Track]) -> Result<(), StoreError> {
        if tracks.is_empty() {
            return Ok(());
        }
        self.mutate(|d| {
            for t in tracks {
                d.tracks.insert(t.id.clone(), t.clone());
            }
            Ok(())
        })
    }

    fn get_track(&self, id: &TrackId) -> Result<Option<Track>, StoreError> {
        self.read(|d| d.tracks.get(id).cloned())
    }

    fn delete_tracks_by_folder(&self, folder: &Path) -> Result<usize, StoreError> {
        self.mutate(|d| {
            let ids: HashSet<TrackId> = d
                .tracks
                .values()
                .filter(|t| t.folder.starts_with(folder))
                .map(|t| t.id.clone())
                .collect();
            Ok(d.remove_tracks(&ids))
        })
    }

    fn delete_tracks(&self, ids: &[TrackId]) -> Result<usize, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids: HashSet<TrackId> = ids.iter().cloned().collect();
        self.mutate(|d| Ok(d.remove_tracks(&ids)))
    }

    fn list_tracks(&self) -> Result<Vec<Track>, StoreError> {
        self.read(|d| {
            let mut tracks: Vec<Track> = d.tracks.values().cloned().collect();
            tracks.sort_by(|a, b| a.path.cmp(&b.path));
            tracks
        })
    }

    fn upsert_playlist(&self, playlist: &Playlist) -> Result<(), StoreError> {
        self.mutate(|d| {
            d.playlists.insert(playlist.id.clone(), playlist.clone());
            Ok(())
        })
    }

    fn delete_playlist(&self, id: &PlaylistId) -> Result<bool, StoreError> {
        self.mutate(|d| {
            let existed = d.playlists.remove(id).is_some();
            d.memberships.retain(|m| &m.playlist_id != id);
            Ok(existed)
        })
    }

    fn get_playlist(&self, id: &PlaylistId) -> Result<Option<Playlist>, StoreError> {
        self.read(|d| d.playlists.get(id).cloned())
    }

    fn list_playlists(&self) -> Result<Vec<Playlist>, StoreError> {
        self.read(|d| {
            let mut playlists: Vec<Playlist> = d.playlists.values().cloned().collect();
            playlists.sort_by(|a, b| {
                b.updated_at
                    .cmp(&a.updated_at)
                    .then_with(|| a.name.cmp(&b.name))
            });
            playlists
        })
    }

    fn set_membership(
        &self,
        playlist: &PlaylistId,
        track_ids: &[TrackId],
    ) -> Result<(), StoreError> {
        self.mutate(|d| {
            if !d.playlists.contains_key(playlist) {
                return Err(StoreError::UnknownPlaylist(playlist.clone()));
            }
            let mut seen = HashSet::with_capacity(track_ids.len());
            for id in track_ids {
                if !d.tracks.contains_key(id) {
                    return Err(StoreError::UnknownTrack(id.clone()));
                }
                if !seen.insert(id) {
                    return Err(StoreError::DuplicateMembership(id.clone()));
                }
            }

            let rows = track_ids
                .iter()
                .enumerate()
                .map(|(position, id)| PlaylistMembership {
                    playlist_id: playlist.clone(),
                    track_id: id.clone(),
                    position,
                });
            d.memberships.retain(|m| &m.playlist_id != playlist);
            d.memberships.extend(rows);
            Ok(())
        })
    }

    fn clear_membership(&self, playlist: &PlaylistId) -> Result<(), StoreError> {
        self.mutate(|d| {
            d.memberships.retain(|m| &m.playlist_id != playlist);
            Ok(())
        })
    }

    fn get_membership(&self, playlist: &PlaylistId) -> Result<Vec<Track>, StoreError> {
        self.read(|d| {
            d.rows(playlist)
                .iter()
                .filter_map(|m| d.tracks.get(&m.track_id).cloned())
                .collect()
        })
    }

    fn membership_rows(
        &self,
        playlist: &PlaylistId,
    ) -> Result<Vec<PlaylistMembership>, StoreError> {
        self.read(|d| d.rows(playlist))
    }

    fn referenced_tracks(&self) -> Result<HashSet<TrackId>, StoreError> {
        self.read(|d| d.memberships.iter().map(|m| m.track_id.clone()).collect())
    }
}
