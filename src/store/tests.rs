use std::path::Path;

use chrono::{Duration, TimeZone, Utc};
use tempfile::tempdir;

use super::*;
use crate::library::TrackMetadata;

fn track(path: &str) -> Track {
    let p = Path::new(path);
    Track::from_file(p, 1, TrackMetadata::fallback(p), Utc::now())
}

fn ids(tracks: &[Track]) -> Vec<TrackId> {
    tracks.iter().map(|t| t.id.clone()).collect()
}

fn seeded() -> (MemoryStore, Playlist, Vec<Track>) {
    let store = MemoryStore::in_memory();
    let tracks = vec![track("/m/a.mp3"), track("/m/b.mp3"), track("/m/sub/c.mp3")];
    store.upsert_tracks(&tracks).unwrap();
    let playlist = Playlist::manual("mix", Utc::now());
    store.upsert_playlist(&playlist).unwrap();
    (store, playlist, tracks)
}

fn positions(store: &MemoryStore, playlist: &PlaylistId) -> Vec<usize> {
    store
        .membership_rows(playlist)
        .unwrap()
        .iter()
        .map(|m| m.position)
        .collect()
}

#[test]
fn upsert_replaces_by_id() {
    let store = MemoryStore::in_memory();
    let mut t = track("/m/a.mp3");
    store.upsert_track(&t).unwrap();
    t.title = "Renamed".into();
    store.upsert_track(&t).unwrap();

    let all = store.list_tracks().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].title, "Renamed");
    assert_eq!(store.get_track(&t.id).unwrap().unwrap().title, "Renamed");
}

#[test]
fn set_membership_replaces_with_dense_positions() {
    let (store, pl, tracks) = seeded();
    store.set_membership(&pl.id, &ids(&tracks)).unwrap();
    assert_eq!(positions(&store, &pl.id), vec![0, 1, 2]);

    let reversed: Vec<_> = ids(&tracks).into_iter().rev().collect();
    store.set_membership(&pl.id, &reversed[..2]).unwrap();
    assert_eq!(ids(&store.get_membership(&pl.id).unwrap()), reversed[..2].to_vec());
    assert_eq!(positions(&store, &pl.id), vec![0, 1]);
}

#[test]
fn set_membership_rejects_bad_input_and_keeps_previous_rows() {
    let (store, pl, tracks) = seeded();
    store.set_membership(&pl.id, &ids(&tracks)).unwrap();

    let unknown = TrackId::for_path(Path::new("/nowhere.mp3"));
    let err = store
        .set_membership(&pl.id, &[tracks[0].id.clone(), unknown])
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownTrack(_)));

    let dup = [tracks[1].id.clone(), tracks[1].id.clone()];
    let err = store.set_membership(&pl.id, &dup).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateMembership(_)));

    let err = store
        .set_membership(&PlaylistId::generate(), &ids(&tracks))
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownPlaylist(_)));

    assert_eq!(ids(&store.get_membership(&pl.id).unwrap()), ids(&tracks));
}

#[test]
fn delete_playlist_cascades_membership_but_keeps_tracks() {
    let (store, pl, tracks) = seeded();
    store.set_membership(&pl.id, &ids(&tracks)).unwrap();

    assert!(store.delete_playlist(&pl.id).unwrap());
    assert!(!store.delete_playlist(&pl.id).unwrap());
    assert!(store.get_playlist(&pl.id).unwrap().is_none());
    assert!(store.membership_rows(&pl.id).unwrap().is_empty());
    assert!(store.referenced_tracks().unwrap().is_empty());
    assert_eq!(store.list_tracks().unwrap().len(), 3);
}

#[test]
fn deleting_tracks_closes_position_gaps() {
    let (store, pl, tracks) = seeded();
    store.set_membership(&pl.id, &ids(&tracks)).unwrap();

    assert_eq!(store.delete_tracks(&[tracks[1].id.clone()]).unwrap(), 1);
    assert_eq!(
        ids(&store.get_membership(&pl.id).unwrap()),
        vec![tracks[0].id.clone(), tracks[2].id.clone()]
    );
    assert_eq!(positions(&store, &pl.id), vec![0, 1]);
}

#[test]
fn delete_tracks_by_folder_includes_subfolders_only() {
    let (store, _, _) = seeded();
    store.upsert_track(&track("/other/x.mp3")).unwrap();

    assert_eq!(store.delete_tracks_by_folder(Path::new("/m/sub")).unwrap(), 1);
    assert_eq!(store.delete_tracks_by_folder(Path::new("/m")).unwrap(), 2);
    let left = store.list_tracks().unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].path, Path::new("/other/x.mp3"));
}

#[test]
fn playlists_are_listed_most_recently_updated_first() {
    let store = MemoryStore::in_memory();
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let old = Playlist::manual("old", t0);
    let mut new = Playlist::manual("new", t0);
    new.updated_at = t0 + Duration::hours(1);
    store.upsert_playlist(&old).unwrap();
    store.upsert_playlist(&new).unwrap();

    let names: Vec<_> = store
        .list_playlists()
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["new", "old"]);
}

#[test]
fn file_backed_store_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested/library.json");

    let pl_id = {
        let store = MemoryStore::open(&path).unwrap();
        assert!(store.list_tracks().unwrap().is_empty());
        let t = track("/m/a.mp3");
        store.upsert_track(&t).unwrap();
        let pl = Playlist::for_folder("m", "/m".into(), Utc::now());
        store.upsert_playlist(&pl).unwrap();
        store.set_membership(&pl.id, &[t.id.clone()]).unwrap();
        pl.id
    };

    assert!(path.exists());
    assert!(!path.with_extension("json.tmp").exists());

    let store = MemoryStore::open(&path).unwrap();
    assert_eq!(store.path(), Some(path.as_path()));
    let pl = store.get_playlist(&pl_id).unwrap().unwrap();
    assert_eq!(pl.source_folder.as_deref(), Some(Path::new("/m")));
    assert_eq!(store.get_membership(&pl_id).unwrap().len(), 1);
}

#[test]
fn malformed_library_file_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("library.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(
        MemoryStore::open(&path).unwrap_err(),
        StoreError::Serialize(_)
    ));
}
