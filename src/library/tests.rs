use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::tempdir;

use super::*;
use crate::config::LibrarySettings;

/// Extractor that never touches the file: title is the stem, uppercased.
struct StemExtractor;

impl MetadataExtractor for StemExtractor {
    fn extract(&self, path: &Path) -> TrackMetadata {
        let mut meta = TrackMetadata::fallback(path);
        meta.title = meta.title.to_uppercase();
        meta.duration_ms = 1000;
        meta
    }
}

fn scanner(settings: &LibrarySettings) -> LibraryScanner {
    LibraryScanner::new(
        Box::new(LocalFs::new(settings)),
        Box::new(StemExtractor),
        settings,
    )
}

fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"not really audio").unwrap();
}

fn file_names(report: &ScanReport) -> Vec<String> {
    report
        .tracks
        .iter()
        .map(|t| t.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn is_audio_file_matches_configured_extensions_case_insensitive() {
    let settings = LibrarySettings {
        extensions: vec![".MP3".into(), "flac".into(), " ".into()],
        ..LibrarySettings::default()
    };
    let s = scanner(&settings);
    assert!(s.is_audio_file(Path::new("/tmp/a.mp3")));
    assert!(s.is_audio_file(Path::new("/tmp/a.Mp3")));
    assert!(s.is_audio_file(Path::new("/tmp/a.FLAC")));
    assert!(!s.is_audio_file(Path::new("/tmp/a.ogg")));
    assert!(!s.is_audio_file(Path::new("/tmp/a")));
}

#[test]
fn scan_recurses_filters_and_keeps_walk_order() {
    let dir = tempdir().unwrap();
    touch(&dir.path().join("a.mp3"));
    touch(&dir.path().join("b/inner.ogg"));
    touch(&dir.path().join("b/notes.txt"));
    touch(&dir.path().join("c.flac"));
    touch(&dir.path().join("cover.jpg"));

    let report = scanner(&LibrarySettings::default()).scan(dir.path());
    assert_eq!(file_names(&report), vec!["a.mp3", "inner.ogg", "c.flac"]);
    assert_eq!(report.skipped, 0);

    let inner = &report.tracks[1];
    assert_eq!(inner.title, "INNER");
    assert_eq!(inner.duration_ms, 1000);
    assert_eq!(inner.size_bytes, b"not really audio".len() as u64);
    assert!(inner.path.is_absolute());
    assert_eq!(inner.folder, inner.path.parent().unwrap());
}

#[test]
fn scan_skips_hidden_entries_unless_asked() {
    let dir = tempdir().unwrap();
    touch(&dir.path().join(".hidden.mp3"));
    touch(&dir.path().join(".cache/x.mp3"));
    touch(&dir.path().join("shown.mp3"));

    let report = scanner(&LibrarySettings::default()).scan(dir.path());
    assert_eq!(file_names(&report), vec!["shown.mp3"]);

    let settings = LibrarySettings {
        include_hidden: true,
        ..LibrarySettings::default()
    };
    let report = scanner(&settings).scan(dir.path());
    assert_eq!(report.tracks.len(), 3);
}

#[test]
fn scan_respects_max_depth() {
    let dir = tempdir().unwrap();
    touch(&dir.path().join("top.mp3"));
    touch(&dir.path().join("one/two/deep.mp3"));

    let settings = LibrarySettings {
        max_depth: Some(1),
        ..LibrarySettings::default()
    };
    let report = scanner(&settings).scan(dir.path());
    assert_eq!(file_names(&report), vec!["top.mp3"]);
}

#[test]
fn scan_of_missing_or_non_directory_path_is_empty() {
    let dir = tempdir().unwrap();
    let s = scanner(&LibrarySettings::default());

    let report = s.scan(&dir.path().join("nope"));
    assert!(report.tracks.is_empty());
    assert_eq!(report.skipped, 0);

    let file = dir.path().join("song.mp3");
    touch(&file);
    assert!(s.scan(&file).tracks.is_empty());
}

#[test]
fn scan_of_empty_directory_is_empty() {
    let dir = tempdir().unwrap();
    let report = scanner(&LibrarySettings::default()).scan(dir.path());
    assert!(report.tracks.is_empty());
}

#[test]
fn track_ids_are_stable_across_scans_and_distinct_per_file() {
    let dir = tempdir().unwrap();
    touch(&dir.path().join("a.mp3"));
    touch(&dir.path().join("b.mp3"));
    let s = scanner(&LibrarySettings::default());

    let first = s.scan(dir.path());
    let second = s.scan(dir.path());
    let ids = |r: &ScanReport| r.tracks.iter().map(|t| t.id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&first), ids(&second));
    assert_ne!(first.tracks[0].id, first.tracks[1].id);
    assert_eq!(first.tracks[0].id, TrackId::for_path(&first.tracks[0].path));
}

#[cfg(unix)]
#[test]
fn symlink_loops_are_counted_not_followed_forever() {
    let dir = tempdir().unwrap();
    touch(&dir.path().join("sub/a.mp3"));
    std::os::unix::fs::symlink(dir.path(), dir.path().join("sub/loop")).unwrap();

    let report = scanner(&LibrarySettings::default()).scan(dir.path());
    assert_eq!(file_names(&report), vec!["a.mp3"]);
    assert!(report.skipped >= 1);
}

/// Filesystem whose walk yields one readable file and one failure.
struct FlakyFs;

impl FileSystem for FlakyFs {
    fn exists(&self, _: &Path) -> bool {
        true
    }

    fn is_dir(&self, _: &Path) -> bool {
        true
    }

    fn stat(&self, path: &Path) -> io::Result<FileEntry> {
        Ok(FileEntry {
            path: path.to_path_buf(),
            size_bytes: 1,
        })
    }

    fn walk<'a>(&'a self, root: &Path) -> Box<dyn Iterator<Item = io::Result<FileEntry>> + 'a> {
        let ok = FileEntry {
            path: root.join("fine.mp3"),
            size_bytes: 10,
        };
        Box::new(
            vec![
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied")),
                Ok(ok),
            ]
            .into_iter(),
        )
    }
}

#[test]
fn unreadable_entries_are_counted_and_do_not_abort_the_scan() {
    let settings = LibrarySettings::default();
    let s = LibraryScanner::new(Box::new(FlakyFs), Box::new(StemExtractor), &settings);
    let report = s.scan(Path::new("/music"));
    assert_eq!(report.skipped, 1);
    assert_eq!(report.tracks.len(), 1);
    assert_eq!(report.tracks[0].path, PathBuf::from("/music/fine.mp3"));
    assert_eq!(report.tracks[0].folder, PathBuf::from("/music"));
}

#[test]
fn scan_file_accepts_only_existing_audio_files() {
    let dir = tempdir().unwrap();
    let song = dir.path().join("song.opus");
    let text = dir.path().join("readme.txt");
    touch(&song);
    touch(&text);
    let s = scanner(&LibrarySettings::default());

    let track = s.scan_file(&song).unwrap();
    assert_eq!(track.title, "SONG");
    assert_eq!(track.size_bytes, b"not really audio".len() as u64);
    assert!(s.scan_file(&text).is_none());
    assert!(s.scan_file(&dir.path().join("gone.mp3")).is_none());
    assert!(s.scan_file(dir.path()).is_none());
}

#[test]
fn lofty_extractor_falls_back_to_file_stem() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("Broken Song.flac");
    touch(&path);

    let meta = LoftyExtractor.extract(&path);
    assert_eq!(meta, TrackMetadata::fallback(&path));
    assert_eq!(meta.title, "Broken Song");
    assert_eq!(meta.artist, None);
    assert_eq!(meta.duration_ms, 0);

    let missing = LoftyExtractor.extract(&dir.path().join("missing.flac"));
    assert_eq!(missing.title, "missing");
}

#[test]
fn display_name_prefers_artist_dash_title() {
    let mut track = Track::from_file(
        Path::new("/m/Song.mp3"),
        0,
        TrackMetadata::fallback(Path::new("/m/Song.mp3")),
        chrono::Utc::now(),
    );
    assert_eq!(track.display_name(), "Song");
    track.artist = Some("  Artist  ".into());
    assert_eq!(track.display_name(), "Artist - Song");
    track.artist = Some(" ".into());
    assert_eq!(track.display_name(), "Song");
}
