use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::LibrarySettings;

use super::metadata::{LoftyExtractor, MetadataExtractor};
use super::model::Track;

/// A regular file found while walking a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// The filesystem calls the scanner needs.
pub trait FileSystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// Absolute, normalized form of `path`.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        Ok(path.to_path_buf())
    }

    fn stat(&self, path: &Path) -> io::Result<FileEntry>;

    /// Every regular file under `root`, in a stable order. Unreadable entries
    /// come through as errors and do not end the walk.
    fn walk<'a>(&'a self, root: &Path) -> Box<dyn Iterator<Item = io::Result<FileEntry>> + 'a>;
}

/// The real filesystem, walked with `walkdir`.
#[derive(Debug, Clone)]
pub struct LocalFs {
    follow_links: bool,
    include_hidden: bool,
    max_depth: Option<usize>,
}

impl LocalFs {
    pub fn new(settings: &LibrarySettings) -> Self {
        Self {
            follow_links: settings.follow_links,
            include_hidden: settings.include_hidden,
            max_depth: settings.max_depth,
        }
    }
}

impl FileSystem for LocalFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        std::fs::canonicalize(path)
    }

    fn stat(&self, path: &Path) -> io::Result<FileEntry> {
        let md = std::fs::metadata(path)?;
        Ok(FileEntry {
            path: path.to_path_buf(),
            size_bytes: md.len(),
        })
    }

    fn walk<'a>(&'a self, root: &Path) -> Box<dyn Iterator<Item = io::Result<FileEntry>> + 'a> {
        let mut walker = WalkDir::new(root)
            .follow_links(self.follow_links)
            .sort_by_file_name();
        if let Some(d) = self.max_depth {
            walker = walker.max_depth(d);
        }

        let include_hidden = self.include_hidden;
        let entries = walker
            .into_iter()
            .filter_entry(move |e| include_hidden || e.depth() == 0 || !is_hidden(e.path()))
            .filter_map(|entry| match entry {
                Ok(e) if !e.file_type().is_file() => None,
                Ok(e) => Some(
                    e.metadata()
                        .map(|md| FileEntry {
                            path: e.into_path(),
                            size_bytes: md.len(),
                        })
                        .map_err(io::Error::from),
                ),
                // Symlink loops and unreadable directories end up here.
                Err(e) => Some(Err(io::Error::from(e))),
            });
        Box::new(entries)
    }
}

/// Result of scanning one folder.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Audio files found, in walk order.
    pub tracks: Vec<Track>,
    /// Entries that could not be read.
    pub skipped: usize,
}

/// Walks a folder and turns audio files into [`Track`]s.
pub struct LibraryScanner {
    fs: Box<dyn FileSystem>,
    extractor: Box<dyn MetadataExtractor>,
    extensions: Vec<String>,
}

impl LibraryScanner {
    pub fn new(
        fs: Box<dyn FileSystem>,
        extractor: Box<dyn MetadataExtractor>,
        settings: &LibrarySettings,
    ) -> Self {
        let extensions = settings
            .extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self {
            fs,
            extractor,
            extensions,
        }
    }

    /// Scanner over the local filesystem with `lofty` metadata.
    pub fn local(settings: &LibrarySettings) -> Self {
        Self::new(
            Box::new(LocalFs::new(settings)),
            Box::new(LoftyExtractor),
            settings,
        )
    }

    pub fn is_audio_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions.iter().any(|e| *e == ext)
            })
            .unwrap_or(false)
    }

    /// Canonical form of a folder path, or the path unchanged when it
    /// cannot be resolved.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.fs
            .canonicalize(path)
            .unwrap_or_else(|_| path.to_path_buf())
    }

    pub fn exists(&self, path: &Path) -> bool {
        self.fs.exists(path)
    }

    /// Scan `root` recursively.
    ///
    /// A missing root or one that is not a directory gives an empty report;
    /// so does a folder without audio files.
    pub fn scan(&self, root: &Path) -> ScanReport {
        if !self.fs.exists(root) {
            warn!(path = %root.display(), "folder does not exist");
            return ScanReport::default();
        }
        if !self.fs.is_dir(root) {
            warn!(path = %root.display(), "not a directory");
            return ScanReport::default();
        }
        let root = self.resolve(root);

        let now = Utc::now();
        let mut report = ScanReport::default();
        for entry in self.fs.walk(&root) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!(error = %e, "skipping unreadable entry");
                    report.skipped += 1;
                    continue;
                }
            };
            if !self.is_audio_file(&entry.path) {
                continue;
            }
            let meta = self.extractor.extract(&entry.path);
            report
                .tracks
                .push(Track::from_file(&entry.path, entry.size_bytes, meta, now));
        }

        if report.skipped > 0 {
            warn!(
                path = %root.display(),
                skipped = report.skipped,
                "some entries could not be read"
            );
        }
        info!(path = %root.display(), tracks = report.tracks.len(), "scan finished");
        report
    }

    /// Describe a single audio file. `None` for missing, non-audio or
    /// unreadable paths.
    pub fn scan_file(&self, path: &Path) -> Option<Track> {
        if !self.fs.exists(path) || self.fs.is_dir(path) || !self.is_audio_file(path) {
            return None;
        }
        let path = self.resolve(path);
        let entry = match self.fs.stat(&path) {
            Ok(e) => e,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read file");
                return None;
            }
        };
        let meta = self.extractor.extract(&entry.path);
        Some(Track::from_file(&entry.path, entry.size_bytes, meta, Utc::now()))
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}
