//! Tag and duration extraction.

use std::path::Path;

use lofty::prelude::{Accessor, AudioFile, TaggedFileExt};
use tracing::debug;

/// Best-effort description of one audio file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_ms: u64,
}

impl TrackMetadata {
    /// What a file is described as when nothing can be read from it.
    pub fn fallback(path: &Path) -> Self {
        Self {
            title: file_stem(path),
            artist: None,
            album: None,
            duration_ms: 0,
        }
    }
}

/// Reads metadata for a file. Never fails: a file that cannot be read
/// yields [`TrackMetadata::fallback`].
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> TrackMetadata;
}

/// Extractor backed by `lofty`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyExtractor;

impl MetadataExtractor for LoftyExtractor {
    fn extract(&self, path: &Path) -> TrackMetadata {
        let mut meta = TrackMetadata::fallback(path);

        let tagged = match lofty::read_from_path(path) {
            Ok(t) => t,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no readable metadata");
                return meta;
            }
        };

        meta.duration_ms = tagged.properties().duration().as_millis() as u64;

        if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
            if let Some(v) = non_empty(tag.title().as_deref()) {
                meta.title = v;
            }
            meta.artist = non_empty(tag.artist().as_deref());
            meta.album = non_empty(tag.album().as_deref());
        }
        meta
    }
}

fn non_empty(v: Option<&str>) -> Option<String> {
    v.map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "UNKNOWN".to_string())
}
