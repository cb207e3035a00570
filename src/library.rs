//! Catalog types and folder scanning.

mod metadata;
mod model;
mod scan;

pub use metadata::{LoftyExtractor, MetadataExtractor, TrackMetadata};
pub use model::{Playlist, PlaylistId, PlaylistMembership, Track, TrackId};
pub use scan::{FileEntry, FileSystem, LibraryScanner, LocalFs, ScanReport};

#[cfg(test)]
mod tests;
