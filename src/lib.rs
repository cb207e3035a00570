//! Folder-backed music library and playback engine.
//!
//! Folders are scanned into [`library::Track`]s and published as ordered
//! [`library::Playlist`]s by the [`import::ImportCoordinator`]. The
//! [`playback::PlaybackSession`] plays a playlist snapshot through a
//! [`playback::Transport`], following the selected [`playback::PlayMode`].

pub mod config;
pub mod import;
pub mod library;
pub mod logging;
pub mod playback;
pub mod store;
