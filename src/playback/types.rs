//! Playback-related small types and handles.
//!
//! This module defines the play-mode policy, the session state machine's
//! states, the observable snapshot readers poll, and the handle type that
//! shares it.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::library::{PlaylistId, Track};

use super::transport::TaggedEvent;

/// Policy governing how "next" and "previous" resolve.
///
/// Closed on purpose: adding a mode means extending the match in
/// [`navigator`](super::navigator).
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlayMode {
    /// Play through the list once and stop after the last track.
    #[default]
    #[serde(alias = "sequence", alias = "no-loop", alias = "no_loop")]
    Sequential,
    /// Wrap around to the start of the list.
    #[serde(alias = "repeat_all", alias = "loop-all", alias = "loop_all", alias = "loopall")]
    RepeatAll,
    /// Replay the current track.
    #[serde(alias = "repeat_one", alias = "loop-one", alias = "loop_one", alias = "loopone")]
    RepeatOne,
    /// Pick a uniformly random index each time.
    Shuffle,
}

impl PlayMode {
    /// The mode after this one, for controls that cycle through modes.
    pub fn cycle(self) -> Self {
        match self {
            Self::Sequential => Self::RepeatAll,
            Self::RepeatAll => Self::RepeatOne,
            Self::RepeatOne => Self::Shuffle,
            Self::Shuffle => Self::Sequential,
        }
    }

    /// Parse the names accepted on the command line and in config files.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "sequential" | "sequence" | "no-loop" => Some(Self::Sequential),
            "repeat-all" | "loop-all" | "loopall" => Some(Self::RepeatAll),
            "repeat-one" | "loop-one" | "loopone" => Some(Self::RepeatOne),
            "shuffle" | "random" => Some(Self::Shuffle),
            _ => None,
        }
    }
}

/// Where the session is in its lifecycle.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing loaded in the transport.
    #[default]
    Idle,
    /// The transport was asked to prepare a track and has not signalled readiness.
    Loading,
    Playing,
    Paused,
    /// The last load or playback attempt failed. The session stays usable.
    Error,
}

/// Commands accepted by the playback worker.
#[derive(Debug, Clone)]
pub enum SessionCmd {
    /// Play `track`, navigating within `playlist` from then on.
    PlayTrack {
        track: Track,
        playlist: Vec<Track>,
        playlist_id: Option<PlaylistId>,
    },
    /// Play the track at `index` of the current playlist snapshot.
    PlayIndex(usize),
    Pause,
    Resume,
    Stop,
    /// Seek to an absolute position in milliseconds.
    Seek(u64),
    Next,
    Previous,
    SetPlayMode(PlayMode),
    /// The output device was connected (`true`) or lost (`false`).
    TransportAvailable(bool),
    /// Stop the transport and end the worker.
    Quit,
}

/// Everything the worker's single channel carries: commands from callers and
/// generation-tagged events from the transport.
#[derive(Debug)]
pub(crate) enum SessionMsg {
    Command(SessionCmd),
    Transport(TaggedEvent),
}

/// Observable playback state, published after every command and transport
/// event the session applies.
#[derive(Debug, Clone, Default)]
pub struct PlaybackSnapshot {
    pub state: SessionState,
    pub current_track: Option<Track>,
    pub current_index: Option<usize>,
    /// The list playback navigates, as copied at play-start.
    pub playlist: Arc<Vec<Track>>,
    pub playlist_id: Option<PlaylistId>,
    pub play_mode: PlayMode,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub is_playing: bool,
    pub transport_bound: bool,
    /// Message of the most recent load/playback failure, cleared by the next load.
    pub last_error: Option<String>,
    /// Generation of the load the snapshot describes.
    pub generation: u64,
}

/// Shared, cheaply readable view of the session's state.
#[derive(Debug, Clone, Default)]
pub struct PlaybackHandle(Arc<RwLock<PlaybackSnapshot>>);

impl PlaybackHandle {
    /// Copy out the current snapshot.
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn publish(&self, snapshot: PlaybackSnapshot) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut PlaybackSnapshot)) {
        f(&mut self.0.write().unwrap_or_else(PoisonError::into_inner));
    }
}
