//! The device-side contract the session drives.
//!
//! A transport loads one track at a time and reports what happens to it
//! asynchronously. Every load is handed an [`EventSink`] stamped with the
//! session generation that issued it, so events from a load the session has
//! since abandoned can be recognised and dropped.

use std::path::PathBuf;
use std::sync::mpsc::Sender;

use thiserror::Error;

use crate::library::Track;

use super::types::SessionMsg;

/// Transport failures surfaced synchronously from a call.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No output device is connected.
    #[error("transport unavailable")]
    Unavailable,

    /// The file could not be opened or decoded.
    #[error("failed to load {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    /// The loaded source does not support seeking to the requested position.
    #[error("seek failed: {0}")]
    Seek(String),

    /// The output device itself failed.
    #[error("audio device error: {0}")]
    Device(String),
}

/// What a transport reports about the track it was asked to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The source is ready and playback has started (or will start on `play`).
    Prepared,
    /// The track played to its end.
    Completed,
    /// Playback failed after the load was accepted.
    Error(String),
}

/// A transport event together with the generation of the load it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedEvent {
    pub generation: u64,
    pub event: TransportEvent,
}

/// Handle a transport uses to report events for one particular load.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    tx: Sender<SessionMsg>,
}

impl EventSink {
    pub(crate) fn new(generation: u64, tx: Sender<SessionMsg>) -> Self {
        Self { generation, tx }
    }

    /// Generation of the load this sink was issued for.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report `event`. Safe to call from any thread; a closed session ignores it.
    pub fn emit(&self, event: TransportEvent) {
        let _ = self.tx.send(SessionMsg::Transport(TaggedEvent {
            generation: self.generation,
            event,
        }));
    }

    pub fn prepared(&self) {
        self.emit(TransportEvent::Prepared);
    }

    pub fn completed(&self) {
        self.emit(TransportEvent::Completed);
    }

    pub fn error(&self, code: impl Into<String>) {
        self.emit(TransportEvent::Error(code.into()));
    }
}

/// A player capable of loading one track and reporting on it.
///
/// Calls come from the session worker only, one at a time. Events may be
/// emitted from any thread, at any later time, through the [`EventSink`]
/// passed to [`Transport::load`].
pub trait Transport {
    /// Prepare `track`, replacing whatever was loaded. Readiness, completion
    /// and asynchronous failures are reported through `events`.
    fn load(&mut self, track: &Track, events: EventSink) -> Result<(), TransportError>;

    /// Start or resume output of the loaded track.
    fn play(&mut self) -> Result<(), TransportError>;

    fn pause(&mut self);

    /// Move to `position_ms`. Some transports start playing as a side effect.
    fn seek(&mut self, position_ms: u64) -> Result<(), TransportError>;

    /// Stop output and release the loaded source.
    fn stop(&mut self);

    fn position_ms(&self) -> u64;

    /// Length of the loaded track, or 0 when unknown.
    fn duration_ms(&self) -> u64;

    fn is_playing(&self) -> bool;
}
