//! The playback state machine.
//!
//! `PlaybackSession` owns the current track, the playlist snapshot it
//! navigates, the play mode and the transport. It is driven from a single
//! thread (see [`SessionHandle`](super::SessionHandle)); every mutation is
//! followed by a publish to the shared [`PlaybackHandle`].
//!
//! Each transport load is tagged with a generation number. `play_track`,
//! `stop` and losing the device all bump it, and a transport event is only
//! honoured when its generation matches the current one. A completion that
//! arrives late for a track the user already skipped away from is dropped
//! instead of advancing the playlist a second time.

use std::sync::Arc;
use std::sync::mpsc::Sender;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use crate::config::PlaybackSettings;
use crate::library::{PlaylistId, Track};

use super::navigator::{next_index, previous_index};
use super::transport::{EventSink, TaggedEvent, Transport, TransportError, TransportEvent};
use super::types::{
    PlayMode, PlaybackHandle, PlaybackSnapshot, SessionCmd, SessionMsg, SessionState,
};

pub struct PlaybackSession<T: Transport> {
    transport: T,
    transport_bound: bool,
    events_tx: Sender<SessionMsg>,
    handle: PlaybackHandle,
    rng: StdRng,

    state: SessionState,
    current_track: Option<Track>,
    playlist: Arc<Vec<Track>>,
    playlist_id: Option<PlaylistId>,
    index: Option<usize>,
    mode: PlayMode,
    position_ms: u64,
    duration_ms: u64,
    is_playing: bool,
    last_error: Option<String>,
    generation: u64,
}

impl<T: Transport> PlaybackSession<T> {
    pub(crate) fn new(
        transport: T,
        events_tx: Sender<SessionMsg>,
        handle: PlaybackHandle,
        settings: &PlaybackSettings,
    ) -> Self {
        let rng = match settings.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let session = Self {
            transport,
            transport_bound: true,
            events_tx,
            handle,
            rng,
            state: SessionState::Idle,
            current_track: None,
            playlist: Arc::new(Vec::new()),
            playlist_id: None,
            index: None,
            mode: settings.play_mode,
            position_ms: 0,
            duration_ms: 0,
            is_playing: false,
            last_error: None,
            generation: 0,
        };
        session.publish();
        session
    }

    /// Apply one command. Returns `false` once the session was asked to quit.
    pub fn apply(&mut self, cmd: SessionCmd) -> bool {
        match cmd {
            SessionCmd::PlayTrack {
                track,
                playlist,
                playlist_id,
            } => self.play_track(track, playlist, playlist_id),
            SessionCmd::PlayIndex(i) => self.play_index(i),
            SessionCmd::Pause => self.pause(),
            SessionCmd::Resume => self.resume(),
            SessionCmd::Stop => self.stop(),
            SessionCmd::Seek(ms) => self.seek(ms),
            SessionCmd::Next => self.next(),
            SessionCmd::Previous => self.previous(),
            SessionCmd::SetPlayMode(mode) => self.set_play_mode(mode),
            SessionCmd::TransportAvailable(available) => self.set_transport_available(available),
            SessionCmd::Quit => {
                self.stop();
                return false;
            }
        }
        true
    }

    /// Start playing `track`, taking `playlist` as the list to navigate from now on.
    ///
    /// The index is the track's position in `playlist`, or 0 when it is not
    /// in it. An empty `playlist` is replaced by a one-track list.
    pub fn play_track(
        &mut self,
        track: Track,
        playlist: Vec<Track>,
        playlist_id: Option<PlaylistId>,
    ) {
        let playlist = if playlist.is_empty() {
            vec![track.clone()]
        } else {
            playlist
        };
        let index = playlist.iter().position(|t| t.id == track.id).unwrap_or(0);

        self.playlist = Arc::new(playlist);
        self.playlist_id = playlist_id;
        self.index = Some(index);
        self.current_track = Some(track);
        self.load_current();
    }

    /// Play the track at `index` of the current snapshot.
    pub fn play_index(&mut self, index: usize) {
        let Some(track) = self.playlist.get(index).cloned() else {
            warn!(index, len = self.playlist.len(), "play index out of range");
            return;
        };
        self.index = Some(index);
        self.current_track = Some(track);
        self.load_current();
    }

    pub fn pause(&mut self) {
        if self.state != SessionState::Playing {
            debug!(state = ?self.state, "pause ignored");
            return;
        }
        if self.transport_bound {
            self.transport.pause();
            self.position_ms = self.transport.position_ms();
        }
        self.state = SessionState::Paused;
        self.is_playing = false;
        self.publish();
    }

    /// Resume from `Paused`, or reload the current track after an error or
    /// after the device came back.
    pub fn resume(&mut self) {
        match self.state {
            SessionState::Paused => {
                if !self.transport_bound {
                    warn!("resume ignored: transport unavailable");
                    return;
                }
                match self.transport.play() {
                    Ok(()) => {
                        self.state = SessionState::Playing;
                        self.is_playing = true;
                        self.publish();
                    }
                    Err(e) => self.fail(e),
                }
            }
            SessionState::Idle | SessionState::Error if self.current_track.is_some() => {
                self.load_current();
            }
            _ => debug!(state = ?self.state, "resume ignored"),
        }
    }

    /// Stop playback and forget the current track and playlist.
    pub fn stop(&mut self) {
        self.generation += 1;
        if self.transport_bound {
            self.transport.stop();
        }
        self.state = SessionState::Idle;
        self.current_track = None;
        self.playlist = Arc::new(Vec::new());
        self.playlist_id = None;
        self.index = None;
        self.position_ms = 0;
        self.duration_ms = 0;
        self.is_playing = false;
        self.last_error = None;
        self.publish();
    }

    /// Seek within the current track, clamped to `[0, duration]`.
    ///
    /// Some transports start playing when asked to seek while paused; the
    /// session picks that up here instead of staying in `Paused`.
    pub fn seek(&mut self, position_ms: u64) {
        if self.current_track.is_none()
            || !matches!(
                self.state,
                SessionState::Playing | SessionState::Paused | SessionState::Loading
            )
        {
            debug!(state = ?self.state, "seek ignored");
            return;
        }
        if !self.transport_bound {
            warn!("seek ignored: transport unavailable");
            return;
        }

        let duration = match self.transport.duration_ms() {
            0 => self.duration_ms,
            d => d,
        };
        let target = if duration > 0 {
            position_ms.min(duration)
        } else {
            position_ms
        };

        if let Err(e) = self.transport.seek(target) {
            warn!(error = %e, target, "seek failed");
            return;
        }
        self.position_ms = target;

        if self.state == SessionState::Paused && self.transport.is_playing() {
            debug!("transport resumed on seek");
            self.state = SessionState::Playing;
            self.is_playing = true;
        }
        self.publish();
    }

    pub fn next(&mut self) {
        let Some(current) = self.index else {
            debug!("next ignored: nothing loaded");
            return;
        };
        match next_index(self.playlist.len(), current, self.mode, &mut self.rng) {
            Some(i) => self.play_index(i),
            None => {
                info!("reached end of playlist");
                self.stop();
            }
        }
    }

    pub fn previous(&mut self) {
        let Some(current) = self.index else {
            debug!("previous ignored: nothing loaded");
            return;
        };
        match previous_index(self.playlist.len(), current, self.mode, &mut self.rng) {
            Some(i) => self.play_index(i),
            None => self.stop(),
        }
    }

    /// Takes effect on the next navigation decision; playback is not interrupted.
    pub fn set_play_mode(&mut self, mode: PlayMode) {
        self.mode = mode;
        self.publish();
    }

    /// Record that the output device was connected or lost.
    ///
    /// Losing it abandons the current load (its events become stale) but
    /// keeps the track, so `resume` can reload it later. Position and
    /// duration keep their last published values.
    pub fn set_transport_available(&mut self, available: bool) {
        if available == self.transport_bound {
            return;
        }
        self.transport_bound = available;
        if available {
            info!("transport available");
        } else {
            warn!("transport lost");
            self.generation += 1;
            self.is_playing = false;
            if matches!(
                self.state,
                SessionState::Playing | SessionState::Paused | SessionState::Loading
            ) {
                self.state = SessionState::Idle;
            }
        }
        self.publish();
    }

    /// Apply an event reported by the transport.
    pub fn handle_event(&mut self, tagged: TaggedEvent) {
        if tagged.generation != self.generation {
            debug!(
                event_generation = tagged.generation,
                current_generation = self.generation,
                event = ?tagged.event,
                "discarding stale transport event"
            );
            return;
        }

        match tagged.event {
            TransportEvent::Prepared => {
                if self.state != SessionState::Loading {
                    return;
                }
                self.state = SessionState::Playing;
                self.is_playing = true;
                if self.transport_bound {
                    let d = self.transport.duration_ms();
                    if d > 0 {
                        self.duration_ms = d;
                    }
                }
                self.publish();
            }
            TransportEvent::Completed => {
                if matches!(
                    self.state,
                    SessionState::Playing | SessionState::Paused | SessionState::Loading
                ) {
                    debug!(generation = self.generation, "track completed");
                    self.next();
                }
            }
            TransportEvent::Error(code) => {
                warn!(generation = self.generation, %code, "transport reported a playback error");
                if self.transport_bound {
                    self.transport.stop();
                }
                self.state = SessionState::Error;
                self.is_playing = false;
                self.last_error = Some(code);
                self.publish();
            }
        }
    }

    /// Refresh position and duration from the transport. Only does anything
    /// while playing with a bound transport.
    pub fn poll(&mut self) {
        if !self.is_polling() {
            return;
        }
        self.position_ms = self.transport.position_ms();
        let d = self.transport.duration_ms();
        if d > 0 {
            self.duration_ms = d;
        }
        let (position_ms, duration_ms) = (self.position_ms, self.duration_ms);
        self.handle.update(|s| {
            s.position_ms = position_ms;
            s.duration_ms = duration_ms;
        });
    }

    /// Whether the position poll is active.
    pub fn is_polling(&self) -> bool {
        self.state == SessionState::Playing && self.transport_bound
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            state: self.state,
            current_track: self.current_track.clone(),
            current_index: self.index,
            playlist: Arc::clone(&self.playlist),
            playlist_id: self.playlist_id.clone(),
            play_mode: self.mode,
            position_ms: self.position_ms,
            duration_ms: self.duration_ms,
            is_playing: self.is_playing,
            transport_bound: self.transport_bound,
            last_error: self.last_error.clone(),
            generation: self.generation,
        }
    }

    /// Hand the current track to the transport under a fresh generation.
    fn load_current(&mut self) {
        let Some(track) = self.current_track.clone() else {
            return;
        };

        self.generation += 1;
        self.position_ms = 0;
        self.duration_ms = track.duration_ms;
        self.is_playing = false;
        self.last_error = None;

        if !self.transport_bound {
            warn!(track = %track.id, "transport unavailable; track selected but not loaded");
            self.state = SessionState::Idle;
            self.publish();
            return;
        }

        info!(
            track = %track.id,
            title = %track.title,
            generation = self.generation,
            "loading track"
        );
        let events = EventSink::new(self.generation, self.events_tx.clone());
        let started = self
            .transport
            .load(&track, events)
            .and_then(|()| self.transport.play());
        match started {
            Ok(()) => {
                self.state = SessionState::Loading;
                self.publish();
            }
            Err(e) => self.fail(e),
        }
    }

    /// Enter `Error` for the current track without advancing.
    fn fail(&mut self, error: TransportError) {
        warn!(error = %error, generation = self.generation, "playback attempt failed");
        self.transport.stop();
        self.state = SessionState::Error;
        self.is_playing = false;
        self.last_error = Some(error.to_string());
        self.publish();
    }

    fn publish(&self) {
        self.handle.publish(self.snapshot());
    }
}
