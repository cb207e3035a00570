use std::io;
use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::PlaybackSettings;
use crate::library::{PlaylistId, Track};

use super::session::PlaybackSession;
use super::transport::{Transport, TransportError};
use super::types::{PlayMode, PlaybackHandle, PlaybackSnapshot, SessionCmd, SessionMsg};

/// The worker behind a [`SessionHandle`] has exited.
#[derive(Debug, Error)]
#[error("playback worker has shut down")]
pub struct SessionClosed;

/// Owner of the playback worker thread.
///
/// Commands are queued to the worker and applied in order. State is read
/// back through [`SessionHandle::snapshot`], which never blocks on the worker.
pub struct SessionHandle {
    tx: Sender<SessionMsg>,
    playback: PlaybackHandle,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl SessionHandle {
    /// Start the worker. `make_transport` runs on the worker thread, so the
    /// transport itself does not need to be `Send`.
    pub fn spawn<T, F>(make_transport: F, settings: &PlaybackSettings) -> io::Result<Self>
    where
        T: Transport + 'static,
        F: FnOnce() -> Result<T, TransportError> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<SessionMsg>();
        let playback = PlaybackHandle::default();

        let worker_tx = tx.clone();
        let worker_playback = playback.clone();
        let settings = settings.clone();
        let join = thread::Builder::new()
            .name("segue-playback".to_string())
            .spawn(move || run_worker(make_transport, rx, worker_tx, worker_playback, settings))?;

        Ok(Self {
            tx,
            playback,
            join: Mutex::new(Some(join)),
        })
    }

    pub fn send(&self, cmd: SessionCmd) -> Result<(), SessionClosed> {
        self.tx
            .send(SessionMsg::Command(cmd))
            .map_err(|_| SessionClosed)
    }

    pub fn play_track(
        &self,
        track: Track,
        playlist: Vec<Track>,
        playlist_id: Option<PlaylistId>,
    ) -> Result<(), SessionClosed> {
        self.send(SessionCmd::PlayTrack {
            track,
            playlist,
            playlist_id,
        })
    }

    pub fn pause(&self) -> Result<(), SessionClosed> {
        self.send(SessionCmd::Pause)
    }

    pub fn resume(&self) -> Result<(), SessionClosed> {
        self.send(SessionCmd::Resume)
    }

    pub fn stop(&self) -> Result<(), SessionClosed> {
        self.send(SessionCmd::Stop)
    }

    pub fn seek(&self, position_ms: u64) -> Result<(), SessionClosed> {
        self.send(SessionCmd::Seek(position_ms))
    }

    pub fn next(&self) -> Result<(), SessionClosed> {
        self.send(SessionCmd::Next)
    }

    pub fn previous(&self) -> Result<(), SessionClosed> {
        self.send(SessionCmd::Previous)
    }

    pub fn set_play_mode(&self, mode: PlayMode) -> Result<(), SessionClosed> {
        self.send(SessionCmd::SetPlayMode(mode))
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.playback.snapshot()
    }

    pub fn playback_handle(&self) -> PlaybackHandle {
        self.playback.clone()
    }

    /// Stop playback and wait for the worker to exit. Safe to call twice.
    pub fn shutdown(&self) {
        let _ = self.send(SessionCmd::Quit);

        let handle = self.join.lock().ok().and_then(|mut j| j.take());
        if let Some(h) = handle {
            if h.join().is_err() {
                error!("playback worker panicked");
            }
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker<T, F>(
    make_transport: F,
    rx: Receiver<SessionMsg>,
    tx: Sender<SessionMsg>,
    playback: PlaybackHandle,
    settings: PlaybackSettings,
) where
    T: Transport,
    F: FnOnce() -> Result<T, TransportError>,
{
    let transport = match make_transport() {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "no audio output; playback disabled");
            drop(tx);
            playback.update(|s| {
                s.transport_bound = false;
                s.play_mode = settings.play_mode;
                s.last_error = Some(e.to_string());
            });
            for msg in rx {
                match msg {
                    SessionMsg::Command(SessionCmd::Quit) => break,
                    SessionMsg::Command(cmd) => warn!(?cmd, "command ignored: no audio output"),
                    SessionMsg::Transport(_) => {}
                }
            }
            return;
        }
    };

    let mut session = PlaybackSession::new(transport, tx, playback, &settings);
    let interval = Duration::from_millis(settings.poll_interval_ms.max(1));
    let mut next_poll = Instant::now() + interval;

    loop {
        let timeout = next_poll.saturating_duration_since(Instant::now());
        match rx.recv_timeout(timeout) {
            Ok(SessionMsg::Command(cmd)) => {
                if !session.apply(cmd) {
                    break;
                }
            }
            Ok(SessionMsg::Transport(event)) => session.handle_event(event),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let now = Instant::now();
        if now >= next_poll {
            session.poll();
            next_poll = now + interval;
        }
    }
    debug!("playback worker exiting");
}
