//! [`Transport`] backed by `rodio`.
//!
//! One `Sink` per loaded track. A small watcher thread polls the sink and
//! reports completion once it runs dry; the watcher is cancelled whenever
//! the track is replaced or stopped.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use tracing::debug;

use crate::library::Track;

use super::transport::{EventSink, Transport, TransportError};

const WATCH_INTERVAL: Duration = Duration::from_millis(100);

struct Loaded {
    sink: Arc<Sink>,
    cancel: Arc<AtomicBool>,
    duration_ms: u64,
}

pub struct RodioTransport {
    stream: OutputStream,
    loaded: Option<Loaded>,
}

impl RodioTransport {
    /// Open the default output device.
    pub fn open_default() -> Result<Self, TransportError> {
        let mut stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| TransportError::Device(e.to_string()))?;
        // rodio prints to stderr when the stream is dropped.
        stream.log_on_drop(false);
        Ok(Self {
            stream,
            loaded: None,
        })
    }

    fn release(&mut self) {
        if let Some(loaded) = self.loaded.take() {
            loaded.cancel.store(true, Ordering::SeqCst);
            loaded.sink.stop();
        }
    }
}

impl Transport for RodioTransport {
    fn load(&mut self, track: &Track, events: EventSink) -> Result<(), TransportError> {
        self.release();

        let load_err = |reason: String| TransportError::Load {
            path: track.path.clone(),
            reason,
        };
        let file = File::open(&track.path).map_err(|e| load_err(e.to_string()))?;
        let source = Decoder::new(BufReader::new(file)).map_err(|e| load_err(e.to_string()))?;
        let duration_ms = source
            .total_duration()
            .map(|d| d.as_millis() as u64)
            .unwrap_or(track.duration_ms);

        let sink = Arc::new(Sink::connect_new(self.stream.mixer()));
        sink.pause();
        sink.append(source);

        let cancel = Arc::new(AtomicBool::new(false));
        spawn_watcher(Arc::clone(&sink), Arc::clone(&cancel), events.clone())
            .map_err(|e| TransportError::Device(e.to_string()))?;

        self.loaded = Some(Loaded {
            sink,
            cancel,
            duration_ms,
        });
        events.prepared();
        Ok(())
    }

    fn play(&mut self) -> Result<(), TransportError> {
        let loaded = self
            .loaded
            .as_ref()
            .ok_or_else(|| TransportError::Device("nothing loaded".to_string()))?;
        loaded.sink.play();
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(loaded) = &self.loaded {
            loaded.sink.pause();
        }
    }

    fn seek(&mut self, position_ms: u64) -> Result<(), TransportError> {
        let loaded = self
            .loaded
            .as_ref()
            .ok_or_else(|| TransportError::Seek("nothing loaded".to_string()))?;
        loaded
            .sink
            .try_seek(Duration::from_millis(position_ms))
            .map_err(|e| TransportError::Seek(e.to_string()))
    }

    fn stop(&mut self) {
        self.release();
    }

    fn position_ms(&self) -> u64 {
        self.loaded
            .as_ref()
            .map_or(0, |l| l.sink.get_pos().as_millis() as u64)
    }

    fn duration_ms(&self) -> u64 {
        self.loaded.as_ref().map_or(0, |l| l.duration_ms)
    }

    fn is_playing(&self) -> bool {
        self.loaded
            .as_ref()
            .is_some_and(|l| !l.sink.is_paused() && !l.sink.empty())
    }
}

impl Drop for RodioTransport {
    fn drop(&mut self) {
        self.release();
    }
}

fn spawn_watcher(
    sink: Arc<Sink>,
    cancel: Arc<AtomicBool>,
    events: EventSink,
) -> std::io::Result<()> {
    thread::Builder::new()
        .name(format!("segue-watch-{}", events.generation()))
        .spawn(move || {
            loop {
                thread::sleep(WATCH_INTERVAL);
                if cancel.load(Ordering::SeqCst) {
                    return;
                }
                if sink.empty() {
                    debug!(generation = events.generation(), "sink drained");
                    events.completed();
                    return;
                }
            }
        })?;
    Ok(())
}
