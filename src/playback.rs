//! Playback: the session state machine, its worker thread and the
//! transports it drives.

mod navigator;
mod player;
mod rodio_transport;
mod session;
mod transport;
mod types;

pub use navigator::{next_index, previous_index};
pub use player::{SessionClosed, SessionHandle};
pub use rodio_transport::RodioTransport;
pub use session::PlaybackSession;
pub use transport::{EventSink, TaggedEvent, Transport, TransportError, TransportEvent};
pub use types::{PlayMode, PlaybackHandle, PlaybackSnapshot, SessionCmd, SessionState};
