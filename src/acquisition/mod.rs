//! Acquisition front-ends
//!
//! Thin adapters that turn external inputs into bus streams. Each one runs as
//! a [`crate::pacing::Producer`] on its own thread and only ever pushes to its
//! outlet.
//!
//! - [`line_protocol`] - Numeric and event line parsing, [`SkipPolicy`]
//! - [`debounce`] - Event debouncing
//! - [`tcp`] - One-client TCP event listener
//! - [`serial`] - Serial line listener (port access behind the `serial` feature)
//! - [`midi`] - MIDI keyboard triggers (port access behind the `midi` feature)

pub mod debounce;
pub mod line_protocol;
pub mod midi;
pub mod serial;
pub mod tcp;

pub use debounce::Debouncer;
pub use line_protocol::{parse_event_line, parse_numeric_line, LineBuffer, SkipPolicy};
pub use midi::{
    EventDispatcher, EventKind, EventListener, MidiMessage, MidiTriggers, TriggerTracker,
};
pub use serial::SerialLineHandler;
pub use tcp::TcpEventListener;

#[cfg(feature = "midi")]
pub use midi::MidiInputProducer;
#[cfg(feature = "serial")]
pub use serial::SerialListener;
