//! MIDI keyboard triggers
//!
//! A keyboard acts as a trigger pad: the first note after arming emits
//! `start`, the lowest and highest keys of an 88-key piano emit
//! `lowest_key` and `highest_key` and can re-arm the start trigger.
//!
//! # Main Types
//!
//! - [`MidiMessage`] - Note on/off decoded from raw MIDI bytes
//! - [`EventKind`] - Trigger events a keyboard can raise
//! - [`TriggerTracker`] - Armed/started state machine mapping notes to events
//! - [`EventDispatcher`] - Registry of [`EventListener`]s notified per event
//! - [`MidiTriggers`] - Tracker plus dispatcher, fed with raw messages
//!
//! Hardware input through `midir` needs the `midi` feature.

use crate::bus::{Bus, Outlet};
use crate::config::MidiProducerConfig;
use crate::error::Result;
use crate::types::{ChannelFormat, StreamInfo};

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;

/// A decoded channel voice message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8, velocity: u8 },
}

impl MidiMessage {
    /// Decode note messages; anything else yields `None`.
    ///
    /// A note-on with zero velocity is a note-off.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let &[status, note, velocity, ..] = bytes else {
            return None;
        };
        let channel = status & 0x0F;
        match status & 0xF0 {
            NOTE_ON if velocity > 0 => Some(MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            }),
            NOTE_ON | NOTE_OFF => Some(MidiMessage::NoteOff {
                channel,
                note,
                velocity,
            }),
            _ => None,
        }
    }
}

/// Events raised by the keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Start,
    LowestKey,
    HighestKey,
}

impl EventKind {
    /// Text pushed to the event stream
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Start => "start",
            EventKind::LowestKey => "lowest_key",
            EventKind::HighestKey => "highest_key",
        }
    }
}

/// Maps note-on messages to trigger events
#[derive(Debug, Clone)]
pub struct TriggerTracker {
    lowest_note: u8,
    highest_note: u8,
    reset_on_lowest_key: bool,
    reset_on_highest_key: bool,
    started: bool,
}

impl TriggerTracker {
    pub fn new(config: &MidiProducerConfig) -> Self {
        Self {
            lowest_note: config.lowest_note,
            highest_note: config.highest_note,
            reset_on_lowest_key: config.reset_on_lowest_key,
            reset_on_highest_key: config.reset_on_highest_key,
            started: false,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Events raised by pressing `note`, in emission order
    pub fn note_on(&mut self, note: u8) -> Vec<EventKind> {
        let mut events = Vec::new();
        if !self.started {
            self.started = true;
            events.push(EventKind::Start);
        }

        if note == self.lowest_note {
            if self.reset_on_lowest_key {
                self.started = false;
            }
            events.push(EventKind::LowestKey);
        }
        if note == self.highest_note {
            if self.reset_on_highest_key {
                self.started = false;
            }
            events.push(EventKind::HighestKey);
        }
        events
    }
}

/// Receives trigger events
#[cfg_attr(test, mockall::automock)]
pub trait EventListener: Send {
    fn on_event(&mut self, kind: EventKind);
}

/// Registry of listeners, notified in registration order
#[derive(Default)]
pub struct EventDispatcher {
    listeners: Vec<Box<dyn EventListener>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: Box<dyn EventListener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn dispatch(&mut self, kind: EventKind) {
        for listener in &mut self.listeners {
            listener.on_event(kind);
        }
    }
}

/// Pushes each event's text to a string outlet
pub struct OutletListener {
    outlet: Box<dyn Outlet>,
}

impl OutletListener {
    pub fn new(outlet: Box<dyn Outlet>) -> Self {
        Self { outlet }
    }
}

impl EventListener for OutletListener {
    fn on_event(&mut self, kind: EventKind) {
        tracing::info!("Sending event {:?}", kind.as_str());
        if let Err(e) = self.outlet.push_text(&[kind.as_str().to_string()], None) {
            tracing::warn!("Failed to push {}: {}", kind.as_str(), e);
        }
    }
}

/// Trigger state plus the listeners it notifies
pub struct MidiTriggers {
    tracker: TriggerTracker,
    dispatcher: EventDispatcher,
}

impl MidiTriggers {
    pub fn new(tracker: TriggerTracker, dispatcher: EventDispatcher) -> Self {
        Self {
            tracker,
            dispatcher,
        }
    }

    /// Announce the trigger stream on `bus` with an outlet listener attached
    pub fn with_outlet(bus: &dyn Bus, config: &MidiProducerConfig) -> Result<Self> {
        let info = StreamInfo::new(
            config.name.clone(),
            config.stream_type.clone(),
            1,
            0.0,
            ChannelFormat::String,
            config.source_id.clone(),
        );
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(Box::new(OutletListener::new(bus.open_outlet(info)?)));
        Ok(Self::new(TriggerTracker::new(config), dispatcher))
    }

    pub fn tracker(&self) -> &TriggerTracker {
        &self.tracker
    }

    /// Feed one raw MIDI message
    pub fn handle_message(&mut self, bytes: &[u8]) {
        match MidiMessage::parse(bytes) {
            Some(MidiMessage::NoteOn { note, velocity, .. }) => {
                tracing::debug!("Note on {} (velocity {})", note, velocity);
                for kind in self.tracker.note_on(note) {
                    self.dispatcher.dispatch(kind);
                }
            }
            Some(MidiMessage::NoteOff { note, .. }) => tracing::trace!("Note off {}", note),
            None => {}
        }
    }
}

#[cfg(feature = "midi")]
pub use input::MidiInputProducer;

#[cfg(feature = "midi")]
mod input {
    use super::MidiTriggers;
    use crate::bus::Bus;
    use crate::config::MidiProducerConfig;
    use crate::error::{PlslError, Result};
    use crate::pacing::{sleep_while_running, Producer};
    use midir::MidiInput;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    const CLIENT_NAME: &str = "plsl-rs";

    /// MIDI input port front-end
    pub struct MidiInputProducer {
        config: MidiProducerConfig,
        triggers: Option<MidiTriggers>,
    }

    impl MidiInputProducer {
        pub fn new(bus: &dyn Bus, config: MidiProducerConfig) -> Result<Self> {
            let triggers = MidiTriggers::with_outlet(bus, &config)?;
            Ok(Self {
                config,
                triggers: Some(triggers),
            })
        }
    }

    fn midi_error(e: impl std::fmt::Display) -> PlslError {
        PlslError::Config(format!("MIDI: {}", e))
    }

    impl Producer for MidiInputProducer {
        fn name(&self) -> &str {
            &self.config.name
        }

        fn run(&mut self, running: &AtomicBool) -> Result<()> {
            let triggers = self
                .triggers
                .take()
                .ok_or_else(|| PlslError::Config("MIDI input already started".to_string()))?;

            let midi_in = MidiInput::new(CLIENT_NAME).map_err(midi_error)?;
            let ports = midi_in.ports();
            for (i, port) in ports.iter().enumerate() {
                if let Ok(name) = midi_in.port_name(port) {
                    tracing::info!("MIDI input {}: {}", i, name);
                }
            }

            let wanted = self.config.port_name.as_deref();
            let port = ports
                .iter()
                .find(|p| match (wanted, midi_in.port_name(p)) {
                    (Some(wanted), Ok(name)) => name.contains(wanted),
                    (None, _) => true,
                    (Some(_), Err(_)) => false,
                })
                .cloned()
                .ok_or_else(|| midi_error("no matching input port"))?;

            let connection = midi_in
                .connect(
                    &port,
                    CLIENT_NAME,
                    |_stamp, message, triggers: &mut MidiTriggers| {
                        triggers.handle_message(message)
                    },
                    triggers,
                )
                .map_err(midi_error)?;
            tracing::info!("Waiting for MIDI messages");

            while sleep_while_running(Duration::from_millis(100), running) {}

            let (_, triggers) = connection.close();
            self.triggers = Some(triggers);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::LocalBus;
    use crate::types::SampleValues;
    use mockall::predicate::eq;
    use std::time::Duration;

    #[test]
    fn test_parse_notes() {
        assert_eq!(
            MidiMessage::parse(&[0x91, 60, 100]),
            Some(MidiMessage::NoteOn {
                channel: 1,
                note: 60,
                velocity: 100
            })
        );
        assert!(matches!(
            MidiMessage::parse(&[0x90, 60, 0]),
            Some(MidiMessage::NoteOff { note: 60, .. })
        ));
        assert!(matches!(
            MidiMessage::parse(&[0x80, 21, 64]),
            Some(MidiMessage::NoteOff { note: 21, .. })
        ));
        // Control change and truncated messages are ignored
        assert_eq!(MidiMessage::parse(&[0xB0, 7, 100]), None);
        assert_eq!(MidiMessage::parse(&[0x90, 60]), None);
    }

    #[test]
    fn test_tracker_start_and_reset() {
        let mut tracker = TriggerTracker::new(&MidiProducerConfig::default());
        assert_eq!(tracker.note_on(60), vec![EventKind::Start]);
        assert!(tracker.note_on(61).is_empty());

        assert_eq!(tracker.note_on(21), vec![EventKind::LowestKey]);
        assert!(!tracker.is_started());
        assert_eq!(
            tracker.note_on(108),
            vec![EventKind::Start, EventKind::HighestKey]
        );
    }

    #[test]
    fn test_tracker_without_reset() {
        let config = MidiProducerConfig {
            reset_on_lowest_key: false,
            ..Default::default()
        };
        let mut tracker = TriggerTracker::new(&config);
        tracker.note_on(60);
        assert_eq!(tracker.note_on(21), vec![EventKind::LowestKey]);
        assert!(tracker.is_started());
    }

    #[test]
    fn test_dispatcher_notifies_every_listener() {
        let mut first = MockEventListener::new();
        first
            .expect_on_event()
            .with(eq(EventKind::Start))
            .times(1)
            .return_const(());
        let mut second = MockEventListener::new();
        second.expect_on_event().times(1).return_const(());

        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(Box::new(first));
        dispatcher.register(Box::new(second));
        assert_eq!(dispatcher.len(), 2);
        dispatcher.dispatch(EventKind::Start);
    }

    #[test]
    fn test_triggers_push_event_text() {
        let bus = LocalBus::new();
        let mut triggers = MidiTriggers::with_outlet(&bus, &MidiProducerConfig::default()).unwrap();
        let info = bus.resolve_streams(Duration::ZERO).remove(0);
        let mut inlet = bus.open_inlet(&info).unwrap();

        triggers.handle_message(&[0x90, 108, 90]);
        triggers.handle_message(&[0x80, 108, 0]);

        let mut texts = Vec::new();
        loop {
            let chunk = inlet.pull_chunk(Duration::ZERO).unwrap();
            if chunk.is_empty() {
                break;
            }
            for sample in chunk.samples {
                if let SampleValues::Text(v) = sample.values {
                    texts.extend(v);
                }
            }
        }
        assert_eq!(texts, vec!["start", "highest_key"]);
    }
}
