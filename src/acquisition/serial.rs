//! Serial line listener
//!
//! Reads newline-terminated frames from a serial port. In numeric mode each
//! line is one int16 sample of a fixed number of channels; in events mode
//! each line is a debounced string event.
//!
//! Port access needs the `serial` feature; the line handling is always
//! available.

use super::debounce::Debouncer;
use super::line_protocol::{parse_event_line, parse_numeric_line, SkipPolicy};
use crate::bus::{Bus, Outlet};
use crate::config::{SerialMode, SerialProducerConfig};
use crate::error::Result;
use crate::types::{ChannelFormat, StreamInfo};

/// Stream description for a serial port in the given mode
pub fn serial_stream_info(config: &SerialProducerConfig) -> StreamInfo {
    match config.mode {
        SerialMode::Numeric => StreamInfo::new(
            "SerialIntStream",
            "SerialInt",
            config.channels,
            config.rate_hz,
            ChannelFormat::Int16,
            "serial_int",
        ),
        SerialMode::Events => StreamInfo::new(
            "SerialStrStream",
            "SerialStr",
            1,
            0.0,
            ChannelFormat::String,
            "serial_str",
        ),
    }
}

/// Turns serial lines into samples or events on an outlet
pub struct SerialLineHandler {
    mode: SerialMode,
    channels: usize,
    outlet: Box<dyn Outlet>,
    debouncer: Debouncer,
    policy: SkipPolicy,
    source: String,
}

impl SerialLineHandler {
    pub fn new(bus: &dyn Bus, config: &SerialProducerConfig) -> Result<Self> {
        config.validate()?;
        let outlet = bus.open_outlet(serial_stream_info(config))?;
        Ok(Self {
            mode: config.mode,
            channels: config.channels,
            outlet,
            debouncer: Debouncer::new(config.debounce_ms as f64 / 1000.0),
            policy: SkipPolicy::Skip,
            source: config.port.clone(),
        })
    }

    /// Handle one line; returns whether something was pushed
    pub fn handle_line(&mut self, line: &[u8]) -> Result<bool> {
        match self.mode {
            SerialMode::Numeric => {
                let parsed = parse_numeric_line(line, self.channels);
                match self.policy.apply(&self.source, parsed)? {
                    Some(values) => {
                        self.outlet.push_sample(&values, None)?;
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }
            SerialMode::Events => {
                let Some(msg) = self.policy.apply(&self.source, parse_event_line(line))? else {
                    return Ok(false);
                };
                if !self.debouncer.accept(self.outlet.clock()) {
                    tracing::trace!("{}: debounced {:?}", self.source, msg);
                    return Ok(false);
                }
                tracing::debug!("{}: event {:?}", self.source, msg);
                self.outlet.push_text(&[msg], None)?;
                Ok(true)
            }
        }
    }
}

#[cfg(feature = "serial")]
pub use port::SerialListener;

#[cfg(feature = "serial")]
mod port {
    use super::SerialLineHandler;
    use crate::bus::Bus;
    use crate::config::SerialProducerConfig;
    use crate::error::{PlslError, Result};
    use crate::pacing::Producer;
    use std::io::{BufRead, BufReader, ErrorKind};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Read timeout, bounding how long a stop request can go unnoticed
    const READ_TIMEOUT: Duration = Duration::from_millis(100);

    /// Serial port front-end
    pub struct SerialListener {
        config: SerialProducerConfig,
        handler: SerialLineHandler,
    }

    impl SerialListener {
        pub fn new(bus: &dyn Bus, config: SerialProducerConfig) -> Result<Self> {
            let handler = SerialLineHandler::new(bus, &config)?;
            Ok(Self { config, handler })
        }
    }

    impl Producer for SerialListener {
        fn name(&self) -> &str {
            &self.config.port
        }

        fn run(&mut self, running: &AtomicBool) -> Result<()> {
            let port = serialport::new(&self.config.port, self.config.baud)
                .timeout(READ_TIMEOUT)
                .open()
                .map_err(|e| {
                    PlslError::Config(format!("Failed to open {}: {}", self.config.port, e))
                })?;
            tracing::info!(
                "Listening on {} at {} baud",
                self.config.port,
                self.config.baud
            );

            let mut reader = BufReader::new(port);
            let mut line = Vec::new();
            while running.load(Ordering::Relaxed) {
                match reader.read_until(b'\n', &mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        self.handler.handle_line(&line)?;
                        line.clear();
                    }
                    // Partial data stays in `line` until the newline arrives
                    Err(e) if e.kind() == ErrorKind::TimedOut => {}
                    Err(e) => return Err(e.into()),
                }
            }
            Ok(())
        }
    }
}
