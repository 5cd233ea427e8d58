//! TCP event listener
//!
//! Accepts one client at a time and pushes every non-empty line it sends as a
//! string event. Usable with netcat:
//!
//! ```text
//! echo start | nc localhost 8000 -q0
//! ```

use super::line_protocol::{parse_event_line, LineBuffer, SkipPolicy};
use crate::bus::{Bus, Outlet};
use crate::config::TcpEventsConfig;
use crate::error::{PlslError, Result};
use crate::pacing::{sleep_while_running, Producer};
use crate::types::{ChannelFormat, StreamInfo};
use std::io::{ErrorKind, Read};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// How often an idle listener checks for a stop request
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Turns lines from a TCP client into events on an outlet
pub struct TcpEventListener {
    name: String,
    listener: TcpListener,
    outlet: Box<dyn Outlet>,
    policy: SkipPolicy,
}

impl TcpEventListener {
    /// Bind the configured address and announce the event stream
    pub fn bind(bus: &dyn Bus, config: &TcpEventsConfig) -> Result<Self> {
        let listener = TcpListener::bind(&config.bind).map_err(|e| {
            PlslError::Config(format!("Failed to bind {}: {}", config.bind, e))
        })?;
        listener.set_nonblocking(true)?;

        let info = StreamInfo::new(
            config.name.clone(),
            config.stream_type.clone(),
            1,
            0.0,
            ChannelFormat::String,
            config.source_id(),
        );
        let outlet = bus.open_outlet(info)?;
        tracing::info!("Listening on TCP {}", listener.local_addr()?);

        Ok(Self {
            name: config.name.clone(),
            listener,
            outlet,
            policy: SkipPolicy::Skip,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    fn push_line(&self, line: &[u8]) -> Result<()> {
        if let Some(msg) = self.policy.apply(&self.name, parse_event_line(line))? {
            tracing::debug!("{}: event {:?}", self.name, msg);
            self.outlet.push_text(&[msg], None)?;
        }
        Ok(())
    }

    fn serve(&self, mut client: TcpStream, running: &AtomicBool) -> Result<()> {
        client.set_nonblocking(false)?;
        client.set_read_timeout(Some(POLL_INTERVAL))?;

        let mut lines = LineBuffer::new();
        let mut buf = [0u8; 1024];
        while running.load(Ordering::Relaxed) {
            match client.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    for line in lines.push(&buf[..n]) {
                        self.push_line(&line)?;
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::warn!("{}: client error: {}", self.name, e);
                    break;
                }
            }
        }

        // A final line without a newline still counts
        if let Some(rest) = lines.finish() {
            self.push_line(&rest)?;
        }
        Ok(())
    }
}

/// Accept failures caused by a single client or a signal, not by the socket
fn is_transient_accept_error(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionRefused
            | ErrorKind::Interrupted
            | ErrorKind::TimedOut
    )
}

impl Producer for TcpEventListener {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, running: &AtomicBool) -> Result<()> {
        while running.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((client, addr)) => {
                    tracing::info!("{}: connection from {}", self.name, addr);
                    match self.serve(client, running) {
                        Ok(()) => tracing::info!("{}: {} disconnected", self.name, addr),
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => tracing::warn!("{}: dropped {}: {}", self.name, addr, e),
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if !sleep_while_running(POLL_INTERVAL, running) {
                        break;
                    }
                }
                Err(e) if is_transient_accept_error(e.kind()) => {
                    tracing::warn!("{}: accept failed: {}", self.name, e);
                    if !sleep_while_running(POLL_INTERVAL, running) {
                        break;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::LocalBus;
    use crate::types::SampleValues;
    use std::io::Write;
    use std::sync::Arc;

    #[test]
    fn test_client_failures_do_not_stop_the_listener() {
        assert!(is_transient_accept_error(ErrorKind::ConnectionAborted));
        assert!(is_transient_accept_error(ErrorKind::ConnectionReset));
        assert!(is_transient_accept_error(ErrorKind::Interrupted));
        assert!(!is_transient_accept_error(ErrorKind::PermissionDenied));
        assert!(!is_transient_accept_error(ErrorKind::InvalidInput));
    }

    #[test]
    fn test_lines_become_events() {
        let bus = LocalBus::new();
        let config = TcpEventsConfig {
            bind: "127.0.0.1:0".to_string(),
            ..Default::default()
        };
        let mut listener = TcpEventListener::bind(&bus, &config).unwrap();
        let addr = listener.local_addr().unwrap();

        let info = bus.resolve_streams(Duration::ZERO).remove(0);
        assert_eq!(info.source_id, "tcp_listen_0");
        let mut inlet = bus.open_inlet(&info).unwrap();

        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let server = std::thread::spawn(move || listener.run(&flag));

        let mut client = TcpStream::connect(addr).unwrap();
        client.write_all(b"start\n\nsto").unwrap();
        client.write_all(b"p\nlast").unwrap();
        drop(client);

        let mut events = Vec::new();
        for _ in 0..100 {
            let chunk = inlet.pull_chunk(Duration::from_millis(20)).unwrap();
            for sample in chunk.samples {
                if let SampleValues::Text(values) = sample.values {
                    events.extend(values);
                }
            }
            if events.len() == 3 {
                break;
            }
        }

        running.store(false, Ordering::Relaxed);
        server.join().unwrap().unwrap();
        assert_eq!(events, vec!["start", "stop", "last"]);
    }
}
