//! In-process bus implementation
//!
//! `LocalBus` connects outlets and inlets living in the same process through
//! bounded crossbeam channels, one queue per inlet. When an inlet queue is
//! full the oldest queued chunk is discarded: the bus is lossy by design and
//! never applies backpressure to a producer.

use super::{chunk_timestamps, Bus, BusClock, Inlet, Outlet};
use crate::error::{PlslError, Result};
use crate::types::{Chunk, Sample, StreamInfo};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Default number of chunks an inlet can queue before dropping the oldest
pub const DEFAULT_INLET_QUEUE_CAPACITY: usize = 8192;

/// One inlet subscription as seen from the producer side
struct Subscription {
    tx: Sender<Chunk>,
    /// Clone of the inlet receiver, used to evict the oldest chunk on overflow
    evict_rx: Receiver<Chunk>,
    dropped: Arc<AtomicU64>,
}

/// Shared state of one announced stream
struct StreamSlot {
    info: StreamInfo,
    subscribers: Mutex<Vec<Subscription>>,
}

impl StreamSlot {
    fn publish(&self, chunk: Chunk) -> Result<()> {
        let mut subscribers = self
            .subscribers
            .lock()
            .map_err(|_| PlslError::Bus("subscriber list poisoned".to_string()))?;

        subscribers.retain(|sub| {
            // The inlet holds the other reference to its drop counter
            if Arc::strong_count(&sub.dropped) < 2 {
                return false;
            }
            let mut pending = chunk.clone();
            loop {
                match sub.tx.try_send(pending) {
                    Ok(()) => return true,
                    Err(TrySendError::Full(back)) => {
                        if sub.evict_rx.try_recv().is_ok() {
                            sub.dropped.fetch_add(1, Ordering::Relaxed);
                        }
                        pending = back;
                    }
                    Err(TrySendError::Disconnected(_)) => return false,
                }
            }
        });
        Ok(())
    }
}

struct Registry {
    clock: BusClock,
    hostname: String,
    queue_capacity: usize,
    next_uid: AtomicU64,
    streams: Mutex<Vec<Arc<StreamSlot>>>,
}

/// In-process streaming bus
#[derive(Clone)]
pub struct LocalBus {
    registry: Arc<Registry>,
}

impl LocalBus {
    /// Create a bus with the default inlet queue capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INLET_QUEUE_CAPACITY)
    }

    /// Create a bus whose inlets queue at most `queue_capacity` chunks
    pub fn with_capacity(queue_capacity: usize) -> Self {
        let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        Self {
            registry: Arc::new(Registry {
                clock: BusClock::new(),
                hostname,
                queue_capacity: queue_capacity.max(1),
                next_uid: AtomicU64::new(1),
                streams: Mutex::new(Vec::new()),
            }),
        }
    }

    fn streams(&self) -> Result<std::sync::MutexGuard<'_, Vec<Arc<StreamSlot>>>> {
        self.registry
            .streams
            .lock()
            .map_err(|_| PlslError::Bus("stream registry poisoned".to_string()))
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for LocalBus {
    fn open_outlet(&self, mut info: StreamInfo) -> Result<Box<dyn Outlet>> {
        if info.channel_count == 0 {
            return Err(PlslError::Config(format!(
                "stream {:?} declares zero channels",
                info.name
            )));
        }
        if !info.nominal_rate.is_finite() || info.nominal_rate < 0.0 {
            return Err(PlslError::Config(format!(
                "stream {:?} declares invalid rate {}",
                info.name, info.nominal_rate
            )));
        }

        info.uid = self.registry.next_uid.fetch_add(1, Ordering::Relaxed);
        info.hostname = self.registry.hostname.clone();

        let slot = Arc::new(StreamSlot {
            info: info.clone(),
            subscribers: Mutex::new(Vec::new()),
        });
        self.streams()?.push(slot.clone());

        tracing::debug!("Outlet opened: {} (uid {})", info.label(), info.uid);

        Ok(Box::new(LocalOutlet {
            slot,
            registry: self.registry.clone(),
        }))
    }

    fn resolve_streams(&self, wait: Duration) -> Vec<StreamInfo> {
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
        match self.streams() {
            Ok(streams) => streams.iter().map(|s| s.info.clone()).collect(),
            Err(e) => {
                tracing::warn!("Failed to resolve streams: {}", e);
                Vec::new()
            }
        }
    }

    fn open_inlet(&self, info: &StreamInfo) -> Result<Box<dyn Inlet>> {
        let slot = self
            .streams()?
            .iter()
            .find(|s| s.info.uid == info.uid)
            .cloned()
            .ok_or_else(|| PlslError::Bus(format!("stream {} is gone", info.label())))?;

        let (tx, rx) = bounded(self.registry.queue_capacity);
        let dropped = Arc::new(AtomicU64::new(0));
        slot.subscribers
            .lock()
            .map_err(|_| PlslError::Bus("subscriber list poisoned".to_string()))?
            .push(Subscription {
                tx,
                evict_rx: rx.clone(),
                dropped: dropped.clone(),
            });

        tracing::debug!("Inlet opened: {}", slot.info.label());

        Ok(Box::new(LocalInlet {
            info: slot.info.clone(),
            rx,
            dropped,
        }))
    }

    fn clock(&self) -> f64 {
        self.registry.clock.now()
    }
}

/// Outlet of a [`LocalBus`]; dropping it forgets the stream
struct LocalOutlet {
    slot: Arc<StreamSlot>,
    registry: Arc<Registry>,
}

impl LocalOutlet {
    fn check_arity(&self, actual: usize) -> Result<()> {
        let expected = self.slot.info.channel_count;
        if actual != expected {
            return Err(PlslError::Bus(format!(
                "{}: sample has {} values, stream declares {}",
                self.slot.info.name, actual, expected
            )));
        }
        Ok(())
    }
}

impl Outlet for LocalOutlet {
    fn info(&self) -> &StreamInfo {
        &self.slot.info
    }

    fn push_sample(&self, values: &[f64], timestamp: Option<f64>) -> Result<()> {
        self.check_arity(values.len())?;
        let ts = timestamp.unwrap_or_else(|| self.registry.clock.now());
        self.slot
            .publish(Chunk::new(vec![Sample::numeric(values.to_vec(), ts)]))
    }

    fn push_text(&self, values: &[String], timestamp: Option<f64>) -> Result<()> {
        self.check_arity(values.len())?;
        let ts = timestamp.unwrap_or_else(|| self.registry.clock.now());
        self.slot
            .publish(Chunk::new(vec![Sample::text(values.to_vec(), ts)]))
    }

    fn push_chunk(&self, frames: &[Vec<f64>], timestamp: f64) -> Result<()> {
        if frames.is_empty() {
            return Ok(());
        }
        for frame in frames {
            self.check_arity(frame.len())?;
        }
        let stamps = chunk_timestamps(frames.len(), timestamp, self.slot.info.nominal_rate);
        let samples = frames
            .iter()
            .zip(stamps)
            .map(|(frame, ts)| Sample::numeric(frame.clone(), ts))
            .collect();
        self.slot.publish(Chunk::new(samples))
    }

    fn have_consumers(&self) -> bool {
        self.slot
            .subscribers
            .lock()
            .map(|subs| subs.iter().any(|sub| Arc::strong_count(&sub.dropped) > 1))
            .unwrap_or(false)
    }

    fn clock(&self) -> f64 {
        self.registry.clock.now()
    }
}

impl Drop for LocalOutlet {
    fn drop(&mut self) {
        if let Ok(mut streams) = self.registry.streams.lock() {
            streams.retain(|s| s.info.uid != self.slot.info.uid);
        }
        // Disconnect inlets so they observe the stream closing
        if let Ok(mut subs) = self.slot.subscribers.lock() {
            subs.clear();
        }
        tracing::debug!("Outlet closed: {}", self.slot.info.label());
    }
}

/// Inlet of a [`LocalBus`]
struct LocalInlet {
    info: StreamInfo,
    rx: Receiver<Chunk>,
    dropped: Arc<AtomicU64>,
}

impl Inlet for LocalInlet {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn pull_chunk(&mut self, timeout: Duration) -> Result<Chunk> {
        let received = if timeout.is_zero() {
            self.rx.try_recv().map_err(|e| match e {
                crossbeam_channel::TryRecvError::Empty => RecvTimeoutError::Timeout,
                crossbeam_channel::TryRecvError::Disconnected => RecvTimeoutError::Disconnected,
            })
        } else {
            self.rx.recv_timeout(timeout)
        };

        match received {
            Ok(chunk) => Ok(chunk),
            Err(RecvTimeoutError::Timeout) => Ok(Chunk::empty()),
            Err(RecvTimeoutError::Disconnected) => {
                Err(PlslError::Bus(format!("stream {} closed", self.info.label())))
            }
        }
    }

    fn dropped_chunks(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChannelFormat, SampleValues};

    fn eeg_info() -> StreamInfo {
        StreamInfo::new("EEG", "EEG", 2, 100.0, ChannelFormat::Float32, "eeg-1")
    }

    #[test]
    fn test_outlet_to_inlet() {
        let bus = LocalBus::new();
        let outlet = bus.open_outlet(eeg_info()).unwrap();
        let streams = bus.resolve_streams(Duration::ZERO);
        assert_eq!(streams.len(), 1);
        assert_ne!(streams[0].uid, 0);

        let mut inlet = bus.open_inlet(&streams[0]).unwrap();
        assert!(outlet.have_consumers());

        outlet.push_sample(&[1.0, 2.0], Some(3.0)).unwrap();
        let chunk = inlet.pull_chunk(Duration::ZERO).unwrap();
        assert_eq!(chunk.len(), 1);
        assert_eq!(chunk.samples[0].values, SampleValues::Numeric(vec![1.0, 2.0]));
        assert_eq!(chunk.samples[0].timestamp, 3.0);

        // Nothing left: zero-wait poll returns an empty chunk immediately
        assert!(inlet.pull_chunk(Duration::ZERO).unwrap().is_empty());
    }

    #[test]
    fn test_push_chunk_preserves_order() {
        let bus = LocalBus::new();
        let outlet = bus.open_outlet(eeg_info()).unwrap();
        let info = bus.resolve_streams(Duration::ZERO).remove(0);
        let mut inlet = bus.open_inlet(&info).unwrap();

        let frames: Vec<Vec<f64>> = (0..5).map(|i| vec![i as f64, -(i as f64)]).collect();
        outlet.push_chunk(&frames, 1.0).unwrap();

        let chunk = inlet.pull_chunk(Duration::ZERO).unwrap();
        let firsts: Vec<f64> = chunk
            .samples
            .iter()
            .filter_map(|s| s.values.numeric(0))
            .collect();
        assert_eq!(firsts, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(chunk.samples[4].timestamp, 1.0);
        assert!(chunk.samples[0].timestamp < chunk.samples[4].timestamp);
    }

    #[test]
    fn test_arity_rejected() {
        let bus = LocalBus::new();
        let outlet = bus.open_outlet(eeg_info()).unwrap();
        assert!(outlet.push_sample(&[1.0], None).is_err());
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let bus = LocalBus::with_capacity(2);
        let outlet = bus.open_outlet(eeg_info()).unwrap();
        let info = bus.resolve_streams(Duration::ZERO).remove(0);
        let mut inlet = bus.open_inlet(&info).unwrap();

        for i in 0..4 {
            outlet.push_sample(&[i as f64, 0.0], Some(i as f64)).unwrap();
        }
        assert_eq!(inlet.dropped_chunks(), 2);

        let first = inlet.pull_chunk(Duration::ZERO).unwrap();
        assert_eq!(first.samples[0].timestamp, 2.0);
        let second = inlet.pull_chunk(Duration::ZERO).unwrap();
        assert_eq!(second.samples[0].timestamp, 3.0);
    }

    #[test]
    fn test_dropping_outlet_forgets_stream() {
        let bus = LocalBus::new();
        let outlet = bus.open_outlet(eeg_info()).unwrap();
        let info = bus.resolve_streams(Duration::ZERO).remove(0);
        let mut inlet = bus.open_inlet(&info).unwrap();

        drop(outlet);
        assert!(bus.resolve_streams(Duration::ZERO).is_empty());
        assert!(inlet.pull_chunk(Duration::ZERO).is_err());
        assert!(bus.open_inlet(&info).is_err());
    }

    #[test]
    fn test_dropped_inlet_unsubscribes() {
        let bus = LocalBus::new();
        let outlet = bus.open_outlet(eeg_info()).unwrap();
        let info = bus.resolve_streams(Duration::ZERO).remove(0);
        let inlet = bus.open_inlet(&info).unwrap();
        assert!(outlet.have_consumers());

        drop(inlet);
        assert!(!outlet.have_consumers());
        outlet.push_sample(&[1.0, 2.0], None).unwrap();
    }

    #[test]
    fn test_invalid_outlet_rejected() {
        let bus = LocalBus::new();
        let zero_channels = StreamInfo::new("X", "X", 0, 10.0, ChannelFormat::Float32, "x");
        assert!(bus.open_outlet(zero_channels).is_err());
        let negative = StreamInfo::new("X", "X", 1, -1.0, ChannelFormat::Float32, "x");
        assert!(bus.open_outlet(negative).is_err());
    }
}
