//! Test data builders for creating test objects

use plsl_rs::pacing::ReplaySource;
use plsl_rs::types::{ChannelFormat, StreamInfo};
use std::path::Path;

/// Builder for creating test StreamInfos
pub struct StreamInfoBuilder {
    name: String,
    stream_type: String,
    channels: usize,
    rate: f64,
    format: ChannelFormat,
}

impl StreamInfoBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            stream_type: "Test".to_string(),
            channels: 1,
            rate: 100.0,
            format: ChannelFormat::Float32,
        }
    }

    pub fn stream_type(mut self, stream_type: &str) -> Self {
        self.stream_type = stream_type.to_string();
        self
    }

    pub fn channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    pub fn rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    /// A rate-less string event stream
    pub fn events(mut self) -> Self {
        self.channels = 1;
        self.rate = 0.0;
        self.format = ChannelFormat::String;
        self
    }

    pub fn build(self) -> StreamInfo {
        let source_id = self.name.to_lowercase();
        StreamInfo::new(
            self.name,
            self.stream_type,
            self.channels,
            self.rate,
            self.format,
            source_id,
        )
    }
}

/// A replay source whose channel `c` holds `c * 10_000 + i` at frame `i`
pub fn counting_source(rate: f64, channels: usize, len: usize) -> ReplaySource {
    let columns = (0..channels)
        .map(|c| (0..len).map(|i| (c * 10_000 + i) as f64).collect())
        .collect();
    ReplaySource::new(rate, ChannelFormat::Float32, columns).expect("valid source")
}

/// Write a mono 16-bit WAV recording of `samples` at `rate`
pub fn write_wav(path: &Path, rate: u32, samples: &[i16]) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
    for &s in samples {
        writer.write_sample(s).expect("write sample");
    }
    writer.finalize().expect("finalize wav");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_info_builder() {
        let info = StreamInfoBuilder::new("Acc")
            .stream_type("Accelerometer")
            .channels(3)
            .rate(32.0)
            .build();

        assert_eq!(info.name, "Acc");
        assert_eq!(info.channel_count, 3);
        assert!(info.has_rate());
        assert!(!StreamInfoBuilder::new("M").events().build().has_rate());
    }
}
