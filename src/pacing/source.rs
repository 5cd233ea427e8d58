//! Finite recorded sources for replay
//!
//! A [`ReplaySource`] holds the equal-length channel columns of one rate
//! group and serves the frames named by a [`ReadPlan`]. Columns are decoded
//! from WAV files with `hound`; every file of a group must share its sample
//! rate and length.

use super::scheduler::ReadPlan;
use crate::error::{PlslError, Result, ResultExt};
use crate::types::ChannelFormat;
use hound::{SampleFormat, WavReader};
use std::path::Path;

/// Channel columns replayed together at one rate
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaySource {
    rate: f64,
    format: ChannelFormat,
    columns: Vec<Vec<f64>>,
}

impl ReplaySource {
    /// Build a source from columns that must all have the same length
    pub fn new(rate: f64, format: ChannelFormat, columns: Vec<Vec<f64>>) -> Result<Self> {
        let first = columns
            .first()
            .ok_or_else(|| PlslError::Config("replay source has no channels".to_string()))?;
        if let Some(bad) = columns.iter().find(|c| c.len() != first.len()) {
            return Err(PlslError::Config(format!(
                "replay channels differ in length ({} vs {})",
                first.len(),
                bad.len()
            )));
        }

        Ok(Self {
            rate,
            format,
            columns,
        })
    }

    /// Decode and join WAV files into one multi-channel source.
    ///
    /// Each file contributes all of its channels in order.
    pub fn from_wav_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut rate = None;
        let mut format = ChannelFormat::Float32;
        let mut columns = Vec::new();

        for path in paths {
            let path = path.as_ref();
            let recording =
                WavRecording::open(path).with_context(|| format!("Failed to read {:?}", path))?;

            match rate {
                None => {
                    rate = Some(recording.rate);
                    format = recording.format;
                }
                Some(r) if r != recording.rate => {
                    return Err(PlslError::Config(format!(
                        "{:?} is sampled at {} Hz, group expects {} Hz",
                        path, recording.rate, r
                    )));
                }
                Some(_) => {}
            }
            columns.extend(recording.columns);
        }

        let rate = rate.ok_or_else(|| PlslError::Config("replay group has no files".to_string()))?;
        Self::new(rate, format, columns)
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn format(&self) -> ChannelFormat {
        self.format
    }

    pub fn channel_count(&self) -> usize {
        self.columns.len()
    }

    /// Length of the recording in frames
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All channel values at frame `idx`
    pub fn frame(&self, idx: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c[idx]).collect()
    }

    /// Frames selected by a read plan, in read order
    pub fn frames(&self, plan: &ReadPlan) -> Vec<Vec<f64>> {
        plan.indices().map(|idx| self.frame(idx)).collect()
    }
}

/// A decoded WAV file, deinterleaved into columns
#[derive(Debug, Clone)]
pub struct WavRecording {
    pub rate: f64,
    pub format: ChannelFormat,
    pub columns: Vec<Vec<f64>>,
}

impl WavRecording {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut reader = WavReader::open(path)?;
        let spec = reader.spec();
        let channels = spec.channels as usize;

        let (format, interleaved) = match spec.sample_format {
            SampleFormat::Int => {
                let format = match spec.bits_per_sample {
                    0..=8 => ChannelFormat::Int8,
                    9..=16 => ChannelFormat::Int16,
                    _ => ChannelFormat::Int32,
                };
                let samples = reader
                    .samples::<i32>()
                    .map(|s| s.map(f64::from))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                (format, samples)
            }
            SampleFormat::Float => {
                let samples = reader
                    .samples::<f32>()
                    .map(|s| s.map(f64::from))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                (ChannelFormat::Float32, samples)
            }
        };

        let mut columns = vec![Vec::with_capacity(interleaved.len() / channels.max(1)); channels];
        for frame in interleaved.chunks_exact(channels.max(1)) {
            for (column, &value) in columns.iter_mut().zip(frame) {
                column.push(value);
            }
        }

        Ok(Self {
            rate: spec.sample_rate as f64,
            format,
            columns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    fn write_wav(path: &Path, rate: u32, channels: u16, frames: &[Vec<i16>]) {
        let spec = WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for frame in frames {
            for &s in frame {
                writer.write_sample(s).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_mismatched_columns_rejected() {
        let result = ReplaySource::new(
            64.0,
            ChannelFormat::Int16,
            vec![vec![0.0; 10], vec![0.0; 9]],
        );
        assert!(matches!(result, Err(PlslError::Config(_))));
        assert!(ReplaySource::new(64.0, ChannelFormat::Int16, vec![]).is_err());
    }

    #[test]
    fn test_frames_follow_plan() {
        let source = ReplaySource::new(
            10.0,
            ChannelFormat::Int16,
            vec![vec![0.0, 1.0, 2.0], vec![10.0, 11.0, 12.0]],
        )
        .unwrap();
        let plan = ReadPlan {
            group: 0,
            start: 2,
            count: 3,
            len: 3,
        };
        assert_eq!(
            source.frames(&plan),
            vec![vec![2.0, 12.0], vec![0.0, 10.0], vec![1.0, 11.0]]
        );
    }

    #[test]
    fn test_wav_files_join_into_group() {
        let dir = tempfile::tempdir().unwrap();
        let thoracic = dir.path().join("respiration_thoracic.wav");
        let abdominal = dir.path().join("respiration_abdominal.wav");
        write_wav(&thoracic, 128, 1, &[vec![1], vec![2], vec![3]]);
        write_wav(&abdominal, 128, 1, &[vec![-1], vec![-2], vec![-3]]);

        let source = ReplaySource::from_wav_files(&[&thoracic, &abdominal]).unwrap();
        assert_eq!(source.rate(), 128.0);
        assert_eq!(source.format(), ChannelFormat::Int16);
        assert_eq!(source.channel_count(), 2);
        assert_eq!(source.len(), 3);
        assert_eq!(source.frame(1), vec![2.0, -2.0]);
    }

    #[test]
    fn test_interleaved_wav_is_deinterleaved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acc.wav");
        write_wav(&path, 64, 3, &[vec![1, 2, 3], vec![4, 5, 6]]);

        let recording = WavRecording::open(&path).unwrap();
        assert_eq!(recording.columns.len(), 3);
        assert_eq!(recording.columns[2], vec![3.0, 6.0]);
    }

    #[test]
    fn test_rate_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.wav");
        let b = dir.path().join("b.wav");
        write_wav(&a, 64, 1, &[vec![0]]);
        write_wav(&b, 128, 1, &[vec![0]]);
        assert!(ReplaySource::from_wav_files(&[&a, &b]).is_err());
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        let err = ReplaySource::from_wav_files(&["/nonexistent/ecg.wav"]).unwrap_err();
        assert!(err.to_string().contains("ecg.wav"));
    }
}
