//! Line-oriented frame parsing
//!
//! Serial devices and TCP clients send one frame per line. Numeric frames are
//! comma-separated integers whose count must match the stream's channel
//! count; event frames are the trimmed line text.
//!
//! A line that fails to parse is an [`AcquisitionError`]; what happens next
//! is decided by a [`SkipPolicy`].

use crate::error::{AcquisitionError, PlslError, Result};

/// What to do with a frame that failed to parse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkipPolicy {
    /// Log at `warn` and drop the frame
    #[default]
    Skip,
    /// Propagate the error and stop the front-end
    Fail,
}

impl SkipPolicy {
    /// Apply the policy to a parse result from `source`
    pub fn apply<T>(
        self,
        source: &str,
        parsed: std::result::Result<T, AcquisitionError>,
    ) -> Result<Option<T>> {
        match (parsed, self) {
            (Ok(value), _) => Ok(Some(value)),
            (Err(AcquisitionError::Empty), _) => Ok(None),
            (Err(e), SkipPolicy::Skip) => {
                tracing::warn!("{}: skipping frame: {}", source, e);
                Ok(None)
            }
            (Err(e), SkipPolicy::Fail) => Err(PlslError::from(e).with_context(source)),
        }
    }
}

fn decode(line: &[u8]) -> std::result::Result<&str, AcquisitionError> {
    let text = std::str::from_utf8(line).map_err(|_| AcquisitionError::Utf8)?;
    let text = text.trim();
    if text.is_empty() {
        return Err(AcquisitionError::Empty);
    }
    Ok(text)
}

/// Parse `a,b,c` integers, requiring exactly `expected` values
pub fn parse_numeric_line(
    line: &[u8],
    expected: usize,
) -> std::result::Result<Vec<f64>, AcquisitionError> {
    let text = decode(line)?;

    let values = text
        .split(',')
        .map(|field| {
            let field = field.trim();
            field
                .parse::<i64>()
                .map(|v| v as f64)
                .map_err(|_| AcquisitionError::Parse {
                    field: field.to_string(),
                })
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    // A reading joined mid-line has fewer fields than channels
    if values.len() != expected {
        return Err(AcquisitionError::Arity {
            expected,
            actual: values.len(),
        });
    }
    Ok(values)
}

/// Parse an event line into its trimmed text
pub fn parse_event_line(line: &[u8]) -> std::result::Result<String, AcquisitionError> {
    decode(line).map(str::to_string)
}

/// Reassembles newline-terminated lines from arbitrary byte reads
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and return every line completed by them, without `\n`
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            lines.push(line);
        }
        lines
    }

    /// Take the unterminated remainder, if any
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_line() {
        let values = parse_numeric_line(b"1, -2,3,4,5,6\r\n", 6).unwrap();
        assert_eq!(values, vec![1.0, -2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_numeric_arity() {
        assert_eq!(
            parse_numeric_line(b"4,5,6", 6),
            Err(AcquisitionError::Arity {
                expected: 6,
                actual: 3
            })
        );
    }

    #[test]
    fn test_numeric_errors() {
        assert_eq!(parse_numeric_line(b"  \n", 1), Err(AcquisitionError::Empty));
        assert_eq!(parse_numeric_line(&[0xff, 0xfe], 1), Err(AcquisitionError::Utf8));
        assert_eq!(
            parse_numeric_line(b"1,x", 2),
            Err(AcquisitionError::Parse {
                field: "x".to_string()
            })
        );
    }

    #[test]
    fn test_event_line_trimmed() {
        assert_eq!(parse_event_line(b" start \n").unwrap(), "start");
        assert_eq!(parse_event_line(b"\r\n"), Err(AcquisitionError::Empty));
    }

    #[test]
    fn test_skip_policy() {
        let bad: std::result::Result<u8, _> = Err(AcquisitionError::Utf8);
        assert_eq!(SkipPolicy::Skip.apply("serial", bad.clone()).unwrap(), None);
        let err = SkipPolicy::Fail.apply("serial", bad).unwrap_err();
        assert!(!err.is_fatal());

        // Blank lines are dropped quietly under either policy
        let empty: std::result::Result<u8, _> = Err(AcquisitionError::Empty);
        assert_eq!(SkipPolicy::Fail.apply("tcp", empty).unwrap(), None);
    }

    #[test]
    fn test_line_buffer_reassembles() {
        let mut lines = LineBuffer::new();
        assert!(lines.push(b"sta").is_empty());
        assert_eq!(lines.push(b"rt\nstop\nfo"), vec![b"start".to_vec(), b"stop".to_vec()]);
        assert_eq!(lines.finish(), Some(b"fo".to_vec()));
        assert_eq!(lines.finish(), None);
    }
}
