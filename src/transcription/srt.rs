//! SRT (SubRip) serialization of transcript segments.
//!
//! The pipeline persists the engine's timing as SRT text on the video
//! record, so observers and exports get the native subtitle form without
//! re-deriving it from segments.

use crate::model::TranscriptSegment;
use anyhow::{anyhow, Result};
use std::fmt;

/// A single SRT cue.
#[derive(Debug, Clone, PartialEq)]
pub struct SrtEntry {
    /// Sequential 1-based number
    pub index: u32,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    pub text: String,
}

impl SrtEntry {
    pub fn new(index: u32, start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            index,
            start,
            end,
            text: text.into().trim().to_string(),
        }
    }
}

impl fmt::Display for SrtEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n{} --> {}\n{}\n",
            self.index,
            format_timestamp(self.start),
            format_timestamp(self.end),
            self.text
        )
    }
}

/// Serialize transcript segments as an SRT document.
///
/// Empty segments are skipped; entries are numbered in order.
pub fn render_segments(segments: &[TranscriptSegment]) -> String {
    let mut out = String::new();
    let mut index = 0u32;

    for segment in segments {
        if segment.text.trim().is_empty() {
            continue;
        }
        index += 1;
        out.push_str(
            &SrtEntry::new(index, segment.start, segment.end, segment.text.clone()).to_string(),
        );
        out.push('\n');
    }

    out
}

/// Format seconds as an SRT timestamp (`HH:MM:SS,mmm`).
pub fn format_timestamp(seconds: f64) -> String {
    let total_millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let secs = (total_millis % 60_000) / 1000;
    let millis = total_millis % 1000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// Parse an SRT timestamp (`HH:MM:SS,mmm`) into seconds.
pub fn parse_timestamp(timestamp: &str) -> Result<f64> {
    let parts: Vec<&str> = timestamp.trim().split(',').collect();
    if parts.len() != 2 {
        return Err(anyhow!("invalid SRT timestamp: {}", timestamp));
    }

    let hms: Vec<&str> = parts[0].split(':').collect();
    if hms.len() != 3 {
        return Err(anyhow!("invalid SRT time: {}", parts[0]));
    }

    let hours: f64 = hms[0].parse()?;
    let minutes: f64 = hms[1].parse()?;
    let seconds: f64 = hms[2].parse()?;
    let millis: f64 = parts[1].parse()?;

    Ok(hours * 3600.0 + minutes * 60.0 + seconds + millis / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_formatting() {
        assert_eq!(format_timestamp(0.0), "00:00:00,000");
        assert_eq!(format_timestamp(1.5), "00:00:01,500");
        assert_eq!(format_timestamp(3661.0), "01:01:01,000");
    }

    #[test]
    fn test_timestamp_roundtrip() {
        let ts = format_timestamp(83.456);
        assert_eq!(ts, "00:01:23,456");
        assert!((parse_timestamp(&ts).unwrap() - 83.456).abs() < 1e-9);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_timestamp("not a timestamp").is_err());
        assert!(parse_timestamp("00:01:23.456").is_err());
    }

    #[test]
    fn test_render_segments() {
        let segments = vec![
            TranscriptSegment::new(0.0, 4.2, "First line"),
            TranscriptSegment::new(4.2, 8.0, "  "),
            TranscriptSegment::new(8.0, 12.5, "Second line"),
        ];

        let srt = render_segments(&segments);
        assert!(srt.contains("1\n00:00:00,000 --> 00:00:04,200\nFirst line"));
        // the blank segment is skipped and numbering stays sequential
        assert!(srt.contains("2\n00:00:08,000 --> 00:00:12,500\nSecond line"));
        assert!(!srt.contains("3\n"));
    }
}
