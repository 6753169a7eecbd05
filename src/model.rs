use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle of a video inside the processing platform.
///
/// Transitions are monotonic within a run: `Uploaded -> Processing ->
/// {Completed | Error}`. A caller may resubmit a terminal video, which
/// re-enters at `Processing`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Uploaded,
    Processing,
    Completed,
    Error,
}

/// A video record as persisted by the video store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    /// Unique video identifier
    pub id: String,
    /// Display name, usually the original filename
    pub name: String,
    /// Path to the uploaded source file
    pub source_path: PathBuf,
    /// Duration in seconds, unknown until probed
    pub duration_seconds: Option<f64>,
    /// Current lifecycle status
    pub status: VideoStatus,
    /// Raw timestamped transcript (SRT text), set after transcription
    pub transcript: Option<String>,
    /// Failure detail when status is `Error`
    pub error_message: Option<String>,
    /// When the current/last processing run started
    pub processing_started_at: Option<DateTime<Utc>>,
    /// When the last processing run reached a terminal state
    pub processing_completed_at: Option<DateTime<Utc>>,
}

impl VideoRecord {
    /// Create a freshly uploaded video record.
    pub fn new(id: impl Into<String>, source_path: PathBuf) -> Self {
        let id = id.into();
        let name = source_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| id.clone());

        Self {
            id,
            name,
            source_path,
            duration_seconds: None,
            status: VideoStatus::Uploaded,
            transcript: None,
            error_message: None,
            processing_started_at: None,
            processing_completed_at: None,
        }
    }
}

/// A single time-aligned transcript segment produced by the speech engine.
///
/// Segments are ordered and non-overlapping with `start < end`. They are
/// ephemeral: only the raw serialized transcript is persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptSegment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Transcribed text
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// Complete output of one transcription attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// Full transcription text
    pub full_text: String,
    /// Ordered, non-overlapping segments
    pub segments: Vec<TranscriptSegment>,
    /// Engine-native subtitle serialization (SRT), kept for persistence
    /// and user display
    pub raw: String,
}

/// An unvalidated chapter proposal from the synthesizer.
///
/// Times may be out of range, overlapping, or zero-length; the reconciler
/// owns validity. The serde shape matches the JSON the language model is
/// asked to produce.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateChapter {
    /// 1-based index as proposed by the synthesizer
    #[serde(default)]
    pub index: u32,
    pub start_time: f64,
    pub end_time: f64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub key_points: Vec<String>,
}

/// A validated, persisted chapter.
///
/// Produced only by the reconciler: chapters of one video are sorted by
/// index, cover `[0, duration]` with no gaps or overlaps, and the last
/// chapter ends exactly at the video duration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub video_id: String,
    /// 1-based, unique per video
    pub index: u32,
    pub start_time: f64,
    pub end_time: f64,
    pub title: String,
    pub description: String,
    /// Key points joined for display
    pub excerpt: String,
}

/// Event kind on the progress broadcast channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Status,
    Progress,
    Completed,
    Error,
}

/// A transient progress event pushed to all attached observers.
///
/// Not persisted and never replayed; the wire shape is JSON with camelCase
/// keys so browser clients can consume it directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub video_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// 0-100, monotonically increasing within one processing run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_name: Option<String>,
    /// 1-based position when processing a batch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_videos: Option<usize>,
    /// Chapter count, set on terminal `completed` events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapters: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessingEvent {
    fn base(kind: EventKind, video_id: &str) -> Self {
        Self {
            kind,
            video_id: video_id.to_string(),
            stage: None,
            progress: None,
            message: None,
            video_name: None,
            video_index: None,
            total_videos: None,
            chapters: None,
            error: None,
        }
    }

    pub fn status(video_id: &str, message: impl Into<String>) -> Self {
        let mut ev = Self::base(EventKind::Status, video_id);
        ev.message = Some(message.into());
        ev
    }

    pub fn progress(
        video_id: &str,
        stage: &str,
        progress: u8,
        message: impl Into<String>,
    ) -> Self {
        let mut ev = Self::base(EventKind::Progress, video_id);
        ev.stage = Some(stage.to_string());
        ev.progress = Some(progress.min(100));
        ev.message = Some(message.into());
        ev
    }

    pub fn completed(video_id: &str, chapter_count: usize) -> Self {
        let mut ev = Self::base(EventKind::Completed, video_id);
        ev.progress = Some(100);
        ev.chapters = Some(chapter_count);
        ev.message = Some(format!("processing completed with {} chapters", chapter_count));
        ev
    }

    pub fn error(video_id: &str, error: impl Into<String>) -> Self {
        let mut ev = Self::base(EventKind::Error, video_id);
        ev.error = Some(error.into());
        ev
    }

    /// Attach batch position (1-based index / total) for UI display.
    pub fn with_batch(mut self, index: usize, total: usize) -> Self {
        self.video_index = Some(index);
        self.total_videos = Some(total);
        self
    }

    pub fn with_video_name(mut self, name: &str) -> Self {
        self.video_name = Some(name.to_string());
        self
    }
}
