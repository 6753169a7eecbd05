//! Transcription adapter: audio extraction plus speech engine invocation.

pub mod srt;
pub mod whisper;

pub use whisper::{SpeechEngine, WhisperEngine};

use crate::error::PipelineError;
use crate::media::AudioExtractor;
use crate::model::Transcript;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Turns a video file into a time-aligned transcript.
///
/// Implementations are all-or-nothing: a failed attempt returns
/// `PipelineError::Transcription` and no partial transcript.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, video_path: &Path) -> Result<Transcript, PipelineError>;
}

/// Default transcriber: extract normalized audio, run the speech engine,
/// assemble full text and raw SRT.
///
/// All intermediate artifacts (the extracted WAV and any engine output)
/// live in a scoped temporary directory that is removed on success and on
/// every failure path.
pub struct TranscriptionAdapter {
    extractor: AudioExtractor,
    engine: Arc<dyn SpeechEngine>,
}

impl TranscriptionAdapter {
    pub fn new(extractor: AudioExtractor, engine: Arc<dyn SpeechEngine>) -> Self {
        Self { extractor, engine }
    }
}

#[async_trait]
impl Transcriber for TranscriptionAdapter {
    async fn transcribe(&self, video_path: &Path) -> Result<Transcript, PipelineError> {
        // Dropping the TempDir deletes the extracted audio no matter how
        // this function exits.
        let work_dir = tempfile::tempdir()
            .map_err(|e| PipelineError::Transcription(format!("no temp dir: {}", e)))?;

        let audio_path = self.extractor.extract(video_path, work_dir.path()).await?;
        let segments = self.engine.transcribe(&audio_path, work_dir.path()).await?;

        let full_text = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let raw = srt::render_segments(&segments);

        info!(
            "transcribed {}: {} segments, {} characters",
            video_path.display(),
            segments.len(),
            full_text.len()
        );

        Ok(Transcript {
            full_text,
            segments,
            raw,
        })
    }
}
