//! Media inspection and audio extraction via the ffmpeg toolchain.

use crate::error::PipelineError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Authoritative duration probe for an uploaded media file.
#[async_trait]
pub trait MediaProber: Send + Sync {
    async fn duration_seconds(&self, path: &Path) -> Result<f64, PipelineError>;
}

/// Duration probe backed by `ffprobe`.
pub struct FfprobeProber;

#[async_trait]
impl MediaProber for FfprobeProber {
    async fn duration_seconds(&self, path: &Path) -> Result<f64, PipelineError> {
        let output = tokio::process::Command::new("ffprobe")
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
            ])
            .arg(path)
            .output()
            .await
            .map_err(|e| PipelineError::Probe(format!("failed to run ffprobe: {}", e)))?;

        if !output.status.success() {
            return Err(PipelineError::Probe(format!(
                "ffprobe failed for {}",
                path.display()
            )));
        }

        let data: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| PipelineError::Probe(format!("unparseable ffprobe output: {}", e)))?;

        let duration = data["format"]["duration"]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| {
                PipelineError::Probe(format!("no duration reported for {}", path.display()))
            })?;

        debug!("probed {}: {:.2}s", path.display(), duration);
        Ok(duration)
    }
}

/// Extracts a normalized mono WAV from a video file for the speech engine.
#[derive(Debug, Clone)]
pub struct AudioExtractor {
    /// Target sample rate, 16 kHz suits whisper models
    pub sample_rate: u32,
}

impl AudioExtractor {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    /// Extract audio into `work_dir` and return the WAV path.
    ///
    /// The caller owns `work_dir` and is responsible for removing the
    /// artifact; the transcription adapter scopes it to a temp directory.
    pub async fn extract(&self, video_path: &Path, work_dir: &Path) -> Result<PathBuf, PipelineError> {
        let stem = video_path
            .file_stem()
            .ok_or_else(|| {
                PipelineError::Transcription(format!("invalid video path: {}", video_path.display()))
            })?
            .to_string_lossy();
        let audio_path = work_dir.join(format!("{}.wav", stem));

        info!("extracting audio from {}", video_path.display());

        let status = tokio::process::Command::new("ffmpeg")
            .arg("-i")
            .arg(video_path)
            .args([
                "-vn",
                "-acodec",
                "pcm_s16le",
                "-ar",
                &self.sample_rate.to_string(),
                "-ac",
                "1",
                "-f",
                "wav",
                "-y",
            ])
            .arg(&audio_path)
            .status()
            .await
            .map_err(|e| PipelineError::Transcription(format!("failed to run ffmpeg: {}", e)))?;

        if !status.success() {
            return Err(PipelineError::Transcription(format!(
                "audio extraction failed for {}",
                video_path.display()
            )));
        }

        Ok(audio_path)
    }
}

impl Default for AudioExtractor {
    fn default() -> Self {
        Self::new(16000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extractor_defaults() {
        let extractor = AudioExtractor::default();
        assert_eq!(extractor.sample_rate, 16000);
    }

    #[tokio::test]
    async fn test_probe_missing_file_errors() {
        let prober = FfprobeProber;
        let result = prober
            .duration_seconds(Path::new("/nonexistent/clip.mp4"))
            .await;
        assert!(matches!(result, Err(PipelineError::Probe(_))));
    }
}
