//! Whisper-backed speech engine.
//!
//! Wraps the whisper command line tools as a black box that turns an audio
//! file into timestamped segments. Supports whisper.cpp (`whisper-cli`,
//! `whisper-cpp`) and the Python `whisper` CLI, auto-detected in that
//! order.

use crate::config::TranscriptionConfig;
use crate::error::PipelineError;
use crate::model::TranscriptSegment;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Black-box speech-to-text engine.
///
/// Implementations must be all-or-nothing per attempt: on failure no
/// partial segment list is returned.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Transcribe an already-normalized audio file, writing any
    /// intermediate output under `work_dir`.
    async fn transcribe(
        &self,
        audio_path: &Path,
        work_dir: &Path,
    ) -> Result<Vec<TranscriptSegment>, PipelineError>;
}

/// Speech engine invoking a locally installed whisper binary.
#[derive(Debug, Clone)]
pub struct WhisperEngine {
    config: TranscriptionConfig,
}

impl WhisperEngine {
    pub fn new(config: TranscriptionConfig) -> Self {
        Self { config }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn command_available(name: &str) -> bool {
        Command::new(name)
            .arg("--help")
            .output()
            .await
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    async fn detect_backend() -> Result<Backend, PipelineError> {
        for (name, backend) in [
            ("whisper-cli", Backend::Cpp("whisper-cli")),
            ("whisper-cpp", Backend::Cpp("whisper-cpp")),
            ("whisper", Backend::Python),
        ] {
            if Self::command_available(name).await {
                debug!("using {} backend for transcription", name);
                return Ok(backend);
            }
        }

        Err(PipelineError::Transcription(
            "no whisper backend found; install whisper.cpp or openai-whisper".to_string(),
        ))
    }

    fn cpp_command(&self, binary: &str, audio_path: &Path, work_dir: &Path) -> Command {
        let stem = audio_path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let mut cmd = Command::new(binary);
        cmd.arg("-f")
            .arg(audio_path)
            .arg("-oj")
            .arg("-of")
            .arg(work_dir.join(&stem))
            .arg("-tp")
            .arg("0.0");

        let model_path = format!("models/ggml-{}.bin", self.config.model);
        if Path::new(&model_path).exists() {
            cmd.arg("-m").arg(&model_path);
        }
        if let Some(language) = &self.config.language {
            cmd.arg("-l").arg(language);
        }

        cmd
    }

    fn python_command(&self, audio_path: &Path, work_dir: &Path) -> Command {
        let mut cmd = Command::new("whisper");
        cmd.arg(audio_path)
            .arg("--model")
            .arg(&self.config.model)
            .arg("--output_dir")
            .arg(work_dir)
            .arg("--output_format")
            .arg("json")
            .arg("--verbose")
            .arg("False")
            .arg("--temperature")
            .arg("0.0");

        if let Some(language) = &self.config.language {
            cmd.arg("--language").arg(language);
        }

        cmd
    }

    async fn run_command(&self, mut cmd: Command) -> Result<(), PipelineError> {
        let timeout = Duration::from_secs(self.config.timeout_seconds);

        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| {
                PipelineError::Transcription(format!(
                    "whisper timed out after {}s",
                    self.config.timeout_seconds
                ))
            })?
            .map_err(|e| PipelineError::Transcription(format!("failed to run whisper: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("whisper exited with {}: {}", output.status, stderr.trim());
            return Err(PipelineError::Transcription(format!(
                "whisper exited with {}",
                output.status
            )));
        }

        Ok(())
    }

    async fn find_json_output(&self, work_dir: &Path) -> Result<PathBuf, PipelineError> {
        let mut entries = tokio::fs::read_dir(work_dir)
            .await
            .map_err(|e| PipelineError::Transcription(e.to_string()))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PipelineError::Transcription(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                return Ok(path);
            }
        }

        Err(PipelineError::Transcription(
            "whisper produced no JSON output".to_string(),
        ))
    }

    fn parse_output(&self, json: &str) -> Result<Vec<TranscriptSegment>, PipelineError> {
        let output: WhisperOutput = serde_json::from_str(json).map_err(|e| {
            PipelineError::Transcription(format!("unparseable whisper output: {}", e))
        })?;

        // whisper.cpp emits a `transcription` array with string timestamps,
        // Python whisper a `segments` array with float times.
        let segments: Vec<TranscriptSegment> = if !output.transcription.is_empty() {
            output
                .transcription
                .into_iter()
                .filter_map(|seg| {
                    let start = super::srt::parse_timestamp(&seg.timestamps.from).ok()?;
                    let end = super::srt::parse_timestamp(&seg.timestamps.to).ok()?;
                    Some(TranscriptSegment::new(start, end, seg.text.trim()))
                })
                .collect()
        } else {
            output
                .segments
                .into_iter()
                .map(|seg| TranscriptSegment::new(seg.start, seg.end, seg.text.trim()))
                .collect()
        };

        let segments: Vec<TranscriptSegment> = segments
            .into_iter()
            .filter(|s| s.end > s.start && !s.text.is_empty())
            .collect();

        if segments.is_empty() {
            return Err(PipelineError::Transcription(
                "whisper output contained no usable segments".to_string(),
            ));
        }

        Ok(segments)
    }
}

#[async_trait]
impl SpeechEngine for WhisperEngine {
    async fn transcribe(
        &self,
        audio_path: &Path,
        work_dir: &Path,
    ) -> Result<Vec<TranscriptSegment>, PipelineError> {
        info!(
            "transcribing {} with whisper model {}",
            audio_path.display(),
            self.config.model
        );

        let cmd = match Self::detect_backend().await? {
            Backend::Cpp(binary) => self.cpp_command(binary, audio_path, work_dir),
            Backend::Python => self.python_command(audio_path, work_dir),
        };

        self.run_command(cmd).await?;

        let json_path = self.find_json_output(work_dir).await?;
        let json = tokio::fs::read_to_string(&json_path)
            .await
            .map_err(|e| PipelineError::Transcription(e.to_string()))?;

        self.parse_output(&json)
    }
}

enum Backend {
    Cpp(&'static str),
    Python,
}

/// Whisper JSON output, covering both the whisper.cpp and Python shapes.
#[derive(Debug, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    segments: Vec<FloatSegment>,
    #[serde(default)]
    transcription: Vec<TimestampedSegment>,
}

#[derive(Debug, Deserialize)]
struct FloatSegment {
    start: f64,
    end: f64,
    text: String,
}

#[derive(Debug, Deserialize)]
struct TimestampedSegment {
    timestamps: Timestamps,
    text: String,
}

#[derive(Debug, Deserialize)]
struct Timestamps {
    from: String,
    to: String,
}
