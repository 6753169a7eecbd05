use thiserror::Error;

/// Errors that can abort a processing run.
///
/// Malformed synthesizer output is recovered internally by the fallback
/// segmenter and normally never escalates; notification failures are
/// logged and never become a `PipelineError` at all. There is no
/// reconciliation variant on purpose: the reconciler is total.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("media probe failed: {0}")]
    Probe(String),

    #[error("transcription failed: {0}")]
    Transcription(String),

    #[error("chapter synthesis returned malformed output: {0}")]
    MalformedSynthesis(String),

    #[error("chapter persistence failed: {0}")]
    Persistence(String),

    #[error("video not found: {0}")]
    VideoNotFound(String),

    #[error("video {0} is already being processed")]
    AlreadyProcessing(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
