/// Autochapter
///
/// Video processing pipeline for an upload platform: probes duration,
/// transcribes speech, asks a language model to propose chapters,
/// reconciles chapter times against the real duration and persists the
/// result, broadcasting progress to attached observers along the way.

pub mod broadcast;
pub mod config;
pub mod error;
pub mod llm;
pub mod media;
pub mod model;
pub mod notify;
pub mod pipeline;
pub mod reconcile;
pub mod store;
pub mod synthesis;
pub mod transcription;

#[cfg(feature = "api")]
pub mod api;

// Re-export main types for easy access
pub use crate::broadcast::ProgressBroadcaster;
pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::PipelineError;
pub use crate::llm::{create_llm, Llm, LlmConfig, LlmProvider};
pub use crate::media::{AudioExtractor, FfprobeProber, MediaProber};
pub use crate::model::{
    CandidateChapter, Chapter, ProcessingEvent, Transcript, VideoRecord, VideoStatus,
};
pub use crate::notify::{LogNotifier, Notifier, WebhookNotifier};
pub use crate::pipeline::{Pipeline, ProcessOutcome};
pub use crate::reconcile::reconcile;
pub use crate::store::{ChapterStore, MemoryStore, VideoStore};
pub use crate::synthesis::ChapterSynthesizer;
pub use crate::transcription::{Transcriber, TranscriptionAdapter, WhisperEngine};

#[cfg(feature = "api")]
pub use crate::api::ApiServer;
