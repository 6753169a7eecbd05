//! Persistence contracts for videos and chapters, plus the in-process
//! store used by the CLI, the API server and tests.
//!
//! The production deployment backs these traits with the platform's
//! relational store; the pipeline only depends on the contracts.

use crate::error::PipelineError;
use crate::model::{Chapter, VideoRecord, VideoStatus};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Video record persistence.
#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn insert(&self, video: VideoRecord) -> Result<(), PipelineError>;

    async fn find(&self, id: &str) -> Result<VideoRecord, PipelineError>;

    async fn list(&self) -> Result<Vec<VideoRecord>, PipelineError>;

    /// Compare-and-set entry into `Processing`.
    ///
    /// Fails with `AlreadyProcessing` if a run is active for this video;
    /// otherwise atomically sets the status, records the start timestamp
    /// and clears any previous error. This is the single-flight lock.
    async fn begin_processing(&self, id: &str) -> Result<VideoRecord, PipelineError>;

    async fn set_duration(&self, id: &str, seconds: f64) -> Result<(), PipelineError>;

    async fn set_transcript(&self, id: &str, raw: &str) -> Result<(), PipelineError>;

    /// Terminal success: status `Completed` plus completion timestamp.
    async fn mark_completed(&self, id: &str) -> Result<VideoRecord, PipelineError>;

    /// Terminal failure: status `Error`, message, completion timestamp.
    async fn mark_error(&self, id: &str, message: &str) -> Result<VideoRecord, PipelineError>;

    async fn delete(&self, id: &str) -> Result<(), PipelineError>;
}

/// Chapter persistence. Chapters for a video are only ever replaced as a
/// whole set, never patched.
#[async_trait]
pub trait ChapterStore: Send + Sync {
    /// Atomically replace all chapters of a video. Either the full new
    /// set becomes visible or the previous set stays intact.
    async fn replace_for_video(
        &self,
        video_id: &str,
        chapters: Vec<Chapter>,
    ) -> Result<(), PipelineError>;

    async fn find_by_video(&self, video_id: &str) -> Result<Vec<Chapter>, PipelineError>;

    async fn delete_by_video(&self, video_id: &str) -> Result<(), PipelineError>;
}

/// In-process store over RwLock-guarded maps.
///
/// With a snapshot directory configured, every video mutation writes the
/// record (and its chapters) as a JSON file so a CLI run leaves an
/// inspectable trail; snapshot failures are logged and never fail the
/// mutation.
pub struct MemoryStore {
    videos: RwLock<HashMap<String, VideoRecord>>,
    chapters: RwLock<HashMap<String, Vec<Chapter>>>,
    snapshot_dir: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            videos: RwLock::new(HashMap::new()),
            chapters: RwLock::new(HashMap::new()),
            snapshot_dir: None,
        }
    }

    pub fn with_snapshot_dir(dir: PathBuf) -> Self {
        Self {
            snapshot_dir: Some(dir),
            ..Self::new()
        }
    }

    async fn snapshot(&self, video: &VideoRecord) {
        let Some(dir) = &self.snapshot_dir else {
            return;
        };

        let chapters = self
            .chapters
            .read()
            .await
            .get(&video.id)
            .cloned()
            .unwrap_or_default();
        let payload = serde_json::json!({ "video": video, "chapters": chapters });

        let path = dir.join(format!("{}.json", video.id.replace(['/', ' '], "_")));
        let write = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, serde_json::to_string_pretty(&payload)?).await?;
            Ok::<_, anyhow::Error>(())
        };

        if let Err(e) = write.await {
            warn!("failed to snapshot video {}: {}", video.id, e);
        } else {
            debug!("snapshotted video {} to {}", video.id, path.display());
        }
    }

    async fn mutate<F>(&self, id: &str, apply: F) -> Result<VideoRecord, PipelineError>
    where
        F: FnOnce(&mut VideoRecord),
    {
        let updated = {
            let mut videos = self.videos.write().await;
            let video = videos
                .get_mut(id)
                .ok_or_else(|| PipelineError::VideoNotFound(id.to_string()))?;
            apply(video);
            video.clone()
        };

        self.snapshot(&updated).await;
        Ok(updated)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VideoStore for MemoryStore {
    async fn insert(&self, video: VideoRecord) -> Result<(), PipelineError> {
        self.videos.write().await.insert(video.id.clone(), video);
        Ok(())
    }

    async fn find(&self, id: &str) -> Result<VideoRecord, PipelineError> {
        self.videos
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| PipelineError::VideoNotFound(id.to_string()))
    }

    async fn list(&self) -> Result<Vec<VideoRecord>, PipelineError> {
        let mut videos: Vec<VideoRecord> = self.videos.read().await.values().cloned().collect();
        videos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(videos)
    }

    async fn begin_processing(&self, id: &str) -> Result<VideoRecord, PipelineError> {
        let updated = {
            let mut videos = self.videos.write().await;
            let video = videos
                .get_mut(id)
                .ok_or_else(|| PipelineError::VideoNotFound(id.to_string()))?;

            if video.status == VideoStatus::Processing {
                return Err(PipelineError::AlreadyProcessing(id.to_string()));
            }

            video.status = VideoStatus::Processing;
            video.processing_started_at = Some(Utc::now());
            video.processing_completed_at = None;
            video.error_message = None;
            video.clone()
        };

        self.snapshot(&updated).await;
        Ok(updated)
    }

    async fn set_duration(&self, id: &str, seconds: f64) -> Result<(), PipelineError> {
        self.mutate(id, |v| v.duration_seconds = Some(seconds))
            .await?;
        Ok(())
    }

    async fn set_transcript(&self, id: &str, raw: &str) -> Result<(), PipelineError> {
        self.mutate(id, |v| v.transcript = Some(raw.to_string()))
            .await?;
        Ok(())
    }

    async fn mark_completed(&self, id: &str) -> Result<VideoRecord, PipelineError> {
        self.mutate(id, |v| {
            v.status = VideoStatus::Completed;
            v.processing_completed_at = Some(Utc::now());
        })
        .await
    }

    async fn mark_error(&self, id: &str, message: &str) -> Result<VideoRecord, PipelineError> {
        self.mutate(id, |v| {
            v.status = VideoStatus::Error;
            v.error_message = Some(message.to_string());
            v.processing_completed_at = Some(Utc::now());
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<(), PipelineError> {
        self.videos
            .write()
            .await
            .remove(id)
            .ok_or_else(|| PipelineError::VideoNotFound(id.to_string()))?;
        self.chapters.write().await.remove(id);
        Ok(())
    }
}

#[async_trait]
impl ChapterStore for MemoryStore {
    async fn replace_for_video(
        &self,
        video_id: &str,
        chapters: Vec<Chapter>,
    ) -> Result<(), PipelineError> {
        // Single map insert under the write lock: the old set stays
        // visible until the new one lands in full.
        self.chapters
            .write()
            .await
            .insert(video_id.to_string(), chapters);
        Ok(())
    }

    async fn find_by_video(&self, video_id: &str) -> Result<Vec<Chapter>, PipelineError> {
        Ok(self
            .chapters
            .read()
            .await
            .get(video_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_by_video(&self, video_id: &str) -> Result<(), PipelineError> {
        self.chapters.write().await.remove(video_id);
        Ok(())
    }
}
