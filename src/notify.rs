//! Terminal notifications after a video reaches `Completed`.
//!
//! Notification is strictly best-effort: the trait cannot return an
//! error, so no implementation can abort the pipeline or flip a video's
//! status. Failures are logged and dropped.

use crate::model::{Chapter, VideoRecord};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_video_processed(&self, video: &VideoRecord, chapters: &[Chapter]);
}

/// Notifier that only writes to the log. Default for the CLI.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_video_processed(&self, video: &VideoRecord, chapters: &[Chapter]) {
        info!(
            "video {} processed: {} chapters over {:.2}s",
            video.id,
            chapters.len(),
            video.duration_seconds.unwrap_or(0.0)
        );
    }
}

/// Notifier that POSTs the final video and chapter records to a webhook,
/// e.g. the platform's multi-channel notification service.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client, url }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify_video_processed(&self, video: &VideoRecord, chapters: &[Chapter]) {
        let payload = serde_json::json!({
            "event": "video.processed",
            "video": video,
            "chapters": chapters,
        });

        match self.client.post(&self.url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                info!("webhook notified for video {}", video.id);
            }
            Ok(response) => {
                warn!(
                    "webhook for video {} returned {}",
                    video.id,
                    response.status()
                );
            }
            Err(e) => {
                warn!("webhook for video {} failed: {}", video.id, e);
            }
        }
    }
}
