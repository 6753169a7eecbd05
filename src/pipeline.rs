//! The processing orchestrator: probe, transcribe, synthesize, reconcile,
//! persist, notify, with progress broadcast at every stage.

use crate::broadcast::ProgressBroadcaster;
use crate::error::PipelineError;
use crate::media::MediaProber;
use crate::model::{Chapter, ProcessingEvent, VideoRecord};
use crate::notify::Notifier;
use crate::reconcile::reconcile;
use crate::store::{ChapterStore, VideoStore};
use crate::synthesis::ChapterSynthesizer;
use crate::transcription::Transcriber;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Result of one processing run, success or not. A successful outcome
/// carries the reconciled chapter records as persisted, so callers need
/// no follow-up store read.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub video_id: String,
    pub success: bool,
    pub chapters: Vec<Chapter>,
    pub error: Option<String>,
}

/// Drives a video through the full chapter pipeline.
///
/// All collaborators sit behind traits so the CLI, the API server and the
/// tests can wire in real or scripted implementations. One instance is
/// shared across concurrent runs.
pub struct Pipeline {
    videos: Arc<dyn VideoStore>,
    chapters: Arc<dyn ChapterStore>,
    prober: Arc<dyn MediaProber>,
    transcriber: Arc<dyn Transcriber>,
    synthesizer: Arc<ChapterSynthesizer>,
    broadcaster: Arc<ProgressBroadcaster>,
    notifier: Arc<dyn Notifier>,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        videos: Arc<dyn VideoStore>,
        chapters: Arc<dyn ChapterStore>,
        prober: Arc<dyn MediaProber>,
        transcriber: Arc<dyn Transcriber>,
        synthesizer: Arc<ChapterSynthesizer>,
        broadcaster: Arc<ProgressBroadcaster>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            videos,
            chapters,
            prober,
            transcriber,
            synthesizer,
            broadcaster,
            notifier,
        }
    }

    pub fn broadcaster(&self) -> Arc<ProgressBroadcaster> {
        Arc::clone(&self.broadcaster)
    }

    pub fn video_store(&self) -> Arc<dyn VideoStore> {
        Arc::clone(&self.videos)
    }

    pub fn chapter_store(&self) -> Arc<dyn ChapterStore> {
        Arc::clone(&self.chapters)
    }

    /// Process a single video end to end.
    ///
    /// Entry is guarded by the store's compare-and-set: a video already in
    /// `Processing` is rejected before any event is published or any
    /// external tool runs. Any stage failure marks the video `Error` and
    /// publishes a terminal error event; the returned outcome always
    /// reflects what was persisted.
    pub async fn process_video(
        &self,
        video_id: &str,
        batch: Option<(usize, usize)>,
    ) -> ProcessOutcome {
        let video = match self.videos.begin_processing(video_id).await {
            Ok(video) => video,
            Err(e) => {
                warn!("rejected processing request for {}: {}", video_id, e);
                return ProcessOutcome {
                    video_id: video_id.to_string(),
                    success: false,
                    chapters: Vec::new(),
                    error: Some(e.to_string()),
                };
            }
        };

        self.publish(
            ProcessingEvent::status(video_id, format!("processing {}", video.name)),
            &video,
            batch,
        )
        .await;

        match self.run_stages(&video, batch).await {
            Ok(chapters) => {
                let count = chapters.len();
                match self.videos.mark_completed(video_id).await {
                    Ok(completed) => {
                        self.publish(ProcessingEvent::completed(video_id, count), &completed, batch)
                            .await;
                        info!("completed {} with {} chapters", video_id, count);

                        // Fire and forget: notification failures are the
                        // notifier's problem, the video stays Completed.
                        let notifier = Arc::clone(&self.notifier);
                        let notified = chapters.clone();
                        tokio::spawn(async move {
                            notifier.notify_video_processed(&completed, &notified).await;
                        });

                        ProcessOutcome {
                            video_id: video_id.to_string(),
                            success: true,
                            chapters,
                            error: None,
                        }
                    }
                    Err(e) => self.fail(video_id, &video, batch, e.to_string()).await,
                }
            }
            Err(e) => self.fail(video_id, &video, batch, e.to_string()).await,
        }
    }

    /// Process a batch sequentially, tagging events with 1-based batch
    /// positions. One failing video never stops the rest.
    pub async fn process_videos(&self, video_ids: &[String]) -> Vec<ProcessOutcome> {
        let total = video_ids.len();
        let mut outcomes = Vec::with_capacity(total);

        for (i, id) in video_ids.iter().enumerate() {
            outcomes.push(self.process_video(id, Some((i + 1, total))).await);
        }

        let succeeded = outcomes.iter().filter(|o| o.success).count();
        info!("batch finished: {}/{} videos completed", succeeded, total);
        outcomes
    }

    async fn run_stages(
        &self,
        video: &VideoRecord,
        batch: Option<(usize, usize)>,
    ) -> Result<Vec<Chapter>, PipelineError> {
        let id = video.id.as_str();

        self.progress(video, batch, "probe", 5, "probing media duration")
            .await;
        let duration = self.prober.duration_seconds(&video.source_path).await?;
        self.videos.set_duration(id, duration).await?;
        self.progress(
            video,
            batch,
            "probe",
            15,
            format!("duration {:.2}s", duration),
        )
        .await;

        self.progress(video, batch, "transcription", 20, "transcribing audio")
            .await;
        let transcript = self.transcriber.transcribe(&video.source_path).await?;
        // Persist immediately so the transcript survives any later failure.
        self.videos.set_transcript(id, &transcript.raw).await?;
        self.progress(
            video,
            batch,
            "transcription",
            55,
            format!("{} transcript segments", transcript.segments.len()),
        )
        .await;

        self.progress(video, batch, "synthesis", 60, "generating chapters")
            .await;
        let candidates = self.synthesizer.generate_chapters(&transcript, duration).await;
        self.progress(
            video,
            batch,
            "synthesis",
            75,
            format!("{} candidate chapters", candidates.len()),
        )
        .await;

        let chapters = reconcile(id, &candidates, duration);
        self.progress(
            video,
            batch,
            "reconcile",
            80,
            format!("{} chapters reconciled", chapters.len()),
        )
        .await;

        self.chapters.replace_for_video(id, chapters.clone()).await?;
        self.progress(video, batch, "persist", 90, "chapters persisted")
            .await;

        Ok(chapters)
    }

    async fn fail(
        &self,
        video_id: &str,
        video: &VideoRecord,
        batch: Option<(usize, usize)>,
        message: String,
    ) -> ProcessOutcome {
        error!("processing failed for {}: {}", video_id, message);

        if let Err(e) = self.videos.mark_error(video_id, &message).await {
            error!("could not record error state for {}: {}", video_id, e);
        }

        self.publish(ProcessingEvent::error(video_id, message.clone()), video, batch)
            .await;

        ProcessOutcome {
            video_id: video_id.to_string(),
            success: false,
            chapters: Vec::new(),
            error: Some(message),
        }
    }

    async fn progress(
        &self,
        video: &VideoRecord,
        batch: Option<(usize, usize)>,
        stage: &str,
        percent: u8,
        message: impl Into<String>,
    ) {
        self.publish(
            ProcessingEvent::progress(&video.id, stage, percent, message),
            video,
            batch,
        )
        .await;
    }

    async fn publish(
        &self,
        event: ProcessingEvent,
        video: &VideoRecord,
        batch: Option<(usize, usize)>,
    ) {
        let mut event = event.with_video_name(&video.name);
        if let Some((index, total)) = batch {
            event = event.with_batch(index, total);
        }
        self.broadcaster.publish(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SynthesisConfig;
    use crate::model::{EventKind, Transcript, TranscriptSegment, VideoStatus};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProber {
        duration: f64,
    }

    #[async_trait]
    impl MediaProber for FixedProber {
        async fn duration_seconds(&self, _path: &Path) -> Result<f64, PipelineError> {
            Ok(self.duration)
        }
    }

    struct FailingProber;

    #[async_trait]
    impl MediaProber for FailingProber {
        async fn duration_seconds(&self, path: &Path) -> Result<f64, PipelineError> {
            Err(PipelineError::Probe(format!(
                "ffprobe failed for {}",
                path.display()
            )))
        }
    }

    struct FixedTranscriber {
        calls: AtomicUsize,
    }

    impl FixedTranscriber {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Transcriber for FixedTranscriber {
        async fn transcribe(&self, _video_path: &Path) -> Result<Transcript, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let segments = vec![
                TranscriptSegment::new(0.0, 8.0, "Welcome everyone"),
                TranscriptSegment::new(8.0, 20.0, "Let's begin with the agenda"),
            ];
            Ok(Transcript {
                full_text: "Welcome everyone Let's begin with the agenda".to_string(),
                raw: crate::transcription::srt::render_segments(&segments),
                segments,
            })
        }
    }

    struct FailingTranscriber;

    #[async_trait]
    impl Transcriber for FailingTranscriber {
        async fn transcribe(&self, _video_path: &Path) -> Result<Transcript, PipelineError> {
            Err(PipelineError::Transcription("whisper crashed".to_string()))
        }
    }

    struct CountingNotifier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn notify_video_processed(&self, _video: &VideoRecord, _chapters: &[Chapter]) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn pipeline_with(
        store: Arc<MemoryStore>,
        prober: Arc<dyn MediaProber>,
        transcriber: Arc<dyn Transcriber>,
    ) -> Pipeline {
        Pipeline::new(
            store.clone(),
            store,
            prober,
            transcriber,
            Arc::new(ChapterSynthesizer::new(None, SynthesisConfig::default())),
            Arc::new(ProgressBroadcaster::new()),
            Arc::new(CountingNotifier {
                calls: AtomicUsize::new(0),
            }),
        )
    }

    async fn insert_video(store: &MemoryStore, id: &str) {
        store
            .insert(VideoRecord::new(id, PathBuf::from(format!("/u/{}.mp4", id))))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_successful_run_persists_everything() {
        let store = Arc::new(MemoryStore::new());
        insert_video(&store, "v1").await;
        let pipeline = pipeline_with(
            store.clone(),
            Arc::new(FixedProber { duration: 600.0 }),
            Arc::new(FixedTranscriber::new()),
        );

        let outcome = pipeline.process_video("v1", None).await;
        assert!(outcome.success, "outcome: {:?}", outcome);
        assert_eq!(outcome.chapters.len(), 2);

        let video = store.find("v1").await.unwrap();
        assert_eq!(video.status, VideoStatus::Completed);
        assert_eq!(video.duration_seconds, Some(600.0));
        assert!(video.transcript.unwrap().contains("Welcome everyone"));
        assert!(video.processing_completed_at.is_some());

        let chapters = store.find_by_video("v1").await.unwrap();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].start_time, 0.0);
        assert_eq!(chapters.last().unwrap().end_time, 600.0);
    }

    #[tokio::test]
    async fn test_outcome_carries_persisted_chapter_records() {
        let store = Arc::new(MemoryStore::new());
        insert_video(&store, "v1").await;
        let pipeline = pipeline_with(
            store.clone(),
            Arc::new(FixedProber { duration: 600.0 }),
            Arc::new(FixedTranscriber::new()),
        );

        let outcome = pipeline.process_video("v1", None).await;
        assert!(outcome.success);

        // the outcome holds the same records the store does, not a count
        let persisted = store.find_by_video("v1").await.unwrap();
        assert_eq!(outcome.chapters, persisted);
        assert!(outcome.chapters.iter().all(|c| c.video_id == "v1"));
        assert_eq!(outcome.chapters.last().unwrap().end_time, 600.0);
    }

    #[tokio::test]
    async fn test_stage_failure_marks_error_and_emits_event() {
        let store = Arc::new(MemoryStore::new());
        insert_video(&store, "v1").await;
        let pipeline = pipeline_with(
            store.clone(),
            Arc::new(FixedProber { duration: 600.0 }),
            Arc::new(FailingTranscriber),
        );

        let (_id, mut rx) = pipeline.broadcaster().subscribe().await;
        let outcome = pipeline.process_video("v1", None).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("whisper crashed"));

        let video = store.find("v1").await.unwrap();
        assert_eq!(video.status, VideoStatus::Error);
        assert!(video.error_message.unwrap().contains("whisper crashed"));
        assert!(store.find_by_video("v1").await.unwrap().is_empty());

        // drain events: the last one must be a terminal error
        let mut last = None;
        while let Ok(ev) = rx.try_recv() {
            last = Some(ev);
        }
        let last = last.unwrap();
        assert_eq!(last.kind, EventKind::Error);
        assert!(last.error.unwrap().contains("whisper crashed"));
    }

    #[tokio::test]
    async fn test_concurrent_request_rejected_before_any_work() {
        let store = Arc::new(MemoryStore::new());
        insert_video(&store, "v1").await;
        store.begin_processing("v1").await.unwrap();

        let transcriber = Arc::new(FixedTranscriber::new());
        let pipeline = pipeline_with(
            store.clone(),
            Arc::new(FixedProber { duration: 600.0 }),
            transcriber.clone(),
        );

        let (_id, mut rx) = pipeline.broadcaster().subscribe().await;
        let outcome = pipeline.process_video("v1", None).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("already being processed"));

        // no stage ran, no event was broadcast, status untouched
        assert_eq!(transcriber.calls.load(Ordering::SeqCst), 0);
        assert!(rx.try_recv().is_err());
        let video = store.find("v1").await.unwrap();
        assert_eq!(video.status, VideoStatus::Processing);
    }

    #[tokio::test]
    async fn test_batch_continues_past_failures() {
        let store = Arc::new(MemoryStore::new());
        insert_video(&store, "v1").await;
        // v2 never inserted, its run fails at the single-flight gate
        insert_video(&store, "v3").await;

        let pipeline = pipeline_with(
            store.clone(),
            Arc::new(FixedProber { duration: 300.0 }),
            Arc::new(FixedTranscriber::new()),
        );

        let ids = vec!["v1".to_string(), "v2".to_string(), "v3".to_string()];
        let outcomes = pipeline.process_videos(&ids).await;
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].success);
        assert!(!outcomes[1].success);
        assert!(outcomes[2].success);
    }

    #[tokio::test]
    async fn test_batch_events_carry_position() {
        let store = Arc::new(MemoryStore::new());
        insert_video(&store, "v1").await;
        insert_video(&store, "v2").await;

        let pipeline = pipeline_with(
            store.clone(),
            Arc::new(FixedProber { duration: 300.0 }),
            Arc::new(FixedTranscriber::new()),
        );

        let (_id, mut rx) = pipeline.broadcaster().subscribe().await;
        pipeline
            .process_videos(&["v1".to_string(), "v2".to_string()])
            .await;

        let mut seen_positions = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::Completed {
                seen_positions.push((ev.video_index.unwrap(), ev.total_videos.unwrap()));
            }
        }
        assert_eq!(seen_positions, vec![(1, 2), (2, 2)]);
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let store = Arc::new(MemoryStore::new());
        insert_video(&store, "v1").await;
        let pipeline = pipeline_with(
            store.clone(),
            Arc::new(FixedProber { duration: 600.0 }),
            Arc::new(FixedTranscriber::new()),
        );

        let (_id, mut rx) = pipeline.broadcaster().subscribe().await;
        pipeline.process_video("v1", None).await;

        let mut last = 0u8;
        while let Ok(ev) = rx.try_recv() {
            if let Some(p) = ev.progress {
                assert!(p >= last, "progress went backwards: {} -> {}", last, p);
                last = p;
            }
        }
        assert_eq!(last, 100);
    }

    #[tokio::test]
    async fn test_probe_failure_leaves_no_partial_state() {
        let store = Arc::new(MemoryStore::new());
        insert_video(&store, "v1").await;
        let pipeline = pipeline_with(
            store.clone(),
            Arc::new(FailingProber),
            Arc::new(FixedTranscriber::new()),
        );

        let outcome = pipeline.process_video("v1", None).await;
        assert!(!outcome.success);
        let video = store.find("v1").await.unwrap();
        assert_eq!(video.status, VideoStatus::Error);
        assert!(video.transcript.is_none());
        assert!(video.duration_seconds.is_none());
    }
}
