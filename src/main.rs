use anyhow::Result;
use clap::{Arg, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use autochapter::config::Config;
use autochapter::llm::create_llm;
use autochapter::media::{AudioExtractor, FfprobeProber};
use autochapter::model::{EventKind, VideoRecord};
use autochapter::notify::{LogNotifier, Notifier, WebhookNotifier};
use autochapter::pipeline::Pipeline;
use autochapter::store::{MemoryStore, VideoStore};
use autochapter::synthesis::ChapterSynthesizer;
use autochapter::transcription::{TranscriptionAdapter, WhisperEngine};
use autochapter::ProgressBroadcaster;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "autochapter=info,warn".into()),
        )
        .init();

    let matches = Command::new("autochapter")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Video transcription and chapter generation pipeline")
        .arg(
            Arg::new("video-dir")
                .short('d')
                .long("video-dir")
                .value_name("DIR")
                .help("Directory containing uploaded videos to process")
                .required(true),
        )
        .arg(
            Arg::new("state-dir")
                .short('s')
                .long("state-dir")
                .value_name("DIR")
                .help("Directory for per-video JSON snapshots"),
        )
        .arg(
            Arg::new("webhook")
                .long("webhook")
                .value_name("URL")
                .help("Webhook notified when a video finishes processing"),
        )
        .arg(
            Arg::new("serve")
                .long("serve")
                .value_name("PORT")
                .help("Run the HTTP/WebSocket API instead of a one-shot batch"),
        )
        .get_matches();

    let video_dir = PathBuf::from(
        matches
            .get_one::<String>("video-dir")
            .map(String::as_str)
            .unwrap_or_default(),
    );
    if !video_dir.exists() {
        error!("video directory does not exist: {}", video_dir.display());
        return Err(anyhow::anyhow!("video directory not found"));
    }

    let mut config = Config::load().unwrap_or_else(|e| {
        warn!("failed to load config, using defaults: {}", e);
        Config::default()
    });
    if let Some(dir) = matches.get_one::<String>("state-dir") {
        config.pipeline.state_dir = Some(PathBuf::from(dir));
    }
    if let Some(url) = matches.get_one::<String>("webhook") {
        config.notification.webhook_url = Some(url.clone());
    }
    config.validate()?;

    let pipeline = Arc::new(build_pipeline(&config)?);

    let video_ids = discover_videos(&video_dir, &config, pipeline.video_store()).await?;
    info!(
        "discovered {} videos under {}",
        video_ids.len(),
        video_dir.display()
    );

    if let Some(port) = matches.get_one::<String>("serve") {
        return serve(pipeline, port.parse()?).await;
    }

    if video_ids.is_empty() {
        warn!("nothing to process");
        return Ok(());
    }

    // Mirror progress into the log while the batch runs.
    let broadcaster = pipeline.broadcaster();
    let (observer_id, mut events) = broadcaster.subscribe().await;
    let log_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event.kind {
                EventKind::Error => warn!(
                    "[{}] failed: {}",
                    event.video_id,
                    event.error.unwrap_or_default()
                ),
                _ => info!(
                    "[{}] {} {}",
                    event.video_id,
                    event
                        .progress
                        .map(|p| format!("{:3}%", p))
                        .unwrap_or_default(),
                    event.message.unwrap_or_default()
                ),
            }
        }
    });

    let start_time = std::time::Instant::now();
    let outcomes = pipeline.process_videos(&video_ids).await;
    let elapsed = start_time.elapsed();

    broadcaster.unsubscribe(observer_id).await;
    log_task.abort();

    let successful = outcomes.iter().filter(|o| o.success).count();
    let chapters: usize = outcomes.iter().map(|o| o.chapters.len()).sum();
    info!("finished in {:.2}s", elapsed.as_secs_f64());
    info!(
        "{}/{} videos completed, {} chapters generated",
        successful,
        outcomes.len(),
        chapters
    );
    for outcome in outcomes.iter().filter(|o| !o.success) {
        warn!(
            "{}: {}",
            outcome.video_id,
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }

    Ok(())
}

fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let store = Arc::new(match &config.pipeline.state_dir {
        Some(dir) => MemoryStore::with_snapshot_dir(dir.clone()),
        None => MemoryStore::new(),
    });

    let llm = if config.llm.enabled {
        Some(create_llm(&config.llm.config)?)
    } else {
        None
    };

    let notifier: Arc<dyn Notifier> = match &config.notification.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(LogNotifier),
    };

    Ok(Pipeline::new(
        store.clone(),
        store,
        Arc::new(FfprobeProber),
        Arc::new(TranscriptionAdapter::new(
            AudioExtractor::new(config.audio.sample_rate),
            Arc::new(WhisperEngine::new(config.transcription.clone())),
        )),
        Arc::new(ChapterSynthesizer::new(llm, config.synthesis.clone())),
        Arc::new(ProgressBroadcaster::new()),
        notifier,
    ))
}

/// Walk the upload directory and register every video file, keyed by its
/// path relative to the root.
async fn discover_videos(
    video_dir: &PathBuf,
    config: &Config,
    store: Arc<dyn VideoStore>,
) -> Result<Vec<String>> {
    let mut ids = Vec::new();

    for entry in WalkDir::new(video_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let matched = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .map(|ext| config.pipeline.supported_extensions.contains(&ext))
            .unwrap_or(false);
        if !matched {
            continue;
        }

        let id = path
            .strip_prefix(video_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string();
        store
            .insert(VideoRecord::new(id.clone(), path.to_path_buf()))
            .await?;
        ids.push(id);
    }

    ids.sort();
    Ok(ids)
}

#[cfg(feature = "api")]
async fn serve(pipeline: Arc<Pipeline>, port: u16) -> Result<()> {
    autochapter::ApiServer::new(pipeline, port).start().await
}

#[cfg(not(feature = "api"))]
async fn serve(_pipeline: Arc<Pipeline>, _port: u16) -> Result<()> {
    Err(anyhow::anyhow!(
        "this build has no API support; rebuild with --features api"
    ))
}
