//! HTTP server implementation for the API

use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::pipeline::Pipeline;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

/// Configure and start the HTTP server
pub async fn start_http_server(pipeline: Arc<Pipeline>, port: u16) -> Result<()> {
    info!("starting HTTP server on port {}", port);

    let app_state = AppState { pipeline };

    // Allow browser access from the upload UI
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/api/videos", get(list_videos_handler))
        .route("/api/videos/:id", get(video_handler))
        .route("/api/videos/:id/chapters", get(chapters_handler))
        .route("/api/videos/:id/process", post(process_video_handler))
        .route("/api/videos/process", post(process_batch_handler))
        .route("/ws", get(websocket_handler))
        .with_state(app_state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        );

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("API server listening on http://0.0.0.0:{}", port);
    info!("WebSocket endpoint at ws://0.0.0.0:{}/ws", port);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "autochapter",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn list_videos_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.pipeline.video_store().list().await {
        Ok(videos) => (StatusCode::OK, Json(serde_json::json!(videos))).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

async fn video_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.pipeline.video_store().find(&id).await {
        Ok(video) => (StatusCode::OK, Json(serde_json::json!(video))).into_response(),
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

async fn chapters_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.pipeline.chapter_store().find_by_video(&id).await {
        Ok(chapters) => (StatusCode::OK, Json(serde_json::json!(chapters))).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

/// Kick off processing for one video. Returns immediately; progress is
/// observable over the WebSocket or by polling the video endpoint. A video
/// already in flight is reported as a conflict.
async fn process_video_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    // Probe the single-flight gate synchronously so the caller gets a
    // meaningful status code instead of a fire-and-forget 202.
    match state.pipeline.video_store().find(&id).await {
        Ok(video) if video.status == crate::model::VideoStatus::Processing => {
            return (
                StatusCode::CONFLICT,
                Json(serde_json::json!({"error": format!("video {} is already being processed", id)})),
            )
                .into_response();
        }
        Ok(_) => {}
        Err(e) => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response();
        }
    }

    let pipeline = Arc::clone(&state.pipeline);
    let video_id = id.clone();
    tokio::spawn(async move {
        let outcome = pipeline.process_video(&video_id, None).await;
        if !outcome.success {
            warn!(
                "background processing of {} failed: {}",
                video_id,
                outcome.error.unwrap_or_default()
            );
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({"videoId": id, "status": "processing"})),
    )
        .into_response()
}

#[derive(Deserialize)]
struct BatchRequest {
    video_ids: Vec<String>,
}

/// Kick off sequential processing for a batch of videos.
async fn process_batch_handler(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> impl IntoResponse {
    if request.video_ids.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "video_ids must not be empty"})),
        )
            .into_response();
    }

    let pipeline = Arc::clone(&state.pipeline);
    let ids = request.video_ids.clone();
    tokio::spawn(async move {
        pipeline.process_videos(&ids).await;
    });

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "videoIds": request.video_ids,
            "status": "processing",
        })),
    )
        .into_response()
}

/// WebSocket handler for live progress updates
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Forward broadcast events to one WebSocket client until either side
/// disconnects.
async fn handle_websocket(mut socket: WebSocket, state: AppState) {
    let broadcaster = state.pipeline.broadcaster();
    let (observer_id, mut events) = broadcaster.subscribe().await;
    info!("WebSocket client connected as observer {}", observer_id);

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let payload = match serde_json::to_string(&event) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!("failed to serialize event: {}", e);
                        continue;
                    }
                };
                if socket.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            message = socket.recv() => {
                match message {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    broadcaster.unsubscribe(observer_id).await;
    info!("WebSocket observer {} disconnected", observer_id);
}
