//! Optional HTTP/WebSocket surface for the processing service.
//!
//! Compiled behind the `api` feature. REST endpoints expose video and
//! chapter state, POST endpoints enqueue processing runs, and the
//! WebSocket endpoint streams live progress events to browser clients.

use crate::pipeline::Pipeline;
use anyhow::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub mod server;

/// API server handling REST requests and WebSocket connections.
pub struct ApiServer {
    pipeline: Arc<Pipeline>,
    port: u16,
}

impl ApiServer {
    pub fn new(pipeline: Arc<Pipeline>, port: u16) -> Self {
        Self { pipeline, port }
    }

    /// Start the API server in the background.
    pub fn start_background(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move { self.start().await })
    }

    pub async fn start(self) -> Result<()> {
        server::start_http_server(self.pipeline, self.port).await
    }
}
