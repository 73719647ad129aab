//! HTTP and WebSocket surface.

pub mod error;
pub mod realtime;
pub mod tasks;
pub mod voice;

use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::domain::models::ServerConfig;
use crate::services::{TaskDispatcher, VoiceCommandService};

pub use error::{ApiError, ApiResult, ErrorResponse};

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Task pipeline.
    pub dispatcher: Arc<TaskDispatcher>,
    /// Voice command handling over the same pipeline.
    pub voice: Arc<VoiceCommandService>,
}

impl AppState {
    /// State around `dispatcher`.
    pub fn new(dispatcher: Arc<TaskDispatcher>) -> Self {
        let voice = Arc::new(VoiceCommandService::new(Arc::clone(&dispatcher)));
        Self { dispatcher, voice }
    }
}

/// Execution backend part of `/health`.
#[derive(Debug, Serialize)]
pub struct ExecutionHealth {
    /// `mock` or `remote`.
    pub mode: &'static str,
    /// Whether the backend answered its health check.
    pub healthy: bool,
}

/// Body of `/health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `ok` while the server runs.
    pub status: &'static str,
    /// Execution backend health.
    pub execution: ExecutionHealth,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let bridge = state.dispatcher.bridge();
    Json(HealthResponse {
        status: "ok",
        execution: ExecutionHealth {
            mode: bridge.mode(),
            healthy: bridge.health_check().await,
        },
    })
}

/// Build the router with every route and the tracing (and optionally CORS) layers.
pub fn build_router(state: AppState, enable_cors: bool) -> Router {
    let app = Router::new()
        .route("/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route("/tasks/{id}", get(tasks::get_task).delete(tasks::cancel_task))
        .route("/tasks/{id}/pr", post(tasks::update_pr_state))
        .route("/voice/parse", post(voice::parse_command))
        .route("/voice/command", post(voice::run_command))
        .route("/ws", get(realtime::ws_upgrade))
        .route("/ws/health", get(realtime::ws_health))
        .route("/health", get(health_check))
        .with_state(state);

    if enable_cors {
        app.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
            .layer(TraceLayer::new_for_http())
    } else {
        app.layer(TraceLayer::new_for_http())
    }
}

/// HTTP/WebSocket server.
pub struct HttpServer {
    config: ServerConfig,
    state: AppState,
}

impl HttpServer {
    /// Server for `state` bound per `config`.
    pub fn new(state: AppState, config: ServerConfig) -> Self {
        Self { config, state }
    }

    /// Router the server will run.
    pub fn router(&self) -> Router {
        build_router(self.state.clone(), self.config.enable_cors)
    }

    /// Start the server with a shutdown signal.
    pub async fn serve_with_shutdown<F>(
        self,
        shutdown: F,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;
        let router = self.router();

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(address = %listener.local_addr()?, "cadence server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}
