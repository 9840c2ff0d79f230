//! HTTP server for external renderers and control
//!
//! A renderer (e.g. an OBS browser source) connects to the SSE stream and
//! draws each published frame; the control endpoints swap avatars and
//! restart the tracking session.

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::avatar::AvatarDescriptor;
use crate::config::HttpConfig;
use crate::output::sse;
use crate::AppState;

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

impl ApiResponse<()> {
    pub fn error(message: &str) -> Json<Self> {
        Json(Self {
            success: false,
            data: None,
            error: Some(message.to_string()),
        })
    }

    pub fn ok() -> Json<Self> {
        Json(Self {
            success: true,
            data: None,
            error: None,
        })
    }
}

/// Web server for frame output and control endpoints
pub struct WebServer {
    app_state: Arc<AppState>,
    cors_enabled: bool,
}

impl WebServer {
    pub fn new(app_state: Arc<AppState>, config: &HttpConfig) -> Self {
        Self {
            app_state,
            cors_enabled: config.cors_enabled,
        }
    }

    /// Create the router with all routes
    pub fn router(self) -> Router {
        let cors = if self.cors_enabled {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            CorsLayer::new()
        };

        Router::new()
            // Renderer surface
            .route("/avatar/state", get(avatar_state))
            .route("/avatar/stream", get(avatar_stream))
            // Control API
            .route("/api/status", get(get_status))
            .route("/api/config", get(get_config))
            .route("/api/avatar", post(swap_avatar))
            .route("/api/avatar", axum::routing::delete(unload_avatar))
            .route("/api/tracker/restart", post(restart_tracker))
            // Middleware
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.app_state)
    }
}

/// Status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub avatar: Option<String>,
    pub detected: bool,
    pub version: String,
}

/// Get current service status
async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let frame = state.current_frame().await;

    ApiResponse::success(StatusResponse {
        avatar: frame.as_ref().map(|f| f.avatar.clone()),
        detected: frame.as_ref().is_some_and(|f| f.detected),
        version: crate::VERSION.to_string(),
    })
}

/// Get the most recent avatar frame as JSON (null before the first tick)
async fn avatar_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.current_frame().await)
}

/// SSE endpoint for avatar frames
async fn avatar_stream(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    sse::create_frame_stream(state)
}

/// Get current configuration
async fn get_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let config = state.config.read().await;
    Json(config.clone())
}

/// Load a new avatar from its descriptor
async fn swap_avatar(
    State(state): State<Arc<AppState>>,
    Json(descriptor): Json<AvatarDescriptor>,
) -> impl IntoResponse {
    if let Err(e) = descriptor.validate() {
        return ApiResponse::error(&e.to_string());
    }

    tracing::info!("Avatar swap requested: '{}'", descriptor.name);
    state.swap_avatar(Some(descriptor));
    ApiResponse::ok()
}

/// Unload the active avatar
async fn unload_avatar(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.swap_avatar(None);
    ApiResponse::ok()
}

/// Restart the tracking session (e.g. after changing the capture device)
async fn restart_tracker(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.signal_tracker_restart();
    ApiResponse::ok()
}
