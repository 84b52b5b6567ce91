//! HTTP surface: WebSocket push channel, download endpoint, health check.

pub mod download;
pub mod ws;

use std::sync::Arc;

use axum::{
    Json, Router,
    http::{HeaderName, HeaderValue, Method, header},
    response::IntoResponse,
    routing::get,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::export::Exporter;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub exporter: Exporter,
    /// Browser origins allowed to connect; requests without an Origin always pass.
    pub allowed_origins: Arc<Vec<String>>,
}

impl AppState {
    pub fn new(exporter: Exporter, allowed_origins: Vec<String>) -> Self {
        Self {
            exporter,
            allowed_origins: Arc::new(allowed_origins),
        }
    }

    pub fn is_origin_allowed(&self, origin: Option<&str>) -> bool {
        match origin {
            None | Some("") => true,
            Some(origin) => self.allowed_origins.iter().any(|o| o == origin),
        }
    }
}

/// Build the Axum router with the export WebSocket and download routes.
pub fn router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.allowed_origins);

    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/download/", get(download::missing_id).layer(cors.clone()))
        .route("/download/{id}", get(download::download).layer(cors))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "discord-export"
    }))
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_headers([
            header::CONTENT_DISPOSITION,
            HeaderName::from_static(download::CHANNEL_ID_HEADER),
        ])
}
