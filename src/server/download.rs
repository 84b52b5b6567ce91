//! One-shot retrieval of a finished export.

use axum::{
    extract::{Path, State},
    http::{HeaderName, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::info;

use super::AppState;
use crate::session::DownloadId;

/// Response header naming the exported channel.
pub const CHANNEL_ID_HEADER: &str = "x-channel-id";

pub async fn download(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = DownloadId::from(id);

    let Some(session) = state.exporter.sessions().get(&id).await else {
        return (StatusCode::NOT_FOUND, "Download not found or expired").into_response();
    };

    let filename = session.filename();
    info!(
        download_id = %id,
        filename = %filename,
        size_kb = session.size_kb(),
        "File downloaded"
    );

    (
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                "text/plain; charset=utf-8".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
            (
                HeaderName::from_static(CHANNEL_ID_HEADER),
                session.channel_id.clone(),
            ),
        ],
        session.content.clone(),
    )
        .into_response()
}

pub async fn missing_id() -> Response {
    (StatusCode::BAD_REQUEST, "Download ID required").into_response()
}
