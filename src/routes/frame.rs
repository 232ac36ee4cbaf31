//! `/frame.raw`: the latest rendered frame for devices.
//!
//! A producer POSTs an opaque binary buffer and devices GET it back. The body
//! is written to `FRAME_FILE` as-is; nothing here touches the canvas engine.
//! Upload size is capped by the router's body limit.

use std::io::ErrorKind;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{error, info, warn};

use crate::state::AppState;

const OCTET_STREAM: &str = "application/octet-stream";

/// `GET /frame.raw`: 404 until a frame has been uploaded.
pub async fn get_frame(State(state): State<AppState>) -> Response {
    match tokio::fs::read(state.frame_file.as_path()).await {
        Ok(bytes) => {
            info!(bytes = bytes.len(), "frame: GET /frame.raw");
            ([(CONTENT_TYPE, OCTET_STREAM)], bytes).into_response()
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("frame: GET /frame.raw 404 (no file)");
            StatusCode::NOT_FOUND.into_response()
        }
        Err(e) => {
            error!(error = %e, "frame: failed to read frame file");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `POST /frame.raw`: replace the stored frame with an octet-stream body.
pub async fn post_frame(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    if !is_octet_stream(&headers) {
        warn!("frame: upload without application/octet-stream content type");
        return StatusCode::BAD_REQUEST;
    }
    if body.is_empty() {
        warn!("frame: empty upload");
        return StatusCode::BAD_REQUEST;
    }

    match tokio::fs::write(state.frame_file.as_path(), &body).await {
        Ok(()) => {
            info!(bytes = body.len(), "frame: stored upload");
            StatusCode::OK
        }
        Err(e) => {
            error!(error = %e, "frame: failed to store upload");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn is_octet_stream(headers: &HeaderMap) -> bool {
    let Some(value) = headers.get(CONTENT_TYPE) else {
        return false;
    };
    let Ok(value) = value.to_str() else {
        return false;
    };
    value
        .split(';')
        .next()
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(OCTET_STREAM))
}

#[cfg(test)]
#[path = "frame_test.rs"]
mod tests;
