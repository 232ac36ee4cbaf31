//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router serves everything: the websocket that carries the drawing
//! protocol, the `/frame.raw` exchange devices poll, a health probe, and the
//! static drawing app from `PUBLIC_DIR`. Older clients open their websocket
//! on `/`, so `/` answers an upgrade request with a socket and any other
//! request with `index.html`.

pub mod frame;
pub mod ws;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::ServerConfig;
use crate::state::AppState;

/// Build the full application router.
pub fn app(state: AppState, config: &ServerConfig) -> Router {
    let static_files = ServeDir::new(&config.public_dir).append_index_html_on_directories(true);

    Router::new()
        .route("/", get(root))
        .route("/ws", get(ws::handle_ws))
        .route(
            "/frame.raw",
            get(frame::get_frame)
                .post(frame::post_frame)
                .layer(DefaultBodyLimit::max(config.frame_max_bytes)),
        )
        .route("/healthz", get(healthz))
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root(
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match upgrade {
        Ok(upgrade) => ws::upgrade(state, upgrade),
        Err(_) => index(&state).await,
    }
}

async fn index(state: &AppState) -> Response {
    match tokio::fs::read_to_string(state.index_file.as_path()).await {
        Ok(page) => Html(page).into_response(),
        Err(e) => {
            warn!(error = %e, path = %state.index_file.display(), "http: index page unavailable");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
