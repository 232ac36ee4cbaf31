//! Real-time shared canvas server.
//!
//! Drawing clients ("browsers") and rendering clients ("devices") connect
//! over websockets and share one canvas: a background color plus an ordered
//! list of strokes. The canvas survives restarts through a debounced JSON
//! record on disk.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`canvas`] | Canvas state and its mutations |
//! | [`message`] | Wire messages and inbound parsing |
//! | [`services`] | Engine loop, registry, catch-up, persistence |
//! | [`routes`] | Axum router: websocket, `/frame.raw`, static files |
//! | [`config`] | Environment configuration |
//! | [`state`] | Shared handler state |

pub mod canvas;
pub mod config;
pub mod message;
pub mod routes;
pub mod services;
pub mod state;
