//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds no canvas data itself: the canvas and the connections live inside
//! the engine task, and handlers reach it through the cloneable
//! `EngineHandle`. The remaining fields are the file paths the plain HTTP
//! handlers need.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::services::engine::EngineHandle;

#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
    /// Latest device frame, read and written by `/frame.raw`.
    pub frame_file: Arc<PathBuf>,
    /// Page served at `/` for plain (non-upgrade) requests.
    pub index_file: Arc<PathBuf>,
}

impl AppState {
    #[must_use]
    pub fn new(engine: EngineHandle, config: &ServerConfig) -> Self {
        Self {
            engine,
            frame_file: Arc::new(config.frame_file.clone()),
            index_file: Arc::new(config.index_file()),
        }
    }
}

#[cfg(test)]
#[path = "state_helpers_test.rs"]
pub mod test_helpers;
