use super::*;
use crate::canvas::CanvasStore;
use crate::services::engine::{EngineConfig, spawn_engine};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Scratch directory unique to one test.
#[must_use]
pub fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("teledraw-test-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("scratch dir should be creatable");
    dir
}

/// Config rooted in `dir` with a tiny frame limit.
#[must_use]
pub fn test_config(dir: &std::path::Path) -> ServerConfig {
    ServerConfig {
        public_dir: dir.join("public"),
        state_file: dir.join("strokes.json"),
        frame_file: dir.join("frame.raw"),
        frame_max_bytes: 64,
        ..ServerConfig::default()
    }
}

/// Create an `AppState` backed by a live engine. Snapshots land in the
/// returned receiver instead of on disk.
#[must_use]
pub fn test_app_state(config: &ServerConfig) -> (AppState, mpsc::Receiver<String>) {
    let (writer, writes) = mpsc::channel(8);
    let (engine, _task) = spawn_engine(CanvasStore::default(), EngineConfig::default(), writer);
    (AppState::new(engine, config), writes)
}
