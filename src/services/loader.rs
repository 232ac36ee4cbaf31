//! Startup state loader.
//!
//! Runs once before the listener binds and fills the store the engine will
//! own. Every failure mode ends in a usable canvas: a missing record is a
//! fresh canvas, and an unreadable or malformed record is logged and replaced
//! by the empty default.

use tracing::{error, info, warn};

use crate::canvas::{CanvasState, CanvasStore};
use crate::services::storage::{CanvasStorage, LoadError, RecordFormat, decode_state};

/// Load the canvas from `storage` into `store`, falling back to the empty
/// default.
pub async fn load_state(storage: &dyn CanvasStorage, store: &mut CanvasStore) {
    store.replace(read_state(storage).await);
}

async fn read_state(storage: &dyn CanvasStorage) -> CanvasState {
    match try_load_state(storage).await {
        Ok(Some((state, format))) => {
            match format {
                RecordFormat::Legacy => {
                    info!(strokes = state.strokes.len(), "loader: loaded legacy state");
                }
                RecordFormat::Current => {
                    info!(
                        background = %state.background_color,
                        strokes = state.strokes.len(),
                        "loader: loaded state"
                    );
                }
            }
            state
        }
        Ok(None) => {
            info!("loader: no state record, starting with empty canvas");
            CanvasState::default()
        }
        Err(LoadError::Storage(e)) => {
            error!(error = %e, "loader: failed to read state record, starting fresh");
            CanvasState::default()
        }
        Err(e) => {
            warn!(error = %e, "loader: state record unusable, starting fresh");
            CanvasState::default()
        }
    }
}

async fn try_load_state(storage: &dyn CanvasStorage) -> Result<Option<(CanvasState, RecordFormat)>, LoadError> {
    let Some(raw) = storage.load().await? else {
        return Ok(None);
    };
    decode_state(&raw).map(Some)
}

#[cfg(test)]
#[path = "loader_test.rs"]
mod tests;
