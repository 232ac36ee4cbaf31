//! Durable canvas record: storage backend and on-disk format.
//!
//! DESIGN
//! ======
//! `CanvasStorage` is the seam between the engine and the disk: it moves an
//! already-serialized payload in and out and knows nothing about canvases.
//! Encoding and decoding live here as plain functions so the loader and the
//! persistence writer share one definition of the record.
//!
//! FORMAT
//! ======
//! Current: `{"backgroundColor": "#rrggbb", "strokes": [{"type":"stroke", ...}]}`.
//! Legacy: a bare array of strokes, implying the default background.
//! Decoding is as forgiving as the loader needs: a falsy background or a
//! non-array `strokes` falls back to defaults, and individual strokes without
//! usable points are skipped.

use std::io::ErrorKind;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::canvas::{CanvasState, DEFAULT_BACKGROUND, Stroke};
use crate::message::parse_stroke_fields;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("state record is not valid json: {0}")]
    Json(#[source] serde_json::Error),
    #[error("state record has unexpected shape ({found})")]
    UnexpectedShape { found: &'static str },
}

// =============================================================================
// BACKEND
// =============================================================================

/// Where the canvas record lives.
#[async_trait::async_trait]
pub trait CanvasStorage: Send + Sync {
    /// Read the stored payload. `Ok(None)` means nothing was ever saved.
    async fn load(&self) -> Result<Option<String>, StorageError>;

    /// Replace the stored payload.
    async fn save(&self, payload: &str) -> Result<(), StorageError>;
}

/// Single JSON file on local disk.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(ToOwned::to_owned).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait::async_trait]
impl CanvasStorage for FileStorage {
    async fn load(&self) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write to a sibling temp file and rename it over the record, so a crash
    /// mid-write leaves the previous record intact.
    async fn save(&self, payload: &str) -> Result<(), StorageError> {
        let temp = self.temp_path();
        tokio::fs::write(&temp, payload).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}

// =============================================================================
// FORMAT
// =============================================================================

/// Which record layout a payload used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Legacy,
    Current,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Record<'a> {
    background_color: &'a str,
    #[serde(serialize_with = "tagged_strokes")]
    strokes: &'a [Stroke],
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum TaggedStroke<'a> {
    Stroke(&'a Stroke),
}

fn tagged_strokes<S: serde::Serializer>(strokes: &&[Stroke], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(strokes.iter().map(TaggedStroke::Stroke))
}

/// Serialize a canvas in the current record format.
///
/// # Errors
///
/// Returns the serde error if a stroke cannot be represented as JSON.
pub fn encode_state(state: &CanvasState) -> Result<String, serde_json::Error> {
    serde_json::to_string(&Record { background_color: &state.background_color, strokes: &state.strokes })
}

/// Parse a stored payload in either record format.
///
/// # Errors
///
/// Returns `LoadError::Json` for text that is not JSON and
/// `LoadError::UnexpectedShape` for JSON that is neither an array nor an object.
pub fn decode_state(raw: &str) -> Result<(CanvasState, RecordFormat), LoadError> {
    let value: Value = serde_json::from_str(raw).map_err(LoadError::Json)?;
    match value {
        Value::Array(items) => Ok((
            CanvasState { background_color: DEFAULT_BACKGROUND.to_owned(), strokes: decode_strokes(items) },
            RecordFormat::Legacy,
        )),
        Value::Object(mut fields) => {
            let background_color = fields
                .get("backgroundColor")
                .and_then(Value::as_str)
                .filter(|color| !color.is_empty())
                .unwrap_or(DEFAULT_BACKGROUND)
                .to_owned();
            let strokes = match fields.remove("strokes") {
                Some(Value::Array(items)) => decode_strokes(items),
                _ => Vec::new(),
            };
            Ok((CanvasState { background_color, strokes }, RecordFormat::Current))
        }
        other => Err(LoadError::UnexpectedShape { found: json_kind(&other) }),
    }
}

fn decode_strokes(items: Vec<Value>) -> Vec<Stroke> {
    let total = items.len();
    let strokes: Vec<Stroke> = items
        .into_iter()
        .filter_map(|item| match parse_stroke_fields(item) {
            Ok(input) => Some(input.normalize()),
            Err(e) => {
                warn!(error = %e, "storage: skipping unreadable stroke");
                None
            }
        })
        .collect();
    if strokes.len() < total {
        warn!(kept = strokes.len(), total, "storage: some stored strokes were unreadable");
    }
    strokes
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;

#[cfg(test)]
#[path = "storage_helpers_test.rs"]
pub(crate) mod test_helpers;
