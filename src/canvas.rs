//! Canvas state store: the single authoritative canvas.
//!
//! DESIGN
//! ======
//! One `CanvasStore` is owned by the engine. It holds the background color and
//! the ordered stroke list and nothing else: no I/O, no locking. Mutations
//! never fail. Missing or falsy stroke fields are replaced with defaults
//! instead of being rejected.
//!
//! Stroke payloads are kept as the client sent them. Points are JSON objects
//! the engine never looks inside, and a truthy `color` or `width` is stored
//! verbatim, so a stroke goes back out with the same fields and numbers it
//! came in with.
//!
//! INVARIANTS
//! ==========
//! - `strokes` only grows between fills.
//! - A fill replaces the background and empties `strokes` in one step.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// DEFAULTS
// =============================================================================

/// Background used for a fresh canvas, a legacy record, or a fill without color.
pub const DEFAULT_BACKGROUND: &str = "#000000";

/// Stroke color used when a client omits it.
pub const DEFAULT_STROKE_COLOR: &str = "#ffffff";

/// Stroke width used when a client omits it or sends a falsy value.
pub const DEFAULT_STROKE_WIDTH: u64 = 2;

// =============================================================================
// TYPES
// =============================================================================

/// Canvas coordinate, usually `{"x": .., "y": ..}`. Any object is accepted
/// and passed through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Point(pub Map<String, Value>);

/// One line segment. Immutable once appended to the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub from: Point,
    pub to: Point,
    pub color: Value,
    pub width: Value,
}

/// A stroke as a client sent it, before defaults are applied. Absent fields
/// are `Value::Null`.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeInput {
    pub from: Point,
    pub to: Point,
    pub color: Value,
    pub width: Value,
}

impl StrokeInput {
    /// Apply the fallback color and width to falsy fields. Truthy values are
    /// kept as-is, whatever their JSON type.
    #[must_use]
    pub fn normalize(self) -> Stroke {
        let color = or_default(self.color, || Value::from(DEFAULT_STROKE_COLOR));
        let width = or_default(self.width, || Value::from(DEFAULT_STROKE_WIDTH));
        Stroke { from: self.from, to: self.to, color, width }
    }
}

/// Whether a client value counts as provided: anything except `null`,
/// `false`, zero and the empty string.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn or_default(value: Value, default: impl FnOnce() -> Value) -> Value {
    if is_truthy(&value) { value } else { default() }
}

/// Background plus strokes in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasState {
    pub background_color: String,
    pub strokes: Vec<Stroke>,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self { background_color: DEFAULT_BACKGROUND.to_owned(), strokes: Vec::new() }
    }
}

// =============================================================================
// STORE
// =============================================================================

#[derive(Debug, Default)]
pub struct CanvasStore {
    state: CanvasState,
}

impl CanvasStore {
    /// Normalize and append a stroke. Returns the stored stroke for broadcast.
    pub fn apply_stroke(&mut self, input: StrokeInput) -> Stroke {
        let stroke = input.normalize();
        self.state.strokes.push(stroke.clone());
        stroke
    }

    /// Replace the background and drop every stroke. Returns the color applied.
    pub fn apply_fill(&mut self, color: Option<String>) -> String {
        let color = color
            .filter(|color| !color.is_empty())
            .unwrap_or_else(|| DEFAULT_BACKGROUND.to_owned());
        self.state.background_color.clone_from(&color);
        self.state.strokes.clear();
        color
    }

    /// Detached copy of the current state. Saves serialize this copy.
    #[must_use]
    pub fn snapshot(&self) -> CanvasState {
        self.state.clone()
    }

    /// Swap in a whole state. Only the startup loader calls this, before the
    /// store is handed to the engine.
    pub fn replace(&mut self, state: CanvasState) {
        self.state = state;
    }

    #[must_use]
    pub fn background_color(&self) -> &str {
        &self.state.background_color
    }

    #[must_use]
    pub fn strokes(&self) -> &[Stroke] {
        &self.state.strokes
    }
}

#[cfg(test)]
#[path = "canvas_test.rs"]
mod tests;

#[cfg(test)]
#[path = "canvas_helpers_test.rs"]
pub(crate) mod test_helpers;
