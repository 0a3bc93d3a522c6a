//! Input model: tools, tool state, and the pointer gesture state machine.
//!
//! `ToolState` is what the toolbar shows: the active tool, brush size,
//! color and grid visibility. Exactly one tool is active at a time and a
//! change takes effect on the next pointer event. `InputState` is the gesture
//! in progress between pointer-down and pointer-up.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::consts::{DEFAULT_BRUSH_SIZE, DEFAULT_COLOR, MAX_BRUSH_SIZE, MIN_BRUSH_SIZE};
use crate::doc::{ObjectId, ObjectKind, Point};

/// Shapes the shape tool can insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Rect,
    Circle,
    Triangle,
    Line,
    Arrow,
}

impl ShapeKind {
    /// Object kind inserted for this shape.
    #[must_use]
    pub fn object_kind(self) -> ObjectKind {
        match self {
            Self::Rect => ObjectKind::Rect,
            Self::Circle => ObjectKind::Circle,
            Self::Triangle => ObjectKind::Triangle,
            Self::Line => ObjectKind::Line,
            Self::Arrow => ObjectKind::Arrow,
        }
    }
}

/// Which tool is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    /// Pick and move objects (default).
    #[default]
    Select,
    /// Free-hand drawing.
    Pen,
    /// Remove objects under the pointer.
    Eraser,
    /// Insert a shape on click.
    Shape(ShapeKind),
    /// Insert a text block on click.
    Text,
    /// Insert the pending formula on click.
    Math,
}

/// Toolbar state owned by the local tab.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolState {
    pub tool: Tool,
    pub brush_size: f64,
    pub color: String,
    pub grid_visible: bool,
}

impl ToolState {
    /// Set the brush size, clamped to the supported range. Non-finite input is ignored.
    pub fn set_brush_size(&mut self, size: f64) {
        if size.is_finite() {
            self.brush_size = size.clamp(MIN_BRUSH_SIZE, MAX_BRUSH_SIZE);
        }
    }
}

impl Default for ToolState {
    fn default() -> Self {
        Self { tool: Tool::default(), brush_size: DEFAULT_BRUSH_SIZE, color: DEFAULT_COLOR.to_owned(), grid_visible: false }
    }
}

/// Pointer button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left mouse button, pen tip or single-finger touch.
    Primary,
    Middle,
    Secondary,
}

/// The gesture being tracked between pointer-down and pointer-up.
#[derive(Debug, Clone, Default)]
pub enum InputState {
    /// No gesture in progress.
    #[default]
    Idle,
    /// Pen stroke being collected.
    Drawing {
        points: Vec<Point>,
    },
    /// Eraser held down; `removed` counts objects erased so far.
    Erasing {
        removed: usize,
    },
    /// Select tool dragging an object.
    Dragging {
        id: ObjectId,
        last: Point,
        moved: bool,
    },
}

impl InputState {
    /// Points of the stroke in progress, if the pen is down.
    #[must_use]
    pub fn stroke_preview(&self) -> Option<&[Point]> {
        match self {
            Self::Drawing { points } => Some(points.as_slice()),
            _ => None,
        }
    }
}
