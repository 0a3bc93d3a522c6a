//! Shared defaults for the whiteboard crate.

// ── Tool state ──────────────────────────────────────────────────

/// Brush width in surface units for a fresh tool state.
pub const DEFAULT_BRUSH_SIZE: f64 = 5.0;

/// Smallest brush the tool state accepts.
pub const MIN_BRUSH_SIZE: f64 = 1.0;

/// Largest brush the tool state accepts.
pub const MAX_BRUSH_SIZE: f64 = 100.0;

/// Stroke color for a fresh tool state.
pub const DEFAULT_COLOR: &str = "#000000";

// ── Objects ─────────────────────────────────────────────────────

/// Edge length of a shape inserted by a single click.
pub const DEFAULT_SHAPE_SIZE: f64 = 100.0;

/// Font size for inserted text and formula blocks.
pub const DEFAULT_FONT_SIZE: f64 = 20.0;

/// Content of a text object placed by the text tool.
pub const TEXT_PLACEHOLDER: &str = "Text";

// ── Hit-testing ─────────────────────────────────────────────────

/// Extra distance around thin geometry that still counts as a hit.
pub const HIT_SLOP: f64 = 4.0;

// ── Surface ─────────────────────────────────────────────────────

/// Distance between grid overlay lines.
pub const DEFAULT_GRID_SPACING: f64 = 20.0;

/// History entries kept before the oldest is dropped.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;
