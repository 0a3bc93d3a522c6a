//! Grid overlay geometry.
//!
//! The grid is a guide for the person drawing. It is recomputed whenever
//! visibility toggles, the viewport changes, or the surface is cleared, and
//! it is never hit-tested or serialized.

use crate::doc::Point;

/// One guide line, end to end across the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLine {
    pub from: Point,
    pub to: Point,
}

/// Vertical then horizontal lines every `spacing` units inside `width` x `height`.
///
/// Degenerate input (non-positive or non-finite spacing or size) yields no lines.
#[must_use]
pub fn grid_lines(width: f64, height: f64, spacing: f64) -> Vec<GridLine> {
    let valid = |v: f64| v.is_finite() && v > 0.0;
    if !valid(width) || !valid(height) || !valid(spacing) {
        return Vec::new();
    }

    let mut lines = Vec::new();
    let mut x = spacing;
    while x < width {
        lines.push(GridLine { from: Point::new(x, 0.0), to: Point::new(x, height) });
        x += spacing;
    }
    let mut y = spacing;
    while y < height {
        lines.push(GridLine { from: Point::new(0.0, y), to: Point::new(width, y) });
        y += spacing;
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_cover_both_axes() {
        let lines = grid_lines(100.0, 50.0, 20.0);
        // x = 20, 40, 60, 80 and y = 20, 40
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], GridLine { from: Point::new(20.0, 0.0), to: Point::new(20.0, 50.0) });
        assert_eq!(lines[5], GridLine { from: Point::new(0.0, 40.0), to: Point::new(100.0, 40.0) });
    }

    #[test]
    fn degenerate_input_yields_nothing() {
        assert!(grid_lines(0.0, 100.0, 10.0).is_empty());
        assert!(grid_lines(100.0, 100.0, 0.0).is_empty());
        assert!(grid_lines(100.0, 100.0, f64::NAN).is_empty());
        assert!(grid_lines(100.0, -5.0, 10.0).is_empty());
    }
}
