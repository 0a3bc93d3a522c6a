#![allow(clippy::float_cmp)]

use super::*;

#[test]
fn tool_default_is_select() {
    assert_eq!(Tool::default(), Tool::Select);
}

#[test]
fn shape_kinds_map_to_object_kinds() {
    assert_eq!(ShapeKind::Rect.object_kind(), ObjectKind::Rect);
    assert_eq!(ShapeKind::Circle.object_kind(), ObjectKind::Circle);
    assert_eq!(ShapeKind::Triangle.object_kind(), ObjectKind::Triangle);
    assert_eq!(ShapeKind::Line.object_kind(), ObjectKind::Line);
    assert_eq!(ShapeKind::Arrow.object_kind(), ObjectKind::Arrow);
}

#[test]
fn tool_state_defaults() {
    let state = ToolState::default();
    assert_eq!(state.tool, Tool::Select);
    assert_eq!(state.brush_size, DEFAULT_BRUSH_SIZE);
    assert_eq!(state.color, DEFAULT_COLOR);
    assert!(!state.grid_visible);
}

#[test]
fn brush_size_is_clamped() {
    let mut state = ToolState::default();
    state.set_brush_size(0.0);
    assert_eq!(state.brush_size, MIN_BRUSH_SIZE);
    state.set_brush_size(500.0);
    assert_eq!(state.brush_size, MAX_BRUSH_SIZE);
    state.set_brush_size(12.0);
    assert_eq!(state.brush_size, 12.0);
}

#[test]
fn brush_size_ignores_nan() {
    let mut state = ToolState::default();
    state.set_brush_size(f64::NAN);
    assert_eq!(state.brush_size, DEFAULT_BRUSH_SIZE);
}

#[test]
fn input_state_default_is_idle() {
    assert!(matches!(InputState::default(), InputState::Idle));
}

#[test]
fn stroke_preview_only_while_drawing() {
    let drawing = InputState::Drawing { points: vec![Point::new(1.0, 1.0)] };
    assert_eq!(drawing.stroke_preview(), Some(&[Point::new(1.0, 1.0)][..]));
    assert!(InputState::Erasing { removed: 0 }.stroke_preview().is_none());
}
