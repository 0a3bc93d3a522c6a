//! Drawing engine: tool dispatch, document mutation and undo/redo.
//!
//! DESIGN
//! ======
//! `EngineCore` holds every piece of surface state and all the logic that
//! does not need a host surface, so it is tested directly. `Engine` wraps it
//! together with the host's [`RenderTarget`], presents a [`Scene`] after each
//! operation, and refuses work once the target has been released.
//!
//! Every committed mutation follows the same path: capture a snapshot, push
//! it onto the history (dropping the redo tail) and hand a [`Change`] back to
//! the caller, who forwards it to the whiteboard channel. Gestures in progress
//! (a stroke being drawn, an object being dragged, the eraser held down)
//! commit once, on pointer-up.
//!
//! ERROR HANDLING
//! ==============
//! Formula render failures never surface: the raw markup is inserted as a
//! text object instead. Everything else returns [`SurfaceError`].

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use std::mem;

use serde_json::json;
use tracing::{debug, warn};

use crate::consts::{DEFAULT_BRUSH_SIZE, DEFAULT_COLOR, DEFAULT_FONT_SIZE, DEFAULT_GRID_SPACING, DEFAULT_HISTORY_LIMIT, DEFAULT_SHAPE_SIZE, TEXT_PLACEHOLDER};
use crate::doc::{DocStore, DrawObject, ObjectId, ObjectKind, Point};
use crate::error::SurfaceError;
use crate::formula::{FormulaRenderer, TexRenderer};
use crate::grid::{GridLine, grid_lines};
use crate::hit::{hit_test, hits_within};
use crate::history::History;
use crate::input::{Button, InputState, ShapeKind, Tool, ToolState};
use crate::snapshot::Snapshot;

/// Client-side knobs for a fresh engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// History entries kept; `0` keeps everything.
    pub history_limit: usize,
    pub grid_spacing: f64,
    pub brush_size: f64,
    pub color: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            grid_spacing: DEFAULT_GRID_SPACING,
            brush_size: DEFAULT_BRUSH_SIZE,
            color: DEFAULT_COLOR.to_owned(),
        }
    }
}

/// A committed change the host should forward to collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// A local mutation produced this snapshot.
    Snapshot(Snapshot),
    /// The surface was cleared.
    Cleared,
    /// Undo moved the cursor; carries the snapshot now shown.
    Undone(Snapshot),
    /// Redo moved the cursor; carries the snapshot now shown.
    Redone(Snapshot),
}

/// What a render target needs to draw one frame.
#[derive(Debug)]
pub struct Scene<'a> {
    /// Objects in draw order.
    pub objects: Vec<&'a DrawObject>,
    /// Grid overlay; empty when hidden.
    pub grid: &'a [GridLine],
    /// Stroke being drawn, not yet committed.
    pub preview: Option<&'a [Point]>,
    pub tools: &'a ToolState,
}

/// Host drawing surface.
pub trait RenderTarget {
    /// Draw the scene.
    fn present(&mut self, scene: &Scene<'_>);

    /// Drop host resources. Called exactly once.
    fn release(&mut self);
}

// =============================================================================
// CORE
// =============================================================================

/// Surface state and logic, independent of any host surface.
pub struct EngineCore {
    doc: DocStore,
    tools: ToolState,
    input: InputState,
    history: History,
    grid: Vec<GridLine>,
    grid_spacing: f64,
    viewport: (f64, f64),
    renderer: Box<dyn FormulaRenderer>,
    pending_formula: Option<String>,
}

impl Default for EngineCore {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl EngineCore {
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        let mut tools = ToolState { color: config.color.clone(), ..ToolState::default() };
        tools.set_brush_size(config.brush_size);
        Self {
            doc: DocStore::new(),
            tools,
            input: InputState::Idle,
            history: History::with_limit(config.history_limit),
            grid: Vec::new(),
            grid_spacing: config.grid_spacing,
            viewport: (0.0, 0.0),
            renderer: Box::new(TexRenderer),
            pending_formula: None,
        }
    }

    /// Replace the formula renderer.
    #[must_use]
    pub fn with_renderer(mut self, renderer: Box<dyn FormulaRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    // --- Insertion ---

    /// Insert a shape of the default size with its top-left corner at `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::Snapshot`] if the surface cannot be captured.
    pub fn add_shape(&mut self, kind: ShapeKind, x: f64, y: f64) -> Result<Change, SurfaceError> {
        let obj = DrawObject::new(kind.object_kind(), x, y, DEFAULT_SHAPE_SIZE, DEFAULT_SHAPE_SIZE).with_props(json!({
            "stroke": self.tools.color,
            "stroke_width": self.tools.brush_size,
            "fill": "",
        }));
        self.doc.insert_on_top(obj);
        self.commit()
    }

    /// Insert a text block at `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::Snapshot`] if the surface cannot be captured.
    pub fn add_text(&mut self, text: &str, x: f64, y: f64) -> Result<Change, SurfaceError> {
        let obj = text_block(ObjectKind::Text, text, x, y).with_props(json!({
            "text": text,
            "fill": self.tools.color,
            "font_size": DEFAULT_FONT_SIZE,
        }));
        self.doc.insert_on_top(obj);
        self.commit()
    }

    /// Render `markup` and insert it at `(x, y)`. A render failure inserts the
    /// raw markup as plain text.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::EmptyMarkup`] for blank markup.
    pub fn add_formula(&mut self, markup: &str, x: f64, y: f64) -> Result<Change, SurfaceError> {
        if markup.trim().is_empty() {
            return Err(SurfaceError::EmptyMarkup);
        }
        match self.renderer.render(markup) {
            Ok(rendered) => {
                let obj = text_block(ObjectKind::Formula, &rendered.text, x, y).with_props(json!({
                    "markup": rendered.markup,
                    "text": rendered.text,
                    "fill": self.tools.color,
                    "font_size": DEFAULT_FONT_SIZE,
                }));
                self.doc.insert_on_top(obj);
                self.commit()
            }
            Err(e) => {
                warn!(error = %e, markup, "formula render failed; inserting markup as text");
                self.add_text(markup, x, y)
            }
        }
    }

    /// Remove one object.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::UnknownObject`] if `id` is not on the surface.
    pub fn erase(&mut self, id: &ObjectId) -> Result<Change, SurfaceError> {
        if self.doc.remove(id).is_none() {
            return Err(SurfaceError::UnknownObject(*id));
        }
        self.commit()
    }

    // --- Pointer input ---

    /// Start a gesture, or act immediately for click tools.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::Snapshot`] if a committed change cannot be captured.
    pub fn pointer_down(&mut self, pt: Point, button: Button) -> Result<Vec<Change>, SurfaceError> {
        if button != Button::Primary {
            return Ok(Vec::new());
        }
        self.input = InputState::Idle;

        match self.tools.tool {
            Tool::Pen => {
                self.input = InputState::Drawing { points: vec![pt] };
                Ok(Vec::new())
            }
            Tool::Eraser => {
                let removed = self.erase_at(pt);
                self.input = InputState::Erasing { removed };
                Ok(Vec::new())
            }
            Tool::Select => {
                if let Some(id) = hit_test(pt, &self.doc) {
                    self.input = InputState::Dragging { id, last: pt, moved: false };
                }
                Ok(Vec::new())
            }
            Tool::Shape(kind) => Ok(vec![self.add_shape(kind, pt.x, pt.y)?]),
            Tool::Text => Ok(vec![self.add_text(TEXT_PLACEHOLDER, pt.x, pt.y)?]),
            Tool::Math => match self.pending_formula.clone() {
                Some(markup) => Ok(vec![self.add_formula(&markup, pt.x, pt.y)?]),
                None => {
                    debug!("math tool clicked with no pending formula");
                    Ok(Vec::new())
                }
            },
        }
    }

    /// Continue the gesture in progress.
    pub fn pointer_move(&mut self, pt: Point) {
        match &mut self.input {
            InputState::Idle => {}
            InputState::Drawing { points } => points.push(pt),
            InputState::Erasing { removed } => {
                let more = erase_under(&mut self.doc, pt, self.tools.brush_size / 2.0);
                *removed += more;
            }
            InputState::Dragging { id, last, moved } => {
                let (dx, dy) = (pt.x - last.x, pt.y - last.y);
                if self.doc.translate(id, dx, dy) && dx.hypot(dy) > 0.0 {
                    *moved = true;
                }
                *last = pt;
            }
        }
    }

    /// Finish the gesture in progress and commit it.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::Snapshot`] if the change cannot be captured.
    pub fn pointer_up(&mut self, pt: Point) -> Result<Vec<Change>, SurfaceError> {
        match mem::take(&mut self.input) {
            InputState::Drawing { mut points } => {
                if points.last() != Some(&pt) {
                    points.push(pt);
                }
                let stroke = self.stroke(&points);
                self.doc.insert_on_top(stroke);
                Ok(vec![self.commit()?])
            }
            InputState::Erasing { removed } if removed > 0 => Ok(vec![self.commit()?]),
            InputState::Dragging { moved: true, .. } => Ok(vec![self.commit()?]),
            InputState::Idle | InputState::Erasing { .. } | InputState::Dragging { .. } => Ok(Vec::new()),
        }
    }

    fn erase_at(&mut self, pt: Point) -> usize {
        erase_under(&mut self.doc, pt, self.tools.brush_size / 2.0)
    }

    fn stroke(&self, points: &[Point]) -> DrawObject {
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        let raw: Vec<[f64; 2]> = points.iter().map(|p| [p.x, p.y]).collect();
        DrawObject::new(ObjectKind::Stroke, min_x, min_y, max_x - min_x, max_y - min_y).with_props(json!({
            "points": raw,
            "stroke": self.tools.color,
            "stroke_width": self.tools.brush_size,
        }))
    }

    // --- Surface-wide operations ---

    /// Blank the surface and restart history from a single blank entry.
    pub fn clear(&mut self) -> Change {
        self.reset_surface();
        Change::Cleared
    }

    /// Apply a clear received from a collaborator. Same effect as [`Self::clear`].
    pub fn reset_from_remote_clear(&mut self) {
        self.reset_surface();
    }

    fn reset_surface(&mut self) {
        self.doc.clear();
        self.input = InputState::Idle;
        self.history.reset(Snapshot::blank());
        self.refresh_grid();
    }

    /// Step back one history entry. `None` when there is nothing to undo.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::Snapshot`] if the stored snapshot cannot be loaded.
    pub fn undo(&mut self) -> Result<Option<Change>, SurfaceError> {
        if !self.history.undo() {
            return Ok(None);
        }
        Ok(Some(Change::Undone(self.restore_current()?)))
    }

    /// Step forward one history entry. `None` when there is nothing to redo.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::Snapshot`] if the stored snapshot cannot be loaded.
    pub fn redo(&mut self) -> Result<Option<Change>, SurfaceError> {
        if !self.history.redo() {
            return Ok(None);
        }
        Ok(Some(Change::Redone(self.restore_current()?)))
    }

    /// Replace the surface with `snapshot` without touching history.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::Snapshot`] if the snapshot does not parse.
    pub fn load_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), SurfaceError> {
        let objects = snapshot.objects()?;
        self.doc.load(objects);
        self.input = InputState::Idle;
        Ok(())
    }

    fn restore_current(&mut self) -> Result<Snapshot, SurfaceError> {
        let snapshot = self.history.current().cloned().unwrap_or_else(Snapshot::blank);
        self.load_snapshot(&snapshot)?;
        Ok(snapshot)
    }

    fn commit(&mut self) -> Result<Change, SurfaceError> {
        let snapshot = Snapshot::capture(&self.doc)?;
        self.history.push(snapshot.clone());
        Ok(Change::Snapshot(snapshot))
    }

    // --- Tool state ---

    /// Switch tools. A gesture in progress is abandoned and its uncommitted
    /// effects rolled back.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::Snapshot`] if the rollback snapshot cannot be loaded.
    pub fn set_tool(&mut self, tool: Tool) -> Result<(), SurfaceError> {
        let dirty = matches!(self.input, InputState::Erasing { removed } if removed > 0)
            || matches!(self.input, InputState::Dragging { moved: true, .. });
        self.input = InputState::Idle;
        if dirty {
            self.restore_current()?;
        }
        self.tools.tool = tool;
        Ok(())
    }

    pub fn set_brush_size(&mut self, size: f64) {
        self.tools.set_brush_size(size);
    }

    pub fn set_color(&mut self, color: impl Into<String>) {
        self.tools.color = color.into();
    }

    /// Flip grid visibility and return the new state.
    pub fn toggle_grid(&mut self) -> bool {
        self.set_grid_visible(!self.tools.grid_visible);
        self.tools.grid_visible
    }

    pub fn set_grid_visible(&mut self, visible: bool) {
        self.tools.grid_visible = visible;
        self.refresh_grid();
    }

    /// Resize the visible surface.
    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.viewport = (width, height);
        self.refresh_grid();
    }

    /// Markup the math tool inserts on the next click.
    pub fn set_pending_formula(&mut self, markup: Option<String>) {
        self.pending_formula = markup;
    }

    fn refresh_grid(&mut self) {
        self.grid = if self.tools.grid_visible {
            grid_lines(self.viewport.0, self.viewport.1, self.grid_spacing)
        } else {
            Vec::new()
        };
    }

    // --- Queries ---

    /// Serialize the surface as it is now.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::Snapshot`] if an object cannot be serialized.
    pub fn snapshot(&self) -> Result<Snapshot, SurfaceError> {
        Snapshot::capture(&self.doc)
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    #[must_use]
    pub fn doc(&self) -> &DocStore {
        &self.doc
    }

    #[must_use]
    pub fn tools(&self) -> &ToolState {
        &self.tools
    }

    #[must_use]
    pub fn input(&self) -> &InputState {
        &self.input
    }

    #[must_use]
    pub fn grid(&self) -> &[GridLine] {
        &self.grid
    }

    #[must_use]
    pub fn pending_formula(&self) -> Option<&str> {
        self.pending_formula.as_deref()
    }

    #[must_use]
    pub fn scene(&self) -> Scene<'_> {
        Scene {
            objects: self.doc.sorted_objects(),
            grid: &self.grid,
            preview: self.input.stroke_preview(),
            tools: &self.tools,
        }
    }
}

/// Box sized for `text` at the default font size.
#[allow(clippy::cast_precision_loss)]
fn text_block(kind: ObjectKind, text: &str, x: f64, y: f64) -> DrawObject {
    let longest = text.lines().map(|l| l.chars().count()).max().unwrap_or(0).max(1);
    let lines = text.lines().count().max(1);
    let width = longest as f64 * DEFAULT_FONT_SIZE * 0.6;
    let height = lines as f64 * DEFAULT_FONT_SIZE * 1.2;
    DrawObject::new(kind, x, y, width, height)
}

fn erase_under(doc: &mut DocStore, pt: Point, radius: f64) -> usize {
    let hits = hits_within(pt, radius, doc);
    for id in &hits {
        doc.remove(id);
    }
    hits.len()
}

// =============================================================================
// ENGINE
// =============================================================================

/// The engine bound to a host render target.
pub struct Engine<T: RenderTarget> {
    target: Option<T>,
    core: EngineCore,
}

impl<T: RenderTarget> Engine<T> {
    /// Attach a fresh core to `target`.
    pub fn new(target: T, config: &EngineConfig) -> Self {
        Self::with_core(target, EngineCore::new(config))
    }

    pub fn with_core(target: T, core: EngineCore) -> Self {
        let mut engine = Self { target: Some(target), core };
        engine.present();
        engine
    }

    #[must_use]
    pub fn core(&self) -> &EngineCore {
        &self.core
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.target.is_some()
    }

    /// Release the render target. Later operations fail with
    /// [`SurfaceError::Detached`]. Safe to call more than once.
    pub fn dispose(&mut self) {
        if let Some(mut target) = self.target.take() {
            target.release();
            debug!("drawing surface released");
        }
    }

    fn present(&mut self) {
        if let Some(target) = self.target.as_mut() {
            target.present(&self.core.scene());
        }
    }

    /// Run `op` against the core and redraw, or fail if detached.
    fn with<R>(&mut self, op: impl FnOnce(&mut EngineCore) -> Result<R, SurfaceError>) -> Result<R, SurfaceError> {
        if self.target.is_none() {
            return Err(SurfaceError::Detached);
        }
        let out = op(&mut self.core)?;
        self.present();
        Ok(out)
    }

    /// # Errors
    ///
    /// See [`EngineCore::add_shape`]; also [`SurfaceError::Detached`].
    pub fn add_shape(&mut self, kind: ShapeKind, x: f64, y: f64) -> Result<Change, SurfaceError> {
        self.with(|core| core.add_shape(kind, x, y))
    }

    /// # Errors
    ///
    /// See [`EngineCore::add_text`]; also [`SurfaceError::Detached`].
    pub fn add_text(&mut self, text: &str, x: f64, y: f64) -> Result<Change, SurfaceError> {
        self.with(|core| core.add_text(text, x, y))
    }

    /// # Errors
    ///
    /// See [`EngineCore::add_formula`]; also [`SurfaceError::Detached`].
    pub fn add_formula(&mut self, markup: &str, x: f64, y: f64) -> Result<Change, SurfaceError> {
        self.with(|core| core.add_formula(markup, x, y))
    }

    /// # Errors
    ///
    /// See [`EngineCore::erase`]; also [`SurfaceError::Detached`].
    pub fn erase(&mut self, id: &ObjectId) -> Result<Change, SurfaceError> {
        self.with(|core| core.erase(id))
    }

    /// # Errors
    ///
    /// See [`EngineCore::pointer_down`]; also [`SurfaceError::Detached`].
    pub fn pointer_down(&mut self, pt: Point, button: Button) -> Result<Vec<Change>, SurfaceError> {
        self.with(|core| core.pointer_down(pt, button))
    }

    /// # Errors
    ///
    /// Returns [`SurfaceError::Detached`] after disposal.
    pub fn pointer_move(&mut self, pt: Point) -> Result<(), SurfaceError> {
        self.with(|core| {
            core.pointer_move(pt);
            Ok(())
        })
    }

    /// # Errors
    ///
    /// See [`EngineCore::pointer_up`]; also [`SurfaceError::Detached`].
    pub fn pointer_up(&mut self, pt: Point) -> Result<Vec<Change>, SurfaceError> {
        self.with(|core| core.pointer_up(pt))
    }

    /// # Errors
    ///
    /// Returns [`SurfaceError::Detached`] after disposal.
    pub fn clear(&mut self) -> Result<Change, SurfaceError> {
        self.with(|core| Ok(core.clear()))
    }

    /// # Errors
    ///
    /// See [`EngineCore::undo`]; also [`SurfaceError::Detached`].
    pub fn undo(&mut self) -> Result<Option<Change>, SurfaceError> {
        self.with(EngineCore::undo)
    }

    /// # Errors
    ///
    /// See [`EngineCore::redo`]; also [`SurfaceError::Detached`].
    pub fn redo(&mut self) -> Result<Option<Change>, SurfaceError> {
        self.with(EngineCore::redo)
    }

    /// # Errors
    ///
    /// See [`EngineCore::load_snapshot`]; also [`SurfaceError::Detached`].
    pub fn load_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), SurfaceError> {
        self.with(|core| core.load_snapshot(snapshot))
    }

    /// # Errors
    ///
    /// See [`EngineCore::set_tool`]; also [`SurfaceError::Detached`].
    pub fn set_tool(&mut self, tool: Tool) -> Result<(), SurfaceError> {
        self.with(|core| core.set_tool(tool))
    }

    /// # Errors
    ///
    /// Returns [`SurfaceError::Detached`] after disposal.
    pub fn set_brush_size(&mut self, size: f64) -> Result<(), SurfaceError> {
        self.with(|core| {
            core.set_brush_size(size);
            Ok(())
        })
    }

    /// # Errors
    ///
    /// Returns [`SurfaceError::Detached`] after disposal.
    pub fn set_color(&mut self, color: &str) -> Result<(), SurfaceError> {
        self.with(|core| {
            core.set_color(color);
            Ok(())
        })
    }

    /// # Errors
    ///
    /// Returns [`SurfaceError::Detached`] after disposal.
    pub fn toggle_grid(&mut self) -> Result<bool, SurfaceError> {
        self.with(|core| Ok(core.toggle_grid()))
    }

    /// # Errors
    ///
    /// Returns [`SurfaceError::Detached`] after disposal.
    pub fn set_viewport(&mut self, width: f64, height: f64) -> Result<(), SurfaceError> {
        self.with(|core| {
            core.set_viewport(width, height);
            Ok(())
        })
    }

    /// Give mutable access to the core for operations without a redraw
    /// wrapper (remote sync, pending formula).
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::Detached`] after disposal.
    pub fn core_mut(&mut self) -> Result<&mut EngineCore, SurfaceError> {
        if self.target.is_none() {
            return Err(SurfaceError::Detached);
        }
        Ok(&mut self.core)
    }

    /// Redraw after changes made through [`Self::core_mut`].
    pub fn redraw(&mut self) {
        self.present();
    }
}

impl<T: RenderTarget> Drop for Engine<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}
