//! Document model: drawable objects, their properties, and the in-memory store.
//!
//! Everything a snapshot carries lives here. Objects keep their geometry as
//! an axis-aligned bounding box plus an open-ended `props` bag for per-kind
//! data (stroke points, text, formula markup, colors). The grid overlay is
//! not an object and never enters the store.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Unique identifier for a drawable object.
pub type ObjectId = Uuid;

/// A point in surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// The kind of a drawable object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// Free-hand pen stroke; points live in `props.points`.
    Stroke,
    Rect,
    /// Ellipse inscribed in the bounding box.
    Circle,
    /// Isosceles triangle with its apex at the top edge midpoint.
    Triangle,
    /// Segment from the top-left to the bottom-right bounding-box corner.
    Line,
    /// Like `Line`, with an arrowhead at the bottom-right end.
    Arrow,
    Text,
    /// Rendered math block; keeps the source markup in `props.markup`.
    Formula,
}

/// A drawable object as stored in the document and in snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    /// Left edge of the bounding box.
    pub x: f64,
    /// Top edge of the bounding box.
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Stacking order; lower values are drawn beneath higher values.
    pub z_index: i64,
    /// Per-kind properties (stroke, fill, points, text, markup).
    pub props: Value,
}

impl DrawObject {
    /// Create an object with a fresh id and empty props.
    #[must_use]
    pub fn new(kind: ObjectKind, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { id: Uuid::new_v4(), kind, x, y, width, height, z_index: 0, props: Value::Object(serde_json::Map::new()) }
    }

    #[must_use]
    pub fn with_props(mut self, props: Value) -> Self {
        self.props = props;
        self
    }

    /// Typed view over `props`.
    #[must_use]
    pub fn props(&self) -> Props<'_> {
        Props::new(&self.props)
    }

    /// Whether `pt` lies inside the bounding box grown by `slop` on every side.
    #[must_use]
    pub fn bounds_contain(&self, pt: Point, slop: f64) -> bool {
        pt.x >= self.x - slop && pt.x <= self.x + self.width + slop && pt.y >= self.y - slop && pt.y <= self.y + self.height + slop
    }
}

/// Typed access to common fields of a `DrawObject.props` JSON value.
pub struct Props<'a> {
    value: &'a Value,
}

impl<'a> Props<'a> {
    #[must_use]
    pub fn new(value: &'a Value) -> Self {
        Self { value }
    }

    /// Stroke color. Defaults to black.
    #[must_use]
    pub fn stroke(&self) -> &'a str {
        self.value
            .get("stroke")
            .and_then(Value::as_str)
            .unwrap_or("#000000")
    }

    /// Fill color. Empty when the shape is unfilled.
    #[must_use]
    pub fn fill(&self) -> &'a str {
        self.value.get("fill").and_then(Value::as_str).unwrap_or("")
    }

    /// Stroke width. Defaults to `1.0`.
    #[must_use]
    pub fn stroke_width(&self) -> f64 {
        self.value
            .get("stroke_width")
            .and_then(Value::as_f64)
            .unwrap_or(1.0)
    }

    /// Text content of text and formula objects.
    #[must_use]
    pub fn text(&self) -> &'a str {
        self.value.get("text").and_then(Value::as_str).unwrap_or("")
    }

    /// Source markup of a formula object.
    #[must_use]
    pub fn markup(&self) -> &'a str {
        self.value.get("markup").and_then(Value::as_str).unwrap_or("")
    }

    /// Stroke polyline. Malformed entries are skipped.
    #[must_use]
    pub fn points(&self) -> Vec<Point> {
        let Some(raw) = self.value.get("points").and_then(Value::as_array) else {
            return Vec::new();
        };
        raw.iter()
            .filter_map(|p| {
                let pair = p.as_array()?;
                Some(Point::new(pair.first()?.as_f64()?, pair.get(1)?.as_f64()?))
            })
            .collect()
    }
}

/// In-memory store of the objects currently on the surface.
pub struct DocStore {
    objects: HashMap<ObjectId, DrawObject>,
}

impl DocStore {
    #[must_use]
    pub fn new() -> Self {
        Self { objects: HashMap::new() }
    }

    /// Insert or replace an object by id.
    pub fn insert(&mut self, obj: DrawObject) {
        self.objects.insert(obj.id, obj);
    }

    /// Insert an object on top of everything currently on the surface.
    pub fn insert_on_top(&mut self, mut obj: DrawObject) -> ObjectId {
        obj.z_index = self.next_z_index();
        let id = obj.id;
        self.objects.insert(id, obj);
        id
    }

    pub fn remove(&mut self, id: &ObjectId) -> Option<DrawObject> {
        self.objects.remove(id)
    }

    #[must_use]
    pub fn get(&self, id: &ObjectId) -> Option<&DrawObject> {
        self.objects.get(id)
    }

    /// Move an object by a delta. Strokes move their points along with the box.
    /// Returns false if the object doesn't exist.
    pub fn translate(&mut self, id: &ObjectId, dx: f64, dy: f64) -> bool {
        let Some(obj) = self.objects.get_mut(id) else {
            return false;
        };
        obj.x += dx;
        obj.y += dy;
        if let Some(points) = obj.props.get_mut("points").and_then(Value::as_array_mut) {
            for p in points.iter_mut() {
                let Some(pair) = p.as_array_mut() else { continue };
                if let [px, py] = pair.as_mut_slice() {
                    if let (Some(x), Some(y)) = (px.as_f64(), py.as_f64()) {
                        *px = Value::from(x + dx);
                        *py = Value::from(y + dy);
                    }
                }
            }
        }
        true
    }

    /// Replace all objects with the given set.
    pub fn load(&mut self, objects: Vec<DrawObject>) {
        self.objects.clear();
        for obj in objects {
            self.objects.insert(obj.id, obj);
        }
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }

    /// All objects sorted by `(z_index, id)`: draw order and snapshot order.
    #[must_use]
    pub fn sorted_objects(&self) -> Vec<&DrawObject> {
        let mut objs: Vec<&DrawObject> = self.objects.values().collect();
        objs.sort_by(|a, b| a.z_index.cmp(&b.z_index).then_with(|| a.id.cmp(&b.id)));
        objs
    }

    /// One above the current topmost z-index.
    #[must_use]
    pub fn next_z_index(&self) -> i64 {
        self.objects
            .values()
            .map(|o| o.z_index)
            .max()
            .map_or(0, |z| z + 1)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl Default for DocStore {
    fn default() -> Self {
        Self::new()
    }
}
