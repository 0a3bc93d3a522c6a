//! Hit-testing for the select and eraser tools.
//!
//! Filled shapes and text hit anywhere inside their box. Strokes and
//! segments hit within half their stroke width plus [`HIT_SLOP`]. The grid
//! overlay is not in the document, so it can never be hit.

#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use crate::consts::HIT_SLOP;
use crate::doc::{DocStore, DrawObject, ObjectId, ObjectKind, Point};

/// Topmost object under `pt`, if any.
#[must_use]
pub fn hit_test(pt: Point, doc: &DocStore) -> Option<ObjectId> {
    doc.sorted_objects()
        .into_iter()
        .rev()
        .find(|obj| object_contains(obj, pt, 0.0))
        .map(|obj| obj.id)
}

/// Every object within `radius` of `pt`, topmost first.
#[must_use]
pub fn hits_within(pt: Point, radius: f64, doc: &DocStore) -> Vec<ObjectId> {
    doc.sorted_objects()
        .into_iter()
        .rev()
        .filter(|obj| object_contains(obj, pt, radius))
        .map(|obj| obj.id)
        .collect()
}

fn object_contains(obj: &DrawObject, pt: Point, radius: f64) -> bool {
    let props = obj.props();
    let reach = props.stroke_width() / 2.0 + HIT_SLOP + radius;

    match obj.kind {
        ObjectKind::Stroke => {
            let points = props.points();
            match points.as_slice() {
                [] => false,
                [only] => distance(*only, pt) <= reach,
                _ => points
                    .windows(2)
                    .any(|seg| distance_to_segment(pt, seg[0], seg[1]) <= reach),
            }
        }
        ObjectKind::Line | ObjectKind::Arrow => {
            let a = Point::new(obj.x, obj.y);
            let b = Point::new(obj.x + obj.width, obj.y + obj.height);
            distance_to_segment(pt, a, b) <= reach
        }
        ObjectKind::Circle => {
            let rx = obj.width / 2.0 + radius;
            let ry = obj.height / 2.0 + radius;
            if rx <= 0.0 || ry <= 0.0 {
                return false;
            }
            let dx = (pt.x - (obj.x + obj.width / 2.0)) / rx;
            let dy = (pt.y - (obj.y + obj.height / 2.0)) / ry;
            dx * dx + dy * dy <= 1.0
        }
        ObjectKind::Rect | ObjectKind::Triangle | ObjectKind::Text | ObjectKind::Formula => obj.bounds_contain(pt, radius),
    }
}

fn distance(a: Point, b: Point) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

fn distance_to_segment(pt: Point, a: Point, b: Point) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return distance(pt, a);
    }
    let t = (((pt.x - a.x) * dx + (pt.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    distance(pt, Point::new(a.x + t * dx, a.y + t * dy))
}
