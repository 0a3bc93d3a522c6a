//! Immutable serialized surface state.
//!
//! A snapshot is the unit of undo/redo and of network synchronization. It is
//! JSON text of the shape `{"objects":[...]}` with objects in draw order, so
//! two surfaces holding the same objects produce byte-identical snapshots.

#[cfg(test)]
#[path = "snapshot_test.rs"]
mod snapshot_test;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::doc::{DocStore, DrawObject};
use crate::error::SurfaceError;

const BLANK: &str = r#"{"objects":[]}"#;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    objects: Vec<&'a DrawObject>,
}

#[derive(Deserialize)]
struct SnapshotOwned {
    objects: Vec<DrawObject>,
}

/// Serialized state of the whole surface at one instant. Cheap to clone.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Snapshot(Arc<str>);

impl Snapshot {
    /// Serialize every object on the surface.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::Snapshot`] if an object cannot be serialized.
    pub fn capture(doc: &DocStore) -> Result<Self, SurfaceError> {
        let text = serde_json::to_string(&SnapshotRef { objects: doc.sorted_objects() })?;
        Ok(Self(text.into()))
    }

    /// The empty surface.
    #[must_use]
    pub fn blank() -> Self {
        Self(BLANK.into())
    }

    /// Accept snapshot text received from a collaborator after checking it parses.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::Snapshot`] for text that is not a snapshot document.
    pub fn from_json(text: &str) -> Result<Self, SurfaceError> {
        serde_json::from_str::<SnapshotOwned>(text)?;
        Ok(Self(text.into()))
    }

    /// Deserialize the objects this snapshot holds.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::Snapshot`] if the text is not a snapshot document.
    pub fn objects(&self) -> Result<Vec<DrawObject>, SurfaceError> {
        let doc: SnapshotOwned = serde_json::from_str(&self.0)?;
        Ok(doc.objects)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Byte length of the serialized text.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.0.len()
    }

    /// Whether the snapshot holds no objects.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.objects().is_ok_and(|objects| objects.is_empty())
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot").field("bytes", &self.0.len()).finish()
    }
}
