//! Errors raised by surface operations.

use crate::doc::ObjectId;

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    /// The engine's render target has been released.
    #[error("drawing surface is not attached")]
    Detached,
    /// Formula insertion was asked to insert blank markup.
    #[error("formula markup is empty")]
    EmptyMarkup,
    /// No object with this id is on the surface.
    #[error("object not found: {0}")]
    UnknownObject(ObjectId),
    /// A snapshot could not be serialized or parsed.
    #[error("invalid snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}
