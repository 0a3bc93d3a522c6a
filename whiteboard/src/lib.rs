//! Drawing surface and whiteboard channel for the live classroom.
//!
//! This crate owns everything a participant's whiteboard does locally:
//! interpreting pointer input according to the active tool, mutating the
//! document, recording snapshots for undo/redo, drawing the grid overlay,
//! rendering math markup, and translating local changes to and from the
//! shared whiteboard channel. Rendering pixels is the host's job; the host
//! plugs a [`engine::RenderTarget`] into [`engine::Engine`].
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Owned [`engine::Engine`] and testable [`engine::EngineCore`] |
//! | [`doc`] | Drawable objects and the in-memory document store |
//! | [`snapshot`] | Immutable serialized surface state |
//! | [`history`] | Snapshot list with an undo/redo cursor |
//! | [`input`] | Tools, tool state and the pointer gesture state machine |
//! | [`hit`] | Hit-testing for the eraser and select tools |
//! | [`grid`] | Grid overlay geometry |
//! | [`formula`] | Math markup rendering with plain-text fallback |
//! | [`catalog`] | Static math templates and symbols |
//! | [`sync`] | Whiteboard channel events and the last-writer-wins policy |
//! | [`consts`] | Shared defaults (brush, grid spacing, history cap, etc.) |

pub mod catalog;
pub mod consts;
pub mod doc;
pub mod engine;
pub mod error;
pub mod formula;
pub mod grid;
pub mod hit;
pub mod history;
pub mod input;
pub mod snapshot;
pub mod sync;

pub use engine::{Change, Engine, EngineConfig, EngineCore, RenderTarget, Scene};
pub use error::SurfaceError;
pub use history::History;
pub use input::{ShapeKind, Tool, ToolState};
pub use snapshot::Snapshot;
pub use sync::{RemoteOutcome, WhiteboardEvent, WhiteboardSync};
