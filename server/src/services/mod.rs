//! Domain services used by the websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own room membership and whiteboard bookkeeping so route
//! handlers can stay focused on protocol translation.

pub mod room;
pub mod whiteboard;
