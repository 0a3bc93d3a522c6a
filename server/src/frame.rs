//! Server-side frame helpers: replies, structured errors, inbound parsing.
//!
//! DESIGN
//! ======
//! The wire model lives in the `frames` crate and is shared with the client
//! crates. This module adds what only the relay needs: terminal replies that
//! correlate to a request through `parent_id`, and error frames built from
//! typed errors via [`ErrorCode`].
//!
//! Binary socket messages are protobuf frames; text messages are the same
//! frame as JSON.

use frames::{CodecError, Status};
use serde_json::{Value, json};

pub use frames::Frame;

/// Frame data key for error messages.
pub const FRAME_MESSAGE: &str = "message";

/// Frame data key for grepable error codes.
pub const FRAME_CODE: &str = "code";

/// Frame data key for the retryable flag on error frames.
pub const FRAME_RETRYABLE: &str = "retryable";

/// Grepable error code and retryable flag for structured error frames.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InboundError {
    #[error("invalid frame: {0}")]
    Codec(#[from] CodecError),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

impl ErrorCode for InboundError {
    fn error_code(&self) -> &'static str {
        "E_BAD_FRAME"
    }
}

/// Decode a binary socket message.
///
/// # Errors
///
/// Returns [`InboundError::Codec`] when the bytes are not a protobuf frame.
pub fn parse_binary(bytes: &[u8]) -> Result<Frame, InboundError> {
    Ok(frames::decode_frame(bytes)?)
}

/// Decode a JSON text socket message.
///
/// # Errors
///
/// Returns [`InboundError::Json`] when the text is not a JSON frame.
pub fn parse_text(text: &str) -> Result<Frame, InboundError> {
    Ok(serde_json::from_str(text)?)
}

/// Reply constructors for request frames.
pub trait Reply {
    /// Successful terminal reply with an empty payload.
    fn done(&self) -> Frame;

    /// Error reply from a plain message. Terminal.
    fn error(&self, message: impl Into<String>) -> Frame;

    /// Structured error reply from a typed error. Terminal.
    fn error_from(&self, err: &(impl ErrorCode + ?Sized)) -> Frame;
}

impl Reply for Frame {
    fn done(&self) -> Frame {
        reply(self, Status::Done, json!({}))
    }

    fn error(&self, message: impl Into<String>) -> Frame {
        reply(self, Status::Error, json!({ FRAME_MESSAGE: message.into() }))
    }

    fn error_from(&self, err: &(impl ErrorCode + ?Sized)) -> Frame {
        reply(
            self,
            Status::Error,
            json!({
                FRAME_CODE: err.error_code(),
                FRAME_MESSAGE: err.to_string(),
                FRAME_RETRYABLE: err.retryable(),
            }),
        )
    }
}

/// Inherits `parent_id`, `session_id` and `syscall` from the request.
fn reply(req: &Frame, status: Status, data: Value) -> Frame {
    let mut frame = Frame::request(req.syscall.clone(), data);
    frame.parent_id = Some(req.id.clone());
    frame.session_id.clone_from(&req.session_id);
    frame.status = status;
    frame
}

/// Error frame not tied to any request, e.g. for input that did not parse.
#[must_use]
pub fn gateway_error(err: &(impl ErrorCode + ?Sized)) -> Frame {
    let mut frame = Frame::request(
        "gateway:error",
        json!({ FRAME_CODE: err.error_code(), FRAME_MESSAGE: err.to_string() }),
    );
    frame.status = Status::Error;
    frame
}

#[cfg(test)]
#[path = "frame_test.rs"]
mod tests;
