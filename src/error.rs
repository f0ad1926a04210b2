//! Error types for mongowire
//!
//! Provides a unified error type for all driver operations, with dedicated
//! sub-enums for the codec so encode and decode failures can be matched
//! precisely.

use thiserror::Error;

use crate::bson::BsonDocument;

/// Result type alias using MongoError
pub type Result<T> = std::result::Result<T, MongoError>;

/// Errors raised while building BSON or encoding wire frames
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("field name contains an interior NUL byte")]
    InvalidFieldName,

    #[error("regex options must be drawn from \"ilmsux\" in ascending order: {0:?}")]
    InvalidRegexOptions(String),

    #[error("value of {0} bytes does not fit in an int32 length prefix")]
    ValueTooLarge(usize),

    #[error("frame of {size} bytes exceeds the {max} byte limit")]
    FrameTooLarge { size: usize, max: usize },
}

/// Errors raised while parsing BSON or decoding wire frames
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("buffer ended mid-field at offset {0}")]
    Truncated(usize),

    #[error("unknown BSON tag 0x{0:02x}")]
    BadTag(u8),

    #[error("field {name:?} has tag 0x{found:02x}, expected 0x{expected:02x}")]
    TypeMismatch {
        name: String,
        expected: u8,
        found: u8,
    },

    #[error("declared length {declared} disagrees with available {available} bytes")]
    LengthMismatch { declared: i32, available: usize },
}

/// Unified error type for driver operations
#[derive(Debug, Error)]
pub enum MongoError {
    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    #[error("connection refused by {0}")]
    ConnectRefused(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("read failed: {0}")]
    ReadFailed(String),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("invalid endpoint address: {0}")]
    InvalidEndpoint(String),

    #[error("connection is not ready for requests")]
    NotReady,

    #[error("supervisor is shut down")]
    Shutdown,

    #[error("endpoint is unreachable after repeated connection failures")]
    Unreachable,

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("server reports the cursor is no longer valid")]
    CursorInvalid,

    #[error("server-side query failure")]
    ServerError(BsonDocument),

    // -------------------------------------------------------------------------
    // Timing Errors
    // -------------------------------------------------------------------------
    #[error("request timed out")]
    Timeout,

    #[error("request was cancelled")]
    Cancelled,
}

impl MongoError {
    /// True when the error is fatal to the connection that produced it
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MongoError::Decode(_)
                | MongoError::Io(_)
                | MongoError::ConnectRefused(_)
                | MongoError::WriteFailed(_)
                | MongoError::ReadFailed(_)
        )
    }
}

