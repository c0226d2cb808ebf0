//! Decode error types for the list-mode pipeline
//!
//! # Design Principles (KISS)
//! - `Empty` and `InsufficientData` are control-flow signals, not failures
//! - Everything else means the stream framing can no longer be trusted
//! - Use thiserror for ergonomic error handling

use thiserror::Error;

/// Errors raised while pulling words or events out of a byte queue
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Queue holds no bytes at all
    #[error("queue is empty")]
    Empty,

    /// Queue holds some bytes, but fewer than requested
    #[error("insufficient data: requested {requested_bytes} bytes, {available_bytes} buffered")]
    InsufficientData {
        requested_bytes: usize,
        available_bytes: usize,
    },

    /// Header length has no registered layout
    #[error(
        "unknown header length {header_length} words \
         (event length {event_length} words, {remaining_bytes} bytes left in buffer)"
    )]
    UnknownHeaderLength {
        header_length: u32,
        event_length: u32,
        remaining_bytes: usize,
    },

    /// Event length is shorter than its own header
    #[error("event length {event_length} words is shorter than header length {header_length} words")]
    InvalidEventLength { event_length: u32, header_length: u32 },

    /// Trace span cannot be split into 16-bit samples
    #[error("malformed trace: {bytes} bytes is not a whole number of samples")]
    MalformedTrace { bytes: usize },
}

impl DecodeError {
    /// Create an insufficient data error
    pub fn insufficient(requested_bytes: usize, available_bytes: usize) -> Self {
        Self::InsufficientData {
            requested_bytes,
            available_bytes,
        }
    }

    /// True when more input could turn this into a successful decode
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Empty | Self::InsufficientData { .. })
    }

    /// True when the stream is corrupt and iteration must stop
    pub fn is_fatal(&self) -> bool {
        !self.is_incomplete()
    }
}

/// Result type alias using DecodeError
pub type DecodeResult<T> = Result<T, DecodeError>;
