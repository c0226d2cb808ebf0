//! Common types shared across components

pub mod cli;
pub mod error;
pub use error::{DecodeError, DecodeResult};

/// Size of one list-mode word in bytes
pub const WORD_SIZE: usize = 4;

/// Current Unix time in seconds, used to stamp decoded chunks
pub fn unix_time_secs() -> f64 {
    let now = chrono::Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_nanos()) * 1e-9
}
