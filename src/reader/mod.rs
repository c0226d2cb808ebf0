//! Reader module for Pixie16 list-mode data
//!
//! This module provides:
//! - List-mode decoder (decoder)
//! - Byte sources over files and readers (source)
//! - Chunked event stream (stream)
//! - Channel bucketing (sort)

pub mod decoder;
pub mod sort;
pub mod source;
pub mod stream;

// Re-exports
pub use decoder::{DecoderConfig, Event, EventDecoder, HeaderVariant, StreamEnd, WordQueue};
pub use sort::sort_events_by_channel;
pub use source::{ByteSource, FileChain, ReaderSource};
pub use stream::{ListModeStream, StreamStats};

use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use crate::common::DecodeError;

/// Reader error type
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
}

/// Reader configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Bytes requested from the source per chunk
    pub buffer_size: usize,
    /// Stop after this many events
    pub max_events: Option<usize>,
    /// Only keep these channels when sorting
    pub channels: Option<Vec<u8>>,
    /// Attach the chunk read time to every event
    pub stamp_chunks: bool,
    /// Where to dump the buffer when a corrupt header shows up
    pub dump_dir: Option<PathBuf>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1_000_000_000, // 1 GB, whole files for typical runs
            max_events: None,
            channels: None,
            stamp_chunks: false,
            dump_dir: None,
        }
    }
}

/// Stream events from an ordered list of list-mode files
pub fn events_from_files<P: Into<PathBuf>>(
    files: impl IntoIterator<Item = P>,
    config: &ReaderConfig,
) -> ListModeStream<FileChain> {
    ListModeStream::new(FileChain::new(files), config)
}

/// Read at most `config.max_events` events from list-mode files
///
/// Stops at the first I/O or fatal decode error.
pub fn read_list_mode_events<P: Into<PathBuf>>(
    files: impl IntoIterator<Item = P>,
    config: &ReaderConfig,
) -> Result<Vec<Event>, ReaderError> {
    let stream = events_from_files(files, config);
    let limit = config.max_events.unwrap_or(usize::MAX);
    stream.take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReaderConfig::default();
        assert_eq!(config.buffer_size, 1_000_000_000);
        assert!(config.max_events.is_none());
        assert!(config.channels.is_none());
        assert!(!config.stamp_chunks);
        assert!(config.dump_dir.is_none());
    }

    #[test]
    fn test_decode_error_converts() {
        let err: ReaderError = DecodeError::MalformedTrace { bytes: 3 }.into();
        assert!(err.to_string().contains("Decode error"));
    }

    #[test]
    fn test_open_error_names_path() {
        let err = ReaderError::Open {
            path: PathBuf::from("/data/run_001.bin"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.to_string().contains("/data/run_001.bin"));
    }
}
