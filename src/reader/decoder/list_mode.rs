//! List-mode event decoder for Pixie16 digitizers
//!
//! Bytes are fed in with [`EventDecoder::put`] in chunks of any size and
//! events come out one at a time with [`EventDecoder::pop`]. An event is
//! only consumed once all of its words are buffered, so a partial event at
//! the end of a chunk stays in the queue until the next `put`.
//!
//! # Data Format
//!
//! 32-bit Little-Endian words. Each event is `header length` words of
//! bit-packed header (see `layout`) followed by
//! `event length - header length` words of trace, two 16-bit samples per
//! word.

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use super::event::Event;
use super::layout::{self, HeaderVariant};
use super::words::WordQueue;
use crate::common::{DecodeError, DecodeResult};

/// Size of one trace sample in bytes
pub const SAMPLE_SIZE: usize = 2;

/// File the remaining buffer is written to on a corrupt header
pub const REST_DUMP_FILE: &str = "pixie_binary_rest_debug.bin";

/// Decoder configuration
#[derive(Debug, Clone, Default)]
pub struct DecoderConfig {
    /// Directory for diagnostic dumps when an unknown header length shows up
    pub dump_dir: Option<PathBuf>,
}

/// How a stream ended once the caller declared no more input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Every buffered byte was consumed by a complete event
    Clean,
    /// A partial event (or partial word) was left behind
    Truncated { leftover_bytes: usize },
}

/// Events decoded by [`EventDecoder::pop_all`]
///
/// `error` holds the fatal error that stopped decoding, if any; the events
/// decoded before it are still delivered.
#[derive(Debug, Default)]
pub struct DrainedEvents {
    pub events: Vec<Event>,
    pub error: Option<DecodeError>,
}

/// Streaming decoder turning list-mode bytes into events
#[derive(Debug, Default)]
pub struct EventDecoder {
    config: DecoderConfig,
    words: WordQueue,
}

impl EventDecoder {
    /// Create a new decoder with given configuration
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            config,
            words: WordQueue::new(),
        }
    }

    /// Create a decoder with default configuration
    pub fn with_defaults() -> Self {
        Self::new(DecoderConfig::default())
    }

    /// Create a decoder pre-filled with `data`
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut decoder = Self::with_defaults();
        decoder.put(data);
        decoder
    }

    /// Number of bytes buffered
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Put more bytes into the queue
    pub fn put(&mut self, data: &[u8]) {
        self.words.put(data);
    }

    /// Underlying word queue
    pub fn words(&self) -> &WordQueue {
        &self.words
    }

    /// Pop the next complete event
    ///
    /// `Empty` and `InsufficientData` leave the queue untouched. Fatal errors
    /// may have consumed the header (and trace) of the offending event.
    pub fn pop(&mut self) -> DecodeResult<Event> {
        let first_row = self.words.peek(1, false)?;
        let row = layout::unpack_first_row(&first_row)?;
        let header_length = row.header_length;
        let event_length = row.event_length;

        if event_length < header_length {
            return Err(DecodeError::InvalidEventLength {
                event_length,
                header_length,
            });
        }

        // Header and trace are popped separately, so the whole event must be
        // present before either pop; otherwise a later retry would read trace
        // words as a header.
        self.words.assert_available(event_length as usize)?;

        let header_words = self.words.pop(header_length as usize, false)?;
        let Some(variant) = HeaderVariant::from_header_length(header_length) else {
            let err = DecodeError::UnknownHeaderLength {
                header_length,
                event_length,
                remaining_bytes: self.words.len(),
            };
            error!(
                header_length,
                event_length,
                remaining_bytes = self.words.len(),
                "Unknown header length in list-mode data"
            );
            self.dump_diagnostics();
            return Err(err);
        };
        let fields = layout::unpack(&header_words, variant.groups())?;

        let trace_length = (event_length - header_length) as usize;
        let trace = if trace_length > 0 {
            let raw = self.words.pop(trace_length, true)?;
            decode_trace(&raw)?
        } else {
            Vec::new()
        };

        Ok(Event::from_header(fields, trace))
    }

    /// Iterate over the events that are completely buffered
    ///
    /// Stops silently at a partial event or an empty queue; a fatal error is
    /// yielded once and ends the iteration. Call again after `put` to resume.
    pub fn iter_events(&mut self) -> Events<'_> {
        Events {
            decoder: self,
            done: false,
        }
    }

    /// Decode every complete event currently buffered
    pub fn pop_all(&mut self) -> DrainedEvents {
        let mut drained = DrainedEvents::default();
        for result in self.iter_events() {
            match result {
                Ok(event) => drained.events.push(event),
                Err(e) => drained.error = Some(e),
            }
        }
        drained
    }

    /// Declare end of input and report leftover bytes
    pub fn finish(&self) -> StreamEnd {
        if self.words.is_empty() {
            return StreamEnd::Clean;
        }
        warn!(
            leftover_bytes = self.words.len(),
            "Left over bytes in binary data stream"
        );
        StreamEnd::Truncated {
            leftover_bytes: self.words.len(),
        }
    }

    /// Write the remaining buffer and the recent pops to `dump_dir`
    fn dump_diagnostics(&self) {
        let Some(dir) = self.config.dump_dir.as_deref() else {
            return;
        };

        if !self.words.is_empty() {
            write_dump(&dir.join(REST_DUMP_FILE), self.words.as_bytes());
        }
        for (i, span) in self.words.history().enumerate() {
            write_dump(&dir.join(format!("pixie_binary_last_{}_debug.bin", i)), span);
        }
    }
}

fn write_dump(path: &Path, data: &[u8]) {
    match std::fs::write(path, data) {
        Ok(()) => info!(path = %path.display(), bytes = data.len(), "Saved debug dump"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to write debug dump"),
    }
}

/// Decode raw trace bytes into 16-bit Little-Endian samples
pub fn decode_trace(raw: &[u8]) -> DecodeResult<Vec<u16>> {
    if raw.len() % SAMPLE_SIZE != 0 {
        return Err(DecodeError::MalformedTrace { bytes: raw.len() });
    }
    Ok(raw
        .chunks_exact(SAMPLE_SIZE)
        .map(|s| u16::from_le_bytes([s[0], s[1]]))
        .collect())
}

/// Iterator returned by [`EventDecoder::iter_events`]
pub struct Events<'a> {
    decoder: &'a mut EventDecoder,
    done: bool,
}

impl Iterator for Events<'_> {
    type Item = DecodeResult<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.decoder.pop() {
            Ok(event) => Some(Ok(event)),
            Err(e) if e.is_incomplete() => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for Events<'_> {}
