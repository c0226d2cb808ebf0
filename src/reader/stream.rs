//! Chunked list-mode stream
//!
//! Pulls chunks from a [`ByteSource`], feeds them into one decoder and
//! drains the complete events after every chunk. Partial events at chunk
//! boundaries wait in the decoder for the next chunk.

use std::collections::VecDeque;

use tracing::{debug, info};

use super::decoder::{DecoderConfig, Event, EventDecoder, StreamEnd};
use super::source::ByteSource;
use super::{ReaderConfig, ReaderError};
use crate::common::unix_time_secs;

/// Counters collected while streaming
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub chunks_read: u64,
    pub bytes_read: u64,
    pub events_decoded: u64,
    pub trace_samples: u64,
}

/// Iterator of events decoded from a byte source
pub struct ListModeStream<S> {
    source: S,
    decoder: EventDecoder,
    buffer_size: usize,
    stamp_chunks: bool,
    pending: VecDeque<Event>,
    pending_error: Option<ReaderError>,
    end: Option<StreamEnd>,
    finished: bool,
    stats: StreamStats,
}

impl<S: ByteSource> ListModeStream<S> {
    pub fn new(source: S, config: &ReaderConfig) -> Self {
        Self {
            source,
            decoder: EventDecoder::new(DecoderConfig {
                dump_dir: config.dump_dir.clone(),
            }),
            buffer_size: config.buffer_size.max(1),
            stamp_chunks: config.stamp_chunks,
            pending: VecDeque::new(),
            pending_error: None,
            end: None,
            finished: false,
            stats: StreamStats::default(),
        }
    }

    /// How the stream ended; `None` until the source is exhausted
    pub fn end_of_stream(&self) -> Option<StreamEnd> {
        self.end
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Read one chunk and decode everything it completes
    fn fill(&mut self) -> Result<(), ReaderError> {
        let chunk = self.source.pop(self.buffer_size)?;
        let chunk_timestamp = self.stamp_chunks.then(unix_time_secs);
        self.stats.chunks_read += 1;
        self.stats.bytes_read += chunk.len() as u64;
        self.decoder.put(&chunk);

        let before = self.pending.len();
        for result in self.decoder.iter_events() {
            match result {
                Ok(mut event) => {
                    event.chunk_timestamp = chunk_timestamp;
                    self.pending.push_back(event);
                }
                Err(e) => self.pending_error = Some(e.into()),
            }
        }
        let decoded = self.pending.len() - before;
        self.stats.events_decoded += decoded as u64;
        let trace_samples: usize = self
            .pending
            .range(before..)
            .map(|e| e.trace.len())
            .sum();
        self.stats.trace_samples += trace_samples as u64;

        debug!(
            chunk_bytes = chunk.len(),
            events = decoded,
            trace_samples,
            buffered = self.decoder.len(),
            "Chunk decoded"
        );
        Ok(())
    }
}

impl<S: ByteSource> Iterator for ListModeStream<S> {
    type Item = Result<Event, ReaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }
            if let Some(err) = self.pending_error.take() {
                self.finished = true;
                return Some(Err(err));
            }
            if self.finished {
                return None;
            }
            if self.source.is_exhausted() {
                self.finished = true;
                self.end = Some(self.decoder.finish());
                info!(
                    chunks = self.stats.chunks_read,
                    bytes = self.stats.bytes_read,
                    events = self.stats.events_decoded,
                    trace_samples = self.stats.trace_samples,
                    "List-mode stream finished"
                );
                return None;
            }
            if let Err(e) = self.fill() {
                self.finished = true;
                return Some(Err(e));
            }
        }
    }
}
