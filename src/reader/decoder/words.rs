//! Word-granular byte FIFO
//!
//! Bytes go in as arbitrarily sized chunks and come out only as whole
//! 32-bit words. Pixie16 list-mode words are Little Endian, so every
//! non-raw read reverses the bytes inside each word before the bit-field
//! decoder sees them.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};

use crate::common::{DecodeError, DecodeResult, WORD_SIZE};

/// Number of popped spans kept for diagnostic dumps
pub const HISTORY_DEPTH: usize = 5;

/// Byte queue that hands out data in word units
#[derive(Debug, Default)]
pub struct WordQueue {
    buffer: BytesMut,
    history: VecDeque<Bytes>,
}

impl WordQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue pre-filled with `data`
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut queue = Self::new();
        queue.put(data);
        queue
    }

    /// Number of bytes buffered
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Append more bytes to the back of the queue
    pub fn put(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Check that `n_words` whole words are buffered
    pub fn assert_available(&self, n_words: usize) -> DecodeResult<()> {
        let requested = n_words * WORD_SIZE;
        if requested > self.buffer.len() {
            return Err(DecodeError::insufficient(requested, self.buffer.len()));
        }
        Ok(())
    }

    /// Return the first `n_words` words without removing them
    ///
    /// With `raw == false` each word is byte-swapped; with `raw == true`
    /// the bytes are returned exactly as received.
    pub fn peek(&self, n_words: usize, raw: bool) -> DecodeResult<Bytes> {
        let n_bytes = self.readable_bytes(n_words)?;
        let span = &self.buffer[..n_bytes];
        if raw {
            Ok(Bytes::copy_from_slice(span))
        } else {
            Ok(byteswap_words(span))
        }
    }

    /// Remove and return the first `n_words` words
    ///
    /// On error nothing is removed.
    pub fn pop(&mut self, n_words: usize, raw: bool) -> DecodeResult<Bytes> {
        let n_bytes = self.readable_bytes(n_words)?;
        let span = self.buffer.split_to(n_bytes).freeze();
        let out = if raw { span } else { byteswap_words(&span) };

        if self.history.len() == HISTORY_DEPTH {
            self.history.pop_front();
        }
        self.history.push_back(out.clone());

        Ok(out)
    }

    /// Buffered bytes, oldest first
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Most recently popped spans, oldest first
    pub fn history(&self) -> impl Iterator<Item = &Bytes> {
        self.history.iter()
    }

    fn readable_bytes(&self, n_words: usize) -> DecodeResult<usize> {
        if n_words > 0 && self.buffer.is_empty() {
            return Err(DecodeError::Empty);
        }
        self.assert_available(n_words)?;
        Ok(n_words * WORD_SIZE)
    }
}

/// Reverse the byte order inside every 4-byte word of `data`
///
/// `data.len()` must be a multiple of the word size; a trailing partial
/// word is ignored.
pub fn byteswap_words(data: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(data.len());
    for word in data.chunks_exact(WORD_SIZE) {
        out.extend(word.iter().rev());
    }
    out.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_queue_is_empty() {
        let queue = WordQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_put_accumulates_odd_chunks() {
        let mut queue = WordQueue::new();
        queue.put(&[1, 2, 3]);
        queue.put(&[4, 5]);
        assert_eq!(queue.len(), 5);
        assert_eq!(queue.as_bytes(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_peek_byteswaps_each_word() {
        let queue = WordQueue::from_bytes(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
        let words = queue.peek(2, false).unwrap();
        assert_eq!(&words[..], &[0x04, 0x03, 0x02, 0x01, 0x08, 0x07, 0x06, 0x05]);
        assert_eq!(queue.len(), 8);
    }

    #[test]
    fn test_peek_raw_returns_bytes_untouched() {
        let queue = WordQueue::from_bytes(&[0x01, 0x02, 0x03, 0x04]);
        let words = queue.peek(1, true).unwrap();
        assert_eq!(&words[..], &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_pop_removes_from_front() {
        let mut queue = WordQueue::from_bytes(&[1, 2, 3, 4, 5, 6, 7, 8, 9]);
        let first = queue.pop(1, true).unwrap();
        assert_eq!(&first[..], &[1, 2, 3, 4]);
        assert_eq!(queue.len(), 5);
        assert_eq!(queue.as_bytes(), &[5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_empty_queue_reports_empty() {
        let mut queue = WordQueue::new();
        assert_eq!(queue.peek(1, false), Err(DecodeError::Empty));
        assert_eq!(queue.pop(1, true), Err(DecodeError::Empty));
    }

    #[test]
    fn test_zero_words_from_empty_queue() {
        let queue = WordQueue::new();
        assert!(queue.peek(0, false).unwrap().is_empty());
    }

    #[test]
    fn test_partial_word_reports_insufficient_data() {
        let queue = WordQueue::from_bytes(&[1, 2, 3]);
        assert_eq!(
            queue.peek(1, false),
            Err(DecodeError::InsufficientData {
                requested_bytes: 4,
                available_bytes: 3
            })
        );
    }

    #[test]
    fn test_failed_pop_leaves_queue_untouched() {
        let mut queue = WordQueue::from_bytes(&[0xAA; 10]);
        let err = queue.pop(3, false).unwrap_err();
        assert!(err.is_incomplete());
        assert_eq!(queue.len(), 10);
        assert_eq!(queue.history().count(), 0);
    }

    #[test]
    fn test_popped_span_is_independent_of_queue() {
        let mut queue = WordQueue::from_bytes(&[1, 2, 3, 4]);
        let span = queue.pop(1, true).unwrap();
        queue.put(&[9, 9, 9, 9]);
        assert_eq!(&span[..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_history_keeps_last_spans() {
        let mut queue = WordQueue::new();
        for i in 0..8u8 {
            queue.put(&[i, 0, 0, 0]);
        }
        for _ in 0..8 {
            queue.pop(1, true).unwrap();
        }
        let firsts: Vec<u8> = queue.history().map(|span| span[0]).collect();
        assert_eq!(firsts, vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_assert_available() {
        let queue = WordQueue::from_bytes(&[0; 8]);
        assert!(queue.assert_available(2).is_ok());
        assert!(queue.assert_available(3).is_err());
    }

    #[test]
    fn test_byteswap_words_ignores_partial_tail() {
        let swapped = byteswap_words(&[1, 2, 3, 4, 5]);
        assert_eq!(&swapped[..], &[4, 3, 2, 1]);
    }
}
