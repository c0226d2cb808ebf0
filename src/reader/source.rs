//! Byte sources feeding the list-mode decoder
//!
//! A source hands out up to N bytes per call and says when it has run dry.
//! Chunk boundaries carry no meaning; the decoder reassembles events.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::PathBuf;

use bytes::{Bytes, BytesMut};
use tracing::debug;

use super::ReaderError;

/// Anything that can be asked for more bytes
pub trait ByteSource {
    /// Return up to `size` bytes
    ///
    /// May return fewer bytes than asked for. An empty result means no more
    /// data, unless `size` was 0.
    fn pop(&mut self, size: usize) -> Result<Bytes, ReaderError>;

    /// True once every byte has been handed out
    fn is_exhausted(&self) -> bool;
}

/// Streams bytes from an ordered list of files as if they were one
pub struct FileChain {
    files: Vec<PathBuf>,
    index: usize,
    current: Option<BufReader<File>>,
    exhausted: bool,
}

impl FileChain {
    pub fn new<P: Into<PathBuf>>(files: impl IntoIterator<Item = P>) -> Self {
        let files: Vec<PathBuf> = files.into_iter().map(Into::into).collect();
        let exhausted = files.is_empty();
        Self {
            files,
            index: 0,
            current: None,
            exhausted,
        }
    }

    /// File currently being read
    pub fn current_file(&self) -> Option<&PathBuf> {
        if self.exhausted {
            None
        } else {
            self.files.get(self.index)
        }
    }

    fn reader(&mut self) -> Result<&mut BufReader<File>, ReaderError> {
        let reader = match self.current.take() {
            Some(reader) => reader,
            None => {
                let path = &self.files[self.index];
                let file = File::open(path).map_err(|source| ReaderError::Open {
                    path: path.clone(),
                    source,
                })?;
                debug!(path = %path.display(), "Opened list-mode file");
                BufReader::new(file)
            }
        };
        Ok(self.current.insert(reader))
    }

    fn go_to_next_file(&mut self) {
        self.current = None;
        self.index += 1;
        if self.index >= self.files.len() {
            self.exhausted = true;
        }
    }
}

impl ByteSource for FileChain {
    fn pop(&mut self, size: usize) -> Result<Bytes, ReaderError> {
        let mut buf = Vec::new();
        while buf.len() < size && !self.exhausted {
            let wanted = size - buf.len();
            let reader = self.reader()?;
            let n = reader.by_ref().take(wanted as u64).read_to_end(&mut buf)?;
            if n < wanted {
                self.go_to_next_file();
            }
        }
        Ok(Bytes::from(buf))
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

/// Largest single read handed out by [`ReaderSource`]
pub const MAX_READ_SIZE: usize = 1 << 20;

/// Wraps any reader (cursor, pipe, connected socket)
///
/// Each `pop` issues a single `read`, so bytes that already arrived are
/// returned without waiting for the rest of the requested size.
pub struct ReaderSource<R> {
    reader: R,
    exhausted: bool,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            exhausted: false,
        }
    }
}

impl<R: Read> ByteSource for ReaderSource<R> {
    fn pop(&mut self, size: usize) -> Result<Bytes, ReaderError> {
        if self.exhausted || size == 0 {
            return Ok(Bytes::new());
        }
        let mut buf = BytesMut::zeroed(size.min(MAX_READ_SIZE));
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => {
                    self.exhausted = true;
                    return Ok(Bytes::new());
                }
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(buf.freeze());
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn temp_file(name: &str, data: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "pixie16-source-{}-{}.bin",
            std::process::id(),
            name
        ));
        std::fs::write(&path, data).unwrap();
        path
    }

    /// Reader handing out its data in fixed pieces, one per `read`
    struct ShortReads {
        pieces: Vec<Vec<u8>>,
    }

    impl Read for ShortReads {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pieces.is_empty() {
                return Ok(0);
            }
            let piece = &mut self.pieces[0];
            let n = piece.len().min(buf.len());
            buf[..n].copy_from_slice(&piece[..n]);
            piece.drain(..n);
            if piece.is_empty() {
                self.pieces.remove(0);
            }
            Ok(n)
        }
    }

    #[test]
    fn test_reader_source_chunks() {
        let mut source = ReaderSource::new(Cursor::new(vec![1u8, 2, 3, 4, 5]));
        assert_eq!(&source.pop(2).unwrap()[..], &[1, 2]);
        assert!(!source.is_exhausted());
        assert_eq!(&source.pop(10).unwrap()[..], &[3, 4, 5]);
        assert!(!source.is_exhausted());
        assert!(source.pop(10).unwrap().is_empty());
        assert!(source.is_exhausted());
        assert!(source.pop(10).unwrap().is_empty());
    }

    #[test]
    fn test_reader_source_returns_short_reads() {
        let mut source = ReaderSource::new(ShortReads {
            pieces: vec![vec![1, 2, 3], vec![4, 5]],
        });
        assert_eq!(&source.pop(1_000_000_000).unwrap()[..], &[1, 2, 3]);
        assert_eq!(&source.pop(1_000_000_000).unwrap()[..], &[4, 5]);
        assert!(!source.is_exhausted());
        assert!(source.pop(1_000_000_000).unwrap().is_empty());
        assert!(source.is_exhausted());
    }

    #[test]
    fn test_reader_source_zero_size() {
        let mut source = ReaderSource::new(Cursor::new(vec![1u8]));
        assert!(source.pop(0).unwrap().is_empty());
        assert!(!source.is_exhausted());
    }

    #[test]
    fn test_empty_file_list_is_exhausted() {
        let chain = FileChain::new(Vec::<PathBuf>::new());
        assert!(chain.is_exhausted());
        assert!(chain.current_file().is_none());
    }

    #[test]
    fn test_file_chain_crosses_file_boundaries() {
        let a = temp_file("chain-a", &[1, 2, 3]);
        let b = temp_file("chain-b", &[4, 5, 6, 7]);
        let mut chain = FileChain::new([a.clone(), b.clone()]);

        assert_eq!(&chain.pop(2).unwrap()[..], &[1, 2]);
        assert_eq!(chain.current_file(), Some(&a));
        assert_eq!(&chain.pop(3).unwrap()[..], &[3, 4, 5]);
        assert_eq!(chain.current_file(), Some(&b));
        assert!(!chain.is_exhausted());
        assert_eq!(&chain.pop(5).unwrap()[..], &[6, 7]);
        assert!(chain.is_exhausted());

        std::fs::remove_file(a).unwrap();
        std::fs::remove_file(b).unwrap();
    }

    #[test]
    fn test_file_chain_exact_size_then_empty() {
        let a = temp_file("chain-exact", &[9, 9, 9, 9]);
        let mut chain = FileChain::new([a.clone()]);
        assert_eq!(chain.pop(4).unwrap().len(), 4);
        assert!(!chain.is_exhausted());
        assert!(chain.pop(4).unwrap().is_empty());
        assert!(chain.is_exhausted());
        std::fs::remove_file(a).unwrap();
    }

    #[test]
    fn test_missing_file_reports_path() {
        let missing = std::env::temp_dir().join("pixie16-definitely-missing.bin");
        let mut chain = FileChain::new([missing.clone()]);
        match chain.pop(4) {
            Err(ReaderError::Open { path, .. }) => assert_eq!(path, missing),
            other => panic!("expected open error, got {:?}", other.map(|b| b.len())),
        }
    }
}
