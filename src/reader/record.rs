//! Sequential unformatted record framing.
//!
//! Every record is laid out as
//!
//! ```text
//! [len: i32 LE] [payload: len bytes] [len: i32 LE]
//! ```
//!
//! and records follow each other with no padding.

use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use crate::error::{KylieError, KylieResult};

/// Upper bound on bytes reserved before a payload is actually read.
const MAX_PREALLOC: usize = 64 * 1024;

/// Outcome of asking for the next record.
#[derive(Debug, PartialEq)]
pub enum Record {
    Data(Vec<u8>),
    /// Stream ended cleanly on a record boundary
    Eof,
    /// Stream ended part-way through a record
    Truncated,
}

pub struct RecordReader<R> {
    inner: R,
    path: PathBuf,
    records: usize,
}

impl<R: Read> RecordReader<R> {
    /// `path` is only used to label errors.
    pub fn new(inner: R, path: &Path) -> Self {
        Self {
            inner,
            path: path.to_path_buf(),
            records: 0,
        }
    }

    /// Number of complete records read so far.
    pub fn records_read(&self) -> usize {
        self.records
    }

    fn corrupt(&self, message: String) -> KylieError {
        KylieError::CorruptRecord {
            path: self.path.clone(),
            message: format!("record {}: {message}", self.records),
        }
    }

    /// Fill `buf` completely; returns how many bytes arrived before EOF.
    fn fill(&mut self, buf: &mut [u8]) -> KylieResult<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(KylieError::io(&self.path, e)),
            }
        }
        Ok(filled)
    }

    fn marker(&mut self) -> KylieResult<Option<i32>> {
        let mut buf = [0u8; 4];
        match self.fill(&mut buf)? {
            4 => Ok(Some(i32::from_le_bytes(buf))),
            _ => Ok(None),
        }
    }

    pub fn next_record(&mut self) -> KylieResult<Record> {
        let mut head = [0u8; 4];
        let len = match self.fill(&mut head)? {
            0 => return Ok(Record::Eof),
            4 => i32::from_le_bytes(head),
            _ => return Ok(Record::Truncated),
        };
        let len = usize::try_from(len).map_err(|_| self.corrupt(format!("negative length {len}")))?;

        // the length prefix is untrusted: grow with the bytes that arrive
        let mut payload = Vec::with_capacity(len.min(MAX_PREALLOC));
        (&mut self.inner)
            .take(len as u64)
            .read_to_end(&mut payload)
            .map_err(|e| KylieError::io(&self.path, e))?;
        if payload.len() < len {
            return Ok(Record::Truncated);
        }

        match self.marker()? {
            None => Ok(Record::Truncated),
            Some(tail) if tail as i64 != len as i64 => Err(self.corrupt(format!(
                "leading length {len} does not match trailing length {tail}"
            ))),
            Some(_) => {
                self.records += 1;
                Ok(Record::Data(payload))
            }
        }
    }
}

/// Split a payload into little-endian 4-byte words.
pub fn words(payload: &[u8]) -> impl Iterator<Item = [u8; 4]> + '_ {
    payload
        .chunks_exact(4)
        .map(|c| [c[0], c[1], c[2], c[3]])
}
