//! Write BRUCE mesh snapshots in the record layout `reader` expects.

use crate::error::{KylieError, KylieResult};
use crate::model::{MeshElement, MeshTable};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

pub struct SnapshotWriter<W: Write> {
    out: W,
}

impl<W: Write> SnapshotWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// One framed record: length, payload, length.
    pub fn write_record(&mut self, payload: &[u8]) -> io::Result<()> {
        let len = i32::try_from(payload.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "record too large"))?
            .to_le_bytes();
        self.out.write_all(&len)?;
        self.out.write_all(payload)?;
        self.out.write_all(&len)
    }

    /// `count` is written as given, so a header may promise more
    /// elements than follow it.
    pub fn write_header(&mut self, count: i32, time: f32) -> io::Result<()> {
        let mut payload = [0u8; 8];
        payload[..4].copy_from_slice(&count.to_le_bytes());
        payload[4..].copy_from_slice(&time.to_le_bytes());
        self.write_record(&payload)
    }

    pub fn write_element(&mut self, e: &MeshElement) -> io::Result<()> {
        let mut payload = [0u8; 20];
        let values = [e.teff, e.v_proj, e.a_proj, e.g, e.mu];
        for (chunk, v) in payload.chunks_exact_mut(4).zip(values) {
            chunk.copy_from_slice(&(v as f32).to_le_bytes());
        }
        self.write_record(&payload)
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn write_table<W: Write>(table: &MeshTable, out: W) -> io::Result<()> {
    let count = i32::try_from(table.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many elements"))?;

    let mut w = SnapshotWriter::new(out);
    w.write_header(count, table.time as f32)?;
    for e in table.rows() {
        w.write_element(&e)?;
    }
    w.into_inner().flush()
}

/// Write a whole table to `path`, replacing any existing file.
pub fn emit(table: &MeshTable, path: &Path) -> KylieResult<()> {
    let file = File::create(path).map_err(|e| KylieError::io(path, e))?;
    write_table(table, BufWriter::new(file)).map_err(|e| KylieError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_emit_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_001");
        let mut table = MeshTable::with_capacity(1, 2.0);
        table.push(MeshElement {
            teff: 5000.0,
            v_proj: 250.0,
            a_proj: 65536.0,
            g: 100.0,
            mu: 0.75,
        });

        emit(&table, &path).unwrap();
        assert_eq!(crate::reader::read_snapshot(&path).unwrap(), table);
    }

    #[test]
    fn test_emit_error_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("run_001");

        let err = emit(&MeshTable::default(), &path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("run_001"), "{err}");
    }
}
