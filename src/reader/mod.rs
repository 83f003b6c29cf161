//! Reader for BRUCE mesh snapshot ("dump") files.
//!
//! A snapshot is one header record holding the visible element count
//! (`i32`) and the snapshot time (`f32`), followed by up to that many
//! element records of five `f32` values each:
//! `Teff, V_proj, A_proj, g, mu`.
//!
//! Files are allowed to stop short of the declared count; the table is
//! simply truncated to the elements actually present.

pub mod record;

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{KylieError, KylieResult};
use crate::model::{MeshElement, MeshTable};
use record::{Record, RecordReader, words};

pub const HEADER_BYTES: usize = 8;
pub const ELEMENT_BYTES: usize = 4 * MeshTable::COLUMNS.len();

/// Rows reserved up front; the declared count only bounds the read.
const MAX_PREALLOC_ROWS: usize = 4096;

/// Read one snapshot file into a mesh table.
pub fn read_snapshot(path: &Path) -> KylieResult<MeshTable> {
    let file = File::open(path).map_err(|e| KylieError::io(path, e))?;
    let table = read_snapshot_from(BufReader::new(file), path)?;
    debug!(
        "read {} elements at t = {} from {}",
        table.n_vis,
        table.time,
        path.display()
    );
    Ok(table)
}

/// Read a snapshot from any byte stream. `path` labels errors.
pub fn read_snapshot_from<R: Read>(inner: R, path: &Path) -> KylieResult<MeshTable> {
    let mut rec = RecordReader::new(inner, path);

    let corrupt = |message: String| KylieError::CorruptRecord {
        path: path.to_path_buf(),
        message,
    };

    let header = match rec.next_record()? {
        Record::Data(h) => h,
        Record::Eof | Record::Truncated => return Err(corrupt("missing header record".into())),
    };
    if header.len() != HEADER_BYTES {
        return Err(corrupt(format!(
            "header record is {} bytes, expected {HEADER_BYTES}",
            header.len()
        )));
    }
    let mut w = words(&header);
    let (Some(count), Some(time)) = (w.next(), w.next()) else {
        return Err(corrupt("short header record".into()));
    };
    let count = i32::from_le_bytes(count);
    let time = f32::from_le_bytes(time) as f64;
    let count =
        usize::try_from(count).map_err(|_| corrupt(format!("negative element count {count}")))?;

    let mut table = MeshTable::with_capacity(count.min(MAX_PREALLOC_ROWS), time);

    while table.len() < count {
        let payload = match rec.next_record()? {
            Record::Data(p) => p,
            Record::Eof | Record::Truncated => {
                warn!(
                    "{} ends after {} of {} elements",
                    path.display(),
                    table.len(),
                    count
                );
                break;
            }
        };
        if payload.len() != ELEMENT_BYTES {
            return Err(corrupt(format!(
                "element record {} is {} bytes, expected {ELEMENT_BYTES}",
                table.len(),
                payload.len()
            )));
        }

        let mut v = words(&payload).map(|b| f32::from_le_bytes(b) as f64);
        let mut next = || v.next().unwrap_or(f64::NAN);
        table.push(MeshElement {
            teff: next(),
            v_proj: next(),
            a_proj: next(),
            g: next(),
            mu: next(),
        });
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::writer::bin::SnapshotWriter;

    fn element(i: usize) -> MeshElement {
        MeshElement {
            teff: 6000.0 + i as f64,
            v_proj: -1500.0,
            a_proj: 1.0e16,
            g: 274.0,
            mu: 0.5,
        }
    }

    fn snapshot(declared: i32, present: usize) -> Vec<u8> {
        let mut w = SnapshotWriter::new(Vec::new());
        w.write_header(declared, 12.5).unwrap();
        for i in 0..present {
            w.write_element(&element(i)).unwrap();
        }
        w.into_inner()
    }

    #[test]
    fn test_full_snapshot() {
        let bytes = snapshot(3, 3);
        let t = read_snapshot_from(bytes.as_slice(), Path::new("mem")).unwrap();
        assert_eq!(t.n_vis, 3);
        assert_eq!(t.time, 12.5);
        assert_eq!(t.teff, vec![6000.0, 6001.0, 6002.0]);
        assert_eq!(t.v_proj, vec![-1500.0; 3]);
        assert_eq!(t.mu, vec![0.5; 3]);
    }

    #[test]
    fn test_element_record_holds_every_column() {
        let mut w = SnapshotWriter::new(Vec::new());
        w.write_element(&element(0)).unwrap();
        let bytes = w.into_inner();
        let mut rec = RecordReader::new(bytes.as_slice(), Path::new("mem"));
        match rec.next_record().unwrap() {
            Record::Data(p) => assert_eq!(p.len(), 4 * MeshTable::COLUMNS.len()),
            other => panic!("expected an element record, got {other:?}"),
        }
        assert_eq!(MeshTable::COLUMNS[0], ("Teff", "K"));
    }

    #[test]
    fn test_truncated_snapshot() {
        let bytes = snapshot(10, 4);
        let t = read_snapshot_from(bytes.as_slice(), Path::new("mem")).unwrap();
        assert_eq!(t.n_vis, 4);
        for col in [&t.teff, &t.v_proj, &t.a_proj, &t.g, &t.mu] {
            assert_eq!(col.len(), 4);
        }
    }

    #[test]
    fn test_huge_declared_count_reads_present_elements() {
        let bytes = snapshot(i32::MAX, 4);
        let t = read_snapshot_from(bytes.as_slice(), Path::new("mem")).unwrap();
        assert_eq!(t.n_vis, 4);
        assert_eq!(t.teff, vec![6000.0, 6001.0, 6002.0, 6003.0]);
    }

    #[test]
    fn test_partial_trailing_record_truncates() {
        let mut bytes = snapshot(3, 3);
        bytes.truncate(bytes.len() - 6);
        let t = read_snapshot_from(bytes.as_slice(), Path::new("mem")).unwrap();
        assert_eq!(t.n_vis, 2);
    }

    #[test]
    fn test_extra_records_are_ignored() {
        let bytes = snapshot(2, 5);
        let t = read_snapshot_from(bytes.as_slice(), Path::new("mem")).unwrap();
        assert_eq!(t.n_vis, 2);
    }

    #[test]
    fn test_bad_header() {
        let empty: &[u8] = &[];
        let err = read_snapshot_from(empty, Path::new("mem")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);

        let bytes = snapshot(-1, 0);
        let err = read_snapshot_from(bytes.as_slice(), Path::new("mem")).unwrap_err();
        assert!(err.to_string().contains("negative element count"));
    }

    #[test]
    fn test_wrong_element_width() {
        let mut w = SnapshotWriter::new(Vec::new());
        w.write_header(2, 0.0).unwrap();
        w.write_record(&[0u8; 16]).unwrap();
        let bytes = w.into_inner();
        let err = read_snapshot_from(bytes.as_slice(), Path::new("mem")).unwrap_err();
        assert!(matches!(err, KylieError::CorruptRecord { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = read_snapshot(Path::new("/nonexistent/run_001")).unwrap_err();
        assert!(matches!(err, KylieError::Io { .. }));
    }
}
