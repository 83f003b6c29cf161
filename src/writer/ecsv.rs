//! Emit spectra as ECSV (Enhanced Character Separated Values) tables.
//!
//! The file starts with a commented YAML header describing the columns,
//! followed by a space-delimited body:
//!
//! ```text
//! # %ECSV 1.0
//! # ---
//! # datatype:
//! # - name: wavelength
//! # ...
//! wavelength flux
//! 4999.5 1.2e-12
//! ```

use crate::error::{KylieError, KylieResult};
use crate::model::{Spectrum, Value};
use serde::Serialize;
use serde_yaml::Mapping;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

const SCHEMA: &str = "astropy-2.0";

#[derive(Serialize)]
struct Column<'a> {
    name: &'a str,
    unit: &'a str,
    datatype: &'a str,
}

#[derive(Serialize)]
struct Header<'a> {
    datatype: Vec<Column<'a>>,
    #[serde(skip_serializing_if = "Mapping::is_empty")]
    meta: Mapping,
    schema: &'a str,
}

fn yaml_value(v: &Value) -> serde_yaml::Value {
    match v {
        Value::Bool(b) => (*b).into(),
        Value::Int(i) => (*i).into(),
        Value::Float(x) => (*x).into(),
        Value::Str(s) => s.as_str().into(),
    }
}

fn header_yaml(spec: &Spectrum) -> Result<String, serde_yaml::Error> {
    let meta = spec
        .meta
        .iter()
        .map(|(k, v)| (k.into(), yaml_value(v)))
        .collect();
    let header = Header {
        datatype: vec![
            Column {
                name: "wavelength",
                unit: Spectrum::WAVELENGTH_UNIT,
                datatype: "float64",
            },
            Column {
                name: "flux",
                unit: Spectrum::FLUX_UNIT,
                datatype: "float64",
            },
        ],
        meta,
        schema: SCHEMA,
    };
    serde_yaml::to_string(&header)
}

/// Write the table body and header to any sink.
pub fn write_to<W: Write>(spec: &Spectrum, out: &mut W) -> io::Result<()> {
    let yaml = header_yaml(spec).map_err(io::Error::other)?;

    writeln!(out, "# %ECSV 1.0")?;
    writeln!(out, "# ---")?;
    for line in yaml.lines() {
        writeln!(out, "# {line}")?;
    }

    writeln!(out, "wavelength flux")?;
    for (lam, flux) in spec.wavelength.iter().zip(&spec.flux) {
        writeln!(out, "{lam:?} {flux:e}")?;
    }
    Ok(())
}

/// Write `spec` to `path`, overwriting any existing file.
pub fn emit(spec: &Spectrum, path: &Path) -> KylieResult<()> {
    let file = File::create(path).map_err(|e| KylieError::io(path, e))?;
    let mut out = BufWriter::new(file);
    write_to(spec, &mut out)
        .and_then(|_| out.flush())
        .map_err(|e| KylieError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum() -> Spectrum {
        let mut s = Spectrum::default();
        s.extend(&[5000.0, 5002.0], &[1.5e-12, 2.0e-12]);
        s.meta.insert("time", Value::Float(0.25));
        s.meta.insert("field", Value::Int(1));
        s
    }

    #[test]
    fn test_layout() {
        let mut buf = Vec::new();
        write_to(&spectrum(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[0], "# %ECSV 1.0");
        assert_eq!(lines[1], "# ---");
        assert!(lines.iter().any(|l| l.contains("name: wavelength")));
        assert!(lines.iter().any(|l| l.contains("unit: Angstrom")));
        assert!(lines.iter().any(|l| l.contains("time: 0.25")));
        assert!(lines.iter().any(|l| l.contains("schema: astropy-2.0")));

        let body: Vec<_> = lines.iter().skip_while(|l| l.starts_with('#')).collect();
        assert_eq!(*body[0], "wavelength flux");
        assert_eq!(*body[1], "5000.0 1.5e-12");
        assert_eq!(*body[2], "5002.0 2e-12");
        assert_eq!(body.len(), 3);
    }

    #[test]
    fn test_emit_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_001.ecsv");
        std::fs::write(&path, "stale contents that are much longer than a header").unwrap();

        emit(&spectrum(), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# %ECSV 1.0"));
        assert!(!text.contains("stale"));
    }
}
