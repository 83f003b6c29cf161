// physical constants (SI)
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0; // m s^-1
pub const PARSEC: f64 = 3.085_677_581_491_367e16; // m

use std::borrow::Cow;
use std::fmt;

use crate::error::{KylieError, KylieResult};

/// A typed parameter value from a command file.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Presence-only flag (`flagOnly`).
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    /// Best-effort coercion of a raw token value: integer, then float,
    /// then the raw string.
    ///
    /// Single `_` separators between digits are accepted (`1_000`).
    /// Integers outside the `i64` range come back as floats.
    pub fn coerce(raw: &str) -> Self {
        let Some(number) = without_separators(raw) else {
            return Value::Str(raw.to_string());
        };
        if let Ok(i) = number.parse::<i64>() {
            return Value::Int(i);
        }
        if let Ok(x) = number.parse::<f64>() {
            return Value::Float(x);
        }
        Value::Str(raw.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// `raw` with its digit separators removed, or `None` when an `_` is not
/// between two digits.
fn without_separators(raw: &str) -> Option<Cow<'_, str>> {
    if !raw.contains('_') {
        return Some(Cow::Borrowed(raw));
    }
    let b = raw.as_bytes();
    let placed = (0..b.len())
        .filter(|&i| b[i] == b'_')
        .all(|i| i > 0 && i + 1 < b.len() && b[i - 1].is_ascii_digit() && b[i + 1].is_ascii_digit());
    placed.then(|| Cow::Owned(raw.replace('_', "")))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            // Debug keeps the `.0` so the value reads back as a float
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s}"),
        }
    }
}

/// Parameters of one `{ ... }` block, in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamMap {
    entries: Vec<(String, Value)>,
}

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite; an existing key keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some((_, v)) => *v = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for ParamMap {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut map = ParamMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// Parsed command file: command name → one parameter map per occurrence.
///
/// Commands keep the order in which they first appear; occurrences of the
/// same command keep file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandFile {
    commands: Vec<(String, Vec<ParamMap>)>,
}

impl CommandFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: &str, params: ParamMap) {
        match self.commands.iter_mut().find(|(name, _)| name == command) {
            Some((_, list)) => list.push(params),
            None => self.commands.push((command.to_string(), vec![params])),
        }
    }

    pub fn get(&self, command: &str) -> Option<&[ParamMap]> {
        self.commands
            .iter()
            .find(|(name, _)| name == command)
            .map(|(_, list)| list.as_slice())
    }

    /// The entries of `command`, empty when the command never appears.
    pub fn entries(&self, command: &str) -> &[ParamMap] {
        self.get(command).unwrap_or(&[])
    }

    pub fn first(&self, command: &str) -> Option<&ParamMap> {
        self.entries(command).first()
    }

    pub fn count(&self, command: &str) -> usize {
        self.entries(command).len()
    }

    pub fn contains(&self, command: &str) -> bool {
        self.get(command).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ParamMap])> {
        self.commands.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Write the structure back out in command-file grammar. Parsing the
    /// result gives back an equal `CommandFile`; anything the grammar
    /// cannot carry (a `false` flag, a string that would read back as a
    /// number, a word with whitespace or comment characters) is an error.
    pub fn to_grammar(&self) -> KylieResult<String> {
        let mut out = String::new();
        for (name, list) in &self.commands {
            if name.is_empty() || !is_bare(name) {
                return Err(unwritable(name, format!("command name {name:?}")));
            }
            for params in list {
                out.push_str(&format!("#{name}\n{{\n"));
                for (param, value) in params.iter() {
                    let word = grammar_word(param, value).ok_or_else(|| {
                        unwritable(name, format!("parameter {param:?} = {value:?}"))
                    })?;
                    out.push_str(&format!("  {word}\n"));
                }
                out.push_str("}\n");
            }
        }
        Ok(out)
    }
}

fn unwritable(command: &str, what: String) -> KylieError {
    KylieError::Syntax {
        origin: "command-file output".to_string(),
        command: Some(command.to_string()),
        message: format!("{what} has no command-file spelling"),
    }
}

/// Survives the lexer as (part of) a single word.
fn is_bare(s: &str) -> bool {
    !s.chars().any(|c| c.is_whitespace() || c == '!' || c == '%')
}

/// The block word that parses back to `param` = `value`, if there is one.
fn grammar_word(param: &str, value: &Value) -> Option<String> {
    if !is_bare(param) || param.starts_with('#') {
        return None;
    }
    match value {
        // a lone word with exactly one `:` would split into param and value
        Value::Bool(true) => (!param.is_empty()
            && param != "{"
            && param != "}"
            && param.matches(':').count() != 1)
            .then(|| param.to_string()),
        Value::Bool(false) => None,
        v => {
            let text = v.to_string();
            let reads_back = is_bare(&text)
                && !param.contains(':')
                && !text.contains(':')
                && Value::coerce(&text) == *v;
            reads_back.then(|| format!("{param}:{text}"))
        }
    }
}

/// One visible surface element of a mesh snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshElement {
    pub teff: f64,
    pub v_proj: f64,
    pub a_proj: f64,
    pub g: f64,
    pub mu: f64,
}

/// Mesh snapshot at one epoch, stored column-wise.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshTable {
    pub teff: Vec<f64>,
    pub v_proj: Vec<f64>,
    pub a_proj: Vec<f64>,
    pub g: Vec<f64>,
    pub mu: Vec<f64>,
    /// Number of elements actually read
    pub n_vis: usize,
    pub time: f64,
}

impl MeshTable {
    /// Column names and units, in record order.
    pub const COLUMNS: [(&'static str, &'static str); 5] = [
        ("Teff", "K"),
        ("V_proj", "m s^-1"),
        ("A_proj", "m^2"),
        ("g", "m s^-2"),
        ("mu", ""),
    ];

    pub fn with_capacity(n: usize, time: f64) -> Self {
        Self {
            teff: Vec::with_capacity(n),
            v_proj: Vec::with_capacity(n),
            a_proj: Vec::with_capacity(n),
            g: Vec::with_capacity(n),
            mu: Vec::with_capacity(n),
            n_vis: 0,
            time,
        }
    }

    pub fn push(&mut self, e: MeshElement) {
        self.teff.push(e.teff);
        self.v_proj.push(e.v_proj);
        self.a_proj.push(e.a_proj);
        self.g.push(e.g);
        self.mu.push(e.mu);
        self.n_vis += 1;
    }

    pub fn len(&self) -> usize {
        self.n_vis
    }

    pub fn is_empty(&self) -> bool {
        self.n_vis == 0
    }

    pub fn rows(&self) -> impl Iterator<Item = MeshElement> + '_ {
        (0..self.n_vis).map(|i| MeshElement {
            teff: self.teff[i],
            v_proj: self.v_proj[i],
            a_proj: self.a_proj[i],
            g: self.g[i],
            mu: self.mu[i],
        })
    }
}

/// Output spectrum: bin centers (Å) and integrated flux
/// (erg cm^-2 s^-1 Å^-1), one entry per bin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Spectrum {
    pub wavelength: Vec<f64>,
    pub flux: Vec<f64>,
    pub meta: ParamMap,
}

impl Spectrum {
    pub const WAVELENGTH_UNIT: &'static str = "Angstrom";
    pub const FLUX_UNIT: &'static str = "erg / (Angstrom cm2 s)";

    /// Append one grid's bins; grids are never merged or re-sorted.
    pub fn extend(&mut self, centers: &[f64], flux: &[f64]) {
        debug_assert_eq!(centers.len(), flux.len());
        self.wavelength.extend_from_slice(centers);
        self.flux.extend_from_slice(flux);
    }

    pub fn len(&self) -> usize {
        self.flux.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flux.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coercion_order() {
        assert_eq!(Value::coerce("5"), Value::Int(5));
        assert_eq!(Value::coerce("5.0"), Value::Float(5.0));
        assert_eq!(Value::coerce("-2e3"), Value::Float(-2000.0));
        assert_eq!(Value::coerce("abc"), Value::Str("abc".into()));
        assert_eq!(Value::coerce(""), Value::Str(String::new()));
    }

    #[test]
    fn coercion_digit_separators() {
        assert_eq!(Value::coerce("1_000"), Value::Int(1000));
        assert_eq!(Value::coerce("-2_500"), Value::Int(-2500));
        assert_eq!(Value::coerce("6_562.8"), Value::Float(6562.8));
        for raw in ["_1", "1_", "1__0", "1_.5", "run_", "a_1"] {
            assert_eq!(Value::coerce(raw), Value::Str(raw.into()), "{raw}");
        }
    }

    #[test]
    fn coercion_wide_integer_falls_back_to_float() {
        assert_eq!(Value::coerce("9223372036854775807"), Value::Int(i64::MAX));
        assert_eq!(
            Value::coerce("9223372036854775808"),
            Value::Float(9_223_372_036_854_775_808.0)
        );
    }

    #[test]
    fn float_display_reads_back_as_float() {
        for x in [5.0, 0.25, 1e-7, -3.5e12] {
            let v = Value::Float(x);
            assert_eq!(Value::coerce(&v.to_string()), v);
        }
    }

    #[test]
    fn param_overwrite_keeps_position() {
        let mut p = ParamMap::new();
        p.insert("a", Value::Int(1));
        p.insert("b", Value::Int(2));
        p.insert("a", Value::Int(3));
        let keys: Vec<_> = p.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["a", "b"]);
        assert_eq!(p.get("a"), Some(&Value::Int(3)));
    }

    #[test]
    fn mesh_columns_stay_aligned() {
        let mut t = MeshTable::with_capacity(2, 1.5);
        let e = MeshElement {
            teff: 6000.0,
            v_proj: 0.0,
            a_proj: 1.0,
            g: 274.0,
            mu: 0.5,
        };
        t.push(e);
        t.push(e);
        assert_eq!(t.len(), 2);
        assert_eq!(t.mu.len(), t.teff.len());
        assert_eq!(t.rows().last(), Some(e));
    }
}
