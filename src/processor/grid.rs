//! Wavelength bin edges and the intensity-service cache window.

use crate::error::{KylieError, KylieResult};
use crate::model::SPEED_OF_LIGHT;

/// Nominal resolving power used for `wavepoint` requests.
pub const POINT_RESOLVING_POWER: f64 = 1e6;

/// Doppler margin applied to the cache window (m/s).
pub const CACHE_MARGIN: f64 = 1000e3;

/// Strictly increasing bin edges (Å).
#[derive(Debug, Clone, PartialEq)]
pub struct WavelengthGrid {
    edges: Vec<f64>,
}

impl WavelengthGrid {
    pub fn from_edges(edges: Vec<f64>) -> KylieResult<Self> {
        if edges.len() < 2 {
            return Err(KylieError::Config(format!(
                "a wavelength grid needs at least 2 edges, got {}",
                edges.len()
            )));
        }
        if edges.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(KylieError::Config(
                "wavelength edges must be strictly increasing".into(),
            ));
        }
        Ok(Self { edges })
    }

    /// Evenly spaced bins whose centers fall on `start, start + res, ...,
    /// finish`; the outer edges sit half a step beyond `start`/`finish`.
    pub fn band(start: f64, finish: f64, resolution: f64) -> KylieResult<Self> {
        if !(resolution > 0.0) {
            return Err(KylieError::Config(format!(
                "wavelength_resolution must be positive, got {resolution}"
            )));
        }
        if !(finish >= start) {
            return Err(KylieError::Config(format!(
                "finish_wavelength {finish} is below start_wavelength {start}"
            )));
        }
        let n = ((finish - start) / resolution).round() as usize + 1;
        let edges = linspace(start - resolution / 2.0, finish + resolution / 2.0, n + 1);
        Self::from_edges(edges)
    }

    /// A single narrow bin centered on `lam`.
    pub fn point(lam: f64) -> KylieResult<Self> {
        let half = 1.0 / (2.0 * POINT_RESOLVING_POWER);
        Self::from_edges(vec![lam * (1.0 - half), lam * (1.0 + half)])
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn n_bins(&self) -> usize {
        self.edges.len() - 1
    }

    pub fn centers(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }

    pub fn min(&self) -> f64 {
        self.edges[0]
    }

    pub fn max(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }
}

/// `n` evenly spaced samples from `a` to `b` inclusive; endpoints exact.
pub fn linspace(a: f64, b: f64, n: usize) -> Vec<f64> {
    match n {
        0 => vec![],
        1 => vec![a],
        _ => {
            let step = (b - a) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { b } else { a + step * i as f64 })
                .collect()
        }
    }
}

/// Cache window covering every grid, widened by [`CACHE_MARGIN`] of
/// Doppler shift either way.
pub fn cache_window(grids: &[WavelengthGrid]) -> Option<(f64, f64)> {
    let lam_min = grids.iter().map(WavelengthGrid::min).reduce(f64::min)?;
    let lam_max = grids.iter().map(WavelengthGrid::max).reduce(f64::max)?;
    let beta = CACHE_MARGIN / SPEED_OF_LIGHT;
    Some((lam_min / (1.0 + beta), lam_max / (1.0 - beta)))
}
