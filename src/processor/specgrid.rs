//! Spectroscopic intensity service interface.
//!
//! The disk integrator only needs three things from a spectral grid: a
//! cache window hint, disk-averaged fluxes, and specific intensities at a
//! given viewing cosine. Queries return one value per wavelength bin, so
//! `lam` of length `n + 1` yields `n` values.
//!
//! [`PlanckGrid`] is a built-in analytic implementation, described by a
//! small JSON file:
//!
//! ```json
//! { "limb_u": 0.6 }
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{KylieError, KylieResult};
use crate::model::ParamMap;

pub trait IntensityService {
    /// Wavelength range (Å) that later queries are expected to fall in.
    /// Must be called before any query.
    fn set_cache_window(&mut self, lam_min: f64, lam_max: f64);

    /// Bin-averaged surface flux (erg cm^-2 s^-1 Å^-1).
    fn flux(&self, params: &ParamMap, lam: &[f64]) -> KylieResult<Vec<f64>>;

    /// Bin-averaged specific intensity (erg cm^-2 s^-1 Å^-1 sr^-1) at
    /// viewing cosine `mu`.
    fn intensity(&self, params: &ParamMap, mu: f64, lam: &[f64]) -> KylieResult<Vec<f64>>;
}

// cgs
const H_PLANCK: f64 = 6.626_070_15e-27; // erg s
const C_CGS: f64 = 2.997_924_58e10; // cm s^-1
const K_BOLTZMANN: f64 = 1.380_649e-16; // erg K^-1
const CM_PER_ANGSTROM: f64 = 1e-8;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PlanckGridConfig {
    /// Linear limb-darkening coefficient used by `intensity`
    #[serde(default)]
    pub limb_u: f64,
}

/// Black-body photospheres with a linear limb-darkening law.
///
/// Only `Teff` is read from the parameter set; everything else is
/// accepted and ignored.
#[derive(Debug, Clone)]
pub struct PlanckGrid {
    config: PlanckGridConfig,
    cache_window: Option<(f64, f64)>,
}

impl PlanckGrid {
    pub fn new(config: PlanckGridConfig) -> Self {
        Self {
            config,
            cache_window: None,
        }
    }

    pub fn load(path: &Path) -> KylieResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| KylieError::io(path, e))?;
        let config: PlanckGridConfig = serde_json::from_str(&text)
            .map_err(|e| KylieError::Service(format!("{}: {e}", path.display())))?;
        debug!("loaded Planck grid {:?} from {}", config, path.display());
        Ok(Self::new(config))
    }

    pub fn cache_window(&self) -> Option<(f64, f64)> {
        self.cache_window
    }

    fn teff(&self, params: &ParamMap) -> KylieResult<f64> {
        if self.cache_window.is_none() {
            return Err(KylieError::Service(
                "queried before the cache window was set".into(),
            ));
        }
        match params.get("Teff").and_then(|v| v.as_f64()) {
            Some(t) if t > 0.0 => Ok(t),
            _ => Err(KylieError::Service(format!(
                "photospheric parameters lack a positive Teff: {params:?}"
            ))),
        }
    }
}

/// Planck specific intensity B_λ(T) at `lam` Å, per Å.
pub fn planck(lam: f64, teff: f64) -> f64 {
    let lam_cm = lam * CM_PER_ANGSTROM;
    let x = H_PLANCK * C_CGS / (lam_cm * K_BOLTZMANN * teff);
    2.0 * H_PLANCK * C_CGS * C_CGS / lam_cm.powi(5) / x.exp_m1() * CM_PER_ANGSTROM
}

fn bin_centers(lam: &[f64]) -> impl Iterator<Item = f64> + '_ {
    lam.windows(2).map(|w| 0.5 * (w[0] + w[1]))
}

impl IntensityService for PlanckGrid {
    fn set_cache_window(&mut self, lam_min: f64, lam_max: f64) {
        debug!("cache window {lam_min:.4} - {lam_max:.4} Å");
        self.cache_window = Some((lam_min, lam_max));
    }

    fn flux(&self, params: &ParamMap, lam: &[f64]) -> KylieResult<Vec<f64>> {
        let teff = self.teff(params)?;
        Ok(bin_centers(lam)
            .map(|l| std::f64::consts::PI * planck(l, teff))
            .collect())
    }

    /// Normalized so that integrating over the visible hemisphere gives
    /// back `flux`.
    fn intensity(&self, params: &ParamMap, mu: f64, lam: &[f64]) -> KylieResult<Vec<f64>> {
        let teff = self.teff(params)?;
        let u = self.config.limb_u;
        let weight = (1.0 - u * (1.0 - mu)) / (1.0 - u / 3.0);
        Ok(bin_centers(lam).map(|l| weight * planck(l, teff)).collect())
    }
}

/// Default loader for the `specgrid` command's `file_name`.
pub fn load_specgrid(path: &Path) -> KylieResult<PlanckGrid> {
    PlanckGrid::load(path)
}
