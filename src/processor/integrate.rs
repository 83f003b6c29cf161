//! Disk integration of per-element spectra into one observed flux.

use std::f64::consts::PI;

use crate::error::{KylieError, KylieResult};
use crate::model::{MeshElement, MeshTable, PARSEC, ParamMap, SPEED_OF_LIGHT, Value};
use crate::processor::specgrid::IntensityService;

pub const DEFAULT_DISTANCE_PC: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationSettings {
    /// Observer distance (pc)
    pub distance_pc: f64,
    /// Linear limb-darkening coefficient; `None` leaves the angular
    /// dependence to the intensity service.
    pub limb_u: Option<f64>,
    /// Extra photospheric parameters passed on to the service
    pub extra: ParamMap,
}

impl Default for IntegrationSettings {
    fn default() -> Self {
        Self {
            distance_pc: DEFAULT_DISTANCE_PC,
            limb_u: None,
            extra: ParamMap::new(),
        }
    }
}

/// Photospheric parameters for one element: `extra` plus `Teff` and
/// `log(g)` (cgs), the element's own values winning.
pub fn photosphere(extra: &ParamMap, e: &MeshElement) -> ParamMap {
    let mut x = extra.clone();
    x.insert("Teff", Value::Float(e.teff));
    // m s^-2 -> log10 of cm s^-2
    x.insert("log(g)", Value::Float(e.g.log10() + 2.0));
    x
}

/// Rest-frame wavelengths seen by an element moving at `v_proj` (m/s).
pub fn doppler_shift(lam: &[f64], v_proj: f64) -> Vec<f64> {
    let factor = 1.0 - v_proj / SPEED_OF_LIGHT;
    lam.iter().map(|l| l / factor).collect()
}

/// Linear limb-darkening weight turning a flux into an intensity at `mu`.
pub fn limb_weight(u: f64, mu: f64) -> f64 {
    (1.0 - u * (1.0 - mu)) / (PI * (1.0 - u / 3.0))
}

/// Sum the contributions of every element in `table` into bins delimited
/// by `edges` (Å). Returns `edges.len() - 1` fluxes in erg cm^-2 s^-1 Å^-1.
pub fn integrate_flux<S: IntensityService + ?Sized>(
    table: &MeshTable,
    service: &S,
    edges: &[f64],
    settings: &IntegrationSettings,
) -> KylieResult<Vec<f64>> {
    if edges.len() < 2 {
        return Err(KylieError::Config(format!(
            "cannot integrate over {} wavelength edges",
            edges.len()
        )));
    }
    let n_bins = edges.len() - 1;
    let dilution = (settings.distance_pc * PARSEC).powi(2);
    let mut flux = vec![0.0; n_bins];

    for e in table.rows() {
        let x = photosphere(&settings.extra, &e);
        let lam = doppler_shift(edges, e.v_proj);

        let values = match settings.limb_u {
            Some(u) => {
                let w = limb_weight(u, e.mu);
                let mut f = service.flux(&x, &lam)?;
                f.iter_mut().for_each(|v| *v *= w);
                f
            }
            None => service.intensity(&x, e.mu, &lam)?,
        };

        if values.len() != n_bins {
            return Err(KylieError::Service(format!(
                "service returned {} values for {n_bins} bins",
                values.len()
            )));
        }

        for (acc, v) in flux.iter_mut().zip(&values) {
            *acc += v * e.a_proj / dilution;
        }
    }

    Ok(flux)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::cell::RefCell;

    /// Constant-valued service that remembers what it was asked.
    struct Flat {
        value: f64,
        seen: RefCell<Vec<(ParamMap, Vec<f64>)>>,
    }

    impl Flat {
        fn new(value: f64) -> Self {
            Self {
                value,
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl IntensityService for Flat {
        fn set_cache_window(&mut self, _: f64, _: f64) {}

        fn flux(&self, params: &ParamMap, lam: &[f64]) -> KylieResult<Vec<f64>> {
            self.seen.borrow_mut().push((params.clone(), lam.to_vec()));
            Ok(vec![self.value; lam.len() - 1])
        }

        fn intensity(&self, params: &ParamMap, _mu: f64, lam: &[f64]) -> KylieResult<Vec<f64>> {
            self.flux(params, lam)
        }
    }

    fn one_row(a_proj: f64, v_proj: f64) -> MeshTable {
        let mut t = MeshTable::with_capacity(1, 0.0);
        t.push(MeshElement {
            teff: 7500.0,
            v_proj,
            a_proj,
            g: 1000.0,
            mu: 0.3,
        });
        t
    }

    #[test]
    fn test_flux_conservation_both_paths() {
        let (i0, area, d) = (2.5e6, 4.0e18, 25.0);
        let edges = [5000.0, 5001.0, 5002.0];
        let expected = i0 * area / (d * PARSEC).powi(2);

        for limb_u in [None, Some(0.0)] {
            let settings = IntegrationSettings {
                distance_pc: d,
                limb_u,
                ..Default::default()
            };
            let svc = Flat::new(i0);
            let flux = integrate_flux(&one_row(area, 0.0), &svc, &edges, &settings).unwrap();
            assert_eq!(flux.len(), 2);
            let scale = if limb_u.is_some() { PI } else { 1.0 };
            for f in flux {
                assert_relative_eq!(f * scale, expected, max_relative = 1e-12);
            }
        }
    }

    #[test]
    fn test_zero_velocity_leaves_wavelengths_unchanged() {
        let edges = [6000.0, 6000.5, 6001.0];
        let svc = Flat::new(1.0);
        integrate_flux(&one_row(1.0, 0.0), &svc, &edges, &Default::default()).unwrap();
        assert_eq!(svc.seen.borrow()[0].1, edges.to_vec());
    }

    #[test]
    fn test_receding_element_is_redshifted_in_rest_frame() {
        let v = 30e3;
        let shifted = doppler_shift(&[5000.0], v);
        assert_relative_eq!(shifted[0], 5000.0 / (1.0 - v / SPEED_OF_LIGHT));
        assert!(shifted[0] > 5000.0);
    }

    #[test]
    fn test_photosphere_parameters() {
        let extra: ParamMap = [
            ("[Fe/H]", Value::Float(-0.5)),
            ("Teff", Value::Float(1.0)),
        ]
        .into_iter()
        .collect();
        let svc = Flat::new(1.0);
        let settings = IntegrationSettings {
            extra,
            ..Default::default()
        };
        integrate_flux(&one_row(1.0, 0.0), &svc, &[5000.0, 5001.0], &settings).unwrap();

        let (x, _) = &svc.seen.borrow()[0];
        assert_eq!(x.get("[Fe/H]"), Some(&Value::Float(-0.5)));
        assert_eq!(x.get("Teff"), Some(&Value::Float(7500.0)));
        // g = 1000 m s^-2 -> 1e5 cm s^-2
        assert_relative_eq!(
            x.get("log(g)").unwrap().as_f64().unwrap(),
            5.0,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_limb_weight() {
        assert_relative_eq!(limb_weight(0.0, 0.2), 1.0 / PI);
        assert_relative_eq!(limb_weight(0.6, 1.0), 1.0 / (PI * 0.8));
        assert_relative_eq!(limb_weight(0.6, 0.0), 0.4 / (PI * 0.8));
    }

    #[test]
    fn test_rows_sum() {
        let mut t = one_row(1.0e18, 0.0);
        t.push(MeshElement {
            teff: 5000.0,
            v_proj: -2e4,
            a_proj: 3.0e18,
            g: 200.0,
            mu: 0.9,
        });
        let svc = Flat::new(1.0);
        let flux = integrate_flux(&t, &svc, &[5000.0, 5001.0], &Default::default()).unwrap();
        let d = (DEFAULT_DISTANCE_PC * PARSEC).powi(2);
        assert_relative_eq!(flux[0], 4.0e18 / d, max_relative = 1e-12);
    }

    #[test]
    fn test_wrong_length_from_service() {
        struct Short;
        impl IntensityService for Short {
            fn set_cache_window(&mut self, _: f64, _: f64) {}
            fn flux(&self, _: &ParamMap, _: &[f64]) -> KylieResult<Vec<f64>> {
                Ok(vec![])
            }
            fn intensity(&self, _: &ParamMap, _: f64, _: &[f64]) -> KylieResult<Vec<f64>> {
                Ok(vec![])
            }
        }
        let err = integrate_flux(&one_row(1.0, 0.0), &Short, &[1.0, 2.0], &Default::default())
            .unwrap_err();
        assert!(matches!(err, KylieError::Service(_)));
    }

    #[test]
    fn test_too_few_edges() {
        let err =
            integrate_flux(&one_row(1.0, 0.0), &Flat::new(1.0), &[1.0], &Default::default())
                .unwrap_err();
        assert!(matches!(err, KylieError::Config(_)));
    }
}
