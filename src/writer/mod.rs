//! Output artifacts: ECSV spectra and binary mesh snapshots.
pub mod bin;
pub mod ecsv;
