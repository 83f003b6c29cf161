//! The functional core: turns a parsed command file into spectra.
//!
//! A run reads its command file, builds the wavelength grids, primes the
//! intensity service, then for every field reads the mesh snapshot,
//! integrates each grid and writes one `.ecsv` spectrum.
pub mod grid;
pub mod integrate;
pub mod specgrid;

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{KylieError, KylieResult};
use crate::model::{CommandFile, ParamMap, Spectrum, Value};
use crate::parser::{self, Cardinality, GrammarRules};
use crate::reader;
use crate::writer;
use grid::{WavelengthGrid, cache_window};
use integrate::{DEFAULT_DISTANCE_PC, IntegrationSettings, integrate_flux};
use specgrid::{IntensityService, load_specgrid};

/// Process-level settings that do not live in the command file.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Directory snapshot stubs, the specgrid file and outputs resolve against
    pub work_dir: PathBuf,
    pub distance_pc: f64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            distance_pc: DEFAULT_DISTANCE_PC,
        }
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    /// Spectrum files, in field order
    pub written: Vec<PathBuf>,
}

/// Command cardinalities of a KYLIE input file.
pub fn kylie_rules() -> GrammarRules {
    GrammarRules::new()
        .rule("fields", Cardinality::exactly(1))
        .rule("waveband", Cardinality::unbounded())
        .rule("wavepoint", Cardinality::unbounded())
        .rule("specgrid", Cardinality::exactly(1))
}

/// Everything a run needs, pulled out of the command file.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub grids: Vec<WavelengthGrid>,
    pub specgrid_file: String,
    pub extra: ParamMap,
    pub limb_u: Option<f64>,
    pub dump_filestub: String,
    pub number_of_fields: usize,
}

fn require<'a>(params: &'a ParamMap, command: &str, name: &str) -> KylieResult<&'a Value> {
    params
        .get(name)
        .ok_or_else(|| KylieError::Config(format!("`{command}` has no `{name}` parameter")))
}

fn require_f64(params: &ParamMap, command: &str, name: &str) -> KylieResult<f64> {
    let v = require(params, command, name)?;
    v.as_f64()
        .ok_or_else(|| KylieError::Config(format!("`{command}.{name}` is not a number: {v}")))
}

fn require_str(params: &ParamMap, command: &str, name: &str) -> KylieResult<String> {
    // numeric values are taken in their coerced form (`01` reads as `1`)
    match require(params, command, name)? {
        Value::Bool(_) => Err(KylieError::Config(format!(
            "`{command}.{name}` needs a value"
        ))),
        v => Ok(v.to_string()),
    }
}

fn single<'a>(comms: &'a CommandFile, command: &str) -> KylieResult<&'a ParamMap> {
    comms
        .first(command)
        .ok_or_else(|| KylieError::Config(format!("no `{command}` command")))
}

impl RunPlan {
    pub fn from_commands(comms: &CommandFile) -> KylieResult<Self> {
        let mut grids = Vec::new();
        for p in comms.entries("waveband") {
            grids.push(WavelengthGrid::band(
                require_f64(p, "waveband", "start_wavelength")?,
                require_f64(p, "waveband", "finish_wavelength")?,
                require_f64(p, "waveband", "wavelength_resolution")?,
            )?);
        }
        for p in comms.entries("wavepoint") {
            grids.push(WavelengthGrid::point(require_f64(p, "wavepoint", "wavelength")?)?);
        }
        if grids.is_empty() {
            return Err(KylieError::Config("no wavelength points defined".into()));
        }

        let sg = single(comms, "specgrid")?;
        let specgrid_file = require_str(sg, "specgrid", "file_name")?;
        let extra = sg
            .iter()
            .filter(|(k, _)| *k != "file_name")
            .map(|(k, v)| (k, v.clone()))
            .collect();

        let fields = single(comms, "fields")?;
        let limb_u = if fields.contains_key("limb_u_override") {
            Some(require_f64(fields, "fields", "limb_u_override")?)
        } else {
            None
        };
        let dump_filestub = require_str(fields, "fields", "dump_filestub")?;
        let n = require(fields, "fields", "number_of_fields")?;
        let number_of_fields = n
            .as_i64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| {
                KylieError::Config(format!(
                    "`fields.number_of_fields` must be a non-negative integer, got {n}"
                ))
            })?;

        Ok(Self {
            grids,
            specgrid_file,
            extra,
            limb_u,
            dump_filestub,
            number_of_fields,
        })
    }

    /// Snapshot file name of field `index` (1-based).
    pub fn model_file_name(&self, index: usize) -> String {
        format!("{}{:03}", self.dump_filestub, index)
    }
}

/// Perform a KYLIE run with the built-in Planck spectral grid.
pub fn run_kylie(command_file: &Path, options: &RunOptions) -> KylieResult<RunSummary> {
    run_kylie_with(command_file, options, load_specgrid)
}

/// Perform a KYLIE run, loading the spectral grid with `load`.
pub fn run_kylie_with<S, F>(
    command_file: &Path,
    options: &RunOptions,
    load: F,
) -> KylieResult<RunSummary>
where
    S: IntensityService,
    F: FnOnce(&Path) -> KylieResult<S>,
{
    let comms = parser::parse_comm_file(command_file, Some(&kylie_rules()))?;
    let plan = RunPlan::from_commands(&comms)?;
    debug!("{} wavelength grids, {} fields", plan.grids.len(), plan.number_of_fields);

    let mut service = load(&options.work_dir.join(&plan.specgrid_file))?;

    // the service must know its window before the first query
    let (lam_min, lam_max) = cache_window(&plan.grids)
        .ok_or_else(|| KylieError::Config("no wavelength points defined".into()))?;
    service.set_cache_window(lam_min, lam_max);

    let settings = IntegrationSettings {
        distance_pc: options.distance_pc,
        limb_u: plan.limb_u,
        extra: plan.extra.clone(),
    };

    let mut summary = RunSummary::default();
    for index in 1..=plan.number_of_fields {
        let path = run_field(&plan, index, &service, &settings, &options.work_dir)?;
        info!("Written file {}", path.display());
        summary.written.push(path);
    }
    Ok(summary)
}

fn run_field<S: IntensityService>(
    plan: &RunPlan,
    index: usize,
    service: &S,
    settings: &IntegrationSettings,
    work_dir: &Path,
) -> KylieResult<PathBuf> {
    let model_file_name = plan.model_file_name(index);
    let table = reader::read_snapshot(&work_dir.join(&model_file_name))?;

    let mut spec = Spectrum::default();
    for grid in &plan.grids {
        let flux = integrate_flux(&table, service, grid.edges(), settings)?;
        spec.extend(&grid.centers(), &flux);
    }

    spec.meta.insert("model_file", Value::Str(model_file_name.clone()));
    spec.meta.insert("field", Value::Int(index as i64));
    spec.meta.insert("time", Value::Float(table.time));
    spec.meta.insert("n_vis", Value::Int(table.n_vis as i64));

    let spec_path = work_dir.join(format!("{model_file_name}.ecsv"));
    writer::ecsv::emit(&spec, &spec_path)?;
    Ok(spec_path)
}
