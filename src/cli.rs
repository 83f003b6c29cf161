use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "kylie", author, version, about)]
pub struct Cli {
    /// KYLIE command file
    pub input: PathBuf,

    /// Directory holding the snapshot dumps and spectral grid; spectra are
    /// written here too
    #[arg(short, long, default_value = ".", env = "KYLIE_WORK_DIR")]
    pub work_dir: PathBuf,

    /// Observer distance in parsecs
    #[arg(short, long, default_value_t = 10.0)]
    pub distance: f64,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,
}
