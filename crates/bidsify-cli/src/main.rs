use anyhow::Result;
use bidsify_lib::PipelineConfig;
use clap::Parser;
use env_logger::Env;
use log::info;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "bidsify",
    version,
    about = "Convert the EDF recordings listed in info.csv into a BIDS dataset"
)]
struct Cli {
    /// Directory holding info.csv, the metadata JSON files and the recordings
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// TOML file overriding file names and conversion settings
    #[arg(long)]
    config: Option<PathBuf>,
    /// Power-line frequency (Hz) written to every EEG sidecar
    #[arg(long)]
    line_freq: Option<f64>,
    /// Logging verbosity (e.g., debug, info, warn)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_toml_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(data_dir) = cli.data_dir {
        config = config.with_data_dir(data_dir);
    }
    if let Some(line_freq) = cli.line_freq {
        config = config.with_line_freq(line_freq);
    }

    let summary = bidsify_lib::run(&config)?;
    info!(
        "converted {} recording(s), skipped {}, enriched {} sidecar(s) ({} unreadable)",
        summary.converted,
        summary.skipped.len(),
        summary.sidecars.updated,
        summary.sidecars.skipped
    );
    Ok(())
}
