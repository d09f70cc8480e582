//! popfit CLI
//!
//! Score a simulated trajectory against observations, or merge the
//! resulting records into one table.

#[cfg(feature = "cli")]
use anyhow::Result;
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use tracing::info;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "popfit")]
#[command(about = "Distribution-matching costs for population model calibration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Score one trajectory and write its record
    Evaluate {
        /// Trajectory JSON file
        #[arg(long)]
        trajectory: PathBuf,

        /// Observation CSV file
        #[arg(long)]
        observations: PathBuf,

        /// Config file (JSON/YAML) or preset name
        #[arg(long, default_value = "pooled_august")]
        config: String,

        /// Species to compare, overriding the config
        #[arg(long)]
        species: Option<String>,

        /// Model parameters as NAME=VALUE
        #[arg(long = "param")]
        params: Vec<String>,

        /// Output directory for the record
        #[arg(long, default_value = "records")]
        out: PathBuf,
    },

    /// Merge every record in a directory
    Merge {
        /// Directory holding popfit_*.json records
        #[arg(long)]
        dir: PathBuf,

        /// Merged JSON output
        #[arg(long)]
        out: PathBuf,

        /// Also write a CSV table
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

#[cfg(feature = "cli")]
fn main() -> Result<()> {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Evaluate {
            trajectory,
            observations,
            config,
            species,
            params,
            out,
        } => {
            let mut config = popfit_cli::resolve_config(&config)?;
            if species.is_some() {
                config.observations.species = species;
            }
            let params = popfit_cli::parse_params(&params)?;
            info!("Pipeline: {}", config.pipeline);

            let record = popfit_cli::evaluate_files(config, &trajectory, &observations, &params)?;
            let path = popfit_cli::write_record(&out, &record)?;

            match &record.error {
                Some(error) => info!("Evaluation failed: {}", error),
                None => info!(
                    "Status {:?}, cost {}",
                    record.status,
                    record.costs.as_ref().map_or(f64::NAN, |c| c.headline())
                ),
            }
            info!("Record written to {}", path.display());
        }

        Commands::Merge { dir, out, csv } => {
            let files = popfit_cli::record_files(&dir)?;
            info!("Merging {} record files from {}", files.len(), dir.display());
            let (merged, _skipped) = popfit_cli::merge_records(&files)?;

            let json = serde_json::to_string_pretty(&merged)?;
            std::fs::write(&out, json)?;
            info!("Merged table written to {}", out.display());

            if let Some(csv) = csv {
                merged.write_csv(&csv)?;
                info!("CSV table written to {}", csv.display());
            }
        }
    }

    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("popfit CLI is not available. Enable the 'cli' feature to use it.");
    std::process::exit(1);
}
