use anyhow::{Context, Result};
use clap::Parser;
use linkedin_etl::{EtlConfig, JobMode, Pipeline, VERSION};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "linkedin-etl")]
#[command(about = "Normalize LinkedIn page exports into per-category CSV series", long_about = None)]
struct Cli {
    /// Extraction folders to process, in order (default: every folder in raw_dir)
    #[arg(value_name = "FOLDER")]
    folders: Vec<String>,

    /// TOML config file (default: linkedin_etl.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding one subdirectory per extraction
    #[arg(long)]
    raw_dir: Option<PathBuf>,

    /// Directory the category series are written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Merge into existing series instead of rebuilding them
    #[arg(long, default_value_t = false)]
    append: bool,

    /// Write the job report as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut config =
        EtlConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(raw_dir) = cli.raw_dir {
        config.raw_dir = raw_dir;
    }
    if let Some(output_dir) = cli.output_dir {
        config.output_dir = output_dir;
    }
    if cli.append {
        config.mode = JobMode::Append;
    }

    info!(version = VERSION, raw_dir = %config.raw_dir.display(), "linkedin-etl");

    let pipeline = Pipeline::new(config);
    let folders = if cli.folders.is_empty() {
        pipeline
            .available_batches()
            .context("Failed to list extraction folders")?
    } else {
        cli.folders
    };

    let report = pipeline.run_job(&folders).context("ETL job failed")?;

    if let Some(path) = cli.report {
        let json = serde_json::to_string_pretty(&report).context("Failed to encode job report")?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write job report to {}", path.display()))?;
        info!(path = %path.display(), "Wrote job report");
    }

    info!(run_id = %report.run_id, batches = report.batches.len(), "Done");
    Ok(())
}
