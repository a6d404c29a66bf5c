//! sweep-bench command line

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sweep_bench::build::{BuildPolicy, Prebuilt};
use sweep_bench::config::{HarnessConfig, HarnessConfigBuilder};
use sweep_bench::experiment::{ExperimentDescriptor, ExperimentKind};
use sweep_bench::merge::{merge, MergePlan};
use sweep_bench::storage::{read_table_path, write_parquet};
use sweep_bench::sweep::SweepDriver;

/// Run MPI programs across a parameter grid and report speedup/efficiency
#[derive(Parser, Debug)]
#[command(name = "sweep-bench", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build, sweep, and print the merged table
    Run {
        /// Source file; its name selects the experiment (first, second, third)
        #[arg(long)]
        filename: PathBuf,

        /// Runs averaged per grid point
        #[arg(long)]
        retries: Option<u32>,

        /// Result table path
        #[arg(long, default_value = "stats.csv")]
        output: PathBuf,

        /// JSON harness config
        #[arg(long)]
        config: Option<PathBuf>,

        /// Also export the merged table to Parquet
        #[arg(long)]
        parquet: Option<PathBuf>,

        /// Use executables already on disk instead of compiling
        #[arg(long)]
        no_build: bool,

        /// Keep going when the compiler fails
        #[arg(long)]
        ignore_build_errors: bool,
    },
    /// Merge an existing result table without running anything
    Merge {
        /// Experiment name or source filename
        #[arg(long)]
        experiment: String,

        /// Result table path
        #[arg(long, default_value = "stats.csv")]
        input: PathBuf,

        /// Also export the merged table to Parquet
        #[arg(long)]
        parquet: Option<PathBuf>,
    },
    /// List built-in experiments
    List,
}

fn descriptor_for(name: &str, config: &HarnessConfig) -> Result<ExperimentDescriptor> {
    let kind = ExperimentKind::resolve(name)?;
    Ok(config.apply(kind.descriptor()?))
}

/// Merge a persisted table, print it, and optionally export it.
fn report(descriptor: &ExperimentDescriptor, table: &Path, parquet: Option<&Path>) -> Result<()> {
    let rows = read_table_path(table, descriptor)
        .with_context(|| format!("reading {}", table.display()))?;
    let merged = merge(&rows, &MergePlan::for_experiment(descriptor))
        .with_context(|| format!("merging {}", table.display()))?;
    print!("{merged}");

    if let Some(path) = parquet {
        write_parquet(&merged.to_table(), path)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "merged table exported");
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Run {
            filename,
            retries,
            output,
            config,
            parquet,
            no_build,
            ignore_build_errors,
        } => {
            let base = match config {
                Some(path) => HarnessConfig::from_json_file(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => HarnessConfig::default(),
            };
            let mut builder = HarnessConfigBuilder::from_config(base);
            if let Some(retries) = retries {
                builder = builder.retries(retries);
            }
            if ignore_build_errors {
                builder = builder.build_policy(BuildPolicy::Proceed);
            }
            let config = builder.build()?;

            let descriptor = descriptor_for(&filename.to_string_lossy(), &config)?;
            info!(experiment = descriptor.name(), title = descriptor.title(), "selected");

            let runner = config.runner()?;
            let record = if no_build {
                SweepDriver::new(descriptor.clone(), Prebuilt, runner)
                    .run(&filename, &output)?
                    .1
            } else {
                SweepDriver::new(descriptor.clone(), config.toolchain(), runner)
                    .run(&filename, &output)?
                    .1
            };
            info!(rows = record.rows_written(), table = %output.display(), "table written");

            report(&descriptor, &output, parquet.as_deref())?;
        }
        Command::Merge {
            experiment,
            input,
            parquet,
        } => {
            let descriptor = descriptor_for(&experiment, &HarnessConfig::default())?;
            report(&descriptor, &input, parquet.as_deref())?;
        }
        Command::List => {
            for kind in ExperimentKind::ALL {
                let descriptor = kind.descriptor()?;
                let axes: Vec<String> = descriptor
                    .axes()
                    .iter()
                    .map(|a| format!("{}[{}]", a.name(), a.len()))
                    .collect();
                println!(
                    "{:<8} {:<24} {} points  {}",
                    descriptor.name(),
                    descriptor.title(),
                    descriptor.grid().len(),
                    axes.join(" x ")
                );
            }
        }
    }

    Ok(())
}
