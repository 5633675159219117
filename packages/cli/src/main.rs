#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Builds ZCTA-level housing, commute, and transit datasets.
//!
//! ```text
//! zcta_etl run --metro phoenix [--output data/final] [--year 2023]
//! zcta_etl run-all [--output data/final]
//! zcta_etl metros
//! zcta_etl boundaries --metro memphis --out data/memphis_zctas.geojson
//! ```
//!
//! Running with no subcommand enters interactive mode. The Census API key
//! is taken from `--census-api-key` or the `CENSUS_API_KEY` environment
//! variable.
//!
//! Uses `indicatif-log-bridge` (via [`zcta_cli_utils::init_logger`]) to
//! route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod interactive;

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use zcta_cli_utils::{IndicatifProgress, MultiProgress};
use zcta_metro_models::MetroConfig;
use zcta_pipeline::{PipelineSettings, RunOptions, RunProgress, RunSummary};

#[derive(Parser)]
#[command(
    name = "zcta_etl",
    about = "Build ZCTA-level housing, commute, and transit datasets"
)]
struct Cli {
    /// TOML file overriding upstream endpoints and tunables
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the dataset for one metro
    Run {
        /// Metro key (see `metros`)
        #[arg(long)]
        metro: String,
        /// Also write the retained ZCTA boundaries as `GeoJSON`
        #[arg(long)]
        boundary_file: Option<PathBuf>,
        #[command(flatten)]
        args: RunArgs,
    },
    /// Build the dataset for every registered metro
    RunAll {
        #[command(flatten)]
        args: RunArgs,
    },
    /// List registered metros
    Metros,
    /// Write a metro's ZCTA boundaries as `GeoJSON` without building the dataset
    Boundaries {
        /// Metro key (see `metros`)
        #[arg(long)]
        metro: String,
        /// Output `GeoJSON` path
        #[arg(long)]
        out: PathBuf,
    },
}

/// Options shared by `run` and `run-all`.
#[derive(Args)]
struct RunArgs {
    /// Output directory for `final_zcta_dataset_{metro}.csv`
    #[arg(long, default_value = "data/final")]
    output: PathBuf,
    /// Census API key (defaults to `CENSUS_API_KEY`)
    #[arg(long)]
    census_api_key: Option<String>,
    /// ACS 5-year vintage
    #[arg(long)]
    year: Option<u16>,
    /// Directory for intermediate tables (tract to ZCTA map)
    #[arg(long)]
    debug_dir: Option<PathBuf>,
    /// Skip Overpass transit queries
    #[arg(long)]
    skip_transit: bool,
}

impl RunArgs {
    /// Applies command-line overrides on top of file settings.
    fn apply(&self, settings: &mut PipelineSettings) {
        if let Some(year) = self.year {
            settings.acs.year = year;
        }
        if let Some(key) = self.census_api_key.clone().or_else(census_api_key_from_env) {
            settings.acs.api_key = Some(key);
        }
        if self.skip_transit {
            settings.skip_transit = true;
        }
    }
}

/// `CENSUS_API_KEY`, if set and non-empty.
fn census_api_key_from_env() -> Option<String> {
    std::env::var("CENSUS_API_KEY")
        .ok()
        .filter(|key| !key.trim().is_empty())
}

/// Settings from `--settings`, or defaults.
fn load_settings(path: Option<&Path>) -> Result<PipelineSettings, zcta_pipeline::PipelineError> {
    path.map_or_else(|| Ok(PipelineSettings::default()), PipelineSettings::load)
}

/// Progress bars for one metro run.
fn run_progress(multi: &MultiProgress, metro: &MetroConfig) -> RunProgress {
    RunProgress {
        tracts: IndicatifProgress::county_bar(multi, &format!("[{}] Tract geometry", metro.key)),
        census: IndicatifProgress::county_bar(multi, &format!("[{}] ACS tracts", metro.key)),
        transit: IndicatifProgress::zcta_bar(multi, &format!("[{}] Transit", metro.key)),
    }
}

fn print_summary(summary: &RunSummary) {
    println!(
        "{}: {} ZCTAs written ({} in boundary), {} tracts ({} unmapped), {} with rent index, {:.1}s",
        summary.metro,
        summary.rows_written,
        summary.zctas_in_boundary,
        summary.tracts_fetched,
        summary.tracts_unmapped,
        summary.rows_with_rent_index,
        summary.elapsed.as_secs_f64()
    );
    println!("  -> {}", summary.output_path.display());
}

fn print_metros() -> Result<(), Box<dyn std::error::Error>> {
    let metros = zcta_metro::all_metros()?;
    println!("{:<14} {:<7} {:<9} {:<8} NAME", "KEY", "CBSA", "COUNTIES", "EPSG");
    println!("{}", "-".repeat(80));
    for metro in &metros {
        println!(
            "{:<14} {:<7} {:<9} {:<8} {}",
            metro.key,
            metro.cbsa_code,
            metro.counties.len(),
            metro.utm_epsg,
            metro.name
        );
    }
    println!("\n{} metro(s)", metros.len());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = zcta_cli_utils::init_logger();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        return interactive::run(&multi, cli.settings.as_deref()).await;
    };

    let mut settings = load_settings(cli.settings.as_deref())?;

    match command {
        Commands::Run {
            metro,
            boundary_file,
            args,
        } => {
            let metro = zcta_metro::find_metro(&metro)?;
            args.apply(&mut settings);
            let options = RunOptions {
                output_dir: args.output,
                boundary_file,
                debug_dir: args.debug_dir,
            };
            let summary = zcta_pipeline::build_metro_dataset(
                &metro,
                &settings,
                &options,
                &run_progress(&multi, &metro),
            )
            .await?;
            print_summary(&summary);
        }
        Commands::RunAll { args } => {
            args.apply(&mut settings);
            let options = RunOptions {
                output_dir: args.output,
                boundary_file: None,
                debug_dir: args.debug_dir,
            };
            run_all(&multi, &settings, &options).await?;
        }
        Commands::Metros => print_metros()?,
        Commands::Boundaries { metro, out } => {
            let metro = zcta_metro::find_metro(&metro)?;
            let count = zcta_pipeline::export_boundaries(&metro, &settings, &out).await?;
            println!("{}: wrote {count} ZCTA boundaries to {}", metro.key, out.display());
        }
    }

    Ok(())
}

/// Builds every registered metro in turn. One metro failing does not stop
/// the others, but the command still fails at the end.
async fn run_all(
    multi: &MultiProgress,
    settings: &PipelineSettings,
    options: &RunOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let metros = zcta_metro::all_metros()?;
    let steps = IndicatifProgress::steps_bar(multi, "Metros", metros.len() as u64);

    let mut summaries = Vec::new();
    let mut failures = Vec::new();

    for metro in &metros {
        steps.set_message(format!("Metro {}", metro.key));
        match zcta_pipeline::build_metro_dataset(
            metro,
            settings,
            options,
            &run_progress(multi, metro),
        )
        .await
        {
            Ok(summary) => summaries.push(summary),
            Err(e) => {
                log::error!("{e}");
                failures.push((metro.key.clone(), e));
            }
        }
        steps.inc(1);
    }
    steps.finish(format!(
        "{} of {} metros built",
        summaries.len(),
        metros.len()
    ));

    println!();
    for summary in &summaries {
        print_summary(summary);
    }
    for (key, e) in &failures {
        eprintln!("{key}: FAILED: {e}");
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(format!("{} of {} metros failed", failures.len(), metros.len()).into())
    }
}
