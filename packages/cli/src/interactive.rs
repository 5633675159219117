//! Menu-driven mode used when no subcommand is given.

use std::path::{Path, PathBuf};

use dialoguer::{Confirm, Input, Select};
use zcta_cli_utils::MultiProgress;
use zcta_pipeline::RunOptions;

use crate::{census_api_key_from_env, load_settings, print_metros, print_summary, run_progress};

/// Top-level actions in interactive mode.
enum Action {
    BuildDataset,
    ExportBoundaries,
    ListMetros,
}

impl Action {
    const ALL: &[Self] = &[Self::BuildDataset, Self::ExportBoundaries, Self::ListMetros];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::BuildDataset => "Build ZCTA dataset",
            Self::ExportBoundaries => "Export ZCTA boundaries (GeoJSON)",
            Self::ListMetros => "List metros",
        }
    }
}

/// Prompts for an action and a metro, then runs it.
///
/// # Errors
///
/// Returns an error if a prompt fails or the selected operation fails.
pub async fn run(
    multi: &MultiProgress,
    settings_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("ZCTA Housing & Commute ETL");
    println!();

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();
    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    if matches!(Action::ALL[idx], Action::ListMetros) {
        return print_metros();
    }

    let metros = zcta_metro::all_metros()?;
    let metro_labels: Vec<String> = metros
        .iter()
        .map(|m| format!("{} ({})", m.name, m.key))
        .collect();
    let metro_idx = Select::new()
        .with_prompt("Metro")
        .items(&metro_labels)
        .default(0)
        .interact()?;
    let metro = &metros[metro_idx];

    let mut settings = load_settings(settings_path)?;

    match Action::ALL[idx] {
        Action::BuildDataset => {
            let output: String = Input::new()
                .with_prompt("Output directory")
                .default("data/final".to_string())
                .interact_text()?;
            settings.skip_transit = !Confirm::new()
                .with_prompt("Query OpenStreetMap for transit density? (slow)")
                .default(true)
                .interact()?;
            if settings.acs.api_key.is_none() {
                settings.acs.api_key = census_api_key_from_env();
            }
            if settings.acs.api_key.is_none() {
                log::warn!("CENSUS_API_KEY not set; ACS requests are rate limited");
            }

            let options = RunOptions {
                output_dir: PathBuf::from(output),
                ..RunOptions::default()
            };
            let summary = zcta_pipeline::build_metro_dataset(
                metro,
                &settings,
                &options,
                &run_progress(multi, metro),
            )
            .await?;
            print_summary(&summary);
        }
        Action::ExportBoundaries => {
            let out: String = Input::new()
                .with_prompt("GeoJSON path")
                .default(format!("data/{}_zctas.geojson", metro.key))
                .interact_text()?;
            let out = PathBuf::from(out);
            let count = zcta_pipeline::export_boundaries(metro, &settings, &out).await?;
            println!("{}: wrote {count} ZCTA boundaries to {}", metro.key, out.display());
        }
        Action::ListMetros => {}
    }

    Ok(())
}
