pub mod types;
pub mod error;
pub mod config;
pub mod data;
pub mod processing;
pub mod render;
pub mod retry;
pub mod translate;
pub mod dashboard;
pub mod server;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::dashboard::{Dashboard, DatasetKind, MapRequest};
use crate::processing::TableFilter;
use crate::types::AggregationMode;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Write output here instead of stdout
    #[arg(short, long, value_name = "FILE", global = true)]
    out: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Per-state bubble map of a value column
    Map {
        #[arg(long, default_value = "cases")]
        column: String,
        /// Sum or Mean
        #[arg(long, default_value = "Sum")]
        mode: String,
        /// Override the configured marker scale
        #[arg(long)]
        scale: Option<f64>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Daily cases for one city
    City {
        #[arg(long)]
        state: String,
        #[arg(long)]
        city: String,
    },
    /// Case distribution by region over a date range
    Regions {
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Total deaths by region
    Deaths,
    /// States available in the city dataset
    States,
    /// Cities available for a state
    Cities {
        #[arg(long)]
        state: String,
    },
    /// Raw dataset rows, filtered and paged
    Table {
        /// cities or states
        #[arg(long, default_value = "states")]
        dataset: DatasetKind,
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// Serve the dashboard API and static front end
    Serve,
}

fn emit<T: Serialize>(value: &T, out: Option<&PathBuf>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
            info!("Wrote {:?}", path);
        }
        None => println!("{}", json),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let app_config = config::AppConfig::load_from_file(&cli.config)?;
    let datasets = data::load_data(&app_config)?;
    let translator = translate::from_config(&app_config.translation)?;
    let dashboard = Dashboard::new(datasets, app_config.map.clone(), translator);
    let out = cli.out.as_ref();

    match cli.command {
        Commands::Map {
            column,
            mode,
            scale,
            start,
            end,
        } => {
            let request = MapRequest {
                column,
                mode: mode.parse::<AggregationMode>()?,
                scale,
                start,
                end,
            };
            emit(&dashboard.map(&request).await?, out)?;
        }
        Commands::City { state, city } => emit(&dashboard.city(&state, &city)?, out)?,
        Commands::Regions { start, end } => emit(&dashboard.regions(start, end)?, out)?,
        Commands::Deaths => emit(&dashboard.deaths()?, out)?,
        Commands::States => emit(&dashboard.states()?, out)?,
        Commands::Cities { state } => emit(&dashboard.cities(&state)?, out)?,
        Commands::Table {
            dataset,
            state,
            city,
            region,
            start,
            end,
            offset,
            limit,
        } => {
            let filter = TableFilter {
                state,
                city,
                region,
                start,
                end,
                offset,
                limit,
            };
            emit(&dashboard.table(dataset, &filter)?, out)?;
        }
        Commands::Serve => server::start_server(app_config, dashboard).await?,
    }

    Ok(())
}
