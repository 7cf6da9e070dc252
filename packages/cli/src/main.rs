#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for the crime insight pipeline.
//!
//! Every stage is a subcommand; running without one opens an interactive
//! menu. Log output is routed through `indicatif-log-bridge` (via
//! [`crime_insight_cli_utils::init_logger`]) so log lines and progress bars
//! share the terminal.

mod commands;
mod interactive;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use commands::Context;
use crime_insight_config::PipelineConfig;
use crime_insight_forecast::Granularity;
use crime_insight_ingest_models::AdminCodes;

#[derive(Parser)]
#[command(name = "crime_insight", about = "Crime incident feature pipeline")]
struct Cli {
    /// Configuration file layered over the built-in defaults
    /// (overrides `CRIME_INSIGHT_CONFIG`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Administrative codes of one incident.
#[derive(Args)]
struct CodeArgs {
    #[arg(long)]
    beat: Option<u32>,
    #[arg(long)]
    district: Option<u32>,
    #[arg(long)]
    ward: Option<u32>,
    #[arg(long)]
    community_area: Option<u32>,
}

impl CodeArgs {
    const fn codes(&self) -> AdminCodes {
        AdminCodes {
            beat: self.beat,
            district: self.district,
            ward: self.ward,
            community_area: self.community_area,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build the canonical feature table from a raw incident export
    Build {
        /// Raw CSV export (defaults to `<data_dir>/crimes.csv`)
        input: Option<PathBuf>,
        /// Assign zones with the saved zone model instead of fitting a new one
        #[arg(long)]
        reuse_zones: bool,
    },
    /// Train the crime category classifier
    TrainCategory,
    /// Train the zone predictor
    TrainZones,
    /// Predict the crime group of an incident
    PredictCategory {
        /// Incident timestamp, e.g. "01/15/2023 02:30:00 PM"
        #[arg(long)]
        date: String,
        #[command(flatten)]
        codes: CodeArgs,
    },
    /// Assign a coordinate to its zone with the fitted zone model
    AssignZone {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
    },
    /// Predict the zone of a location with the trained zone predictor
    PredictZone {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        #[command(flatten)]
        codes: CodeArgs,
    },
    /// Write the hotspot report and zone region table
    Hotspots,
    /// Forecast incident counts
    Forecast {
        /// Only this granularity (monthly, quarterly, yearly)
        #[arg(long)]
        granularity: Option<Granularity>,
        /// Periods to forecast (defaults per granularity)
        #[arg(long)]
        horizon: Option<usize>,
    },
    /// Report holdout accuracy of the forecaster
    EvaluateForecast {
        /// Only this granularity (monthly, quarterly, yearly)
        #[arg(long)]
        granularity: Option<Granularity>,
        /// Periods held out (defaults per granularity)
        #[arg(long)]
        horizon: Option<usize>,
    },
    /// Print the feature schemas and configuration fingerprint
    Schema,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = crime_insight_cli_utils::init_logger();
    let cli = Cli::parse();

    let config = PipelineConfig::load(cli.config.as_deref())?;
    let ctx = Context { config, multi };

    let Some(command) = cli.command else {
        return interactive::run(&ctx);
    };

    match command {
        Commands::Build { input, reuse_zones } => commands::build(&ctx, input, reuse_zones)?,
        Commands::TrainCategory => commands::train_category(&ctx)?,
        Commands::TrainZones => commands::train_zones(&ctx)?,
        Commands::PredictCategory { date, codes } => {
            commands::predict_category(&ctx, &date, codes.codes())?;
        }
        Commands::AssignZone { lat, lon } => commands::assign_zone(&ctx, lat, lon)?,
        Commands::PredictZone { lat, lon, codes } => {
            commands::predict_zone(&ctx, lat, lon, codes.codes())?;
        }
        Commands::Hotspots => commands::hotspots(&ctx)?,
        Commands::Forecast {
            granularity,
            horizon,
        } => commands::forecast(&ctx, granularity, horizon)?,
        Commands::EvaluateForecast {
            granularity,
            horizon,
        } => commands::evaluate_forecast(&ctx, granularity, horizon)?,
        Commands::Schema => commands::schema(&ctx),
    }

    Ok(())
}
