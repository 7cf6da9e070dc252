//! Menu-driven front end over [`crate::commands`].

use std::path::PathBuf;

use crime_insight_forecast::Granularity;
use crime_insight_ingest_models::AdminCodes;
use dialoguer::{Confirm, Input, Select};

use crate::commands::{self, Context};

/// Top-level actions available in the menu.
enum Action {
    Build,
    TrainCategory,
    TrainZones,
    PredictCategory,
    AssignZone,
    PredictZone,
    Hotspots,
    Forecast,
    EvaluateForecast,
    Schema,
}

impl Action {
    const ALL: &[Self] = &[
        Self::Build,
        Self::TrainCategory,
        Self::TrainZones,
        Self::PredictCategory,
        Self::AssignZone,
        Self::PredictZone,
        Self::Hotspots,
        Self::Forecast,
        Self::EvaluateForecast,
        Self::Schema,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Build => "Build feature table",
            Self::TrainCategory => "Train category classifier",
            Self::TrainZones => "Train zone predictor",
            Self::PredictCategory => "Predict crime group",
            Self::AssignZone => "Assign coordinate to zone",
            Self::PredictZone => "Predict zone",
            Self::Hotspots => "Hotspot report",
            Self::Forecast => "Forecast incident counts",
            Self::EvaluateForecast => "Evaluate forecaster",
            Self::Schema => "Show feature schemas",
        }
    }
}

/// Prompts for an action and its parameters, then runs it.
///
/// # Errors
///
/// Returns an error if a prompt fails or the selected action fails.
pub fn run(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    println!("Crime Insight Pipeline");
    println!();

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();
    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Action::ALL[idx] {
        Action::Build => {
            let default_input = ctx.config.paths.raw_csv();
            let input: String = Input::new()
                .with_prompt("Raw CSV export")
                .default(default_input.display().to_string())
                .interact_text()?;
            let reuse_zones = Confirm::new()
                .with_prompt("Reuse the saved zone model?")
                .default(false)
                .interact()?;
            commands::build(ctx, Some(PathBuf::from(input)), reuse_zones)?;
        }
        Action::TrainCategory => commands::train_category(ctx)?,
        Action::TrainZones => commands::train_zones(ctx)?,
        Action::PredictCategory => {
            let date: String = Input::new()
                .with_prompt("Incident timestamp (MM/DD/YYYY HH:MM:SS AM)")
                .interact_text()?;
            let codes = prompt_codes()?;
            commands::predict_category(ctx, &date, codes)?;
        }
        Action::AssignZone => {
            let (lat, lon) = prompt_coordinate()?;
            commands::assign_zone(ctx, lat, lon)?;
        }
        Action::PredictZone => {
            let (lat, lon) = prompt_coordinate()?;
            let codes = prompt_codes()?;
            commands::predict_zone(ctx, lat, lon, codes)?;
        }
        Action::Hotspots => commands::hotspots(ctx)?,
        Action::Forecast => {
            let granularity = prompt_granularity()?;
            commands::forecast(ctx, granularity, None)?;
        }
        Action::EvaluateForecast => {
            let granularity = prompt_granularity()?;
            commands::evaluate_forecast(ctx, granularity, None)?;
        }
        Action::Schema => commands::schema(ctx),
    }

    Ok(())
}

fn prompt_coordinate() -> Result<(f64, f64), dialoguer::Error> {
    let lat: f64 = Input::new().with_prompt("Latitude").interact_text()?;
    let lon: f64 = Input::new().with_prompt("Longitude").interact_text()?;
    Ok((lat, lon))
}

fn prompt_codes() -> Result<AdminCodes, dialoguer::Error> {
    Ok(AdminCodes {
        beat: prompt_optional_u32("Beat (empty if unknown)")?,
        district: prompt_optional_u32("District (empty if unknown)")?,
        ward: prompt_optional_u32("Ward (empty if unknown)")?,
        community_area: prompt_optional_u32("Community area (empty if unknown)")?,
    })
}

fn prompt_optional_u32(prompt: &str) -> Result<Option<u32>, dialoguer::Error> {
    let input: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .validate_with(|s: &String| -> Result<(), &'static str> {
            if s.trim().is_empty() || s.trim().parse::<u32>().is_ok() {
                Ok(())
            } else {
                Err("Enter a whole number or leave empty")
            }
        })
        .interact_text()?;
    Ok(input.trim().parse().ok())
}

fn prompt_granularity() -> Result<Option<Granularity>, dialoguer::Error> {
    let mut labels = vec!["All".to_string()];
    labels.extend(Granularity::all().iter().map(ToString::to_string));

    let idx = Select::new()
        .with_prompt("Granularity")
        .items(&labels)
        .default(0)
        .interact()?;

    Ok(idx
        .checked_sub(1)
        .and_then(|i| Granularity::all().get(i).copied()))
}
