//! One function per pipeline action, shared by the subcommands and the
//! interactive menu.

use std::{error::Error, path::PathBuf};

use crime_insight_analytics::{hotspot_report, top_beats, write_csv, zone_center_table};
use crime_insight_classifier::{CategoryClassifier, TrainingMetrics, ZonePredictor};
use crime_insight_cli_utils::{IndicatifProgress, MultiProgress, step_spinner};
use crime_insight_config::PipelineConfig;
use crime_insight_features::{
    CATEGORY_SCHEMA, FeatureDeriver, FeatureSchema, ZONE_SCHEMA, parsing::parse_timestamp,
};
use crime_insight_forecast::{
    ForecastError, Forecaster as _, Granularity, aggregate, evaluate_holdout, write_forecast_csv,
};
use crime_insight_ingest::{
    BuildManifest, BuildTargets, DatasetBuilder, ZoneSource, build_from_csv, read_canonical_csv,
};
use crime_insight_ingest_models::{AdminCodes, CanonicalRow};
use crime_insight_spatial::{Coordinate, ZoneId, ZoneModel};

type CommandResult = Result<(), Box<dyn Error>>;

/// Configuration and terminal state every action runs with.
pub struct Context {
    pub config: PipelineConfig,
    pub multi: MultiProgress,
}

/// Builds the canonical table from a raw export, then writes the zone
/// reports for it.
///
/// # Errors
///
/// Returns an error if reading, building, or writing any artifact fails.
pub fn build(ctx: &Context, input: Option<PathBuf>, reuse_zones: bool) -> CommandResult {
    let paths = &ctx.config.paths;
    paths.ensure_dirs()?;
    let input = input.unwrap_or_else(|| paths.raw_csv());

    let existing = if reuse_zones {
        log::info!("Reusing zone model {}", paths.zone_model().display());
        Some(ZoneModel::load(&paths.zone_model())?)
    } else {
        None
    };
    let zones = existing
        .as_ref()
        .map_or(ZoneSource::Fit(&ctx.config.zoner), ZoneSource::Fitted);

    let builder = DatasetBuilder::new(ctx.config.feature_deriver())
        .with_progress(IndicatifProgress::build_bar(&ctx.multi, "Building dataset"));

    let canonical_csv = paths.canonical_csv();
    let zone_model = paths.zone_model();
    let centers_csv = paths.cluster_centers();
    let manifest = paths.manifest();
    let targets = BuildTargets {
        canonical_csv: &canonical_csv,
        zone_model: &zone_model,
        centers_csv: &centers_csv,
        manifest: &manifest,
    };

    let output = build_from_csv(&input, &targets, &builder, zones)?;
    let report = &output.report;

    println!();
    println!("Dataset build complete");
    println!("  Input records:        {}", report.input_rows);
    println!("  Unparseable dates:    {}", report.unparseable_dates);
    println!("  Missing coordinates:  {}", report.missing_coordinates);
    println!("  Canonical rows:       {}", report.output_rows);
    if let Some(sample) = report.zone_fit_sample {
        println!(
            "  Zones fit:            {} on {sample} points",
            output.zone_model.clusters()
        );
    }
    println!("  Table:                {}", canonical_csv.display());

    write_zone_reports(ctx, &output.rows, &output.zone_model)
}

/// Rewrites the hotspot report and region table from the current
/// canonical table.
///
/// # Errors
///
/// Returns an error if the table or zone model cannot be read, or a report
/// cannot be written.
pub fn hotspots(ctx: &Context) -> CommandResult {
    let (rows, zone_model, _) = load_current_table(ctx)?;
    write_zone_reports(ctx, &rows, &zone_model)
}

fn write_zone_reports(ctx: &Context, rows: &[CanonicalRow], zone_model: &ZoneModel) -> CommandResult {
    let paths = &ctx.config.paths;
    let regions = ctx.config.region_table();

    let report = hotspot_report(rows);
    write_csv(&paths.hotspot_report(), &report)?;
    write_csv(&paths.zone_regions(), &zone_center_table(zone_model, &regions))?;

    println!();
    println!("{:<6} {:>10}  {:<8} REGION", "ZONE", "INCIDENTS", "RISK");
    println!("{}", "-".repeat(60));
    for entry in report.iter().take(10) {
        let region = regions.lookup(entry.cluster_id);
        println!(
            "{:<6} {:>10}  {:<8} {}",
            entry.cluster_id, entry.count, region.risk, region.name
        );
    }

    let beats = top_beats(rows, ctx.config.reports.top_beats);
    if !beats.is_empty() {
        println!();
        println!("Most frequent beats:");
        for beat in &beats {
            println!("  {:>6} {:>10}", beat.beat, beat.count);
        }
    }
    Ok(())
}

/// Reads the canonical table after checking it was built with the current
/// feature configuration and zone model.
fn load_current_table(
    ctx: &Context,
) -> Result<(Vec<CanonicalRow>, ZoneModel, FeatureDeriver), Box<dyn Error>> {
    let paths = &ctx.config.paths;
    let deriver = ctx.config.feature_deriver();
    let zone_model = ZoneModel::load(&paths.zone_model())?;
    BuildManifest::load(&paths.manifest())?.ensure_current(&deriver, &zone_model)?;
    let rows = read_canonical_csv(&paths.canonical_csv())?;
    Ok((rows, zone_model, deriver))
}

/// Trains and saves the category classifier.
///
/// # Errors
///
/// Returns an error if the table is stale or missing, or training fails.
pub fn train_category(ctx: &Context) -> CommandResult {
    let (rows, _, deriver) = load_current_table(ctx)?;
    let spinner = step_spinner(&ctx.multi, "Training category classifier");
    let model = CategoryClassifier::train(&rows, &ctx.config.category_model, &deriver)?;
    spinner.finish_with_message("Category classifier trained");

    let path = ctx.config.paths.category_model();
    model.save(&path)?;
    let classes: Vec<String> = model.classes().iter().map(ToString::to_string).collect();
    println!("Classes: {}", classes.join(", "));
    print_metrics(model.metrics());
    println!("Saved to {}", path.display());
    Ok(())
}

/// Trains and saves the zone predictor.
///
/// # Errors
///
/// Returns an error if the table is stale or missing, or training fails.
pub fn train_zones(ctx: &Context) -> CommandResult {
    let (rows, zone_model, _) = load_current_table(ctx)?;
    let spinner = step_spinner(&ctx.multi, "Training zone predictor");
    let model = ZonePredictor::train(&rows, &ctx.config.zone_model, &zone_model)?;
    spinner.finish_with_message("Zone predictor trained");

    let path = ctx.config.paths.zone_predictor();
    model.save(&path)?;
    println!("Zones: {}", model.clusters());
    print_metrics(model.metrics());
    println!("Saved to {}", path.display());
    Ok(())
}

fn print_metrics(metrics: &TrainingMetrics) {
    println!(
        "Rows: {} train / {} test",
        metrics.train_rows, metrics.test_rows
    );
    println!("Train accuracy: {:.4}", metrics.train_accuracy);
    match metrics.test_accuracy {
        Some(accuracy) => println!("Test accuracy:  {accuracy:.4}"),
        None => println!("Test accuracy:  n/a"),
    }
}

/// Predicts the crime group of one incident.
///
/// # Errors
///
/// Returns an error if the timestamp is unrecognised, the model cannot be
/// loaded, or it was trained with a different feature configuration.
pub fn predict_category(ctx: &Context, date: &str, codes: AdminCodes) -> CommandResult {
    let timestamp =
        parse_timestamp(date).ok_or_else(|| format!("Unrecognised timestamp '{date}'"))?;
    let model = CategoryClassifier::load(&ctx.config.paths.category_model())?;
    let group = model.predict_incident(&ctx.config.feature_deriver(), timestamp, codes)?;
    println!("Predicted crime group: {group}");
    Ok(())
}

/// Assigns a coordinate to its zone with the fitted zone model.
///
/// # Errors
///
/// Returns an error if the coordinate is not finite or the zone model
/// cannot be loaded.
pub fn assign_zone(ctx: &Context, latitude: f64, longitude: f64) -> CommandResult {
    let coordinate = Coordinate::new(latitude, longitude);
    if !coordinate.is_finite() {
        return Err(format!("Coordinate ({latitude}, {longitude}) is not finite").into());
    }
    let model = ZoneModel::load(&ctx.config.paths.zone_model())?;
    print_zone(ctx, model.assign(coordinate));
    Ok(())
}

/// Predicts the zone of a location with the zone predictor.
///
/// # Errors
///
/// Returns an error if a model cannot be loaded or the predictor was
/// trained against a different zone model.
pub fn predict_zone(
    ctx: &Context,
    latitude: f64,
    longitude: f64,
    codes: AdminCodes,
) -> CommandResult {
    let paths = &ctx.config.paths;
    let predictor = ZonePredictor::load(&paths.zone_predictor())?;
    predictor.ensure_zone_model(&ZoneModel::load(&paths.zone_model())?)?;
    let zone = predictor.predict_location(&ctx.config.feature_deriver(), latitude, longitude, codes)?;
    print_zone(ctx, zone);
    Ok(())
}

fn print_zone(ctx: &Context, zone: ZoneId) {
    let region = ctx.config.region_table().lookup(zone);
    println!("Zone:        {zone}");
    println!("Region:      {}", region.name);
    println!("Risk level:  {}", region.risk);
    println!("Description: {}", region.description);
}

fn granularities(selected: Option<Granularity>) -> Vec<Granularity> {
    selected.map_or_else(|| Granularity::all().to_vec(), |g| vec![g])
}

/// Forecasts incident counts and writes one table per granularity.
///
/// Granularities whose series is too short are skipped with a warning.
///
/// # Errors
///
/// Returns an error if the canonical table is stale or cannot be read, or
/// a forecast cannot be written.
pub fn forecast(
    ctx: &Context,
    granularity: Option<Granularity>,
    horizon: Option<usize>,
) -> CommandResult {
    let (rows, _, _) = load_current_table(ctx)?;
    for granularity in granularities(granularity) {
        let series = aggregate(&rows, granularity);
        let mut forecaster = ctx.config.forecaster(granularity);
        match forecaster.fit(&series) {
            Ok(()) => {}
            Err(ForecastError::InsufficientHistory { required, available }) => {
                log::warn!(
                    "Skipping {granularity} forecast: {available} periods, need {required}"
                );
                continue;
            }
            Err(e) => return Err(e.into()),
        }

        let horizon = horizon.unwrap_or_else(|| granularity.default_horizon());
        let points = forecaster.predict(horizon)?;
        let path = ctx.config.paths.forecast(granularity);
        write_forecast_csv(&path, &points)?;

        println!();
        println!("{granularity} forecast ({} history periods)", series.len());
        println!("{:<12} {:>10} {:>10} {:>10}", "PERIOD END", "ESTIMATE", "LOWER", "UPPER");
        for point in &points {
            println!(
                "{:<12} {:>10.1} {:>10.1} {:>10.1}",
                point.period_end.to_string(),
                point.estimate,
                point.lower,
                point.upper
            );
        }
        println!("Saved to {}", path.display());
    }
    Ok(())
}

/// Reports holdout accuracy of the baseline forecaster.
///
/// # Errors
///
/// Returns an error if the canonical table is stale or cannot be read.
pub fn evaluate_forecast(
    ctx: &Context,
    granularity: Option<Granularity>,
    horizon: Option<usize>,
) -> CommandResult {
    let (rows, _, _) = load_current_table(ctx)?;
    for granularity in granularities(granularity) {
        let series = aggregate(&rows, granularity);
        let horizon = horizon.unwrap_or_else(|| granularity.default_horizon());
        let mut forecaster = ctx.config.forecaster(granularity);

        println!();
        println!("===== {granularity} (holdout {horizon}) =====");
        println!("Total periods: {}", series.len());
        match evaluate_holdout(&series, horizon, &mut forecaster) {
            Ok(report) => {
                match report.mape {
                    Some(mape) => println!("MAPE: {mape:.3}"),
                    None => println!("MAPE: n/a (all actual counts are zero)"),
                }
                println!("MAE:  {:.3}", report.mae);
                println!("RMSE: {:.3}", report.rmse);
            }
            Err(ForecastError::InsufficientHistory { required, .. }) => {
                println!("Not enough periods for evaluation (need >= {required})");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Prints both feature schemas and the feature configuration fingerprint.
pub fn schema(ctx: &Context) {
    for schema in [&CATEGORY_SCHEMA, &ZONE_SCHEMA] {
        print_schema(schema);
        println!();
    }
    let deriver = ctx.config.feature_deriver();
    let beats: Vec<String> = deriver
        .hotspots()
        .iter()
        .map(|beat| beat.to_string())
        .collect();
    println!("Hotspot beats:       {}", beats.join(", "));
    println!("Feature fingerprint: {}", deriver.fingerprint());
}

fn print_schema(schema: &FeatureSchema) {
    println!("{} v{} ({})", schema.name, schema.version, schema.fingerprint());
    for (i, field) in schema.fields.iter().enumerate() {
        println!("  {i:>2} {:<16} {}", field.name, field.kind.as_str());
    }
}
