//! Holdout accuracy of a forecaster.

use serde::{Deserialize, Serialize};

use crate::{ForecastError, Forecaster, SeriesPoint};

/// Accuracy of a forecaster on the most recent periods of a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldoutReport {
    /// Points the forecaster was fit on.
    pub train_points: usize,
    /// Held-out points compared against the forecast.
    pub test_points: usize,
    /// Mean absolute percentage error in percent over periods with a
    /// non-zero actual count; `None` if every held-out count is zero.
    pub mape: Option<f64>,
    /// Mean absolute error.
    pub mae: f64,
    /// Root mean squared error.
    pub rmse: f64,
}

/// Fits `forecaster` on all but the last `horizon` points and scores its
/// forecast of those points.
///
/// # Errors
///
/// * [`ForecastError::InvalidHorizon`] if `horizon` is zero
/// * [`ForecastError::InsufficientHistory`] if the series has fewer than
///   `2 * horizon` points
/// * anything the forecaster returns while fitting
pub fn evaluate_holdout(
    series: &[SeriesPoint],
    horizon: usize,
    forecaster: &mut impl Forecaster,
) -> Result<HoldoutReport, ForecastError> {
    if horizon == 0 {
        return Err(ForecastError::InvalidHorizon {
            message: "holdout horizon must be at least 1".to_string(),
        });
    }
    let required = horizon * 2;
    if series.len() < required {
        return Err(ForecastError::InsufficientHistory {
            required,
            available: series.len(),
        });
    }

    let (train, test) = series.split_at(series.len() - horizon);
    forecaster.fit(train)?;
    let forecast = forecaster.predict(horizon)?;

    #[allow(clippy::cast_precision_loss)]
    let pairs: Vec<(f64, f64)> = test
        .iter()
        .zip(&forecast)
        .map(|(actual, predicted)| (actual.count as f64, predicted.estimate))
        .collect();

    let report = HoldoutReport {
        train_points: train.len(),
        test_points: test.len(),
        mape: mape(&pairs),
        mae: mean(pairs.iter().map(|(a, p)| (a - p).abs())),
        rmse: mean(pairs.iter().map(|(a, p)| (a - p).powi(2))).sqrt(),
    };
    log::info!(
        "Holdout over {} points: MAPE {}, MAE {:.3}, RMSE {:.3}",
        report.test_points,
        report
            .mape
            .map_or_else(|| "n/a".to_string(), |m| format!("{m:.3}")),
        report.mae,
        report.rmse
    );
    Ok(report)
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0_usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn mape(pairs: &[(f64, f64)]) -> Option<f64> {
    let nonzero: Vec<f64> = pairs
        .iter()
        .filter(|(actual, _)| actual.abs() > 0.0)
        .map(|(actual, predicted)| ((actual - predicted) / actual).abs())
        .collect();
    if nonzero.is_empty() {
        None
    } else {
        Some(mean(nonzero.into_iter()) * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{ForecastPoint, Granularity, SeasonalTrendForecaster};

    fn yearly(counts: &[u64]) -> Vec<SeriesPoint> {
        counts
            .iter()
            .zip(2010..)
            .map(|(&count, year)| SeriesPoint {
                period_end: NaiveDate::from_ymd_opt(year, 12, 31).unwrap(),
                count,
            })
            .collect()
    }

    /// Always forecasts the same value.
    struct Constant(f64);

    impl Forecaster for Constant {
        fn fit(&mut self, _series: &[SeriesPoint]) -> Result<(), ForecastError> {
            Ok(())
        }

        fn predict(&self, horizon: usize) -> Result<Vec<ForecastPoint>, ForecastError> {
            let period_end = NaiveDate::from_ymd_opt(2030, 12, 31).unwrap();
            Ok(vec![
                ForecastPoint {
                    period_end,
                    estimate: self.0,
                    lower: self.0,
                    upper: self.0,
                };
                horizon
            ])
        }
    }

    #[test]
    fn perfect_trend_scores_zero_error() {
        let series = yearly(&[100, 110, 120, 130, 140, 150]);
        let mut model = SeasonalTrendForecaster::new(Granularity::Yearly);
        let report = evaluate_holdout(&series, 3, &mut model).unwrap();
        assert_eq!((report.train_points, report.test_points), (3, 3));
        assert!(report.mae < 1e-9);
        assert!(report.rmse < 1e-9);
        assert!(report.mape.unwrap() < 1e-9);
    }

    #[test]
    fn metrics_match_hand_computation() {
        let series = yearly(&[0, 0, 10, 20]);
        let report = evaluate_holdout(&series, 2, &mut Constant(15.0)).unwrap();
        assert!((report.mae - 5.0).abs() < 1e-12);
        assert!((report.rmse - 5.0).abs() < 1e-12);
        // |10-15|/10 = 50%, |20-15|/20 = 25%
        assert!((report.mape.unwrap() - 37.5).abs() < 1e-9);
    }

    #[test]
    fn all_zero_actuals_have_no_mape() {
        let series = yearly(&[3, 4, 0, 0]);
        let report = evaluate_holdout(&series, 2, &mut Constant(1.0)).unwrap();
        assert_eq!(report.mape, None);
        assert!((report.mae - 1.0).abs() < 1e-12);
    }

    #[test]
    fn holdout_needs_twice_the_horizon() {
        let series = yearly(&[1, 2, 3, 4, 5]);
        assert!(matches!(
            evaluate_holdout(&series, 3, &mut Constant(1.0)),
            Err(ForecastError::InsufficientHistory {
                required: 6,
                available: 5
            })
        ));
        assert!(matches!(
            evaluate_holdout(&series, 0, &mut Constant(1.0)),
            Err(ForecastError::InvalidHorizon { .. })
        ));
    }
}
