//! Forecaster contract and the seasonal-trend baseline.

use chrono::NaiveDate;

use crate::{ForecastError, ForecastPoint, Granularity, SeriesPoint};

/// Two-sided 95% normal quantile.
const Z_95: f64 = 1.96;

/// Fits a count series and predicts the periods after it.
pub trait Forecaster {
    /// Fits the model on a sorted, contiguous series.
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError::InsufficientHistory`] if the series is too
    /// short to fit.
    fn fit(&mut self, series: &[SeriesPoint]) -> Result<(), ForecastError>;

    /// Predicts the `horizon` periods after the fitted series.
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError::NotFitted`] before a successful
    /// [`Forecaster::fit`].
    fn predict(&self, horizon: usize) -> Result<Vec<ForecastPoint>, ForecastError>;
}

#[derive(Debug, Clone)]
struct Fitted {
    intercept: f64,
    slope: f64,
    seasonal: Vec<f64>,
    residual_std: f64,
    points: usize,
    last_period_end: NaiveDate,
}

/// Least-squares linear trend plus a per-season mean of the detrended
/// residuals.
///
/// The interval half-width is `1.96 * sigma * sqrt(1 + h / n)` for step `h`
/// after a series of `n` points, so it widens with the horizon. Estimates
/// and lower bounds are clamped at zero.
#[derive(Debug, Clone)]
pub struct SeasonalTrendForecaster {
    granularity: Granularity,
    min_history: usize,
    fitted: Option<Fitted>,
}

impl SeasonalTrendForecaster {
    /// Points required by [`Forecaster::fit`] unless overridden.
    pub const DEFAULT_MIN_HISTORY: usize = 3;

    #[must_use]
    pub const fn new(granularity: Granularity) -> Self {
        Self {
            granularity,
            min_history: Self::DEFAULT_MIN_HISTORY,
            fitted: None,
        }
    }

    /// Overrides the minimum series length, never below 1.
    #[must_use]
    pub fn with_min_history(mut self, min_history: usize) -> Self {
        self.min_history = min_history.max(1);
        self
    }

    #[must_use]
    pub const fn granularity(&self) -> Granularity {
        self.granularity
    }

    #[must_use]
    pub const fn min_history(&self) -> usize {
        self.min_history
    }

    /// Fitted trend as `(intercept, slope per period)`.
    #[must_use]
    pub fn trend(&self) -> Option<(f64, f64)> {
        self.fitted.as_ref().map(|f| (f.intercept, f.slope))
    }
}

impl Forecaster for SeasonalTrendForecaster {
    #[allow(clippy::cast_precision_loss)]
    fn fit(&mut self, series: &[SeriesPoint]) -> Result<(), ForecastError> {
        self.fitted = None;
        let Some(last) = series.last() else {
            return Err(ForecastError::InsufficientHistory {
                required: self.min_history,
                available: 0,
            });
        };
        if series.len() < self.min_history {
            return Err(ForecastError::InsufficientHistory {
                required: self.min_history,
                available: series.len(),
            });
        }

        let n = series.len() as f64;
        let ys: Vec<f64> = series.iter().map(|p| p.count as f64).collect();
        let t_mean = (n - 1.0) / 2.0;
        let y_mean = ys.iter().sum::<f64>() / n;

        let (cov, var) = ys
            .iter()
            .enumerate()
            .fold((0.0, 0.0), |(cov, var), (t, y)| {
                let dt = t as f64 - t_mean;
                (dt.mul_add(y - y_mean, cov), dt.mul_add(dt, var))
            });
        let slope = if var > 0.0 { cov / var } else { 0.0 };
        let intercept = slope.mul_add(-t_mean, y_mean);

        let residuals: Vec<f64> = ys
            .iter()
            .enumerate()
            .map(|(t, y)| y - slope.mul_add(t as f64, intercept))
            .collect();

        let season_length = self.granularity.season_length();
        let mut sums = vec![0.0; season_length];
        let mut counts = vec![0_usize; season_length];
        for (point, residual) in series.iter().zip(&residuals) {
            let season = self.granularity.season_index(point.period_end);
            sums[season] += residual;
            counts[season] += 1;
        }
        let seasonal: Vec<f64> = sums
            .iter()
            .zip(&counts)
            .map(|(sum, &count)| if count == 0 { 0.0 } else { sum / count as f64 })
            .collect();

        let squared: f64 = series
            .iter()
            .zip(&residuals)
            .map(|(point, residual)| {
                let r = residual - seasonal[self.granularity.season_index(point.period_end)];
                r * r
            })
            .sum();
        let dof = series.len().saturating_sub(2).max(1) as f64;
        let residual_std = (squared / dof).sqrt();

        log::info!(
            "Fit {} trend on {} points: intercept {intercept:.2}, slope {slope:.3}, sigma {residual_std:.2}",
            self.granularity,
            series.len()
        );

        self.fitted = Some(Fitted {
            intercept,
            slope,
            seasonal,
            residual_std,
            points: series.len(),
            last_period_end: last.period_end,
        });
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn predict(&self, horizon: usize) -> Result<Vec<ForecastPoint>, ForecastError> {
        let fitted = self.fitted.as_ref().ok_or(ForecastError::NotFitted)?;
        let n = fitted.points as f64;

        let mut period_end = fitted.last_period_end;
        let mut points = Vec::with_capacity(horizon);
        for step in 1..=horizon {
            period_end = self.granularity.next_period_end(period_end);
            let t = (fitted.points - 1 + step) as f64;
            let seasonal = fitted.seasonal[self.granularity.season_index(period_end)];
            let raw = fitted.slope.mul_add(t, fitted.intercept) + seasonal;
            let half = Z_95 * fitted.residual_std * (1.0 + step as f64 / n).sqrt();

            points.push(ForecastPoint {
                period_end,
                estimate: raw.max(0.0),
                lower: (raw - half).max(0.0),
                upper: (raw + half).max(0.0),
            });
        }
        Ok(points)
    }
}
