//! Period-end count series.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use crime_insight_ingest_models::CanonicalRow;
use serde::{Deserialize, Serialize};

use crate::Granularity;

/// Incident count of one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Last day of the period.
    pub period_end: NaiveDate,
    /// Incidents whose timestamp falls in the period.
    pub count: u64,
}

/// Counts canonical rows per period.
///
/// See [`aggregate_timestamps`].
#[must_use]
pub fn aggregate(rows: &[CanonicalRow], granularity: Granularity) -> Vec<SeriesPoint> {
    aggregate_timestamps(rows.iter().map(|r| r.date), granularity)
}

/// Counts timestamps per period.
///
/// The series is sorted and contiguous from the first to the last observed
/// period, with zero counts for periods that have no incidents.
#[must_use]
pub fn aggregate_timestamps(
    timestamps: impl IntoIterator<Item = NaiveDateTime>,
    granularity: Granularity,
) -> Vec<SeriesPoint> {
    let mut counts: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for ts in timestamps {
        *counts.entry(granularity.period_end(ts.date())).or_default() += 1;
    }

    let (Some((&first, _)), Some((&last, _))) = (counts.first_key_value(), counts.last_key_value())
    else {
        return Vec::new();
    };

    let mut series = Vec::new();
    let mut period_end = first;
    loop {
        series.push(SeriesPoint {
            period_end,
            count: counts.get(&period_end).copied().unwrap_or(0),
        });
        let next = granularity.next_period_end(period_end);
        if period_end >= last || next == period_end {
            break;
        }
        period_end = next;
    }

    log::debug!(
        "Aggregated {} {granularity} periods from {first} to {last}",
        series.len()
    );
    series
}
