//! Calendar and cyclical features derived from an incident timestamp.

use chrono::{Datelike as _, NaiveDate, NaiveDateTime, Timelike as _};
use serde::{Deserialize, Serialize};

/// Meteorological season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Season {
    /// March, April, May
    Spring = 1,
    /// June, July, August
    Summer = 2,
    /// September, October, November
    Fall = 3,
    /// December, January, February
    Winter = 4,
}

impl Season {
    /// Maps a month (1-12) to its season. Any month outside March through
    /// November is winter.
    #[must_use]
    pub const fn from_month(month: u32) -> Self {
        match month {
            3..=5 => Self::Spring,
            6..=8 => Self::Summer,
            9..=11 => Self::Fall,
            _ => Self::Winter,
        }
    }

    /// Numeric feature code, 1-4.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Six-hour bucket of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HourGroup {
    /// 00:00-05:59
    Night = 0,
    /// 06:00-11:59
    Morning = 1,
    /// 12:00-17:59
    Afternoon = 2,
    /// 18:00-23:59
    Evening = 3,
}

impl HourGroup {
    /// Maps an hour of day to its bucket.
    #[must_use]
    pub const fn from_hour(hour: u32) -> Self {
        if hour < 6 {
            Self::Night
        } else if hour < 12 {
            Self::Morning
        } else if hour < 18 {
            Self::Afternoon
        } else {
            Self::Evening
        }
    }

    /// Numeric feature code, 0-3.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Calendar features of one timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemporalFeatures {
    /// Calendar year.
    pub year: i32,
    /// Month of year, 1-12.
    pub month: u32,
    /// Day of month.
    pub day: u32,
    /// Hour of day, 0-23.
    pub hour: u32,
    /// Day of week, Monday = 0 through Sunday = 6.
    pub day_of_week: u32,
    /// Saturday or Sunday.
    pub is_weekend: bool,
    /// Season of the month.
    pub season: Season,
    /// Bucket of the hour.
    pub hour_group: HourGroup,
}

impl TemporalFeatures {
    /// Derives all temporal features from a timestamp.
    #[must_use]
    pub fn from_timestamp(ts: NaiveDateTime) -> Self {
        Self::from_date_hour(ts.date(), ts.hour())
    }

    /// Derives all temporal features from a date and an hour of day.
    #[must_use]
    pub fn from_date_hour(date: NaiveDate, hour: u32) -> Self {
        let day_of_week = day_of_week(date);
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
            hour,
            day_of_week,
            is_weekend: day_of_week >= 5,
            season: Season::from_month(date.month()),
            hour_group: HourGroup::from_hour(hour),
        }
    }

    /// Derives features from separate calendar components.
    ///
    /// Returns `None` for an impossible date or an hour outside 0-23.
    #[must_use]
    pub fn from_parts(year: i32, month: u32, day: u32, hour: u32) -> Option<Self> {
        if hour > 23 {
            return None;
        }
        NaiveDate::from_ymd_opt(year, month, day).map(|date| Self::from_date_hour(date, hour))
    }

    /// `is_weekend` as a 0/1 flag.
    #[must_use]
    pub const fn weekend_flag(&self) -> u8 {
        if self.is_weekend { 1 } else { 0 }
    }
}

/// Gregorian day of week with Monday = 0.
#[must_use]
pub fn day_of_week(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_monday()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_month_has_exactly_one_season() {
        let expected = [4, 4, 1, 1, 1, 2, 2, 2, 3, 3, 3, 4];
        for (month, code) in (1..=12).zip(expected) {
            assert_eq!(Season::from_month(month).code(), code, "month {month}");
        }
    }

    #[test]
    fn hour_groups_are_four_contiguous_buckets_of_six() {
        let mut sizes = [0u32; 4];
        let mut previous = 0u8;
        for hour in 0..24 {
            let code = HourGroup::from_hour(hour).code();
            assert!(code >= previous, "hour group decreased at hour {hour}");
            previous = code;
            sizes[usize::from(code)] += 1;
        }
        assert_eq!(sizes, [6, 6, 6, 6]);
    }

    #[test]
    fn weekday_of_known_dates() {
        let thursday = NaiveDate::from_ymd_opt(2023, 6, 15).unwrap();
        assert_eq!(day_of_week(thursday), 3);
        let monday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(day_of_week(monday), 0);
        let sunday = NaiveDate::from_ymd_opt(2000, 2, 27).unwrap();
        assert_eq!(day_of_week(sunday), 6);
    }

    #[test]
    fn summer_afternoon_thursday() {
        let features = TemporalFeatures::from_parts(2023, 6, 15, 14).unwrap();
        assert_eq!(features.month, 6);
        assert_eq!(features.season, Season::Summer);
        assert_eq!(features.hour_group, HourGroup::Afternoon);
        assert_eq!(features.day_of_week, 3);
        assert_eq!(features.weekend_flag(), 0);
    }

    #[test]
    fn saturday_is_weekend() {
        let features = TemporalFeatures::from_parts(2023, 6, 17, 23).unwrap();
        assert!(features.is_weekend);
        assert_eq!(features.hour_group, HourGroup::Evening);
    }

    #[test]
    fn invalid_parts_are_rejected() {
        assert!(TemporalFeatures::from_parts(2023, 1, 32, 0).is_none());
        assert!(TemporalFeatures::from_parts(2023, 1, 1, 24).is_none());
    }
}
