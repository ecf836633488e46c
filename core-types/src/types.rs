// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::fmt;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimestampError {
    #[error("invalid calendar date {year:04}-{month:02}-{day:02}")]
    InvalidDate { year: i32, month: u32, day: u32 },
    #[error("hour {0} out of range (0-23)")]
    InvalidHour(u32),
}

/// Hour-aligned UTC instant carried by every latent timestep.
///
/// On disk a timestamp is the quadruple `[year, month, day, hour]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "[i32; 4]", into = "[i32; 4]")]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    pub fn new(year: i32, month: u32, day: u32, hour: u32) -> Result<Self, TimestampError> {
        let date = NaiveDate::from_ymd_opt(year, month, day)
            .ok_or(TimestampError::InvalidDate { year, month, day })?;
        let time = NaiveTime::from_hms_opt(hour, 0, 0).ok_or(TimestampError::InvalidHour(hour))?;
        Ok(Self(NaiveDateTime::new(date, time)))
    }

    /// Truncates minutes and seconds.
    pub fn floor(datetime: NaiveDateTime) -> Self {
        Self(
            datetime
                .date()
                .and_hms_opt(datetime.hour(), 0, 0)
                .unwrap_or(datetime),
        )
    }

    pub fn from_fields(fields: [i32; 4]) -> Result<Self, TimestampError> {
        let [year, month, day, hour] = fields;
        let month = u32::try_from(month).map_err(|_| TimestampError::InvalidDate {
            year,
            month: 0,
            day: 0,
        })?;
        let day = u32::try_from(day).map_err(|_| TimestampError::InvalidDate {
            year,
            month,
            day: 0,
        })?;
        let hour = u32::try_from(hour).map_err(|_| TimestampError::InvalidHour(u32::MAX))?;
        Self::new(year, month, day, hour)
    }

    pub fn fields(&self) -> [i32; 4] {
        [
            self.0.year(),
            self.0.month() as i32,
            self.0.day() as i32,
            self.0.hour() as i32,
        ]
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn datetime(&self) -> NaiveDateTime {
        self.0
    }

    /// Shifts by a (possibly negative) number of hours across day, month and year boundaries.
    pub fn add_hours(&self, hours: i64) -> Self {
        Self(self.0 + Duration::hours(hours))
    }

    /// Whole hours from `earlier` to `self`.
    pub fn hours_since(&self, earlier: &Timestamp) -> i64 {
        (self.0 - earlier.0).num_hours()
    }

    pub fn format(&self, pattern: &str) -> String {
        self.0.format(pattern).to_string()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:00Z"))
    }
}

impl TryFrom<[i32; 4]> for Timestamp {
    type Error = TimestampError;

    fn try_from(value: [i32; 4]) -> Result<Self, Self::Error> {
        Self::from_fields(value)
    }
}

impl From<Timestamp> for [i32; 4] {
    fn from(value: Timestamp) -> Self {
        value.fields()
    }
}

/// `size` consecutive timestamps starting at `start`, spaced by `dt_hours`.
pub fn trajectory_timestamps(start: Timestamp, size: usize, dt_hours: u32) -> Vec<Timestamp> {
    (0..size)
        .map(|idx| start.add_hours(idx as i64 * dt_hours as i64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_hours_crosses_year_boundary() {
        let ts = Timestamp::new(2024, 12, 31, 22).unwrap();
        let shifted = ts.add_hours(3);
        assert_eq!(shifted.fields(), [2025, 1, 1, 1]);
        assert_eq!(shifted.add_hours(-3), ts);
    }

    #[test]
    fn add_hours_handles_leap_day() {
        let ts = Timestamp::new(2024, 2, 28, 12).unwrap();
        assert_eq!(ts.add_hours(24).fields(), [2024, 2, 29, 12]);
        assert_eq!(ts.add_hours(48).fields(), [2024, 3, 1, 12]);
    }

    #[test]
    fn rejects_invalid_fields() {
        assert_eq!(
            Timestamp::new(2023, 2, 29, 0),
            Err(TimestampError::InvalidDate {
                year: 2023,
                month: 2,
                day: 29
            })
        );
        assert_eq!(
            Timestamp::new(2023, 1, 1, 24),
            Err(TimestampError::InvalidHour(24))
        );
        assert!(Timestamp::from_fields([2023, -1, 1, 0]).is_err());
    }

    #[test]
    fn trajectory_timestamps_are_evenly_spaced() {
        let start = Timestamp::new(2025, 1, 1, 20).unwrap();
        let stamps = trajectory_timestamps(start, 4, 3);
        assert_eq!(stamps.len(), 4);
        assert_eq!(stamps[3].fields(), [2025, 1, 2, 5]);
        for pair in stamps.windows(2) {
            assert_eq!(pair[1].hours_since(&pair[0]), 3);
        }
    }

    #[test]
    fn serializes_as_field_quadruple() {
        let ts = Timestamp::new(2025, 3, 4, 6).unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "[2025,3,4,6]");
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }
}
