//! The hourly time series store.
//!
//! Series are held as an ordered vector of columns. Facilities record the index of their column
//! when the model is loaded, so the dispatch engine reads series by integer index.
use crate::facility::FacilityID;
use anyhow::{Result, ensure};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

/// The number of hours in a (non-leap) year
pub const HOURS_PER_YEAR: usize = 8760;

/// Hours in a day
const HOURS_PER_DAY: usize = 24;

/// Day of the year on which 29 February falls in a leap year (zero-based)
const LEAP_DAY_INDEX: i64 = 59;

/// Hourly values for a whole year
pub type HourlySeries = Vec<f64>;

/// Hourly load and generation traces
#[derive(PartialEq, Debug, Clone, Default)]
pub struct SeriesStore {
    names: Vec<FacilityID>,
    columns: Vec<HourlySeries>,
}

impl SeriesStore {
    /// Add a column, returning its index.
    ///
    /// The series must be exactly [`HOURS_PER_YEAR`] long and names must be unique.
    pub fn push(&mut self, name: FacilityID, values: HourlySeries) -> Result<usize> {
        ensure!(
            values.len() == HOURS_PER_YEAR,
            "Series for {name} has {} values, but {HOURS_PER_YEAR} are required",
            values.len()
        );
        ensure!(
            !self.names.contains(&name),
            "More than one series provided for {name}"
        );

        self.names.push(name);
        self.columns.push(values);
        Ok(self.columns.len() - 1)
    }

    /// Look up the column index for a name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n.0.as_ref() == name)
    }

    /// Get the series at a column index
    pub fn column(&self, index: usize) -> &[f64] {
        &self.columns[index]
    }

    /// Iterate over the names of the columns in order
    pub fn names(&self) -> impl Iterator<Item = &FacilityID> {
        self.names.iter()
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the store has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// The hour of the day (0-23) for an hour of the year
pub fn hour_of_day(hour: usize) -> u32 {
    (hour % HOURS_PER_DAY) as u32
}

/// The calendar date and time at the start of an hour of the year.
///
/// Series always cover 365 days, so in leap years 29 February is skipped.
pub fn hour_to_datetime(year: i32, hour: usize) -> Option<NaiveDateTime> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0)?;
    let mut datetime = start + Duration::hours(i64::try_from(hour).ok()?);

    let is_leap = NaiveDate::from_ymd_opt(year, 2, 29).is_some();
    if is_leap && i64::from(datetime.ordinal0()) >= LEAP_DAY_INDEX {
        datetime += Duration::days(1);
    }

    Some(datetime)
}
