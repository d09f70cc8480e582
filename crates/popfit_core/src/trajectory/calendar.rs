//! Calendar helpers for day-of-year values.
//!
//! Day-of-year is a zero-based offset from 1 January on a non-leap calendar.
//! Multi-year simulations keep counting past 365, so offsets wrap.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CostError;

pub const DAYS_IN_YEAR: u32 = 365;

const MONTH_LENGTHS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Offset within the simulated year, in `[0, 365)`. Missing days have none.
pub fn day_offset(day: f64) -> Option<f64> {
    day.is_finite().then(|| day.rem_euclid(DAYS_IN_YEAR as f64))
}

/// Calendar month, 1 = January.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Month(u8);

impl Month {
    pub const AUGUST: Month = Month(8);

    pub fn new(number: u8) -> Option<Self> {
        (1..=12).contains(&number).then_some(Month(number))
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Month> {
        (1..=12).map(Month)
    }

    /// First day offset of the month (0 for January).
    pub fn first_day(self) -> u32 {
        MONTH_LENGTHS[..(self.0 - 1) as usize].iter().sum()
    }

    pub fn length(self) -> u32 {
        MONTH_LENGTHS[(self.0 - 1) as usize]
    }

    /// Month containing a day offset. Missing days have no month.
    pub fn from_day_of_year(day: f64) -> Option<Month> {
        let offset = day_offset(day)?.floor() as u32;
        let mut upper = 0;
        for (idx, len) in MONTH_LENGTHS.iter().enumerate() {
            upper += len;
            if offset < upper {
                return Some(Month(idx as u8 + 1));
            }
        }
        None
    }
}

impl TryFrom<u8> for Month {
    type Error = CostError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Month::new(value)
            .ok_or_else(|| CostError::InvalidConfig(format!("month must be 1-12, got {}", value)))
    }
}

impl From<Month> for u8 {
    fn from(month: Month) -> Self {
        month.0
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "M{}", self.0)
    }
}

/// Inclusive day-of-year window, e.g. 220..=250 for the August survey.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalendarWindow {
    pub first_day: f64,
    pub last_day: f64,
}

impl CalendarWindow {
    pub fn new(first_day: f64, last_day: f64) -> Self {
        Self { first_day, last_day }
    }

    pub fn august_survey() -> Self {
        Self::new(220.0, 250.0)
    }

    /// Whether a day falls in the window, in whichever simulated year.
    pub fn contains(&self, day: f64) -> bool {
        day_offset(day).is_some_and(|d| d >= self.first_day && d <= self.last_day)
    }

    /// Bounds must be ordered offsets within one year.
    pub fn is_valid(&self) -> bool {
        self.first_day >= 0.0 && self.last_day < DAYS_IN_YEAR as f64 && self.first_day <= self.last_day
    }
}
