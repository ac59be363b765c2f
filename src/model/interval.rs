use anyhow::{bail, Context};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Number of days covered when no dates are given.
pub const DEFAULT_DAYS: u64 = 30;

/// An inclusive range of dates.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Interval {
    pub fn new(start: NaiveDate, end: NaiveDate) -> anyhow::Result<Self> {
        if start > end {
            bail!("The start date {start} is after the end date {end}");
        }
        Ok(Self { start, end })
    }

    /// The `n` days up to and including `end`, so `n` dates in all. `n` must be at least 1.
    pub fn last_n_days(n: u64, end: NaiveDate) -> anyhow::Result<Self> {
        if n == 0 {
            bail!("The number of days must be at least 1");
        }
        let start = end
            .checked_sub_days(Days::new(n - 1))
            .with_context(|| format!("Cannot go back {n} days from {end}"))?;
        Self::new(start, end)
    }

    /// Decides which dates to query from the command line flags:
    /// - `last_n` wins over everything else, and zero is an error
    /// - a `start` without an `end` runs through `today`
    /// - an `end` without a `start` covers the default number of days before `end`
    /// - with neither, the last default number of days
    pub fn pick(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        last_n: Option<u64>,
        today: NaiveDate,
    ) -> anyhow::Result<Self> {
        if let Some(n) = last_n {
            return Self::last_n_days(n, today);
        }
        match (start, end) {
            (Some(start), Some(end)) => Self::new(start, end),
            (Some(start), None) => Self::new(start, today),
            (None, Some(end)) => Self::last_n_days(DEFAULT_DAYS, end),
            (None, None) => Self::last_n_days(DEFAULT_DAYS, today),
        }
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}
