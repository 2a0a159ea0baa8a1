//! Reporting period and its prior-year comparison window

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{EngineResult, RebateError};

/// Inclusive date window a report is run over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub begin: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    /// Create a period; a window ending before it begins cannot be reported on
    pub fn new(begin: NaiveDate, end: NaiveDate) -> EngineResult<Self> {
        if end < begin {
            return Err(RebateError::FatalSetup(format!(
                "period ends ({}) before it begins ({})",
                end, begin
            )));
        }
        Ok(Self { begin, end })
    }

    pub fn begin_year(&self) -> i32 {
        self.begin.year()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.begin && date <= self.end
    }

    /// Comparable window one year back.
    ///
    /// A period that begins in the current calendar year is still open, so the
    /// prior window stops at today's month/day of last year instead of at the
    /// shifted period end. Any other period is shifted back a whole year.
    pub fn prior(&self, today: NaiveDate) -> Period {
        if self.begin_year() == today.year() {
            Period {
                begin: year_back(self.begin),
                end: year_back(today),
            }
        } else {
            Period {
                begin: year_back(self.begin),
                end: year_back(self.end),
            }
        }
    }

    /// Calendar quarter (0-based) a date falls in
    pub fn quarter_index(date: NaiveDate) -> usize {
        (date.month0() / 3) as usize
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} .. {}", self.begin, self.end)
    }
}

/// Same month/day one year earlier; Feb 29 lands on Feb 28
fn year_back(date: NaiveDate) -> NaiveDate {
    date.checked_sub_months(Months::new(12)).unwrap_or(NaiveDate::MIN)
}
