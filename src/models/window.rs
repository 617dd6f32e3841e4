use chrono::NaiveDateTime;
use serde::Serialize;

use crate::errors::AppError;

/// Half-open time interval `[start, end)`.
///
/// Construction enforces `start < end`, so any value of this type is a
/// valid window. Overlap semantics live here and nowhere else: both the
/// availability checker and reschedule validation go through
/// [`TimeWindow::overlaps`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, AppError> {
        if start >= end {
            return Err(AppError::InvalidWindow(
                "start time must be before end time".to_string(),
            ));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// Touching windows (one ends exactly when the other starts) do not
    /// overlap.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && self.end > other.start
    }
}
