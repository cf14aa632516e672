use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use db::models::attendance_schedule;

use crate::error::AttendanceError;

/// Scans more than this many minutes after the start are `late`.
pub const LATE_CUTOFF_MINUTES: i64 = 15;

/// A same-day `[start, end)` interval on local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleWindow {
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
}

impl ScheduleWindow {
    pub fn new(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Result<Self, AttendanceError> {
        if start >= end {
            return Err(AttendanceError::validation("Start time must be before end time"));
        }
        Ok(Self { date, start, end })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start)
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.date.and_time(self.end)
    }

    pub fn has_started(&self, now: NaiveDateTime) -> bool {
        now >= self.starts_at()
    }

    pub fn has_ended(&self, now: NaiveDateTime) -> bool {
        now >= self.ends_at()
    }

    pub fn is_open(&self, now: NaiveDateTime) -> bool {
        self.has_started(now) && !self.has_ended(now)
    }

    /// Fractional minutes elapsed since the start; `None` before it.
    pub fn minutes_since_start(&self, now: NaiveDateTime) -> Option<f64> {
        if !self.has_started(now) {
            return None;
        }
        let elapsed = now - self.starts_at();
        Some(elapsed.num_milliseconds() as f64 / 60_000.0)
    }

    pub fn is_late(&self, now: NaiveDateTime, cutoff_minutes: i64) -> bool {
        self.minutes_since_start(now)
            .is_some_and(|minutes| minutes > cutoff_minutes as f64)
    }

    /// Half-open overlap: back-to-back windows do not overlap.
    pub fn overlaps(&self, other: &ScheduleWindow) -> bool {
        self.date == other.date && self.start < other.end && other.start < self.end
    }
}

impl TryFrom<&attendance_schedule::Model> for ScheduleWindow {
    type Error = AttendanceError;

    fn try_from(schedule: &attendance_schedule::Model) -> Result<Self, Self::Error> {
        ScheduleWindow::new(schedule.date, schedule.start_time, schedule.end_time).map_err(|_| {
            AttendanceError::Internal(format!(
                "Schedule {} has start {} not before end {}",
                schedule.id, schedule.start_time, schedule.end_time
            ))
        })
    }
}
