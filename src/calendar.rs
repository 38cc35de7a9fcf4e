use crate::calculations::derived;
use crate::course::WeekRange;
use crate::course_validation::ValidationError;
use chrono::{Datelike, Days, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SEMESTER_NAME: &str = "2025-2026-1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Semester {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Default for Semester {
    fn default() -> Self {
        Self {
            name: DEFAULT_SEMESTER_NAME.to_string(),
            start_date: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
        }
    }
}

impl Semester {
    pub fn new(
        name: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Self, ValidationError> {
        let semester = Self {
            name: name.into(),
            start_date,
            end_date,
        };
        semester.validate()?;
        Ok(semester)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::new("semester name must not be empty"));
        }
        if self.start_date >= self.end_date {
            return Err(ValidationError::new(format!(
                "semester start {} must be before its end {}",
                self.start_date, self.end_date
            )));
        }
        Ok(())
    }

    /// `ceil((end - start + 1) / 7)`.
    pub fn total_weeks(&self) -> u32 {
        let days = (self.end_date - self.start_date).num_days() + 1;
        if days <= 0 {
            return 0;
        }
        ((days + 6) / 7) as u32
    }

    /// First day of week `week` (1-based); `None` for week 0 or past the calendar's range.
    pub fn week_start(&self, week: u32) -> Option<NaiveDate> {
        let offset = week.checked_sub(1)?;
        self.start_date
            .checked_add_days(Days::new(u64::from(offset) * 7))
    }

    /// Last day of week `week` (1-based).
    pub fn week_end(&self, week: u32) -> Option<NaiveDate> {
        self.week_start(week)?.checked_add_days(Days::new(6))
    }

    pub fn has_week(&self, week: u32) -> bool {
        (1..=self.total_weeks()).contains(&week)
    }

    /// Unclamped week containing `date`; `None` before the semester starts.
    pub fn week_of(&self, date: NaiveDate) -> Option<u32> {
        let days = (date - self.start_date).num_days();
        if days < 0 {
            return None;
        }
        Some((days / 7) as u32 + 1)
    }

    /// Week shown for `date`, clamped to the semester.
    pub fn week_number(&self, date: NaiveDate) -> u32 {
        derived::week_number(self.start_date, date, self.total_weeks())
    }

    pub fn date_range(&self, weeks: WeekRange) -> Option<(NaiveDate, NaiveDate)> {
        Some((self.week_start(weeks.start)?, self.week_end(weeks.end)?))
    }

    /// Inverse of [`Semester::date_range`]; dates before the start map to week 1.
    pub fn week_range(&self, start: NaiveDate, end: NaiveDate) -> WeekRange {
        let first = self.week_of(start).unwrap_or(1);
        let last = self.week_of(end).unwrap_or(1).max(first);
        WeekRange::new(first, last)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

pub fn week_monday(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Cursor over displayed weeks, always positioned on a Monday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekView {
    monday: NaiveDate,
}

impl WeekView {
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            monday: week_monday(date),
        }
    }

    pub fn today() -> Self {
        Self::containing(chrono::Local::now().date_naive())
    }

    pub fn for_week(semester: &Semester, week: u32) -> Option<Self> {
        semester.week_start(week).map(Self::containing)
    }

    pub fn monday(&self) -> NaiveDate {
        self.monday
    }

    pub fn sunday(&self) -> NaiveDate {
        self.monday + Duration::days(6)
    }

    pub fn next(&self) -> Self {
        Self {
            monday: self.monday + Duration::days(7),
        }
    }

    pub fn prev(&self) -> Self {
        Self {
            monday: self.monday - Duration::days(7),
        }
    }

    pub fn week_number(&self, semester: &Semester) -> u32 {
        derived::week_number(semester.start_date, self.monday, semester.total_weeks())
    }

    pub fn is_last_week(&self, semester: &Semester) -> bool {
        self.sunday() >= semester.end_date
    }

    pub fn label(&self, semester: &Semester) -> String {
        format!(
            "第{}周 {} ~ {}",
            self.week_number(semester),
            self.monday.format("%m.%d"),
            self.sunday().format("%m.%d")
        )
    }
}
