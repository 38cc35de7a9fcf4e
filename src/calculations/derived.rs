//! Values computed on read from stored dates and an externally supplied "today".

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Returned by [`remaining_days`] both when no exam is set and when it has passed.
pub const REMAINING_DAYS_UNSET: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExamStatus {
    NotScheduled,
    Passed { days_ago: i64 },
    Today,
    Upcoming { days: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamUrgency {
    Imminent,
    Soon,
    Distant,
}

impl ExamStatus {
    /// `None` unless the exam is still ahead (today counts as imminent).
    pub fn urgency(&self) -> Option<ExamUrgency> {
        match *self {
            ExamStatus::Today => Some(ExamUrgency::Imminent),
            ExamStatus::Upcoming { days } if days <= 7 => Some(ExamUrgency::Imminent),
            ExamStatus::Upcoming { days } if days <= 30 => Some(ExamUrgency::Soon),
            ExamStatus::Upcoming { .. } => Some(ExamUrgency::Distant),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match *self {
            ExamStatus::NotScheduled => "no exam scheduled".to_string(),
            ExamStatus::Passed { .. } => "exam finished".to_string(),
            ExamStatus::Today => "exam today".to_string(),
            ExamStatus::Upcoming { days } => format!("{days} days left"),
        }
    }
}

pub fn exam_status(exam_date: Option<NaiveDate>, today: NaiveDate) -> ExamStatus {
    let Some(exam) = exam_date else {
        return ExamStatus::NotScheduled;
    };
    let days = (exam - today).num_days();
    match days {
        0 => ExamStatus::Today,
        d if d > 0 => ExamStatus::Upcoming { days: d },
        d => ExamStatus::Passed { days_ago: -d },
    }
}

pub fn remaining_days(exam_date: Option<NaiveDate>, today: NaiveDate) -> i64 {
    match exam_status(exam_date, today) {
        ExamStatus::Today => 0,
        ExamStatus::Upcoming { days } => days,
        ExamStatus::NotScheduled | ExamStatus::Passed { .. } => REMAINING_DAYS_UNSET,
    }
}

/// `floor(days / 7) + 1`, clamped to `[1, total_weeks]`.
pub fn week_number(semester_start: NaiveDate, week_monday: NaiveDate, total_weeks: u32) -> u32 {
    let days = (week_monday - semester_start).num_days();
    let week = days.div_euclid(7) + 1;
    week.clamp(1, total_weeks.max(1) as i64) as u32
}

/// Share of the preparation window (course start to exam) already elapsed, 0..=100.
pub fn progress_percent(start: NaiveDate, exam: NaiveDate, today: NaiveDate) -> u8 {
    let total = (exam - start).num_days();
    if total <= 0 {
        return 0;
    }
    let passed = (today - start).num_days();
    (passed * 100 / total).clamp(0, 100) as u8
}
