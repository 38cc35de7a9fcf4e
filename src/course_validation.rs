use crate::course::{Course, MAX_SLOT, MIN_SLOT, SlotRange, WeekRange};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub fn validate_slot_range(slots: &SlotRange) -> Result<(), ValidationError> {
    for slot in [slots.start, slots.end] {
        if !(MIN_SLOT..=MAX_SLOT).contains(&slot) {
            return Err(ValidationError::new(format!(
                "lesson slot {slot} is outside {MIN_SLOT}..={MAX_SLOT}"
            )));
        }
    }
    if slots.start > slots.end {
        return Err(ValidationError::new(format!(
            "start slot {} is after end slot {}",
            slots.start, slots.end
        )));
    }
    Ok(())
}

pub fn validate_week_range(weeks: &WeekRange) -> Result<(), ValidationError> {
    if weeks.start == 0 {
        return Err(ValidationError::new("weeks are counted from 1"));
    }
    if weeks.start > weeks.end {
        return Err(ValidationError::new(format!(
            "start week {} is after end week {}",
            weeks.start, weeks.end
        )));
    }
    Ok(())
}

pub fn validate_course(course: &Course) -> Result<(), ValidationError> {
    if course.name.trim().is_empty() {
        return Err(ValidationError::new("course name must not be empty"));
    }
    if course.location.trim().is_empty() {
        return Err(ValidationError::new(format!(
            "course '{}' requires a location",
            course.name
        )));
    }
    if !(1..=7).contains(&course.weekday) {
        return Err(ValidationError::new(format!(
            "course '{}' has invalid weekday {} (expected 1..=7)",
            course.name, course.weekday
        )));
    }
    validate_slot_range(&course.slots)?;
    validate_week_range(&course.weeks)?;
    if !course.credits.is_finite() || course.credits < 0.0 {
        return Err(ValidationError::new(format!(
            "course '{}' has invalid credits {}",
            course.name, course.credits
        )));
    }
    Ok(())
}

pub fn validate_within_semester(course: &Course, total_weeks: u32) -> Result<(), ValidationError> {
    if course.weeks.end > total_weeks {
        return Err(ValidationError::new(format!(
            "course '{}' ends in week {} but the semester has {} weeks",
            course.name, course.weeks.end, total_weeks
        )));
    }
    Ok(())
}
