use crate::course::{Course, SlotRange, WeekRange};
use crate::course_validation::{self, ValidationError};
use crate::time_slot::TimeSlotTable;

/// Materializes one single-week, single-slot record per (week, lesson) pair.
pub struct RangeExpansion<'a> {
    template: &'a Course,
    time_slots: &'a TimeSlotTable,
    week_limit: Option<u32>,
}

impl<'a> RangeExpansion<'a> {
    pub fn new(template: &'a Course, time_slots: &'a TimeSlotTable) -> Self {
        Self {
            template,
            time_slots,
            week_limit: None,
        }
    }

    /// Rejects week ranges ending after `total_weeks` before anything is allocated.
    pub fn with_week_limit(mut self, total_weeks: u32) -> Self {
        self.week_limit = Some(total_weeks);
        self
    }

    pub fn execute(
        &self,
        lessons: SlotRange,
        weeks: WeekRange,
    ) -> Result<Vec<Course>, ValidationError> {
        if lessons.start > lessons.end {
            return Err(ValidationError::new(format!(
                "start lesson {} is after end lesson {}",
                lessons.start, lessons.end
            )));
        }
        if weeks.start > weeks.end {
            return Err(ValidationError::new(format!(
                "start week {} is after end week {}",
                weeks.start, weeks.end
            )));
        }
        course_validation::validate_slot_range(&lessons)?;
        course_validation::validate_week_range(&weeks)?;
        if let Some(limit) = self.week_limit.filter(|limit| weeks.end > *limit) {
            return Err(ValidationError::new(format!(
                "end week {} is beyond the semester's {limit} weeks",
                weeks.end
            )));
        }

        let mut expanded = Vec::with_capacity(lessons.len() * (weeks.end - weeks.start + 1) as usize);
        for week in weeks.iter() {
            for lesson in lessons.iter() {
                let mut course = self.template.clone();
                course.id = None;
                course.weeks = WeekRange::single(week);
                course.slots = SlotRange::single(lesson);
                match self.time_slots.resolve(course.slots) {
                    Some((start, end)) => {
                        course.start_time = Some(start);
                        course.end_time = Some(end);
                    }
                    None => {
                        course.start_time = None;
                        course.end_time = None;
                    }
                }
                expanded.push(course);
            }
        }
        Ok(expanded)
    }
}

pub fn expand(
    template: &Course,
    lessons: SlotRange,
    weeks: WeekRange,
    time_slots: &TimeSlotTable,
) -> Result<Vec<Course>, ValidationError> {
    RangeExpansion::new(template, time_slots).execute(lessons, weeks)
}
