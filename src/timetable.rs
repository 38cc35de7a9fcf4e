use crate::calculations::conflict::ConflictScan;
use crate::calculations::derived::{self, ExamStatus, ExamUrgency};
use crate::calculations::range_expansion::RangeExpansion;
use crate::calendar::Semester;
use crate::course::{Course, MAX_SLOT, MIN_SLOT, SlotRange, WeekRange, weekday_label};
use crate::course_validation::{self, ValidationError};
use crate::persistence::{self, CourseStore, StoreError, TimetableSnapshot};
use crate::time_slot::TimeSlotTable;
use chrono::{NaiveDate, NaiveTime};
use polars::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const GRID_DAY_COLUMNS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

#[derive(Debug, Error)]
pub enum TimetableError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("course {0} not found")]
    NotFound(i64),
    #[error(
        "'{}' clashes with '{}' ({} lessons {}, weeks {})",
        .candidate.name,
        .existing.name,
        weekday_label(.existing.weekday),
        .existing.slots,
        .existing.weeks
    )]
    Conflict {
        candidate: Box<Course>,
        existing: Box<Course>,
    },
    #[error("unknown semester '{0}'")]
    UnknownSemester(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("grid error: {0}")]
    Grid(#[from] PolarsError),
}

impl TimetableError {
    fn conflict(candidate: &Course, existing: &Course) -> Self {
        TimetableError::Conflict {
            candidate: Box::new(candidate.clone()),
            existing: Box::new(existing.clone()),
        }
    }
}

pub type TimetableResult<T> = Result<T, TimetableError>;

/// Exam countdown for one course as of a given day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamCountdown {
    pub id: i64,
    pub name: String,
    pub exam_date: Option<NaiveDate>,
    pub remaining_days: i64,
    pub status: ExamStatus,
    pub urgency: Option<ExamUrgency>,
    pub progress_percent: u8,
}

/// The active session: one store, the semester being edited and the slot table.
pub struct Timetable<S: CourseStore> {
    store: S,
    semester: Semester,
    time_slots: TimeSlotTable,
}

impl<S: CourseStore> Timetable<S> {
    /// Binds `store` to `semester_name`. An unknown name falls back to the most
    /// recent stored semester, then to the built-in default.
    pub fn open(store: S, semester_name: &str) -> TimetableResult<Self> {
        let semester = match store.semester(semester_name)? {
            Some(semester) => semester,
            None => {
                let fallback = store.semesters()?.pop().unwrap_or_default();
                warn!(
                    requested = semester_name,
                    using = %fallback.name,
                    "semester not found, using fallback"
                );
                fallback
            }
        };
        let time_slots = store.time_slots()?;
        info!(semester = %semester.name, "timetable opened");
        Ok(Self {
            store,
            semester,
            time_slots,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn semester(&self) -> &Semester {
        &self.semester
    }

    /// Creates or replaces `semester` and makes it the active one.
    pub fn set_semester(&mut self, semester: Semester) -> TimetableResult<()> {
        semester.validate()?;
        self.store.save_semester(&semester)?;
        info!(semester = %semester.name, "semester set");
        self.semester = semester;
        Ok(())
    }

    pub fn switch_semester(&mut self, name: &str) -> TimetableResult<()> {
        let semester = self
            .store
            .semester(name)?
            .ok_or_else(|| TimetableError::UnknownSemester(name.to_string()))?;
        info!(semester = %semester.name, "semester switched");
        self.semester = semester;
        Ok(())
    }

    pub fn semesters(&self) -> TimetableResult<Vec<Semester>> {
        Ok(self.store.semesters()?)
    }

    pub fn time_slots(&self) -> &TimeSlotTable {
        &self.time_slots
    }

    pub fn set_time_slot(&mut self, index: u8, start: NaiveTime, end: NaiveTime) -> TimetableResult<()> {
        let mut table = self.time_slots.clone();
        table.set(index, start, end)?;
        self.store.save_time_slots(&table)?;
        self.time_slots = table;
        Ok(())
    }

    pub fn set_time_slots(&mut self, table: TimeSlotTable) -> TimetableResult<()> {
        self.store.save_time_slots(&table)?;
        self.time_slots = table;
        Ok(())
    }

    pub fn courses(&self) -> TimetableResult<Vec<Course>> {
        Ok(self.store.all(&self.semester.name)?)
    }

    pub fn course(&self, id: i64) -> TimetableResult<Course> {
        self.store.get(id)?.ok_or(TimetableError::NotFound(id))
    }

    /// Fails with a validation error for weeks outside `1..=total_weeks`.
    pub fn courses_for_week(&self, week: u32) -> TimetableResult<Vec<Course>> {
        self.check_week(week)?;
        debug!(week, "listing courses for week");
        Ok(self.store.courses_in_week(&self.semester.name, week)?)
    }

    /// Courses of the semester week containing `date`; empty before the semester starts.
    pub fn courses_for_date(&self, date: NaiveDate) -> TimetableResult<Vec<Course>> {
        match self.semester.week_of(date) {
            Some(week) if self.semester.has_week(week) => self.courses_for_week(week),
            _ => Ok(Vec::new()),
        }
    }

    pub fn courses_for_week_and_day(&self, week: u32, day: u8) -> TimetableResult<Vec<Course>> {
        let mut courses = self.courses_for_week(week)?;
        courses.retain(|course| course.weekday == day);
        Ok(courses)
    }

    pub fn search(&self, keyword: &str) -> TimetableResult<Vec<Course>> {
        if keyword.trim().is_empty() {
            return self.courses();
        }
        Ok(self.store.search(&self.semester.name, keyword)?)
    }

    /// Validates, checks for clashes unless `force`, then persists. Returns the new id.
    pub fn add_course(&mut self, course: Course, force: bool) -> TimetableResult<i64> {
        let course = self.prepare(course)?;
        if !force {
            self.ensure_no_conflict(&course)?;
        }
        let id = self.store.insert(course)?;
        Ok(id)
    }

    /// Materializes one record per (week, lesson) and inserts the whole batch or nothing.
    pub fn add_course_range(
        &mut self,
        template: &Course,
        lessons: SlotRange,
        weeks: WeekRange,
        force: bool,
    ) -> TimetableResult<Vec<i64>> {
        let mut template = template.clone();
        template.semester = self.semester.name.clone();
        let batch = RangeExpansion::new(&template, &self.time_slots)
            .with_week_limit(self.semester.total_weeks())
            .execute(lessons, weeks)?;
        for course in &batch {
            course_validation::validate_course(course)?;
            course_validation::validate_within_semester(course, self.semester.total_weeks())?;
        }
        if !force {
            self.ensure_batch_free(&batch)?;
        }
        let ids = self.store.insert_batch(batch)?;
        Ok(ids)
    }

    /// Full replace by id. The record never clashes with its own previous version.
    pub fn update_course(&mut self, course: Course, force: bool) -> TimetableResult<()> {
        let id = course
            .id
            .ok_or_else(|| ValidationError::new("cannot update a course that was never saved"))?;
        let stored = self.store.get(id)?.ok_or(TimetableError::NotFound(id))?;
        let semester = if stored.semester == self.semester.name {
            self.semester.clone()
        } else {
            self.store
                .semester(&stored.semester)?
                .ok_or_else(|| TimetableError::UnknownSemester(stored.semester.clone()))?
        };
        let course = self.prepare_in(course, &semester)?;
        if !force {
            self.ensure_no_conflict(&course)?;
        }
        self.store.update(&course).map_err(|err| match err {
            StoreError::NotFound(id) => TimetableError::NotFound(id),
            other => other.into(),
        })
    }

    /// `false` when no course had that id; nothing else is touched.
    pub fn delete_course(&mut self, id: i64) -> TimetableResult<bool> {
        let removed = self.store.delete(id)?;
        if !removed {
            debug!(id, "delete ignored, course not found");
        }
        Ok(removed)
    }

    pub fn clear_all(&mut self) -> TimetableResult<usize> {
        Ok(self.store.clear(&self.semester.name)?)
    }

    pub fn week_number(&self, date: NaiveDate) -> u32 {
        self.semester.week_number(date)
    }

    pub fn exam_countdown(&self, id: i64, today: NaiveDate) -> TimetableResult<ExamCountdown> {
        let course = self.course(id)?;
        let status = course.exam_status(today);
        let progress = course
            .exam_date
            .map(|exam| derived::progress_percent(self.semester.start_date, exam, today))
            .unwrap_or(0);
        Ok(ExamCountdown {
            id,
            name: course.name,
            exam_date: course.exam_date,
            remaining_days: derived::remaining_days(course.exam_date, today),
            status,
            urgency: status.urgency(),
            progress_percent: progress,
        })
    }

    /// One row per lesson slot, one column per weekday. A course shows
    /// `name @location` in its first slot and its bare name in the following ones;
    /// clashing entries are joined with ` / `.
    pub fn week_grid(&self, week: u32) -> TimetableResult<DataFrame> {
        let courses = self.courses_for_week(week)?;
        let rows = (MAX_SLOT - MIN_SLOT + 1) as usize;
        let mut cells: Vec<Vec<Vec<String>>> = vec![vec![Vec::new(); rows]; 7];
        for course in &courses {
            let Some(day) = (course.weekday as usize)
                .checked_sub(1)
                .and_then(|idx| cells.get_mut(idx))
            else {
                continue;
            };
            for slot in course.slots.iter() {
                let Some(cell) = slot
                    .checked_sub(MIN_SLOT)
                    .and_then(|idx| day.get_mut(idx as usize))
                else {
                    continue;
                };
                if slot == course.slots.start && !course.location.is_empty() {
                    cell.push(format!("{} @{}", course.name, course.location));
                } else {
                    cell.push(course.name.clone());
                }
            }
        }

        let slot_numbers: Vec<i32> = (MIN_SLOT..=MAX_SLOT).map(i32::from).collect();
        let times: Vec<String> = (MIN_SLOT..=MAX_SLOT)
            .map(|slot| self.time_slots.label(slot))
            .collect();

        let mut columns = Vec::with_capacity(9);
        columns.push(Series::new(PlSmallStr::from_static("slot"), slot_numbers).into_column());
        columns.push(Series::new(PlSmallStr::from_static("time"), times).into_column());
        for (&name, day) in GRID_DAY_COLUMNS.iter().zip(cells) {
            let values: Vec<String> = day.into_iter().map(|cell| cell.join(" / ")).collect();
            columns.push(Series::new(PlSmallStr::from_static(name), values).into_column());
        }
        Ok(DataFrame::new(columns)?)
    }

    /// Writes every course of the active semester; returns the row count.
    pub fn export_csv<P: AsRef<Path>>(&self, path: P) -> TimetableResult<usize> {
        let courses = self.courses()?;
        persistence::export_courses_to_csv(path.as_ref(), &courses, &self.semester)?;
        info!(rows = courses.len(), path = %path.as_ref().display(), "csv exported");
        Ok(courses.len())
    }

    /// Adds every row through the normal validation and clash checks, all or nothing.
    pub fn import_csv<P: AsRef<Path>>(&mut self, path: P, force: bool) -> TimetableResult<Vec<i64>> {
        let rows = persistence::import_courses_from_csv(path.as_ref(), &self.semester)?;
        let mut batch = Vec::with_capacity(rows.len());
        for row in rows {
            batch.push(self.prepare(row)?);
        }
        if !force {
            self.ensure_batch_free(&batch)?;
        }
        let ids = self.store.insert_batch(batch)?;
        info!(rows = ids.len(), path = %path.as_ref().display(), "csv imported");
        Ok(ids)
    }

    pub fn snapshot(&self) -> TimetableResult<TimetableSnapshot> {
        Ok(TimetableSnapshot {
            semester: self.semester.clone(),
            time_slots: self.time_slots.clone(),
            courses: self.courses()?,
        })
    }

    pub fn export_json<P: AsRef<Path>>(&self, path: P) -> TimetableResult<usize> {
        let snapshot = self.snapshot()?;
        persistence::save_snapshot_to_json(&snapshot, path.as_ref())?;
        Ok(snapshot.courses.len())
    }

    pub fn backup<P: AsRef<Path>>(&self, dir: P) -> TimetableResult<PathBuf> {
        Ok(self.store.backup(dir.as_ref())?)
    }

    fn prepare(&self, course: Course) -> TimetableResult<Course> {
        self.prepare_in(course, &self.semester)
    }

    fn prepare_in(&self, mut course: Course, semester: &Semester) -> TimetableResult<Course> {
        course.semester = semester.name.clone();
        let times = self.time_slots.resolve(course.slots);
        course.start_time = times.map(|(start, _)| start);
        course.end_time = times.map(|(_, end)| end);
        course_validation::validate_course(&course)?;
        course_validation::validate_within_semester(&course, semester.total_weeks())?;
        Ok(course)
    }

    fn check_week(&self, week: u32) -> TimetableResult<()> {
        if !self.semester.has_week(week) {
            return Err(ValidationError::new(format!(
                "week {week} is outside 1..={} of {}",
                self.semester.total_weeks(),
                self.semester.name
            ))
            .into());
        }
        Ok(())
    }

    /// Compares against the records of the course's own semester.
    fn ensure_no_conflict(&self, course: &Course) -> TimetableResult<()> {
        let existing = self.store.all(&course.semester)?;
        if let Some(clash) = ConflictScan::new(&existing).find(course) {
            warn!(
                candidate = %course.name,
                existing = %clash.name,
                "course rejected, occupancy clash"
            );
            return Err(TimetableError::conflict(course, clash));
        }
        Ok(())
    }

    fn ensure_batch_free(&self, batch: &[Course]) -> TimetableResult<()> {
        let existing = self.courses()?;
        if let Some((candidate, clash)) = ConflictScan::new(&existing).find_in_batch(batch) {
            warn!(
                size = batch.len(),
                candidate = %candidate.name,
                existing = %clash.name,
                "batch rejected, occupancy clash"
            );
            return Err(TimetableError::conflict(candidate, clash));
        }
        Ok(())
    }
}
