use crate::calendar::Semester;
use crate::config::StorageConfig;
use crate::course::{Course, sort_courses};
use crate::time_slot::TimeSlotTable;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("course {0} not found")]
    NotFound(i64),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Capability set shared by the text-file and relational backends.
///
/// Mutations are all-or-nothing with respect to the backing medium. Listings
/// are ordered by weekday, then first lesson slot.
pub trait CourseStore {
    /// Persists a new record and returns its freshly assigned id.
    fn insert(&mut self, course: Course) -> StoreResult<i64>;

    /// Persists every record or none of them.
    fn insert_batch(&mut self, courses: Vec<Course>) -> StoreResult<Vec<i64>>;

    /// Full replace by id. Fails with [`StoreError::NotFound`] for unknown ids.
    fn update(&mut self, course: &Course) -> StoreResult<()>;

    /// Returns `false` when no record had that id.
    fn delete(&mut self, id: i64) -> StoreResult<bool>;

    fn get(&self, id: i64) -> StoreResult<Option<Course>>;

    fn all(&self, semester: &str) -> StoreResult<Vec<Course>>;

    /// Week 0 matches nothing.
    fn courses_in_week(&self, semester: &str, week: u32) -> StoreResult<Vec<Course>> {
        if week == 0 {
            return Ok(Vec::new());
        }
        let mut courses = self.all(semester)?;
        courses.retain(|course| course.weeks.contains(week));
        sort_courses(&mut courses);
        Ok(courses)
    }

    /// Case-insensitive substring match on name, teacher or location.
    fn search(&self, semester: &str, keyword: &str) -> StoreResult<Vec<Course>> {
        let needle = keyword.trim().to_lowercase();
        let mut courses = self.all(semester)?;
        courses.retain(|course| {
            course.name.to_lowercase().contains(&needle)
                || course.teacher.to_lowercase().contains(&needle)
                || course.location.to_lowercase().contains(&needle)
        });
        sort_courses(&mut courses);
        Ok(courses)
    }

    /// Removes every record of `semester`, returning how many were dropped.
    fn clear(&mut self, semester: &str) -> StoreResult<usize>;

    fn time_slots(&self) -> StoreResult<TimeSlotTable>;

    fn save_time_slots(&mut self, slots: &TimeSlotTable) -> StoreResult<()>;

    fn semester(&self, name: &str) -> StoreResult<Option<Semester>>;

    fn semesters(&self) -> StoreResult<Vec<Semester>>;

    fn save_semester(&mut self, semester: &Semester) -> StoreResult<()>;

    /// Writes a timestamped copy of the stored state under `dest_dir`.
    fn backup(&self, dest_dir: &Path) -> StoreResult<PathBuf>;
}

impl<S: CourseStore + ?Sized> CourseStore for Box<S> {
    fn insert(&mut self, course: Course) -> StoreResult<i64> {
        (**self).insert(course)
    }

    fn insert_batch(&mut self, courses: Vec<Course>) -> StoreResult<Vec<i64>> {
        (**self).insert_batch(courses)
    }

    fn update(&mut self, course: &Course) -> StoreResult<()> {
        (**self).update(course)
    }

    fn delete(&mut self, id: i64) -> StoreResult<bool> {
        (**self).delete(id)
    }

    fn get(&self, id: i64) -> StoreResult<Option<Course>> {
        (**self).get(id)
    }

    fn all(&self, semester: &str) -> StoreResult<Vec<Course>> {
        (**self).all(semester)
    }

    fn courses_in_week(&self, semester: &str, week: u32) -> StoreResult<Vec<Course>> {
        (**self).courses_in_week(semester, week)
    }

    fn search(&self, semester: &str, keyword: &str) -> StoreResult<Vec<Course>> {
        (**self).search(semester, keyword)
    }

    fn clear(&mut self, semester: &str) -> StoreResult<usize> {
        (**self).clear(semester)
    }

    fn time_slots(&self) -> StoreResult<TimeSlotTable> {
        (**self).time_slots()
    }

    fn save_time_slots(&mut self, slots: &TimeSlotTable) -> StoreResult<()> {
        (**self).save_time_slots(slots)
    }

    fn semester(&self, name: &str) -> StoreResult<Option<Semester>> {
        (**self).semester(name)
    }

    fn semesters(&self) -> StoreResult<Vec<Semester>> {
        (**self).semesters()
    }

    fn save_semester(&mut self, semester: &Semester) -> StoreResult<()> {
        (**self).save_semester(semester)
    }

    fn backup(&self, dest_dir: &Path) -> StoreResult<PathBuf> {
        (**self).backup(dest_dir)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Pipe-delimited text files, one semester per directory.
    #[default]
    #[serde(alias = "file", alias = "txt")]
    Text,
    /// SQLite database holding every semester.
    #[serde(alias = "db", alias = "sql")]
    Sqlite,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "file" | "txt" => Ok(Self::Text),
            "sqlite" | "db" | "sql" => Ok(Self::Sqlite),
            other => Err(format!("unknown storage backend '{other}'")),
        }
    }
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Text => "text",
            StoreBackend::Sqlite => "sqlite",
        }
    }
}

pub type DynCourseStore = Box<dyn CourseStore + Send>;

/// Opens the backend selected by `config`.
pub fn open_store(config: &StorageConfig) -> StoreResult<DynCourseStore> {
    match config.backend {
        StoreBackend::Text => {
            let store = file::FileCourseStore::open(&config.data_dir)?;
            Ok(Box::new(store))
        }
        #[cfg(feature = "sqlite")]
        StoreBackend::Sqlite => {
            std::fs::create_dir_all(&config.data_dir)?;
            let store = sqlite::SqliteCourseStore::open(config.data_dir.join(sqlite::DATABASE_FILE))?;
            Ok(Box::new(store))
        }
        #[cfg(not(feature = "sqlite"))]
        StoreBackend::Sqlite => Err(StoreError::InvalidData(
            "rebuild with the `sqlite` feature to use the sqlite backend".into(),
        )),
    }
}

pub(crate) fn backup_stamp() -> String {
    chrono::Local::now().format("backup_%Y%m%d_%H%M%S").to_string()
}

pub(crate) fn format_date(date: Option<chrono::NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

pub(crate) fn parse_date(input: &str) -> StoreResult<Option<chrono::NaiveDate>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    chrono::NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map(Some)
        .map_err(|e| StoreError::InvalidData(format!("invalid date '{input}': {e}")))
}

pub(crate) fn format_time(time: Option<chrono::NaiveTime>) -> String {
    time.map(|t| t.format("%H:%M").to_string())
        .unwrap_or_default()
}

pub(crate) fn parse_time(input: &str) -> StoreResult<Option<chrono::NaiveTime>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    chrono::NaiveTime::parse_from_str(input.trim(), "%H:%M")
        .map(Some)
        .map_err(|e| StoreError::InvalidData(format!("invalid time '{input}': {e}")))
}

/// Unreadable optional fields load as unset so a bad value never drops the record.
pub(crate) fn lenient<T>(parsed: StoreResult<Option<T>>, field: &'static str, course: &str) -> Option<T> {
    parsed.unwrap_or_else(|err| {
        tracing::warn!(course, field, %err, "ignoring unreadable field");
        None
    })
}

pub mod csv_io;
pub mod file;
pub mod snapshot;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use csv_io::{
    CSV_HEADER, export_courses_to_csv, import_courses_from_csv, read_courses_csv,
    write_courses_csv,
};
pub use file::{FileCourseStore, format_course_line, parse_course_line};
pub use snapshot::{TimetableSnapshot, load_snapshot_from_json, save_snapshot_to_json};
