pub mod calculations;
pub mod calendar;
pub mod config;
pub mod course;
pub mod course_validation;
#[cfg(feature = "http_api")]
pub mod http_api;
pub mod persistence;
pub mod time_slot;
pub mod timetable;

pub use calendar::{Semester, WeekView};
pub use config::TimetableConfig;
pub use course::{Course, CourseType, SlotRange, WeekRange};
pub use course_validation::ValidationError;
pub use persistence::{CourseStore, DynCourseStore, FileCourseStore, StoreBackend, StoreError};
#[cfg(feature = "sqlite")]
pub use persistence::sqlite::SqliteCourseStore;
pub use time_slot::{TimeSlot, TimeSlotTable};
pub use timetable::{Timetable, TimetableError};
