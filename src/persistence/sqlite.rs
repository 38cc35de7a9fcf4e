use super::{
    CourseStore, StoreError, StoreResult, backup_stamp, format_date, format_time, lenient,
    parse_date, parse_time,
};
use crate::calendar::Semester;
use crate::course::{Course, CourseType, SlotRange, WeekRange};
use crate::time_slot::{TimeSlot, TimeSlotTable};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DATABASE_FILE: &str = "coursemanager.db";

const COURSE_COLUMNS: &str = "id, name, day_of_week, start_slot, end_slot, location, \
     start_date, end_date, teacher, exam_date, course_type, credits, semester, \
     start_time, end_time";

pub struct SqliteCourseStore {
    connection: Connection,
}

/// Raw row before dates are mapped back onto semester weeks.
struct CourseRow {
    id: i64,
    name: String,
    day_of_week: u8,
    start_slot: u8,
    end_slot: u8,
    location: String,
    start_date: String,
    end_date: String,
    teacher: String,
    exam_date: String,
    course_type: String,
    credits: f64,
    semester: String,
    start_time: String,
    end_time: String,
}

impl CourseRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            day_of_week: row.get(2)?,
            start_slot: row.get(3)?,
            end_slot: row.get(4)?,
            location: row.get(5)?,
            start_date: row.get(6)?,
            end_date: row.get(7)?,
            teacher: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
            exam_date: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
            course_type: row.get::<_, Option<String>>(10)?.unwrap_or_default(),
            credits: row.get::<_, Option<f64>>(11)?.unwrap_or_default(),
            semester: row.get(12)?,
            start_time: row.get::<_, Option<String>>(13)?.unwrap_or_default(),
            end_time: row.get::<_, Option<String>>(14)?.unwrap_or_default(),
        })
    }
}

impl SqliteCourseStore {
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let connection = Connection::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "opened sqlite course store");
        Self::with_connection(connection)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(connection: Connection) -> StoreResult<Self> {
        Self::initialize_schema(&connection)?;
        Ok(Self { connection })
    }

    fn initialize_schema(connection: &Connection) -> StoreResult<()> {
        let ddl = r#"
            CREATE TABLE IF NOT EXISTS semesters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS courses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                day_of_week INTEGER NOT NULL,
                start_slot INTEGER NOT NULL,
                end_slot INTEGER NOT NULL,
                location TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                teacher TEXT,
                exam_date TEXT,
                course_type TEXT,
                credits REAL,
                semester TEXT NOT NULL,
                start_time TEXT,
                end_time TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_courses_semester
                ON courses (semester, day_of_week, start_slot);
            CREATE TABLE IF NOT EXISTS time_slots (
                lesson INTEGER PRIMARY KEY,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL
            );
        "#;
        connection.execute_batch(ddl)?;

        let default = Semester::default();
        connection.execute(
            "INSERT OR IGNORE INTO semesters (name, start_date, end_date) VALUES (?1, ?2, ?3)",
            params![
                default.name,
                format_date(Some(default.start_date)),
                format_date(Some(default.end_date))
            ],
        )?;
        Ok(())
    }

    fn semester_or_default(&self, name: &str) -> StoreResult<Semester> {
        match self.semester(name)? {
            Some(semester) => Ok(semester),
            None => {
                warn!(semester = name, "unknown semester, mapping weeks on the default calendar");
                Ok(Semester {
                    name: name.to_string(),
                    ..Semester::default()
                })
            }
        }
    }

    fn insert_in(&self, tx: &Transaction<'_>, course: &Course) -> StoreResult<i64> {
        let semester = self.semester_or_default(&course.semester)?;
        let (start_date, end_date) = stored_dates(&semester, course.weeks)?;
        tx.execute(
            "INSERT INTO courses (name, day_of_week, start_slot, end_slot, location, start_date, \
             end_date, teacher, exam_date, course_type, credits, semester, start_time, end_time) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                course.name,
                course.weekday,
                course.slots.start,
                course.slots.end,
                course.location,
                format_date(Some(start_date)),
                format_date(Some(end_date)),
                course.teacher,
                format_date(course.exam_date),
                course.course_type.as_str(),
                course.credits,
                course.semester,
                format_time(course.start_time),
                format_time(course.end_time),
            ],
        )?;
        Ok(tx.last_insert_rowid())
    }

    fn query_courses(&self, sql: &str, params: impl rusqlite::Params) -> StoreResult<Vec<Course>> {
        let mut stmt = self.connection.prepare(sql)?;
        let rows = stmt
            .query_map(params, CourseRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(|row| self.to_course(row)).collect()
    }

    fn to_course(&self, row: CourseRow) -> StoreResult<Course> {
        let semester = self.semester_or_default(&row.semester)?;
        let start = required_date(&row.start_date)?;
        let end = required_date(&row.end_date)?;
        let mut course = Course::new(
            row.name,
            row.day_of_week,
            SlotRange::new(row.start_slot, row.end_slot),
            semester.week_range(start, end),
        );
        course.id = Some(row.id);
        course.location = row.location;
        course.teacher = row.teacher;
        course.exam_date = lenient(parse_date(&row.exam_date), "exam_date", &course.name);
        if !row.course_type.trim().is_empty() {
            course.course_type = CourseType::parse(&row.course_type);
        }
        course.credits = row.credits;
        course.semester = row.semester;
        course.start_time = lenient(parse_time(&row.start_time), "start_time", &course.name);
        course.end_time = lenient(parse_time(&row.end_time), "end_time", &course.name);
        Ok(course)
    }
}

impl CourseStore for SqliteCourseStore {
    fn insert(&mut self, course: Course) -> StoreResult<i64> {
        let tx = self.connection.unchecked_transaction()?;
        let id = self.insert_in(&tx, &course)?;
        tx.commit()?;
        info!(id, "course inserted");
        Ok(id)
    }

    fn insert_batch(&mut self, courses: Vec<Course>) -> StoreResult<Vec<i64>> {
        let tx = self.connection.unchecked_transaction()?;
        let mut ids = Vec::with_capacity(courses.len());
        for course in &courses {
            ids.push(self.insert_in(&tx, course)?);
        }
        tx.commit()?;
        info!(count = ids.len(), "course batch inserted");
        Ok(ids)
    }

    fn update(&mut self, course: &Course) -> StoreResult<()> {
        let id = course
            .id
            .ok_or_else(|| StoreError::InvalidData("cannot update an unsaved course".into()))?;
        let semester = self.semester_or_default(&course.semester)?;
        let (start_date, end_date) = stored_dates(&semester, course.weeks)?;
        let tx = self.connection.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE courses SET name = ?1, day_of_week = ?2, start_slot = ?3, end_slot = ?4, \
             location = ?5, start_date = ?6, end_date = ?7, teacher = ?8, exam_date = ?9, \
             course_type = ?10, credits = ?11, semester = ?12, start_time = ?13, end_time = ?14 \
             WHERE id = ?15",
            params![
                course.name,
                course.weekday,
                course.slots.start,
                course.slots.end,
                course.location,
                format_date(Some(start_date)),
                format_date(Some(end_date)),
                course.teacher,
                format_date(course.exam_date),
                course.course_type.as_str(),
                course.credits,
                course.semester,
                format_time(course.start_time),
                format_time(course.end_time),
                id,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        tx.commit()?;
        info!(id, "course updated");
        Ok(())
    }

    fn delete(&mut self, id: i64) -> StoreResult<bool> {
        let tx = self.connection.unchecked_transaction()?;
        let changed = tx.execute("DELETE FROM courses WHERE id = ?1", params![id])?;
        tx.commit()?;
        if changed > 0 {
            info!(id, "course deleted");
        }
        Ok(changed > 0)
    }

    fn get(&self, id: i64) -> StoreResult<Option<Course>> {
        let row = self
            .connection
            .query_row(
                &format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?1"),
                params![id],
                CourseRow::from_row,
            )
            .optional()?;
        row.map(|row| self.to_course(row)).transpose()
    }

    fn all(&self, semester: &str) -> StoreResult<Vec<Course>> {
        self.query_courses(
            &format!(
                "SELECT {COURSE_COLUMNS} FROM courses WHERE semester = ?1 \
                 ORDER BY day_of_week, start_slot, id"
            ),
            params![semester],
        )
    }

    fn courses_in_week(&self, semester: &str, week: u32) -> StoreResult<Vec<Course>> {
        let calendar = self.semester_or_default(semester)?;
        let (Some(week_start), Some(week_end)) = (calendar.week_start(week), calendar.week_end(week))
        else {
            debug!(semester, week, "week outside the calendar");
            return Ok(Vec::new());
        };
        let week_start = format_date(Some(week_start));
        let week_end = format_date(Some(week_end));
        debug!(semester, week, %week_start, %week_end, "querying courses by week");
        self.query_courses(
            &format!(
                "SELECT {COURSE_COLUMNS} FROM courses WHERE semester = ?1 \
                 AND start_date <= ?2 AND end_date >= ?3 \
                 ORDER BY day_of_week, start_slot, id"
            ),
            params![semester, week_end, week_start],
        )
    }

    fn search(&self, semester: &str, keyword: &str) -> StoreResult<Vec<Course>> {
        let pattern = format!("%{}%", keyword.trim().to_lowercase());
        self.query_courses(
            &format!(
                "SELECT {COURSE_COLUMNS} FROM courses WHERE semester = ?1 \
                 AND (LOWER(name) LIKE ?2 OR LOWER(teacher) LIKE ?2 OR LOWER(location) LIKE ?2) \
                 ORDER BY day_of_week, start_slot, id"
            ),
            params![semester, pattern],
        )
    }

    fn clear(&mut self, semester: &str) -> StoreResult<usize> {
        let tx = self.connection.unchecked_transaction()?;
        let removed = tx.execute("DELETE FROM courses WHERE semester = ?1", params![semester])?;
        tx.commit()?;
        info!(semester, removed, "course store cleared");
        Ok(removed)
    }

    fn time_slots(&self) -> StoreResult<TimeSlotTable> {
        let mut stmt = self
            .connection
            .prepare("SELECT lesson, start_time, end_time FROM time_slots ORDER BY lesson")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, u8>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        if rows.is_empty() {
            return Ok(TimeSlotTable::default());
        }
        let mut slots = Vec::with_capacity(rows.len());
        for (index, start, end) in rows {
            let start = parse_time(&start)?
                .ok_or_else(|| StoreError::InvalidData(format!("slot {index} has no start")))?;
            let end = parse_time(&end)?
                .ok_or_else(|| StoreError::InvalidData(format!("slot {index} has no end")))?;
            slots.push(TimeSlot { index, start, end });
        }
        TimeSlotTable::from_slots(slots).map_err(|err| StoreError::InvalidData(err.to_string()))
    }

    fn save_time_slots(&mut self, slots: &TimeSlotTable) -> StoreResult<()> {
        let tx = self.connection.unchecked_transaction()?;
        tx.execute("DELETE FROM time_slots", [])?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO time_slots (lesson, start_time, end_time) VALUES (?1, ?2, ?3)")?;
            for slot in slots.iter() {
                stmt.execute(params![
                    slot.index,
                    format_time(Some(slot.start)),
                    format_time(Some(slot.end))
                ])?;
            }
        }
        tx.commit()?;
        info!(count = slots.len(), "time slots saved");
        Ok(())
    }

    fn semester(&self, name: &str) -> StoreResult<Option<Semester>> {
        let row = self
            .connection
            .query_row(
                "SELECT name, start_date, end_date FROM semesters WHERE name = ?1",
                params![name],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)),
            )
            .optional()?;
        row.map(|(name, start, end)| to_semester(name, &start, &end))
            .transpose()
    }

    fn semesters(&self) -> StoreResult<Vec<Semester>> {
        let mut stmt = self
            .connection
            .prepare("SELECT name, start_date, end_date FROM semesters ORDER BY start_date")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(name, start, end)| to_semester(name, &start, &end))
            .collect()
    }

    fn save_semester(&mut self, semester: &Semester) -> StoreResult<()> {
        let tx = self.connection.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO semesters (name, start_date, end_date) VALUES (?1, ?2, ?3) \
             ON CONFLICT(name) DO UPDATE SET start_date = excluded.start_date, \
             end_date = excluded.end_date",
            params![
                semester.name,
                format_date(Some(semester.start_date)),
                format_date(Some(semester.end_date))
            ],
        )?;
        tx.commit()?;
        info!(semester = %semester.name, "semester saved");
        Ok(())
    }

    fn backup(&self, dest_dir: &Path) -> StoreResult<PathBuf> {
        std::fs::create_dir_all(dest_dir)?;
        let target = dest_dir.join(format!("{}.db", backup_stamp()));
        self.connection
            .execute("VACUUM INTO ?1", params![target.to_string_lossy()])?;
        info!(target = %target.display(), "sqlite store backed up");
        Ok(target)
    }
}

fn to_semester(name: String, start: &str, end: &str) -> StoreResult<Semester> {
    Ok(Semester {
        name,
        start_date: required_date(start)?,
        end_date: required_date(end)?,
    })
}

fn stored_dates(semester: &Semester, weeks: WeekRange) -> StoreResult<(NaiveDate, NaiveDate)> {
    semester.date_range(weeks).ok_or_else(|| {
        StoreError::InvalidData(format!(
            "weeks {weeks} cannot be placed on the calendar of {}",
            semester.name
        ))
    })
}

fn required_date(input: &str) -> StoreResult<NaiveDate> {
    parse_date(input)?.ok_or_else(|| StoreError::InvalidData("missing date".into()))
}

