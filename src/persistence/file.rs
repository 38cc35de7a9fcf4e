use super::{
    CourseStore, StoreError, StoreResult, backup_stamp, format_date, format_time, lenient,
    parse_date, parse_time,
};
use crate::calendar::Semester;
use crate::course::{Course, CourseType, SlotRange, WeekRange, sort_courses};
use crate::time_slot::{TimeSlot, TimeSlotTable};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const COURSES_FILE: &str = "courses.txt";
pub const TIME_SLOTS_FILE: &str = "timeslots.txt";
pub const SEMESTER_FILE: &str = "semester.txt";

const LEGACY_FIELD_COUNT: usize = 10;
const FULL_FIELD_COUNT: usize = 13;

/// Text backend: one directory per semester, every mutation rewrites the file.
#[derive(Debug)]
pub struct FileCourseStore {
    dir: PathBuf,
    courses: Vec<Course>,
    time_slots: TimeSlotTable,
    semester: Semester,
}

impl FileCourseStore {
    /// Loads the directory. Missing files are treated as empty or default.
    pub fn open<P: AsRef<Path>>(dir: P) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        let semester = match read_optional(&dir.join(SEMESTER_FILE))? {
            Some(text) => parse_semester(&text)?,
            None => Semester::default(),
        };
        let time_slots = match read_optional(&dir.join(TIME_SLOTS_FILE))? {
            Some(text) => parse_time_slots(&text),
            None => TimeSlotTable::default(),
        };
        let courses = match read_optional(&dir.join(COURSES_FILE))? {
            Some(text) => parse_courses(&text, &semester.name),
            None => Vec::new(),
        };
        debug!(
            dir = %dir.display(),
            courses = courses.len(),
            semester = %semester.name,
            "opened text course store"
        );
        Ok(Self {
            dir,
            courses,
            time_slots,
            semester,
        })
    }

    /// Store with default state bound to `dir`; nothing is read from disk.
    pub fn empty<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            courses: Vec::new(),
            time_slots: TimeSlotTable::default(),
            semester: Semester::default(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn current_semester(&self) -> &Semester {
        &self.semester
    }

    fn next_id(&self) -> i64 {
        self.courses
            .iter()
            .filter_map(|c| c.id)
            .max()
            .map(|m| m + 1)
            .unwrap_or(1)
    }

    fn check_semester(&self, course: &Course) -> StoreResult<()> {
        if !course.semester.is_empty() && course.semester != self.semester.name {
            return Err(StoreError::InvalidData(format!(
                "text store holds semester '{}' only, got '{}'",
                self.semester.name, course.semester
            )));
        }
        Ok(())
    }

    fn prepare_new(&self, mut course: Course, id: i64) -> StoreResult<Course> {
        self.check_semester(&course)?;
        check_text_fields(&course)?;
        course.id = Some(id);
        course.semester = self.semester.name.clone();
        Ok(course)
    }

    fn commit_courses(&mut self, courses: Vec<Course>) -> StoreResult<()> {
        write_atomic(&self.dir.join(COURSES_FILE), &render_courses(&courses))?;
        self.courses = courses;
        Ok(())
    }
}

impl CourseStore for FileCourseStore {
    fn insert(&mut self, course: Course) -> StoreResult<i64> {
        let id = self.next_id();
        let course = self.prepare_new(course, id)?;
        let mut courses = self.courses.clone();
        courses.push(course);
        self.commit_courses(courses)?;
        info!(id, "course inserted");
        Ok(id)
    }

    fn insert_batch(&mut self, batch: Vec<Course>) -> StoreResult<Vec<i64>> {
        let mut next = self.next_id();
        let mut courses = self.courses.clone();
        let mut ids = Vec::with_capacity(batch.len());
        for course in batch {
            courses.push(self.prepare_new(course, next)?);
            ids.push(next);
            next += 1;
        }
        self.commit_courses(courses)?;
        info!(count = ids.len(), "course batch inserted");
        Ok(ids)
    }

    fn update(&mut self, course: &Course) -> StoreResult<()> {
        let id = course
            .id
            .ok_or_else(|| StoreError::InvalidData("cannot update an unsaved course".into()))?;
        self.check_semester(course)?;
        check_text_fields(course)?;
        let mut courses = self.courses.clone();
        let slot = courses
            .iter_mut()
            .find(|c| c.id == Some(id))
            .ok_or(StoreError::NotFound(id))?;
        *slot = course.clone();
        slot.semester = self.semester.name.clone();
        self.commit_courses(courses)?;
        info!(id, "course updated");
        Ok(())
    }

    fn delete(&mut self, id: i64) -> StoreResult<bool> {
        if !self.courses.iter().any(|c| c.id == Some(id)) {
            return Ok(false);
        }
        let mut courses = self.courses.clone();
        courses.retain(|c| c.id != Some(id));
        self.commit_courses(courses)?;
        info!(id, "course deleted");
        Ok(true)
    }

    fn get(&self, id: i64) -> StoreResult<Option<Course>> {
        Ok(self.courses.iter().find(|c| c.id == Some(id)).cloned())
    }

    fn all(&self, semester: &str) -> StoreResult<Vec<Course>> {
        if semester != self.semester.name {
            return Ok(Vec::new());
        }
        let mut courses = self.courses.clone();
        sort_courses(&mut courses);
        Ok(courses)
    }

    fn clear(&mut self, semester: &str) -> StoreResult<usize> {
        if semester != self.semester.name {
            return Ok(0);
        }
        let removed = self.courses.len();
        self.commit_courses(Vec::new())?;
        info!(removed, "course store cleared");
        Ok(removed)
    }

    fn time_slots(&self) -> StoreResult<TimeSlotTable> {
        Ok(self.time_slots.clone())
    }

    fn save_time_slots(&mut self, slots: &TimeSlotTable) -> StoreResult<()> {
        write_atomic(&self.dir.join(TIME_SLOTS_FILE), &render_time_slots(slots))?;
        self.time_slots = slots.clone();
        Ok(())
    }

    fn semester(&self, name: &str) -> StoreResult<Option<Semester>> {
        Ok((name == self.semester.name).then(|| self.semester.clone()))
    }

    fn semesters(&self) -> StoreResult<Vec<Semester>> {
        Ok(vec![self.semester.clone()])
    }

    /// The text form keeps a single semester; saving another one renames it.
    fn save_semester(&mut self, semester: &Semester) -> StoreResult<()> {
        if semester.name.contains(['|', '\n', '\r']) {
            return Err(StoreError::InvalidData(
                "semester name must not contain '|' or line breaks".into(),
            ));
        }
        write_atomic(&self.dir.join(SEMESTER_FILE), &render_semester(semester))?;
        self.semester = semester.clone();
        for course in &mut self.courses {
            course.semester = semester.name.clone();
        }
        Ok(())
    }

    fn backup(&self, dest_dir: &Path) -> StoreResult<PathBuf> {
        let target = dest_dir.join(backup_stamp());
        fs::create_dir_all(&target)?;
        fs::write(target.join(COURSES_FILE), render_courses(&self.courses))?;
        fs::write(target.join(TIME_SLOTS_FILE), render_time_slots(&self.time_slots))?;
        fs::write(target.join(SEMESTER_FILE), render_semester(&self.semester))?;
        info!(target = %target.display(), "text store backed up");
        Ok(target)
    }
}

/// `name|examDate|teacher|location|lesson|startTime|endTime|weekDay|startWeek|endWeek|courseType|credits|id`
///
/// The lesson field is `n` for a single slot or `n-m` for a band.
pub fn format_course_line(course: &Course) -> String {
    [
        course.name.clone(),
        format_date(course.exam_date),
        course.teacher.clone(),
        course.location.clone(),
        course.slots.to_string(),
        format_time(course.start_time),
        format_time(course.end_time),
        course.weekday.to_string(),
        course.weeks.start.to_string(),
        course.weeks.end.to_string(),
        course.course_type.as_str().to_string(),
        course.credits.to_string(),
        course.id.map(|id| id.to_string()).unwrap_or_default(),
    ]
    .join("|")
}

/// Accepts both the ten-field legacy layout and the extended one.
pub fn parse_course_line(line: &str) -> StoreResult<Course> {
    let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('|').collect();
    if fields.len() != LEGACY_FIELD_COUNT && fields.len() != FULL_FIELD_COUNT {
        return Err(StoreError::InvalidData(format!(
            "expected {LEGACY_FIELD_COUNT} or {FULL_FIELD_COUNT} fields, found {}",
            fields.len()
        )));
    }

    let slots = parse_slot_field(fields[4])?;
    let weeks = WeekRange::new(
        parse_number(fields[8], "start week")?,
        parse_number(fields[9], "end week")?,
    );
    let mut course = Course::new(fields[0], parse_number(fields[7], "weekday")?, slots, weeks);
    course.exam_date = lenient(parse_date(fields[1]), "exam_date", fields[0]);
    course.teacher = fields[2].to_string();
    course.location = fields[3].to_string();
    course.start_time = lenient(parse_time(fields[5]), "start_time", fields[0]);
    course.end_time = lenient(parse_time(fields[6]), "end_time", fields[0]);

    if fields.len() == FULL_FIELD_COUNT {
        if !fields[10].trim().is_empty() {
            course.course_type = CourseType::parse(fields[10]);
        }
        if !fields[11].trim().is_empty() {
            course.credits = parse_number(fields[11], "credits")?;
        }
        if !fields[12].trim().is_empty() {
            course.id = Some(parse_number(fields[12], "id")?);
        }
    }
    Ok(course)
}

fn parse_courses(text: &str, semester: &str) -> Vec<Course> {
    let mut courses: Vec<Course> = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_course_line(line) {
            Ok(mut course) => {
                course.semester = semester.to_string();
                courses.push(course);
            }
            Err(err) => warn!(line = line_no + 1, %err, "skipping malformed course line"),
        }
    }

    // Legacy lines carry no id; give them fresh ones after the stored maximum.
    let mut next = courses.iter().filter_map(|c| c.id).max().unwrap_or(0) + 1;
    let mut seen = std::collections::HashSet::new();
    for course in &mut courses {
        match course.id {
            Some(id) if seen.insert(id) => {}
            _ => {
                course.id = Some(next);
                seen.insert(next);
                next += 1;
            }
        }
    }
    courses
}

fn render_courses(courses: &[Course]) -> String {
    let mut out = String::new();
    for course in courses {
        out.push_str(&format_course_line(course));
        out.push('\n');
    }
    out
}

fn parse_time_slots(text: &str) -> TimeSlotTable {
    let mut slots = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_time_slot_line(line) {
            Ok(slot) => slots.push(slot),
            Err(err) => warn!(line = line_no + 1, %err, "skipping malformed time slot line"),
        }
    }
    if slots.is_empty() {
        return TimeSlotTable::default();
    }
    TimeSlotTable::from_slots(slots).unwrap_or_else(|err| {
        warn!(%err, "time slot file rejected, using the standard table");
        TimeSlotTable::default()
    })
}

fn parse_time_slot_line(line: &str) -> StoreResult<TimeSlot> {
    let fields: Vec<&str> = line.trim().split('|').collect();
    if fields.len() != 3 {
        return Err(StoreError::InvalidData(format!(
            "expected 3 fields, found {}",
            fields.len()
        )));
    }
    let index = parse_number(fields[0], "lesson index")?;
    let start = parse_time(fields[1])?
        .ok_or_else(|| StoreError::InvalidData("missing slot start time".into()))?;
    let end = parse_time(fields[2])?
        .ok_or_else(|| StoreError::InvalidData("missing slot end time".into()))?;
    Ok(TimeSlot { index, start, end })
}

fn render_time_slots(slots: &TimeSlotTable) -> String {
    let mut out = String::new();
    for slot in slots.iter() {
        out.push_str(&format!(
            "{}|{}|{}\n",
            slot.index,
            slot.start.format("%H:%M"),
            slot.end.format("%H:%M")
        ));
    }
    out
}

fn parse_semester(text: &str) -> StoreResult<Semester> {
    let line = text
        .lines()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| StoreError::InvalidData("semester file is empty".into()))?;
    let fields: Vec<&str> = line.trim().split('|').collect();
    if fields.len() != 3 {
        return Err(StoreError::InvalidData(format!(
            "semester line needs 3 fields, found {}",
            fields.len()
        )));
    }
    let start = parse_date(fields[1])?
        .ok_or_else(|| StoreError::InvalidData("semester start date missing".into()))?;
    let end = parse_date(fields[2])?
        .ok_or_else(|| StoreError::InvalidData("semester end date missing".into()))?;
    Semester::new(fields[0], start, end).map_err(|err| StoreError::InvalidData(err.to_string()))
}

fn render_semester(semester: &Semester) -> String {
    format!(
        "{}|{}|{}\n",
        semester.name,
        semester.start_date.format("%Y-%m-%d"),
        semester.end_date.format("%Y-%m-%d")
    )
}

fn check_text_fields(course: &Course) -> StoreResult<()> {
    let fields = [
        ("name", course.name.as_str()),
        ("teacher", course.teacher.as_str()),
        ("location", course.location.as_str()),
        ("course type", course.course_type.as_str()),
    ];
    for (label, value) in fields {
        if value.contains(['|', '\n', '\r']) {
            return Err(StoreError::InvalidData(format!(
                "{label} must not contain '|' or line breaks"
            )));
        }
    }
    Ok(())
}

fn parse_slot_field(input: &str) -> StoreResult<SlotRange> {
    match input.trim().split_once('-') {
        Some((start, end)) => Ok(SlotRange::new(
            parse_number(start, "start slot")?,
            parse_number(end, "end slot")?,
        )),
        None => Ok(SlotRange::single(parse_number(input, "lesson index")?)),
    }
}

fn parse_number<T: std::str::FromStr>(input: &str, what: &str) -> StoreResult<T>
where
    T::Err: std::fmt::Display,
{
    input
        .trim()
        .parse::<T>()
        .map_err(|e| StoreError::InvalidData(format!("invalid {what} '{input}': {e}")))
}


fn read_optional(path: &Path) -> StoreResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Writes a sibling temp file and renames it over `path`.
fn write_atomic(path: &Path, contents: &str) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_line_parses_without_extension_fields() {
        let course =
            parse_course_line("高数|2025-12-20|张老师|B601|3|09:50|10:35|2|1|16").unwrap();
        assert_eq!(course.name, "高数");
        assert_eq!(course.slots, SlotRange::single(3));
        assert_eq!(course.weekday, 2);
        assert_eq!(course.weeks, WeekRange::new(1, 16));
        assert_eq!(course.id, None);
        assert_eq!(course.course_type, CourseType::Required);
        assert_eq!(course.credits, 0.0);
    }

    #[test]
    fn band_lesson_field_round_trips() {
        let line = "实验课||李老师|Lab 2|5-8|14:00|17:30|4|3|9|实验|1.5|7";
        let course = parse_course_line(line).unwrap();
        assert_eq!(course.slots, SlotRange::new(5, 8));
        assert_eq!(course.exam_date, None);
        assert_eq!(course.id, Some(7));
        assert_eq!(format_course_line(&course), line);
    }

    #[test]
    fn unreadable_exam_date_and_times_load_as_unset() {
        let course =
            parse_course_line("高数|2025-13-45|张老师|B601|3|9点|25:99|2|1|16").unwrap();
        assert_eq!(course.name, "高数");
        assert_eq!(course.exam_date, None);
        assert_eq!(course.start_time, None);
        assert_eq!(course.end_time, None);
        assert_eq!(course.weeks, WeekRange::new(1, 16));
    }

    #[test]
    fn wrong_field_count_is_rejected() {
        assert!(parse_course_line("a|b|c").is_err());
    }

    #[test]
    fn duplicate_and_missing_ids_are_reassigned() {
        let text = "A||t|l|1|||1|1|2|必修|1|4\nB||t|l|2|||1|1|2\nC||t|l|3|||1|1|2|必修|1|4\n";
        let courses = parse_courses(text, "s");
        let ids: Vec<_> = courses.iter().map(|c| c.id.unwrap()).collect();
        assert_eq!(ids, vec![4, 5, 6]);
    }
}
