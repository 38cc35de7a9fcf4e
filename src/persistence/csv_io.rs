use super::{StoreError, StoreResult, format_date, lenient, parse_date};
use crate::calendar::Semester;
use crate::course::{Course, CourseType, SlotRange};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

pub const CSV_HEADER: [&str; 11] = [
    "课程名称",
    "星期",
    "开始节次",
    "结束节次",
    "地点",
    "开始日期",
    "结束日期",
    "教师",
    "考试日期",
    "课程类型",
    "学分",
];

#[derive(Debug, Default, Serialize, Deserialize)]
struct CourseCsvRecord {
    #[serde(rename = "课程名称")]
    name: String,
    #[serde(rename = "星期")]
    weekday: u8,
    #[serde(rename = "开始节次")]
    start_slot: u8,
    #[serde(rename = "结束节次")]
    end_slot: u8,
    #[serde(rename = "地点")]
    location: String,
    #[serde(rename = "开始日期")]
    start_date: String,
    #[serde(rename = "结束日期")]
    end_date: String,
    #[serde(rename = "教师", default)]
    teacher: String,
    #[serde(rename = "考试日期", default)]
    exam_date: String,
    #[serde(rename = "课程类型", default)]
    course_type: String,
    #[serde(rename = "学分", default)]
    credits: String,
}

impl CourseCsvRecord {
    fn from_course(course: &Course, semester: &Semester) -> Self {
        let dates = semester.date_range(course.weeks);
        Self {
            name: course.name.clone(),
            weekday: course.weekday,
            start_slot: course.slots.start,
            end_slot: course.slots.end,
            location: course.location.clone(),
            start_date: format_date(dates.map(|(start, _)| start)),
            end_date: format_date(dates.map(|(_, end)| end)),
            teacher: course.teacher.clone(),
            exam_date: format_date(course.exam_date),
            course_type: course.course_type.as_str().to_string(),
            credits: course.credits.to_string(),
        }
    }

    fn into_course(self, semester: &Semester) -> StoreResult<Course> {
        let start = parse_date(&self.start_date)?
            .ok_or_else(|| StoreError::InvalidData(format!("'{}' has no start date", self.name)))?;
        let end = parse_date(&self.end_date)?
            .ok_or_else(|| StoreError::InvalidData(format!("'{}' has no end date", self.name)))?;
        if start > end {
            return Err(StoreError::InvalidData(format!(
                "'{}' starts {start} after it ends {end}",
                self.name
            )));
        }

        let mut course = Course::new(
            self.name,
            self.weekday,
            SlotRange::new(self.start_slot, self.end_slot),
            semester.week_range(start, end),
        );
        course.location = self.location;
        course.teacher = self.teacher;
        course.exam_date = lenient(parse_date(&self.exam_date), "exam_date", &course.name);
        if !self.course_type.trim().is_empty() {
            course.course_type = CourseType::parse(&self.course_type);
        }
        if !self.credits.trim().is_empty() {
            course.credits = self.credits.trim().parse().map_err(|e| {
                StoreError::InvalidData(format!("invalid credits '{}': {e}", self.credits))
            })?;
        }
        course.semester = semester.name.clone();
        Ok(course)
    }
}

/// Header row first, then one row per course; week ranges are written as dates.
pub fn write_courses_csv<W: Write>(
    writer: W,
    courses: &[Course],
    semester: &Semester,
) -> StoreResult<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(CSV_HEADER)?;
    for course in courses {
        writer.serialize(CourseCsvRecord::from_course(course, semester))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn export_courses_to_csv<P: AsRef<Path>>(
    path: P,
    courses: &[Course],
    semester: &Semester,
) -> StoreResult<()> {
    let file = File::create(path)?;
    write_courses_csv(file, courses, semester)
}

/// Rows come back unsaved and bound to `semester`; clock times are left unset.
pub fn read_courses_csv<R: Read>(reader: R, semester: &Semester) -> StoreResult<Vec<Course>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut courses = Vec::new();
    for record in reader.deserialize::<CourseCsvRecord>() {
        courses.push(record?.into_course(semester)?);
    }
    Ok(courses)
}

pub fn import_courses_from_csv<P: AsRef<Path>>(
    path: P,
    semester: &Semester,
) -> StoreResult<Vec<Course>> {
    let file = File::open(path)?;
    read_courses_csv(file, semester)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::WeekRange;
    use chrono::NaiveDate;

    #[test]
    fn export_writes_header_for_empty_list() {
        let mut buf = Vec::new();
        write_courses_csv(&mut buf, &[], &Semester::default()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.trim_end(), CSV_HEADER.join(","));
    }

    #[test]
    fn export_maps_weeks_to_dates() {
        let mut course = Course::new("线代", 3, SlotRange::new(1, 2), WeekRange::new(2, 3));
        course.location = "A101".into();
        course.credits = 3.0;
        course.exam_date = NaiveDate::from_ymd_opt(2026, 1, 10);
        let mut buf = Vec::new();
        write_courses_csv(&mut buf, &[course], &Semester::default()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let row = text.lines().nth(1).unwrap();
        assert_eq!(
            row,
            "线代,3,1,2,A101,2025-09-08,2025-09-21,,2026-01-10,必修,3"
        );
    }
}
