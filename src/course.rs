use crate::calculations::derived::{self, ExamStatus};
use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MIN_SLOT: u8 = 1;
pub const MAX_SLOT: u8 = 12;

/// Inclusive band of lesson indices within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotRange {
    pub start: u8,
    pub end: u8,
}

impl SlotRange {
    pub fn new(start: u8, end: u8) -> Self {
        Self { start, end }
    }

    pub fn single(slot: u8) -> Self {
        Self {
            start: slot,
            end: slot,
        }
    }

    pub fn contains(&self, slot: u8) -> bool {
        self.start <= slot && slot <= self.end
    }

    pub fn intersects(&self, other: &SlotRange) -> bool {
        !(other.end < self.start || other.start > self.end)
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> {
        self.start..=self.end
    }

    pub fn len(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            (self.end - self.start) as usize + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for SlotRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Inclusive range of semester weeks, counted from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeekRange {
    pub start: u32,
    pub end: u32,
}

impl WeekRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn single(week: u32) -> Self {
        Self {
            start: week,
            end: week,
        }
    }

    pub fn contains(&self, week: u32) -> bool {
        self.start <= week && week <= self.end
    }

    pub fn overlaps(&self, other: &WeekRange) -> bool {
        !(other.end < self.start || other.start > self.end)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }
}

impl fmt::Display for WeekRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Course category. Stored as free text; unknown labels survive in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum CourseType {
    #[default]
    Required,
    Elective,
    Lab,
    Other(String),
}

impl CourseType {
    pub fn as_str(&self) -> &str {
        match self {
            CourseType::Required => "必修",
            CourseType::Elective => "选修",
            CourseType::Lab => "实验",
            CourseType::Other(label) => label.as_str(),
        }
    }

    pub fn parse(input: &str) -> Self {
        match input.trim() {
            "必修" => CourseType::Required,
            "选修" => CourseType::Elective,
            "实验" => CourseType::Lab,
            other => match other.to_ascii_lowercase().as_str() {
                "required" => CourseType::Required,
                "elective" => CourseType::Elective,
                "lab" => CourseType::Lab,
                _ => CourseType::Other(other.to_string()),
            },
        }
    }
}

impl fmt::Display for CourseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for CourseType {
    fn from(value: String) -> Self {
        CourseType::parse(&value)
    }
}

impl From<CourseType> for String {
    fn from(value: CourseType) -> Self {
        value.as_str().to_string()
    }
}

/// One scheduled class occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    /// `None` until the record has been persisted.
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub teacher: String,
    #[serde(default)]
    pub location: String,
    /// 1 = Monday .. 7 = Sunday.
    pub weekday: u8,
    pub slots: SlotRange,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub end_time: Option<NaiveTime>,
    pub weeks: WeekRange,
    #[serde(default)]
    pub exam_date: Option<NaiveDate>,
    #[serde(default)]
    pub course_type: CourseType,
    #[serde(default)]
    pub credits: f64,
    #[serde(default)]
    pub semester: String,
}

impl Course {
    pub fn new(name: impl Into<String>, weekday: u8, slots: SlotRange, weeks: WeekRange) -> Self {
        Self {
            id: None,
            name: name.into(),
            teacher: String::new(),
            location: String::new(),
            weekday,
            slots,
            start_time: None,
            end_time: None,
            weeks,
            exam_date: None,
            course_type: CourseType::default(),
            credits: 0.0,
            semester: String::new(),
        }
    }

    pub fn is_saved(&self) -> bool {
        self.id.is_some()
    }

    pub fn chrono_weekday(&self) -> Option<Weekday> {
        match self.weekday {
            1 => Some(Weekday::Mon),
            2 => Some(Weekday::Tue),
            3 => Some(Weekday::Wed),
            4 => Some(Weekday::Thu),
            5 => Some(Weekday::Fri),
            6 => Some(Weekday::Sat),
            7 => Some(Weekday::Sun),
            _ => None,
        }
    }

    pub fn remaining_days(&self, today: NaiveDate) -> i64 {
        derived::remaining_days(self.exam_date, today)
    }

    pub fn exam_status(&self, today: NaiveDate) -> ExamStatus {
        derived::exam_status(self.exam_date, today)
    }

    /// Ordering used by every listing: weekday, first slot, then id.
    pub fn sort_key(&self) -> (u8, u8, i64) {
        (self.weekday, self.slots.start, self.id.unwrap_or(i64::MAX))
    }
}

pub fn sort_courses(courses: &mut [Course]) {
    courses.sort_by_key(Course::sort_key);
}

pub fn weekday_label(weekday: u8) -> &'static str {
    match weekday {
        1 => "周一",
        2 => "周二",
        3 => "周三",
        4 => "周四",
        5 => "周五",
        6 => "周六",
        7 => "周日",
        _ => "?",
    }
}
