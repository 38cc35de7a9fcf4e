use chrono::{NaiveDate, NaiveTime};
use tempfile::TempDir;
use timetable::calculations::derived::{ExamStatus, ExamUrgency};
use timetable::timetable::TimetableError;
use timetable::{
    Course, FileCourseStore, Semester, SlotRange, TimeSlot, TimeSlotTable, Timetable, WeekRange,
};

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn open(dir: &TempDir) -> Timetable<FileCourseStore> {
    let store = FileCourseStore::open(dir.path()).unwrap();
    Timetable::open(store, &Semester::default().name).unwrap()
}

fn course(name: &str, weekday: u8, slots: SlotRange, weeks: WeekRange) -> Course {
    let mut course = Course::new(name, weekday, slots, weeks);
    course.location = "主楼 101".into();
    course
}

#[test]
fn add_rejects_clash_unless_forced() {
    let dir = TempDir::new().unwrap();
    let mut timetable = open(&dir);
    timetable
        .add_course(course("数学", 1, SlotRange::new(1, 2), WeekRange::new(1, 5)), false)
        .unwrap();

    let clash = course("物理", 1, SlotRange::single(2), WeekRange::new(3, 8));
    match timetable.add_course(clash.clone(), false) {
        Err(TimetableError::Conflict { candidate, existing }) => {
            assert_eq!(candidate.name, "物理");
            assert_eq!(existing.name, "数学");
        }
        other => panic!("expected conflict, got {other:?}"),
    }
    assert_eq!(timetable.courses().unwrap().len(), 1);

    timetable.add_course(clash, true).unwrap();
    assert_eq!(timetable.courses().unwrap().len(), 2);
}

#[test]
fn add_resolves_clock_times_and_validates() {
    let dir = TempDir::new().unwrap();
    let mut timetable = open(&dir);
    let id = timetable
        .add_course(course("化学", 2, SlotRange::new(5, 6), WeekRange::new(1, 2)), false)
        .unwrap();
    let saved = timetable.course(id).unwrap();
    assert_eq!(saved.start_time, NaiveTime::from_hms_opt(14, 0, 0));
    assert_eq!(saved.end_time, NaiveTime::from_hms_opt(15, 40, 0));

    let nameless = course("  ", 2, SlotRange::single(1), WeekRange::new(1, 2));
    assert!(matches!(
        timetable.add_course(nameless, false),
        Err(TimetableError::Validation(_))
    ));
    let too_long = course("长课", 2, SlotRange::single(1), WeekRange::new(1, 30));
    assert!(matches!(
        timetable.add_course(too_long, false),
        Err(TimetableError::Validation(_))
    ));
    let mut no_room = course("无教室", 2, SlotRange::single(1), WeekRange::new(1, 2));
    no_room.location.clear();
    assert!(matches!(
        timetable.add_course(no_room, false),
        Err(TimetableError::Validation(_))
    ));
}

#[test]
fn range_on_empty_store_inserts_six_records() {
    let dir = TempDir::new().unwrap();
    let mut timetable = open(&dir);
    let template = course("编程实践", 5, SlotRange::single(1), WeekRange::single(1));
    let ids = timetable
        .add_course_range(&template, SlotRange::new(1, 2), WeekRange::new(1, 3), false)
        .unwrap();
    assert_eq!(ids.len(), 6);
    assert_eq!(timetable.courses().unwrap().len(), 6);
    assert_eq!(timetable.courses_for_week(2).unwrap().len(), 2);
}

#[test]
fn range_with_one_clash_inserts_nothing() {
    let dir = TempDir::new().unwrap();
    let mut timetable = open(&dir);
    timetable
        .add_course(course("占用", 5, SlotRange::single(2), WeekRange::single(3)), false)
        .unwrap();
    let template = course("编程实践", 5, SlotRange::single(1), WeekRange::single(1));

    let err = timetable
        .add_course_range(&template, SlotRange::new(1, 2), WeekRange::new(1, 3), false)
        .unwrap_err();
    assert!(matches!(err, TimetableError::Conflict { .. }));
    assert_eq!(timetable.courses().unwrap().len(), 1);

    let ids = timetable
        .add_course_range(&template, SlotRange::new(1, 2), WeekRange::new(1, 3), true)
        .unwrap();
    assert_eq!(ids.len(), 6);
    assert_eq!(timetable.courses().unwrap().len(), 7);
}

#[test]
fn range_rejects_inverted_input() {
    let dir = TempDir::new().unwrap();
    let mut timetable = open(&dir);
    let template = course("X", 1, SlotRange::single(1), WeekRange::single(1));
    let err = timetable
        .add_course_range(&template, SlotRange::new(4, 2), WeekRange::new(1, 3), false)
        .unwrap_err();
    assert!(matches!(err, TimetableError::Validation(_)));
}

#[test]
fn update_keeps_own_slot_and_reports_missing_ids() {
    let dir = TempDir::new().unwrap();
    let mut timetable = open(&dir);
    let id = timetable
        .add_course(course("生物", 3, SlotRange::new(3, 4), WeekRange::new(1, 10)), false)
        .unwrap();
    let other = timetable
        .add_course(course("地理", 3, SlotRange::new(5, 6), WeekRange::new(1, 10)), false)
        .unwrap();

    let mut edited = timetable.course(id).unwrap();
    edited.teacher = "周老师".into();
    timetable.update_course(edited.clone(), false).unwrap();
    assert_eq!(timetable.course(id).unwrap().teacher, "周老师");

    edited.slots = SlotRange::new(4, 5);
    assert!(matches!(
        timetable.update_course(edited.clone(), false),
        Err(TimetableError::Conflict { .. })
    ));

    let mut ghost = timetable.course(other).unwrap();
    ghost.id = Some(404);
    assert!(matches!(
        timetable.update_course(ghost, false),
        Err(TimetableError::NotFound(404))
    ));
}

#[test]
fn delete_missing_is_false_and_leaves_store_intact() {
    let dir = TempDir::new().unwrap();
    let mut timetable = open(&dir);
    for day in 1..=3 {
        timetable
            .add_course(course("课", day, SlotRange::single(1), WeekRange::new(1, 4)), false)
            .unwrap();
    }
    assert!(!timetable.delete_course(77).unwrap());
    assert!(timetable.delete_course(1).unwrap());

    let reopened = open(&dir);
    assert_eq!(reopened.courses().unwrap().len(), 2);
}

#[test]
fn week_then_day_filter_matches_week_and_day_query() {
    let dir = TempDir::new().unwrap();
    let mut timetable = open(&dir);
    timetable
        .add_course(course("A", 1, SlotRange::single(1), WeekRange::new(1, 8)), false)
        .unwrap();
    timetable
        .add_course(course("B", 2, SlotRange::single(1), WeekRange::new(4, 6)), false)
        .unwrap();
    timetable
        .add_course(course("C", 2, SlotRange::single(3), WeekRange::new(7, 9)), false)
        .unwrap();

    for week in 1..=10 {
        for day in 1..=7 {
            let mut filtered = timetable.courses_for_week(week).unwrap();
            filtered.retain(|c| c.weekday == day);
            assert_eq!(filtered, timetable.courses_for_week_and_day(week, day).unwrap());
        }
    }
}

#[test]
fn courses_for_date_and_week_number() {
    let dir = TempDir::new().unwrap();
    let mut timetable = open(&dir);
    timetable
        .add_course(course("A", 1, SlotRange::single(1), WeekRange::new(2, 2)), false)
        .unwrap();
    assert_eq!(timetable.courses_for_date(d(2025, 9, 10)).unwrap().len(), 1);
    assert!(timetable.courses_for_date(d(2025, 9, 3)).unwrap().is_empty());
    assert!(timetable.courses_for_date(d(2025, 8, 20)).unwrap().is_empty());
    assert_eq!(timetable.week_number(d(2025, 9, 1)), 1);
    assert_eq!(timetable.week_number(d(2025, 9, 8)), 2);
    assert_eq!(timetable.week_number(d(2026, 5, 1)), 22);
}

#[test]
fn week_grid_places_courses_in_slot_rows() {
    let dir = TempDir::new().unwrap();
    let mut timetable = open(&dir);
    timetable
        .add_course(course("算法", 1, SlotRange::new(1, 2), WeekRange::new(1, 16)), false)
        .unwrap();
    timetable
        .add_course(course("冲突课", 1, SlotRange::single(2), WeekRange::new(1, 1)), true)
        .unwrap();

    let grid = timetable.week_grid(1).unwrap();
    assert_eq!(grid.height(), 12);
    assert_eq!(grid.width(), 9);
    let mon = grid.column("mon").unwrap().str().unwrap();
    assert_eq!(mon.get(0), Some("算法 @主楼 101"));
    assert_eq!(mon.get(1), Some("算法 / 冲突课 @主楼 101"));
    assert_eq!(mon.get(2), Some(""));
    let time = grid.column("time").unwrap().str().unwrap();
    assert_eq!(time.get(0), Some("08:00-08:45"));

    let later = timetable.week_grid(2).unwrap();
    let mon = later.column("mon").unwrap().str().unwrap();
    assert_eq!(mon.get(1), Some("算法"));
}

#[test]
fn semester_and_time_slot_settings() {
    let dir = TempDir::new().unwrap();
    let mut timetable = open(&dir);
    timetable
        .set_time_slot(
            1,
            NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
            NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
        )
        .unwrap();
    assert!(timetable
        .set_time_slot(
            0,
            NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
            NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
        )
        .is_err());

    let spring = Semester::new("2025-2026-2", d(2026, 3, 2), d(2026, 7, 5)).unwrap();
    timetable.set_semester(spring.clone()).unwrap();
    assert_eq!(timetable.semester(), &spring);
    assert!(matches!(
        timetable.switch_semester("1999-2000-1"),
        Err(TimetableError::UnknownSemester(_))
    ));

    let reopened = Timetable::open(FileCourseStore::open(dir.path()).unwrap(), "2025-2026-2").unwrap();
    assert_eq!(reopened.semester(), &spring);
    assert_eq!(reopened.time_slots().label(1), "08:30-09:15");
}

#[test]
fn exam_countdown_reports_status_and_progress() {
    let dir = TempDir::new().unwrap();
    let mut timetable = open(&dir);
    let mut with_exam = course("统计", 4, SlotRange::single(9), WeekRange::new(1, 16));
    with_exam.exam_date = Some(d(2025, 9, 21));
    let id = timetable.add_course(with_exam, false).unwrap();

    let countdown = timetable.exam_countdown(id, d(2025, 9, 11)).unwrap();
    assert_eq!(countdown.remaining_days, 10);
    assert_eq!(countdown.status, ExamStatus::Upcoming { days: 10 });
    assert_eq!(countdown.urgency, Some(ExamUrgency::Soon));
    assert_eq!(countdown.progress_percent, 50);

    let after = timetable.exam_countdown(id, d(2025, 9, 30)).unwrap();
    assert_eq!(after.remaining_days, -1);
    assert_eq!(after.status, ExamStatus::Passed { days_ago: 9 });

    assert!(matches!(
        timetable.exam_countdown(999, d(2025, 9, 11)),
        Err(TimetableError::NotFound(999))
    ));
}

#[test]
fn clear_all_and_search() {
    let dir = TempDir::new().unwrap();
    let mut timetable = open(&dir);
    let mut a = course("Machine Learning", 1, SlotRange::single(1), WeekRange::new(1, 2));
    a.teacher = "Dr. Wu".into();
    timetable.add_course(a, false).unwrap();
    timetable
        .add_course(course("Networks", 2, SlotRange::single(1), WeekRange::new(1, 2)), false)
        .unwrap();

    assert_eq!(timetable.search("learning").unwrap().len(), 1);
    assert_eq!(timetable.search("wu").unwrap().len(), 1);
    assert_eq!(timetable.search("").unwrap().len(), 2);
    assert_eq!(timetable.clear_all().unwrap(), 2);
    assert!(timetable.courses().unwrap().is_empty());
}

#[test]
fn range_beyond_the_semester_is_rejected_without_expanding() {
    let dir = TempDir::new().unwrap();
    let mut timetable = open(&dir);
    let template = course("长课", 2, SlotRange::single(1), WeekRange::single(1));
    for weeks in [WeekRange::new(1, u32::MAX), WeekRange::new(1, 300_000), WeekRange::new(1, 23)] {
        let err = timetable
            .add_course_range(&template, SlotRange::new(1, 12), weeks, false)
            .unwrap_err();
        assert!(matches!(err, TimetableError::Validation(_)));
    }
    assert!(timetable.courses().unwrap().is_empty());
}

#[test]
fn weeks_outside_the_semester_are_validation_errors() {
    let dir = TempDir::new().unwrap();
    let mut timetable = open(&dir);
    timetable
        .add_course(course("线代", 1, SlotRange::new(1, 2), WeekRange::new(1, 22)), false)
        .unwrap();
    for week in [0, 23, u32::MAX] {
        assert!(matches!(
            timetable.courses_for_week(week),
            Err(TimetableError::Validation(_))
        ));
        assert!(matches!(timetable.week_grid(week), Err(TimetableError::Validation(_))));
    }
    assert_eq!(timetable.courses_for_week(22).unwrap().len(), 1);
    assert!(timetable.courses_for_date(d(2026, 6, 1)).unwrap().is_empty());
}

#[test]
fn update_clears_times_of_slots_missing_from_the_table() {
    let dir = TempDir::new().unwrap();
    let mut timetable = open(&dir);
    let id = timetable
        .add_course(course("夜课", 4, SlotRange::new(9, 10), WeekRange::new(1, 4)), false)
        .unwrap();
    assert!(timetable.course(id).unwrap().start_time.is_some());

    let daytime: Vec<TimeSlot> = TimeSlotTable::default()
        .iter()
        .filter(|slot| slot.index <= 8)
        .copied()
        .collect();
    timetable
        .set_time_slots(TimeSlotTable::from_slots(daytime).unwrap())
        .unwrap();

    let mut edited = timetable.course(id).unwrap();
    edited.teacher = "夜班老师".into();
    timetable.update_course(edited, false).unwrap();
    let saved = timetable.course(id).unwrap();
    assert_eq!(saved.start_time, None);
    assert_eq!(saved.end_time, None);
}

#[cfg(feature = "sqlite")]
#[test]
fn update_keeps_the_record_in_its_own_semester() {
    use timetable::SqliteCourseStore;

    let store = SqliteCourseStore::open_in_memory().unwrap();
    let fall = Semester::default();
    let mut timetable = Timetable::open(store, &fall.name).unwrap();
    let id = timetable
        .add_course(course("秋季课", 1, SlotRange::new(1, 2), WeekRange::new(1, 16)), false)
        .unwrap();

    let spring = Semester::new("2025-2026-2", d(2026, 3, 2), d(2026, 7, 5)).unwrap();
    timetable.set_semester(spring.clone()).unwrap();
    assert!(timetable.courses().unwrap().is_empty());

    let mut edited = timetable.course(id).unwrap();
    edited.location = "新楼 305".into();
    timetable.update_course(edited, false).unwrap();

    let saved = timetable.course(id).unwrap();
    assert_eq!(saved.semester, fall.name);
    assert_eq!(saved.location, "新楼 305");
    assert_eq!(saved.weeks, WeekRange::new(1, 16));
    assert!(timetable.courses().unwrap().is_empty());
}
