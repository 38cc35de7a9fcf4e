use chrono::{NaiveDate, NaiveTime};
use tempfile::TempDir;
use timetable::persistence::file::{COURSES_FILE, TIME_SLOTS_FILE};
use timetable::{
    Course, CourseStore, CourseType, FileCourseStore, Semester, SlotRange, StoreError,
    TimeSlotTable, WeekRange,
};

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn course(name: &str, weekday: u8, slots: SlotRange, weeks: WeekRange) -> Course {
    let mut course = Course::new(name, weekday, slots, weeks);
    course.location = "教学楼 A203".into();
    course.teacher = "王老师".into();
    course
}

#[test]
fn missing_directory_loads_empty_with_defaults() {
    let dir = TempDir::new().unwrap();
    let store = FileCourseStore::open(dir.path().join("nothing-here")).unwrap();
    let semester = Semester::default();
    assert!(store.all(&semester.name).unwrap().is_empty());
    assert_eq!(store.time_slots().unwrap(), TimeSlotTable::default());
    assert_eq!(store.semesters().unwrap(), vec![semester]);
}

#[test]
fn records_round_trip_through_reload() {
    let dir = TempDir::new().unwrap();
    let semester = Semester::default().name;
    let mut first = course("高等数学", 1, SlotRange::new(1, 2), WeekRange::new(1, 16));
    first.exam_date = Some(d(2026, 1, 12));
    first.start_time = NaiveTime::from_hms_opt(8, 0, 0);
    first.end_time = NaiveTime::from_hms_opt(9, 40, 0);
    first.credits = 4.5;
    let mut second = course("电路实验", 3, SlotRange::single(7), WeekRange::new(3, 10));
    second.course_type = CourseType::Lab;

    let mut store = FileCourseStore::open(dir.path()).unwrap();
    let first_id = store.insert(first.clone()).unwrap();
    let second_id = store.insert(second.clone()).unwrap();
    assert_eq!((first_id, second_id), (1, 2));

    let reloaded = FileCourseStore::open(dir.path()).unwrap();
    let courses = reloaded.all(&semester).unwrap();
    assert_eq!(courses.len(), 2);

    first.id = Some(first_id);
    first.semester = semester.clone();
    second.id = Some(second_id);
    second.semester = semester.clone();
    assert_eq!(courses[0], first);
    assert_eq!(courses[1], second);
}

#[test]
fn delete_missing_id_is_a_no_op_and_reload_shows_remaining() {
    let dir = TempDir::new().unwrap();
    let semester = Semester::default().name;
    let mut store = FileCourseStore::open(dir.path()).unwrap();
    for (idx, name) in ["A", "B", "C"].iter().enumerate() {
        store
            .insert(course(name, idx as u8 + 1, SlotRange::single(1), WeekRange::new(1, 4)))
            .unwrap();
    }

    assert!(!store.delete(42).unwrap());
    assert_eq!(store.all(&semester).unwrap().len(), 3);

    assert!(store.delete(2).unwrap());
    let reloaded = FileCourseStore::open(dir.path()).unwrap();
    let names: Vec<String> = reloaded
        .all(&semester)
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["A", "C"]);
}

#[test]
fn update_replaces_by_id_and_rejects_unknown_ids() {
    let dir = TempDir::new().unwrap();
    let mut store = FileCourseStore::open(dir.path()).unwrap();
    let id = store
        .insert(course("英语", 2, SlotRange::new(3, 4), WeekRange::new(1, 8)))
        .unwrap();

    let mut edited = store.get(id).unwrap().unwrap();
    edited.location = "外语楼 301".into();
    store.update(&edited).unwrap();
    assert_eq!(store.get(id).unwrap().unwrap().location, "外语楼 301");

    edited.id = Some(99);
    assert!(matches!(store.update(&edited), Err(StoreError::NotFound(99))));
}

#[test]
fn pipe_in_text_fields_is_rejected_before_writing() {
    let dir = TempDir::new().unwrap();
    let mut store = FileCourseStore::open(dir.path()).unwrap();
    let bad = course("A|B", 1, SlotRange::single(1), WeekRange::new(1, 2));
    assert!(matches!(store.insert(bad), Err(StoreError::InvalidData(_))));
    assert!(!dir.path().join(COURSES_FILE).exists());
}

#[test]
fn malformed_and_legacy_lines_are_handled_on_load() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(COURSES_FILE),
        "物理||李老师|B101|5|14:00|14:45|4|1|16\nthis line is broken\n化学||赵老师|C201|6|||5|2|9\n",
    )
    .unwrap();
    let store = FileCourseStore::open(dir.path()).unwrap();
    let courses = store.all(&Semester::default().name).unwrap();
    assert_eq!(courses.len(), 2);
    assert_eq!(courses[0].id, Some(1));
    assert_eq!(courses[1].id, Some(2));
    assert_eq!(courses[1].start_time, None);
}

#[test]
fn time_slots_and_semester_persist() {
    let dir = TempDir::new().unwrap();
    let mut store = FileCourseStore::open(dir.path()).unwrap();
    let mut slots = TimeSlotTable::default();
    slots
        .set(
            1,
            NaiveTime::from_hms_opt(8, 10, 0).unwrap(),
            NaiveTime::from_hms_opt(8, 55, 0).unwrap(),
        )
        .unwrap();
    store.save_time_slots(&slots).unwrap();
    let spring = Semester::new("2025-2026-2", d(2026, 3, 2), d(2026, 7, 10)).unwrap();
    store.save_semester(&spring).unwrap();

    let reloaded = FileCourseStore::open(dir.path()).unwrap();
    assert_eq!(reloaded.time_slots().unwrap().label(1), "08:10-08:55");
    assert_eq!(reloaded.semester("2025-2026-2").unwrap(), Some(spring));
    assert!(dir.path().join(TIME_SLOTS_FILE).exists());
}

#[test]
fn search_is_case_insensitive_over_name_teacher_and_location() {
    let dir = TempDir::new().unwrap();
    let semester = Semester::default().name;
    let mut store = FileCourseStore::open(dir.path()).unwrap();
    let mut os = course("Operating Systems", 1, SlotRange::single(1), WeekRange::new(1, 2));
    os.teacher = "Dr. Chen".into();
    store.insert(os).unwrap();
    store
        .insert(course("Databases", 2, SlotRange::single(1), WeekRange::new(1, 2)))
        .unwrap();

    assert_eq!(store.search(&semester, "operating").unwrap().len(), 1);
    assert_eq!(store.search(&semester, "CHEN").unwrap().len(), 1);
    assert_eq!(store.search(&semester, "a203").unwrap().len(), 2);
    assert!(store.search(&semester, "physics").unwrap().is_empty());
}

#[test]
fn backup_copies_current_files() {
    let dir = TempDir::new().unwrap();
    let mut store = FileCourseStore::open(dir.path().join("data")).unwrap();
    store
        .insert(course("历史", 5, SlotRange::single(9), WeekRange::new(1, 3)))
        .unwrap();
    let target = store.backup(&dir.path().join("backups")).unwrap();
    let restored = FileCourseStore::open(&target).unwrap();
    assert_eq!(restored.all(&Semester::default().name).unwrap().len(), 1);
}

#[test]
fn unreadable_exam_date_keeps_the_course_across_writes() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(COURSES_FILE),
        "高数|2025-13-45|张老师|B601|3|09:50|10:35|2|1|16\n英语||李老师|B602|1|08:00|08:45|3|1|16\n",
    )
    .unwrap();
    let semester = Semester::default().name;

    let mut store = FileCourseStore::open(dir.path()).unwrap();
    let loaded = store.all(&semester).unwrap();
    assert_eq!(loaded.len(), 2);
    let math = loaded.iter().find(|c| c.name == "高数").unwrap();
    assert_eq!(math.exam_date, None);

    store
        .insert(course("体育", 5, SlotRange::single(5), WeekRange::new(1, 4)))
        .unwrap();
    let text = std::fs::read_to_string(dir.path().join(COURSES_FILE)).unwrap();
    assert!(text.contains("高数"));
    let reloaded = FileCourseStore::open(dir.path()).unwrap();
    assert_eq!(reloaded.all(&semester).unwrap().len(), 3);
}
