use timetable::calculations::conflict::{ConflictScan, find_conflict, has_conflict};
use timetable::{Course, SlotRange, WeekRange};

fn at(weekday: u8, slots: SlotRange, weeks: WeekRange) -> Course {
    let mut course = Course::new("Course", weekday, slots, weeks);
    course.location = "Hall".into();
    course
}

#[test]
fn overlapping_weeks_on_same_slot_conflict() {
    let a = at(2, SlotRange::single(3), WeekRange::new(1, 5));
    let b = at(2, SlotRange::single(3), WeekRange::new(3, 8));
    assert!(has_conflict(&a, &b));
}

#[test]
fn disjoint_weeks_do_not_conflict() {
    let a = at(2, SlotRange::single(3), WeekRange::new(1, 5));
    let b = at(2, SlotRange::single(3), WeekRange::new(6, 8));
    assert!(!has_conflict(&a, &b));
}

#[test]
fn different_weekday_does_not_conflict() {
    let a = at(2, SlotRange::single(3), WeekRange::new(1, 5));
    let b = at(3, SlotRange::single(3), WeekRange::new(1, 5));
    assert!(!has_conflict(&a, &b));
}

#[test]
fn intersecting_slot_bands_conflict() {
    let a = at(4, SlotRange::new(1, 3), WeekRange::new(1, 16));
    let b = at(4, SlotRange::new(3, 4), WeekRange::new(1, 16));
    let c = at(4, SlotRange::new(4, 5), WeekRange::new(1, 16));
    assert!(has_conflict(&a, &b));
    assert!(!has_conflict(&a, &c));
}

#[test]
fn conflict_is_symmetric() {
    let samples = [
        at(1, SlotRange::new(1, 2), WeekRange::new(1, 4)),
        at(1, SlotRange::single(2), WeekRange::new(4, 9)),
        at(1, SlotRange::single(3), WeekRange::new(1, 16)),
        at(5, SlotRange::new(1, 12), WeekRange::new(2, 2)),
        at(5, SlotRange::single(7), WeekRange::new(2, 3)),
    ];
    for a in &samples {
        for b in &samples {
            assert_eq!(has_conflict(a, b), has_conflict(b, a));
        }
    }
}

#[test]
fn a_saved_record_never_conflicts_with_itself() {
    let mut a = at(1, SlotRange::single(1), WeekRange::new(1, 4));
    a.id = Some(7);
    let mut edited = a.clone();
    edited.name = "Renamed".into();
    assert!(!has_conflict(&a, &edited));
    edited.id = Some(8);
    assert!(has_conflict(&a, &edited));
}

#[test]
fn scan_reports_first_clash_and_batch_internal_clashes() {
    let mut existing = at(3, SlotRange::single(5), WeekRange::new(1, 10));
    existing.id = Some(1);
    existing.name = "Existing".into();
    let snapshot = vec![existing];

    let free = at(3, SlotRange::single(6), WeekRange::new(1, 10));
    let busy = at(3, SlotRange::single(5), WeekRange::new(10, 12));
    assert!(find_conflict(&free, &snapshot).is_none());
    assert_eq!(find_conflict(&busy, &snapshot).map(|c| c.name.as_str()), Some("Existing"));

    let scan = ConflictScan::new(&snapshot);
    let batch = vec![free.clone(), free.clone()];
    let (candidate, other) = scan.find_in_batch(&batch).unwrap();
    assert_eq!(candidate.slots, SlotRange::single(6));
    assert_eq!(other.slots, SlotRange::single(6));
    assert_eq!(scan.find_all(&busy).len(), 1);
}
