use super::StoreResult;
use crate::calendar::Semester;
use crate::course::Course;
use crate::time_slot::TimeSlotTable;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// Self-contained JSON dump of one semester: calendar, slot table and courses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimetableSnapshot {
    pub semester: Semester,
    #[serde(default)]
    pub time_slots: TimeSlotTable,
    pub courses: Vec<Course>,
}

pub fn save_snapshot_to_json<P: AsRef<Path>>(
    snapshot: &TimetableSnapshot,
    path: P,
) -> StoreResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, snapshot)?;
    Ok(())
}

pub fn load_snapshot_from_json<P: AsRef<Path>>(path: P) -> StoreResult<TimetableSnapshot> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(file)?)
}
