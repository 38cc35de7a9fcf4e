use crate::course::{MAX_SLOT, MIN_SLOT, SlotRange};
use crate::course_validation::ValidationError;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const STANDARD_SLOTS: [(&str, &str); 12] = [
    ("08:00", "08:45"),
    ("08:55", "09:40"),
    ("09:50", "10:35"),
    ("10:45", "11:30"),
    ("14:00", "14:45"),
    ("14:55", "15:40"),
    ("15:50", "16:35"),
    ("16:45", "17:30"),
    ("19:00", "19:45"),
    ("19:55", "20:40"),
    ("20:50", "21:35"),
    ("21:45", "22:30"),
];

/// Clock times of one lesson period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub index: u8,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeSlot {
    pub fn label(&self) -> String {
        format!("{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

/// Lesson index -> clock times, shared by every course of an installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlotTable {
    slots: BTreeMap<u8, TimeSlot>,
}

impl Default for TimeSlotTable {
    fn default() -> Self {
        let mut table = Self::empty();
        for (idx, (start, end)) in STANDARD_SLOTS.iter().enumerate() {
            let start = NaiveTime::parse_from_str(start, "%H:%M").unwrap();
            let end = NaiveTime::parse_from_str(end, "%H:%M").unwrap();
            let index = idx as u8 + 1;
            table.slots.insert(index, TimeSlot { index, start, end });
        }
        table
    }
}

impl TimeSlotTable {
    pub fn empty() -> Self {
        Self {
            slots: BTreeMap::new(),
        }
    }

    pub fn from_slots<I>(slots: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = TimeSlot>,
    {
        let mut table = Self::empty();
        for slot in slots {
            table.set(slot.index, slot.start, slot.end)?;
        }
        Ok(table)
    }

    pub fn set(&mut self, index: u8, start: NaiveTime, end: NaiveTime) -> Result<(), ValidationError> {
        if !(MIN_SLOT..=MAX_SLOT).contains(&index) {
            return Err(ValidationError::new(format!(
                "lesson slot {index} is outside {MIN_SLOT}..={MAX_SLOT}"
            )));
        }
        if start >= end {
            return Err(ValidationError::new(format!(
                "lesson slot {index} must start before it ends"
            )));
        }
        self.slots.insert(index, TimeSlot { index, start, end });
        Ok(())
    }

    pub fn get(&self, index: u8) -> Option<&TimeSlot> {
        self.slots.get(&index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimeSlot> {
        self.slots.values()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Start of the first slot and end of the last one; `None` if either is missing.
    pub fn resolve(&self, slots: SlotRange) -> Option<(NaiveTime, NaiveTime)> {
        let first = self.slots.get(&slots.start)?;
        let last = self.slots.get(&slots.end)?;
        Some((first.start, last.end))
    }

    pub fn label(&self, index: u8) -> String {
        self.get(index).map(TimeSlot::label).unwrap_or_default()
    }
}
