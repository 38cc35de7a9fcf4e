use crate::course::Course;

/// Two records clash when they share a weekday, their week ranges overlap and
/// their lesson bands intersect. A record never clashes with itself (same saved id).
pub fn has_conflict(a: &Course, b: &Course) -> bool {
    if let (Some(left), Some(right)) = (a.id, b.id) {
        if left == right {
            return false;
        }
    }
    a.weekday == b.weekday && a.weeks.overlaps(&b.weeks) && a.slots.intersects(&b.slots)
}

/// Scans a snapshot of existing records for occupancy clashes.
pub struct ConflictScan<'a> {
    existing: &'a [Course],
}

impl<'a> ConflictScan<'a> {
    pub fn new(existing: &'a [Course]) -> Self {
        Self { existing }
    }

    pub fn find(&self, candidate: &Course) -> Option<&'a Course> {
        self.existing
            .iter()
            .find(|existing| has_conflict(candidate, existing))
    }

    pub fn find_all(&self, candidate: &Course) -> Vec<&'a Course> {
        self.existing
            .iter()
            .filter(|existing| has_conflict(candidate, existing))
            .collect()
    }

    /// First clash between any candidate and the snapshot, or between two candidates.
    pub fn find_in_batch<'b>(&self, batch: &'b [Course]) -> Option<(&'b Course, &'b Course)>
    where
        'a: 'b,
    {
        for (idx, candidate) in batch.iter().enumerate() {
            if let Some(existing) = self.find(candidate) {
                return Some((candidate, existing));
            }
            if let Some(other) = batch[..idx]
                .iter()
                .find(|earlier| has_conflict(candidate, earlier))
            {
                return Some((candidate, other));
            }
        }
        None
    }
}

pub fn find_conflict<'a>(candidate: &Course, existing: &'a [Course]) -> Option<&'a Course> {
    ConflictScan::new(existing).find(candidate)
}
