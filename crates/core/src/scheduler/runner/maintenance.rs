use std::collections::HashSet;

use tracing::debug;

use crate::error::{Result, SliceError};

use super::Scheduler;

/// Always compact once more than this many tombstones were seen in a pass.
pub(crate) const COMPACT_MIN_TOMBSTONES: usize = 8;
/// Also compact once tombstones reach `scanned >> COMPACT_RATIO_SHIFT`.
pub(crate) const COMPACT_RATIO_SHIFT: u32 = 2;

impl Scheduler {
    pub(super) fn should_compact(&self, removed: usize, scanned: usize) -> bool {
        removed > 0
            && (removed > COMPACT_MIN_TOMBSTONES || removed >= scanned >> COMPACT_RATIO_SHIFT)
    }

    /// Drop tombstones, keeping live tasks in order.
    pub(super) fn compact(&self) {
        let mut slots = self.inner.slots.borrow_mut();
        let before = slots.len();
        slots.retain(Option::is_some);
        debug!(before, after = slots.len(), "slots compacted");
    }

    /// Fail if any task occupies more than one live slot.
    pub(super) fn check_duplicates(&self) -> Result<()> {
        let slots = self.inner.slots.borrow();
        let mut seen = HashSet::with_capacity(slots.len());
        for task in slots.iter().flatten() {
            if !seen.insert(task.addr()) {
                return Err(SliceError::DuplicateTask(task.id()));
            }
        }
        Ok(())
    }
}
