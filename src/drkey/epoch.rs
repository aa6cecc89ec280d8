//! Fixed-length epoch schedule anchored at the Unix epoch.

use std::time::Duration;

use super::Epoch;

/// Splits the time line into adjacent epochs of equal length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochSchedule {
    duration_secs: i64,
}

impl EpochSchedule {
    /// Returns `None` for durations shorter than one second.
    pub fn new(duration: Duration) -> Option<Self> {
        let duration_secs = i64::try_from(duration.as_secs()).ok()?;
        (duration_secs > 0).then_some(Self { duration_secs })
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs as u64)
    }

    /// The epoch containing `t`. Works for times before 1970 as well.
    ///
    /// Returns `None` when the epoch would not fit in `i64` seconds, which
    /// only happens for `t` near either end of the range.
    pub fn epoch_at(&self, t: i64) -> Option<Epoch> {
        let index = t.div_euclid(self.duration_secs);
        let not_before = index.checked_mul(self.duration_secs)?;
        let not_after = not_before.checked_add(self.duration_secs)?;
        Some(Epoch::new(not_before, not_after))
    }
}
