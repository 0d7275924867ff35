//! Timestamped value history for snapshot lookups.

use agora_types::{Amount, Timestamp};
use serde::{Deserialize, Serialize};

/// A value recorded at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub timestamp: Timestamp,
    pub value: Amount,
}

/// Ordered checkpoint history.
///
/// Lookups return the value in force at the *start* of an instant: changes
/// written at `t` are invisible to `value_before(t)`. A snapshot taken at `t`
/// is therefore immune to anything that happens during or after `t`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checkpoints(Vec<Checkpoint>);

impl Checkpoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent value (0 when empty).
    pub fn latest(&self) -> Amount {
        self.0.last().map(|c| c.value).unwrap_or(0)
    }

    /// Record `value` at `timestamp`; writes within the same second collapse.
    pub fn record(&mut self, timestamp: Timestamp, value: Amount) {
        match self.0.last_mut() {
            Some(last) if last.timestamp >= timestamp => last.value = value,
            _ => self.0.push(Checkpoint { timestamp, value }),
        }
    }

    /// Value of the last checkpoint strictly before `timestamp`.
    pub fn value_before(&self, timestamp: Timestamp) -> Amount {
        self.checkpoint_before(timestamp).unwrap_or(0)
    }

    /// Like [`Checkpoints::value_before`], but `None` when nothing was recorded yet.
    pub fn checkpoint_before(&self, timestamp: Timestamp) -> Option<Amount> {
        let idx = self.0.partition_point(|c| c.timestamp < timestamp);
        idx.checked_sub(1).map(|i| self.0[i].value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
