//! Partition planning for bulk code uploads.
//!
//! Once a prize's code inventory grows past a threshold, uploaded codes are
//! spread over numbered partitions so upload writers stop contending on one
//! record. Partitions carry no counters of their own: they are metadata on the
//! prize (`total_partitions`, `active_partition`) and a namespace for codes.
//!
//! Planning only allocates. Advancing `active_partition` when a partition runs
//! dry is the redemption flow's job.

use crate::key::PrizeId;
use crate::prize::{Prize, PrizeUpdate};
use serde::{Deserialize, Serialize};

/// Codes per upload batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Code count above which partitioning is enabled.
pub const DEFAULT_PARTITIONING_THRESHOLD: u64 = 500_000;

/// Prize fields partition planning reads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSnapshot {
    /// Current `total_amount`.
    pub total_amount: u64,
    /// Current `total_partitions`; `None` when never partitioned.
    pub total_partitions: Option<u32>,
    /// Current `active_partition`.
    pub active_partition: Option<u32>,
}

impl From<&Prize> for PartitionSnapshot {
    fn from(prize: &Prize) -> Self {
        Self {
            total_amount: prize.counters.amount,
            total_partitions: prize.total_partitions,
            active_partition: prize.active_partition,
        }
    }
}

/// Outcome of planning one upload session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionPlan {
    /// Whether codes of this session are partitioned.
    pub use_partitions: bool,
    /// Partition the first batch goes to.
    pub partition_number: u32,
    /// Partition redemption draws from, carried over unchanged.
    pub active_partition: u32,
}

/// Decide whether an upload of `incoming` codes is partitioned and where it starts.
///
/// Partitioning is enabled when `total_amount + incoming > threshold`. The
/// next partition is `total_partitions + 1`, or `0` for a prize that was never
/// partitioned. `active_partition` is carried over (default `0`).
///
/// ```
/// use prize_inventory_core::partition::{plan_partition, PartitionSnapshot};
///
/// let snapshot = PartitionSnapshot { total_amount: 950, ..PartitionSnapshot::default() };
/// let plan = plan_partition(snapshot, 100, 1000);
/// assert!(plan.use_partitions);
/// assert_eq!(plan.partition_number, 0);
/// ```
#[must_use]
pub fn plan_partition(snapshot: PartitionSnapshot, incoming: u64, threshold: u64) -> PartitionPlan {
    let active_partition = snapshot.active_partition.unwrap_or(0);

    if snapshot.total_amount.saturating_add(incoming) > threshold {
        PartitionPlan {
            use_partitions: true,
            partition_number: snapshot
                .total_partitions
                .map_or(0, |n| n.saturating_add(1)),
            active_partition,
        }
    } else {
        PartitionPlan {
            use_partitions: false,
            partition_number: 0,
            active_partition,
        }
    }
}

/// One batch of an upload session and the partition its codes are tagged with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchAssignment {
    /// Offset of the first code of the batch.
    pub offset: usize,
    /// Number of codes in the batch.
    pub len: usize,
    /// Partition tag; `None` for non-partitioned uploads.
    pub partition: Option<u32>,
}

/// Batches of one upload session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSession {
    /// Plan the session was cut from.
    pub plan: PartitionPlan,
    /// Batches in upload order.
    pub batches: Vec<BatchAssignment>,
}

impl PartitionPlan {
    /// Split `code_count` codes into batches of at most `batch_size`.
    ///
    /// With partitioning on, the first batch gets `partition_number` and every
    /// following batch the next number.
    #[must_use]
    pub fn assign_batches(&self, code_count: usize, batch_size: usize) -> UploadSession {
        let batch_size = batch_size.max(1);
        let mut batches = Vec::with_capacity(code_count.div_ceil(batch_size));
        let mut partition = self.partition_number;
        let mut offset = 0;

        while offset < code_count {
            let len = batch_size.min(code_count - offset);
            batches.push(BatchAssignment {
                offset,
                len,
                partition: self.use_partitions.then_some(partition),
            });
            offset += len;
            partition = partition.saturating_add(1);
        }

        UploadSession {
            plan: *self,
            batches,
        }
    }
}

impl UploadSession {
    /// Highest partition assigned in this session.
    #[must_use]
    pub fn high_water_mark(&self) -> Option<u32> {
        self.batches.iter().filter_map(|b| b.partition).max()
    }

    /// Attribute update persisting the session's partition metadata, written
    /// once per session. `None` when the session is not partitioned.
    #[must_use]
    pub fn commit_update(&self) -> Option<PrizeUpdate> {
        let total_partitions = self.high_water_mark()?;
        Some(PrizeUpdate {
            total_partitions: Some(total_partitions),
            active_partition: Some(self.plan.active_partition),
            ..PrizeUpdate::default()
        })
    }
}

/// Namespace the codes of `partition` are stored under.
///
/// Partition `0` (and non-partitioned codes) use the bare prize id; partition
/// `n > 0` uses `"{prize_id}-{n}"`.
#[must_use]
pub fn code_namespace(prize_id: &PrizeId, partition: Option<u32>) -> String {
    match partition {
        Some(n) if n > 0 => format!("{prize_id}-{n}"),
        _ => prize_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(total_amount: u64, total_partitions: Option<u32>) -> PartitionSnapshot {
        PartitionSnapshot {
            total_amount,
            total_partitions,
            active_partition: Some(2),
        }
    }

    #[test]
    fn below_threshold_is_not_partitioned() {
        let plan = plan_partition(snapshot(900, None), 100, 1000);
        assert!(!plan.use_partitions);
        assert_eq!(plan.active_partition, 2);
    }

    #[test]
    fn first_partition_is_zero_and_next_follows_high_water_mark() {
        let first = plan_partition(snapshot(950, None), 100, 1000);
        assert_eq!((first.use_partitions, first.partition_number), (true, 0));

        let second = plan_partition(snapshot(950, Some(0)), 100, 1000);
        assert_eq!(second.partition_number, 1);
        assert_eq!(second.active_partition, 2);
    }

    #[test]
    fn batches_get_consecutive_partitions() {
        let plan = plan_partition(snapshot(5000, Some(3)), 2500, 1000);
        let session = plan.assign_batches(2500, 1000);
        let tags: Vec<_> = session.batches.iter().map(|b| (b.offset, b.len, b.partition)).collect();
        assert_eq!(
            tags,
            vec![(0, 1000, Some(4)), (1000, 1000, Some(5)), (2000, 500, Some(6))]
        );
        assert_eq!(session.high_water_mark(), Some(6));

        let update = session.commit_update();
        assert_eq!(update.as_ref().and_then(|u| u.total_partitions), Some(6));
        assert_eq!(update.and_then(|u| u.active_partition), Some(2));
    }

    #[test]
    fn unpartitioned_session_has_no_commit() {
        let plan = plan_partition(snapshot(0, None), 10, 1000);
        let session = plan.assign_batches(10, 4);
        assert_eq!(session.batches.len(), 3);
        assert!(session.batches.iter().all(|b| b.partition.is_none()));
        assert_eq!(session.commit_update(), None);
    }

    #[test]
    fn namespace_suffixes_non_zero_partitions() {
        let id = PrizeId::new("coffee");
        assert_eq!(code_namespace(&id, None), "coffee");
        assert_eq!(code_namespace(&id, Some(0)), "coffee");
        assert_eq!(code_namespace(&id, Some(3)), "coffee-3");
    }
}
