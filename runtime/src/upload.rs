//! Partition allocation for bulk code uploads.
//!
//! The upload flow plans a session, tags each batch with the partition from
//! [`UploadSession::batches`] as it enqueues the codes, then commits the
//! session once so the prize records the new partition high-water mark.

use crate::engine::PrizeInventory;
use prize_inventory_core::error::{Result, ValidationError};
use prize_inventory_core::key::PrizeKey;
use prize_inventory_core::partition::{PartitionPlan, PartitionSnapshot, UploadSession, plan_partition};
use prize_inventory_core::prize::Prize;

impl PrizeInventory {
    /// Decide whether an upload of `code_count` codes is partitioned and
    /// which partition it starts at. Reads the prize; writes nothing.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::EmptyUpload`] when `code_count` is zero
    /// - [`prize_inventory_core::InventoryError::RecordNotFound`] when the prize does not exist
    pub async fn plan_partition_for_upload(&self, key: &PrizeKey, code_count: usize) -> Result<PartitionPlan> {
        if code_count == 0 {
            return Err(ValidationError::EmptyUpload.into());
        }

        let prize = self.get_prize(key).await?;
        let incoming = u64::try_from(code_count).unwrap_or(u64::MAX);
        let plan = plan_partition(
            PartitionSnapshot::from(&prize),
            incoming,
            self.partitioning.threshold,
        );

        tracing::info!(
            key = %key,
            code_count,
            use_partitions = plan.use_partitions,
            partition_number = plan.partition_number,
            active_partition = plan.active_partition,
            "Planned code upload"
        );
        Ok(plan)
    }

    /// Plan an upload and cut it into batches of the configured size.
    ///
    /// # Errors
    ///
    /// See [`PrizeInventory::plan_partition_for_upload`].
    pub async fn start_upload(&self, key: &PrizeKey, code_count: usize) -> Result<UploadSession> {
        let plan = self.plan_partition_for_upload(key, code_count).await?;
        Ok(plan.assign_batches(code_count, self.partitioning.batch_size))
    }

    /// Persist the session's `total_partitions` and `active_partition` in a
    /// single write. Non-partitioned sessions write nothing and return `None`.
    ///
    /// # Errors
    ///
    /// See [`PrizeInventory::update_attributes`].
    pub async fn commit_upload(&self, key: &PrizeKey, session: &UploadSession) -> Result<Option<Prize>> {
        let Some(update) = session.commit_update() else {
            return Ok(None);
        };
        let prize = self.update_attributes(key, update).await?;
        tracing::info!(
            key = %key,
            total_partitions = ?prize.total_partitions,
            "Committed upload partitions"
        );
        Ok(Some(prize))
    }
}
