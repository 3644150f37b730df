use tracing::info;
use uuid::Uuid;

use crate::database::{Ordered, StoreTx};
use crate::services::error::{ConflictReason, ServiceError, ServiceResult};

/// Parking slot used while two rows trade places under the per-parent unique index
pub const SWAP_SENTINEL: i32 = i32::MAX;

/// Position a newly created child of `parent_id` takes.
///
/// `max + 1` rather than `count + 1`: deletes leave gaps, and counting would
/// hand out a position that is still taken.
pub async fn next_order(tx: &mut dyn StoreTx, kind: Ordered, parent_id: Uuid) -> ServiceResult<i32> {
    let max = tx.max_order(kind, parent_id).await?;
    Ok(max + 1)
}

/// One side of a swap: id, parent and current position
#[derive(Debug, Clone, Copy)]
pub struct Slot {
    pub id: Uuid,
    pub parent_id: Uuid,
    pub order: i32,
}

/// Exchange the positions of `a` and `b` in three writes through a sentinel.
/// Must run inside the caller's transaction so a failure leaves both untouched.
pub async fn swap(tx: &mut dyn StoreTx, kind: Ordered, a: Slot, b: Slot) -> ServiceResult<()> {
    if a.id == b.id {
        return Err(ServiceError::Conflict(ConflictReason::SameItemSwap));
    }
    if a.parent_id != b.parent_id {
        return Err(ServiceError::NotFound("item in the same parent"));
    }

    tx.set_order(kind, a.id, SWAP_SENTINEL).await?;
    tx.set_order(kind, b.id, a.order).await?;
    tx.set_order(kind, a.id, b.order).await?;

    info!("Swapped {} {} ({}) with {} ({})", kind.table(), a.id, a.order, b.id, b.order);
    Ok(())
}
