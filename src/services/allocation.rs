//! Packaging allocation ledger.
//!
//! Tracks how many units of each purchase-order line sit in which package.
//! For every line the sum of allocations belonging to non-cancelled
//! consignments never exceeds the ordered quantity: over-allocation is
//! rejected before anything is written, so the ledger never needs a
//! compensating correction.

use chrono::Utc;
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::auth::Actor;
use crate::entities::{
    consignment, consignment_packaging, consignment_po_line, packaging_allocation,
    purchase_order_line, ConsignmentStatus,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::audit::{self, ENTITY_PACKAGING_ALLOCATION};
use crate::services::consignments::load_consignment_for_edit;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AllocateRequest {
    pub packaging_id: Uuid,
    pub po_line_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

/// Derived quantities of a purchase-order line after a ledger change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineQuantities {
    pub po_line_id: Uuid,
    pub ordered_quantity: i32,
    pub allocated_quantity: i32,
    pub remaining_quantity: i32,
}

impl From<&purchase_order_line::Model> for LineQuantities {
    fn from(line: &purchase_order_line::Model) -> Self {
        Self {
            po_line_id: line.id,
            ordered_quantity: line.ordered_quantity,
            allocated_quantity: line.allocated_quantity,
            remaining_quantity: line.remaining_quantity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationResult {
    pub allocation: packaging_allocation::Model,
    pub line: LineQuantities,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageAllocationEntry {
    pub allocation_id: Uuid,
    pub packaging_id: Uuid,
    pub package_id: String,
    pub consignment_id: Uuid,
    pub consignment_code: String,
    pub consignment_status: ConsignmentStatus,
    pub allocated_qty: i32,
}

/// Per-package breakdown of one line, as rendered by the packing screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineAllocationSummary {
    pub po_line_id: Uuid,
    pub line_number: i32,
    pub product_code: String,
    pub ordered_quantity: i32,
    /// Sum over non-cancelled consignments.
    pub total_allocated: i32,
    pub remaining_quantity: i32,
    pub packages: Vec<PackageAllocationEntry>,
}

/// Result of a single ledger write.
#[derive(Debug, Clone)]
pub(crate) struct AllocationChange {
    pub allocation: packaging_allocation::Model,
    pub previous_qty: i32,
}

/// Units of `po_line_id` held by consignments that are not cancelled.
pub async fn allocated_total<C: ConnectionTrait>(
    conn: &C,
    po_line_id: Uuid,
) -> Result<i32, ServiceError> {
    let rows = packaging_allocation::Entity::find()
        .inner_join(consignment::Entity)
        .filter(packaging_allocation::Column::PoLineId.eq(po_line_id))
        .filter(consignment::Column::Status.ne(ConsignmentStatus::Cancelled))
        .all(conn)
        .await?;
    let total: i64 = rows.iter().map(|a| i64::from(a.allocated_qty)).sum();
    i32::try_from(total).map_err(|_| {
        ServiceError::CapacityExceeded(format!(
            "Allocations of line {} exceed the supported range",
            po_line_id
        ))
    })
}

/// `already + quantity`, or `None` when it would pass `ordered`.
///
/// Sums in `i64` so oversized requests cannot wrap.
pub(crate) fn within_capacity(already: i32, quantity: i32, ordered: i32) -> Option<i32> {
    let total = i64::from(already) + i64::from(quantity);
    if total > i64::from(ordered) {
        None
    } else {
        i32::try_from(total).ok()
    }
}

pub(crate) async fn lock_line<C: ConnectionTrait>(
    conn: &C,
    po_line_id: Uuid,
) -> Result<purchase_order_line::Model, ServiceError> {
    purchase_order_line::Entity::find_by_id(po_line_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Purchase order line {} not found", po_line_id)))
}

/// Locks each of several lines once, in ascending id order.
pub(crate) async fn lock_lines<C: ConnectionTrait>(
    conn: &C,
    po_line_ids: impl IntoIterator<Item = Uuid>,
) -> Result<Vec<purchase_order_line::Model>, ServiceError> {
    let ordered: BTreeSet<Uuid> = po_line_ids.into_iter().collect();
    let mut lines = Vec::with_capacity(ordered.len());
    for po_line_id in ordered {
        lines.push(lock_line(conn, po_line_id).await?);
    }
    Ok(lines)
}

/// Adds `quantity` units of a line to a package of `consignment`.
///
/// The caller has already checked that the consignment is editable by
/// `actor`; derived line quantities are refreshed before returning.
pub(crate) async fn allocate_in<C: ConnectionTrait>(
    conn: &C,
    actor: &Actor,
    consignment: &consignment::Model,
    package: &consignment_packaging::Model,
    po_line_id: Uuid,
    quantity: i32,
) -> Result<AllocationChange, ServiceError> {
    if quantity < 1 {
        return Err(ServiceError::ValidationError(
            "Allocated quantity must be at least 1".to_string(),
        ));
    }
    if package.consignment_id != consignment.id {
        return Err(ServiceError::ValidationError(format!(
            "Package {} does not belong to consignment {}",
            package.package_id, consignment.consignment_id
        )));
    }

    let selected = consignment_po_line::Entity::find()
        .filter(consignment_po_line::Column::ConsignmentId.eq(consignment.id))
        .filter(consignment_po_line::Column::PoLineId.eq(po_line_id))
        .one(conn)
        .await?;
    if selected.is_none() {
        return Err(ServiceError::ValidationError(format!(
            "Line {} is not selected in consignment {}",
            po_line_id, consignment.consignment_id
        )));
    }

    let line = lock_line(conn, po_line_id).await?;
    let already = allocated_total(conn, po_line_id).await?;
    if within_capacity(already, quantity, line.ordered_quantity).is_none() {
        counter!("consignment_allocation.capacity_exceeded", 1);
        return Err(ServiceError::CapacityExceeded(format!(
            "Line {} of {}: requested {}, only {} of {} remaining",
            line.line_number,
            line.product_code,
            quantity,
            (line.ordered_quantity - already).max(0),
            line.ordered_quantity
        )));
    }

    let now = Utc::now();
    let existing = packaging_allocation::Entity::find()
        .filter(packaging_allocation::Column::PoLineId.eq(po_line_id))
        .filter(packaging_allocation::Column::PackagingId.eq(package.id))
        .one(conn)
        .await?;

    let (allocation, previous_qty) = match existing {
        Some(row) => {
            let previous = row.allocated_qty;
            let combined = within_capacity(previous, quantity, line.ordered_quantity)
                .ok_or_else(|| {
                    ServiceError::CapacityExceeded(format!(
                        "Package {} cannot hold more than {} units of line {}",
                        package.package_id, line.ordered_quantity, line.line_number
                    ))
                })?;
            let mut active: packaging_allocation::ActiveModel = row.into();
            active.allocated_qty = Set(combined);
            active.updated_at = Set(now);
            (active.update(conn).await?, previous)
        }
        None => {
            let row = packaging_allocation::ActiveModel {
                id: Set(Uuid::new_v4()),
                consignment_id: Set(consignment.id),
                po_line_id: Set(po_line_id),
                packaging_id: Set(package.id),
                allocated_qty: Set(quantity),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(conn)
            .await?;
            (row, 0)
        }
    };

    audit::record_change(
        conn,
        actor,
        ENTITY_PACKAGING_ALLOCATION,
        allocation.id,
        "allocated_qty",
        (previous_qty > 0).then(|| previous_qty.to_string()),
        Some(allocation.allocated_qty.to_string()),
    )
    .await?;

    update_line_quantities(conn, &[po_line_id]).await?;

    Ok(AllocationChange {
        allocation,
        previous_qty,
    })
}

/// Deletes one ledger entry and writes its audit row. Line quantities are
/// left for the caller to refresh.
pub(crate) async fn remove_allocation_in<C: ConnectionTrait>(
    conn: &C,
    actor: &Actor,
    allocation: packaging_allocation::Model,
) -> Result<Uuid, ServiceError> {
    let po_line_id = allocation.po_line_id;
    let allocation_id = allocation.id;
    let previous = allocation.allocated_qty;
    allocation.delete(conn).await?;

    audit::record_change(
        conn,
        actor,
        ENTITY_PACKAGING_ALLOCATION,
        allocation_id,
        "allocated_qty",
        Some(previous.to_string()),
        None,
    )
    .await?;

    Ok(po_line_id)
}

/// Recomputes `allocated_quantity` / `remaining_quantity` from the ledger.
pub async fn update_line_quantities<C: ConnectionTrait>(
    conn: &C,
    po_line_ids: &[Uuid],
) -> Result<Vec<purchase_order_line::Model>, ServiceError> {
    let unique: BTreeSet<Uuid> = po_line_ids.iter().copied().collect();
    let mut updated = Vec::with_capacity(unique.len());

    for po_line_id in unique {
        let line = lock_line(conn, po_line_id).await?;
        let total = allocated_total(conn, po_line_id).await?;
        let remaining = line.ordered_quantity - total;

        if line.allocated_quantity == total && line.remaining_quantity == remaining {
            updated.push(line);
            continue;
        }

        let mut active: purchase_order_line::ActiveModel = line.into();
        active.allocated_quantity = Set(total);
        active.remaining_quantity = Set(remaining);
        active.updated_at = Set(Utc::now());
        updated.push(active.update(conn).await?);
    }

    Ok(updated)
}

/// Re-checks the conservation rule for one line.
pub async fn validate_line_capacity<C: ConnectionTrait>(
    conn: &C,
    po_line_id: Uuid,
) -> Result<LineQuantities, ServiceError> {
    let line = lock_line(conn, po_line_id).await?;
    let total = allocated_total(conn, po_line_id).await?;
    if total > line.ordered_quantity {
        warn!(%po_line_id, total, ordered = line.ordered_quantity, "line over-allocated");
        return Err(ServiceError::CapacityExceeded(format!(
            "Line {} of {} is over-allocated: {} of {}",
            line.line_number, line.product_code, total, line.ordered_quantity
        )));
    }
    Ok(LineQuantities {
        po_line_id,
        ordered_quantity: line.ordered_quantity,
        allocated_quantity: total,
        remaining_quantity: line.ordered_quantity - total,
    })
}

/// Refreshes derived quantities, then re-validates each line.
pub async fn reconcile_lines<C: ConnectionTrait>(
    conn: &C,
    po_line_ids: &[Uuid],
) -> Result<(), ServiceError> {
    update_line_quantities(conn, po_line_ids).await?;
    for po_line_id in po_line_ids {
        validate_line_capacity(conn, *po_line_id).await?;
    }
    Ok(())
}

#[derive(Clone)]
pub struct AllocationService {
    db_pool: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl AllocationService {
    pub fn new(db_pool: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Adds units of a line to a package. Fails with `CapacityExceeded`
    /// when the line has fewer units left than requested.
    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn allocate(
        &self,
        actor: &Actor,
        request: AllocateRequest,
    ) -> Result<AllocationResult, ServiceError> {
        request.validate()?;

        let txn = self.db_pool.begin().await?;

        let package = consignment_packaging::Entity::find_by_id(request.packaging_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Package {} not found", request.packaging_id))
            })?;
        let consignment = load_consignment_for_edit(&txn, actor, package.consignment_id).await?;

        let change = allocate_in(
            &txn,
            actor,
            &consignment,
            &package,
            request.po_line_id,
            request.quantity,
        )
        .await?;
        let line = validate_line_capacity(&txn, request.po_line_id).await?;

        txn.commit().await?;

        counter!("consignment_allocation.allocated", 1);
        info!(
            consignment_id = %consignment.consignment_id,
            package_id = %package.package_id,
            po_line_id = %request.po_line_id,
            previous_qty = change.previous_qty,
            allocated_qty = change.allocation.allocated_qty,
            "units allocated"
        );

        self.event_sender
            .send_or_log(Event::AllocationChanged {
                consignment_id: consignment.id,
                po_line_id: request.po_line_id,
                packaging_id: package.id,
                allocated_qty: change.allocation.allocated_qty,
            })
            .await;

        Ok(AllocationResult {
            allocation: change.allocation,
            line,
        })
    }

    /// Removes a ledger entry, returning its units to the line.
    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn deallocate(
        &self,
        actor: &Actor,
        allocation_id: Uuid,
    ) -> Result<LineQuantities, ServiceError> {
        let txn = self.db_pool.begin().await?;

        let allocation = packaging_allocation::Entity::find_by_id(allocation_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Allocation {} not found", allocation_id)))?;
        let consignment = load_consignment_for_edit(&txn, actor, allocation.consignment_id).await?;
        let packaging_id = allocation.packaging_id;

        let po_line_id = remove_allocation_in(&txn, actor, allocation).await?;
        let lines = update_line_quantities(&txn, &[po_line_id]).await?;
        let line = lines
            .first()
            .map(LineQuantities::from)
            .ok_or_else(|| ServiceError::InternalError("line refresh returned nothing".into()))?;

        txn.commit().await?;

        counter!("consignment_allocation.deallocated", 1);
        info!(
            consignment_id = %consignment.consignment_id,
            %allocation_id,
            "allocation removed"
        );

        self.event_sender
            .send_or_log(Event::AllocationChanged {
                consignment_id: consignment.id,
                po_line_id,
                packaging_id,
                allocated_qty: 0,
            })
            .await;

        Ok(line)
    }

    #[instrument(skip(self))]
    pub async fn get_allocated_summary(
        &self,
        po_line_id: Uuid,
    ) -> Result<LineAllocationSummary, ServiceError> {
        let db = &*self.db_pool;

        let line = purchase_order_line::Entity::find_by_id(po_line_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Purchase order line {} not found", po_line_id)))?;

        let rows = packaging_allocation::Entity::find()
            .filter(packaging_allocation::Column::PoLineId.eq(po_line_id))
            .find_also_related(consignment_packaging::Entity)
            .order_by_asc(packaging_allocation::Column::CreatedAt)
            .all(db)
            .await?;

        let consignment_ids: Vec<Uuid> = rows.iter().map(|(a, _)| a.consignment_id).collect();
        let consignments: HashMap<Uuid, consignment::Model> = consignment::Entity::find()
            .filter(consignment::Column::Id.is_in(consignment_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        let mut packages = Vec::with_capacity(rows.len());
        let mut total_allocated = 0;
        for (allocation, package) in rows {
            let Some(owner) = consignments.get(&allocation.consignment_id) else {
                continue;
            };
            if owner.status == ConsignmentStatus::Cancelled {
                continue;
            }
            total_allocated += allocation.allocated_qty;
            packages.push(PackageAllocationEntry {
                allocation_id: allocation.id,
                packaging_id: allocation.packaging_id,
                package_id: package.map(|p| p.package_id).unwrap_or_default(),
                consignment_id: owner.id,
                consignment_code: owner.consignment_id.clone(),
                consignment_status: owner.status,
                allocated_qty: allocation.allocated_qty,
            });
        }

        Ok(LineAllocationSummary {
            po_line_id,
            line_number: line.line_number,
            product_code: line.product_code,
            ordered_quantity: line.ordered_quantity,
            total_allocated,
            remaining_quantity: line.ordered_quantity - total_allocated,
            packages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_check_accepts_exact_fill() {
        assert_eq!(within_capacity(6, 4, 10), Some(10));
        assert_eq!(within_capacity(0, 1, 1), Some(1));
    }

    #[test]
    fn capacity_check_rejects_overfill() {
        assert_eq!(within_capacity(10, 1, 10), None);
        assert_eq!(within_capacity(0, 11, 10), None);
    }

    #[test]
    fn capacity_check_does_not_wrap() {
        assert_eq!(within_capacity(10, i32::MAX, 10), None);
        assert_eq!(within_capacity(i32::MAX, i32::MAX, i32::MAX), None);
    }

    async fn line_fixture() -> (sea_orm::DatabaseConnection, Vec<Uuid>) {
        use crate::config::AppConfig;
        use crate::entities::purchase_order;

        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        let db = crate::db::establish_connection_from_app_config(&cfg)
            .await
            .unwrap();
        crate::db::run_migrations(&db).await.unwrap();

        let now = Utc::now();
        let po = purchase_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            po_number: Set("PO-LOCK".to_string()),
            supplier_name: Set("Nordic Components AB".to_string()),
            created_at: Set(now),
        }
        .insert(&db)
        .await
        .unwrap();

        let mut ids = Vec::new();
        for line_number in 1..=4 {
            let line = purchase_order_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                purchase_order_id: Set(po.id),
                line_number: Set(line_number),
                product_code: Set(format!("SKU-{:03}", line_number)),
                description: Set(format!("Item {}", line_number)),
                ordered_quantity: Set(5),
                allocated_quantity: Set(0),
                remaining_quantity: Set(5),
                unit_weight_kg: Set(None),
                is_chemical: Set(false),
                is_dangerous_good: Set(false),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&db)
            .await
            .unwrap();
            ids.push(line.id);
        }
        (db, ids)
    }

    #[tokio::test]
    async fn lines_are_locked_once_in_ascending_order() {
        let (db, ids) = line_fixture().await;

        let mut requested: Vec<Uuid> = ids.iter().rev().copied().collect();
        requested.push(ids[0]);
        requested.push(ids[2]);

        let locked = lock_lines(&db, requested).await.unwrap();
        let locked_ids: Vec<Uuid> = locked.iter().map(|l| l.id).collect();

        let mut expected = ids.clone();
        expected.sort();
        assert_eq!(locked_ids, expected);
    }

    #[tokio::test]
    async fn locking_an_unknown_line_fails() {
        let (db, ids) = line_fixture().await;
        let result = lock_lines(&db, [ids[1], Uuid::new_v4()]).await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }
}
