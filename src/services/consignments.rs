//! Consignment aggregate: creation, reads, approval, supporting documents
//! and stale-draft purging.

use chrono::{Duration, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{Actor, Capability};
use crate::entities::{
    consignment, consignment_document, consignment_packaging, consignment_po_line, console,
    packaging_allocation, packaging_type, purchase_order, purchase_order_line, ConsignmentStatus,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::allocation::update_line_quantities;
use crate::services::audit::{self, ENTITY_CONSIGNMENT};
use crate::services::sequences;
use crate::services::storage::FileStorage;

const MAX_CREATE_ATTEMPTS: usize = 3;

pub(crate) async fn lock_consignment<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<consignment::Model, ServiceError> {
    consignment::Entity::find_by_id(id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Consignment {} not found", id)))
}

/// Locks a consignment the actor may edit and whose status still allows packing edits.
pub(crate) async fn load_consignment_for_edit<C: ConnectionTrait>(
    conn: &C,
    actor: &Actor,
    id: Uuid,
) -> Result<consignment::Model, ServiceError> {
    let consignment = lock_consignment(conn, id).await?;
    actor.require_edit_of(consignment.created_by)?;
    if !consignment.status.is_mutable() {
        return Err(ServiceError::InvalidState(format!(
            "Consignment {} is {} and can no longer be edited",
            consignment.consignment_id, consignment.status
        )));
    }
    Ok(consignment)
}

pub(crate) fn ensure_visible(actor: &Actor, consignment: &consignment::Model) -> Result<(), ServiceError> {
    actor.require(Capability::ViewConsignments)?;
    if actor.is_scoped_to_own() && consignment.created_by != actor.user_id {
        return Err(ServiceError::Forbidden(format!(
            "Consignment {} belongs to another requester",
            consignment.consignment_id
        )));
    }
    Ok(())
}

pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// A consignment with every row it owns, loaded in one pass.
#[derive(Debug, Clone)]
pub(crate) struct ConsignmentBundle {
    pub consignment: consignment::Model,
    pub lines: Vec<(consignment_po_line::Model, purchase_order_line::Model)>,
    pub purchase_orders: HashMap<Uuid, purchase_order::Model>,
    pub packages: Vec<consignment_packaging::Model>,
    pub packaging_types: HashMap<Uuid, packaging_type::Model>,
    pub allocations: Vec<packaging_allocation::Model>,
    pub document_counts: HashMap<Uuid, usize>,
}

impl ConsignmentBundle {
    pub async fn load<C: ConnectionTrait>(
        conn: &C,
        consignment: consignment::Model,
    ) -> Result<Self, ServiceError> {
        let mut lines: Vec<_> = consignment_po_line::Entity::find()
            .filter(consignment_po_line::Column::ConsignmentId.eq(consignment.id))
            .find_also_related(purchase_order_line::Entity)
            .all(conn)
            .await?
            .into_iter()
            .filter_map(|(cpl, line)| line.map(|line| (cpl, line)))
            .collect();
        lines.sort_by_key(|(_, line)| (line.purchase_order_id, line.line_number));

        let po_ids: Vec<Uuid> = lines.iter().map(|(_, l)| l.purchase_order_id).collect();
        let purchase_orders = purchase_order::Entity::find()
            .filter(purchase_order::Column::Id.is_in(po_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|po| (po.id, po))
            .collect();

        let packages = consignment_packaging::Entity::find()
            .filter(consignment_packaging::Column::ConsignmentId.eq(consignment.id))
            .order_by_asc(consignment_packaging::Column::PackageId)
            .all(conn)
            .await?;

        let type_ids: Vec<Uuid> = packages.iter().map(|p| p.packaging_type_id).collect();
        let packaging_types = packaging_type::Entity::find()
            .filter(packaging_type::Column::Id.is_in(type_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();

        let allocations = packaging_allocation::Entity::find()
            .filter(packaging_allocation::Column::ConsignmentId.eq(consignment.id))
            .order_by_asc(packaging_allocation::Column::CreatedAt)
            .all(conn)
            .await?;

        let cpl_ids: Vec<Uuid> = lines.iter().map(|(cpl, _)| cpl.id).collect();
        let mut document_counts: HashMap<Uuid, usize> = HashMap::new();
        for doc in consignment_document::Entity::find()
            .filter(consignment_document::Column::ConsignmentPoLineId.is_in(cpl_ids))
            .all(conn)
            .await?
        {
            *document_counts.entry(doc.consignment_po_line_id).or_default() += 1;
        }

        Ok(Self {
            consignment,
            lines,
            purchase_orders,
            packages,
            packaging_types,
            allocations,
            document_counts,
        })
    }

    pub fn allocated_for_line(&self, po_line_id: Uuid) -> i32 {
        self.allocations
            .iter()
            .filter(|a| a.po_line_id == po_line_id)
            .map(|a| a.allocated_qty)
            .sum()
    }

    pub fn total_allocated(&self) -> i32 {
        self.allocations.iter().map(|a| a.allocated_qty).sum()
    }

    pub fn total_gross_weight(&self) -> Decimal {
        self.packages
            .iter()
            .filter_map(|p| p.gross_weight_kg)
            .sum()
    }

    pub fn has_dangerous_goods(&self) -> bool {
        self.lines.iter().any(|(_, line)| line.is_dangerous_good)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineDetail {
    pub consignment_po_line_id: Uuid,
    pub po_line_id: Uuid,
    pub po_number: Option<String>,
    pub line_number: i32,
    pub product_code: String,
    pub description: String,
    pub ordered_quantity: i32,
    pub remaining_quantity: i32,
    pub allocated_in_consignment: i32,
    pub is_chemical: bool,
    pub is_dangerous_good: bool,
    pub hs_code: Option<String>,
    pub eccn: Option<String>,
    pub country_of_origin: Option<String>,
    pub dg_class: Option<String>,
    pub un_number: Option<String>,
    pub dg_category: Option<String>,
    pub document_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageItem {
    pub allocation_id: Uuid,
    pub po_line_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageDetail {
    pub id: Uuid,
    pub package_id: String,
    pub draft_package_id: Option<String>,
    pub packaging_type_id: Uuid,
    pub packaging_type_name: Option<String>,
    pub gross_weight_kg: Option<Decimal>,
    pub items: Vec<PackageItem>,
}

/// Serialised flat: the consignment's columns sit beside `lines` and `packages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsignmentDetail {
    #[serde(flatten)]
    pub consignment: consignment::Model,
    pub lines: Vec<LineDetail>,
    pub packages: Vec<PackageDetail>,
}

impl From<ConsignmentBundle> for ConsignmentDetail {
    fn from(bundle: ConsignmentBundle) -> Self {
        let lines = bundle
            .lines
            .iter()
            .map(|(cpl, line)| LineDetail {
                consignment_po_line_id: cpl.id,
                po_line_id: line.id,
                po_number: bundle
                    .purchase_orders
                    .get(&line.purchase_order_id)
                    .map(|po| po.po_number.clone()),
                line_number: line.line_number,
                product_code: line.product_code.clone(),
                description: line.description.clone(),
                ordered_quantity: line.ordered_quantity,
                remaining_quantity: line.remaining_quantity,
                allocated_in_consignment: bundle.allocated_for_line(line.id),
                is_chemical: line.is_chemical,
                is_dangerous_good: line.is_dangerous_good,
                hs_code: cpl.hs_code.clone(),
                eccn: cpl.eccn.clone(),
                country_of_origin: cpl.country_of_origin.clone(),
                dg_class: cpl.dg_class.clone(),
                un_number: cpl.un_number.clone(),
                dg_category: cpl.dg_category.clone(),
                document_count: bundle.document_counts.get(&cpl.id).copied().unwrap_or(0),
            })
            .collect();

        let packages = bundle
            .packages
            .iter()
            .map(|p| PackageDetail {
                id: p.id,
                package_id: p.package_id.clone(),
                draft_package_id: p.draft_package_id.clone(),
                packaging_type_id: p.packaging_type_id,
                packaging_type_name: bundle
                    .packaging_types
                    .get(&p.packaging_type_id)
                    .map(|t| t.name.clone()),
                gross_weight_kg: p.gross_weight_kg,
                items: bundle
                    .allocations
                    .iter()
                    .filter(|a| a.packaging_id == p.id)
                    .map(|a| PackageItem {
                        allocation_id: a.id,
                        po_line_id: a.po_line_id,
                        quantity: a.allocated_qty,
                    })
                    .collect(),
            })
            .collect();

        Self {
            consignment: bundle.consignment,
            lines,
            packages,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsignmentListQuery {
    pub status: Option<ConsignmentStatus>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsignmentCounts {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoverDetails {
    pub consignment_id: String,
    pub status: ConsignmentStatus,
    pub step: i32,
    pub line_count: usize,
    pub package_count: usize,
    pub total_allocated_units: i32,
    pub total_gross_weight_kg: Decimal,
    pub delivery_country: Option<String>,
    pub console_id: Option<String>,
    pub has_dangerous_goods: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DgItemDetail {
    pub po_line_id: Uuid,
    pub line_number: i32,
    pub product_code: String,
    pub description: String,
    pub is_chemical: bool,
    pub is_dangerous_good: bool,
    pub hs_code: Option<String>,
    pub eccn: Option<String>,
    pub dg_class: Option<String>,
    pub un_number: Option<String>,
    pub dg_category: Option<String>,
    pub country_of_origin: Option<String>,
    pub document_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject { reason: String },
}

#[derive(Debug, Clone, Validate)]
pub struct AttachDocument {
    pub consignment_id: Uuid,
    pub po_line_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,
    #[validate(length(min = 1, max = 64))]
    pub document_type: String,
    #[validate(length(min = 1))]
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgeResult {
    pub purged: Vec<String>,
    pub lines_reconciled: usize,
}

#[derive(Clone)]
pub struct ConsignmentService {
    db_pool: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    storage: Arc<dyn FileStorage>,
}

impl ConsignmentService {
    pub fn new(
        db_pool: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        storage: Arc<dyn FileStorage>,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            storage,
        }
    }

    /// Creates an empty DRAFT consignment at step 0.
    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn create_draft(&self, actor: &Actor) -> Result<consignment::Model, ServiceError> {
        actor.require(Capability::EditConsignments)?;

        let mut attempt = 0;
        let created = loop {
            attempt += 1;
            match self.insert_draft(actor).await {
                Ok(model) => break model,
                Err(ServiceError::DatabaseError(e))
                    if is_unique_violation(&e) && attempt < MAX_CREATE_ATTEMPTS =>
                {
                    warn!(attempt, "consignment id collided, retrying");
                }
                Err(e) => return Err(e),
            }
        };

        counter!("consignment.created", 1);
        info!(consignment_id = %created.consignment_id, "draft consignment created");

        self.event_sender
            .send_or_log(Event::ConsignmentCreated {
                consignment_id: created.id,
                created_by: actor.user_id,
            })
            .await;

        Ok(created)
    }

    async fn insert_draft(&self, actor: &Actor) -> Result<consignment::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let code = sequences::next_consignment_id(&txn).await?;
        let now = Utc::now();

        let model = consignment::ActiveModel {
            id: Set(Uuid::new_v4()),
            consignment_id: Set(code),
            status: Set(ConsignmentStatus::Draft),
            step: Set(0),
            created_by: Set(actor.user_id),
            consignor_name: Set(None),
            consignor_address: Set(None),
            consignor_city: Set(None),
            consignor_postal_code: Set(None),
            consignor_country: Set(None),
            delivery_name: Set(None),
            delivery_address: Set(None),
            delivery_city: Set(None),
            delivery_postal_code: Set(None),
            delivery_country: Set(None),
            console_id: Set(None),
            freight_forwarder_id: Set(None),
            pickup_datetime: Set(None),
            gl_code: Set(None),
            bol_generated_at: Set(None),
            xml_id: Set(None),
            xml_generated_at: Set(None),
            rejection_reason: Set(None),
            submitted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(model)
    }

    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn get_consignment(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<ConsignmentDetail, ServiceError> {
        let db = &*self.db_pool;
        let consignment = consignment::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Consignment {} not found", id)))?;
        ensure_visible(actor, &consignment)?;

        Ok(ConsignmentBundle::load(db, consignment).await?.into())
    }

    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn list_consignments(
        &self,
        actor: &Actor,
        query: ConsignmentListQuery,
    ) -> Result<(Vec<consignment::Model>, u64), ServiceError> {
        actor.require(Capability::ViewConsignments)?;

        let page = query.page.unwrap_or(1);
        let limit = query.limit.unwrap_or(20);
        if page == 0 {
            return Err(ServiceError::ValidationError(
                "Page number must be greater than 0".to_string(),
            ));
        }
        if limit == 0 || limit > 100 {
            return Err(ServiceError::ValidationError(
                "Limit must be between 1 and 100".to_string(),
            ));
        }

        let mut select = consignment::Entity::find();
        if let Some(status) = query.status {
            select = select.filter(consignment::Column::Status.eq(status));
        }
        if actor.is_scoped_to_own() {
            select = select.filter(consignment::Column::CreatedBy.eq(actor.user_id));
        }

        let paginator = select
            .order_by_desc(consignment::Column::CreatedAt)
            .paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;

        Ok((items, total))
    }

    /// Per-status counts; requesters only count their own consignments.
    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn get_counts(&self, actor: &Actor) -> Result<ConsignmentCounts, ServiceError> {
        actor.require(Capability::ViewConsignments)?;

        let mut select = consignment::Entity::find()
            .select_only()
            .column(consignment::Column::Status);
        if actor.is_scoped_to_own() {
            select = select.filter(consignment::Column::CreatedBy.eq(actor.user_id));
        }
        let statuses: Vec<ConsignmentStatus> = select.into_tuple().all(&*self.db_pool).await?;

        let mut by_status = BTreeMap::new();
        for status in &statuses {
            *by_status.entry(status.as_str().to_string()).or_insert(0u64) += 1;
        }

        Ok(ConsignmentCounts {
            total: statuses.len() as u64,
            by_status,
        })
    }

    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn consignment_hover_details(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<HoverDetails, ServiceError> {
        let db = &*self.db_pool;
        let consignment = consignment::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Consignment {} not found", id)))?;
        ensure_visible(actor, &consignment)?;

        let console_code = match consignment.console_id {
            Some(console_pk) => console::Entity::find_by_id(console_pk)
                .one(db)
                .await?
                .map(|c| c.console_id),
            None => None,
        };

        let bundle = ConsignmentBundle::load(db, consignment).await?;
        Ok(HoverDetails {
            consignment_id: bundle.consignment.consignment_id.clone(),
            status: bundle.consignment.status,
            step: bundle.consignment.step,
            line_count: bundle.lines.len(),
            package_count: bundle.packages.len(),
            total_allocated_units: bundle.total_allocated(),
            total_gross_weight_kg: bundle.total_gross_weight(),
            delivery_country: bundle.consignment.delivery_country.clone(),
            console_id: console_code,
            has_dangerous_goods: bundle.has_dangerous_goods(),
        })
    }

    /// Chemical and dangerous-good lines with their compliance attributes.
    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn dg_item_details(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<Vec<DgItemDetail>, ServiceError> {
        let db = &*self.db_pool;
        let consignment = consignment::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Consignment {} not found", id)))?;
        ensure_visible(actor, &consignment)?;

        let bundle = ConsignmentBundle::load(db, consignment).await?;
        Ok(bundle
            .lines
            .iter()
            .filter(|(_, line)| line.requires_compliance_review())
            .map(|(cpl, line)| DgItemDetail {
                po_line_id: line.id,
                line_number: line.line_number,
                product_code: line.product_code.clone(),
                description: line.description.clone(),
                is_chemical: line.is_chemical,
                is_dangerous_good: line.is_dangerous_good,
                hs_code: cpl.hs_code.clone(),
                eccn: cpl.eccn.clone(),
                dg_class: cpl.dg_class.clone(),
                un_number: cpl.un_number.clone(),
                dg_category: cpl.dg_category.clone(),
                country_of_origin: cpl.country_of_origin.clone(),
                document_count: bundle.document_counts.get(&cpl.id).copied().unwrap_or(0),
            })
            .collect())
    }

    /// Approves or rejects a consignment awaiting approval.
    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn review_consignment(
        &self,
        actor: &Actor,
        id: Uuid,
        decision: ReviewDecision,
    ) -> Result<consignment::Model, ServiceError> {
        actor.require(Capability::ApproveConsignments)?;

        let txn = self.db_pool.begin().await?;
        let consignment = lock_consignment(&txn, id).await?;
        if consignment.status != ConsignmentStatus::PendingForApproval {
            return Err(ServiceError::InvalidState(format!(
                "Consignment {} is {}, expected {}",
                consignment.consignment_id,
                consignment.status,
                ConsignmentStatus::PendingForApproval
            )));
        }

        let old_status = consignment.status;
        let (new_status, reason) = match &decision {
            ReviewDecision::Approve => (ConsignmentStatus::PendingConsoleAssignment, None),
            ReviewDecision::Reject { reason } => {
                let reason = reason.trim();
                if reason.is_empty() {
                    return Err(ServiceError::ValidationError(
                        "A rejection reason is required".to_string(),
                    ));
                }
                (ConsignmentStatus::Rejected, Some(reason.to_string()))
            }
        };

        let mut active: consignment::ActiveModel = consignment.into();
        active.status = Set(new_status);
        active.rejection_reason = Set(reason.clone());
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        audit::record_change(
            &txn,
            actor,
            ENTITY_CONSIGNMENT,
            updated.id,
            "status",
            Some(old_status.to_string()),
            Some(new_status.to_string()),
        )
        .await?;

        txn.commit().await?;

        info!(
            consignment_id = %updated.consignment_id,
            status = %new_status,
            "consignment reviewed"
        );

        let event = match reason {
            None => Event::ConsignmentApproved {
                consignment_id: updated.id,
                approved_by: actor.user_id,
            },
            Some(reason) => Event::ConsignmentRejected {
                consignment_id: updated.id,
                rejected_by: actor.user_id,
                reason,
            },
        };
        self.event_sender.send_or_log(event).await;

        Ok(updated)
    }

    /// Withdraws a consignment that has not joined a console.
    ///
    /// Its ledger rows stay for the record but stop counting, so every
    /// touched line gets its units back.
    #[instrument(skip(self), fields(user_id = %actor.user_id, consignment_id = %id))]
    pub async fn cancel_consignment(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<consignment::Model, ServiceError> {
        actor.require(Capability::EditConsignments)?;

        let txn = self.db_pool.begin().await?;
        let consignment = load_consignment_for_edit(&txn, actor, id).await?;
        let old_status = consignment.status;

        let mut active: consignment::ActiveModel = consignment.into();
        active.status = Set(ConsignmentStatus::Cancelled);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        audit::record_change(
            &txn,
            actor,
            ENTITY_CONSIGNMENT,
            updated.id,
            "status",
            Some(old_status.to_string()),
            Some(ConsignmentStatus::Cancelled.to_string()),
        )
        .await?;

        let touched_lines: Vec<Uuid> = packaging_allocation::Entity::find()
            .filter(packaging_allocation::Column::ConsignmentId.eq(updated.id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|a| a.po_line_id)
            .collect();
        let lines = update_line_quantities(&txn, &touched_lines).await?;

        txn.commit().await?;

        counter!("consignment.cancelled", 1);
        info!(
            consignment_id = %updated.consignment_id,
            previous_status = %old_status,
            lines_released = lines.len(),
            "consignment cancelled"
        );

        self.event_sender
            .send_or_log(Event::ConsignmentCancelled {
                consignment_id: updated.id,
                cancelled_by: actor.user_id,
            })
            .await;

        Ok(updated)
    }

    /// Stores a supporting document and links it to a selected line.
    ///
    /// The stored file is removed again when the row cannot be written.
    #[instrument(skip(self, request), fields(user_id = %actor.user_id, consignment_id = %request.consignment_id))]
    pub async fn attach_document(
        &self,
        actor: &Actor,
        request: AttachDocument,
    ) -> Result<consignment_document::Model, ServiceError> {
        request.validate()?;

        {
            let db = &*self.db_pool;
            let consignment = consignment::Entity::find_by_id(request.consignment_id)
                .one(db)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Consignment {} not found", request.consignment_id))
                })?;
            actor.require_edit_of(consignment.created_by)?;
        }

        let url = self
            .storage
            .store(&request.file_name, request.bytes.clone())
            .await?;

        match self.insert_document(actor, &request, &url).await {
            Ok(document) => {
                info!(document_id = %document.id, "supporting document attached");
                Ok(document)
            }
            Err(e) => {
                if let Err(cleanup) = self.storage.delete(&url).await {
                    error!(%url, error = %cleanup, "failed to remove orphaned document");
                }
                Err(e)
            }
        }
    }

    async fn insert_document(
        &self,
        actor: &Actor,
        request: &AttachDocument,
        url: &str,
    ) -> Result<consignment_document::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let consignment = load_consignment_for_edit(&txn, actor, request.consignment_id).await?;

        let cpl = consignment_po_line::Entity::find()
            .filter(consignment_po_line::Column::ConsignmentId.eq(consignment.id))
            .filter(consignment_po_line::Column::PoLineId.eq(request.po_line_id))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Line {} is not selected in consignment {}",
                    request.po_line_id, consignment.consignment_id
                ))
            })?;

        let document = consignment_document::ActiveModel {
            id: Set(Uuid::new_v4()),
            consignment_po_line_id: Set(cpl.id),
            document_type: Set(request.document_type.trim().to_string()),
            file_name: Set(request.file_name.clone()),
            file_url: Set(url.to_string()),
            uploaded_by: Set(actor.user_id),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(document)
    }

    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn remove_document(&self, actor: &Actor, document_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db_pool.begin().await?;

        let document = consignment_document::Entity::find_by_id(document_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Document {} not found", document_id)))?;
        let cpl = consignment_po_line::Entity::find_by_id(document.consignment_po_line_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Consignment line not found".to_string()))?;
        load_consignment_for_edit(&txn, actor, cpl.consignment_id).await?;

        let url = document.file_url.clone();
        document.delete(&txn).await?;
        txn.commit().await?;

        if let Err(e) = self.storage.delete(&url).await {
            warn!(%url, error = %e, "document row removed but stored file could not be deleted");
        }
        Ok(())
    }

    /// Deletes DRAFT consignments untouched for longer than `older_than`,
    /// together with everything they own, and gives their units back to the lines.
    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn purge_stale_drafts(
        &self,
        actor: &Actor,
        older_than: Duration,
    ) -> Result<PurgeResult, ServiceError> {
        actor.require(Capability::PurgeDrafts)?;
        let cutoff = Utc::now() - older_than;

        let txn = self.db_pool.begin().await?;
        let stale = consignment::Entity::find()
            .filter(consignment::Column::Status.eq(ConsignmentStatus::Draft))
            .filter(consignment::Column::UpdatedAt.lt(cutoff))
            .lock_exclusive()
            .all(&txn)
            .await?;

        let mut purged = Vec::with_capacity(stale.len());
        let mut touched_lines = Vec::new();
        let mut file_urls = Vec::new();

        for draft in stale {
            let allocations = packaging_allocation::Entity::find()
                .filter(packaging_allocation::Column::ConsignmentId.eq(draft.id))
                .all(&txn)
                .await?;
            touched_lines.extend(allocations.iter().map(|a| a.po_line_id));
            packaging_allocation::Entity::delete_many()
                .filter(packaging_allocation::Column::ConsignmentId.eq(draft.id))
                .exec(&txn)
                .await?;

            consignment_packaging::Entity::delete_many()
                .filter(consignment_packaging::Column::ConsignmentId.eq(draft.id))
                .exec(&txn)
                .await?;

            let cpl_ids: Vec<Uuid> = consignment_po_line::Entity::find()
                .filter(consignment_po_line::Column::ConsignmentId.eq(draft.id))
                .all(&txn)
                .await?
                .into_iter()
                .map(|cpl| cpl.id)
                .collect();
            let documents = consignment_document::Entity::find()
                .filter(consignment_document::Column::ConsignmentPoLineId.is_in(cpl_ids.clone()))
                .all(&txn)
                .await?;
            file_urls.extend(documents.into_iter().map(|d| d.file_url));
            consignment_document::Entity::delete_many()
                .filter(consignment_document::Column::ConsignmentPoLineId.is_in(cpl_ids))
                .exec(&txn)
                .await?;
            consignment_po_line::Entity::delete_many()
                .filter(consignment_po_line::Column::ConsignmentId.eq(draft.id))
                .exec(&txn)
                .await?;

            purged.push(draft.consignment_id.clone());
            draft.delete(&txn).await?;
        }

        let lines = update_line_quantities(&txn, &touched_lines).await?;
        txn.commit().await?;

        for url in file_urls {
            if let Err(e) = self.storage.delete(&url).await {
                warn!(%url, error = %e, "purged draft left a stored file behind");
            }
        }

        counter!("consignment.drafts_purged", purged.len() as u64);
        info!(count = purged.len(), %cutoff, "stale drafts purged");

        if !purged.is_empty() {
            self.event_sender
                .send_or_log(Event::DraftsPurged {
                    count: purged.len(),
                })
                .await;
        }

        Ok(PurgeResult {
            purged,
            lines_reconciled: lines.len(),
        })
    }
}
