//! Console consolidation: grouping consignments for one forwarder pickup.
//!
//! Every operation that changes console membership or status writes exactly
//! one [`ConsoleTrail`] in the same transaction as the change itself.

use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::{Actor, Capability};
use crate::entities::{
    consignment, console, console_audit_trail, console_audit_trail_field, freight_forwarder,
    ConsignmentStatus, ConsoleStatus,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::audit::{self, membership_value, ConsoleTrail, ENTITY_CONSIGNMENT};
use crate::services::consignments::is_unique_violation;
use crate::services::sequences;

const MAX_CREATE_ATTEMPTS: usize = 3;

pub const ACTION_CREATE: &str = "create";
pub const ACTION_ADD_CONSIGNMENTS: &str = "add_consignments";
pub const ACTION_REMOVE_CONSIGNMENT: &str = "remove_consignment";
pub const ACTION_ASSIGN_FORWARDER: &str = "assign_freight_forwarder";
pub const ACTION_REJECT_PICKUP: &str = "reject_pickup";

/// Result of a console mutation that may need the caller's acknowledgement.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleOutcome<T> {
    Applied(T),
    /// Nothing was written; resubmit with `acknowledge_warning` to proceed.
    Warning { message: String },
}

impl<T> ConsoleOutcome<T> {
    pub fn is_warning(&self) -> bool {
        matches!(self, ConsoleOutcome::Warning { .. })
    }

    pub fn applied(self) -> Option<T> {
        match self {
            ConsoleOutcome::Applied(value) => Some(value),
            ConsoleOutcome::Warning { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsignmentSelection {
    pub consignment_ids: Vec<Uuid>,
    #[serde(default)]
    pub acknowledge_warning: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignForwarder {
    pub freight_forwarder_id: Option<Uuid>,
    pub pickup_datetime: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsoleListQuery {
    pub status: Option<ConsoleStatus>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleMember {
    pub id: Uuid,
    pub consignment_id: String,
    pub status: ConsignmentStatus,
    pub delivery_country: Option<String>,
}

impl From<&consignment::Model> for ConsoleMember {
    fn from(model: &consignment::Model) -> Self {
        Self {
            id: model.id,
            consignment_id: model.consignment_id.clone(),
            status: model.status,
            delivery_country: model.delivery_country.clone(),
        }
    }
}

/// Serialised flat: the console's columns sit beside `consignments` and `freight_forwarder`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleDetail {
    #[serde(flatten)]
    pub console: console::Model,
    pub consignments: Vec<ConsoleMember>,
    pub freight_forwarder: Option<freight_forwarder::Model>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditTrailEntry {
    #[serde(flatten)]
    pub trail: console_audit_trail::Model,
    pub fields: Vec<console_audit_trail_field::Model>,
}

/// Member-level changes applied alongside a console change.
struct MemberUpdate {
    console_id: Option<Uuid>,
    status: ConsignmentStatus,
    freight_forwarder_id: Option<Uuid>,
    pickup_datetime: Option<DateTime<Utc>>,
}

fn fmt_uuid(id: Option<Uuid>) -> Option<String> {
    id.map(|id| id.to_string())
}

fn fmt_time(time: Option<DateTime<Utc>>) -> Option<String> {
    time.map(|t| t.to_rfc3339())
}

fn codes(members: &[consignment::Model]) -> Vec<String> {
    members.iter().map(|m| m.consignment_id.clone()).collect()
}

fn dedupe(ids: &[Uuid]) -> Result<Vec<Uuid>, ServiceError> {
    let mut seen = HashSet::new();
    let unique: Vec<Uuid> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
    if unique.is_empty() {
        return Err(ServiceError::ValidationError(
            "No consignments selected".to_string(),
        ));
    }
    Ok(unique)
}

async fn lock_console<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<console::Model, ServiceError> {
    console::Entity::find_by_id(id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Console {} not found", id)))
}

async fn members_of<C: ConnectionTrait>(
    conn: &C,
    console_pk: Uuid,
) -> Result<Vec<consignment::Model>, ServiceError> {
    Ok(consignment::Entity::find()
        .filter(consignment::Column::ConsoleId.eq(console_pk))
        .order_by_asc(consignment::Column::ConsignmentId)
        .lock_exclusive()
        .all(conn)
        .await?)
}

/// Locks the requested consignments, in request order, failing on any unknown id.
async fn lock_requested<C: ConnectionTrait>(
    conn: &C,
    ids: &[Uuid],
) -> Result<Vec<consignment::Model>, ServiceError> {
    let mut found: HashMap<Uuid, consignment::Model> = consignment::Entity::find()
        .filter(consignment::Column::Id.is_in(ids.iter().copied()))
        .lock_exclusive()
        .all(conn)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    let missing: Vec<String> = ids
        .iter()
        .filter(|id| !found.contains_key(id))
        .map(Uuid::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(ServiceError::NotFound(format!(
            "Consignments not found: {}",
            missing.join(", ")
        )));
    }
    Ok(ids.iter().filter_map(|id| found.remove(id)).collect())
}

fn ensure_groupable(consignments: &[consignment::Model]) -> Result<(), ServiceError> {
    let ineligible: Vec<String> = consignments
        .iter()
        .filter(|c| c.status != ConsignmentStatus::PendingConsoleAssignment || c.console_id.is_some())
        .map(|c| format!("{} ({})", c.consignment_id, c.status))
        .collect();
    if ineligible.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::InvalidState(format!(
            "Only consignments pending console assignment can be grouped: {}",
            ineligible.join(", ")
        )))
    }
}

/// Warning text when any consignment ships somewhere other than `destination`.
fn destination_warning(destination: &str, consignments: &[consignment::Model]) -> Option<String> {
    let differing: Vec<&str> = consignments
        .iter()
        .filter(|c| c.destination_key() != destination)
        .map(|c| c.consignment_id.as_str())
        .collect();
    if differing.is_empty() {
        None
    } else {
        Some(format!(
            "Consignments {} have a different delivery address than the console. Confirm to consolidate anyway.",
            differing.join(", ")
        ))
    }
}

/// Applies `update` to a member consignment and logs each changed field.
async fn update_member<C: ConnectionTrait>(
    conn: &C,
    actor: &Actor,
    member: consignment::Model,
    update: &MemberUpdate,
    now: DateTime<Utc>,
) -> Result<consignment::Model, ServiceError> {
    let changes = [
        ("status", Some(member.status.to_string()), Some(update.status.to_string())),
        ("console_id", fmt_uuid(member.console_id), fmt_uuid(update.console_id)),
        (
            "freight_forwarder_id",
            fmt_uuid(member.freight_forwarder_id),
            fmt_uuid(update.freight_forwarder_id),
        ),
        (
            "pickup_datetime",
            fmt_time(member.pickup_datetime),
            fmt_time(update.pickup_datetime),
        ),
    ];
    for (field, old, new) in changes {
        audit::record_change(conn, actor, ENTITY_CONSIGNMENT, member.id, field, old, new).await?;
    }

    let mut active: consignment::ActiveModel = member.into();
    active.console_id = Set(update.console_id);
    active.status = Set(update.status);
    active.freight_forwarder_id = Set(update.freight_forwarder_id);
    active.pickup_datetime = Set(update.pickup_datetime);
    active.updated_at = Set(now);
    Ok(active.update(conn).await?)
}

async fn load_detail<C: ConnectionTrait>(
    conn: &C,
    console: console::Model,
) -> Result<ConsoleDetail, ServiceError> {
    let members = consignment::Entity::find()
        .filter(consignment::Column::ConsoleId.eq(console.id))
        .order_by_asc(consignment::Column::ConsignmentId)
        .all(conn)
        .await?;
    let freight_forwarder = match console.freight_forwarder_id {
        Some(id) => freight_forwarder::Entity::find_by_id(id).one(conn).await?,
        None => None,
    };
    Ok(ConsoleDetail {
        consignments: members.iter().map(ConsoleMember::from).collect(),
        console,
        freight_forwarder,
    })
}

#[derive(Clone)]
pub struct ConsoleService {
    db_pool: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl ConsoleService {
    pub fn new(db_pool: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Groups consignments under a new console.
    ///
    /// Mixed delivery addresses yield a [`ConsoleOutcome::Warning`] unless the
    /// selection acknowledges it.
    #[instrument(skip(self, selection), fields(user_id = %actor.user_id))]
    pub async fn create_console(
        &self,
        actor: &Actor,
        selection: ConsignmentSelection,
    ) -> Result<ConsoleOutcome<ConsoleDetail>, ServiceError> {
        actor.require(Capability::ManageConsoles)?;
        let ids = dedupe(&selection.consignment_ids)?;

        let mut attempt = 0;
        let outcome = loop {
            attempt += 1;
            match self
                .insert_console(actor, &ids, selection.acknowledge_warning)
                .await
            {
                Ok(outcome) => break outcome,
                Err(ServiceError::DatabaseError(e))
                    if is_unique_violation(&e) && attempt < MAX_CREATE_ATTEMPTS =>
                {
                    warn!(attempt, "console id collided, retrying");
                }
                Err(e) => return Err(e),
            }
        };

        if let ConsoleOutcome::Applied(detail) = &outcome {
            counter!("console.created", 1);
            info!(
                console_id = %detail.console.console_id,
                members = detail.consignments.len(),
                "console created"
            );
            self.event_sender
                .send_or_log(Event::ConsoleCreated {
                    console_id: detail.console.id,
                    consignment_ids: detail.consignments.iter().map(|m| m.id).collect(),
                })
                .await;
        }
        Ok(outcome)
    }

    async fn insert_console(
        &self,
        actor: &Actor,
        ids: &[Uuid],
        acknowledge_warning: bool,
    ) -> Result<ConsoleOutcome<ConsoleDetail>, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let requested = lock_requested(&txn, ids).await?;
        ensure_groupable(&requested)?;

        let Some(first) = requested.first() else {
            return Err(ServiceError::ValidationError(
                "No consignments selected".to_string(),
            ));
        };
        let destination = first.destination_key();
        let destination_country = first.delivery_country.clone();
        if let Some(message) = destination_warning(&destination, &requested) {
            if !acknowledge_warning {
                return Ok(ConsoleOutcome::Warning { message });
            }
            warn!(%message, "consolidating mixed destinations");
        }

        let now = Utc::now();
        let console_id = sequences::next_console_id(&txn).await?;
        let created = console::ActiveModel {
            id: Set(Uuid::new_v4()),
            console_id: Set(console_id),
            status: Set(ConsoleStatus::New),
            freight_forwarder_id: Set(None),
            pickup_datetime: Set(None),
            gl_account: Set(None),
            destination_key: Set(destination),
            destination_country: Set(destination_country),
            pickup_rejection_reason: Set(None),
            last_bol_generated_at: Set(None),
            last_bol_generated_by: Set(None),
            created_by: Set(actor.user_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let update = MemberUpdate {
            console_id: Some(created.id),
            status: ConsignmentStatus::ConsoleAssigned,
            freight_forwarder_id: None,
            pickup_datetime: None,
        };
        let mut members = Vec::with_capacity(requested.len());
        for consignment in requested {
            members.push(update_member(&txn, actor, consignment, &update, now).await?);
        }
        members.sort_by(|a, b| a.consignment_id.cmp(&b.consignment_id));

        let mut active: console::ActiveModel = created.clone().into();
        active.status = Set(ConsoleStatus::ConsoleAssigned);
        let console = active.update(&txn).await?;

        let mut trail = ConsoleTrail::new();
        trail
            .field("consignments", Some(membership_value(&[])), Some(membership_value(&codes(&members))))
            .field(
                "status",
                Some(created.status.to_string()),
                Some(console.status.to_string()),
            );
        trail.write(&txn, console.id, ACTION_CREATE, actor).await?;

        let detail = load_detail(&txn, console).await?;
        txn.commit().await?;
        Ok(ConsoleOutcome::Applied(detail))
    }

    /// Adds consignments to an open console. Already-present ids are ignored.
    #[instrument(skip(self, selection), fields(user_id = %actor.user_id))]
    pub async fn add_consignments(
        &self,
        actor: &Actor,
        console_id: Uuid,
        selection: ConsignmentSelection,
    ) -> Result<ConsoleOutcome<ConsoleDetail>, ServiceError> {
        actor.require(Capability::ManageConsoles)?;
        let ids = dedupe(&selection.consignment_ids)?;

        let txn = self.db_pool.begin().await?;
        let console = lock_console(&txn, console_id).await?;
        if !console.status.accepts_membership_changes() {
            return Err(ServiceError::InvalidState(format!(
                "Console {} is {} and no longer accepts consignments",
                console.console_id, console.status
            )));
        }

        let members = members_of(&txn, console.id).await?;
        let present: HashSet<Uuid> = members.iter().map(|m| m.id).collect();
        let new_ids: Vec<Uuid> = ids.into_iter().filter(|id| !present.contains(id)).collect();
        if new_ids.is_empty() {
            let detail = load_detail(&txn, console).await?;
            txn.commit().await?;
            return Ok(ConsoleOutcome::Applied(detail));
        }

        let requested = lock_requested(&txn, &new_ids).await?;
        ensure_groupable(&requested)?;
        if let Some(message) = destination_warning(&console.destination_key, &requested) {
            if !selection.acknowledge_warning {
                return Ok(ConsoleOutcome::Warning { message });
            }
            warn!(console_id = %console.console_id, %message, "consolidating mixed destinations");
        }

        let now = Utc::now();
        let update = match console.freight_forwarder_id {
            Some(forwarder) => MemberUpdate {
                console_id: Some(console.id),
                status: ConsignmentStatus::FreightForwarderAssigned,
                freight_forwarder_id: Some(forwarder),
                pickup_datetime: console.pickup_datetime,
            },
            None => MemberUpdate {
                console_id: Some(console.id),
                status: ConsignmentStatus::ConsoleAssigned,
                freight_forwarder_id: None,
                pickup_datetime: None,
            },
        };

        let old_codes = codes(&members);
        let mut all = members;
        for consignment in requested {
            all.push(update_member(&txn, actor, consignment, &update, now).await?);
        }
        all.sort_by(|a, b| a.consignment_id.cmp(&b.consignment_id));

        let mut trail = ConsoleTrail::new();
        trail.field(
            "consignments",
            Some(membership_value(&old_codes)),
            Some(membership_value(&codes(&all))),
        );

        let console = if console.status == ConsoleStatus::New {
            trail.field(
                "status",
                Some(console.status.to_string()),
                Some(ConsoleStatus::ConsoleAssigned.to_string()),
            );
            let mut active: console::ActiveModel = console.into();
            active.status = Set(ConsoleStatus::ConsoleAssigned);
            active.updated_at = Set(now);
            active.update(&txn).await?
        } else {
            let mut active: console::ActiveModel = console.into();
            active.updated_at = Set(now);
            active.update(&txn).await?
        };
        trail
            .write(&txn, console.id, ACTION_ADD_CONSIGNMENTS, actor)
            .await?;

        let detail = load_detail(&txn, console).await?;
        txn.commit().await?;

        info!(
            console_id = %detail.console.console_id,
            added = new_ids.len(),
            "consignments added to console"
        );
        self.event_sender
            .send_or_log(Event::ConsoleMembershipChanged {
                console_id: detail.console.id,
                added: new_ids,
                removed: Vec::new(),
            })
            .await;

        Ok(ConsoleOutcome::Applied(detail))
    }

    /// Returns a consignment to the pool. A console left without members is cancelled.
    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn remove_consignment(
        &self,
        actor: &Actor,
        console_id: Uuid,
        consignment_id: Uuid,
    ) -> Result<ConsoleDetail, ServiceError> {
        actor.require(Capability::ManageConsoles)?;

        let txn = self.db_pool.begin().await?;
        let console = lock_console(&txn, console_id).await?;
        if !console.status.accepts_removals() {
            return Err(ServiceError::InvalidState(format!(
                "Console {} is {} and no longer releases consignments",
                console.console_id, console.status
            )));
        }

        let members = members_of(&txn, console.id).await?;
        let old_codes = codes(&members);
        let (removed, remaining): (Vec<_>, Vec<_>) =
            members.into_iter().partition(|m| m.id == consignment_id);
        let Some(member) = removed.into_iter().next() else {
            return Err(ServiceError::NotFound(format!(
                "Consignment {} is not part of console {}",
                consignment_id, console.console_id
            )));
        };

        let now = Utc::now();
        let update = MemberUpdate {
            console_id: None,
            status: ConsignmentStatus::PendingConsoleAssignment,
            freight_forwarder_id: None,
            pickup_datetime: None,
        };
        let removed_code = member.consignment_id.clone();
        update_member(&txn, actor, member, &update, now).await?;

        let mut trail = ConsoleTrail::new();
        trail.field(
            "consignments",
            Some(membership_value(&old_codes)),
            Some(membership_value(&codes(&remaining))),
        );

        let cancelled = remaining.is_empty();
        let mut active: console::ActiveModel = console.clone().into();
        if cancelled {
            trail.field(
                "status",
                Some(console.status.to_string()),
                Some(ConsoleStatus::Cancelled.to_string()),
            );
            active.status = Set(ConsoleStatus::Cancelled);
        }
        active.updated_at = Set(now);
        let console = active.update(&txn).await?;
        trail
            .write(&txn, console.id, ACTION_REMOVE_CONSIGNMENT, actor)
            .await?;

        let detail = load_detail(&txn, console).await?;
        txn.commit().await?;

        info!(
            console_id = %detail.console.console_id,
            consignment_id = %removed_code,
            cancelled,
            "consignment removed from console"
        );
        self.event_sender
            .send_or_log(Event::ConsoleMembershipChanged {
                console_id: detail.console.id,
                added: Vec::new(),
                removed: vec![consignment_id],
            })
            .await;
        if cancelled {
            counter!("console.cancelled", 1);
            self.event_sender
                .send_or_log(Event::ConsoleCancelled {
                    console_id: detail.console.id,
                })
                .await;
        }

        Ok(detail)
    }

    /// Assigns a forwarder and pickup time to the console and every member.
    #[instrument(skip(self, request), fields(user_id = %actor.user_id))]
    pub async fn assign_freight_forwarder(
        &self,
        actor: &Actor,
        console_id: Uuid,
        request: AssignForwarder,
    ) -> Result<ConsoleDetail, ServiceError> {
        actor.require(Capability::ManageConsoles)?;
        let (Some(forwarder_id), Some(pickup_datetime)) =
            (request.freight_forwarder_id, request.pickup_datetime)
        else {
            return Err(ServiceError::ValidationError(
                "Freight forwarder, console and pickup date are all required".to_string(),
            ));
        };

        let txn = self.db_pool.begin().await?;
        let forwarder = freight_forwarder::Entity::find_by_id(forwarder_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Freight forwarder {} not found", forwarder_id))
            })?;
        if !forwarder.active {
            return Err(ServiceError::ValidationError(format!(
                "Freight forwarder {} is inactive",
                forwarder.code
            )));
        }

        let console = lock_console(&txn, console_id).await?;
        if !console.status.accepts_forwarder_assignment() {
            return Err(ServiceError::InvalidState(format!(
                "Console {} is {} and cannot be assigned a forwarder",
                console.console_id, console.status
            )));
        }
        let members = members_of(&txn, console.id).await?;
        if members.is_empty() {
            return Err(ServiceError::InvalidState(format!(
                "Console {} has no consignments",
                console.console_id
            )));
        }

        let now = Utc::now();
        let update = MemberUpdate {
            console_id: Some(console.id),
            status: ConsignmentStatus::FreightForwarderAssigned,
            freight_forwarder_id: Some(forwarder.id),
            pickup_datetime: Some(pickup_datetime),
        };
        for member in members {
            update_member(&txn, actor, member, &update, now).await?;
        }

        let mut trail = ConsoleTrail::new();
        trail
            .field(
                "freight_forwarder_id",
                fmt_uuid(console.freight_forwarder_id),
                Some(forwarder.id.to_string()),
            )
            .field(
                "pickup_datetime",
                fmt_time(console.pickup_datetime),
                fmt_time(Some(pickup_datetime)),
            )
            .field(
                "status",
                Some(console.status.to_string()),
                Some(ConsoleStatus::FreightForwarderAssigned.to_string()),
            )
            .field("pickup_rejection_reason", console.pickup_rejection_reason.clone(), None);

        let mut active: console::ActiveModel = console.into();
        active.freight_forwarder_id = Set(Some(forwarder.id));
        active.pickup_datetime = Set(Some(pickup_datetime));
        active.status = Set(ConsoleStatus::FreightForwarderAssigned);
        active.pickup_rejection_reason = Set(None);
        active.updated_at = Set(now);
        let console = active.update(&txn).await?;
        trail
            .write(&txn, console.id, ACTION_ASSIGN_FORWARDER, actor)
            .await?;

        let detail = load_detail(&txn, console).await?;
        txn.commit().await?;

        info!(
            console_id = %detail.console.console_id,
            forwarder = %forwarder.code,
            %pickup_datetime,
            "freight forwarder assigned"
        );
        self.event_sender
            .send_or_log(Event::FreightForwarderAssigned {
                console_id: detail.console.id,
                freight_forwarder_id: forwarder.id,
                pickup_datetime,
            })
            .await;

        Ok(detail)
    }

    /// Records a forwarder's refusal; members go back out for bids.
    #[instrument(skip(self, reason), fields(user_id = %actor.user_id))]
    pub async fn reject_pickup(
        &self,
        actor: &Actor,
        console_id: Uuid,
        reason: &str,
    ) -> Result<ConsoleDetail, ServiceError> {
        actor.require(Capability::ManageConsoles)?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ServiceError::ValidationError(
                "A pickup rejection reason is required".to_string(),
            ));
        }

        let txn = self.db_pool.begin().await?;
        let console = lock_console(&txn, console_id).await?;
        if console.status != ConsoleStatus::FreightForwarderAssigned {
            return Err(ServiceError::InvalidState(format!(
                "Console {} is {}, expected {}",
                console.console_id,
                console.status,
                ConsoleStatus::FreightForwarderAssigned
            )));
        }

        let now = Utc::now();
        let update = MemberUpdate {
            console_id: Some(console.id),
            status: ConsignmentStatus::PendingBid,
            freight_forwarder_id: None,
            pickup_datetime: None,
        };
        for member in members_of(&txn, console.id).await? {
            update_member(&txn, actor, member, &update, now).await?;
        }

        let mut trail = ConsoleTrail::new();
        trail
            .field(
                "status",
                Some(console.status.to_string()),
                Some(ConsoleStatus::PickupRejected.to_string()),
            )
            .field("freight_forwarder_id", fmt_uuid(console.freight_forwarder_id), None)
            .field("pickup_datetime", fmt_time(console.pickup_datetime), None)
            .field(
                "pickup_rejection_reason",
                console.pickup_rejection_reason.clone(),
                Some(reason.to_string()),
            );

        let mut active: console::ActiveModel = console.into();
        active.status = Set(ConsoleStatus::PickupRejected);
        active.freight_forwarder_id = Set(None);
        active.pickup_datetime = Set(None);
        active.pickup_rejection_reason = Set(Some(reason.to_string()));
        active.updated_at = Set(now);
        let console = active.update(&txn).await?;
        trail
            .write(&txn, console.id, ACTION_REJECT_PICKUP, actor)
            .await?;

        let detail = load_detail(&txn, console).await?;
        txn.commit().await?;

        counter!("console.pickup_rejected", 1);
        info!(console_id = %detail.console.console_id, "pickup rejected");
        self.event_sender
            .send_or_log(Event::PickupRejected {
                console_id: detail.console.id,
                reason: reason.to_string(),
            })
            .await;

        Ok(detail)
    }

    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn get_console(&self, actor: &Actor, id: Uuid) -> Result<ConsoleDetail, ServiceError> {
        actor.require(Capability::ViewConsignments)?;
        let db = &*self.db_pool;
        let console = console::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Console {} not found", id)))?;
        load_detail(db, console).await
    }

    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn list_consoles(
        &self,
        actor: &Actor,
        query: ConsoleListQuery,
    ) -> Result<(Vec<console::Model>, u64), ServiceError> {
        actor.require(Capability::ViewConsignments)?;
        let page = query.page.unwrap_or(1);
        let limit = query.limit.unwrap_or(20);
        if page < 1 || !(1..=100).contains(&limit) {
            return Err(ServiceError::ValidationError(
                "page must be >= 1 and limit between 1 and 100".to_string(),
            ));
        }

        let mut select = console::Entity::find().order_by_desc(console::Column::ConsoleId);
        if let Some(status) = query.status {
            select = select.filter(console::Column::Status.eq(status));
        }
        let paginator = select.paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await?;
        let consoles = paginator.fetch_page(page - 1).await?;
        Ok((consoles, total))
    }

    /// Trail records for a console, oldest first, each with its field changes.
    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn console_audit_trail(
        &self,
        actor: &Actor,
        console_id: Uuid,
    ) -> Result<Vec<AuditTrailEntry>, ServiceError> {
        actor.require(Capability::ViewConsignments)?;
        let db = &*self.db_pool;
        if console::Entity::find_by_id(console_id).one(db).await?.is_none() {
            return Err(ServiceError::NotFound(format!("Console {} not found", console_id)));
        }

        let trails = console_audit_trail::Entity::find()
            .filter(console_audit_trail::Column::ConsoleId.eq(console_id))
            .order_by_asc(console_audit_trail::Column::CreatedAt)
            .find_with_related(console_audit_trail_field::Entity)
            .all(db)
            .await?;

        Ok(trails
            .into_iter()
            .map(|(trail, mut fields)| {
                fields.sort_by(|a, b| a.field_name.cmp(&b.field_name));
                AuditTrailEntry { trail, fields }
            })
            .collect())
    }
}
