//! Audit log sink and console audit trails.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::auth::Actor;
use crate::entities::{audit_log, console_audit_trail, console_audit_trail_field};

pub const ENTITY_CONSIGNMENT: &str = "consignment";
pub const ENTITY_CONSIGNMENT_PO_LINE: &str = "consignment_po_line";
pub const ENTITY_PACKAGING_ALLOCATION: &str = "packaging_allocation";
pub const ENTITY_CONSOLE: &str = "console";

/// Appends one (entity, field, old, new) row on the caller's connection.
pub async fn record_change<C: ConnectionTrait>(
    conn: &C,
    actor: &Actor,
    entity_type: &str,
    entity_id: Uuid,
    field_name: &str,
    old_value: Option<String>,
    new_value: Option<String>,
) -> Result<(), DbErr> {
    if old_value == new_value {
        return Ok(());
    }

    audit_log::ActiveModel {
        id: Set(Uuid::new_v4()),
        entity_type: Set(entity_type.to_string()),
        entity_id: Set(entity_id),
        field_name: Set(field_name.to_string()),
        old_value: Set(old_value),
        new_value: Set(new_value),
        actor_id: Set(actor.user_id),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await?;

    debug!(entity_type, %entity_id, field_name, "audit change recorded");
    Ok(())
}

pub async fn changes_for<C: ConnectionTrait>(
    conn: &C,
    entity_type: &str,
    entity_id: Uuid,
) -> Result<Vec<audit_log::Model>, DbErr> {
    audit_log::Entity::find()
        .filter(audit_log::Column::EntityType.eq(entity_type))
        .filter(audit_log::Column::EntityId.eq(entity_id))
        .order_by_asc(audit_log::Column::CreatedAt)
        .all(conn)
        .await
}

/// Stored representation of a console's member list: sorted business ids as JSON.
pub fn membership_value(consignment_codes: &[String]) -> String {
    let mut sorted = consignment_codes.to_vec();
    sorted.sort();
    serde_json::Value::from(sorted).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub field_name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// Collects the field changes of one console operation.
///
/// Unchanged fields are dropped, and an empty builder writes nothing.
#[derive(Debug, Default)]
pub struct ConsoleTrail {
    changes: Vec<FieldChange>,
}

impl ConsoleTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(
        &mut self,
        field_name: &str,
        old_value: Option<String>,
        new_value: Option<String>,
    ) -> &mut Self {
        if old_value != new_value {
            // A later change to the same field keeps the first old value.
            if let Some(existing) = self.changes.iter_mut().find(|c| c.field_name == field_name) {
                existing.new_value = new_value;
                if existing.old_value == existing.new_value {
                    self.changes.retain(|c| c.field_name != field_name);
                }
            } else {
                self.changes.push(FieldChange {
                    field_name: field_name.to_string(),
                    old_value,
                    new_value,
                });
            }
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn changes(&self) -> &[FieldChange] {
        &self.changes
    }

    /// Writes the trail and its fields, returning `None` when nothing changed.
    pub async fn write<C: ConnectionTrait>(
        self,
        conn: &C,
        console_pk: Uuid,
        action: &str,
        actor: &Actor,
    ) -> Result<Option<console_audit_trail::Model>, DbErr> {
        if self.changes.is_empty() {
            return Ok(None);
        }

        let trail = console_audit_trail::ActiveModel {
            id: Set(Uuid::new_v4()),
            console_id: Set(console_pk),
            action: Set(action.to_string()),
            actor_id: Set(actor.user_id),
            created_at: Set(Utc::now()),
        }
        .insert(conn)
        .await?;

        for change in self.changes {
            console_audit_trail_field::ActiveModel {
                id: Set(Uuid::new_v4()),
                audit_trail_id: Set(trail.id),
                field_name: Set(change.field_name),
                old_value: Set(change.old_value),
                new_value: Set(change.new_value),
            }
            .insert(conn)
            .await?;
        }

        Ok(Some(trail))
    }
}
