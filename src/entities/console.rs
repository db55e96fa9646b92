use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsoleStatus {
    #[sea_orm(string_value = "NEW")]
    New,
    #[sea_orm(string_value = "CONSOLE_ASSIGNED")]
    ConsoleAssigned,
    #[sea_orm(string_value = "FREIGHT_FORWARDER_ASSIGNED")]
    FreightForwarderAssigned,
    #[sea_orm(string_value = "PICKUP_REJECTED")]
    PickupRejected,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

impl ConsoleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::ConsoleAssigned => "CONSOLE_ASSIGNED",
            Self::FreightForwarderAssigned => "FREIGHT_FORWARDER_ASSIGNED",
            Self::PickupRejected => "PICKUP_REJECTED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Whether consignments can still join the console.
    pub fn accepts_membership_changes(&self) -> bool {
        matches!(
            self,
            Self::New | Self::ConsoleAssigned | Self::FreightForwarderAssigned
        )
    }

    /// Members can leave any console that is still open, including one whose pickup was rejected.
    pub fn accepts_removals(&self) -> bool {
        *self != Self::Cancelled
    }

    pub fn accepts_forwarder_assignment(&self) -> bool {
        matches!(
            self,
            Self::ConsoleAssigned | Self::FreightForwarderAssigned | Self::PickupRejected
        )
    }
}

impl fmt::Display for ConsoleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "consoles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub console_id: String,
    pub status: ConsoleStatus,
    pub freight_forwarder_id: Option<Uuid>,
    pub pickup_datetime: Option<DateTime<Utc>>,
    pub gl_account: Option<String>,
    /// Normalised delivery address every member is expected to share.
    pub destination_key: String,
    pub destination_country: Option<String>,
    pub pickup_rejection_reason: Option<String>,
    pub last_bol_generated_at: Option<DateTime<Utc>>,
    pub last_bol_generated_by: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::consignment::Entity")]
    Consignments,
    #[sea_orm(has_many = "super::console_audit_trail::Entity")]
    AuditTrails,
}

impl Related<super::consignment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Consignments.def()
    }
}

impl Related<super::console_audit_trail::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AuditTrails.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
