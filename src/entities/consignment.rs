use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Consignment lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsignmentStatus {
    #[sea_orm(string_value = "DRAFT")]
    Draft,
    #[sea_orm(string_value = "PENDING_FOR_APPROVAL")]
    PendingForApproval,
    #[sea_orm(string_value = "REJECTED")]
    Rejected,
    #[sea_orm(string_value = "PENDING_CONSOLE_ASSIGNMENT")]
    PendingConsoleAssignment,
    #[sea_orm(string_value = "PENDING_BID")]
    PendingBid,
    #[sea_orm(string_value = "CONSOLE_ASSIGNED")]
    ConsoleAssigned,
    #[sea_orm(string_value = "FREIGHT_FORWARDER_ASSIGNED")]
    FreightForwarderAssigned,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

impl ConsignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::PendingForApproval => "PENDING_FOR_APPROVAL",
            Self::Rejected => "REJECTED",
            Self::PendingConsoleAssignment => "PENDING_CONSOLE_ASSIGNMENT",
            Self::PendingBid => "PENDING_BID",
            Self::ConsoleAssigned => "CONSOLE_ASSIGNED",
            Self::FreightForwarderAssigned => "FREIGHT_FORWARDER_ASSIGNED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(Self::Draft),
            "PENDING_FOR_APPROVAL" => Some(Self::PendingForApproval),
            "REJECTED" => Some(Self::Rejected),
            "PENDING_CONSOLE_ASSIGNMENT" => Some(Self::PendingConsoleAssignment),
            "PENDING_BID" => Some(Self::PendingBid),
            "CONSOLE_ASSIGNED" => Some(Self::ConsoleAssigned),
            "FREIGHT_FORWARDER_ASSIGNED" => Some(Self::FreightForwarderAssigned),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Statuses in which lines and packages may still be edited.
    ///
    /// Anything past `DRAFT` re-validates line capacity after the edit.
    pub fn is_mutable(&self) -> bool {
        matches!(
            self,
            Self::Draft
                | Self::Rejected
                | Self::PendingForApproval
                | Self::PendingConsoleAssignment
        )
    }

    /// Statuses from which the review step may submit for approval.
    pub fn is_submittable(&self) -> bool {
        matches!(self, Self::Draft | Self::Rejected)
    }
}

impl fmt::Display for ConsignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "consignments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub consignment_id: String,
    pub status: ConsignmentStatus,
    /// Furthest wizard step reached; never decreases.
    pub step: i32,
    pub created_by: Uuid,
    pub consignor_name: Option<String>,
    pub consignor_address: Option<String>,
    pub consignor_city: Option<String>,
    pub consignor_postal_code: Option<String>,
    pub consignor_country: Option<String>,
    pub delivery_name: Option<String>,
    pub delivery_address: Option<String>,
    pub delivery_city: Option<String>,
    pub delivery_postal_code: Option<String>,
    pub delivery_country: Option<String>,
    pub console_id: Option<Uuid>,
    pub freight_forwarder_id: Option<Uuid>,
    pub pickup_datetime: Option<DateTime<Utc>>,
    pub gl_code: Option<String>,
    pub bol_generated_at: Option<DateTime<Utc>>,
    pub xml_id: Option<String>,
    pub xml_generated_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Normalised delivery address used to decide whether consignments share a destination.
    pub fn destination_key(&self) -> String {
        destination_key(
            self.delivery_address.as_deref(),
            self.delivery_city.as_deref(),
            self.delivery_postal_code.as_deref(),
            self.delivery_country.as_deref(),
        )
    }
}

pub fn destination_key(
    address: Option<&str>,
    city: Option<&str>,
    postal_code: Option<&str>,
    country: Option<&str>,
) -> String {
    [address, city, postal_code, country]
        .iter()
        .map(|part| {
            part.unwrap_or_default()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase()
        })
        .collect::<Vec<_>>()
        .join("|")
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::consignment_po_line::Entity")]
    ConsignmentPoLines,
    #[sea_orm(has_many = "super::consignment_packaging::Entity")]
    ConsignmentPackagings,
    #[sea_orm(has_many = "super::packaging_allocation::Entity")]
    PackagingAllocations,
    #[sea_orm(
        belongs_to = "super::console::Entity",
        from = "Column::ConsoleId",
        to = "super::console::Column::Id"
    )]
    Console,
}

impl Related<super::consignment_po_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ConsignmentPoLines.def()
    }
}

impl Related<super::consignment_packaging::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ConsignmentPackagings.def()
    }
}

impl Related<super::packaging_allocation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PackagingAllocations.def()
    }
}

impl Related<super::console::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Console.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
