use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A single ordered item of a purchase order.
///
/// `allocated_quantity` and `remaining_quantity` are derived from the
/// packaging allocation ledger and must only be written by it.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_order_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub purchase_order_id: Uuid,
    pub line_number: i32,
    pub product_code: String,
    pub description: String,
    pub ordered_quantity: i32,
    pub allocated_quantity: i32,
    pub remaining_quantity: i32,
    pub unit_weight_kg: Option<Decimal>,
    pub is_chemical: bool,
    pub is_dangerous_good: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Lines that need extra compliance data before a consignment can proceed.
    pub fn requires_compliance_review(&self) -> bool {
        self.is_chemical || self.is_dangerous_good
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::purchase_order::Entity",
        from = "Column::PurchaseOrderId",
        to = "super::purchase_order::Column::Id"
    )]
    PurchaseOrder,
    #[sea_orm(has_many = "super::packaging_allocation::Entity")]
    PackagingAllocations,
    #[sea_orm(has_many = "super::consignment_po_line::Entity")]
    ConsignmentPoLines,
}

impl Related<super::purchase_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseOrder.def()
    }
}

impl Related<super::packaging_allocation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PackagingAllocations.def()
    }
}

impl Related<super::consignment_po_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ConsignmentPoLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
