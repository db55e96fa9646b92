use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Ledger entry: quantity of one purchase-order line packed into one package.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "packaging_allocations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub consignment_id: Uuid,
    pub po_line_id: Uuid,
    pub packaging_id: Uuid,
    pub allocated_qty: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::consignment::Entity",
        from = "Column::ConsignmentId",
        to = "super::consignment::Column::Id",
        on_delete = "Cascade"
    )]
    Consignment,
    #[sea_orm(
        belongs_to = "super::purchase_order_line::Entity",
        from = "Column::PoLineId",
        to = "super::purchase_order_line::Column::Id"
    )]
    PurchaseOrderLine,
    #[sea_orm(
        belongs_to = "super::consignment_packaging::Entity",
        from = "Column::PackagingId",
        to = "super::consignment_packaging::Column::Id",
        on_delete = "Cascade"
    )]
    ConsignmentPackaging,
}

impl Related<super::consignment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Consignment.def()
    }
}

impl Related<super::purchase_order_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseOrderLine.def()
    }
}

impl Related<super::consignment_packaging::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ConsignmentPackaging.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
