use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A purchase-order line selected into a consignment, with its compliance attributes.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "consignment_po_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub consignment_id: Uuid,
    pub po_line_id: Uuid,
    pub hs_code: Option<String>,
    pub eccn: Option<String>,
    pub dg_class: Option<String>,
    pub un_number: Option<String>,
    pub dg_category: Option<String>,
    pub country_of_origin: Option<String>,
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
    #[sea_orm(has_many = "super::consignment_document::Entity")]
    Documents,
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

impl Related<super::consignment_document::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Documents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
