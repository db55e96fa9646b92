use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Supporting compliance document (SDS, export licence, ...) attached to a consignment line.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "consignment_documents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub consignment_po_line_id: Uuid,
    pub document_type: String,
    pub file_name: String,
    pub file_url: String,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::consignment_po_line::Entity",
        from = "Column::ConsignmentPoLineId",
        to = "super::consignment_po_line::Column::Id",
        on_delete = "Cascade"
    )]
    ConsignmentPoLine,
}

impl Related<super::consignment_po_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ConsignmentPoLine.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
