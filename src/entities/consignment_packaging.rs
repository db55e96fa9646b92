use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A physical package (box, pallet, drum) belonging to one consignment.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "consignment_packagings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub consignment_id: Uuid,
    pub packaging_type_id: Uuid,
    #[sea_orm(unique)]
    pub package_id: String,
    /// Client-side identifier used by the wizard before the package is confirmed.
    pub draft_package_id: Option<String>,
    pub gross_weight_kg: Option<Decimal>,
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
        belongs_to = "super::packaging_type::Entity",
        from = "Column::PackagingTypeId",
        to = "super::packaging_type::Column::Id"
    )]
    PackagingType,
    #[sea_orm(has_many = "super::packaging_allocation::Entity")]
    PackagingAllocations,
}

impl Related<super::consignment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Consignment.def()
    }
}

impl Related<super::packaging_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PackagingType.def()
    }
}

impl Related<super::packaging_allocation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PackagingAllocations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
