use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "console_audit_trail_fields")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub audit_trail_id: Uuid,
    pub field_name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::console_audit_trail::Entity",
        from = "Column::AuditTrailId",
        to = "super::console_audit_trail::Column::Id",
        on_delete = "Cascade"
    )]
    AuditTrail,
}

impl Related<super::console_audit_trail::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AuditTrail.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
