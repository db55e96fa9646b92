use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One change event on a console; the changed attributes live in `console_audit_trail_fields`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "console_audit_trails")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub console_id: Uuid,
    pub action: String,
    pub actor_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::console::Entity",
        from = "Column::ConsoleId",
        to = "super::console::Column::Id"
    )]
    Console,
    #[sea_orm(has_many = "super::console_audit_trail_field::Entity")]
    Fields,
}

impl Related<super::console::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Console.def()
    }
}

impl Related<super::console_audit_trail_field::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Fields.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
