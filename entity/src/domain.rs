//! `SeaORM` Entity for the `domains` table.
//!
//! Primary key is the lowercased FQDN itself (invariant I2): domains are
//! looked up directly by string, no surrogate id.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "domains")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub domain: String,
    pub company_id: i32,
    pub is_primary: bool,
    pub emails_to: i64,
    pub emails_from: i64,
    pub emails_included: i64,
    pub meetings_completed: i64,
    pub meetings_upcoming: i64,
    pub first_seen: Option<DateTimeWithTimeZone>,
    pub last_seen: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::company::Entity",
        from = "Column::CompanyId",
        to = "super::company::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Company,
}

impl Related<super::company::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Company.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
