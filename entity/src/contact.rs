//! `SeaORM` Entity for the `contacts` table.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "contacts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub company_id: i32,
    pub name: Option<String>,
    /// JSON array of `entity::thread_ref::ThreadRef`, most-recent-first, capped at 100.
    pub recent_threads: Json,
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
    #[sea_orm(has_many = "super::email_address::Entity")]
    EmailAddress,
}

impl Related<super::company::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Company.def()
    }
}

impl Related<super::email_address::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EmailAddress.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
