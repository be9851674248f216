//! `SeaORM` Entity for the `email_addresses` table.
//!
//! Primary key is the lowercased address (invariant I2).

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "email_addresses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub address: String,
    pub contact_id: i32,
    pub domain: String,
    pub observed_name: Option<String>,
    pub active: bool,
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
        belongs_to = "super::contact::Entity",
        from = "Column::ContactId",
        to = "super::contact::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Contact,
    #[sea_orm(
        belongs_to = "super::domain::Entity",
        from = "Column::Domain",
        to = "super::domain::Column::Domain",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    Domain,
}

impl Related<super::contact::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Contact.def()
    }
}

impl Related<super::domain::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Domain.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
