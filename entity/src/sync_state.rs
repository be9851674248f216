//! `SeaORM` Entity for the `sync_states` table — one row per ingested account.
//!
//! `batch_day`/`page_token`/`page_number` is the authoritative cold-batch
//! cursor (spec design note: two sync-state schemas existed historically,
//! this is the one wired into the coordinator). `provider_cursor` is the
//! hot-incremental `historyId`-style cursor, recorded once catch-up passes
//! today so the hot path has somewhere to start.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "sync_states")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub account: String,
    pub provider_cursor: Option<String>,
    pub last_sync_at: Option<DateTimeWithTimeZone>,
    pub batch_day: Option<Date>,
    pub page_token: Option<String>,
    pub page_number: i32,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
