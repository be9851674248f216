//! `SeaORM` Entity for the `blacklisted_domains` table.
//!
//! Auxiliary to the six core entities: backs the Blacklist Engine's
//! persisted domain set (spec §4.2). Small and read-many/write-rarely, so a
//! plain table rather than a separate key-value store.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "blacklisted_domains")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub domain: String,
    pub category: BlacklistCategory,
    pub source: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum BlacklistCategory {
    #[sea_orm(string_value = "spam")]
    Spam,
    #[sea_orm(string_value = "personal")]
    Personal,
    #[sea_orm(string_value = "transactional")]
    Transactional,
    #[sea_orm(string_value = "manual")]
    Manual,
}

impl std::fmt::Display for BlacklistCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BlacklistCategory::Spam => "spam",
            BlacklistCategory::Personal => "personal",
            BlacklistCategory::Transactional => "transactional",
            BlacklistCategory::Manual => "manual",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for BlacklistCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spam" => Ok(BlacklistCategory::Spam),
            "personal" => Ok(BlacklistCategory::Personal),
            "transactional" => Ok(BlacklistCategory::Transactional),
            "manual" => Ok(BlacklistCategory::Manual),
            other => Err(format!("unknown blacklist category: {other}")),
        }
    }
}
