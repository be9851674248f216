//! Single import for everything the ingestion core touches on the store side:
//! the generated entities plus the `sea_orm` query surface they're built on.

pub use entity::prelude::*;
pub use entity::{blacklisted_domain, company, contact, domain, email_address, processed_message, sync_state};
pub use sea_orm::{
    entity::*, prelude::Expr, query::*, sea_query::OnConflict, ActiveValue, DatabaseConnection,
    DbErr, EntityTrait, FromQueryResult, PaginatorTrait, TransactionTrait,
};
