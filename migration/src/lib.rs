pub use sea_orm_migration::prelude::*;

mod m20250101_000001_create_companies_table;
mod m20250101_000002_create_domains_table;
mod m20250101_000003_create_contacts_table;
mod m20250101_000004_create_email_addresses_table;
mod m20250101_000005_create_sync_states_table;
mod m20250101_000006_create_processed_messages_table;
mod m20250101_000007_create_blacklisted_domains_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_companies_table::Migration),
            Box::new(m20250101_000002_create_domains_table::Migration),
            Box::new(m20250101_000003_create_contacts_table::Migration),
            Box::new(m20250101_000004_create_email_addresses_table::Migration),
            Box::new(m20250101_000005_create_sync_states_table::Migration),
            Box::new(m20250101_000006_create_processed_messages_table::Migration),
            Box::new(m20250101_000007_create_blacklisted_domains_table::Migration),
        ]
    }
}
