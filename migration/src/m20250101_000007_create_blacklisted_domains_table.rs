use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BlacklistedDomain::Table)
                    .if_not_exists()
                    .col(string(BlacklistedDomain::Domain).primary_key())
                    .col(string(BlacklistedDomain::Category).not_null())
                    .col(string_null(BlacklistedDomain::Source))
                    .col(
                        timestamp_with_time_zone(BlacklistedDomain::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BlacklistedDomain::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum BlacklistedDomain {
    Table,
    Domain,
    Category,
    Source,
    CreatedAt,
}
