use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncState::Table)
                    .if_not_exists()
                    .col(string(SyncState::Account).primary_key())
                    .col(string_null(SyncState::ProviderCursor))
                    .col(timestamp_with_time_zone_null(SyncState::LastSyncAt))
                    .col(date_null(SyncState::BatchDay))
                    .col(string_null(SyncState::PageToken))
                    .col(integer(SyncState::PageNumber).default(0).not_null())
                    .col(
                        timestamp_with_time_zone(SyncState::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(
                        timestamp_with_time_zone(SyncState::UpdatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyncState::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum SyncState {
    Table,
    Account,
    ProviderCursor,
    LastSyncAt,
    BatchDay,
    PageToken,
    PageNumber,
    CreatedAt,
    UpdatedAt,
}
