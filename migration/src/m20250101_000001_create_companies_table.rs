use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Company::Table)
                    .if_not_exists()
                    .col(pk_auto(Company::Id))
                    .col(string_null(Company::Name))
                    .col(big_integer(Company::EmailsTo).default(0).not_null())
                    .col(big_integer(Company::EmailsFrom).default(0).not_null())
                    .col(big_integer(Company::EmailsIncluded).default(0).not_null())
                    .col(big_integer(Company::MeetingsCompleted).default(0).not_null())
                    .col(big_integer(Company::MeetingsUpcoming).default(0).not_null())
                    .col(timestamp_with_time_zone_null(Company::FirstSeen))
                    .col(timestamp_with_time_zone_null(Company::LastSeen))
                    .col(
                        timestamp_with_time_zone(Company::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(
                        timestamp_with_time_zone(Company::UpdatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx-companies-created_at")
                    .table(Company::Table)
                    .col(Company::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Company::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Company {
    Table,
    Id,
    Name,
    EmailsTo,
    EmailsFrom,
    EmailsIncluded,
    MeetingsCompleted,
    MeetingsUpcoming,
    FirstSeen,
    LastSeen,
    CreatedAt,
    UpdatedAt,
}
