use sea_orm_migration::{prelude::*, schema::*};

use crate::m20250101_000001_create_companies_table::Company;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Contact::Table)
                    .if_not_exists()
                    .col(pk_auto(Contact::Id))
                    .col(integer(Contact::CompanyId).not_null())
                    .col(string_null(Contact::Name))
                    .col(json(Contact::RecentThreads).not_null())
                    .col(big_integer(Contact::EmailsTo).default(0).not_null())
                    .col(big_integer(Contact::EmailsFrom).default(0).not_null())
                    .col(big_integer(Contact::EmailsIncluded).default(0).not_null())
                    .col(big_integer(Contact::MeetingsCompleted).default(0).not_null())
                    .col(big_integer(Contact::MeetingsUpcoming).default(0).not_null())
                    .col(timestamp_with_time_zone_null(Contact::FirstSeen))
                    .col(timestamp_with_time_zone_null(Contact::LastSeen))
                    .col(
                        timestamp_with_time_zone(Contact::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(
                        timestamp_with_time_zone(Contact::UpdatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-contacts-company_id")
                            .from(Contact::Table, Contact::CompanyId)
                            .to(Company::Table, Company::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx-contacts-company_id")
                    .table(Contact::Table)
                    .col(Contact::CompanyId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx-contacts-created_at")
                    .table(Contact::Table)
                    .col(Contact::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Contact::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Contact {
    Table,
    Id,
    CompanyId,
    Name,
    RecentThreads,
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
