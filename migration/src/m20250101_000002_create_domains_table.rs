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
                    .table(Domain::Table)
                    .if_not_exists()
                    .col(string(Domain::Domain).primary_key())
                    .col(integer(Domain::CompanyId).not_null())
                    .col(boolean(Domain::IsPrimary).default(false).not_null())
                    .col(big_integer(Domain::EmailsTo).default(0).not_null())
                    .col(big_integer(Domain::EmailsFrom).default(0).not_null())
                    .col(big_integer(Domain::EmailsIncluded).default(0).not_null())
                    .col(big_integer(Domain::MeetingsCompleted).default(0).not_null())
                    .col(big_integer(Domain::MeetingsUpcoming).default(0).not_null())
                    .col(timestamp_with_time_zone_null(Domain::FirstSeen))
                    .col(timestamp_with_time_zone_null(Domain::LastSeen))
                    .col(
                        timestamp_with_time_zone(Domain::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(
                        timestamp_with_time_zone(Domain::UpdatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-domains-company_id")
                            .from(Domain::Table, Domain::CompanyId)
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
                    .name("idx-domains-company_id")
                    .table(Domain::Table)
                    .col(Domain::CompanyId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Domain::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Domain {
    Table,
    Domain,
    CompanyId,
    IsPrimary,
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
