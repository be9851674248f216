use sea_orm_migration::{prelude::*, schema::*};

use crate::{
    m20250101_000002_create_domains_table::Domain, m20250101_000003_create_contacts_table::Contact,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EmailAddress::Table)
                    .if_not_exists()
                    .col(string(EmailAddress::Address).primary_key())
                    .col(integer(EmailAddress::ContactId).not_null())
                    .col(string(EmailAddress::Domain).not_null())
                    .col(string_null(EmailAddress::ObservedName))
                    .col(boolean(EmailAddress::Active).default(true).not_null())
                    .col(json(EmailAddress::RecentThreads).not_null())
                    .col(big_integer(EmailAddress::EmailsTo).default(0).not_null())
                    .col(big_integer(EmailAddress::EmailsFrom).default(0).not_null())
                    .col(big_integer(EmailAddress::EmailsIncluded).default(0).not_null())
                    .col(big_integer(EmailAddress::MeetingsCompleted).default(0).not_null())
                    .col(big_integer(EmailAddress::MeetingsUpcoming).default(0).not_null())
                    .col(timestamp_with_time_zone_null(EmailAddress::FirstSeen))
                    .col(timestamp_with_time_zone_null(EmailAddress::LastSeen))
                    .col(
                        timestamp_with_time_zone(EmailAddress::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(
                        timestamp_with_time_zone(EmailAddress::UpdatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-email_addresses-contact_id")
                            .from(EmailAddress::Table, EmailAddress::ContactId)
                            .to(Contact::Table, Contact::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-email_addresses-domain")
                            .from(EmailAddress::Table, EmailAddress::Domain)
                            .to(Domain::Table, Domain::Domain)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx-email_addresses-contact_id")
                    .table(EmailAddress::Table)
                    .col(EmailAddress::ContactId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EmailAddress::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum EmailAddress {
    Table,
    Address,
    ContactId,
    Domain,
    ObservedName,
    Active,
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
