use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProcessedMessage::Table)
                    .if_not_exists()
                    .col(string(ProcessedMessage::MessageId).primary_key())
                    .col(string(ProcessedMessage::Account).not_null())
                    .col(
                        timestamp_with_time_zone(ProcessedMessage::RecordedAt)
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
                    .name("idx-processed_messages-message_id")
                    .table(ProcessedMessage::Table)
                    .col(ProcessedMessage::MessageId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProcessedMessage::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ProcessedMessage {
    Table,
    MessageId,
    Account,
    RecordedAt,
}
