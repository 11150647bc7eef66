use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ScheduledMessages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScheduledMessages::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ScheduledMessages::BookingId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledMessages::MessageType)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledMessages::Recipient)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ScheduledMessages::Body).text().not_null())
                    .col(ColumnDef::new(ScheduledMessages::MediaUrl).text())
                    .col(
                        ColumnDef::new(ScheduledMessages::SendAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ScheduledMessages::ClaimedUntil).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(ScheduledMessages::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(ScheduledMessages::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(ScheduledMessages::ProviderMessageId).string())
                    .col(ColumnDef::new(ScheduledMessages::LastError).text())
                    .col(
                        ColumnDef::new(ScheduledMessages::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledMessages::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(ScheduledMessages::Table, ScheduledMessages::BookingId)
                            .to(Bookings::Table, Bookings::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(ScheduledMessages::Table)
                    .col(ScheduledMessages::Status)
                    .col(ScheduledMessages::SendAt)
                    .name("idx_scheduled_messages_status_send_at")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ScheduledMessages::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ScheduledMessages {
    Table,
    Id,
    BookingId,
    MessageType,
    Recipient,
    Body,
    MediaUrl,
    SendAt,
    ClaimedUntil,
    Status,
    Attempts,
    ProviderMessageId,
    LastError,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Bookings {
    Table,
    Id,
}
