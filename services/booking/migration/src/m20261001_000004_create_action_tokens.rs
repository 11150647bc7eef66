use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ActionTokens::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ActionTokens::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ActionTokens::BookingId).uuid().not_null())
                    .col(ColumnDef::new(ActionTokens::Action).string_len(20).not_null())
                    .col(
                        ColumnDef::new(ActionTokens::Token)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(ActionTokens::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ActionTokens::Used)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(ActionTokens::UsedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(ActionTokens::IpAddress).string_len(45))
                    .col(
                        ColumnDef::new(ActionTokens::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(ActionTokens::Table, ActionTokens::BookingId)
                            .to(Bookings::Table, Bookings::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(ActionTokens::Table)
                    .col(ActionTokens::BookingId)
                    .col(ActionTokens::Action)
                    .name("idx_action_tokens_booking_action")
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(ActionTokens::Table)
                    .col(ActionTokens::ExpiresAt)
                    .name("idx_action_tokens_expires_at")
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(ActionTokens::Table)
                    .col(ActionTokens::Used)
                    .name("idx_action_tokens_used")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ActionTokens::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ActionTokens {
    Table,
    Id,
    BookingId,
    Action,
    Token,
    ExpiresAt,
    Used,
    UsedAt,
    IpAddress,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Bookings {
    Table,
    Id,
}
