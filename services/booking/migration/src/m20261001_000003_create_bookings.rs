use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Bookings::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Bookings::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Bookings::Code)
                            .string_len(12)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Bookings::ServiceId).integer().not_null())
                    .col(ColumnDef::new(Bookings::ClientName).string().not_null())
                    .col(ColumnDef::new(Bookings::ClientEmail).string().not_null())
                    .col(ColumnDef::new(Bookings::ClientPhone).string())
                    .col(
                        ColumnDef::new(Bookings::StartAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Bookings::EndAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Bookings::Timezone).string().not_null())
                    .col(
                        ColumnDef::new(Bookings::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Bookings::CalendarEventId).string())
                    .col(ColumnDef::new(Bookings::MeetingId).string())
                    .col(ColumnDef::new(Bookings::MeetingJoinUrl).text())
                    .col(ColumnDef::new(Bookings::Notes).text().not_null().default(""))
                    .col(
                        ColumnDef::new(Bookings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Bookings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Bookings::Table, Bookings::ServiceId)
                            .to(Services::Table, Services::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // Busy-interval lookups filter by status and start time.
        manager
            .create_index(
                Index::create()
                    .table(Bookings::Table)
                    .col(Bookings::Status)
                    .col(Bookings::StartAt)
                    .name("idx_bookings_status_start_at")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Bookings::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Bookings {
    Table,
    Id,
    Code,
    ServiceId,
    ClientName,
    ClientEmail,
    ClientPhone,
    StartAt,
    EndAt,
    Timezone,
    Status,
    CalendarEventId,
    MeetingId,
    MeetingJoinUrl,
    Notes,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Services {
    Table,
    Id,
}
