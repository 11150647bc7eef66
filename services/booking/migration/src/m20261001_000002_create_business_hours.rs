use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BusinessHours::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BusinessHours::Weekday)
                            .small_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BusinessHours::OpenTime).time().not_null())
                    .col(ColumnDef::new(BusinessHours::CloseTime).time().not_null())
                    .col(
                        ColumnDef::new(BusinessHours::SlotMinutes)
                            .integer()
                            .not_null()
                            .default(30),
                    )
                    .col(
                        ColumnDef::new(BusinessHours::Active)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .check(Expr::col(BusinessHours::Weekday).between(0, 6))
                    .to_owned(),
            )
            .await?;

        // Monday to Friday 09:00-17:00, weekends closed.
        manager
            .get_connection()
            .execute_unprepared(
                "INSERT INTO business_hours (weekday, open_time, close_time, slot_minutes, active) VALUES \
                 (0, '09:00', '17:00', 30, false), \
                 (1, '09:00', '17:00', 30, true), \
                 (2, '09:00', '17:00', 30, true), \
                 (3, '09:00', '17:00', 30, true), \
                 (4, '09:00', '17:00', 30, true), \
                 (5, '09:00', '17:00', 30, true), \
                 (6, '09:00', '17:00', 30, false) \
                 ON CONFLICT (weekday) DO NOTHING",
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BusinessHours::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum BusinessHours {
    Table,
    Weekday,
    OpenTime,
    CloseTime,
    SlotMinutes,
    Active,
}
