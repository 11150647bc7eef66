use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    cli::run_cli(agenda_booking_migration::Migrator).await;
}
