pub use sea_orm_migration::prelude::*;

mod m20261001_000001_create_services;
mod m20261001_000002_create_business_hours;
mod m20261001_000003_create_bookings;
mod m20261001_000004_create_action_tokens;
mod m20261001_000005_create_scheduled_messages;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_create_services::Migration),
            Box::new(m20261001_000002_create_business_hours::Migration),
            Box::new(m20261001_000003_create_bookings::Migration),
            Box::new(m20261001_000004_create_action_tokens::Migration),
            Box::new(m20261001_000005_create_scheduled_messages::Migration),
        ]
    }
}
