pub use sea_orm_migration::prelude::*;

mod m20240101_000000_init;
mod m20240102_000000_responses;
mod m20240103_000000_reminder_jobs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000000_init::Migration),
            Box::new(m20240102_000000_responses::Migration),
            Box::new(m20240103_000000_reminder_jobs::Migration),
        ]
    }
}
