//! Queue table for checkin reminder emails.

use sea_orm_migration::prelude::*;

use super::m20240101_000000_init::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ReminderJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReminderJobs::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ReminderJobs::Kind).string().not_null())
                    .col(ColumnDef::new(ReminderJobs::UserId).big_integer().not_null())
                    .col(
                        ColumnDef::new(ReminderJobs::EnqueuedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReminderJobs::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(ReminderJobs::LastError).string())
                    .col(ColumnDef::new(ReminderJobs::DeliveredAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-reminder_jobs-user_id")
                            .from(ReminderJobs::Table, ReminderJobs::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // The worker scans pending rows oldest first.
        manager
            .create_index(
                Index::create()
                    .name("idx-reminder_jobs-delivered_at-enqueued_at")
                    .table(ReminderJobs::Table)
                    .col(ReminderJobs::DeliveredAt)
                    .col(ReminderJobs::EnqueuedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ReminderJobs::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum ReminderJobs {
    Table,
    Id,
    Kind,
    UserId,
    EnqueuedAt,
    Attempts,
    LastError,
    DeliveredAt,
}
