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
                    .table(Responses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Responses::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Responses::Data).text())
                    .col(
                        ColumnDef::new(Responses::AmountPaid)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Responses::AcceptedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Responses::RejectedBecause).string())
                    .col(ColumnDef::new(Responses::RequestId).big_integer())
                    .col(ColumnDef::new(Responses::UserId).big_integer())
                    .col(
                        ColumnDef::new(Responses::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Responses::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-responses-user_id")
                            .from(Responses::Table, Responses::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-responses-request_id")
                    .table(Responses::Table)
                    .col(Responses::RequestId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Responses::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
pub enum Responses {
    Table,
    Id,
    Data,
    AmountPaid,
    AcceptedAt,
    RejectedBecause,
    RequestId,
    UserId,
    CreatedAt,
    UpdatedAt,
}
