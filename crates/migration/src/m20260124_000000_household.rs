use sea_orm_migration::prelude::*;

use crate::m20260110_000000_init::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum HouseholdLinks {
    Table,
    Id,
    OwnerUserId,
    PartnerUserId,
    Active,
    CreatedAt,
}

#[derive(Iden)]
enum Notifications {
    Table,
    Id,
    UserId,
    Kind,
    Payload,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(HouseholdLinks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(HouseholdLinks::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(HouseholdLinks::OwnerUserId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(HouseholdLinks::PartnerUserId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(HouseholdLinks::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(HouseholdLinks::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-household_links-owner_user_id")
                            .from(HouseholdLinks::Table, HouseholdLinks::OwnerUserId)
                            .to(Users::Table, Users::Username)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-household_links-partner_user_id")
                            .from(HouseholdLinks::Table, HouseholdLinks::PartnerUserId)
                            .to(Users::Table, Users::Username)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-household_links-owner_user_id")
                    .table(HouseholdLinks::Table)
                    .col(HouseholdLinks::OwnerUserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-household_links-partner_user_id")
                    .table(HouseholdLinks::Table)
                    .col(HouseholdLinks::PartnerUserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Notifications::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Notifications::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Notifications::UserId).string().not_null())
                    .col(ColumnDef::new(Notifications::Kind).string().not_null())
                    .col(ColumnDef::new(Notifications::Payload).text().not_null())
                    .col(
                        ColumnDef::new(Notifications::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-notifications-user_id")
                    .table(Notifications::Table)
                    .col(Notifications::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Notifications::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(HouseholdLinks::Table).to_owned())
            .await?;
        Ok(())
    }
}
