//! Initial schema for the household ledger.
//!
//! - `users`: authentication and principal ids
//! - `accounts`: money locations owned by a single user
//! - `categories`: per-user categories (a row with `parent_id` is a subcategory)
//! - `account_balances`: one running balance per account
//! - `balance_history`: append-only audit of balance changes
//! - `transactions`: user-entered monetary events, including split-bill fields
//! - `transfers`: fund movements between two accounts of the same user

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
pub(crate) enum Users {
    Table,
    Username,
    Password,
}

#[derive(Iden)]
enum Accounts {
    Table,
    Id,
    OwnerUserId,
    Name,
    Kind,
    PlaceName,
    Latitude,
    Longitude,
    CreatedAt,
}

#[derive(Iden)]
enum Categories {
    Table,
    Id,
    OwnerUserId,
    Name,
    ParentId,
}

#[derive(Iden)]
enum AccountBalances {
    Table,
    AccountId,
    OwnerUserId,
    Balance,
    UpdatedAt,
}

#[derive(Iden)]
enum BalanceHistory {
    Table,
    Id,
    AccountId,
    OwnerUserId,
    PreviousBalance,
    NewBalance,
    ChangeAmount,
    ChangeType,
    ReferenceId,
    EffectiveDate,
    RecordedAt,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    AccountId,
    OwnerUserId,
    AmountMinor,
    CategoryId,
    SubcategoryId,
    Description,
    Date,
    IsDraft,
    IsPrivate,
    SplitRequested,
    CollaboratorId,
    CollaboratorAccountId,
    CollaboratorAmount,
    CollaboratorDescription,
    CollaboratorTransactionId,
    SplitCompletedAt,
    SplitParentId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Transfers {
    Table,
    Id,
    OwnerUserId,
    FromAccountId,
    ToAccountId,
    AmountMinor,
    Description,
    Date,
    CreatedAt,
    UpdatedAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Users
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Username)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Password).string().not_null())
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Accounts
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Accounts::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Accounts::OwnerUserId).string().not_null())
                    .col(ColumnDef::new(Accounts::Name).string().not_null())
                    .col(
                        ColumnDef::new(Accounts::Kind)
                            .string()
                            .not_null()
                            .default("expense"),
                    )
                    .col(ColumnDef::new(Accounts::PlaceName).string())
                    .col(ColumnDef::new(Accounts::Latitude).double())
                    .col(ColumnDef::new(Accounts::Longitude).double())
                    .col(ColumnDef::new(Accounts::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-accounts-owner_user_id")
                            .from(Accounts::Table, Accounts::OwnerUserId)
                            .to(Users::Table, Users::Username),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-accounts-owner_user_id-name-unique")
                    .table(Accounts::Table)
                    .col(Accounts::OwnerUserId)
                    .col(Accounts::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Categories
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Categories::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Categories::OwnerUserId).string().not_null())
                    .col(ColumnDef::new(Categories::Name).string().not_null())
                    .col(ColumnDef::new(Categories::ParentId).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-categories-owner_user_id")
                            .from(Categories::Table, Categories::OwnerUserId)
                            .to(Users::Table, Users::Username),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-categories-parent_id")
                            .from(Categories::Table, Categories::ParentId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Account balances
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(AccountBalances::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AccountBalances::AccountId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AccountBalances::OwnerUserId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AccountBalances::Balance)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(AccountBalances::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-account_balances-account_id")
                            .from(AccountBalances::Table, AccountBalances::AccountId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Balance history
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(BalanceHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BalanceHistory::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BalanceHistory::AccountId).string().not_null())
                    .col(
                        ColumnDef::new(BalanceHistory::OwnerUserId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BalanceHistory::PreviousBalance)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BalanceHistory::NewBalance)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BalanceHistory::ChangeAmount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BalanceHistory::ChangeType).string().not_null())
                    .col(ColumnDef::new(BalanceHistory::ReferenceId).string())
                    .col(ColumnDef::new(BalanceHistory::EffectiveDate).date().not_null())
                    .col(
                        ColumnDef::new(BalanceHistory::RecordedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-balance_history-account_id")
                            .from(BalanceHistory::Table, BalanceHistory::AccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-balance_history-account_id-effective_date")
                    .table(BalanceHistory::Table)
                    .col(BalanceHistory::AccountId)
                    .col(BalanceHistory::EffectiveDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-balance_history-reference_id")
                    .table(BalanceHistory::Table)
                    .col(BalanceHistory::ReferenceId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Transactions
        // ───────────────────────────────────────────────────────────────────
        // Split columns carry no foreign keys: a shared bill and its portion
        // are removed in sequence, not atomically.
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::AccountId).string().not_null())
                    .col(ColumnDef::new(Transactions::OwnerUserId).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::CategoryId).string().not_null())
                    .col(ColumnDef::new(Transactions::SubcategoryId).string())
                    .col(ColumnDef::new(Transactions::Description).string())
                    .col(ColumnDef::new(Transactions::Date).date().not_null())
                    .col(
                        ColumnDef::new(Transactions::IsDraft)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Transactions::IsPrivate)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Transactions::SplitRequested)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Transactions::CollaboratorId).string())
                    .col(ColumnDef::new(Transactions::CollaboratorAccountId).string())
                    .col(ColumnDef::new(Transactions::CollaboratorAmount).big_integer())
                    .col(ColumnDef::new(Transactions::CollaboratorDescription).string())
                    .col(ColumnDef::new(Transactions::CollaboratorTransactionId).string())
                    .col(ColumnDef::new(Transactions::SplitCompletedAt).timestamp())
                    .col(ColumnDef::new(Transactions::SplitParentId).string())
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-account_id")
                            .from(Transactions::Table, Transactions::AccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-account_id-date")
                    .table(Transactions::Table)
                    .col(Transactions::AccountId)
                    .col(Transactions::Date)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-collaborator_id")
                    .table(Transactions::Table)
                    .col(Transactions::CollaboratorId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 7. Transfers
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Transfers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transfers::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transfers::OwnerUserId).string().not_null())
                    .col(ColumnDef::new(Transfers::FromAccountId).string().not_null())
                    .col(ColumnDef::new(Transfers::ToAccountId).string().not_null())
                    .col(
                        ColumnDef::new(Transfers::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transfers::Description).string())
                    .col(ColumnDef::new(Transfers::Date).date().not_null())
                    .col(ColumnDef::new(Transfers::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Transfers::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transfers-from_account_id")
                            .from(Transfers::Table, Transfers::FromAccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transfers-to_account_id")
                            .from(Transfers::Table, Transfers::ToAccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transfers-owner_user_id-date")
                    .table(Transfers::Table)
                    .col(Transfers::OwnerUserId)
                    .col(Transfers::Date)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(Transfers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BalanceHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AccountBalances::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
