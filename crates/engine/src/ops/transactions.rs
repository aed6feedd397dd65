//! Transaction manager.
//!
//! A confirmed transaction lowers its account balance by `amount_minor`
//! (`transaction_expense`, not logged). Deleting it restores the amount
//! (`transaction_deleted`, logged). Steps run one after the other; when a
//! later step fails the earlier ones stay applied and the failure is logged.

use chrono::Utc;
use sea_orm::{QueryFilter, QueryOrder, prelude::*, sea_query::Expr};
use serde_json::json;
use uuid::Uuid;

use crate::{
    ChangeType, CreateTransactionCmd, DateRange, EngineError, NotificationKind, ResultEngine,
    SplitReversal, SplitState, Transaction, UpdateTransactionCmd, transactions,
    util::{ensure_positive_amount, normalize_optional_text},
};

use super::{
    Engine,
    balances::{Adjustment, today},
    splits::SplitCapability,
};

impl Engine {
    /// Records an expense and lowers the account balance.
    ///
    /// With `split_requested` the owner's active household partner becomes
    /// the collaborator and is notified. A failed notification does not undo
    /// the transaction.
    pub async fn create_transaction(&self, cmd: CreateTransactionCmd) -> ResultEngine<Transaction> {
        let mut tx = self.prepare_transaction(&cmd).await?;

        if cmd.split_requested {
            let partner = self
                .households
                .resolve_partner(&cmd.owner_user_id)
                .await?
                .filter(|partner| partner.active)
                .ok_or_else(|| {
                    EngineError::NoHouseholdLink(format!(
                        "{} has no active household partner",
                        cmd.owner_user_id
                    ))
                })?;
            tx.split = SplitState::Requested {
                collaborator: partner.partner_user_id,
            };
        }

        transactions::ActiveModel::from(&tx)
            .insert(&self.database)
            .await?;

        self.adjust(
            Adjustment::new(
                tx.account_id,
                &tx.owner_user_id,
                -tx.amount_minor,
                ChangeType::TransactionExpense,
                tx.date,
            )
            .reference(tx.id),
        )
        .await
        .inspect_err(|err| {
            tracing::error!(
                transaction_id = %tx.id,
                account_id = %tx.account_id,
                error = %err,
                "transaction recorded but balance not adjusted"
            );
        })?;

        if let SplitState::Requested { collaborator } = &tx.split {
            self.notify_split_request(collaborator, &tx).await;
        }

        Ok(tx)
    }

    /// Records a draft. Drafts have no balance effect and cannot be shared.
    pub async fn create_draft(&self, cmd: CreateTransactionCmd) -> ResultEngine<Transaction> {
        if cmd.split_requested {
            return Err(EngineError::InvalidSplitState(
                "a draft cannot be shared".to_string(),
            ));
        }
        let mut tx = self.prepare_transaction(&cmd).await?;
        tx.is_draft = true;
        transactions::ActiveModel::from(&tx)
            .insert(&self.database)
            .await?;
        Ok(tx)
    }

    /// Turns a draft into a confirmed transaction and applies its expense.
    pub async fn confirm_draft(
        &self,
        user_id: &str,
        transaction_id: Uuid,
    ) -> ResultEngine<Transaction> {
        let mut tx = self
            .require_transaction(&self.database, transaction_id, user_id)
            .await?;
        if !tx.is_draft {
            return Err(EngineError::InvalidSplitState(format!(
                "transaction {transaction_id} is already confirmed"
            )));
        }

        let now = Utc::now();
        let updated = transactions::Entity::update_many()
            .col_expr(transactions::Column::IsDraft, Expr::value(false))
            .col_expr(transactions::Column::UpdatedAt, Expr::value(now))
            .filter(transactions::Column::Id.eq(transaction_id.to_string()))
            .filter(transactions::Column::IsDraft.eq(true))
            .exec(&self.database)
            .await?;
        if updated.rows_affected == 0 {
            return Err(EngineError::InvalidSplitState(format!(
                "transaction {transaction_id} is already confirmed"
            )));
        }
        tx.is_draft = false;
        tx.updated_at = now;

        self.adjust(
            Adjustment::new(
                tx.account_id,
                &tx.owner_user_id,
                -tx.amount_minor,
                ChangeType::TransactionExpense,
                tx.date,
            )
            .reference(tx.id),
        )
        .await
        .inspect_err(|err| {
            tracing::error!(
                transaction_id = %tx.id,
                error = %err,
                "draft confirmed but balance not adjusted"
            );
        })?;

        Ok(tx)
    }

    /// Updates the provided fields.
    ///
    /// Changing the amount or date of a confirmed transaction only bumps the
    /// balance's `updated_at`; the balance itself is not recomputed and the
    /// difference shows up as drift in [`Engine::audit_account`].
    pub async fn update_transaction(&self, cmd: UpdateTransactionCmd) -> ResultEngine<Transaction> {
        let tx = self
            .require_transaction(&self.database, cmd.transaction_id, &cmd.user_id)
            .await?;
        if cmd.is_empty() {
            return Ok(tx);
        }

        if let Some(amount_minor) = cmd.amount_minor {
            ensure_positive_amount(amount_minor)?;
        }
        let category_id = cmd.category_id.unwrap_or(tx.category_id);
        let subcategory_id = match (cmd.category_id, cmd.subcategory_id) {
            (_, Some(subcategory_id)) => Some(subcategory_id),
            (Some(_), None) => None,
            (None, None) => tx.subcategory_id,
        };
        if cmd.category_id.is_some() || cmd.subcategory_id.is_some() {
            self.validate_category(&cmd.user_id, category_id, subcategory_id)
                .await?;
        }

        let balance_relevant = cmd.amount_minor.is_some_and(|a| a != tx.amount_minor)
            || cmd.date.is_some_and(|d| d != tx.date);
        let description = match cmd.description.as_deref() {
            Some(description) => normalize_optional_text(Some(description)),
            None => tx.description.clone(),
        };

        // Split columns are owned by the split flow and are never written here.
        transactions::Entity::update_many()
            .col_expr(
                transactions::Column::AmountMinor,
                Expr::value(cmd.amount_minor.unwrap_or(tx.amount_minor)),
            )
            .col_expr(
                transactions::Column::Date,
                Expr::value(cmd.date.unwrap_or(tx.date)),
            )
            .col_expr(transactions::Column::Description, Expr::value(description))
            .col_expr(
                transactions::Column::CategoryId,
                Expr::value(category_id.to_string()),
            )
            .col_expr(
                transactions::Column::SubcategoryId,
                Expr::value(subcategory_id.map(|id| id.to_string())),
            )
            .col_expr(transactions::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(transactions::Column::Id.eq(tx.id.to_string()))
            .filter(transactions::Column::OwnerUserId.eq(cmd.user_id.as_str()))
            .exec(&self.database)
            .await?;
        let tx = self
            .require_transaction(&self.database, cmd.transaction_id, &cmd.user_id)
            .await?;

        if balance_relevant && !tx.is_draft {
            self.touch(tx.account_id).await?;
        }

        Ok(tx)
    }

    /// Deletes a transaction and restores its expense.
    ///
    /// Deleting a completed shared bill also restores the collaborator's
    /// portion and removes their portion transaction. The authority for that
    /// is obtained before anything is written.
    pub async fn delete_transaction(
        &self,
        user_id: &str,
        transaction_id: Uuid,
    ) -> ResultEngine<SplitReversal> {
        let tx = self
            .require_transaction(&self.database, transaction_id, user_id)
            .await?;
        if tx.is_split_portion() {
            return Err(EngineError::InvalidSplitState(
                "a split portion is removed together with its shared bill".to_string(),
            ));
        }

        let capability = match &tx.split {
            SplitState::Completed(_) => {
                let partner = self.households.resolve_partner(user_id).await?;
                Some(SplitCapability::authorize(user_id, &tx, partner.as_ref())?)
            }
            SplitState::NotShared | SplitState::Requested { .. } => None,
        };

        let deleted = transactions::Entity::delete_many()
            .filter(transactions::Column::Id.eq(transaction_id.to_string()))
            .filter(transactions::Column::OwnerUserId.eq(user_id))
            .exec(&self.database)
            .await?;
        if deleted.rows_affected == 0 {
            return Err(EngineError::KeyNotFound(
                "transaction not exists".to_string(),
            ));
        }

        if !tx.is_draft {
            self.adjust(
                Adjustment::new(
                    tx.account_id,
                    &tx.owner_user_id,
                    tx.amount_minor,
                    ChangeType::TransactionDeleted,
                    today(),
                )
                .reference(tx.id),
            )
            .await
            .inspect_err(|err| {
                tracing::error!(
                    transaction_id = %tx.id,
                    account_id = %tx.account_id,
                    error = %err,
                    "transaction deleted but balance not restored"
                );
            })?;
        }

        let Some(capability) = capability else {
            return Ok(SplitReversal::OwnerOnly);
        };
        self.adjust_partner_balance(&capability)
            .await
            .inspect_err(|err| {
                tracing::error!(
                    transaction_id = %tx.id,
                    error = %err,
                    "shared bill deleted but collaborator balance not restored"
                );
            })?;
        self.remove_partner_portion(&capability)
            .await
            .inspect_err(|err| {
                tracing::error!(
                    transaction_id = %tx.id,
                    error = %err,
                    "shared bill reversed but collaborator portion not removed"
                );
            })?;
        Ok(capability.reversal())
    }

    pub async fn transaction(&self, user_id: &str, transaction_id: Uuid) -> ResultEngine<Transaction> {
        self.require_transaction(&self.database, transaction_id, user_id)
            .await
    }

    /// Transactions of one account with `date` in `range`, oldest first.
    pub async fn list_transactions(
        &self,
        user_id: &str,
        account_id: Uuid,
        range: &DateRange,
        include_drafts: bool,
    ) -> ResultEngine<Vec<Transaction>> {
        range.validate()?;
        self.require_account(&self.database, account_id, user_id)
            .await?;

        let mut query = transactions::Entity::find()
            .filter(transactions::Column::AccountId.eq(account_id.to_string()))
            .filter(transactions::Column::OwnerUserId.eq(user_id))
            .order_by_asc(transactions::Column::Date)
            .order_by_asc(transactions::Column::CreatedAt);
        if !include_drafts {
            query = query.filter(transactions::Column::IsDraft.eq(false));
        }
        if let Some(from) = range.from {
            query = query.filter(transactions::Column::Date.gte(from));
        }
        if let Some(to) = range.to {
            query = query.filter(transactions::Column::Date.lt(to));
        }

        query
            .all(&self.database)
            .await?
            .into_iter()
            .map(Transaction::try_from)
            .collect()
    }

    async fn prepare_transaction(&self, cmd: &CreateTransactionCmd) -> ResultEngine<Transaction> {
        ensure_positive_amount(cmd.amount_minor)?;
        self.validate_account(&cmd.owner_user_id, cmd.account_id)
            .await?;
        self.validate_category(&cmd.owner_user_id, cmd.category_id, cmd.subcategory_id)
            .await?;
        Transaction::new(
            cmd.owner_user_id.clone(),
            cmd.account_id,
            cmd.category_id,
            cmd.subcategory_id,
            cmd.amount_minor,
            normalize_optional_text(cmd.description.as_deref()),
            cmd.date,
            cmd.is_private,
        )
    }

    async fn notify_split_request(&self, collaborator: &str, tx: &Transaction) {
        let payload = json!({
            "transaction_id": tx.id,
            "owner_user_id": tx.owner_user_id,
            "amount_minor": tx.amount_minor,
            "description": tx.description,
            "category_id": tx.category_id,
            "date": tx.date,
        });
        if let Err(err) = self
            .notifier
            .notify(collaborator, NotificationKind::SplitBillRequest, payload)
            .await
        {
            tracing::warn!(
                transaction_id = %tx.id,
                collaborator = %collaborator,
                error = %err,
                "split request notification failed"
            );
        }
    }
}
