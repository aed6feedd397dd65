//! Balance store and balance history.
//!
//! `adjust` is the only code path that changes `account_balances.balance`.
//! It applies the delta as one arithmetic UPDATE inside a short DB
//! transaction, then appends the history entry on its own. A failed history
//! write is logged and counted, never propagated.
//!
//! Balances never leave the `i64` range: a change that would overflow is
//! rejected with `InvalidAmount` before anything is written.

use base64::Engine as _;
use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveValue, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::*,
    sea_query::{Expr, OnConflict},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    BalanceHistoryEntry, ChangeType, DateRange, EngineError, ResultEngine, balance_history,
    balances, transactions,
};

use super::{Engine, with_tx};

/// How a balance moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BalanceChange {
    By(i64),
    /// The delta is computed against the balance read under the write lock.
    To(i64),
}

/// One balance change request.
#[derive(Clone, Debug)]
pub(crate) struct Adjustment {
    pub(crate) account_id: Uuid,
    pub(crate) owner_user_id: String,
    pub(crate) change: BalanceChange,
    pub(crate) change_type: ChangeType,
    pub(crate) reference_id: Option<Uuid>,
    pub(crate) effective_date: NaiveDate,
}

impl Adjustment {
    pub(crate) fn new(
        account_id: Uuid,
        owner_user_id: &str,
        delta_minor: i64,
        change_type: ChangeType,
        effective_date: NaiveDate,
    ) -> Self {
        Self {
            account_id,
            owner_user_id: owner_user_id.to_string(),
            change: BalanceChange::By(delta_minor),
            change_type,
            reference_id: None,
            effective_date,
        }
    }

    pub(crate) fn to_target(
        account_id: Uuid,
        owner_user_id: &str,
        target_minor: i64,
        change_type: ChangeType,
        effective_date: NaiveDate,
    ) -> Self {
        Self {
            account_id,
            owner_user_id: owner_user_id.to_string(),
            change: BalanceChange::To(target_minor),
            change_type,
            reference_id: None,
            effective_date,
        }
    }

    pub(crate) fn reference(mut self, reference_id: Uuid) -> Self {
        self.reference_id = Some(reference_id);
        self
    }
}

/// Result of replaying an account's history against its stored balance.
///
/// `expected_balance = history_net + unlogged_expense_net`. Expense deltas
/// are never logged, so they are derived from the confirmed transactions
/// still on the account plus the ones implied by `transaction_deleted`
/// entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BalanceAudit {
    pub account_id: Uuid,
    pub stored_balance: i64,
    pub history_net: i64,
    pub unlogged_expense_net: i64,
    pub expected_balance: i64,
    /// `stored_balance - expected_balance`.
    pub drift: i64,
    /// Entries where `new_balance != previous_balance + change_amount`.
    pub broken_entries: Vec<BalanceHistoryEntry>,
}

impl BalanceAudit {
    pub fn is_consistent(&self) -> bool {
        self.drift == 0 && self.broken_entries.is_empty()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct HistoryCursor {
    entry_id: i64,
}

impl HistoryCursor {
    fn encode(&self) -> ResultEngine<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| EngineError::InvalidCursor("invalid history cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(input: &str) -> ResultEngine<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| EngineError::InvalidCursor("invalid history cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| EngineError::InvalidCursor("invalid history cursor".to_string()))
    }
}

pub(super) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn out_of_range() -> EngineError {
    EngineError::InvalidAmount("balance out of range".to_string())
}

/// The delta that moves `current` as requested, and the resulting balance.
fn resolve_change(current: i64, change: BalanceChange) -> ResultEngine<(i64, i64)> {
    let delta = match change {
        BalanceChange::By(delta) => delta,
        BalanceChange::To(target) => target.checked_sub(current).ok_or_else(out_of_range)?,
    };
    let new = current.checked_add(delta).ok_or_else(out_of_range)?;
    Ok((delta, new))
}

fn checked_total(values: impl IntoIterator<Item = i64>) -> ResultEngine<i64> {
    values
        .into_iter()
        .try_fold(0i64, |acc, value| acc.checked_add(value))
        .ok_or_else(out_of_range)
}

impl Engine {
    /// Applies the change to the account balance and returns the new
    /// balance.
    ///
    /// The balance row is created with 0 on first use. Fails with
    /// `InvalidAmount` when the result would not fit in `i64`. Fails with
    /// `KeyNotFound` when the account does not belong to `owner_user_id`.
    pub(crate) async fn adjust(&self, adjustment: Adjustment) -> ResultEngine<i64> {
        let (previous, new) = self.apply_delta(&adjustment).await?;
        tracing::debug!(
            account_id = %adjustment.account_id,
            change_type = %adjustment.change_type,
            reference_id = ?adjustment.reference_id,
            previous_balance = previous,
            new_balance = new,
            "balance adjusted"
        );
        if adjustment.change_type.is_logged() {
            self.record_history(&adjustment, previous, new).await;
        }
        Ok(new)
    }

    /// Returns `(previous, new)`.
    async fn apply_delta(&self, adjustment: &Adjustment) -> ResultEngine<(i64, i64)> {
        let account_id = adjustment.account_id.to_string();
        with_tx!(self, |db_tx| {
            self.require_account(&db_tx, adjustment.account_id, &adjustment.owner_user_id)
                .await?;

            let now = Utc::now();
            let seed = balances::ActiveModel {
                account_id: ActiveValue::Set(account_id.clone()),
                owner_user_id: ActiveValue::Set(adjustment.owner_user_id.clone()),
                balance: ActiveValue::Set(0),
                updated_at: ActiveValue::Set(now),
            };
            balances::Entity::insert(seed)
                .on_conflict(
                    OnConflict::column(balances::Column::AccountId)
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(&db_tx)
                .await?;

            // Writing first takes the row's write lock: the balance read below
            // cannot change until commit.
            balances::Entity::update_many()
                .col_expr(balances::Column::UpdatedAt, Expr::value(now))
                .filter(balances::Column::AccountId.eq(account_id.as_str()))
                .exec(&db_tx)
                .await?;
            let previous = balances::Entity::find_by_id(account_id.clone())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("account balance not exists".to_string()))?
                .balance;
            let (delta, new) = resolve_change(previous, adjustment.change)?;

            balances::Entity::update_many()
                .col_expr(
                    balances::Column::Balance,
                    Expr::col(balances::Column::Balance).add(delta),
                )
                .filter(balances::Column::AccountId.eq(account_id.as_str()))
                .exec(&db_tx)
                .await?;

            Ok((previous, new))
        })
    }

    async fn record_history(&self, adjustment: &Adjustment, previous: i64, new: i64) {
        let entry = BalanceHistoryEntry {
            id: 0,
            account_id: adjustment.account_id,
            owner_user_id: adjustment.owner_user_id.clone(),
            previous_balance: previous,
            new_balance: new,
            change_amount: new - previous,
            change_type: adjustment.change_type,
            reference_id: adjustment.reference_id,
            effective_date: adjustment.effective_date,
            recorded_at: Utc::now(),
        };
        if let Err(err) = balance_history::ActiveModel::from(&entry)
            .insert(&self.database)
            .await
        {
            self.record_history_failure();
            tracing::error!(
                account_id = %adjustment.account_id,
                change_type = %adjustment.change_type,
                reference_id = ?adjustment.reference_id,
                previous_balance = previous,
                new_balance = new,
                error = %err,
                "balance history write failed, balance change kept"
            );
        }
    }

    /// Bumps `updated_at` without changing the balance.
    pub(crate) async fn touch(&self, account_id: Uuid) -> ResultEngine<()> {
        balances::Entity::update_many()
            .col_expr(balances::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(balances::Column::AccountId.eq(account_id.to_string()))
            .exec(&self.database)
            .await?;
        Ok(())
    }

    async fn stored_balance(&self, account_id: Uuid) -> ResultEngine<i64> {
        let model = balances::Entity::find_by_id(account_id.to_string())
            .one(&self.database)
            .await?;
        Ok(model.map_or(0, |m| m.balance))
    }

    /// Current balance of an account owned by `user_id` (0 before the first
    /// balance-affecting write).
    pub async fn balance(&self, account_id: Uuid, user_id: &str) -> ResultEngine<i64> {
        self.require_account(&self.database, account_id, user_id)
            .await?;
        self.stored_balance(account_id).await
    }

    /// History entries with `effective_date` in `range`, in insertion order.
    pub async fn balance_history(
        &self,
        account_id: Uuid,
        user_id: &str,
        range: &DateRange,
    ) -> ResultEngine<Vec<BalanceHistoryEntry>> {
        range.validate()?;
        self.require_account(&self.database, account_id, user_id)
            .await?;

        let mut query = balance_history::Entity::find()
            .filter(balance_history::Column::AccountId.eq(account_id.to_string()))
            .order_by_asc(balance_history::Column::Id);
        if let Some(from) = range.from {
            query = query.filter(balance_history::Column::EffectiveDate.gte(from));
        }
        if let Some(to) = range.to {
            query = query.filter(balance_history::Column::EffectiveDate.lt(to));
        }

        query
            .all(&self.database)
            .await?
            .into_iter()
            .map(BalanceHistoryEntry::try_from)
            .collect()
    }

    /// History entries, newest first, with cursor-based pagination.
    pub async fn balance_history_page(
        &self,
        account_id: Uuid,
        user_id: &str,
        range: &DateRange,
        limit: u64,
        cursor: Option<&str>,
    ) -> ResultEngine<(Vec<BalanceHistoryEntry>, Option<String>)> {
        range.validate()?;
        self.require_account(&self.database, account_id, user_id)
            .await?;

        let limit_plus_one = limit.saturating_add(1);
        let mut query = balance_history::Entity::find()
            .filter(balance_history::Column::AccountId.eq(account_id.to_string()))
            .order_by_desc(balance_history::Column::Id)
            .limit(limit_plus_one);
        if let Some(from) = range.from {
            query = query.filter(balance_history::Column::EffectiveDate.gte(from));
        }
        if let Some(to) = range.to {
            query = query.filter(balance_history::Column::EffectiveDate.lt(to));
        }
        if let Some(cursor) = cursor {
            let cursor = HistoryCursor::decode(cursor)?;
            query = query.filter(balance_history::Column::Id.lt(cursor.entry_id));
        }

        let rows = query.all(&self.database).await?;
        let has_more = rows.len() > limit as usize;

        let out = rows
            .into_iter()
            .take(limit as usize)
            .map(BalanceHistoryEntry::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;

        let next_cursor = if has_more {
            out.last()
                .map(|entry| HistoryCursor { entry_id: entry.id }.encode())
                .transpose()?
        } else {
            None
        };

        Ok((out, next_cursor))
    }

    /// Sets the balance to `target_minor`, logged as `manual_set`.
    pub async fn set_balance(
        &self,
        account_id: Uuid,
        user_id: &str,
        target_minor: i64,
    ) -> ResultEngine<i64> {
        self.adjust(Adjustment::to_target(
            account_id,
            user_id,
            target_minor,
            ChangeType::ManualSet,
            today(),
        ))
        .await
    }

    /// Aligns the balance with a bank statement, logged as `reconciliation`.
    pub async fn reconcile_to_statement(
        &self,
        account_id: Uuid,
        user_id: &str,
        statement_balance_minor: i64,
    ) -> ResultEngine<i64> {
        self.adjust(Adjustment::to_target(
            account_id,
            user_id,
            statement_balance_minor,
            ChangeType::Reconciliation,
            today(),
        ))
        .await
    }

    /// Replays the account history and compares it with the stored balance.
    pub async fn audit_account(&self, account_id: Uuid, user_id: &str) -> ResultEngine<BalanceAudit> {
        let stored_balance = self.balance(account_id, user_id).await?;
        let entries = self
            .balance_history(account_id, user_id, &DateRange::default())
            .await?;

        let history_net = checked_total(entries.iter().map(|e| e.change_amount))?;
        let deleted_expenses = checked_total(
            entries
                .iter()
                .filter(|e| e.change_type == ChangeType::TransactionDeleted)
                .map(|e| e.change_amount),
        )?;

        let confirmed = transactions::Entity::find()
            .filter(transactions::Column::AccountId.eq(account_id.to_string()))
            .filter(transactions::Column::IsDraft.eq(false))
            .all(&self.database)
            .await?;
        let live_expenses = checked_total(confirmed.iter().map(|m| m.amount_minor))?;

        let unlogged_expense_net = live_expenses
            .checked_neg()
            .and_then(|net| net.checked_sub(deleted_expenses))
            .ok_or_else(out_of_range)?;
        let expected_balance = history_net
            .checked_add(unlogged_expense_net)
            .ok_or_else(out_of_range)?;
        let broken_entries = entries
            .into_iter()
            .filter(|e| !e.is_consistent())
            .collect();

        Ok(BalanceAudit {
            account_id,
            stored_balance,
            history_net,
            unlogged_expense_net,
            expected_balance,
            drift: stored_balance
                .checked_sub(expected_balance)
                .ok_or_else(out_of_range)?,
            broken_entries,
        })
    }
}
