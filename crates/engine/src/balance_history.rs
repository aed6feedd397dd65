//! Append-only audit of balance changes.
//!
//! Every balance adjustment except `transaction_expense` leaves one entry
//! here. Entries are never updated or deleted.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, util::parse_uuid};

/// Why a balance changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    TransactionExpense,
    TransactionDeleted,
    TransferIn,
    TransferOut,
    InitialSet,
    ManualSet,
    ManualAdjustment,
    Reconciliation,
    Correction,
}

impl ChangeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TransactionExpense => "transaction_expense",
            Self::TransactionDeleted => "transaction_deleted",
            Self::TransferIn => "transfer_in",
            Self::TransferOut => "transfer_out",
            Self::InitialSet => "initial_set",
            Self::ManualSet => "manual_set",
            Self::ManualAdjustment => "manual_adjustment",
            Self::Reconciliation => "reconciliation",
            Self::Correction => "correction",
        }
    }

    /// Whether an adjustment of this type leaves a history entry.
    ///
    /// Expense deltas are applied silently; the audit derives them from the
    /// transactions table instead.
    pub fn is_logged(self) -> bool {
        !matches!(self, Self::TransactionExpense)
    }
}

impl TryFrom<&str> for ChangeType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "transaction_expense" => Ok(Self::TransactionExpense),
            "transaction_deleted" => Ok(Self::TransactionDeleted),
            "transfer_in" => Ok(Self::TransferIn),
            "transfer_out" => Ok(Self::TransferOut),
            "initial_set" => Ok(Self::InitialSet),
            "manual_set" => Ok(Self::ManualSet),
            "manual_adjustment" => Ok(Self::ManualAdjustment),
            "reconciliation" => Ok(Self::Reconciliation),
            "correction" => Ok(Self::Correction),
            other => Err(EngineError::InvalidAmount(format!(
                "invalid change type: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BalanceHistoryEntry {
    /// Insertion sequence; orders entries of the same account.
    pub id: i64,
    pub account_id: Uuid,
    pub owner_user_id: String,
    pub previous_balance: i64,
    pub new_balance: i64,
    pub change_amount: i64,
    pub change_type: ChangeType,
    pub reference_id: Option<Uuid>,
    pub effective_date: NaiveDate,
    pub recorded_at: DateTime<Utc>,
}

impl BalanceHistoryEntry {
    /// `new_balance = previous_balance + change_amount`.
    pub fn is_consistent(&self) -> bool {
        self.previous_balance.checked_add(self.change_amount) == Some(self.new_balance)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "balance_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub account_id: String,
    pub owner_user_id: String,
    pub previous_balance: i64,
    pub new_balance: i64,
    pub change_amount: i64,
    pub change_type: String,
    pub reference_id: Option<String>,
    pub effective_date: Date,
    pub recorded_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&BalanceHistoryEntry> for ActiveModel {
    fn from(entry: &BalanceHistoryEntry) -> Self {
        Self {
            id: ActiveValue::NotSet,
            account_id: ActiveValue::Set(entry.account_id.to_string()),
            owner_user_id: ActiveValue::Set(entry.owner_user_id.clone()),
            previous_balance: ActiveValue::Set(entry.previous_balance),
            new_balance: ActiveValue::Set(entry.new_balance),
            change_amount: ActiveValue::Set(entry.change_amount),
            change_type: ActiveValue::Set(entry.change_type.as_str().to_string()),
            reference_id: ActiveValue::Set(entry.reference_id.map(|id| id.to_string())),
            effective_date: ActiveValue::Set(entry.effective_date),
            recorded_at: ActiveValue::Set(entry.recorded_at),
        }
    }
}

impl TryFrom<Model> for BalanceHistoryEntry {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            account_id: parse_uuid(&model.account_id, "account")?,
            owner_user_id: model.owner_user_id,
            previous_balance: model.previous_balance,
            new_balance: model.new_balance,
            change_amount: model.change_amount,
            change_type: ChangeType::try_from(model.change_type.as_str())?,
            reference_id: model
                .reference_id
                .as_deref()
                .map(|id| parse_uuid(id, "reference"))
                .transpose()?,
            effective_date: model.effective_date,
            recorded_at: model.recorded_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_expenses_skip_the_log() {
        assert!(!ChangeType::TransactionExpense.is_logged());
        for kind in [
            ChangeType::TransactionDeleted,
            ChangeType::TransferIn,
            ChangeType::TransferOut,
            ChangeType::InitialSet,
            ChangeType::ManualSet,
            ChangeType::ManualAdjustment,
            ChangeType::Reconciliation,
            ChangeType::Correction,
        ] {
            assert!(kind.is_logged(), "{kind} should be logged");
            assert_eq!(ChangeType::try_from(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_change_type_is_rejected() {
        assert!(ChangeType::try_from("refund").is_err());
    }

    #[test]
    fn consistency_checks_arithmetic() {
        let mut entry = BalanceHistoryEntry {
            id: 1,
            account_id: Uuid::new_v4(),
            owner_user_id: "alice".to_string(),
            previous_balance: 100,
            new_balance: 70,
            change_amount: -30,
            change_type: ChangeType::Correction,
            reference_id: None,
            effective_date: NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
            recorded_at: Utc::now(),
        };
        assert!(entry.is_consistent());
        entry.new_balance = 71;
        assert!(!entry.is_consistent());
    }
}
