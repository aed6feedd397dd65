//! Request and response bodies of the HTTP API.
//!
//! Amounts are signed minor units (cents). Dates are `YYYY-MM-DD`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod account {
    use super::*;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum AccountKind {
        Income,
        #[default]
        Expense,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountNew {
        pub name: String,
        #[serde(default)]
        pub kind: AccountKind,
        pub place_name: Option<String>,
        pub latitude: Option<f64>,
        pub longitude: Option<f64>,
        /// Logged as `initial_set` when non-zero.
        #[serde(default)]
        pub opening_balance_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountView {
        pub id: Uuid,
        pub name: String,
        pub kind: AccountKind,
        pub place_name: Option<String>,
        pub latitude: Option<f64>,
        pub longitude: Option<f64>,
        pub created_at: DateTime<Utc>,
    }
}

pub mod category {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryNew {
        pub name: String,
        /// Makes this a subcategory of a top-level category.
        pub parent_id: Option<Uuid>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryView {
        pub id: Uuid,
        pub name: String,
        pub parent_id: Option<Uuid>,
    }
}

pub mod balance {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BalanceView {
        pub account_id: Uuid,
        pub balance_minor: i64,
    }

    /// `PUT /accounts/{id}/balance`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct BalanceSet {
        pub balance_minor: i64,
    }

    /// `POST /accounts/{id}/reconcile`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct StatementReconcile {
        pub statement_balance_minor: i64,
    }

    /// Query string of `GET /accounts/{id}/history`. `from` inclusive, `to`
    /// exclusive.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct HistoryQuery {
        pub from: Option<NaiveDate>,
        pub to: Option<NaiveDate>,
        pub limit: Option<u64>,
        pub cursor: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct HistoryEntryView {
        pub id: i64,
        pub previous_balance_minor: i64,
        pub new_balance_minor: i64,
        pub change_amount_minor: i64,
        /// `transfer_in`, `manual_set`, ...
        pub change_type: String,
        pub reference_id: Option<Uuid>,
        pub effective_date: NaiveDate,
        pub recorded_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct HistoryPage {
        pub entries: Vec<HistoryEntryView>,
        pub next_cursor: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AuditView {
        pub account_id: Uuid,
        pub stored_balance_minor: i64,
        pub history_net_minor: i64,
        pub unlogged_expense_net_minor: i64,
        pub expected_balance_minor: i64,
        pub drift_minor: i64,
        pub broken_entries: Vec<HistoryEntryView>,
    }
}

pub mod transaction {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionNew {
        pub account_id: Uuid,
        pub category_id: Uuid,
        pub subcategory_id: Option<Uuid>,
        pub amount_minor: i64,
        pub description: Option<String>,
        pub date: NaiveDate,
        #[serde(default)]
        pub is_private: bool,
        #[serde(default)]
        pub split_requested: bool,
    }

    /// Only the fields present are changed.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct TransactionUpdate {
        pub amount_minor: Option<i64>,
        pub date: Option<NaiveDate>,
        pub description: Option<String>,
        pub category_id: Option<Uuid>,
        pub subcategory_id: Option<Uuid>,
    }

    /// Query string of `GET /transactions`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionListQuery {
        pub account_id: Uuid,
        pub from: Option<NaiveDate>,
        pub to: Option<NaiveDate>,
        #[serde(default)]
        pub include_drafts: bool,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum SplitStatus {
        NotShared,
        Requested,
        Completed,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SplitView {
        pub status: SplitStatus,
        pub collaborator: Option<String>,
        pub collaborator_amount_minor: Option<i64>,
        pub collaborator_transaction_id: Option<Uuid>,
        pub completed_at: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionView {
        pub id: Uuid,
        pub account_id: Uuid,
        pub owner: String,
        pub amount_minor: i64,
        pub category_id: Uuid,
        pub subcategory_id: Option<Uuid>,
        pub description: Option<String>,
        pub date: NaiveDate,
        pub is_draft: bool,
        pub is_private: bool,
        pub split: SplitView,
        pub split_parent_id: Option<Uuid>,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Reversal {
        OwnerOnly,
        BothLegs,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionDeleted {
        pub id: Uuid,
        pub reversal: Reversal,
    }
}

pub mod transfer {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransferNew {
        pub from_account_id: Uuid,
        pub to_account_id: Uuid,
        pub amount_minor: i64,
        pub description: Option<String>,
        pub date: NaiveDate,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct TransferUpdate {
        pub amount_minor: Option<i64>,
        pub description: Option<String>,
        pub date: Option<NaiveDate>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct TransferListQuery {
        pub from: Option<NaiveDate>,
        pub to: Option<NaiveDate>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransferView {
        pub id: Uuid,
        pub from_account_id: Uuid,
        pub to_account_id: Uuid,
        pub amount_minor: i64,
        pub description: Option<String>,
        pub date: NaiveDate,
    }
}

pub mod split {
    use super::*;

    /// `POST /splits/{id}/complete`, sent by the collaborator.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct SplitComplete {
        pub account_id: Uuid,
        pub category_id: Uuid,
        pub amount_minor: i64,
        pub description: Option<String>,
        pub date: NaiveDate,
    }
}

pub mod household {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct HouseholdLinkNew {
        pub partner: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct HouseholdLinkView {
        pub id: Uuid,
        pub owner: String,
        pub partner: String,
        pub active: bool,
        pub created_at: DateTime<Utc>,
    }
}

pub mod notification {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct NotificationView {
        pub id: Uuid,
        /// `split_bill_request` or `split_bill_completed`.
        pub kind: String,
        pub payload: serde_json::Value,
        pub created_at: DateTime<Utc>,
    }
}
