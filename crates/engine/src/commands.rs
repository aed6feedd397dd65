//! Command structs for engine operations.
//!
//! These types group parameters for write operations (transactions, transfers,
//! splits, accounts), keeping call sites readable and avoiding long argument
//! lists.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{AccountKind, Location};

/// Create a transaction (or a draft).
#[derive(Clone, Debug)]
pub struct CreateTransactionCmd {
    pub owner_user_id: String,
    pub account_id: Uuid,
    pub category_id: Uuid,
    pub subcategory_id: Option<Uuid>,
    pub amount_minor: i64,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub is_private: bool,
    pub split_requested: bool,
}

impl CreateTransactionCmd {
    #[must_use]
    pub fn new(
        owner_user_id: impl Into<String>,
        account_id: Uuid,
        category_id: Uuid,
        amount_minor: i64,
        date: NaiveDate,
    ) -> Self {
        Self {
            owner_user_id: owner_user_id.into(),
            account_id,
            category_id,
            subcategory_id: None,
            amount_minor,
            description: None,
            date,
            is_private: false,
            split_requested: false,
        }
    }

    #[must_use]
    pub fn subcategory_id(mut self, subcategory_id: Uuid) -> Self {
        self.subcategory_id = Some(subcategory_id);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn private(mut self, is_private: bool) -> Self {
        self.is_private = is_private;
        self
    }

    /// Ask the owner's household partner to share this bill.
    #[must_use]
    pub fn split(mut self, split_requested: bool) -> Self {
        self.split_requested = split_requested;
        self
    }
}

/// Update an existing transaction.
///
/// Only fields set to `Some` are changed. An empty `description` clears it.
#[derive(Clone, Debug)]
pub struct UpdateTransactionCmd {
    pub user_id: String,
    pub transaction_id: Uuid,
    pub amount_minor: Option<i64>,
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub subcategory_id: Option<Uuid>,
}

impl UpdateTransactionCmd {
    #[must_use]
    pub fn new(user_id: impl Into<String>, transaction_id: Uuid) -> Self {
        Self {
            user_id: user_id.into(),
            transaction_id,
            amount_minor: None,
            date: None,
            description: None,
            category_id: None,
            subcategory_id: None,
        }
    }

    #[must_use]
    pub fn amount_minor(mut self, amount_minor: i64) -> Self {
        self.amount_minor = Some(amount_minor);
        self
    }

    #[must_use]
    pub fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn category_id(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }

    #[must_use]
    pub fn subcategory_id(mut self, subcategory_id: Uuid) -> Self {
        self.subcategory_id = Some(subcategory_id);
        self
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.amount_minor.is_none()
            && self.date.is_none()
            && self.description.is_none()
            && self.category_id.is_none()
            && self.subcategory_id.is_none()
    }
}

/// Move money between two accounts of the same user.
#[derive(Clone, Debug)]
pub struct CreateTransferCmd {
    pub owner_user_id: String,
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount_minor: i64,
    pub description: Option<String>,
    pub date: NaiveDate,
}

impl CreateTransferCmd {
    #[must_use]
    pub fn new(
        owner_user_id: impl Into<String>,
        from_account_id: Uuid,
        to_account_id: Uuid,
        amount_minor: i64,
        date: NaiveDate,
    ) -> Self {
        Self {
            owner_user_id: owner_user_id.into(),
            from_account_id,
            to_account_id,
            amount_minor,
            description: None,
            date,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Update an existing transfer. Accounts cannot be changed.
#[derive(Clone, Debug)]
pub struct UpdateTransferCmd {
    pub user_id: String,
    pub transfer_id: Uuid,
    pub amount_minor: Option<i64>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
}

impl UpdateTransferCmd {
    #[must_use]
    pub fn new(user_id: impl Into<String>, transfer_id: Uuid) -> Self {
        Self {
            user_id: user_id.into(),
            transfer_id,
            amount_minor: None,
            description: None,
            date: None,
        }
    }

    #[must_use]
    pub fn amount_minor(mut self, amount_minor: i64) -> Self {
        self.amount_minor = Some(amount_minor);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}

/// The collaborator confirms their portion of a shared bill.
#[derive(Clone, Debug)]
pub struct CompleteSplitCmd {
    pub collaborator_user_id: String,
    pub transaction_id: Uuid,
    pub account_id: Uuid,
    pub category_id: Uuid,
    pub amount_minor: i64,
    pub description: Option<String>,
    pub date: NaiveDate,
}

impl CompleteSplitCmd {
    #[must_use]
    pub fn new(
        collaborator_user_id: impl Into<String>,
        transaction_id: Uuid,
        account_id: Uuid,
        category_id: Uuid,
        amount_minor: i64,
        date: NaiveDate,
    ) -> Self {
        Self {
            collaborator_user_id: collaborator_user_id.into(),
            transaction_id,
            account_id,
            category_id,
            amount_minor,
            description: None,
            date,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Open a new account.
#[derive(Clone, Debug)]
pub struct NewAccountCmd {
    pub owner_user_id: String,
    pub name: String,
    pub kind: AccountKind,
    pub location: Option<Location>,
    /// Logged as `initial_set` when non-zero.
    pub opening_balance_minor: i64,
}

impl NewAccountCmd {
    #[must_use]
    pub fn new(owner_user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner_user_id: owner_user_id.into(),
            name: name.into(),
            kind: AccountKind::Expense,
            location: None,
            opening_balance_minor: 0,
        }
    }

    #[must_use]
    pub fn kind(mut self, kind: AccountKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    #[must_use]
    pub fn opening_balance(mut self, opening_balance_minor: i64) -> Self {
        self.opening_balance_minor = opening_balance_minor;
        self
    }
}
