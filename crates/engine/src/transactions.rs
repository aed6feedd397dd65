//! Transaction primitives.
//!
//! A `Transaction` is a user-entered expense on one account. A confirmed
//! transaction lowers the account balance by `amount_minor`; a draft has no
//! balance effect until it is confirmed.
//!
//! A transaction may be shared with the owner's household partner. The split
//! columns of a row are folded into a single [`SplitState`] so that invalid
//! combinations cannot reach the rest of the engine.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

/// The collaborator's side of a completed split.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedSplit {
    pub collaborator: String,
    pub account_id: Uuid,
    pub amount_minor: i64,
    pub description: Option<String>,
    /// The collaborator's own portion transaction.
    pub portion_transaction_id: Uuid,
    pub completed_at: DateTime<Utc>,
}

/// Lifecycle of a shared bill.
///
/// `NotShared` and `Requested` move to `Completed` when the collaborator
/// confirms their portion. Deleting the bill reverses it (see
/// [`SplitReversal`]).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SplitState {
    NotShared,
    Requested { collaborator: String },
    Completed(CompletedSplit),
}

impl SplitState {
    pub fn collaborator(&self) -> Option<&str> {
        match self {
            Self::NotShared => None,
            Self::Requested { collaborator } => Some(collaborator),
            Self::Completed(split) => Some(&split.collaborator),
        }
    }

    pub fn is_shared(&self) -> bool {
        !matches!(self, Self::NotShared)
    }
}

/// Which balances were restored when a transaction was deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitReversal {
    /// Only the owner's account (or nothing, for a draft).
    OwnerOnly,
    /// The owner's account and the collaborator's portion.
    BothLegs,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub id: Uuid,
    pub account_id: Uuid,
    pub owner_user_id: String,
    pub amount_minor: i64,
    pub category_id: Uuid,
    pub subcategory_id: Option<Uuid>,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub is_draft: bool,
    pub is_private: bool,
    pub split: SplitState,
    /// Set on a collaborator's portion, pointing at the shared bill.
    pub split_parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        owner_user_id: String,
        account_id: Uuid,
        category_id: Uuid,
        subcategory_id: Option<Uuid>,
        amount_minor: i64,
        description: Option<String>,
        date: NaiveDate,
        is_private: bool,
    ) -> ResultEngine<Self> {
        if amount_minor <= 0 {
            return Err(EngineError::InvalidAmount(
                "amount_minor must be > 0".to_string(),
            ));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            account_id,
            owner_user_id,
            amount_minor,
            category_id,
            subcategory_id,
            description,
            date,
            is_draft: false,
            is_private,
            split: SplitState::NotShared,
            split_parent_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_split_portion(&self) -> bool {
        self.split_parent_id.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub account_id: String,
    pub owner_user_id: String,
    pub amount_minor: i64,
    pub category_id: String,
    pub subcategory_id: Option<String>,
    pub description: Option<String>,
    pub date: Date,
    pub is_draft: bool,
    pub is_private: bool,
    pub split_requested: bool,
    pub collaborator_id: Option<String>,
    pub collaborator_account_id: Option<String>,
    pub collaborator_amount: Option<i64>,
    pub collaborator_description: Option<String>,
    pub collaborator_transaction_id: Option<String>,
    pub split_completed_at: Option<DateTimeUtc>,
    pub split_parent_id: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id"
    )]
    Account,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        let (collaborator_id, completed) = match &tx.split {
            SplitState::NotShared => (None, None),
            SplitState::Requested { collaborator } => (Some(collaborator.clone()), None),
            SplitState::Completed(split) => (Some(split.collaborator.clone()), Some(split)),
        };
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            account_id: ActiveValue::Set(tx.account_id.to_string()),
            owner_user_id: ActiveValue::Set(tx.owner_user_id.clone()),
            amount_minor: ActiveValue::Set(tx.amount_minor),
            category_id: ActiveValue::Set(tx.category_id.to_string()),
            subcategory_id: ActiveValue::Set(tx.subcategory_id.map(|id| id.to_string())),
            description: ActiveValue::Set(tx.description.clone()),
            date: ActiveValue::Set(tx.date),
            is_draft: ActiveValue::Set(tx.is_draft),
            is_private: ActiveValue::Set(tx.is_private),
            split_requested: ActiveValue::Set(tx.split.is_shared()),
            collaborator_id: ActiveValue::Set(collaborator_id),
            collaborator_account_id: ActiveValue::Set(
                completed.map(|split| split.account_id.to_string()),
            ),
            collaborator_amount: ActiveValue::Set(completed.map(|split| split.amount_minor)),
            collaborator_description: ActiveValue::Set(
                completed.and_then(|split| split.description.clone()),
            ),
            collaborator_transaction_id: ActiveValue::Set(
                completed.map(|split| split.portion_transaction_id.to_string()),
            ),
            split_completed_at: ActiveValue::Set(completed.map(|split| split.completed_at)),
            split_parent_id: ActiveValue::Set(tx.split_parent_id.map(|id| id.to_string())),
            created_at: ActiveValue::Set(tx.created_at),
            updated_at: ActiveValue::Set(tx.updated_at),
        }
    }
}

fn split_state_from_model(model: &Model) -> ResultEngine<SplitState> {
    let invalid = |reason: &str| {
        EngineError::InvalidSplitState(format!("transaction {}: {reason}", model.id))
    };

    if !model.split_requested {
        if model.collaborator_id.is_some()
            || model.collaborator_account_id.is_some()
            || model.collaborator_amount.is_some()
            || model.collaborator_transaction_id.is_some()
            || model.split_completed_at.is_some()
        {
            return Err(invalid("split fields set on a transaction that is not shared"));
        }
        return Ok(SplitState::NotShared);
    }

    let collaborator = model
        .collaborator_id
        .clone()
        .ok_or_else(|| invalid("split requested without a collaborator"))?;

    let Some(completed_at) = model.split_completed_at else {
        if model.collaborator_account_id.is_some()
            || model.collaborator_amount.is_some()
            || model.collaborator_transaction_id.is_some()
        {
            return Err(invalid("collaborator portion set before completion"));
        }
        return Ok(SplitState::Requested { collaborator });
    };

    match (
        model.collaborator_account_id.as_deref(),
        model.collaborator_amount,
        model.collaborator_transaction_id.as_deref(),
    ) {
        (Some(account_id), Some(amount_minor), Some(portion_id)) => {
            Ok(SplitState::Completed(CompletedSplit {
                collaborator,
                account_id: parse_uuid(account_id, "collaborator account")?,
                amount_minor,
                description: model.collaborator_description.clone(),
                portion_transaction_id: parse_uuid(portion_id, "portion transaction")?,
                completed_at,
            }))
        }
        _ => Err(invalid("completed split is missing the collaborator portion")),
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let split = split_state_from_model(&model)?;
        Ok(Self {
            id: parse_uuid(&model.id, "transaction")?,
            account_id: parse_uuid(&model.account_id, "account")?,
            owner_user_id: model.owner_user_id,
            amount_minor: model.amount_minor,
            category_id: parse_uuid(&model.category_id, "category")?,
            subcategory_id: model
                .subcategory_id
                .as_deref()
                .map(|id| parse_uuid(id, "subcategory"))
                .transpose()?,
            description: model.description,
            date: model.date,
            is_draft: model.is_draft,
            is_private: model.is_private,
            split,
            split_parent_id: model
                .split_parent_id
                .as_deref()
                .map(|id| parse_uuid(id, "split parent"))
                .transpose()?,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bill() -> Transaction {
        Transaction::new(
            "alice".to_string(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            None,
            4_000,
            Some("groceries".to_string()),
            NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            false,
        )
        .unwrap()
    }

    fn model_of(tx: &Transaction) -> Model {
        let am = ActiveModel::from(tx);
        Model {
            id: am.id.unwrap(),
            account_id: am.account_id.unwrap(),
            owner_user_id: am.owner_user_id.unwrap(),
            amount_minor: am.amount_minor.unwrap(),
            category_id: am.category_id.unwrap(),
            subcategory_id: am.subcategory_id.unwrap(),
            description: am.description.unwrap(),
            date: am.date.unwrap(),
            is_draft: am.is_draft.unwrap(),
            is_private: am.is_private.unwrap(),
            split_requested: am.split_requested.unwrap(),
            collaborator_id: am.collaborator_id.unwrap(),
            collaborator_account_id: am.collaborator_account_id.unwrap(),
            collaborator_amount: am.collaborator_amount.unwrap(),
            collaborator_description: am.collaborator_description.unwrap(),
            collaborator_transaction_id: am.collaborator_transaction_id.unwrap(),
            split_completed_at: am.split_completed_at.unwrap(),
            split_parent_id: am.split_parent_id.unwrap(),
            created_at: am.created_at.unwrap(),
            updated_at: am.updated_at.unwrap(),
        }
    }

    #[test]
    fn rejects_non_positive_amounts() {
        let err = Transaction::new(
            "alice".to_string(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            None,
            0,
            None,
            NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));
    }

    #[test]
    fn completed_split_survives_the_row_mapping() {
        let mut tx = bill();
        tx.split = SplitState::Completed(CompletedSplit {
            collaborator: "bob".to_string(),
            account_id: Uuid::new_v4(),
            amount_minor: 2_000,
            description: Some("my half".to_string()),
            portion_transaction_id: Uuid::new_v4(),
            completed_at: Utc::now(),
        });
        let back = Transaction::try_from(model_of(&tx)).unwrap();
        assert_eq!(back.split, tx.split);
    }

    #[test]
    fn amount_without_completion_is_invalid() {
        let mut tx = bill();
        tx.split = SplitState::Requested {
            collaborator: "bob".to_string(),
        };
        let mut model = model_of(&tx);
        model.collaborator_amount = Some(2_000);
        let err = Transaction::try_from(model).unwrap_err();
        assert!(matches!(err, EngineError::InvalidSplitState(_)));
    }

    #[test]
    fn completion_without_portion_is_invalid() {
        let mut tx = bill();
        tx.split = SplitState::Requested {
            collaborator: "bob".to_string(),
        };
        let mut model = model_of(&tx);
        model.split_completed_at = Some(Utc::now());
        let err = Transaction::try_from(model).unwrap_err();
        assert!(matches!(err, EngineError::InvalidSplitState(_)));
    }

    #[test]
    fn collaborator_without_request_is_invalid() {
        let mut model = model_of(&bill());
        model.collaborator_id = Some("bob".to_string());
        let err = Transaction::try_from(model).unwrap_err();
        assert!(matches!(err, EngineError::InvalidSplitState(_)));
    }
}
