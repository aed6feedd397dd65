//! The module contains `Transfer` struct and its implementation.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

/// A movement of funds between two accounts of the same user.
///
/// Creating one debits `from_account_id` and credits `to_account_id` by the
/// same amount, so the owner's total never changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub id: Uuid,
    pub owner_user_id: String,
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount_minor: i64,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transfer {
    pub fn new(
        owner_user_id: String,
        from_account_id: Uuid,
        to_account_id: Uuid,
        amount_minor: i64,
        description: Option<String>,
        date: NaiveDate,
    ) -> ResultEngine<Self> {
        if amount_minor <= 0 {
            return Err(EngineError::InvalidAmount(
                "amount_minor must be > 0".to_string(),
            ));
        }
        if from_account_id == to_account_id {
            return Err(EngineError::InvalidAccount(
                "from and to accounts must differ".to_string(),
            ));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            owner_user_id,
            from_account_id,
            to_account_id,
            amount_minor,
            description,
            date,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transfers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub owner_user_id: String,
    pub from_account_id: String,
    pub to_account_id: String,
    pub amount_minor: i64,
    pub description: Option<String>,
    pub date: Date,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transfer> for ActiveModel {
    fn from(transfer: &Transfer) -> Self {
        Self {
            id: ActiveValue::Set(transfer.id.to_string()),
            owner_user_id: ActiveValue::Set(transfer.owner_user_id.clone()),
            from_account_id: ActiveValue::Set(transfer.from_account_id.to_string()),
            to_account_id: ActiveValue::Set(transfer.to_account_id.to_string()),
            amount_minor: ActiveValue::Set(transfer.amount_minor),
            description: ActiveValue::Set(transfer.description.clone()),
            date: ActiveValue::Set(transfer.date),
            created_at: ActiveValue::Set(transfer.created_at),
            updated_at: ActiveValue::Set(transfer.updated_at),
        }
    }
}

impl TryFrom<Model> for Transfer {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "transfer")?,
            owner_user_id: model.owner_user_id,
            from_account_id: parse_uuid(&model.from_account_id, "account")?,
            to_account_id: parse_uuid(&model.to_account_id, "account")?,
            amount_minor: model.amount_minor,
            description: model.description,
            date: model.date,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
