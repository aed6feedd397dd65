//! The module contains `Account` struct and its implementation.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, util::parse_uuid};

/// What an account is used for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Income,
    Expense,
}

impl AccountKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl TryFrom<&str> for AccountKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            other => Err(EngineError::InvalidAccount(format!(
                "invalid account kind: {other}"
            ))),
        }
    }
}

/// Optional place attached to an account (a shop, a bank branch).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub place_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A place where money is kept, owned by exactly one user.
///
/// The balance is not part of the account: it lives in `account_balances`
/// and only changes through balance adjustments.
#[derive(Clone, Debug, PartialEq)]
pub struct Account {
    pub id: Uuid,
    pub owner_user_id: String,
    pub name: String,
    pub kind: AccountKind,
    pub location: Option<Location>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(
        owner_user_id: String,
        name: String,
        kind: AccountKind,
        location: Option<Location>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_user_id,
            name,
            kind,
            location,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub owner_user_id: String,
    pub name: String,
    pub kind: String,
    pub place_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Account> for ActiveModel {
    fn from(account: &Account) -> Self {
        let location = account.location.as_ref();
        Self {
            id: ActiveValue::Set(account.id.to_string()),
            owner_user_id: ActiveValue::Set(account.owner_user_id.clone()),
            name: ActiveValue::Set(account.name.clone()),
            kind: ActiveValue::Set(account.kind.as_str().to_string()),
            place_name: ActiveValue::Set(location.and_then(|l| l.place_name.clone())),
            latitude: ActiveValue::Set(location.and_then(|l| l.latitude)),
            longitude: ActiveValue::Set(location.and_then(|l| l.longitude)),
            created_at: ActiveValue::Set(account.created_at),
        }
    }
}

impl TryFrom<Model> for Account {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let location = if model.place_name.is_some()
            || model.latitude.is_some()
            || model.longitude.is_some()
        {
            Some(Location {
                place_name: model.place_name,
                latitude: model.latitude,
                longitude: model.longitude,
            })
        } else {
            None
        };
        Ok(Self {
            id: parse_uuid(&model.id, "account")?,
            owner_user_id: model.owner_user_id,
            name: model.name,
            kind: AccountKind::try_from(model.kind.as_str())?,
            location,
            created_at: model.created_at,
        })
    }
}
