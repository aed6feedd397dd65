//! Notification outbox.
//!
//! The engine never delivers notifications; it appends them here (through the
//! default [`NotificationSink`]) and a delivery process reads them.
//!
//! [`NotificationSink`]: crate::NotificationSink

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A partner asked the recipient to share a bill.
    SplitBillRequest,
    /// The partner confirmed their portion of the recipient's bill.
    SplitBillCompleted,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SplitBillRequest => "split_bill_request",
            Self::SplitBillCompleted => "split_bill_completed",
        }
    }
}

impl TryFrom<&str> for NotificationKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "split_bill_request" => Ok(Self::SplitBillRequest),
            "split_bill_completed" => Ok(Self::SplitBillCompleted),
            other => Err(EngineError::InvalidId(format!(
                "invalid notification kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: String,
    pub kind: NotificationKind,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub payload: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Notification> for ActiveModel {
    fn from(notification: &Notification) -> Self {
        Self {
            id: ActiveValue::Set(notification.id.to_string()),
            user_id: ActiveValue::Set(notification.user_id.clone()),
            kind: ActiveValue::Set(notification.kind.as_str().to_string()),
            payload: ActiveValue::Set(notification.payload.to_string()),
            created_at: ActiveValue::Set(notification.created_at),
        }
    }
}

impl TryFrom<Model> for Notification {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let payload = serde_json::from_str(&model.payload).map_err(|_| {
            EngineError::InvalidId(format!("invalid payload for notification {}", model.id))
        })?;
        Ok(Self {
            id: parse_uuid(&model.id, "notification")?,
            user_id: model.user_id,
            kind: NotificationKind::try_from(model.kind.as_str())?,
            payload,
            created_at: model.created_at,
        })
    }
}
