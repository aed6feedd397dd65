//! Household links between two users.
//!
//! A link is stored once, from the user who created it. Either side can read
//! it; at most one active link exists per user.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use crate::{EngineError, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HouseholdLink {
    pub id: Uuid,
    pub owner_user_id: String,
    pub partner_user_id: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl HouseholdLink {
    pub fn new(owner_user_id: String, partner_user_id: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_user_id,
            partner_user_id,
            active: true,
            created_at: Utc::now(),
        }
    }

    /// The other side of the link as seen from `user_id`.
    pub fn other_side(&self, user_id: &str) -> Option<&str> {
        if self.owner_user_id == user_id {
            Some(&self.partner_user_id)
        } else if self.partner_user_id == user_id {
            Some(&self.owner_user_id)
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "household_links")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub owner_user_id: String,
    pub partner_user_id: String,
    pub active: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&HouseholdLink> for ActiveModel {
    fn from(link: &HouseholdLink) -> Self {
        Self {
            id: ActiveValue::Set(link.id.to_string()),
            owner_user_id: ActiveValue::Set(link.owner_user_id.clone()),
            partner_user_id: ActiveValue::Set(link.partner_user_id.clone()),
            active: ActiveValue::Set(link.active),
            created_at: ActiveValue::Set(link.created_at),
        }
    }
}

impl TryFrom<Model> for HouseholdLink {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "household link")?,
            owner_user_id: model.owner_user_id,
            partner_user_id: model.partner_user_id,
            active: model.active,
            created_at: model.created_at,
        })
    }
}
