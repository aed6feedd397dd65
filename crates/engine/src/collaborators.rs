//! Services the ledger consults but does not own.
//!
//! The engine talks to them only through these traits. Each has a
//! database-backed default which [`EngineBuilder`] installs unless an
//! override is supplied.
//!
//! [`EngineBuilder`]: crate::EngineBuilder

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{Condition, DatabaseConnection, QueryFilter, QueryOrder, prelude::*};
use uuid::Uuid;

use crate::{
    HouseholdLink, Notification, NotificationKind, ResultEngine, accounts, categories,
    household_links, notifications,
};

/// The other side of a user's household link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HouseholdPartner {
    pub partner_user_id: String,
    pub active: bool,
}

#[async_trait]
pub trait HouseholdLinkResolver: Send + Sync {
    /// The user's most relevant link: the active one if any, otherwise the
    /// most recent inactive one.
    async fn resolve_partner(&self, user_id: &str) -> ResultEngine<Option<HouseholdPartner>>;
}

/// Fire-and-forget notification delivery.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        user_id: &str,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) -> ResultEngine<()>;
}

#[async_trait]
pub trait OwnershipValidator: Send + Sync {
    async fn owns_account(&self, user_id: &str, account_id: Uuid) -> ResultEngine<bool>;

    /// True for a top-level category owned by the user.
    async fn owns_category(&self, user_id: &str, category_id: Uuid) -> ResultEngine<bool>;

    /// True when `subcategory_id` is owned by the user and is a child of
    /// `category_id`.
    async fn owns_subcategory(
        &self,
        user_id: &str,
        category_id: Uuid,
        subcategory_id: Uuid,
    ) -> ResultEngine<bool>;
}

/// Reads `household_links`.
#[derive(Clone, Debug)]
pub struct DbHouseholdLinks {
    database: DatabaseConnection,
}

impl DbHouseholdLinks {
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }
}

#[async_trait]
impl HouseholdLinkResolver for DbHouseholdLinks {
    async fn resolve_partner(&self, user_id: &str) -> ResultEngine<Option<HouseholdPartner>> {
        let model = household_links::Entity::find()
            .filter(
                Condition::any()
                    .add(household_links::Column::OwnerUserId.eq(user_id))
                    .add(household_links::Column::PartnerUserId.eq(user_id)),
            )
            .order_by_desc(household_links::Column::Active)
            .order_by_desc(household_links::Column::CreatedAt)
            .one(&self.database)
            .await?;
        let Some(model) = model else {
            return Ok(None);
        };
        let link = HouseholdLink::try_from(model)?;
        Ok(link.other_side(user_id).map(|partner| HouseholdPartner {
            partner_user_id: partner.to_string(),
            active: link.active,
        }))
    }
}

/// Appends to the `notifications` outbox table.
#[derive(Clone, Debug)]
pub struct OutboxNotifier {
    database: DatabaseConnection,
}

impl OutboxNotifier {
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }
}

#[async_trait]
impl NotificationSink for OutboxNotifier {
    async fn notify(
        &self,
        user_id: &str,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) -> ResultEngine<()> {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            kind,
            payload,
            created_at: Utc::now(),
        };
        notifications::ActiveModel::from(&notification)
            .insert(&self.database)
            .await?;
        Ok(())
    }
}

/// Checks ownership against `accounts` and `categories`.
#[derive(Clone, Debug)]
pub struct DbOwnership {
    database: DatabaseConnection,
}

impl DbOwnership {
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }
}

#[async_trait]
impl OwnershipValidator for DbOwnership {
    async fn owns_account(&self, user_id: &str, account_id: Uuid) -> ResultEngine<bool> {
        let model = accounts::Entity::find_by_id(account_id.to_string())
            .filter(accounts::Column::OwnerUserId.eq(user_id))
            .one(&self.database)
            .await?;
        Ok(model.is_some())
    }

    async fn owns_category(&self, user_id: &str, category_id: Uuid) -> ResultEngine<bool> {
        let model = categories::Entity::find_by_id(category_id.to_string())
            .filter(categories::Column::OwnerUserId.eq(user_id))
            .filter(categories::Column::ParentId.is_null())
            .one(&self.database)
            .await?;
        Ok(model.is_some())
    }

    async fn owns_subcategory(
        &self,
        user_id: &str,
        category_id: Uuid,
        subcategory_id: Uuid,
    ) -> ResultEngine<bool> {
        let model = categories::Entity::find_by_id(subcategory_id.to_string())
            .filter(categories::Column::OwnerUserId.eq(user_id))
            .filter(categories::Column::ParentId.eq(category_id.to_string()))
            .one(&self.database)
            .await?;
        Ok(model.is_some())
    }
}
