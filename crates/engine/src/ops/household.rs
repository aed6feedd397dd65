use sea_orm::{Condition, QueryFilter, QueryOrder, TransactionTrait, prelude::*, sea_query::Expr};

use crate::{
    EngineError, HouseholdLink, Notification, ResultEngine, household_links, notifications, users,
};

use super::{Engine, with_tx};

impl Engine {
    /// Links two users into a household. Neither may already have an active
    /// link.
    pub async fn link_household(
        &self,
        user_id: &str,
        partner_user_id: &str,
    ) -> ResultEngine<HouseholdLink> {
        if user_id == partner_user_id {
            return Err(EngineError::InvalidId(
                "a user cannot link with themselves".to_string(),
            ));
        }
        let link: HouseholdLink = with_tx!(self, |db_tx| {
            // No-op write on both user rows: a concurrent link naming either
            // user waits here until this one commits.
            users::Entity::update_many()
                .col_expr(users::Column::Username, Expr::col(users::Column::Username).into())
                .filter(users::Column::Username.is_in([user_id, partner_user_id]))
                .exec(&db_tx)
                .await?;
            self.require_user(&db_tx, user_id).await?;
            self.require_user(&db_tx, partner_user_id).await?;

            for side in [user_id, partner_user_id] {
                if self.active_link(&db_tx, side).await?.is_some() {
                    return Err(EngineError::ExistingKey(format!(
                        "household link for {side}"
                    )));
                }
            }

            let link = HouseholdLink::new(user_id.to_string(), partner_user_id.to_string());
            household_links::ActiveModel::from(&link)
                .insert(&db_tx)
                .await?;
            Ok::<_, EngineError>(link)
        })?;
        tracing::info!(link_id = %link.id, "household link created");
        Ok(link)
    }

    /// Deactivates the user's active link. Pending split requests stay
    /// pending but can no longer be completed.
    pub async fn unlink_household(&self, user_id: &str) -> ResultEngine<()> {
        let link = self
            .active_link(&self.database, user_id)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("household link not exists".to_string()))?;
        household_links::Entity::update_many()
            .col_expr(household_links::Column::Active, Expr::value(false))
            .filter(household_links::Column::Id.eq(link.id.to_string()))
            .exec(&self.database)
            .await?;
        tracing::info!(link_id = %link.id, "household link deactivated");
        Ok(())
    }

    /// The user's active link, from either side.
    pub async fn household_link(&self, user_id: &str) -> ResultEngine<Option<HouseholdLink>> {
        self.active_link(&self.database, user_id).await
    }

    async fn active_link<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: &str,
    ) -> ResultEngine<Option<HouseholdLink>> {
        household_links::Entity::find()
            .filter(household_links::Column::Active.eq(true))
            .filter(
                Condition::any()
                    .add(household_links::Column::OwnerUserId.eq(user_id))
                    .add(household_links::Column::PartnerUserId.eq(user_id)),
            )
            .one(db)
            .await?
            .map(HouseholdLink::try_from)
            .transpose()
    }

    /// Outbox entries addressed to the user, oldest first.
    pub async fn notifications(&self, user_id: &str) -> ResultEngine<Vec<Notification>> {
        notifications::Entity::find()
            .filter(notifications::Column::UserId.eq(user_id))
            .order_by_asc(notifications::Column::CreatedAt)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Notification::try_from)
            .collect()
    }
}
