use sea_orm::{ConnectionTrait, QueryFilter, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine, Transaction, Transfer, accounts, transactions, transfers, users,
};

use super::Engine;

impl Engine {
    /// The account, if `user_id` owns it. Anything else is `KeyNotFound`.
    pub(super) async fn require_account<C: ConnectionTrait>(
        &self,
        db: &C,
        account_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<accounts::Model> {
        accounts::Entity::find_by_id(account_id.to_string())
            .filter(accounts::Column::OwnerUserId.eq(user_id))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("account not exists".to_string()))
    }

    pub(super) async fn require_transaction<C: ConnectionTrait>(
        &self,
        db: &C,
        transaction_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Transaction> {
        let model = transactions::Entity::find_by_id(transaction_id.to_string())
            .filter(transactions::Column::OwnerUserId.eq(user_id))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("transaction not exists".to_string()))?;
        Transaction::try_from(model)
    }

    pub(super) async fn require_transfer<C: ConnectionTrait>(
        &self,
        db: &C,
        transfer_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Transfer> {
        let model = transfers::Entity::find_by_id(transfer_id.to_string())
            .filter(transfers::Column::OwnerUserId.eq(user_id))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("transfer not exists".to_string()))?;
        Transfer::try_from(model)
    }

    pub(super) async fn require_user<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: &str,
    ) -> ResultEngine<()> {
        users::Entity::find_by_id(user_id.to_string())
            .one(db)
            .await?
            .map(|_| ())
            .ok_or_else(|| EngineError::KeyNotFound(format!("user {user_id} not exists")))
    }

    /// Input validation through the ownership collaborator.
    pub(super) async fn validate_account(&self, user_id: &str, account_id: Uuid) -> ResultEngine<()> {
        if !self.ownership.owns_account(user_id, account_id).await? {
            return Err(EngineError::InvalidAccount(format!(
                "account {account_id} is not available"
            )));
        }
        Ok(())
    }

    pub(super) async fn validate_category(
        &self,
        user_id: &str,
        category_id: Uuid,
        subcategory_id: Option<Uuid>,
    ) -> ResultEngine<()> {
        if !self.ownership.owns_category(user_id, category_id).await? {
            return Err(EngineError::InvalidCategory(format!(
                "category {category_id} is not available"
            )));
        }
        if let Some(subcategory_id) = subcategory_id
            && !self
                .ownership
                .owns_subcategory(user_id, category_id, subcategory_id)
                .await?
        {
            return Err(EngineError::InvalidCategory(format!(
                "subcategory {subcategory_id} is not a child of {category_id}"
            )));
        }
        Ok(())
    }
}
