use sea_orm::{QueryFilter, QueryOrder, prelude::*};

use crate::{
    Account, ChangeType, EngineError, NewAccountCmd, ResultEngine, accounts,
    util::normalize_optional_text,
};

use super::{Engine, balances::Adjustment, balances::today, normalize_required_name};

impl Engine {
    /// Opens an account. A non-zero opening balance is logged as
    /// `initial_set`.
    pub async fn create_account(&self, cmd: NewAccountCmd) -> ResultEngine<Account> {
        let name = normalize_required_name(&cmd.name, "account", EngineError::InvalidAccount)?;
        self.require_user(&self.database, &cmd.owner_user_id).await?;

        let existing = accounts::Entity::find()
            .filter(accounts::Column::OwnerUserId.eq(cmd.owner_user_id.as_str()))
            .filter(accounts::Column::Name.eq(name.as_str()))
            .one(&self.database)
            .await?;
        if existing.is_some() {
            return Err(EngineError::ExistingKey(name));
        }

        let location = cmd.location.map(|mut location| {
            location.place_name = normalize_optional_text(location.place_name.as_deref());
            location
        });
        let account = Account::new(cmd.owner_user_id, name, cmd.kind, location);
        accounts::ActiveModel::from(&account)
            .insert(&self.database)
            .await?;

        if cmd.opening_balance_minor != 0 {
            self.adjust(Adjustment::new(
                account.id,
                &account.owner_user_id,
                cmd.opening_balance_minor,
                ChangeType::InitialSet,
                today(),
            ))
            .await
            .inspect_err(|err| {
                tracing::error!(
                    account_id = %account.id,
                    error = %err,
                    "account created but opening balance not applied"
                );
            })?;
        }

        tracing::info!(account_id = %account.id, owner = %account.owner_user_id, "account created");
        Ok(account)
    }

    pub async fn list_accounts(&self, user_id: &str) -> ResultEngine<Vec<Account>> {
        accounts::Entity::find()
            .filter(accounts::Column::OwnerUserId.eq(user_id))
            .order_by_asc(accounts::Column::Name)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Account::try_from)
            .collect()
    }
}
