use chrono::Utc;
use sea_orm::{QueryFilter, QueryOrder, prelude::*};
use uuid::Uuid;

use crate::{
    ChangeType, CreateTransferCmd, DateRange, EngineError, ResultEngine, Transfer,
    UpdateTransferCmd, transfers,
    util::{ensure_positive_amount, normalize_optional_text},
};

use super::{
    Engine,
    balances::{Adjustment, today},
};

impl Engine {
    /// Moves `amount_minor` from one account to another of the same user.
    ///
    /// Logs `transfer_out` on the source and `transfer_in` on the destination,
    /// both referencing the transfer.
    pub async fn create_transfer(&self, cmd: CreateTransferCmd) -> ResultEngine<Transfer> {
        ensure_positive_amount(cmd.amount_minor)?;
        if cmd.from_account_id == cmd.to_account_id {
            return Err(EngineError::InvalidAccount(
                "from and to accounts must differ".to_string(),
            ));
        }
        self.validate_account(&cmd.owner_user_id, cmd.from_account_id)
            .await?;
        self.validate_account(&cmd.owner_user_id, cmd.to_account_id)
            .await?;

        let transfer = Transfer::new(
            cmd.owner_user_id,
            cmd.from_account_id,
            cmd.to_account_id,
            cmd.amount_minor,
            normalize_optional_text(cmd.description.as_deref()),
            cmd.date,
        )?;
        transfers::ActiveModel::from(&transfer)
            .insert(&self.database)
            .await?;

        self.apply_transfer_legs(
            &transfer,
            transfer.amount_minor,
            (ChangeType::TransferOut, ChangeType::TransferIn),
            Some(transfer.id),
            transfer.date,
        )
        .await?;

        Ok(transfer)
    }

    /// Updates the provided fields. A changed amount moves the difference
    /// between the two accounts as `manual_adjustment`.
    pub async fn update_transfer(&self, cmd: UpdateTransferCmd) -> ResultEngine<Transfer> {
        let mut transfer = self
            .require_transfer(&self.database, cmd.transfer_id, &cmd.user_id)
            .await?;
        if let Some(amount_minor) = cmd.amount_minor {
            ensure_positive_amount(amount_minor)?;
        }

        let delta = cmd
            .amount_minor
            .map_or(0, |amount_minor| amount_minor - transfer.amount_minor);
        transfer.amount_minor = cmd.amount_minor.unwrap_or(transfer.amount_minor);
        transfer.date = cmd.date.unwrap_or(transfer.date);
        if let Some(description) = cmd.description.as_deref() {
            transfer.description = normalize_optional_text(Some(description));
        }
        transfer.updated_at = Utc::now();

        transfers::ActiveModel::from(&transfer)
            .update(&self.database)
            .await?;

        if delta != 0 {
            self.apply_transfer_legs(
                &transfer,
                delta,
                (ChangeType::ManualAdjustment, ChangeType::ManualAdjustment),
                Some(transfer.id),
                transfer.date,
            )
            .await?;
        }

        Ok(transfer)
    }

    /// Deletes a transfer and moves its amount back, logged as `correction`
    /// without a reference.
    pub async fn delete_transfer(&self, user_id: &str, transfer_id: Uuid) -> ResultEngine<()> {
        let transfer = self
            .require_transfer(&self.database, transfer_id, user_id)
            .await?;

        let deleted = transfers::Entity::delete_many()
            .filter(transfers::Column::Id.eq(transfer_id.to_string()))
            .filter(transfers::Column::OwnerUserId.eq(user_id))
            .exec(&self.database)
            .await?;
        if deleted.rows_affected == 0 {
            return Err(EngineError::KeyNotFound("transfer not exists".to_string()));
        }

        self.apply_transfer_legs(
            &transfer,
            -transfer.amount_minor,
            (ChangeType::Correction, ChangeType::Correction),
            None,
            today(),
        )
        .await
    }

    pub async fn transfer(&self, user_id: &str, transfer_id: Uuid) -> ResultEngine<Transfer> {
        self.require_transfer(&self.database, transfer_id, user_id)
            .await
    }

    /// The user's transfers with `date` in `range`, oldest first.
    pub async fn list_transfers(
        &self,
        user_id: &str,
        range: &DateRange,
    ) -> ResultEngine<Vec<Transfer>> {
        range.validate()?;
        let mut query = transfers::Entity::find()
            .filter(transfers::Column::OwnerUserId.eq(user_id))
            .order_by_asc(transfers::Column::Date)
            .order_by_asc(transfers::Column::CreatedAt);
        if let Some(from) = range.from {
            query = query.filter(transfers::Column::Date.gte(from));
        }
        if let Some(to) = range.to {
            query = query.filter(transfers::Column::Date.lt(to));
        }
        query
            .all(&self.database)
            .await?
            .into_iter()
            .map(Transfer::try_from)
            .collect()
    }

    /// Debits `from` and credits `to` by `amount_minor`. The two legs are
    /// separate adjustments; a failed second leg is logged with the first
    /// one left in place.
    async fn apply_transfer_legs(
        &self,
        transfer: &Transfer,
        amount_minor: i64,
        (out_type, in_type): (ChangeType, ChangeType),
        reference_id: Option<Uuid>,
        effective_date: chrono::NaiveDate,
    ) -> ResultEngine<()> {
        let leg = |account_id: Uuid, delta: i64, change_type: ChangeType| {
            let adjustment = Adjustment::new(
                account_id,
                &transfer.owner_user_id,
                delta,
                change_type,
                effective_date,
            );
            match reference_id {
                Some(reference_id) => adjustment.reference(reference_id),
                None => adjustment,
            }
        };

        self.adjust(leg(transfer.from_account_id, -amount_minor, out_type))
            .await
            .inspect_err(|err| {
                tracing::error!(
                    transfer_id = %transfer.id,
                    change_type = %out_type,
                    error = %err,
                    "transfer recorded but source leg not applied"
                );
            })?;
        self.adjust(leg(transfer.to_account_id, amount_minor, in_type))
            .await
            .inspect_err(|err| {
                tracing::error!(
                    transfer_id = %transfer.id,
                    change_type = %in_type,
                    error = %err,
                    "transfer source leg applied but destination leg not applied"
                );
            })?;
        Ok(())
    }
}
