//! Split-bill coordinator.
//!
//! A shared bill is `Requested` when created, `Completed` once the
//! collaborator confirms their portion, and reversed when the owner deletes
//! it. Writes to the collaborator's side go through [`SplitCapability`],
//! which only [`SplitCapability::authorize`] can build.

use chrono::Utc;
use sea_orm::{QueryFilter, QueryOrder, prelude::*, sea_query::Expr};
use serde_json::json;
use uuid::Uuid;

use crate::{
    ChangeType, CompleteSplitCmd, CompletedSplit, EngineError, HouseholdPartner,
    NotificationKind, ResultEngine, SplitReversal, SplitState, Transaction, transactions,
    util::{ensure_positive_amount, normalize_optional_text},
};

use super::{
    Engine,
    balances::{Adjustment, today},
};

/// Permission to write to the collaborator's side of one shared bill.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SplitCapability {
    bill_id: Uuid,
    owner_user_id: String,
    collaborator: String,
    completed: Option<CompletedSplit>,
}

impl SplitCapability {
    /// Grants the capability when the acting user owns the bill, the bill is
    /// shared, and its collaborator is the acting user's active partner.
    pub(crate) fn authorize(
        acting_user_id: &str,
        bill: &Transaction,
        partner: Option<&HouseholdPartner>,
    ) -> ResultEngine<Self> {
        if bill.owner_user_id != acting_user_id {
            return Err(EngineError::KeyNotFound(
                "transaction not exists".to_string(),
            ));
        }
        let (collaborator, completed) = match &bill.split {
            SplitState::NotShared => {
                return Err(EngineError::InvalidSplitState(format!(
                    "transaction {} is not shared",
                    bill.id
                )));
            }
            SplitState::Requested { collaborator } => (collaborator, None),
            SplitState::Completed(split) => (&split.collaborator, Some(split.clone())),
        };
        let partner = partner.filter(|p| p.active).ok_or_else(|| {
            EngineError::NoHouseholdLink(format!(
                "{acting_user_id} has no active household partner"
            ))
        })?;
        if &partner.partner_user_id != collaborator {
            return Err(EngineError::Forbidden(format!(
                "{collaborator} is no longer the household partner of {acting_user_id}"
            )));
        }
        Ok(Self {
            bill_id: bill.id,
            owner_user_id: bill.owner_user_id.clone(),
            collaborator: collaborator.clone(),
            completed,
        })
    }

    pub(crate) fn reversal(&self) -> SplitReversal {
        if self.completed.is_some() {
            SplitReversal::BothLegs
        } else {
            SplitReversal::OwnerOnly
        }
    }

    fn completed(&self) -> ResultEngine<&CompletedSplit> {
        self.completed.as_ref().ok_or_else(|| {
            EngineError::InvalidSplitState(format!(
                "split of transaction {} has no collaborator portion",
                self.bill_id
            ))
        })
    }
}

impl Engine {
    /// Restores the collaborator's balance by their portion.
    pub(super) async fn adjust_partner_balance(
        &self,
        capability: &SplitCapability,
    ) -> ResultEngine<i64> {
        let split = capability.completed()?;
        tracing::info!(
            bill_id = %capability.bill_id,
            owner = %capability.owner_user_id,
            collaborator = %capability.collaborator,
            amount_minor = split.amount_minor,
            "restoring collaborator portion"
        );
        self.adjust(
            Adjustment::new(
                split.account_id,
                &capability.collaborator,
                split.amount_minor,
                ChangeType::TransactionDeleted,
                today(),
            )
            .reference(split.portion_transaction_id),
        )
        .await
    }

    /// Removes the collaborator's portion transaction.
    pub(super) async fn remove_partner_portion(
        &self,
        capability: &SplitCapability,
    ) -> ResultEngine<()> {
        let split = capability.completed()?;
        transactions::Entity::delete_many()
            .filter(transactions::Column::Id.eq(split.portion_transaction_id.to_string()))
            .filter(transactions::Column::OwnerUserId.eq(capability.collaborator.as_str()))
            .filter(transactions::Column::SplitParentId.eq(capability.bill_id.to_string()))
            .exec(&self.database)
            .await?;
        Ok(())
    }

    /// The collaborator confirms their portion of a shared bill.
    ///
    /// Records the portion as the collaborator's own expense, then stamps the
    /// bill as completed. When the debit or the stamp fails the portion is
    /// discarded and the bill stays requested. Only the named collaborator may
    /// do this, while the household link with the bill owner is active.
    pub async fn complete_split(&self, cmd: CompleteSplitCmd) -> ResultEngine<Transaction> {
        ensure_positive_amount(cmd.amount_minor)?;

        let bill = transactions::Entity::find_by_id(cmd.transaction_id.to_string())
            .one(&self.database)
            .await?
            .map(Transaction::try_from)
            .transpose()?
            .filter(|bill| bill.split.collaborator() == Some(cmd.collaborator_user_id.as_str()))
            .ok_or_else(|| EngineError::KeyNotFound("transaction not exists".to_string()))?;
        if !matches!(bill.split, SplitState::Requested { .. }) {
            return Err(EngineError::InvalidSplitState(format!(
                "split of transaction {} is already completed",
                bill.id
            )));
        }

        let linked = self
            .households
            .resolve_partner(&cmd.collaborator_user_id)
            .await?
            .is_some_and(|p| p.active && p.partner_user_id == bill.owner_user_id);
        if !linked {
            return Err(EngineError::NoHouseholdLink(format!(
                "{} is not linked with {}",
                cmd.collaborator_user_id, bill.owner_user_id
            )));
        }

        self.validate_account(&cmd.collaborator_user_id, cmd.account_id)
            .await?;
        self.validate_category(&cmd.collaborator_user_id, cmd.category_id, None)
            .await?;

        let description = normalize_optional_text(cmd.description.as_deref());
        let mut portion = Transaction::new(
            cmd.collaborator_user_id.clone(),
            cmd.account_id,
            cmd.category_id,
            None,
            cmd.amount_minor,
            description.clone(),
            cmd.date,
            false,
        )?;
        portion.split_parent_id = Some(bill.id);

        transactions::ActiveModel::from(&portion)
            .insert(&self.database)
            .await?;

        if let Err(err) = self
            .adjust(
                Adjustment::new(
                    portion.account_id,
                    &portion.owner_user_id,
                    -portion.amount_minor,
                    ChangeType::TransactionExpense,
                    portion.date,
                )
                .reference(portion.id),
            )
            .await
        {
            tracing::error!(
                bill_id = %bill.id,
                portion_id = %portion.id,
                error = %err,
                "collaborator balance not adjusted, discarding split portion"
            );
            self.discard_portion(&portion, false).await;
            return Err(err);
        }

        // Conditional stamp: a second completion finds `split_completed_at`
        // already set and discards its own portion.
        let now = Utc::now();
        let stamped = transactions::Entity::update_many()
            .col_expr(
                transactions::Column::CollaboratorAccountId,
                Expr::value(cmd.account_id.to_string()),
            )
            .col_expr(
                transactions::Column::CollaboratorAmount,
                Expr::value(cmd.amount_minor),
            )
            .col_expr(
                transactions::Column::CollaboratorDescription,
                Expr::value(description),
            )
            .col_expr(
                transactions::Column::CollaboratorTransactionId,
                Expr::value(portion.id.to_string()),
            )
            .col_expr(transactions::Column::SplitCompletedAt, Expr::value(now))
            .col_expr(transactions::Column::UpdatedAt, Expr::value(now))
            .filter(transactions::Column::Id.eq(bill.id.to_string()))
            .filter(transactions::Column::SplitRequested.eq(true))
            .filter(transactions::Column::SplitCompletedAt.is_null())
            .exec(&self.database)
            .await;
        match stamped {
            Ok(result) if result.rows_affected > 0 => {}
            Ok(_) => {
                self.discard_portion(&portion, true).await;
                return Err(EngineError::InvalidSplitState(format!(
                    "split of transaction {} is already completed",
                    bill.id
                )));
            }
            Err(err) => {
                tracing::error!(
                    bill_id = %bill.id,
                    portion_id = %portion.id,
                    error = %err,
                    "split stamp failed, discarding split portion"
                );
                self.discard_portion(&portion, true).await;
                return Err(err.into());
            }
        }

        let payload = json!({
            "transaction_id": bill.id,
            "collaborator": portion.owner_user_id,
            "amount_minor": portion.amount_minor,
        });
        if let Err(err) = self
            .notifier
            .notify(
                &bill.owner_user_id,
                NotificationKind::SplitBillCompleted,
                payload,
            )
            .await
        {
            tracing::warn!(
                bill_id = %bill.id,
                error = %err,
                "split completion notification failed"
            );
        }

        Ok(portion)
    }

    /// Removes a portion whose bill was never stamped, restoring the
    /// collaborator's balance when it was already debited.
    async fn discard_portion(&self, portion: &Transaction, debited: bool) {
        if debited {
            let restored = self
                .adjust(
                    Adjustment::new(
                        portion.account_id,
                        &portion.owner_user_id,
                        portion.amount_minor,
                        ChangeType::TransactionDeleted,
                        today(),
                    )
                    .reference(portion.id),
                )
                .await;
            if let Err(err) = restored {
                tracing::error!(
                    portion_id = %portion.id,
                    error = %err,
                    "discarded split portion but collaborator balance not restored"
                );
            }
        }
        if let Err(err) = transactions::Entity::delete_many()
            .filter(transactions::Column::Id.eq(portion.id.to_string()))
            .filter(transactions::Column::OwnerUserId.eq(portion.owner_user_id.as_str()))
            .exec(&self.database)
            .await
        {
            tracing::error!(
                portion_id = %portion.id,
                error = %err,
                "split portion could not be discarded"
            );
        }
    }

    /// Shared bills waiting for the user's confirmation.
    pub async fn pending_splits(&self, user_id: &str) -> ResultEngine<Vec<Transaction>> {
        transactions::Entity::find()
            .filter(transactions::Column::CollaboratorId.eq(user_id))
            .filter(transactions::Column::SplitRequested.eq(true))
            .filter(transactions::Column::SplitCompletedAt.is_null())
            .order_by_asc(transactions::Column::Date)
            .order_by_asc(transactions::Column::CreatedAt)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Transaction::try_from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn shared_bill(split: SplitState) -> Transaction {
        let mut tx = Transaction::new(
            "alice".to_string(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            None,
            4_000,
            None,
            NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            false,
        )
        .unwrap();
        tx.split = split;
        tx
    }

    fn partner(name: &str, active: bool) -> HouseholdPartner {
        HouseholdPartner {
            partner_user_id: name.to_string(),
            active,
        }
    }

    fn completed_by(collaborator: &str) -> SplitState {
        SplitState::Completed(CompletedSplit {
            collaborator: collaborator.to_string(),
            account_id: Uuid::new_v4(),
            amount_minor: 2_000,
            description: None,
            portion_transaction_id: Uuid::new_v4(),
            completed_at: Utc::now(),
        })
    }

    #[test]
    fn owner_with_active_partner_is_authorized() {
        let bill = shared_bill(completed_by("bob"));
        let capability =
            SplitCapability::authorize("alice", &bill, Some(&partner("bob", true))).unwrap();
        assert_eq!(capability.reversal(), SplitReversal::BothLegs);

        let bill = shared_bill(SplitState::Requested {
            collaborator: "bob".to_string(),
        });
        let capability =
            SplitCapability::authorize("alice", &bill, Some(&partner("bob", true))).unwrap();
        assert_eq!(capability.reversal(), SplitReversal::OwnerOnly);
    }

    #[test]
    fn someone_else_cannot_act_on_the_bill() {
        let bill = shared_bill(completed_by("bob"));
        let err = SplitCapability::authorize("bob", &bill, Some(&partner("alice", true)))
            .unwrap_err();
        assert!(matches!(err, EngineError::KeyNotFound(_)));
    }

    #[test]
    fn inactive_or_missing_link_is_refused() {
        let bill = shared_bill(completed_by("bob"));
        let err = SplitCapability::authorize("alice", &bill, Some(&partner("bob", false)))
            .unwrap_err();
        assert!(matches!(err, EngineError::NoHouseholdLink(_)));
        let err = SplitCapability::authorize("alice", &bill, None).unwrap_err();
        assert!(matches!(err, EngineError::NoHouseholdLink(_)));
    }

    #[test]
    fn new_partner_is_not_the_collaborator() {
        let bill = shared_bill(completed_by("bob"));
        let err = SplitCapability::authorize("alice", &bill, Some(&partner("carol", true)))
            .unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));
    }

    #[test]
    fn unshared_bill_grants_nothing() {
        let bill = shared_bill(SplitState::NotShared);
        let err = SplitCapability::authorize("alice", &bill, Some(&partner("bob", true)))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidSplitState(_)));
    }
}
