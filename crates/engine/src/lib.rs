//! Household ledger engine.
//!
//! Keeps one running balance per account consistent with an append-only
//! history of balance changes, across transactions, transfers and bills
//! shared between two household partners.

pub use accounts::{Account, AccountKind, Location};
pub use balance_history::{BalanceHistoryEntry, ChangeType};
pub use categories::Category;
pub use collaborators::{
    DbHouseholdLinks, DbOwnership, HouseholdLinkResolver, HouseholdPartner, NotificationSink,
    OutboxNotifier, OwnershipValidator,
};
pub use commands::{
    CompleteSplitCmd, CreateTransactionCmd, CreateTransferCmd, NewAccountCmd,
    UpdateTransactionCmd, UpdateTransferCmd,
};
pub use error::EngineError;
pub use household_links::HouseholdLink;
pub use notifications::{Notification, NotificationKind};
pub use ops::{BalanceAudit, Engine, EngineBuilder};
pub use transactions::{CompletedSplit, SplitReversal, SplitState, Transaction};
pub use transfers::Transfer;
pub use util::DateRange;

mod accounts;
mod balance_history;
mod balances;
mod categories;
mod collaborators;
mod commands;
mod error;
mod household_links;
mod notifications;
mod ops;
mod transactions;
mod transfers;
mod users;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
