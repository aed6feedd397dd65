use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use sea_orm::DatabaseConnection;

use crate::{
    DbHouseholdLinks, DbOwnership, EngineError, HouseholdLinkResolver, NotificationSink,
    OutboxNotifier, OwnershipValidator, ResultEngine,
};

mod access;
mod accounts;
mod balances;
mod categories;
mod household;
mod splits;
mod transactions;
mod transfers;

pub use balances::BalanceAudit;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// The ledger.
///
/// Every public operation takes the acting user's id and only touches data
/// that user owns, except for the split-bill path which writes to the
/// partner's side through a split capability.
pub struct Engine {
    database: DatabaseConnection,
    households: Arc<dyn HouseholdLinkResolver>,
    notifier: Arc<dyn NotificationSink>,
    ownership: Arc<dyn OwnershipValidator>,
    history_failures: AtomicU64,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("database", &self.database)
            .field(
                "history_failures",
                &self.history_failures.load(Ordering::Relaxed),
            )
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Number of history entries that could not be written since start-up.
    ///
    /// The balance changes behind them were kept.
    pub fn history_write_failures(&self) -> u64 {
        self.history_failures.load(Ordering::Relaxed)
    }

    fn record_history_failure(&self) {
        self.history_failures.fetch_add(1, Ordering::Relaxed);
    }
}

fn normalize_required_name(
    value: &str,
    label: &str,
    invalid: fn(String) -> EngineError,
) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid(format!("{label} name must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    households: Option<Arc<dyn HouseholdLinkResolver>>,
    notifier: Option<Arc<dyn NotificationSink>>,
    ownership: Option<Arc<dyn OwnershipValidator>>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Replace the default `household_links` reader.
    pub fn household_links(mut self, resolver: Arc<dyn HouseholdLinkResolver>) -> EngineBuilder {
        self.households = Some(resolver);
        self
    }

    /// Replace the default outbox notifier.
    pub fn notifier(mut self, sink: Arc<dyn NotificationSink>) -> EngineBuilder {
        self.notifier = Some(sink);
        self
    }

    pub fn ownership(mut self, validator: Arc<dyn OwnershipValidator>) -> EngineBuilder {
        self.ownership = Some(validator);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let database = self.database;
        let households = self
            .households
            .unwrap_or_else(|| Arc::new(DbHouseholdLinks::new(database.clone())));
        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(OutboxNotifier::new(database.clone())));
        let ownership = self
            .ownership
            .unwrap_or_else(|| Arc::new(DbOwnership::new(database.clone())));
        Ok(Engine {
            database,
            households,
            notifier,
            ownership,
            history_failures: AtomicU64::new(0),
        })
    }
}
