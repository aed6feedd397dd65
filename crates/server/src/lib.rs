use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

use serde::Serialize;
pub use server::{ServerState, router, run, run_with_listener, spawn_with_listener};

mod accounts;
mod categories;
mod household;
mod server;
mod splits;
mod transactions;
mod transfers;
mod user;

pub mod types {
    pub mod account {
        pub use api_types::account::{AccountKind, AccountNew, AccountView};
        pub use api_types::balance::{
            AuditView, BalanceSet, BalanceView, HistoryEntryView, HistoryPage, HistoryQuery,
            StatementReconcile,
        };
    }

    pub mod transaction {
        pub use api_types::transaction::{
            Reversal, SplitStatus, SplitView, TransactionDeleted, TransactionListQuery,
            TransactionNew, TransactionUpdate, TransactionView,
        };
    }

    pub mod transfer {
        pub use api_types::transfer::{TransferListQuery, TransferNew, TransferUpdate, TransferView};
    }

    pub mod household {
        pub use api_types::household::{HouseholdLinkNew, HouseholdLinkView};
        pub use api_types::notification::NotificationView;
        pub use api_types::split::SplitComplete;
    }
}

pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

#[derive(Serialize)]
struct Error {
    error: String,
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::Forbidden(_) => StatusCode::FORBIDDEN,
        EngineError::KeyNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::ExistingKey(_)
        | EngineError::InvalidSplitState(_)
        | EngineError::NoHouseholdLink(_) => StatusCode::CONFLICT,
        EngineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::InvalidAmount(_)
        | EngineError::InvalidAccount(_)
        | EngineError::InvalidCategory(_)
        | EngineError::InvalidId(_)
        | EngineError::InvalidCursor(_)
        | EngineError::InvalidRange(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => (status_for_engine_error(&err), message_for_engine_error(err)),
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(Error { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::DbErr;

    fn status_of(err: EngineError) -> StatusCode {
        ServerError::from(err).into_response().status()
    }

    #[test]
    fn engine_forbidden_maps_to_403() {
        assert_eq!(
            status_of(EngineError::Forbidden("x".to_string())),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn engine_not_found_maps_to_404() {
        assert_eq!(
            status_of(EngineError::KeyNotFound("x".to_string())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn engine_conflicts_map_to_409() {
        for err in [
            EngineError::ExistingKey("x".to_string()),
            EngineError::InvalidSplitState("x".to_string()),
            EngineError::NoHouseholdLink("x".to_string()),
        ] {
            assert_eq!(status_of(err), StatusCode::CONFLICT);
        }
    }

    #[test]
    fn engine_validation_maps_to_422() {
        for err in [
            EngineError::InvalidAmount("x".to_string()),
            EngineError::InvalidAccount("x".to_string()),
            EngineError::InvalidCategory("x".to_string()),
            EngineError::InvalidId("x".to_string()),
            EngineError::InvalidCursor("x".to_string()),
            EngineError::InvalidRange("x".to_string()),
        ] {
            assert_eq!(status_of(err), StatusCode::UNPROCESSABLE_ENTITY);
        }
    }

    #[test]
    fn database_error_maps_to_500() {
        assert_eq!(
            status_of(EngineError::Database(DbErr::Custom("boom".to_string()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn database_message_is_hidden() {
        let message = message_for_engine_error(EngineError::Database(DbErr::Custom(
            "secret table".to_string(),
        )));
        assert_eq!(message, "internal server error");
    }

    #[test]
    fn generic_maps_to_400() {
        let res = ServerError::Generic("bad".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
