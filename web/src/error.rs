//! Error types for web handlers.
//!
//! [`AppError`] bridges the domain errors of `helpdesk-core` and HTTP responses.
//! Handlers return `Result<_, AppError>` and use `?` on store and service calls;
//! the `From` impls below pick the status.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use helpdesk_core::StoreError;
use helpdesk_core::api_token::TokenError;
use helpdesk_core::dynamic_field::exchange::ExchangeError;
use helpdesk_core::dynamic_field::filter::FilterError;
use helpdesk_core::ticket::TicketError;
use helpdesk_core::ticket_number::TicketNumberError;
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// # Examples
///
/// ```ignore
/// async fn handler(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Group>, AppError> {
///     Ok(Json(state.groups.get(id).await?))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: String,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Create a new error with a source error.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable code of this error.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            message.into(),
            "BAD_REQUEST".to_string(),
        )
    }

    /// Create a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            message.into(),
            "UNAUTHORIZED".to_string(),
        )
    }

    /// Create a 403 Forbidden error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            message.into(),
            "FORBIDDEN".to_string(),
        )
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("{resource} {id} not found"),
            "NOT_FOUND".to_string(),
        )
    }

    /// Create a 409 Conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::CONFLICT,
            message.into(),
            "CONFLICT".to_string(),
        )
    }

    /// Create a 400 error for rejected input.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            message.into(),
            "VALIDATION_ERROR".to_string(),
        )
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: String,
    /// Human-readable error message.
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    error = %source,
                    "Internal server error"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Internal server error"
                );
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

/// Convert `anyhow::Error` to `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { resource, id } => Self::not_found(resource, id),
            StoreError::Conflict(message) => Self::conflict(message),
            StoreError::Validation(message) => Self::validation(message),
            StoreError::Database(message) => {
                Self::internal("A database error occurred").with_source(anyhow::anyhow!(message))
            }
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Store(store) => store.into(),
            e if e.is_authentication_failure() => Self::unauthorized(e.to_string()),
            e => Self::validation(e.to_string()),
        }
    }
}

impl From<TicketNumberError> for AppError {
    fn from(err: TicketNumberError) -> Self {
        Self::internal("Could not generate a ticket number").with_source(err.into())
    }
}

impl From<TicketError> for AppError {
    fn from(err: TicketError) -> Self {
        match err {
            TicketError::Store(store) => store.into(),
            TicketError::Number(number) => number.into(),
        }
    }
}

impl From<FilterError> for AppError {
    fn from(err: FilterError) -> Self {
        Self::validation(err.to_string())
    }
}

impl From<ExchangeError> for AppError {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::Store(store) => store.into(),
            e => Self::validation(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Invalid input");
    }

    #[test]
    fn test_store_errors_map_to_statuses() {
        let cases = [
            (StoreError::not_found("group", 7), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (StoreError::Conflict("dup".into()), StatusCode::CONFLICT, "CONFLICT"),
            (StoreError::Validation("bad".into()), StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            (
                StoreError::Database("down".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
            ),
        ];
        for (store, status, code) in cases {
            let err = AppError::from(store);
            assert_eq!(err.status(), status);
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn test_not_found_message() {
        let err = AppError::from(StoreError::not_found("group", 42));
        assert_eq!(err.to_string(), "[NOT_FOUND] group 42 not found");
    }

    #[test]
    fn test_database_detail_not_exposed() {
        let err = AppError::from(StoreError::Database("password authentication failed".into()));
        assert!(!err.to_string().contains("password"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_token_errors() {
        assert_eq!(AppError::from(TokenError::Revoked).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::from(TokenError::InvalidFormat).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::from(TokenError::AdminScopeForCustomer).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(TokenError::Store(StoreError::not_found("api token", 1))).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_ticket_errors() {
        let err = AppError::from(TicketError::Store(StoreError::Validation("queue 9 does not exist".into())));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = AppError::from(TicketError::Number(TicketNumberError::NotConfigured));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_exchange_errors() {
        assert_eq!(AppError::from(ExchangeError::MissingSection).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::from(FilterError::InvalidFieldName("a b".into())).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
