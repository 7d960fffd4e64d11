//! # API Errors
//!
//! Maps engine errors to HTTP status codes by `ErrorKind`.

use super::types::ErrorResponse;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use starjar_core::{ErrorKind, LedgerError};

/// A `LedgerError` on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub LedgerError);

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        Self(e)
    }
}

/// Status code for an error kind.
pub const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidInput | ErrorKind::InsufficientBalance => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.kind());
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
            // Storage details stay in the log.
            return (status, Json(ErrorResponse::new("internal error"))).into_response();
        }
        tracing::debug!(error = %self.0, status = status.as_u16(), "request rejected");
        (status, Json(ErrorResponse::from(&self.0))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use starjar_core::RewardId;

    #[test]
    fn kinds_map_to_statuses() {
        let cases = [
            (LedgerError::RewardNotFound(RewardId(1)), StatusCode::NOT_FOUND),
            (LedgerError::ReasonRequired, StatusCode::BAD_REQUEST),
            (
                LedgerError::InsufficientBalance {
                    balance: 1,
                    cost: 5,
                },
                StatusCode::BAD_REQUEST,
            ),
            (LedgerError::Conflict("dup".into()), StatusCode::CONFLICT),
            (
                LedgerError::Unauthenticated("who".into()),
                StatusCode::UNAUTHORIZED,
            ),
            (LedgerError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (
                LedgerError::IoError("disk".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(status_for(error.kind()), status);
        }
    }
}
