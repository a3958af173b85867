use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Every failure the identity core can report.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("email already registered")]
    DuplicateEmail,

    #[error("user not found")]
    NotFound,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid token")]
    TokenInvalid,

    #[error("token expired")]
    TokenExpired,

    #[error("token signing failed: {0}")]
    SigningFailed(String),

    #[error("password hashing failed: {0}")]
    HashingFailed(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

pub type Result<T> = std::result::Result<T, IdentityError>;

impl From<sqlx::Error> for IdentityError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => IdentityError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                IdentityError::DuplicateEmail
            }
            sqlx::Error::Database(ref db) if db.is_check_violation() => {
                IdentityError::ValidationFailed(db.message().to_string())
            }
            other => IdentityError::StorageUnavailable(other.to_string()),
        }
    }
}

impl IdentityError {
    pub fn status(&self) -> StatusCode {
        match self {
            IdentityError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            IdentityError::DuplicateEmail => StatusCode::CONFLICT,
            IdentityError::NotFound => StatusCode::NOT_FOUND,
            IdentityError::InvalidCredentials
            | IdentityError::TokenInvalid
            | IdentityError::TokenExpired => StatusCode::UNAUTHORIZED,
            IdentityError::HashingFailed(_) | IdentityError::SigningFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            IdentityError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn public_message(&self) -> String {
        match self {
            IdentityError::TokenInvalid | IdentityError::TokenExpired => {
                "Invalid or expired token".into()
            }
            IdentityError::HashingFailed(_) | IdentityError::SigningFailed(_) => {
                "Internal error".into()
            }
            IdentityError::StorageUnavailable(_) => "Storage unavailable".into(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for IdentityError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.public_message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err = IdentityError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, IdentityError::NotFound));
    }

    #[test]
    fn pool_errors_map_to_storage_unavailable() {
        let err = IdentityError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, IdentityError::StorageUnavailable(_)));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn token_errors_share_a_public_message() {
        assert_eq!(
            IdentityError::TokenExpired.public_message(),
            IdentityError::TokenInvalid.public_message()
        );
        assert_eq!(IdentityError::TokenExpired.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn signing_failure_is_a_server_fault() {
        let err = IdentityError::SigningFailed("InvalidKeyFormat".into());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Internal error");
        assert_ne!(err.status(), IdentityError::TokenInvalid.status());
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let err = IdentityError::StorageUnavailable("connection refused 10.0.0.5".into());
        assert!(!err.public_message().contains("10.0.0.5"));
    }
}
