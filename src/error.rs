//! Error types for the page cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Error Enum ==
/// Unified error type for stores, fetchers and document queries.
#[derive(Error, Debug)]
pub enum Error {
    /// Argument rejected before any store call
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Key-value store unreachable or command failed
    #[error("Store error: {0}")]
    Store(String),

    /// Operation against a value of the wrong kind (e.g. INCR on text)
    #[error("Wrong type: {0}")]
    WrongType(String),

    /// Underlying fetch failed
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// Document query failed or used an unsupported operator
    #[error("Query failed: {0}")]
    Query(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        // INCR on a non-counter value or past i64::MAX is a data error, not an outage
        let message = err.to_string();
        if err.code() == Some("WRONGTYPE")
            || message.contains("not an integer")
            || message.contains("would overflow")
        {
            return Error::WrongType(message);
        }
        Error::Store(message)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Fetch(err.to_string())
    }
}

impl From<mongodb::error::Error> for Error {
    fn from(err: mongodb::error::Error) -> Self {
        Error::Query(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Error::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::WrongType(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Fetch(_) => StatusCode::BAD_GATEWAY,
            Error::Query(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Fetch("connection refused".to_string());
        assert_eq!(err.to_string(), "Fetch failed: connection refused");
    }

    #[test]
    fn test_error_status_codes() {
        let cases = [
            (Error::InvalidArgument("x".into()), StatusCode::BAD_REQUEST),
            (Error::Store("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (Error::Fetch("x".into()), StatusCode::BAD_GATEWAY),
            (Error::Query("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_redis_counter_errors_are_wrong_type() {
        let overflow = redis::RedisError::from((
            redis::ErrorKind::ResponseError,
            "increment or decrement would overflow",
        ));
        assert!(matches!(Error::from(overflow), Error::WrongType(_)));

        let not_integer = redis::RedisError::from((
            redis::ErrorKind::ResponseError,
            "value is not an integer or out of range",
        ));
        assert!(matches!(Error::from(not_integer), Error::WrongType(_)));
    }

    #[test]
    fn test_redis_io_error_is_store() {
        let refused = redis::RedisError::from((redis::ErrorKind::IoError, "connection refused"));
        assert!(matches!(Error::from(refused), Error::Store(_)));
    }
}
