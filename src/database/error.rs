use std::fmt::{self, Display};

use thiserror::Error;
use warp::http::StatusCode;
use warp::reject::Reject;

/// Every failure a domain operation can produce. The first five variants
/// are the contract surface; the rest are infrastructure faults that the
/// API maps to 500.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    AlreadyExists(String),
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    InvalidArgument(String),

    #[error("database error: {0}")]
    Query(#[from] sqlx::Error),
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("credential error: {0}")]
    Credential(String),
}

impl DomainError {
    pub fn status(&self) -> StatusCode {
        match self {
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::AlreadyExists(_) => StatusCode::BAD_REQUEST,
            DomainError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
            DomainError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            DomainError::Query(_) | DomainError::Storage(_) | DomainError::Credential(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The message exposed over the wire. Infrastructure faults keep their
    /// detail in the log and answer with a generic line.
    pub fn public_message(&self) -> String {
        match self {
            DomainError::Query(_) | DomainError::Storage(_) | DomainError::Credential(_) => {
                String::from("internal server error")
            }
            other => other.to_string(),
        }
    }
}

impl From<argon2::password_hash::Error> for DomainError {
    fn from(value: argon2::password_hash::Error) -> Self {
        Self::Credential(value.to_string())
    }
}

impl Reject for DomainError {}

/// Failure to pull a typed value out of a request payload.
#[derive(Debug)]
pub struct TypeError {
    info: String,
}

impl TypeError {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_string(),
        }
    }
}

impl Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.info)
    }
}

impl std::error::Error for TypeError {}

impl From<TypeError> for DomainError {
    fn from(value: TypeError) -> Self {
        DomainError::InvalidArgument(value.info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_kinds_map_to_fixed_statuses() {
        assert_eq!(
            DomainError::NotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            DomainError::AlreadyExists("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DomainError::Unauthenticated("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            DomainError::Forbidden("x".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            DomainError::InvalidArgument("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn infrastructure_faults_hide_detail() {
        let err = DomainError::Credential("hash parse failed".into());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "internal server error");
    }

    #[test]
    fn form_type_errors_become_invalid_argument() {
        let err: DomainError = TypeError::new("missing field").into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
