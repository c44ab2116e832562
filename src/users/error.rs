use std::time::Duration;

use thiserror::Error;

/// Failures raised by a [`UserStore`](crate::users::repo::UserStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("repository: user {0} not found")]
    NotFound(u64),

    #[error("repository: conflict: {0}")]
    Conflict(String),

    #[error("repository: call timed out after {0:?}")]
    Timeout(Duration),

    #[error("repository: {0}")]
    Database(#[from] sqlx::Error),
}

/// Why a single value was rejected.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("empty value")]
    EmptyValue,

    #[error("invalid email")]
    InvalidEmail,

    #[error("password must be at least 6 characters")]
    InvalidPasswd,

    #[error("zero value")]
    ZeroValue,

    #[error("not supported")]
    NotSupported,

    #[error("does not identify exactly one user")]
    NotUnique,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    #[error("password does not match hash")]
    Mismatch,

    #[error("malformed password hash: {0}")]
    MalformedHash(String),

    #[error("hashing failed: {0}")]
    Internal(String),
}

/// Business-rule violations plus any store or hashing failure they wrap.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service: invalid input {field}: {source}")]
    InvalidInput {
        field: &'static str,
        #[source]
        source: ValidationError,
    },

    #[error("service: invalid filter {filter}: {source}")]
    InvalidFilter {
        filter: String,
        #[source]
        source: ValidationError,
    },

    #[error("service: empty arguments")]
    EmptyArgs,

    #[error("service: zero value")]
    ZeroValue,

    #[error("service: password does not match")]
    PasswdDoNotMatch,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("service: {0}")]
    Hash(#[from] HashError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn invalid_input(field: &'static str, source: ValidationError) -> Self {
        Self::InvalidInput { field, source }
    }

    /// Field or filter name the error refers to, if any.
    pub fn subject(&self) -> Option<&str> {
        match self {
            Self::InvalidInput { field, .. } => Some(*field),
            Self::InvalidFilter { filter, .. } => Some(filter.as_str()),
            _ => None,
        }
    }
}
