pub mod account;
pub mod notify;
pub mod password;
pub mod payment;
pub mod principal;

pub use account::{normalize_email, AccountStore, UserAccount};
pub use principal::{Principal, Role};

/// Domain error taxonomy shared by every service and store implementation.
///
/// Store implementations translate storage-level failures into these
/// variants; raw driver error text never reaches a caller. The `Display`
/// value of each variant is the user-visible message.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        CoreError::Internal(msg.into())
    }
}
