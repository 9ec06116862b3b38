// Strongbox — Top-level error types
//
// Aggregates errors from the credentials and store modules into a single
// error enum for the crate boundary.

use thiserror::Error;

/// Top-level error type for all Strongbox operations.
#[derive(Debug, Error)]
pub enum StrongboxError {
    #[error("Credential store error: {0}")]
    Credentials(#[from] crate::credentials::CredentialError),

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StrongboxError>;
