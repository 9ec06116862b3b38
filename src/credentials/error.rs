// Strongbox — Credentials error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Keyring error: {0}")]
    Keyring(String),
}
