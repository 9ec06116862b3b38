// Strongbox — Store error types
//
// One variant per statement phase, so a failure reports whether compilation,
// parameter binding, or execution broke, each with the engine's diagnostic.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to open database: {0}")]
    Open(String),

    #[error("Invalid passphrase — database may be corrupted or the passphrase is wrong")]
    InvalidPassphrase,

    #[error("Statement preparation failed: {0}")]
    Prepare(#[source] rusqlite::Error),

    #[error("Parameter binding failed: {0}")]
    Bind(#[source] rusqlite::Error),

    #[error("Statement execution failed: {0}")]
    Step(#[source] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}
