// Strongbox — Credentials Module
//
// Handles custody of the database passphrase in the platform's native
// secret store (Keychain / Credential Manager / keyutils). The passphrase is
// resolved once when a store is opened and never touched on the hot path.

mod error;
mod provider;

pub use error::CredentialError;
pub use provider::{generate_passphrase, CredentialProvider, KeyringProvider};

#[cfg(test)]
pub use provider::mock;
