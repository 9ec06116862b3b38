// Strongbox — Credential Provider
//
// Stores and retrieves the database passphrase through the platform keyring.
// Absence of an entry is a normal outcome, not an error: the store generates
// a fresh passphrase on first open and persists it here.
//
// Flow:
//   1. `get(alias)` looks up the passphrase for this store's alias
//   2. on absence, the caller generates one via `generate_passphrase()`
//   3. `put(alias, secret)` deletes then inserts, so the write never collides
//      with a stale entry

use rand::RngCore;
use zeroize::Zeroizing;

use super::CredentialError;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Length of a generated passphrase in raw bytes before hex encoding
/// (256-bit entropy).
const PASSPHRASE_LEN: usize = 32;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the platform secret store, enabling platform-specific
/// backends and mock implementations for testing. Entries are addressed by
/// alias within the provider's service scope.
pub trait CredentialProvider {
    /// Look up the secret stored under `alias`.
    /// Returns `Ok(None)` when no entry exists; absence is a normal outcome.
    fn get(&self, alias: &str) -> Result<Option<Zeroizing<Vec<u8>>>, CredentialError>;

    /// Store `secret` under `alias`, replacing any existing entry.
    /// Deletes the previous entry first so the insert never hits a
    /// duplicate-key rejection; idempotent from the caller's perspective.
    fn put(&self, alias: &str, secret: &[u8]) -> Result<(), CredentialError>;

    /// Remove the entry under `alias`. Deleting an absent entry succeeds.
    fn delete(&self, alias: &str) -> Result<(), CredentialError>;
}

/// Generate a fresh random passphrase: 32 random bytes, hex-encoded to a
/// printable 64-character string.
pub fn generate_passphrase() -> Zeroizing<String> {
    let mut raw = Zeroizing::new(vec![0u8; PASSPHRASE_LEN]);
    rand::rng().fill_bytes(&mut raw);
    Zeroizing::new(raw.iter().map(|b| format!("{:02x}", b)).collect())
}

// ─── Platform Implementation ─────────────────────────────────────────────────

/// Production implementation using the `keyring` crate.
/// Dispatches to:
///   - Linux: kernel keyutils
///   - macOS: Security.framework Keychain
///   - Windows: Windows Credential Manager
pub struct KeyringProvider {
    service: String,
}

impl KeyringProvider {
    /// Default service scope for Strongbox keyring entries.
    pub const DEFAULT_SERVICE: &'static str = "strongbox";

    pub fn new() -> Self {
        Self {
            service: Self::DEFAULT_SERVICE.to_string(),
        }
    }

    /// Creates a provider with a custom service scope, for callers that run
    /// several stores side by side.
    pub fn with_service(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, alias: &str) -> Result<keyring::Entry, CredentialError> {
        keyring::Entry::new(&self.service, alias)
            .map_err(|e| CredentialError::Keyring(format!("failed to create keyring entry: {}", e)))
    }
}

impl Default for KeyringProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialProvider for KeyringProvider {
    fn get(&self, alias: &str) -> Result<Option<Zeroizing<Vec<u8>>>, CredentialError> {
        let entry = self.entry(alias)?;
        match entry.get_secret() {
            Ok(secret) => {
                tracing::debug!(alias = %alias, "Retrieved passphrase from keyring");
                Ok(Some(Zeroizing::new(secret)))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(CredentialError::Keyring(format!(
                "failed to retrieve secret: {}",
                e
            ))),
        }
    }

    fn put(&self, alias: &str, secret: &[u8]) -> Result<(), CredentialError> {
        let entry = self.entry(alias)?;

        // Clear any stale entry first; some backends reject duplicate inserts.
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {}
            Err(e) => {
                tracing::debug!(alias = %alias, error = %e, "Pre-insert delete failed, inserting anyway");
            }
        }

        entry
            .set_secret(secret)
            .map_err(|e| CredentialError::Keyring(format!("failed to store secret: {}", e)))?;
        tracing::debug!(alias = %alias, "Passphrase stored in platform keyring");
        Ok(())
    }

    fn delete(&self, alias: &str) -> Result<(), CredentialError> {
        let entry = self.entry(alias)?;
        match entry.delete_credential() {
            Ok(()) => {
                tracing::warn!(alias = %alias, "Passphrase deleted from keyring — the database is now irrecoverable");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(CredentialError::Keyring(format!(
                "failed to delete secret: {}",
                e
            ))),
        }
    }
}

// ─── In-Memory Mock for Testing ──────────────────────────────────────────────


// ─── Tests ───────────────────────────────────────────────────────────────────
