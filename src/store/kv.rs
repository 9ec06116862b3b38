// Strongbox — Key-Value Store Façade
//
// Composes the credential provider and the encrypted database: opening a
// store resolves the passphrase (creating and persisting a fresh one on first
// run), opens SQLCipher with it, and ensures the schema. Typed access layers
// serde_json on top of the raw byte operations.
//
// Error policy: every lower layer reports explicit `Result`s; this boundary
// decides what the caller sees. `Degrade` (the default) reproduces the
// contract of the system this store is compatible with: failures are logged,
// reads come back absent, writes become no-ops, and a failed open leaves a
// permanently inert store whose state `is_healthy` exposes. `Propagate`
// surfaces every failure as an error.

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;
use zeroize::Zeroizing;

use crate::credentials::{generate_passphrase, CredentialProvider};
use crate::error::StrongboxError;

use super::{EncryptedDb, StoreError};

/// How the store boundary treats runtime failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Log failures and degrade: reads return absent, writes no-op.
    #[default]
    Degrade,
    /// Surface every failure as an error return.
    Propagate,
}

/// Configuration for opening a [`KeyValueStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Location of the database file. Parent directories are created on open.
    pub path: PathBuf,
    /// Alias the passphrase entry is stored under in the credential provider.
    pub alias: String,
    /// Failure handling at the store boundary.
    pub policy: ErrorPolicy,
}

impl StoreConfig {
    /// Alias the compatible system stored its database passphrase under.
    pub const DEFAULT_ALIAS: &'static str = "dbKey";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            alias: Self::DEFAULT_ALIAS.to_string(),
            policy: ErrorPolicy::default(),
        }
    }
}

/// Encrypted key-value store.
///
/// One connection per instance, synchronous blocking I/O, no internal
/// synchronization: operations issued sequentially on one instance observe a
/// strict happens-before order, and sharing an instance across threads
/// requires external mutual exclusion (the connection is `Send` but not
/// `Sync`, so the compiler enforces this).
pub struct KeyValueStore {
    db: Option<EncryptedDb>,
    policy: ErrorPolicy,
}

impl KeyValueStore {
    /// Open a store: resolve the passphrase through `credentials`, open the
    /// encrypted database, ensure the schema.
    ///
    /// Under `ErrorPolicy::Degrade` an open or schema failure yields an inert
    /// store (reads absent, writes no-op) instead of an error; check
    /// [`is_healthy`](Self::is_healthy). Under `Propagate` it yields `Err`.
    pub fn open(
        config: StoreConfig,
        credentials: &dyn CredentialProvider,
    ) -> Result<Self, StrongboxError> {
        let passphrase = Self::resolve_passphrase(&config, credentials);

        let db = match Self::open_db(&config, &passphrase) {
            Ok(db) => Some(db),
            Err(e) => match config.policy {
                ErrorPolicy::Propagate => return Err(e),
                ErrorPolicy::Degrade => {
                    tracing::error!(
                        error = %e,
                        path = %config.path.display(),
                        "Unable to open database; store is inert for this lifetime"
                    );
                    None
                }
            },
        };

        Ok(Self {
            db,
            policy: config.policy,
        })
    }

    /// Look up the passphrase, or generate and persist a fresh one. Never
    /// fails: a credential-store write failure leaves the process running
    /// with the in-memory passphrase for its current lifetime.
    fn resolve_passphrase(
        config: &StoreConfig,
        credentials: &dyn CredentialProvider,
    ) -> Zeroizing<String> {
        match credentials.get(&config.alias) {
            Ok(Some(secret)) => {
                return Zeroizing::new(String::from_utf8_lossy(&secret).into_owned());
            }
            Ok(None) => {
                tracing::debug!(alias = %config.alias, "No stored passphrase, generating a new one");
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    alias = %config.alias,
                    "Credential store read failed, generating a new passphrase"
                );
            }
        }

        let passphrase = generate_passphrase();
        if let Err(e) = credentials.put(&config.alias, passphrase.as_bytes()) {
            tracing::warn!(
                error = %e,
                alias = %config.alias,
                "Unable to persist passphrase; it will not survive this process"
            );
        }
        passphrase
    }

    fn open_db(config: &StoreConfig, passphrase: &str) -> Result<EncryptedDb, StrongboxError> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = EncryptedDb::open(&config.path, passphrase)?;
        db.ensure_schema()?;
        Ok(db)
    }

    /// Whether the underlying database opened successfully. An unhealthy
    /// store answers absent to every read and ignores every write.
    pub fn is_healthy(&self) -> bool {
        self.db.is_some()
    }

    /// Return the raw bytes stored under `key`, or `None` if the key was
    /// never set or has been cleared.
    pub fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, StrongboxError> {
        let db = match &self.db {
            Some(db) => db,
            None => return Ok(None),
        };
        match db.select(key) {
            Ok(value) => Ok(value),
            Err(e) => self.degrade_read("Lookup", e),
        }
    }

    /// Store `value` under `key`, replacing any previous value. There is no
    /// delete-by-key; records are only removed wholesale by
    /// [`clear_all`](Self::clear_all).
    pub fn set_bytes(&self, key: &str, value: &[u8]) -> Result<(), StrongboxError> {
        let db = match &self.db {
            Some(db) => db,
            None => return Ok(()),
        };
        match db.upsert(key, value) {
            Ok(()) => Ok(()),
            Err(e) => self.degrade_write("Write", e),
        }
    }

    /// Read the value under `key` and decode it as JSON into `T`. A decode
    /// failure behaves per policy: absent under `Degrade`, error under
    /// `Propagate`.
    pub fn get_typed<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StrongboxError> {
        let bytes = match self.get_bytes(key)? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => self.degrade_read("Decoding", StoreError::Serialization(e)),
        }
    }

    /// Encode `value` as JSON and store it under `key`. An encode failure
    /// behaves per policy: no-op under `Degrade`, error under `Propagate`.
    pub fn set_typed<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StrongboxError> {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => return self.degrade_write("Encoding", StoreError::Serialization(e)),
        };
        self.set_bytes(key, &bytes)
    }

    /// Remove every record, then compact the backing file.
    pub fn clear_all(&self) -> Result<(), StrongboxError> {
        let db = match &self.db {
            Some(db) => db,
            None => return Ok(()),
        };
        if let Err(e) = db.delete_all() {
            return self.degrade_write("Clear", e);
        }
        if let Err(e) = db.vacuum() {
            return self.degrade_write("Compaction", e);
        }
        Ok(())
    }

    /// Erase every record and compact, exactly like
    /// [`clear_all`](Self::clear_all).
    ///
    /// This is NOT a sync-to-disk flush. The name and behavior are retained
    /// for compatibility with the system this store reimplements, where
    /// `flush` has always meant full erasure. Prefer `clear_all` in new code.
    pub fn flush(&self) -> Result<(), StrongboxError> {
        self.clear_all()
    }

    /// Explicitly close the store. Dropping it has the same effect; this form
    /// surfaces close errors per policy.
    pub fn close(self) -> Result<(), StrongboxError> {
        let db = match self.db {
            Some(db) => db,
            None => return Ok(()),
        };
        match db.close() {
            Ok(()) => Ok(()),
            Err(e) => match self.policy {
                ErrorPolicy::Propagate => Err(e.into()),
                ErrorPolicy::Degrade => {
                    tracing::warn!(error = %e, "Close failed");
                    Ok(())
                }
            },
        }
    }

    fn degrade_read<T>(
        &self,
        what: &str,
        err: StoreError,
    ) -> Result<Option<T>, StrongboxError> {
        match self.policy {
            ErrorPolicy::Propagate => Err(err.into()),
            ErrorPolicy::Degrade => {
                tracing::warn!(error = %err, "{} failed; treating as absent", what);
                Ok(None)
            }
        }
    }

    fn degrade_write(&self, what: &str, err: StoreError) -> Result<(), StrongboxError> {
        match self.policy {
            ErrorPolicy::Propagate => Err(err.into()),
            ErrorPolicy::Degrade => {
                tracing::warn!(error = %err, "{} failed; write dropped", what);
                Ok(())
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use tempfile::TempDir;

    use crate::credentials::mock::MemoryProvider;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct RetrySettings {
        retries: u32,
        enabled: bool,
        backoff: Option<Backoff>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Backoff {
        base_ms: u64,
        jitter: bool,
    }

    fn store_at(dir: &TempDir, provider: &MemoryProvider) -> KeyValueStore {
        let config = StoreConfig::new(dir.path().join("kv.db"));
        KeyValueStore::open(config, provider).unwrap()
    }

    #[test]
    fn test_set_bytes_then_get_bytes_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(&dir, &MemoryProvider::new());

        store.set_bytes("token", &[0x01, 0x02, 0x03]).unwrap();
        let value = store.get_bytes("token").unwrap().expect("Value should exist");
        assert_eq!(value, vec![0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_set_bytes_overwrites_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(&dir, &MemoryProvider::new());

        store.set_bytes("k", b"v1").unwrap();
        store.set_bytes("k", b"v2").unwrap();
        assert_eq!(store.get_bytes("k").unwrap().unwrap(), b"v2");
    }

    #[test]
    fn test_get_bytes_for_never_set_key_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(&dir, &MemoryProvider::new());
        assert!(store.get_bytes("missing").unwrap().is_none());
    }

    #[test]
    fn test_clear_all_erases_every_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(&dir, &MemoryProvider::new());

        store.set_bytes("a", &[0x01]).unwrap();
        store.set_bytes("b", &[0x02]).unwrap();
        store.clear_all().unwrap();

        assert!(store.get_bytes("a").unwrap().is_none());
        assert!(store.get_bytes("b").unwrap().is_none());
    }

    #[test]
    fn test_flush_erases_like_clear_all() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(&dir, &MemoryProvider::new());

        store.set_bytes("a", &[0x01]).unwrap();
        store.flush().unwrap();
        assert!(store.get_bytes("a").unwrap().is_none());
    }

    #[test]
    fn test_typed_round_trip_with_nested_optional_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(&dir, &MemoryProvider::new());

        let settings = RetrySettings {
            retries: 3,
            enabled: true,
            backoff: Some(Backoff {
                base_ms: 250,
                jitter: false,
            }),
        };
        store.set_typed("cfg", &settings).unwrap();

        let loaded: RetrySettings = store.get_typed("cfg").unwrap().expect("Value should exist");
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_typed_round_trip_with_absent_optional_field() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(&dir, &MemoryProvider::new());

        let settings = RetrySettings {
            retries: 0,
            enabled: false,
            backoff: None,
        };
        store.set_typed("cfg", &settings).unwrap();

        let loaded: RetrySettings = store.get_typed("cfg").unwrap().unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_decode_failure_is_absent_under_degrade() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(&dir, &MemoryProvider::new());

        store.set_bytes("cfg", b"not json at all").unwrap();
        let loaded: Option<RetrySettings> = store.get_typed("cfg").unwrap();
        assert!(loaded.is_none(), "A decode failure must read as absent");
    }

    #[test]
    fn test_decode_failure_surfaces_under_propagate() {
        let dir = tempfile::tempdir().unwrap();
        let provider = MemoryProvider::new();
        let mut config = StoreConfig::new(dir.path().join("kv.db"));
        config.policy = ErrorPolicy::Propagate;
        let store = KeyValueStore::open(config, &provider).unwrap();

        store.set_bytes("cfg", b"not json at all").unwrap();
        let result: Result<Option<RetrySettings>, _> = store.get_typed("cfg");
        assert!(matches!(
            result,
            Err(StrongboxError::Store(StoreError::Serialization(_)))
        ));
    }

    #[test]
    fn test_values_survive_reopen_with_same_provider() {
        let dir = tempfile::tempdir().unwrap();
        let provider = MemoryProvider::new();

        {
            let store = store_at(&dir, &provider);
            store.set_bytes("token", &[0xCA, 0xFE]).unwrap();
            store.close().unwrap();
        }

        let store = store_at(&dir, &provider);
        assert!(store.is_healthy());
        assert_eq!(store.get_bytes("token").unwrap().unwrap(), vec![0xCA, 0xFE]);
    }

    #[test]
    fn test_reopen_with_different_passphrase_fails_under_propagate() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = store_at(&dir, &MemoryProvider::with_entry(StoreConfig::DEFAULT_ALIAS, b"passphrase-x"));
            store.set_bytes("token", &[0x01]).unwrap();
            store.close().unwrap();
        }

        let mut config = StoreConfig::new(dir.path().join("kv.db"));
        config.policy = ErrorPolicy::Propagate;
        let result = KeyValueStore::open(
            config,
            &MemoryProvider::with_entry(StoreConfig::DEFAULT_ALIAS, b"passphrase-y"),
        );
        assert!(matches!(
            result,
            Err(StrongboxError::Store(StoreError::InvalidPassphrase))
        ));
    }

    #[test]
    fn test_reopen_with_different_passphrase_degrades_to_inert_store() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = store_at(&dir, &MemoryProvider::with_entry(StoreConfig::DEFAULT_ALIAS, b"passphrase-x"));
            store.set_bytes("token", &[0x01]).unwrap();
            store.close().unwrap();
        }

        // Degrade policy: wrong passphrase yields an inert store, never
        // decrypted garbage.
        let store = store_at(&dir, &MemoryProvider::with_entry(StoreConfig::DEFAULT_ALIAS, b"passphrase-y"));
        assert!(!store.is_healthy());
        assert!(store.get_bytes("token").unwrap().is_none());
    }

    #[test]
    fn test_failed_open_degrades_to_inert_store() {
        let dir = tempfile::tempdir().unwrap();
        let provider = MemoryProvider::new();

        // The directory itself is not a valid database file path.
        let config = StoreConfig::new(dir.path());
        let store = KeyValueStore::open(config, &provider).unwrap();

        assert!(!store.is_healthy());
        assert!(store.get_bytes("k").unwrap().is_none());
        store.set_bytes("k", &[0x01]).unwrap();
        assert!(store.get_bytes("k").unwrap().is_none());
        store.clear_all().unwrap();
        store.close().unwrap();
    }

    #[test]
    fn test_failed_open_surfaces_under_propagate() {
        let dir = tempfile::tempdir().unwrap();
        let provider = MemoryProvider::new();

        let mut config = StoreConfig::new(dir.path());
        config.policy = ErrorPolicy::Propagate;
        let result = KeyValueStore::open(config, &provider);
        assert!(result.is_err());
    }

    #[test]
    fn test_first_open_persists_generated_passphrase() {
        let dir = tempfile::tempdir().unwrap();
        let provider = MemoryProvider::new();

        let _store = store_at(&dir, &provider);

        let stored = provider
            .get(StoreConfig::DEFAULT_ALIAS)
            .unwrap()
            .expect("First open must persist a passphrase");
        assert_eq!(stored.len(), 64, "Generated passphrase is 32 bytes hex-encoded");
    }

    #[test]
    fn test_store_works_when_passphrase_persistence_fails() {
        let dir = tempfile::tempdir().unwrap();
        let provider = MemoryProvider::failing_puts();

        // Keyring write failure is degraded-mode for persistence, not fatal
        // for the current process.
        let store = store_at(&dir, &provider);
        assert!(store.is_healthy());
        store.set_bytes("k", &[0x07]).unwrap();
        assert_eq!(store.get_bytes("k").unwrap().unwrap(), vec![0x07]);
    }

    #[test]
    fn test_custom_alias_is_used_for_the_passphrase_entry() {
        let dir = tempfile::tempdir().unwrap();
        let provider = MemoryProvider::new();

        let mut config = StoreConfig::new(dir.path().join("kv.db"));
        config.alias = "otherKey".to_string();
        let _store = KeyValueStore::open(config, &provider).unwrap();

        assert!(provider.get("otherKey").unwrap().is_some());
        assert!(provider.get(StoreConfig::DEFAULT_ALIAS).unwrap().is_none());
    }

    #[test]
    fn test_repeated_write_clear_cycles_do_not_grow_file_unbounded() {
        let dir = tempfile::tempdir().unwrap();
        let provider = MemoryProvider::new();
        let path = dir.path().join("kv.db");
        let store = KeyValueStore::open(StoreConfig::new(&path), &provider).unwrap();

        let mut sizes = Vec::new();
        for cycle in 0..3 {
            for i in 0..32 {
                store
                    .set_bytes(&format!("key-{}-{}", cycle, i), &vec![0x42; 4096])
                    .unwrap();
            }
            store.clear_all().unwrap();
            sizes.push(std::fs::metadata(&path).unwrap().len());
        }

        let first = sizes[0];
        assert!(
            sizes.iter().all(|&s| s <= first * 2),
            "File size must stay bounded across write/clear cycles: {:?}",
            sizes
        );
    }
}
