// Strongbox — SQLCipher Database Primitives
//
// Opens an encrypted SQLCipher database and exposes the raw key-value
// operations over it. The passphrase is applied via PRAGMA before any table
// is touched and verified by probing the schema; a wrong passphrase is a hard
// open failure, never a fall-through to garbage reads.
//
// Lifecycle is modeled by ownership: a live `EncryptedDb` is an open
// connection, `open` failing is the failed transition, and `close` (or Drop)
// ends it. Every prepared statement is a local of the operation that created
// it and is finalized on every exit path.

use std::path::Path;

use rusqlite::Connection;

use super::StoreError;

/// Wrapper around a SQLCipher-encrypted SQLite connection holding the single
/// `kv` table.
#[derive(Debug)]
pub struct EncryptedDb {
    conn: Connection,
}

impl EncryptedDb {
    /// Open (or create) an encrypted database at the given path, keyed with
    /// `passphrase`. SQLCipher derives the file key from the passphrase
    /// internally.
    pub fn open(path: &Path, passphrase: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Open(e.to_string()))?;

        conn.pragma_update(None, "key", passphrase)
            .map_err(|e| StoreError::Open(e.to_string()))?;

        // Verify the passphrase by reading the schema. With the wrong
        // passphrase this fails with "file is not a database".
        conn.execute_batch("SELECT count(*) FROM sqlite_master;")
            .map_err(|_| StoreError::InvalidPassphrase)?;

        tracing::info!(path = %path.display(), "Opened encrypted database");
        Ok(Self { conn })
    }

    /// Open an in-memory database (unencrypted, for testing only).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Open(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Create the `kv` table if it does not exist yet. Idempotent.
    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "CREATE TABLE IF NOT EXISTS kv (
                    key TEXT UNIQUE,
                    value BLOB
                )",
            )
            .map_err(StoreError::Prepare)?;
        stmt.raw_execute().map_err(StoreError::Step)?;
        Ok(())
    }

    /// Insert a record, or replace its value if the key already exists, as one
    /// atomic statement. The insert slot and the conflict-update slot share
    /// the `?2` parameter: both positions always receive the same bytes from a
    /// single bind, and divergent slot contents cannot be expressed.
    pub fn upsert(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut stmt = self
            .conn
            .prepare("INSERT INTO kv (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = ?2")
            .map_err(StoreError::Prepare)?;
        stmt.raw_bind_parameter(1, key).map_err(StoreError::Bind)?;
        stmt.raw_bind_parameter(2, value).map_err(StoreError::Bind)?;
        stmt.raw_execute().map_err(StoreError::Step)?;

        tracing::debug!(key = %key, len = value.len(), "Upserted record");
        Ok(())
    }

    /// Return the value most recently upserted for `key`, or `None` if the
    /// key was never set or has been cleared.
    pub fn select(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM kv WHERE key = ?1")
            .map_err(StoreError::Prepare)?;
        stmt.raw_bind_parameter(1, key).map_err(StoreError::Bind)?;

        let mut rows = stmt.raw_query();
        match rows.next().map_err(StoreError::Step)? {
            Some(row) => {
                let value: Vec<u8> = row.get(0).map_err(StoreError::Step)?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Remove all records unconditionally. Returns the number of rows deleted.
    pub fn delete_all(&self) -> Result<usize, StoreError> {
        let mut stmt = self
            .conn
            .prepare("DELETE FROM kv")
            .map_err(StoreError::Prepare)?;
        let deleted = stmt.raw_execute().map_err(StoreError::Step)?;

        tracing::info!(deleted, "Deleted all records");
        Ok(deleted)
    }

    /// Rebuild the backing file to reclaim space freed by deletions.
    pub fn vacuum(&self) -> Result<(), StoreError> {
        let mut stmt = self.conn.prepare("VACUUM").map_err(StoreError::Prepare)?;
        stmt.raw_execute().map_err(StoreError::Step)?;

        tracing::debug!("Vacuumed database");
        Ok(())
    }

    /// Explicitly close the connection. Dropping the value has the same
    /// effect; this form surfaces close errors.
    pub fn close(self) -> Result<(), StoreError> {
        self.conn.close().map_err(|(_, e)| StoreError::Database(e))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
