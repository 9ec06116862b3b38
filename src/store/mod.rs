// Strongbox — Store Module
//
// Encrypted key-value persistence over SQLCipher. A single `kv` table maps
// unique text keys to opaque blob values; the whole file is encrypted at rest
// with a passphrase held by the credentials module.

mod db;
mod error;
mod kv;

pub use db::EncryptedDb;
pub use error::StoreError;
pub use kv::{ErrorPolicy, KeyValueStore, StoreConfig};
