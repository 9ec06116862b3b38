// Strongbox — Library root
//
// Embedded encrypted key-value persistence: a SQLCipher database whose
// passphrase lives in the platform keyring, behind a typed key-value façade.

pub mod credentials;
pub mod error;
pub mod store;

pub use error::{Result, StrongboxError};
