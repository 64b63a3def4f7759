//! Quest Agent core
//!
//! Account state, the ordered account registry, the append-only removal
//! ledger and credential signing. The runtime that drives these lives in
//! the `quest-agent` crate.

pub mod account;
pub mod error;
pub mod ledger;
pub mod registry;
pub mod signer;

pub use account::{Account, AccountStatus, Progress, Session};
pub use error::{LedgerError, LoadError, SignerError};
pub use ledger::{read_records, JsonlLedger, RemovalLedger, RemovalRecord};
pub use registry::{AccountRegistry, AccountSnapshot, LoadReport};
pub use signer::{BoundSigner, Credential, EthSigner, Signer};

/// Shorten an identity for log output: `0x1234...abcd`.
pub fn short_id(identity: &str) -> String {
    if identity.len() <= 10 || !identity.is_ascii() {
        return identity.to_string();
    }
    format!("{}...{}", &identity[..6], &identity[identity.len() - 4..])
}
