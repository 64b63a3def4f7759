use std::path::PathBuf;

use thiserror::Error;

/// Startup failure: the working set of accounts could not be built.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read credentials from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no valid credentials found ({skipped} lines skipped)")]
    NoValidAccounts { skipped: usize },
}

/// Writing to or reading from the removal ledger failed.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ledger record encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("ledger line {line} is corrupt: {detail}")]
    Corrupt { line: usize, detail: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("signing failed: {0}")]
    Signing(String),
}
