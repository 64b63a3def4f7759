//! Append-only record of permanently removed accounts.
//!
//! The on-disk format is JSON Lines: one `RemovalRecord` per line. The file
//! is only ever opened for appending, so history from earlier runs survives.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::account::Account;
use crate::error::LedgerError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalRecord {
    pub identity: String,
    /// Retained for audit and manual recovery.
    pub credential: String,
    pub reason: String,
    pub removed_at: DateTime<Utc>,
}

impl RemovalRecord {
    pub fn new(account: &Account, reason: impl Into<String>, removed_at: DateTime<Utc>) -> Self {
        Self {
            identity: account.identity().to_string(),
            credential: account.credential().expose().to_string(),
            reason: reason.into(),
            removed_at,
        }
    }
}

#[async_trait]
pub trait RemovalLedger: Send + Sync {
    async fn append(&self, record: &RemovalRecord) -> Result<(), LedgerError>;
}

/// File-backed ledger.
#[derive(Debug, Clone)]
pub struct JsonlLedger {
    path: PathBuf,
}

impl JsonlLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> LedgerError {
        LedgerError::Io { path: self.path.clone(), source }
    }
}

#[async_trait]
impl RemovalLedger for JsonlLedger {
    async fn append(&self, record: &RemovalRecord) -> Result<(), LedgerError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_err(e))?;
        file.write_all(line.as_bytes()).await.map_err(|e| self.io_err(e))?;
        file.flush().await.map_err(|e| self.io_err(e))?;
        file.sync_data().await.map_err(|e| self.io_err(e))?;
        Ok(())
    }
}

/// Reload every record in write order. A missing file is an empty ledger.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<RemovalRecord>, LedgerError> {
    let path = path.as_ref();
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(LedgerError::Io { path: path.to_path_buf(), source }),
    };

    let mut records = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| LedgerError::Io { path: path.to_path_buf(), source })?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| LedgerError::Corrupt {
            line: idx + 1,
            detail: e.to_string(),
        })?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::Credential;

    fn record(id: &str, reason: &str) -> RemovalRecord {
        let account = Account::new(id, Credential::new("deadbeef"));
        RemovalRecord::new(&account, reason, Utc::now())
    }

    #[tokio::test]
    async fn append_then_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = JsonlLedger::new(dir.path().join("removed.jsonl"));

        let r = record("0xaaa", "action failed: rejected-by-service: HTTP 401, \"quoted\"\nnewline");
        ledger.append(&r).await.unwrap();

        let loaded = read_records(ledger.path()).unwrap();
        assert_eq!(loaded, vec![r.clone()]);
        assert_eq!(loaded[0].removed_at, r.removed_at);
        assert_eq!(loaded[0].credential, "deadbeef");
    }

    #[tokio::test]
    async fn appends_never_overwrite_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("removed.jsonl");

        let first = record("0x111", "authentication failed: a");
        JsonlLedger::new(&path).append(&first).await.unwrap();

        // A later run opens a fresh ledger on the same file.
        let second = record("0x222", "progress fetch failed: b");
        JsonlLedger::new(&path).append(&second).await.unwrap();

        let loaded = read_records(&path).unwrap();
        assert_eq!(loaded, vec![first, second]);
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_records(dir.path().join("nope.jsonl")).unwrap().is_empty());
    }

    #[test]
    fn corrupt_line_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("removed.jsonl");
        std::fs::write(&path, "{not json}\n").unwrap();
        assert!(matches!(read_records(&path), Err(LedgerError::Corrupt { line: 1, .. })));
    }

    #[tokio::test]
    async fn unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for appending.
        let ledger = JsonlLedger::new(dir.path());
        assert!(matches!(
            ledger.append(&record("0x1", "r")).await,
            Err(LedgerError::Io { .. })
        ));
    }
}
