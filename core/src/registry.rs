//! Ordered, keyed working set of accounts.
//!
//! Iteration order is load order and is stable across passes; removals
//! leave the relative order of the remaining accounts unchanged.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::account::{Account, AccountStatus};
use crate::error::LoadError;
use crate::short_id;
use crate::signer::{Credential, Signer};

/// Why a credential line was not loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based line number in the source.
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: Vec<SkippedLine>,
}

/// Credential-free view of an account, for status output.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSnapshot {
    pub identity: String,
    pub status: AccountStatus,
    pub score: u64,
    pub xp: Option<u64>,
    pub last_success: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

impl From<&Account> for AccountSnapshot {
    fn from(a: &Account) -> Self {
        Self {
            identity: short_id(a.identity()),
            status: a.status(),
            score: a.score(),
            xp: a.progress().xp,
            last_success: a.last_success(),
            consecutive_failures: a.consecutive_failures(),
            last_error: a.last_error().map(str::to_string),
        }
    }
}

#[derive(Debug, Default)]
pub struct AccountRegistry {
    accounts: BTreeMap<u64, Account>,
    index: HashMap<String, u64>,
    next_seq: u64,
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read one credential per line from `path`.
    pub fn load_file(
        path: impl AsRef<Path>,
        signer: &dyn Signer,
    ) -> Result<(Self, LoadReport), LoadError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_credentials(content.lines(), signer)
    }

    /// Build the registry from raw credential lines. Blank lines are ignored;
    /// invalid or duplicate credentials are skipped with a warning. Fails if
    /// nothing usable remains.
    pub fn from_credentials<'a, I>(
        lines: I,
        signer: &dyn Signer,
    ) -> Result<(Self, LoadReport), LoadError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut registry = Self::new();
        let mut report = LoadReport::default();

        for (idx, raw) in lines.into_iter().enumerate() {
            let line = idx + 1;
            if raw.trim().is_empty() {
                continue;
            }
            let credential = Credential::new(raw);
            let identity = match signer.identity(&credential) {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!(line, "skipping credential: {}", e);
                    report.skipped.push(SkippedLine { line, reason: e.to_string() });
                    continue;
                }
            };
            if !registry.insert(Account::new(identity.clone(), credential)) {
                tracing::warn!(line, identity = %short_id(&identity), "skipping duplicate credential");
                report.skipped.push(SkippedLine {
                    line,
                    reason: format!("duplicate of {}", short_id(&identity)),
                });
                continue;
            }
            report.loaded += 1;
        }

        if registry.is_empty() {
            return Err(LoadError::NoValidAccounts { skipped: report.skipped.len() });
        }
        Ok((registry, report))
    }

    /// Append an account. Returns `false` (and changes nothing) if the
    /// identity is already registered.
    fn insert(&mut self, account: Account) -> bool {
        if self.index.contains_key(account.identity()) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.index.insert(account.identity().to_string(), seq);
        self.accounts.insert(seq, account);
        true
    }

    /// Drop an account permanently and hand back its final state, with the
    /// status set to `Removed`. Removing an unknown identity is a no-op.
    pub fn remove(&mut self, identity: &str) -> Option<Account> {
        let seq = self.index.remove(identity)?;
        let mut account = self.accounts.remove(&seq)?;
        account.mark_removed();
        Some(account)
    }

    /// Overwrite a registered account in place, keeping its position.
    /// Returns `false` if the identity is not registered.
    pub fn replace(&mut self, account: Account) -> bool {
        match self.index.get(account.identity()) {
            Some(seq) => {
                self.accounts.insert(*seq, account);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, identity: &str) -> Option<&Account> {
        self.index.get(identity).and_then(|seq| self.accounts.get(seq))
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.index.contains_key(identity)
    }

    /// Accounts in load order.
    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    /// Identities in load order, detached from the registry borrow.
    pub fn identities(&self) -> Vec<String> {
        self.iter().map(|a| a.identity().to_string()).collect()
    }

    pub fn snapshot(&self) -> Vec<AccountSnapshot> {
        self.iter().map(AccountSnapshot::from).collect()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
