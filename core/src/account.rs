//! Per-account state.
//!
//! All mutation goes through the transition methods below so that an
//! account can never leave `Removed` and never carries a session or a
//! failure counter once removed.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::signer::Credential;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// Loaded, not yet processed.
    Pending,
    /// Signing and logging in.
    Authenticating,
    /// Last pass succeeded (or a fresh login just succeeded).
    Active,
    /// Last pass ended in a step failure.
    Erroring,
    /// Terminal; dropped from the registry.
    Removed,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Authenticating => "authenticating",
            Self::Active => "active",
            Self::Erroring => "erroring",
            Self::Removed => "removed",
        };
        f.write_str(s)
    }
}

/// Opaque token bundle issued by the campaign service on login.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub issued_at: DateTime<Utc>,
}

impl Session {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            issued_at: Utc::now(),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Cumulative progress as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    pub score: u64,
    pub xp: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Account {
    identity: String,
    credential: Credential,
    status: AccountStatus,
    session: Option<Session>,
    last_success: Option<DateTime<Utc>>,
    progress: Progress,
    consecutive_failures: u32,
    last_error: Option<String>,
}

impl Account {
    pub fn new(identity: impl Into<String>, credential: Credential) -> Self {
        Self {
            identity: identity.into(),
            credential,
            status: AccountStatus::Pending,
            session: None,
            last_success: None,
            progress: Progress::default(),
            consecutive_failures: 0,
            last_error: None,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn status(&self) -> AccountStatus {
        self.status
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.last_success
    }

    pub fn score(&self) -> u64 {
        self.progress.score
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// A cached session may be reused only if the previous pass succeeded.
    pub fn can_reuse_session(&self) -> bool {
        self.status == AccountStatus::Active && self.session.is_some()
    }

    /// Enter `Authenticating`, discarding any stale session.
    pub fn begin_authentication(&mut self) {
        if self.status == AccountStatus::Removed {
            return;
        }
        self.status = AccountStatus::Authenticating;
        self.session = None;
    }

    /// Login succeeded: cache the session and become `Active`.
    pub fn activate(&mut self, session: Session) {
        if self.status == AccountStatus::Removed {
            return;
        }
        self.status = AccountStatus::Active;
        self.session = Some(session);
    }

    /// A full step sequence succeeded.
    pub fn record_success(&mut self, progress: Progress, at: DateTime<Utc>) {
        if self.status == AccountStatus::Removed {
            return;
        }
        self.progress = progress;
        self.last_success = Some(at);
        self.status = AccountStatus::Active;
        self.consecutive_failures = 0;
        self.last_error = None;
    }

    /// A step failed. Returns the new consecutive failure count.
    pub fn record_failure(&mut self, reason: impl Into<String>) -> u32 {
        if self.status == AccountStatus::Removed {
            return 0;
        }
        self.status = AccountStatus::Erroring;
        self.last_error = Some(reason.into());
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_failures
    }

    /// Terminal transition. Clears the session and the failure counter.
    pub(crate) fn mark_removed(&mut self) {
        self.status = AccountStatus::Removed;
        self.session = None;
        self.consecutive_failures = 0;
    }
}
