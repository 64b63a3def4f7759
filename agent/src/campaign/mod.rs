//! Campaign service contract.
//!
//! The orchestrator only depends on [`CampaignService`]; wire details live
//! in the implementations (`claimr` for the production HTTP API).

pub mod claimr;

pub use claimr::ClaimrClient;

use async_trait::async_trait;
use quest_core::{BoundSigner, Progress, Session, SignerError};
use thiserror::Error;

/// Classified failure of a remote call. The class label is part of the
/// `Display` output so that it survives into failure reasons.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("transient-network: {0}")]
    Transport(String),

    #[error("rejected-by-service: {0}")]
    Rejected(String),

    #[error("malformed-response: {0}")]
    Malformed(String),

    /// The login challenge could not be signed locally.
    #[error("signing: {0}")]
    Signer(#[from] SignerError),
}

impl ServiceError {
    pub fn class(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transient-network",
            Self::Rejected(_) => "rejected-by-service",
            Self::Malformed(_) => "malformed-response",
            Self::Signer(_) => "signing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResult {
    Completed { detail: Option<String> },
    /// No periodic action is configured for this campaign.
    Skipped,
}

#[async_trait]
pub trait CampaignService: Send + Sync {
    /// Sign the service's login challenge through `signer` and exchange it
    /// for a session.
    async fn authenticate(
        &self,
        identity: &str,
        signer: BoundSigner<'_>,
    ) -> Result<Session, ServiceError>;

    /// Side-effect free probe of whether the account is already active.
    async fn check_status(
        &self,
        identity: &str,
        session: Option<&Session>,
    ) -> Result<ActivityStatus, ServiceError>;

    /// The periodic engagement action (check-in).
    async fn perform_action(&self, session: &Session) -> Result<ActionResult, ServiceError>;

    async fn fetch_progress(&self, session: &Session) -> Result<Progress, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_error_class() {
        let e = ServiceError::Rejected("HTTP 401 Unauthorized".into());
        assert_eq!(e.to_string(), "rejected-by-service: HTTP 401 Unauthorized");
        assert_eq!(e.class(), "rejected-by-service");
        assert_eq!(ServiceError::Transport("timeout".into()).class(), "transient-network");
        assert_eq!(ServiceError::Malformed("eof".into()).class(), "malformed-response");
    }
}
