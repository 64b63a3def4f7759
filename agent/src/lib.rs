//! Quest Agent
//!
//! Runs every loaded account through the campaign's login, check-in and
//! progress steps one at a time, pass after pass, and retires accounts that
//! keep failing.

pub mod campaign;
pub mod config;
pub mod orchestrator;
pub mod pacing;
pub mod policy;
pub mod report;
pub mod shutdown;

pub use campaign::{ActionResult, ActivityStatus, CampaignService, ClaimrClient, ServiceError};
pub use config::{Config, ConfigError};
pub use orchestrator::{Orchestrator, RunOutcome};
pub use pacing::{FixedPacer, JitterPacer, Pacer};
pub use policy::{RetryPolicy, Step, StepFailure, Verdict};
pub use report::{AccountOutcome, PassSummary, StatusFile};
