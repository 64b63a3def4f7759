//! Retry/removal policy and step failure reasons.

use std::fmt;

/// Failures are counted across passes; one attempt per account per pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Keep the account; it is retried on the next pass.
    Retry { remaining: u32 },
    /// Threshold reached: ledger and drop the account.
    Remove,
}

impl RetryPolicy {
    /// A threshold of zero is treated as one.
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries: max_retries.max(1) }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn verdict(&self, consecutive_failures: u32) -> Verdict {
        if consecutive_failures >= self.max_retries {
            Verdict::Remove
        } else {
            Verdict::Retry { remaining: self.max_retries - consecutive_failures }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Authenticate,
    Action,
    Progress,
}

impl Step {
    fn label(self) -> &'static str {
        match self {
            Step::Authenticate => "authentication failed",
            Step::Action => "action failed",
            Step::Progress => "progress fetch failed",
        }
    }
}

/// One unsuccessful step in an account's sequence. `Display` is the
/// reason string recorded on the account and in the removal ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub step: Step,
    pub detail: String,
}

impl StepFailure {
    pub fn new(step: Step, detail: impl fmt::Display) -> Self {
        Self { step, detail: detail.to_string() }
    }
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.step.label(), self.detail)
    }
}

impl std::error::Error for StepFailure {}
