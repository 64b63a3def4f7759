//! Sequential pass loop over the account registry.
//!
//! One account at a time: probe, authenticate if needed, perform the
//! action, read progress. Every await point is also a cancellation point;
//! an interrupted account keeps the state it had before the pass touched it.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use colored::Colorize;
use quest_core::{
    short_id, Account, AccountRegistry, BoundSigner, Progress, RemovalLedger, RemovalRecord, Signer,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::campaign::{ActionResult, ActivityStatus, CampaignService};
use crate::pacing::Pacer;
use crate::policy::{RetryPolicy, Step, StepFailure, Verdict};
use crate::report::{AccountOutcome, PassSummary, StatusFile, StatusReport};

/// Why [`Orchestrator::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every account was removed.
    Exhausted,
    /// Shutdown was requested.
    Cancelled,
}

#[derive(Debug)]
struct Cancelled;

enum Interrupt {
    Cancelled,
    Step(StepFailure),
}

impl From<Cancelled> for Interrupt {
    fn from(_: Cancelled) -> Self {
        Interrupt::Cancelled
    }
}

impl From<StepFailure> for Interrupt {
    fn from(f: StepFailure) -> Self {
        Interrupt::Step(f)
    }
}

pub struct Orchestrator {
    registry: AccountRegistry,
    service: Arc<dyn CampaignService>,
    signer: Arc<dyn Signer>,
    ledger: Arc<dyn RemovalLedger>,
    pacer: Box<dyn Pacer>,
    policy: RetryPolicy,
    settle_delay: Duration,
    shutdown: CancellationToken,
    status_file: Option<StatusFile>,
    passes: u64,
}

impl Orchestrator {
    pub fn new(
        registry: AccountRegistry,
        service: Arc<dyn CampaignService>,
        signer: Arc<dyn Signer>,
        ledger: Arc<dyn RemovalLedger>,
        pacer: Box<dyn Pacer>,
    ) -> Self {
        Self {
            registry,
            service,
            signer,
            ledger,
            pacer,
            policy: RetryPolicy::default(),
            settle_delay: Duration::ZERO,
            shutdown: CancellationToken::new(),
            status_file: None,
            passes: 0,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Pause after a fresh login, before the action.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn with_status_file(mut self, file: StatusFile) -> Self {
        self.status_file = Some(file);
        self
    }

    pub fn registry(&self) -> &AccountRegistry {
        &self.registry
    }

    /// Passes started so far.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Run passes until every account is removed or shutdown is requested.
    pub async fn run(&mut self) -> RunOutcome {
        loop {
            if self.registry.is_empty() {
                warn!("{}", "No accounts remaining, stopping".red());
                return RunOutcome::Exhausted;
            }

            let summary = self.run_pass().await;
            summary.log();

            if self.shutdown.is_cancelled() {
                return RunOutcome::Cancelled;
            }
            if self.registry.is_empty() {
                warn!("{}", "No accounts remaining, stopping".red());
                return RunOutcome::Exhausted;
            }

            let delay = self.pacer.between_passes();
            info!(
                "Waiting {:.2}h before pass {}",
                delay.as_secs_f64() / 3600.0,
                self.passes + 1
            );
            if self.pause(delay).await.is_err() {
                return RunOutcome::Cancelled;
            }
        }
    }

    /// One sweep over the accounts registered when the pass starts, in
    /// load order.
    pub async fn run_pass(&mut self) -> PassSummary {
        self.passes += 1;
        let started = Instant::now();
        let mut summary = PassSummary::new(self.passes, Utc::now());

        let order = self.registry.identities();
        let total = order.len();
        info!("Pass {} starting with {} accounts", self.passes, total);

        for (idx, identity) in order.iter().enumerate() {
            if self.shutdown.is_cancelled() {
                break;
            }

            let Some(outcome) = self.process_account(identity, idx + 1, total).await else {
                continue;
            };
            summary.record(&outcome);
            if outcome == AccountOutcome::Cancelled {
                break;
            }

            let more = order[idx + 1..].iter().any(|id| self.registry.contains(id));
            if more {
                let delay = self.pacer.between_accounts();
                info!("Waiting {:.1}s before next account", delay.as_secs_f64());
                if self.pause(delay).await.is_err() {
                    break;
                }
            }
        }

        summary.remaining = self.registry.len();
        summary.elapsed = started.elapsed();
        self.write_status(&summary).await;
        summary
    }

    /// `None` if the identity is no longer registered.
    async fn process_account(
        &mut self,
        identity: &str,
        position: usize,
        total: usize,
    ) -> Option<AccountOutcome> {
        let mut account = self.registry.get(identity).cloned()?;
        let tag = format!("[{}/{}] {}", position, total, short_id(identity));
        info!("{} processing ({})", tag.cyan(), account.status());

        let outcome = match self.run_steps(&mut account, &tag).await {
            Ok(progress) => {
                account.record_success(progress, Utc::now());
                self.registry.replace(account);
                info!(
                    "{} {} score={} xp={}",
                    tag.cyan(),
                    "ok".green(),
                    progress.score,
                    progress.xp.map(|x| x.to_string()).unwrap_or_else(|| "-".into())
                );
                AccountOutcome::Succeeded { score: progress.score }
            }
            Err(Interrupt::Cancelled) => {
                info!("{} interrupted by shutdown, state unchanged", tag);
                AccountOutcome::Cancelled
            }
            Err(Interrupt::Step(failure)) => {
                let reason = failure.to_string();
                let failures = account.record_failure(reason.clone());
                self.registry.replace(account);

                match self.policy.verdict(failures) {
                    Verdict::Retry { remaining } => {
                        warn!(
                            "{} {} ({}/{} failures, {} left): {}",
                            tag.cyan(),
                            "failed".yellow(),
                            failures,
                            self.policy.max_retries(),
                            remaining,
                            reason
                        );
                        AccountOutcome::Failed { reason, failures }
                    }
                    Verdict::Remove => {
                        self.remove_account(identity, &reason, &tag).await;
                        AccountOutcome::Removed { reason }
                    }
                }
            }
        };
        Some(outcome)
    }

    /// Probe, login, action, progress on the working copy.
    async fn run_steps(&self, account: &mut Account, tag: &str) -> Result<Progress, Interrupt> {
        let reuse = if account.can_reuse_session() {
            let probe = self
                .guard(self.service.check_status(account.identity(), account.session()))
                .await?;
            match probe {
                Ok(ActivityStatus::Active) => true,
                Ok(ActivityStatus::Inactive) => {
                    debug!("{} session inactive", tag);
                    false
                }
                Err(e) => {
                    warn!(class = e.class(), "{} status probe failed, logging in again: {}", tag, e);
                    false
                }
            }
        } else {
            false
        };

        if reuse {
            info!("{} already active", tag);
        } else {
            account.begin_authentication();
            let signer = BoundSigner::new(self.signer.as_ref(), account.credential());
            let session = self
                .guard(self.service.authenticate(account.identity(), signer))
                .await?
                .map_err(|e| StepFailure::new(Step::Authenticate, e))?;
            account.activate(session);
            info!("{} logged in", tag);
            self.pause(self.settle_delay).await?;
        }

        let session = account
            .session()
            .cloned()
            .ok_or_else(|| StepFailure::new(Step::Authenticate, "no session issued"))?;

        let action = self
            .guard(self.service.perform_action(&session))
            .await?
            .map_err(|e| StepFailure::new(Step::Action, e))?;
        match action {
            ActionResult::Completed { detail } => {
                debug!("{} action done{}", tag, detail.map(|d| format!(": {d}")).unwrap_or_default())
            }
            ActionResult::Skipped => debug!("{} no action configured", tag),
        }

        let progress = self
            .guard(self.service.fetch_progress(&session))
            .await?
            .map_err(|e| StepFailure::new(Step::Progress, e))?;
        Ok(progress)
    }

    /// Drop the account and ledger it. Not cancellable: once the removal
    /// decision is made the record is always attempted. A failed write is
    /// logged only.
    async fn remove_account(&mut self, identity: &str, reason: &str, tag: &str) {
        let Some(account) = self.registry.remove(identity) else {
            return;
        };
        let record = RemovalRecord::new(&account, reason, Utc::now());

        warn!(
            "{} {} after {} consecutive failures: {}",
            tag.cyan(),
            "removed".red(),
            self.policy.max_retries(),
            reason
        );
        if let Err(e) = self.ledger.append(&record).await {
            error!("{} failed to write removal record: {}", tag, e);
        }
    }

    async fn write_status(&self, summary: &PassSummary) {
        let Some(file) = &self.status_file else {
            return;
        };
        let report = StatusReport {
            pass: summary.pass,
            updated_at: Utc::now(),
            summary,
            accounts: self.registry.snapshot(),
        };
        if let Err(e) = file.write(&report).await {
            error!("failed to write status file {}: {:#}", file.path().display(), e);
        }
    }

    async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, Cancelled> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(Cancelled),
            out = fut => Ok(out),
        }
    }

    async fn pause(&self, delay: Duration) -> Result<(), Cancelled> {
        self.guard(tokio::time::sleep(delay)).await
    }
}
