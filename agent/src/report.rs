//! Per-pass summaries and the optional JSON status file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use colored::Colorize;
use quest_core::AccountSnapshot;
use serde::Serialize;

/// What happened to one account during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountOutcome {
    Succeeded { score: u64 },
    Failed { reason: String, failures: u32 },
    Removed { reason: String },
    /// Shutdown interrupted the account; its state was left untouched.
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct PassSummary {
    pub pass: u64,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub removed: usize,
    /// Accounts still registered after the pass.
    pub remaining: usize,
    pub started_at: DateTime<Utc>,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

impl PassSummary {
    pub fn new(pass: u64, started_at: DateTime<Utc>) -> Self {
        Self {
            pass,
            attempted: 0,
            succeeded: 0,
            failed: 0,
            removed: 0,
            remaining: 0,
            started_at,
            elapsed: Duration::ZERO,
        }
    }

    pub fn record(&mut self, outcome: &AccountOutcome) {
        match outcome {
            AccountOutcome::Succeeded { .. } => {
                self.attempted += 1;
                self.succeeded += 1;
            }
            AccountOutcome::Failed { .. } => {
                self.attempted += 1;
                self.failed += 1;
            }
            AccountOutcome::Removed { .. } => {
                self.attempted += 1;
                self.failed += 1;
                self.removed += 1;
            }
            AccountOutcome::Cancelled => {}
        }
    }

    pub fn log(&self) {
        tracing::info!(
            "{} pass {} done in {:.1}s: {} ok, {} failed, {} removed, {} remaining",
            "✔".green(),
            self.pass,
            self.elapsed.as_secs_f64(),
            self.succeeded.to_string().green(),
            self.failed.to_string().yellow(),
            self.removed.to_string().red(),
            self.remaining
        );
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

#[derive(Debug, Serialize)]
pub struct StatusReport<'a> {
    pub pass: u64,
    pub updated_at: DateTime<Utc>,
    pub summary: &'a PassSummary,
    pub accounts: Vec<AccountSnapshot>,
}

/// JSON status document for external dashboards. Written to a sibling
/// temp file and renamed so readers never see a partial document.
#[derive(Debug, Clone)]
pub struct StatusFile {
    path: PathBuf,
}

impl StatusFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write(&self, report: &StatusReport<'_>) -> anyhow::Result<()> {
        let payload = serde_json::to_vec_pretty(report)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, payload).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_outcomes() {
        let mut s = PassSummary::new(1, Utc::now());
        s.record(&AccountOutcome::Succeeded { score: 10 });
        s.record(&AccountOutcome::Failed { reason: "action failed: x".into(), failures: 1 });
        s.record(&AccountOutcome::Removed { reason: "action failed: x".into() });
        s.record(&AccountOutcome::Cancelled);
        assert_eq!((s.attempted, s.succeeded, s.failed, s.removed), (3, 1, 2, 1));
    }

    #[tokio::test]
    async fn status_file_is_replaced_whole() {
        let dir = tempfile::tempdir().unwrap();
        let file = StatusFile::new(dir.path().join("nested").join("status.json"));

        let mut summary = PassSummary::new(2, Utc::now());
        summary.remaining = 0;
        summary.elapsed = Duration::from_millis(1500);
        let report = StatusReport { pass: 2, updated_at: Utc::now(), summary: &summary, accounts: Vec::new() };
        file.write(&report).await.unwrap();
        file.write(&report).await.unwrap();

        let text = std::fs::read_to_string(file.path()).unwrap();
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["pass"], 2);
        assert_eq!(v["summary"]["elapsed"], 1500);
        assert!(!file.path().with_extension("tmp").exists());
    }
}
