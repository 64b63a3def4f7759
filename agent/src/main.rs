use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use colored::*;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use quest_agent::{
    shutdown, ClaimrClient, Config, JitterPacer, Orchestrator, RetryPolicy, RunOutcome, StatusFile,
};
use quest_core::{AccountRegistry, EthSigner, JsonlLedger};

#[derive(Parser, Debug)]
#[command(
    name = "quest-agent",
    version,
    about = "Quest Agent - sequential campaign check-ins for a list of wallets",
    long_about = None
)]
struct Cli {
    /// Config file path (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Credentials file, one private key per line
    #[arg(short, long)]
    accounts: Option<PathBuf>,

    /// Removal ledger (JSON Lines, append-only)
    #[arg(long)]
    ledger: Option<PathBuf>,

    /// Write a JSON status snapshot here after every pass
    #[arg(long)]
    status_file: Option<PathBuf>,

    /// Minimum pause between accounts (ms)
    #[arg(long)]
    min_delay_ms: Option<u64>,

    /// Maximum pause between accounts (ms)
    #[arg(long)]
    max_delay_ms: Option<u64>,

    /// Pause between passes (seconds)
    #[arg(long)]
    restart_delay_secs: Option<u64>,

    /// Consecutive failures before an account is removed
    #[arg(long)]
    max_retries: Option<u32>,

    /// Seed for the pacing jitter
    #[arg(long)]
    seed: Option<u64>,

    /// Debug logging
    #[arg(long)]
    debug: bool,

    /// Quiet mode (warnings and errors only)
    #[arg(short, long)]
    quiet: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(p) = &self.accounts { config.accounts.file = p.clone(); }
        if let Some(p) = &self.ledger { config.ledger.path = p.clone(); }
        if let Some(p) = &self.status_file { config.report.status_file = Some(p.clone()); }
        if let Some(v) = self.min_delay_ms { config.schedule.min_delay_ms = v; }
        if let Some(v) = self.max_delay_ms { config.schedule.max_delay_ms = v; }
        if let Some(v) = self.restart_delay_secs { config.schedule.restart_delay_secs = v; }
        if let Some(v) = self.max_retries { config.schedule.max_retries = v; }
        if let Some(v) = self.seed { config.schedule.seed = Some(v); }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("quest_agent={level},quest_core={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!cli.no_color)
        .init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_env();
    cli.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    if !cli.quiet {
        print_banner(&config);
    }

    let signer = Arc::new(EthSigner::new());
    let (registry, report) = AccountRegistry::load_file(&config.accounts.file, signer.as_ref())
        .with_context(|| format!("Failed to load accounts from {}", config.accounts.file.display()))?;
    info!(
        "Loaded {} accounts ({} lines skipped)",
        report.loaded.to_string().bright_yellow(),
        report.skipped.len()
    );

    let client = ClaimrClient::new(config.campaign.clone(), config.schedule.request_timeout())?;
    let ledger = Arc::new(JsonlLedger::new(config.ledger.path.clone()));

    let mut pacer = JitterPacer::new(
        config.schedule.min_delay(),
        config.schedule.max_delay(),
        config.schedule.restart_delay(),
    );
    if let Some(seed) = config.schedule.seed {
        pacer = pacer.with_seed(seed);
    }

    let token = CancellationToken::new();
    shutdown::install(token.clone());

    let mut orchestrator = Orchestrator::new(registry, Arc::new(client), signer, ledger, Box::new(pacer))
        .with_policy(RetryPolicy::new(config.schedule.max_retries))
        .with_settle_delay(config.schedule.settle_delay())
        .with_shutdown(token);
    if let Some(path) = &config.report.status_file {
        orchestrator = orchestrator.with_status_file(StatusFile::new(path));
    }

    match orchestrator.run().await {
        RunOutcome::Exhausted => warn!("All accounts removed, see {}", config.ledger.path.display()),
        RunOutcome::Cancelled => info!("Stopped after {} passes", orchestrator.passes()),
    }

    Ok(())
}

fn print_banner(config: &Config) {
    let s = &config.schedule;
    println!();
    println!("{}", " ╔════════════════════════════════════════════════════╗".bright_cyan());
    println!("{}{}{}", " ║ ".bright_cyan(), "      QUEST AGENT  ·  campaign check-in runner      ".bright_white().bold(), " ║".bright_cyan());
    println!("{}", " ╚════════════════════════════════════════════════════╝".bright_cyan());
    println!("{} {}", " * ".bright_green().bold(), "CONFIG".bright_white().bold());
    println!("{}  {:<12} {}", "   ".bright_black(), "accounts".bright_black(), config.accounts.file.display().to_string().bright_white());
    println!("{}  {:<12} {}", "   ".bright_black(), "campaign".bright_black(), config.campaign.base_url.bright_white());
    println!("{}  {:<12} {}-{} ms", "   ".bright_black(), "jitter".bright_black(), s.min_delay_ms, s.max_delay_ms);
    println!("{}  {:<12} {} s", "   ".bright_black(), "restart".bright_black(), s.restart_delay_secs);
    println!("{}  {:<12} {}", "   ".bright_black(), "max retries".bright_black(), s.max_retries.to_string().bright_magenta());
    println!("{}  {:<12} {}", "   ".bright_black(), "ledger".bright_black(), config.ledger.path.display().to_string().bright_white());
    println!();
}
