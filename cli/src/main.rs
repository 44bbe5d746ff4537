//! Provena audit ledger CLI
//!
//! Appends entries to, lists, and verifies per-organization audit chains
//! stored in a JSON-lines file.  `demo` runs a self-contained in-memory
//! walkthrough.
//!
//! Usage:
//!   provena append --org org-1 --actor alice --action assessment.run \
//!       --request '{"x":1}' --response '{"y":1}'
//!   provena verify --org org-1 --insights
//!   provena list --org org-1
//!   provena demo

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use provena_audit::{
    verify_entries, ChainVerifier, ChainWriter, InMemoryAuditLogRepository,
    JsonLinesAuditLogRepository, RuleBasedInsights, VerificationService,
};
use provena_contracts::{
    config::{ChainConsistencyMode, LedgerConfig},
    entry::{EntryStatus, NewEntry},
    error::{LedgerError, LedgerResult},
    payload::Payload,
    GENESIS_HASH,
};
use provena_core::traits::AuditLogRepository;

/// Exit code when a verified chain turns out to be broken.
const EXIT_CHAIN_BROKEN: i32 = 2;

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "provena",
    about = "Tenant-scoped, hash-chained compliance audit ledger",
    long_about = "Appends compliance actions to per-organization SHA-256 hash chains\n\
                  and verifies that no stored entry has been altered."
)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON-lines store; overrides `storage.path` from the config.
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Append one entry to an organization's chain.
    Append {
        #[arg(long)]
        org: String,
        #[arg(long)]
        actor: String,
        #[arg(long)]
        action: String,
        /// Request payload as JSON.
        #[arg(long, default_value = "null")]
        request: String,
        /// Response summary as JSON.
        #[arg(long, default_value = "null")]
        response: String,
        #[arg(long)]
        event_type: Option<String>,
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },
    /// Verify an organization's chain and print the result as JSON.
    Verify {
        #[arg(long)]
        org: String,
        /// Attach a plain-language summary and recommendation.
        #[arg(long)]
        insights: bool,
    },
    /// Print an organization's entries in chain order.
    List {
        #[arg(long)]
        org: String,
    },
    /// Run an in-memory walkthrough: two linked entries, then a forged one.
    Demo,
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Success,
    Error,
}

impl From<StatusArg> for EntryStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Success => EntryStatus::Success,
            StatusArg::Error => EntryStatus::Error,
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => LedgerConfig::from_file(path),
        None => Ok(LedgerConfig::default()),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("provena: {}", e);
            std::process::exit(1);
        }
    };

    // RUST_LOG wins over the configured filter.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match run(cli, config) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("provena: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli, config: LedgerConfig) -> LedgerResult<i32> {
    let store_path = cli.store.unwrap_or(config.storage.path);
    let open_store = || -> LedgerResult<Arc<dyn AuditLogRepository>> {
        debug!(store = %store_path.display(), "opening audit store");
        Ok(Arc::new(JsonLinesAuditLogRepository::open(store_path.clone())?))
    };

    match cli.command {
        Command::Demo => run_demo(config.chain.consistency),

        Command::Append {
            org,
            actor,
            action,
            request,
            response,
            event_type,
            status,
        } => {
            let mut new = NewEntry::new(org, actor, action)
                .with_request(parse_payload("--request", &request)?)
                .with_response(parse_payload("--response", &response)?);
            if let Some(event_type) = event_type {
                new = new.with_event_type(event_type);
            }
            if let Some(status) = status {
                new = new.with_status(status.into());
            }

            let writer = ChainWriter::new(open_store()?, config.chain.consistency);
            let entry = writer.append(new)?;
            print_json(&entry)?;
            Ok(0)
        }

        Command::Verify { org, insights } => {
            let verifier = ChainVerifier::new(open_store()?)
                .with_hash_recomputation(config.verification.recompute_hashes);
            let mut service = VerificationService::new(verifier);
            if insights {
                service = service.with_insights(Box::new(RuleBasedInsights::new()));
            }

            let response = service.verify(&org)?;
            print_json(&response)?;
            Ok(if response.verification.is_valid {
                0
            } else {
                EXIT_CHAIN_BROKEN
            })
        }

        Command::List { org } => {
            let entries = open_store()?.find_all_by_org_ordered_by_time(&org)?;
            print_json(&entries)?;
            Ok(0)
        }
    }
}

// ── Demo ──────────────────────────────────────────────────────────────────────

fn run_demo(mode: ChainConsistencyMode) -> LedgerResult<i32> {
    println!();
    println!("Provena: hash-chained audit ledger demo");
    println!("========================================");
    println!();

    let repo: Arc<dyn AuditLogRepository> = Arc::new(InMemoryAuditLogRepository::new());
    let writer = ChainWriter::new(repo.clone(), mode);
    let org = "org-1";

    let a = writer.append_entry(
        org,
        "alice@example.com",
        "assessment.run",
        parse_payload("request", r#"{"x":1}"#)?,
        parse_payload("response", r#"{"y":1}"#)?,
    )?;
    let b = writer.append_entry(
        org,
        "alice@example.com",
        "assessment.run",
        parse_payload("request", r#"{"x":2}"#)?,
        parse_payload("response", r#"{"y":2}"#)?,
    )?;

    for (name, entry) in [("A", &a), ("B", &b)] {
        println!("Entry {} ({})", name, entry.id);
        println!("  prev_hash   {}", entry.prev_hash.as_deref().unwrap_or("-"));
        println!("  output_hash {}", entry.output_hash.as_deref().unwrap_or("-"));
    }
    println!();
    println!(
        "A links to genesis: {}",
        a.prev_hash.as_deref() == Some(GENESIS_HASH)
    );
    println!("B links to A:       {}", b.prev_hash == a.output_hash);

    let report = ChainVerifier::new(repo.clone()).verify_chain(org)?;
    println!(
        "Verification:       is_valid={} total_entries={}",
        report.is_valid, report.total_entries
    );
    println!();

    // Forge A's recorded outcome on a copy of the chain.
    let mut forged = repo.find_all_by_org_ordered_by_time(org)?;
    if let Some(first) = forged.first_mut() {
        first.response_summary = parse_payload("response", r#"{"y":"forged"}"#)?;
    }
    let forged_report = verify_entries(org, &forged, true);

    println!("After editing A's response summary:");
    println!("  is_valid={}", forged_report.is_valid);
    for link in &forged_report.broken_links {
        println!(
            "  broken: entry {} ({:?}) expected {} found {}",
            link.entry_id, link.kind, link.expected_hash, link.actual_hash
        );
    }
    println!();

    Ok(0)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn parse_payload(flag: &str, raw: &str) -> LedgerResult<Payload> {
    serde_json::from_str::<serde_json::Value>(raw)
        .map(Payload::from)
        .map_err(|e| LedgerError::Serialization {
            reason: format!("{} is not valid JSON: {}", flag, e),
        })
}

fn print_json<T: serde::Serialize>(value: &T) -> LedgerResult<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| LedgerError::Serialization {
        reason: format!("failed to render output: {}", e),
    })?;
    println!("{}", text);
    Ok(())
}
