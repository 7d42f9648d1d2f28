//! locator-heal operator CLI
//!
//! Captures page snapshots, resolves locators against them with healing, and
//! inspects the healing ledger. Results are printed as JSON on stdout; logs go
//! to stderr (`RUST_LOG=debug` for strategy-level detail).

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use locator_heal::browser::{BrowserSession, ConnectionOptions, LaunchOptions};
use locator_heal::ledger::{HealingLedger, HealingRecord, PromotionSuggested};
use locator_heal::locator::{ElementHandle, LocatorKind, LocatorSpec, ResolveState, Resolver, StrategyKind};
use locator_heal::review::{self, HealingSummary};
use locator_heal::{DomTree, ResolverConfig};
use log::info;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "locator-heal")]
#[command(version)]
#[command(about = "Self-healing element locator resolution", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Capture a page as a JSON snapshot
    Snapshot {
        /// Page to open
        #[arg(long)]
        url: String,

        /// Where to write the snapshot
        #[arg(long, value_name = "FILE")]
        out: PathBuf,

        /// Launch browser in headed mode (default: headless)
        #[arg(long, short = 'H')]
        headed: bool,

        /// Path to custom browser executable
        #[arg(long, value_name = "PATH")]
        executable_path: Option<PathBuf>,

        /// WebSocket endpoint URL for remote browser connection
        #[arg(long, value_name = "URL")]
        ws_endpoint: Option<String>,
    },

    /// Resolve a locator against a snapshot
    Resolve {
        /// Snapshot written by `snapshot`
        #[arg(long, value_name = "FILE")]
        page: PathBuf,

        /// Primary query
        #[arg(long)]
        query: String,

        #[arg(long, value_enum, default_value = "css")]
        kind: LocatorKind,

        /// Expected attribute, repeatable (e.g. --attr data-testid=login)
        #[arg(long = "attr", value_name = "NAME=VALUE", value_parser = parse_key_val)]
        attributes: Vec<(String, String)>,

        /// Expected visible text
        #[arg(long)]
        text: Option<String>,

        /// Stable locator id used as the ledger key
        #[arg(long)]
        id: Option<String>,

        /// Human-readable description of the element
        #[arg(long)]
        description: Option<String>,

        /// JSON-lines healing ledger (in-memory when omitted)
        #[arg(long, value_name = "FILE")]
        ledger: Option<PathBuf>,

        /// Resolver configuration (JSON)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Fail when the primary query matches several elements
        #[arg(long)]
        strict: bool,
    },

    /// Print the healing history of one locator
    History {
        #[arg(long, value_name = "FILE")]
        ledger: PathBuf,

        #[arg(long = "locator", value_name = "ID")]
        locator_id: String,
    },

    /// Summarize the ledger and list promotion candidates
    Review {
        #[arg(long, value_name = "FILE")]
        ledger: PathBuf,

        /// Consecutive identical heals required for promotion
        #[arg(long, default_value_t = 3)]
        window: usize,
    },
}

#[derive(Serialize)]
struct ResolveOutput {
    locator_id: String,
    matched_by: StrategyKind,
    healed: bool,
    score: f64,
    query: String,
    kind: LocatorKind,
    tag_name: String,
    text: String,
    record: Option<HealingRecord>,
    promotion: Option<PromotionSuggested>,
    trace: Vec<ResolveState>,
}

#[derive(Serialize)]
struct ReviewOutput {
    promotions: Vec<PromotionSuggested>,
    locators: Vec<HealingSummary>,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", s))?;
    if key.trim().is_empty() {
        return Err(format!("empty attribute name in '{}'", s));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Command::Snapshot {
            url,
            out,
            headed,
            executable_path,
            ws_endpoint,
        } => {
            let session = match ws_endpoint {
                Some(endpoint) => BrowserSession::connect(ConnectionOptions::new(endpoint))?,
                None => {
                    let mut options = LaunchOptions::new().headless(!headed);
                    if let Some(path) = executable_path {
                        options = options.chrome_path(path);
                    }
                    BrowserSession::launch(options)?
                }
            };

            session.navigate(&url)?;
            let tree = session.snapshot()?;
            fs::write(&out, tree.to_json()?).with_context(|| format!("Failed to write {}", out.display()))?;
            info!("Wrote snapshot of {} ({} elements) to {}", url, tree.count_elements(), out.display());
        }

        Command::Resolve {
            page,
            query,
            kind,
            attributes,
            text,
            id,
            description,
            ledger,
            config,
            strict,
        } => {
            let json = fs::read_to_string(&page).with_context(|| format!("Failed to read {}", page.display()))?;
            let tree = DomTree::from_json(&json)?;

            let mut config = match config {
                Some(path) => ResolverConfig::from_file(path)?,
                None => ResolverConfig::default(),
            };
            if strict {
                config = config.strict(true);
            }

            // a broken ledger never blocks resolution
            let ledger = match ledger {
                Some(path) => HealingLedger::open_or_in_memory(&path),
                None => HealingLedger::in_memory(),
            };

            let mut spec = LocatorSpec::new(kind, query);
            for (name, value) in attributes {
                spec = spec.with_expected_attribute(name, value);
            }
            if let Some(text) = text {
                spec = spec.with_expected_text(text);
            }
            if let Some(id) = id {
                spec = spec.with_id(id);
            }
            if let Some(description) = description {
                spec = spec.with_description(description);
            }

            let resolver = Resolver::new(config, ledger);
            let resolution = resolver.resolve(&spec, &tree).await?;

            print_json(&ResolveOutput {
                locator_id: spec.locator_id(),
                matched_by: resolution.matched_by,
                healed: resolution.is_healed(),
                score: resolution.score,
                query: resolution.query.clone(),
                kind: resolution.kind,
                tag_name: resolution.element.tag_name(),
                text: resolution.element.text(),
                record: resolution.record.clone(),
                promotion: resolution.promotion.clone(),
                trace: resolution.trace.clone(),
            })?;
        }

        Command::History { ledger, locator_id } => {
            if !ledger.exists() {
                bail!("Ledger {} does not exist", ledger.display());
            }
            let ledger = HealingLedger::open(&ledger)?;
            let records = ledger.history(&locator_id).to_vec()?;
            print_json(&records)?;
        }

        Command::Review { ledger, window } => {
            if !ledger.exists() {
                bail!("Ledger {} does not exist", ledger.display());
            }
            let ledger = HealingLedger::open(&ledger)?;
            print_json(&ReviewOutput {
                promotions: review::promotion_candidates(&ledger, window)?,
                locators: review::summarize(&ledger)?,
            })?;
        }
    }

    Ok(())
}
