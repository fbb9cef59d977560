//! generate-recipe - produce never-seen-before trait recipes.
//!
//! The recipe goes to stdout (ready to pipe into the compositor); the
//! fingerprint and all logging go to stderr.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use recipe_engine::rules::RuleTables;
use recipe_engine::types::StreamFallback;
use recipe_engine::{Engine, GenerationParams};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FallbackArg {
    /// An empty on-stream skins position contributes no leaf
    Terminate,
    /// Fall back to every file at that position
    Unfiltered,
}

impl From<FallbackArg> for StreamFallback {
    fn from(arg: FallbackArg) -> Self {
        match arg {
            FallbackArg::Terminate => StreamFallback::Terminate,
            FallbackArg::Unfiltered => StreamFallback::Unfiltered,
        }
    }
}

/// generate-recipe - pick unique trait combinations from a catalog
#[derive(Parser, Debug)]
#[command(name = "generate-recipe")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Catalog root directory (overrides `catalog_root` from --params)
    root: Option<PathBuf>,

    /// JSON file with full generation parameters
    #[arg(long)]
    params: Option<PathBuf>,

    /// Fingerprint ledger file (default trees.txt). A sibling
    /// `<ledger>.lock` file is created next to it for locking.
    #[arg(long, env = "RECIPE_LEDGER")]
    ledger: Option<PathBuf>,

    /// Keep the ledger in memory only
    #[arg(long, conflicts_with = "ledger")]
    no_ledger: bool,

    /// PRNG seed (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Give up after this many colliding attempts
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Number of distinct recipes to produce
    #[arg(long, default_value_t = 1)]
    count: u32,

    /// Policy when the skin stream filter empties a position
    #[arg(long, value_enum)]
    stream_fallback: Option<FallbackArg>,

    /// JSON file replacing the built-in rule tables
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Print the `root_dir:` header line expected by the compositor
    #[arg(long)]
    root_header: bool,

    /// Print each result as a JSON object instead of plain text
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RECIPE_LOG", default_value = "warn")]
    log_level: String,
}

const DEFAULT_LEDGER: &str = "trees.txt";

fn load_params(cli: &Cli) -> Result<GenerationParams> {
    let mut params = match &cli.params {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read params {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("invalid params {}", path.display()))?
        }
        None => {
            let root = cli
                .root
                .clone()
                .context("no catalog root provided; nothing to do")?;
            GenerationParams::new(root)
        }
    };

    if let Some(root) = &cli.root {
        params.catalog_root = root.clone();
    }
    if cli.no_ledger {
        params.ledger_path = None;
    } else if let Some(ledger) = &cli.ledger {
        params.ledger_path = Some(ledger.clone());
    } else if params.ledger_path.is_none() {
        params.ledger_path = Some(PathBuf::from(DEFAULT_LEDGER));
    }
    if cli.seed.is_some() {
        params.seed = cli.seed;
    }
    if cli.max_attempts.is_some() {
        params.max_attempts = cli.max_attempts;
    }
    if let Some(fallback) = cli.stream_fallback {
        params.stream_fallback = fallback.into();
    }
    if let Some(path) = &cli.rules {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read rules {}", path.display()))?;
        let tables: RuleTables = serde_json::from_str(&text)
            .with_context(|| format!("invalid rules {}", path.display()))?;
        params.rules = Some(tables);
    }
    Ok(params)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let params = load_params(&cli)?;
    let root = params.catalog_root.clone();
    let mut engine = Engine::open(params)
        .with_context(|| format!("failed to open catalog {}", root.display()))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for i in 0..cli.count {
        let result = engine.next_unique().context("recipe generation failed")?;
        if cli.json {
            writeln!(out, "{}", serde_json::to_string(&result)?)?;
        } else {
            if i > 0 {
                writeln!(out)?;
            }
            let header = cli.root_header.then_some(result.root_dir.as_str());
            writeln!(out, "{}", result.recipe.render(header))?;
        }
        out.flush()?;
        eprintln!("Permutation completed. Checksum: {}", result.fingerprint);
    }
    Ok(())
}
