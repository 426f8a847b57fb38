//! MarketPulse CLI: quote aggregation, snapshots, ranges and history export.
//!
//! Commands:
//! - `quotes`: aggregated payload map (last price plus monthly roll-up) with benchmarks
//! - `fields`: latest values of selected quote fields
//! - `ranges`: trailing high/low/current over a window of trading days
//! - `history`: daily bars of one ticker, exported to Parquet or CSV
//! - `shell`: long-lived session sharing one cache across requests

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use marketpulse_core::data::{
    CircuitBreaker, CsvProvider, MarketDataProvider, SyntheticProvider, YahooProvider,
};
use marketpulse_core::export::write_frame;
use marketpulse_core::validation::validate_period;
use marketpulse_core::{CacheStore, MarketConfig, MarketService};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "marketpulse",
    about = "MarketPulse CLI: quote aggregation with benchmarks and monthly roll-ups"
)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Market data source.
    #[arg(long, value_enum, default_value_t = ProviderKind::Yahoo, global = true)]
    provider: ProviderKind,

    /// Wide CSV file (required with --provider csv).
    #[arg(long, global = true)]
    csv: Option<PathBuf>,

    /// Disable caching: every request goes to the provider.
    #[arg(long, default_value_t = false, global = true)]
    no_cache: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProviderKind {
    Yahoo,
    Synthetic,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate quotes for tickers (benchmarks are always included).
    Quotes {
        #[arg(required = true)]
        tickers: Vec<String>,
    },
    /// Snapshot selected fields of each ticker's latest bar.
    Fields {
        #[arg(required = true)]
        tickers: Vec<String>,

        /// Comma-separated fields: close, previousClose, open, high, low, volume.
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
    },
    /// Trailing price range per ticker.
    Ranges {
        #[arg(required = true)]
        tickers: Vec<String>,

        /// Window in trading days (clamped to 1..=1095).
        #[arg(long, default_value_t = 252, allow_negative_numbers = true)]
        window: i64,
    },
    /// Daily history of one ticker.
    History {
        ticker: String,

        /// Lookback: 1d, 5d, 1mo, 6mo or 1y. Anything else falls back to 5d.
        #[arg(long, default_value = "6mo")]
        period: String,

        /// Write to this .parquet or .csv file instead of printing JSON.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Read one ticker list per line; `:clear [prefix]`, `:stats`, `:quit`.
    Shell,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let provider = build_provider(cli.provider, cli.csv.as_deref(), &config)?;
    let caches = if cli.no_cache {
        CacheStore::disabled()
    } else {
        CacheStore::in_memory()
    };
    tracing::debug!(provider = provider.name(), no_cache = cli.no_cache, "service ready");
    let service = MarketService::new(provider, caches, config);

    match cli.command {
        Commands::Quotes { tickers } => print_json(&service.aggregate(&tickers)?),
        Commands::Fields { tickers, fields } => print_json(&service.field_quotes(&tickers, &fields)?),
        Commands::Ranges { tickers, window } => print_json(&service.price_ranges(&tickers, window)?),
        Commands::History {
            ticker,
            period,
            out,
        } => run_history(&service, &ticker, &period, out.as_deref()),
        Commands::Shell => run_shell(&service),
    }
}

/// Logs go to stderr so stdout stays pipeable JSON. `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<MarketConfig> {
    let config = match path {
        Some(p) => MarketConfig::from_file(p).with_context(|| format!("loading {}", p.display()))?,
        None => MarketConfig::default(),
    };
    let config = config
        .with_env_overrides()
        .context("applying environment overrides")?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn build_provider(
    kind: ProviderKind,
    csv: Option<&Path>,
    config: &MarketConfig,
) -> Result<Arc<dyn MarketDataProvider>> {
    Ok(match kind {
        ProviderKind::Yahoo => {
            let breaker = Arc::new(CircuitBreaker::new(
                config.breaker_cooldown(),
                config.provider.circuit_breaker_threshold,
            ));
            let provider = YahooProvider::new(breaker, config.fetch_timeout())
                .context("building HTTP client")?
                .with_retries(config.provider.max_retries, config.provider_base_delay());
            Arc::new(provider)
        }
        ProviderKind::Synthetic => Arc::new(SyntheticProvider::today()),
        ProviderKind::Csv => {
            let Some(path) = csv else {
                bail!("--provider csv needs --csv <file>");
            };
            Arc::new(CsvProvider::new(path))
        }
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

fn run_history(service: &MarketService, ticker: &str, period: &str, out: Option<&Path>) -> Result<()> {
    let period = validate_period(period);
    let Some(frame) = service.history(ticker, period)? else {
        bail!("no history for {ticker} over {period}");
    };

    match out {
        Some(path) => {
            write_frame(&frame, path).with_context(|| format!("exporting to {}", path.display()))?;
            eprintln!("{} rows written to {}", frame.len(), path.display());
            Ok(())
        }
        None => print_json(&frame.bars),
    }
}

fn run_shell(service: &MarketService) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    eprintln!("tickers per line (space or comma separated); :clear [prefix], :stats, :quit");

    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(cmd) = line.strip_prefix(':') {
            let mut parts = cmd.split_whitespace();
            match parts.next() {
                Some("quit") | Some("q") => break,
                Some("stats") => print_json(&service.caches().stats())?,
                Some("clear") => {
                    let removed = service.clear_cache(parts.next());
                    eprintln!("cleared {removed} entries");
                }
                _ => eprintln!("unknown command: {line}"),
            }
            continue;
        }

        let tickers: Vec<&str> = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .collect();
        match service.aggregate(&tickers) {
            Ok(map) => print_json(&map)?,
            Err(e) => eprintln!("error ({}): {e}", e.status_hint()),
        }
        stdout.flush()?;
    }
    Ok(())
}
