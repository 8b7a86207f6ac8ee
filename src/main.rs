//! candy-mint - command line front end for a candy machine sale
//!
//! Stands in for the presentation layer: it drives a [`MintSession`] and
//! prints the sale snapshot and every mint outcome as an alert.
//!
//! ## Commands
//!
//! - `state`: fetch and print the sale state
//! - `mint`: run one mint attempt and wait for its confirmation
//! - `watch`: refresh the sale state on an interval until interrupted

// Compiler warning configuration
#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use solana_sdk::commitment_config::CommitmentConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use candy_mint::config::{Config, SaleConfig};
use candy_mint::gatekeeper::GatewayTokenVerifier;
#[cfg(feature = "ws-stream")]
use candy_mint::ledger::pubsub::PubsubSignatureSubscriber;
use candy_mint::ledger::{LedgerClient, RpcLedger};
use candy_mint::metrics::metrics;
use candy_mint::wallet::{KeypairWallet, WalletCapability};
use candy_mint::{
    ConfirmationWatcher, MintOrchestrator, MintSession, SaleState, Severity, StateFetcher,
};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "candy-mint.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON log lines
    #[arg(long)]
    json: bool,

    /// Print Prometheus metrics before exiting
    #[arg(long)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch and print the sale state
    State,

    /// Mint one item and wait for confirmation
    Mint,

    /// Refresh the sale state periodically
    Watch {
        /// Refresh interval in seconds
        #[arg(long, default_value = "10")]
        interval_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args.config)?;
    init_logging(args.verbose, args.json || config.monitoring.json_logs)?;
    config.validate().context("Invalid configuration")?;

    info!("Starting candy-mint v{}", env!("CARGO_PKG_VERSION"));
    let session = build_session(&config).await?;

    match args.command {
        Command::State => {
            let state = session.refresh().await;
            print_state(state.as_ref(), &config.sale)?;
        }
        Command::Mint => run_mint(&session, &config.sale).await?,
        Command::Watch { interval_secs } => {
            run_watch(
                &session,
                Duration::from_secs(interval_secs.max(1)),
                &config.sale,
            )
            .await?
        }
    }

    if args.metrics && config.monitoring.enable_metrics {
        print!("{}", metrics().export()?);
    }

    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "candy_mint=debug,info"
    } else {
        "candy_mint=info,warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| env_filter.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?;
    }

    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path))
    } else {
        eprintln!("Config file '{}' not found, using defaults and environment", path);
        Config::from_env()
    }
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{home}/{rest}"),
        _ => path.to_string(),
    }
}

async fn build_session(config: &Config) -> Result<MintSession> {
    let candy_machine = config
        .candy_machine()?
        .context("No candy machine configured (sale.candy_machine_id or CANDY_MACHINE_ID)")?;

    let commitment = config.rpc.commitment_config()?;
    let rpc = RpcLedger::new(&config.rpc.url, commitment, config.rpc.timeout());
    info!(rpc = %rpc.endpoint(), candy_machine = %candy_machine, "Ledger client ready");
    let ledger: Arc<dyn LedgerClient> = Arc::new(rpc);

    let keypair_path = expand_home(&config.wallet.keypair_path);
    let wallet: Arc<dyn WalletCapability> = Arc::new(
        KeypairWallet::from_file(&keypair_path).context("Failed to load wallet")?,
    );
    if let Some(address) = wallet.public_address() {
        info!(wallet = %address, "Wallet loaded");
    }

    let watcher = ConfirmationWatcher::new(Arc::clone(&ledger))
        .with_poll_interval(config.confirmation.poll_interval());
    let watcher = attach_subscriber(config, commitment, watcher).await;

    let orchestrator = MintOrchestrator::new(Arc::clone(&ledger), Arc::clone(&wallet), watcher)
        .with_gatekeeper(Arc::new(GatewayTokenVerifier::new(Arc::clone(&ledger))))
        .with_compute_unit_limit(config.sale.compute_unit_limit);

    Ok(MintSession::new(
        StateFetcher::new(ledger),
        orchestrator,
        candy_machine,
        config.confirmation.tx_timeout(),
        config.confirmation.prefer_subscription,
    ))
}

/// Add websocket notifications to the watcher when enabled and reachable
#[cfg(feature = "ws-stream")]
async fn attach_subscriber(
    config: &Config,
    commitment: CommitmentConfig,
    watcher: ConfirmationWatcher,
) -> ConfirmationWatcher {
    if !config.confirmation.prefer_subscription {
        return watcher;
    }

    let ws_url = config.rpc.websocket_url();
    match PubsubSignatureSubscriber::connect(&ws_url, commitment).await {
        Ok(subscriber) => watcher.with_subscriber(Arc::new(subscriber)),
        Err(e) => {
            warn!(ws_url = %ws_url, error = %e, "Websocket unavailable, polling only");
            watcher
        }
    }
}

#[cfg(not(feature = "ws-stream"))]
async fn attach_subscriber(
    _config: &Config,
    _commitment: CommitmentConfig,
    watcher: ConfirmationWatcher,
) -> ConfirmationWatcher {
    watcher
}

/// Print the snapshot, or the configured start date while none is loaded
fn print_state(state: Option<&SaleState>, sale: &SaleConfig) -> Result<()> {
    match state {
        Some(state) => {
            println!("{}", serde_json::to_string_pretty(state)?);
            if let Some(go_live) = state.go_live_datetime() {
                println!("Go live: {}", go_live.to_rfc3339());
            }
        }
        None => match sale.start_datetime() {
            Some(start) => println!("No sale state available, sale starts {}", start.to_rfc3339()),
            None => println!("No sale state available"),
        },
    }
    Ok(())
}

async fn run_mint(session: &MintSession, sale: &SaleConfig) -> Result<()> {
    let Some(state) = session.refresh().await else {
        anyhow::bail!("Sale state could not be loaded");
    };
    info!(
        items_remaining = state.items_remaining,
        price = state.price,
        is_active = state.is_active,
        "Minting"
    );

    let alert = session.mint().await;
    println!("{alert}");

    if session.take_reload_request() {
        warn!("Sale reported sold out, reloading state");
        let state = session.reload().await;
        print_state(state.as_ref(), sale)?;
    }

    if alert.severity == Severity::Error {
        anyhow::bail!("Mint did not succeed");
    }
    Ok(())
}

async fn run_watch(
    session: &MintSession,
    every: Duration,
    sale: &SaleConfig,
) -> Result<()> {
    let starts_at = sale.start_datetime().map(|start| start.to_rfc3339());
    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match session.refresh().await {
                    Some(state) => info!(
                        items_remaining = state.items_remaining,
                        items_redeemed = state.items_redeemed,
                        is_active = state.is_active,
                        is_presale = state.is_presale,
                        is_sold_out = state.is_sold_out,
                        "Sale state"
                    ),
                    None => info!(starts_at = ?starts_at, "No sale state yet"),
                }
            }

            // Graceful shutdown signal
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    Ok(())
}
