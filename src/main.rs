//! Pari-mutuel ledger service entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use parimutuel_ledger::address::AddressDeriver;
use parimutuel_ledger::api::{create_router, AppState};
use parimutuel_ledger::config::Config;
use parimutuel_ledger::market::{InMemoryAccountStore, MarketLedger};
use parimutuel_ledger::metrics;
use parimutuel_ledger::oracle::OracleReader;
use parimutuel_ledger::utils::shutdown_signal;

/// Binary-outcome pari-mutuel prediction market ledger.
#[derive(Parser, Debug)]
#[command(name = "parimutuel-ledger")]
#[command(about = "Pari-mutuel prediction market ledger and oracle reader")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default).
    Serve {
        /// HTTP server port; overrides PORT.
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Print a derived account address and its nonce.
    Derive {
        /// Namespace seed, e.g. "market" or "bet".
        namespace: String,

        /// Additional seeds: 0x-prefixed hex, or text taken as UTF-8 bytes.
        seeds: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("parimutuel_ledger=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config(),
        Some(Command::Derive { namespace, seeds }) => cmd_derive(&namespace, &seeds),
        Some(Command::Serve { port }) => cmd_serve(port).await,
        None => cmd_serve(None).await,
    }
}

fn load_config() -> anyhow::Result<Config> {
    let config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }
    Ok(config)
}

async fn cmd_serve(port_override: Option<u16>) -> anyhow::Result<()> {
    info!("Loading configuration...");
    let config = load_config()?;
    let port = port_override.unwrap_or(config.port);

    let program_id = config
        .program_address()
        .map_err(|e| anyhow::anyhow!("Invalid program id: {}", e))?;
    info!(
        program_id = %program_id,
        rpc_timeout_ms = config.rpc_timeout_ms,
        early_resolution = config.allow_early_resolution,
        "Configuration loaded"
    );

    let handle = metrics::install_recorder();

    let store = Arc::new(InMemoryAccountStore::new());
    let deriver = AddressDeriver::new(program_id);
    let ledger = Arc::new(MarketLedger::new(
        store.clone(),
        deriver.clone(),
        config.ledger_options(),
    ));
    let oracle = Arc::new(OracleReader::new(store, deriver, config.oracle_options()));

    let accounts = ledger.hydrate().await?;
    info!(accounts, "Ledger ready");

    let app_state = AppState::new(ledger, oracle).with_metrics(handle);
    app_state.set_ready(true);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, create_router(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("PARIMUTUEL LEDGER - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Program ID: {}", config.program_id);
    println!("  RPC Timeout: {}ms", config.rpc_timeout_ms);
    println!("  Early Resolution: {}", config.allow_early_resolution);
    println!("  Oracle Cache TTL: {}s", config.oracle_cache_ttl_secs);
    println!("  Oracle Min Confidence: {}", config.oracle_min_confidence);
    println!("  Port: {}", config.port);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

fn cmd_derive(namespace: &str, seeds: &[String]) -> anyhow::Result<()> {
    let config = load_config()?;
    let program_id = config
        .program_address()
        .map_err(|e| anyhow::anyhow!("Invalid program id: {}", e))?;

    let raw: Vec<Vec<u8>> = seeds
        .iter()
        .map(|seed| match seed.strip_prefix("0x") {
            Some(hex_seed) => hex::decode(hex_seed)
                .map_err(|e| anyhow::anyhow!("Invalid hex seed {}: {}", seed, e)),
            None => Ok(seed.as_bytes().to_vec()),
        })
        .collect::<anyhow::Result<_>>()?;
    let refs: Vec<&[u8]> = raw.iter().map(Vec::as_slice).collect();

    let (address, nonce) = AddressDeriver::new(program_id).derive(namespace.as_bytes(), &refs)?;
    println!("Address: {}", address);
    println!("Nonce:   {}", nonce);
    Ok(())
}
