//! CLI reconciliation harness
//!
//! Runs the reconciliation engine against in-memory collaborators to
//! exercise:
//! - Connection strategy selection and fallbacks
//! - Network switches and token re-seeding
//! - Transaction confirmation and token invalidation

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use dexsync_core::{
    derive_address, AssetDescriptor, BalanceMap, RawCredential, TxStatus, WalletAddress,
};
use dexsync_engine::testing::{FakeExtension, FakeHistory, FakeLedger};
use dexsync_engine::{
    init_logging, EngineConfig, EngineDeps, Extension, HistoryEntry, MemoryStore, Reconciler,
    StateStore, TransactionEvent,
};
use dexsync_params::NetworkType;
use dexsync_storage::{JsonFileSessionStore, MemorySessionStore, SessionHints, SessionStore};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const DEMO_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
const DEMO_EXTENSION_ACCOUNT: &str = "0x2b5ad5c4795c026514f8317c7a215e218dccd6cf";

#[derive(Parser)]
#[command(name = "reconcile-harness")]
#[command(about = "DEX wallet reconciliation harness", long_about = None)]
struct Cli {
    /// Engine configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Persist session hints in this directory instead of memory
    #[arg(long, global = true)]
    hints_dir: Option<PathBuf>,

    /// Emit JSON logs
    #[arg(long, global = true)]
    json_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Raw secret key
    Key,
    /// Browser extension
    Extension,
    /// Read-only
    None,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and print the reconciled session and tokens
    Connect {
        /// Connection mode to seed the hints with
        #[arg(short, long, value_enum, default_value = "key")]
        mode: Mode,

        /// Raw secret key for `--mode key`
        #[arg(short, long)]
        key: Option<String>,

        /// Network name reported by the extension
        #[arg(long, default_value = "mainnet")]
        extension_network: String,
    },

    /// Connect, then switch networks and compare token sets
    NetworkSwitch {
        /// Network to switch to
        #[arg(short, long, default_value = "testnet")]
        to: NetworkType,
    },

    /// Submit a transaction, confirm it, and show the invalidation
    TxConfirm {
        /// Transaction hash
        #[arg(long, default_value = "0xHASH1")]
        hash: String,

        /// Final status reported by the ledger
        #[arg(short, long, default_value = "confirmed")]
        status: TxStatus,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_log);

    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Connect {
            mode,
            key,
            extension_network,
        } => {
            let hints = match mode {
                Mode::Key => SessionHints {
                    raw_credential: Some(RawCredential::new(
                        key.unwrap_or_else(|| DEMO_KEY.to_string()),
                    )),
                    extension_connected: false,
                },
                Mode::Extension => SessionHints {
                    raw_credential: None,
                    extension_connected: true,
                },
                Mode::None => SessionHints::default(),
            };
            run_connect(config, cli.hints_dir, hints, &extension_network).await?;
        }
        Commands::NetworkSwitch { to } => {
            run_network_switch(config, cli.hints_dir, to).await?;
        }
        Commands::TxConfirm { hash, status } => {
            run_tx_confirm(config, cli.hints_dir, &hash, status).await?;
        }
    }

    Ok(())
}

struct Scenario {
    engine: Reconciler,
    store: Arc<MemoryStore>,
    ledger: Arc<FakeLedger>,
}

/// Whole units to base units; the raw amount when the scale does not fit
fn scale_units(amount: u128, decimals: u8) -> u128 {
    10u128
        .checked_pow(u32::from(decimals))
        .and_then(|scale| amount.checked_mul(scale))
        .unwrap_or(amount)
}

fn demo_tokens(network: NetworkType) -> Vec<AssetDescriptor> {
    let prefix = match network {
        NetworkType::Mainnet => "0xa1",
        NetworkType::Testnet => "0xb2",
        NetworkType::Localnet => "0xc3",
    };
    ["USDC", "WETH", "VIPER"]
        .iter()
        .enumerate()
        .map(|(i, symbol)| AssetDescriptor {
            address: format!("{prefix}{i:038x}"),
            symbol: symbol.to_string(),
            name: None,
            decimals: if *symbol == "USDC" { 6 } else { 18 },
            registered: true,
            whitelisted: true,
        })
        .collect()
}

fn build_scenario(
    config: EngineConfig,
    hints_dir: Option<PathBuf>,
    hints: SessionHints,
    extension_network: &str,
) -> anyhow::Result<Scenario> {
    let hint_store: Arc<dyn SessionStore> = match hints_dir {
        Some(dir) => Arc::new(JsonFileSessionStore::in_dir(dir)),
        None => Arc::new(MemorySessionStore::new()),
    };
    if let Some(credential) = hints.credential() {
        hint_store.set_credential(Some(credential))?;
    }
    hint_store.set_extension_connected(hints.extension_connected)?;

    let ledger = Arc::new(FakeLedger::new());
    ledger.set_delay(Duration::from_millis(25));
    for network in NetworkType::ALL {
        ledger.set_token_list(network, demo_tokens(network));
    }

    let key_account = derive_address(&RawCredential::new(DEMO_KEY))?;
    let extension_account = WalletAddress::parse(DEMO_EXTENSION_ACCOUNT)?;
    let holdings = [(&key_account, 5_000u128), (&extension_account, 1_250u128)];
    for (account, amount) in holdings {
        ledger.set_native_balance(account.hex(), scale_units(amount, 18));
    }
    for network in NetworkType::ALL {
        for token in demo_tokens(network) {
            let balances: BalanceMap = holdings
                .iter()
                .map(|(account, amount)| {
                    (account.hex().to_string(), scale_units(*amount, token.decimals))
                })
                .collect();
            ledger.set_balance_mapping(&token.address, balances);
        }
    }

    let history = Arc::new(FakeHistory::with_entries(vec![HistoryEntry {
        hash: "0xHASH1".to_string(),
        status: TxStatus::Pending,
        from: Some(key_account.hex().to_string()),
        timestamp: Some(1_700_000_000),
    }]));

    let store = Arc::new(MemoryStore::new(
        config.default_network,
        config.event_channel_capacity,
    ));
    let extension = FakeExtension::new(extension_account, extension_network);
    let deps = EngineDeps {
        store: store.clone(),
        ledger: ledger.clone(),
        extension: Extension::Present(Arc::new(extension)),
        history,
        hints: hint_store,
    };

    Ok(Scenario {
        engine: Reconciler::new(deps, config),
        store,
        ledger,
    })
}

async fn settle(engine: &Reconciler, label: &str) -> anyhow::Result<()> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {msg} [{elapsed}]")
            .context("spinner template")?,
    );
    spinner.set_message(label.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));

    let settled = engine.until_settled(Duration::from_secs(10)).await;
    spinner.finish_and_clear();
    if !settled {
        anyhow::bail!("engine did not settle while {}", label);
    }
    Ok(())
}

fn print_state(store: &MemoryStore) -> anyhow::Result<()> {
    let session = store.wallet();
    let tokens: Vec<_> = store
        .tokens()
        .into_iter()
        .map(|t| {
            serde_json::json!({
                "address": t.address,
                "symbol": t.symbol,
                "balance": t.balance.map(|b| b.to_string()),
                "initialized": t.initialized,
                "dirty": t.dirty,
                "loading": t.loading,
                "error": t.error,
            })
        })
        .collect();
    let transactions: Vec<_> = store
        .transactions()
        .into_iter()
        .map(|tx| serde_json::json!({ "hash": tx.hash, "status": tx.status }))
        .collect();
    let notifications: Vec<_> = store
        .notifications()
        .into_iter()
        .map(|n| n.message)
        .collect();

    let report = serde_json::json!({
        "network": store.network(),
        "ready": store.connection_ready(),
        "mode": session.as_ref().map(|s| s.mode()),
        "address": session.as_ref().and_then(|s| s.address()).map(|a| a.bech32().to_string()),
        "tokens": tokens,
        "transactions": transactions,
        "notifications": notifications,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_connect(
    config: EngineConfig,
    hints_dir: Option<PathBuf>,
    hints: SessionHints,
    extension_network: &str,
) -> anyhow::Result<()> {
    let scenario = build_scenario(config, hints_dir, hints, extension_network)?;
    let mode = scenario.engine.start().await?;
    info!(mode = %mode.name(), "Connected");

    settle(&scenario.engine, "reconciling").await?;
    print_state(&scenario.store)?;
    scenario.engine.shutdown().await;
    Ok(())
}

async fn run_network_switch(
    config: EngineConfig,
    hints_dir: Option<PathBuf>,
    to: NetworkType,
) -> anyhow::Result<()> {
    let hints = SessionHints {
        raw_credential: Some(RawCredential::new(DEMO_KEY)),
        extension_connected: false,
    };
    let from = config.default_network;
    let scenario = build_scenario(config, hints_dir, hints, "mainnet")?;
    scenario.engine.start().await?;
    settle(&scenario.engine, "reconciling").await?;
    let before = scenario.store.tokens().len();

    info!(from = %from, to = %to, "Switching network");
    scenario.engine.switch_network(to).await;
    settle(&scenario.engine, "re-seeding").await?;

    info!(
        before = %before,
        after = %scenario.store.tokens().len(),
        token_list_calls = %scenario.ledger.token_list_calls(),
        "Network switch complete"
    );
    print_state(&scenario.store)?;
    scenario.engine.shutdown().await;
    Ok(())
}

async fn run_tx_confirm(
    config: EngineConfig,
    hints_dir: Option<PathBuf>,
    hash: &str,
    status: TxStatus,
) -> anyhow::Result<()> {
    let hints = SessionHints {
        raw_credential: Some(RawCredential::new(DEMO_KEY)),
        extension_connected: false,
    };
    let scenario = build_scenario(config, hints_dir, hints, "mainnet")?;
    scenario.engine.start().await?;
    settle(&scenario.engine, "reconciling").await?;

    if scenario.store.transaction(hash).is_none() {
        scenario.engine.submit_transaction(hash).await?;
    }
    let loads_before = scenario.ledger.balance_mapping_calls();

    let delivered = scenario.ledger.emit_transaction(TransactionEvent {
        hash: hash.to_string(),
        status,
        receipt: Some(serde_json::json!({ "status": status.name() })),
    });
    if !delivered {
        warn!("No transaction observer registered");
    }
    let dirty = scenario.store.tokens().iter().filter(|t| t.dirty).count();
    info!(hash = %hash, status = %status, dirty_tokens = %dirty, "Transaction update delivered");

    settle(&scenario.engine, "refreshing").await?;
    info!(
        refetched = %(scenario.ledger.balance_mapping_calls() - loads_before),
        "Tokens refreshed after transaction"
    );
    print_state(&scenario.store)?;
    scenario.engine.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_units() {
        assert_eq!(scale_units(5, 6), 5_000_000);
        assert_eq!(scale_units(7, 0), 7);
    }

    #[test]
    fn test_scale_units_falls_back_on_overflow() {
        assert_eq!(scale_units(3, 39), 3);
        assert_eq!(scale_units(u128::MAX, 18), u128::MAX);
    }
}
