pub mod cli;

use crate::cli::{Cli, RootCommands};
use dg_utxo_clients::rest::RestBlockchain;
use dg_utxo_clients::rpc::mapi::MapiBroadcaster;
use dg_utxo_clients::rpc::node::NodeRpcClient;
use dg_utxo_core::config::LedgerConfig;
use dg_utxo_core::errors::LedgerError;
use dg_utxo_core::traits::services::{
    ArchiveStore, Notifier, NodeSubmitter, SystemClock, TransactionCache,
};
use dg_utxo_core::utils::await_termination;
use dg_utxo_ledger::allocator::CoinAllocator;
use dg_utxo_ledger::archive::FsArchive;
use dg_utxo_ledger::broadcast::{BroadcastServices, Broadcaster};
use dg_utxo_ledger::cache::MemoryTxCache;
use dg_utxo_ledger::fetch::TransactionFetcher;
use dg_utxo_ledger::funding::{FundingEngine, FundingSettings};
use dg_utxo_ledger::queries::LedgerQueries;
use dg_utxo_ledger::reconcile::{Reconciler, ReconciliationQueue};
use dg_utxo_ledger::store::postgres::PgLedgerStore;
use log::{error, info, warn};
use serde_json::json;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Everything a command needs, built once from the resolved config.
pub struct Context {
    pub config: LedgerConfig,
    pub store: Arc<PgLedgerStore>,
    pub fetcher: Arc<TransactionFetcher>,
    pub services: BroadcastServices,
}
impl Context {
    pub async fn connect(config: LedgerConfig) -> Result<Self, LedgerError> {
        let store = Arc::new(
            PgLedgerStore::connect(&config.database_url, config.db_max_connections).await?,
        );
        let cache: Arc<dyn TransactionCache + Send + Sync> = Arc::new(MemoryTxCache::new());
        let archive: Arc<dyn ArchiveStore + Send + Sync> =
            Arc::new(FsArchive::new(&config.archive_path));
        let node = Arc::new(NodeRpcClient::new(
            &config.node_rpc_url,
            config.node_rpc_user.clone(),
            config.node_rpc_password.clone(),
            config.node_timeout(),
            &None,
        )?);
        let mut fetcher = TransactionFetcher::new(cache.clone(), node.clone(), archive.clone())
            .with_archive_timeout(config.archive_timeout());
        if let Some(rest_url) = &config.rest_url {
            fetcher = fetcher.with_fallback(Arc::new(RestBlockchain::new(
                rest_url,
                config.network,
                cache.clone(),
                config.node_timeout(),
                &None,
            )?));
        }
        let fetcher = Arc::new(fetcher);
        let secondary: Option<Arc<dyn NodeSubmitter + Send + Sync>> = match &config.mapi_url {
            Some(url) => Some(Arc::new(MapiBroadcaster::new(
                url,
                config.mapi_key.clone(),
                config.node_timeout(),
            )?)),
            None => None,
        };
        let services = BroadcastServices {
            store: store.clone(),
            derivations: store.clone(),
            node,
            secondary,
            fetcher: fetcher.clone(),
            archive,
            cache,
            notifier: notifier(),
            clock: Arc::new(SystemClock),
        };
        Ok(Self {
            config,
            store,
            fetcher,
            services,
        })
    }

    pub fn queries(&self) -> LedgerQueries {
        LedgerQueries::new(self.store.clone())
    }

    pub fn funding(&self) -> FundingEngine {
        let allocator = CoinAllocator::new(
            self.store.clone(),
            self.services.clock.clone(),
            self.config.lease_duration(),
        );
        FundingEngine::new(
            Arc::new(allocator),
            self.fetcher.clone(),
            FundingSettings::from(&self.config),
        )
    }
}

#[cfg(feature = "metrics")]
fn notifier() -> Arc<dyn Notifier + Send + Sync> {
    Arc::new(dg_utxo_ledger::notify::PrometheusNotifier::new(
        prometheus::Registry::new(),
    ))
}
#[cfg(not(feature = "metrics"))]
fn notifier() -> Arc<dyn Notifier + Send + Sync> {
    Arc::new(dg_utxo_ledger::notify::LogNotifier)
}

/// Config file first, then environment, then command line flags.
pub fn resolve_config(cli: &Cli) -> Result<LedgerConfig, LedgerError> {
    let mut config = match &cli.config {
        Some(path) => LedgerConfig::load(Path::new(path))?.with_env(),
        None => LedgerConfig::from_env(),
    };
    if let Some(url) = &cli.database_url {
        config.database_url = url.clone();
    }
    if let Some(url) = &cli.node_url {
        config.node_rpc_url = url.clone();
    }
    if let Some(url) = &cli.mapi_url {
        config.mapi_url = Some(url.clone());
    }
    if let Some(network) = cli.network {
        config.network = network;
    }
    Ok(config)
}

fn decode_hex(raw: &str) -> Result<Vec<u8>, LedgerError> {
    hex::decode(raw.trim()).map_err(|e| LedgerError::Decode(format!("Invalid transaction hex: {e}")))
}

fn print_json(value: &impl serde::Serialize) -> Result<(), Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn run_cli(cli: Cli) -> Result<(), Error> {
    let config = resolve_config(&cli)?;
    let ctx = Context::connect(config).await?;
    match cli.action {
        RootCommands::Migrate => {
            ctx.store.migrate().await?;
            info!("Ledger tables ready");
        }
        RootCommands::Broadcast { rawtx } => {
            let raw = decode_hex(&rawtx)?;
            let journal = Path::new(&ctx.config.reconcile_journal).to_path_buf();
            let queue = Arc::new(ReconciliationQueue::load(&journal).await?);
            let broadcaster =
                Broadcaster::from_config(ctx.services.clone(), &ctx.config, queue.clone())?;
            let result = broadcaster.broadcast(&raw).await;
            if !queue.is_empty() {
                queue.save(&journal).await?;
            }
            let receipt = result?;
            let txid = receipt.txid;
            let duplicate = receipt.duplicate;
            let already_known = receipt.already_known;
            receipt.notified().await;
            print_json(&json!({
                "txid": txid,
                "duplicate": duplicate,
                "alreadyKnown": already_known,
            }))?;
        }
        RootCommands::Fund {
            rawtx,
            payment,
            payer,
            split,
            fee_rate,
        } => {
            let raw = decode_hex(&rawtx)?;
            let funded = ctx
                .funding()
                .apply_payments(&raw, &payment, payer.as_deref(), split, fee_rate)
                .await?;
            print_json(&json!({
                "rawtx": hex::encode(&funded.raw),
                "parents": funded.prior_outputs,
                "size": funded.size,
                "fee": funded.fee,
            }))?;
        }
        RootCommands::Parents { rawtx } => {
            let raw = decode_hex(&rawtx)?;
            print_json(&ctx.fetcher.load_parents_raw(&raw).await?)?;
        }
        RootCommands::Fetch { txid } => {
            println!("{}", hex::encode(ctx.fetcher.fetch(&txid).await?));
        }
        RootCommands::Utxos {
            owner,
            owner_type,
            limit,
        } => {
            print_json(&ctx.queries().utxos(&owner, owner_type, limit).await?)?;
        }
        RootCommands::UtxoCount { owner, owner_type } => {
            println!("{}", ctx.queries().utxo_count(&owner, owner_type).await?);
        }
        RootCommands::Balance { owner, owner_type } => {
            println!("{}", ctx.queries().balance(&owner, owner_type).await?);
        }
        RootCommands::Spends { txid, vout } => match ctx.queries().spends(&txid, vout).await? {
            Some(spend_txid) => println!("{spend_txid}"),
            None => warn!("{txid}:{vout} is not spent"),
        },
        RootCommands::Reconcile { watch } => {
            let journal = Path::new(&ctx.config.reconcile_journal).to_path_buf();
            let queue = Arc::new(ReconciliationQueue::load(&journal).await?);
            let reconciler =
                Reconciler::new(queue.clone(), ctx.store.clone()).with_journal(journal.clone());
            if watch {
                let interval = Duration::from_secs(ctx.config.reconcile_interval_secs);
                reconciler
                    .watch(interval, async {
                        if let Err(e) = await_termination().await {
                            error!("Failed to listen for termination: {e}");
                        }
                    })
                    .await;
            } else {
                let report = reconciler.sweep().await;
                info!(
                    "Reconciled {} dropped {} remaining {}",
                    report.committed, report.dropped, report.remaining
                );
            }
            queue.save(&journal).await?;
        }
    }
    Ok(())
}
