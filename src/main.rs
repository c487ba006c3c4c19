//! Ledger service entry point.
//!
//! Wiring: config -> logging -> PostgreSQL store -> outbox dispatcher.
//! The dispatcher loop is the only long-running task here; mutations are
//! driven by callers of [`exchange_ledger::WalletEngine`] embedding this
//! crate, so the binary's job is schema setup plus event delivery.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use exchange_ledger::config::AppConfig;
use exchange_ledger::logging::init_logging;
use exchange_ledger::outbox::{DispatcherConfig, LogPublisher, OutboxDispatcher};
use exchange_ledger::store::{LedgerStore, PgStore};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env)?;
    let _guard = init_logging(&config);
    info!(env = %env, "Starting exchange-ledger");

    let store = PgStore::connect(&config.postgres_url).await?;
    store.init_schema().await?;
    store.seed_currencies().await?;
    info!("Schema ready");

    let dispatcher_config = DispatcherConfig {
        poll_interval: Duration::from_millis(config.dispatcher.poll_interval_ms),
        batch_size: config.dispatcher.batch_size,
        per_pair_batch: config.dispatcher.per_pair_batch,
        retry_base: Duration::from_millis(config.dispatcher.retry_base_ms),
        retry_max: Duration::from_millis(config.dispatcher.retry_max_ms),
        alert_after_retries: config.dispatcher.alert_after_retries,
    };
    let store: Arc<dyn LedgerStore> = Arc::new(store);
    let dispatcher = OutboxDispatcher::new(store, Arc::new(LogPublisher), dispatcher_config);
    dispatcher.run().await
}
