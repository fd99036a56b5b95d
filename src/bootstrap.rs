use std::sync::Arc;
use std::time::Duration;

use solana_sdk::signature::Keypair;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::challenge::memory::MemoryChallengeStore;
use crate::challenge::postgres::PgChallengeStore;
use crate::challenge::ChallengeStore;
use crate::config::Config;
use crate::error::{AppResult, SettlementError};
use crate::ledger::solana::{SolanaConfig, SolanaLedger};
use crate::ledger::LedgerAdapter;
use crate::settlement::{PayoutConfig, PayoutEngine, SettlementScheduler};

pub async fn initialize(config: &Config) -> AppResult<SettlementScheduler> {
    info!("Initializing settlement components ...");

    let store: Arc<dyn ChallengeStore> = match &config.database_url {
        Some(url) => {
            let pool = initialize_database(url).await?;
            Arc::new(PgChallengeStore::new(pool))
        }
        None => {
            warn!("⚠️  DATABASE_URL not set - using in-memory store, state is lost on restart");
            Arc::new(MemoryChallengeStore::new())
        }
    };

    // The payout keypair is the single signing authority for every
    // settlement; resolved once here and held by the ledger adapter
    let payout_key = config
        .payout_wallet_key
        .as_deref()
        .ok_or(SettlementError::PayerKeyUnavailable)?;
    let payout_keypair = Keypair::from_base58_string(payout_key);

    let solana_config = SolanaConfig {
        rpc_url: config.solana_rpc_url.clone(),
        ..SolanaConfig::default()
    };
    let ledger: Arc<dyn LedgerAdapter> =
        Arc::new(SolanaLedger::new(solana_config, payout_keypair));
    info!(
        "✅ Solana ledger adapter ready (vault: {})",
        ledger.payout_wallet()?
    );

    let engine = Arc::new(PayoutEngine::new(
        store.clone(),
        ledger,
        PayoutConfig {
            platform_fee: config.platform_fee,
            forfeit_floor_lamports: config.forfeit_floor_lamports,
        },
    ));

    Ok(SettlementScheduler::new(store, engine, config.scan_interval))
}

async fn initialize_database(database_url: &str) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("✅ Database ready");

    Ok(pool)
}
