use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string; unset means the in-memory store
    pub database_url: Option<String>,
    pub solana_rpc_url: String,
    /// Base58-encoded payout wallet keypair; settlement cannot run without it
    pub payout_wallet_key: Option<String>,
    /// How often the detector scans for full challenges
    pub scan_interval: Duration,
    /// Fractional cut retained from every outbound payout
    pub platform_fee: Decimal,
    /// Deposit amount, in lamports, marking a "give up" entry
    pub forfeit_floor_lamports: u64,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        let scan_interval_secs = parse_var("SCAN_INTERVAL_SECS", 30u64)?;
        let platform_fee = parse_var("PLATFORM_FEE", dec!(0.05))?;
        if platform_fee < Decimal::ZERO || platform_fee >= Decimal::ONE {
            return Err(AppError::Config(format!(
                "PLATFORM_FEE must be in [0, 1), got {}",
                platform_fee
            )));
        }

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            solana_rpc_url: std::env::var("SOLANA_RPC_URL")
                .unwrap_or_else(|_| "https://api.devnet.solana.com".to_string()),
            payout_wallet_key: std::env::var("PAYOUT_WALLET_KEY").ok(),
            scan_interval: Duration::from_secs(scan_interval_secs),
            platform_fee,
            forfeit_floor_lamports: parse_var("FORFEIT_FLOOR_LAMPORTS", 1u64)?,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> AppResult<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AppError::Config(format!("{} is not valid: {}", name, raw))),
        Err(_) => Ok(default),
    }
}
