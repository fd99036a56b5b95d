pub mod solana;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::{AppResult, LedgerError};

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Sender, receiver and net amount of a confirmed deposit transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferDetails {
    pub sender: String,
    pub receiver: String,
    /// Net amount credited to the receiver, in lamports
    pub lamports: u64,
}

impl TransferDetails {
    pub fn amount_sol(&self) -> Decimal {
        lamports_to_sol(self.lamports)
    }
}

/// A submitted transfer after ledger confirmation
#[derive(Debug, Clone)]
pub struct ConfirmedTransfer {
    pub signature: String,
    /// Ledger block time, 0 when the node does not report one
    pub timestamp: i64,
}

/// Opaque ledger operations consumed by the settlement engine.
///
/// The engine never touches keys, blockhashes or instructions; it only asks
/// for the payout wallet's address, a confirmed transaction's transfer
/// effects, and "send this amount to this address and wait".
#[async_trait]
pub trait LedgerAdapter: Send + Sync {
    /// Base58 address of the platform payout (vault) wallet
    fn payout_wallet(&self) -> AppResult<String>;

    /// Reconstruct a confirmed deposit's sender, receiver and net amount
    async fn transaction_effects(&self, signature: &str) -> AppResult<TransferDetails>;

    /// Submit a signed transfer from the payout wallet and block until the
    /// ledger confirms it
    async fn submit_transfer(&self, to: &str, amount: Decimal) -> AppResult<ConfirmedTransfer>;

    /// Minimum network fee for a prospective transfer, in lamports
    async fn estimate_fee(&self, to: &str, amount: Decimal) -> AppResult<u64>;
}

/// Lamports to SOL, exact (scale 9)
pub fn lamports_to_sol(lamports: u64) -> Decimal {
    Decimal::from(lamports) / Decimal::from(LAMPORTS_PER_SOL)
}

/// SOL to lamports, truncating sub-lamport precision deterministically
pub fn sol_to_lamports(amount: Decimal) -> Result<u64, LedgerError> {
    if amount.is_sign_negative() {
        return Err(LedgerError::InvalidAmount(amount.to_string()));
    }
    (amount * dec!(1_000_000_000))
        .trunc()
        .to_u64()
        .ok_or_else(|| LedgerError::InvalidAmount(amount.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lamport_conversions_round_trip() {
        for lamports in [0u64, 1, 5000, LAMPORTS_PER_SOL, 1_900_000_000, u32::MAX as u64] {
            assert_eq!(sol_to_lamports(lamports_to_sol(lamports)).unwrap(), lamports);
        }
    }

    #[test]
    fn sol_to_lamports_truncates() {
        // Sub-lamport precision is dropped, never rounded up
        let amount = Decimal::new(19_999_999_999, 10); // 1.9999999999 SOL
        assert_eq!(sol_to_lamports(amount).unwrap(), 1_999_999_999);
    }

    #[test]
    fn negative_amounts_rejected() {
        assert!(sol_to_lamports(Decimal::new(-1, 0)).is_err());
    }

    #[test]
    fn forfeit_floor_is_distinguishable_from_real_stakes() {
        // 1 lamport is the give-up marker; a 1 SOL stake maps to 1e9
        assert_eq!(sol_to_lamports(lamports_to_sol(1)).unwrap(), 1);
        assert_eq!(sol_to_lamports(Decimal::ONE).unwrap(), LAMPORTS_PER_SOL);
    }
}
