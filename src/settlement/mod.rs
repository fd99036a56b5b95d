pub mod payout;
pub mod scheduler;

pub use payout::{PayoutConfig, PayoutEngine, SettlementReport};
pub use scheduler::{SchedulerHandle, SettlementScheduler};

#[cfg(test)]
pub(crate) mod testutil {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rust_decimal::Decimal;

    use crate::error::{AppResult, LedgerError, SettlementError};
    use crate::ledger::{ConfirmedTransfer, LedgerAdapter, TransferDetails};

    pub const VAULT: &str = "VaultPayoutWallet1111111111111111111111111";

    /// Ledger stub: deposits are looked up by signature, submissions are
    /// recorded instead of sent
    pub struct MockLedger {
        pub deposits: HashMap<String, TransferDetails>,
        pub submitted: Mutex<Vec<(String, Decimal)>>,
        /// Fail the Nth submission (0-based) when set
        pub fail_on: Option<usize>,
        /// Simulate an unresolvable payout keypair
        pub payer_key_missing: bool,
    }

    impl MockLedger {
        pub fn new() -> Self {
            Self {
                deposits: HashMap::new(),
                submitted: Mutex::new(Vec::new()),
                fail_on: None,
                payer_key_missing: false,
            }
        }

        pub fn with_deposit(mut self, signature: &str, sender: &str, lamports: u64) -> Self {
            self.deposits.insert(
                signature.to_string(),
                TransferDetails {
                    sender: sender.to_string(),
                    receiver: VAULT.to_string(),
                    lamports,
                },
            );
            self
        }

        pub fn with_foreign_deposit(
            mut self,
            signature: &str,
            sender: &str,
            receiver: &str,
            lamports: u64,
        ) -> Self {
            self.deposits.insert(
                signature.to_string(),
                TransferDetails {
                    sender: sender.to_string(),
                    receiver: receiver.to_string(),
                    lamports,
                },
            );
            self
        }
    }

    #[async_trait]
    impl LedgerAdapter for MockLedger {
        fn payout_wallet(&self) -> AppResult<String> {
            if self.payer_key_missing {
                return Err(SettlementError::PayerKeyUnavailable.into());
            }
            Ok(VAULT.to_string())
        }

        async fn transaction_effects(&self, signature: &str) -> AppResult<TransferDetails> {
            self.deposits
                .get(signature)
                .cloned()
                .ok_or_else(|| LedgerError::TransactionNotFound(signature.to_string()).into())
        }

        async fn submit_transfer(
            &self,
            to: &str,
            amount: Decimal,
        ) -> AppResult<ConfirmedTransfer> {
            let mut submitted = self.submitted.lock();
            if self.fail_on == Some(submitted.len()) {
                return Err(LedgerError::Rpc("simulated send failure".to_string()).into());
            }
            submitted.push((to.to_string(), amount));
            Ok(ConfirmedTransfer {
                signature: format!("payout-sig-{}", submitted.len()),
                timestamp: 1_700_000_000 + submitted.len() as i64,
            })
        }

        async fn estimate_fee(&self, _to: &str, _amount: Decimal) -> AppResult<u64> {
            Ok(5000)
        }
    }
}
