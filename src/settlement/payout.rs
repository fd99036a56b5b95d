use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn};
use uuid::Uuid;

use crate::challenge::{Challenge, ChallengeStore};
use crate::error::{AppResult, SettlementError};
use crate::ledger::{LedgerAdapter, TransferDetails};

/// Payout parameters
#[derive(Debug, Clone)]
pub struct PayoutConfig {
    /// Fractional cut retained from every outbound transfer
    pub platform_fee: Decimal,
    /// Deposit amount, in lamports, that marks a "give up" entry. The join
    /// flow attaches a 1-lamport transfer to a forfeit, so comparison
    /// happens in base units where the marker cannot collide with a real
    /// whole-SOL stake.
    pub forfeit_floor_lamports: u64,
}

impl Default for PayoutConfig {
    fn default() -> Self {
        Self {
            platform_fee: dec!(0.05),
            forfeit_floor_lamports: 1,
        }
    }
}

/// Which side of the wager a deposit sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GuessOutcome {
    Correct,
    Incorrect,
}

/// Why a transfer is owed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutReason {
    /// Winner recoups their stake plus an equal share from a losing
    /// counterpart
    WinnerStake,
    /// Creator collects a loser's forfeited stake pool
    LoserStake,
    /// Participant gave up; their seat's share goes back to the creator
    ForfeitReturn,
}

/// One owed transfer, computed before anything is submitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTransfer {
    pub recipient: String,
    pub amount: Decimal,
    pub reason: PayoutReason,
}

/// Outcome of one `settle` invocation
#[derive(Debug, Clone)]
pub struct SettlementReport {
    pub challenge_id: Uuid,
    pub transfers_sent: usize,
    /// Transfers confirmed by an earlier attempt and not re-sent
    pub transfers_skipped: usize,
}

/// Drives settlement of one fully-subscribed challenge: reconstructs every
/// participant's deposit from the ledger, computes the owed transfers,
/// executes them through the payout wallet and records each attempt.
pub struct PayoutEngine {
    store: Arc<dyn ChallengeStore>,
    ledger: Arc<dyn LedgerAdapter>,
    config: PayoutConfig,
}

impl PayoutEngine {
    pub fn new(
        store: Arc<dyn ChallengeStore>,
        ledger: Arc<dyn LedgerAdapter>,
        config: PayoutConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            config,
        }
    }

    /// Settle one challenge. Safe to call again after a partial failure:
    /// transfers confirmed by an earlier attempt are recognized and skipped,
    /// and an already-completed challenge produces no transfers at all.
    pub async fn settle(&self, challenge_id: Uuid) -> AppResult<SettlementReport> {
        let vault = self.ledger.payout_wallet()?;

        let challenge = self
            .store
            .get_challenge(challenge_id)
            .await?
            .ok_or(SettlementError::ChallengeNotFound(challenge_id))?;

        if challenge.completed_at.is_some() {
            info!("Challenge {} already settled, nothing to do", challenge_id);
            return Ok(SettlementReport {
                challenge_id,
                transfers_sent: 0,
                transfers_skipped: 0,
            });
        }

        if !challenge.is_full() {
            return Err(SettlementError::NotReady.into());
        }

        // Build and verify the whole plan before submitting anything, so a
        // tampered deposit aborts the challenge with zero transfers out.
        let plan = self.build_plan(&challenge, &vault).await?;

        let already_confirmed = self.store.confirmed_payout_count(challenge_id).await? as usize;
        if already_confirmed > 0 {
            warn!(
                "Challenge {}: {} of {} payouts already confirmed, resuming",
                challenge_id,
                already_confirmed,
                plan.len()
            );
        }

        let mut sent = 0usize;
        for planned in plan.iter().skip(already_confirmed) {
            let record_id = self
                .store
                .create_transaction_record(challenge_id, &vault, &planned.recipient, planned.amount)
                .await?;

            let confirmed = self
                .ledger
                .submit_transfer(&planned.recipient, planned.amount)
                .await
                .map_err(|e| SettlementError::TransferFailed {
                    recipient: planned.recipient.clone(),
                    reason: e.to_string(),
                })?;

            self.store
                .confirm_transaction_record(record_id, &confirmed.signature, confirmed.timestamp)
                .await?;

            info!(
                "Challenge {}: sent {} SOL to {} ({:?}, sig: {})",
                challenge_id, planned.amount, planned.recipient, planned.reason, confirmed.signature
            );
            sent += 1;
        }

        // Commit point: only reached once every transfer has confirmed
        self.store.mark_challenge_complete(challenge_id).await?;
        info!(
            "✓ Challenge {} settled: {} transfers sent, {} skipped",
            challenge_id, sent, already_confirmed
        );

        Ok(SettlementReport {
            challenge_id,
            transfers_sent: sent,
            transfers_skipped: already_confirmed,
        })
    }

    /// Reconstruct every participant's deposit and compute the owed
    /// transfers, winners first then losers, in stored signature order.
    /// The order is deterministic so a resumed settlement can skip exactly
    /// the transfers that already confirmed.
    async fn build_plan(
        &self,
        challenge: &Challenge,
        vault: &str,
    ) -> AppResult<Vec<PlannedTransfer>> {
        let mut plan = Vec::with_capacity(challenge.guess_count());

        let signatures = challenge
            .correct_guesses_sig
            .iter()
            .map(|sig| (sig, GuessOutcome::Correct))
            .chain(
                challenge
                    .incorrect_guesses_sig
                    .iter()
                    .map(|sig| (sig, GuessOutcome::Incorrect)),
            );

        for (signature, outcome) in signatures {
            let deposit = self.ledger.transaction_effects(signature).await?;

            if deposit.receiver != vault {
                // Integrity violation: the recorded deposit never entered
                // the vault. Loud, and fatal for the whole challenge.
                warn!(
                    "Challenge {}: deposit {} went to {} instead of the vault",
                    challenge.id, signature, deposit.receiver
                );
                return Err(SettlementError::WrongVaultAccount {
                    signature: signature.clone(),
                    receiver: deposit.receiver,
                }
                .into());
            }

            plan.push(self.planned_transfer(challenge, &deposit, outcome));
        }

        Ok(plan)
    }

    /// Payout rule for a single participant
    fn planned_transfer(
        &self,
        challenge: &Challenge,
        deposit: &TransferDetails,
        outcome: GuessOutcome,
    ) -> PlannedTransfer {
        let net = Decimal::ONE - self.config.platform_fee;

        if deposit.lamports == self.config.forfeit_floor_lamports {
            // Gave up without playing: their seat's share of the pool goes
            // back to the creator, regardless of which list the signature
            // landed in
            return PlannedTransfer {
                recipient: challenge.wallet.clone(),
                amount: challenge.stake_per_seat() * net,
                reason: PayoutReason::ForfeitReturn,
            };
        }

        let amount = deposit.amount_sol() * Decimal::TWO * net;
        match outcome {
            GuessOutcome::Correct => PlannedTransfer {
                recipient: deposit.sender.clone(),
                amount,
                reason: PayoutReason::WinnerStake,
            },
            GuessOutcome::Incorrect => PlannedTransfer {
                recipient: challenge.wallet.clone(),
                amount,
                reason: PayoutReason::LoserStake,
            },
        }
    }
}
