use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::challenge::models::{Challenge, NewChallenge, TransactionRecord, User};
use crate::error::AppResult;

/// Persistence interface for challenges, users and payout records.
///
/// Backed by Postgres in production and by an in-memory store for tests and
/// local runs without a database.
#[async_trait]
pub trait ChallengeStore: Send + Sync {
    /// Create the user if absent, otherwise return the existing row
    async fn create_user_if_absent(&self, wallet: &str, name: &str) -> AppResult<User>;

    async fn get_user(&self, wallet: &str) -> AppResult<Option<User>>;

    async fn create_challenge(&self, new: NewChallenge) -> AppResult<Challenge>;

    async fn get_challenge(&self, id: Uuid) -> AppResult<Option<Challenge>>;

    async fn list_challenges(&self) -> AppResult<Vec<Challenge>>;

    /// Record a challenger's guess: lazily create the user and append the
    /// deposit signature to the correct or incorrect list. Fails once the
    /// challenge is at capacity.
    async fn add_guess(
        &self,
        challenge_id: Uuid,
        wallet: &str,
        signature: &str,
        correct: bool,
    ) -> AppResult<Challenge>;

    /// Create a Pending payout record, returning its id
    async fn create_transaction_record(
        &self,
        challenge_id: Uuid,
        from_user: &str,
        to_user: &str,
        amount: Decimal,
    ) -> AppResult<i64>;

    /// Flip a payout record to Confirmed with its hash and ledger timestamp
    async fn confirm_transaction_record(
        &self,
        id: i64,
        tx_hash: &str,
        timestamp: i64,
    ) -> AppResult<()>;

    /// Number of payouts already confirmed for a challenge; a retried
    /// settlement skips that many planned transfers
    async fn confirmed_payout_count(&self, challenge_id: Uuid) -> AppResult<u64>;

    async fn challenge_transactions(&self, challenge_id: Uuid)
        -> AppResult<Vec<TransactionRecord>>;

    /// Stamp `completed_at` once; calling again is a no-op
    async fn mark_challenge_complete(&self, id: Uuid) -> AppResult<()>;
}
