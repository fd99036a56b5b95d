use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::challenge::models::{Challenge, NewChallenge, TransactionRecord, TxState, User};
use crate::challenge::store::ChallengeStore;
use crate::error::{AppError, AppResult};

/// In-memory store, used by tests and database-less local runs
pub struct MemoryChallengeStore {
    challenges: tokio::sync::RwLock<HashMap<Uuid, Challenge>>,
    users: tokio::sync::RwLock<HashMap<String, User>>,
    transactions: tokio::sync::RwLock<HashMap<i64, TransactionRecord>>,
    next_tx_id: AtomicI64,
}

impl MemoryChallengeStore {
    pub fn new() -> Self {
        Self {
            challenges: tokio::sync::RwLock::new(HashMap::new()),
            users: tokio::sync::RwLock::new(HashMap::new()),
            transactions: tokio::sync::RwLock::new(HashMap::new()),
            next_tx_id: AtomicI64::new(1),
        }
    }

    /// Insert a fully-formed challenge, bypassing creation validation.
    /// Test scaffolding for states that only arise mid-lifecycle.
    #[cfg(test)]
    pub async fn insert_challenge(&self, challenge: Challenge) {
        let mut challenges = self.challenges.write().await;
        challenges.insert(challenge.id, challenge);
    }
}

impl Default for MemoryChallengeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChallengeStore for MemoryChallengeStore {
    async fn create_user_if_absent(&self, wallet: &str, name: &str) -> AppResult<User> {
        let mut users = self.users.write().await;
        let user = users.entry(wallet.to_string()).or_insert_with(|| User {
            wallet: wallet.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        });
        Ok(user.clone())
    }

    async fn get_user(&self, wallet: &str) -> AppResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(wallet).cloned())
    }

    async fn create_challenge(&self, new: NewChallenge) -> AppResult<Challenge> {
        new.validate()?;
        self.create_user_if_absent(&new.wallet, "User").await?;

        let challenge = Challenge {
            id: Uuid::new_v4(),
            wallet: new.wallet,
            statements: new.statements,
            lie_index: new.lie_index,
            max_challengers: new.max_challengers,
            total_amount: new.total_amount,
            correct_guesses_sig: Vec::new(),
            incorrect_guesses_sig: Vec::new(),
            create_challenge_sig: new.create_challenge_sig,
            completed_at: None,
            created_at: Utc::now(),
        };

        let mut challenges = self.challenges.write().await;
        challenges.insert(challenge.id, challenge.clone());
        Ok(challenge)
    }

    async fn get_challenge(&self, id: Uuid) -> AppResult<Option<Challenge>> {
        let challenges = self.challenges.read().await;
        Ok(challenges.get(&id).cloned())
    }

    async fn list_challenges(&self) -> AppResult<Vec<Challenge>> {
        let challenges = self.challenges.read().await;
        let mut all: Vec<Challenge> = challenges.values().cloned().collect();
        all.sort_by_key(|c| c.created_at);
        Ok(all)
    }

    async fn add_guess(
        &self,
        challenge_id: Uuid,
        wallet: &str,
        signature: &str,
        correct: bool,
    ) -> AppResult<Challenge> {
        self.create_user_if_absent(wallet, "User").await?;

        let mut challenges = self.challenges.write().await;
        let challenge = challenges.get_mut(&challenge_id).ok_or_else(|| {
            AppError::InvalidInput(format!(
                "Challenge {} is full, completed or missing",
                challenge_id
            ))
        })?;

        if challenge.completed_at.is_some() || challenge.is_full() {
            return Err(AppError::InvalidInput(format!(
                "Challenge {} is full, completed or missing",
                challenge_id
            )));
        }

        if correct {
            challenge.correct_guesses_sig.push(signature.to_string());
        } else {
            challenge.incorrect_guesses_sig.push(signature.to_string());
        }
        Ok(challenge.clone())
    }

    async fn create_transaction_record(
        &self,
        challenge_id: Uuid,
        from_user: &str,
        to_user: &str,
        amount: Decimal,
    ) -> AppResult<i64> {
        let id = self.next_tx_id.fetch_add(1, Ordering::SeqCst);
        let record = TransactionRecord {
            id,
            challenge_id,
            from_user: from_user.to_string(),
            to_user: to_user.to_string(),
            token_amount: amount,
            token: "SOL".to_string(),
            state: TxState::Pending,
            tx_hash: String::new(),
            timestamp: 0,
        };

        let mut transactions = self.transactions.write().await;
        transactions.insert(id, record);
        Ok(id)
    }

    async fn confirm_transaction_record(
        &self,
        id: i64,
        tx_hash: &str,
        timestamp: i64,
    ) -> AppResult<()> {
        let mut transactions = self.transactions.write().await;
        let record = transactions
            .get_mut(&id)
            .ok_or_else(|| AppError::InvalidInput(format!("Transaction record {} not found", id)))?;
        record.state = TxState::Confirmed;
        record.tx_hash = tx_hash.to_string();
        record.timestamp = timestamp;
        Ok(())
    }

    async fn confirmed_payout_count(&self, challenge_id: Uuid) -> AppResult<u64> {
        let transactions = self.transactions.read().await;
        let count = transactions
            .values()
            .filter(|t| t.challenge_id == challenge_id && t.state == TxState::Confirmed)
            .count();
        Ok(count as u64)
    }

    async fn challenge_transactions(
        &self,
        challenge_id: Uuid,
    ) -> AppResult<Vec<TransactionRecord>> {
        let transactions = self.transactions.read().await;
        let mut records: Vec<TransactionRecord> = transactions
            .values()
            .filter(|t| t.challenge_id == challenge_id)
            .cloned()
            .collect();
        records.sort_by_key(|t| t.id);
        Ok(records)
    }

    async fn mark_challenge_complete(&self, id: Uuid) -> AppResult<()> {
        let mut challenges = self.challenges.write().await;
        if let Some(challenge) = challenges.get_mut(&id) {
            if challenge.completed_at.is_none() {
                challenge.completed_at = Some(Utc::now());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn new_challenge(max: i32) -> NewChallenge {
        NewChallenge {
            wallet: "creator".to_string(),
            statements: vec!["a".into(), "b".into(), "c".into()],
            lie_index: 0,
            max_challengers: max,
            total_amount: dec!(3),
            create_challenge_sig: "create-sig".to_string(),
        }
    }

    #[tokio::test]
    async fn add_guess_appends_and_creates_user() {
        let store = MemoryChallengeStore::new();
        let challenge = store.create_challenge(new_challenge(2)).await.unwrap();

        let updated = store
            .add_guess(challenge.id, "alice", "sig-a", true)
            .await
            .unwrap();
        assert_eq!(updated.correct_guesses_sig, vec!["sig-a".to_string()]);
        assert!(store.get_user("alice").await.unwrap().is_some());

        let updated = store
            .add_guess(challenge.id, "bob", "sig-b", false)
            .await
            .unwrap();
        assert_eq!(updated.incorrect_guesses_sig, vec!["sig-b".to_string()]);
        assert!(updated.is_full());
    }

    #[tokio::test]
    async fn add_guess_rejects_full_challenge() {
        let store = MemoryChallengeStore::new();
        let challenge = store.create_challenge(new_challenge(1)).await.unwrap();

        store
            .add_guess(challenge.id, "alice", "sig-a", true)
            .await
            .unwrap();
        let err = store.add_guess(challenge.id, "bob", "sig-b", false).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn mark_complete_is_idempotent() {
        let store = MemoryChallengeStore::new();
        let challenge = store.create_challenge(new_challenge(1)).await.unwrap();

        store.mark_challenge_complete(challenge.id).await.unwrap();
        let first = store
            .get_challenge(challenge.id)
            .await
            .unwrap()
            .unwrap()
            .completed_at;
        assert!(first.is_some());

        store.mark_challenge_complete(challenge.id).await.unwrap();
        let second = store
            .get_challenge(challenge.id)
            .await
            .unwrap()
            .unwrap()
            .completed_at;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn confirmed_count_ignores_pending_records() {
        let store = MemoryChallengeStore::new();
        let challenge = store.create_challenge(new_challenge(2)).await.unwrap();

        let a = store
            .create_transaction_record(challenge.id, "vault", "alice", dec!(1.9))
            .await
            .unwrap();
        store
            .create_transaction_record(challenge.id, "vault", "bob", dec!(1.9))
            .await
            .unwrap();
        assert_eq!(store.confirmed_payout_count(challenge.id).await.unwrap(), 0);

        store.confirm_transaction_record(a, "hash-a", 42).await.unwrap();
        assert_eq!(store.confirmed_payout_count(challenge.id).await.unwrap(), 1);

        let records = store.challenge_transactions(challenge.id).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].state, TxState::Confirmed);
        assert_eq!(records[0].tx_hash, "hash-a");
        assert_eq!(records[0].timestamp, 42);
        assert_eq!(records[1].state, TxState::Pending);
    }
}
