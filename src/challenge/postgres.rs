use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::challenge::models::{Challenge, NewChallenge, TransactionRecord, User};
use crate::challenge::store::ChallengeStore;
use crate::error::{AppError, AppResult};

const CHALLENGE_COLUMNS: &str = "id, wallet, statements, lie_index, max_challengers, \
     total_amount, correct_guesses_sig, incorrect_guesses_sig, create_challenge_sig, \
     completed_at, created_at";

/// Postgres-backed store, the source of truth in production
pub struct PgChallengeStore {
    pool: PgPool,
}

impl PgChallengeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChallengeStore for PgChallengeStore {
    async fn create_user_if_absent(&self, wallet: &str, name: &str) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (wallet, name)
            VALUES ($1, $2)
            ON CONFLICT (wallet) DO UPDATE SET wallet = EXCLUDED.wallet
            RETURNING wallet, name, created_at
            "#,
        )
        .bind(wallet)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_user(&self, wallet: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT wallet, name, created_at FROM users WHERE wallet = $1",
        )
        .bind(wallet)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create_challenge(&self, new: NewChallenge) -> AppResult<Challenge> {
        new.validate()?;
        self.create_user_if_absent(&new.wallet, "User").await?;

        let challenge = sqlx::query_as::<_, Challenge>(&format!(
            r#"
            INSERT INTO challenges (
                wallet, statements, lie_index, max_challengers,
                total_amount, create_challenge_sig
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {CHALLENGE_COLUMNS}
            "#
        ))
        .bind(&new.wallet)
        .bind(&new.statements)
        .bind(new.lie_index)
        .bind(new.max_challengers)
        .bind(new.total_amount)
        .bind(&new.create_challenge_sig)
        .fetch_one(&self.pool)
        .await?;

        Ok(challenge)
    }

    async fn get_challenge(&self, id: Uuid) -> AppResult<Option<Challenge>> {
        let challenge = sqlx::query_as::<_, Challenge>(&format!(
            "SELECT {CHALLENGE_COLUMNS} FROM challenges WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(challenge)
    }

    async fn list_challenges(&self) -> AppResult<Vec<Challenge>> {
        let challenges = sqlx::query_as::<_, Challenge>(&format!(
            "SELECT {CHALLENGE_COLUMNS} FROM challenges ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(challenges)
    }

    async fn add_guess(
        &self,
        challenge_id: Uuid,
        wallet: &str,
        signature: &str,
        correct: bool,
    ) -> AppResult<Challenge> {
        self.create_user_if_absent(wallet, "User").await?;

        // Capacity is enforced in the WHERE clause so two concurrent joins
        // cannot push a challenge past max_challengers.
        let column = if correct {
            "correct_guesses_sig"
        } else {
            "incorrect_guesses_sig"
        };
        let challenge = sqlx::query_as::<_, Challenge>(&format!(
            r#"
            UPDATE challenges
            SET {column} = array_append({column}, $2)
            WHERE id = $1
              AND completed_at IS NULL
              AND cardinality(correct_guesses_sig) + cardinality(incorrect_guesses_sig)
                  < max_challengers
            RETURNING {CHALLENGE_COLUMNS}
            "#
        ))
        .bind(challenge_id)
        .bind(signature)
        .fetch_optional(&self.pool)
        .await?;

        challenge.ok_or_else(|| {
            AppError::InvalidInput(format!(
                "Challenge {} is full, completed or missing",
                challenge_id
            ))
        })
    }

    async fn create_transaction_record(
        &self,
        challenge_id: Uuid,
        from_user: &str,
        to_user: &str,
        amount: Decimal,
    ) -> AppResult<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO transactions (challenge_id, from_user, to_user, token_amount)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(challenge_id)
        .bind(from_user)
        .bind(to_user)
        .bind(amount)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn confirm_transaction_record(
        &self,
        id: i64,
        tx_hash: &str,
        timestamp: i64,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE transactions
            SET state = 'confirmed', tx_hash = $2, timestamp = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(tx_hash)
        .bind(timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn confirmed_payout_count(&self, challenge_id: Uuid) -> AppResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM transactions WHERE challenge_id = $1 AND state = 'confirmed'",
        )
        .bind(challenge_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }

    async fn challenge_transactions(
        &self,
        challenge_id: Uuid,
    ) -> AppResult<Vec<TransactionRecord>> {
        let records = sqlx::query_as::<_, TransactionRecord>(
            r#"
            SELECT id, challenge_id, from_user, to_user, token_amount, token,
                   state, tx_hash, timestamp
            FROM transactions
            WHERE challenge_id = $1
            ORDER BY id
            "#,
        )
        .bind(challenge_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn mark_challenge_complete(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE challenges SET completed_at = COALESCE(completed_at, now()) WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
