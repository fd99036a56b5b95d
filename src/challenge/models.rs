use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use sqlx::Type;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// A two-truths-and-a-lie challenge.
///
/// The creator's stake (`total_amount`) sits in the platform vault; each
/// challenger deposit is tracked by the signature of its on-chain transfer,
/// appended to `correct_guesses_sig` or `incorrect_guesses_sig` depending on
/// the guess. Settlement fires exactly when the two lists together reach
/// `max_challengers` and `completed_at` is still null.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Challenge {
    pub id: Uuid,
    /// Creator's wallet address, owner of the pooled stake
    pub wallet: String,
    /// Exactly 3 statements: two truths and a lie
    pub statements: Vec<String>,
    /// Index of the lie within `statements`, in [0, 2]
    pub lie_index: i16,
    pub max_challengers: i32,
    /// Creator's initial deposit, in SOL
    pub total_amount: Decimal,
    pub correct_guesses_sig: Vec<String>,
    pub incorrect_guesses_sig: Vec<String>,
    pub create_challenge_sig: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Challenge {
    pub fn guess_count(&self) -> usize {
        self.correct_guesses_sig.len() + self.incorrect_guesses_sig.len()
    }

    /// Every challenger slot taken
    pub fn is_full(&self) -> bool {
        self.guess_count() == self.max_challengers as usize
    }

    /// Per-seat stake: the pool divided evenly across challenger slots
    pub fn stake_per_seat(&self) -> Decimal {
        self.total_amount / Decimal::from(self.max_challengers)
    }
}

/// Parameters for creating a challenge, validated before insertion
#[derive(Debug, Clone)]
pub struct NewChallenge {
    pub wallet: String,
    pub statements: Vec<String>,
    pub lie_index: i16,
    pub max_challengers: i32,
    pub total_amount: Decimal,
    pub create_challenge_sig: String,
}

impl NewChallenge {
    pub fn validate(&self) -> AppResult<()> {
        if self.statements.len() != 3 {
            return Err(AppError::InvalidInput(
                "There must be exactly 3 statements".to_string(),
            ));
        }
        if !(0..=2).contains(&self.lie_index) {
            return Err(AppError::InvalidInput(
                "lie_index must be between 0 and 2".to_string(),
            ));
        }
        if self.max_challengers <= 0 {
            return Err(AppError::InvalidInput(
                "max_challengers must be positive".to_string(),
            ));
        }
        if self.total_amount <= Decimal::ZERO {
            return Err(AppError::InvalidInput(
                "total_amount must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// User entity, created lazily on first interaction
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub wallet: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Outbound payout state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "tx_state", rename_all = "lowercase")]
pub enum TxState {
    Pending,
    Confirmed,
}

/// Outbound payout audit record.
///
/// Created Pending right before a transfer is submitted, flipped to
/// Confirmed with the on-chain hash and ledger timestamp once it lands.
/// Append-only once confirmed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TransactionRecord {
    pub id: i64,
    pub challenge_id: Uuid,
    pub from_user: String,
    pub to_user: String,
    pub token_amount: Decimal,
    pub token: String,
    pub state: TxState,
    /// Empty until the ledger confirms the transfer
    pub tx_hash: String,
    /// Ledger block time, 0 until confirmed
    pub timestamp: i64,
}
