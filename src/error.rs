use sqlx::migrate::MigrateError;
use thiserror::Error;
use uuid::Uuid;

/// Top-level error type for the entire service
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while settling a single challenge
#[derive(Error, Debug)]
pub enum SettlementError {
    #[error("Payout wallet keypair unavailable")]
    PayerKeyUnavailable,

    #[error("Challenge not found: {0}")]
    ChallengeNotFound(Uuid),

    #[error("Challenge is not at capacity yet")]
    NotReady,

    #[error("Deposit {signature} was not sent to the vault (receiver: {receiver})")]
    WrongVaultAccount { signature: String, receiver: String },

    #[error("Transfer to {recipient} failed: {reason}")]
    TransferFailed { recipient: String, reason: String },
}

/// Errors raised by the ledger adapter while inspecting or submitting
/// transactions
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("No transfer instruction found in transaction {0}")]
    NoTransferInstruction(String),

    #[error("Transaction metadata not found for {0}")]
    MissingMetadata(String),

    #[error("Balance changes of {0} do not match a plain transfer")]
    BalanceMismatch(String),

    #[error("Invalid transaction signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid ledger address: {0}")]
    InvalidAddress(String),

    #[error("Invalid transfer amount: {0}")]
    InvalidAmount(String),

    #[error("RPC error: {0}")]
    Rpc(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(format!("Error converting: {:?}", error))
    }
}

impl From<MigrateError> for AppError {
    fn from(error: MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {:?}", error))
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;
