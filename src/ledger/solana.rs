use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use solana_client::{rpc_client::RpcClient, rpc_config::CommitmentConfig};
use solana_sdk::{
    hash::Hash,
    message::Message,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::Transaction,
};
use solana_system_interface::{instruction as system_instruction, program as system_program};
use solana_transaction_status_client_types::{
    EncodedTransaction, UiMessage, UiRawMessage, UiTransactionEncoding,
};
use tracing::info;

use crate::error::{AppResult, LedgerError};
use crate::ledger::{sol_to_lamports, ConfirmedTransfer, LedgerAdapter, TransferDetails};

#[derive(Debug, Clone)]
pub struct SolanaConfig {
    pub rpc_url: String,
    pub commitment: CommitmentConfig,
}

impl Default for SolanaConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.devnet.solana.com".to_string(),
            commitment: CommitmentConfig::confirmed(),
        }
    }
}

/// Solana implementation of the ledger adapter.
///
/// Holds the platform payout keypair, the single shared signing authority
/// for every settlement. Outbound submissions are serialized through
/// `submit_lock` so concurrent settlements never race on the wallet's
/// blockhash/sequence ordering.
pub struct SolanaLedger {
    client: RpcClient,
    payout_keypair: Arc<Keypair>,
    submit_lock: tokio::sync::Mutex<()>,
}

impl SolanaLedger {
    pub fn new(config: SolanaConfig, payout_keypair: Keypair) -> Self {
        let client = RpcClient::new_with_commitment(config.rpc_url.clone(), config.commitment);
        Self {
            client,
            payout_keypair: Arc::new(payout_keypair),
            submit_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn parse_recipient(to: &str) -> Result<Pubkey, LedgerError> {
        Pubkey::from_str(to).map_err(|_| LedgerError::InvalidAddress(to.to_string()))
    }

    fn latest_blockhash(&self) -> Result<Hash, LedgerError> {
        self.client
            .get_latest_blockhash()
            .map_err(|e| LedgerError::Rpc(format!("Failed to get blockhash: {}", e)))
    }

    /// Fee for a plain transfer, estimated against the same blockhash the
    /// caller will sign with
    fn transfer_fee(
        &self,
        to: &Pubkey,
        lamports: u64,
        blockhash: &Hash,
    ) -> Result<u64, LedgerError> {
        let payer = self.payout_keypair.pubkey();
        let message = Message::new_with_blockhash(
            &[system_instruction::transfer(&payer, to, lamports)],
            Some(&payer),
            blockhash,
        );
        self.client
            .get_fee_for_message(&message)
            .map_err(|e| LedgerError::Rpc(format!("Fee estimation failed: {}", e)))
    }

    /// Dig the raw message out of a JSON-encoded transaction
    fn raw_message(
        signature: &str,
        transaction: &EncodedTransaction,
    ) -> Result<UiRawMessage, LedgerError> {
        match transaction {
            EncodedTransaction::Json(ui_tx) => match &ui_tx.message {
                UiMessage::Raw(raw) => Ok(raw.clone()),
                UiMessage::Parsed(_) => Err(LedgerError::NoTransferInstruction(
                    signature.to_string(),
                )),
            },
            _ => Err(LedgerError::NoTransferInstruction(signature.to_string())),
        }
    }
}

#[async_trait]
impl LedgerAdapter for SolanaLedger {
    fn payout_wallet(&self) -> AppResult<String> {
        Ok(self.payout_keypair.pubkey().to_string())
    }

    async fn transaction_effects(&self, signature: &str) -> AppResult<TransferDetails> {
        let sig = Signature::from_str(signature)
            .map_err(|_| LedgerError::InvalidSignature(signature.to_string()))?;

        let tx = self
            .client
            .get_transaction(&sig, UiTransactionEncoding::Json)
            .map_err(|_| LedgerError::TransactionNotFound(signature.to_string()))?;

        let meta = tx
            .transaction
            .meta
            .ok_or_else(|| LedgerError::MissingMetadata(signature.to_string()))?;

        let message = Self::raw_message(signature, &tx.transaction.transaction)?;

        // The deposit is a plain system transfer: accounts[0] funds
        // accounts[1]
        let system_id = system_program::ID.to_string();
        let transfer = message
            .instructions
            .iter()
            .find(|ix| {
                message
                    .account_keys
                    .get(ix.program_id_index as usize)
                    .is_some_and(|key| *key == system_id)
                    && ix.accounts.len() >= 2
            })
            .ok_or_else(|| LedgerError::NoTransferInstruction(signature.to_string()))?;

        let sender_index = transfer.accounts[0] as usize;
        let receiver_index = transfer.accounts[1] as usize;

        let sender = message
            .account_keys
            .get(sender_index)
            .cloned()
            .ok_or_else(|| LedgerError::NoTransferInstruction(signature.to_string()))?;
        let receiver = message
            .account_keys
            .get(receiver_index)
            .cloned()
            .ok_or_else(|| LedgerError::NoTransferInstruction(signature.to_string()))?;

        let balance_delta = |index: usize| -> Result<i128, LedgerError> {
            let pre = meta
                .pre_balances
                .get(index)
                .ok_or_else(|| LedgerError::MissingMetadata(signature.to_string()))?;
            let post = meta
                .post_balances
                .get(index)
                .ok_or_else(|| LedgerError::MissingMetadata(signature.to_string()))?;
            Ok(*post as i128 - *pre as i128)
        };

        let sender_delta = balance_delta(sender_index)?;
        let receiver_delta = balance_delta(receiver_index)?;

        // The sender paid the transfer plus the network fee, the receiver
        // gained exactly the transfer; anything else is not a plain deposit.
        if sender_delta + meta.fee as i128 != -receiver_delta || receiver_delta <= 0 {
            return Err(LedgerError::BalanceMismatch(signature.to_string()).into());
        }

        Ok(TransferDetails {
            sender,
            receiver,
            lamports: receiver_delta as u64,
        })
    }

    async fn submit_transfer(&self, to: &str, amount: Decimal) -> AppResult<ConfirmedTransfer> {
        let recipient = Self::parse_recipient(to)?;
        let lamports = sol_to_lamports(amount)?;

        // Single writer: the payout wallet signs every settlement transfer
        let _guard = self.submit_lock.lock().await;

        let payer = self.payout_keypair.pubkey();
        let blockhash = self.latest_blockhash()?;

        // The network fee comes out of the payout amount so the vault never
        // bleeds fees on top of the pooled stake
        let fee = self.transfer_fee(&recipient, lamports, &blockhash)?;
        let net_lamports = lamports.checked_sub(fee).ok_or_else(|| {
            LedgerError::InvalidAmount(format!(
                "payout of {} lamports does not cover the {} lamport fee",
                lamports, fee
            ))
        })?;

        let message = Message::new_with_blockhash(
            &[system_instruction::transfer(&payer, &recipient, net_lamports)],
            Some(&payer),
            &blockhash,
        );
        let transaction = Transaction::new(&[&*self.payout_keypair], message, blockhash);

        let signature = self
            .client
            .send_and_confirm_transaction(&transaction)
            .map_err(|e| LedgerError::Rpc(format!("Send failed: {}", e)))?;

        // Best effort, the record keeps 0 when the node has no block time yet
        let timestamp = self
            .client
            .get_transaction(&signature, UiTransactionEncoding::Json)
            .ok()
            .and_then(|tx| tx.block_time)
            .unwrap_or(0);

        info!(
            "✅ Transfer confirmed: {} SOL from {} to {} (sig: {})",
            amount, payer, recipient, signature
        );

        Ok(ConfirmedTransfer {
            signature: signature.to_string(),
            timestamp,
        })
    }

    async fn estimate_fee(&self, to: &str, amount: Decimal) -> AppResult<u64> {
        let recipient = Self::parse_recipient(to)?;
        let lamports = sol_to_lamports(amount)?;
        let blockhash = self.latest_blockhash()?;
        Ok(self.transfer_fee(&recipient, lamports, &blockhash)?)
    }
}
