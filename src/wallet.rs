//! Wallet capability and the local keypair wallet

use anyhow::{Context, Result};
use async_trait::async_trait;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::Transaction,
};
use std::sync::Arc;

use crate::errors::WalletError;

/// What the core needs from a wallet
///
/// A wallet that reports no address, or cannot sign, is treated as not
/// connected. Every operation is gated on [`connected_address`].
#[async_trait]
pub trait WalletCapability: Send + Sync {
    /// Stable public address, `None` while disconnected
    fn public_address(&self) -> Option<Pubkey>;

    fn supports_signing(&self) -> bool;

    /// Add the wallet's signature to a (possibly partially signed) transaction
    async fn sign_transaction(&self, tx: Transaction) -> Result<Transaction, WalletError>;

    async fn sign_all_transactions(
        &self,
        txs: Vec<Transaction>,
    ) -> Result<Vec<Transaction>, WalletError> {
        let mut signed = Vec::with_capacity(txs.len());
        for tx in txs {
            signed.push(self.sign_transaction(tx).await?);
        }
        Ok(signed)
    }
}

/// Address of a wallet that can actually sign, `None` otherwise
pub fn connected_address(wallet: &dyn WalletCapability) -> Option<Pubkey> {
    if wallet.supports_signing() {
        wallet.public_address()
    } else {
        None
    }
}

/// Wallet backed by a local keypair
#[derive(Clone)]
pub struct KeypairWallet {
    keypair: Arc<Keypair>,
}

impl KeypairWallet {
    /// Load a keypair file, either the 64-byte JSON array written by
    /// `solana-keygen` or 64 raw bytes
    pub fn from_file(path: &str) -> Result<Self> {
        let keypair_bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read keypair file: {}", path))?;

        let bytes = if keypair_bytes.len() == 64 {
            keypair_bytes
        } else {
            serde_json::from_slice::<Vec<u8>>(&keypair_bytes)
                .context("Failed to parse keypair JSON")?
        };

        Self::from_secret_bytes(&bytes)
    }

    /// Parse a base58-encoded 64-byte secret key
    pub fn from_base58(encoded: &str) -> Result<Self> {
        let bytes = bs58::decode(encoded.trim())
            .into_vec()
            .context("Invalid base58 keypair")?;
        Self::from_secret_bytes(&bytes)
    }

    pub fn from_keypair(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 64 {
            anyhow::bail!("Invalid keypair length: expected 64 bytes, got {}", bytes.len());
        }
        if bytes.iter().all(|&b| b == 0) {
            anyhow::bail!("Invalid keypair: all-zero key rejected");
        }
        let keypair = Keypair::try_from(bytes).context("Invalid keypair bytes")?;
        Ok(Self::from_keypair(keypair))
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }
}

#[async_trait]
impl WalletCapability for KeypairWallet {
    fn public_address(&self) -> Option<Pubkey> {
        Some(self.keypair.pubkey())
    }

    fn supports_signing(&self) -> bool {
        true
    }

    async fn sign_transaction(&self, mut tx: Transaction) -> Result<Transaction, WalletError> {
        let blockhash = tx.message.recent_blockhash;
        tx.try_partial_sign(&[self.keypair.as_ref()], blockhash)
            .map_err(|e| WalletError::Signing(e.to_string()))?;
        Ok(tx)
    }
}
