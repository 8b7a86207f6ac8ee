//! Remote ledger access
//!
//! The core only ever talks to the chain through [`LedgerClient`] (account
//! reads, broadcast, signature status) and, optionally, the push variant of
//! the status query, [`SignatureSubscriber`].

use async_trait::async_trait;
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction};
use tokio::sync::{mpsc, oneshot};

use crate::errors::LedgerError;

pub mod rpc;

#[cfg(feature = "ws-stream")]
pub mod pubsub;

pub use rpc::RpcLedger;

/// Status of a broadcast transaction as reported by the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureStatus {
    /// Seen by a validator, not yet voted on
    Processed,
    Confirmed,
    Finalized,
    /// Landed and rejected on chain
    Failed(String),
}

impl SignatureStatus {
    /// Confirmed, finalized and failed statuses end the wait
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SignatureStatus::Processed)
    }
}

/// Raw failure of a signing or broadcast step, before classification
///
/// Mirrors the two shapes a failed submission takes: a rejection carrying the
/// sale program's numeric error code, or a fault with (maybe) a free-text
/// message. See [`crate::classify::classify_submission_failure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionFailure {
    /// The program rejected the transaction with a custom error code
    ProgramRejected { code: u32, message: String },

    /// Signing or transport fault; `None` when nothing was reported at all
    Faulted { message: Option<String> },
}

impl SubmissionFailure {
    pub fn faulted(message: impl Into<String>) -> Self {
        SubmissionFailure::Faulted {
            message: Some(message.into()),
        }
    }

    pub fn silent() -> Self {
        SubmissionFailure::Faulted { message: None }
    }
}

impl std::fmt::Display for SubmissionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmissionFailure::ProgramRejected { code, message } => {
                write!(f, "program rejected (code {code}, 0x{code:x}): {message}")
            }
            SubmissionFailure::Faulted { message: Some(m) } => write!(f, "{m}"),
            SubmissionFailure::Faulted { message: None } => write!(f, "<no message>"),
        }
    }
}

impl From<LedgerError> for SubmissionFailure {
    fn from(err: LedgerError) -> Self {
        SubmissionFailure::faulted(err.to_string())
    }
}

impl From<crate::errors::WalletError> for SubmissionFailure {
    fn from(err: crate::errors::WalletError) -> Self {
        match err {
            crate::errors::WalletError::NoResponse => SubmissionFailure::silent(),
            other => SubmissionFailure::faulted(other.to_string()),
        }
    }
}

/// Operations the core needs from the remote ledger
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Raw data of an account
    async fn read_account(&self, address: &Pubkey) -> Result<Vec<u8>, LedgerError>;

    /// Blockhash to build a transaction against
    async fn latest_blockhash(&self) -> Result<Hash, LedgerError>;

    /// Broadcast a fully signed transaction
    async fn submit_transaction(&self, tx: &Transaction) -> Result<Signature, SubmissionFailure>;

    /// Current status of a signature, `None` if the ledger has not seen it
    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, LedgerError>;
}

/// Push notifications of signature status
#[async_trait]
pub trait SignatureSubscriber: Send + Sync {
    /// Subscribe once to status updates of `signature`
    async fn subscribe(&self, signature: &Signature) -> Result<SignatureSubscription, LedgerError>;
}

/// Live subscription handle
///
/// Dropping it tells the producer to unsubscribe; it is the only way a
/// subscription ends besides the producer closing the channel.
#[derive(Debug)]
pub struct SignatureSubscription {
    updates: mpsc::UnboundedReceiver<SignatureStatus>,
    cancel: Option<oneshot::Sender<()>>,
}

impl SignatureSubscription {
    /// Create a subscription from a status channel and the producer's cancel hook
    pub fn new(
        updates: mpsc::UnboundedReceiver<SignatureStatus>,
        cancel: oneshot::Sender<()>,
    ) -> Self {
        Self {
            updates,
            cancel: Some(cancel),
        }
    }

    /// Next status update, `None` once the producer is gone
    pub async fn next(&mut self) -> Option<SignatureStatus> {
        self.updates.recv().await
    }
}

impl Drop for SignatureSubscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            // Producer may already be gone
            let _ = cancel.send(());
        }
    }
}
