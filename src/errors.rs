//! Error taxonomy for the mint lifecycle
//!
//! Every failure is one of these types. [`MintError`] is the only one that
//! reaches the presentation layer, and only ever as an [`Alert`]:
//! - `Precondition`: local, never hits the network
//! - `Gatekeeper`: identity verification missing or invalid
//! - `SoldOut`: terminal for the session, forces a reload
//! - `NotLive`: sale window not open yet
//! - `InsufficientFunds`: payer must fund the wallet
//! - `SubmissionTimeout`: the wallet or broadcast gave no answer at all
//! - `Generic`: anything else, message passed through
//!
//! Fetch errors ([`FetchError`]) are logged and absorbed by the session.

use crate::types::{Alert, Severity};
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Ledger read / status errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// RPC operation failed
    #[error("RPC error: {message} (endpoint: {endpoint:?})")]
    Rpc {
        endpoint: Option<String>,
        message: String,
    },

    /// Account does not exist
    #[error("Account not found: {0}")]
    AccountNotFound(Pubkey),

    /// Push subscription could not be established
    #[error("Subscription error: {0}")]
    Subscription(String),
}

/// Errors decoding or reading the sale account
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Account exists but is not a candy machine
    #[error("Account {0} is not a candy machine (discriminator mismatch)")]
    NotACandyMachine(Pubkey),

    /// Account data could not be decoded
    #[error("Failed to decode candy machine {address}: {reason}")]
    Decode { address: Pubkey, reason: String },
}

/// Wallet signing errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalletError {
    #[error("Wallet not connected")]
    NotConnected,

    /// User declined or the wallet reported an error
    #[error("Wallet rejected signing: {0}")]
    Rejected(String),

    /// The wallet never answered
    #[error("Wallet did not respond")]
    NoResponse,

    #[error("Signing error: {0}")]
    Signing(String),
}

/// Identity verification errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatekeeperError {
    /// Sale requires verification but no gatekeeper service is wired
    #[error("Gatekeeper network {0} required but no gatekeeper service configured")]
    ServiceUnavailable(Pubkey),

    #[error("Wallet not connected")]
    WalletNotConnected,

    #[error("No gateway token {token} for network {network}")]
    TokenMissing { token: Pubkey, network: Pubkey },

    #[error("Gateway token {0} is revoked")]
    Revoked(Pubkey),

    #[error("Gateway token {0} is frozen")]
    Frozen(Pubkey),

    #[error("Gateway token {token} expired at {expired_at}")]
    Expired { token: Pubkey, expired_at: i64 },

    #[error("Gateway token {token} does not belong to this wallet/network")]
    Mismatch { token: Pubkey },

    #[error("Gateway token {token} could not be read: {reason}")]
    Unreadable { token: Pubkey, reason: String },
}

/// Missing precondition for a mint attempt
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("wallet not connected")]
    WalletNotConnected,

    #[error("sale state not loaded")]
    SaleStateMissing,

    #[error("payer address missing")]
    PayerMissing,

    #[error("payer {payer} is not the connected wallet {wallet}")]
    PayerMismatch { payer: Pubkey, wallet: Pubkey },
}

/// Classified outcome of a failed mint submission
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MintError {
    #[error("Mint precondition not met: {0}")]
    Precondition(#[from] PreconditionError),

    /// Another attempt is still in flight for this session
    #[error("A mint is already in progress")]
    AlreadyInProgress,

    #[error("Gatekeeper verification failed: {0}")]
    Gatekeeper(#[from] GatekeeperError),

    #[error("Sold out")]
    SoldOut,

    #[error("Sale is not live yet")]
    NotLive,

    #[error("Insufficient funds")]
    InsufficientFunds,

    /// Signing or broadcast ended without any error message; the
    /// transaction may or may not have been sent
    #[error("Submission timed out")]
    SubmissionTimeout,

    /// Mint transaction could not be assembled
    #[error("Failed to build mint transaction: {0}")]
    Build(String),

    #[error("{0}")]
    Generic(String),
}

impl MintError {
    /// Sold out is unrecoverable for the session: the caller must drop every
    /// cached state and reload from scratch.
    pub fn requires_reload(&self) -> bool {
        matches!(self, MintError::SoldOut)
    }

    pub fn severity(&self) -> Severity {
        match self {
            MintError::NotLive => Severity::Info,
            MintError::Precondition(_) | MintError::AlreadyInProgress => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Short label used for metrics and logs
    pub fn reason(&self) -> &'static str {
        match self {
            MintError::Precondition(_) => "precondition",
            MintError::AlreadyInProgress => "busy",
            MintError::Gatekeeper(_) => "gatekeeper",
            MintError::SoldOut => "sold_out",
            MintError::NotLive => "not_live",
            MintError::InsufficientFunds => "insufficient_funds",
            MintError::SubmissionTimeout => "submission_timeout",
            MintError::Build(_) => "build",
            MintError::Generic(_) => "generic",
        }
    }

    /// User-facing alert for this error
    pub fn to_alert(&self) -> Alert {
        let message = match self {
            MintError::Precondition(PreconditionError::WalletNotConnected) => {
                "Please connect your wallet to mint.".to_string()
            }
            MintError::Precondition(PreconditionError::PayerMismatch { .. }) => {
                "Connected wallet changed. Please reconnect your wallet to mint.".to_string()
            }
            MintError::Precondition(_) => {
                "Sale information is still loading. Please try again.".to_string()
            }
            MintError::AlreadyInProgress => "A mint is already in progress.".to_string(),
            MintError::Gatekeeper(_) => {
                "Identity verification required. Please complete verification and try again."
                    .to_string()
            }
            MintError::SoldOut => "SOLD OUT!".to_string(),
            MintError::NotLive => "Minting period hasn't started yet.".to_string(),
            MintError::InsufficientFunds => {
                "Insufficient funds to mint. Please fund your wallet.".to_string()
            }
            MintError::SubmissionTimeout => "Transaction Timeout! Please try again.".to_string(),
            MintError::Build(_) => "Minting failed! Please try again!".to_string(),
            MintError::Generic(message) if message.trim().is_empty() => {
                "Minting failed! Please try again!".to_string()
            }
            MintError::Generic(message) => message.clone(),
        };
        Alert::new(self.severity(), message)
    }
}
