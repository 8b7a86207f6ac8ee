//! Common types used throughout the mint lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::fmt;

/// Unix timestamp in seconds, as stored on chain
pub type UnixTimestamp = i64;

/// Identity-verification requirement attached to a sale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatekeeperRequirement {
    /// Gatekeeper network that must have issued the caller's gateway token
    pub network: Pubkey,

    /// Whether the sale program consumes the token on use
    pub expire_on_use: bool,
}

/// How whitelist tokens are handled at mint time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WhitelistMode {
    /// One whitelist token is burned per mint
    BurnEveryTime,
    /// Holding a whitelist token is enough
    NeverBurn,
}

/// Whitelist / presale configuration of a sale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistSettings {
    pub mode: WhitelistMode,

    /// SPL mint of the whitelist token
    pub mint: Pubkey,

    /// Whitelist holders may mint before the go-live date
    pub presale: bool,

    /// Price charged to whitelist holders, in lamports
    pub discount_price: Option<u64>,
}

/// Condition after which the sale closes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndCondition {
    /// Sale closes at this unix timestamp
    Date(UnixTimestamp),
    /// Sale closes once this many items were redeemed
    Amount(u64),
}

/// Immutable snapshot of the on-chain sale
///
/// Produced by [`crate::state_fetcher::StateFetcher`] on every fetch and
/// superseded, never mutated, by the next one. The only derived copy the mint
/// path creates is [`SaleState::after_confirmed_mint`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleState {
    /// Address of the sale (candy machine) account
    pub program_address: Pubkey,

    pub is_active: bool,
    pub is_sold_out: bool,
    pub is_presale: bool,

    /// Go-live date; `None` means the authority has not opened the sale
    pub go_live_date: Option<UnixTimestamp>,

    /// Price in lamports (or in `token_mint` base units when set)
    pub price: u64,

    pub items_available: u64,
    pub items_redeemed: u64,
    pub items_remaining: u64,

    pub gatekeeper: Option<GatekeeperRequirement>,
    pub whitelist: Option<WhitelistSettings>,
    pub end_condition: Option<EndCondition>,

    /// Treasury receiving the mint price
    pub treasury: Pubkey,

    /// Sale authority, also the update authority of minted items
    pub authority: Pubkey,

    /// SPL token the price is paid in, `None` for SOL
    pub token_mint: Option<Pubkey>,
}

impl SaleState {
    /// Snapshot after one confirmed mint, used as an optimistic update until
    /// the next fetch lands.
    pub fn after_confirmed_mint(&self) -> Self {
        let items_redeemed = self.items_redeemed.saturating_add(1);
        let items_remaining = self.items_remaining.saturating_sub(1);
        let is_sold_out = items_remaining == 0;

        Self {
            items_redeemed,
            items_remaining,
            is_sold_out,
            is_active: self.is_active && !is_sold_out,
            ..self.clone()
        }
    }

    /// Go-live date as a UTC datetime, for display
    pub fn go_live_datetime(&self) -> Option<DateTime<Utc>> {
        self.go_live_date
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
    }

    /// Price the given payer is charged, honoring the presale discount
    pub fn effective_price(&self, holds_whitelist_token: bool) -> u64 {
        match self.whitelist {
            Some(WhitelistSettings {
                discount_price: Some(discount),
                ..
            }) if holds_whitelist_token => discount,
            _ => self.price,
        }
    }
}

/// One user-initiated mint attempt
///
/// Not idempotent: each request is a new attempt with a fresh mint account.
#[derive(Debug, Clone)]
pub struct MintRequest {
    pub payer: Pubkey,
    pub sale: SaleState,
    pub attempt_id: crate::observability::AttemptId,
}

/// A transaction accepted for broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedTransaction {
    pub signature: Signature,

    /// Address of the newly minted item
    pub mint: Pubkey,

    /// Submission time (unix seconds)
    pub submitted_at: UnixTimestamp,
}

/// Terminal outcome of waiting for a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmationResult {
    Confirmed,
    /// The transaction landed and was rejected on chain
    Failed(String),
    /// No terminal status within the budget; the outcome is unknown
    TimedOut,
}

impl ConfirmationResult {
    /// User-facing alert; a timeout reads as an unknown status, not a failure
    pub fn to_alert(&self, signature: &Signature) -> Alert {
        match self {
            ConfirmationResult::Confirmed => {
                Alert::new(Severity::Success, "Congratulations! Mint succeeded!")
            }
            ConfirmationResult::Failed(_) => {
                Alert::new(Severity::Error, "Mint failed! Please try again!")
            }
            ConfirmationResult::TimedOut => Alert::new(
                Severity::Warning,
                format!(
                    "Transaction status unknown. Check signature {signature} in an explorer \
                     before trying again."
                ),
            ),
        }
    }
}

/// Phase of the session's mint state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MintPhase {
    Idle,
    Submitting,
    Submitted,
    Rejected,
}

/// Alert severity shown by the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Success => "success",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

/// User-facing alert, the single form every mint outcome is reported in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub severity: Severity,
    pub message: String,
}

impl Alert {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}

/// Current unix time in seconds
pub fn now_unix() -> UnixTimestamp {
    Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sale_state;

    #[test]
    fn test_go_live_datetime() {
        let mut state = sale_state(10, 2);
        state.go_live_date = Some(1_640_995_200);
        assert_eq!(
            state.go_live_datetime().map(|dt| dt.to_rfc3339()),
            Some("2022-01-01T00:00:00+00:00".to_string())
        );

        state.go_live_date = None;
        assert!(state.go_live_datetime().is_none());
    }
}
