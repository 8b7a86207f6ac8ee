//! Classification of failed mint submissions
//!
//! The single place that turns a raw [`SubmissionFailure`] into a semantic
//! [`MintError`]. Program rejections are matched on their numeric code; faults
//! without a code fall back to marker substrings in the message text.

use crate::errors::MintError;
use crate::ledger::SubmissionFailure;

/// Candy machine program error: no items left
pub const SOLD_OUT_CODE: u32 = 311;

/// Candy machine program error: go-live date not reached
pub const NOT_LIVE_CODE: u32 = 312;

/// Hex form of [`SOLD_OUT_CODE`] as it appears in wallet error text
pub const SOLD_OUT_MARKER: &str = "0x137";

/// Hex form of the token program's insufficient-funds error
pub const INSUFFICIENT_FUNDS_MARKER: &str = "0x135";

/// Map a failed signing/broadcast onto the mint error taxonomy
pub fn classify_submission_failure(failure: &SubmissionFailure) -> MintError {
    match failure {
        SubmissionFailure::ProgramRejected { code, message } => match *code {
            SOLD_OUT_CODE => MintError::SoldOut,
            NOT_LIVE_CODE => MintError::NotLive,
            _ => MintError::Generic(message.clone()),
        },
        SubmissionFailure::Faulted { message: None } => MintError::SubmissionTimeout,
        SubmissionFailure::Faulted {
            message: Some(message),
        } => classify_message(message),
    }
}

fn classify_message(message: &str) -> MintError {
    if message.contains(SOLD_OUT_MARKER) {
        MintError::SoldOut
    } else if message.contains(INSUFFICIENT_FUNDS_MARKER) {
        MintError::InsufficientFunds
    } else {
        MintError::Generic(message.to_string())
    }
}
