//! candy-mint - mint transaction lifecycle for candy machine NFT sales
//!
//! Fetches the on-chain sale state, submits the purchase transaction and
//! waits for its confirmation, turning every failure into a user-facing
//! alert. [`session::MintSession`] is the entry point for a presentation
//! layer; the CLI in `main.rs` is one such layer.

pub mod candy_machine;
pub mod classify;
pub mod config;
pub mod errors;
pub mod gatekeeper;
pub mod ledger;
pub mod metrics;
pub mod observability;
pub mod orchestrator;
pub mod session;
pub mod state_fetcher;
pub mod structured_logging;
pub mod types;
pub mod wallet;
pub mod watcher;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

// Re-export commonly used types
pub use errors::{FetchError, MintError};
pub use orchestrator::{MintAttempt, MintOrchestrator};
pub use session::{MintSession, SessionView};
pub use state_fetcher::StateFetcher;
pub use types::{Alert, ConfirmationResult, SaleState, Severity, SubmittedTransaction};
pub use watcher::ConfirmationWatcher;
