//! Presentation boundary
//!
//! A [`MintSession`] owns the cached sale snapshot and the last alert, and
//! exposes them as a [`SessionView`]. Single-writer rules:
//! - the busy flag is written only by the orchestrator
//! - the cached snapshot is written by `refresh` (newest fetch only) and by
//!   the optimistic update after a confirmed mint
//! - the reload request is raised by a sold-out mint and taken by the caller

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info, instrument, warn};

use crate::errors::MintError;
use crate::orchestrator::MintOrchestrator;
use crate::state_fetcher::StateFetcher;
use crate::types::{Alert, ConfirmationResult, SaleState};
use crate::wallet::connected_address;

/// What the presentation layer renders
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub state: Option<SaleState>,
    pub is_minting: bool,
    pub last_result: Option<Alert>,
}

#[derive(Debug, Default)]
struct CachedState {
    state: Option<SaleState>,
    /// Ticket of the fetch (or invalidation) that produced `state`
    version: u64,
}

pub struct MintSession {
    fetcher: StateFetcher,
    orchestrator: MintOrchestrator,
    program_address: Pubkey,
    tx_timeout: Duration,
    prefer_subscription: bool,
    cache: RwLock<CachedState>,
    next_ticket: AtomicU64,
    reload_requested: AtomicBool,
    last_result: Mutex<Option<Alert>>,
}

impl MintSession {
    pub fn new(
        fetcher: StateFetcher,
        orchestrator: MintOrchestrator,
        program_address: Pubkey,
        tx_timeout: Duration,
        prefer_subscription: bool,
    ) -> Self {
        Self {
            fetcher,
            orchestrator,
            program_address,
            tx_timeout,
            prefer_subscription,
            cache: RwLock::new(CachedState::default()),
            next_ticket: AtomicU64::new(0),
            reload_requested: AtomicBool::new(false),
            last_result: Mutex::new(None),
        }
    }

    pub fn program_address(&self) -> &Pubkey {
        &self.program_address
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            state: self.cache.read().state.clone(),
            is_minting: self.orchestrator.is_minting(),
            last_result: self.last_result.lock().clone(),
        }
    }

    /// Re-fetch the sale state
    ///
    /// Fetch errors are logged and the previous snapshot kept. A fetch that
    /// resolves after a newer fetch or an optimistic update is discarded.
    #[instrument(skip(self), fields(candy_machine = %self.program_address))]
    pub async fn refresh(&self) -> Option<SaleState> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        let wallet = self.orchestrator.wallet().as_ref();

        match self.fetcher.fetch_state(wallet, &self.program_address).await {
            Ok(Some(state)) => {
                let mut cache = self.cache.write();
                if ticket > cache.version {
                    cache.state = Some(state);
                    cache.version = ticket;
                } else {
                    debug!(ticket, version = cache.version, "Discarding stale sale state");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Sale state fetch failed, keeping previous state"),
        }

        self.cache.read().state.clone()
    }

    /// Run one mint attempt and wait for its confirmation
    ///
    /// Every outcome, including errors, comes back as an alert. A busy
    /// rejection is returned but does not replace the last result.
    pub async fn mint(&self) -> Alert {
        let sale = self.cache.read().state.clone();
        let payer = connected_address(self.orchestrator.wallet().as_ref());

        let result = self
            .orchestrator
            .mint_and_confirm(sale.as_ref(), payer, self.tx_timeout, self.prefer_subscription)
            .await;

        let alert = match result {
            Ok(attempt) => {
                if attempt.confirmation == ConfirmationResult::Confirmed {
                    self.apply_confirmed_mint(sale.as_ref());
                }
                attempt.confirmation.to_alert(&attempt.submitted.signature)
            }
            Err(MintError::AlreadyInProgress) => return MintError::AlreadyInProgress.to_alert(),
            Err(e) => {
                if e.requires_reload() {
                    self.invalidate();
                    self.reload_requested.store(true, Ordering::SeqCst);
                }
                e.to_alert()
            }
        };

        *self.last_result.lock() = Some(alert.clone());
        alert
    }

    /// True once after a sold-out mint; the caller should [`reload`](Self::reload)
    pub fn take_reload_request(&self) -> bool {
        self.reload_requested.swap(false, Ordering::SeqCst)
    }

    /// Drop every cached value and fetch from scratch
    pub async fn reload(&self) -> Option<SaleState> {
        info!(candy_machine = %self.program_address, "Reloading session state");
        self.invalidate();
        *self.last_result.lock() = None;
        self.reload_requested.store(false, Ordering::SeqCst);
        self.refresh().await
    }

    /// Decrement the remaining count of the newest snapshot taken before the mint
    ///
    /// A snapshot fetched after the mint landed already counts it and is kept.
    fn apply_confirmed_mint(&self, minted_against: Option<&SaleState>) {
        let mut cache = self.cache.write();
        let already_counted = match (cache.state.as_ref(), minted_against) {
            (Some(cached), Some(before)) => cached.items_redeemed > before.items_redeemed,
            _ => false,
        };

        if already_counted {
            debug!("Cached sale state already reflects the mint");
        } else {
            let next = cache
                .state
                .as_ref()
                .or(minted_against)
                .map(SaleState::after_confirmed_mint);
            cache.state = next;
        }
        // Fetches already in flight predate the mint
        cache.version = self.next_ticket.load(Ordering::SeqCst);
    }

    fn invalidate(&self) {
        let mut cache = self.cache.write();
        cache.state = None;
        cache.version = self.next_ticket.load(Ordering::SeqCst);
    }
}
