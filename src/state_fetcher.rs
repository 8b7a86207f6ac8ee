//! Sale-state reads
//!
//! A fetch is a single account read plus a pure decode, so it is safe to
//! repeat. Without a connected wallet there is nothing to fetch for and the
//! call returns `Ok(None)`.

use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use tracing::{debug, instrument};

use crate::candy_machine::decode_sale_state;
use crate::errors::FetchError;
use crate::ledger::LedgerClient;
use crate::metrics::metrics;
use crate::types::{now_unix, SaleState, UnixTimestamp};
use crate::wallet::{connected_address, WalletCapability};

pub struct StateFetcher {
    ledger: Arc<dyn LedgerClient>,
}

impl StateFetcher {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    /// Fetch and decode the sale as of now
    pub async fn fetch_state(
        &self,
        wallet: &dyn WalletCapability,
        program_address: &Pubkey,
    ) -> Result<Option<SaleState>, FetchError> {
        self.fetch_state_at(wallet, program_address, now_unix()).await
    }

    /// Fetch and decode the sale, deriving time-dependent flags against `now`
    #[instrument(skip(self, wallet), fields(candy_machine = %program_address))]
    pub async fn fetch_state_at(
        &self,
        wallet: &dyn WalletCapability,
        program_address: &Pubkey,
        now: UnixTimestamp,
    ) -> Result<Option<SaleState>, FetchError> {
        if connected_address(wallet).is_none() {
            debug!("Wallet not connected, skipping sale-state fetch");
            return Ok(None);
        }

        metrics().state_fetches_total.inc();
        let result = match self.ledger.read_account(program_address).await {
            Ok(data) => decode_sale_state(program_address, &data, now),
            Err(e) => Err(FetchError::from(e)),
        };

        match result {
            Ok(state) => {
                debug!(
                    items_remaining = state.items_remaining,
                    is_active = state.is_active,
                    is_presale = state.is_presale,
                    "Sale state fetched"
                );
                Ok(Some(state))
            }
            Err(e) => {
                metrics().state_fetch_errors_total.inc();
                Err(e)
            }
        }
    }
}
