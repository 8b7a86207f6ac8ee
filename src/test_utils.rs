//! Test Utilities Module
//!
//! Deterministic stand-ins for the ledger, the wallet, the gatekeeper service
//! and the push subscription, plus a builder for candy machine account bytes.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use async_trait::async_trait;
use borsh::BorshSerialize;
use parking_lot::Mutex;
use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::Transaction,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use crate::candy_machine::{
    account_discriminator, RawCandyMachine, RawCandyMachineData, RawEndSettingType,
    RawEndSettings, RawGatekeeperConfig, RawWhitelistMintMode, RawWhitelistMintSettings,
};
use crate::errors::{GatekeeperError, LedgerError, WalletError};
use crate::gatekeeper::{GatekeeperService, GatewayToken, GatewayTokenState};
use crate::ledger::{
    LedgerClient, SignatureStatus, SignatureSubscriber, SignatureSubscription, SubmissionFailure,
};
use crate::types::SaleState;
use crate::wallet::WalletCapability;

/// Let aborted and freshly woken tasks run to completion
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// In-memory ledger with scripted submission and status responses
#[derive(Default)]
pub struct MockLedger {
    accounts: Mutex<HashMap<Pubkey, Vec<u8>>>,
    reads: AtomicUsize,
    read_delay: Mutex<Option<Duration>>,
    submit_results: Mutex<VecDeque<Result<Signature, SubmissionFailure>>>,
    submitted: Mutex<Vec<Transaction>>,
    submit_delay: Mutex<Option<Duration>>,
    statuses: Mutex<VecDeque<Option<SignatureStatus>>>,
    sticky_status: Mutex<Option<SignatureStatus>>,
    status_queries: AtomicUsize,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_account(&self, address: Pubkey, data: Vec<u8>) {
        self.accounts.lock().insert(address, data);
    }

    pub fn remove_account(&self, address: &Pubkey) {
        self.accounts.lock().remove(address);
    }

    pub fn set_read_delay(&self, delay: Option<Duration>) {
        *self.read_delay.lock() = delay;
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Next submission fails with `failure`
    pub fn fail_next_submit(&self, failure: SubmissionFailure) {
        self.submit_results.lock().push_back(Err(failure));
    }

    pub fn set_submit_delay(&self, delay: Duration) {
        *self.submit_delay.lock() = Some(delay);
    }

    pub fn submitted(&self) -> Vec<Transaction> {
        self.submitted.lock().clone()
    }

    pub fn submit_count(&self) -> usize {
        self.submitted.lock().len()
    }

    /// Statuses returned by successive polls, then the sticky status
    pub fn script_statuses(&self, statuses: Vec<Option<SignatureStatus>>) {
        self.statuses.lock().extend(statuses);
    }

    pub fn set_sticky_status(&self, status: Option<SignatureStatus>) {
        *self.sticky_status.lock() = status;
    }

    pub fn status_query_count(&self) -> usize {
        self.status_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn read_account(&self, address: &Pubkey) -> Result<Vec<u8>, LedgerError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let delay = *self.read_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.accounts
            .lock()
            .get(address)
            .cloned()
            .ok_or(LedgerError::AccountNotFound(*address))
    }

    async fn latest_blockhash(&self) -> Result<Hash, LedgerError> {
        Ok(Hash::new_unique())
    }

    async fn submit_transaction(&self, tx: &Transaction) -> Result<Signature, SubmissionFailure> {
        let delay = *self.submit_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.submitted.lock().push(tx.clone());
        let scripted = self.submit_results.lock().pop_front();
        match scripted {
            Some(result) => result,
            None => Ok(tx.signatures[0]),
        }
    }

    async fn signature_status(
        &self,
        _signature: &Signature,
    ) -> Result<Option<SignatureStatus>, LedgerError> {
        self.status_queries.fetch_add(1, Ordering::SeqCst);
        let scripted = self.statuses.lock().pop_front();
        Ok(match scripted {
            Some(status) => status,
            None => self.sticky_status.lock().clone(),
        })
    }
}

/// Wallet double: signs with a real keypair unless told to fail
pub struct MockWallet {
    keypair: Keypair,
    connected: bool,
    can_sign: bool,
    failure: Mutex<Option<WalletError>>,
    sign_count: AtomicUsize,
}

impl MockWallet {
    pub fn connected() -> Self {
        Self {
            keypair: Keypair::new(),
            connected: true,
            can_sign: true,
            failure: Mutex::new(None),
            sign_count: AtomicUsize::new(0),
        }
    }

    pub fn disconnected() -> Self {
        Self {
            connected: false,
            ..Self::connected()
        }
    }

    /// Exposes an address but no signing capability
    pub fn read_only() -> Self {
        Self {
            can_sign: false,
            ..Self::connected()
        }
    }

    pub fn failing(error: WalletError) -> Self {
        let wallet = Self::connected();
        *wallet.failure.lock() = Some(error);
        wallet
    }

    pub fn address(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn sign_count(&self) -> usize {
        self.sign_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletCapability for MockWallet {
    fn public_address(&self) -> Option<Pubkey> {
        self.connected.then(|| self.keypair.pubkey())
    }

    fn supports_signing(&self) -> bool {
        self.can_sign
    }

    async fn sign_transaction(&self, mut tx: Transaction) -> Result<Transaction, WalletError> {
        self.sign_count.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        let blockhash = tx.message.recent_blockhash;
        tx.try_partial_sign(&[&self.keypair], blockhash)
            .map_err(|e| WalletError::Signing(e.to_string()))?;
        Ok(tx)
    }
}

pub struct MockGatekeeper {
    result: Result<Pubkey, GatekeeperError>,
    calls: AtomicUsize,
}

impl MockGatekeeper {
    pub fn issuing(token: Pubkey) -> Self {
        Self {
            result: Ok(token),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn refusing(error: GatekeeperError) -> Self {
        Self {
            result: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GatekeeperService for MockGatekeeper {
    async fn obtain_token(
        &self,
        _network: &Pubkey,
        _wallet: &dyn WalletCapability,
    ) -> Result<Pubkey, GatekeeperError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// Subscriber that replays fixed statuses and records cancellation
pub struct MockSubscriber {
    statuses: Vec<SignatureStatus>,
    delay: Option<Duration>,
    fail: bool,
    subscriptions: AtomicUsize,
    cancelled: Arc<AtomicBool>,
}

impl MockSubscriber {
    pub fn with_statuses(statuses: Vec<SignatureStatus>) -> Self {
        Self {
            statuses,
            delay: None,
            fail: false,
            subscriptions: AtomicUsize::new(0),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Deliver `statuses` only after `delay`, unless cancelled first
    pub fn delayed(delay: Duration, statuses: Vec<SignatureStatus>) -> Self {
        Self {
            delay: Some(delay),
            ..Self::with_statuses(statuses)
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::with_statuses(Vec::new())
        }
    }

    pub fn subscribe_count(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignatureSubscriber for MockSubscriber {
    async fn subscribe(&self, _signature: &Signature) -> Result<SignatureSubscription, LedgerError> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(LedgerError::Subscription("websocket closed".into()));
        }

        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let (cancel_tx, mut cancel_rx) = oneshot::channel();
        let statuses = self.statuses.clone();
        let delay = self.delay;
        if delay.is_none() {
            for status in &statuses {
                let _ = updates_tx.send(status.clone());
            }
        }

        let cancelled = Arc::clone(&self.cancelled);
        tokio::spawn(async move {
            if let Some(delay) = delay {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {
                        for status in statuses {
                            let _ = updates_tx.send(status);
                        }
                    }
                    result = &mut cancel_rx => {
                        if result.is_ok() {
                            cancelled.store(true, Ordering::SeqCst);
                        }
                        return;
                    }
                }
            }

            // Keep the stream open until the consumer cancels
            let _updates = updates_tx;
            if cancel_rx.await.is_ok() {
                cancelled.store(true, Ordering::SeqCst);
            }
        });

        Ok(SignatureSubscription::new(updates_rx, cancel_tx))
    }
}

/// Builder for candy machine account bytes
#[derive(Debug, Clone)]
pub struct CandyMachineFixture {
    pub authority: Pubkey,
    pub treasury: Pubkey,
    pub price: u64,
    pub items_available: u64,
    pub items_redeemed: u64,
    pub go_live_date: Option<i64>,
    end_settings: Option<RawEndSettings>,
    whitelist: Option<RawWhitelistMintSettings>,
    gatekeeper: Option<RawGatekeeperConfig>,
}

impl CandyMachineFixture {
    pub fn live(items_available: u64, items_redeemed: u64, go_live_date: i64) -> Self {
        Self {
            authority: Pubkey::new_unique(),
            treasury: Pubkey::new_unique(),
            price: 1_000_000_000,
            items_available,
            items_redeemed,
            go_live_date: Some(go_live_date),
            end_settings: None,
            whitelist: None,
            gatekeeper: None,
        }
    }

    pub fn without_go_live(mut self) -> Self {
        self.go_live_date = None;
        self
    }

    pub fn with_end_date(mut self, end: i64) -> Self {
        self.end_settings = Some(RawEndSettings {
            end_setting_type: RawEndSettingType::Date,
            number: end as u64,
        });
        self
    }

    pub fn with_end_amount(mut self, amount: u64) -> Self {
        self.end_settings = Some(RawEndSettings {
            end_setting_type: RawEndSettingType::Amount,
            number: amount,
        });
        self
    }

    pub fn with_whitelist(mut self, mint: Pubkey, presale: bool, discount_price: Option<u64>) -> Self {
        self.whitelist = Some(RawWhitelistMintSettings {
            mode: RawWhitelistMintMode::BurnEveryTime,
            mint: mint.to_bytes(),
            presale,
            discount_price,
        });
        self
    }

    pub fn with_gatekeeper(mut self, network: Pubkey, expire_on_use: bool) -> Self {
        self.gatekeeper = Some(RawGatekeeperConfig {
            gatekeeper_network: network.to_bytes(),
            expire_on_use,
        });
        self
    }

    pub fn encode(&self) -> Vec<u8> {
        let raw = RawCandyMachine {
            authority: self.authority.to_bytes(),
            wallet: self.treasury.to_bytes(),
            token_mint: None,
            items_redeemed: self.items_redeemed,
            data: RawCandyMachineData {
                uuid: "a1b2c3".to_string(),
                price: self.price,
                symbol: "CNDY".to_string(),
                seller_fee_basis_points: 500,
                max_supply: 0,
                is_mutable: true,
                retain_authority: true,
                go_live_date: self.go_live_date,
                end_settings: self.end_settings.clone(),
                creators: Vec::new(),
                hidden_settings: None,
                whitelist_mint_settings: self.whitelist.clone(),
                items_available: self.items_available,
                gatekeeper: self.gatekeeper.clone(),
            },
        };

        let mut data = account_discriminator().to_vec();
        data.extend(raw.try_to_vec().expect("borsh encoding"));
        data
    }
}

/// An open sale snapshot with the given inventory
pub fn sale_state(items_available: u64, items_redeemed: u64) -> SaleState {
    let items_remaining = items_available.saturating_sub(items_redeemed);
    SaleState {
        program_address: Pubkey::new_unique(),
        is_active: items_remaining > 0,
        is_sold_out: items_remaining == 0,
        is_presale: false,
        go_live_date: Some(1_600_000_000),
        price: 1_000_000_000,
        items_available,
        items_redeemed,
        items_remaining,
        gatekeeper: None,
        whitelist: None,
        end_condition: None,
        treasury: Pubkey::new_unique(),
        authority: Pubkey::new_unique(),
        token_mint: None,
    }
}

/// Encoded gateway token account
pub fn gateway_token_bytes(
    owner: &Pubkey,
    network: &Pubkey,
    state: GatewayTokenState,
    expire_time: Option<i64>,
) -> Vec<u8> {
    GatewayToken {
        features: 0,
        parent_gateway_token: None,
        owner_wallet: owner.to_bytes(),
        owner_identity: None,
        gatekeeper_network: network.to_bytes(),
        issuing_gatekeeper: Pubkey::new_unique().to_bytes(),
        state,
        expire_time,
    }
    .try_to_vec()
    .expect("borsh encoding")
}
