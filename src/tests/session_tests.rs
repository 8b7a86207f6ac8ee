//! End-to-end session scenarios over the mock ledger and wallet

use std::sync::Arc;
use std::time::Duration;

use solana_sdk::pubkey::Pubkey;

use crate::ledger::{SignatureStatus, SubmissionFailure};
use crate::orchestrator::MintOrchestrator;
use crate::session::MintSession;
use crate::state_fetcher::StateFetcher;
use crate::test_utils::{settle, CandyMachineFixture, MockLedger, MockWallet};
use crate::types::{now_unix, Severity};
use crate::watcher::ConfirmationWatcher;

const BUDGET: Duration = Duration::from_millis(30_000);

fn session(ledger: &Arc<MockLedger>, wallet: Arc<MockWallet>, address: Pubkey) -> MintSession {
    let orchestrator = MintOrchestrator::new(
        ledger.clone(),
        wallet,
        ConfirmationWatcher::new(ledger.clone()),
    );
    MintSession::new(
        StateFetcher::new(ledger.clone()),
        orchestrator,
        address,
        BUDGET,
        false,
    )
}

fn live_sale(ledger: &MockLedger, available: u64, redeemed: u64) -> Pubkey {
    let address = Pubkey::new_unique();
    ledger.set_account(
        address,
        CandyMachineFixture::live(available, redeemed, now_unix() - 3600).encode(),
    );
    address
}

#[tokio::test(start_paused = true)]
async fn test_last_item_minted_and_confirmed() {
    let ledger = Arc::new(MockLedger::new());
    let address = live_sale(&ledger, 10, 9);
    ledger.script_statuses(vec![None, Some(SignatureStatus::Confirmed)]);
    let wallet = Arc::new(MockWallet::connected());
    let session = session(&ledger, wallet, address);

    let state = session.refresh().await.unwrap();
    assert!(state.is_active);
    assert_eq!(state.items_remaining, 1);

    let alert = session.mint().await;
    assert_eq!(alert.severity, Severity::Success);
    assert_eq!(alert.message, "Congratulations! Mint succeeded!");
    assert_eq!(ledger.submit_count(), 1);

    let view = session.view();
    assert!(!view.is_minting);
    assert_eq!(view.last_result, Some(alert));
    let state = view.state.unwrap();
    assert_eq!(state.items_remaining, 0);
    assert_eq!(state.items_redeemed, 10);
    assert!(state.is_sold_out);
    assert!(!state.is_active);
    assert!(!session.take_reload_request());
}

#[tokio::test(start_paused = true)]
async fn test_sold_out_rejection_triggers_reload() {
    let ledger = Arc::new(MockLedger::new());
    let address = live_sale(&ledger, 10, 10);
    ledger.fail_next_submit(SubmissionFailure::ProgramRejected {
        code: 311,
        message: "custom program error: 0x137".into(),
    });
    let session = session(&ledger, Arc::new(MockWallet::connected()), address);

    let state = session.refresh().await.unwrap();
    assert_eq!(state.items_remaining, 0);

    let alert = session.mint().await;
    assert_eq!(alert.message, "SOLD OUT!");
    assert_eq!(alert.severity, Severity::Error);
    assert!(session.view().state.is_none());

    assert!(session.take_reload_request());
    assert!(!session.take_reload_request());

    let reloaded = session.reload().await.unwrap();
    assert!(reloaded.is_sold_out);
    assert!(session.view().last_result.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_stale_fetch_does_not_overwrite_optimistic_update() {
    let ledger = Arc::new(MockLedger::new());
    let address = live_sale(&ledger, 10, 5);
    ledger.script_statuses(vec![Some(SignatureStatus::Confirmed)]);
    let session = Arc::new(session(&ledger, Arc::new(MockWallet::connected()), address));

    assert_eq!(session.refresh().await.unwrap().items_remaining, 5);

    // Fetch starts before the mint and lands after it
    ledger.set_read_delay(Some(Duration::from_secs(10)));
    let in_flight = {
        let session = session.clone();
        tokio::spawn(async move { session.refresh().await })
    };
    settle().await;

    let alert = session.mint().await;
    assert_eq!(alert.severity, Severity::Success);
    assert_eq!(session.view().state.unwrap().items_remaining, 4);

    let after_stale = in_flight.await.unwrap().unwrap();
    assert_eq!(after_stale.items_remaining, 4);
    assert_eq!(session.view().state.unwrap().items_remaining, 4);

    // A fetch started after the mint applies normally
    ledger.set_read_delay(None);
    assert_eq!(session.refresh().await.unwrap().items_remaining, 5);
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_fetched_after_mint_is_not_decremented_again() {
    let ledger = Arc::new(MockLedger::new());
    let address = live_sale(&ledger, 10, 5);
    // Polled at 0s, 2s and 4s
    ledger.script_statuses(vec![None, None, Some(SignatureStatus::Confirmed)]);
    let session = Arc::new(session(&ledger, Arc::new(MockWallet::connected()), address));
    session.refresh().await.unwrap();

    let minting = {
        let session = session.clone();
        tokio::spawn(async move { session.mint().await })
    };
    settle().await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(ledger.submit_count(), 1);

    // The chain already counts our mint while confirmation is pending
    ledger.set_account(
        address,
        CandyMachineFixture::live(10, 6, now_unix() - 3600).encode(),
    );
    assert_eq!(session.refresh().await.unwrap().items_remaining, 4);

    let alert = minting.await.unwrap();
    assert_eq!(alert.severity, Severity::Success);

    let state = session.view().state.unwrap();
    assert_eq!(state.items_remaining, 4);
    assert_eq!(state.items_redeemed, 6);
    assert!(!state.is_sold_out);
}

#[tokio::test]
async fn test_fetch_errors_are_absorbed() {
    let ledger = Arc::new(MockLedger::new());
    let address = live_sale(&ledger, 10, 2);
    let session = session(&ledger, Arc::new(MockWallet::connected()), address);

    let first = session.refresh().await.unwrap();
    ledger.remove_account(&address);

    let kept = session.refresh().await;
    assert_eq!(kept, Some(first));
    assert!(session.view().last_result.is_none());
}

#[tokio::test]
async fn test_disconnected_wallet_fetches_nothing() {
    let ledger = Arc::new(MockLedger::new());
    let address = live_sale(&ledger, 10, 2);
    let session = session(&ledger, Arc::new(MockWallet::disconnected()), address);

    assert!(session.refresh().await.is_none());
    assert_eq!(ledger.read_count(), 0);

    let alert = session.mint().await;
    assert_eq!(alert.severity, Severity::Warning);
    assert_eq!(alert.message, "Please connect your wallet to mint.");
    assert_eq!(ledger.submit_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_confirmation_is_not_a_failure() {
    let ledger = Arc::new(MockLedger::new());
    let address = live_sale(&ledger, 10, 2);
    ledger.set_sticky_status(None);
    let session = session(&ledger, Arc::new(MockWallet::connected()), address);
    session.refresh().await.unwrap();

    let alert = session.mint().await;
    assert_eq!(alert.severity, Severity::Warning);
    assert!(alert.message.contains("status unknown"));
    assert!(!alert.message.contains("failed"));

    let signature = ledger.submitted()[0].signatures[0];
    assert!(alert.message.contains(&signature.to_string()));
    assert_eq!(session.view().state.unwrap().items_remaining, 8);
}

#[tokio::test(start_paused = true)]
async fn test_on_chain_failure_alert() {
    let ledger = Arc::new(MockLedger::new());
    let address = live_sale(&ledger, 10, 2);
    ledger.script_statuses(vec![Some(SignatureStatus::Failed(
        "InstructionError(5, Custom(1))".into(),
    ))]);
    let session = session(&ledger, Arc::new(MockWallet::connected()), address);
    session.refresh().await.unwrap();

    let alert = session.mint().await;
    assert_eq!(alert.severity, Severity::Error);
    assert_eq!(alert.message, "Mint failed! Please try again!");
    assert_eq!(session.view().state.unwrap().items_remaining, 8);
}

#[tokio::test(start_paused = true)]
async fn test_busy_rejection_keeps_last_result() {
    let ledger = Arc::new(MockLedger::new());
    let address = live_sale(&ledger, 10, 2);
    ledger.set_submit_delay(Duration::from_secs(3));
    ledger.script_statuses(vec![Some(SignatureStatus::Confirmed)]);
    let session = Arc::new(session(&ledger, Arc::new(MockWallet::connected()), address));
    session.refresh().await.unwrap();

    let first = {
        let session = session.clone();
        tokio::spawn(async move { session.mint().await })
    };
    settle().await;
    assert!(session.view().is_minting);

    let busy = session.mint().await;
    assert_eq!(busy.message, "A mint is already in progress.");
    assert!(session.view().last_result.is_none());

    let alert = first.await.unwrap();
    assert_eq!(alert.severity, Severity::Success);
    assert_eq!(session.view().last_result, Some(alert));
    assert_eq!(ledger.submit_count(), 1);
}
