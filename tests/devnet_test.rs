#![cfg(feature = "ws-stream")]

use std::sync::Arc;
use std::time::Duration;

use candy_mint::candy_machine::CANDY_MACHINE_PROGRAM_ID;
use candy_mint::errors::LedgerError;
use candy_mint::ledger::pubsub::PubsubSignatureSubscriber;
use candy_mint::ledger::{LedgerClient, RpcLedger, SignatureSubscriber};
use candy_mint::{ConfirmationResult, ConfirmationWatcher};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey, signature::Signature};

const RPC_URL: &str = "https://api.devnet.solana.com";
const WS_URL: &str = "wss://api.devnet.solana.com";

fn ledger() -> RpcLedger {
    RpcLedger::new(RPC_URL, CommitmentConfig::confirmed(), Duration::from_secs(30))
}

#[tokio::test]
#[ignore] // Ignore by default as it requires network access
async fn test_read_program_account() {
    let data = ledger().read_account(&CANDY_MACHINE_PROGRAM_ID).await;
    assert!(data.is_ok(), "Failed to read program account: {:?}", data);
}

#[tokio::test]
#[ignore] // Ignore by default as it requires network access
async fn test_missing_account_is_not_found() {
    let address = Pubkey::new_unique();
    let result = ledger().read_account(&address).await;
    assert!(matches!(result, Err(LedgerError::AccountNotFound(a)) if a == address));
}

#[tokio::test]
#[ignore] // Ignore by default as it requires network access
async fn test_unknown_signature_times_out() {
    let ledger: Arc<dyn LedgerClient> = Arc::new(ledger());
    let subscriber = PubsubSignatureSubscriber::connect(WS_URL, CommitmentConfig::confirmed())
        .await
        .expect("Failed to connect");

    let watcher = ConfirmationWatcher::new(ledger)
        .with_subscriber(Arc::new(subscriber))
        .with_poll_interval(Duration::from_millis(500));

    let result = watcher
        .await_confirmation(&Signature::default(), Duration::from_secs(3), true)
        .await;
    assert_eq!(result, ConfirmationResult::TimedOut);
}

#[tokio::test]
#[ignore] // Ignore by default as it requires network access
async fn test_signature_subscription_opens() {
    let subscriber = PubsubSignatureSubscriber::connect(WS_URL, CommitmentConfig::confirmed())
        .await
        .expect("Failed to connect");

    let result = subscriber.subscribe(&Signature::default()).await;
    assert!(result.is_ok(), "Failed to subscribe to signature: {:?}", result.err());
}
