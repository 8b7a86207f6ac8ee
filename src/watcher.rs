//! Confirmation of submitted transactions
//!
//! Status polling always runs; a push subscription runs alongside it when
//! requested and available. Both feed one channel and the first terminal
//! status wins. Whatever is still running when the wait ends (terminal
//! status or budget elapsed) is aborted, which also drops and so cancels the
//! subscription.

use std::sync::Arc;
use std::time::Duration;

use solana_sdk::signature::Signature;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::ledger::{LedgerClient, SignatureStatus, SignatureSubscriber};
use crate::metrics::{metrics, Timer};
use crate::types::ConfirmationResult;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2_000);

/// Aborts every producer task on drop
struct Producers(Vec<JoinHandle<()>>);

impl Drop for Producers {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

pub struct ConfirmationWatcher {
    ledger: Arc<dyn LedgerClient>,
    subscriber: Option<Arc<dyn SignatureSubscriber>>,
    poll_interval: Duration,
}

impl ConfirmationWatcher {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self {
            ledger,
            subscriber: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_subscriber(mut self, subscriber: Arc<dyn SignatureSubscriber>) -> Self {
        self.subscriber = Some(subscriber);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Wait up to `timeout` for `signature` to reach a terminal status
    ///
    /// Elapsing the budget yields [`ConfirmationResult::TimedOut`], never a failure.
    #[instrument(skip(self), fields(signature = %signature))]
    pub async fn await_confirmation(
        &self,
        signature: &Signature,
        timeout: Duration,
        prefer_subscription: bool,
    ) -> ConfirmationResult {
        let timer = Timer::new();
        let (tx, mut rx) = mpsc::unbounded_channel::<SignatureStatus>();
        let mut producers = Producers(Vec::with_capacity(2));

        producers
            .0
            .push(self.spawn_poller(*signature, tx.clone()));

        match (&self.subscriber, prefer_subscription) {
            (Some(subscriber), true) => {
                producers
                    .0
                    .push(spawn_subscription(Arc::clone(subscriber), *signature, tx));
            }
            _ => drop(tx),
        }

        let outcome = match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(SignatureStatus::Failed(reason))) => ConfirmationResult::Failed(reason),
            Ok(Some(_)) => ConfirmationResult::Confirmed,
            // Every producer exited without a terminal status
            Ok(None) => ConfirmationResult::TimedOut,
            Err(_) => ConfirmationResult::TimedOut,
        };
        drop(producers);

        let label = match &outcome {
            ConfirmationResult::Confirmed => "confirmed",
            ConfirmationResult::Failed(_) => "failed",
            ConfirmationResult::TimedOut => "timed_out",
        };
        metrics().record_confirmation(label);

        match &outcome {
            ConfirmationResult::TimedOut => warn!(
                timeout_ms = timeout.as_millis() as u64,
                "No terminal status within budget"
            ),
            _ => {
                timer.observe_duration(&metrics().confirmation_latency);
                info!(outcome = label, "Signature reached terminal status");
            }
        }

        outcome
    }

    fn spawn_poller(
        &self,
        signature: Signature,
        tx: mpsc::UnboundedSender<SignatureStatus>,
    ) -> JoinHandle<()> {
        let ledger = Arc::clone(&self.ledger);
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            loop {
                interval.tick().await;
                match ledger.signature_status(&signature).await {
                    Ok(Some(status)) if status.is_terminal() => {
                        let _ = tx.send(status);
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => debug!(signature = %signature, error = %e, "Status poll failed"),
                }
            }
        })
    }
}

fn spawn_subscription(
    subscriber: Arc<dyn SignatureSubscriber>,
    signature: Signature,
    tx: mpsc::UnboundedSender<SignatureStatus>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut subscription = match subscriber.subscribe(&signature).await {
            Ok(subscription) => subscription,
            Err(e) => {
                debug!(signature = %signature, error = %e, "Subscription unavailable, polling only");
                return;
            }
        };

        while let Some(status) = subscription.next().await {
            if status.is_terminal() {
                let _ = tx.send(status);
                return;
            }
        }
    })
}
