//! Websocket push notifications of signature status

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use solana_client::nonblocking::pubsub_client::PubsubClient;
use solana_client::rpc_config::RpcSignatureSubscribeConfig;
use solana_rpc_client_api::response::RpcSignatureResult;
use solana_sdk::{commitment_config::CommitmentConfig, signature::Signature};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::{SignatureStatus, SignatureSubscriber, SignatureSubscription};
use crate::errors::LedgerError;

/// Subscriber over a shared [`PubsubClient`] connection
pub struct PubsubSignatureSubscriber {
    client: Arc<PubsubClient>,
    commitment: CommitmentConfig,
}

impl PubsubSignatureSubscriber {
    pub async fn connect(ws_url: &str, commitment: CommitmentConfig) -> Result<Self, LedgerError> {
        info!(ws_url, "Connecting to websocket endpoint");
        let client = PubsubClient::new(ws_url)
            .await
            .map_err(|e| LedgerError::Subscription(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            commitment,
        })
    }
}

fn map_notification(result: RpcSignatureResult) -> Option<SignatureStatus> {
    match result {
        RpcSignatureResult::ProcessedSignature(processed) => Some(match processed.err {
            Some(err) => SignatureStatus::Failed(format!("{err:?}")),
            None => SignatureStatus::Confirmed,
        }),
        // Only emitted when received notifications are enabled
        RpcSignatureResult::ReceivedSignature(_) => None,
    }
}

#[async_trait]
impl SignatureSubscriber for PubsubSignatureSubscriber {
    async fn subscribe(&self, signature: &Signature) -> Result<SignatureSubscription, LedgerError> {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), LedgerError>>();

        let client = Arc::clone(&self.client);
        let commitment = self.commitment;
        let signature = *signature;

        tokio::spawn(async move {
            let (mut notifications, unsubscribe) = match client
                .signature_subscribe(
                    &signature,
                    Some(RpcSignatureSubscribeConfig {
                        commitment: Some(commitment),
                        enable_received_notification: Some(false),
                    }),
                )
                .await
            {
                Ok(result) => {
                    let _ = ready_tx.send(Ok(()));
                    result
                }
                Err(e) => {
                    warn!(signature = %signature, error = %e, "Failed to subscribe to signature");
                    let _ = ready_tx.send(Err(LedgerError::Subscription(e.to_string())));
                    return;
                }
            };

            loop {
                tokio::select! {
                    _ = &mut cancel_rx => break,
                    next = notifications.next() => match next {
                        Some(response) => {
                            if let Some(status) = map_notification(response.value) {
                                if updates_tx.send(status).is_err() {
                                    break;
                                }
                            }
                        }
                        None => break,
                    },
                }
            }

            unsubscribe().await;
            debug!(signature = %signature, "Signature subscription closed");
        });

        match ready_rx.await {
            Ok(Ok(())) => Ok(SignatureSubscription::new(updates_rx, cancel_tx)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(LedgerError::Subscription(
                "subscription task ended before reporting".to_string(),
            )),
        }
    }
}
