//! JSON-RPC backed ledger client

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, instruction::InstructionError,
    pubkey::Pubkey, signature::Signature, transaction::Transaction,
    transaction::TransactionError,
};
use solana_transaction_status::TransactionConfirmationStatus;
use tracing::{debug, instrument};

use super::{LedgerClient, SignatureStatus, SubmissionFailure};
use crate::errors::LedgerError;

/// Ledger client over a nonblocking [`RpcClient`]
pub struct RpcLedger {
    client: Arc<RpcClient>,
    endpoint: String,
    commitment: CommitmentConfig,
}

impl RpcLedger {
    /// Connect to `url` with the given commitment and request timeout
    pub fn new(url: &str, commitment: CommitmentConfig, timeout: Duration) -> Self {
        Self {
            client: Arc::new(RpcClient::new_with_timeout_and_commitment(
                url.to_string(),
                timeout,
                commitment,
            )),
            endpoint: url.to_string(),
            commitment,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn rpc_error(&self, err: ClientError) -> LedgerError {
        LedgerError::Rpc {
            endpoint: Some(self.endpoint.clone()),
            message: err.to_string(),
        }
    }
}

/// Split a client error into a program rejection (custom code) or a fault
///
/// A transport timeout carries no usable message and becomes a silent fault.
pub fn submission_failure_from_client_error(err: &ClientError) -> SubmissionFailure {
    if let Some(TransactionError::InstructionError(_, InstructionError::Custom(code))) =
        err.get_transaction_error()
    {
        return SubmissionFailure::ProgramRejected {
            code,
            message: err.to_string(),
        };
    }

    match err.kind() {
        ClientErrorKind::Reqwest(e) if e.is_timeout() => SubmissionFailure::silent(),
        _ => {
            let message = err.to_string();
            if message.trim().is_empty() {
                SubmissionFailure::silent()
            } else {
                SubmissionFailure::Faulted {
                    message: Some(message),
                }
            }
        }
    }
}

/// Map an RPC transaction status onto the watcher's view
fn map_status(
    err: Option<String>,
    confirmation_status: Option<&TransactionConfirmationStatus>,
    confirmations: Option<usize>,
) -> SignatureStatus {
    if let Some(err) = err {
        return SignatureStatus::Failed(err);
    }
    match confirmation_status {
        Some(TransactionConfirmationStatus::Finalized) => SignatureStatus::Finalized,
        Some(TransactionConfirmationStatus::Confirmed) => SignatureStatus::Confirmed,
        Some(TransactionConfirmationStatus::Processed) => SignatureStatus::Processed,
        // Older nodes: no confirmation count means rooted
        None if confirmations.is_none() => SignatureStatus::Finalized,
        None => SignatureStatus::Processed,
    }
}

#[async_trait]
impl LedgerClient for RpcLedger {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn read_account(&self, address: &Pubkey) -> Result<Vec<u8>, LedgerError> {
        let response = self
            .client
            .get_account_with_commitment(address, self.commitment)
            .await
            .map_err(|e| self.rpc_error(e))?;

        match response.value {
            Some(account) => Ok(account.data),
            None => Err(LedgerError::AccountNotFound(*address)),
        }
    }

    async fn latest_blockhash(&self) -> Result<Hash, LedgerError> {
        self.client
            .get_latest_blockhash()
            .await
            .map_err(|e| self.rpc_error(e))
    }

    #[instrument(skip(self, tx), fields(endpoint = %self.endpoint))]
    async fn submit_transaction(&self, tx: &Transaction) -> Result<Signature, SubmissionFailure> {
        match self.client.send_transaction(tx).await {
            Ok(signature) => {
                debug!(signature = %signature, "Transaction accepted for broadcast");
                Ok(signature)
            }
            Err(e) => Err(submission_failure_from_client_error(&e)),
        }
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, LedgerError> {
        let response = self
            .client
            .get_signature_statuses(&[*signature])
            .await
            .map_err(|e| self.rpc_error(e))?;

        Ok(response
            .value
            .into_iter()
            .next()
            .flatten()
            .map(|status| {
                map_status(
                    status.err.as_ref().map(|e| format!("{e:?}")),
                    status.confirmation_status.as_ref(),
                    status.confirmations,
                )
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_code_becomes_program_rejection() {
        let err = ClientError::from(ClientErrorKind::TransactionError(
            TransactionError::InstructionError(4, InstructionError::Custom(311)),
        ));
        match submission_failure_from_client_error(&err) {
            SubmissionFailure::ProgramRejected { code, .. } => assert_eq!(code, 311),
            other => panic!("expected program rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_other_errors_are_faults_with_message() {
        let err = ClientError::from(ClientErrorKind::Custom("custom program error: 0x135".into()));
        match submission_failure_from_client_error(&err) {
            SubmissionFailure::Faulted { message: Some(m) } => assert!(m.contains("0x135")),
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[test]
    fn test_map_status_prefers_error() {
        let status = map_status(
            Some("InstructionError(0, Custom(1))".into()),
            Some(&TransactionConfirmationStatus::Confirmed),
            Some(1),
        );
        assert!(matches!(status, SignatureStatus::Failed(_)));
    }

    #[test]
    fn test_map_status_commitment_levels() {
        assert_eq!(
            map_status(None, Some(&TransactionConfirmationStatus::Processed), Some(0)),
            SignatureStatus::Processed
        );
        assert_eq!(
            map_status(None, Some(&TransactionConfirmationStatus::Confirmed), Some(3)),
            SignatureStatus::Confirmed
        );
        assert_eq!(map_status(None, None, None), SignatureStatus::Finalized);
        assert_eq!(map_status(None, None, Some(2)), SignatureStatus::Processed);
    }

    #[tokio::test]
    async fn test_errors_name_the_endpoint() {
        let ledger = RpcLedger::new(
            "http://127.0.0.1:8899",
            CommitmentConfig::confirmed(),
            Duration::from_secs(1),
        );
        assert_eq!(ledger.endpoint(), "http://127.0.0.1:8899");

        let err = ledger.rpc_error(ClientError::from(ClientErrorKind::Custom("boom".into())));
        match err {
            LedgerError::Rpc { endpoint, message } => {
                assert_eq!(endpoint.as_deref(), Some("http://127.0.0.1:8899"));
                assert!(message.contains("boom"));
            }
            other => panic!("expected rpc error, got {other:?}"),
        }
    }
}
