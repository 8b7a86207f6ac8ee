//! Structured log events of a mint attempt

use solana_sdk::{pubkey::Pubkey, signature::Signature};

use crate::observability::AttemptId;

/// Logger bound to one mint attempt
#[derive(Debug, Clone)]
pub struct MintLogger {
    attempt_id: AttemptId,
}

impl MintLogger {
    pub fn new(attempt_id: AttemptId) -> Self {
        Self { attempt_id }
    }

    pub fn attempt_id(&self) -> &AttemptId {
        &self.attempt_id
    }

    pub fn log_attempt(&self, payer: &Pubkey, candy_machine: &Pubkey, items_remaining: u64) {
        tracing::info!(
            attempt_id = %self.attempt_id,
            payer = %payer,
            candy_machine = %candy_machine,
            items_remaining = %items_remaining,
            "Starting mint attempt"
        );
    }

    pub fn log_gateway_token(&self, network: &Pubkey, token: &Pubkey) {
        tracing::debug!(
            attempt_id = %self.attempt_id,
            network = %network,
            token = %token,
            "Gateway token obtained"
        );
    }

    pub fn log_submitted(&self, signature: &Signature, mint: &Pubkey, latency_ms: u64) {
        tracing::info!(
            attempt_id = %self.attempt_id,
            signature = %signature,
            mint = %mint,
            latency_ms = %latency_ms,
            "Mint transaction submitted"
        );
    }

    pub fn log_rejected(&self, reason: &str, error: &str, latency_ms: u64) {
        tracing::warn!(
            attempt_id = %self.attempt_id,
            reason = %reason,
            error = %error,
            latency_ms = %latency_ms,
            "Mint attempt rejected"
        );
    }

    pub fn log_confirmation(&self, signature: &Signature, outcome: &str, latency_ms: u64) {
        tracing::info!(
            attempt_id = %self.attempt_id,
            signature = %signature,
            outcome = %outcome,
            latency_ms = %latency_ms,
            "Confirmation resolved"
        );
    }
}
