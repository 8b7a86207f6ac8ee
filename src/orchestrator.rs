//! Mint orchestration
//!
//! Owns the session's single mint operation. The busy flag is set only at the
//! entry of [`MintOrchestrator::mint`] / [`MintOrchestrator::mint_and_confirm`]
//! and cleared only by their scope guard, on every exit path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use scopeguard::ScopeGuard;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::Transaction,
};
use tracing::{info, instrument};

use crate::candy_machine::instructions::plan_mint;
use crate::classify::classify_submission_failure;
use crate::errors::{GatekeeperError, MintError, PreconditionError};
use crate::gatekeeper::GatekeeperService;
use crate::ledger::{LedgerClient, SubmissionFailure};
use crate::metrics::metrics;
use crate::observability::AttemptId;
use crate::structured_logging::MintLogger;
use crate::types::{
    now_unix, ConfirmationResult, MintPhase, MintRequest, SaleState, SubmittedTransaction,
};
use crate::wallet::{connected_address, WalletCapability};
use crate::watcher::ConfirmationWatcher;

/// A submitted mint and how its confirmation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintAttempt {
    pub submitted: SubmittedTransaction,
    pub confirmation: ConfirmationResult,
}

pub struct MintOrchestrator {
    ledger: Arc<dyn LedgerClient>,
    wallet: Arc<dyn WalletCapability>,
    gatekeeper: Option<Arc<dyn GatekeeperService>>,
    watcher: ConfirmationWatcher,
    compute_unit_limit: u32,
    is_minting: AtomicBool,
    phase: Mutex<MintPhase>,
}

impl MintOrchestrator {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        wallet: Arc<dyn WalletCapability>,
        watcher: ConfirmationWatcher,
    ) -> Self {
        Self {
            ledger,
            wallet,
            gatekeeper: None,
            watcher,
            compute_unit_limit: 0,
            is_minting: AtomicBool::new(false),
            phase: Mutex::new(MintPhase::Idle),
        }
    }

    pub fn with_gatekeeper(mut self, gatekeeper: Arc<dyn GatekeeperService>) -> Self {
        self.gatekeeper = Some(gatekeeper);
        self
    }

    pub fn with_compute_unit_limit(mut self, limit: u32) -> Self {
        self.compute_unit_limit = limit;
        self
    }

    /// Busy flag, true while an attempt is in flight
    pub fn is_minting(&self) -> bool {
        self.is_minting.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> MintPhase {
        *self.phase.lock()
    }

    pub fn wallet(&self) -> &Arc<dyn WalletCapability> {
        &self.wallet
    }

    /// Submit one mint transaction for `payer` against `sale`
    ///
    /// A missing sale snapshot or payer is a precondition failure, as is a
    /// disconnected wallet. Rejected immediately, without network I/O, while
    /// another attempt is in flight.
    pub async fn mint(
        &self,
        sale: Option<&SaleState>,
        payer: Option<Pubkey>,
    ) -> Result<SubmittedTransaction, MintError> {
        let _busy = self.acquire()?;
        let (submitted, _) = self.submit(sale, payer).await?;
        Ok(submitted)
    }

    /// Submit, then wait for confirmation, holding the busy flag throughout
    pub async fn mint_and_confirm(
        &self,
        sale: Option<&SaleState>,
        payer: Option<Pubkey>,
        timeout: Duration,
        prefer_subscription: bool,
    ) -> Result<MintAttempt, MintError> {
        let _busy = self.acquire()?;
        let (submitted, logger) = self.submit(sale, payer).await?;

        let started = Instant::now();
        let confirmation = self
            .watcher
            .await_confirmation(&submitted.signature, timeout, prefer_subscription)
            .await;

        let outcome = match &confirmation {
            ConfirmationResult::Confirmed => "confirmed",
            ConfirmationResult::Failed(_) => "failed",
            ConfirmationResult::TimedOut => "timed_out",
        };
        logger.log_confirmation(
            &submitted.signature,
            outcome,
            started.elapsed().as_millis() as u64,
        );

        Ok(MintAttempt {
            submitted,
            confirmation,
        })
    }

    fn acquire(&self) -> Result<ScopeGuard<(), impl FnOnce(()) + '_>, MintError> {
        if self
            .is_minting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            metrics().mint_busy_rejections_total.inc();
            return Err(MintError::AlreadyInProgress);
        }
        metrics().mint_attempts_total.inc();

        Ok(scopeguard::guard((), move |_| {
            self.is_minting.store(false, Ordering::Release);
        }))
    }

    #[instrument(skip_all)]
    async fn submit(
        &self,
        sale: Option<&SaleState>,
        payer: Option<Pubkey>,
    ) -> Result<(SubmittedTransaction, MintLogger), MintError> {
        *self.phase.lock() = MintPhase::Submitting;
        let started = Instant::now();
        let logger = MintLogger::new(AttemptId::new());

        let result = self.run_steps(sale, payer, &logger).await;

        let latency_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(submitted) => {
                *self.phase.lock() = MintPhase::Submitted;
                logger.log_submitted(&submitted.signature, &submitted.mint, latency_ms);
            }
            Err(e) => {
                *self.phase.lock() = MintPhase::Rejected;
                metrics().record_rejection(e.reason());
                logger.log_rejected(e.reason(), &e.to_string(), latency_ms);
                if e.requires_reload() {
                    info!(attempt_id = %logger.attempt_id(), "Sale sold out, full reload required");
                }
            }
        }

        result.map(|submitted| (submitted, logger))
    }

    async fn run_steps(
        &self,
        sale: Option<&SaleState>,
        payer: Option<Pubkey>,
        logger: &MintLogger,
    ) -> Result<SubmittedTransaction, MintError> {
        let request = self.check_preconditions(sale, payer, logger)?;
        logger.log_attempt(
            &request.payer,
            &request.sale.program_address,
            request.sale.items_remaining,
        );

        if let Some(requirement) = request.sale.gatekeeper {
            let service = self
                .gatekeeper
                .as_ref()
                .ok_or(GatekeeperError::ServiceUnavailable(requirement.network))?;
            let token = service
                .obtain_token(&requirement.network, self.wallet.as_ref())
                .await?;
            logger.log_gateway_token(&requirement.network, &token);
        }

        let mint = Keypair::new();
        let plan = plan_mint(
            &request.sale,
            &request.payer,
            &mint.pubkey(),
            self.compute_unit_limit,
        )?;

        let blockhash = self
            .ledger
            .latest_blockhash()
            .await
            .map_err(|e| classify_submission_failure(&SubmissionFailure::from(e)))?;

        let mut tx = Transaction::new_with_payer(&plan.instructions, Some(&request.payer));
        tx.try_partial_sign(&[&mint], blockhash)
            .map_err(|e| MintError::Build(format!("mint account signature: {e}")))?;

        let tx = self
            .wallet
            .sign_transaction(tx)
            .await
            .map_err(|e| classify_submission_failure(&SubmissionFailure::from(e)))?;

        let signature = self
            .ledger
            .submit_transaction(&tx)
            .await
            .map_err(|failure| classify_submission_failure(&failure))?;

        Ok(SubmittedTransaction {
            signature,
            mint: plan.mint,
            submitted_at: now_unix(),
        })
    }

    fn check_preconditions(
        &self,
        sale: Option<&SaleState>,
        payer: Option<Pubkey>,
        logger: &MintLogger,
    ) -> Result<MintRequest, PreconditionError> {
        let wallet =
            connected_address(self.wallet.as_ref()).ok_or(PreconditionError::WalletNotConnected)?;
        let sale = sale.ok_or(PreconditionError::SaleStateMissing)?;
        let payer = payer.ok_or(PreconditionError::PayerMissing)?;
        if payer != wallet {
            return Err(PreconditionError::PayerMismatch { payer, wallet });
        }

        Ok(MintRequest {
            payer,
            sale: sale.clone(),
            attempt_id: logger.attempt_id().clone(),
        })
    }
}
