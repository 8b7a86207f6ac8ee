//! Shared doubles for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use candy_mint::candy_machine::account_discriminator;
use candy_mint::errors::LedgerError;
use candy_mint::ledger::{LedgerClient, SignatureStatus, SubmissionFailure};
use parking_lot::Mutex;
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction};
use std::collections::{HashMap, VecDeque};

/// Ledger holding accounts in memory, with queued submission failures and a
/// fixed status for every submitted signature
#[derive(Default)]
pub struct InMemoryLedger {
    pub accounts: Mutex<HashMap<Pubkey, Vec<u8>>>,
    pub submit_failures: Mutex<VecDeque<SubmissionFailure>>,
    pub submitted: Mutex<Vec<Transaction>>,
    pub status: Mutex<Option<SignatureStatus>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn read_account(&self, address: &Pubkey) -> Result<Vec<u8>, LedgerError> {
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
        if let Some(failure) = self.submit_failures.lock().pop_front() {
            return Err(failure);
        }
        self.submitted.lock().push(tx.clone());
        Ok(tx.signatures[0])
    }

    async fn signature_status(
        &self,
        _signature: &Signature,
    ) -> Result<Option<SignatureStatus>, LedgerError> {
        Ok(self.status.lock().clone())
    }
}

fn put_string(out: &mut Vec<u8>, s: &str) {
    out.extend((s.len() as u32).to_le_bytes());
    out.extend(s.as_bytes());
}

/// Candy machine account bytes: SOL price, no end settings, whitelist or gatekeeper
pub fn candy_machine_account(
    treasury: &Pubkey,
    price: u64,
    items_available: u64,
    items_redeemed: u64,
    go_live_date: Option<i64>,
) -> Vec<u8> {
    let mut out = account_discriminator().to_vec();
    out.extend(Pubkey::new_unique().to_bytes()); // authority
    out.extend(treasury.to_bytes());
    out.push(0); // token_mint
    out.extend(items_redeemed.to_le_bytes());

    put_string(&mut out, "uuid01");
    out.extend(price.to_le_bytes());
    put_string(&mut out, "CNDY");
    out.extend(500u16.to_le_bytes());
    out.extend(0u64.to_le_bytes()); // max_supply
    out.push(1); // is_mutable
    out.push(1); // retain_authority
    match go_live_date {
        Some(ts) => {
            out.push(1);
            out.extend(ts.to_le_bytes());
        }
        None => out.push(0),
    }
    out.push(0); // end_settings
    out.extend(0u32.to_le_bytes()); // creators
    out.push(0); // hidden_settings
    out.push(0); // whitelist_mint_settings
    out.extend(items_available.to_le_bytes());
    out.push(0); // gatekeeper

    // Accounts are allocated larger than the encoded data
    out.extend([0u8; 64]);
    out
}
