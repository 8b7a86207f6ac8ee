//! Identity verification (gateway tokens)
//!
//! Sales with a gatekeeper network only accept mints from wallets holding an
//! active gateway token issued on that network. The core asks a
//! [`GatekeeperService`] for the token before building the transaction.

use std::sync::Arc;

use async_trait::async_trait;
use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::candy_machine::gateway_token_address;
use crate::errors::{GatekeeperError, LedgerError};
use crate::ledger::LedgerClient;
use crate::types::{now_unix, UnixTimestamp};
use crate::wallet::{connected_address, WalletCapability};

/// Source of verified identity tokens
#[async_trait]
pub trait GatekeeperService: Send + Sync {
    /// Address of a valid gateway token for `wallet` on `network`
    async fn obtain_token(
        &self,
        network: &Pubkey,
        wallet: &dyn WalletCapability,
    ) -> Result<Pubkey, GatekeeperError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum GatewayTokenState {
    Active,
    Frozen,
    Revoked,
}

/// Gateway token account as stored by the gateway program
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct GatewayToken {
    pub features: u8,
    pub parent_gateway_token: Option<[u8; 32]>,
    pub owner_wallet: [u8; 32],
    pub owner_identity: Option<[u8; 32]>,
    pub gatekeeper_network: [u8; 32],
    pub issuing_gatekeeper: [u8; 32],
    pub state: GatewayTokenState,
    pub expire_time: Option<UnixTimestamp>,
}

impl GatewayToken {
    pub fn decode(address: &Pubkey, data: &[u8]) -> Result<Self, GatekeeperError> {
        let mut body = data;
        Self::deserialize(&mut body).map_err(|e| GatekeeperError::Unreadable {
            token: *address,
            reason: e.to_string(),
        })
    }

    /// Check the token is usable by `wallet` on `network` at `now`
    pub fn validate(
        &self,
        address: &Pubkey,
        wallet: &Pubkey,
        network: &Pubkey,
        now: UnixTimestamp,
    ) -> Result<(), GatekeeperError> {
        if self.owner_wallet != wallet.to_bytes() || self.gatekeeper_network != network.to_bytes()
        {
            return Err(GatekeeperError::Mismatch { token: *address });
        }
        match self.state {
            GatewayTokenState::Active => {}
            GatewayTokenState::Frozen => return Err(GatekeeperError::Frozen(*address)),
            GatewayTokenState::Revoked => return Err(GatekeeperError::Revoked(*address)),
        }
        match self.expire_time {
            Some(expired_at) if expired_at <= now => Err(GatekeeperError::Expired {
                token: *address,
                expired_at,
            }),
            _ => Ok(()),
        }
    }
}

/// Gatekeeper service that verifies the wallet's existing token on the ledger
///
/// It does not issue tokens; obtaining one is the verification widget's job.
pub struct GatewayTokenVerifier {
    ledger: Arc<dyn LedgerClient>,
}

impl GatewayTokenVerifier {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl GatekeeperService for GatewayTokenVerifier {
    async fn obtain_token(
        &self,
        network: &Pubkey,
        wallet: &dyn WalletCapability,
    ) -> Result<Pubkey, GatekeeperError> {
        let owner = connected_address(wallet).ok_or(GatekeeperError::WalletNotConnected)?;
        let address = gateway_token_address(&owner, network);

        let data = match self.ledger.read_account(&address).await {
            Ok(data) => data,
            Err(LedgerError::AccountNotFound(_)) => {
                return Err(GatekeeperError::TokenMissing {
                    token: address,
                    network: *network,
                })
            }
            Err(e) => {
                return Err(GatekeeperError::Unreadable {
                    token: address,
                    reason: e.to_string(),
                })
            }
        };

        let token = GatewayToken::decode(&address, &data)?;
        token.validate(&address, &owner, network, now_unix())?;
        debug!(token = %address, network = %network, "Gateway token verified");
        Ok(address)
    }
}
