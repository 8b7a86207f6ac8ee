//! Candy machine account layout and sale-state derivation
//!
//! Accounts are Anchor-encoded: an 8-byte discriminator followed by the
//! borsh-serialized struct. Pubkeys are decoded as raw 32-byte arrays and
//! converted on the way out. The on-chain account is larger than the encoded
//! struct, so trailing bytes are ignored.

pub mod instructions;

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};
use solana_sdk::{pubkey, pubkey::Pubkey};

use crate::errors::FetchError;
use crate::types::{
    EndCondition, GatekeeperRequirement, SaleState, UnixTimestamp, WhitelistMode,
    WhitelistSettings,
};

/// Candy machine v2 program
pub const CANDY_MACHINE_PROGRAM_ID: Pubkey = pubkey!("cndy3Z4yapfJBmL3ShUp5exZKqR3z33thTzeNMm2gRZ");

/// Metaplex token metadata program
pub const TOKEN_METADATA_PROGRAM_ID: Pubkey = pubkey!("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s");

/// Identity.com gateway program
pub const GATEWAY_PROGRAM_ID: Pubkey = pubkey!("gatem74V238djXdzWnJf94Wo1DcnuGkfijbf3AuBhfs");

/// First 8 bytes of `sha256(namespace:name)`, the Anchor discriminator scheme
pub(crate) fn anchor_discriminator(namespace: &str, name: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("{namespace}:{name}").as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

pub fn account_discriminator() -> [u8; 8] {
    anchor_discriminator("account", "CandyMachine")
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub(crate) struct RawCandyMachine {
    pub authority: [u8; 32],
    pub wallet: [u8; 32],
    pub token_mint: Option<[u8; 32]>,
    pub items_redeemed: u64,
    pub data: RawCandyMachineData,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub(crate) struct RawCandyMachineData {
    pub uuid: String,
    pub price: u64,
    pub symbol: String,
    pub seller_fee_basis_points: u16,
    pub max_supply: u64,
    pub is_mutable: bool,
    pub retain_authority: bool,
    pub go_live_date: Option<i64>,
    pub end_settings: Option<RawEndSettings>,
    pub creators: Vec<RawCreator>,
    pub hidden_settings: Option<RawHiddenSettings>,
    pub whitelist_mint_settings: Option<RawWhitelistMintSettings>,
    pub items_available: u64,
    pub gatekeeper: Option<RawGatekeeperConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub(crate) enum RawEndSettingType {
    Date,
    Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub(crate) struct RawEndSettings {
    pub end_setting_type: RawEndSettingType,
    pub number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub(crate) struct RawCreator {
    pub address: [u8; 32],
    pub verified: bool,
    pub share: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub(crate) struct RawHiddenSettings {
    pub name: String,
    pub uri: String,
    pub hash: [u8; 32],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub(crate) enum RawWhitelistMintMode {
    BurnEveryTime,
    NeverBurn,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub(crate) struct RawWhitelistMintSettings {
    pub mode: RawWhitelistMintMode,
    pub mint: [u8; 32],
    pub presale: bool,
    pub discount_price: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub(crate) struct RawGatekeeperConfig {
    pub gatekeeper_network: [u8; 32],
    pub expire_on_use: bool,
}

/// Decode raw account bytes, checking the discriminator first
pub(crate) fn decode_account(address: &Pubkey, data: &[u8]) -> Result<RawCandyMachine, FetchError> {
    if data.len() < 8 || data[..8] != account_discriminator() {
        return Err(FetchError::NotACandyMachine(*address));
    }

    let mut body = &data[8..];
    RawCandyMachine::deserialize(&mut body).map_err(|e| FetchError::Decode {
        address: *address,
        reason: e.to_string(),
    })
}

/// Decode a candy machine account into a sale snapshot as of `now`
pub fn decode_sale_state(
    address: &Pubkey,
    data: &[u8],
    now: UnixTimestamp,
) -> Result<SaleState, FetchError> {
    let raw = decode_account(address, data)?;
    Ok(derive_sale_state(*address, &raw, now))
}

pub(crate) fn derive_sale_state(
    program_address: Pubkey,
    raw: &RawCandyMachine,
    now: UnixTimestamp,
) -> SaleState {
    let data = &raw.data;
    let items_available = data.items_available;
    let items_redeemed = raw.items_redeemed;
    let items_remaining = items_available.saturating_sub(items_redeemed);
    let is_sold_out = items_remaining == 0;

    let whitelist = data.whitelist_mint_settings.as_ref().map(|w| WhitelistSettings {
        mode: match w.mode {
            RawWhitelistMintMode::BurnEveryTime => WhitelistMode::BurnEveryTime,
            RawWhitelistMintMode::NeverBurn => WhitelistMode::NeverBurn,
        },
        mint: Pubkey::new_from_array(w.mint),
        presale: w.presale,
        discount_price: w.discount_price,
    });

    let end_condition = data.end_settings.as_ref().map(|e| match e.end_setting_type {
        RawEndSettingType::Date => EndCondition::Date(e.number as i64),
        RawEndSettingType::Amount => EndCondition::Amount(e.number),
    });

    let go_live_date = data.go_live_date;
    let is_live = go_live_date.is_some_and(|go_live| go_live <= now);
    let has_ended = match end_condition {
        Some(EndCondition::Date(end)) => now >= end,
        Some(EndCondition::Amount(limit)) => items_redeemed >= limit,
        None => false,
    };

    // Presale only before go-live; an unset go-live date counts as "not yet"
    let presale_flag = whitelist.is_some_and(|w| w.presale);
    let is_presale = presale_flag && go_live_date.map_or(true, |go_live| go_live > now);

    SaleState {
        program_address,
        is_active: is_live && !has_ended && !is_sold_out,
        is_sold_out,
        is_presale,
        go_live_date,
        price: data.price,
        items_available,
        items_redeemed,
        items_remaining,
        gatekeeper: data.gatekeeper.as_ref().map(|g| GatekeeperRequirement {
            network: Pubkey::new_from_array(g.gatekeeper_network),
            expire_on_use: g.expire_on_use,
        }),
        whitelist,
        end_condition,
        treasury: Pubkey::new_from_array(raw.wallet),
        authority: Pubkey::new_from_array(raw.authority),
        token_mint: raw.token_mint.map(Pubkey::new_from_array),
    }
}

/// PDA that signs for the candy machine when creating metadata
pub fn candy_machine_creator(candy_machine: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[b"candy_machine", candy_machine.as_ref()],
        &CANDY_MACHINE_PROGRAM_ID,
    )
}

pub fn metadata_address(mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[
            b"metadata",
            TOKEN_METADATA_PROGRAM_ID.as_ref(),
            mint.as_ref(),
        ],
        &TOKEN_METADATA_PROGRAM_ID,
    )
    .0
}

pub fn master_edition_address(mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[
            b"metadata",
            TOKEN_METADATA_PROGRAM_ID.as_ref(),
            mint.as_ref(),
            b"edition",
        ],
        &TOKEN_METADATA_PROGRAM_ID,
    )
    .0
}

/// Gateway token account of `wallet` on `network` (seed index 0)
pub fn gateway_token_address(wallet: &Pubkey, network: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[
            wallet.as_ref(),
            b"gateway",
            &[0u8; 8],
            network.as_ref(),
        ],
        &GATEWAY_PROGRAM_ID,
    )
    .0
}

/// Network expire feature account, required when tokens expire on use
pub fn network_expire_address(network: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[network.as_ref(), b"expire"], &GATEWAY_PROGRAM_ID).0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::CandyMachineFixture;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_discriminator_is_checked() {
        let address = Pubkey::new_unique();
        let mut data = CandyMachineFixture::live(10, 3, NOW).encode();
        data[0] ^= 0xff;
        assert!(matches!(
            decode_sale_state(&address, &data, NOW),
            Err(FetchError::NotACandyMachine(a)) if a == address
        ));
        assert!(matches!(
            decode_sale_state(&address, &[1, 2, 3], NOW),
            Err(FetchError::NotACandyMachine(_))
        ));
    }

    #[test]
    fn test_truncated_body_is_decode_error() {
        let address = Pubkey::new_unique();
        let data = CandyMachineFixture::live(10, 3, NOW).encode();
        assert!(matches!(
            decode_sale_state(&address, &data[..40], NOW),
            Err(FetchError::Decode { .. })
        ));
    }

    #[test]
    fn test_trailing_bytes_are_ignored() {
        let address = Pubkey::new_unique();
        let mut data = CandyMachineFixture::live(10, 3, NOW).encode();
        data.extend_from_slice(&[0u8; 512]);
        let state = decode_sale_state(&address, &data, NOW).unwrap();
        assert_eq!(state.items_remaining, 7);
    }

    #[test]
    fn test_live_sale_fields() {
        let fixture = CandyMachineFixture::live(10, 3, NOW);
        let address = Pubkey::new_unique();
        let state = decode_sale_state(&address, &fixture.encode(), NOW).unwrap();

        assert_eq!(state.program_address, address);
        assert!(state.is_active);
        assert!(!state.is_sold_out);
        assert!(!state.is_presale);
        assert_eq!(state.items_available, 10);
        assert_eq!(state.items_redeemed, 3);
        assert_eq!(state.items_remaining, 7);
        assert_eq!(state.price, fixture.price);
        assert_eq!(state.treasury, fixture.treasury);
        assert!(state.gatekeeper.is_none());
    }

    #[test]
    fn test_sold_out_is_never_active() {
        let data = CandyMachineFixture::live(5, 5, NOW).encode();
        let state = decode_sale_state(&Pubkey::new_unique(), &data, NOW).unwrap();
        assert!(state.is_sold_out);
        assert!(!state.is_active);
        assert_eq!(state.items_remaining, 0);
    }

    #[test]
    fn test_before_go_live_presale_follows_flag() {
        let mut fixture = CandyMachineFixture::live(10, 0, NOW + 3600);
        let state = decode_sale_state(&Pubkey::new_unique(), &fixture.encode(), NOW).unwrap();
        assert!(!state.is_active);
        assert!(!state.is_presale);

        fixture = fixture.with_whitelist(Pubkey::new_unique(), true, Some(500));
        let state = decode_sale_state(&Pubkey::new_unique(), &fixture.encode(), NOW).unwrap();
        assert!(!state.is_active);
        assert!(state.is_presale);
        assert_eq!(state.effective_price(true), 500);
        assert_eq!(state.effective_price(false), fixture.price);
    }

    #[test]
    fn test_unset_go_live_is_not_active() {
        let fixture = CandyMachineFixture::live(10, 0, NOW).without_go_live();
        let state = decode_sale_state(&Pubkey::new_unique(), &fixture.encode(), NOW).unwrap();
        assert!(!state.is_active);
        assert_eq!(state.go_live_date, None);
    }

    #[test]
    fn test_end_settings_close_the_sale() {
        let fixture = CandyMachineFixture::live(10, 2, NOW - 100).with_end_date(NOW - 1);
        let state = decode_sale_state(&Pubkey::new_unique(), &fixture.encode(), NOW).unwrap();
        assert!(!state.is_active);
        assert_eq!(state.end_condition, Some(EndCondition::Date(NOW - 1)));

        let fixture = CandyMachineFixture::live(10, 2, NOW - 100).with_end_amount(2);
        let state = decode_sale_state(&Pubkey::new_unique(), &fixture.encode(), NOW).unwrap();
        assert!(!state.is_active);
        assert!(!state.is_sold_out);
    }

    #[test]
    fn test_gatekeeper_is_decoded() {
        let network = Pubkey::new_unique();
        let fixture = CandyMachineFixture::live(10, 0, NOW).with_gatekeeper(network, true);
        let state = decode_sale_state(&Pubkey::new_unique(), &fixture.encode(), NOW).unwrap();
        assert_eq!(
            state.gatekeeper,
            Some(GatekeeperRequirement {
                network,
                expire_on_use: true
            })
        );
    }

    #[test]
    fn test_discriminator_value() {
        let expected = &Sha256::digest(b"account:CandyMachine")[..8];
        assert_eq!(&account_discriminator()[..], expected);
    }
}
