//! Mint transaction planning
//!
//! One purchase is one transaction with a fixed instruction order:
//! 1. Compute unit limit (if configured)
//! 2. Create + initialize the new mint account (0 decimals)
//! 3. Create the payer's associated token account and mint the single token
//! 4. `mint_nft` on the candy machine program
//!
//! The new mint keypair is generated by the caller and must co-sign.

use solana_sdk::{
    compute_budget::ComputeBudgetInstruction,
    instruction::{AccountMeta, Instruction},
    program_pack::Pack,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction, system_program, sysvar,
};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account,
};

use super::{
    anchor_discriminator, candy_machine_creator, gateway_token_address, master_edition_address,
    metadata_address, network_expire_address, CANDY_MACHINE_PROGRAM_ID, GATEWAY_PROGRAM_ID,
    TOKEN_METADATA_PROGRAM_ID,
};
use crate::errors::MintError;
use crate::types::{SaleState, WhitelistMode};

/// Ordered instructions for one mint, plus the addresses it creates
#[derive(Debug, Clone)]
pub struct MintPlan {
    pub instructions: Vec<Instruction>,

    /// The new item's mint
    pub mint: Pubkey,

    /// Payer's token account receiving the item
    pub token_account: Pubkey,
}

/// Anchor instruction data for `mint_nft(creator_bump)`
pub fn mint_nft_data(creator_bump: u8) -> Vec<u8> {
    let mut data = anchor_discriminator("global", "mint_nft").to_vec();
    data.push(creator_bump);
    data
}

/// Accounts the sale program checks beyond the fixed list
fn remaining_accounts(sale: &SaleState, payer: &Pubkey) -> Vec<AccountMeta> {
    let mut accounts = Vec::new();

    if let Some(gatekeeper) = sale.gatekeeper {
        accounts.push(AccountMeta::new(
            gateway_token_address(payer, &gatekeeper.network),
            false,
        ));
        if gatekeeper.expire_on_use {
            accounts.push(AccountMeta::new_readonly(GATEWAY_PROGRAM_ID, false));
            accounts.push(AccountMeta::new_readonly(
                network_expire_address(&gatekeeper.network),
                false,
            ));
        }
    }

    if let Some(whitelist) = sale.whitelist {
        accounts.push(AccountMeta::new(
            get_associated_token_address(payer, &whitelist.mint),
            false,
        ));
        if whitelist.mode == WhitelistMode::BurnEveryTime {
            accounts.push(AccountMeta::new(whitelist.mint, false));
            accounts.push(AccountMeta::new_readonly(*payer, true));
        }
    }

    if let Some(token_mint) = sale.token_mint {
        accounts.push(AccountMeta::new(
            get_associated_token_address(payer, &token_mint),
            false,
        ));
        accounts.push(AccountMeta::new_readonly(*payer, true));
    }

    accounts
}

/// The candy machine `mint_nft` instruction
pub fn mint_nft_instruction(sale: &SaleState, payer: &Pubkey, mint: &Pubkey) -> Instruction {
    let candy_machine = sale.program_address;
    let (creator, creator_bump) = candy_machine_creator(&candy_machine);

    let mut accounts = vec![
        AccountMeta::new(candy_machine, false),
        AccountMeta::new_readonly(creator, false),
        AccountMeta::new(*payer, true),
        AccountMeta::new(sale.treasury, false),
        AccountMeta::new(metadata_address(mint), false),
        AccountMeta::new(*mint, false),
        // mint authority and update authority are both the payer
        AccountMeta::new_readonly(*payer, true),
        AccountMeta::new_readonly(*payer, true),
        AccountMeta::new(master_edition_address(mint), false),
        AccountMeta::new_readonly(TOKEN_METADATA_PROGRAM_ID, false),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(system_program::id(), false),
        AccountMeta::new_readonly(sysvar::rent::id(), false),
        AccountMeta::new_readonly(sysvar::clock::id(), false),
        AccountMeta::new_readonly(sysvar::slot_hashes::id(), false),
        AccountMeta::new_readonly(sysvar::instructions::id(), false),
    ];
    accounts.extend(remaining_accounts(sale, payer));

    Instruction {
        program_id: CANDY_MACHINE_PROGRAM_ID,
        accounts,
        data: mint_nft_data(creator_bump),
    }
}

/// Plan the full mint transaction for `payer` with a fresh `mint`
///
/// `cu_limit` of 0 skips the compute budget instruction.
pub fn plan_mint(
    sale: &SaleState,
    payer: &Pubkey,
    mint: &Pubkey,
    cu_limit: u32,
) -> Result<MintPlan, MintError> {
    let token_program = spl_token::id();
    let token_account = get_associated_token_address(payer, mint);
    let rent = Rent::default().minimum_balance(spl_token::state::Mint::LEN);

    let mut instructions = Vec::with_capacity(6);
    if cu_limit > 0 {
        instructions.push(ComputeBudgetInstruction::set_compute_unit_limit(cu_limit));
    }

    instructions.push(system_instruction::create_account(
        payer,
        mint,
        rent,
        spl_token::state::Mint::LEN as u64,
        &token_program,
    ));
    instructions.push(
        spl_token::instruction::initialize_mint(&token_program, mint, payer, Some(payer), 0)
            .map_err(|e| MintError::Build(format!("initialize_mint: {e}")))?,
    );
    instructions.push(create_associated_token_account(
        payer,
        payer,
        mint,
        &token_program,
    ));
    instructions.push(
        spl_token::instruction::mint_to(&token_program, mint, &token_account, payer, &[], 1)
            .map_err(|e| MintError::Build(format!("mint_to: {e}")))?,
    );
    instructions.push(mint_nft_instruction(sale, payer, mint));

    Ok(MintPlan {
        instructions,
        mint: *mint,
        token_account,
    })
}
