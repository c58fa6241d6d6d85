//! Deterministic address derivation.
//!
//! Every on-chain record this crate touches is located by seeds alone, so
//! these helpers are pure and never hit the network.

use solana_sdk::pubkey::{Pubkey, MAX_SEEDS, MAX_SEED_LEN};

use crate::config::ProgramIds;
use crate::error::{GateError, GateResult};

pub const LIST_CONFIG_SEED: &[u8] = b"list_config";
pub const WALLET_ENTRY_SEED: &[u8] = b"ab_wallet";
pub const MINT_CONFIG_SEED: &[u8] = b"MINT_CONFIG";
pub const THAW_EXTRA_METAS_SEED: &[u8] = b"thaw-extra-account-metas";
pub const FREEZE_EXTRA_METAS_SEED: &[u8] = b"freeze-extra-account-metas";

/// Derive a program address from raw seeds, validating seed count and length
/// before searching for the bump.
pub fn derive_address(program_id: &Pubkey, seeds: &[&[u8]]) -> GateResult<(Pubkey, u8)> {
    // One slot is reserved for the bump.
    if seeds.len() >= MAX_SEEDS {
        return Err(GateError::InvalidSeed(format!(
            "{} seeds given, at most {} allowed",
            seeds.len(),
            MAX_SEEDS - 1
        )));
    }
    if let Some((index, seed)) = seeds
        .iter()
        .enumerate()
        .find(|(_, seed)| seed.len() > MAX_SEED_LEN)
    {
        return Err(GateError::InvalidSeed(format!(
            "seed {} is {} bytes, at most {} allowed",
            index,
            seed.len(),
            MAX_SEED_LEN
        )));
    }
    Pubkey::try_find_program_address(seeds, program_id)
        .ok_or_else(|| GateError::InvalidSeed("no viable bump seed".to_string()))
}

/// List config for an (authority, seed) pair. The seed is the mint the list
/// is scoped to.
pub fn find_list_config_pda(
    authority: &Pubkey,
    seed: &Pubkey,
    ids: &ProgramIds,
) -> GateResult<(Pubkey, u8)> {
    derive_address(
        &ids.access_list_program,
        &[LIST_CONFIG_SEED, authority.as_ref(), seed.as_ref()],
    )
}

/// Membership entry of `wallet` in `list_config`.
pub fn find_wallet_entry_pda(
    list_config: &Pubkey,
    wallet: &Pubkey,
    ids: &ProgramIds,
) -> GateResult<(Pubkey, u8)> {
    derive_address(
        &ids.access_list_program,
        &[WALLET_ENTRY_SEED, list_config.as_ref(), wallet.as_ref()],
    )
}

/// Gating-program config that holds a mint's freeze authority.
pub fn find_mint_config_pda(mint: &Pubkey, ids: &ProgramIds) -> GateResult<(Pubkey, u8)> {
    derive_address(&ids.token_acl_program, &[MINT_CONFIG_SEED, mint.as_ref()])
}

/// Extra-account-meta list consulted by permissionless thaw. Owned by the
/// list program acting as the mint's gating program.
pub fn find_thaw_extra_metas_pda(
    mint: &Pubkey,
    gating_program: &Pubkey,
) -> GateResult<(Pubkey, u8)> {
    derive_address(gating_program, &[THAW_EXTRA_METAS_SEED, mint.as_ref()])
}

pub fn find_freeze_extra_metas_pda(
    mint: &Pubkey,
    gating_program: &Pubkey,
) -> GateResult<(Pubkey, u8)> {
    derive_address(gating_program, &[FREEZE_EXTRA_METAS_SEED, mint.as_ref()])
}

/// Associated token account of `wallet` for `mint`, derived under the
/// configured associated-token and token programs.
pub fn associated_token_address(
    wallet: &Pubkey,
    mint: &Pubkey,
    ids: &ProgramIds,
) -> GateResult<Pubkey> {
    derive_address(
        &ids.associated_token_program,
        &[wallet.as_ref(), ids.token_program.as_ref(), mint.as_ref()],
    )
    .map(|(address, _)| address)
}
