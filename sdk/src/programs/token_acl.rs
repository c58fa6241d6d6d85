//! Gating program: takes over a mint's freeze authority and lets anyone
//! freeze or thaw a token account when the configured list program agrees.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use spl_discriminator::{ArrayDiscriminator, SplDiscriminate};

use crate::config::ProgramIds;
use crate::error::{GateError, GateResult};
use crate::pda::{find_freeze_extra_metas_pda, find_mint_config_pda, find_thaw_extra_metas_pda};

pub const MINT_CONFIG_DISCRIMINATOR: u8 = 1;

const CREATE_CONFIG: u8 = 0;
const SET_AUTHORITY: u8 = 1;
const SET_GATING_PROGRAM: u8 = 2;
const THAW: u8 = 4;
const FREEZE: u8 = 5;
const THAW_PERMISSIONLESS: u8 = 6;
const FREEZE_PERMISSIONLESS: u8 = 7;
const TOGGLE_PERMISSIONLESS: u8 = 8;

/// TLV discriminator of the extra-account-meta list read by permissionless
/// thaw.
pub struct ThawExtraAccountMetas;

impl SplDiscriminate for ThawExtraAccountMetas {
    const SPL_DISCRIMINATOR: ArrayDiscriminator =
        ArrayDiscriminator::new([145, 200, 49, 180, 152, 225, 88, 28]);
}

/// TLV discriminator of the extra-account-meta list read by permissionless
/// freeze.
pub struct FreezeExtraAccountMetas;

impl SplDiscriminate for FreezeExtraAccountMetas {
    const SPL_DISCRIMINATOR: ArrayDiscriminator =
        ArrayDiscriminator::new([227, 149, 5, 114, 11, 205, 137, 178]);
}

#[derive(BorshSerialize, BorshDeserialize)]
struct MintConfigData {
    discriminator: u8,
    bump: u8,
    enable_permissionless_thaw: bool,
    enable_permissionless_freeze: bool,
    mint: [u8; 32],
    freeze_authority: [u8; 32],
    gating_program: [u8; 32],
}

/// Gating-program state for one mint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateMintConfig {
    pub address: Pubkey,
    pub mint: Pubkey,
    /// Authority allowed to reconfigure the gate and freeze/thaw directly.
    pub freeze_authority: Pubkey,
    pub gating_program: Pubkey,
    pub enable_permissionless_thaw: bool,
    pub enable_permissionless_freeze: bool,
    pub bump: u8,
}

impl GateMintConfig {
    pub const LEN: usize = 4 + 32 * 3;

    pub fn unpack(address: &Pubkey, data: &[u8]) -> GateResult<Self> {
        let raw = MintConfigData::deserialize(&mut &data[..])
            .map_err(|err| GateError::decode(address, err))?;
        if raw.discriminator != MINT_CONFIG_DISCRIMINATOR {
            return Err(GateError::decode(
                address,
                format!("unexpected discriminator {}", raw.discriminator),
            ));
        }
        Ok(Self {
            address: *address,
            mint: Pubkey::new_from_array(raw.mint),
            freeze_authority: Pubkey::new_from_array(raw.freeze_authority),
            gating_program: Pubkey::new_from_array(raw.gating_program),
            enable_permissionless_thaw: raw.enable_permissionless_thaw,
            enable_permissionless_freeze: raw.enable_permissionless_freeze,
            bump: raw.bump,
        })
    }

    pub fn pack(&self) -> GateResult<Vec<u8>> {
        let raw = MintConfigData {
            discriminator: MINT_CONFIG_DISCRIMINATOR,
            bump: self.bump,
            enable_permissionless_thaw: self.enable_permissionless_thaw,
            enable_permissionless_freeze: self.enable_permissionless_freeze,
            mint: self.mint.to_bytes(),
            freeze_authority: self.freeze_authority.to_bytes(),
            gating_program: self.gating_program.to_bytes(),
        };
        Ok(borsh::to_vec(&raw)?)
    }
}

fn build_instruction(
    discriminator: u8,
    payload: &[u8],
    accounts: Vec<AccountMeta>,
    program_id: Pubkey,
) -> Instruction {
    let mut data = Vec::with_capacity(1 + payload.len());
    data.push(discriminator);
    data.extend_from_slice(payload);
    Instruction {
        program_id,
        accounts,
        data,
    }
}

pub struct CreateConfigParams {
    pub payer: Pubkey,
    /// Current freeze authority of the mint; handed over to the config.
    pub authority: Pubkey,
    pub mint: Pubkey,
    pub gating_program: Pubkey,
}

/// Create the mint config and move the mint's freeze authority to it.
pub fn build_create_config_instruction(
    params: CreateConfigParams,
    ids: &ProgramIds,
) -> GateResult<(Instruction, Pubkey)> {
    let mint_config = find_mint_config_pda(&params.mint, ids)?.0;
    let accounts = vec![
        AccountMeta::new(params.payer, true),
        AccountMeta::new_readonly(params.authority, true),
        AccountMeta::new(params.mint, false),
        AccountMeta::new(mint_config, false),
        AccountMeta::new_readonly(ids.system_program, false),
        AccountMeta::new_readonly(ids.token_program, false),
    ];
    Ok((
        build_instruction(
            CREATE_CONFIG,
            params.gating_program.as_ref(),
            accounts,
            ids.token_acl_program,
        ),
        mint_config,
    ))
}

pub fn build_set_authority_instruction(
    authority: Pubkey,
    mint: Pubkey,
    new_authority: Pubkey,
    ids: &ProgramIds,
) -> GateResult<Instruction> {
    let mint_config = find_mint_config_pda(&mint, ids)?.0;
    let accounts = vec![
        AccountMeta::new_readonly(authority, true),
        AccountMeta::new(mint_config, false),
    ];
    Ok(build_instruction(
        SET_AUTHORITY,
        new_authority.as_ref(),
        accounts,
        ids.token_acl_program,
    ))
}

pub fn build_set_gating_program_instruction(
    authority: Pubkey,
    mint: Pubkey,
    gating_program: Pubkey,
    ids: &ProgramIds,
) -> GateResult<Instruction> {
    let mint_config = find_mint_config_pda(&mint, ids)?.0;
    let accounts = vec![
        AccountMeta::new_readonly(authority, true),
        AccountMeta::new(mint_config, false),
    ];
    Ok(build_instruction(
        SET_GATING_PROGRAM,
        gating_program.as_ref(),
        accounts,
        ids.token_acl_program,
    ))
}

pub fn build_toggle_permissionless_instruction(
    authority: Pubkey,
    mint: Pubkey,
    freeze_enabled: bool,
    thaw_enabled: bool,
    ids: &ProgramIds,
) -> GateResult<Instruction> {
    let mint_config = find_mint_config_pda(&mint, ids)?.0;
    let accounts = vec![
        AccountMeta::new_readonly(authority, true),
        AccountMeta::new(mint_config, false),
    ];
    Ok(build_instruction(
        TOGGLE_PERMISSIONLESS,
        &[freeze_enabled as u8, thaw_enabled as u8],
        accounts,
        ids.token_acl_program,
    ))
}

pub struct AuthorityFreezeParams {
    pub authority: Pubkey,
    pub mint: Pubkey,
    pub token_account: Pubkey,
}

/// Freeze through the gating program using the config authority.
pub fn build_freeze_instruction(
    params: AuthorityFreezeParams,
    ids: &ProgramIds,
) -> GateResult<Instruction> {
    let accounts = authority_accounts(&params, ids)?;
    Ok(build_instruction(FREEZE, &[], accounts, ids.token_acl_program))
}

/// Thaw through the gating program using the config authority.
pub fn build_thaw_instruction(
    params: AuthorityFreezeParams,
    ids: &ProgramIds,
) -> GateResult<Instruction> {
    let accounts = authority_accounts(&params, ids)?;
    Ok(build_instruction(THAW, &[], accounts, ids.token_acl_program))
}

fn authority_accounts(
    params: &AuthorityFreezeParams,
    ids: &ProgramIds,
) -> GateResult<Vec<AccountMeta>> {
    let mint_config = find_mint_config_pda(&params.mint, ids)?.0;
    Ok(vec![
        AccountMeta::new_readonly(params.authority, true),
        AccountMeta::new_readonly(mint_config, false),
        AccountMeta::new_readonly(params.mint, false),
        AccountMeta::new(params.token_account, false),
        AccountMeta::new_readonly(ids.token_program, false),
    ])
}

pub struct PermissionlessParams {
    pub caller: Pubkey,
    pub mint: Pubkey,
    pub token_account: Pubkey,
    pub token_account_owner: Pubkey,
    pub gating_program: Pubkey,
}

/// Index of the token account inside a permissionless instruction; extra
/// account seeds read the owner out of its data.
pub const PERMISSIONLESS_TOKEN_ACCOUNT_INDEX: u8 = 1;

/// Permissionless thaw without its extra accounts. Callers append the
/// gating program's extra accounts before submitting.
pub fn build_thaw_permissionless_instruction(
    params: PermissionlessParams,
    ids: &ProgramIds,
) -> GateResult<(Instruction, Pubkey)> {
    let extra_metas = find_thaw_extra_metas_pda(&params.mint, &params.gating_program)?.0;
    let accounts = permissionless_accounts(&params, extra_metas, ids)?;
    Ok((
        build_instruction(THAW_PERMISSIONLESS, &[], accounts, ids.token_acl_program),
        extra_metas,
    ))
}

pub fn build_freeze_permissionless_instruction(
    params: PermissionlessParams,
    ids: &ProgramIds,
) -> GateResult<(Instruction, Pubkey)> {
    let extra_metas = find_freeze_extra_metas_pda(&params.mint, &params.gating_program)?.0;
    let accounts = permissionless_accounts(&params, extra_metas, ids)?;
    Ok((
        build_instruction(FREEZE_PERMISSIONLESS, &[], accounts, ids.token_acl_program),
        extra_metas,
    ))
}

fn permissionless_accounts(
    params: &PermissionlessParams,
    extra_metas: Pubkey,
    ids: &ProgramIds,
) -> GateResult<Vec<AccountMeta>> {
    let mint_config = find_mint_config_pda(&params.mint, ids)?.0;
    Ok(vec![
        AccountMeta::new_readonly(params.caller, true),
        AccountMeta::new(params.token_account, false),
        AccountMeta::new_readonly(params.mint, false),
        AccountMeta::new_readonly(mint_config, false),
        AccountMeta::new_readonly(params.token_account_owner, false),
        AccountMeta::new_readonly(ids.token_program, false),
        AccountMeta::new_readonly(params.gating_program, false),
        AccountMeta::new_readonly(extra_metas, false),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_config_round_trips() {
        let address = Pubkey::new_unique();
        let config = GateMintConfig {
            address,
            mint: Pubkey::new_unique(),
            freeze_authority: Pubkey::new_unique(),
            gating_program: Pubkey::new_unique(),
            enable_permissionless_thaw: true,
            enable_permissionless_freeze: false,
            bump: 250,
        };
        let data = config.pack().unwrap();
        assert_eq!(data.len(), GateMintConfig::LEN);
        assert_eq!(GateMintConfig::unpack(&address, &data).unwrap(), config);
    }

    #[test]
    fn rejects_foreign_discriminator() {
        let mut data = vec![0u8; GateMintConfig::LEN];
        data[0] = 9;
        assert!(matches!(
            GateMintConfig::unpack(&Pubkey::new_unique(), &data),
            Err(GateError::Decode { .. })
        ));
    }

    #[test]
    fn toggle_encodes_both_flags() {
        let ids = ProgramIds::default();
        let ix = build_toggle_permissionless_instruction(
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            false,
            true,
            &ids,
        )
        .unwrap();
        assert_eq!(ix.data, vec![TOGGLE_PERMISSIONLESS, 0, 1]);
        assert_eq!(ix.program_id, ids.token_acl_program);
    }

    #[test]
    fn permissionless_thaw_points_at_gating_programs_metas() {
        let ids = ProgramIds::default();
        let mint = Pubkey::new_unique();
        let token_account = Pubkey::new_unique();
        let (ix, metas) = build_thaw_permissionless_instruction(
            PermissionlessParams {
                caller: Pubkey::new_unique(),
                mint,
                token_account,
                token_account_owner: Pubkey::new_unique(),
                gating_program: ids.access_list_program,
            },
            &ids,
        )
        .unwrap();
        assert_eq!(
            metas,
            find_thaw_extra_metas_pda(&mint, &ids.access_list_program)
                .unwrap()
                .0
        );
        assert_eq!(
            ix.accounts[PERMISSIONLESS_TOKEN_ACCOUNT_INDEX as usize].pubkey,
            token_account
        );
        assert_eq!(ix.accounts.last().unwrap().pubkey, metas);
        assert_eq!(ix.data, vec![THAW_PERMISSIONLESS]);
    }
}
