//! Access grant/revoke orchestration.
//!
//! Given a mint, a token account (or wallet) and an authority, work out
//! which freeze path applies and the ordered instructions that reach the
//! requested list state. Membership changes come first; a permissionless
//! thaw or freeze follows when the account state requires one, with its
//! extra accounts resolved as if the membership change had already landed.

use std::collections::HashMap;
use std::fmt;

use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use spl_discriminator::SplDiscriminate;
use spl_tlv_account_resolution::state::{AccountDataResult, ExtraAccountMetaList};
use tracing::debug;

use crate::config::ProgramIds;
use crate::error::GateResult;
use crate::lists::{add_wallet_to_list, ensure_list_mode, remove_wallet_from_list};
use crate::mint::{build_freeze_account_instruction, build_thaw_account_instruction};
use crate::pda::{find_list_config_pda, find_wallet_entry_pda};
use crate::programs::access_list::{ListMode, WalletEntry};
use crate::programs::token_acl::{
    build_freeze_permissionless_instruction, build_thaw_permissionless_instruction,
    FreezeExtraAccountMetas, GateMintConfig, PermissionlessParams, ThawExtraAccountMetas,
};
use crate::resolver::{
    is_enhanced_balance_eligible, resolve_mint_config, resolve_token_account, TokenAccountState,
};
use crate::source::AccountSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessAction {
    /// Add to an allowlist or remove from a blocklist.
    Grant,
    /// Add to a blocklist or remove from an allowlist.
    Revoke,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPath {
    /// Direct freeze/thaw by the mint's freeze authority.
    Legacy,
    /// List membership plus permissionless freeze/thaw via the gating
    /// program.
    Gated,
}

impl fmt::Display for AccessPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessPath::Legacy => write!(f, "legacy"),
            AccessPath::Gated => write!(f, "gated"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AccessRequest {
    pub mint: Pubkey,
    /// Token account or wallet.
    pub account: Pubkey,
    /// List authority on the gated path, freeze authority on the legacy one.
    pub authority: Pubkey,
    pub mode: ListMode,
    pub action: AccessAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPlan {
    pub instructions: Vec<Instruction>,
    pub path: AccessPath,
    pub token_account: TokenAccountState,
    /// List touched on the gated path.
    pub list: Option<Pubkey>,
}

enum Membership {
    Add,
    Remove,
}

impl Membership {
    fn for_request(action: AccessAction, mode: ListMode) -> Self {
        match (action, mode) {
            (AccessAction::Grant, ListMode::Allow) | (AccessAction::Revoke, ListMode::Block) => {
                Membership::Add
            }
            (AccessAction::Grant, ListMode::Block) | (AccessAction::Revoke, ListMode::Allow) => {
                Membership::Remove
            }
        }
    }
}

pub async fn plan_access(
    source: &dyn AccountSource,
    ids: &ProgramIds,
    request: &AccessRequest,
) -> GateResult<AccessPlan> {
    let token_account =
        resolve_token_account(source, ids, &request.account, &request.mint).await?;
    let mint = resolve_mint_config(source, ids, &request.mint).await?;

    let gate = match mint.gate {
        Some(gate) if is_enhanced_balance_eligible(&mint.extensions) => gate,
        _ => {
            debug!(mint = %request.mint, action = ?request.action, "legacy freeze path");
            let instruction = match request.action {
                AccessAction::Grant => build_thaw_account_instruction(
                    &token_account.token_account,
                    &request.mint,
                    &request.authority,
                    ids,
                )?,
                AccessAction::Revoke => build_freeze_account_instruction(
                    &token_account.token_account,
                    &request.mint,
                    &request.authority,
                    ids,
                )?,
            };
            return Ok(AccessPlan {
                instructions: vec![instruction],
                path: AccessPath::Legacy,
                token_account,
                list: None,
            });
        }
    };

    let list = find_list_config_pda(&request.authority, &request.mint, ids)?.0;
    ensure_list_mode(source, ids, &list, request.mode).await?;

    let wallet = token_account.wallet;
    let entry = find_wallet_entry_pda(&list, &wallet, ids)?.0;
    let mut overlay = HashMap::new();
    let mut instructions = Vec::with_capacity(2);
    match Membership::for_request(request.action, request.mode) {
        Membership::Add => {
            instructions.push(add_wallet_to_list(&request.authority, &list, &wallet, ids)?);
            let entry_data = WalletEntry {
                wallet,
                list_config: list,
            }
            .pack()?;
            overlay.insert(entry, Some(entry_data));
        }
        Membership::Remove => {
            instructions.push(remove_wallet_from_list(&request.authority, &list, &wallet, ids)?);
            overlay.insert(entry, None);
        }
    }

    let params = PermissionlessParams {
        caller: request.authority,
        mint: request.mint,
        token_account: token_account.token_account,
        token_account_owner: wallet,
        gating_program: gate.gating_program,
    };
    let follow_up = match request.action {
        _ if !token_account.is_initialized => None,
        AccessAction::Grant if token_account.is_frozen => {
            let (instruction, metas) = build_thaw_permissionless_instruction(params, ids)?;
            Some(
                with_extra_accounts::<ThawExtraAccountMetas>(source, &overlay, instruction, &metas)
                    .await?,
            )
        }
        AccessAction::Revoke if !token_account.is_frozen => {
            let (instruction, metas) = build_freeze_permissionless_instruction(params, ids)?;
            Some(
                with_extra_accounts::<FreezeExtraAccountMetas>(
                    source,
                    &overlay,
                    instruction,
                    &metas,
                )
                .await?,
            )
        }
        _ => None,
    };
    log_if_disabled(&gate, request.action, follow_up.is_some());
    instructions.extend(follow_up);

    debug!(
        mint = %request.mint,
        %list,
        %wallet,
        instructions = instructions.len(),
        "gated access plan"
    );
    Ok(AccessPlan {
        instructions,
        path: AccessPath::Gated,
        token_account,
        list: Some(list),
    })
}

fn log_if_disabled(gate: &GateMintConfig, action: AccessAction, emitted: bool) {
    let enabled = match action {
        AccessAction::Grant => gate.enable_permissionless_thaw,
        AccessAction::Revoke => gate.enable_permissionless_freeze,
    };
    if emitted && !enabled {
        debug!(
            config = %gate.address,
            ?action,
            "permissionless instruction is disabled on the mint config"
        );
    }
}

/// Append the gating program's extra accounts to `instruction`. Without an
/// extra-account-meta list on chain the instruction is returned unchanged.
async fn with_extra_accounts<T: SplDiscriminate>(
    source: &dyn AccountSource,
    overlay: &HashMap<Pubkey, Option<Vec<u8>>>,
    mut instruction: Instruction,
    extra_metas: &Pubkey,
) -> GateResult<Instruction> {
    let Some(account) = source.get_account(extra_metas).await? else {
        debug!(%extra_metas, "no extra account metas");
        return Ok(instruction);
    };
    ExtraAccountMetaList::add_to_instruction::<T, _, _>(
        &mut instruction,
        |address| fetch_with_overlay(source, overlay, address),
        &account.data,
    )
    .await?;
    Ok(instruction)
}

async fn fetch_with_overlay(
    source: &dyn AccountSource,
    overlay: &HashMap<Pubkey, Option<Vec<u8>>>,
    address: Pubkey,
) -> AccountDataResult {
    if let Some(data) = overlay.get(&address) {
        return Ok(data.clone());
    }
    let account = source.get_account(&address).await?;
    Ok(account.map(|account| account.data))
}

fn request(
    mint: &Pubkey,
    account: &Pubkey,
    authority: &Pubkey,
    mode: ListMode,
    action: AccessAction,
) -> AccessRequest {
    AccessRequest {
        mint: *mint,
        account: *account,
        authority: *authority,
        mode,
        action,
    }
}

pub async fn add_to_allowlist(
    source: &dyn AccountSource,
    ids: &ProgramIds,
    mint: &Pubkey,
    account: &Pubkey,
    authority: &Pubkey,
) -> GateResult<AccessPlan> {
    let request = request(mint, account, authority, ListMode::Allow, AccessAction::Grant);
    plan_access(source, ids, &request).await
}

pub async fn remove_from_allowlist(
    source: &dyn AccountSource,
    ids: &ProgramIds,
    mint: &Pubkey,
    account: &Pubkey,
    authority: &Pubkey,
) -> GateResult<AccessPlan> {
    let request = request(mint, account, authority, ListMode::Allow, AccessAction::Revoke);
    plan_access(source, ids, &request).await
}

pub async fn add_to_blocklist(
    source: &dyn AccountSource,
    ids: &ProgramIds,
    mint: &Pubkey,
    account: &Pubkey,
    authority: &Pubkey,
) -> GateResult<AccessPlan> {
    let request = request(mint, account, authority, ListMode::Block, AccessAction::Revoke);
    plan_access(source, ids, &request).await
}

pub async fn remove_from_blocklist(
    source: &dyn AccountSource,
    ids: &ProgramIds,
    mint: &Pubkey,
    account: &Pubkey,
    authority: &Pubkey,
) -> GateResult<AccessPlan> {
    let request = request(mint, account, authority, ListMode::Block, AccessAction::Grant);
    plan_access(source, ids, &request).await
}
