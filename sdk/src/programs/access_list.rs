//! Access-list program: allow/block lists keyed by (authority, mint) and one
//! entry account per member wallet.

use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

use super::{account_discriminator, build_anchor_instruction};
use crate::config::ProgramIds;
use crate::error::{GateError, GateResult};
use crate::pda::{
    find_freeze_extra_metas_pda, find_list_config_pda, find_mint_config_pda,
    find_thaw_extra_metas_pda, find_wallet_entry_pda,
};

pub const DISCRIMINATOR_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ListMode {
    #[default]
    Allow,
    Block,
}

impl ListMode {
    pub fn to_u8(self) -> u8 {
        match self {
            ListMode::Allow => 0,
            ListMode::Block => 1,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ListMode::Allow),
            1 => Some(ListMode::Block),
            _ => None,
        }
    }
}

impl fmt::Display for ListMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListMode::Allow => write!(f, "allow"),
            ListMode::Block => write!(f, "block"),
        }
    }
}

impl std::str::FromStr for ListMode {
    type Err = GateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "allow" | "allowlist" => Ok(ListMode::Allow),
            "block" | "blocklist" => Ok(ListMode::Block),
            _ => Err(GateError::InvalidArgument(format!("Unknown list mode: {}", value))),
        }
    }
}

#[derive(BorshSerialize, BorshDeserialize)]
struct ListConfigData {
    bump: u8,
    authority: [u8; 32],
    seed: [u8; 32],
    mode: u8,
    wallets_count: u32,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct WalletEntryData {
    wallet: [u8; 32],
    list_config: [u8; 32],
}

/// Decoded list configuration account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListConfig {
    pub address: Pubkey,
    pub authority: Pubkey,
    /// Mint the list is scoped to.
    pub seed: Pubkey,
    pub mode: ListMode,
    pub wallets_count: u32,
    pub bump: u8,
}

impl ListConfig {
    pub const LEN: usize = DISCRIMINATOR_LEN + 1 + 32 + 32 + 1 + 4;

    pub fn discriminator() -> [u8; 8] {
        account_discriminator("ListConfig")
    }

    pub fn unpack(address: &Pubkey, data: &[u8]) -> GateResult<Self> {
        let body = strip_discriminator(address, data, &Self::discriminator())?;
        let raw = ListConfigData::deserialize(&mut &body[..])
            .map_err(|err| GateError::decode(address, err))?;
        let mode = ListMode::from_u8(raw.mode)
            .ok_or_else(|| GateError::decode(address, format!("unknown list mode {}", raw.mode)))?;
        Ok(Self {
            address: *address,
            authority: Pubkey::new_from_array(raw.authority),
            seed: Pubkey::new_from_array(raw.seed),
            mode,
            wallets_count: raw.wallets_count,
            bump: raw.bump,
        })
    }

    pub fn pack(&self) -> GateResult<Vec<u8>> {
        let raw = ListConfigData {
            bump: self.bump,
            authority: self.authority.to_bytes(),
            seed: self.seed.to_bytes(),
            mode: self.mode.to_u8(),
            wallets_count: self.wallets_count,
        };
        with_discriminator(&Self::discriminator(), &raw)
    }
}

/// Membership entry: exists iff `wallet` is on `list_config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletEntry {
    pub wallet: Pubkey,
    pub list_config: Pubkey,
}

impl WalletEntry {
    pub const LEN: usize = DISCRIMINATOR_LEN + 32 + 32;
    /// Offset of the back-reference to the owning list.
    pub const LIST_CONFIG_OFFSET: usize = DISCRIMINATOR_LEN + 32;

    pub fn discriminator() -> [u8; 8] {
        account_discriminator("ABWallet")
    }

    pub fn unpack(address: &Pubkey, data: &[u8]) -> GateResult<Self> {
        let body = strip_discriminator(address, data, &Self::discriminator())?;
        let raw = WalletEntryData::deserialize(&mut &body[..])
            .map_err(|err| GateError::decode(address, err))?;
        Ok(Self {
            wallet: Pubkey::new_from_array(raw.wallet),
            list_config: Pubkey::new_from_array(raw.list_config),
        })
    }

    pub fn pack(&self) -> GateResult<Vec<u8>> {
        let raw = WalletEntryData {
            wallet: self.wallet.to_bytes(),
            list_config: self.list_config.to_bytes(),
        };
        with_discriminator(&Self::discriminator(), &raw)
    }
}

fn strip_discriminator<'a>(
    address: &Pubkey,
    data: &'a [u8],
    expected: &[u8; 8],
) -> GateResult<&'a [u8]> {
    if data.len() < DISCRIMINATOR_LEN {
        return Err(GateError::decode(address, "account data too short"));
    }
    let (discriminator, body) = data.split_at(DISCRIMINATOR_LEN);
    if discriminator != expected {
        return Err(GateError::decode(address, "discriminator mismatch"));
    }
    Ok(body)
}

fn with_discriminator<T: BorshSerialize>(
    discriminator: &[u8; 8],
    value: &T,
) -> GateResult<Vec<u8>> {
    let mut data = discriminator.to_vec();
    value.serialize(&mut data)?;
    Ok(data)
}

#[derive(BorshSerialize)]
struct ModeArgs {
    mode: u8,
}

#[derive(BorshSerialize)]
struct SetupExtraMetasArgs {
    check_freeze: bool,
    check_thaw: bool,
}

pub struct InitListParams {
    pub authority: Pubkey,
    pub seed: Pubkey,
    pub mode: ListMode,
}

pub fn build_init_list_instruction(
    params: InitListParams,
    ids: &ProgramIds,
) -> GateResult<(Instruction, Pubkey)> {
    let list_config = find_list_config_pda(&params.authority, &params.seed, ids)?.0;
    let accounts = vec![
        AccountMeta::new(params.authority, true),
        AccountMeta::new(list_config, false),
        AccountMeta::new_readonly(params.seed, false),
        AccountMeta::new_readonly(ids.system_program, false),
    ];
    let data = borsh::to_vec(&ModeArgs {
        mode: params.mode.to_u8(),
    })?;
    Ok((
        build_anchor_instruction("init_list", data, accounts, ids.access_list_program),
        list_config,
    ))
}

pub struct WalletParams {
    pub authority: Pubkey,
    pub list_config: Pubkey,
    pub wallet: Pubkey,
}

pub fn build_add_wallet_instruction(
    params: WalletParams,
    ids: &ProgramIds,
) -> GateResult<Instruction> {
    let wallet_entry = find_wallet_entry_pda(&params.list_config, &params.wallet, ids)?.0;
    let accounts = vec![
        AccountMeta::new(params.authority, true),
        AccountMeta::new(params.list_config, false),
        AccountMeta::new_readonly(params.wallet, false),
        AccountMeta::new(wallet_entry, false),
        AccountMeta::new_readonly(ids.system_program, false),
    ];
    Ok(build_anchor_instruction(
        "add_wallet",
        Vec::new(),
        accounts,
        ids.access_list_program,
    ))
}

pub fn build_remove_wallet_instruction(
    params: WalletParams,
    ids: &ProgramIds,
) -> GateResult<Instruction> {
    let wallet_entry = find_wallet_entry_pda(&params.list_config, &params.wallet, ids)?.0;
    let accounts = vec![
        AccountMeta::new(params.authority, true),
        AccountMeta::new(params.list_config, false),
        AccountMeta::new(wallet_entry, false),
    ];
    Ok(build_anchor_instruction(
        "remove_wallet",
        Vec::new(),
        accounts,
        ids.access_list_program,
    ))
}

pub fn build_set_list_mode_instruction(
    authority: Pubkey,
    list_config: Pubkey,
    mode: ListMode,
    ids: &ProgramIds,
) -> GateResult<Instruction> {
    let accounts = vec![
        AccountMeta::new_readonly(authority, true),
        AccountMeta::new(list_config, false),
    ];
    let data = borsh::to_vec(&ModeArgs { mode: mode.to_u8() })?;
    Ok(build_anchor_instruction(
        "set_list_mode",
        data,
        accounts,
        ids.access_list_program,
    ))
}

pub fn build_delete_list_instruction(
    authority: Pubkey,
    list_config: Pubkey,
    ids: &ProgramIds,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new(authority, true),
        AccountMeta::new(list_config, false),
    ];
    build_anchor_instruction("delete_list", Vec::new(), accounts, ids.access_list_program)
}

pub struct SetupExtraMetasParams {
    pub authority: Pubkey,
    pub mint: Pubkey,
    pub lists: Vec<Pubkey>,
    pub check_freeze: bool,
    pub check_thaw: bool,
}

/// Bind `lists` to the mint's freeze/thaw extra-account-meta accounts so
/// permissionless freeze/thaw can consult them.
pub fn build_setup_extra_metas_instruction(
    params: SetupExtraMetasParams,
    ids: &ProgramIds,
) -> GateResult<Instruction> {
    let mint_config = find_mint_config_pda(&params.mint, ids)?.0;
    let thaw_metas = find_thaw_extra_metas_pda(&params.mint, &ids.access_list_program)?.0;
    let freeze_metas = find_freeze_extra_metas_pda(&params.mint, &ids.access_list_program)?.0;
    let mut accounts = vec![
        AccountMeta::new(params.authority, true),
        AccountMeta::new_readonly(mint_config, false),
        AccountMeta::new_readonly(params.mint, false),
        AccountMeta::new(thaw_metas, false),
        AccountMeta::new(freeze_metas, false),
        AccountMeta::new_readonly(ids.system_program, false),
    ];
    accounts.extend(
        params
            .lists
            .iter()
            .map(|list| AccountMeta::new_readonly(*list, false)),
    );
    let data = borsh::to_vec(&SetupExtraMetasArgs {
        check_freeze: params.check_freeze,
        check_thaw: params.check_thaw,
    })?;
    Ok(build_anchor_instruction(
        "setup_extra_metas",
        data,
        accounts,
        ids.access_list_program,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::programs::anchor_discriminator;

    #[test]
    fn list_config_layout_round_trips() {
        let address = Pubkey::new_unique();
        let config = ListConfig {
            address,
            authority: Pubkey::new_unique(),
            seed: Pubkey::new_unique(),
            mode: ListMode::Block,
            wallets_count: 3,
            bump: 254,
        };
        let data = config.pack().unwrap();
        assert_eq!(data.len(), ListConfig::LEN);
        assert_eq!(ListConfig::unpack(&address, &data).unwrap(), config);
    }

    #[test]
    fn wallet_entry_back_reference_sits_at_fixed_offset() {
        let list = Pubkey::new_unique();
        let entry = WalletEntry {
            wallet: Pubkey::new_unique(),
            list_config: list,
        };
        let data = entry.pack().unwrap();
        assert_eq!(data.len(), WalletEntry::LEN);
        assert_eq!(
            &data[WalletEntry::LIST_CONFIG_OFFSET..WalletEntry::LIST_CONFIG_OFFSET + 32],
            list.as_ref()
        );
    }

    #[test]
    fn wrong_discriminator_is_a_decode_error() {
        let address = Pubkey::new_unique();
        let entry = WalletEntry {
            wallet: Pubkey::new_unique(),
            list_config: Pubkey::new_unique(),
        };
        let err = ListConfig::unpack(&address, &entry.pack().unwrap()).unwrap_err();
        assert!(matches!(err, GateError::Decode { .. }));
        assert!(matches!(
            ListConfig::unpack(&address, &[0u8; 4]),
            Err(GateError::Decode { .. })
        ));
    }

    #[test]
    fn init_list_targets_derived_config() {
        let ids = ProgramIds::default();
        let authority = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let (ix, list) = build_init_list_instruction(
            InitListParams {
                authority,
                seed: mint,
                mode: ListMode::Block,
            },
            &ids,
        )
        .unwrap();
        assert_eq!(list, find_list_config_pda(&authority, &mint, &ids).unwrap().0);
        assert_eq!(ix.program_id, ids.access_list_program);
        assert_eq!(ix.accounts[1].pubkey, list);
        assert_eq!(&ix.data[..8], &anchor_discriminator("init_list"));
        assert_eq!(ix.data[8], ListMode::Block.to_u8());
    }

    #[test]
    fn add_and_remove_target_the_same_entry() {
        let ids = ProgramIds::default();
        let params = || WalletParams {
            authority: Pubkey::new_unique(),
            list_config: Pubkey::new_from_array([9; 32]),
            wallet: Pubkey::new_from_array([4; 32]),
        };
        let add = build_add_wallet_instruction(params(), &ids).unwrap();
        let remove = build_remove_wallet_instruction(params(), &ids).unwrap();
        assert_eq!(add.accounts[3].pubkey, remove.accounts[2].pubkey);
        assert_ne!(add.data, remove.data);
    }
}
