//! In-memory chain and fixture builders for exercising resolver, list and
//! orchestrator logic without a validator.
//!
//! Fixture helpers panic on malformed input; they are meant for tests only.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use solana_sdk::account::Account;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::rent::Rent;
use spl_discriminator::SplDiscriminate;
use spl_tlv_account_resolution::account::ExtraAccountMeta;
use spl_tlv_account_resolution::seeds::Seed;
use spl_tlv_account_resolution::state::ExtraAccountMetaList;
use spl_token_2022::extension::default_account_state::DefaultAccountState;
use spl_token_2022::extension::metadata_pointer::MetadataPointer;
use spl_token_2022::extension::{BaseStateWithExtensionsMut, ExtensionType, StateWithExtensionsMut};
use spl_token_2022::state::{Account as TokenAccount, AccountState, Mint};
use spl_token_metadata_interface::state::TokenMetadata;

use crate::config::ProgramIds;
use crate::error::GateResult;
use crate::pda::{
    associated_token_address, find_freeze_extra_metas_pda, find_list_config_pda,
    find_mint_config_pda, find_thaw_extra_metas_pda, find_wallet_entry_pda, WALLET_ENTRY_SEED,
};
use crate::programs::access_list::{ListConfig, ListMode, WalletEntry};
use crate::programs::token_acl::{
    FreezeExtraAccountMetas, GateMintConfig, ThawExtraAccountMetas,
    PERMISSIONLESS_TOKEN_ACCOUNT_INDEX,
};
use crate::source::{AccountFilter, AccountSource, LifetimeAnchor};

/// Offset of the owner field inside a token account.
const TOKEN_ACCOUNT_OWNER_OFFSET: u8 = 32;
/// Position of the gating program in a permissionless instruction.
pub const PERMISSIONLESS_GATING_PROGRAM_INDEX: u8 = 6;
/// Number of fixed accounts in a permissionless instruction.
pub const PERMISSIONLESS_FIXED_ACCOUNTS: u8 = 8;

/// Accounts held in memory, answering [`AccountSource`] queries.
pub struct MemoryChain {
    accounts: RwLock<HashMap<Pubkey, Account>>,
    blockhash: Hash,
}

impl Default for MemoryChain {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct MintFixture {
    pub decimals: u8,
    pub supply: u64,
    pub mint_authority: Option<Pubkey>,
    pub freeze_authority: Option<Pubkey>,
    pub default_state: Option<AccountState>,
    /// (name, symbol, uri)
    pub metadata: Option<(String, String, String)>,
}

impl Default for MintFixture {
    fn default() -> Self {
        Self {
            decimals: 6,
            supply: 0,
            mint_authority: Some(Pubkey::new_unique()),
            freeze_authority: Some(Pubkey::new_unique()),
            default_state: None,
            metadata: None,
        }
    }
}

impl MintFixture {
    pub fn frozen_default() -> Self {
        Self {
            default_state: Some(AccountState::Frozen),
            ..Self::default()
        }
    }
}

impl MemoryChain {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            blockhash: Hash::new_unique(),
        }
    }

    pub fn blockhash(&self) -> Hash {
        self.blockhash
    }

    pub fn set_account(&self, address: Pubkey, owner: Pubkey, data: Vec<u8>) {
        let lamports = Rent::default().minimum_balance(data.len());
        let account = Account {
            lamports,
            data,
            owner,
            executable: false,
            rent_epoch: 0,
        };
        self.accounts
            .write()
            .expect("memory chain lock poisoned")
            .insert(address, account);
    }

    pub fn remove_account(&self, address: &Pubkey) {
        self.accounts
            .write()
            .expect("memory chain lock poisoned")
            .remove(address);
    }

    pub fn contains(&self, address: &Pubkey) -> bool {
        self.accounts
            .read()
            .expect("memory chain lock poisoned")
            .contains_key(address)
    }

    /// Funded wallet owned by the system program.
    pub fn system_account(&self, address: Pubkey) {
        self.set_account(address, solana_system_interface::program::ID, Vec::new());
    }

    pub fn mint(&self, ids: &ProgramIds, fixture: MintFixture) -> Pubkey {
        let address = Pubkey::new_unique();
        self.set_account(address, ids.token_program, mint_data(&address, &fixture));
        address
    }

    /// Mint whose freeze authority is a gating-program config that points at
    /// the access-list program, with permissionless thaw and freeze enabled.
    pub fn gated_mint(&self, ids: &ProgramIds, fixture: MintFixture) -> Pubkey {
        let address = Pubkey::new_unique();
        let (mint_config, bump) = find_mint_config_pda(&address, ids).expect("mint config derives");
        let fixture = MintFixture {
            freeze_authority: Some(mint_config),
            ..fixture
        };
        self.set_account(address, ids.token_program, mint_data(&address, &fixture));
        let gate = GateMintConfig {
            address: mint_config,
            mint: address,
            freeze_authority: Pubkey::new_unique(),
            gating_program: ids.access_list_program,
            enable_permissionless_thaw: true,
            enable_permissionless_freeze: true,
            bump,
        };
        self.set_account(
            mint_config,
            ids.token_acl_program,
            gate.pack().expect("gate config packs"),
        );
        address
    }

    pub fn token_account(
        &self,
        ids: &ProgramIds,
        owner: &Pubkey,
        mint: &Pubkey,
        state: AccountState,
    ) -> Pubkey {
        let address = Pubkey::new_unique();
        self.set_account(address, ids.token_program, token_account_data(owner, mint, state));
        address
    }

    pub fn associated_token_account(
        &self,
        ids: &ProgramIds,
        wallet: &Pubkey,
        mint: &Pubkey,
        state: AccountState,
    ) -> Pubkey {
        let address = associated_token_address(wallet, mint, ids).expect("ata derives");
        self.set_account(address, ids.token_program, token_account_data(wallet, mint, state));
        address
    }

    pub fn list(
        &self,
        ids: &ProgramIds,
        authority: &Pubkey,
        mint: &Pubkey,
        mode: ListMode,
    ) -> Pubkey {
        let (address, bump) =
            find_list_config_pda(authority, mint, ids).expect("list config derives");
        let config = ListConfig {
            address,
            authority: *authority,
            seed: *mint,
            mode,
            wallets_count: 0,
            bump,
        };
        self.set_account(
            address,
            ids.access_list_program,
            config.pack().expect("list config packs"),
        );
        address
    }

    pub fn list_member(&self, ids: &ProgramIds, list_config: &Pubkey, wallet: &Pubkey) -> Pubkey {
        let address = find_wallet_entry_pda(list_config, wallet, ids)
            .expect("wallet entry derives")
            .0;
        let entry = WalletEntry {
            wallet: *wallet,
            list_config: *list_config,
        };
        self.set_account(
            address,
            ids.access_list_program,
            entry.pack().expect("wallet entry packs"),
        );
        address
    }

    /// Write thaw and freeze extra-account-meta lists for `mint` that make
    /// permissionless instructions carry each list and the owner's entry in
    /// it.
    pub fn extra_metas(
        &self,
        ids: &ProgramIds,
        mint: &Pubkey,
        lists: &[Pubkey],
    ) -> (Pubkey, Pubkey) {
        self.custom_extra_metas(ids, mint, &list_metas(lists))
    }

    /// Write the same arbitrary meta list as both the thaw and freeze
    /// extra-account-meta lists for `mint`.
    pub fn custom_extra_metas(
        &self,
        ids: &ProgramIds,
        mint: &Pubkey,
        metas: &[ExtraAccountMeta],
    ) -> (Pubkey, Pubkey) {
        let thaw = find_thaw_extra_metas_pda(mint, &ids.access_list_program)
            .expect("thaw metas derive")
            .0;
        let freeze = find_freeze_extra_metas_pda(mint, &ids.access_list_program)
            .expect("freeze metas derive")
            .0;
        self.set_account(
            thaw,
            ids.access_list_program,
            meta_list_data::<ThawExtraAccountMetas>(metas),
        );
        self.set_account(
            freeze,
            ids.access_list_program,
            meta_list_data::<FreezeExtraAccountMetas>(metas),
        );
        (thaw, freeze)
    }
}

#[async_trait]
impl AccountSource for MemoryChain {
    async fn get_account(&self, address: &Pubkey) -> GateResult<Option<Account>> {
        Ok(self
            .accounts
            .read()
            .expect("memory chain lock poisoned")
            .get(address)
            .cloned())
    }

    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: &[AccountFilter],
    ) -> GateResult<Vec<(Pubkey, Account)>> {
        let accounts = self.accounts.read().expect("memory chain lock poisoned");
        let mut matched: Vec<(Pubkey, Account)> = accounts
            .iter()
            .filter(|(_, account)| account.owner == *program_id)
            .filter(|(_, account)| filters.iter().all(|filter| filter.matches(&account.data)))
            .map(|(address, account)| (*address, account.clone()))
            .collect();
        matched.sort_by_key(|(address, _)| *address);
        Ok(matched)
    }

    async fn latest_lifetime_anchor(&self) -> GateResult<LifetimeAnchor> {
        Ok(LifetimeAnchor {
            blockhash: self.blockhash,
            last_valid_block_height: 150,
        })
    }

    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> GateResult<u64> {
        Ok(Rent::default().minimum_balance(data_len))
    }
}

pub fn mint_data(address: &Pubkey, fixture: &MintFixture) -> Vec<u8> {
    let mut extensions = Vec::new();
    if fixture.default_state.is_some() {
        extensions.push(ExtensionType::DefaultAccountState);
    }
    let metadata = fixture.metadata.as_ref().map(|(name, symbol, uri)| TokenMetadata {
        mint: *address,
        name: name.clone(),
        symbol: symbol.clone(),
        uri: uri.clone(),
        ..TokenMetadata::default()
    });
    if metadata.is_some() {
        extensions.push(ExtensionType::MetadataPointer);
    }
    let mut len = ExtensionType::try_calculate_account_len::<Mint>(&extensions)
        .expect("mint length");
    if let Some(metadata) = &metadata {
        len += crate::mint::metadata_tlv_len(metadata).expect("metadata length");
    }

    let mut data = vec![0u8; len];
    let mut state =
        StateWithExtensionsMut::<Mint>::unpack_uninitialized(&mut data).expect("mint buffer");
    if let Some(default_state) = fixture.default_state {
        let extension = state
            .init_extension::<DefaultAccountState>(true)
            .expect("default account state");
        extension.state = default_state as u8;
    }
    if metadata.is_some() {
        let pointer = state
            .init_extension::<MetadataPointer>(true)
            .expect("metadata pointer");
        pointer.metadata_address = Some(*address).try_into().expect("metadata address");
    }
    state.base = Mint {
        mint_authority: fixture.mint_authority.into(),
        supply: fixture.supply,
        decimals: fixture.decimals,
        is_initialized: true,
        freeze_authority: fixture.freeze_authority.into(),
    };
    state.pack_base();
    state.init_account_type().expect("account type");
    if let Some(metadata) = &metadata {
        state
            .init_variable_len_extension(metadata, false)
            .expect("token metadata");
    }
    data
}

pub fn token_account_data(
    owner: &Pubkey,
    mint: &Pubkey,
    account_state: AccountState,
) -> Vec<u8> {
    let len =
        ExtensionType::try_calculate_account_len::<TokenAccount>(&[]).expect("account length");
    let mut data = vec![0u8; len];
    let mut state = StateWithExtensionsMut::<TokenAccount>::unpack_uninitialized(&mut data)
        .expect("account buffer");
    state.base = TokenAccount {
        mint: *mint,
        owner: *owner,
        state: account_state,
        ..TokenAccount::default()
    };
    state.pack_base();
    state.init_account_type().expect("account type");
    data
}

/// Per list: the list itself, then the token owner's entry in it.
pub fn list_metas(lists: &[Pubkey]) -> Vec<ExtraAccountMeta> {
    let mut metas = Vec::with_capacity(lists.len() * 2);
    for (position, list) in lists.iter().enumerate() {
        let list_index = PERMISSIONLESS_FIXED_ACCOUNTS + (position as u8) * 2;
        metas.push(ExtraAccountMeta::new_with_pubkey(list, false, false).expect("list meta"));
        metas.push(
            ExtraAccountMeta::new_external_pda_with_seeds(
                PERMISSIONLESS_GATING_PROGRAM_INDEX,
                &[
                    Seed::Literal {
                        bytes: WALLET_ENTRY_SEED.to_vec(),
                    },
                    Seed::AccountKey { index: list_index },
                    Seed::AccountData {
                        account_index: PERMISSIONLESS_TOKEN_ACCOUNT_INDEX,
                        data_index: TOKEN_ACCOUNT_OWNER_OFFSET,
                        length: 32,
                    },
                ],
                false,
                false,
            )
            .expect("wallet entry meta"),
        );
    }
    metas
}

fn meta_list_data<T: SplDiscriminate>(metas: &[ExtraAccountMeta]) -> Vec<u8> {
    let len = ExtraAccountMetaList::size_of(metas.len()).expect("meta list length");
    let mut data = vec![0u8; len];
    ExtraAccountMetaList::init::<T>(&mut data, metas).expect("meta list");
    data
}
