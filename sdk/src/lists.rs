//! List manager: instruction builders and queries for access lists.
//!
//! Builders do no existence or duplicate checks; the list program rejects
//! invalid transitions on chain.

use std::collections::HashMap;

use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::config::ProgramIds;
use crate::error::{GateError, GateResult};
use crate::pda::{find_list_config_pda, find_wallet_entry_pda};
use crate::programs::access_list::{
    build_add_wallet_instruction, build_delete_list_instruction, build_init_list_instruction,
    build_remove_wallet_instruction, build_set_list_mode_instruction,
    build_setup_extra_metas_instruction, InitListParams, ListConfig, ListMode,
    SetupExtraMetasParams, WalletEntry, WalletParams,
};
use crate::source::{AccountFilter, AccountSource};

/// A list and its members. Member order is unspecified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct List {
    pub config: ListConfig,
    pub wallets: Vec<Pubkey>,
}

/// Create the list for (`authority`, `mint`). Returns the list address.
pub fn create_list(
    authority: &Pubkey,
    mint: &Pubkey,
    mode: ListMode,
    ids: &ProgramIds,
) -> GateResult<(Instruction, Pubkey)> {
    build_init_list_instruction(
        InitListParams {
            authority: *authority,
            seed: *mint,
            mode,
        },
        ids,
    )
}

pub fn add_wallet_to_list(
    authority: &Pubkey,
    list_config: &Pubkey,
    wallet: &Pubkey,
    ids: &ProgramIds,
) -> GateResult<Instruction> {
    build_add_wallet_instruction(
        WalletParams {
            authority: *authority,
            list_config: *list_config,
            wallet: *wallet,
        },
        ids,
    )
}

pub fn remove_wallet_from_list(
    authority: &Pubkey,
    list_config: &Pubkey,
    wallet: &Pubkey,
    ids: &ProgramIds,
) -> GateResult<Instruction> {
    build_remove_wallet_instruction(
        WalletParams {
            authority: *authority,
            list_config: *list_config,
            wallet: *wallet,
        },
        ids,
    )
}

pub fn set_list_mode(
    authority: &Pubkey,
    list_config: &Pubkey,
    mode: ListMode,
    ids: &ProgramIds,
) -> GateResult<Instruction> {
    build_set_list_mode_instruction(*authority, *list_config, mode, ids)
}

pub fn delete_list(authority: &Pubkey, list_config: &Pubkey, ids: &ProgramIds) -> Instruction {
    build_delete_list_instruction(*authority, *list_config, ids)
}

/// Register `lists` as the lists consulted by permissionless freeze/thaw of
/// `mint`.
pub fn setup_extra_metas(
    authority: &Pubkey,
    mint: &Pubkey,
    lists: &[Pubkey],
    check_freeze: bool,
    check_thaw: bool,
    ids: &ProgramIds,
) -> GateResult<Instruction> {
    build_setup_extra_metas_instruction(
        SetupExtraMetasParams {
            authority: *authority,
            mint: *mint,
            lists: lists.to_vec(),
            check_freeze,
            check_thaw,
        },
        ids,
    )
}

pub async fn get_list_config(
    source: &dyn AccountSource,
    ids: &ProgramIds,
    list_config: &Pubkey,
) -> GateResult<ListConfig> {
    let account = source
        .get_account(list_config)
        .await?
        .ok_or(GateError::NotFound(*list_config))?;
    if account.owner != ids.access_list_program {
        return Err(GateError::parse(
            list_config,
            format!("owned by {}, not the list program", account.owner),
        ));
    }
    ListConfig::unpack(list_config, &account.data)
}

/// List config for (`authority`, `mint`), located by derivation.
pub async fn find_list(
    source: &dyn AccountSource,
    ids: &ProgramIds,
    authority: &Pubkey,
    mint: &Pubkey,
) -> GateResult<ListConfig> {
    let address = find_list_config_pda(authority, mint, ids)?.0;
    get_list_config(source, ids, &address).await
}

pub async fn get_list(
    source: &dyn AccountSource,
    ids: &ProgramIds,
    list_config: &Pubkey,
) -> GateResult<List> {
    let config = get_list_config(source, ids, list_config).await?;
    let filters = [
        AccountFilter::DataSize(WalletEntry::LEN as u64),
        AccountFilter::memcmp(WalletEntry::LIST_CONFIG_OFFSET, list_config),
    ];
    let entries = source
        .get_program_accounts(&ids.access_list_program, &filters)
        .await?;
    let wallets = entries
        .iter()
        .map(|(address, account)| {
            WalletEntry::unpack(address, &account.data).map(|entry| entry.wallet)
        })
        .collect::<GateResult<Vec<_>>>()?;
    debug!(list = %list_config, members = wallets.len(), "loaded list");
    Ok(List { config, wallets })
}

pub async fn get_all_list_configs(
    source: &dyn AccountSource,
    ids: &ProgramIds,
) -> GateResult<Vec<ListConfig>> {
    let accounts = source
        .get_program_accounts(
            &ids.access_list_program,
            &[AccountFilter::DataSize(ListConfig::LEN as u64)],
        )
        .await?;
    accounts
        .iter()
        .map(|(address, account)| ListConfig::unpack(address, &account.data))
        .collect()
}

/// Every list with its members, using one scan for configs and one for
/// entries.
pub async fn get_all_lists(source: &dyn AccountSource, ids: &ProgramIds) -> GateResult<Vec<List>> {
    let configs = get_all_list_configs(source, ids).await?;
    let entries = source
        .get_program_accounts(
            &ids.access_list_program,
            &[AccountFilter::DataSize(WalletEntry::LEN as u64)],
        )
        .await?;
    let mut members: HashMap<Pubkey, Vec<Pubkey>> = HashMap::new();
    for (address, account) in &entries {
        let entry = WalletEntry::unpack(address, &account.data)?;
        members.entry(entry.list_config).or_default().push(entry.wallet);
    }
    Ok(configs
        .into_iter()
        .map(|config| {
            let wallets = members.remove(&config.address).unwrap_or_default();
            List { config, wallets }
        })
        .collect())
}

pub async fn is_list_mode(
    source: &dyn AccountSource,
    ids: &ProgramIds,
    list_config: &Pubkey,
    expected: ListMode,
) -> GateResult<bool> {
    Ok(get_list_config(source, ids, list_config).await?.mode == expected)
}

/// Fails with [`GateError::WrongListMode`] unless the list is in `expected`
/// mode.
pub async fn ensure_list_mode(
    source: &dyn AccountSource,
    ids: &ProgramIds,
    list_config: &Pubkey,
    expected: ListMode,
) -> GateResult<ListConfig> {
    let config = get_list_config(source, ids, list_config).await?;
    if config.mode != expected {
        return Err(GateError::WrongListMode {
            list: *list_config,
            expected,
            actual: config.mode,
        });
    }
    Ok(config)
}

pub async fn is_wallet_listed(
    source: &dyn AccountSource,
    ids: &ProgramIds,
    list_config: &Pubkey,
    wallet: &Pubkey,
) -> GateResult<bool> {
    let entry = find_wallet_entry_pda(list_config, wallet, ids)?.0;
    Ok(source.get_account(&entry).await?.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryChain;

    #[tokio::test]
    async fn get_list_only_returns_own_members() {
        let chain = MemoryChain::new();
        let ids = ProgramIds::default();
        let authority = Pubkey::new_unique();
        let first = chain.list(&ids, &authority, &Pubkey::new_unique(), ListMode::Allow);
        let second = chain.list(&ids, &authority, &Pubkey::new_unique(), ListMode::Block);
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();
        chain.list_member(&ids, &first, &alice);
        chain.list_member(&ids, &first, &bob);
        chain.list_member(&ids, &second, &alice);

        let list = get_list(&chain, &ids, &first).await.unwrap();
        assert_eq!(list.config.mode, ListMode::Allow);
        let mut wallets = list.wallets.clone();
        wallets.sort();
        let mut expected = vec![alice, bob];
        expected.sort();
        assert_eq!(wallets, expected);

        let list = get_list(&chain, &ids, &second).await.unwrap();
        assert_eq!(list.wallets, vec![alice]);
    }

    #[tokio::test]
    async fn all_lists_groups_members() {
        let chain = MemoryChain::new();
        let ids = ProgramIds::default();
        let authority = Pubkey::new_unique();
        let empty = chain.list(&ids, &authority, &Pubkey::new_unique(), ListMode::Allow);
        let full = chain.list(&ids, &authority, &Pubkey::new_unique(), ListMode::Block);
        let wallet = Pubkey::new_unique();
        chain.list_member(&ids, &full, &wallet);

        let lists = get_all_lists(&chain, &ids).await.unwrap();
        assert_eq!(lists.len(), 2);
        for list in lists {
            if list.config.address == empty {
                assert!(list.wallets.is_empty());
            } else {
                assert_eq!(list.config.address, full);
                assert_eq!(list.wallets, vec![wallet]);
            }
        }
        assert_eq!(get_all_list_configs(&chain, &ids).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn mode_checks() {
        let chain = MemoryChain::new();
        let ids = ProgramIds::default();
        let list = chain.list(&ids, &Pubkey::new_unique(), &Pubkey::new_unique(), ListMode::Block);
        assert!(is_list_mode(&chain, &ids, &list, ListMode::Block).await.unwrap());
        assert!(!is_list_mode(&chain, &ids, &list, ListMode::Allow).await.unwrap());
        let err = ensure_list_mode(&chain, &ids, &list, ListMode::Allow)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GateError::WrongListMode {
                expected: ListMode::Allow,
                actual: ListMode::Block,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn missing_list_is_not_found() {
        let chain = MemoryChain::new();
        let ids = ProgramIds::default();
        let address = Pubkey::new_unique();
        assert!(matches!(
            get_list_config(&chain, &ids, &address).await,
            Err(GateError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn membership_follows_entry_existence() {
        let chain = MemoryChain::new();
        let ids = ProgramIds::default();
        let authority = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let list = chain.list(&ids, &authority, &mint, ListMode::Allow);
        let wallet = Pubkey::new_unique();
        assert!(!is_wallet_listed(&chain, &ids, &list, &wallet).await.unwrap());
        let entry = chain.list_member(&ids, &list, &wallet);
        assert!(is_wallet_listed(&chain, &ids, &list, &wallet).await.unwrap());
        chain.remove_account(&entry);
        assert!(!is_wallet_listed(&chain, &ids, &list, &wallet).await.unwrap());
        assert_eq!(find_list(&chain, &ids, &authority, &mint).await.unwrap().address, list);
    }
}
