use solana_sdk::pubkey::Pubkey;
use spl_token_2022::state::AccountState;
use token_gate_sdk::pda::{associated_token_address, find_list_config_pda, find_wallet_entry_pda};
use token_gate_sdk::programs::anchor_discriminator;
use token_gate_sdk::testing::{MemoryChain, MintFixture};
use token_gate_sdk::{
    add_to_allowlist, add_to_blocklist, plan_access, remove_from_blocklist, AccessAction,
    AccessPath, AccessRequest, GateError, GateTransaction, ListMode, ProgramIds,
    TransactionBuilder, TransactionVersion,
};

struct Setup {
    chain: MemoryChain,
    ids: ProgramIds,
    authority: Pubkey,
    wallet: Pubkey,
}

fn setup() -> Setup {
    let chain = MemoryChain::new();
    let wallet = Pubkey::new_unique();
    chain.system_account(wallet);
    Setup {
        chain,
        ids: ProgramIds::default(),
        authority: Pubkey::new_unique(),
        wallet,
    }
}

fn discriminator(data: &[u8]) -> &[u8] {
    &data[..8]
}

#[tokio::test]
async fn gated_allowlist_grant_without_ata_only_adds_wallet() {
    let Setup {
        chain,
        ids,
        authority,
        wallet,
    } = setup();
    let mint = chain.gated_mint(&ids, MintFixture::frozen_default());
    let list = chain.list(&ids, &authority, &mint, ListMode::Allow);
    chain.extra_metas(&ids, &mint, &[list]);

    let plan = add_to_allowlist(&chain, &ids, &mint, &wallet, &authority)
        .await
        .unwrap();

    assert_eq!(plan.path, AccessPath::Gated);
    assert_eq!(plan.list, Some(list));
    assert!(!plan.token_account.is_initialized);
    assert!(plan.token_account.is_frozen);
    assert_eq!(
        plan.token_account.token_account,
        associated_token_address(&wallet, &mint, &ids).unwrap()
    );
    assert_eq!(plan.instructions.len(), 1);
    let add = &plan.instructions[0];
    assert_eq!(add.program_id, ids.access_list_program);
    assert_eq!(discriminator(&add.data), anchor_discriminator("add_wallet"));
    assert_eq!(add.accounts[3].pubkey, find_wallet_entry_pda(&list, &wallet, &ids).unwrap().0);
}

#[tokio::test]
async fn blocklist_removal_of_frozen_account_removes_then_thaws() {
    let Setup {
        chain,
        ids,
        authority,
        wallet,
    } = setup();
    let mint = chain.gated_mint(&ids, MintFixture::frozen_default());
    let list = chain.list(&ids, &authority, &mint, ListMode::Block);
    chain.list_member(&ids, &list, &wallet);
    chain.extra_metas(&ids, &mint, &[list]);
    let ata = chain.associated_token_account(&ids, &wallet, &mint, AccountState::Frozen);

    let plan = remove_from_blocklist(&chain, &ids, &mint, &wallet, &authority)
        .await
        .unwrap();

    assert_eq!(plan.instructions.len(), 2);
    let remove = &plan.instructions[0];
    assert_eq!(remove.program_id, ids.access_list_program);
    assert_eq!(discriminator(&remove.data), anchor_discriminator("remove_wallet"));
    let thaw = &plan.instructions[1];
    assert_eq!(thaw.program_id, ids.token_acl_program);
    assert_eq!(thaw.data, vec![6]);
    assert_eq!(thaw.accounts[1].pubkey, ata);
}

#[tokio::test]
async fn blocklist_add_of_active_account_adds_then_freezes() {
    let Setup {
        chain,
        ids,
        authority,
        wallet,
    } = setup();
    let mint = chain.gated_mint(&ids, MintFixture::frozen_default());
    let list = chain.list(&ids, &authority, &mint, ListMode::Block);
    chain.extra_metas(&ids, &mint, &[list]);
    chain.associated_token_account(&ids, &wallet, &mint, AccountState::Initialized);

    let plan = add_to_blocklist(&chain, &ids, &mint, &wallet, &authority)
        .await
        .unwrap();

    assert_eq!(plan.instructions.len(), 2);
    assert_eq!(discriminator(&plan.instructions[0].data), anchor_discriminator("add_wallet"));
    assert_eq!(plan.instructions[1].data, vec![7]);
}

#[tokio::test]
async fn legacy_block_is_a_single_direct_freeze() {
    let Setup {
        chain,
        ids,
        authority,
        wallet,
    } = setup();
    let mint = chain.mint(
        &ids,
        MintFixture {
            freeze_authority: Some(authority),
            ..MintFixture::frozen_default()
        },
    );
    let ata = chain.associated_token_account(&ids, &wallet, &mint, AccountState::Initialized);

    let plan = add_to_blocklist(&chain, &ids, &mint, &wallet, &authority)
        .await
        .unwrap();

    assert_eq!(plan.path, AccessPath::Legacy);
    assert!(plan.list.is_none());
    assert_eq!(plan.instructions.len(), 1);
    let expected = spl_token_2022::instruction::freeze_account(
        &ids.token_program,
        &ata,
        &mint,
        &authority,
        &[],
    )
    .unwrap();
    assert_eq!(plan.instructions[0], expected);
    // No list exists, so reaching it would have been a NotFound error.
    assert!(!chain.contains(&find_list_config_pda(&authority, &mint, &ids).unwrap().0));
}

#[tokio::test]
async fn token_account_of_another_mint_is_rejected_before_planning() {
    let Setup {
        chain,
        ids,
        authority,
        wallet,
    } = setup();
    let mint = chain.gated_mint(&ids, MintFixture::frozen_default());
    let other = chain.mint(&ids, MintFixture::default());
    let account = chain.token_account(&ids, &wallet, &other, AccountState::Initialized);

    let err = add_to_allowlist(&chain, &ids, &mint, &account, &authority)
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::MintMismatch { .. }));
}

#[tokio::test]
async fn mode_mismatch_yields_no_instructions() {
    let Setup {
        chain,
        ids,
        authority,
        wallet,
    } = setup();
    let mint = chain.gated_mint(&ids, MintFixture::frozen_default());
    let list = chain.list(&ids, &authority, &mint, ListMode::Block);

    let request = AccessRequest {
        mint,
        account: wallet,
        authority,
        mode: ListMode::Allow,
        action: AccessAction::Grant,
    };
    let err = plan_access(&chain, &ids, &request).await.unwrap_err();
    assert!(matches!(
        err,
        GateError::WrongListMode {
            list: l,
            expected: ListMode::Allow,
            actual: ListMode::Block,
        } if l == list
    ));
}

#[tokio::test]
async fn planned_access_survives_wire_round_trip() {
    let Setup {
        chain,
        ids,
        authority,
        wallet,
    } = setup();
    let mint = chain.gated_mint(&ids, MintFixture::frozen_default());
    let list = chain.list(&ids, &authority, &mint, ListMode::Allow);
    chain.extra_metas(&ids, &mint, &[list]);
    chain.associated_token_account(&ids, &wallet, &mint, AccountState::Frozen);

    let builder =
        TransactionBuilder::new(&chain, ids, authority).with_version(TransactionVersion::V0);
    let request = AccessRequest {
        mint,
        account: wallet,
        authority,
        mode: ListMode::Allow,
        action: AccessAction::Grant,
    };
    let (transaction, plan) = builder.access(&request).await.unwrap();
    assert_eq!(plan.instructions.len(), 2);

    let decoded = GateTransaction::from_base64(&transaction.to_base64().unwrap()).unwrap();
    assert_eq!(decoded.fee_payer(), Some(authority));
    let instructions = decoded.instructions().unwrap();
    assert_eq!(instructions.len(), 2);
    for (decoded, planned) in instructions.iter().zip(&plan.instructions) {
        assert_eq!(decoded.program_id, planned.program_id);
        assert_eq!(decoded.data, planned.data);
        let keys: Vec<_> = decoded.accounts.iter().map(|meta| meta.pubkey).collect();
        let planned_keys: Vec<_> = planned.accounts.iter().map(|meta| meta.pubkey).collect();
        assert_eq!(keys, planned_keys);
    }
}
