//! Transaction builders: each operation's instructions, compiled against a
//! fresh lifetime anchor with a chosen fee payer.

use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;

use crate::access::{plan_access, AccessPlan, AccessRequest};
use crate::config::ProgramIds;
use crate::error::{GateError, GateResult};
use crate::lists;
use crate::mint::{build_mint_to_instructions, create_mint, CreateMintParams, MintToParams};
use crate::pda::find_mint_config_pda;
use crate::programs::access_list::ListMode;
use crate::programs::token_acl::{
    build_create_config_instruction, build_freeze_instruction, build_set_authority_instruction,
    build_set_gating_program_instruction, build_thaw_instruction,
    build_toggle_permissionless_instruction, AuthorityFreezeParams, CreateConfigParams,
    GateMintConfig,
};
use crate::resolver::resolve_mint_config;
use crate::source::AccountSource;
use crate::transaction::{assemble_transaction, GateTransaction, TransactionVersion};

pub struct TransactionBuilder<'a> {
    source: &'a dyn AccountSource,
    ids: ProgramIds,
    fee_payer: Pubkey,
    version: TransactionVersion,
}

impl<'a> TransactionBuilder<'a> {
    pub fn new(source: &'a dyn AccountSource, ids: ProgramIds, fee_payer: Pubkey) -> Self {
        Self {
            source,
            ids,
            fee_payer,
            version: TransactionVersion::default(),
        }
    }

    pub fn with_version(mut self, version: TransactionVersion) -> Self {
        self.version = version;
        self
    }

    pub fn ids(&self) -> &ProgramIds {
        &self.ids
    }

    pub async fn assemble(&self, instructions: &[Instruction]) -> GateResult<GateTransaction> {
        let anchor = self.source.latest_lifetime_anchor().await?;
        assemble_transaction(&self.fee_payer, instructions, &anchor, self.version)
    }

    pub async fn create_list(
        &self,
        authority: &Pubkey,
        mint: &Pubkey,
        mode: ListMode,
    ) -> GateResult<(GateTransaction, Pubkey)> {
        let (instruction, list) = lists::create_list(authority, mint, mode, &self.ids)?;
        Ok((self.assemble(&[instruction]).await?, list))
    }

    pub async fn add_wallet(
        &self,
        authority: &Pubkey,
        list: &Pubkey,
        wallet: &Pubkey,
    ) -> GateResult<GateTransaction> {
        let instruction = lists::add_wallet_to_list(authority, list, wallet, &self.ids)?;
        self.assemble(&[instruction]).await
    }

    pub async fn remove_wallet(
        &self,
        authority: &Pubkey,
        list: &Pubkey,
        wallet: &Pubkey,
    ) -> GateResult<GateTransaction> {
        let instruction = lists::remove_wallet_from_list(authority, list, wallet, &self.ids)?;
        self.assemble(&[instruction]).await
    }

    pub async fn set_list_mode(
        &self,
        authority: &Pubkey,
        list: &Pubkey,
        mode: ListMode,
    ) -> GateResult<GateTransaction> {
        self.assemble(&[lists::set_list_mode(authority, list, mode, &self.ids)?])
            .await
    }

    pub async fn delete_list(
        &self,
        authority: &Pubkey,
        list: &Pubkey,
    ) -> GateResult<GateTransaction> {
        self.assemble(&[lists::delete_list(authority, list, &self.ids)])
            .await
    }

    pub async fn setup_extra_metas(
        &self,
        authority: &Pubkey,
        mint: &Pubkey,
        list_addresses: &[Pubkey],
        check_freeze: bool,
        check_thaw: bool,
    ) -> GateResult<GateTransaction> {
        let instruction = lists::setup_extra_metas(
            authority,
            mint,
            list_addresses,
            check_freeze,
            check_thaw,
            &self.ids,
        )?;
        self.assemble(&[instruction]).await
    }

    /// Hand the mint's freeze authority to the gating program, using the
    /// list program as the gate.
    pub async fn create_mint_config(
        &self,
        authority: &Pubkey,
        mint: &Pubkey,
        gating_program: Option<Pubkey>,
    ) -> GateResult<(GateTransaction, Pubkey)> {
        let (instruction, config) = build_create_config_instruction(
            CreateConfigParams {
                payer: self.fee_payer,
                authority: *authority,
                mint: *mint,
                gating_program: gating_program.unwrap_or(self.ids.access_list_program),
            },
            &self.ids,
        )?;
        Ok((self.assemble(&[instruction]).await?, config))
    }

    pub async fn set_gating_program(
        &self,
        authority: &Pubkey,
        mint: &Pubkey,
        gating_program: &Pubkey,
    ) -> GateResult<GateTransaction> {
        let instruction =
            build_set_gating_program_instruction(*authority, *mint, *gating_program, &self.ids)?;
        self.assemble(&[instruction]).await
    }

    /// Move the gating config's authority to `new_authority`.
    pub async fn set_config_authority(
        &self,
        authority: &Pubkey,
        mint: &Pubkey,
        new_authority: &Pubkey,
    ) -> GateResult<GateTransaction> {
        let instruction =
            build_set_authority_instruction(*authority, *mint, *new_authority, &self.ids)?;
        self.assemble(&[instruction]).await
    }

    pub async fn toggle_permissionless(
        &self,
        authority: &Pubkey,
        mint: &Pubkey,
        freeze_enabled: bool,
        thaw_enabled: bool,
    ) -> GateResult<GateTransaction> {
        let instruction = build_toggle_permissionless_instruction(
            *authority,
            *mint,
            freeze_enabled,
            thaw_enabled,
            &self.ids,
        )?;
        self.assemble(&[instruction]).await
    }

    /// Enable permissionless thaw, keeping the current freeze setting.
    pub async fn enable_permissionless_thaw(
        &self,
        authority: &Pubkey,
        mint: &Pubkey,
    ) -> GateResult<GateTransaction> {
        let config = self.gate_config(mint).await?;
        self.toggle_permissionless(authority, mint, config.enable_permissionless_freeze, true)
            .await
    }

    async fn gate_config(&self, mint: &Pubkey) -> GateResult<GateMintConfig> {
        let address = find_mint_config_pda(mint, &self.ids)?.0;
        let account = self
            .source
            .get_account(&address)
            .await?
            .ok_or(GateError::NotFound(address))?;
        if account.owner != self.ids.token_acl_program {
            return Err(GateError::parse(
                &address,
                format!("owned by {}, not the gating program", account.owner),
            ));
        }
        GateMintConfig::unpack(&address, &account.data)
    }

    /// Freeze by authority: through the gating program when it holds the
    /// mint's freeze authority, otherwise directly on the token program.
    pub async fn freeze(
        &self,
        authority: &Pubkey,
        mint: &Pubkey,
        token_account: &Pubkey,
    ) -> GateResult<GateTransaction> {
        let instruction = if self.is_gated(mint).await? {
            build_freeze_instruction(
                AuthorityFreezeParams {
                    authority: *authority,
                    mint: *mint,
                    token_account: *token_account,
                },
                &self.ids,
            )?
        } else {
            crate::mint::build_freeze_account_instruction(
                token_account,
                mint,
                authority,
                &self.ids,
            )?
        };
        self.assemble(&[instruction]).await
    }

    pub async fn thaw(
        &self,
        authority: &Pubkey,
        mint: &Pubkey,
        token_account: &Pubkey,
    ) -> GateResult<GateTransaction> {
        let instruction = if self.is_gated(mint).await? {
            build_thaw_instruction(
                AuthorityFreezeParams {
                    authority: *authority,
                    mint: *mint,
                    token_account: *token_account,
                },
                &self.ids,
            )?
        } else {
            crate::mint::build_thaw_account_instruction(token_account, mint, authority, &self.ids)?
        };
        self.assemble(&[instruction]).await
    }

    async fn is_gated(&self, mint: &Pubkey) -> GateResult<bool> {
        Ok(resolve_mint_config(self.source, &self.ids, mint)
            .await?
            .uses_enhanced_balance_gating)
    }

    pub async fn create_mint(&self, params: &CreateMintParams) -> GateResult<GateTransaction> {
        let instructions = create_mint(self.source, &self.ids, params).await?;
        self.assemble(&instructions).await
    }

    pub async fn mint_to(&self, params: &MintToParams) -> GateResult<GateTransaction> {
        let instructions = build_mint_to_instructions(params, &self.ids)?;
        self.assemble(&instructions).await
    }

    /// Plan an access change and compile it. The plan is returned alongside
    /// so callers can report the path taken.
    pub async fn access(
        &self,
        request: &AccessRequest,
    ) -> GateResult<(GateTransaction, AccessPlan)> {
        let plan = plan_access(self.source, &self.ids, request).await?;
        Ok((self.assemble(&plan.instructions).await?, plan))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryChain, MintFixture};

    #[tokio::test]
    async fn enable_thaw_keeps_freeze_flag() {
        let chain = MemoryChain::new();
        let ids = ProgramIds::default();
        let mint = chain.gated_mint(&ids, MintFixture::frozen_default());
        let payer = Pubkey::new_unique();
        let builder = TransactionBuilder::new(&chain, ids, payer);

        let transaction = builder
            .enable_permissionless_thaw(&Pubkey::new_unique(), &mint)
            .await
            .unwrap();
        let instructions = transaction.instructions().unwrap();
        assert_eq!(instructions.len(), 1);
        assert_eq!(instructions[0].data, vec![8, 1, 1]);
        assert_eq!(transaction.fee_payer(), Some(payer));
        assert_eq!(
            transaction.transaction.message.recent_blockhash(),
            &chain.blockhash()
        );
    }

    #[tokio::test]
    async fn freeze_routes_by_freeze_authority_owner() {
        let chain = MemoryChain::new();
        let ids = ProgramIds::default();
        let builder = TransactionBuilder::new(&chain, ids, Pubkey::new_unique());
        let authority = Pubkey::new_unique();
        let account = Pubkey::new_unique();

        let gated = chain.gated_mint(&ids, MintFixture::frozen_default());
        let transaction = builder.freeze(&authority, &gated, &account).await.unwrap();
        assert_eq!(
            transaction.instructions().unwrap()[0].program_id,
            ids.token_acl_program
        );

        let legacy = chain.mint(&ids, MintFixture::default());
        let transaction = builder.thaw(&authority, &legacy, &account).await.unwrap();
        assert_eq!(transaction.instructions().unwrap()[0].program_id, ids.token_program);
    }

    #[tokio::test]
    async fn enable_thaw_without_config_is_not_found() {
        let chain = MemoryChain::new();
        let ids = ProgramIds::default();
        let mint = chain.mint(&ids, MintFixture::default());
        let builder = TransactionBuilder::new(&chain, ids, Pubkey::new_unique());
        assert!(matches!(
            builder.enable_permissionless_thaw(&Pubkey::new_unique(), &mint).await,
            Err(GateError::NotFound(_))
        ));
    }
}
