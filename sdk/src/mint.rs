//! Token program instructions: mint creation with extensions, minting, and
//! direct freeze/thaw by the mint's freeze authority.

use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_system_interface::instruction as system_instruction;
use spl_token_2022::extension::{
    confidential_transfer, default_account_state, metadata_pointer, pausable, scaled_ui_amount,
    ExtensionType,
};
use spl_token_2022::state::{AccountState, Mint};
use spl_token_metadata_interface::state::{Field, TokenMetadata};
use tracing::debug;

use crate::config::ProgramIds;
use crate::error::{GateError, GateResult};
use crate::pda::associated_token_address;
use crate::source::AccountSource;

const MAX_DECIMALS: u8 = 9;
/// `CreateIdempotent` in the associated-token program's instruction enum.
const CREATE_ATA_IDEMPOTENT: u8 = 1;
/// TLV header: 8-byte type discriminator plus 4-byte length.
const TLV_HEADER_LEN: usize = 8 + 4;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataExtension {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub additional_metadata: Vec<(String, String)>,
}

/// Extensions to enable on a new mint. Authorities of the authority-bearing
/// extensions are the mint authority.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MintExtensions {
    /// Token metadata stored in the mint itself, behind a metadata pointer.
    pub metadata: Option<MetadataExtension>,
    pub pausable: bool,
    pub default_account_state: Option<AccountState>,
    pub permanent_delegate: Option<Pubkey>,
    /// Confidential balances with auto-approved accounts and no auditor.
    pub confidential_balances: bool,
    /// UI amount multiplier.
    pub scaled_ui_amount: Option<f64>,
}

impl MintExtensions {
    /// Fixed-size extension types, in the order their initializers are
    /// emitted.
    pub fn extension_types(&self) -> Vec<ExtensionType> {
        let mut types = Vec::new();
        if self.metadata.is_some() {
            types.push(ExtensionType::MetadataPointer);
        }
        if self.pausable {
            types.push(ExtensionType::Pausable);
        }
        if self.default_account_state.is_some() {
            types.push(ExtensionType::DefaultAccountState);
        }
        if self.permanent_delegate.is_some() {
            types.push(ExtensionType::PermanentDelegate);
        }
        if self.confidential_balances {
            types.push(ExtensionType::ConfidentialTransferMint);
        }
        if self.scaled_ui_amount.is_some() {
            types.push(ExtensionType::ScaledUiAmount);
        }
        types
    }
}

#[derive(Debug, Clone)]
pub struct CreateMintParams {
    pub payer: Pubkey,
    pub mint: Pubkey,
    pub mint_authority: Pubkey,
    pub freeze_authority: Option<Pubkey>,
    pub decimals: u8,
    pub extensions: MintExtensions,
}

/// Space for a variable-length metadata TLV entry.
pub fn metadata_tlv_len(metadata: &TokenMetadata) -> GateResult<usize> {
    Ok(TLV_HEADER_LEN + borsh::to_vec(metadata)?.len())
}

fn token_metadata(params: &CreateMintParams, metadata: &MetadataExtension) -> TokenMetadata {
    TokenMetadata {
        update_authority: Some(params.mint_authority).try_into().unwrap_or_default(),
        mint: params.mint,
        name: metadata.name.clone(),
        symbol: metadata.symbol.clone(),
        uri: metadata.uri.clone(),
        additional_metadata: metadata.additional_metadata.clone(),
    }
}

/// Account space allocated at creation and the full size once metadata has
/// been written. Metadata reallocates the account, so rent must cover the
/// full size up front.
pub fn mint_account_sizes(params: &CreateMintParams) -> GateResult<(usize, usize)> {
    let space =
        ExtensionType::try_calculate_account_len::<Mint>(&params.extensions.extension_types())?;
    let full = match &params.extensions.metadata {
        Some(metadata) => space + metadata_tlv_len(&token_metadata(params, metadata))?,
        None => space,
    };
    Ok((space, full))
}

/// Instructions that create and initialize a mint: account creation,
/// extension initializers ordered by kind, the mint itself, then metadata.
pub fn build_create_mint_instructions(
    params: &CreateMintParams,
    lamports: u64,
    ids: &ProgramIds,
) -> GateResult<Vec<Instruction>> {
    if params.decimals > MAX_DECIMALS {
        return Err(GateError::InvalidArgument(format!(
            "decimals must be at most {}, got {}",
            MAX_DECIMALS, params.decimals
        )));
    }
    let token_program = &ids.token_program;
    let mint = &params.mint;
    let authority = params.mint_authority;
    let extensions = &params.extensions;
    let (space, _) = mint_account_sizes(params)?;

    let mut instructions = vec![system_instruction::create_account(
        &params.payer,
        mint,
        lamports,
        space as u64,
        token_program,
    )];
    if extensions.metadata.is_some() {
        instructions.push(metadata_pointer::instruction::initialize(
            token_program,
            mint,
            Some(authority),
            Some(*mint),
        )?);
    }
    if extensions.pausable {
        instructions.push(pausable::instruction::initialize(token_program, mint, &authority)?);
    }
    if let Some(state) = &extensions.default_account_state {
        instructions.push(
            default_account_state::instruction::initialize_default_account_state(
                token_program,
                mint,
                state,
            )?,
        );
    }
    if let Some(delegate) = &extensions.permanent_delegate {
        instructions.push(spl_token_2022::instruction::initialize_permanent_delegate(
            token_program,
            mint,
            delegate,
        )?);
    }
    if extensions.confidential_balances {
        instructions.push(confidential_transfer::instruction::initialize_mint(
            token_program,
            mint,
            Some(authority),
            true,
            None,
        )?);
    }
    if let Some(multiplier) = extensions.scaled_ui_amount {
        instructions.push(scaled_ui_amount::instruction::initialize(
            token_program,
            mint,
            Some(authority),
            multiplier,
        )?);
    }
    instructions.push(spl_token_2022::instruction::initialize_mint2(
        token_program,
        mint,
        &authority,
        params.freeze_authority.as_ref(),
        params.decimals,
    )?);
    if let Some(metadata) = &extensions.metadata {
        instructions.push(spl_token_metadata_interface::instruction::initialize(
            token_program,
            mint,
            &authority,
            mint,
            &authority,
            metadata.name.clone(),
            metadata.symbol.clone(),
            metadata.uri.clone(),
        ));
        for (key, value) in &metadata.additional_metadata {
            instructions.push(spl_token_metadata_interface::instruction::update_field(
                token_program,
                mint,
                &authority,
                Field::Key(key.clone()),
                value.clone(),
            ));
        }
    }
    Ok(instructions)
}

/// Create-mint instructions with rent fetched for the final account size.
pub async fn create_mint(
    source: &dyn AccountSource,
    ids: &ProgramIds,
    params: &CreateMintParams,
) -> GateResult<Vec<Instruction>> {
    let (space, full) = mint_account_sizes(params)?;
    let lamports = source.minimum_balance_for_rent_exemption(full).await?;
    debug!(mint = %params.mint, space, full, lamports, "create mint");
    build_create_mint_instructions(params, lamports, ids)
}

pub struct MintToParams {
    pub payer: Pubkey,
    pub mint: Pubkey,
    pub mint_authority: Pubkey,
    pub recipient: Pubkey,
    pub amount: u64,
}

/// Create `wallet`'s associated account for `mint` unless it already exists.
pub fn build_create_ata_idempotent_instruction(
    payer: &Pubkey,
    wallet: &Pubkey,
    mint: &Pubkey,
    ids: &ProgramIds,
) -> GateResult<Instruction> {
    let address = associated_token_address(wallet, mint, ids)?;
    Ok(Instruction {
        program_id: ids.associated_token_program,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(address, false),
            AccountMeta::new_readonly(*wallet, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(ids.system_program, false),
            AccountMeta::new_readonly(ids.token_program, false),
        ],
        data: vec![CREATE_ATA_IDEMPOTENT],
    })
}

/// Mint to the recipient's associated account, creating it if needed.
pub fn build_mint_to_instructions(
    params: &MintToParams,
    ids: &ProgramIds,
) -> GateResult<Vec<Instruction>> {
    let destination = associated_token_address(&params.recipient, &params.mint, ids)?;
    Ok(vec![
        build_create_ata_idempotent_instruction(
            &params.payer,
            &params.recipient,
            &params.mint,
            ids,
        )?,
        spl_token_2022::instruction::mint_to(
            &ids.token_program,
            &params.mint,
            &destination,
            &params.mint_authority,
            &[],
            params.amount,
        )?,
    ])
}

/// Freeze by the mint's own freeze authority.
pub fn build_freeze_account_instruction(
    token_account: &Pubkey,
    mint: &Pubkey,
    freeze_authority: &Pubkey,
    ids: &ProgramIds,
) -> GateResult<Instruction> {
    Ok(spl_token_2022::instruction::freeze_account(
        &ids.token_program,
        token_account,
        mint,
        freeze_authority,
        &[],
    )?)
}

pub fn build_thaw_account_instruction(
    token_account: &Pubkey,
    mint: &Pubkey,
    freeze_authority: &Pubkey,
    ids: &ProgramIds,
) -> GateResult<Instruction> {
    Ok(spl_token_2022::instruction::thaw_account(
        &ids.token_program,
        token_account,
        mint,
        freeze_authority,
        &[],
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryChain;
    use solana_sdk::rent::Rent;
    use spl_associated_token_account::instruction::create_associated_token_account_idempotent;

    fn params(extensions: MintExtensions) -> CreateMintParams {
        CreateMintParams {
            payer: Pubkey::new_unique(),
            mint: Pubkey::new_unique(),
            mint_authority: Pubkey::new_unique(),
            freeze_authority: Some(Pubkey::new_unique()),
            decimals: 6,
            extensions,
        }
    }

    #[test]
    fn plain_mint_is_create_then_initialize() {
        let ids = ProgramIds::default();
        let instructions =
            build_create_mint_instructions(&params(MintExtensions::default()), 1, &ids).unwrap();
        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[0].program_id, ids.system_program);
        assert_eq!(instructions[1].program_id, ids.token_program);
    }

    #[test]
    fn extensions_are_initialized_before_the_mint_and_metadata_last() {
        let ids = ProgramIds::default();
        let extensions = MintExtensions {
            metadata: Some(MetadataExtension {
                name: "Gate Dollar".into(),
                symbol: "GUSD".into(),
                uri: "https://gusd.example".into(),
                additional_metadata: vec![("issuer".into(), "gate".into())],
            }),
            pausable: true,
            default_account_state: Some(AccountState::Frozen),
            permanent_delegate: Some(Pubkey::new_unique()),
            confidential_balances: true,
            scaled_ui_amount: Some(1.5),
        };
        let params = params(extensions);
        let instructions = build_create_mint_instructions(&params, 1, &ids).unwrap();
        // create, six extensions, initialize mint, metadata, one field
        assert_eq!(instructions.len(), 10);

        let initialize_mint = spl_token_2022::instruction::initialize_mint2(
            &ids.token_program,
            &params.mint,
            &params.mint_authority,
            params.freeze_authority.as_ref(),
            params.decimals,
        )
        .unwrap();
        assert_eq!(instructions[7], initialize_mint);
        assert_eq!(
            instructions[1],
            metadata_pointer::instruction::initialize(
                &ids.token_program,
                &params.mint,
                Some(params.mint_authority),
                Some(params.mint),
            )
            .unwrap()
        );
        let initialize_metadata = spl_token_metadata_interface::instruction::initialize(
            &ids.token_program,
            &params.mint,
            &params.mint_authority,
            &params.mint,
            &params.mint_authority,
            "Gate Dollar".into(),
            "GUSD".into(),
            "https://gusd.example".into(),
        );
        assert_eq!(instructions[8], initialize_metadata);
    }

    #[test]
    fn rejects_more_than_nine_decimals() {
        let mut params = params(MintExtensions::default());
        params.decimals = 10;
        assert!(matches!(
            build_create_mint_instructions(&params, 1, &ProgramIds::default()),
            Err(GateError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn rent_covers_metadata_realloc() {
        let chain = MemoryChain::new();
        let ids = ProgramIds::default();
        let params = params(MintExtensions {
            metadata: Some(MetadataExtension {
                name: "Gate".into(),
                symbol: "G".into(),
                uri: String::new(),
                additional_metadata: Vec::new(),
            }),
            ..MintExtensions::default()
        });
        let (space, full) = mint_account_sizes(&params).unwrap();
        assert!(full > space);
        let instructions = create_mint(&chain, &ids, &params).await.unwrap();
        let expected = system_instruction::create_account(
            &params.payer,
            &params.mint,
            Rent::default().minimum_balance(full),
            space as u64,
            &ids.token_program,
        );
        assert_eq!(instructions[0], expected);
    }

    #[test]
    fn mint_to_creates_recipient_account_first() {
        let ids = ProgramIds::default();
        let params = MintToParams {
            payer: Pubkey::new_unique(),
            mint: Pubkey::new_unique(),
            mint_authority: Pubkey::new_unique(),
            recipient: Pubkey::new_unique(),
            amount: 42,
        };
        let instructions = build_mint_to_instructions(&params, &ids).unwrap();
        assert_eq!(
            instructions[0],
            create_associated_token_account_idempotent(
                &params.payer,
                &params.recipient,
                &params.mint,
                &ids.token_program,
            )
        );
        assert_eq!(
            instructions[1].accounts[1].pubkey,
            associated_token_address(&params.recipient, &params.mint, &ids).unwrap()
        );
    }

    #[test]
    fn create_ata_targets_configured_program() {
        let default_ids = ProgramIds::default();
        let mock_ids = ProgramIds {
            associated_token_program: Pubkey::new_unique(),
            ..default_ids
        };
        let payer = Pubkey::new_unique();
        let wallet = Pubkey::new_unique();
        let mint = Pubkey::new_unique();

        let default_ix =
            build_create_ata_idempotent_instruction(&payer, &wallet, &mint, &default_ids).unwrap();
        let mock_ix =
            build_create_ata_idempotent_instruction(&payer, &wallet, &mint, &mock_ids).unwrap();
        assert_eq!(mock_ix.program_id, mock_ids.associated_token_program);
        assert_ne!(mock_ix.program_id, default_ix.program_id);
        assert_eq!(
            mock_ix.accounts[1].pubkey,
            associated_token_address(&wallet, &mint, &mock_ids).unwrap()
        );
        assert_ne!(mock_ix.accounts[1].pubkey, default_ix.accounts[1].pubkey);
    }
}
