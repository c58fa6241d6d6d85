//! Mint and token account state resolution.
//!
//! Nothing here is cached: every call reads the chain through the
//! [`AccountSource`] it is given.

use solana_sdk::account::Account;
use solana_sdk::pubkey::Pubkey;
use spl_token_2022::extension::default_account_state::DefaultAccountState;
use spl_token_2022::extension::{BaseStateWithExtensions, ExtensionType, StateWithExtensions};
use spl_token_2022::state::{Account as TokenAccount, AccountState, Mint};
use spl_token_metadata_interface::state::TokenMetadata;
use tracing::debug;

use crate::config::ProgramIds;
use crate::error::{GateError, GateResult};
use crate::pda::associated_token_address;
use crate::programs::token_acl::GateMintConfig;
use crate::source::AccountSource;

/// Extensions enabled on a mint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtensionFlags {
    pub types: Vec<ExtensionType>,
    /// State new token accounts start in, when the mint sets one.
    pub default_account_state: Option<AccountState>,
}

impl ExtensionFlags {
    pub fn has(&self, extension: ExtensionType) -> bool {
        self.types.contains(&extension)
    }

    pub fn defaults_to_frozen(&self) -> bool {
        self.default_account_state == Some(AccountState::Frozen)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MintConfig {
    pub address: Pubkey,
    pub decimals: u8,
    pub supply: u64,
    pub mint_authority: Option<Pubkey>,
    pub freeze_authority: Option<Pubkey>,
    pub extensions: ExtensionFlags,
    /// The freeze authority account is owned by the gating program.
    pub uses_enhanced_balance_gating: bool,
    /// Decoded gating config, present when `uses_enhanced_balance_gating`.
    pub gate: Option<GateMintConfig>,
}

impl MintConfig {
    /// Gated flow applies only when the gating program holds the freeze
    /// authority and new accounts start frozen.
    pub fn enhanced_gating_active(&self) -> bool {
        self.uses_enhanced_balance_gating && is_enhanced_balance_eligible(&self.extensions)
    }
}

pub fn is_enhanced_balance_eligible(extensions: &ExtensionFlags) -> bool {
    extensions.defaults_to_frozen()
}

/// Resolved state of the token account a wallet holds for a mint.
///
/// An account that does not exist yet is reported as uninitialized and
/// frozen: with a frozen default state that is what it will be once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAccountState {
    pub token_account: Pubkey,
    /// Owner of the token account, i.e. the wallet lists are keyed by.
    pub wallet: Pubkey,
    pub is_initialized: bool,
    pub is_frozen: bool,
}

impl TokenAccountState {
    fn uninitialized(token_account: Pubkey, wallet: Pubkey) -> Self {
        Self {
            token_account,
            wallet,
            is_initialized: false,
            is_frozen: true,
        }
    }
}

/// Token metadata stored in the mint's metadata extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintMetadata {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub update_authority: Option<Pubkey>,
    pub additional_metadata: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MintDetails {
    pub config: MintConfig,
    pub metadata: Option<MintMetadata>,
}

pub async fn resolve_mint_config(
    source: &dyn AccountSource,
    ids: &ProgramIds,
    mint: &Pubkey,
) -> GateResult<MintConfig> {
    Ok(fetch_mint(source, ids, mint).await?.0)
}

/// Mint configuration together with its token metadata, if any.
pub async fn get_mint_details(
    source: &dyn AccountSource,
    ids: &ProgramIds,
    mint: &Pubkey,
) -> GateResult<MintDetails> {
    let (config, account) = fetch_mint(source, ids, mint).await?;
    let state = StateWithExtensions::<Mint>::unpack(&account.data)
        .map_err(|err| GateError::parse(mint, err))?;
    let metadata = if config.extensions.has(ExtensionType::TokenMetadata) {
        let metadata = state
            .get_variable_len_extension::<TokenMetadata>()
            .map_err(|err| GateError::decode(mint, err))?;
        Some(MintMetadata {
            name: metadata.name,
            symbol: metadata.symbol,
            uri: metadata.uri,
            update_authority: Option::<Pubkey>::from(metadata.update_authority),
            additional_metadata: metadata.additional_metadata,
        })
    } else {
        None
    };
    Ok(MintDetails { config, metadata })
}

async fn fetch_mint(
    source: &dyn AccountSource,
    ids: &ProgramIds,
    mint: &Pubkey,
) -> GateResult<(MintConfig, Account)> {
    let account = source
        .get_account(mint)
        .await?
        .ok_or(GateError::NotFound(*mint))?;
    if account.owner != ids.token_program {
        return Err(GateError::parse(
            mint,
            format!("owned by {}, not the token program", account.owner),
        ));
    }

    let state = StateWithExtensions::<Mint>::unpack(&account.data)
        .map_err(|err| GateError::parse(mint, err))?;
    let types = state
        .get_extension_types()
        .map_err(|err| GateError::parse(mint, err))?;
    let default_account_state = match state.get_extension::<DefaultAccountState>() {
        Ok(extension) => Some(
            AccountState::try_from(extension.state)
                .map_err(|err| GateError::decode(mint, err))?,
        ),
        Err(_) => None,
    };
    let mint_authority = Option::<Pubkey>::from(state.base.mint_authority);
    let freeze_authority = Option::<Pubkey>::from(state.base.freeze_authority);
    let mut config = MintConfig {
        address: *mint,
        decimals: state.base.decimals,
        supply: state.base.supply,
        mint_authority,
        freeze_authority,
        extensions: ExtensionFlags {
            types,
            default_account_state,
        },
        uses_enhanced_balance_gating: false,
        gate: None,
    };

    if let Some(authority) = freeze_authority {
        if let Some(authority_account) = source.get_account(&authority).await? {
            if authority_account.owner == ids.token_acl_program {
                config.uses_enhanced_balance_gating = true;
                config.gate = Some(GateMintConfig::unpack(&authority, &authority_account.data)?);
            }
        }
    }
    debug!(
        %mint,
        gated = config.uses_enhanced_balance_gating,
        default_frozen = config.extensions.defaults_to_frozen(),
        "resolved mint"
    );
    Ok((config, account))
}

/// Resolve the token account for `account_or_wallet`, which may name either
/// a token account of `mint` or a wallet whose associated account is used.
pub async fn resolve_token_account(
    source: &dyn AccountSource,
    ids: &ProgramIds,
    account_or_wallet: &Pubkey,
    mint: &Pubkey,
) -> GateResult<TokenAccountState> {
    if let Some(account) = source.get_account(account_or_wallet).await? {
        if account.owner == ids.token_program {
            let state = token_account_state(account_or_wallet, &account, mint)?;
            debug!(account = %account_or_wallet, "input is a token account");
            return Ok(state);
        }
        if account.owner != ids.system_program {
            return Err(GateError::InvalidAccount {
                address: *account_or_wallet,
                owner: account.owner,
            });
        }
    }

    let ata = associated_token_address(account_or_wallet, mint, ids)?;
    match source.get_account(&ata).await? {
        Some(account) if account.owner == ids.token_program => {
            debug!(wallet = %account_or_wallet, %ata, "using existing associated account");
            token_account_state(&ata, &account, mint)
        }
        _ => {
            debug!(wallet = %account_or_wallet, %ata, "associated account not created yet");
            Ok(TokenAccountState::uninitialized(ata, *account_or_wallet))
        }
    }
}

fn token_account_state(
    address: &Pubkey,
    account: &Account,
    mint: &Pubkey,
) -> GateResult<TokenAccountState> {
    let state = StateWithExtensions::<TokenAccount>::unpack(&account.data)
        .map_err(|err| GateError::parse(address, err))?;
    if state.base.mint != *mint {
        return Err(GateError::MintMismatch {
            account: *address,
            expected: *mint,
            actual: state.base.mint,
        });
    }
    let is_initialized = state.base.state != AccountState::Uninitialized;
    Ok(TokenAccountState {
        token_account: *address,
        wallet: state.base.owner,
        is_initialized,
        is_frozen: !is_initialized || state.base.state == AccountState::Frozen,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryChain, MintFixture};

    #[tokio::test]
    async fn missing_mint_is_not_found() {
        let chain = MemoryChain::new();
        let ids = ProgramIds::default();
        let mint = Pubkey::new_unique();
        let err = resolve_mint_config(&chain, &ids, &mint).await.unwrap_err();
        assert!(matches!(err, GateError::NotFound(address) if address == mint));
    }

    #[tokio::test]
    async fn foreign_owner_is_a_parse_error() {
        let chain = MemoryChain::new();
        let ids = ProgramIds::default();
        let mint = Pubkey::new_unique();
        chain.set_account(mint, Pubkey::new_unique(), vec![0; 82]);
        assert!(matches!(
            resolve_mint_config(&chain, &ids, &mint).await,
            Err(GateError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn gating_follows_freeze_authority_owner() {
        let chain = MemoryChain::new();
        let ids = ProgramIds::default();
        let gated = chain.gated_mint(&ids, MintFixture::frozen_default());
        let config = resolve_mint_config(&chain, &ids, &gated).await.unwrap();
        assert!(config.uses_enhanced_balance_gating);
        assert!(config.enhanced_gating_active());
        assert_eq!(config.gate.unwrap().gating_program, ids.access_list_program);

        let legacy = chain.mint(&ids, MintFixture::frozen_default());
        let config = resolve_mint_config(&chain, &ids, &legacy).await.unwrap();
        assert!(!config.uses_enhanced_balance_gating);
        assert!(config.gate.is_none());
        assert!(is_enhanced_balance_eligible(&config.extensions));
    }

    #[tokio::test]
    async fn unset_freeze_authority_is_not_gated() {
        let chain = MemoryChain::new();
        let ids = ProgramIds::default();
        let mint = chain.mint(
            &ids,
            MintFixture {
                freeze_authority: None,
                ..MintFixture::default()
            },
        );
        let config = resolve_mint_config(&chain, &ids, &mint).await.unwrap();
        assert!(!config.uses_enhanced_balance_gating);
        assert!(!config.extensions.defaults_to_frozen());
    }

    #[tokio::test]
    async fn wallet_without_ata_resolves_uninitialized_and_frozen() {
        let chain = MemoryChain::new();
        let ids = ProgramIds::default();
        let mint = chain.mint(&ids, MintFixture::frozen_default());
        let wallet = Pubkey::new_unique();
        let state = resolve_token_account(&chain, &ids, &wallet, &mint).await.unwrap();
        assert_eq!(
            state.token_account,
            associated_token_address(&wallet, &mint, &ids).unwrap()
        );
        assert_eq!(state.wallet, wallet);
        assert!(!state.is_initialized);
        assert!(state.is_frozen);
    }

    #[tokio::test]
    async fn wallet_with_ata_reads_real_state() {
        let chain = MemoryChain::new();
        let ids = ProgramIds::default();
        let mint = chain.mint(&ids, MintFixture::frozen_default());
        let wallet = Pubkey::new_unique();
        chain.system_account(wallet);
        let ata = chain.associated_token_account(&ids, &wallet, &mint, AccountState::Initialized);
        let state = resolve_token_account(&chain, &ids, &wallet, &mint).await.unwrap();
        assert_eq!(state.token_account, ata);
        assert!(state.is_initialized);
        assert!(!state.is_frozen);
    }

    #[tokio::test]
    async fn token_account_input_reports_its_owner() {
        let chain = MemoryChain::new();
        let ids = ProgramIds::default();
        let mint = chain.mint(&ids, MintFixture::frozen_default());
        let wallet = Pubkey::new_unique();
        let account = chain.token_account(&ids, &wallet, &mint, AccountState::Frozen);
        let state = resolve_token_account(&chain, &ids, &account, &mint).await.unwrap();
        assert_eq!(state.token_account, account);
        assert_eq!(state.wallet, wallet);
        assert!(state.is_frozen);
    }

    #[tokio::test]
    async fn token_account_of_other_mint_is_rejected() {
        let chain = MemoryChain::new();
        let ids = ProgramIds::default();
        let mint = chain.mint(&ids, MintFixture::default());
        let other = chain.mint(&ids, MintFixture::default());
        let account = chain.token_account(
            &ids,
            &Pubkey::new_unique(),
            &other,
            AccountState::Initialized,
        );
        let err = resolve_token_account(&chain, &ids, &account, &mint).await.unwrap_err();
        assert!(matches!(
            err,
            GateError::MintMismatch { expected, actual, .. } if expected == mint && actual == other
        ));
    }

    #[tokio::test]
    async fn program_owned_input_is_invalid() {
        let chain = MemoryChain::new();
        let ids = ProgramIds::default();
        let mint = chain.mint(&ids, MintFixture::default());
        let input = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        chain.set_account(input, owner, vec![1, 2, 3]);
        assert!(matches!(
            resolve_token_account(&chain, &ids, &input, &mint).await,
            Err(GateError::InvalidAccount { owner: o, .. }) if o == owner
        ));
    }

    #[tokio::test]
    async fn mint_details_include_metadata() {
        let chain = MemoryChain::new();
        let ids = ProgramIds::default();
        let mint = chain.mint(
            &ids,
            MintFixture {
                metadata: Some((
                    "Gate Dollar".into(),
                    "GUSD".into(),
                    "https://gusd.example".into(),
                )),
                ..MintFixture::frozen_default()
            },
        );
        let details = get_mint_details(&chain, &ids, &mint).await.unwrap();
        let metadata = details.metadata.unwrap();
        assert_eq!(metadata.symbol, "GUSD");
        assert_eq!(metadata.name, "Gate Dollar");
        assert!(details.config.extensions.has(ExtensionType::TokenMetadata));
    }
}
