use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;

/// Gating program that holds a mint's freeze authority and exposes
/// permissionless freeze/thaw.
pub const TOKEN_ACL_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("TACLgateVxcwrWVZweDCtZXhgsC7VLA6btymh3fSVip");

/// Allow/block list program consulted by the gating program.
pub const ACCESS_LIST_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("ABListsvSa8C2sUBR5TdoP3a781yTukcMkh5B85GvEA8");

/// Program ids threaded through every derivation, resolution and builder
/// call. Tests swap in arbitrary ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramIds {
    pub token_program: Pubkey,
    pub associated_token_program: Pubkey,
    pub system_program: Pubkey,
    pub token_acl_program: Pubkey,
    pub access_list_program: Pubkey,
}

impl Default for ProgramIds {
    fn default() -> Self {
        Self {
            token_program: spl_token_2022::id(),
            associated_token_program: spl_associated_token_account::id(),
            system_program: solana_system_interface::program::ID,
            token_acl_program: TOKEN_ACL_PROGRAM_ID,
            access_list_program: ACCESS_LIST_PROGRAM_ID,
        }
    }
}

impl ProgramIds {
    pub fn with_token_acl_program(mut self, program_id: Pubkey) -> Self {
        self.token_acl_program = program_id;
        self
    }

    pub fn with_access_list_program(mut self, program_id: Pubkey) -> Self {
        self.access_list_program = program_id;
        self
    }
}

/// Connection settings for [`crate::source::RpcAccountSource`].
#[derive(Debug, Clone)]
pub struct RpcSettings {
    pub url: String,
    pub commitment: CommitmentConfig,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            url: "https://api.devnet.solana.com".to_string(),
            commitment: CommitmentConfig::confirmed(),
        }
    }
}

impl RpcSettings {
    pub fn new(url: impl Into<String>, commitment: CommitmentConfig) -> Self {
        Self {
            url: url.into(),
            commitment,
        }
    }
}
