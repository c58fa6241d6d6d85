//! Token access-gate SDK.
//!
//! Composes transactions that manage allow/block lists and freeze state for
//! Token-2022 mints, either through the gating program's permissionless
//! freeze/thaw or directly through the mint's freeze authority.
//!
//! - [`pda`]: address derivation
//! - [`resolver`]: mint and token account state
//! - [`lists`]: list instructions and queries
//! - [`access`]: grant/revoke planning
//! - [`transaction`], [`builders`], [`submit`]: assembly, encoding and sending
pub mod access;
pub mod builders;
pub mod config;
pub mod error;
pub mod lists;
pub mod mint;
pub mod pda;
pub mod programs;
pub mod resolver;
pub mod source;
pub mod submit;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod transaction;

pub use access::{
    add_to_allowlist, add_to_blocklist, plan_access, remove_from_allowlist, remove_from_blocklist,
    AccessAction, AccessPath, AccessPlan, AccessRequest,
};
pub use builders::TransactionBuilder;
pub use config::{ProgramIds, RpcSettings, ACCESS_LIST_PROGRAM_ID, TOKEN_ACL_PROGRAM_ID};
pub use error::{GateError, GateResult};
pub use lists::List;
pub use mint::{CreateMintParams, MetadataExtension, MintExtensions, MintToParams};
pub use programs::access_list::{ListConfig, ListMode, WalletEntry};
pub use programs::token_acl::GateMintConfig;
pub use resolver::{
    get_mint_details, resolve_mint_config, resolve_token_account, MintConfig, MintDetails,
    TokenAccountState,
};
pub use source::{AccountFilter, AccountSource, LifetimeAnchor, RpcAccountSource};
pub use submit::{simulate_transaction, submit_transaction, Simulation, TransactionSubmitter};
pub use transaction::{assemble_transaction, Authority, GateTransaction, TransactionVersion};
