use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::rpc_request::{RpcError, RpcResponseErrorData};
use solana_sdk::program_error::ProgramError;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::programs::access_list::ListMode;

#[derive(Error, Debug)]
pub enum GateError {
    #[error("Account not found: {0}")]
    NotFound(Pubkey),

    /// The account exists but its owner or layout is not one we recognize.
    #[error("Unrecognized account {address}: {reason}")]
    Parse { address: Pubkey, reason: String },

    #[error("Failed to decode account {address}: {reason}")]
    Decode { address: Pubkey, reason: String },

    #[error("Token account {account} belongs to mint {actual}, expected {expected}")]
    MintMismatch {
        account: Pubkey,
        expected: Pubkey,
        actual: Pubkey,
    },

    #[error("Account {address} is owned by {owner}, which is neither the token program nor the system program")]
    InvalidAccount { address: Pubkey, owner: Pubkey },

    #[error("List {list} is in {actual} mode, operation requires {expected} mode")]
    WrongListMode {
        list: Pubkey,
        expected: ListMode,
        actual: ListMode,
    },

    #[error("RPC request failed: {0}")]
    AccountFetch(String),

    #[error("Invalid seed: {0}")]
    InvalidSeed(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to build instruction: {0}")]
    Instruction(String),

    #[error("Transaction encoding error: {0}")]
    Encoding(String),

    #[error("Authority {0} is address-only and cannot sign")]
    MissingSigner(Pubkey),

    #[error("Transaction failed: {message}")]
    Transaction { message: String, logs: Vec<String> },
}

impl GateError {
    pub(crate) fn decode(address: &Pubkey, reason: impl ToString) -> Self {
        GateError::Decode {
            address: *address,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn parse(address: &Pubkey, reason: impl ToString) -> Self {
        GateError::Parse {
            address: *address,
            reason: reason.to_string(),
        }
    }

    /// Program log lines carried by a failed simulation or preflight.
    pub fn logs(&self) -> &[String] {
        match self {
            GateError::Transaction { logs, .. } => logs,
            _ => &[],
        }
    }
}

impl From<ClientError> for GateError {
    fn from(err: ClientError) -> Self {
        if let ClientErrorKind::RpcError(RpcError::RpcResponseError {
            data: RpcResponseErrorData::SendTransactionPreflightFailure(result),
            ..
        }) = err.kind()
        {
            return GateError::Transaction {
                message: err.to_string(),
                logs: result.logs.clone().unwrap_or_default(),
            };
        }
        GateError::AccountFetch(err.to_string())
    }
}

impl From<ProgramError> for GateError {
    fn from(err: ProgramError) -> Self {
        GateError::Instruction(err.to_string())
    }
}

impl From<std::io::Error> for GateError {
    fn from(err: std::io::Error) -> Self {
        GateError::Instruction(err.to_string())
    }
}

impl From<bincode::Error> for GateError {
    fn from(err: bincode::Error) -> Self {
        GateError::Encoding(err.to_string())
    }
}

pub type GateResult<T> = Result<T, GateError>;
