//! Network collaborator. Everything the resolver, list manager and
//! orchestrator learn about chain state comes through [`AccountSource`].

use std::sync::Arc;

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig};
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_sdk::account::Account;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::config::RpcSettings;
use crate::error::GateResult;

/// Server-side filter for program account scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountFilter {
    DataSize(u64),
    Memcmp { offset: usize, bytes: Vec<u8> },
}

impl AccountFilter {
    pub fn memcmp(offset: usize, bytes: impl AsRef<[u8]>) -> Self {
        AccountFilter::Memcmp {
            offset,
            bytes: bytes.as_ref().to_vec(),
        }
    }

    pub fn matches(&self, data: &[u8]) -> bool {
        match self {
            AccountFilter::DataSize(size) => data.len() as u64 == *size,
            AccountFilter::Memcmp { offset, bytes } => data
                .get(*offset..offset.saturating_add(bytes.len()))
                .is_some_and(|window| window == bytes.as_slice()),
        }
    }

    fn to_rpc(&self) -> RpcFilterType {
        match self {
            AccountFilter::DataSize(size) => RpcFilterType::DataSize(*size),
            AccountFilter::Memcmp { offset, bytes } => {
                RpcFilterType::Memcmp(Memcmp::new_base58_encoded(*offset, bytes))
            }
        }
    }
}

/// Recent blockhash plus the last block height at which it is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifetimeAnchor {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

#[async_trait]
pub trait AccountSource: Send + Sync {
    /// `Ok(None)` when the account does not exist.
    async fn get_account(&self, address: &Pubkey) -> GateResult<Option<Account>>;

    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: &[AccountFilter],
    ) -> GateResult<Vec<(Pubkey, Account)>>;

    async fn latest_lifetime_anchor(&self) -> GateResult<LifetimeAnchor>;

    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> GateResult<u64>;
}

/// [`AccountSource`] backed by a JSON-RPC node.
#[derive(Clone)]
pub struct RpcAccountSource {
    client: Arc<RpcClient>,
    commitment: CommitmentConfig,
}

impl RpcAccountSource {
    pub fn new(settings: &RpcSettings) -> Self {
        let client = RpcClient::new_with_commitment(settings.url.clone(), settings.commitment);
        Self {
            client: Arc::new(client),
            commitment: settings.commitment,
        }
    }

    pub fn from_client(client: Arc<RpcClient>) -> Self {
        let commitment = client.commitment();
        Self { client, commitment }
    }

    pub fn client(&self) -> &Arc<RpcClient> {
        &self.client
    }

    pub fn commitment(&self) -> CommitmentConfig {
        self.commitment
    }
}

#[async_trait]
impl AccountSource for RpcAccountSource {
    async fn get_account(&self, address: &Pubkey) -> GateResult<Option<Account>> {
        debug!(%address, "getAccountInfo");
        let response = self
            .client
            .get_account_with_commitment(address, self.commitment)
            .await?;
        Ok(response.value)
    }

    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: &[AccountFilter],
    ) -> GateResult<Vec<(Pubkey, Account)>> {
        debug!(%program_id, filters = filters.len(), "getProgramAccounts");
        let mut config = RpcProgramAccountsConfig::default();
        config.filters = Some(filters.iter().map(AccountFilter::to_rpc).collect());
        config.account_config = RpcAccountInfoConfig {
            encoding: None,
            commitment: Some(self.commitment),
            data_slice: None,
            min_context_slot: None,
        };
        let accounts = self
            .client
            .get_program_accounts_with_config(program_id, config)
            .await?;
        debug!(%program_id, found = accounts.len(), "getProgramAccounts done");
        Ok(accounts)
    }

    async fn latest_lifetime_anchor(&self) -> GateResult<LifetimeAnchor> {
        let (blockhash, last_valid_block_height) = self
            .client
            .get_latest_blockhash_with_commitment(self.commitment)
            .await?;
        debug!(%blockhash, last_valid_block_height, "latest blockhash");
        Ok(LifetimeAnchor {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> GateResult<u64> {
        Ok(self
            .client
            .get_minimum_balance_for_rent_exemption(data_len)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memcmp_filter_compares_window() {
        let filter = AccountFilter::memcmp(2, [7u8, 8]);
        assert!(filter.matches(&[0, 0, 7, 8, 0]));
        assert!(!filter.matches(&[0, 0, 7, 9, 0]));
        assert!(!filter.matches(&[0, 0, 7]));
    }

    #[test]
    fn data_size_filter_is_exact() {
        let filter = AccountFilter::DataSize(3);
        assert!(filter.matches(&[1, 2, 3]));
        assert!(!filter.matches(&[1, 2]));
    }
}
