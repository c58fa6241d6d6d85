//! Signing, submission and simulation of assembled transactions.

use async_trait::async_trait;
use solana_client::rpc_config::RpcSimulateTransactionConfig;
use solana_sdk::signature::Signature;
use solana_sdk::signer::Signer;
use solana_sdk::transaction::VersionedTransaction;
use tracing::debug;

use crate::error::{GateError, GateResult};
use crate::source::RpcAccountSource;
use crate::transaction::{Authority, GateTransaction};

/// Outcome of a successful simulation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Simulation {
    pub logs: Vec<String>,
    pub units_consumed: Option<u64>,
}

#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    /// Send a signed transaction and wait for confirmation.
    async fn send(&self, transaction: &VersionedTransaction) -> GateResult<Signature>;

    /// Simulate without signature verification. A failed simulation is a
    /// [`GateError::Transaction`] carrying the program logs.
    async fn simulate(&self, transaction: &VersionedTransaction) -> GateResult<Simulation>;
}

/// Sign with every `Capable` authority whose address the message requires.
pub fn sign_transaction(
    transaction: &GateTransaction,
    authorities: &[Authority],
) -> GateResult<VersionedTransaction> {
    let mut signers: Vec<&dyn Signer> = Vec::new();
    for required in transaction.required_signers() {
        let signer = authorities
            .iter()
            .filter(|authority| authority.address() == *required)
            .find_map(Authority::signer)
            .ok_or(GateError::MissingSigner(*required))?;
        signers.push(signer);
    }
    VersionedTransaction::try_new(transaction.transaction.message.clone(), &signers).map_err(|err| {
        GateError::Transaction {
            message: err.to_string(),
            logs: Vec::new(),
        }
    })
}

pub async fn submit_transaction(
    submitter: &dyn TransactionSubmitter,
    transaction: &GateTransaction,
    authorities: &[Authority],
) -> GateResult<Signature> {
    let signed = sign_transaction(transaction, authorities)?;
    let signature = submitter.send(&signed).await?;
    debug!(%signature, "transaction confirmed");
    Ok(signature)
}

pub async fn simulate_transaction(
    submitter: &dyn TransactionSubmitter,
    transaction: &GateTransaction,
) -> GateResult<Simulation> {
    submitter.simulate(&transaction.transaction).await
}

#[async_trait]
impl TransactionSubmitter for RpcAccountSource {
    async fn send(&self, transaction: &VersionedTransaction) -> GateResult<Signature> {
        Ok(self.client().send_and_confirm_transaction(transaction).await?)
    }

    async fn simulate(&self, transaction: &VersionedTransaction) -> GateResult<Simulation> {
        let config = RpcSimulateTransactionConfig {
            sig_verify: false,
            replace_recent_blockhash: true,
            commitment: Some(self.commitment()),
            ..RpcSimulateTransactionConfig::default()
        };
        let result = self
            .client()
            .simulate_transaction_with_config(transaction, config)
            .await?
            .value;
        let logs = result.logs.unwrap_or_default();
        if let Some(err) = result.err {
            return Err(GateError::Transaction {
                message: err.to_string(),
                logs,
            });
        }
        Ok(Simulation {
            logs,
            units_consumed: result.units_consumed,
        })
    }
}
