//! Transaction assembly and wire encodings.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::message::{v0, Message, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::signer::Signer;
use solana_sdk::transaction::VersionedTransaction;

use crate::error::{GateError, GateResult};
use crate::source::LifetimeAnchor;

/// Who authorizes an operation. Planning only ever needs the address;
/// submission needs a signer.
#[derive(Clone)]
pub enum Authority {
    Known(Pubkey),
    Capable(Arc<dyn Signer + Send + Sync>),
}

impl Authority {
    pub fn capable(signer: impl Signer + Send + Sync + 'static) -> Self {
        Authority::Capable(Arc::new(signer))
    }

    pub fn address(&self) -> Pubkey {
        match self {
            Authority::Known(address) => *address,
            Authority::Capable(signer) => signer.pubkey(),
        }
    }

    pub fn signer(&self) -> Option<&dyn Signer> {
        match self {
            Authority::Known(_) => None,
            Authority::Capable(signer) => {
                let signer: &dyn Signer = signer.as_ref();
                Some(signer)
            }
        }
    }
}

impl fmt::Debug for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authority::Known(address) => f.debug_tuple("Known").field(address).finish(),
            Authority::Capable(signer) => f.debug_tuple("Capable").field(&signer.pubkey()).finish(),
        }
    }
}

impl From<Pubkey> for Authority {
    fn from(address: Pubkey) -> Self {
        Authority::Known(address)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionVersion {
    #[default]
    Legacy,
    /// Version 0 message without address lookup tables.
    V0,
}

impl FromStr for TransactionVersion {
    type Err = GateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "legacy" => Ok(TransactionVersion::Legacy),
            "0" | "v0" => Ok(TransactionVersion::V0),
            _ => Err(GateError::InvalidArgument(format!(
                "Unknown transaction version: {}",
                value
            ))),
        }
    }
}

/// Unsigned transaction plus the block height after which its blockhash
/// expires. The height is not part of the wire format and is lost on
/// decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateTransaction {
    pub transaction: VersionedTransaction,
    pub last_valid_block_height: Option<u64>,
}

/// Compile `instructions` into an unsigned transaction. Instruction order is
/// preserved.
pub fn assemble_transaction(
    fee_payer: &Pubkey,
    instructions: &[Instruction],
    anchor: &LifetimeAnchor,
    version: TransactionVersion,
) -> GateResult<GateTransaction> {
    let message = match version {
        TransactionVersion::Legacy => VersionedMessage::Legacy(Message::new_with_blockhash(
            instructions,
            Some(fee_payer),
            &anchor.blockhash,
        )),
        TransactionVersion::V0 => VersionedMessage::V0(
            v0::Message::try_compile(fee_payer, instructions, &[], anchor.blockhash)
                .map_err(|err| GateError::Encoding(err.to_string()))?,
        ),
    };
    let required = usize::from(message.header().num_required_signatures);
    Ok(GateTransaction {
        transaction: VersionedTransaction {
            signatures: vec![Signature::default(); required],
            message,
        },
        last_valid_block_height: Some(anchor.last_valid_block_height),
    })
}

impl GateTransaction {
    pub fn fee_payer(&self) -> Option<Pubkey> {
        self.transaction.message.static_account_keys().first().copied()
    }

    pub fn version(&self) -> TransactionVersion {
        match self.transaction.message {
            VersionedMessage::Legacy(_) => TransactionVersion::Legacy,
            VersionedMessage::V0(_) => TransactionVersion::V0,
        }
    }

    /// Addresses that must sign, fee payer first.
    pub fn required_signers(&self) -> &[Pubkey] {
        let message = &self.transaction.message;
        let required = usize::from(message.header().num_required_signatures);
        let keys = message.static_account_keys();
        &keys[..required.min(keys.len())]
    }

    /// Rebuild instructions from the compiled message. Account flags come
    /// from the message header, so an account used with different
    /// privileges by two instructions reports the higher one in both.
    pub fn instructions(&self) -> GateResult<Vec<Instruction>> {
        let message = &self.transaction.message;
        let keys = message.static_account_keys();
        let header = message.header();
        let signed = usize::from(header.num_required_signatures);
        let readonly_signed = usize::from(header.num_readonly_signed_accounts);
        let readonly_unsigned = usize::from(header.num_readonly_unsigned_accounts);

        let key_at = |index: u8| {
            keys.get(usize::from(index)).copied().ok_or_else(|| {
                GateError::Encoding(format!("account index {} out of range", index))
            })
        };
        let meta_at = |index: u8| -> GateResult<AccountMeta> {
            let pubkey = key_at(index)?;
            let position = usize::from(index);
            let is_signer = position < signed;
            let is_writable = if is_signer {
                position < signed.saturating_sub(readonly_signed)
            } else {
                position < keys.len().saturating_sub(readonly_unsigned)
            };
            Ok(AccountMeta {
                pubkey,
                is_signer,
                is_writable,
            })
        };

        message
            .instructions()
            .iter()
            .map(|compiled| {
                Ok(Instruction {
                    program_id: key_at(compiled.program_id_index)?,
                    accounts: compiled
                        .accounts
                        .iter()
                        .map(|index| meta_at(*index))
                        .collect::<GateResult<Vec<_>>>()?,
                    data: compiled.data.clone(),
                })
            })
            .collect()
    }

    pub fn to_bytes(&self) -> GateResult<Vec<u8>> {
        Ok(bincode::serialize(&self.transaction)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> GateResult<Self> {
        let transaction: VersionedTransaction = bincode::deserialize(bytes)?;
        Ok(Self {
            transaction,
            last_valid_block_height: None,
        })
    }

    pub fn to_base58(&self) -> GateResult<String> {
        Ok(bs58::encode(self.to_bytes()?).into_string())
    }

    pub fn from_base58(encoded: &str) -> GateResult<Self> {
        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|err| GateError::Encoding(err.to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub fn to_base64(&self) -> GateResult<String> {
        Ok(BASE64.encode(self.to_bytes()?))
    }

    pub fn from_base64(encoded: &str) -> GateResult<Self> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|err| GateError::Encoding(err.to_string()))?;
        Self::from_bytes(&bytes)
    }
}
