use crate::errors::TraceError;
use serde::Deserialize;
use serde_json::Value;
use txtrace_common::{
    Address, U256,
    serde_utils::{self, parse_address, parse_hex_bytes},
    types::{Transaction, TxKind},
};
use txtrace_levm::environment::{OpStackRules, VMType};

/// Everything needed to trace one transaction.
///
/// Addresses and calldata stay as text until [`TransactionBuilder`] validates them, so that a
/// malformed field becomes a structured error instead of a deserialization failure.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceRequest {
    pub chain_id: u64,
    pub from: String,
    /// Empty, `"0x"` or absent for a contract creation.
    #[serde(default)]
    pub to: Option<String>,
    pub nonce: u64,
    #[serde(default)]
    pub data: String,
    #[serde(default, deserialize_with = "serde_utils::u256::quantity::deserialize")]
    pub value: U256,
    pub gas_limit: u64,
    /// Fee cap per unit of gas.
    #[serde(deserialize_with = "serde_utils::u256::quantity::deserialize")]
    pub gas_price: U256,
    #[serde(default, deserialize_with = "serde_utils::u256::quantity::deserialize")]
    pub gas_priority_fee: U256,
    pub block_env: Value,
    pub prestate: Value,
    #[serde(default)]
    pub op_stack: bool,
}

/// Turns the flat request fields into a [`Transaction`].
///
/// Only the shape of the fields is checked here. Nonce, balance, fee and intrinsic gas checks
/// need the world state and run inside the VM before anything is modified.
pub struct TransactionBuilder;

impl TransactionBuilder {
    pub fn build(request: &TraceRequest) -> Result<Transaction, TraceError> {
        let sender = parse_address(&request.from)
            .map_err(|e| TraceError::MalformedTransaction(format!("`from`: {e}")))?;
        let to = Self::parse_to(request.to.as_deref())?;
        let data = parse_hex_bytes(&request.data)
            .map_err(|e| TraceError::MalformedTransaction(format!("`data`: {e}")))?;

        Ok(Transaction {
            chain_id: request.chain_id,
            sender,
            nonce: request.nonce,
            to,
            value: request.value,
            data,
            gas_limit: request.gas_limit,
            max_fee_per_gas: Self::fee(request.gas_price, "gasPrice")?,
            max_priority_fee_per_gas: Self::fee(request.gas_priority_fee, "gasPriorityFee")?,
        })
    }

    fn parse_to(to: Option<&str>) -> Result<TxKind, TraceError> {
        match to.map(str::trim) {
            None | Some("") | Some("0x") | Some("0X") => Ok(TxKind::Create),
            Some(text) => parse_address(text)
                .map(TxKind::Call)
                .map_err(|e| TraceError::MalformedTransaction(format!("`to`: {e}"))),
        }
    }

    fn fee(value: U256, field: &str) -> Result<u128, TraceError> {
        u128::try_from(value).map_err(|_| {
            TraceError::MalformedTransaction(format!("`{field}` {value} does not fit in 128 bits"))
        })
    }

    /// Whether the transaction is an OP-Stack system deposit: sent by the depositor account to a
    /// predeploy.
    pub fn is_system_deposit(tx: &Transaction, vm_type: &VMType) -> bool {
        let VMType::OpStack(rules) = vm_type else {
            return false;
        };
        tx.sender == rules.depositor
            && tx
                .to
                .to()
                .is_some_and(|to: Address| OpStackRules::is_predeploy(&to))
    }
}
