use crate::{
    constants::{
        CALL_GAS_RETENTION_DIVISOR, INIT_CODE_MAX_SIZE, MAX_CALL_DEPTH, MAX_CODE_SIZE,
    },
    gas_cost::GasSchedule,
};
use serde::Deserialize;
use txtrace_common::{Address, H160, H256, U256, serde_utils};

/// Protocol upgrades the interpreter knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Fork {
    Cancun,
    #[default]
    Prague,
}

/// Parameters of an OP-Stack chain that affect execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpStackRules {
    /// Predeploy holding the L1 fee parameters.
    pub l1_block_contract: Address,
    pub base_fee_vault: Address,
    pub l1_fee_vault: Address,
    /// Sender of system deposit transactions.
    pub depositor: Address,
    /// Fixed overhead added to the calldata cost, standing in for the signature bytes.
    pub l1_gas_overhead: u64,
}

impl OpStackRules {
    /// Predeploys and parameters used with the Ecotone L1 fee formula.
    pub const ECOTONE: Self = Self {
        l1_block_contract: H160([
            0x42, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x15,
        ]),
        base_fee_vault: H160([
            0x42, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x19,
        ]),
        l1_fee_vault: H160([
            0x42, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x1a,
        ]),
        depositor: H160([
            0xde, 0xad, 0xde, 0xad, 0xde, 0xad, 0xde, 0xad, 0xde, 0xad, 0xde, 0xad, 0xde, 0xad,
            0xde, 0xad, 0xde, 0xad, 0, 0x01,
        ]),
        l1_gas_overhead: 1088,
    };

    /// Whether `address` lies in the `0x4200…0000`–`0x4200…07ff` predeploy range.
    pub fn is_predeploy(address: &Address) -> bool {
        let bytes = address.as_bytes();
        bytes.first() == Some(&0x42)
            && bytes.get(1..18).is_some_and(|middle| middle.iter().all(|b| *b == 0))
            && bytes.get(18).is_some_and(|b| *b < 0x08)
    }
}

/// Specifies whether the VM runs a plain Ethereum chain or an OP-Stack rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VMType {
    #[default]
    L1,
    OpStack(OpStackRules),
}

/// Everything that varies between chains and protocol versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainRuleset {
    pub fork: Fork,
    pub gas: &'static GasSchedule,
    /// A call keeps `1 / call_gas_retention_divisor` of the available gas for itself.
    pub call_gas_retention_divisor: u64,
    pub max_call_depth: usize,
    pub max_code_size: usize,
    pub max_initcode_size: usize,
    /// Highest precompile address (`0x01..=last_precompile`).
    pub last_precompile: u64,
    pub vm_type: VMType,
}

impl ChainRuleset {
    pub fn for_fork(fork: Fork, vm_type: VMType) -> Self {
        let (gas, last_precompile) = match fork {
            Fork::Cancun => (&GasSchedule::CANCUN, 0x0a),
            Fork::Prague => (&GasSchedule::PRAGUE, 0x11),
        };
        Self {
            fork,
            gas,
            call_gas_retention_divisor: CALL_GAS_RETENTION_DIVISOR,
            max_call_depth: MAX_CALL_DEPTH,
            max_code_size: MAX_CODE_SIZE,
            max_initcode_size: INIT_CODE_MAX_SIZE,
            last_precompile,
            vm_type,
        }
    }

    pub fn is_op_stack(&self) -> bool {
        matches!(self.vm_type, VMType::OpStack(_))
    }
}

impl Default for ChainRuleset {
    fn default() -> Self {
        Self::for_fork(Fork::default(), VMType::L1)
    }
}

/// L1 fee parameters supplied with the block, overriding the L1Block predeploy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L1FeeOverrides {
    #[serde(default, deserialize_with = "serde_utils::u256::quantity::deserialize_opt")]
    pub l1_base_fee: Option<U256>,
    #[serde(default, deserialize_with = "serde_utils::u256::quantity::deserialize_opt")]
    pub l1_blob_base_fee: Option<U256>,
    #[serde(
        default,
        rename = "l1BaseFeeScalar",
        deserialize_with = "serde_utils::u256::quantity::deserialize_opt"
    )]
    pub base_fee_scalar: Option<U256>,
    #[serde(
        default,
        rename = "l1BlobBaseFeeScalar",
        deserialize_with = "serde_utils::u256::quantity::deserialize_opt"
    )]
    pub blob_base_fee_scalar: Option<U256>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Block and transaction context the VM runs in.
pub struct Environment {
    /// The sender address of the external transaction.
    pub origin: Address,
    /// Gas limit of the Transaction
    pub gas_limit: u64,
    pub ruleset: ChainRuleset,
    pub block_number: U256,
    /// Coinbase is the block's beneficiary - the address that receives the block rewards (priority fees).
    pub coinbase: Address,
    pub timestamp: U256,
    pub prev_randao: Option<H256>,
    pub difficulty: U256,
    pub chain_id: U256,
    pub base_fee_per_gas: U256,
    pub base_blob_fee_per_gas: U256,
    /// Effective price per unit of gas paid by the sender.
    pub gas_price: U256,
    pub tx_max_priority_fee_per_gas: U256,
    pub tx_max_fee_per_gas: U256,
    pub tx_nonce: u64,
    pub block_gas_limit: u64,
    /// OP-Stack system deposit: skips nonce and fee checks and pays no fees.
    pub is_privileged: bool,
    pub l1_fee_overrides: L1FeeOverrides,
}
