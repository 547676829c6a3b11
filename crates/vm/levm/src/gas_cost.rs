//! Gas schedule and the dynamic cost formulas that depend on it.
//!
//! Every fork is described by one [`GasSchedule`] value; nothing in the interpreter hardcodes a
//! gas constant so alternative rulesets only need a new table.

use crate::{
    constants::{MEMORY_EXPANSION_QUOTIENT, WORD_SIZE_IN_BYTES_U64},
    errors::{ExceptionalHalt, InternalError, VMError},
};
use txtrace_common::U256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasSchedule {
    pub zero: u64,
    pub jumpdest: u64,
    pub base: u64,
    pub very_low: u64,
    pub low: u64,
    pub mid: u64,
    pub high: u64,

    pub exp_static: u64,
    pub exp_per_byte: u64,
    pub keccak_static: u64,
    pub keccak_per_word: u64,
    pub copy_per_word: u64,
    pub memory_per_word: u64,
    pub blockhash: u64,

    pub log_static: u64,
    pub log_per_topic: u64,
    pub log_per_byte: u64,

    pub warm_access: u64,
    pub cold_account_access: u64,
    pub cold_sload: u64,

    pub sstore_set: u64,
    pub sstore_reset: u64,
    pub sstore_clears_refund: u64,
    pub sstore_stipend: u64,
    pub transient: u64,

    pub call_value: u64,
    pub call_stipend: u64,
    pub new_account: u64,

    pub create: u64,
    pub initcode_per_word: u64,
    pub code_deposit_per_byte: u64,
    pub selfdestruct: u64,

    pub tx_base: u64,
    pub tx_create: u64,
    pub tx_data_zero: u64,
    pub tx_data_non_zero: u64,
    /// EIP-7623 cost per calldata token; zero disables the calldata floor.
    pub tx_floor_per_token: u64,
    /// Non-zero calldata bytes count as this many tokens.
    pub tokens_per_non_zero_byte: u64,
    /// EIP-3529
    pub max_refund_quotient: u64,
}

impl GasSchedule {
    pub const CANCUN: Self = Self {
        zero: 0,
        jumpdest: 1,
        base: 2,
        very_low: 3,
        low: 5,
        mid: 8,
        high: 10,

        exp_static: 10,
        exp_per_byte: 50,
        keccak_static: 30,
        keccak_per_word: 6,
        copy_per_word: 3,
        memory_per_word: 3,
        blockhash: 20,

        log_static: 375,
        log_per_topic: 375,
        log_per_byte: 8,

        warm_access: 100,
        cold_account_access: 2600,
        cold_sload: 2100,

        sstore_set: 20000,
        sstore_reset: 2900,
        sstore_clears_refund: 4800,
        sstore_stipend: 2300,
        transient: 100,

        call_value: 9000,
        call_stipend: 2300,
        new_account: 25000,

        create: 32000,
        initcode_per_word: 2,
        code_deposit_per_byte: 200,
        selfdestruct: 5000,

        tx_base: 21000,
        tx_create: 32000,
        tx_data_zero: 4,
        tx_data_non_zero: 16,
        tx_floor_per_token: 0,
        tokens_per_non_zero_byte: 4,
        max_refund_quotient: 5,
    };

    pub const PRAGUE: Self = Self {
        tx_floor_per_token: 10,
        ..Self::CANCUN
    };
}

/// Memory expansion, as a function of the memory size before and after the access.
pub mod memory {
    use super::*;

    pub fn expansion_cost(
        schedule: &GasSchedule,
        new_memory_size: usize,
        current_memory_size: usize,
    ) -> Result<u64, VMError> {
        if new_memory_size <= current_memory_size {
            return Ok(0);
        }

        let new_cost = cost(schedule, new_memory_size)?;
        let current_cost = cost(schedule, current_memory_size)?;
        Ok(new_cost
            .checked_sub(current_cost)
            .ok_or(InternalError::Underflow)?)
    }

    fn cost(schedule: &GasSchedule, memory_size: usize) -> Result<u64, VMError> {
        let memory_size: u64 = memory_size
            .try_into()
            .map_err(|_| ExceptionalHalt::VeryLargeNumber)?;
        let words = memory_size.div_ceil(WORD_SIZE_IN_BYTES_U64);

        let quadratic = words
            .checked_mul(words)
            .ok_or(ExceptionalHalt::OutOfGas)?
            / MEMORY_EXPANSION_QUOTIENT;
        let linear = words
            .checked_mul(schedule.memory_per_word)
            .ok_or(ExceptionalHalt::OutOfGas)?;

        Ok(quadratic
            .checked_add(linear)
            .ok_or(ExceptionalHalt::OutOfGas)?)
    }
}

fn words(size: usize) -> Result<u64, VMError> {
    let size: u64 = size
        .try_into()
        .map_err(|_| ExceptionalHalt::VeryLargeNumber)?;
    Ok(size.div_ceil(WORD_SIZE_IN_BYTES_U64))
}

fn add_all(costs: &[u64]) -> Result<u64, VMError> {
    costs.iter().try_fold(0u64, |acc, cost| {
        acc.checked_add(*cost)
            .ok_or_else(|| ExceptionalHalt::OutOfGas.into())
    })
}

/// Cost of an opcode that copies `size` bytes after expanding memory.
pub fn copy(
    schedule: &GasSchedule,
    new_memory_size: usize,
    current_memory_size: usize,
    size: usize,
    static_cost: u64,
) -> Result<u64, VMError> {
    let copy_cost = words(size)?
        .checked_mul(schedule.copy_per_word)
        .ok_or(ExceptionalHalt::OutOfGas)?;
    let expansion = memory::expansion_cost(schedule, new_memory_size, current_memory_size)?;
    add_all(&[static_cost, copy_cost, expansion])
}

pub fn mem_access(
    schedule: &GasSchedule,
    new_memory_size: usize,
    current_memory_size: usize,
    static_cost: u64,
) -> Result<u64, VMError> {
    let expansion = memory::expansion_cost(schedule, new_memory_size, current_memory_size)?;
    add_all(&[static_cost, expansion])
}

pub fn exp(schedule: &GasSchedule, exponent: U256) -> Result<u64, VMError> {
    let exponent_bytes: u64 = exponent
        .bits()
        .div_ceil(8)
        .try_into()
        .map_err(|_| ExceptionalHalt::VeryLargeNumber)?;
    let dynamic = exponent_bytes
        .checked_mul(schedule.exp_per_byte)
        .ok_or(ExceptionalHalt::OutOfGas)?;
    add_all(&[schedule.exp_static, dynamic])
}

pub fn keccak256(
    schedule: &GasSchedule,
    new_memory_size: usize,
    current_memory_size: usize,
    size: usize,
) -> Result<u64, VMError> {
    let hashing = words(size)?
        .checked_mul(schedule.keccak_per_word)
        .ok_or(ExceptionalHalt::OutOfGas)?;
    let expansion = memory::expansion_cost(schedule, new_memory_size, current_memory_size)?;
    add_all(&[schedule.keccak_static, hashing, expansion])
}

pub fn log(
    schedule: &GasSchedule,
    new_memory_size: usize,
    current_memory_size: usize,
    size: usize,
    topics: u64,
) -> Result<u64, VMError> {
    let size: u64 = size
        .try_into()
        .map_err(|_| ExceptionalHalt::VeryLargeNumber)?;
    let data_cost = size
        .checked_mul(schedule.log_per_byte)
        .ok_or(ExceptionalHalt::OutOfGas)?;
    let topics_cost = topics
        .checked_mul(schedule.log_per_topic)
        .ok_or(ExceptionalHalt::OutOfGas)?;
    let expansion = memory::expansion_cost(schedule, new_memory_size, current_memory_size)?;
    add_all(&[schedule.log_static, topics_cost, data_cost, expansion])
}

/// EIP-2929 account access cost.
pub fn address_access(schedule: &GasSchedule, address_was_cold: bool) -> u64 {
    if address_was_cold {
        schedule.cold_account_access
    } else {
        schedule.warm_access
    }
}

pub fn sload(schedule: &GasSchedule, storage_slot_was_cold: bool) -> u64 {
    if storage_slot_was_cold {
        schedule.cold_sload
    } else {
        schedule.warm_access
    }
}

/// EIP-2200 / EIP-2929 SSTORE cost. Refund accounting happens in the opcode handler.
pub fn sstore(
    schedule: &GasSchedule,
    original_value: U256,
    current_value: U256,
    new_value: U256,
    storage_slot_was_cold: bool,
) -> Result<u64, VMError> {
    let base = if new_value == current_value || original_value != current_value {
        schedule.warm_access
    } else if original_value.is_zero() {
        schedule.sstore_set
    } else {
        schedule.sstore_reset
    };

    let cold = if storage_slot_was_cold {
        schedule.cold_sload
    } else {
        0
    };
    add_all(&[base, cold])
}

/// Refund delta produced by an SSTORE, following EIP-3529.
///
/// Returns `(to_add, to_remove)` so the caller can keep the counter unsigned.
pub fn sstore_refund(
    schedule: &GasSchedule,
    original_value: U256,
    current_value: U256,
    new_value: U256,
) -> Result<(u64, u64), VMError> {
    let mut to_add = 0u64;
    let mut to_remove = 0u64;

    if new_value == current_value {
        return Ok((0, 0));
    }

    if original_value == current_value {
        if !original_value.is_zero() && new_value.is_zero() {
            to_add = schedule.sstore_clears_refund;
        }
        return Ok((to_add, to_remove));
    }

    if !original_value.is_zero() {
        if current_value.is_zero() {
            to_remove = schedule.sstore_clears_refund;
        } else if new_value.is_zero() {
            to_add = schedule.sstore_clears_refund;
        }
    }

    if original_value == new_value {
        let restored = if original_value.is_zero() {
            schedule
                .sstore_set
                .checked_sub(schedule.warm_access)
                .ok_or(InternalError::Underflow)?
        } else {
            schedule
                .sstore_reset
                .checked_sub(schedule.warm_access)
                .ok_or(InternalError::Underflow)?
        };
        to_add = to_add.checked_add(restored).ok_or(InternalError::Overflow)?;
    }

    Ok((to_add, to_remove))
}

/// Returns the gas charged to the caller and the gas limit of the child frame.
///
/// The charged amount includes the forwarded gas; the child limit additionally includes the
/// stipend for value-bearing calls.
#[expect(clippy::too_many_arguments)]
pub fn call(
    schedule: &GasSchedule,
    retention_divisor: u64,
    new_memory_size: usize,
    current_memory_size: usize,
    address_was_cold: bool,
    address_is_empty: bool,
    value_to_transfer: U256,
    gas_from_stack: U256,
    gas_left: u64,
) -> Result<(u64, u64), VMError> {
    let expansion = memory::expansion_cost(schedule, new_memory_size, current_memory_size)?;
    let access = address_access(schedule, address_was_cold);
    let (value_cost, new_account_cost) = if value_to_transfer.is_zero() {
        (0, 0)
    } else if address_is_empty {
        (schedule.call_value, schedule.new_account)
    } else {
        (schedule.call_value, 0)
    };
    let static_costs = add_all(&[expansion, access, value_cost, new_account_cost])?;

    let stipend = if value_to_transfer.is_zero() {
        0
    } else {
        schedule.call_stipend
    };
    forwarded_gas(retention_divisor, gas_from_stack, gas_left, static_costs, stipend)
}

/// CALLCODE charges the value cost but never creates an account.
#[expect(clippy::too_many_arguments)]
pub fn callcode(
    schedule: &GasSchedule,
    retention_divisor: u64,
    new_memory_size: usize,
    current_memory_size: usize,
    address_was_cold: bool,
    value_to_transfer: U256,
    gas_from_stack: U256,
    gas_left: u64,
) -> Result<(u64, u64), VMError> {
    call(
        schedule,
        retention_divisor,
        new_memory_size,
        current_memory_size,
        address_was_cold,
        false,
        value_to_transfer,
        gas_from_stack,
        gas_left,
    )
}

/// Cost shared by DELEGATECALL and STATICCALL, which never move value.
pub fn valueless_call(
    schedule: &GasSchedule,
    retention_divisor: u64,
    new_memory_size: usize,
    current_memory_size: usize,
    address_was_cold: bool,
    gas_from_stack: U256,
    gas_left: u64,
) -> Result<(u64, u64), VMError> {
    call(
        schedule,
        retention_divisor,
        new_memory_size,
        current_memory_size,
        address_was_cold,
        false,
        U256::zero(),
        gas_from_stack,
        gas_left,
    )
}

fn forwarded_gas(
    retention_divisor: u64,
    gas_from_stack: U256,
    gas_left: u64,
    static_costs: u64,
    stipend: u64,
) -> Result<(u64, u64), VMError> {
    let available = gas_left
        .checked_sub(static_costs)
        .ok_or(ExceptionalHalt::OutOfGas)?;
    let max_forwardable = available
        .checked_sub(available / retention_divisor.max(1))
        .ok_or(InternalError::Underflow)?;
    let forwarded = if gas_from_stack < U256::from(max_forwardable) {
        gas_from_stack.low_u64()
    } else {
        max_forwardable
    };

    let charged = static_costs
        .checked_add(forwarded)
        .ok_or(ExceptionalHalt::OutOfGas)?;
    let child_gas_limit = forwarded
        .checked_add(stipend)
        .ok_or(ExceptionalHalt::OutOfGas)?;
    Ok((charged, child_gas_limit))
}

/// All but one retention-divisor-th of the gas left, as forwarded by CREATE and CREATE2.
pub fn max_message_call_gas(retention_divisor: u64, gas_left: u64) -> Result<u64, VMError> {
    Ok(gas_left
        .checked_sub(gas_left / retention_divisor.max(1))
        .ok_or(InternalError::Underflow)?)
}

/// CREATE and CREATE2 cost, excluding the gas forwarded to the init code.
pub fn create(
    schedule: &GasSchedule,
    new_memory_size: usize,
    current_memory_size: usize,
    code_size: usize,
    is_create2: bool,
) -> Result<u64, VMError> {
    let code_words = words(code_size)?;
    let initcode_cost = code_words
        .checked_mul(schedule.initcode_per_word)
        .ok_or(ExceptionalHalt::OutOfGas)?;
    let hashing_cost = if is_create2 {
        code_words
            .checked_mul(schedule.keccak_per_word)
            .ok_or(ExceptionalHalt::OutOfGas)?
    } else {
        0
    };
    let expansion = memory::expansion_cost(schedule, new_memory_size, current_memory_size)?;
    add_all(&[schedule.create, initcode_cost, hashing_cost, expansion])
}

pub fn selfdestruct(
    schedule: &GasSchedule,
    address_was_cold: bool,
    beneficiary_is_empty: bool,
    balance_to_transfer: U256,
) -> Result<u64, VMError> {
    let cold = if address_was_cold {
        schedule.cold_account_access
    } else {
        0
    };
    let new_account = if beneficiary_is_empty && !balance_to_transfer.is_zero() {
        schedule.new_account
    } else {
        0
    };
    add_all(&[schedule.selfdestruct, cold, new_account])
}

pub fn code_deposit(schedule: &GasSchedule, code_size: usize) -> Result<u64, VMError> {
    let code_size: u64 = code_size
        .try_into()
        .map_err(|_| ExceptionalHalt::VeryLargeNumber)?;
    Ok(code_size
        .checked_mul(schedule.code_deposit_per_byte)
        .ok_or(ExceptionalHalt::OutOfGas)?)
}

/// Intrinsic gas of a transaction and its EIP-7623 floor.
pub fn intrinsic_gas(
    schedule: &GasSchedule,
    calldata_zeros: u64,
    calldata_non_zeros: u64,
    is_create: bool,
    calldata_len: usize,
) -> Result<(u64, u64), VMError> {
    let zeros_cost = calldata_zeros
        .checked_mul(schedule.tx_data_zero)
        .ok_or(InternalError::Overflow)?;
    let non_zeros_cost = calldata_non_zeros
        .checked_mul(schedule.tx_data_non_zero)
        .ok_or(InternalError::Overflow)?;

    let create_cost = if is_create {
        let initcode_cost = words(calldata_len)?
            .checked_mul(schedule.initcode_per_word)
            .ok_or(InternalError::Overflow)?;
        schedule
            .tx_create
            .checked_add(initcode_cost)
            .ok_or(InternalError::Overflow)?
    } else {
        0
    };

    let intrinsic = [zeros_cost, non_zeros_cost, create_cost]
        .iter()
        .try_fold(schedule.tx_base, |acc, cost| acc.checked_add(*cost))
        .ok_or(InternalError::Overflow)?;

    let tokens = calldata_non_zeros
        .checked_mul(schedule.tokens_per_non_zero_byte)
        .and_then(|tokens| tokens.checked_add(calldata_zeros))
        .ok_or(InternalError::Overflow)?;
    let floor = tokens
        .checked_mul(schedule.tx_floor_per_token)
        .and_then(|floor| floor.checked_add(schedule.tx_base))
        .ok_or(InternalError::Overflow)?;

    Ok((intrinsic, floor))
}
