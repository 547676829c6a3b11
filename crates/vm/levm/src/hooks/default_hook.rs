use crate::{
    errors::{ContextResult, InternalError, TxValidationError, VMError},
    hooks::hook::Hook,
    utils::effective_gas_price,
    vm::VM,
};
use txtrace_common::{
    Address, H256, U256,
    types::{Account, Code},
};

/// Fee handling of a plain Ethereum chain: the base fee is burned and the coinbase collects the
/// priority fee.
pub struct DefaultHook;

impl Hook for DefaultHook {
    fn prepare_execution(&mut self, vm: &mut VM<'_>) -> Result<(), VMError> {
        prepare_execution_with_surcharge(vm, U256::zero())
    }

    fn finalize_execution(
        &mut self,
        vm: &mut VM<'_>,
        ctx_result: &mut ContextResult,
    ) -> Result<(), VMError> {
        let gas_refunded = compute_gas_refunded(vm, ctx_result)?;
        let gas_spent = refund_sender(vm, ctx_result, gas_refunded)?;

        pay_coinbase(vm, gas_spent)?;

        delete_self_destruct_accounts(vm, ctx_result);

        Ok(())
    }
}

/// Validates the transaction and charges the sender for its whole gas limit.
///
/// `surcharge` is an extra amount the sender must be able to pay on top of value and gas, such
/// as an L1 data fee. It is only checked here; collecting it is up to the caller.
pub fn prepare_execution_with_surcharge(
    vm: &mut VM<'_>,
    surcharge: U256,
) -> Result<(), VMError> {
    let sender_address = vm.env.origin;
    let sender_info = vm.db.get_account(sender_address).info;

    vm.env.gas_price = if vm.env.is_privileged {
        U256::zero()
    } else {
        validate_fee_caps(vm)?
    };

    let intrinsic_gas = validate_min_gas_limit(vm)?;

    if vm.tx.is_create() {
        validate_init_code_size(vm)?;
    }

    if sender_info.nonce == u64::MAX {
        return Err(TxValidationError::NonceIsMax.into());
    }
    if !vm.env.is_privileged && sender_info.nonce != vm.env.tx_nonce {
        return Err(TxValidationError::NonceMismatch {
            expected: sender_info.nonce,
            actual: vm.env.tx_nonce,
        }
        .into());
    }

    validate_sender_balance(vm, sender_info.balance, surcharge)?;

    // Nothing above touched the world state; from here on it is modified.
    let gas_limit_price_product = vm
        .env
        .gas_price
        .checked_mul(U256::from(vm.env.gas_limit))
        .ok_or(InternalError::Overflow)?;
    vm.decrease_account_balance(sender_address, gas_limit_price_product)?;
    vm.increment_account_nonce(sender_address)?;

    let gas_limit = vm.env.gas_limit;
    vm.current_call_frame
        .increase_consumed_gas(intrinsic_gas)
        .map_err(|_| TxValidationError::IntrinsicGasTooLow {
            gas_limit,
            required: intrinsic_gas,
        })?;

    set_bytecode_and_code_address(vm);

    Ok(())
}

/// Checks the fee caps against the block and returns the effective gas price.
fn validate_fee_caps(vm: &VM<'_>) -> Result<U256, VMError> {
    let env = &vm.env;
    if env.tx_max_priority_fee_per_gas > env.tx_max_fee_per_gas {
        return Err(TxValidationError::PriorityGreaterThanMaxFeePerGas {
            priority_fee: env.tx_max_priority_fee_per_gas,
            max_fee_per_gas: env.tx_max_fee_per_gas,
        }
        .into());
    }
    effective_gas_price(
        env.tx_max_fee_per_gas,
        env.tx_max_priority_fee_per_gas,
        env.base_fee_per_gas,
    )
}

/// The gas limit has to cover both the intrinsic gas and the calldata floor (EIP-7623).
/// Returns the intrinsic gas.
fn validate_min_gas_limit(vm: &VM<'_>) -> Result<u64, VMError> {
    let (intrinsic_gas, floor) = vm.get_intrinsic_gas()?;
    let required = intrinsic_gas.max(floor);
    if vm.env.gas_limit < required {
        return Err(TxValidationError::IntrinsicGasTooLow {
            gas_limit: vm.env.gas_limit,
            required,
        }
        .into());
    }
    Ok(intrinsic_gas)
}

/// [EIP-3860]
fn validate_init_code_size(vm: &VM<'_>) -> Result<(), VMError> {
    let size = vm.tx.data.len();
    let max = vm.env.ruleset.max_initcode_size;
    if size > max {
        return Err(TxValidationError::InitcodeSizeExceeded { size, max }.into());
    }
    Ok(())
}

/// The sender must afford the value plus the gas limit at the fee cap, plus `surcharge`.
fn validate_sender_balance(
    vm: &VM<'_>,
    sender_balance: U256,
    surcharge: U256,
) -> Result<(), VMError> {
    let fee_cap = if vm.env.is_privileged {
        U256::zero()
    } else {
        vm.env.tx_max_fee_per_gas
    };

    let upfront_cost = fee_cap
        .checked_mul(U256::from(vm.env.gas_limit))
        .and_then(|gas_cost| gas_cost.checked_add(vm.current_call_frame.msg_value))
        .and_then(|cost| cost.checked_add(surcharge));

    match upfront_cost {
        Some(upfront_cost) if upfront_cost <= sender_balance => Ok(()),
        upfront_cost => Err(TxValidationError::InsufficientAccountFunds {
            balance: sender_balance,
            upfront_cost: upfront_cost.unwrap_or(U256::MAX),
        }
        .into()),
    }
}

fn set_bytecode_and_code_address(vm: &mut VM<'_>) {
    let to = vm.current_call_frame.to;
    let code = if vm.tx.is_create() {
        Code::from_bytecode_unchecked(vm.tx.data.clone(), H256::zero())
    } else {
        vm.db.get_account(to).code.clone()
    };
    vm.current_call_frame.set_code(code);
    vm.current_call_frame.code_address = to;
}

/// [EIP-3529] Refunds are capped at a fifth of the gas used.
pub fn compute_gas_refunded(vm: &VM<'_>, ctx_result: &ContextResult) -> Result<u64, VMError> {
    let cap = ctx_result
        .gas_used
        .checked_div(vm.env.ruleset.gas.max_refund_quotient)
        .ok_or(InternalError::DivisionByZero)?;
    Ok(vm.substate.refunded_gas.min(cap))
}

/// Returns the unused gas to the sender and sets the gas used of the result to the gas actually
/// charged, which is never below the calldata floor. Returns that amount.
pub fn refund_sender(
    vm: &mut VM<'_>,
    ctx_result: &mut ContextResult,
    refunded_gas: u64,
) -> Result<u64, VMError> {
    let (_, floor) = vm.get_intrinsic_gas()?;

    let gas_spent = ctx_result
        .gas_used
        .checked_sub(refunded_gas)
        .ok_or(InternalError::Underflow)?
        .max(floor);
    ctx_result.gas_used = gas_spent;

    let gas_to_return = vm
        .env
        .gas_limit
        .checked_sub(gas_spent)
        .ok_or(InternalError::Underflow)?;
    let wei_return_amount = vm
        .env
        .gas_price
        .checked_mul(U256::from(gas_to_return))
        .ok_or(InternalError::Overflow)?;

    vm.increase_account_balance(vm.env.origin, wei_return_amount)?;

    Ok(gas_spent)
}

/// Credits the coinbase with the priority fee of every unit of gas spent. The coinbase is touched
/// even when the tip is zero.
pub fn pay_coinbase(vm: &mut VM<'_>, gas_spent: u64) -> Result<(), VMError> {
    if vm.env.is_privileged {
        return Ok(());
    }

    let priority_fee_per_gas = vm
        .env
        .gas_price
        .checked_sub(vm.env.base_fee_per_gas)
        .ok_or(InternalError::Underflow)?;
    let coinbase_fee = U256::from(gas_spent)
        .checked_mul(priority_fee_per_gas)
        .ok_or(InternalError::Overflow)?;

    vm.increase_account_balance(vm.env.coinbase, coinbase_fee)
}

/// [EIP-6780] Accounts created and destroyed in the same transaction are removed, as long as the
/// transaction succeeded.
pub fn delete_self_destruct_accounts(vm: &mut VM<'_>, ctx_result: &ContextResult) {
    if !ctx_result.is_success() {
        return;
    }

    let destroyed: Vec<Address> = vm.substate.iter_selfdestruct().copied().collect();
    for address in destroyed {
        *vm.get_account_mut(address) = Account::default();
    }
}
