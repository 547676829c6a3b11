use crate::{
    environment::OpStackRules,
    errors::{ContextResult, InternalError, VMError},
    hooks::{
        default_hook::{
            compute_gas_refunded, delete_self_destruct_accounts, pay_coinbase,
            prepare_execution_with_surcharge, refund_sender,
        },
        hook::Hook,
    },
    vm::VM,
};
use txtrace_common::{H256, U256};

/// Calldata pricing used for the L1 gas estimate, independent of the L2 gas schedule.
const L1_ZERO_BYTE_GAS: u64 = 4;
const L1_NON_ZERO_BYTE_GAS: u64 = 16;
/// Ecotone divides the weighted gas price by `16 * 10^6`: 16 for the base fee weight and 10^6
/// for the scalar decimals.
const L1_FEE_DIVISOR: u64 = 16_000_000;

const L1_BASE_FEE_SLOT: u64 = 1;
const L1_FEE_SCALARS_SLOT: u64 = 3;
const L1_BLOB_BASE_FEE_SLOT: u64 = 7;

/// Fee handling of an OP-Stack rollup.
///
/// On top of the L1 rules the sender pays an L1 data fee (Ecotone formula) collected by the L1
/// fee vault, and the base fee goes to the base fee vault instead of being burned. System
/// deposits pay nothing.
pub struct OpStackHook {
    rules: OpStackRules,
}

impl OpStackHook {
    pub fn new(rules: OpStackRules) -> Self {
        Self { rules }
    }
}

impl Hook for OpStackHook {
    fn prepare_execution(&mut self, vm: &mut VM<'_>) -> Result<(), VMError> {
        let l1_fee = if vm.env.is_privileged {
            U256::zero()
        } else {
            l1_data_fee(vm, &self.rules)?
        };

        prepare_execution_with_surcharge(vm, l1_fee)?;

        vm.transfer(vm.env.origin, self.rules.l1_fee_vault, l1_fee)?;
        vm.l1_data_fee = Some(l1_fee);

        Ok(())
    }

    fn finalize_execution(
        &mut self,
        vm: &mut VM<'_>,
        ctx_result: &mut ContextResult,
    ) -> Result<(), VMError> {
        let gas_refunded = compute_gas_refunded(vm, ctx_result)?;
        let gas_spent = refund_sender(vm, ctx_result, gas_refunded)?;

        pay_coinbase(vm, gas_spent)?;
        pay_base_fee_vault(vm, &self.rules, gas_spent)?;

        delete_self_destruct_accounts(vm, ctx_result);

        Ok(())
    }
}

fn pay_base_fee_vault(
    vm: &mut VM<'_>,
    rules: &OpStackRules,
    gas_spent: u64,
) -> Result<(), VMError> {
    if vm.env.is_privileged {
        return Ok(());
    }

    let base_fee = U256::from(gas_spent)
        .checked_mul(vm.env.base_fee_per_gas)
        .ok_or(InternalError::Overflow)?;
    vm.increase_account_balance(rules.base_fee_vault, base_fee)
}

/// Parameters of the Ecotone L1 fee formula.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct L1FeeParams {
    l1_base_fee: U256,
    l1_blob_base_fee: U256,
    base_fee_scalar: U256,
    blob_base_fee_scalar: U256,
}

impl L1FeeParams {
    /// Block overrides win; anything missing is read from the L1Block predeploy, which reads as
    /// zero when it is not part of the prestate.
    fn resolve(vm: &mut VM<'_>, rules: &OpStackRules) -> Self {
        let overrides = vm.env.l1_fee_overrides;
        let l1_block = rules.l1_block_contract;
        let mut slot = |index: u64| {
            vm.db
                .get_storage_value(l1_block, H256::from_low_u64_be(index))
        };

        let scalars = slot(L1_FEE_SCALARS_SLOT).to_big_endian();
        Self {
            l1_base_fee: overrides
                .l1_base_fee
                .unwrap_or_else(|| slot(L1_BASE_FEE_SLOT)),
            l1_blob_base_fee: overrides
                .l1_blob_base_fee
                .unwrap_or_else(|| slot(L1_BLOB_BASE_FEE_SLOT)),
            // Slot 3 packs (low to high) the sequence number, the blob base fee scalar and the
            // base fee scalar.
            base_fee_scalar: overrides
                .base_fee_scalar
                .unwrap_or_else(|| packed_u32(&scalars, 16)),
            blob_base_fee_scalar: overrides
                .blob_base_fee_scalar
                .unwrap_or_else(|| packed_u32(&scalars, 20)),
        }
    }
}

/// Big-endian `u32` starting at byte `start` of a storage word.
fn packed_u32(word: &[u8; 32], start: usize) -> U256 {
    word.get(start..start.saturating_add(4))
        .and_then(|bytes| <[u8; 4]>::try_from(bytes).ok())
        .map(|bytes| U256::from(u32::from_be_bytes(bytes)))
        .unwrap_or_default()
}

/// `l1_gas * (16 * l1_base_fee * base_fee_scalar + l1_blob_base_fee * blob_base_fee_scalar) / 16e6`
pub fn l1_data_fee(vm: &mut VM<'_>, rules: &OpStackRules) -> Result<U256, VMError> {
    let (zeros, non_zeros) = vm.tx.calldata_byte_counts();
    let l1_gas = zeros
        .checked_mul(L1_ZERO_BYTE_GAS)
        .zip(non_zeros.checked_mul(L1_NON_ZERO_BYTE_GAS))
        .and_then(|(zeros_gas, non_zeros_gas)| zeros_gas.checked_add(non_zeros_gas))
        .and_then(|gas| gas.checked_add(rules.l1_gas_overhead))
        .ok_or(InternalError::Overflow)?;

    let params = L1FeeParams::resolve(vm, rules);

    let base_fee_weight = U256::from(16)
        .checked_mul(params.l1_base_fee)
        .and_then(|weight| weight.checked_mul(params.base_fee_scalar))
        .ok_or(InternalError::Overflow)?;
    let blob_fee_weight = params
        .l1_blob_base_fee
        .checked_mul(params.blob_base_fee_scalar)
        .ok_or(InternalError::Overflow)?;

    let fee = base_fee_weight
        .checked_add(blob_fee_weight)
        .and_then(|weighted_price| weighted_price.checked_mul(U256::from(l1_gas)))
        .ok_or(InternalError::Overflow)?;

    Ok(fee
        .checked_div(U256::from(L1_FEE_DIVISOR))
        .ok_or(InternalError::DivisionByZero)?)
}
