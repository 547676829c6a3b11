use crate::{
    errors::{ExceptionalHalt, InternalError, OpcodeResult, VMError},
    gas_cost,
    memory::calculate_memory_size,
    utils::{size_offset_to_usize, u256_to_usize},
    vm::VM,
};
use txtrace_common::{U256, utils::u256_to_h256};

// Stack, Memory, Storage and Flow Operations (15)
// Opcodes: POP, MLOAD, MSTORE, MSTORE8, SLOAD, SSTORE, JUMP, JUMPI, PC, MSIZE, GAS, JUMPDEST, TLOAD, TSTORE, MCOPY

impl<'a> VM<'a> {
    // POP operation
    #[inline]
    pub fn op_pop(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas.base)?;
        current_call_frame.stack.pop1()?;
        Ok(OpcodeResult::Continue)
    }

    // TLOAD operation
    pub fn op_tload(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let key = self.current_call_frame.stack.pop1()?;
        let to = self.current_call_frame.to;
        let value = self.substate.get_transient(&to, &key);

        self.current_call_frame.increase_consumed_gas(gas.transient)?;
        self.current_call_frame.stack.push(value)?;

        Ok(OpcodeResult::Continue)
    }

    // TSTORE operation
    pub fn op_tstore(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        if self.current_call_frame.is_static {
            return Err(ExceptionalHalt::OpcodeNotAllowedInStaticContext.into());
        }
        self.current_call_frame.increase_consumed_gas(gas.transient)?;

        let [key, value] = *self.current_call_frame.stack.pop()?;
        let to = self.current_call_frame.to;
        self.substate.set_transient(&to, &key, value);

        Ok(OpcodeResult::Continue)
    }

    // MLOAD operation
    pub fn op_mload(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        let offset = u256_to_usize(current_call_frame.stack.pop1()?)?;

        let new_memory_size = calculate_memory_size(offset, 32)?;
        current_call_frame.increase_consumed_gas(gas_cost::mem_access(
            gas,
            new_memory_size,
            current_call_frame.memory.len(),
            gas.very_low,
        )?)?;

        let word = current_call_frame.memory.load_word(offset)?;
        current_call_frame.stack.push(word)?;

        Ok(OpcodeResult::Continue)
    }

    // MSTORE operation
    pub fn op_mstore(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        let [offset, value] = *current_call_frame.stack.pop()?;
        let offset = u256_to_usize(offset)?;

        let new_memory_size = calculate_memory_size(offset, 32)?;
        current_call_frame.increase_consumed_gas(gas_cost::mem_access(
            gas,
            new_memory_size,
            current_call_frame.memory.len(),
            gas.very_low,
        )?)?;

        current_call_frame.memory.store_word(offset, value)?;

        Ok(OpcodeResult::Continue)
    }

    // MSTORE8 operation
    pub fn op_mstore8(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        let [offset, value] = *current_call_frame.stack.pop()?;
        let offset = u256_to_usize(offset)?;

        let new_memory_size = calculate_memory_size(offset, 1)?;
        current_call_frame.increase_consumed_gas(gas_cost::mem_access(
            gas,
            new_memory_size,
            current_call_frame.memory.len(),
            gas.very_low,
        )?)?;

        current_call_frame
            .memory
            .store_data(offset, &[value.byte(0)])?;

        Ok(OpcodeResult::Continue)
    }

    // SLOAD operation
    pub fn op_sload(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let key = u256_to_h256(self.current_call_frame.stack.pop1()?);
        let address = self.current_call_frame.to;

        let (value, storage_slot_was_cold) = self.access_storage_slot(address, key);

        self.current_call_frame
            .increase_consumed_gas(gas_cost::sload(gas, storage_slot_was_cold))?;
        self.current_call_frame.stack.push(value)?;

        Ok(OpcodeResult::Continue)
    }

    // SSTORE operation
    pub fn op_sstore(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        if self.current_call_frame.is_static {
            return Err(ExceptionalHalt::OpcodeNotAllowedInStaticContext.into());
        }

        let [key, new_value] = *self.current_call_frame.stack.pop()?;
        let key = u256_to_h256(key);
        let address = self.current_call_frame.to;

        // EIP-2200: SSTORE needs more than the call stipend to be left.
        if self.current_call_frame.gas_remaining <= gas.sstore_stipend {
            return Err(ExceptionalHalt::OutOfGas.into());
        }

        let (current_value, storage_slot_was_cold) = self.access_storage_slot(address, key);
        let original_value = self.db.get_original_storage(address, key);

        self.current_call_frame.increase_consumed_gas(gas_cost::sstore(
            gas,
            original_value,
            current_value,
            new_value,
            storage_slot_was_cold,
        )?)?;

        let (to_add, to_remove) =
            gas_cost::sstore_refund(gas, original_value, current_value, new_value)?;
        self.substate.refunded_gas = self
            .substate
            .refunded_gas
            .checked_add(to_add)
            .ok_or(InternalError::Overflow)?
            .checked_sub(to_remove)
            .ok_or(InternalError::Underflow)?;

        if new_value != current_value {
            self.update_account_storage(address, key, new_value, current_value);
        }

        Ok(OpcodeResult::Continue)
    }

    // MSIZE operation
    pub fn op_msize(&mut self) -> Result<OpcodeResult, VMError> {
        self.push_base(U256::from(self.current_call_frame.memory.len()))
    }

    // GAS operation
    pub fn op_gas(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas.base)?;

        // Gas left after paying for this instruction.
        current_call_frame
            .stack
            .push(U256::from(current_call_frame.gas_remaining))?;

        Ok(OpcodeResult::Continue)
    }

    // MCOPY operation
    pub fn op_mcopy(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        let [dest_offset, src_offset, size] = *current_call_frame.stack.pop()?;

        let (size, src_offset) = size_offset_to_usize(size, src_offset)?;
        let dest_offset = if size == 0 {
            0
        } else {
            u256_to_usize(dest_offset)?
        };

        let new_memory_size = calculate_memory_size(src_offset.max(dest_offset), size)?;
        current_call_frame.increase_consumed_gas(gas_cost::copy(
            gas,
            new_memory_size,
            current_call_frame.memory.len(),
            size,
            gas.very_low,
        )?)?;

        current_call_frame
            .memory
            .copy_within(src_offset, dest_offset, size)?;

        Ok(OpcodeResult::Continue)
    }

    // JUMP operation
    pub fn op_jump(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas.mid)?;

        let target = current_call_frame.stack.pop1()?;
        current_call_frame.jump(target)?;

        Ok(OpcodeResult::Continue)
    }

    // JUMPI operation
    pub fn op_jumpi(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas.high)?;

        let [target, condition] = *current_call_frame.stack.pop()?;
        if !condition.is_zero() {
            current_call_frame.jump(target)?;
        }

        Ok(OpcodeResult::Continue)
    }

    // JUMPDEST operation
    pub fn op_jumpdest(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        self.current_call_frame.increase_consumed_gas(gas.jumpdest)?;
        Ok(OpcodeResult::Continue)
    }

    // PC operation
    pub fn op_pc(&mut self) -> Result<OpcodeResult, VMError> {
        // The program counter already points past this instruction.
        let pc = self
            .current_call_frame
            .pc
            .checked_sub(1)
            .ok_or(InternalError::Underflow)?;
        self.push_base(U256::from(pc))
    }
}
