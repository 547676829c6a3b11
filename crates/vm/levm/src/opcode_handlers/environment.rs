use crate::{
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    gas_cost,
    memory::calculate_memory_size,
    utils::{
        address_to_word, available_slice, size_offset_to_usize, u256_to_usize, word_to_address,
    },
    vm::VM,
};
use txtrace_common::{
    U256,
    utils::{h256_to_u256, u256_from_big_endian_const},
};

// Environmental Information (16)
// Opcodes: ADDRESS, BALANCE, ORIGIN, CALLER, CALLVALUE, CALLDATALOAD, CALLDATASIZE, CALLDATACOPY, CODESIZE, CODECOPY, GASPRICE, EXTCODESIZE, EXTCODECOPY, RETURNDATASIZE, RETURNDATACOPY, EXTCODEHASH

impl<'a> VM<'a> {
    /// Charges `base` gas and pushes a value known without reading the stack.
    #[inline]
    pub(crate) fn push_base(&mut self, value: U256) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas.base)?;
        current_call_frame.stack.push(value)?;
        Ok(OpcodeResult::Continue)
    }

    // ADDRESS operation
    pub fn op_address(&mut self) -> Result<OpcodeResult, VMError> {
        // The recipient of the current call.
        self.push_base(address_to_word(self.current_call_frame.to))
    }

    // BALANCE operation
    pub fn op_balance(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let address = word_to_address(self.current_call_frame.stack.pop1()?);
        let address_was_cold = !self.substate.add_accessed_address(address);

        self.current_call_frame
            .increase_consumed_gas(gas_cost::address_access(gas, address_was_cold))?;

        let balance = self.get_account(address).info.balance;
        self.current_call_frame.stack.push(balance)?;

        Ok(OpcodeResult::Continue)
    }

    // ORIGIN operation
    pub fn op_origin(&mut self) -> Result<OpcodeResult, VMError> {
        self.push_base(address_to_word(self.env.origin))
    }

    // CALLER operation
    pub fn op_caller(&mut self) -> Result<OpcodeResult, VMError> {
        self.push_base(address_to_word(self.current_call_frame.msg_sender))
    }

    // CALLVALUE operation
    pub fn op_callvalue(&mut self) -> Result<OpcodeResult, VMError> {
        self.push_base(self.current_call_frame.msg_value)
    }

    // CALLDATALOAD operation
    #[inline]
    pub fn op_calldataload(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas.very_low)?;

        let offset = current_call_frame.stack.pop1()?;
        // Reads past the end of the calldata return zeros.
        let offset = u256_to_usize(offset).unwrap_or(usize::MAX);

        let mut data = [0u8; 32];
        let available = available_slice(&current_call_frame.calldata, offset, 32);
        if let Some(target) = data.get_mut(..available.len()) {
            target.copy_from_slice(available);
        }

        current_call_frame
            .stack
            .push(u256_from_big_endian_const(data))?;

        Ok(OpcodeResult::Continue)
    }

    // CALLDATASIZE operation
    pub fn op_calldatasize(&mut self) -> Result<OpcodeResult, VMError> {
        self.push_base(U256::from(self.current_call_frame.calldata.len()))
    }

    // CALLDATACOPY operation
    pub fn op_calldatacopy(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        let [dest_offset, calldata_offset, size] = *current_call_frame.stack.pop()?;
        let (size, dest_offset) = size_offset_to_usize(size, dest_offset)?;
        let calldata_offset = u256_to_usize(calldata_offset).unwrap_or(usize::MAX);

        let new_memory_size = calculate_memory_size(dest_offset, size)?;
        current_call_frame.increase_consumed_gas(gas_cost::copy(
            gas,
            new_memory_size,
            current_call_frame.memory.len(),
            size,
            gas.very_low,
        )?)?;

        if size == 0 {
            return Ok(OpcodeResult::Continue);
        }

        let data = available_slice(&current_call_frame.calldata, calldata_offset, size);
        current_call_frame
            .memory
            .store_data_zero_padded(dest_offset, data, size)?;

        Ok(OpcodeResult::Continue)
    }

    // CODESIZE operation
    pub fn op_codesize(&mut self) -> Result<OpcodeResult, VMError> {
        self.push_base(U256::from(self.current_call_frame.bytecode.len()))
    }

    // CODECOPY operation
    pub fn op_codecopy(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        let [dest_offset, code_offset, size] = *current_call_frame.stack.pop()?;
        let (size, dest_offset) = size_offset_to_usize(size, dest_offset)?;
        let code_offset = u256_to_usize(code_offset).unwrap_or(usize::MAX);

        let new_memory_size = calculate_memory_size(dest_offset, size)?;
        current_call_frame.increase_consumed_gas(gas_cost::copy(
            gas,
            new_memory_size,
            current_call_frame.memory.len(),
            size,
            gas.very_low,
        )?)?;

        if size == 0 {
            return Ok(OpcodeResult::Continue);
        }

        let code = available_slice(&current_call_frame.bytecode.bytecode, code_offset, size);
        current_call_frame
            .memory
            .store_data_zero_padded(dest_offset, code, size)?;

        Ok(OpcodeResult::Continue)
    }

    // GASPRICE operation
    pub fn op_gasprice(&mut self) -> Result<OpcodeResult, VMError> {
        self.push_base(self.env.gas_price)
    }

    // EXTCODESIZE operation
    pub fn op_extcodesize(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let address = word_to_address(self.current_call_frame.stack.pop1()?);
        let address_was_cold = !self.substate.add_accessed_address(address);

        self.current_call_frame
            .increase_consumed_gas(gas_cost::address_access(gas, address_was_cold))?;

        let code_length = U256::from(self.get_account(address).code.len());
        self.current_call_frame.stack.push(code_length)?;

        Ok(OpcodeResult::Continue)
    }

    // EXTCODECOPY operation
    pub fn op_extcodecopy(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let call_frame = &mut self.current_call_frame;
        let [address, dest_offset, offset, size] = *call_frame.stack.pop()?;

        let address = word_to_address(address);
        let (size, dest_offset) = size_offset_to_usize(size, dest_offset)?;
        let offset = u256_to_usize(offset).unwrap_or(usize::MAX);

        let current_memory_size = call_frame.memory.len();
        let new_memory_size = calculate_memory_size(dest_offset, size)?;
        let address_was_cold = !self.substate.add_accessed_address(address);

        self.current_call_frame.increase_consumed_gas(gas_cost::copy(
            gas,
            new_memory_size,
            current_memory_size,
            size,
            gas_cost::address_access(gas, address_was_cold),
        )?)?;

        if size == 0 {
            return Ok(OpcodeResult::Continue);
        }

        let bytecode = self.get_account(address).code.bytecode.clone();
        let code = available_slice(&bytecode, offset, size);
        self.current_call_frame
            .memory
            .store_data_zero_padded(dest_offset, code, size)?;

        Ok(OpcodeResult::Continue)
    }

    // RETURNDATASIZE operation
    pub fn op_returndatasize(&mut self) -> Result<OpcodeResult, VMError> {
        self.push_base(U256::from(self.current_call_frame.sub_return_data.len()))
    }

    // RETURNDATACOPY operation
    pub fn op_returndatacopy(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        let [dest_offset, returndata_offset, size] = *current_call_frame.stack.pop()?;

        let (size, dest_offset) = size_offset_to_usize(size, dest_offset)?;
        let returndata_offset =
            u256_to_usize(returndata_offset).map_err(|_| ExceptionalHalt::OutOfBounds)?;

        let new_memory_size = calculate_memory_size(dest_offset, size)?;
        current_call_frame.increase_consumed_gas(gas_cost::copy(
            gas,
            new_memory_size,
            current_call_frame.memory.len(),
            size,
            gas.very_low,
        )?)?;

        // Unlike the other copies, reading past the end of the return data is an error.
        let copy_limit = returndata_offset
            .checked_add(size)
            .ok_or(ExceptionalHalt::OutOfBounds)?;
        let data = current_call_frame
            .sub_return_data
            .get(returndata_offset..copy_limit)
            .ok_or(ExceptionalHalt::OutOfBounds)?;
        if size == 0 {
            return Ok(OpcodeResult::Continue);
        }
        let data = data.to_vec();
        current_call_frame.memory.store_data(dest_offset, &data)?;

        Ok(OpcodeResult::Continue)
    }

    // EXTCODEHASH operation
    pub fn op_extcodehash(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let address = word_to_address(self.current_call_frame.stack.pop1()?);
        let address_was_cold = !self.substate.add_accessed_address(address);

        self.current_call_frame
            .increase_consumed_gas(gas_cost::address_access(gas, address_was_cold))?;

        // Non-existent (empty) accounts hash to zero.
        let account = self.get_account(address);
        let hash = if account.is_empty() {
            U256::zero()
        } else {
            h256_to_u256(account.info.code_hash)
        };
        self.current_call_frame.stack.push(hash)?;

        Ok(OpcodeResult::Continue)
    }
}
