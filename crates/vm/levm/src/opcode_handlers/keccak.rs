use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    memory::calculate_memory_size,
    utils::size_offset_to_usize,
    vm::VM,
};
use txtrace_common::utils::{h256_to_u256, keccak};

// KECCAK256 (1)
// Opcodes: KECCAK256

impl<'a> VM<'a> {
    pub fn op_keccak256(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        let [offset, size] = *current_call_frame.stack.pop()?;
        let (size, offset) = size_offset_to_usize(size, offset)?;

        let new_memory_size = calculate_memory_size(offset, size)?;
        current_call_frame.increase_consumed_gas(gas_cost::keccak256(
            gas,
            new_memory_size,
            current_call_frame.memory.len(),
            size,
        )?)?;

        let data = current_call_frame.memory.load_range(offset, size)?;
        current_call_frame.stack.push(h256_to_u256(keccak(&data)))?;

        Ok(OpcodeResult::Continue)
    }
}
