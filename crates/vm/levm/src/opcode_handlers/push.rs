use crate::{
    errors::{InternalError, OpcodeResult, VMError},
    vm::VM,
};
use txtrace_common::utils::u256_from_big_endian_const;

// Push Operations
// Opcodes: PUSH0, PUSH1 ... PUSH32

impl<'a> VM<'a> {
    // Generic PUSH operation, optimized at compile time for the given N.
    #[inline]
    pub fn op_push<const N: usize>(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let call_frame = &mut self.current_call_frame;
        call_frame.increase_consumed_gas(gas.very_low)?;

        let new_pc = call_frame
            .pc
            .checked_add(N)
            .ok_or(InternalError::Overflow)?;

        // Push data cut short by the end of the code reads as zeros.
        let mut data = [0u8; N];
        let code = &call_frame.bytecode.bytecode;
        let available = code.get(call_frame.pc..).unwrap_or_default();
        let copy_len = available.len().min(N);
        if let (Some(target), Some(source)) = (data.get_mut(..copy_len), available.get(..copy_len))
        {
            target.copy_from_slice(source);
        }

        call_frame.stack.push(u256_from_big_endian_const(data))?;

        // Advance the PC by the number of bytes in this instruction's payload.
        call_frame.pc = new_pc;

        Ok(OpcodeResult::Continue)
    }

    // PUSH0
    #[inline]
    pub fn op_push0(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        self.current_call_frame.increase_consumed_gas(gas.base)?;
        self.current_call_frame.stack.push_zero()?;
        Ok(OpcodeResult::Continue)
    }
}
