use crate::{
    errors::{OpcodeResult, VMError},
    vm::VM,
};

// Duplication Operation (16)
// Opcodes: DUP1 ... DUP16

impl<'a> VM<'a> {
    // DUP operation, `N` is the depth of the duplicated item (DUP1 is 0).
    #[inline]
    pub fn op_dup<const N: usize>(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas.very_low)?;

        current_call_frame.stack.dup(N)?;

        Ok(OpcodeResult::Continue)
    }
}
