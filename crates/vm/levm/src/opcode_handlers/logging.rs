use crate::{
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    gas_cost,
    memory::calculate_memory_size,
    utils::size_offset_to_usize,
    vm::VM,
};
use txtrace_common::{H256, types::Log, utils::u256_to_h256};

// Logging Operations (5)
// Opcodes: LOG0 ... LOG4

impl<'a> VM<'a> {
    // LOG operation
    pub fn op_log<const N_TOPICS: usize>(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        if current_call_frame.is_static {
            return Err(ExceptionalHalt::OpcodeNotAllowedInStaticContext.into());
        }

        let [offset, size] = *current_call_frame.stack.pop()?;
        let (size, offset) = size_offset_to_usize(size, offset)?;
        let topics = (*current_call_frame.stack.pop::<N_TOPICS>()?).map(u256_to_h256);

        let new_memory_size = calculate_memory_size(offset, size)?;
        let topic_count =
            u64::try_from(N_TOPICS).map_err(|_| ExceptionalHalt::VeryLargeNumber)?;
        current_call_frame.increase_consumed_gas(gas_cost::log(
            gas,
            new_memory_size,
            current_call_frame.memory.len(),
            size,
            topic_count,
        )?)?;

        let log = Log {
            address: current_call_frame.to,
            topics: Vec::<H256>::from(topics),
            data: current_call_frame.memory.load_range(offset, size)?,
        };

        self.tracer.log(&log)?;
        self.substate.add_log(log);

        Ok(OpcodeResult::Continue)
    }
}
