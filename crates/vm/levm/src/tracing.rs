use crate::errors::{ContextResult, InternalError, TxResult};
use bytes::Bytes;
use txtrace_common::{
    Address, U256,
    tracing::{CallLog, CallTraceFrame, CallType},
    types::Log,
};

/// Builds the call tree of a transaction from the frame events emitted by the VM.
///
/// Frames are kept on a stack while they run; when one exits it is appended to its parent's
/// `calls`, so children end up in the order they were started. Tracing never influences
/// execution: a disabled tracer ignores every event.
#[derive(Debug, Default)]
pub struct LevmCallTracer {
    /// Frames entered and not exited yet. After the transaction only the root is left.
    pub callframes: Vec<CallTraceFrame>,
    /// Whether to attach emitted logs to their frames.
    pub with_log: bool,
    pub active: bool,
}

impl LevmCallTracer {
    pub fn new(with_log: bool) -> Self {
        LevmCallTracer {
            callframes: vec![],
            with_log,
            active: true,
        }
    }

    /// A tracer that records nothing.
    pub fn disabled() -> Self {
        LevmCallTracer {
            active: false,
            ..Default::default()
        }
    }

    /// Starts a new frame. The VM charges the call before entering so `gas` is what the callee
    /// received.
    pub fn enter(
        &mut self,
        call_type: CallType,
        from: Address,
        to: Address,
        value: U256,
        gas: u64,
        input: &Bytes,
    ) {
        if !self.active {
            return;
        }
        self.callframes.push(CallTraceFrame {
            call_type,
            from,
            to,
            value,
            gas,
            input: input.clone(),
            ..Default::default()
        });
    }

    fn exit(
        &mut self,
        gas_used: u64,
        output: Bytes,
        error: Option<String>,
        revert_reason: Option<String>,
    ) -> Result<(), InternalError> {
        if !self.active {
            return Ok(());
        }
        let mut executed_callframe = self
            .callframes
            .pop()
            .ok_or(InternalError::Tracer("exited a frame that was never entered"))?;

        executed_callframe.gas_used = gas_used;
        executed_callframe.output = output;
        if error.is_some() {
            clear_logs(&mut executed_callframe);
        }
        executed_callframe.error = error;
        executed_callframe.revert_reason = revert_reason;

        match self.callframes.last_mut() {
            Some(parent_callframe) => parent_callframe.calls.push(executed_callframe),
            None => self.callframes.push(executed_callframe),
        }
        Ok(())
    }

    /// Closes a frame that ended without running code, e.g. a call rejected for insufficient
    /// balance.
    pub fn exit_early(
        &mut self,
        gas_used: u64,
        error: Option<String>,
    ) -> Result<(), InternalError> {
        self.exit(gas_used, Bytes::new(), error, None)
    }

    /// Closes the running frame with the result of its context. A successful creation reports the
    /// created address as its output.
    pub fn exit_context(
        &mut self,
        ctx_result: &ContextResult,
        is_top_call: bool,
    ) -> Result<(), InternalError> {
        if !self.active {
            return Ok(());
        }
        if is_top_call && self.callframes.len() != 1 {
            return Err(InternalError::Tracer(
                "top level frame exited with nested frames still open",
            ));
        }

        let (error, revert_reason) = match &ctx_result.result {
            TxResult::Success => (None, None),
            TxResult::Revert(err) => {
                let reason = (err.is_revert_opcode() && !ctx_result.output.is_empty())
                    .then(|| format!("0x{}", hex::encode(&ctx_result.output)));
                (Some(err.to_string()), reason)
            }
        };
        let output = match self.callframes.last() {
            Some(frame) if error.is_none() && frame.call_type.is_create() => {
                Bytes::copy_from_slice(frame.to.as_bytes())
            }
            _ => ctx_result.output.clone(),
        };
        self.exit(ctx_result.gas_used, output, error, revert_reason)
    }

    /// Attaches a log to the running frame.
    pub fn log(&mut self, log: &Log) -> Result<(), InternalError> {
        if !self.active || !self.with_log {
            return Ok(());
        }
        let callframe = self
            .callframes
            .last_mut()
            .ok_or(InternalError::Tracer("log emitted outside of a frame"))?;
        let position = u64::try_from(callframe.calls.len())
            .map_err(|_| InternalError::TypeConversion)?;
        callframe.logs.push(CallLog {
            address: log.address,
            topics: log.topics.clone(),
            data: log.data.clone(),
            position,
        });
        Ok(())
    }

    /// The finished call tree. `None` if tracing was disabled or the transaction never ran.
    pub fn into_root(mut self) -> Option<CallTraceFrame> {
        if self.callframes.len() != 1 {
            return None;
        }
        self.callframes.pop()
    }
}

/// Logs of a failed frame are discarded, including the ones of its successful children.
fn clear_logs(frame: &mut CallTraceFrame) {
    frame.logs.clear();
    for child in &mut frame.calls {
        clear_logs(child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ExceptionalHalt, VMError};

    fn success(gas_used: u64) -> ContextResult {
        ContextResult {
            result: TxResult::Success,
            gas_used,
            output: Bytes::new(),
        }
    }

    #[test]
    fn children_keep_call_order() {
        let mut tracer = LevmCallTracer::new(false);
        tracer.enter(
            CallType::CALL,
            Address::zero(),
            Address::repeat_byte(1),
            U256::zero(),
            100,
            &Bytes::new(),
        );
        for byte in 2..5u8 {
            tracer.enter(
                CallType::STATICCALL,
                Address::repeat_byte(1),
                Address::repeat_byte(byte),
                U256::zero(),
                10,
                &Bytes::new(),
            );
            tracer.exit_context(&success(1), false).unwrap();
        }
        tracer.exit_context(&success(50), true).unwrap();

        let root = tracer.into_root().unwrap();
        assert_eq!(root.descendant_count(), 3);
        let targets: Vec<_> = root.calls.iter().map(|call| call.to).collect();
        assert_eq!(
            targets,
            vec![Address::repeat_byte(2), Address::repeat_byte(3), Address::repeat_byte(4)]
        );
    }

    #[test]
    fn revert_records_reason_and_drops_logs() {
        let mut tracer = LevmCallTracer::new(true);
        tracer.enter(
            CallType::CALL,
            Address::zero(),
            Address::repeat_byte(1),
            U256::zero(),
            100,
            &Bytes::new(),
        );
        tracer
            .log(&Log {
                address: Address::repeat_byte(1),
                topics: vec![],
                data: Bytes::new(),
            })
            .unwrap();
        let reverted = ContextResult {
            result: TxResult::Revert(VMError::RevertOpcode),
            gas_used: 30,
            output: Bytes::from_static(&[0xab]),
        };
        tracer.exit_context(&reverted, true).unwrap();

        let root = tracer.into_root().unwrap();
        assert_eq!(root.error.as_deref(), Some("execution reverted"));
        assert_eq!(root.revert_reason.as_deref(), Some("0xab"));
        assert!(root.logs.is_empty());
    }

    #[test]
    fn halts_use_halt_text() {
        let mut tracer = LevmCallTracer::new(false);
        tracer.enter(
            CallType::CALL,
            Address::zero(),
            Address::repeat_byte(1),
            U256::zero(),
            100,
            &Bytes::new(),
        );
        let halted = ContextResult {
            result: TxResult::Revert(ExceptionalHalt::InvalidJump.into()),
            gas_used: 100,
            output: Bytes::new(),
        };
        tracer.exit_context(&halted, true).unwrap();
        let root = tracer.into_root().unwrap();
        assert_eq!(root.error.as_deref(), Some("invalid jump destination"));
        assert_eq!(root.revert_reason, None);
    }

    #[test]
    fn successful_creation_outputs_the_created_address() {
        let created = Address::repeat_byte(0xcc);
        let mut tracer = LevmCallTracer::new(false);
        tracer.enter(
            CallType::CREATE,
            Address::zero(),
            created,
            U256::zero(),
            100,
            &Bytes::new(),
        );
        let deployed = ContextResult {
            result: TxResult::Success,
            gas_used: 60,
            output: Bytes::from_static(&[0x00]),
        };
        tracer.exit_context(&deployed, true).unwrap();
        let root = tracer.into_root().unwrap();
        assert_eq!(root.output.as_ref(), created.as_bytes());
    }

    #[test]
    fn failed_creation_keeps_the_revert_data() {
        let mut tracer = LevmCallTracer::new(false);
        tracer.enter(
            CallType::CREATE2,
            Address::zero(),
            Address::repeat_byte(0xcc),
            U256::zero(),
            100,
            &Bytes::new(),
        );
        let reverted = ContextResult {
            result: TxResult::Revert(VMError::RevertOpcode),
            gas_used: 60,
            output: Bytes::from_static(&[0xab]),
        };
        tracer.exit_context(&reverted, true).unwrap();
        let root = tracer.into_root().unwrap();
        assert_eq!(root.output.as_ref(), &[0xab]);
    }

    #[test]
    fn disabled_tracer_ignores_events() {
        let mut tracer = LevmCallTracer::disabled();
        tracer.enter(
            CallType::CALL,
            Address::zero(),
            Address::zero(),
            U256::zero(),
            1,
            &Bytes::new(),
        );
        tracer.exit_early(0, None).unwrap();
        assert!(tracer.into_root().is_none());
    }
}
