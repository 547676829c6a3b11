use bytes::Bytes;
use serde::Serialize;
use txtrace_common::{U256, serde_utils, types::Log};
use txtrace_levm::errors::{ExceptionalHalt, ExecutionReport, TxResult, VMError};

/// Outcome of the simulated transaction as reported in `executionResult`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    pub gas_used: u64,
    #[serde(with = "serde_utils::bytes")]
    pub output: Bytes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halt_reason: Option<&'static str>,
    /// Hex of the revert buffer, for an explicit non-empty revert.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revert_reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<Log>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l1_fee: Option<U256>,
}

impl From<ExecutionReport> for ExecutionResult {
    fn from(report: ExecutionReport) -> Self {
        let (halt_reason, revert_reason) = match &report.result {
            TxResult::Success => (None, None),
            TxResult::Revert(error) => {
                let revert_reason = (error.is_revert_opcode() && !report.output.is_empty())
                    .then(|| format!("0x{}", hex::encode(&report.output)));
                (Some(halt_reason(error)), revert_reason)
            }
        };

        Self {
            success: report.is_success(),
            gas_used: report.gas_used,
            output: report.output,
            halt_reason,
            revert_reason,
            logs: report.logs,
            l1_fee: report.l1_fee,
        }
    }
}

/// Name of the reason a transaction failed.
pub fn halt_reason(error: &VMError) -> &'static str {
    match error {
        VMError::RevertOpcode => "Revert",
        VMError::ExceptionalHalt(halt) => match halt {
            ExceptionalHalt::OutOfGas | ExceptionalHalt::VeryLargeNumber => "OutOfGas",
            ExceptionalHalt::InvalidOpcode => "InvalidOpcode",
            ExceptionalHalt::InvalidJump => "InvalidJumpDestination",
            ExceptionalHalt::CallDepthExceeded => "CallDepthExceeded",
            ExceptionalHalt::OpcodeNotAllowedInStaticContext => "StaticCallViolation",
            ExceptionalHalt::StackUnderflow => "StackUnderflow",
            ExceptionalHalt::StackOverflow => "StackOverflow",
            ExceptionalHalt::OutOfBounds => "OutOfOffset",
            ExceptionalHalt::InvalidContractPrefix => "CreateContractStartingWithEF",
            ExceptionalHalt::AddressAlreadyOccupied => "CreateCollision",
            ExceptionalHalt::ContractOutputTooBig => "CreateContractSizeLimit",
            ExceptionalHalt::Precompile(_) => "PrecompileError",
        },
        VMError::TxValidation(_) | VMError::Internal(_) => "InternalError",
    }
}
