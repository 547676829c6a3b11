use serde::Serialize;
use txtrace_levm::errors::{TxValidationError, VMError};

/// Reasons a trace request is rejected as a whole. None of them leaves a state diff or a call
/// trace behind.
///
/// Halts of the simulated transaction are not errors: they are reported inside the execution
/// result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TraceError {
    #[error("Malformed prestate: {0}")]
    MalformedPrestate(String),
    #[error("Malformed block environment: {0}")]
    MalformedBlockEnvironment(String),
    #[error("Malformed transaction: {0}")]
    MalformedTransaction(String),
    #[error("Unsupported chain id {0}: not a known chain and no OP-Stack flag given")]
    UnsupportedChain(u64),
    #[error("{0}")]
    InsufficientBalance(String),
    #[error("{0}")]
    IntrinsicGasTooLow(String),
    #[error("{0}")]
    NonceMismatch(String),
    #[error("{0}")]
    FeeCapTooLow(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TraceError {
    /// Stable name of the error kind, reported as `type` in the error output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedPrestate(_) => "MalformedPrestateError",
            Self::MalformedBlockEnvironment(_) => "MalformedBlockEnvironmentError",
            Self::MalformedTransaction(_) => "MalformedTransactionError",
            Self::UnsupportedChain(_) => "UnsupportedChainError",
            Self::InsufficientBalance(_) => "InsufficientBalanceError",
            Self::IntrinsicGasTooLow(_) => "IntrinsicGasTooLowError",
            Self::NonceMismatch(_) => "NonceMismatchError",
            Self::FeeCapTooLow(_) => "FeeCapTooLowError",
            Self::Internal(_) => "InternalError",
        }
    }

    pub fn to_output(&self) -> ErrorOutput {
        ErrorOutput {
            error: true,
            message: self.to_string(),
            kind: self.kind(),
        }
    }
}

impl From<TxValidationError> for TraceError {
    fn from(error: TxValidationError) -> Self {
        let message = error.to_string();
        match error {
            TxValidationError::NonceMismatch { .. } | TxValidationError::NonceIsMax => {
                Self::NonceMismatch(message)
            }
            TxValidationError::InsufficientAccountFunds { .. } => {
                Self::InsufficientBalance(message)
            }
            TxValidationError::IntrinsicGasTooLow { .. } => Self::IntrinsicGasTooLow(message),
            TxValidationError::InsufficientMaxFeePerGas { .. }
            | TxValidationError::PriorityGreaterThanMaxFeePerGas { .. } => {
                Self::FeeCapTooLow(message)
            }
            TxValidationError::InitcodeSizeExceeded { .. } => Self::MalformedTransaction(message),
        }
    }
}

impl From<VMError> for TraceError {
    fn from(error: VMError) -> Self {
        match error {
            VMError::TxValidation(error) => error.into(),
            // Halts are turned into results by the VM; one escaping is a bug.
            other => Self::Internal(other.to_string()),
        }
    }
}

/// The error shape of the output: `{"error": true, "message": ..., "type": ...}`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
    pub error: bool,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}
