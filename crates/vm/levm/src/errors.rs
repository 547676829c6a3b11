use bytes::Bytes;
use serde::Serialize;
use thiserror;
use txtrace_common::{Address, U256, types::Log};

/// Errors that can stop the execution of a call frame or of the whole transaction.
///
/// `ExceptionalHalt` and `RevertOpcode` only end the current context; `TxValidation` and
/// `Internal` abort the transaction before (or instead of) producing a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum VMError {
    #[error(transparent)]
    ExceptionalHalt(#[from] ExceptionalHalt),
    #[error("execution reverted")]
    RevertOpcode,
    #[error("Transaction validation error: {0}")]
    TxValidation(#[from] TxValidationError),
    #[error("Internal error: {0}")]
    Internal(#[from] InternalError),
}

impl VMError {
    pub fn is_revert_opcode(&self) -> bool {
        matches!(self, VMError::RevertOpcode)
    }

    /// Errors that can't be turned into a failed context and must bubble up to the caller.
    pub fn should_propagate(&self) -> bool {
        matches!(self, VMError::Internal(_) | VMError::TxValidation(_))
    }
}

impl From<PrecompileError> for VMError {
    fn from(error: PrecompileError) -> Self {
        Self::ExceptionalHalt(error.into())
    }
}

/// Conditions that halt the current frame, consuming all the gas it was given.
///
/// The display strings follow the wording used by geth's call tracer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum ExceptionalHalt {
    #[error("stack underflow")]
    StackUnderflow,
    #[error("stack limit reached 1024")]
    StackOverflow,
    #[error("invalid jump destination")]
    InvalidJump,
    #[error("write protection")]
    OpcodeNotAllowedInStaticContext,
    #[error("return data out of bounds")]
    OutOfBounds,
    #[error("invalid opcode")]
    InvalidOpcode,
    #[error("out of gas")]
    VeryLargeNumber,
    #[error("out of gas")]
    OutOfGas,
    #[error("max call depth exceeded")]
    CallDepthExceeded,
    #[error("invalid code: must not begin with 0xef")]
    InvalidContractPrefix,
    #[error("contract address collision")]
    AddressAlreadyOccupied,
    #[error("max code size exceeded")]
    ContractOutputTooBig,
    #[error("{0}")]
    Precompile(#[from] PrecompileError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum PrecompileError {
    #[error("precompile input could not be parsed")]
    ParsingInputError,
    #[error("point is not on the curve")]
    InvalidPoint,
    #[error("point is not in the prime order subgroup")]
    PointNotInSubgroup,
    #[error("invalid blake2f final block indicator")]
    InvalidFinalBlockFlag,
    #[error("versioned hash does not match the commitment")]
    InvalidVersionedHash,
    #[error("KZG proof verification failed")]
    InvalidKzgProof,
    #[error("out of gas")]
    NotEnoughGas,
    #[error("precompile at {0:#x} is not supported")]
    NotSupported(Address),
}

/// Reasons a transaction is rejected before any state is modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum TxValidationError {
    #[error("Nonce mismatch: expected {expected}, got {actual}")]
    NonceMismatch { expected: u64, actual: u64 },
    #[error("Nonce is max (overflow)")]
    NonceIsMax,
    #[error(
        "Insufficient account funds: sender balance {balance} is lower than the upfront cost {upfront_cost}"
    )]
    InsufficientAccountFunds { balance: U256, upfront_cost: U256 },
    #[error("Intrinsic gas too low: gas limit {gas_limit} is lower than the required {required}")]
    IntrinsicGasTooLow { gas_limit: u64, required: u64 },
    #[error("Max fee per gas {max_fee_per_gas} is lower than the block base fee {base_fee}")]
    InsufficientMaxFeePerGas { max_fee_per_gas: U256, base_fee: U256 },
    #[error("Priority fee {priority_fee} is greater than max fee per gas {max_fee_per_gas}")]
    PriorityGreaterThanMaxFeePerGas {
        priority_fee: U256,
        max_fee_per_gas: U256,
    },
    #[error("Initcode size {size} exceeds the maximum of {max}")]
    InitcodeSizeExceeded { size: usize, max: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum InternalError {
    #[error("Arithmetic operation overflowed")]
    Overflow,
    #[error("Arithmetic operation underflowed")]
    Underflow,
    #[error("Arithmetic operation divided by zero")]
    DivisionByZero,
    #[error("Tried to convert one type to another")]
    TypeConversion,
    #[error("Tried to slice a non-existing range")]
    Slicing,
    #[error("Could not pop callframe")]
    CallFrame,
    #[error("Tracer error: {0}")]
    Tracer(&'static str),
    #[error("{0}")]
    Custom(String),
}

impl InternalError {
    pub fn msg(msg: &'static str) -> Self {
        Self::Custom(msg.to_owned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeResult {
    Continue,
    Halt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxResult {
    Success,
    Revert(VMError),
}

impl TxResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Result of executing a single call context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextResult {
    pub result: TxResult,
    /// Gas consumed by the context. For the outermost context, after hooks run, this is the
    /// gas charged to the sender.
    pub gas_used: u64,
    pub output: Bytes,
}

impl ContextResult {
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }
}

/// Outcome of a whole transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub result: TxResult,
    pub gas_used: u64,
    pub gas_refunded: u64,
    pub output: Bytes,
    pub logs: Vec<Log>,
    /// L1 data fee charged by OP-Stack chains, `None` elsewhere.
    pub l1_fee: Option<U256>,
    /// Address of the contract deployed by a successful creation transaction.
    pub created_address: Option<Address>,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }
}
