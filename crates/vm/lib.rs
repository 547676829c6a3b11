//! Transaction tracing on top of `txtrace-levm`: request parsing, chain selection, state diffs
//! and the JSON output.

mod block_env;
pub mod chain_profile;
mod errors;
mod execution_result;
mod prestate;
mod state_diff;
pub mod tracing;
mod transaction;

pub mod backends;

#[cfg(test)]
mod scenarios;

pub use backends::LEVM;
pub use block_env::BlockEnvironment;
pub use errors::{ErrorOutput, TraceError};
pub use execution_result::ExecutionResult;
pub use txtrace_common::serde_utils::parse_address;
pub use prestate::{Prestate, PrestateAccount};
pub use state_diff::{AccountDiff, Change, StateDiff};
pub use tracing::{TraceOutput, format_and_trace_transaction, init, render, trace_transaction};
pub use transaction::{TraceRequest, TransactionBuilder};
