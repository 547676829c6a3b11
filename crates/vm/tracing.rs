use crate::{
    backends::LEVM,
    block_env::BlockEnvironment,
    chain_profile,
    errors::TraceError,
    execution_result::ExecutionResult,
    prestate::Prestate,
    state_diff::StateDiff,
    transaction::{TraceRequest, TransactionBuilder},
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use txtrace_common::{U256, tracing::CallTraceFrame};

/// The success shape of a trace.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceOutput {
    pub execution_result: ExecutionResult,
    pub state_diff: StateDiff,
    pub calls: CallTraceFrame,
}

/// Prepares the process-wide lookup tables. Optional, and harmless to call more than once.
pub fn init() {
    chain_profile::init();
}

/// Traces one transaction.
///
/// Request errors (malformed input, unknown chain, failed validation) are returned as
/// [`TraceError`]. A transaction that runs and fails is a successful trace with
/// `success: false`.
pub fn trace_transaction(request: &TraceRequest) -> Result<TraceOutput, TraceError> {
    let prestate = Prestate::from_json(&request.prestate)?;
    let ruleset = chain_profile::resolve(request.chain_id, request.op_stack)?;
    let block = BlockEnvironment::from_json(&request.block_env)?;
    let tx = TransactionBuilder::build(request)?;

    let env = LEVM::setup_env(&tx, &block, ruleset);
    let traced = LEVM::trace_tx(prestate.to_accounts(), &tx, env, true)?;

    let state_diff = StateDiff::compute(&traced.db);
    let execution_result = ExecutionResult::from(traced.report);

    info!(
        chain_id = request.chain_id,
        op_stack = request.op_stack,
        success = execution_result.success,
        gas_used = execution_result.gas_used,
        "Traced transaction"
    );

    Ok(TraceOutput {
        execution_result,
        state_diff,
        calls: traced.calls,
    })
}

/// Renders either output shape as JSON.
pub fn render(result: &Result<TraceOutput, TraceError>, pretty: bool) -> String {
    let rendered = match result {
        Ok(output) => to_json(output, pretty),
        Err(error) => to_json(&error.to_output(), pretty),
    };
    rendered.unwrap_or_else(|e| {
        let error = TraceError::Internal(format!("failed to serialize the result: {e}"));
        // The error shape only holds strings and a bool, it always serializes.
        to_json(&error.to_output(), false).unwrap_or_default()
    })
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
}

/// Flat entry point: takes the request fields as plain values, with the block environment and
/// prestate as JSON text, and always returns one of the two output shapes.
#[expect(clippy::too_many_arguments)]
pub fn format_and_trace_transaction(
    chain_id: u64,
    from: &str,
    to: &str,
    nonce: u64,
    data: &str,
    gas_limit: u64,
    gas_price: u128,
    gas_priority_fee: u128,
    block_env: &str,
    prestate: &str,
    op_stack: bool,
) -> String {
    let result = parse_json(prestate, TraceError::MalformedPrestate)
        .and_then(|prestate| {
            Ok((
                prestate,
                parse_json(block_env, TraceError::MalformedBlockEnvironment)?,
            ))
        })
        .and_then(|(prestate, block_env)| {
            trace_transaction(&TraceRequest {
                chain_id,
                from: from.to_string(),
                to: Some(to.to_string()),
                nonce,
                data: data.to_string(),
                value: U256::zero(),
                gas_limit,
                gas_price: U256::from(gas_price),
                gas_priority_fee: U256::from(gas_priority_fee),
                block_env,
                prestate,
                op_stack,
            })
        });

    if let Err(error) = &result {
        debug!(kind = error.kind(), %error, "Trace request failed");
    }
    render(&result, false)
}

fn parse_json(text: &str, error: fn(String) -> TraceError) -> Result<Value, TraceError> {
    serde_json::from_str(text).map_err(|e| error(format!("invalid JSON: {e}")))
}
