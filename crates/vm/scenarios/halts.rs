use super::helpers::*;
use crate::{TraceRequest, trace_transaction};
use serde_json::json;

const CHILD_ADDR: &str = "0x4000000000000000000000000000000000000004";
const LIBRARY_ADDR: &str = "0x7000000000000000000000000000000000000007";

/// Runs `code` as the called contract and checks it halted with `halt_reason`, burning the whole
/// gas limit and leaving no trace of the contract in the state diff.
fn assert_top_level_halt(code: Vec<u8>, halt_reason: &str, frame_error: &str) {
    let gas_limit = 100_000;
    let output = run(request(
        prestate(&[(CONTRACT_ADDR, code)]),
        Some(CONTRACT_ADDR),
        "0x",
        gas_limit,
    ));

    let result = &output["executionResult"];
    assert_eq!(result["success"], false, "{output}");
    assert_eq!(result["haltReason"], halt_reason);
    assert_eq!(result["gasUsed"], gas_limit);
    assert!(result.get("revertReason").is_none());
    assert_eq!(output["calls"]["error"], frame_error);

    let diff = &output["stateDiff"];
    assert!(diff.get(CONTRACT_ADDR).is_none(), "{diff}");
    assert_eq!(diff[SENDER_ADDR]["nonce"]["to"], 1);
    assert_eq!(
        diff[SENDER_ADDR]["balance"]["to"],
        quantity(SENDER_BALANCE - gas_limit * EFFECTIVE_PRICE)
    );
}

#[test]
fn jump_to_a_non_jumpdest() {
    // slot 0 = 1, PUSH1 8, JUMP, STOP: offset 8 is the STOP, not a JUMPDEST
    let mut code = sstore(0, 1);
    code.extend_from_slice(&[0x60, 0x08, 0x56, 0x00]);
    assert_top_level_halt(code, "InvalidJumpDestination", "invalid jump destination");
}

#[test]
fn designated_invalid_opcode() {
    let mut code = sstore(0, 1);
    code.push(0xfe);
    assert_top_level_halt(code, "InvalidOpcode", "invalid opcode");
}

#[test]
fn undefined_opcode() {
    assert_top_level_halt(vec![0x0c], "InvalidOpcode", "invalid opcode");
}

#[test]
fn stack_underflow() {
    // PUSH1 1, ADD
    assert_top_level_halt(vec![0x60, 0x01, 0x01], "StackUnderflow", "stack underflow");
}

#[test]
fn stack_overflow() {
    // 1025 x PUSH0
    assert_top_level_halt(vec![0x5f; 1025], "StackOverflow", "stack limit reached 1024");
}

#[test]
fn static_call_cannot_write() {
    // STATICCALL(gas, child, 0, 0, 0, 0), slot 0 = ISZERO(success)
    let mut parent = vec![0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x73];
    parent.extend_from_slice(address(CHILD_ADDR).as_bytes());
    parent.extend_from_slice(&[0x5a, 0xfa, 0x15, 0x60, 0x00, 0x55, 0x00]);
    let mut child = sstore(0, 1);
    child.push(0x00);

    let output = run(request(
        prestate(&[(CONTRACT_ADDR, parent), (CHILD_ADDR, child)]),
        Some(CONTRACT_ADDR),
        "0x",
        200_000,
    ));

    let result = &output["executionResult"];
    assert_eq!(result["success"], true);
    assert!(result.get("haltReason").is_none());

    let frame = &output["calls"]["calls"][0];
    assert_eq!(frame["type"], "STATICCALL");
    assert_eq!(frame["to"], CHILD_ADDR);
    assert_eq!(frame["error"], "write protection");
    assert_eq!(frame["gasUsed"], frame["gas"]);

    let diff = &output["stateDiff"];
    assert_eq!(diff[CONTRACT_ADDR]["storage"][slot(0)], json!({"from": "0x0", "to": "0x1"}));
    assert!(diff.get(CHILD_ADDR).is_none(), "{diff}");
}

/// Stores CALLER in slot 1, CALLVALUE in slot 2 and 0x2a in slot 0.
fn library() -> Vec<u8> {
    let mut code = vec![0x33, 0x60, 0x01, 0x55, 0x34, 0x60, 0x02, 0x55];
    code.extend(sstore(0, 0x2a));
    code.push(0x00);
    code
}

#[test]
fn delegatecall_runs_in_the_caller_context() {
    // DELEGATECALL(gas, library, 0, 0, 0, 0)
    let mut proxy = vec![0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x73];
    proxy.extend_from_slice(address(LIBRARY_ADDR).as_bytes());
    proxy.extend_from_slice(&[0x5a, 0xf4, 0x50, 0x00]);

    let mut request = request(
        prestate(&[(CONTRACT_ADDR, proxy), (LIBRARY_ADDR, library())]),
        Some(CONTRACT_ADDR),
        "0x",
        200_000,
    );
    request["value"] = json!("0x5");
    let output = run(request);

    assert_eq!(output["executionResult"]["success"], true);
    let frame = &output["calls"]["calls"][0];
    assert_eq!(frame["type"], "DELEGATECALL");
    assert_eq!(frame["from"], CONTRACT_ADDR);
    assert_eq!(frame["to"], LIBRARY_ADDR);

    let diff = &output["stateDiff"];
    let storage = &diff[CONTRACT_ADDR]["storage"];
    assert_eq!(storage[slot(0)]["to"], "0x2a");
    assert_eq!(storage[slot(1)]["to"], SENDER_ADDR);
    assert_eq!(storage[slot(2)]["to"], "0x5");
    assert_eq!(diff[CONTRACT_ADDR]["balance"], json!({"from": "0x0", "to": "0x5"}));
    assert!(diff.get(LIBRARY_ADDR).is_none(), "{diff}");
}

#[test]
fn callcode_uses_the_caller_storage_with_itself_as_sender() {
    // CALLCODE(gas, library, 0, 0, 0, 0, 0)
    let mut caller = vec![0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x73];
    caller.extend_from_slice(address(LIBRARY_ADDR).as_bytes());
    caller.extend_from_slice(&[0x5a, 0xf2, 0x50, 0x00]);

    let output = run(request(
        prestate(&[(CONTRACT_ADDR, caller), (LIBRARY_ADDR, library())]),
        Some(CONTRACT_ADDR),
        "0x",
        200_000,
    ));

    assert_eq!(output["executionResult"]["success"], true);
    let frame = &output["calls"]["calls"][0];
    assert_eq!(frame["type"], "CALLCODE");
    assert_eq!(frame["from"], CONTRACT_ADDR);
    assert_eq!(frame["to"], LIBRARY_ADDR);

    let diff = &output["stateDiff"];
    let storage = &diff[CONTRACT_ADDR]["storage"];
    assert_eq!(storage[slot(0)]["to"], "0x2a");
    assert_eq!(storage[slot(1)]["to"], CONTRACT_ADDR);
    assert!(storage.get(slot(2)).is_none());
    assert!(diff.get(LIBRARY_ADDR).is_none(), "{diff}");
}

#[test]
fn call_depth_is_limited_to_1024() {
    // CALL(gas, self, 0, 0, 0, 0, 0); on failure store 1 in slot 0
    let code = vec![
        0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, // retSize .. value
        0x30, 0x5a, 0xf1, // ADDRESS, GAS, CALL
        0x60, 0x16, 0x57, // PUSH1 0x16, JUMPI
        0x60, 0x01, 0x60, 0x00, 0x55, 0x00, // slot 0 = 1, STOP
        0x5b, 0x00, // JUMPDEST, STOP
    ];
    // Enough gas for 63/64ths to still reach the bottom.
    let gas_limit: u64 = 1_000_000_000_000;
    let mut prestate = prestate(&[(CONTRACT_ADDR, code)]);
    prestate[SENDER_ADDR]["balance"] = json!("0xffffffffffffffffffff");
    let request: TraceRequest =
        serde_json::from_value(request(prestate, Some(CONTRACT_ADDR), "0x", gas_limit)).unwrap();

    // The tree is deeper than a JSON parser will follow, so inspect it directly.
    let output = trace_transaction(&request).unwrap();
    assert!(output.execution_result.success);
    assert_eq!(output.execution_result.halt_reason, None);

    let mut frame = &output.calls;
    let mut depth = 0;
    while let Some(child) = frame.calls.first() {
        assert_eq!(frame.calls.len(), 1);
        frame = child;
        depth += 1;
    }
    assert_eq!(depth, 1025);
    assert_eq!(frame.error.as_deref(), Some("max call depth exceeded"));
    assert_eq!(frame.gas_used, 0);

    let diff = serde_json::to_value(&output.state_diff).unwrap();
    assert_eq!(diff[CONTRACT_ADDR]["storage"][slot(0)], json!({"from": "0x0", "to": "0x1"}));
}
