use super::helpers::*;
use serde_json::json;

const CHILD_ADDR: &str = "0x4000000000000000000000000000000000000004";
const SIBLING_ADDR: &str = "0x5000000000000000000000000000000000000005";
const GRANDCHILD_ADDR: &str = "0x6000000000000000000000000000000000000006";

fn stop() -> Vec<u8> {
    vec![0x00]
}

#[test]
fn nested_revert_rolls_back_only_the_child() {
    // slot 0 = 1, call the child, stop
    let mut parent = sstore(0, 1);
    parent.extend(call_all_gas(CHILD_ADDR));
    parent.extend(stop());

    // slot 0 = 2, REVERT(0, 0)
    let mut child = sstore(0, 2);
    child.extend_from_slice(&[0x60, 0x00, 0x60, 0x00, 0xfd]);

    let output = run(request(
        prestate(&[(CONTRACT_ADDR, parent), (CHILD_ADDR, child)]),
        Some(CONTRACT_ADDR),
        "0x",
        200_000,
    ));

    assert_eq!(output["executionResult"]["success"], true);
    let diff = &output["stateDiff"];
    assert_eq!(diff[CONTRACT_ADDR]["storage"][slot(0)], json!({"from": "0x0", "to": "0x1"}));
    assert!(diff.get(CHILD_ADDR).is_none(), "{diff}");

    let child_frame = &output["calls"]["calls"][0];
    assert_eq!(child_frame["to"], CHILD_ADDR);
    assert_eq!(child_frame["error"], "execution reverted");
    assert_ne!(child_frame["gasUsed"], quantity(0));

    // The reverted child's gas is still paid for by the sender.
    let gas_used = output["executionResult"]["gasUsed"].as_u64().unwrap();
    assert_eq!(
        diff[SENDER_ADDR]["balance"]["to"],
        quantity(SENDER_BALANCE - gas_used * EFFECTIVE_PRICE)
    );
    let root_gas_used = &output["calls"]["gasUsed"];
    assert_eq!(root_gas_used, &quantity(gas_used));
}

#[test]
fn top_level_revert_keeps_fee_changes() {
    // PUSH1 0xaa, PUSH1 0, MSTORE8, PUSH1 1, PUSH1 0, REVERT
    let code = vec![0x60, 0xaa, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00, 0xfd];
    let output = run(request(
        prestate(&[(CONTRACT_ADDR, code)]),
        Some(CONTRACT_ADDR),
        "0x",
        100_000,
    ));

    let result = &output["executionResult"];
    assert_eq!(result["success"], false);
    assert_eq!(result["output"], "0xaa");
    assert_eq!(result["haltReason"], "Revert");
    assert_eq!(result["revertReason"], "0xaa");

    let diff = &output["stateDiff"];
    assert_eq!(diff[SENDER_ADDR]["nonce"]["to"], 1);
    assert!(diff.get(COINBASE_ADDR).is_some());
    assert!(diff.get(CONTRACT_ADDR).is_none());
    assert_eq!(output["calls"]["error"], "execution reverted");
}

#[test]
fn call_trace_counts_frames_in_execution_order() {
    // parent -> child -> grandchild, then parent -> sibling
    let mut parent = call_all_gas(CHILD_ADDR);
    parent.extend(call_all_gas(SIBLING_ADDR));
    parent.extend(stop());
    let mut child = call_all_gas(GRANDCHILD_ADDR);
    child.extend(stop());

    let output = run(request(
        prestate(&[
            (CONTRACT_ADDR, parent),
            (CHILD_ADDR, child),
            (SIBLING_ADDR, stop()),
            (GRANDCHILD_ADDR, stop()),
        ]),
        Some(CONTRACT_ADDR),
        "0x",
        300_000,
    ));

    assert_eq!(output["executionResult"]["success"], true);
    let root = &output["calls"];
    let calls = root["calls"].as_array().unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0]["to"], CHILD_ADDR);
    assert_eq!(calls[0]["calls"][0]["to"], GRANDCHILD_ADDR);
    assert_eq!(calls[0]["calls"][0]["from"], CHILD_ADDR);
    assert_eq!(calls[1]["to"], SIBLING_ADDR);
    assert!(calls.iter().all(|call| call["type"] == "CALL"));

    assert_eq!(count_frames(root), 3);
}

#[test]
fn selfdestruct_adds_no_frame() {
    let mut parent = call_all_gas(CHILD_ADDR);
    parent.extend(stop());
    // PUSH20 recipient, SELFDESTRUCT
    let mut child = vec![0x73];
    child.extend_from_slice(address(RECIPIENT_ADDR).as_bytes());
    child.push(0xff);

    let output = run(request(
        prestate(&[(CONTRACT_ADDR, parent), (CHILD_ADDR, child)]),
        Some(CONTRACT_ADDR),
        "0x",
        200_000,
    ));

    assert_eq!(output["executionResult"]["success"], true);
    let root = &output["calls"];
    assert_eq!(count_frames(root), 1);
    let child_frame = &root["calls"][0];
    assert_eq!(child_frame["type"], "CALL");
    assert_eq!(child_frame["to"], CHILD_ADDR);
    assert_eq!(child_frame["calls"], json!([]));
}

#[test]
fn out_of_gas_consumes_the_whole_limit() {
    // JUMPDEST, PUSH1 0, JUMP
    let code = vec![0x5b, 0x60, 0x00, 0x56];
    let output = run(request(
        prestate(&[(CONTRACT_ADDR, code)]),
        Some(CONTRACT_ADDR),
        "0x",
        60_000,
    ));

    let result = &output["executionResult"];
    assert_eq!(result["success"], false);
    assert_eq!(result["gasUsed"], 60_000);
    assert_eq!(result["haltReason"], "OutOfGas");
    assert!(result.get("revertReason").is_none());
    assert_eq!(output["calls"]["error"], "out of gas");
}

#[test]
fn logs_are_reported_on_success() {
    // PUSH1 0x2a, PUSH1 0, MSTORE8, PUSH32 topic, PUSH1 1, PUSH1 0, LOG1, STOP
    let mut code = vec![0x60, 0x2a, 0x60, 0x00, 0x53, 0x7f];
    code.extend_from_slice(&[0xee; 32]);
    code.extend_from_slice(&[0x60, 0x01, 0x60, 0x00, 0xa1, 0x00]);

    let output = run(request(
        prestate(&[(CONTRACT_ADDR, code)]),
        Some(CONTRACT_ADDR),
        "0x",
        100_000,
    ));

    let logs = output["executionResult"]["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["address"], CONTRACT_ADDR);
    assert_eq!(logs[0]["data"], "0x2a");
    assert_eq!(logs[0]["topics"][0], format!("0x{}", "ee".repeat(32)));
    assert_eq!(output["calls"]["logs"][0]["data"], "0x2a");
}

fn count_frames(frame: &serde_json::Value) -> usize {
    frame["calls"]
        .as_array()
        .map(|calls| calls.iter().map(|call| 1 + count_frames(call)).sum())
        .unwrap_or(0)
}
