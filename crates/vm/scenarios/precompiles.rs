use super::helpers::*;
use serde_json::json;

const ECADD_ADDR: &str = "0x0000000000000000000000000000000000000006";

/// STATICCALL(gas, 0x06, 0, 128, 0, 64), then slot 0 = `store(success)`.
fn call_ecadd(setup: &[u8], store_failure: bool) -> Vec<u8> {
    let mut code = setup.to_vec();
    code.extend_from_slice(&[
        0x60, 0x40, // retSize
        0x60, 0x00, // retOffset
        0x60, 0x80, // argsSize
        0x60, 0x00, // argsOffset
        0x60, 0x06, // ecAdd
        0x5a, 0xfa, // GAS, STATICCALL
    ]);
    if store_failure {
        code.push(0x15); // ISZERO
    }
    code.extend_from_slice(&[0x60, 0x00, 0x55, 0x00]);
    code
}

#[test]
fn ecadd_of_zero_points_succeeds() {
    let output = run(request(
        prestate(&[(CONTRACT_ADDR, call_ecadd(&[], false))]),
        Some(CONTRACT_ADDR),
        "0x",
        200_000,
    ));

    assert_eq!(output["executionResult"]["success"], true);
    let frame = &output["calls"]["calls"][0];
    assert_eq!(frame["type"], "STATICCALL");
    assert_eq!(frame["to"], ECADD_ADDR);
    assert_eq!(frame["gasUsed"], quantity(150));
    assert_eq!(frame["output"], format!("0x{}", "00".repeat(64)));
    assert!(frame.get("error").is_none());

    let storage = &output["stateDiff"][CONTRACT_ADDR]["storage"];
    assert_eq!(storage[slot(0)], json!({"from": "0x0", "to": "0x1"}));
}

#[test]
fn ecadd_of_a_point_off_the_curve_fails_the_call() {
    // (1, 1): PUSH1 1, PUSH1 0x1f, MSTORE8, PUSH1 1, PUSH1 0x3f, MSTORE8
    let setup = [0x60, 0x01, 0x60, 0x1f, 0x53, 0x60, 0x01, 0x60, 0x3f, 0x53];
    let output = run(request(
        prestate(&[(CONTRACT_ADDR, call_ecadd(&setup, true))]),
        Some(CONTRACT_ADDR),
        "0x",
        200_000,
    ));

    assert_eq!(output["executionResult"]["success"], true);
    let frame = &output["calls"]["calls"][0];
    assert_eq!(frame["to"], ECADD_ADDR);
    assert_eq!(frame["error"], "point is not on the curve");
    assert_eq!(frame["gasUsed"], frame["gas"]);

    let storage = &output["stateDiff"][CONTRACT_ADDR]["storage"];
    assert_eq!(storage[slot(0)], json!({"from": "0x0", "to": "0x1"}));
}
