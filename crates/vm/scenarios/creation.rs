use super::helpers::*;
use serde_json::json;
use txtrace_common::{U256, evm::calculate_create_address};

/// Init code returning `runtime_byte` as a one-byte runtime:
/// PUSH1 b, PUSH1 0, MSTORE8, PUSH1 1, PUSH1 0, RETURN
fn init_code(runtime_byte: u8) -> String {
    let code = [0x60, runtime_byte, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00, 0xf3];
    format!("0x{}", hex::encode(code))
}

#[test]
fn deploys_a_contract() {
    let output = run(request(prestate(&[]), None, &init_code(0x00), 100_000));
    let created = format!("{:#x}", calculate_create_address(address(SENDER_ADDR), 0));

    assert_eq!(output["executionResult"]["success"], true);
    assert_eq!(output["executionResult"]["output"], "0x00");

    let account = &output["stateDiff"][&created];
    assert_eq!(account["code"], json!({"from": "0x", "to": "0x00"}));
    assert_eq!(account["nonce"], json!({"from": 0, "to": 1}));

    assert_eq!(output["calls"]["type"], "CREATE");
    assert_eq!(output["calls"]["to"], created);
    // The frame reports the created address, the result keeps the runtime code.
    assert_eq!(output["calls"]["output"], created);
    assert_eq!(output["stateDiff"][SENDER_ADDR]["nonce"]["to"], 1);
}

#[test]
fn nested_create_frame_outputs_the_address() {
    // Store the init code in memory, then CREATE(0, 22, 10) and keep the address in slot 0.
    let init = [0x60, 0x00, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00, 0xf3];
    let mut factory = vec![0x69]; // PUSH10
    factory.extend_from_slice(&init);
    factory.extend_from_slice(&[
        0x60, 0x00, 0x52, // MSTORE at 0, init code in the low 10 bytes
        0x60, 0x0a, // size
        0x60, 0x16, // offset
        0x60, 0x00, // value
        0xf0, // CREATE
        0x60, 0x00, 0x55, // SSTORE to slot 0
        0x00,
    ]);

    let output = run(request(
        prestate(&[(CONTRACT_ADDR, factory)]),
        Some(CONTRACT_ADDR),
        "0x",
        200_000,
    ));
    let created_address = calculate_create_address(address(CONTRACT_ADDR), 1);
    let created = format!("{created_address:#x}");

    assert_eq!(output["executionResult"]["success"], true);
    let frame = &output["calls"]["calls"][0];
    assert_eq!(frame["type"], "CREATE");
    assert_eq!(frame["from"], CONTRACT_ADDR);
    assert_eq!(frame["to"], created);
    assert_eq!(frame["output"], created);
    assert_eq!(output["stateDiff"][&created]["code"]["to"], "0x00");
    assert_eq!(
        output["stateDiff"][CONTRACT_ADDR]["storage"][slot(0)]["to"],
        format!("{:#x}", U256::from_big_endian(created_address.as_bytes()))
    );
}

#[test]
fn rejects_code_starting_with_ef() {
    let output = run(request(prestate(&[]), None, &init_code(0xef), 100_000));
    let created = format!("{:#x}", calculate_create_address(address(SENDER_ADDR), 0));

    let result = &output["executionResult"];
    assert_eq!(result["success"], false);
    assert_eq!(result["haltReason"], "CreateContractStartingWithEF");
    assert_eq!(result["gasUsed"], 100_000);
    assert!(output["stateDiff"].get(&created).is_none());
}

#[test]
fn empty_recipient_string_also_creates() {
    let mut request = request(prestate(&[]), None, &init_code(0x00), 100_000);
    request["to"] = json!("0x");
    let output = run(request);
    assert_eq!(output["calls"]["type"], "CREATE");
}
