use crate::{TraceRequest, render, trace_transaction};
use serde_json::{Value, json};
use txtrace_common::Address;

pub const SENDER_ADDR: &str = "0x1000000000000000000000000000000000000001";
pub const RECIPIENT_ADDR: &str = "0x2000000000000000000000000000000000000002";
pub const CONTRACT_ADDR: &str = "0x3000000000000000000000000000000000000003";
pub const COINBASE_ADDR: &str = "0xc0ffee0000000000000000000000000000000000";

pub const SENDER_BALANCE: u64 = 1_000_000_000;
pub const BASE_FEE: u64 = 7;
pub const GAS_PRICE: u64 = 10;
pub const PRIORITY_FEE: u64 = 2;
/// min(GAS_PRICE, BASE_FEE + PRIORITY_FEE)
pub const EFFECTIVE_PRICE: u64 = 9;

pub fn address(text: &str) -> Address {
    crate::parse_address(text).unwrap()
}

pub fn block_env() -> Value {
    json!({
        "number": 20_000_000,
        "timestamp": 1_720_000_000,
        "gasLimit": 30_000_000,
        "baseFee": BASE_FEE,
        "difficulty": 0,
        "prevrandao": "0x01",
        "coinbase": COINBASE_ADDR,
    })
}

/// Prestate with a funded sender and the given contracts.
pub fn prestate(contracts: &[(&str, Vec<u8>)]) -> Value {
    let mut accounts = serde_json::Map::new();
    accounts.insert(
        SENDER_ADDR.to_string(),
        json!({"balance": format!("{SENDER_BALANCE:#x}"), "nonce": 0}),
    );
    for (address, code) in contracts {
        accounts.insert(
            address.to_string(),
            json!({"balance": "0x0", "nonce": 1, "code": format!("0x{}", hex::encode(code))}),
        );
    }
    Value::Object(accounts)
}

pub fn request(prestate: Value, to: Option<&str>, data: &str, gas_limit: u64) -> Value {
    json!({
        "chainId": 1,
        "from": SENDER_ADDR,
        "to": to,
        "nonce": 0,
        "data": data,
        "gasLimit": gas_limit,
        "gasPrice": GAS_PRICE,
        "gasPriorityFee": PRIORITY_FEE,
        "blockEnv": block_env(),
        "prestate": prestate,
        "opStack": false,
    })
}

/// Runs a request and returns the serialized output, parsed back.
pub fn run(request: Value) -> Value {
    let request: TraceRequest = serde_json::from_value(request).unwrap();
    let output = render(&trace_transaction(&request), false);
    serde_json::from_str(&output).unwrap()
}

pub fn quantity(value: u64) -> Value {
    Value::String(format!("{value:#x}"))
}

/// Full 32-byte storage key as it appears in a state diff.
pub fn slot(n: u64) -> String {
    format!("0x{n:064x}")
}

pub fn assert_error(output: &Value, kind: &str) {
    assert_eq!(output["error"], true, "{output}");
    assert_eq!(output["type"], kind, "{output}");
    assert!(output["message"].is_string());
    let object = output.as_object().unwrap();
    assert_eq!(object.len(), 3, "error shape carries nothing else: {output}");
}

pub fn diff_addresses(output: &Value) -> Vec<String> {
    output["stateDiff"].as_object().unwrap().keys().cloned().collect()
}

/// PUSH1 0 x5, PUSH20 target, GAS, CALL, POP: a call forwarding all gas with no value and no
/// calldata.
pub fn call_all_gas(target: &str) -> Vec<u8> {
    let mut code = vec![
        0x60, 0x00, // retSize
        0x60, 0x00, // retOffset
        0x60, 0x00, // argsSize
        0x60, 0x00, // argsOffset
        0x60, 0x00, // value
        0x73, // PUSH20
    ];
    code.extend_from_slice(address(target).as_bytes());
    code.extend_from_slice(&[
        0x5a, // GAS
        0xf1, // CALL
        0x50, // POP
    ]);
    code
}

/// PUSH1 value, PUSH1 key, SSTORE
pub fn sstore(key: u8, value: u8) -> Vec<u8> {
    vec![0x60, value, 0x60, key, 0x55]
}
