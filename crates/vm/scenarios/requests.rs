use super::helpers::*;
use crate::{Prestate, format_and_trace_transaction};
use serde_json::{Value, json};

#[test]
fn unknown_chain_needs_the_op_stack_flag() {
    let mut request = request(prestate(&[]), Some(RECIPIENT_ADDR), "0x", 21_000);
    request["chainId"] = json!(999_999);
    assert_error(&run(request.clone()), "UnsupportedChainError");

    request["opStack"] = json!(true);
    assert_eq!(run(request)["executionResult"]["success"], true);
}

#[test]
fn malformed_inputs_have_their_own_kinds() {
    let mut bad_prestate = request(json!({"0x1234": {}}), Some(RECIPIENT_ADDR), "0x", 21_000);
    assert_error(&run(bad_prestate.clone()), "MalformedPrestateError");
    bad_prestate["prestate"] = json!([]);
    assert_error(&run(bad_prestate.clone()), "MalformedPrestateError");
    bad_prestate["prestate"] = json!({
        "0x00000000000000000000000000000000000000ab": {"balance": "0x1"},
        "0x00000000000000000000000000000000000000AB": {"balance": "0x2"}
    });
    assert_error(&run(bad_prestate), "MalformedPrestateError");

    let mut bad_block = request(prestate(&[]), Some(RECIPIENT_ADDR), "0x", 21_000);
    bad_block["blockEnv"]["coinbase"] = json!(12);
    assert_error(&run(bad_block), "MalformedBlockEnvironmentError");

    let bad_data = request(prestate(&[]), Some(RECIPIENT_ADDR), "0xabc", 21_000);
    assert_error(&run(bad_data), "MalformedTransactionError");
}

#[test]
fn flat_entry_point_returns_either_shape() {
    let prestate = prestate(&[]).to_string();
    let block_env = block_env().to_string();
    let trace = |to: &str, prestate: &str, block_env: &str| -> Value {
        let output = format_and_trace_transaction(
            1,
            SENDER_ADDR,
            to,
            0,
            "0x",
            21_000,
            u128::from(GAS_PRICE),
            u128::from(PRIORITY_FEE),
            block_env,
            prestate,
            false,
        );
        serde_json::from_str(&output).unwrap()
    };

    let output = trace(RECIPIENT_ADDR, &prestate, &block_env);
    assert_eq!(output["executionResult"]["gasUsed"], 21_000);
    assert!(output.get("error").is_none());

    assert_error(&trace(RECIPIENT_ADDR, "{not json", &block_env), "MalformedPrestateError");
    assert_error(&trace(RECIPIENT_ADDR, &prestate, ""), "MalformedBlockEnvironmentError");
    assert_error(&trace("0x12", &prestate, &block_env), "MalformedTransactionError");
}

#[test]
fn prestate_survives_a_round_trip() {
    let input = json!({
        "0x3000000000000000000000000000000000000003": {
            "balance": "0xde0b6b3a7640000",
            "nonce": 5,
            "code": "0x6001600055",
            "storage": {
                "0x0000000000000000000000000000000000000000000000000000000000000001": "0x2a",
                "0x00000000000000000000000000000000000000000000000000000000000000ff": "0x1"
            }
        },
        "0x1000000000000000000000000000000000000001": {
            "balance": "0x0",
            "nonce": 0,
            "code": "0x",
            "storage": {}
        }
    });

    let prestate = Prestate::from_json(&input).unwrap();
    assert_eq!(serde_json::to_value(&prestate).unwrap(), input);
}
