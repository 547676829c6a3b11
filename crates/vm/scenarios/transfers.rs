use super::helpers::*;
use serde_json::json;

fn transfer(value: u64, gas_limit: u64) -> serde_json::Value {
    let mut request = request(prestate(&[]), Some(RECIPIENT_ADDR), "0x", gas_limit);
    request["value"] = json!(value);
    run(request)
}

#[test]
fn plain_transfer() {
    let output = transfer(1_000, 50_000);

    assert_eq!(
        output["executionResult"],
        json!({"success": true, "gasUsed": 21000, "output": "0x"})
    );

    let mut expected = vec![
        SENDER_ADDR.to_string(),
        RECIPIENT_ADDR.to_string(),
        COINBASE_ADDR.to_string(),
    ];
    expected.sort();
    assert_eq!(diff_addresses(&output), expected);

    let diff = &output["stateDiff"];
    let sender = &diff[SENDER_ADDR];
    assert_eq!(sender["nonce"], json!({"from": 0, "to": 1}));
    assert_eq!(sender["balance"]["from"], quantity(SENDER_BALANCE));
    assert_eq!(
        sender["balance"]["to"],
        quantity(SENDER_BALANCE - 1_000 - 21_000 * EFFECTIVE_PRICE)
    );
    assert_eq!(diff[RECIPIENT_ADDR]["balance"], json!({"from": "0x0", "to": quantity(1_000)}));
    assert_eq!(
        diff[COINBASE_ADDR]["balance"]["to"],
        quantity(21_000 * PRIORITY_FEE)
    );
    assert_eq!(diff[RECIPIENT_ADDR]["storage"], json!({}));

    let calls = &output["calls"];
    assert_eq!(calls["type"], "CALL");
    assert_eq!(calls["from"], SENDER_ADDR);
    assert_eq!(calls["to"], RECIPIENT_ADDR);
    assert_eq!(calls["value"], quantity(1_000));
    assert_eq!(calls["gasUsed"], quantity(21_000));
    assert_eq!(calls["calls"], json!([]));
}

#[test]
fn gas_limit_below_intrinsic_is_a_request_error() {
    let output = transfer(1_000, 20_999);
    assert_error(&output, "IntrinsicGasTooLowError");
}

#[test]
fn insufficient_balance_leaves_no_trace() {
    let output = transfer(SENDER_BALANCE, 21_000);
    assert_error(&output, "InsufficientBalanceError");
    assert!(output.get("stateDiff").is_none());
    assert!(output.get("calls").is_none());
}

#[test]
fn nonce_mismatch() {
    let mut request = request(prestate(&[]), Some(RECIPIENT_ADDR), "0x", 21_000);
    request["nonce"] = json!(3);
    assert_error(&run(request), "NonceMismatchError");
}

#[test]
fn fee_cap_below_base_fee() {
    let mut request = request(prestate(&[]), Some(RECIPIENT_ADDR), "0x", 21_000);
    request["gasPrice"] = json!(BASE_FEE - 1);
    request["gasPriorityFee"] = json!(0);
    assert_error(&run(request), "FeeCapTooLowError");
}

#[test]
fn calldata_to_codeless_account_pays_for_its_bytes() {
    // One zero byte and one non-zero byte: 4 + 16 under the standard cost, 10 + 40 under the
    // floor, so the floor wins.
    let output = run(request(prestate(&[]), Some(RECIPIENT_ADDR), "0x00ff", 30_000));
    assert_eq!(output["executionResult"]["success"], true);
    assert_eq!(output["executionResult"]["gasUsed"], 21_050);
}
