use super::helpers::*;
use serde_json::{Value, json};

const L1_FEE_VAULT: &str = "0x420000000000000000000000000000000000001a";
const L1_BLOCK: &str = "0x4200000000000000000000000000000000000015";
const DEPOSITOR: &str = "0xdeaddeaddeaddeaddeaddeaddeaddeaddead0001";

fn with_flag(mut request: Value, op_stack: bool) -> Value {
    request["opStack"] = json!(op_stack);
    request
}

#[test]
fn flag_does_not_change_execution() {
    let mut code = sstore(0, 7);
    code.push(0x00);
    let base = request(
        prestate(&[(CONTRACT_ADDR, code)]),
        Some(CONTRACT_ADDR),
        "0x",
        100_000,
    );

    let plain = run(with_flag(base.clone(), false));
    let op = run(with_flag(base, true));

    assert_eq!(plain["executionResult"]["output"], op["executionResult"]["output"]);
    assert_eq!(plain["executionResult"]["gasUsed"], op["executionResult"]["gasUsed"]);
    assert_eq!(
        plain["stateDiff"][CONTRACT_ADDR]["storage"],
        op["stateDiff"][CONTRACT_ADDR]["storage"]
    );
    assert_eq!(
        op["stateDiff"][CONTRACT_ADDR]["storage"][slot(0)]["to"],
        "0x7"
    );
    assert!(plain["executionResult"].get("l1Fee").is_none());
    assert_eq!(op["executionResult"]["l1Fee"], "0x0");
}

#[test]
fn l1_fee_is_charged_to_the_sender() {
    let mut request = request(prestate(&[]), Some(RECIPIENT_ADDR), "0x", 21_000);
    request["blockEnv"]["l1BaseFee"] = json!(1_000_000);
    request["blockEnv"]["l1BaseFeeScalar"] = json!(1_000);
    request["blockEnv"]["l1BlobBaseFee"] = json!(0);
    request["blockEnv"]["l1BlobBaseFeeScalar"] = json!(0);

    let plain = run(with_flag(request.clone(), false));
    let op = run(with_flag(request, true));

    // 1088 * 16 * 1_000_000 * 1_000 / 16_000_000
    let l1_fee = 1_088_000;
    assert_eq!(op["executionResult"]["l1Fee"], quantity(l1_fee));
    assert_eq!(
        plain["stateDiff"][SENDER_ADDR]["balance"]["to"],
        quantity(SENDER_BALANCE - 21_000 * EFFECTIVE_PRICE)
    );
    assert_eq!(
        op["stateDiff"][SENDER_ADDR]["balance"]["to"],
        quantity(SENDER_BALANCE - 21_000 * EFFECTIVE_PRICE - l1_fee)
    );
    assert_eq!(op["stateDiff"][L1_FEE_VAULT]["balance"]["to"], quantity(l1_fee));
    assert!(plain["stateDiff"].get(L1_FEE_VAULT).is_none());
}

#[test]
fn l1_fee_counts_towards_the_balance_check() {
    let mut request = request(prestate(&[]), Some(RECIPIENT_ADDR), "0x", 21_000);
    request["blockEnv"]["l1BaseFee"] = json!(1_000_000_000_000u64);
    request["blockEnv"]["l1BaseFeeScalar"] = json!(1_000);

    assert_eq!(run(with_flag(request.clone(), false))["executionResult"]["success"], true);
    assert_error(&run(with_flag(request, true)), "InsufficientBalanceError");
}

#[test]
fn system_deposit_pays_no_fees() {
    let mut request = request(json!({}), Some(L1_BLOCK), "0x", 100_000);
    request["from"] = json!(DEPOSITOR);
    request["gasPrice"] = json!(0);
    request["gasPriorityFee"] = json!(0);

    let output = run(with_flag(request, true));
    assert_eq!(output["executionResult"]["success"], true);
    assert!(output["stateDiff"].get(COINBASE_ADDR).is_none());
    assert_eq!(output["stateDiff"][DEPOSITOR]["nonce"], json!({"from": 0, "to": 1}));
}
