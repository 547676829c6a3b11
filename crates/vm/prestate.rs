use crate::errors::TraceError;
use bytes::Bytes;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, btree_map::Entry};
use txtrace_common::{
    Address, H256, U256,
    serde_utils::{self, parse_address},
    types::{Account, Code},
};

/// One account of the prestate, as supplied by the caller.
///
/// Every field is optional and defaults to zero or empty. Serializes back to the input shape:
/// `{balance, nonce, code, storage}` with hex quantities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrestateAccount {
    #[serde(deserialize_with = "serde_utils::u256::quantity::deserialize")]
    pub balance: U256,
    #[serde(deserialize_with = "serde_utils::uint64::quantity::deserialize")]
    pub nonce: u64,
    #[serde(with = "serde_utils::bytes")]
    pub code: Bytes,
    #[serde(deserialize_with = "serde_utils::storage::deserialize")]
    pub storage: BTreeMap<H256, U256>,
}

impl PrestateAccount {
    pub fn to_account(&self) -> Account {
        let storage = self
            .storage
            .iter()
            .filter(|(_, value)| !value.is_zero())
            .map(|(key, value)| (*key, *value))
            .collect();
        Account::new(
            self.balance,
            Code::from_bytecode(self.code.clone()),
            self.nonce,
            storage,
        )
    }
}

/// The world state a trace starts from, keyed by address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Prestate(pub BTreeMap<Address, PrestateAccount>);

impl Prestate {
    /// Parses a prestate object. Fails on the first malformed account without building anything.
    ///
    /// Two keys naming the same address, such as a checksummed and a lowercase spelling, are
    /// rejected rather than merged.
    pub fn from_json(value: &Value) -> Result<Self, TraceError> {
        let object = value.as_object().ok_or_else(|| {
            TraceError::MalformedPrestate("prestate must be a JSON object".to_string())
        })?;

        let mut accounts = BTreeMap::new();
        for (key, account) in object {
            let address = parse_address(key)
                .map_err(|e| TraceError::MalformedPrestate(format!("address {e}")))?;
            if !account.is_object() {
                return Err(TraceError::MalformedPrestate(format!(
                    "account {key}: account must be a JSON object"
                )));
            }
            let account: PrestateAccount = serde_path_to_error::deserialize(account)
                .map_err(|e| {
                    TraceError::MalformedPrestate(format!(
                        "account {key}: `{}`: {}",
                        e.path(),
                        e.inner()
                    ))
                })?;
            match accounts.entry(address) {
                Entry::Vacant(entry) => {
                    entry.insert(account);
                }
                Entry::Occupied(_) => {
                    return Err(TraceError::MalformedPrestate(format!(
                        "address {address:#x} appears more than once"
                    )));
                }
            }
        }
        Ok(Self(accounts))
    }

    pub fn from_json_str(text: &str) -> Result<Self, TraceError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| TraceError::MalformedPrestate(format!("invalid JSON: {e}")))?;
        Self::from_json(&value)
    }

    pub fn get(&self, address: &Address) -> Option<&PrestateAccount> {
        self.0.get(address)
    }

    /// Accounts in the form the interpreter's database expects.
    pub fn to_accounts(&self) -> FxHashMap<Address, Account> {
        self.0
            .iter()
            .map(|(address, account)| (*address, account.to_account()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_fields_default_to_empty() {
        let prestate = Prestate::from_json(&json!({
            "0x1111111111111111111111111111111111111111": {}
        }))
        .unwrap();
        let account = prestate.get(&Address::repeat_byte(0x11)).unwrap();
        assert_eq!(account, &PrestateAccount::default());
    }

    #[test]
    fn records_round_trip() {
        let input = json!({
            "0x2222222222222222222222222222222222222222": {
                "balance": "0xde0b6b3a7640000",
                "nonce": 7,
                "code": "0x6001600055",
                "storage": {
                    "0x0000000000000000000000000000000000000000000000000000000000000001":
                        "0x00000000000000000000000000000000000000000000000000000000000000ff"
                }
            }
        });
        let prestate = Prestate::from_json(&input).unwrap();
        let account = prestate.get(&Address::repeat_byte(0x22)).unwrap();
        assert_eq!(account.balance, U256::exp10(18));
        assert_eq!(account.storage.get(&H256::from_low_u64_be(1)), Some(&U256::from(0xff)));

        let encoded = serde_json::to_value(&prestate).unwrap();
        assert_eq!(Prestate::from_json(&encoded).unwrap(), prestate);
        assert_eq!(encoded["0x2222222222222222222222222222222222222222"]["nonce"], 7);
    }

    #[test]
    fn malformed_fields_are_reported() {
        let error = Prestate::from_json(&json!({
            "0x3333333333333333333333333333333333333333": {"balance": "lots"}
        }))
        .unwrap_err();
        assert_eq!(error.kind(), "MalformedPrestateError");
        assert!(error.to_string().contains("account 0x3333333333333333333333333333333333333333"));
        assert!(error.to_string().contains("`balance`"));

        let error = Prestate::from_json(&json!({"0x33": {}})).unwrap_err();
        assert!(error.to_string().contains("address"));

        let error = Prestate::from_json(&json!({
            "0x3333333333333333333333333333333333333333": {"storage": {"0x01": "0xzz"}}
        }))
        .unwrap_err();
        assert!(error.to_string().contains("storage slot"));

        let error = Prestate::from_json(&json!({
            "0x3333333333333333333333333333333333333333": "0x01"
        }))
        .unwrap_err();
        assert!(error.to_string().contains("must be a JSON object"));
    }

    #[test]
    fn null_fields_read_as_missing() {
        let prestate = Prestate::from_json(&json!({
            "0x4444444444444444444444444444444444444444": {
                "balance": null,
                "nonce": null,
                "code": null,
                "storage": null
            }
        }))
        .unwrap();
        let account = prestate.get(&Address::repeat_byte(0x44)).unwrap();
        assert_eq!(account, &PrestateAccount::default());
    }

    #[test]
    fn differently_spelled_duplicates_are_rejected() {
        let error = Prestate::from_json(&json!({
            "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed": {"balance": "0x1"},
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed": {"balance": "0x2"}
        }))
        .unwrap_err();
        assert_eq!(error.kind(), "MalformedPrestateError");
        assert!(error.to_string().contains("appears more than once"));

        let error = Prestate::from_json_str(
            r#"{"1111111111111111111111111111111111111111": {},
                "0x1111111111111111111111111111111111111111": {}}"#,
        )
        .unwrap_err();
        assert!(error.to_string().contains("appears more than once"));
    }
}
