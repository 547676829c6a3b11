use crate::errors::TraceError;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use txtrace_common::{Address, H256, U256, serde_utils};
use txtrace_levm::environment::L1FeeOverrides;

/// Block the simulated transaction is included in.
///
/// Read from `{number, timestamp, gasLimit, baseFee, difficulty, prevrandao, coinbase}`, plus
/// the optional `blobBaseFee` and OP-Stack L1 fee fields. Missing fields take their default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockEnvironment {
    #[serde(deserialize_with = "serde_utils::u256::quantity::deserialize")]
    pub number: U256,
    #[serde(deserialize_with = "serde_utils::u256::quantity::deserialize")]
    pub timestamp: U256,
    #[serde(deserialize_with = "serde_utils::uint64::quantity::deserialize")]
    pub gas_limit: u64,
    #[serde(deserialize_with = "serde_utils::u256::quantity::deserialize")]
    pub base_fee: U256,
    #[serde(deserialize_with = "serde_utils::u256::quantity::deserialize")]
    pub difficulty: U256,
    #[serde(deserialize_with = "serde_utils::h256::deserialize_opt")]
    pub prevrandao: Option<H256>,
    #[serde(deserialize_with = "serde_utils::address::deserialize")]
    pub coinbase: Address,
    #[serde(deserialize_with = "blob_base_fee")]
    pub blob_base_fee: U256,
    /// L1 fee parameters for OP-Stack chains. Ignored elsewhere.
    #[serde(flatten)]
    pub l1_fee: L1FeeOverrides,
}

impl Default for BlockEnvironment {
    fn default() -> Self {
        Self {
            number: U256::zero(),
            timestamp: U256::zero(),
            gas_limit: 0,
            base_fee: U256::zero(),
            difficulty: U256::zero(),
            prevrandao: None,
            coinbase: Address::zero(),
            // Minimum blob base fee.
            blob_base_fee: U256::one(),
            l1_fee: L1FeeOverrides::default(),
        }
    }
}

/// `null` falls back to the minimum like a missing field does.
fn blob_base_fee<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(serde_utils::u256::quantity::deserialize_opt(deserializer)?.unwrap_or(U256::one()))
}

impl BlockEnvironment {
    pub fn from_json(value: &Value) -> Result<Self, TraceError> {
        if !value.is_object() {
            return Err(TraceError::MalformedBlockEnvironment(
                "block environment must be a JSON object".to_string(),
            ));
        }
        serde_path_to_error::deserialize(value).map_err(|e| {
            TraceError::MalformedBlockEnvironment(format!("`{}`: {}", e.path(), e.inner()))
        })
    }

    pub fn from_json_str(text: &str) -> Result<Self, TraceError> {
        let value: Value = serde_json::from_str(text).map_err(|e| {
            TraceError::MalformedBlockEnvironment(format!("invalid JSON: {e}"))
        })?;
        Self::from_json(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_documented_fields() {
        let block = BlockEnvironment::from_json(&json!({
            "number": 19_000_000,
            "timestamp": "0x65a0b4c0",
            "gasLimit": "30000000",
            "baseFee": "0x3b9aca00",
            "difficulty": 0,
            "prevrandao": "0x01",
            "coinbase": "0x4838b106fce9647bdf1e7877bf73ce8b0bad5f97",
            "l1BaseFee": "0x10"
        }))
        .unwrap();

        assert_eq!(block.number, U256::from(19_000_000));
        assert_eq!(block.gas_limit, 30_000_000);
        assert_eq!(block.base_fee, U256::from(1_000_000_000));
        assert_eq!(block.prevrandao, Some(H256::from_low_u64_be(1)));
        assert_eq!(block.blob_base_fee, U256::one());
        assert_eq!(block.l1_fee.l1_base_fee, Some(U256::from(16)));
        assert_eq!(block.l1_fee.base_fee_scalar, None);
    }

    #[test]
    fn null_fields_read_as_missing() {
        let block = BlockEnvironment::from_json(&json!({
            "number": null,
            "prevrandao": null,
            "blobBaseFee": null,
            "l1BlobBaseFeeScalar": "0x0f"
        }))
        .unwrap();
        assert_eq!(block.number, U256::zero());
        assert_eq!(block.prevrandao, None);
        assert_eq!(block.blob_base_fee, U256::one());
        assert_eq!(block.l1_fee.blob_base_fee_scalar, Some(U256::from(15)));
    }

    #[test]
    fn rejects_malformed_fields() {
        let error = BlockEnvironment::from_json(&json!({"coinbase": "0x12"})).unwrap_err();
        assert_eq!(error.kind(), "MalformedBlockEnvironmentError");
        assert!(error.to_string().contains("`coinbase`"));
        assert!(error.to_string().contains("`0x12` is not a 20-byte address"));

        let error = BlockEnvironment::from_json(&json!({"gasLimit": "0x1ffffffffffffffff"}))
            .unwrap_err();
        assert!(error.to_string().contains("`gasLimit`"));
        assert!(error.to_string().contains("does not fit in 64 bits"));

        let error = BlockEnvironment::from_json_str("[1, 2]").unwrap_err();
        assert_eq!(error.kind(), "MalformedBlockEnvironmentError");
    }
}
