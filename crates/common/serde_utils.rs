//! Serde adapters for the hex and numeric encodings used in request and result JSON.
//!
//! Quantities are emitted as `0x`-prefixed minimal hex. On input, the `quantity` adapters also
//! accept plain JSON numbers and decimal strings, which is what most prestate dumps contain.
//! A `null` input reads the same as a missing field.

use crate::utils::u256_to_h256;
use serde::{Deserialize, Deserializer, de::Error};
use std::collections::BTreeMap;

/// A numeric value as it may appear in JSON input.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawQuantity {
    Number(u64),
    Text(String),
}

pub fn parse_u256(text: &str) -> Result<ethereum_types::U256, String> {
    let text = text.trim();
    if let Some(digits) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        if digits.is_empty() {
            return Ok(ethereum_types::U256::zero());
        }
        if digits.len() > 64 {
            return Err(format!("hex quantity `{text}` exceeds 256 bits"));
        }
        ethereum_types::U256::from_str_radix(digits, 16).map_err(|e| format!("`{text}`: {e}"))
    } else {
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("`{text}` is not a non-negative integer"));
        }
        ethereum_types::U256::from_dec_str(text).map_err(|e| format!("`{text}`: {e}"))
    }
}

pub fn parse_u64(text: &str) -> Result<u64, String> {
    let value = parse_u256(text)?;
    if value > ethereum_types::U256::from(u64::MAX) {
        return Err(format!("`{text}` does not fit in 64 bits"));
    }
    Ok(value.low_u64())
}

/// Decodes a hex byte string, with or without the `0x` prefix.
pub fn parse_hex_bytes(text: &str) -> Result<::bytes::Bytes, String> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    hex::decode(digits)
        .map(::bytes::Bytes::from)
        .map_err(|e| format!("`{text}` is not valid hex: {e}"))
}

/// A 20-byte address as 40 hex digits, with or without `0x`. Mixed case is accepted without
/// checksum validation.
pub fn parse_address(text: &str) -> Result<ethereum_types::Address, String> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if digits.len() != 40 {
        return Err(format!("`{text}` is not a 20-byte address"));
    }
    let bytes = hex::decode(digits).map_err(|e| format!("`{text}` is not valid hex: {e}"))?;
    Ok(ethereum_types::Address::from_slice(&bytes))
}

/// A storage key or value: any quantity up to 256 bits, left-padded to a full word.
pub fn parse_word(text: &str) -> Result<ethereum_types::H256, String> {
    parse_u256(text).map(u256_to_h256)
}

fn parse_quantity<E: Error>(raw: RawQuantity) -> Result<ethereum_types::U256, E> {
    match raw {
        RawQuantity::Number(number) => Ok(ethereum_types::U256::from(number)),
        RawQuantity::Text(text) => parse_u256(&text).map_err(E::custom),
    }
}

pub mod u256 {
    use super::*;
    use ethereum_types::U256;
    use serde::Serializer;

    pub mod hex_str {
        use super::*;

        pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.serialize_str(&format!("{value:#x}"))
        }
    }

    pub mod quantity {
        use super::*;

        /// `null` reads as zero.
        pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
        where
            D: Deserializer<'de>,
        {
            Ok(deserialize_opt(deserializer)?.unwrap_or_default())
        }

        pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<U256>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<RawQuantity>::deserialize(deserializer)?
                .map(parse_quantity)
                .transpose()
        }
    }
}

pub mod uint64 {
    use super::*;
    use serde::Serializer;

    pub mod hex_str {
        use super::*;

        pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.serialize_str(&format!("{value:#x}"))
        }
    }

    pub mod quantity {
        use super::*;

        /// `null` reads as zero.
        pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Option::<RawQuantity>::deserialize(deserializer)? {
                None => Ok(0),
                Some(RawQuantity::Number(number)) => Ok(number),
                Some(RawQuantity::Text(text)) => parse_u64(&text).map_err(D::Error::custom),
            }
        }
    }
}

pub mod bytes {
    use super::*;
    use ::bytes::Bytes;
    use serde::Serializer;

    pub fn serialize<S>(value: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(value)))
    }

    /// `null` reads as empty.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(Bytes::new()),
            Some(value) => parse_hex_bytes(&value).map_err(D::Error::custom),
        }
    }
}

pub mod address {
    use super::*;
    use ethereum_types::Address;

    /// `null` reads as the zero address.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Address, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(Address::zero()),
            Some(value) => parse_address(&value).map_err(D::Error::custom),
        }
    }
}

/// 32-byte words given as quantities, left-padded.
pub mod h256 {
    use super::*;
    use ethereum_types::H256;

    pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<H256>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(u256::quantity::deserialize_opt(deserializer)?.map(u256_to_h256))
    }
}

/// Account storage as `{slot: value}`. Keys are hex words, values are quantities.
pub mod storage {
    use super::*;
    use ethereum_types::{H256, U256};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<H256, U256>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<BTreeMap<String, RawQuantity>>::deserialize(deserializer)?
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| -> Result<_, D::Error> {
                let slot = parse_word(&key)
                    .map_err(|e| D::Error::custom(format!("storage key: {e}")))?;
                let value = parse_quantity::<D::Error>(value)
                    .map_err(|e| D::Error::custom(format!("storage slot {slot:#x}: {e}")))?;
                Ok((slot, value))
            })
            .collect()
    }
}
