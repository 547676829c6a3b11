use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use serde::Serialize;

/// Kind of frame in a call trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum CallType {
    #[default]
    CALL,
    CALLCODE,
    STATICCALL,
    DELEGATECALL,
    CREATE,
    CREATE2,
}

impl CallType {
    pub fn is_create(&self) -> bool {
        matches!(self, Self::CREATE | Self::CREATE2)
    }
}

/// One frame of a call trace, serialized in the shape of geth's `callTracer`.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CallTraceFrame {
    #[serde(rename = "type")]
    pub call_type: CallType,
    pub from: Address,
    pub to: Address,
    #[serde(with = "crate::serde_utils::u256::hex_str")]
    pub value: U256,
    #[serde(with = "crate::serde_utils::uint64::hex_str")]
    pub gas: u64,
    #[serde(with = "crate::serde_utils::uint64::hex_str")]
    pub gas_used: u64,
    #[serde(with = "crate::serde_utils::bytes")]
    pub input: Bytes,
    #[serde(with = "crate::serde_utils::bytes")]
    pub output: Bytes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revert_reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<CallLog>,
    pub calls: Vec<CallTraceFrame>,
}

impl CallTraceFrame {
    /// Number of frames below this one, at any depth.
    pub fn descendant_count(&self) -> usize {
        self.calls
            .iter()
            .map(|call| call.descendant_count().saturating_add(1))
            .sum()
    }
}

/// A log recorded inside the frame that emitted it.
#[derive(Debug, Clone, Serialize)]
pub struct CallLog {
    pub address: Address,
    pub topics: Vec<H256>,
    #[serde(with = "crate::serde_utils::bytes")]
    pub data: Bytes,
    /// Number of child calls the frame had made when the log was emitted.
    #[serde(with = "crate::serde_utils::uint64::hex_str")]
    pub position: u64,
}
