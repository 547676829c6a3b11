use bytes::Bytes;
use ethereum_types::{Address, H256};
use serde::Serialize;

/// An event emitted by `LOG0`..`LOG4`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<H256>,
    #[serde(with = "crate::serde_utils::bytes")]
    pub data: Bytes,
}
