use bytes::Bytes;
use ethereum_types::{Address, U256};

/// The transaction's kind: call or create.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TxKind {
    Call(Address),
    #[default]
    Create,
}

impl TxKind {
    pub fn to(&self) -> Option<Address> {
        match self {
            Self::Call(address) => Some(*address),
            Self::Create => None,
        }
    }

    pub fn is_create(&self) -> bool {
        matches!(self, Self::Create)
    }
}

/// A fee-market transaction as simulated by the tracer. It is never signed: the sender is given
/// explicitly.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transaction {
    pub chain_id: u64,
    pub sender: Address,
    pub nonce: u64,
    pub to: TxKind,
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: u64,
    /// Fee cap per unit of gas (`maxFeePerGas`).
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

impl Transaction {
    pub fn is_create(&self) -> bool {
        self.to.is_create()
    }

    /// Number of zero and non-zero bytes in the calldata.
    pub fn calldata_byte_counts(&self) -> (u64, u64) {
        let zeros = self.data.iter().filter(|byte| **byte == 0).count() as u64;
        let non_zeros = self.data.len() as u64 - zeros;
        (zeros, non_zeros)
    }
}
