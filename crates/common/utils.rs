use ethereum_types::{H256, U256};
use sha3::{Digest, Keccak256};

pub fn keccak(data: impl AsRef<[u8]>) -> H256 {
    H256(Keccak256::digest(data.as_ref()).into())
}

#[inline]
pub const fn u256_from_big_endian_const<const N: usize>(slice: [u8; N]) -> U256 {
    const { assert!(N <= 32, "N must be less or equal to 32") };

    let mut padded = [0u8; 32];
    let mut i = 0;
    while i < N {
        padded[32 - N + i] = slice[i];
        i += 1;
    }

    let mut ret = [0u64; 4];
    let mut limb = 0;
    while limb < 4 {
        let mut value = 0u64;
        let mut byte = 0;
        while byte < 8 {
            value = (value << 8) | padded[(3 - limb) * 8 + byte] as u64;
            byte += 1;
        }
        ret[limb] = value;
        limb += 1;
    }

    U256(ret)
}

#[inline]
pub fn u256_to_big_endian(value: U256) -> [u8; 32] {
    value.to_big_endian()
}

#[inline]
pub fn u256_to_h256(value: U256) -> H256 {
    H256(value.to_big_endian())
}

#[inline]
pub fn h256_to_u256(value: H256) -> U256 {
    U256::from_big_endian(value.as_bytes())
}
