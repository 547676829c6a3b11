use crate::utils::keccak;
use ethereum_types::{Address, H256};

/// Address of a contract deployed by `sender` with the given account nonce:
/// `keccak256(rlp([sender, nonce]))[12..]`.
pub fn calculate_create_address(sender: Address, nonce: u64) -> Address {
    let mut encoded_nonce = Vec::with_capacity(9);
    match nonce {
        0 => encoded_nonce.push(0x80),
        1..=0x7f => encoded_nonce.extend_from_slice(&nonce.to_be_bytes()[7..]),
        _ => {
            let bytes = nonce.to_be_bytes();
            let leading_zeros = (nonce.leading_zeros() / 8) as usize;
            let significant = &bytes[leading_zeros..];
            encoded_nonce.push(0x80 + significant.len() as u8);
            encoded_nonce.extend_from_slice(significant);
        }
    }

    // 0x94 = 0x80 + 20, the string header of a 20 byte address.
    let payload_len = 21 + encoded_nonce.len();
    let mut rlp = Vec::with_capacity(1 + payload_len);
    rlp.push(0xc0 + payload_len as u8);
    rlp.push(0x94);
    rlp.extend_from_slice(sender.as_bytes());
    rlp.extend_from_slice(&encoded_nonce);

    Address::from_slice(&keccak(rlp).as_bytes()[12..])
}

/// Address of a contract deployed through CREATE2:
/// `keccak256(0xff ++ sender ++ salt ++ keccak256(init_code))[12..]`.
pub fn calculate_create2_address(sender: Address, init_code: &[u8], salt: H256) -> Address {
    let mut preimage = Vec::with_capacity(85);
    preimage.push(0xff);
    preimage.extend_from_slice(sender.as_bytes());
    preimage.extend_from_slice(salt.as_bytes());
    preimage.extend_from_slice(keccak(init_code).as_bytes());

    Address::from_slice(&keccak(preimage).as_bytes()[12..])
}
