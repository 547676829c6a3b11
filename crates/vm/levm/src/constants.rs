use txtrace_common::U256;

pub const WORD_SIZE_IN_BYTES_USIZE: usize = 32;
pub const WORD_SIZE_IN_BYTES_U64: u64 = 32;

pub const SUCCESS: U256 = U256::one();
pub const FAIL: U256 = U256::zero();

pub const STACK_LIMIT: usize = 1024;

/// EIP-170
pub const MAX_CODE_SIZE: usize = 0x6000;
/// EIP-3860
pub const INIT_CODE_MAX_SIZE: usize = 49152;

pub const MAX_CALL_DEPTH: usize = 1024;

/// EIP-150: all but one 64th of the remaining gas is forwarded to a child call.
pub const CALL_GAS_RETENTION_DIVISOR: u64 = 64;

/// EIP-3541
pub const INVALID_CONTRACT_PREFIX: u8 = 0xef;

pub const MEMORY_EXPANSION_QUOTIENT: u64 = 512;
