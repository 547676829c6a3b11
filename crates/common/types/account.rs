use crate::{constants::EMPTY_KECCACK_HASH, utils::keccak};
use bytes::Bytes;
use ethereum_types::{H256, U256};
use rustc_hash::FxHashMap;

const JUMPDEST: u8 = 0x5b;
const PUSH1: u8 = 0x60;
const PUSH32: u8 = 0x7f;

/// Contract bytecode together with its hash and the set of valid jump destinations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    pub hash: H256,
    pub bytecode: Bytes,
    /// Sorted offsets of every `JUMPDEST` that is not part of push data.
    pub jump_targets: Vec<u32>,
}

impl Default for Code {
    fn default() -> Self {
        Self {
            hash: EMPTY_KECCACK_HASH,
            bytecode: Bytes::new(),
            jump_targets: Vec::new(),
        }
    }
}

impl Code {
    pub fn from_bytecode(bytecode: Bytes) -> Self {
        let hash = if bytecode.is_empty() {
            EMPTY_KECCACK_HASH
        } else {
            keccak(&bytecode)
        };
        Self::from_bytecode_unchecked(bytecode, hash)
    }

    /// Builds a `Code` trusting the caller-supplied hash. Used for init code, whose hash is never
    /// observed.
    pub fn from_bytecode_unchecked(bytecode: Bytes, hash: H256) -> Self {
        let jump_targets = Self::compute_jump_targets(&bytecode);
        Self {
            hash,
            bytecode,
            jump_targets,
        }
    }

    fn compute_jump_targets(code: &[u8]) -> Vec<u32> {
        let mut targets = Vec::new();
        let mut pc = 0usize;
        while let Some(&opcode) = code.get(pc) {
            if opcode == JUMPDEST {
                // Code longer than u32::MAX can't be supplied in a single request.
                if let Ok(target) = u32::try_from(pc) {
                    targets.push(target);
                }
            } else if (PUSH1..=PUSH32).contains(&opcode) {
                pc = pc.saturating_add(usize::from(opcode - PUSH1) + 1);
            }
            pc = pc.saturating_add(1);
        }
        targets
    }

    pub fn is_valid_jump_target(&self, target: usize) -> bool {
        u32::try_from(target)
            .map(|target| self.jump_targets.binary_search(&target).is_ok())
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.bytecode.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytecode.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountInfo {
    pub code_hash: H256,
    pub balance: U256,
    pub nonce: u64,
}

impl Default for AccountInfo {
    fn default() -> Self {
        Self {
            code_hash: EMPTY_KECCACK_HASH,
            balance: U256::zero(),
            nonce: 0,
        }
    }
}

/// A world-state account. Storage slots that are absent read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    pub info: AccountInfo,
    pub code: Code,
    pub storage: FxHashMap<H256, U256>,
}

impl Account {
    pub fn new(balance: U256, code: Code, nonce: u64, storage: FxHashMap<H256, U256>) -> Self {
        Self {
            info: AccountInfo {
                code_hash: code.hash,
                balance,
                nonce,
            },
            code,
            storage,
        }
    }

    pub fn has_code(&self) -> bool {
        self.info.code_hash != EMPTY_KECCACK_HASH
    }

    pub fn has_nonce(&self) -> bool {
        self.info.nonce != 0
    }

    /// Empty as defined by EIP-161: no code, zero nonce and zero balance.
    pub fn is_empty(&self) -> bool {
        self.info.balance.is_zero() && !self.has_nonce() && !self.has_code()
    }

    /// Whether deploying a contract at this address must fail (EIP-684 and EIP-7610).
    pub fn create_would_collide(&self) -> bool {
        self.has_code() || self.has_nonce() || self.storage.values().any(|v| !v.is_zero())
    }

    pub fn set_code(&mut self, code: Code) {
        self.info.code_hash = code.hash;
        self.code = code;
    }
}
