use crate::{
    constants::STACK_LIMIT,
    errors::{ExceptionalHalt, InternalError, VMError},
    memory::Memory,
};
use bytes::Bytes;
use rustc_hash::{FxHashMap, FxHashSet};
use txtrace_common::{
    Address, H256, U256,
    types::{AccountInfo, Code},
};

/// Operand stack of a call frame.
///
/// Values are stored in a fixed buffer that grows downwards: `offset` points at the top of the
/// stack and equals `STACK_LIMIT` when the stack is empty. Popping `N` values therefore yields
/// them in pop order (top first) as a contiguous array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stack {
    values: Box<[U256; STACK_LIMIT]>,
    offset: usize,
}

impl Stack {
    pub fn pop<const N: usize>(&mut self) -> Result<&[U256; N], ExceptionalHalt> {
        let start = self.offset;
        let end = start.checked_add(N).ok_or(ExceptionalHalt::StackUnderflow)?;
        if end > STACK_LIMIT {
            return Err(ExceptionalHalt::StackUnderflow);
        }
        self.offset = end;

        self.values
            .get(start..end)
            .and_then(|values| <&[U256; N]>::try_from(values).ok())
            .ok_or(ExceptionalHalt::StackUnderflow)
    }

    pub fn pop1(&mut self) -> Result<U256, ExceptionalHalt> {
        let [value] = *self.pop()?;
        Ok(value)
    }

    pub fn push(&mut self, value: U256) -> Result<(), ExceptionalHalt> {
        let next_offset = self
            .offset
            .checked_sub(1)
            .ok_or(ExceptionalHalt::StackOverflow)?;
        let slot = self
            .values
            .get_mut(next_offset)
            .ok_or(ExceptionalHalt::StackOverflow)?;
        *slot = value;
        self.offset = next_offset;
        Ok(())
    }

    pub fn push_zero(&mut self) -> Result<(), ExceptionalHalt> {
        self.push(U256::zero())
    }

    pub fn len(&self) -> usize {
        STACK_LIMIT.saturating_sub(self.offset)
    }

    pub fn is_empty(&self) -> bool {
        self.offset == STACK_LIMIT
    }

    /// Value at `depth` positions below the top.
    pub fn get(&self, depth: usize) -> Result<&U256, ExceptionalHalt> {
        if depth >= self.len() {
            return Err(ExceptionalHalt::StackUnderflow);
        }
        self.offset
            .checked_add(depth)
            .and_then(|index| self.values.get(index))
            .ok_or(ExceptionalHalt::StackUnderflow)
    }

    /// Pushes a copy of the value `depth` positions below the top.
    pub fn dup(&mut self, depth: usize) -> Result<(), ExceptionalHalt> {
        let value = *self.get(depth)?;
        self.push(value)
    }

    /// Exchanges the top of the stack with the value `depth` positions below it.
    pub fn swap(&mut self, depth: usize) -> Result<(), ExceptionalHalt> {
        if depth >= self.len() {
            return Err(ExceptionalHalt::StackUnderflow);
        }
        let other = self
            .offset
            .checked_add(depth)
            .ok_or(ExceptionalHalt::StackUnderflow)?;
        self.values.swap(self.offset, other);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.offset = STACK_LIMIT;
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self {
            values: Box::new([U256::zero(); STACK_LIMIT]),
            offset: STACK_LIMIT,
        }
    }
}

/// Account fields as they were before a frame first modified them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountBackup {
    pub info: AccountInfo,
    pub code: Code,
}

/// Changeset of a call frame, recorded as the values to restore if the frame fails.
///
/// Only the first modification of each account or slot is recorded, so restoring the backup
/// brings the state back to what it was when the frame started.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallFrameBackup {
    pub original_accounts_info: FxHashMap<Address, AccountBackup>,
    pub original_account_storage_slots: FxHashMap<Address, FxHashMap<H256, U256>>,
    /// Accounts that this frame touched for the first time in the transaction.
    pub newly_touched: FxHashSet<Address>,
}

impl CallFrameBackup {
    pub fn backup_account_info(&mut self, address: Address, info: &AccountInfo, code: &Code) {
        self.original_accounts_info
            .entry(address)
            .or_insert_with(|| AccountBackup {
                info: *info,
                code: code.clone(),
            });
    }

    pub fn backup_storage_slot(&mut self, address: Address, key: H256, value: U256) {
        self.original_account_storage_slots
            .entry(address)
            .or_default()
            .entry(key)
            .or_insert(value);
    }

    /// Folds a successful child's changeset into this one, keeping the older originals.
    pub fn extend(&mut self, child: CallFrameBackup) {
        for (address, account) in child.original_accounts_info {
            self.original_accounts_info.entry(address).or_insert(account);
        }
        for (address, slots) in child.original_account_storage_slots {
            let parent_slots = self.original_account_storage_slots.entry(address).or_default();
            for (key, value) in slots {
                parent_slots.entry(key).or_insert(value);
            }
        }
        self.newly_touched.extend(child.newly_touched);
    }

    pub fn clear(&mut self) {
        self.original_accounts_info.clear();
        self.original_account_storage_slots.clear();
        self.newly_touched.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A call frame, or execution environment, is the context in which
/// the EVM is currently executing.
pub struct CallFrame {
    /// Max gas a callframe can use
    pub gas_limit: u64,
    pub gas_remaining: u64,
    /// Program counter
    pub pc: usize,
    /// Address of the account that sent the message
    pub msg_sender: Address,
    /// Address of the recipient of the message
    pub to: Address,
    /// Address of the code to execute. Usually the same as `to`, but can be different
    pub code_address: Address,
    pub bytecode: Code,
    /// Value sent along the transaction
    pub msg_value: U256,
    pub stack: Stack,
    pub memory: Memory,
    /// Data sent along the transaction. Empty in CREATE transactions.
    pub calldata: Bytes,
    /// Return data of the CURRENT CONTEXT (see docs for more details)
    pub output: Bytes,
    /// Return data of the SUB-CONTEXT (see docs for more details)
    pub sub_return_data: Bytes,
    /// Indicates if current context is static (if it is, it can't alter state)
    pub is_static: bool,
    /// Call stack current depth
    pub depth: usize,
    /// This is set to true if the function that created this callframe is CREATE or CREATE2
    pub is_create: bool,
    /// Everything that this callframe modified is written here so it can be undone on failure
    pub call_frame_backup: CallFrameBackup,
    /// Return data offset
    pub ret_offset: usize,
    /// Return data size
    pub ret_size: usize,
    /// If true then transfer value from caller to callee
    pub should_transfer_value: bool,
}

impl CallFrame {
    #[expect(clippy::too_many_arguments)]
    pub fn new(
        msg_sender: Address,
        to: Address,
        code_address: Address,
        bytecode: Code,
        msg_value: U256,
        calldata: Bytes,
        is_static: bool,
        gas_limit: u64,
        depth: usize,
        should_transfer_value: bool,
        is_create: bool,
        ret_offset: usize,
        ret_size: usize,
        stack: Stack,
        memory: Memory,
    ) -> Self {
        Self {
            gas_limit,
            gas_remaining: gas_limit,
            pc: 0,
            msg_sender,
            to,
            code_address,
            bytecode,
            msg_value,
            stack,
            memory,
            calldata,
            output: Bytes::new(),
            sub_return_data: Bytes::new(),
            is_static,
            depth,
            is_create,
            call_frame_backup: CallFrameBackup::default(),
            ret_offset,
            ret_size,
            should_transfer_value,
        }
    }

    /// Opcode at the program counter. Running past the end of the code behaves like STOP.
    #[inline]
    pub fn next_opcode(&self) -> u8 {
        self.bytecode.bytecode.get(self.pc).copied().unwrap_or(0x00)
    }

    #[inline]
    pub fn increase_consumed_gas(&mut self, gas: u64) -> Result<(), ExceptionalHalt> {
        self.gas_remaining = self
            .gas_remaining
            .checked_sub(gas)
            .ok_or(ExceptionalHalt::OutOfGas)?;
        Ok(())
    }

    pub fn gas_used(&self) -> Result<u64, VMError> {
        Ok(self
            .gas_limit
            .checked_sub(self.gas_remaining)
            .ok_or(InternalError::Underflow)?)
    }

    pub fn set_code(&mut self, code: Code) {
        self.bytecode = code;
    }

    /// Moves the program counter to `target`, which must be a JUMPDEST.
    pub fn jump(&mut self, target: U256) -> Result<(), ExceptionalHalt> {
        let target: usize = target
            .try_into()
            .map_err(|_| ExceptionalHalt::InvalidJump)?;
        if !self.bytecode.is_valid_jump_target(target) {
            return Err(ExceptionalHalt::InvalidJump);
        }
        self.pc = target;
        Ok(())
    }
}
