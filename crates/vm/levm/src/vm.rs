use crate::{
    call_frame::{CallFrame, Stack},
    db::WorldState,
    environment::Environment,
    errors::{ContextResult, ExecutionReport, InternalError, OpcodeResult, VMError},
    hooks::hook::{Hook, get_hooks},
    memory::Memory,
    opcodes::OpCodeFn,
    tracing::LevmCallTracer,
};
use bytes::Bytes;
use rustc_hash::{FxHashMap, FxHashSet};
use std::{cell::RefCell, mem, rc::Rc};
use txtrace_common::{
    Address, H256, U256,
    evm::calculate_create_address,
    tracing::CallType,
    types::{Code, Log, Transaction, TxKind},
};

/// EIP-1153 storage, keyed by contract and slot. Lives only for one transaction.
pub type TransientStorage = FxHashMap<(Address, U256), U256>;

/// Execution substate: everything besides account state that a failing frame must undo.
///
/// Tracks self-destructed and created accounts, warm addresses and slots (EIP-2929), the refund
/// counter, transient storage and logs.
///
/// # Backup Mechanism
///
/// [`push_backup`](Self::push_backup) opens a checkpoint when a frame starts.
/// [`commit_backup`](Self::commit_backup) folds it into the parent when the frame succeeds and
/// [`revert_backup`](Self::revert_backup) drops it when the frame fails. This only works because
/// every field is append-only between checkpoints.
#[derive(Debug, Default)]
pub struct Substate {
    parent: Option<Box<Self>>,

    selfdestruct_set: FxHashSet<Address>,
    accessed_addresses: FxHashSet<Address>,
    accessed_storage_slots: FxHashMap<Address, FxHashSet<H256>>,
    created_accounts: FxHashSet<Address>,
    pub refunded_gas: u64,
    transient_storage: TransientStorage,
    logs: Vec<Log>,
}

impl Substate {
    pub fn from_accesses(accessed_addresses: FxHashSet<Address>) -> Self {
        Self {
            accessed_addresses,
            ..Default::default()
        }
    }

    /// Warm set at the start of a transaction: sender, recipient, coinbase (EIP-3651) and every
    /// precompile of the ruleset.
    pub fn initialize(env: &Environment, callee: Address) -> Self {
        let mut initial_accessed_addresses = FxHashSet::default();
        initial_accessed_addresses.insert(env.origin);
        initial_accessed_addresses.insert(callee);
        initial_accessed_addresses.insert(env.coinbase);

        for i in 1..=env.ruleset.last_precompile {
            initial_accessed_addresses.insert(Address::from_low_u64_be(i));
        }

        Self::from_accesses(initial_accessed_addresses)
    }

    /// Push a checkpoint that can be either reverted or committed. All data up to this point is
    /// still accessible.
    pub fn push_backup(&mut self) {
        let parent = mem::take(self);
        self.refunded_gas = parent.refunded_gas;
        self.parent = Some(Box::new(parent));
    }

    /// Pop and merge with the last backup.
    ///
    /// Does nothing if the substate has no backup.
    pub fn commit_backup(&mut self) {
        if let Some(parent) = self.parent.as_mut() {
            let mut delta = mem::take(parent);
            mem::swap(self, &mut delta);

            self.selfdestruct_set.extend(delta.selfdestruct_set);
            self.accessed_addresses.extend(delta.accessed_addresses);
            for (address, slot_set) in delta.accessed_storage_slots {
                self.accessed_storage_slots
                    .entry(address)
                    .or_default()
                    .extend(slot_set);
            }
            self.created_accounts.extend(delta.created_accounts);
            self.refunded_gas = delta.refunded_gas;
            self.transient_storage.extend(delta.transient_storage);
            self.logs.extend(delta.logs);
        }
    }

    /// Discard current changes and revert to last backup.
    ///
    /// Does nothing if the substate has no backup.
    pub fn revert_backup(&mut self) {
        if let Some(parent) = self.parent.as_mut() {
            *self = mem::take(parent);
        }
    }

    /// Every address marked for deletion, from this checkpoint and all of its parents.
    pub fn iter_selfdestruct(&self) -> impl Iterator<Item = &Address> {
        let mut addresses: Vec<&Address> = Vec::new();
        let mut current = Some(self);
        while let Some(substate) = current {
            addresses.extend(substate.selfdestruct_set.iter());
            current = substate.parent.as_deref();
        }
        addresses.into_iter()
    }

    /// Mark an address as selfdestructed and return whether is was already marked.
    pub fn add_selfdestruct(&mut self, address: Address) -> bool {
        if self.is_selfdestruct(&address) {
            return true;
        }
        !self.selfdestruct_set.insert(address)
    }

    pub fn is_selfdestruct(&self, address: &Address) -> bool {
        self.selfdestruct_set.contains(address)
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.is_selfdestruct(address))
    }

    /// Mark a slot as accessed and return whether is was already marked.
    pub fn add_accessed_slot(&mut self, address: Address, key: H256) -> bool {
        if self.is_slot_accessed(&address, &key) {
            return true;
        }
        !self
            .accessed_storage_slots
            .entry(address)
            .or_default()
            .insert(key)
    }

    pub fn is_slot_accessed(&self, address: &Address, key: &H256) -> bool {
        self.accessed_storage_slots
            .get(address)
            .is_some_and(|slot_set| slot_set.contains(key))
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.is_slot_accessed(address, key))
    }

    /// Mark an address as accessed and return whether is was already marked.
    pub fn add_accessed_address(&mut self, address: Address) -> bool {
        if self.is_address_accessed(&address) {
            return true;
        }
        !self.accessed_addresses.insert(address)
    }

    pub fn is_address_accessed(&self, address: &Address) -> bool {
        self.accessed_addresses.contains(address)
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.is_address_accessed(address))
    }

    /// Mark an address as a new account and return whether is was already marked.
    pub fn add_created_account(&mut self, address: Address) -> bool {
        if self.is_account_created(&address) {
            return true;
        }
        !self.created_accounts.insert(address)
    }

    pub fn is_account_created(&self, address: &Address) -> bool {
        self.created_accounts.contains(address)
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.is_account_created(address))
    }

    /// Return the data associated with a transient storage entry, or zero if not present.
    pub fn get_transient(&self, to: &Address, key: &U256) -> U256 {
        self.transient_storage
            .get(&(*to, *key))
            .copied()
            .unwrap_or_else(|| {
                self.parent
                    .as_ref()
                    .map(|parent| parent.get_transient(to, key))
                    .unwrap_or_default()
            })
    }

    pub fn set_transient(&mut self, to: &Address, key: &U256, value: U256) {
        self.transient_storage.insert((*to, *key), value);
    }

    /// Extract all logs in order.
    pub fn extract_logs(&self) -> Vec<Log> {
        fn inner(substate: &Substate, target: &mut Vec<Log>) {
            if let Some(parent) = substate.parent.as_deref() {
                inner(parent, target);
            }

            target.extend_from_slice(&substate.logs);
        }

        let mut logs = Vec::new();
        inner(self, &mut logs);

        logs
    }

    pub fn add_log(&mut self, log: Log) {
        self.logs.push(log);
    }
}

/// The interpreter of a single transaction.
///
/// Nested calls don't recurse: the running frame lives in `current_call_frame` and its callers
/// wait in `call_frames`. Every frame records the original value of whatever it modifies, which
/// is either folded into its caller's record when it succeeds or written back when it fails.
///
/// Chain-specific behaviour before and after execution (fee payment, validation, L1 fees) lives
/// in [`Hook`]s selected from the ruleset's [`VMType`](crate::environment::VMType).
pub struct VM<'a> {
    /// Callers of the running frame, outermost first.
    pub call_frames: Vec<CallFrame>,
    pub current_call_frame: CallFrame,
    pub env: Environment,
    pub substate: Substate,
    pub db: &'a mut WorldState,
    pub tx: Transaction,
    pub hooks: Vec<Rc<RefCell<dyn Hook>>>,
    pub tracer: LevmCallTracer,
    /// Stacks of finished frames, reused by new ones.
    pub stack_pool: Vec<Stack>,
    /// L1 data fee charged by the OP-Stack hook.
    pub l1_data_fee: Option<U256>,
    pub(crate) opcode_table: [OpCodeFn<'a>; 256],
}

impl<'a> VM<'a> {
    pub fn new(
        env: Environment,
        db: &'a mut WorldState,
        tx: &Transaction,
        tracer: LevmCallTracer,
    ) -> Self {
        let (callee, is_create) = Self::get_tx_callee(tx, db, &env);
        let substate = Substate::initialize(&env, callee);
        let fork = env.ruleset.fork;

        let mut vm = Self {
            call_frames: Vec::new(),
            substate,
            db,
            tx: tx.clone(),
            hooks: get_hooks(&env.ruleset.vm_type),
            tracer,
            stack_pool: Vec::new(),
            l1_data_fee: None,
            current_call_frame: CallFrame::new(
                env.origin,
                callee,
                Address::default(), // Will be assigned at the end of prepare_execution
                Code::default(),    // Will be assigned at the end of prepare_execution
                tx.value,
                if is_create { Bytes::new() } else { tx.data.clone() },
                false,
                env.gas_limit,
                0,
                true,
                is_create,
                0,
                0,
                Stack::default(),
                Memory::default(),
            ),
            env,
            opcode_table: VM::build_opcode_table(fork),
        };

        let call_type = if is_create {
            CallType::CREATE
        } else {
            CallType::CALL
        };
        vm.tracer.enter(
            call_type,
            vm.env.origin,
            callee,
            vm.tx.value,
            vm.env.gas_limit,
            &vm.tx.data,
        );

        vm
    }

    /// Executes a whole external transaction. Performing validations at the beginning.
    pub fn execute(&mut self) -> Result<ExecutionReport, VMError> {
        if let Err(e) = self.prepare_execution() {
            // Invalid transactions leave no trace in the world state.
            self.restore_cache_state()?;
            return Err(e);
        }

        // What prepare_execution did (nonce, up-front fee) is kept even if the transaction fails.
        self.current_call_frame.call_frame_backup.clear();

        if self.current_call_frame.is_create {
            if let Some(context_result) = self.handle_create_transaction()? {
                return self.finalize_execution(context_result);
            }
        } else {
            // Part of the outermost frame, so it rolls back with it.
            let to = self.current_call_frame.to;
            self.transfer(self.env.origin, to, self.current_call_frame.msg_value)?;
        }

        self.substate.push_backup();
        let context_result = self.run_execution()?;

        self.finalize_execution(context_result)
    }

    /// Runs the outermost frame to completion.
    pub fn run_execution(&mut self) -> Result<ContextResult, VMError> {
        if self.is_precompile(&self.current_call_frame.to) {
            let call_frame = &mut self.current_call_frame;

            let mut gas_remaining = call_frame.gas_remaining;
            let result = Self::execute_precompile(
                call_frame.code_address,
                &call_frame.calldata,
                call_frame.gas_limit,
                &mut gas_remaining,
                &self.env.ruleset,
            )?;
            call_frame.gas_remaining = if result.is_success() {
                gas_remaining
            } else {
                0
            };

            self.handle_state_backup(&result)?;
            return Ok(result);
        }

        self.interpreter_loop()
    }

    /// Fetch-decode-execute loop. Returns when the outermost frame halts.
    fn interpreter_loop(&mut self) -> Result<ContextResult, VMError> {
        loop {
            let opcode = self.current_call_frame.next_opcode();
            self.advance_pc(1)?;

            // Fast path for common opcodes
            #[allow(clippy::indexing_slicing, clippy::as_conversions)]
            let op_result = match opcode {
                0x60 => self.op_push::<1>(),
                0x61 => self.op_push::<2>(),
                0x62 => self.op_push::<3>(),
                0x63 => self.op_push::<4>(),
                0x73 => self.op_push::<20>(),
                0x7f => self.op_push::<32>(),
                0x80 => self.op_dup::<0>(),
                0x81 => self.op_dup::<1>(),
                0x82 => self.op_dup::<2>(),
                0x90 => self.op_swap::<1>(),
                0x91 => self.op_swap::<2>(),
                0x00 => self.op_stop(),
                0x01 => self.op_add(),
                0x03 => self.op_sub(),
                0x14 => self.op_eq(),
                0x15 => self.op_iszero(),
                0x16 => self.op_and(),
                0x1b => self.op_shl(),
                0x1c => self.op_shr(),
                0x35 => self.op_calldataload(),
                0x50 => self.op_pop(),
                0x51 => self.op_mload(),
                0x52 => self.op_mstore(),
                0x54 => self.op_sload(),
                0x56 => self.op_jump(),
                0x57 => self.op_jumpi(),
                0x5b => self.op_jumpdest(),
                0x5f => self.op_push0(),
                0xf3 => self.op_return(),
                // Indexing will not panic as all the opcode values fit within the table.
                _ => self.opcode_table[opcode as usize].call(self),
            };

            let result = match op_result {
                Ok(OpcodeResult::Continue) => continue,
                Ok(OpcodeResult::Halt) => self.handle_opcode_result()?,
                Err(error) => self.handle_opcode_error(error)?,
            };

            if self.call_frames.is_empty() {
                self.handle_state_backup(&result)?;
                return Ok(result);
            }

            self.handle_return(&result)?;
        }
    }

    #[inline]
    pub fn advance_pc(&mut self, count: usize) -> Result<(), VMError> {
        self.current_call_frame.pc = self
            .current_call_frame
            .pc
            .checked_add(count)
            .ok_or(InternalError::Overflow)?;
        Ok(())
    }

    /// Makes `new_call_frame` the running frame, suspending the current one.
    pub fn add_callframe(&mut self, new_call_frame: CallFrame) {
        let parent = mem::replace(&mut self.current_call_frame, new_call_frame);
        self.call_frames.push(parent);
    }

    /// Resumes the caller, returning the frame that just finished.
    pub fn pop_call_frame(&mut self) -> Result<CallFrame, VMError> {
        let parent = self.call_frames.pop().ok_or(InternalError::CallFrame)?;
        Ok(mem::replace(&mut self.current_call_frame, parent))
    }

    /// Recipient of the transaction, or the address its contract will be deployed at.
    fn get_tx_callee(tx: &Transaction, db: &mut WorldState, env: &Environment) -> (Address, bool) {
        match tx.to {
            TxKind::Call(address_to) => (address_to, false),
            TxKind::Create => {
                let sender_nonce = db.get_account(env.origin).info.nonce;
                (calculate_create_address(env.origin, sender_nonce), true)
            }
        }
    }

    fn prepare_execution(&mut self) -> Result<(), VMError> {
        for hook in self.hooks.clone() {
            hook.borrow_mut().prepare_execution(self)?;
        }

        Ok(())
    }

    fn finalize_execution(
        &mut self,
        mut ctx_result: ContextResult,
    ) -> Result<ExecutionReport, VMError> {
        for hook in self.hooks.clone() {
            hook.borrow_mut()
                .finalize_execution(self, &mut ctx_result)?;
        }

        self.tracer.exit_context(&ctx_result, true)?;

        // Logs only survive a successful transaction.
        let logs = if ctx_result.is_success() {
            self.substate.extract_logs()
        } else {
            Vec::new()
        };

        let created_address = (self.current_call_frame.is_create && ctx_result.is_success())
            .then_some(self.current_call_frame.to);

        Ok(ExecutionReport {
            result: ctx_result.result,
            gas_used: ctx_result.gas_used,
            gas_refunded: self.substate.refunded_gas,
            output: ctx_result.output,
            logs,
            l1_fee: self.l1_data_fee,
            created_address,
        })
    }
}
