use crate::{
    call_frame::CallFrame,
    constants::{FAIL, SUCCESS},
    errors::{ContextResult, ExceptionalHalt, InternalError, OpcodeResult, TxResult, VMError},
    gas_cost,
    memory::calculate_memory_size,
    precompiles,
    utils::{address_to_word, size_offset_to_usize, word_to_address},
    vm::VM,
};
use bytes::Bytes;
use txtrace_common::{
    Address, H256, U256,
    evm::{calculate_create_address, calculate_create2_address},
    tracing::CallType,
    types::Code,
    utils::u256_to_h256,
};

// System Operations (10)
// Opcodes: CREATE, CALL, CALLCODE, RETURN, DELEGATECALL, CREATE2, STATICCALL, REVERT, INVALID, SELFDESTRUCT

impl<'a> VM<'a> {
    // CALL operation
    pub fn op_call(&mut self) -> Result<OpcodeResult, VMError> {
        let [
            gas,
            callee,
            value_to_transfer,
            args_offset,
            args_size,
            return_data_offset,
            return_data_size,
        ] = *self.current_call_frame.stack.pop()?;
        let callee = word_to_address(callee);
        let (args_size, args_offset) = size_offset_to_usize(args_size, args_offset)?;
        let (return_data_size, return_data_offset) =
            size_offset_to_usize(return_data_size, return_data_offset)?;

        // VALIDATIONS
        if self.current_call_frame.is_static && !value_to_transfer.is_zero() {
            return Err(ExceptionalHalt::OpcodeNotAllowedInStaticContext.into());
        }

        // GAS
        let (new_memory_size, gas_left, account_is_empty, address_was_cold) = self
            .get_call_gas_params(
                args_offset,
                args_size,
                return_data_offset,
                return_data_size,
                callee,
            )?;

        let (cost, gas_limit) = gas_cost::call(
            self.env.ruleset.gas,
            self.env.ruleset.call_gas_retention_divisor,
            new_memory_size,
            self.current_call_frame.memory.len(),
            address_was_cold,
            account_is_empty,
            value_to_transfer,
            gas,
            gas_left,
        )?;

        let callframe = &mut self.current_call_frame;
        callframe.increase_consumed_gas(cost)?;
        callframe.memory.resize(new_memory_size)?;
        let data = self.get_calldata(args_offset, args_size)?;

        let from = self.current_call_frame.to;
        self.tracer.enter(
            CallType::CALL,
            from,
            callee,
            value_to_transfer,
            gas_limit,
            &data,
        );

        let bytecode = self.get_account(callee).code.clone();
        self.generic_call(
            gas_limit,
            value_to_transfer,
            from,
            callee,
            callee,
            true,
            self.current_call_frame.is_static,
            data,
            return_data_offset,
            return_data_size,
            bytecode,
        )
    }

    // CALLCODE operation
    pub fn op_callcode(&mut self) -> Result<OpcodeResult, VMError> {
        let [
            gas,
            code_address,
            value_to_transfer,
            args_offset,
            args_size,
            return_data_offset,
            return_data_size,
        ] = *self.current_call_frame.stack.pop()?;
        let code_address = word_to_address(code_address);
        let (args_size, args_offset) = size_offset_to_usize(args_size, args_offset)?;
        let (return_data_size, return_data_offset) =
            size_offset_to_usize(return_data_size, return_data_offset)?;

        let (new_memory_size, gas_left, _account_is_empty, address_was_cold) = self
            .get_call_gas_params(
                args_offset,
                args_size,
                return_data_offset,
                return_data_size,
                code_address,
            )?;

        let (cost, gas_limit) = gas_cost::callcode(
            self.env.ruleset.gas,
            self.env.ruleset.call_gas_retention_divisor,
            new_memory_size,
            self.current_call_frame.memory.len(),
            address_was_cold,
            value_to_transfer,
            gas,
            gas_left,
        )?;

        let callframe = &mut self.current_call_frame;
        callframe.increase_consumed_gas(cost)?;
        callframe.memory.resize(new_memory_size)?;
        let data = self.get_calldata(args_offset, args_size)?;

        // The code runs against the current account, which also pays itself the value.
        let to = self.current_call_frame.to;
        self.tracer.enter(
            CallType::CALLCODE,
            to,
            code_address,
            value_to_transfer,
            gas_limit,
            &data,
        );

        let bytecode = self.get_account(code_address).code.clone();
        self.generic_call(
            gas_limit,
            value_to_transfer,
            to,
            to,
            code_address,
            true,
            self.current_call_frame.is_static,
            data,
            return_data_offset,
            return_data_size,
            bytecode,
        )
    }

    // RETURN operation
    #[inline]
    pub fn op_return(&mut self) -> Result<OpcodeResult, VMError> {
        self.set_frame_output()?;
        Ok(OpcodeResult::Halt)
    }

    // DELEGATECALL operation
    pub fn op_delegatecall(&mut self) -> Result<OpcodeResult, VMError> {
        let [
            gas,
            code_address,
            args_offset,
            args_size,
            return_data_offset,
            return_data_size,
        ] = *self.current_call_frame.stack.pop()?;
        let code_address = word_to_address(code_address);
        let (args_size, args_offset) = size_offset_to_usize(args_size, args_offset)?;
        let (return_data_size, return_data_offset) =
            size_offset_to_usize(return_data_size, return_data_offset)?;

        let (new_memory_size, gas_left, _account_is_empty, address_was_cold) = self
            .get_call_gas_params(
                args_offset,
                args_size,
                return_data_offset,
                return_data_size,
                code_address,
            )?;

        let (cost, gas_limit) = gas_cost::valueless_call(
            self.env.ruleset.gas,
            self.env.ruleset.call_gas_retention_divisor,
            new_memory_size,
            self.current_call_frame.memory.len(),
            address_was_cold,
            gas,
            gas_left,
        )?;

        let callframe = &mut self.current_call_frame;
        callframe.increase_consumed_gas(cost)?;
        callframe.memory.resize(new_memory_size)?;
        let data = self.get_calldata(args_offset, args_size)?;

        // Caller, value and storage context are inherited from the current frame.
        let msg_sender = self.current_call_frame.msg_sender;
        let value = self.current_call_frame.msg_value;
        let to = self.current_call_frame.to;
        self.tracer.enter(
            CallType::DELEGATECALL,
            to,
            code_address,
            value,
            gas_limit,
            &data,
        );

        let bytecode = self.get_account(code_address).code.clone();
        self.generic_call(
            gas_limit,
            value,
            msg_sender,
            to,
            code_address,
            false,
            self.current_call_frame.is_static,
            data,
            return_data_offset,
            return_data_size,
            bytecode,
        )
    }

    // STATICCALL operation
    pub fn op_staticcall(&mut self) -> Result<OpcodeResult, VMError> {
        let [
            gas,
            callee,
            args_offset,
            args_size,
            return_data_offset,
            return_data_size,
        ] = *self.current_call_frame.stack.pop()?;
        let callee = word_to_address(callee);
        let (args_size, args_offset) = size_offset_to_usize(args_size, args_offset)?;
        let (return_data_size, return_data_offset) =
            size_offset_to_usize(return_data_size, return_data_offset)?;

        let (new_memory_size, gas_left, _account_is_empty, address_was_cold) = self
            .get_call_gas_params(
                args_offset,
                args_size,
                return_data_offset,
                return_data_size,
                callee,
            )?;

        let (cost, gas_limit) = gas_cost::valueless_call(
            self.env.ruleset.gas,
            self.env.ruleset.call_gas_retention_divisor,
            new_memory_size,
            self.current_call_frame.memory.len(),
            address_was_cold,
            gas,
            gas_left,
        )?;

        let callframe = &mut self.current_call_frame;
        callframe.increase_consumed_gas(cost)?;
        callframe.memory.resize(new_memory_size)?;
        let data = self.get_calldata(args_offset, args_size)?;

        let from = self.current_call_frame.to;
        self.tracer.enter(
            CallType::STATICCALL,
            from,
            callee,
            U256::zero(),
            gas_limit,
            &data,
        );

        let bytecode = self.get_account(callee).code.clone();
        self.generic_call(
            gas_limit,
            U256::zero(),
            from,
            callee,
            callee,
            false,
            true,
            data,
            return_data_offset,
            return_data_size,
            bytecode,
        )
    }

    // CREATE operation
    pub fn op_create(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        let [
            value_in_wei_to_send,
            code_offset_in_memory,
            code_size_in_memory,
        ] = *current_call_frame.stack.pop()?;
        let (code_size_in_memory, code_offset_in_memory) =
            size_offset_to_usize(code_size_in_memory, code_offset_in_memory)?;

        let new_size = calculate_memory_size(code_offset_in_memory, code_size_in_memory)?;

        current_call_frame.increase_consumed_gas(gas_cost::create(
            gas,
            new_size,
            current_call_frame.memory.len(),
            code_size_in_memory,
            false,
        )?)?;

        self.generic_create(
            value_in_wei_to_send,
            code_offset_in_memory,
            code_size_in_memory,
            None,
        )
    }

    // CREATE2 operation
    pub fn op_create2(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        let [
            value_in_wei_to_send,
            code_offset_in_memory,
            code_size_in_memory,
            salt,
        ] = *current_call_frame.stack.pop()?;
        let (code_size_in_memory, code_offset_in_memory) =
            size_offset_to_usize(code_size_in_memory, code_offset_in_memory)?;

        let new_size = calculate_memory_size(code_offset_in_memory, code_size_in_memory)?;

        current_call_frame.increase_consumed_gas(gas_cost::create(
            gas,
            new_size,
            current_call_frame.memory.len(),
            code_size_in_memory,
            true,
        )?)?;

        self.generic_create(
            value_in_wei_to_send,
            code_offset_in_memory,
            code_size_in_memory,
            Some(u256_to_h256(salt)),
        )
    }

    // REVERT operation
    pub fn op_revert(&mut self) -> Result<OpcodeResult, VMError> {
        // State changes are undone once the frame is handed back to the caller.
        self.set_frame_output()?;
        Err(VMError::RevertOpcode)
    }

    /// ### INVALID operation
    /// Reverts consuming all gas, no return data.
    pub fn op_invalid(&mut self) -> Result<OpcodeResult, VMError> {
        Err(ExceptionalHalt::InvalidOpcode.into())
    }

    // SELFDESTRUCT operation
    pub fn op_selfdestruct(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let (beneficiary, to) = {
            let current_call_frame = &mut self.current_call_frame;
            if current_call_frame.is_static {
                return Err(ExceptionalHalt::OpcodeNotAllowedInStaticContext.into());
            }
            let beneficiary = word_to_address(current_call_frame.stack.pop1()?);
            (beneficiary, current_call_frame.to)
        };

        let beneficiary_was_cold = !self.substate.add_accessed_address(beneficiary);
        let beneficiary_is_empty = self.get_account(beneficiary).is_empty();
        let balance = self.get_account(to).info.balance;

        self.current_call_frame
            .increase_consumed_gas(gas_cost::selfdestruct(
                gas,
                beneficiary_was_cold,
                beneficiary_is_empty,
                balance,
            )?)?;

        // [EIP-6780] Only contracts created in this transaction are actually removed.
        self.transfer(to, beneficiary, balance)?;
        if self.substate.is_account_created(&to) {
            // Sending to itself burns the balance.
            self.get_account_mut(to).info.balance = U256::zero();
            self.substate.add_selfdestruct(to);
        }

        Ok(OpcodeResult::Halt)
    }

    /// Common behavior for CREATE and CREATE2 opcodes
    pub fn generic_create(
        &mut self,
        value: U256,
        code_offset_in_memory: usize,
        code_size_in_memory: usize,
        salt: Option<H256>,
    ) -> Result<OpcodeResult, VMError> {
        // [EIP-3860] Oversized init code can't be paid for.
        if code_size_in_memory > self.env.ruleset.max_initcode_size {
            return Err(ExceptionalHalt::OutOfGas.into());
        }

        let retention_divisor = self.env.ruleset.call_gas_retention_divisor;
        let current_call_frame = &mut self.current_call_frame;
        if current_call_frame.is_static {
            return Err(ExceptionalHalt::OpcodeNotAllowedInStaticContext.into());
        }

        current_call_frame.sub_return_data = Bytes::new();

        // Reserve gas for the init code
        let gas_limit =
            gas_cost::max_message_call_gas(retention_divisor, current_call_frame.gas_remaining)?;
        current_call_frame.increase_consumed_gas(gas_limit)?;

        let code = current_call_frame
            .memory
            .load_range(code_offset_in_memory, code_size_in_memory)?;

        let deployer = current_call_frame.to;
        let (deployer_balance, deployer_nonce) = {
            let deployer_account = self.get_account(deployer);
            (deployer_account.info.balance, deployer_account.info.nonce)
        };

        let new_address = match salt {
            Some(salt) => calculate_create2_address(deployer, &code, salt),
            None => calculate_create_address(deployer, deployer_nonce),
        };

        let call_type = match salt {
            Some(_) => CallType::CREATE2,
            None => CallType::CREATE,
        };
        self.tracer
            .enter(call_type, deployer, new_address, value, gas_limit, &code);

        let new_depth = self
            .current_call_frame
            .depth
            .checked_add(1)
            .ok_or(InternalError::Overflow)?;

        // These fail the creation without running it, handing the reserved gas back.
        let checks = [
            (
                new_depth > self.env.ruleset.max_call_depth,
                ExceptionalHalt::CallDepthExceeded.to_string(),
            ),
            (
                deployer_balance < value,
                String::from("insufficient balance for transfer"),
            ),
            (deployer_nonce == u64::MAX, String::from("nonce uint64 overflow")),
        ];
        for (condition, reason) in checks {
            if condition {
                self.early_revert_message_call(gas_limit, reason)?;
                return Ok(OpcodeResult::Continue);
            }
        }

        self.substate.add_accessed_address(new_address);

        // Survives a failed creation.
        self.increment_account_nonce(deployer)?;

        // A collision consumes the whole reservation.
        if self.get_account(new_address).create_would_collide() {
            self.current_call_frame.stack.push(FAIL)?;
            self.tracer.exit_early(
                gas_limit,
                Some(ExceptionalHalt::AddressAlreadyOccupied.to_string()),
            )?;
            return Ok(OpcodeResult::Continue);
        }

        let mut stack = self.stack_pool.pop().unwrap_or_default();
        stack.clear();

        let next_memory = self.current_call_frame.memory.next_memory();

        let new_call_frame = CallFrame::new(
            deployer,
            new_address,
            new_address,
            // The init code hash is never observed.
            Code::from_bytecode_unchecked(code, H256::zero()),
            value,
            Bytes::new(),
            false,
            gas_limit,
            new_depth,
            true,
            true,
            0,
            0,
            stack,
            next_memory,
        );

        self.add_callframe(new_call_frame);

        // Recorded in the child's backup, so they roll back with it.
        self.increment_account_nonce(new_address)?;
        self.transfer(deployer, new_address, value)?;

        self.substate.push_backup();
        self.substate.add_created_account(new_address);

        Ok(OpcodeResult::Continue)
    }

    /// Starts a message call once its gas has been paid for.
    ///
    /// Calls into precompiles complete right away; any other call pushes a new frame that the
    /// interpreter loop runs next.
    #[expect(clippy::too_many_arguments)]
    pub fn generic_call(
        &mut self,
        gas_limit: u64,
        value: U256,
        msg_sender: Address,
        to: Address,
        code_address: Address,
        should_transfer_value: bool,
        is_static: bool,
        calldata: Bytes,
        ret_offset: usize,
        ret_size: usize,
        bytecode: Code,
    ) -> Result<OpcodeResult, VMError> {
        self.current_call_frame.sub_return_data = Bytes::new();

        let new_depth = self
            .current_call_frame
            .depth
            .checked_add(1)
            .ok_or(InternalError::Overflow)?;
        if new_depth > self.env.ruleset.max_call_depth {
            self.early_revert_message_call(
                gas_limit,
                ExceptionalHalt::CallDepthExceeded.to_string(),
            )?;
            return Ok(OpcodeResult::Continue);
        }

        if should_transfer_value && !value.is_zero() {
            let sender_balance = self.get_account(msg_sender).info.balance;
            if sender_balance < value {
                self.early_revert_message_call(
                    gas_limit,
                    String::from("insufficient balance for transfer"),
                )?;
                return Ok(OpcodeResult::Continue);
            }
        }

        if precompiles::is_precompile(&code_address, &self.env.ruleset) {
            let mut gas_remaining = gas_limit;
            let ctx_result = Self::execute_precompile(
                code_address,
                &calldata,
                gas_limit,
                &mut gas_remaining,
                &self.env.ruleset,
            )?;

            let call_frame = &mut self.current_call_frame;

            let unused_gas = gas_limit
                .checked_sub(ctx_result.gas_used)
                .ok_or(InternalError::Underflow)?;
            call_frame.gas_remaining = call_frame
                .gas_remaining
                .checked_add(unused_gas)
                .ok_or(InternalError::Overflow)?;

            store_return_data(call_frame, ret_offset, ret_size, &ctx_result.output)?;
            call_frame.sub_return_data = ctx_result.output.clone();

            call_frame.stack.push(match &ctx_result.result {
                TxResult::Success => SUCCESS,
                TxResult::Revert(_) => FAIL,
            })?;

            if should_transfer_value && ctx_result.is_success() {
                self.transfer(msg_sender, to, value)?;
            }

            self.tracer.exit_context(&ctx_result, false)?;
        } else {
            let mut stack = self.stack_pool.pop().unwrap_or_default();
            stack.clear();

            let next_memory = self.current_call_frame.memory.next_memory();

            let new_call_frame = CallFrame::new(
                msg_sender,
                to,
                code_address,
                bytecode,
                value,
                calldata,
                is_static,
                gas_limit,
                new_depth,
                should_transfer_value,
                false,
                ret_offset,
                ret_size,
                stack,
                next_memory,
            );

            self.add_callframe(new_call_frame);

            if should_transfer_value {
                self.transfer(msg_sender, to, value)?;
            }

            self.substate.push_backup();
        }

        Ok(OpcodeResult::Continue)
    }

    /// Pop backup from stack and restore substate and cache if transaction reverted.
    pub fn handle_state_backup(&mut self, ctx_result: &ContextResult) -> Result<(), VMError> {
        if ctx_result.is_success() {
            self.substate.commit_backup();
        } else {
            self.substate.revert_backup();
            self.restore_cache_state()?;
        }

        Ok(())
    }

    /// Hands the result of a finished child frame back to its caller.
    pub fn handle_return(&mut self, ctx_result: &ContextResult) -> Result<(), VMError> {
        self.handle_state_backup(ctx_result)?;
        let executed_call_frame = self.pop_call_frame()?;

        if executed_call_frame.is_create {
            self.handle_return_create(executed_call_frame, ctx_result)?;
        } else {
            self.handle_return_call(executed_call_frame, ctx_result)?;
        }

        Ok(())
    }

    pub fn handle_return_call(
        &mut self,
        executed_call_frame: CallFrame,
        ctx_result: &ContextResult,
    ) -> Result<(), VMError> {
        let CallFrame {
            gas_limit,
            ret_offset,
            ret_size,
            memory: old_callframe_memory,
            call_frame_backup,
            stack: mut old_stack,
            ..
        } = executed_call_frame;

        old_callframe_memory.clean_from_base();

        let parent_call_frame = &mut self.current_call_frame;

        let child_unused_gas = gas_limit
            .checked_sub(ctx_result.gas_used)
            .ok_or(InternalError::Underflow)?;
        parent_call_frame.gas_remaining = parent_call_frame
            .gas_remaining
            .checked_add(child_unused_gas)
            .ok_or(InternalError::Overflow)?;

        store_return_data(parent_call_frame, ret_offset, ret_size, &ctx_result.output)?;
        parent_call_frame.sub_return_data = ctx_result.output.clone();

        match &ctx_result.result {
            TxResult::Success => {
                parent_call_frame.stack.push(SUCCESS)?;
                self.merge_call_frame_backup_with_parent(call_frame_backup)?;
            }
            TxResult::Revert(_) => {
                parent_call_frame.stack.push(FAIL)?;
            }
        };

        self.tracer.exit_context(ctx_result, false)?;

        old_stack.clear();
        self.stack_pool.push(old_stack);

        Ok(())
    }

    pub fn handle_return_create(
        &mut self,
        executed_call_frame: CallFrame,
        ctx_result: &ContextResult,
    ) -> Result<(), VMError> {
        let CallFrame {
            gas_limit,
            to,
            call_frame_backup,
            memory: old_callframe_memory,
            stack: mut old_stack,
            ..
        } = executed_call_frame;

        old_callframe_memory.clean_from_base();

        let parent_call_frame = &mut self.current_call_frame;

        let unused_gas = gas_limit
            .checked_sub(ctx_result.gas_used)
            .ok_or(InternalError::Underflow)?;
        parent_call_frame.gas_remaining = parent_call_frame
            .gas_remaining
            .checked_add(unused_gas)
            .ok_or(InternalError::Overflow)?;

        match &ctx_result.result {
            TxResult::Success => {
                parent_call_frame.stack.push(address_to_word(to))?;
                self.merge_call_frame_backup_with_parent(call_frame_backup)?;
            }
            TxResult::Revert(err) => {
                // Only an explicit revert exposes its buffer to RETURNDATACOPY.
                if err.is_revert_opcode() {
                    parent_call_frame.sub_return_data = ctx_result.output.clone();
                }
                parent_call_frame.stack.push(FAIL)?;
            }
        };

        self.tracer.exit_context(ctx_result, false)?;

        old_stack.clear();
        self.stack_pool.push(old_stack);

        Ok(())
    }

    /// Shared by RETURN and REVERT: charges memory expansion and copies the output buffer.
    fn set_frame_output(&mut self) -> Result<(), VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        let [offset, size] = *current_call_frame.stack.pop()?;

        if size.is_zero() {
            return Ok(());
        }

        let (size, offset) = size_offset_to_usize(size, offset)?;
        let new_memory_size = calculate_memory_size(offset, size)?;
        let current_memory_size = current_call_frame.memory.len();

        current_call_frame.increase_consumed_gas(gas_cost::mem_access(
            gas,
            new_memory_size,
            current_memory_size,
            gas.zero,
        )?)?;

        current_call_frame.output = current_call_frame.memory.load_range(offset, size)?;
        Ok(())
    }

    /// Values the CALL family needs to price a call:
    /// `(new_memory_size, gas_left, account_is_empty, address_was_cold)`.
    fn get_call_gas_params(
        &mut self,
        args_offset: usize,
        args_size: usize,
        return_data_offset: usize,
        return_data_size: usize,
        address: Address,
    ) -> Result<(usize, u64, bool, bool), VMError> {
        let address_was_cold = !self.substate.add_accessed_address(address);
        let account_is_empty = self.get_account(address).is_empty();

        let new_memory_size_for_args = calculate_memory_size(args_offset, args_size)?;
        let new_memory_size_for_return_data =
            calculate_memory_size(return_data_offset, return_data_size)?;
        let new_memory_size = new_memory_size_for_args.max(new_memory_size_for_return_data);

        Ok((
            new_memory_size,
            self.current_call_frame.gas_remaining,
            account_is_empty,
            address_was_cold,
        ))
    }

    fn get_calldata(&mut self, offset: usize, size: usize) -> Result<Bytes, VMError> {
        self.current_call_frame.memory.load_range(offset, size)
    }

    /// Fails a call or creation that never got to run, returning its gas to the caller.
    fn early_revert_message_call(&mut self, gas_limit: u64, reason: String) -> Result<(), VMError> {
        let callframe = &mut self.current_call_frame;

        callframe.gas_remaining = callframe
            .gas_remaining
            .checked_add(gas_limit)
            .ok_or(InternalError::Overflow)?;
        callframe.stack.push(FAIL)?;

        self.tracer.exit_early(0, Some(reason))?;
        Ok(())
    }
}

/// Copies at most `ret_size` bytes of a child's output into the caller's memory.
fn store_return_data(
    call_frame: &mut CallFrame,
    ret_offset: usize,
    ret_size: usize,
    output: &Bytes,
) -> Result<(), VMError> {
    let returned = output.get(..ret_size.min(output.len())).unwrap_or_default();
    call_frame.memory.store_data(ret_offset, returned)
}
