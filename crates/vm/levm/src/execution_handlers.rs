use crate::{
    constants::INVALID_CONTRACT_PREFIX,
    environment::ChainRuleset,
    errors::{ContextResult, ExceptionalHalt, InternalError, TxResult, VMError},
    gas_cost, precompiles,
    vm::VM,
};
use bytes::Bytes;
use txtrace_common::{Address, types::Code};

impl<'a> VM<'a> {
    /// Runs a precompile and turns its outcome into the result of a context that was given
    /// `gas_limit`.
    pub fn execute_precompile(
        code_address: Address,
        calldata: &Bytes,
        gas_limit: u64,
        gas_remaining: &mut u64,
        ruleset: &ChainRuleset,
    ) -> Result<ContextResult, VMError> {
        Self::handle_precompile_result(
            precompiles::execute_precompile(code_address, calldata, gas_remaining, ruleset),
            gas_limit,
            *gas_remaining,
        )
    }

    pub fn handle_precompile_result(
        precompile_result: Result<Bytes, VMError>,
        gas_limit: u64,
        gas_remaining: u64,
    ) -> Result<ContextResult, VMError> {
        match precompile_result {
            Ok(output) => Ok(ContextResult {
                result: TxResult::Success,
                gas_used: gas_limit
                    .checked_sub(gas_remaining)
                    .ok_or(InternalError::Underflow)?,
                output,
            }),
            Err(error) => {
                if error.should_propagate() {
                    return Err(error);
                }

                // A failing precompile consumes everything it was given.
                Ok(ContextResult {
                    result: TxResult::Revert(error),
                    gas_used: gas_limit,
                    output: Bytes::new(),
                })
            }
        }
    }

    /// Result of a frame that stopped through STOP, RETURN or SELFDESTRUCT, or by running out of
    /// code. For creations this is where the returned runtime code is validated and deployed.
    pub fn handle_opcode_result(&mut self) -> Result<ContextResult, VMError> {
        if self.current_call_frame.is_create {
            if let Err(error) = self.validate_contract_creation() {
                if error.should_propagate() {
                    return Err(error);
                }

                let callframe = &mut self.current_call_frame;
                callframe.gas_remaining = 0;
                return Ok(ContextResult {
                    result: TxResult::Revert(error),
                    gas_used: callframe.gas_limit,
                    output: Bytes::new(),
                });
            }

            let contract_address = self.current_call_frame.to;
            let code = Code::from_bytecode(self.current_call_frame.output.clone());
            self.update_account_bytecode(contract_address, code);
        }

        let callframe = &mut self.current_call_frame;
        Ok(ContextResult {
            result: TxResult::Success,
            gas_used: callframe.gas_used()?,
            output: std::mem::take(&mut callframe.output),
        })
    }

    /// Turns an error raised by an opcode into the failed result of the running frame.
    ///
    /// A REVERT keeps its unused gas and its output; any other halt burns the whole frame.
    pub fn handle_opcode_error(&mut self, error: VMError) -> Result<ContextResult, VMError> {
        if error.should_propagate() {
            return Err(error);
        }

        let callframe = &mut self.current_call_frame;
        let output = if error.is_revert_opcode() {
            std::mem::take(&mut callframe.output)
        } else {
            callframe.gas_remaining = 0;
            Bytes::new()
        };

        Ok(ContextResult {
            result: TxResult::Revert(error),
            gas_used: callframe.gas_used()?,
            output,
        })
    }

    /// Applies the account changes of a contract-creation transaction before its init code runs.
    ///
    /// Returns a failed result if the target address is already in use.
    pub fn handle_create_transaction(&mut self) -> Result<Option<ContextResult>, VMError> {
        let new_contract_address = self.current_call_frame.to;

        if self.get_account(new_contract_address).create_would_collide() {
            return Ok(Some(ContextResult {
                result: TxResult::Revert(ExceptionalHalt::AddressAlreadyOccupied.into()),
                gas_used: self.env.gas_limit,
                output: Bytes::new(),
            }));
        }

        self.increment_account_nonce(new_contract_address)?;
        self.transfer(
            self.env.origin,
            new_contract_address,
            self.current_call_frame.msg_value,
        )?;
        self.substate.add_created_account(new_contract_address);

        Ok(None)
    }

    /// Checks the runtime code returned by init code and charges for storing it.
    fn validate_contract_creation(&mut self) -> Result<(), VMError> {
        let max_code_size = self.env.ruleset.max_code_size;
        let gas = self.env.ruleset.gas;
        let callframe = &mut self.current_call_frame;
        let code = &callframe.output;

        if code.len() > max_code_size {
            return Err(ExceptionalHalt::ContractOutputTooBig.into());
        }
        // [EIP-3541]
        if code.first() == Some(&INVALID_CONTRACT_PREFIX) {
            return Err(ExceptionalHalt::InvalidContractPrefix.into());
        }

        let code_deposit_cost = gas_cost::code_deposit(gas, code.len())?;
        callframe.increase_consumed_gas(code_deposit_cost)?;

        Ok(())
    }
}
