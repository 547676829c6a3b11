use crate::{
    errors::{OpcodeResult, VMError},
    utils::address_to_word,
    vm::VM,
};
use txtrace_common::{U256, utils::h256_to_u256};

// Block Information (11)
// Opcodes: BLOCKHASH, COINBASE, TIMESTAMP, NUMBER, PREVRANDAO, GASLIMIT, CHAINID, SELFBALANCE, BASEFEE, BLOBHASH, BLOBBASEFEE

impl<'a> VM<'a> {
    // BLOCKHASH operation
    //
    // Ancestor hashes are not part of the simulated environment, so every lookup yields zero,
    // which is also what the EVM returns for blocks outside the 256-block window.
    pub fn op_blockhash(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas.blockhash)?;

        current_call_frame.stack.pop1()?;
        current_call_frame.stack.push_zero()?;

        Ok(OpcodeResult::Continue)
    }

    // COINBASE operation
    pub fn op_coinbase(&mut self) -> Result<OpcodeResult, VMError> {
        self.push_base(address_to_word(self.env.coinbase))
    }

    // TIMESTAMP operation
    pub fn op_timestamp(&mut self) -> Result<OpcodeResult, VMError> {
        self.push_base(self.env.timestamp)
    }

    // NUMBER operation
    pub fn op_number(&mut self) -> Result<OpcodeResult, VMError> {
        self.push_base(self.env.block_number)
    }

    // PREVRANDAO operation
    pub fn op_prevrandao(&mut self) -> Result<OpcodeResult, VMError> {
        let randao = self
            .env
            .prev_randao
            .map(h256_to_u256)
            .unwrap_or(self.env.difficulty);
        self.push_base(randao)
    }

    // GASLIMIT operation
    pub fn op_gaslimit(&mut self) -> Result<OpcodeResult, VMError> {
        self.push_base(U256::from(self.env.block_gas_limit))
    }

    // CHAINID operation
    pub fn op_chainid(&mut self) -> Result<OpcodeResult, VMError> {
        self.push_base(self.env.chain_id)
    }

    // SELFBALANCE operation
    pub fn op_selfbalance(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        self.current_call_frame.increase_consumed_gas(gas.low)?;

        let balance = self.get_account(self.current_call_frame.to).info.balance;
        self.current_call_frame.stack.push(balance)?;

        Ok(OpcodeResult::Continue)
    }

    // BASEFEE operation
    pub fn op_basefee(&mut self) -> Result<OpcodeResult, VMError> {
        self.push_base(self.env.base_fee_per_gas)
    }

    // BLOBHASH operation
    //
    // Simulated transactions carry no blobs, so every index is out of range.
    pub fn op_blobhash(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas.very_low)?;

        current_call_frame.stack.pop1()?;
        current_call_frame.stack.push_zero()?;

        Ok(OpcodeResult::Continue)
    }

    // BLOBBASEFEE operation
    pub fn op_blobbasefee(&mut self) -> Result<OpcodeResult, VMError> {
        self.push_base(self.env.base_blob_fee_per_gas)
    }
}
