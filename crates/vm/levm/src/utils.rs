use crate::{
    call_frame::CallFrameBackup,
    errors::{ExceptionalHalt, InternalError, TxValidationError, VMError},
    gas_cost,
    vm::VM,
};
use txtrace_common::{
    Address, H256, U256,
    types::{Account, Code},
    utils::u256_from_big_endian_const,
};

/// Lower 20 bytes of a stack word.
#[expect(clippy::indexing_slicing, reason = "a word is always 32 bytes long")]
pub fn word_to_address(word: U256) -> Address {
    Address::from_slice(&word.to_big_endian()[12..])
}

pub fn address_to_word(address: Address) -> U256 {
    u256_from_big_endian_const(address.to_fixed_bytes())
}

/// Converts a memory `(size, offset)` pair taken from the stack.
///
/// A zero size never touches memory, so its offset is irrelevant and may be arbitrarily large.
/// Otherwise both values must fit a `usize`; anything bigger could never be paid for.
pub fn size_offset_to_usize(size: U256, offset: U256) -> Result<(usize, usize), VMError> {
    if size.is_zero() {
        return Ok((0, 0));
    }
    Ok((u256_to_usize(size)?, u256_to_usize(offset)?))
}

pub fn u256_to_usize(value: U256) -> Result<usize, VMError> {
    value
        .try_into()
        .map_err(|_| ExceptionalHalt::VeryLargeNumber.into())
}

/// Part of `data` that a copy of `size` bytes starting at `offset` can read. The rest of the
/// copy is zero-filled by the caller.
pub fn available_slice(data: &[u8], offset: usize, size: usize) -> &[u8] {
    let end = offset.saturating_add(size).min(data.len());
    data.get(offset..end).unwrap_or_default()
}

/// Effective price per gas of a fee-market transaction.
pub fn effective_gas_price(
    max_fee_per_gas: U256,
    max_priority_fee_per_gas: U256,
    base_fee_per_gas: U256,
) -> Result<U256, VMError> {
    if base_fee_per_gas > max_fee_per_gas {
        return Err(TxValidationError::InsufficientMaxFeePerGas {
            max_fee_per_gas,
            base_fee: base_fee_per_gas,
        }
        .into());
    }
    let with_tip = base_fee_per_gas
        .checked_add(max_priority_fee_per_gas)
        .ok_or(InternalError::Overflow)?;
    Ok(with_tip.min(max_fee_per_gas))
}

impl<'a> VM<'a> {
    // ================== Account related functions =====================

    /// Reads an account without marking it as touched.
    pub fn get_account(&mut self, address: Address) -> &Account {
        self.db.get_account(address)
    }

    /// Gets a mutable reference to an account, touching it and recording its current value in
    /// the backup of the running call frame.
    pub fn get_account_mut(&mut self, address: Address) -> &mut Account {
        let backup = &mut self.current_call_frame.call_frame_backup;
        if self.db.touch(address) {
            backup.newly_touched.insert(address);
        }
        let account = self.db.get_account_mut(address);
        backup.backup_account_info(address, &account.info, &account.code);
        account
    }

    /// Marks an account as part of the transaction's footprint without changing it.
    pub fn touch_account(&mut self, address: Address) {
        if self.db.touch(address) {
            self.current_call_frame
                .call_frame_backup
                .newly_touched
                .insert(address);
        }
    }

    pub fn increase_account_balance(
        &mut self,
        address: Address,
        increase: U256,
    ) -> Result<(), VMError> {
        let account = self.get_account_mut(address);
        account.info.balance = account
            .info
            .balance
            .checked_add(increase)
            .ok_or(InternalError::Overflow)?;
        Ok(())
    }

    pub fn decrease_account_balance(
        &mut self,
        address: Address,
        decrease: U256,
    ) -> Result<(), VMError> {
        let account = self.get_account_mut(address);
        account.info.balance = account
            .info
            .balance
            .checked_sub(decrease)
            .ok_or(InternalError::Underflow)?;
        Ok(())
    }

    /// Moves `value` from one account to another. Zero-value transfers leave both untouched.
    pub fn transfer(&mut self, from: Address, to: Address, value: U256) -> Result<(), VMError> {
        if value.is_zero() {
            return Ok(());
        }
        self.decrease_account_balance(from, value)?;
        self.increase_account_balance(to, value)
    }

    pub fn increment_account_nonce(&mut self, address: Address) -> Result<u64, VMError> {
        let account = self.get_account_mut(address);
        account.info.nonce = account
            .info
            .nonce
            .checked_add(1)
            .ok_or(InternalError::Overflow)?;
        Ok(account.info.nonce)
    }

    pub fn update_account_bytecode(&mut self, address: Address, code: Code) {
        self.get_account_mut(address).set_code(code);
    }

    /// Reads a storage slot, warming it. Returns the value and whether the slot was cold.
    pub fn access_storage_slot(&mut self, address: Address, key: H256) -> (U256, bool) {
        let storage_slot_was_cold = !self.substate.add_accessed_slot(address, key);
        (self.db.get_storage_value(address, key), storage_slot_was_cold)
    }

    pub fn update_account_storage(
        &mut self,
        address: Address,
        key: H256,
        new_value: U256,
        current_value: U256,
    ) {
        self.current_call_frame
            .call_frame_backup
            .backup_storage_slot(address, key, current_value);
        self.get_account_mut(address).storage.insert(key, new_value);
    }

    /// Undoes every state change recorded in the current call frame's backup.
    pub fn restore_cache_state(&mut self) -> Result<(), VMError> {
        let backup = std::mem::take(&mut self.current_call_frame.call_frame_backup);
        self.restore_backup(backup)
    }

    fn restore_backup(&mut self, backup: CallFrameBackup) -> Result<(), VMError> {
        for (address, original) in backup.original_accounts_info {
            let account = self.db.get_account_mut(address);
            account.info = original.info;
            account.code = original.code;
        }

        for (address, slots) in backup.original_account_storage_slots {
            let account = self.db.get_account_mut(address);
            for (key, value) in slots {
                account.storage.insert(key, value);
            }
        }

        for address in backup.newly_touched {
            self.db.untouch(&address);
        }

        Ok(())
    }

    /// Folds a successful child frame's changeset into the current (parent) frame.
    pub fn merge_call_frame_backup_with_parent(
        &mut self,
        child_call_frame_backup: CallFrameBackup,
    ) -> Result<(), VMError> {
        self.current_call_frame
            .call_frame_backup
            .extend(child_call_frame_backup);
        Ok(())
    }

    // ==================== Gas related functions =======================

    /// Intrinsic gas of the transaction together with its calldata floor.
    pub fn get_intrinsic_gas(&self) -> Result<(u64, u64), VMError> {
        let (zeros, non_zeros) = self.tx.calldata_byte_counts();
        gas_cost::intrinsic_gas(
            self.env.ruleset.gas,
            zeros,
            non_zeros,
            self.tx.is_create(),
            self.tx.data.len(),
        )
    }

    pub fn is_precompile(&self, address: &Address) -> bool {
        crate::precompiles::is_precompile(address, &self.env.ruleset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_word_roundtrip() {
        let address = Address::repeat_byte(0xab);
        assert_eq!(word_to_address(address_to_word(address)), address);
        assert_eq!(word_to_address(U256::MAX), Address::repeat_byte(0xff));
    }

    #[test]
    fn zero_size_ignores_offset() {
        assert_eq!(size_offset_to_usize(U256::zero(), U256::MAX).unwrap(), (0, 0));
        assert!(size_offset_to_usize(U256::one(), U256::MAX).is_err());
    }

    #[test]
    fn effective_price_is_capped() {
        let price =
            effective_gas_price(U256::from(10), U256::from(5), U256::from(7)).unwrap();
        assert_eq!(price, U256::from(10));
        let price = effective_gas_price(U256::from(10), U256::from(1), U256::from(7)).unwrap();
        assert_eq!(price, U256::from(8));
        assert!(effective_gas_price(U256::from(6), U256::zero(), U256::from(7)).is_err());
    }

    #[test]
    fn available_slice_clamps() {
        assert_eq!(available_slice(&[1, 2, 3], 1, 10), &[2, 3]);
        assert!(available_slice(&[1, 2, 3], 5, 1).is_empty());
    }
}
