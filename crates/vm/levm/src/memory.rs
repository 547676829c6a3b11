use std::{cell::RefCell, rc::Rc};

use crate::{
    constants::WORD_SIZE_IN_BYTES_USIZE,
    errors::{ExceptionalHalt, InternalError, VMError},
};
use ExceptionalHalt::OutOfBounds;
use bytes::Bytes;
use txtrace_common::{
    U256,
    utils::{u256_from_big_endian_const, u256_to_big_endian},
};

/// Byte-addressed memory of a call frame.
///
/// All frames of a transaction share one buffer: a child frame gets a view that starts where
/// its parent's memory ends (`current_base`), and wipes its region when it returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    pub buffer: Rc<RefCell<Vec<u8>>>,
    pub len: usize,
    current_base: usize,
}

impl Memory {
    #[inline]
    pub fn new() -> Self {
        Self {
            buffer: Rc::new(RefCell::new(Vec::new())),
            len: 0,
            current_base: 0,
        }
    }

    /// Memory view for a child call frame.
    #[inline]
    pub fn next_memory(&self) -> Memory {
        let mut mem = self.clone();
        mem.current_base = mem.buffer.borrow().len();
        mem.len = 0;
        mem
    }

    /// Zeroes the region owned by this frame. Called on the frame that is about to be dropped.
    pub fn clean_from_base(&self) {
        let mut buffer = self.buffer.borrow_mut();
        let end = self.current_base.saturating_add(self.len).min(buffer.len());
        if let Some(region) = buffer.get_mut(self.current_base..end) {
            region.fill(0);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grows the frame's memory so that `new_memory_size` bytes, rounded up to a whole word,
    /// are addressable. Gas for the expansion must be charged beforehand.
    pub fn resize(&mut self, new_memory_size: usize) -> Result<(), VMError> {
        if new_memory_size == 0 {
            return Ok(());
        }

        let new_memory_size = new_memory_size
            .checked_next_multiple_of(WORD_SIZE_IN_BYTES_USIZE)
            .ok_or(OutOfBounds)?;

        if new_memory_size <= self.len {
            return Ok(());
        }

        let real_new_memory_size = new_memory_size
            .checked_add(self.current_base)
            .ok_or(OutOfBounds)?;

        let mut buffer = self.buffer.borrow_mut();
        if real_new_memory_size > buffer.len() {
            // Grow in bigger steps to avoid many tiny reallocations.
            let new_size = real_new_memory_size
                .checked_next_multiple_of(64)
                .ok_or(OutOfBounds)?;
            buffer.resize(new_size, 0);
        }
        self.len = new_memory_size;

        Ok(())
    }

    fn real_range(&self, offset: usize, size: usize) -> Result<std::ops::Range<usize>, VMError> {
        let start = self.current_base.checked_add(offset).ok_or(OutOfBounds)?;
        let end = start.checked_add(size).ok_or(OutOfBounds)?;
        Ok(start..end)
    }

    /// Load `size` bytes from the given offset, expanding memory if needed.
    pub fn load_range(&mut self, offset: usize, size: usize) -> Result<Bytes, VMError> {
        if size == 0 {
            return Ok(Bytes::new());
        }

        self.resize(offset.checked_add(size).ok_or(OutOfBounds)?)?;
        let range = self.real_range(offset, size)?;

        let buffer = self.buffer.borrow();
        let data = buffer.get(range).ok_or(InternalError::Slicing)?;
        Ok(Bytes::copy_from_slice(data))
    }

    pub fn load_range_const<const N: usize>(&mut self, offset: usize) -> Result<[u8; N], VMError> {
        self.resize(offset.checked_add(N).ok_or(OutOfBounds)?)?;
        let range = self.real_range(offset, N)?;

        let buffer = self.buffer.borrow();
        let data = buffer.get(range).ok_or(InternalError::Slicing)?;
        Ok(<[u8; N]>::try_from(data).map_err(|_| InternalError::Slicing)?)
    }

    pub fn load_word(&mut self, offset: usize) -> Result<U256, VMError> {
        let value: [u8; 32] = self.load_range_const(offset)?;
        Ok(u256_from_big_endian_const(value))
    }

    /// Writes `data` at `offset`. Memory must already cover the range.
    fn store(&self, data: &[u8], offset: usize) -> Result<(), VMError> {
        if data.is_empty() {
            return Ok(());
        }

        let range = self.real_range(offset, data.len())?;
        let mut buffer = self.buffer.borrow_mut();
        buffer
            .get_mut(range)
            .ok_or(InternalError::Slicing)?
            .copy_from_slice(data);
        Ok(())
    }

    pub fn store_data(&mut self, offset: usize, data: &[u8]) -> Result<(), VMError> {
        if data.is_empty() {
            return Ok(());
        }
        self.resize(offset.checked_add(data.len()).ok_or(OutOfBounds)?)?;
        self.store(data, offset)
    }

    /// Stores data and zero-pads up to `total_size` at the given offset.
    pub fn store_data_zero_padded(
        &mut self,
        offset: usize,
        data: &[u8],
        total_size: usize,
    ) -> Result<(), VMError> {
        if total_size == 0 {
            return Ok(());
        }

        self.resize(offset.checked_add(total_size).ok_or(OutOfBounds)?)?;

        let copy_size = data.len().min(total_size);
        let to_copy = data.get(..copy_size).ok_or(InternalError::Slicing)?;
        self.store(to_copy, offset)?;

        if copy_size < total_size {
            let zero_offset = offset.checked_add(copy_size).ok_or(OutOfBounds)?;
            let zero_size = total_size
                .checked_sub(copy_size)
                .ok_or(InternalError::Underflow)?;
            self.fill_zeros(zero_offset, zero_size)?;
        }

        Ok(())
    }

    pub fn store_word(&mut self, offset: usize, word: U256) -> Result<(), VMError> {
        self.resize(
            offset
                .checked_add(WORD_SIZE_IN_BYTES_USIZE)
                .ok_or(OutOfBounds)?,
        )?;
        self.store(&u256_to_big_endian(word), offset)
    }

    /// Copies memory within 2 offsets. Like a memmove.
    ///
    /// Resizes if needed, because one can copy from "expanded memory", which is initialized with zeroes.
    pub fn copy_within(
        &mut self,
        from_offset: usize,
        to_offset: usize,
        size: usize,
    ) -> Result<(), VMError> {
        if size == 0 {
            return Ok(());
        }

        self.resize(
            to_offset
                .max(from_offset)
                .checked_add(size)
                .ok_or(InternalError::Overflow)?,
        )?;

        let source = self.real_range(from_offset, size)?;
        let destination = self.real_range(to_offset, size)?;

        let mut buffer = self.buffer.borrow_mut();
        if destination.end > buffer.len() || source.end > buffer.len() {
            return Err(InternalError::Slicing.into());
        }
        buffer.copy_within(source, destination.start);

        Ok(())
    }

    pub fn store_zeros(&mut self, offset: usize, size: usize) -> Result<(), VMError> {
        if size == 0 {
            return Ok(());
        }
        self.resize(offset.checked_add(size).ok_or(OutOfBounds)?)?;
        self.fill_zeros(offset, size)
    }

    fn fill_zeros(&self, offset: usize, size: usize) -> Result<(), VMError> {
        let range = self.real_range(offset, size)?;
        let mut buffer = self.buffer.borrow_mut();
        buffer
            .get_mut(range)
            .ok_or(InternalError::Slicing)?
            .fill(0);
        Ok(())
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

/// Memory size needed to access `size` bytes at `offset`, rounded up to whole words.
#[inline]
pub fn calculate_memory_size(offset: usize, size: usize) -> Result<usize, VMError> {
    if size == 0 {
        return Ok(0);
    }

    offset
        .checked_add(size)
        .and_then(|sum| sum.checked_next_multiple_of(WORD_SIZE_IN_BYTES_USIZE))
        .ok_or(OutOfBounds.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_rounds_to_words() {
        let mut memory = Memory::new();
        memory.resize(1).unwrap();
        assert_eq!(memory.len(), 32);
        memory.resize(33).unwrap();
        assert_eq!(memory.len(), 64);
    }

    #[test]
    fn store_and_load_word() {
        let mut memory = Memory::new();
        memory.store_word(0, U256::from(0xabcd)).unwrap();
        assert_eq!(memory.load_word(0).unwrap(), U256::from(0xabcd));
        assert_eq!(memory.load_range(30, 2).unwrap().as_ref(), &[0xab, 0xcd]);
    }

    #[test]
    fn zero_padded_store_clears_tail() {
        let mut memory = Memory::new();
        memory.store_data(0, &[0xff; 8]).unwrap();
        memory.store_data_zero_padded(0, &[1, 2], 8).unwrap();
        assert_eq!(
            memory.load_range(0, 8).unwrap().as_ref(),
            &[1, 2, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn child_memory_is_isolated_and_cleaned() {
        let mut parent = Memory::new();
        parent.store_word(0, U256::one()).unwrap();

        let mut child = parent.next_memory();
        assert!(child.is_empty());
        child.store_word(0, U256::MAX).unwrap();
        assert_eq!(parent.load_word(0).unwrap(), U256::one());

        child.clean_from_base();
        let buffer = parent.buffer.borrow();
        assert!(buffer.iter().skip(32).all(|byte| *byte == 0));
    }

    #[test]
    fn copy_within_overlapping() {
        let mut memory = Memory::new();
        memory.store_data(0, &[1, 2, 3, 4]).unwrap();
        memory.copy_within(0, 2, 4).unwrap();
        assert_eq!(memory.load_range(0, 6).unwrap().as_ref(), &[1, 2, 1, 2, 3, 4]);
    }
}
