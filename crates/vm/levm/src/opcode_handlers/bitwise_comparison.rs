use crate::{
    errors::{OpcodeResult, VMError},
    opcode_handlers::arithmetic::is_negative,
    vm::VM,
};
use txtrace_common::U256;

// Comparison and Bitwise Logic Operations (15)
// Opcodes: LT, GT, SLT, SGT, EQ, ISZERO, AND, OR, XOR, NOT, BYTE, SHL, SHR, SAR

impl<'a> VM<'a> {
    /// Charges `very_low` gas, pops two operands and pushes `op(top, second)`.
    #[inline]
    fn binary_very_low(
        &mut self,
        op: impl FnOnce(U256, U256) -> U256,
    ) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas.very_low)?;

        let [lho, rho] = *current_call_frame.stack.pop()?;
        current_call_frame.stack.push(op(lho, rho))?;

        Ok(OpcodeResult::Continue)
    }

    // LT operation
    #[inline]
    pub fn op_lt(&mut self) -> Result<OpcodeResult, VMError> {
        self.binary_very_low(|lho, rho| u256_from_bool(lho < rho))
    }

    // GT operation
    #[inline]
    pub fn op_gt(&mut self) -> Result<OpcodeResult, VMError> {
        self.binary_very_low(|lho, rho| u256_from_bool(lho > rho))
    }

    // SLT operation (signed less than)
    pub fn op_slt(&mut self) -> Result<OpcodeResult, VMError> {
        self.binary_very_low(|lho, rho| {
            let (lho_negative, rho_negative) = (is_negative(lho), is_negative(rho));
            // Different signs: the negative one is smaller. Same sign: two's complement keeps order.
            u256_from_bool(if lho_negative == rho_negative {
                lho < rho
            } else {
                lho_negative
            })
        })
    }

    // SGT operation (signed greater than)
    pub fn op_sgt(&mut self) -> Result<OpcodeResult, VMError> {
        self.binary_very_low(|lho, rho| {
            let (lho_negative, rho_negative) = (is_negative(lho), is_negative(rho));
            u256_from_bool(if lho_negative == rho_negative {
                lho > rho
            } else {
                rho_negative
            })
        })
    }

    // EQ operation (equality check)
    #[inline]
    pub fn op_eq(&mut self) -> Result<OpcodeResult, VMError> {
        self.binary_very_low(|lho, rho| u256_from_bool(lho == rho))
    }

    // ISZERO operation (check if zero)
    #[inline]
    pub fn op_iszero(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas.very_low)?;

        let operand = current_call_frame.stack.pop1()?;
        current_call_frame
            .stack
            .push(u256_from_bool(operand.is_zero()))?;

        Ok(OpcodeResult::Continue)
    }

    // AND operation
    #[inline]
    pub fn op_and(&mut self) -> Result<OpcodeResult, VMError> {
        self.binary_very_low(|a, b| a & b)
    }

    // OR operation
    #[inline]
    pub fn op_or(&mut self) -> Result<OpcodeResult, VMError> {
        self.binary_very_low(|a, b| a | b)
    }

    // XOR operation
    pub fn op_xor(&mut self) -> Result<OpcodeResult, VMError> {
        self.binary_very_low(|a, b| a ^ b)
    }

    // NOT operation
    pub fn op_not(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas.very_low)?;

        let operand = current_call_frame.stack.pop1()?;
        current_call_frame.stack.push(!operand)?;

        Ok(OpcodeResult::Continue)
    }

    // BYTE operation
    pub fn op_byte(&mut self) -> Result<OpcodeResult, VMError> {
        self.binary_very_low(|index, word| {
            // `U256::byte` counts from the least significant byte.
            if index < U256::from(32) {
                let from_lsb = 31usize.saturating_sub(index.as_usize());
                U256::from(word.byte(from_lsb))
            } else {
                U256::zero()
            }
        })
    }

    // SHL operation (shift left)
    #[inline]
    #[allow(clippy::arithmetic_side_effects, reason = "shift amounts are below 256")]
    pub fn op_shl(&mut self) -> Result<OpcodeResult, VMError> {
        self.binary_very_low(|shift, value| {
            if shift < U256::from(256) {
                value << shift.as_usize()
            } else {
                U256::zero()
            }
        })
    }

    // SHR operation (shift right)
    #[inline]
    #[allow(clippy::arithmetic_side_effects, reason = "shift amounts are below 256")]
    pub fn op_shr(&mut self) -> Result<OpcodeResult, VMError> {
        self.binary_very_low(|shift, value| {
            if shift < U256::from(256) {
                value >> shift.as_usize()
            } else {
                U256::zero()
            }
        })
    }

    // SAR operation (arithmetic shift right)
    #[allow(clippy::arithmetic_side_effects, reason = "shift amounts are below 256")]
    pub fn op_sar(&mut self) -> Result<OpcodeResult, VMError> {
        self.binary_very_low(|shift, value| {
            let negative = is_negative(value);
            if shift < U256::from(256) {
                let shift = shift.as_usize();
                let shifted = value >> shift;
                if negative && shift > 0 {
                    // Fill the vacated high bits with ones.
                    shifted | (U256::MAX << 256usize.saturating_sub(shift))
                } else {
                    shifted
                }
            } else if negative {
                U256::MAX
            } else {
                U256::zero()
            }
        })
    }
}

const fn u256_from_bool(value: bool) -> U256 {
    if value { U256::one() } else { U256::zero() }
}
