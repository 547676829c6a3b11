use crate::{
    errors::{InternalError, OpcodeResult, VMError},
    gas_cost,
    vm::VM,
};
use txtrace_common::{U256, U512};

// Arithmetic Operations (11)
// Opcodes: ADD, SUB, MUL, DIV, SDIV, MOD, SMOD, ADDMOD, MULMOD, EXP, SIGNEXTEND

impl<'a> VM<'a> {
    // ADD operation
    #[inline]
    pub fn op_add(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas.very_low)?;

        let [augend, addend] = *current_call_frame.stack.pop()?;
        current_call_frame
            .stack
            .push(augend.overflowing_add(addend).0)?;

        Ok(OpcodeResult::Continue)
    }

    // SUB operation
    #[inline]
    pub fn op_sub(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas.very_low)?;

        let [minuend, subtrahend] = *current_call_frame.stack.pop()?;
        current_call_frame
            .stack
            .push(minuend.overflowing_sub(subtrahend).0)?;

        Ok(OpcodeResult::Continue)
    }

    // MUL operation
    #[inline]
    pub fn op_mul(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas.low)?;

        let [multiplicand, multiplier] = *current_call_frame.stack.pop()?;
        current_call_frame
            .stack
            .push(multiplicand.overflowing_mul(multiplier).0)?;

        Ok(OpcodeResult::Continue)
    }

    // DIV operation
    pub fn op_div(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas.low)?;

        let [dividend, divisor] = *current_call_frame.stack.pop()?;
        let quotient = dividend.checked_div(divisor).unwrap_or_default();
        current_call_frame.stack.push(quotient)?;

        Ok(OpcodeResult::Continue)
    }

    // SDIV operation
    pub fn op_sdiv(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas.low)?;

        let [dividend, divisor] = *current_call_frame.stack.pop()?;
        if divisor.is_zero() || dividend.is_zero() {
            current_call_frame.stack.push_zero()?;
            return Ok(OpcodeResult::Continue);
        }

        let quotient = match abs(dividend).checked_div(abs(divisor)) {
            Some(quotient) if is_negative(dividend) ^ is_negative(divisor) => negate(quotient),
            Some(quotient) => quotient,
            None => U256::zero(),
        };
        current_call_frame.stack.push(quotient)?;

        Ok(OpcodeResult::Continue)
    }

    // MOD operation
    pub fn op_mod(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas.low)?;

        let [dividend, divisor] = *current_call_frame.stack.pop()?;
        let remainder = dividend.checked_rem(divisor).unwrap_or_default();
        current_call_frame.stack.push(remainder)?;

        Ok(OpcodeResult::Continue)
    }

    // SMOD operation
    pub fn op_smod(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas.low)?;

        let [dividend, divisor] = *current_call_frame.stack.pop()?;
        if divisor.is_zero() || dividend.is_zero() {
            current_call_frame.stack.push_zero()?;
            return Ok(OpcodeResult::Continue);
        }

        // The result takes the sign of the dividend.
        let remainder = match abs(dividend).checked_rem(abs(divisor)) {
            Some(remainder) if is_negative(dividend) => negate(remainder),
            Some(remainder) => remainder,
            None => U256::zero(),
        };
        current_call_frame.stack.push(remainder)?;

        Ok(OpcodeResult::Continue)
    }

    // ADDMOD operation
    pub fn op_addmod(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas.mid)?;

        let [augend, addend, modulus] = *current_call_frame.stack.pop()?;
        if modulus.is_zero() {
            current_call_frame.stack.push_zero()?;
            return Ok(OpcodeResult::Continue);
        }

        let sum = U512::from(augend)
            .checked_add(U512::from(addend))
            .ok_or(InternalError::Overflow)?;
        let sum_mod = sum
            .checked_rem(U512::from(modulus))
            .ok_or(InternalError::DivisionByZero)?;
        let sum_mod = U256::try_from(sum_mod).map_err(|_| InternalError::TypeConversion)?;
        current_call_frame.stack.push(sum_mod)?;

        Ok(OpcodeResult::Continue)
    }

    // MULMOD operation
    pub fn op_mulmod(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas.mid)?;

        let [multiplicand, multiplier, modulus] = *current_call_frame.stack.pop()?;
        if modulus.is_zero() || multiplicand.is_zero() || multiplier.is_zero() {
            current_call_frame.stack.push_zero()?;
            return Ok(OpcodeResult::Continue);
        }

        let product_mod = multiplicand
            .full_mul(multiplier)
            .checked_rem(U512::from(modulus))
            .ok_or(InternalError::DivisionByZero)?;
        let product_mod =
            U256::try_from(product_mod).map_err(|_| InternalError::TypeConversion)?;
        current_call_frame.stack.push(product_mod)?;

        Ok(OpcodeResult::Continue)
    }

    // EXP operation
    pub fn op_exp(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        let [base, exponent] = *current_call_frame.stack.pop()?;

        current_call_frame.increase_consumed_gas(gas_cost::exp(gas, exponent)?)?;

        current_call_frame
            .stack
            .push(base.overflowing_pow(exponent).0)?;

        Ok(OpcodeResult::Continue)
    }

    // SIGNEXTEND operation
    pub fn op_signextend(&mut self) -> Result<OpcodeResult, VMError> {
        let gas = self.env.ruleset.gas;
        let current_call_frame = &mut self.current_call_frame;
        current_call_frame.increase_consumed_gas(gas.low)?;

        let [byte_size_minus_one, value_to_extend] = *current_call_frame.stack.pop()?;

        if byte_size_minus_one > U256::from(31) {
            current_call_frame.stack.push(value_to_extend)?;
            return Ok(OpcodeResult::Continue);
        }

        #[expect(
            clippy::arithmetic_side_effects,
            reason = "byte_size_minus_one <= 31 so the sign bit index is at most 255"
        )]
        let result = {
            let sign_bit_index = byte_size_minus_one.low_u64() * 8 + 7;
            let sign_bit = (value_to_extend >> sign_bit_index) & U256::one();
            let mask = (U256::one() << sign_bit_index) - U256::one();

            if sign_bit.is_zero() {
                value_to_extend & mask
            } else {
                value_to_extend | !mask
            }
        };
        current_call_frame.stack.push(result)?;

        Ok(OpcodeResult::Continue)
    }
}

/// Whether the value is negative in two's complement.
pub(crate) fn is_negative(value: U256) -> bool {
    value.bit(255)
}

/// Negates a number in two's complement
pub(crate) fn negate(value: U256) -> U256 {
    (!value).overflowing_add(U256::one()).0
}

pub(crate) fn abs(value: U256) -> U256 {
    if is_negative(value) {
        negate(value)
    } else {
        value
    }
}
