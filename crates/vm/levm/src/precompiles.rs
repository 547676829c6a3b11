//! Native contracts living at the low addresses `0x01..=last_precompile`.
//!
//! Cancun rulesets expose `0x01..=0x0a`. Prague adds the BLS12-381 operations at `0x0b..=0x11`.

use crate::{
    environment::ChainRuleset,
    errors::{ExceptionalHalt, InternalError, PrecompileError, VMError},
};
use ark_bn254::{
    Bn254, Fq, Fq2, G1Affine as BnG1Affine, G1Projective as BnG1Projective,
    G2Affine as BnG2Affine,
};
use ark_ec::{AffineRepr, CurveGroup, pairing::Pairing};
use ark_ff::{BigInt, BigInteger, One, PrimeField, Zero};
use bls12_381::{
    G1Affine, G1Projective, G2Affine, G2Prepared, G2Projective, Gt, Scalar,
    hash_to_curve::{HashToField, MapToCurve},
    multi_miller_loop,
};
use bytes::Bytes;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use malachite::{
    Natural,
    base::num::{
        arithmetic::traits::ModPow,
        basic::traits::{One as _, Zero as _},
        conversion::traits::PowerOf2Digits,
    },
};
use sha2::Digest;
use txtrace_common::{Address, H160, U256, utils::keccak};

pub const ECRECOVER_ADDRESS: H160 = address_from_low_byte(0x01);
pub const SHA2_256_ADDRESS: H160 = address_from_low_byte(0x02);
pub const RIPEMD_160_ADDRESS: H160 = address_from_low_byte(0x03);
pub const IDENTITY_ADDRESS: H160 = address_from_low_byte(0x04);
pub const MODEXP_ADDRESS: H160 = address_from_low_byte(0x05);
pub const ECADD_ADDRESS: H160 = address_from_low_byte(0x06);
pub const ECMUL_ADDRESS: H160 = address_from_low_byte(0x07);
pub const ECPAIRING_ADDRESS: H160 = address_from_low_byte(0x08);
pub const BLAKE2F_ADDRESS: H160 = address_from_low_byte(0x09);
pub const POINT_EVALUATION_ADDRESS: H160 = address_from_low_byte(0x0a);
pub const BLS12_G1ADD_ADDRESS: H160 = address_from_low_byte(0x0b);
pub const BLS12_G1MSM_ADDRESS: H160 = address_from_low_byte(0x0c);
pub const BLS12_G2ADD_ADDRESS: H160 = address_from_low_byte(0x0d);
pub const BLS12_G2MSM_ADDRESS: H160 = address_from_low_byte(0x0e);
pub const BLS12_PAIRING_CHECK_ADDRESS: H160 = address_from_low_byte(0x0f);
pub const BLS12_MAP_FP_TO_G1_ADDRESS: H160 = address_from_low_byte(0x10);
pub const BLS12_MAP_FP2_TO_G2_ADDRESS: H160 = address_from_low_byte(0x11);

pub const ECRECOVER_COST: u64 = 3000;
pub const SHA2_256_STATIC_COST: u64 = 60;
pub const SHA2_256_DYNAMIC_BASE: u64 = 12;
pub const RIPEMD_160_STATIC_COST: u64 = 600;
pub const RIPEMD_160_DYNAMIC_BASE: u64 = 120;
pub const IDENTITY_STATIC_COST: u64 = 15;
pub const IDENTITY_DYNAMIC_BASE: u64 = 3;
pub const MODEXP_STATIC_COST: u64 = 200;
pub const MODEXP_DYNAMIC_QUOTIENT: u64 = 3;

// EIP-1108
pub const ECADD_COST: u64 = 150;
pub const ECMUL_COST: u64 = 6000;
pub const ECPAIRING_BASE_COST: u64 = 45000;
pub const ECPAIRING_GROUP_COST: u64 = 34000;

pub const BLAKE2F_ROUND_COST: u64 = 1;
pub const POINT_EVALUATION_COST: u64 = 50000;

// EIP-2537
pub const BLS12_381_G1ADD_COST: u64 = 375;
pub const BLS12_381_G2ADD_COST: u64 = 600;
pub const BLS12_381_G1_K_DISCOUNT_MULTIPLIER: u64 = 12000;
pub const BLS12_381_G2_K_DISCOUNT_MULTIPLIER: u64 = 22500;
pub const BLS12_381_PAIRING_BASE_COST: u64 = 37700;
pub const BLS12_381_PAIRING_GROUP_COST: u64 = 32600;
pub const BLS12_381_MAP_FP_TO_G1_COST: u64 = 5500;
pub const BLS12_381_MAP_FP2_TO_G2_COST: u64 = 23800;

const BLS12_381_MSM_DISCOUNT_DIVISOR: u64 = 1000;
const BLS12_381_G1_MAX_DISCOUNT: u64 = 519;
const BLS12_381_G2_MAX_DISCOUNT: u64 = 524;

#[rustfmt::skip]
const BLS12_381_G1_K_DISCOUNT: [u64; 128] = [
    1000, 949, 848, 797, 764, 750, 738, 728, 719, 712, 705, 698, 692, 687, 682, 677, 673, 669,
    665, 661, 658, 654, 651, 648, 645, 642, 640, 637, 635, 632, 630, 627, 625, 623, 621, 619,
    617, 615, 613, 611, 609, 608, 606, 604, 603, 601, 599, 598, 596, 595, 593, 592, 591, 589,
    588, 586, 585, 584, 582, 581, 580, 579, 577, 576, 575, 574, 573, 572, 570, 569, 568, 567,
    566, 565, 564, 563, 562, 561, 560, 559, 558, 557, 556, 555, 554, 553, 552, 551, 550, 549,
    548, 547, 547, 546, 545, 544, 543, 542, 541, 540, 540, 539, 538, 537, 536, 536, 535, 534,
    533, 532, 532, 531, 530, 529, 528, 528, 527, 526, 525, 525, 524, 523, 522, 522, 521, 520,
    520, 519,
];

#[rustfmt::skip]
const BLS12_381_G2_K_DISCOUNT: [u64; 128] = [
    1000, 1000, 923, 884, 855, 832, 812, 796, 782, 770, 759, 749, 740, 732, 724, 717, 711, 704,
    699, 693, 688, 683, 679, 674, 670, 666, 663, 659, 655, 652, 649, 646, 643, 640, 637, 634,
    632, 629, 627, 624, 622, 620, 618, 615, 613, 611, 609, 607, 606, 604, 602, 600, 598, 597,
    595, 593, 592, 590, 589, 587, 586, 584, 583, 582, 580, 579, 578, 576, 575, 574, 573, 571,
    570, 569, 568, 567, 566, 565, 563, 562, 561, 560, 559, 558, 557, 556, 555, 554, 553, 552,
    552, 551, 550, 549, 548, 547, 546, 545, 545, 544, 543, 542, 541, 541, 540, 539, 538, 537,
    537, 536, 535, 535, 534, 533, 532, 532, 531, 530, 530, 529, 528, 528, 527, 526, 526, 525,
    524, 524,
];

/// Big-endian modulus of the BLS12-381 base field.
const BLS12_381_FIELD_MODULUS: [u8; 48] = [
    0x1a, 0x01, 0x11, 0xea, 0x39, 0x7f, 0xe6, 0x9a, 0x4b, 0x1b, 0xa7, 0xb6, 0x43, 0x4b, 0xac, 0xd7,
    0x64, 0x77, 0x4b, 0x84, 0xf3, 0x85, 0x12, 0xbf, 0x67, 0x30, 0xd2, 0xa0, 0xf6, 0xb0, 0xf6, 0x24,
    0x1e, 0xab, 0xff, 0xfe, 0xb1, 0x53, 0xff, 0xff, 0xb9, 0xfe, 0xff, 0xff, 0xff, 0xff, 0xaa, 0xab,
];

/// Big-endian modulus of the BLS12-381 scalar field, returned by the point evaluation precompile.
const BLS_MODULUS: [u8; 32] = [
    0x73, 0xed, 0xa7, 0x53, 0x29, 0x9d, 0x7d, 0x48, 0x33, 0x39, 0xd8, 0x08, 0x09, 0xa1, 0xd8, 0x05,
    0x53, 0xbd, 0xa4, 0x02, 0xff, 0xfe, 0x5b, 0xfe, 0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x01,
];
const FIELD_ELEMENTS_PER_BLOB: u64 = 4096;
const VERSIONED_HASH_VERSION_KZG: u8 = 0x01;

const BLS12_381_FP_LENGTH: usize = 48;
const BLS12_381_PADDED_FP_LENGTH: usize = 64;
const BLS12_381_PADDED_FP2_LENGTH: usize = 128;
const BLS12_381_FP_PADDING: usize = 16;
const BLS12_381_G1_POINT_LENGTH: usize = 128;
const BLS12_381_G2_POINT_LENGTH: usize = 256;
const BLS12_381_G1ADD_INPUT_LENGTH: usize = 256;
const BLS12_381_G2ADD_INPUT_LENGTH: usize = 512;
const BLS12_381_SCALAR_LENGTH: usize = 32;
const BLS12_381_G1_MSM_PAIR_LENGTH: usize = 160;
const BLS12_381_G2_MSM_PAIR_LENGTH: usize = 288;
const BLS12_381_PAIRING_PAIR_LENGTH: usize = 384;

const ECPAIRING_PAIR_LENGTH: usize = 192;
const BLAKE2F_INPUT_LENGTH: usize = 213;
const POINT_EVALUATION_INPUT_LENGTH: usize = 192;

const fn address_from_low_byte(byte: u8) -> H160 {
    let mut bytes = [0u8; 20];
    bytes[19] = byte;
    H160(bytes)
}

/// Whether `address` is in the precompile range of the ruleset.
pub fn is_precompile(address: &Address, ruleset: &ChainRuleset) -> bool {
    let (high, low) = address.as_bytes().split_at(12);
    if high.iter().any(|byte| *byte != 0) {
        return false;
    }
    let mut low_bytes = [0u8; 8];
    low_bytes.copy_from_slice(low);
    let index = u64::from_be_bytes(low_bytes);
    (1..=ruleset.last_precompile).contains(&index)
}

/// Runs the precompile at `address`, charging its cost from `gas_remaining`.
pub fn execute_precompile(
    address: Address,
    calldata: &Bytes,
    gas_remaining: &mut u64,
    ruleset: &ChainRuleset,
) -> Result<Bytes, VMError> {
    if !is_precompile(&address, ruleset) {
        return Err(InternalError::msg("called a non-precompile address as a precompile").into());
    }

    match address {
        a if a == ECRECOVER_ADDRESS => ecrecover(calldata, gas_remaining),
        a if a == SHA2_256_ADDRESS => sha2_256(calldata, gas_remaining),
        a if a == RIPEMD_160_ADDRESS => ripemd_160(calldata, gas_remaining),
        a if a == IDENTITY_ADDRESS => identity(calldata, gas_remaining),
        a if a == MODEXP_ADDRESS => modexp(calldata, gas_remaining),
        a if a == ECADD_ADDRESS => ecadd(calldata, gas_remaining),
        a if a == ECMUL_ADDRESS => ecmul(calldata, gas_remaining),
        a if a == ECPAIRING_ADDRESS => ecpairing(calldata, gas_remaining),
        a if a == BLAKE2F_ADDRESS => blake2f(calldata, gas_remaining),
        a if a == POINT_EVALUATION_ADDRESS => point_evaluation(calldata, gas_remaining),
        a if a == BLS12_G1ADD_ADDRESS => bls12_g1add(calldata, gas_remaining),
        a if a == BLS12_G1MSM_ADDRESS => bls12_g1msm(calldata, gas_remaining),
        a if a == BLS12_G2ADD_ADDRESS => bls12_g2add(calldata, gas_remaining),
        a if a == BLS12_G2MSM_ADDRESS => bls12_g2msm(calldata, gas_remaining),
        a if a == BLS12_PAIRING_CHECK_ADDRESS => bls12_pairing_check(calldata, gas_remaining),
        a if a == BLS12_MAP_FP_TO_G1_ADDRESS => bls12_map_fp_to_g1(calldata, gas_remaining),
        a if a == BLS12_MAP_FP2_TO_G2_ADDRESS => bls12_map_fp2_to_g2(calldata, gas_remaining),
        other => Err(PrecompileError::NotSupported(other).into()),
    }
}

fn increase_precompile_consumed_gas(gas_cost: u64, gas_remaining: &mut u64) -> Result<(), VMError> {
    *gas_remaining = gas_remaining
        .checked_sub(gas_cost)
        .ok_or(ExceptionalHalt::Precompile(PrecompileError::NotEnoughGas))?;
    Ok(())
}

/// `static + dynamic * ceil(len / 32)`.
fn linear_cost(data_len: usize, static_cost: u64, dynamic_base: u64) -> Result<u64, VMError> {
    let words = u64::try_from(data_len)
        .map_err(|_| InternalError::TypeConversion)?
        .div_ceil(32);
    words
        .checked_mul(dynamic_base)
        .and_then(|dynamic| dynamic.checked_add(static_cost))
        .ok_or(PrecompileError::NotEnoughGas.into())
}

/// Copies `size` bytes from `offset`, padding with zeros past the end of the input.
fn get_slice_padded(calldata: &[u8], offset: usize, size: usize) -> Vec<u8> {
    let mut padded = vec![0u8; size];
    let available = crate::utils::available_slice(calldata, offset, size);
    if let Some(dest) = padded.get_mut(..available.len()) {
        dest.copy_from_slice(available);
    }
    padded
}

fn to_array<const N: usize>(bytes: &[u8]) -> Result<[u8; N], VMError> {
    bytes
        .try_into()
        .map_err(|_| PrecompileError::ParsingInputError.into())
}

/// Number of `pair_length` sized groups in `calldata`, rejecting a ragged tail.
fn group_count(calldata: &[u8], pair_length: usize) -> Result<u64, VMError> {
    if calldata.len().checked_rem(pair_length) != Some(0) {
        return Err(PrecompileError::ParsingInputError.into());
    }
    let count = calldata
        .len()
        .checked_div(pair_length)
        .ok_or(InternalError::DivisionByZero)?;
    u64::try_from(count).map_err(|_| InternalError::TypeConversion.into())
}

/// `base + per_group * groups`, as used by both pairing checks.
fn pairing_cost(groups: u64, base: u64, per_group: u64) -> Result<u64, VMError> {
    groups
        .checked_mul(per_group)
        .and_then(|cost| cost.checked_add(base))
        .ok_or(PrecompileError::NotEnoughGas.into())
}

/// Recovers the signer of a message hash. Invalid signatures produce empty output, not an error.
pub fn ecrecover(calldata: &Bytes, gas_remaining: &mut u64) -> Result<Bytes, VMError> {
    increase_precompile_consumed_gas(ECRECOVER_COST, gas_remaining)?;

    let input = get_slice_padded(calldata, 0, 128);
    let (hash, rest) = input.split_at(32);
    let (v, signature) = rest.split_at(32);

    // v must be a left-padded 27 or 28
    let (v_padding, v_byte) = v.split_at(31);
    if v_padding.iter().any(|byte| *byte != 0) {
        return Ok(Bytes::new());
    }
    let recovery_byte = match v_byte.first() {
        Some(27) => 0u8,
        Some(28) => 1u8,
        _ => return Ok(Bytes::new()),
    };

    let Ok(mut signature) = Signature::from_slice(signature) else {
        return Ok(Bytes::new());
    };
    let Some(mut recovery_id) = RecoveryId::from_byte(recovery_byte) else {
        return Ok(Bytes::new());
    };
    // High-s signatures are valid here; flip them to the canonical form k256 expects.
    if let Some(normalized) = signature.normalize_s() {
        signature = normalized;
        recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
    }

    let Ok(public_key) = VerifyingKey::recover_from_prehash(hash, &signature, recovery_id) else {
        return Ok(Bytes::new());
    };

    let encoded = public_key.to_encoded_point(false);
    let Some(xy) = encoded.as_bytes().get(1..) else {
        return Ok(Bytes::new());
    };
    let address_hash = keccak(xy);

    let mut output = [0u8; 32];
    let (_, address_part) = output.split_at_mut(12);
    let (_, hash_tail) = address_hash.as_bytes().split_at(12);
    address_part.copy_from_slice(hash_tail);
    Ok(Bytes::copy_from_slice(&output))
}

pub fn sha2_256(calldata: &Bytes, gas_remaining: &mut u64) -> Result<Bytes, VMError> {
    let gas_cost = linear_cost(calldata.len(), SHA2_256_STATIC_COST, SHA2_256_DYNAMIC_BASE)?;
    increase_precompile_consumed_gas(gas_cost, gas_remaining)?;

    let digest = sha2::Sha256::digest(calldata);
    Ok(Bytes::copy_from_slice(&digest))
}

/// The 20-byte digest is returned left-padded to a word.
pub fn ripemd_160(calldata: &Bytes, gas_remaining: &mut u64) -> Result<Bytes, VMError> {
    let gas_cost = linear_cost(calldata.len(), RIPEMD_160_STATIC_COST, RIPEMD_160_DYNAMIC_BASE)?;
    increase_precompile_consumed_gas(gas_cost, gas_remaining)?;

    let digest = ripemd::Ripemd160::digest(calldata);
    let mut output = vec![0u8; 12];
    output.extend_from_slice(&digest);
    Ok(Bytes::from(output))
}

pub fn identity(calldata: &Bytes, gas_remaining: &mut u64) -> Result<Bytes, VMError> {
    let gas_cost = linear_cost(calldata.len(), IDENTITY_STATIC_COST, IDENTITY_DYNAMIC_BASE)?;
    increase_precompile_consumed_gas(gas_cost, gas_remaining)?;

    Ok(calldata.clone())
}

/// Modular exponentiation with EIP-2565 pricing.
pub fn modexp(calldata: &Bytes, gas_remaining: &mut u64) -> Result<Bytes, VMError> {
    let header = get_slice_padded(calldata, 0, 96);
    let (base_size, rest) = header.split_at(32);
    let (exponent_size, modulus_size) = rest.split_at(32);
    let base_size = U256::from_big_endian(base_size);
    let exponent_size = U256::from_big_endian(exponent_size);
    let modulus_size = U256::from_big_endian(modulus_size);

    if base_size.is_zero() && modulus_size.is_zero() {
        increase_precompile_consumed_gas(MODEXP_STATIC_COST, gas_remaining)?;
        return Ok(Bytes::new());
    }

    // Sizes that don't fit a usize could never be paid for.
    let base_size = usize::try_from(base_size).map_err(|_| PrecompileError::NotEnoughGas)?;
    let modulus_size = usize::try_from(modulus_size).map_err(|_| PrecompileError::NotEnoughGas)?;
    let exponent_size =
        usize::try_from(exponent_size).map_err(|_| PrecompileError::NotEnoughGas)?;

    let exponent_offset = base_size
        .checked_add(96)
        .ok_or(PrecompileError::NotEnoughGas)?;
    let exponent_head = get_slice_padded(calldata, exponent_offset, exponent_size.min(32));

    let gas_cost = modexp_gas_cost(base_size, exponent_size, modulus_size, &exponent_head)?;
    increase_precompile_consumed_gas(gas_cost, gas_remaining)?;

    let base = get_slice_padded(calldata, 96, base_size);
    let exponent = get_slice_padded(calldata, exponent_offset, exponent_size);
    let modulus_offset = exponent_offset
        .checked_add(exponent_size)
        .ok_or(PrecompileError::ParsingInputError)?;
    let modulus = get_slice_padded(calldata, modulus_offset, modulus_size);

    let base = natural_from_be_bytes(&base)?;
    let exponent = natural_from_be_bytes(&exponent)?;
    let modulus = natural_from_be_bytes(&modulus)?;

    let result = mod_exp(base, exponent, modulus);
    let result_bytes: Vec<u8> = result.to_power_of_2_digits_desc(8);

    // Left-pad (or keep the low bytes) to exactly `modulus_size`.
    let mut output = vec![0u8; modulus_size];
    let copy_len = result_bytes.len().min(modulus_size);
    let src_start = result_bytes.len().saturating_sub(copy_len);
    let dest_start = modulus_size.saturating_sub(copy_len);
    if let (Some(dest), Some(src)) = (
        output.get_mut(dest_start..),
        result_bytes.get(src_start..),
    ) {
        dest.copy_from_slice(src);
    }

    Ok(Bytes::from(output))
}

fn natural_from_be_bytes(bytes: &[u8]) -> Result<Natural, VMError> {
    Natural::from_power_of_2_digits_desc(8, bytes.iter().copied())
        .ok_or(PrecompileError::ParsingInputError.into())
}

#[allow(
    clippy::arithmetic_side_effects,
    reason = "Natural arithmetic is arbitrary precision and the modulus is checked for zero"
)]
fn mod_exp(base: Natural, exponent: Natural, modulus: Natural) -> Natural {
    if modulus == Natural::ZERO {
        Natural::ZERO
    } else if exponent == Natural::ZERO {
        Natural::ONE % modulus
    } else {
        // mod_pow wants the base already reduced.
        let base = base % &modulus;
        base.mod_pow(&exponent, &modulus)
    }
}

/// `max(200, mult_complexity * iteration_count / 3)` following EIP-2565.
fn modexp_gas_cost(
    base_size: usize,
    exponent_size: usize,
    modulus_size: usize,
    exponent_head: &[u8],
) -> Result<u64, VMError> {
    let max_length = U256::from(base_size.max(modulus_size));
    let words = max_length
        .checked_add(U256::from(7))
        .and_then(|length| length.checked_div(U256::from(8)))
        .ok_or(PrecompileError::NotEnoughGas)?;
    let multiplication_complexity = words
        .checked_mul(words)
        .ok_or(PrecompileError::NotEnoughGas)?;

    let head = U256::from_big_endian(exponent_head);
    let head_bits = U256::from(head.bits());
    let iteration_count = if exponent_size <= 32 {
        head_bits.saturating_sub(U256::one())
    } else {
        U256::from(exponent_size)
            .saturating_sub(U256::from(32))
            .saturating_mul(U256::from(8))
            .saturating_add(head_bits.saturating_sub(U256::one()))
    }
    .max(U256::one());

    let cost = multiplication_complexity
        .saturating_mul(iteration_count)
        .checked_div(U256::from(MODEXP_DYNAMIC_QUOTIENT))
        .ok_or(InternalError::DivisionByZero)?
        .max(U256::from(MODEXP_STATIC_COST));

    u64::try_from(cost).map_err(|_| PrecompileError::NotEnoughGas.into())
}


/// Parses a big-endian BN254 base field element, rejecting values at or above the modulus.
fn bn254_field_element(bytes: &[u8]) -> Result<Fq, VMError> {
    let limbs = be_bytes_to_limbs(bytes)?;
    Fq::from_bigint(BigInt::new(limbs)).ok_or(PrecompileError::ParsingInputError.into())
}

/// Little-endian limbs of a 32-byte big-endian integer.
fn be_bytes_to_limbs(bytes: &[u8]) -> Result<[u64; 4], VMError> {
    let bytes: [u8; 32] = to_array(bytes)?;
    let mut limbs = [0u64; 4];
    for (limb, chunk) in limbs.iter_mut().zip(bytes.rchunks_exact(8)) {
        *limb = u64::from_be_bytes(to_array(chunk)?);
    }
    Ok(limbs)
}

/// `(x, y)` with `(0, 0)` standing for the point at infinity.
fn bn254_g1_point(bytes: &[u8]) -> Result<BnG1Affine, VMError> {
    let (x, y) = bytes.split_at(32);
    let x = bn254_field_element(x)?;
    let y = bn254_field_element(y)?;
    if x.is_zero() && y.is_zero() {
        return Ok(BnG1Affine::identity());
    }
    let point = BnG1Affine::new_unchecked(x, y);
    if !point.is_on_curve() {
        return Err(PrecompileError::InvalidPoint.into());
    }
    Ok(point)
}

/// Each coordinate is encoded imaginary part first.
fn bn254_g2_point(bytes: &[u8]) -> Result<BnG2Affine, VMError> {
    let elements = bytes
        .chunks_exact(32)
        .map(bn254_field_element)
        .collect::<Result<Vec<_>, _>>()?;
    let [x_im, x_re, y_im, y_re] = elements.as_slice() else {
        return Err(PrecompileError::ParsingInputError.into());
    };
    if elements.iter().all(Zero::is_zero) {
        return Ok(BnG2Affine::identity());
    }
    let point = BnG2Affine::new_unchecked(Fq2::new(*x_re, *x_im), Fq2::new(*y_re, *y_im));
    if !point.is_on_curve() {
        return Err(PrecompileError::InvalidPoint.into());
    }
    if !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err(PrecompileError::PointNotInSubgroup.into());
    }
    Ok(point)
}

fn bn254_encode_g1(point: BnG1Projective) -> Bytes {
    let mut output = vec![0u8; 64];
    if let Some((x, y)) = point.into_affine().xy() {
        let mut encoded = x.into_bigint().to_bytes_be();
        encoded.extend(y.into_bigint().to_bytes_be());
        output = encoded;
    }
    Bytes::from(output)
}

/// BN254 point addition (EIP-196).
#[allow(
    clippy::arithmetic_side_effects,
    reason = "group operations on curve points cannot overflow"
)]
pub fn ecadd(calldata: &Bytes, gas_remaining: &mut u64) -> Result<Bytes, VMError> {
    increase_precompile_consumed_gas(ECADD_COST, gas_remaining)?;

    let input = get_slice_padded(calldata, 0, 128);
    let (first, second) = input.split_at(64);
    let first = bn254_g1_point(first)?;
    let second = bn254_g1_point(second)?;

    Ok(bn254_encode_g1(first.into_group() + second))
}

/// BN254 scalar multiplication (EIP-196). The scalar is not reduced.
pub fn ecmul(calldata: &Bytes, gas_remaining: &mut u64) -> Result<Bytes, VMError> {
    increase_precompile_consumed_gas(ECMUL_COST, gas_remaining)?;

    let input = get_slice_padded(calldata, 0, 96);
    let (point, scalar) = input.split_at(64);
    let point = bn254_g1_point(point)?;
    let scalar = be_bytes_to_limbs(scalar)?;

    Ok(bn254_encode_g1(point.mul_bigint(scalar)))
}

/// BN254 pairing check (EIP-197). Empty input is a trivially satisfied product.
pub fn ecpairing(calldata: &Bytes, gas_remaining: &mut u64) -> Result<Bytes, VMError> {
    let groups = group_count(calldata, ECPAIRING_PAIR_LENGTH)?;
    let gas_cost = pairing_cost(groups, ECPAIRING_BASE_COST, ECPAIRING_GROUP_COST)?;
    increase_precompile_consumed_gas(gas_cost, gas_remaining)?;

    let mut g1_points = Vec::new();
    let mut g2_points = Vec::new();
    for pair in calldata.chunks_exact(ECPAIRING_PAIR_LENGTH) {
        let (g1, g2) = pair.split_at(64);
        g1_points.push(bn254_g1_point(g1)?);
        g2_points.push(bn254_g2_point(g2)?);
    }

    let holds = Bn254::multi_pairing(g1_points, g2_points).0.is_one();
    Ok(boolean_word(holds))
}

fn boolean_word(value: bool) -> Bytes {
    let mut output = [0u8; 32];
    if value {
        output[31] = 1;
    }
    Bytes::copy_from_slice(&output)
}

#[rustfmt::skip]
const BLAKE2F_SIGMA: [[usize; 16]; 10] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
    [14, 10, 4, 8, 9, 15, 13, 6, 1, 12, 0, 2, 11, 7, 5, 3],
    [11, 8, 12, 0, 5, 2, 15, 13, 10, 14, 3, 6, 7, 1, 9, 4],
    [7, 9, 3, 1, 13, 12, 11, 14, 2, 6, 5, 10, 4, 0, 15, 8],
    [9, 0, 5, 7, 2, 4, 10, 15, 14, 1, 11, 12, 6, 8, 3, 13],
    [2, 12, 6, 10, 0, 11, 8, 3, 4, 13, 7, 5, 15, 14, 1, 9],
    [12, 5, 1, 15, 14, 13, 4, 10, 0, 7, 6, 3, 9, 2, 8, 11],
    [13, 11, 7, 14, 12, 1, 3, 9, 5, 0, 15, 4, 8, 6, 2, 10],
    [6, 15, 14, 9, 11, 3, 0, 8, 12, 2, 13, 7, 1, 4, 10, 5],
    [10, 2, 8, 4, 7, 6, 1, 5, 15, 11, 9, 14, 3, 12, 13, 0],
];

const BLAKE2B_IV: [u64; 8] = [
    0x6a09e667f3bcc908,
    0xbb67ae8584caa73b,
    0x3c6ef372fe94f82b,
    0xa54ff53a5f1d36f1,
    0x510e527fade682d1,
    0x9b05688c2b3e6c1f,
    0x1f83d9abfb41bd6b,
    0x5be0cd19137e2179,
];

/// BLAKE2b `G` mixing function.
#[allow(
    clippy::indexing_slicing,
    reason = "indices come from the fixed BLAKE2 schedule and are below 16"
)]
fn blake2_mix(v: &mut [u64; 16], (a, b, c, d): (usize, usize, usize, usize), x: u64, y: u64) {
    v[a] = v[a].wrapping_add(v[b]).wrapping_add(x);
    v[d] = (v[d] ^ v[a]).rotate_right(32);
    v[c] = v[c].wrapping_add(v[d]);
    v[b] = (v[b] ^ v[c]).rotate_right(24);
    v[a] = v[a].wrapping_add(v[b]).wrapping_add(y);
    v[d] = (v[d] ^ v[a]).rotate_right(16);
    v[c] = v[c].wrapping_add(v[d]);
    v[b] = (v[b] ^ v[c]).rotate_right(63);
}

/// BLAKE2b compression function `F` with a caller-chosen number of rounds.
#[allow(
    clippy::indexing_slicing,
    reason = "message indices come from the sigma table and are below 16"
)]
fn blake2_compress(rounds: usize, h: &mut [u64; 8], m: &[u64; 16], t: [u64; 2], last_block: bool) {
    let mut v = [0u64; 16];
    let (low, high) = v.split_at_mut(8);
    low.copy_from_slice(h);
    high.copy_from_slice(&BLAKE2B_IV);
    v[12] ^= t[0];
    v[13] ^= t[1];
    if last_block {
        v[14] = !v[14];
    }

    for s in BLAKE2F_SIGMA.iter().cycle().take(rounds) {
        blake2_mix(&mut v, (0, 4, 8, 12), m[s[0]], m[s[1]]);
        blake2_mix(&mut v, (1, 5, 9, 13), m[s[2]], m[s[3]]);
        blake2_mix(&mut v, (2, 6, 10, 14), m[s[4]], m[s[5]]);
        blake2_mix(&mut v, (3, 7, 11, 15), m[s[6]], m[s[7]]);
        blake2_mix(&mut v, (0, 5, 10, 15), m[s[8]], m[s[9]]);
        blake2_mix(&mut v, (1, 6, 11, 12), m[s[10]], m[s[11]]);
        blake2_mix(&mut v, (2, 7, 8, 13), m[s[12]], m[s[13]]);
        blake2_mix(&mut v, (3, 4, 9, 14), m[s[14]], m[s[15]]);
    }

    let (low, high) = v.split_at(8);
    for ((word, a), b) in h.iter_mut().zip(low).zip(high) {
        *word ^= a ^ b;
    }
}

fn le_words<const N: usize>(bytes: &[u8]) -> Result<[u64; N], VMError> {
    let mut words = [0u64; N];
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(8)) {
        *word = u64::from_le_bytes(to_array(chunk)?);
    }
    Ok(words)
}

/// BLAKE2b `F` compression (EIP-152): `rounds ‖ h ‖ m ‖ t ‖ f`, 213 bytes exactly.
pub fn blake2f(calldata: &Bytes, gas_remaining: &mut u64) -> Result<Bytes, VMError> {
    if calldata.len() != BLAKE2F_INPUT_LENGTH {
        return Err(PrecompileError::ParsingInputError.into());
    }
    let (rounds, rest) = calldata.split_at(4);
    let (h, rest) = rest.split_at(64);
    let (m, rest) = rest.split_at(128);
    let (t, flag) = rest.split_at(16);

    let rounds = u32::from_be_bytes(to_array(rounds)?);
    let gas_cost = u64::from(rounds)
        .checked_mul(BLAKE2F_ROUND_COST)
        .ok_or(PrecompileError::NotEnoughGas)?;
    increase_precompile_consumed_gas(gas_cost, gas_remaining)?;

    let last_block = match flag.first() {
        Some(0) => false,
        Some(1) => true,
        _ => return Err(PrecompileError::InvalidFinalBlockFlag.into()),
    };

    let mut h = le_words::<8>(h)?;
    let m = le_words::<16>(m)?;
    let t = le_words::<2>(t)?;
    let rounds = usize::try_from(rounds).map_err(|_| InternalError::TypeConversion)?;
    blake2_compress(rounds, &mut h, &m, t, last_block);

    let output: Vec<u8> = h.iter().flat_map(|word| word.to_le_bytes()).collect();
    Ok(Bytes::from(output))
}

/// Verifies a KZG proof that a blob commitment opens to `y` at `z` (EIP-4844).
///
/// Input: `versioned_hash ‖ z ‖ y ‖ commitment ‖ proof`. On success returns the number of field
/// elements per blob followed by the scalar field modulus.
pub fn point_evaluation(calldata: &Bytes, gas_remaining: &mut u64) -> Result<Bytes, VMError> {
    increase_precompile_consumed_gas(POINT_EVALUATION_COST, gas_remaining)?;

    if calldata.len() != POINT_EVALUATION_INPUT_LENGTH {
        return Err(PrecompileError::ParsingInputError.into());
    }
    let (versioned_hash, rest) = calldata.split_at(32);
    let (z, rest) = rest.split_at(32);
    let (y, rest) = rest.split_at(32);
    let (commitment, proof) = rest.split_at(48);

    let mut expected_hash: [u8; 32] = sha2::Sha256::digest(commitment).into();
    expected_hash[0] = VERSIONED_HASH_VERSION_KZG;
    if versioned_hash != expected_hash.as_slice() {
        return Err(PrecompileError::InvalidVersionedHash.into());
    }

    let settings = c_kzg::ethereum_kzg_settings(0);
    let verified = settings
        .verify_kzg_proof(
            &c_kzg::Bytes48::new(to_array(commitment)?),
            &c_kzg::Bytes32::new(to_array(z)?),
            &c_kzg::Bytes32::new(to_array(y)?),
            &c_kzg::Bytes48::new(to_array(proof)?),
        )
        .map_err(|_| PrecompileError::InvalidKzgProof)?;
    if !verified {
        return Err(PrecompileError::InvalidKzgProof.into());
    }

    let mut output = U256::from(FIELD_ELEMENTS_PER_BLOB).to_big_endian().to_vec();
    output.extend_from_slice(&BLS_MODULUS);
    Ok(Bytes::from(output))
}

/// Strips the 16 zero bytes in front of a 64-byte field element and checks it is below the
/// modulus.
fn bls12_381_field_element(bytes: &[u8]) -> Result<[u8; BLS12_381_FP_LENGTH], VMError> {
    if bytes.len() != BLS12_381_PADDED_FP_LENGTH {
        return Err(PrecompileError::ParsingInputError.into());
    }
    let (padding, value) = bytes.split_at(BLS12_381_FP_PADDING);
    if padding.iter().any(|byte| *byte != 0) || value >= BLS12_381_FIELD_MODULUS.as_slice() {
        return Err(PrecompileError::ParsingInputError.into());
    }
    to_array(value)
}

/// Decodes a G1 point. All zeros is the point at infinity. Additions skip the subgroup check,
/// multiplications and pairings require it.
fn bls12_381_g1_point(bytes: &[u8], subgroup_check: bool) -> Result<G1Affine, VMError> {
    if bytes.len() != BLS12_381_G1_POINT_LENGTH {
        return Err(PrecompileError::ParsingInputError.into());
    }
    let (x, y) = bytes.split_at(BLS12_381_PADDED_FP_LENGTH);
    let x = bls12_381_field_element(x)?;
    let y = bls12_381_field_element(y)?;
    if x.iter().chain(y.iter()).all(|byte| *byte == 0) {
        return Ok(G1Affine::identity());
    }

    let mut uncompressed = [0u8; 96];
    let (x_dest, y_dest) = uncompressed.split_at_mut(BLS12_381_FP_LENGTH);
    x_dest.copy_from_slice(&x);
    y_dest.copy_from_slice(&y);
    let point: Option<G1Affine> = G1Affine::from_uncompressed_unchecked(&uncompressed).into();
    let point = point.ok_or(PrecompileError::ParsingInputError)?;

    if !bool::from(point.is_on_curve()) {
        return Err(PrecompileError::InvalidPoint.into());
    }
    if subgroup_check && !bool::from(point.is_torsion_free()) {
        return Err(PrecompileError::PointNotInSubgroup.into());
    }
    Ok(point)
}

/// Decodes a G2 point encoded as `x.c0 ‖ x.c1 ‖ y.c0 ‖ y.c1`.
fn bls12_381_g2_point(bytes: &[u8], subgroup_check: bool) -> Result<G2Affine, VMError> {
    if bytes.len() != BLS12_381_G2_POINT_LENGTH {
        return Err(PrecompileError::ParsingInputError.into());
    }
    let elements = bytes
        .chunks_exact(BLS12_381_PADDED_FP_LENGTH)
        .map(bls12_381_field_element)
        .collect::<Result<Vec<_>, _>>()?;
    let [x_c0, x_c1, y_c0, y_c1] = elements.as_slice() else {
        return Err(PrecompileError::ParsingInputError.into());
    };
    if elements.iter().flatten().all(|byte| *byte == 0) {
        return Ok(G2Affine::identity());
    }

    // The library serializes the imaginary part first.
    let mut uncompressed = Vec::with_capacity(192);
    for element in [x_c1, x_c0, y_c1, y_c0] {
        uncompressed.extend_from_slice(element);
    }
    let point: Option<G2Affine> =
        G2Affine::from_uncompressed_unchecked(&to_array(&uncompressed)?).into();
    let point = point.ok_or(PrecompileError::ParsingInputError)?;

    if !bool::from(point.is_on_curve()) {
        return Err(PrecompileError::InvalidPoint.into());
    }
    if subgroup_check && !bool::from(point.is_torsion_free()) {
        return Err(PrecompileError::PointNotInSubgroup.into());
    }
    Ok(point)
}

fn pad_field_element(output: &mut Vec<u8>, element: &[u8]) {
    output.extend_from_slice(&[0u8; BLS12_381_FP_PADDING]);
    output.extend_from_slice(element);
}

fn bls12_381_encode_g1(point: G1Affine) -> Bytes {
    if bool::from(point.is_identity()) {
        return Bytes::from(vec![0u8; BLS12_381_G1_POINT_LENGTH]);
    }
    let mut output = Vec::with_capacity(BLS12_381_G1_POINT_LENGTH);
    for element in point.to_uncompressed().chunks_exact(BLS12_381_FP_LENGTH) {
        pad_field_element(&mut output, element);
    }
    Bytes::from(output)
}

fn bls12_381_encode_g2(point: G2Affine) -> Bytes {
    if bool::from(point.is_identity()) {
        return Bytes::from(vec![0u8; BLS12_381_G2_POINT_LENGTH]);
    }
    let uncompressed = point.to_uncompressed();
    let elements: Vec<&[u8]> = uncompressed.chunks_exact(BLS12_381_FP_LENGTH).collect();
    let mut output = Vec::with_capacity(BLS12_381_G2_POINT_LENGTH);
    if let [x_c1, x_c0, y_c1, y_c0] = elements.as_slice() {
        for element in [x_c0, x_c1, y_c0, y_c1] {
            pad_field_element(&mut output, element);
        }
    }
    Bytes::from(output)
}

/// Scalars are 32 big-endian bytes and may exceed the group order.
fn bls12_381_scalar(bytes: &[u8]) -> Result<Scalar, VMError> {
    let bytes: [u8; BLS12_381_SCALAR_LENGTH] = to_array(bytes)?;
    let mut wide = [0u8; 64];
    for (dest, byte) in wide.iter_mut().zip(bytes.iter().rev()) {
        *dest = *byte;
    }
    Ok(Scalar::from_bytes_wide(&wide))
}

/// `k * multiplier * discount(k) / 1000`, with the discount flat past the end of the table.
fn msm_cost(
    pairs: u64,
    multiplier: u64,
    discounts: &[u64; 128],
    max_discount: u64,
) -> Result<u64, VMError> {
    let discount = pairs
        .checked_sub(1)
        .and_then(|index| usize::try_from(index).ok())
        .and_then(|index| discounts.get(index))
        .copied()
        .unwrap_or(max_discount);
    pairs
        .checked_mul(multiplier)
        .and_then(|cost| cost.checked_mul(discount))
        .and_then(|cost| cost.checked_div(BLS12_381_MSM_DISCOUNT_DIVISOR))
        .ok_or(PrecompileError::NotEnoughGas.into())
}

fn non_empty_group_count(calldata: &[u8], pair_length: usize) -> Result<u64, VMError> {
    if calldata.is_empty() {
        return Err(PrecompileError::ParsingInputError.into());
    }
    group_count(calldata, pair_length)
}

#[allow(
    clippy::arithmetic_side_effects,
    reason = "group operations on curve points cannot overflow"
)]
pub fn bls12_g1add(calldata: &Bytes, gas_remaining: &mut u64) -> Result<Bytes, VMError> {
    increase_precompile_consumed_gas(BLS12_381_G1ADD_COST, gas_remaining)?;

    if calldata.len() != BLS12_381_G1ADD_INPUT_LENGTH {
        return Err(PrecompileError::ParsingInputError.into());
    }
    let (first, second) = calldata.split_at(BLS12_381_G1_POINT_LENGTH);
    let first = bls12_381_g1_point(first, false)?;
    let second = bls12_381_g1_point(second, false)?;

    let sum = G1Projective::from(first) + G1Projective::from(second);
    Ok(bls12_381_encode_g1(G1Affine::from(sum)))
}

#[allow(
    clippy::arithmetic_side_effects,
    reason = "group operations on curve points cannot overflow"
)]
pub fn bls12_g1msm(calldata: &Bytes, gas_remaining: &mut u64) -> Result<Bytes, VMError> {
    let pairs = non_empty_group_count(calldata, BLS12_381_G1_MSM_PAIR_LENGTH)?;
    let gas_cost = msm_cost(
        pairs,
        BLS12_381_G1_K_DISCOUNT_MULTIPLIER,
        &BLS12_381_G1_K_DISCOUNT,
        BLS12_381_G1_MAX_DISCOUNT,
    )?;
    increase_precompile_consumed_gas(gas_cost, gas_remaining)?;

    let mut result = G1Projective::identity();
    for pair in calldata.chunks_exact(BLS12_381_G1_MSM_PAIR_LENGTH) {
        let (point, scalar) = pair.split_at(BLS12_381_G1_POINT_LENGTH);
        let point = bls12_381_g1_point(point, true)?;
        let scalar = bls12_381_scalar(scalar)?;
        result += &point * &scalar;
    }
    Ok(bls12_381_encode_g1(G1Affine::from(result)))
}

#[allow(
    clippy::arithmetic_side_effects,
    reason = "group operations on curve points cannot overflow"
)]
pub fn bls12_g2add(calldata: &Bytes, gas_remaining: &mut u64) -> Result<Bytes, VMError> {
    increase_precompile_consumed_gas(BLS12_381_G2ADD_COST, gas_remaining)?;

    if calldata.len() != BLS12_381_G2ADD_INPUT_LENGTH {
        return Err(PrecompileError::ParsingInputError.into());
    }
    let (first, second) = calldata.split_at(BLS12_381_G2_POINT_LENGTH);
    let first = bls12_381_g2_point(first, false)?;
    let second = bls12_381_g2_point(second, false)?;

    let sum = G2Projective::from(first) + G2Projective::from(second);
    Ok(bls12_381_encode_g2(G2Affine::from(sum)))
}

#[allow(
    clippy::arithmetic_side_effects,
    reason = "group operations on curve points cannot overflow"
)]
pub fn bls12_g2msm(calldata: &Bytes, gas_remaining: &mut u64) -> Result<Bytes, VMError> {
    let pairs = non_empty_group_count(calldata, BLS12_381_G2_MSM_PAIR_LENGTH)?;
    let gas_cost = msm_cost(
        pairs,
        BLS12_381_G2_K_DISCOUNT_MULTIPLIER,
        &BLS12_381_G2_K_DISCOUNT,
        BLS12_381_G2_MAX_DISCOUNT,
    )?;
    increase_precompile_consumed_gas(gas_cost, gas_remaining)?;

    let mut result = G2Projective::identity();
    for pair in calldata.chunks_exact(BLS12_381_G2_MSM_PAIR_LENGTH) {
        let (point, scalar) = pair.split_at(BLS12_381_G2_POINT_LENGTH);
        let point = bls12_381_g2_point(point, true)?;
        let scalar = bls12_381_scalar(scalar)?;
        result += &point * &scalar;
    }
    Ok(bls12_381_encode_g2(G2Affine::from(result)))
}

pub fn bls12_pairing_check(calldata: &Bytes, gas_remaining: &mut u64) -> Result<Bytes, VMError> {
    let pairs = non_empty_group_count(calldata, BLS12_381_PAIRING_PAIR_LENGTH)?;
    let gas_cost = pairing_cost(
        pairs,
        BLS12_381_PAIRING_BASE_COST,
        BLS12_381_PAIRING_GROUP_COST,
    )?;
    increase_precompile_consumed_gas(gas_cost, gas_remaining)?;

    let mut terms = Vec::new();
    for pair in calldata.chunks_exact(BLS12_381_PAIRING_PAIR_LENGTH) {
        let (g1, g2) = pair.split_at(BLS12_381_G1_POINT_LENGTH);
        let g1 = bls12_381_g1_point(g1, true)?;
        let g2 = G2Prepared::from(bls12_381_g2_point(g2, true)?);
        terms.push((g1, g2));
    }
    let term_refs: Vec<(&G1Affine, &G2Prepared)> = terms.iter().map(|(g1, g2)| (g1, g2)).collect();

    let holds = multi_miller_loop(&term_refs).final_exponentiation() == Gt::identity();
    Ok(boolean_word(holds))
}

/// Maps a base field element to G1 with the simplified SWU map and clears the cofactor.
pub fn bls12_map_fp_to_g1(calldata: &Bytes, gas_remaining: &mut u64) -> Result<Bytes, VMError> {
    increase_precompile_consumed_gas(BLS12_381_MAP_FP_TO_G1_COST, gas_remaining)?;

    bls12_381_field_element(calldata)?;
    // The padded element is its own 64-byte big-endian integer, below the modulus.
    let padded: [u8; BLS12_381_PADDED_FP_LENGTH] = to_array(calldata)?;
    let element = <<G1Projective as MapToCurve>::Field as HashToField>::from_okm((&padded).into());

    let point = G1Projective::map_to_curve(&element).clear_h();
    Ok(bls12_381_encode_g1(G1Affine::from(point)))
}

/// Maps an `Fp2` element (`c0 ‖ c1`) to G2.
pub fn bls12_map_fp2_to_g2(calldata: &Bytes, gas_remaining: &mut u64) -> Result<Bytes, VMError> {
    increase_precompile_consumed_gas(BLS12_381_MAP_FP2_TO_G2_COST, gas_remaining)?;

    if calldata.len() != BLS12_381_PADDED_FP2_LENGTH {
        return Err(PrecompileError::ParsingInputError.into());
    }
    for element in calldata.chunks_exact(BLS12_381_PADDED_FP_LENGTH) {
        bls12_381_field_element(element)?;
    }
    let padded: [u8; BLS12_381_PADDED_FP2_LENGTH] = to_array(calldata)?;
    let element = <<G2Projective as MapToCurve>::Field as HashToField>::from_okm((&padded).into());

    let point = G2Projective::map_to_curve(&element).clear_h();
    Ok(bls12_381_encode_g2(G2Affine::from(point)))
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{Fork, VMType};
    use hex_literal::hex;

    fn bn254_g1_bytes(point: BnG1Affine) -> Vec<u8> {
        let (x, y) = point.xy().unwrap();
        let mut bytes = x.into_bigint().to_bytes_be();
        bytes.extend(y.into_bigint().to_bytes_be());
        bytes
    }

    fn bn254_g2_bytes(point: BnG2Affine) -> Vec<u8> {
        let (x, y) = point.xy().unwrap();
        [x.c1, x.c0, y.c1, y.c0]
            .iter()
            .flat_map(|element| element.into_bigint().to_bytes_be())
            .collect()
    }

    fn scalar_word(value: u64) -> [u8; 32] {
        U256::from(value).to_big_endian()
    }

    fn halt(error: PrecompileError) -> Result<Bytes, VMError> {
        Err(VMError::ExceptionalHalt(ExceptionalHalt::Precompile(error)))
    }

    #[test]
    fn precompile_range_follows_ruleset() {
        let cancun = ChainRuleset::for_fork(Fork::Cancun, VMType::L1);
        let prague = ChainRuleset::for_fork(Fork::Prague, VMType::L1);
        let bls_address = Address::from_low_u64_be(0x0b);
        assert!(!is_precompile(&bls_address, &cancun));
        assert!(is_precompile(&bls_address, &prague));
        assert!(!is_precompile(&Address::zero(), &prague));
        assert!(!is_precompile(&Address::repeat_byte(1), &prague));
    }

    #[test]
    fn identity_charges_per_word() {
        let mut gas = 100;
        let output = identity(&Bytes::from_static(&[1; 33]), &mut gas).unwrap();
        assert_eq!(output.len(), 33);
        assert_eq!(gas, 100 - 15 - 2 * 3);
    }

    #[test]
    fn sha256_of_empty_input() {
        let mut gas = 1000;
        let output = sha2_256(&Bytes::new(), &mut gas).unwrap();
        assert_eq!(
            output.as_ref(),
            hex!("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
        );
        assert_eq!(gas, 1000 - 60);
    }

    #[test]
    fn ripemd_is_left_padded() {
        let mut gas = 1000;
        let output = ripemd_160(&Bytes::new(), &mut gas).unwrap();
        assert_eq!(
            output.as_ref(),
            hex!("0000000000000000000000009c1185a5c5e9fc54612808977ee8f548b2258d31")
        );
    }

    #[test]
    fn ecrecover_recovers_known_signer() {
        let calldata = Bytes::from_static(&hex!(
            "456e9aea5e197a1f1af7a3e85a3212fa4049a3ba34c2289b4c860fc0b0c64ef3"
            "000000000000000000000000000000000000000000000000000000000000001c"
            "9242685bf161793cc25603c231bc2f568eb630ea16aa137d2664ac8038825608"
            "4f8ae3bd7535248d0bd448298cc2e2071e56992d0774dc340c368ae950852ada"
        ));
        let mut gas = 5000;
        let output = ecrecover(&calldata, &mut gas).unwrap();
        assert_eq!(
            output.as_ref(),
            hex!("0000000000000000000000007156526fbd7a3c72969b54f64e42c10fbb768c8a")
        );
        assert_eq!(gas, 2000);
    }

    #[test]
    fn ecrecover_with_bad_v_returns_nothing() {
        let mut calldata = [0u8; 128];
        calldata[63] = 29;
        let mut gas = 3000;
        let output = ecrecover(&Bytes::copy_from_slice(&calldata), &mut gas).unwrap();
        assert!(output.is_empty());
        assert_eq!(gas, 0);
    }

    #[test]
    fn modexp_small_values() {
        // 3 ** 5 mod 7 = 5
        let mut calldata = Vec::new();
        calldata.extend_from_slice(&U256::one().to_big_endian());
        calldata.extend_from_slice(&U256::one().to_big_endian());
        calldata.extend_from_slice(&U256::one().to_big_endian());
        calldata.extend_from_slice(&[3, 5, 7]);
        let mut gas = 1000;
        let output = modexp(&Bytes::from(calldata), &mut gas).unwrap();
        assert_eq!(output.as_ref(), &[5]);
        assert_eq!(gas, 800);
    }

    #[test]
    fn modexp_with_zero_modulus_is_zero_padded() {
        let mut calldata = Vec::new();
        calldata.extend_from_slice(&U256::one().to_big_endian());
        calldata.extend_from_slice(&U256::one().to_big_endian());
        calldata.extend_from_slice(&U256::from(2).to_big_endian());
        calldata.extend_from_slice(&[3, 5, 0, 0]);
        let mut gas = 1000;
        let output = modexp(&Bytes::from(calldata), &mut gas).unwrap();
        assert_eq!(output.as_ref(), &[0, 0]);
    }

    #[test]
    fn not_enough_gas_is_reported() {
        let mut gas = 10;
        assert_eq!(
            identity(&Bytes::new(), &mut gas),
            Err(VMError::ExceptionalHalt(ExceptionalHalt::Precompile(
                PrecompileError::NotEnoughGas
            )))
        );
    }

    #[test]
    fn every_address_up_to_prague_is_implemented() {
        let ruleset = ChainRuleset::for_fork(Fork::Prague, VMType::L1);
        for index in 1..=ruleset.last_precompile {
            let mut gas = 1_000_000;
            let result = execute_precompile(
                Address::from_low_u64_be(index),
                &Bytes::new(),
                &mut gas,
                &ruleset,
            );
            assert!(
                !matches!(
                    result,
                    Err(VMError::ExceptionalHalt(ExceptionalHalt::Precompile(
                        PrecompileError::NotSupported(_)
                    )))
                ),
                "precompile {index:#x} has no implementation"
            );
        }
    }

    #[test]
    fn ecadd_of_two_infinities_is_infinity() {
        let mut gas = 1000;
        let output = ecadd(&Bytes::from(vec![0u8; 128]), &mut gas).unwrap();
        assert_eq!(output.as_ref(), &[0u8; 64]);
        assert_eq!(gas, 1000 - 150);
    }

    #[test]
    fn ecadd_doubles_the_generator() {
        let generator = bn254_g1_bytes(BnG1Affine::generator());
        let calldata = [generator.clone(), generator].concat();
        let mut gas = 1000;
        let output = ecadd(&Bytes::from(calldata), &mut gas).unwrap();
        assert_eq!(
            output.as_ref(),
            hex!(
                "030644e72e131a029b85045b68181585d97816a916871ca8d3c208c16d87cfd3"
                "15ed738c0e0a7c92e7845f96b2ae9c0a68a6a449e3538fc7ff3ebf7a5a18a2c4"
            )
        );
    }

    #[test]
    fn ecadd_rejects_points_off_the_curve() {
        let mut calldata = vec![0u8; 128];
        calldata[31] = 1;
        calldata[63] = 1;
        let mut gas = 1000;
        assert_eq!(
            ecadd(&Bytes::from(calldata), &mut gas),
            halt(PrecompileError::InvalidPoint)
        );
    }

    #[test]
    fn ecmul_matches_ecadd() {
        let mut calldata = bn254_g1_bytes(BnG1Affine::generator());
        calldata.extend_from_slice(&scalar_word(2));
        let mut gas = 10_000;
        let output = ecmul(&Bytes::from(calldata), &mut gas).unwrap();
        assert_eq!(
            output.as_ref(),
            hex!(
                "030644e72e131a029b85045b68181585d97816a916871ca8d3c208c16d87cfd3"
                "15ed738c0e0a7c92e7845f96b2ae9c0a68a6a449e3538fc7ff3ebf7a5a18a2c4"
            )
        );
        assert_eq!(gas, 10_000 - 6000);
    }

    #[test]
    fn ecpairing_of_nothing_holds() {
        let mut gas = 50_000;
        let output = ecpairing(&Bytes::new(), &mut gas).unwrap();
        assert_eq!(output.as_ref(), boolean_word(true).as_ref());
        assert_eq!(gas, 5000);
    }

    #[test]
    fn ecpairing_of_a_point_and_its_negation_holds() {
        let g1 = BnG1Affine::generator();
        let g2 = bn254_g2_bytes(BnG2Affine::generator());
        let calldata = [
            bn254_g1_bytes(g1),
            g2.clone(),
            bn254_g1_bytes(-g1),
            g2,
        ]
        .concat();
        let mut gas = 200_000;
        let output = ecpairing(&Bytes::from(calldata), &mut gas).unwrap();
        assert_eq!(output.as_ref(), boolean_word(true).as_ref());
        assert_eq!(gas, 200_000 - 45_000 - 2 * 34_000);
    }

    #[test]
    fn ecpairing_of_a_single_pair_fails() {
        let calldata = [
            bn254_g1_bytes(BnG1Affine::generator()),
            bn254_g2_bytes(BnG2Affine::generator()),
        ]
        .concat();
        let mut gas = 200_000;
        let output = ecpairing(&Bytes::from(calldata), &mut gas).unwrap();
        assert_eq!(output.as_ref(), boolean_word(false).as_ref());
    }

    #[test]
    fn ecpairing_rejects_ragged_input() {
        let mut gas = 200_000;
        assert_eq!(
            ecpairing(&Bytes::from(vec![0u8; 100]), &mut gas),
            halt(PrecompileError::ParsingInputError)
        );
    }

    const BLAKE2F_ABC: [u8; 213] = hex!(
        "0000000c48c9bdf267e6096a3ba7ca8485ae67bb2bf894fe72f36e3cf1361d5f3af54fa5d182e6ad7f520e511f"
        "6c3e2b8c68059b6bbd41fbabd9831f79217e1319cde05b61626300000000000000000000000000000000000000"
        "000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000"
        "000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000"
        "000000000000000000000000000000000300000000000000000000000000000001"
    );

    #[test]
    fn blake2f_compresses_abc() {
        let mut gas = 100;
        let output = blake2f(&Bytes::from_static(&BLAKE2F_ABC), &mut gas).unwrap();
        assert_eq!(
            output.as_ref(),
            hex!(
                "ba80a53f981c4d0d6a2797b69f12f6e94c212f14685ac4b74b12bb6fdbffa2d1"
                "7d87c5392aab792dc252d5de4533cc9518d38aa8dbf1925ab92386edd4009923"
            )
        );
        assert_eq!(gas, 100 - 12);
    }

    #[test]
    fn blake2f_rejects_bad_input() {
        let mut gas = 100;
        assert_eq!(
            blake2f(&Bytes::copy_from_slice(&BLAKE2F_ABC[..212]), &mut gas),
            halt(PrecompileError::ParsingInputError)
        );

        let mut bad_flag = BLAKE2F_ABC;
        bad_flag[212] = 2;
        assert_eq!(
            blake2f(&Bytes::copy_from_slice(&bad_flag), &mut gas),
            halt(PrecompileError::InvalidFinalBlockFlag)
        );
    }

    fn point_evaluation_input(versioned_hash: [u8; 32]) -> Bytes {
        // Commitment and proof are both the compressed point at infinity, which opens to 0 at 0.
        let mut infinity = [0u8; 48];
        infinity[0] = 0xc0;
        let mut input = versioned_hash.to_vec();
        input.extend_from_slice(&[0u8; 64]);
        input.extend_from_slice(&infinity);
        input.extend_from_slice(&infinity);
        Bytes::from(input)
    }

    #[test]
    fn point_evaluation_accepts_a_valid_opening() {
        let versioned_hash =
            hex!("010657f37554c781402a22917dee2f75def7ab966d7b770905398eba3c444014");
        let mut gas = 60_000;
        let output = point_evaluation(&point_evaluation_input(versioned_hash), &mut gas).unwrap();
        assert_eq!(
            output.as_ref(),
            hex!(
                "0000000000000000000000000000000000000000000000000000000000001000"
                "73eda753299d7d483339d80809a1d80553bda402fffe5bfeffffffff00000001"
            )
        );
        assert_eq!(gas, 10_000);
    }

    #[test]
    fn point_evaluation_checks_the_versioned_hash() {
        let mut gas = 60_000;
        assert_eq!(
            point_evaluation(&point_evaluation_input([1u8; 32]), &mut gas),
            halt(PrecompileError::InvalidVersionedHash)
        );
    }

    fn bls_g1_input(points: &[G1Affine]) -> Vec<u8> {
        points
            .iter()
            .flat_map(|point| bls12_381_encode_g1(*point).to_vec())
            .collect()
    }

    fn bls_g2_input(points: &[G2Affine]) -> Vec<u8> {
        points
            .iter()
            .flat_map(|point| bls12_381_encode_g2(*point).to_vec())
            .collect()
    }

    #[test]
    fn bls12_g1add_doubles_the_generator() {
        let generator = G1Affine::generator();
        let doubled = G1Affine::from(G1Projective::generator().double());
        let mut gas = 1000;
        let output =
            bls12_g1add(&Bytes::from(bls_g1_input(&[generator, generator])), &mut gas).unwrap();
        assert_eq!(output, bls12_381_encode_g1(doubled));
        assert_eq!(gas, 1000 - 375);
    }

    #[test]
    fn bls12_g1add_with_infinity_is_the_other_point() {
        let generator = G1Affine::generator();
        let calldata = bls_g1_input(&[G1Affine::identity(), generator]);
        assert!(calldata[..128].iter().all(|byte| *byte == 0));
        let mut gas = 1000;
        let output = bls12_g1add(&Bytes::from(calldata), &mut gas).unwrap();
        assert_eq!(output, bls12_381_encode_g1(generator));
    }

    #[test]
    fn bls12_field_elements_must_be_padded_and_reduced() {
        let mut calldata = bls_g1_input(&[G1Affine::generator(), G1Affine::generator()]);
        calldata[0] = 1;
        let mut gas = 1000;
        assert_eq!(
            bls12_g1add(&Bytes::from(calldata), &mut gas),
            halt(PrecompileError::ParsingInputError)
        );

        let mut modulus = vec![0u8; 16];
        modulus.extend_from_slice(&BLS12_381_FIELD_MODULUS);
        let mut gas = 10_000;
        assert_eq!(
            bls12_map_fp_to_g1(&Bytes::from(modulus), &mut gas),
            halt(PrecompileError::ParsingInputError)
        );
    }

    #[test]
    fn bls12_g1msm_multiplies_and_applies_the_discount() {
        let mut calldata = bls_g1_input(&[G1Affine::generator()]);
        calldata.extend_from_slice(&scalar_word(2));
        let mut gas = 20_000;
        let output = bls12_g1msm(&Bytes::from(calldata.clone()), &mut gas).unwrap();
        let doubled = G1Affine::from(G1Projective::generator().double());
        assert_eq!(output, bls12_381_encode_g1(doubled));
        assert_eq!(gas, 20_000 - 12_000);

        // Two pairs: 2 * 12000 * 949 / 1000.
        calldata.extend_from_slice(&calldata.clone());
        let mut gas = 30_000;
        bls12_g1msm(&Bytes::from(calldata), &mut gas).unwrap();
        assert_eq!(gas, 30_000 - 22_776);
    }

    #[test]
    fn bls12_msm_rejects_empty_input() {
        let mut gas = 100_000;
        assert_eq!(
            bls12_g1msm(&Bytes::new(), &mut gas),
            halt(PrecompileError::ParsingInputError)
        );
        assert_eq!(
            bls12_g2msm(&Bytes::new(), &mut gas),
            halt(PrecompileError::ParsingInputError)
        );
    }

    #[test]
    fn msm_discount_is_flat_past_the_table() {
        assert_eq!(
            msm_cost(
                200,
                BLS12_381_G1_K_DISCOUNT_MULTIPLIER,
                &BLS12_381_G1_K_DISCOUNT,
                BLS12_381_G1_MAX_DISCOUNT
            )
            .unwrap(),
            200 * 12000 * 519 / 1000
        );
    }

    #[test]
    fn bls12_g2add_and_g2msm_agree() {
        let generator = G2Affine::generator();
        let doubled = G2Affine::from(G2Projective::generator().double());

        let mut gas = 1000;
        let sum =
            bls12_g2add(&Bytes::from(bls_g2_input(&[generator, generator])), &mut gas).unwrap();
        assert_eq!(sum, bls12_381_encode_g2(doubled));
        assert_eq!(gas, 1000 - 600);

        let mut calldata = bls_g2_input(&[generator]);
        calldata.extend_from_slice(&scalar_word(2));
        let mut gas = 30_000;
        let product = bls12_g2msm(&Bytes::from(calldata), &mut gas).unwrap();
        assert_eq!(product, sum);
        assert_eq!(gas, 30_000 - 22_500);
    }

    #[test]
    fn bls12_pairing_of_a_point_and_its_negation_holds() {
        let g1 = G1Affine::generator();
        let g2 = bls_g2_input(&[G2Affine::generator()]);
        let calldata = [
            bls_g1_input(&[g1]),
            g2.clone(),
            bls_g1_input(&[-g1]),
            g2,
        ]
        .concat();
        let mut gas = 200_000;
        let output = bls12_pairing_check(&Bytes::from(calldata), &mut gas).unwrap();
        assert_eq!(output.as_ref(), boolean_word(true).as_ref());
        assert_eq!(gas, 200_000 - 37_700 - 2 * 32_600);

        let single = [bls_g1_input(&[g1]), bls_g2_input(&[G2Affine::generator()])].concat();
        let mut gas = 200_000;
        let output = bls12_pairing_check(&Bytes::from(single), &mut gas).unwrap();
        assert_eq!(output.as_ref(), boolean_word(false).as_ref());
    }

    #[test]
    fn bls12_maps_land_in_the_subgroup() {
        let mut element = vec![0u8; 64];
        element[63] = 7;

        let mut gas = 10_000;
        let g1 = bls12_map_fp_to_g1(&Bytes::from(element.clone()), &mut gas).unwrap();
        assert_eq!(gas, 10_000 - 5500);
        let g1 = bls12_381_g1_point(&g1, true).unwrap();
        assert!(!bool::from(g1.is_identity()));

        let mut gas = 30_000;
        let fp2 = [element.clone(), element].concat();
        let g2 = bls12_map_fp2_to_g2(&Bytes::from(fp2), &mut gas).unwrap();
        assert_eq!(gas, 30_000 - 23_800);
        let g2 = bls12_381_g2_point(&g2, true).unwrap();
        assert!(!bool::from(g2.is_identity()));
    }
}
