use crate::{
    environment::Fork,
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    vm::VM,
};
use strum::{EnumString, FromRepr};

#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, EnumString, FromRepr, Hash)]
#[repr(u8)]
pub enum Opcode {
    // Stop and Arithmetic Operations
    STOP = 0x00,
    ADD = 0x01,
    MUL = 0x02,
    SUB = 0x03,
    DIV = 0x04,
    SDIV = 0x05,
    MOD = 0x06,
    SMOD = 0x07,
    ADDMOD = 0x08,
    MULMOD = 0x09,
    EXP = 0x0A,
    SIGNEXTEND = 0x0B,

    // Comparison & Bitwise Logic Operations
    LT = 0x10,
    GT = 0x11,
    SLT = 0x12,
    SGT = 0x13,
    EQ = 0x14,
    ISZERO = 0x15,
    AND = 0x16,
    OR = 0x17,
    XOR = 0x18,
    NOT = 0x19,
    BYTE = 0x1A,
    SHL = 0x1B,
    SHR = 0x1C,
    SAR = 0x1D,

    KECCAK256 = 0x20,

    // Environmental Information
    ADDRESS = 0x30,
    BALANCE = 0x31,
    ORIGIN = 0x32,
    CALLER = 0x33,
    CALLVALUE = 0x34,
    CALLDATALOAD = 0x35,
    CALLDATASIZE = 0x36,
    CALLDATACOPY = 0x37,
    CODESIZE = 0x38,
    CODECOPY = 0x39,
    GASPRICE = 0x3A,
    EXTCODESIZE = 0x3B,
    EXTCODECOPY = 0x3C,
    RETURNDATASIZE = 0x3D,
    RETURNDATACOPY = 0x3E,
    EXTCODEHASH = 0x3F,

    // Block Information
    BLOCKHASH = 0x40,
    COINBASE = 0x41,
    TIMESTAMP = 0x42,
    NUMBER = 0x43,
    PREVRANDAO = 0x44,
    GASLIMIT = 0x45,
    CHAINID = 0x46,
    SELFBALANCE = 0x47,
    BASEFEE = 0x48,
    BLOBHASH = 0x49,
    BLOBBASEFEE = 0x4A,

    // Stack, Memory, Storage, and Flow Operations
    POP = 0x50,
    MLOAD = 0x51,
    MSTORE = 0x52,
    MSTORE8 = 0x53,
    SLOAD = 0x54,
    SSTORE = 0x55,
    JUMP = 0x56,
    JUMPI = 0x57,
    PC = 0x58,
    MSIZE = 0x59,
    GAS = 0x5A,
    JUMPDEST = 0x5B,
    TLOAD = 0x5C,
    TSTORE = 0x5D,
    MCOPY = 0x5E,

    // Push Operations
    PUSH0 = 0x5F,
    PUSH1 = 0x60,
    PUSH2 = 0x61,
    PUSH3 = 0x62,
    PUSH4 = 0x63,
    PUSH5 = 0x64,
    PUSH6 = 0x65,
    PUSH7 = 0x66,
    PUSH8 = 0x67,
    PUSH9 = 0x68,
    PUSH10 = 0x69,
    PUSH11 = 0x6A,
    PUSH12 = 0x6B,
    PUSH13 = 0x6C,
    PUSH14 = 0x6D,
    PUSH15 = 0x6E,
    PUSH16 = 0x6F,
    PUSH17 = 0x70,
    PUSH18 = 0x71,
    PUSH19 = 0x72,
    PUSH20 = 0x73,
    PUSH21 = 0x74,
    PUSH22 = 0x75,
    PUSH23 = 0x76,
    PUSH24 = 0x77,
    PUSH25 = 0x78,
    PUSH26 = 0x79,
    PUSH27 = 0x7A,
    PUSH28 = 0x7B,
    PUSH29 = 0x7C,
    PUSH30 = 0x7D,
    PUSH31 = 0x7E,
    PUSH32 = 0x7F,

    // Duplication Operations
    DUP1 = 0x80,
    DUP2 = 0x81,
    DUP3 = 0x82,
    DUP4 = 0x83,
    DUP5 = 0x84,
    DUP6 = 0x85,
    DUP7 = 0x86,
    DUP8 = 0x87,
    DUP9 = 0x88,
    DUP10 = 0x89,
    DUP11 = 0x8A,
    DUP12 = 0x8B,
    DUP13 = 0x8C,
    DUP14 = 0x8D,
    DUP15 = 0x8E,
    DUP16 = 0x8F,

    // Swap Operations
    SWAP1 = 0x90,
    SWAP2 = 0x91,
    SWAP3 = 0x92,
    SWAP4 = 0x93,
    SWAP5 = 0x94,
    SWAP6 = 0x95,
    SWAP7 = 0x96,
    SWAP8 = 0x97,
    SWAP9 = 0x98,
    SWAP10 = 0x99,
    SWAP11 = 0x9A,
    SWAP12 = 0x9B,
    SWAP13 = 0x9C,
    SWAP14 = 0x9D,
    SWAP15 = 0x9E,
    SWAP16 = 0x9F,

    // Logging Operations
    LOG0 = 0xA0,
    LOG1 = 0xA1,
    LOG2 = 0xA2,
    LOG3 = 0xA3,
    LOG4 = 0xA4,

    // System Operations
    CREATE = 0xF0,
    CALL = 0xF1,
    CALLCODE = 0xF2,
    RETURN = 0xF3,
    DELEGATECALL = 0xF4,
    CREATE2 = 0xF5,
    STATICCALL = 0xFA,
    REVERT = 0xFD,
    INVALID = 0xFE,
    SELFDESTRUCT = 0xFF,
}

impl From<u8> for Opcode {
    fn from(byte: u8) -> Self {
        Opcode::from_repr(byte).unwrap_or(Opcode::INVALID)
    }
}

impl From<Opcode> for u8 {
    #[expect(clippy::as_conversions)]
    fn from(opcode: Opcode) -> Self {
        opcode as u8
    }
}

/// Represents an opcode function handler.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OpCodeFn<'a>(fn(&'_ mut VM<'a>) -> Result<OpcodeResult, VMError>);

impl<'a> OpCodeFn<'a> {
    #[inline(always)]
    pub fn call(self, vm: &mut VM<'a>) -> Result<OpcodeResult, VMError> {
        (self.0)(vm)
    }
}

/// Registers handlers in a const opcode table.
macro_rules! register {
    ($table:ident, $($opcode:ident => $handler:expr),+ $(,)?) => {
        $( $table[Opcode::$opcode as usize] = OpCodeFn($handler); )+
    };
}

impl<'a> VM<'a> {
    /// Builds the dispatch table for the given fork. Unassigned entries halt with an invalid
    /// opcode error.
    pub(crate) fn build_opcode_table(fork: Fork) -> [OpCodeFn<'a>; 256] {
        match fork {
            Fork::Cancun | Fork::Prague => Self::build_opcode_table_cancun(),
        }
    }

    #[allow(clippy::as_conversions, clippy::indexing_slicing)]
    const fn build_opcode_table_cancun() -> [OpCodeFn<'a>; 256] {
        let mut t: [OpCodeFn<'a>; 256] = [OpCodeFn(VM::on_invalid_opcode); 256];

        register!(t,
            STOP => VM::op_stop,
            ADD => VM::op_add,
            MUL => VM::op_mul,
            SUB => VM::op_sub,
            DIV => VM::op_div,
            SDIV => VM::op_sdiv,
            MOD => VM::op_mod,
            SMOD => VM::op_smod,
            ADDMOD => VM::op_addmod,
            MULMOD => VM::op_mulmod,
            EXP => VM::op_exp,
            SIGNEXTEND => VM::op_signextend,

            LT => VM::op_lt,
            GT => VM::op_gt,
            SLT => VM::op_slt,
            SGT => VM::op_sgt,
            EQ => VM::op_eq,
            ISZERO => VM::op_iszero,
            AND => VM::op_and,
            OR => VM::op_or,
            XOR => VM::op_xor,
            NOT => VM::op_not,
            BYTE => VM::op_byte,
            SHL => VM::op_shl,
            SHR => VM::op_shr,
            SAR => VM::op_sar,

            KECCAK256 => VM::op_keccak256,

            ADDRESS => VM::op_address,
            BALANCE => VM::op_balance,
            ORIGIN => VM::op_origin,
            CALLER => VM::op_caller,
            CALLVALUE => VM::op_callvalue,
            CALLDATALOAD => VM::op_calldataload,
            CALLDATASIZE => VM::op_calldatasize,
            CALLDATACOPY => VM::op_calldatacopy,
            CODESIZE => VM::op_codesize,
            CODECOPY => VM::op_codecopy,
            GASPRICE => VM::op_gasprice,
            EXTCODESIZE => VM::op_extcodesize,
            EXTCODECOPY => VM::op_extcodecopy,
            RETURNDATASIZE => VM::op_returndatasize,
            RETURNDATACOPY => VM::op_returndatacopy,
            EXTCODEHASH => VM::op_extcodehash,

            BLOCKHASH => VM::op_blockhash,
            COINBASE => VM::op_coinbase,
            TIMESTAMP => VM::op_timestamp,
            NUMBER => VM::op_number,
            PREVRANDAO => VM::op_prevrandao,
            GASLIMIT => VM::op_gaslimit,
            CHAINID => VM::op_chainid,
            SELFBALANCE => VM::op_selfbalance,
            BASEFEE => VM::op_basefee,
            BLOBHASH => VM::op_blobhash,
            BLOBBASEFEE => VM::op_blobbasefee,

            POP => VM::op_pop,
            MLOAD => VM::op_mload,
            MSTORE => VM::op_mstore,
            MSTORE8 => VM::op_mstore8,
            SLOAD => VM::op_sload,
            SSTORE => VM::op_sstore,
            JUMP => VM::op_jump,
            JUMPI => VM::op_jumpi,
            PC => VM::op_pc,
            MSIZE => VM::op_msize,
            GAS => VM::op_gas,
            JUMPDEST => VM::op_jumpdest,
            TLOAD => VM::op_tload,
            TSTORE => VM::op_tstore,
            MCOPY => VM::op_mcopy,

            PUSH0 => VM::op_push0,
            PUSH1 => VM::op_push::<1>,
            PUSH2 => VM::op_push::<2>,
            PUSH3 => VM::op_push::<3>,
            PUSH4 => VM::op_push::<4>,
            PUSH5 => VM::op_push::<5>,
            PUSH6 => VM::op_push::<6>,
            PUSH7 => VM::op_push::<7>,
            PUSH8 => VM::op_push::<8>,
            PUSH9 => VM::op_push::<9>,
            PUSH10 => VM::op_push::<10>,
            PUSH11 => VM::op_push::<11>,
            PUSH12 => VM::op_push::<12>,
            PUSH13 => VM::op_push::<13>,
            PUSH14 => VM::op_push::<14>,
            PUSH15 => VM::op_push::<15>,
            PUSH16 => VM::op_push::<16>,
            PUSH17 => VM::op_push::<17>,
            PUSH18 => VM::op_push::<18>,
            PUSH19 => VM::op_push::<19>,
            PUSH20 => VM::op_push::<20>,
            PUSH21 => VM::op_push::<21>,
            PUSH22 => VM::op_push::<22>,
            PUSH23 => VM::op_push::<23>,
            PUSH24 => VM::op_push::<24>,
            PUSH25 => VM::op_push::<25>,
            PUSH26 => VM::op_push::<26>,
            PUSH27 => VM::op_push::<27>,
            PUSH28 => VM::op_push::<28>,
            PUSH29 => VM::op_push::<29>,
            PUSH30 => VM::op_push::<30>,
            PUSH31 => VM::op_push::<31>,
            PUSH32 => VM::op_push::<32>,

            DUP1 => VM::op_dup::<0>,
            DUP2 => VM::op_dup::<1>,
            DUP3 => VM::op_dup::<2>,
            DUP4 => VM::op_dup::<3>,
            DUP5 => VM::op_dup::<4>,
            DUP6 => VM::op_dup::<5>,
            DUP7 => VM::op_dup::<6>,
            DUP8 => VM::op_dup::<7>,
            DUP9 => VM::op_dup::<8>,
            DUP10 => VM::op_dup::<9>,
            DUP11 => VM::op_dup::<10>,
            DUP12 => VM::op_dup::<11>,
            DUP13 => VM::op_dup::<12>,
            DUP14 => VM::op_dup::<13>,
            DUP15 => VM::op_dup::<14>,
            DUP16 => VM::op_dup::<15>,

            SWAP1 => VM::op_swap::<1>,
            SWAP2 => VM::op_swap::<2>,
            SWAP3 => VM::op_swap::<3>,
            SWAP4 => VM::op_swap::<4>,
            SWAP5 => VM::op_swap::<5>,
            SWAP6 => VM::op_swap::<6>,
            SWAP7 => VM::op_swap::<7>,
            SWAP8 => VM::op_swap::<8>,
            SWAP9 => VM::op_swap::<9>,
            SWAP10 => VM::op_swap::<10>,
            SWAP11 => VM::op_swap::<11>,
            SWAP12 => VM::op_swap::<12>,
            SWAP13 => VM::op_swap::<13>,
            SWAP14 => VM::op_swap::<14>,
            SWAP15 => VM::op_swap::<15>,
            SWAP16 => VM::op_swap::<16>,

            LOG0 => VM::op_log::<0>,
            LOG1 => VM::op_log::<1>,
            LOG2 => VM::op_log::<2>,
            LOG3 => VM::op_log::<3>,
            LOG4 => VM::op_log::<4>,

            CREATE => VM::op_create,
            CALL => VM::op_call,
            CALLCODE => VM::op_callcode,
            RETURN => VM::op_return,
            DELEGATECALL => VM::op_delegatecall,
            CREATE2 => VM::op_create2,
            STATICCALL => VM::op_staticcall,
            REVERT => VM::op_revert,
            INVALID => VM::op_invalid,
            SELFDESTRUCT => VM::op_selfdestruct,
        );

        t
    }

    /// Used within the opcode table for invalid opcodes.
    pub fn on_invalid_opcode(&mut self) -> Result<OpcodeResult, VMError> {
        Err(ExceptionalHalt::InvalidOpcode.into())
    }

    #[inline]
    pub fn op_stop(&mut self) -> Result<OpcodeResult, VMError> {
        Ok(OpcodeResult::Halt)
    }
}
