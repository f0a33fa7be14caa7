//! Per-mnemonic encoding schemas and the first-match schema matcher.
//!
//! Each mnemonic owns an ordered list of [`Schema`]s. The matcher walks
//! that list front to back and returns the first schema whose argument
//! patterns accept the instruction, so **order is priority**. Every table
//! below follows the same layout:
//!
//! 1. fixed-register forms (accumulator short forms, no ModR/M),
//! 2. sign-extended 8-bit immediate forms,
//! 3. general forms.
//!
//! A more specific encoding placed after a general one that also accepts
//! its operands is unreachable. `table_order_invariant` in the tests below
//! checks the layout for every table.

use crate::error::EncodeError;
use crate::ir::{Argument, Mnemonic, OperandSize, RegisterClass};

use OperandSize::{Byte, Dword, Qword, Word, Xmmword, Ymmword};

// ─── Patterns ───────────────────────────────────────────────────────────

/// Argument kind accepted by one schema slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// Register only.
    Register,
    /// Memory only.
    Memory,
    /// Register or memory (`r/m`).
    MemoryOrRegister,
    /// Immediate only.
    Immediate,
    /// Anything.
    Any,
}

/// Size accepted by one schema slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeSpec {
    /// Exactly this width.
    Exact(OperandSize),
    /// Any width.
    Any,
}

/// Register file a register slot draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegFamily {
    /// General-purpose integer registers.
    General,
    /// MMX registers.
    Mmx,
    /// XMM / YMM registers.
    Vector,
}

impl RegFamily {
    fn admits(self, class: RegisterClass) -> bool {
        match self {
            RegFamily::General => class.is_general(),
            RegFamily::Mmx => class == RegisterClass::Mmx,
            RegFamily::Vector => class.is_vector(),
        }
    }
}

/// One positional slot of a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgPattern {
    /// Accepted argument kind.
    pub kind: ArgKind,
    /// Accepted width.
    pub size: SizeSpec,
    /// Pinned register index; the slot is implied by the opcode and
    /// never encoded in ModR/M.
    pub fixed: Option<u8>,
    /// Register file for the register side of the slot.
    pub family: RegFamily,
}

impl ArgPattern {
    /// Whether `arg` fits this slot.
    pub fn accepts(&self, arg: &Argument) -> bool {
        let kind_ok = match (self.kind, arg) {
            (ArgKind::Any, _) => true,
            (ArgKind::Register | ArgKind::MemoryOrRegister, Argument::Register(r)) => {
                self.family.admits(r.class()) && self.fixed.map_or(true, |i| i == r.index())
            }
            (ArgKind::Memory | ArgKind::MemoryOrRegister, Argument::Memory(_)) => true,
            (ArgKind::Immediate, Argument::Immediate(_)) => true,
            _ => false,
        };
        kind_ok
            && match self.size {
                SizeSpec::Any => true,
                SizeSpec::Exact(want) => arg.size() == Some(want),
            }
    }

    /// Whether the slot is implied by the opcode.
    pub const fn is_fixed(&self) -> bool {
        self.fixed.is_some()
    }
}

const fn pattern(kind: ArgKind, size: OperandSize, family: RegFamily) -> ArgPattern {
    ArgPattern {
        kind,
        size: SizeSpec::Exact(size),
        fixed: None,
        family,
    }
}

const fn reg(size: OperandSize) -> ArgPattern {
    pattern(ArgKind::Register, size, RegFamily::General)
}

const fn rm(size: OperandSize) -> ArgPattern {
    pattern(ArgKind::MemoryOrRegister, size, RegFamily::General)
}

const fn imm(size: OperandSize) -> ArgPattern {
    pattern(ArgKind::Immediate, size, RegFamily::General)
}

/// The accumulator (`al`/`ax`/`eax`/`rax`) pinned by the opcode.
const fn acc(size: OperandSize) -> ArgPattern {
    ArgPattern {
        kind: ArgKind::Register,
        size: SizeSpec::Exact(size),
        fixed: Some(0),
        family: RegFamily::General,
    }
}

const fn vreg(size: OperandSize) -> ArgPattern {
    pattern(ArgKind::Register, size, RegFamily::Vector)
}

const fn vrm(size: OperandSize) -> ArgPattern {
    pattern(ArgKind::MemoryOrRegister, size, RegFamily::Vector)
}

const fn mmreg() -> ArgPattern {
    pattern(ArgKind::Register, Qword, RegFamily::Mmx)
}

const fn mmrm() -> ArgPattern {
    pattern(ArgKind::MemoryOrRegister, Qword, RegFamily::Mmx)
}

// ─── Schemas ────────────────────────────────────────────────────────────

/// Opcode bytes, most significant first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Opcode {
    /// Opcode bytes packed big-endian into the low `len` bytes.
    pub value: u32,
    /// Number of opcode bytes, 1..=3. Zero marks an invalid instance.
    pub len: u8,
}

impl Opcode {
    /// The zero-length opcode of an invalid instance.
    pub const INVALID: Opcode = Opcode { value: 0, len: 0 };

    /// One opcode byte.
    pub const fn one(b: u8) -> Self {
        Self {
            value: b as u32,
            len: 1,
        }
    }

    /// Two opcode bytes.
    pub const fn two(b0: u8, b1: u8) -> Self {
        Self {
            value: ((b0 as u32) << 8) | b1 as u32,
            len: 2,
        }
    }

    /// Three opcode bytes.
    pub const fn three(b0: u8, b1: u8, b2: u8) -> Self {
        Self {
            value: ((b0 as u32) << 16) | ((b1 as u32) << 8) | b2 as u32,
            len: 3,
        }
    }

    /// Byte `i` counted from the most significant end.
    pub const fn byte(self, i: u8) -> Option<u8> {
        if i >= self.len || self.len > 4 {
            return None;
        }
        Some((self.value >> (8 * (self.len - 1 - i) as u32)) as u8)
    }
}

/// Which operand goes into ModR/M.reg for a two-operand legacy form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// `op r/m, r`: destination in ModR/M.rm, source in ModR/M.reg.
    Mr,
    /// `op r, r/m`: destination in ModR/M.reg, source in ModR/M.rm.
    Rm,
}

/// VEX opcode map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VexMap {
    /// `0F` escape.
    Map0F,
    /// `0F 38` escape.
    Map0F38,
    /// `0F 3A` escape.
    Map0F3A,
}

impl VexMap {
    /// VEX.mmmmm value.
    pub const fn mmmmm(self) -> u8 {
        match self {
            VexMap::Map0F => 0b00001,
            VexMap::Map0F38 => 0b00010,
            VexMap::Map0F3A => 0b00011,
        }
    }
}

/// Implied mandatory prefix of a VEX instruction (VEX.pp).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VexPp {
    /// No implied prefix.
    None,
    /// Implied `66`.
    P66,
    /// Implied `F3`.
    PF3,
    /// Implied `F2`.
    PF2,
}

impl VexPp {
    /// VEX.pp value.
    pub const fn bits(self) -> u8 {
        match self {
            VexPp::None => 0b00,
            VexPp::P66 => 0b01,
            VexPp::PF3 => 0b10,
            VexPp::PF2 => 0b11,
        }
    }
}

/// How a matched schema is turned into an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Legacy/REX encoding.
    Legacy {
        /// ModR/M role assignment for register pairs.
        order: Order,
        /// `/digit` opcode extension used when ModR/M.reg holds no register.
        digit: u8,
    },
    /// VEX encoding: destination in ModR/M.reg, first source in
    /// VEX.vvvv, second source in ModR/M.rm.
    Vex {
        /// Opcode map.
        map: VexMap,
        /// Implied prefix.
        pp: VexPp,
        /// VEX.W.
        w: bool,
    },
    /// 3DNow!: `0F 0F /r` with the opcode as trailing suffix byte.
    ThreeDNow,
}

/// One accepted operand shape for a mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    /// Base opcode.
    pub opcode: Opcode,
    /// Positional argument patterns.
    pub args: &'static [ArgPattern],
    /// Instance builder selection.
    pub encoding: Encoding,
}

impl Schema {
    /// Whether every argument fits its slot.
    pub fn accepts(&self, args: &[Argument]) -> bool {
        self.args.len() == args.len()
            && self.args.iter().zip(args).all(|(p, a)| p.accepts(a))
    }
}

// ─── Argument shapes ────────────────────────────────────────────────────

const AL_I8: &[ArgPattern] = &[acc(Byte), imm(Byte)];
const AX_I16: &[ArgPattern] = &[acc(Word), imm(Word)];
const EAX_I32: &[ArgPattern] = &[acc(Dword), imm(Dword)];
const RAX_I32: &[ArgPattern] = &[acc(Qword), imm(Dword)];

const RM16_I8: &[ArgPattern] = &[rm(Word), imm(Byte)];
const RM32_I8: &[ArgPattern] = &[rm(Dword), imm(Byte)];
const RM64_I8: &[ArgPattern] = &[rm(Qword), imm(Byte)];
const RM8_I8: &[ArgPattern] = &[rm(Byte), imm(Byte)];
const RM16_I16: &[ArgPattern] = &[rm(Word), imm(Word)];
const RM32_I32: &[ArgPattern] = &[rm(Dword), imm(Dword)];
const RM64_I32: &[ArgPattern] = &[rm(Qword), imm(Dword)];

const RM8_R8: &[ArgPattern] = &[rm(Byte), reg(Byte)];
const RM16_R16: &[ArgPattern] = &[rm(Word), reg(Word)];
const RM32_R32: &[ArgPattern] = &[rm(Dword), reg(Dword)];
const RM64_R64: &[ArgPattern] = &[rm(Qword), reg(Qword)];

const R8_RM8: &[ArgPattern] = &[reg(Byte), rm(Byte)];
const R16_RM16: &[ArgPattern] = &[reg(Word), rm(Word)];
const R32_RM32: &[ArgPattern] = &[reg(Dword), rm(Dword)];
const R64_RM64: &[ArgPattern] = &[reg(Qword), rm(Qword)];

const RM8: &[ArgPattern] = &[rm(Byte)];
const RM16: &[ArgPattern] = &[rm(Word)];
const RM32: &[ArgPattern] = &[rm(Dword)];
const RM64: &[ArgPattern] = &[rm(Qword)];

const R16_RM16_I8: &[ArgPattern] = &[reg(Word), rm(Word), imm(Byte)];
const R32_RM32_I8: &[ArgPattern] = &[reg(Dword), rm(Dword), imm(Byte)];
const R64_RM64_I8: &[ArgPattern] = &[reg(Qword), rm(Qword), imm(Byte)];
const R16_RM16_I16: &[ArgPattern] = &[reg(Word), rm(Word), imm(Word)];
const R32_RM32_I32: &[ArgPattern] = &[reg(Dword), rm(Dword), imm(Dword)];
const R64_RM64_I32: &[ArgPattern] = &[reg(Qword), rm(Qword), imm(Dword)];

const X_X_XM: &[ArgPattern] = &[vreg(Xmmword), vreg(Xmmword), vrm(Xmmword)];
const Y_Y_YM: &[ArgPattern] = &[vreg(Ymmword), vreg(Ymmword), vrm(Ymmword)];

const MM_MMM64: &[ArgPattern] = &[mmreg(), mmrm()];

// ─── Table builders ─────────────────────────────────────────────────────

const fn legacy(opcode: Opcode, args: &'static [ArgPattern], order: Order, digit: u8) -> Schema {
    Schema {
        opcode,
        args,
        encoding: Encoding::Legacy { order, digit },
    }
}

const fn mr(op: u8, args: &'static [ArgPattern]) -> Schema {
    legacy(Opcode::one(op), args, Order::Mr, 0)
}

const fn ext(op: u8, digit: u8, args: &'static [ArgPattern]) -> Schema {
    legacy(Opcode::one(op), args, Order::Mr, digit)
}

const fn rmo(op: Opcode, args: &'static [ArgPattern]) -> Schema {
    legacy(op, args, Order::Rm, 0)
}

/// Classic ALU group (`add or adc sbb and sub xor cmp`): operation `n`
/// uses opcodes `8n+0..8n+5` and extension `/n` of `80`, `81`, `83`.
const fn alu(n: u8) -> [Schema; 19] {
    let base = n * 8;
    [
        mr(base + 4, AL_I8),
        mr(base + 5, AX_I16),
        mr(base + 5, EAX_I32),
        mr(base + 5, RAX_I32),
        ext(0x83, n, RM16_I8),
        ext(0x83, n, RM32_I8),
        ext(0x83, n, RM64_I8),
        ext(0x80, n, RM8_I8),
        ext(0x81, n, RM16_I16),
        ext(0x81, n, RM32_I32),
        ext(0x81, n, RM64_I32),
        mr(base, RM8_R8),
        mr(base + 1, RM16_R16),
        mr(base + 1, RM32_R32),
        mr(base + 1, RM64_R64),
        rmo(Opcode::one(base + 2), R8_RM8),
        rmo(Opcode::one(base + 3), R16_RM16),
        rmo(Opcode::one(base + 3), R32_RM32),
        rmo(Opcode::one(base + 3), R64_RM64),
    ]
}

/// Single r/m operand group under `F6`/`F7 /digit`.
const fn unary(digit: u8) -> [Schema; 4] {
    [
        ext(0xF6, digit, RM8),
        ext(0xF7, digit, RM16),
        ext(0xF7, digit, RM32),
        ext(0xF7, digit, RM64),
    ]
}

const fn vex(op: u8, map: VexMap, pp: VexPp, w: bool) -> [Schema; 2] {
    let encoding = Encoding::Vex { map, pp, w };
    [
        Schema {
            opcode: Opcode::one(op),
            args: X_X_XM,
            encoding,
        },
        Schema {
            opcode: Opcode::one(op),
            args: Y_Y_YM,
            encoding,
        },
    ]
}

const fn three_dnow(suffix: u8) -> [Schema; 1] {
    [Schema {
        opcode: Opcode::one(suffix),
        args: MM_MMM64,
        encoding: Encoding::ThreeDNow,
    }]
}

// ─── Tables ─────────────────────────────────────────────────────────────

static ADD: [Schema; 19] = alu(0);
static OR: [Schema; 19] = alu(1);
static ADC: [Schema; 19] = alu(2);
static SBB: [Schema; 19] = alu(3);
static AND: [Schema; 19] = alu(4);
static SUB: [Schema; 19] = alu(5);
static XOR: [Schema; 19] = alu(6);
static CMP: [Schema; 19] = alu(7);

static TEST: [Schema; 16] = [
    mr(0xA8, AL_I8),
    mr(0xA9, AX_I16),
    mr(0xA9, EAX_I32),
    mr(0xA9, RAX_I32),
    ext(0xF6, 0, RM8_I8),
    ext(0xF7, 0, RM16_I16),
    ext(0xF7, 0, RM32_I32),
    ext(0xF7, 0, RM64_I32),
    mr(0x84, RM8_R8),
    mr(0x85, RM16_R16),
    mr(0x85, RM32_R32),
    mr(0x85, RM64_R64),
    // TEST is symmetric; `test r, m` reuses the r/m, r opcode.
    rmo(Opcode::one(0x84), R8_RM8),
    rmo(Opcode::one(0x85), R16_RM16),
    rmo(Opcode::one(0x85), R32_RM32),
    rmo(Opcode::one(0x85), R64_RM64),
];

static NOT: [Schema; 4] = unary(2);
static NEG: [Schema; 4] = unary(3);

static IMUL: [Schema; 13] = [
    rmo(Opcode::one(0x6B), R16_RM16_I8),
    rmo(Opcode::one(0x6B), R32_RM32_I8),
    rmo(Opcode::one(0x6B), R64_RM64_I8),
    ext(0xF6, 5, RM8),
    ext(0xF7, 5, RM16),
    ext(0xF7, 5, RM32),
    ext(0xF7, 5, RM64),
    rmo(Opcode::one(0x69), R16_RM16_I16),
    rmo(Opcode::one(0x69), R32_RM32_I32),
    rmo(Opcode::one(0x69), R64_RM64_I32),
    rmo(Opcode::two(0x0F, 0xAF), R16_RM16),
    rmo(Opcode::two(0x0F, 0xAF), R32_RM32),
    rmo(Opcode::two(0x0F, 0xAF), R64_RM64),
];

static VADDPS: [Schema; 2] = vex(0x58, VexMap::Map0F, VexPp::None, false);
static VADDPD: [Schema; 2] = vex(0x58, VexMap::Map0F, VexPp::P66, false);
static VSUBPS: [Schema; 2] = vex(0x5C, VexMap::Map0F, VexPp::None, false);
static VMULPS: [Schema; 2] = vex(0x59, VexMap::Map0F, VexPp::None, false);
static VANDPS: [Schema; 2] = vex(0x54, VexMap::Map0F, VexPp::None, false);
static VORPS: [Schema; 2] = vex(0x56, VexMap::Map0F, VexPp::None, false);
static VXORPS: [Schema; 2] = vex(0x57, VexMap::Map0F, VexPp::None, false);
static VPERMILPS: [Schema; 2] = vex(0x0C, VexMap::Map0F38, VexPp::P66, false);
static VPSLLVQ: [Schema; 2] = vex(0x47, VexMap::Map0F38, VexPp::P66, true);

static PFADD: [Schema; 1] = three_dnow(0x9E);
static PFSUB: [Schema; 1] = three_dnow(0x9A);
static PFMUL: [Schema; 1] = three_dnow(0xB4);

/// The ordered schema list of `mnemonic`.
///
/// `nop` is built without a table and returns an empty list.
pub fn schemas(mnemonic: Mnemonic) -> &'static [Schema] {
    match mnemonic {
        Mnemonic::Add => &ADD,
        Mnemonic::Or => &OR,
        Mnemonic::Adc => &ADC,
        Mnemonic::Sbb => &SBB,
        Mnemonic::And => &AND,
        Mnemonic::Sub => &SUB,
        Mnemonic::Xor => &XOR,
        Mnemonic::Cmp => &CMP,
        Mnemonic::Test => &TEST,
        Mnemonic::Not => &NOT,
        Mnemonic::Neg => &NEG,
        Mnemonic::Imul => &IMUL,
        Mnemonic::Nop => &[],
        Mnemonic::Vaddps => &VADDPS,
        Mnemonic::Vaddpd => &VADDPD,
        Mnemonic::Vsubps => &VSUBPS,
        Mnemonic::Vmulps => &VMULPS,
        Mnemonic::Vandps => &VANDPS,
        Mnemonic::Vorps => &VORPS,
        Mnemonic::Vxorps => &VXORPS,
        Mnemonic::Vpermilps => &VPERMILPS,
        Mnemonic::Vpsllvq => &VPSLLVQ,
        Mnemonic::Pfadd => &PFADD,
        Mnemonic::Pfsub => &PFSUB,
        Mnemonic::Pfmul => &PFMUL,
    }
}

// ─── Matcher ────────────────────────────────────────────────────────────

/// First schema of `table` accepting `args`, with its position.
pub fn first_match<'t>(table: &'t [Schema], args: &[Argument]) -> Option<(usize, &'t Schema)> {
    table.iter().enumerate().find(|(_, s)| s.accepts(args))
}

/// Find the schema for `mnemonic` applied to `args`.
pub fn match_schema(
    mnemonic: Mnemonic,
    args: &[Argument],
) -> Result<&'static Schema, EncodeError> {
    match first_match(schemas(mnemonic), args) {
        Some((index, schema)) => {
            log::trace!("{}: matched schema #{} ({:?})", mnemonic, index, schema.opcode);
            Ok(schema)
        }
        None => Err(EncodeError::NoMatchingSchema { mnemonic }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{xmm, ymm, mm, Immediate, MemoryOperand, Register};

    fn imm(v: u64, size: OperandSize) -> Argument {
        Argument::Immediate(Immediate::new(v, size).unwrap())
    }

    fn position(m: Mnemonic, args: &[Argument]) -> Option<usize> {
        first_match(schemas(m), args).map(|(i, _)| i)
    }

    #[test]
    fn accumulator_form_wins() {
        let args = [Argument::from(Register::AL), imm(0xFF, Byte)];
        assert_eq!(position(Mnemonic::Add, &args), Some(0));
        let args = [Argument::from(Register::RAX), imm(1, Dword)];
        assert_eq!(position(Mnemonic::Add, &args), Some(3));
    }

    #[test]
    fn non_accumulator_skips_fixed_forms() {
        let args = [Argument::from(Register::CL), imm(1, Byte)];
        let schema = match_schema(Mnemonic::Add, &args).unwrap();
        assert_eq!(schema.opcode, Opcode::one(0x80));
    }

    #[test]
    fn imm8_form_before_imm32_form() {
        let args = [Argument::from(Register::RBX), imm(1, Byte)];
        let schema = match_schema(Mnemonic::Sub, &args).unwrap();
        assert_eq!(schema.opcode, Opcode::one(0x83));
        assert_eq!(schema.encoding, Encoding::Legacy { order: Order::Mr, digit: 5 });
    }

    #[test]
    fn accumulator_with_imm8_uses_sign_extended_form() {
        let args = [Argument::from(Register::RAX), imm(1, Byte)];
        let schema = match_schema(Mnemonic::Add, &args).unwrap();
        assert_eq!(schema.opcode, Opcode::one(0x83));
    }

    #[test]
    fn register_pair_prefers_mr() {
        let args = [Argument::from(Register::RAX), Argument::from(Register::RCX)];
        let schema = match_schema(Mnemonic::Xor, &args).unwrap();
        assert_eq!(schema.opcode, Opcode::one(0x31));
        assert_eq!(schema.encoding, Encoding::Legacy { order: Order::Mr, digit: 0 });
    }

    #[test]
    fn register_memory_uses_rm() {
        let mem = MemoryOperand::base(Register::RBX, Qword).unwrap();
        let args = [Argument::from(Register::RAX), Argument::from(mem)];
        let schema = match_schema(Mnemonic::Cmp, &args).unwrap();
        assert_eq!(schema.opcode, Opcode::one(0x3B));
    }

    #[test]
    fn size_mismatch_is_no_match() {
        let args = [Argument::from(Register::EAX), imm(1, Word)];
        assert_eq!(
            match_schema(Mnemonic::Add, &args),
            Err(EncodeError::NoMatchingSchema {
                mnemonic: Mnemonic::Add
            })
        );
    }

    #[test]
    fn arity_mismatch_is_no_match() {
        let args = [Argument::from(Register::EAX)];
        assert!(match_schema(Mnemonic::Add, &args).is_err());
    }

    #[test]
    fn mmx_register_does_not_fit_general_slot() {
        let args = [Argument::from(mm(0)), Argument::from(Register::RAX)];
        assert!(match_schema(Mnemonic::Add, &args).is_err());
        let args = [Argument::from(mm(0)), Argument::from(mm(1))];
        assert!(match_schema(Mnemonic::Pfadd, &args).is_ok());
    }

    #[test]
    fn vex_width_selects_schema() {
        let x = [xmm(0), xmm(1), xmm(2)].map(Argument::from);
        let y = [ymm(0), ymm(1), ymm(2)].map(Argument::from);
        assert_eq!(position(Mnemonic::Vaddps, &x), Some(0));
        assert_eq!(position(Mnemonic::Vaddps, &y), Some(1));
        let mixed = [Argument::from(xmm(0)), Argument::from(ymm(1)), Argument::from(xmm(2))];
        assert_eq!(position(Mnemonic::Vaddps, &mixed), None);
    }

    #[test]
    fn nop_has_no_table() {
        assert!(schemas(Mnemonic::Nop).is_empty());
    }

    #[test]
    fn first_match_is_order_stable() {
        const ANY: &[ArgPattern] = &[ArgPattern {
            kind: ArgKind::Any,
            size: SizeSpec::Any,
            fixed: None,
            family: RegFamily::General,
        }];
        const A: Schema = legacy(Opcode::one(0xAA), ANY, Order::Mr, 0);
        const B: Schema = legacy(Opcode::one(0xBB), RM64, Order::Mr, 0);
        let args = [Argument::from(Register::RAX)];
        assert_eq!(first_match(&[A, B], &args).unwrap().1.opcode, Opcode::one(0xAA));
        assert_eq!(first_match(&[B, A], &args).unwrap().1.opcode, Opcode::one(0xBB));
    }

    #[test]
    fn opcode_bytes_most_significant_first() {
        let op = Opcode::three(0x0F, 0x38, 0xF6);
        assert_eq!(
            [op.byte(0), op.byte(1), op.byte(2)],
            [Some(0x0F), Some(0x38), Some(0xF6)]
        );
        let op = Opcode::two(0x0F, 0xAF);
        assert_eq!([op.byte(0), op.byte(1)], [Some(0x0F), Some(0xAF)]);
        assert_eq!(op.byte(2), None);
        assert_eq!(Opcode::INVALID.byte(0), None);
        assert_eq!(Opcode { value: 0, len: 9 }.byte(0), None);
    }

    /// Fixed-register forms come first, then sign-extended imm8 forms,
    /// then everything else.
    #[test]
    fn table_order_invariant() {
        fn rank(s: &Schema) -> u8 {
            let fixed = s.args.iter().any(ArgPattern::is_fixed);
            let last = s.args.last();
            let imm8 = matches!(
                last,
                Some(ArgPattern { kind: ArgKind::Immediate, size: SizeSpec::Exact(Byte), .. })
            ) && !matches!(s.args[0].size, SizeSpec::Exact(Byte));
            if fixed {
                0
            } else if imm8 {
                1
            } else {
                2
            }
        }
        for m in Mnemonic::ALL {
            let ranks: alloc::vec::Vec<u8> = schemas(*m).iter().map(rank).collect();
            assert!(
                ranks.windows(2).all(|w| w[0] <= w[1]),
                "{} table out of order: {:?}",
                m,
                ranks
            );
        }
    }

    #[test]
    fn every_opcode_length_in_range() {
        for m in Mnemonic::ALL {
            for s in schemas(*m) {
                assert!((1..=3).contains(&s.opcode.len), "{}", m);
            }
        }
    }
}
