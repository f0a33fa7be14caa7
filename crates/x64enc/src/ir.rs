//! Operand model: registers, memory operands, immediates and instructions.
//!
//! Every type here is a plain `Copy` value. Constructors that can fail
//! validate eagerly and return [`EncodeError`], so a malformed operand is
//! reported where it is built rather than when the encoder trips over it.

use core::fmt;
use core::str::FromStr;

use crate::error::{EncodeError, WidthOf};

// ─── Registers ──────────────────────────────────────────────────────────

/// Register class. The class alone fixes a register's width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegisterClass {
    /// 8-bit general purpose, legacy file (`al`..`bh`).
    Gpr8,
    /// 8-bit general purpose that only exists with a REX prefix
    /// (`spl`, `bpl`, `sil`, `dil`, `r8b`..`r15b`).
    Gpr8Rex,
    /// 16-bit general purpose.
    Gpr16,
    /// 32-bit general purpose.
    Gpr32,
    /// 64-bit general purpose.
    Gpr64,
    /// 32-bit instruction pointer (`eip`), only meaningful as a base.
    Ip32,
    /// 64-bit instruction pointer (`rip`), only meaningful as a base.
    Ip64,
    /// x87 stack register.
    X87,
    /// MMX register.
    Mmx,
    /// 128-bit SSE/AVX register.
    Xmm,
    /// 256-bit AVX register.
    Ymm,
    /// Segment register.
    Segment,
    /// Control register.
    Control,
    /// Debug register.
    Debug,
}

impl RegisterClass {
    /// Width in bits.
    pub const fn bits(self) -> u16 {
        self.size().bits()
    }

    /// Width as an [`OperandSize`].
    pub const fn size(self) -> OperandSize {
        match self {
            RegisterClass::Gpr8 | RegisterClass::Gpr8Rex => OperandSize::Byte,
            RegisterClass::Gpr16 | RegisterClass::Segment => OperandSize::Word,
            RegisterClass::Gpr32
            | RegisterClass::Ip32
            | RegisterClass::Control
            | RegisterClass::Debug => OperandSize::Dword,
            RegisterClass::Gpr64 | RegisterClass::Ip64 | RegisterClass::Mmx => {
                OperandSize::Qword
            }
            RegisterClass::X87 => OperandSize::Tbyte,
            RegisterClass::Xmm => OperandSize::Xmmword,
            RegisterClass::Ymm => OperandSize::Ymmword,
        }
    }

    /// General-purpose integer register of any width.
    pub const fn is_general(self) -> bool {
        matches!(
            self,
            RegisterClass::Gpr8
                | RegisterClass::Gpr8Rex
                | RegisterClass::Gpr16
                | RegisterClass::Gpr32
                | RegisterClass::Gpr64
        )
    }

    /// Instruction-pointer marker class.
    pub const fn is_instruction_pointer(self) -> bool {
        matches!(self, RegisterClass::Ip32 | RegisterClass::Ip64)
    }

    /// SSE/AVX vector register.
    pub const fn is_vector(self) -> bool {
        matches!(self, RegisterClass::Xmm | RegisterClass::Ymm)
    }

    /// Highest register number the class defines.
    pub const fn max_index(self) -> u8 {
        match self {
            RegisterClass::X87 | RegisterClass::Mmx => 7,
            RegisterClass::Segment | RegisterClass::Ip32 | RegisterClass::Ip64 => 5,
            _ => 15,
        }
    }
}

/// A register reference: class plus a 4-bit index.
///
/// Bit 3 of the index selects registers 8–15, which need a REX (or VEX)
/// extension bit to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RegisterParts"))]
pub struct Register {
    class: RegisterClass,
    index: u8,
}

macro_rules! register_consts {
    ($class:ident: $($name:ident = $idx:expr),* $(,)?) => {
        $(
            #[allow(missing_docs)]
            pub const $name: Register = Register::new(RegisterClass::$class, $idx);
        )*
    };
}

impl Register {
    /// Build a register reference; only the low 4 bits of `index` are kept.
    pub const fn new(class: RegisterClass, index: u8) -> Self {
        Self {
            class,
            index: index & 0x0F,
        }
    }

    /// Build a register reference, rejecting numbers the class does not have.
    pub fn try_new(class: RegisterClass, index: u8) -> Result<Self, EncodeError> {
        if index > class.max_index() {
            return Err(invalid(alloc::format!(
                "{:?} has no register {}",
                class, index
            )));
        }
        Ok(Self { class, index })
    }

    /// The register class.
    pub const fn class(self) -> RegisterClass {
        self.class
    }

    /// The 4-bit register number.
    pub const fn index(self) -> u8 {
        self.index
    }

    /// Low three bits, as they appear in ModR/M and SIB fields.
    pub const fn low_bits(self) -> u8 {
        self.index & 0x07
    }

    /// Registers 8–15 need an extension bit.
    pub const fn is_extended(self) -> bool {
        self.index & 0x08 != 0
    }

    /// Width in bits.
    pub const fn bits(self) -> u16 {
        self.class.bits()
    }

    /// Width as an [`OperandSize`].
    pub const fn size(self) -> OperandSize {
        self.class.size()
    }

    /// `ah`, `ch`, `dh`, `bh`: unaddressable once a REX prefix is present.
    pub const fn is_high_byte(self) -> bool {
        matches!(self.class, RegisterClass::Gpr8) && self.index >= 4 && self.index < 8
    }

    /// Byte registers that only exist under a REX prefix.
    pub const fn requires_rex(self) -> bool {
        matches!(self.class, RegisterClass::Gpr8Rex)
    }

    register_consts!(Gpr8: AL = 0, CL = 1, DL = 2, BL = 3, AH = 4, CH = 5, DH = 6, BH = 7);
    register_consts!(Gpr8Rex:
        SPL = 4, BPL = 5, SIL = 6, DIL = 7,
        R8B = 8, R9B = 9, R10B = 10, R11B = 11, R12B = 12, R13B = 13, R14B = 14, R15B = 15,
    );
    register_consts!(Gpr16:
        AX = 0, CX = 1, DX = 2, BX = 3, SP = 4, BP = 5, SI = 6, DI = 7,
        R8W = 8, R9W = 9, R10W = 10, R11W = 11, R12W = 12, R13W = 13, R14W = 14, R15W = 15,
    );
    register_consts!(Gpr32:
        EAX = 0, ECX = 1, EDX = 2, EBX = 3, ESP = 4, EBP = 5, ESI = 6, EDI = 7,
        R8D = 8, R9D = 9, R10D = 10, R11D = 11, R12D = 12, R13D = 13, R14D = 14, R15D = 15,
    );
    register_consts!(Gpr64:
        RAX = 0, RCX = 1, RDX = 2, RBX = 3, RSP = 4, RBP = 5, RSI = 6, RDI = 7,
        R8 = 8, R9 = 9, R10 = 10, R11 = 11, R12 = 12, R13 = 13, R14 = 14, R15 = 15,
    );
    register_consts!(Ip32: EIP = 5);
    register_consts!(Ip64: RIP = 5);
    register_consts!(Segment: ES = 0, CS = 1, SS = 2, DS = 3, FS = 4, GS = 5);
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RegisterParts {
    class: RegisterClass,
    index: u8,
}

#[cfg(feature = "serde")]
impl TryFrom<RegisterParts> for Register {
    type Error = EncodeError;

    fn try_from(p: RegisterParts) -> Result<Self, Self::Error> {
        Register::try_new(p.class, p.index)
    }
}

/// `xmm0`..`xmm15`.
pub const fn xmm(n: u8) -> Register {
    Register::new(RegisterClass::Xmm, n)
}

/// `ymm0`..`ymm15`.
pub const fn ymm(n: u8) -> Register {
    Register::new(RegisterClass::Ymm, n)
}

/// `mm0`..`mm7`.
pub const fn mm(n: u8) -> Register {
    Register::new(RegisterClass::Mmx, n & 0x07)
}

/// `st(0)`..`st(7)`.
pub const fn st(n: u8) -> Register {
    Register::new(RegisterClass::X87, n & 0x07)
}

/// `cr0`..`cr15`.
pub const fn cr(n: u8) -> Register {
    Register::new(RegisterClass::Control, n)
}

/// `dr0`..`dr15`.
pub const fn dr(n: u8) -> Register {
    Register::new(RegisterClass::Debug, n)
}

const LEGACY8: [&str; 8] = ["al", "cl", "dl", "bl", "ah", "ch", "dh", "bh"];
const REX8: [&str; 8] = ["al", "cl", "dl", "bl", "spl", "bpl", "sil", "dil"];
const GPR16: [&str; 8] = ["ax", "cx", "dx", "bx", "sp", "bp", "si", "di"];
const GPR32: [&str; 8] = ["eax", "ecx", "edx", "ebx", "esp", "ebp", "esi", "edi"];
const GPR64: [&str; 8] = ["rax", "rcx", "rdx", "rbx", "rsp", "rbp", "rsi", "rdi"];
const SEGMENTS: [&str; 6] = ["es", "cs", "ss", "ds", "fs", "gs"];

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let i = self.index as usize;
        let low = (self.index & 7) as usize;
        match self.class {
            RegisterClass::Gpr8 | RegisterClass::Gpr8Rex if i >= 8 => write!(f, "r{}b", i),
            RegisterClass::Gpr8 => f.write_str(LEGACY8[low]),
            RegisterClass::Gpr8Rex => f.write_str(REX8[low]),
            RegisterClass::Gpr16 if i >= 8 => write!(f, "r{}w", i),
            RegisterClass::Gpr16 => f.write_str(GPR16[low]),
            RegisterClass::Gpr32 if i >= 8 => write!(f, "r{}d", i),
            RegisterClass::Gpr32 => f.write_str(GPR32[low]),
            RegisterClass::Gpr64 if i >= 8 => write!(f, "r{}", i),
            RegisterClass::Gpr64 => f.write_str(GPR64[low]),
            RegisterClass::Ip32 => f.write_str("eip"),
            RegisterClass::Ip64 => f.write_str("rip"),
            RegisterClass::X87 => write!(f, "st({})", i),
            RegisterClass::Mmx => write!(f, "mm{}", i),
            RegisterClass::Xmm => write!(f, "xmm{}", i),
            RegisterClass::Ymm => write!(f, "ymm{}", i),
            RegisterClass::Segment => match SEGMENTS.get(i) {
                Some(name) => f.write_str(name),
                None => write!(f, "seg{}", i),
            },
            RegisterClass::Control => write!(f, "cr{}", i),
            RegisterClass::Debug => write!(f, "dr{}", i),
        }
    }
}

// ─── Sizes ──────────────────────────────────────────────────────────────

/// Operand width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OperandSize {
    /// 8-bit (`byte ptr`).
    Byte,
    /// 16-bit (`word ptr`).
    Word,
    /// 32-bit (`dword ptr`).
    Dword,
    /// 64-bit (`qword ptr`).
    Qword,
    /// 80-bit x87 (`tbyte ptr`).
    Tbyte,
    /// 128-bit (`xmmword ptr`).
    Xmmword,
    /// 256-bit (`ymmword ptr`).
    Ymmword,
}

impl OperandSize {
    /// Return the operand size in bits.
    pub const fn bits(self) -> u16 {
        match self {
            OperandSize::Byte => 8,
            OperandSize::Word => 16,
            OperandSize::Dword => 32,
            OperandSize::Qword => 64,
            OperandSize::Tbyte => 80,
            OperandSize::Xmmword => 128,
            OperandSize::Ymmword => 256,
        }
    }

    /// Inverse of [`bits`](Self::bits).
    pub const fn from_bits(bits: u16) -> Option<Self> {
        match bits {
            8 => Some(OperandSize::Byte),
            16 => Some(OperandSize::Word),
            32 => Some(OperandSize::Dword),
            64 => Some(OperandSize::Qword),
            80 => Some(OperandSize::Tbyte),
            128 => Some(OperandSize::Xmmword),
            256 => Some(OperandSize::Ymmword),
            _ => None,
        }
    }
}

impl fmt::Display for OperandSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperandSize::Byte => "byte",
            OperandSize::Word => "word",
            OperandSize::Dword => "dword",
            OperandSize::Qword => "qword",
            OperandSize::Tbyte => "tbyte",
            OperandSize::Xmmword => "xmmword",
            OperandSize::Ymmword => "ymmword",
        })
    }
}

/// SIB scale factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Scale {
    /// ×1
    #[default]
    X1,
    /// ×2
    X2,
    /// ×4
    X4,
    /// ×8
    X8,
}

impl Scale {
    /// Parse a multiplier of 1, 2, 4 or 8.
    pub fn from_factor(factor: u8) -> Result<Self, EncodeError> {
        match factor {
            1 => Ok(Scale::X1),
            2 => Ok(Scale::X2),
            4 => Ok(Scale::X4),
            8 => Ok(Scale::X8),
            _ => Err(EncodeError::InvalidOperand {
                detail: alloc::format!("scale must be 1, 2, 4 or 8, got {}", factor),
            }),
        }
    }

    /// The multiplier.
    pub const fn factor(self) -> u8 {
        1 << self.code()
    }

    /// Architectural 2-bit SIB.ss code.
    pub const fn code(self) -> u8 {
        match self {
            Scale::X1 => 0b00,
            Scale::X2 => 0b01,
            Scale::X4 => 0b10,
            Scale::X8 => 0b11,
        }
    }
}

/// Width of a memory operand's displacement.
///
/// 16- and 64-bit displacements do not exist in 64-bit addressing and
/// have no variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DispSize {
    /// No displacement bytes.
    #[default]
    None,
    /// Sign-extended 8-bit displacement.
    Byte,
    /// Sign-extended 32-bit displacement.
    Dword,
}

impl DispSize {
    /// Displacement width in bits (0 for none).
    pub const fn bits(self) -> u16 {
        match self {
            DispSize::None => 0,
            DispSize::Byte => 8,
            DispSize::Dword => 32,
        }
    }

    /// Map an operand width onto a displacement width.
    pub fn from_size(size: OperandSize) -> Result<Self, EncodeError> {
        match size {
            OperandSize::Byte => Ok(DispSize::Byte),
            OperandSize::Dword => Ok(DispSize::Dword),
            other => Err(EncodeError::UnsupportedWidth {
                what: WidthOf::Displacement,
                bits: other.bits(),
            }),
        }
    }
}

// ─── Memory operands ────────────────────────────────────────────────────

/// A memory operand: `segment:[base + index*scale + disp]`.
///
/// Built through [`MemoryOperand::new`], which rejects inconsistent
/// combinations up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "MemoryParts"))]
pub struct MemoryOperand {
    base: Option<Register>,
    index: Option<Register>,
    scale: Scale,
    disp: i64,
    disp_size: DispSize,
    size: OperandSize,
    segment: Option<Register>,
}

impl MemoryOperand {
    /// Validate and build a memory operand.
    ///
    /// `disp` is truncated to `disp_size` and kept sign-extended, so
    /// `0xFFFF_FFFF` with a 32-bit width is stored as `-1`.
    pub fn new(
        base: Option<Register>,
        index: Option<Register>,
        scale: Scale,
        disp: i64,
        disp_size: DispSize,
        size: OperandSize,
    ) -> Result<Self, EncodeError> {
        if let Some(b) = base {
            if !b.class().is_general() && !b.class().is_instruction_pointer() {
                return Err(invalid(alloc::format!(
                    "base register {} is not a general-purpose register",
                    b
                )));
            }
        }
        if let Some(i) = index {
            if i.class().is_instruction_pointer() {
                return Err(invalid(alloc::format!("{} cannot be an index register", i)));
            }
            if !i.class().is_general() {
                return Err(invalid(alloc::format!(
                    "index register {} is not a general-purpose register",
                    i
                )));
            }
        }
        if let (Some(b), Some(i)) = (base, index) {
            if b.bits() != i.bits() {
                return Err(invalid(alloc::format!(
                    "base {} and index {} differ in width",
                    b,
                    i
                )));
            }
            if (b.is_high_byte() && i.requires_rex()) || (i.is_high_byte() && b.requires_rex()) {
                return Err(invalid(alloc::format!(
                    "{} and {} cannot share an instruction",
                    b,
                    i
                )));
            }
        }
        if index.is_none() && scale != Scale::X1 {
            return Err(invalid(alloc::format!(
                "scale {} without an index register",
                scale.factor()
            )));
        }
        let disp = match disp_size {
            DispSize::None if disp != 0 => {
                return Err(invalid(alloc::format!(
                    "displacement {:#x} needs a width",
                    disp
                )))
            }
            DispSize::None => 0,
            DispSize::Byte if (-0x80..=0xFF).contains(&disp) => i64::from(disp as u8 as i8),
            DispSize::Dword if (-0x8000_0000..=0xFFFF_FFFF).contains(&disp) => {
                i64::from(disp as u32 as i32)
            }
            _ => {
                return Err(invalid(alloc::format!(
                    "displacement {:#x} does not fit in {} bits",
                    disp,
                    disp_size.bits()
                )))
            }
        };
        Ok(Self {
            base,
            index,
            scale,
            disp,
            disp_size,
            size,
            segment: None,
        })
    }

    /// `[base]` with no displacement.
    pub fn base(base: Register, size: OperandSize) -> Result<Self, EncodeError> {
        Self::new(Some(base), None, Scale::X1, 0, DispSize::None, size)
    }

    /// `[rip + disp32]`.
    pub fn rip(disp: i64, size: OperandSize) -> Result<Self, EncodeError> {
        Self::new(Some(Register::RIP), None, Scale::X1, disp, DispSize::Dword, size)
    }

    /// Attach a segment override.
    pub fn with_segment(mut self, segment: Register) -> Result<Self, EncodeError> {
        if segment.class() != RegisterClass::Segment || segment.index() > 5 {
            return Err(invalid(alloc::format!(
                "{} is not a segment register",
                segment
            )));
        }
        self.segment = Some(segment);
        Ok(self)
    }

    /// Base register, if any.
    pub const fn base_register(&self) -> Option<Register> {
        self.base
    }

    /// Index register, if any.
    pub const fn index_register(&self) -> Option<Register> {
        self.index
    }

    /// Index scale.
    pub const fn scale(&self) -> Scale {
        self.scale
    }

    /// Sign-extended displacement.
    pub const fn disp(&self) -> i64 {
        self.disp
    }

    /// Displacement width.
    pub const fn disp_size(&self) -> DispSize {
        self.disp_size
    }

    /// Declared operand size of the access.
    pub const fn size(&self) -> OperandSize {
        self.size
    }

    /// Segment override, if any.
    pub const fn segment(&self) -> Option<Register> {
        self.segment
    }

    /// Width of the address computation: base, else index, else none.
    pub fn address_bits(&self) -> Option<u16> {
        self.base.or(self.index).map(Register::bits)
    }
}

fn invalid(detail: alloc::string::String) -> EncodeError {
    EncodeError::InvalidOperand { detail }
}

/// Unvalidated mirror of [`MemoryOperand`] used for deserialization.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct MemoryParts {
    base: Option<Register>,
    index: Option<Register>,
    scale: Scale,
    disp: i64,
    disp_size: DispSize,
    size: OperandSize,
    segment: Option<Register>,
}

#[cfg(feature = "serde")]
impl TryFrom<MemoryParts> for MemoryOperand {
    type Error = EncodeError;

    fn try_from(p: MemoryParts) -> Result<Self, Self::Error> {
        let mem = MemoryOperand::new(p.base, p.index, p.scale, p.disp, p.disp_size, p.size)?;
        match p.segment {
            Some(seg) => mem.with_segment(seg),
            None => Ok(mem),
        }
    }
}

impl fmt::Display for MemoryOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ptr ", self.size)?;
        if let Some(seg) = self.segment {
            write!(f, "{}:", seg)?;
        }
        f.write_str("[")?;
        let mut first = true;
        if let Some(b) = self.base {
            write!(f, "{}", b)?;
            first = false;
        }
        if let Some(i) = self.index {
            if !first {
                f.write_str("+")?;
            }
            write!(f, "{}*{}", i, self.scale.factor())?;
            first = false;
        }
        if self.disp_size != DispSize::None || first {
            if first {
                write!(f, "{:#x}", self.disp)?;
            } else if self.disp < 0 {
                write!(f, "-{:#x}", self.disp.unsigned_abs())?;
            } else {
                write!(f, "+{:#x}", self.disp)?;
            }
        }
        f.write_str("]")
    }
}

// ─── Immediates ─────────────────────────────────────────────────────────

/// An immediate operand, masked to its declared width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "ImmediateParts"))]
pub struct Immediate {
    value: u64,
    size: OperandSize,
}

impl Immediate {
    /// Build an immediate of 8, 16, 32 or 64 bits; `value` is masked.
    pub fn new(value: u64, size: OperandSize) -> Result<Self, EncodeError> {
        let mask = match size {
            OperandSize::Byte => 0xFF,
            OperandSize::Word => 0xFFFF,
            OperandSize::Dword => 0xFFFF_FFFF,
            OperandSize::Qword => u64::MAX,
            other => {
                return Err(EncodeError::UnsupportedWidth {
                    what: WidthOf::Immediate,
                    bits: other.bits(),
                })
            }
        };
        Ok(Self {
            value: value & mask,
            size,
        })
    }

    /// Signed convenience constructor; two's complement then masked.
    pub fn signed(value: i64, size: OperandSize) -> Result<Self, EncodeError> {
        Self::new(value as u64, size)
    }

    /// Masked payload.
    pub const fn value(&self) -> u64 {
        self.value
    }

    /// Declared width.
    pub const fn size(&self) -> OperandSize {
        self.size
    }

    /// Payload sign-extended from its declared width.
    pub const fn as_signed(&self) -> i64 {
        match self.size {
            OperandSize::Byte => self.value as u8 as i8 as i64,
            OperandSize::Word => self.value as u16 as i16 as i64,
            OperandSize::Dword => self.value as u32 as i32 as i64,
            _ => self.value as i64,
        }
    }
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct ImmediateParts {
    value: u64,
    size: OperandSize,
}

#[cfg(feature = "serde")]
impl TryFrom<ImmediateParts> for Immediate {
    type Error = EncodeError;

    fn try_from(p: ImmediateParts) -> Result<Self, Self::Error> {
        let imm = Immediate::new(p.value, p.size)?;
        if imm.value != p.value {
            return Err(invalid(alloc::format!(
                "immediate {:#x} exceeds {} bits",
                p.value,
                p.size.bits()
            )));
        }
        Ok(imm)
    }
}

impl fmt::Display for Immediate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.value)
    }
}

// ─── Arguments ──────────────────────────────────────────────────────────

/// One instruction argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Argument {
    /// Empty slot.
    #[default]
    None,
    /// Register operand.
    Register(Register),
    /// Memory operand.
    Memory(MemoryOperand),
    /// Immediate operand.
    Immediate(Immediate),
}

impl Argument {
    /// Width of whichever variant is active.
    pub fn size(&self) -> Option<OperandSize> {
        match self {
            Argument::None => None,
            Argument::Register(r) => Some(r.size()),
            Argument::Memory(m) => Some(m.size()),
            Argument::Immediate(i) => Some(i.size()),
        }
    }

    /// Shorthand for an immediate argument.
    pub fn imm(value: u64, size: OperandSize) -> Result<Self, EncodeError> {
        Immediate::new(value, size).map(Argument::Immediate)
    }

    /// The register, if this is a register argument.
    pub fn as_register(&self) -> Option<Register> {
        match self {
            Argument::Register(r) => Some(*r),
            _ => None,
        }
    }

    /// The memory operand, if this is a memory argument.
    pub fn as_memory(&self) -> Option<&MemoryOperand> {
        match self {
            Argument::Memory(m) => Some(m),
            _ => None,
        }
    }

    /// The immediate, if this is an immediate argument.
    pub fn as_immediate(&self) -> Option<Immediate> {
        match self {
            Argument::Immediate(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<Register> for Argument {
    fn from(r: Register) -> Self {
        Argument::Register(r)
    }
}

impl From<MemoryOperand> for Argument {
    fn from(m: MemoryOperand) -> Self {
        Argument::Memory(m)
    }
}

impl From<Immediate> for Argument {
    fn from(i: Immediate) -> Self {
        Argument::Immediate(i)
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::None => f.write_str("<none>"),
            Argument::Register(r) => write!(f, "{}", r),
            Argument::Memory(m) => write!(f, "{}", m),
            Argument::Immediate(i) => write!(f, "{}", i),
        }
    }
}

// ─── Mnemonics ──────────────────────────────────────────────────────────

macro_rules! mnemonics {
    ($($variant:ident => $text:literal),* $(,)?) => {
        /// Closed set of operations the encoder knows.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub enum Mnemonic {
            $(
                #[allow(missing_docs)]
                $variant,
            )*
        }

        impl Mnemonic {
            /// Every mnemonic, in declaration order.
            pub const ALL: &'static [Mnemonic] = &[$(Mnemonic::$variant),*];

            /// Lower-case Intel name.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Mnemonic::$variant => $text,)*
                }
            }
        }

        impl FromStr for Mnemonic {
            type Err = EncodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($text) {
                        return Ok(Mnemonic::$variant);
                    }
                )*
                Err(EncodeError::UnknownMnemonic {
                    name: alloc::string::String::from(s),
                })
            }
        }
    };
}

mnemonics! {
    Add => "add",
    Or => "or",
    Adc => "adc",
    Sbb => "sbb",
    And => "and",
    Sub => "sub",
    Xor => "xor",
    Cmp => "cmp",
    Test => "test",
    Not => "not",
    Neg => "neg",
    Imul => "imul",
    Nop => "nop",
    Vaddps => "vaddps",
    Vaddpd => "vaddpd",
    Vsubps => "vsubps",
    Vmulps => "vmulps",
    Vandps => "vandps",
    Vorps => "vorps",
    Vxorps => "vxorps",
    Vpermilps => "vpermilps",
    Vpsllvq => "vpsllvq",
    Pfadd => "pfadd",
    Pfsub => "pfsub",
    Pfmul => "pfmul",
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Prefixes ───────────────────────────────────────────────────────────

/// Explicit instruction prefix requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Prefix {
    /// `lock` (F0).
    Lock,
    /// `rep` / `repe` (F3).
    Rep,
    /// `repne` (F2).
    Repne,
    /// Force the three-byte VEX form.
    Vex3,
}

impl Prefix {
    const fn bit(self) -> u8 {
        match self {
            Prefix::Lock => 0x01,
            Prefix::Rep => 0x02,
            Prefix::Repne => 0x04,
            Prefix::Vex3 => 0x08,
        }
    }
}

/// Set of [`Prefix`] flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrefixSet(u8);

impl PrefixSet {
    /// No prefixes.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Add a prefix.
    pub fn insert(&mut self, p: Prefix) {
        self.0 |= p.bit();
    }

    /// Whether `p` is present.
    pub const fn contains(self, p: Prefix) -> bool {
        self.0 & p.bit() != 0
    }

    /// Whether no prefix is present.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

// ─── ArgumentList: stack-allocated argument array ───────────────────────

/// Stack-allocated argument list (max 4 arguments).
///
/// One slot more than any encoding accepts, so an over-long list reaches
/// the instance builder and is rejected there with
/// [`EncodeError::Arity`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ArgumentList {
    items: [Argument; 4],
    len: u8,
}

impl ArgumentList {
    /// Maximum number of arguments.
    pub const MAX_LEN: usize = 4;

    /// Creates a new empty argument list.
    #[inline]
    pub const fn new() -> Self {
        Self {
            items: [Argument::None; 4],
            len: 0,
        }
    }

    /// Build from a slice.
    pub fn from_slice(args: &[Argument]) -> Result<Self, EncodeError> {
        let mut list = Self::new();
        for arg in args {
            list.try_push(*arg)?;
        }
        Ok(list)
    }

    /// Append an argument, failing once the list is full.
    #[inline]
    pub fn try_push(&mut self, arg: Argument) -> Result<(), EncodeError> {
        if self.len() >= Self::MAX_LEN {
            return Err(EncodeError::RoleConflict {
                detail: alloc::format!("more than {} arguments", Self::MAX_LEN),
            });
        }
        self.items[self.len as usize] = arg;
        self.len += 1;
        Ok(())
    }

    /// Returns the number of arguments.
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Returns `true` if empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the active arguments as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[Argument] {
        &self.items[..self.len as usize]
    }
}

impl core::ops::Deref for ArgumentList {
    type Target = [Argument];
    #[inline]
    fn deref(&self) -> &[Argument] {
        self.as_slice()
    }
}

impl fmt::Debug for ArgumentList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice().iter()).finish()
    }
}

impl<'a> IntoIterator for &'a ArgumentList {
    type Item = &'a Argument;
    type IntoIter = core::slice::Iter<'a, Argument>;
    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ArgumentList {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for arg in self.as_slice() {
            seq.serialize_element(arg)?;
        }
        seq.end()
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for ArgumentList {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v: alloc::vec::Vec<Argument> = alloc::vec::Vec::deserialize(deserializer)?;
        Self::from_slice(&v).map_err(serde::de::Error::custom)
    }
}

// ─── Instructions ───────────────────────────────────────────────────────

/// A mnemonic with its arguments and explicit prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instruction {
    /// Operation.
    pub mnemonic: Mnemonic,
    /// Arguments in Intel order (destination first).
    pub args: ArgumentList,
    /// Explicit prefixes.
    pub prefixes: PrefixSet,
}

impl Instruction {
    /// An instruction with no arguments.
    pub const fn new(mnemonic: Mnemonic) -> Self {
        Self {
            mnemonic,
            args: ArgumentList::new(),
            prefixes: PrefixSet::empty(),
        }
    }

    /// An instruction with the given arguments.
    pub fn with_args(mnemonic: Mnemonic, args: &[Argument]) -> Result<Self, EncodeError> {
        Ok(Self {
            mnemonic,
            args: ArgumentList::from_slice(args).map_err(|_| EncodeError::Arity {
                mnemonic,
                count: args.len(),
            })?,
            prefixes: PrefixSet::empty(),
        })
    }

    /// Add a prefix.
    pub fn prefixed(mut self, prefix: Prefix) -> Self {
        self.prefixes.insert(prefix);
        self
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefixes.contains(Prefix::Lock) {
            f.write_str("lock ")?;
        }
        if self.prefixes.contains(Prefix::Rep) {
            f.write_str("rep ")?;
        }
        if self.prefixes.contains(Prefix::Repne) {
            f.write_str("repne ")?;
        }
        if self.prefixes.contains(Prefix::Vex3) {
            f.write_str("{vex3} ")?;
        }
        write!(f, "{}", self.mnemonic)?;
        for (i, arg) in self.args.iter().enumerate() {
            f.write_str(if i == 0 { " " } else { ", " })?;
            write!(f, "{}", arg)?;
        }
        Ok(())
    }
}
