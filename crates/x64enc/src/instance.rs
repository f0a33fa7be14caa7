//! Fully resolved, not yet serialized encoding of one instruction.
//!
//! An [`Instance`] is what the builders produce and what the serializer
//! consumes. It holds every field of the final byte sequence as typed
//! values, so tests can assert on individual bits instead of raw bytes.

use crate::ir::Register;
use crate::schema::{Opcode, VexMap, VexPp};

// ─── Legacy prefixes ────────────────────────────────────────────────────

/// Legacy group-1 prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LockRep {
    /// `F0`
    Lock,
    /// `F2`
    Repne,
    /// `F3`
    Rep,
}

impl LockRep {
    /// Prefix byte.
    pub const fn byte(self) -> u8 {
        match self {
            LockRep::Lock => 0xF0,
            LockRep::Repne => 0xF2,
            LockRep::Rep => 0xF3,
        }
    }
}

/// Segment-override prefix byte for a segment register.
pub const fn segment_prefix(seg: Register) -> u8 {
    match seg.index() {
        0 => 0x26, // ES
        1 => 0x2E, // CS
        2 => 0x36, // SS
        3 => 0x3E, // DS
        4 => 0x64, // FS
        _ => 0x65, // GS
    }
}

/// REX prefix flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rex {
    /// Emit the byte even when no flag is set (`spl`..`dil`).
    pub present: bool,
    /// 64-bit operand size.
    pub w: bool,
    /// Extension of ModR/M.reg.
    pub r: bool,
    /// Extension of SIB.index.
    pub x: bool,
    /// Extension of ModR/M.rm or SIB.base.
    pub b: bool,
}

impl Rex {
    /// Whether the byte is emitted.
    pub const fn is_required(&self) -> bool {
        self.present || self.w || self.r || self.x || self.b
    }

    /// `0100WRXB`.
    pub const fn byte(&self) -> u8 {
        0x40 | (self.w as u8) << 3 | (self.r as u8) << 2 | (self.x as u8) << 1 | self.b as u8
    }
}

/// The four legacy prefix groups plus REX.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LegacyPrefixes {
    /// Group 1: lock / rep family.
    pub group1: Option<LockRep>,
    /// Group 2: segment override.
    pub segment: Option<Register>,
    /// Group 3: `66` operand-size override.
    pub operand_size: bool,
    /// Group 4: `67` address-size override.
    pub address_size: bool,
    /// REX flags.
    pub rex: Rex,
}

// ─── VEX prefix ─────────────────────────────────────────────────────────

/// VEX prefix fields, stored un-inverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VexPrefix {
    /// Extension of ModR/M.reg.
    pub r: bool,
    /// Extension of SIB.index.
    pub x: bool,
    /// Extension of ModR/M.rm or SIB.base.
    pub b: bool,
    /// VEX.W.
    pub w: bool,
    /// Opcode map.
    pub map: VexMap,
    /// Extra source register number (0..=15).
    pub vvvv: u8,
    /// 256-bit vector length.
    pub l: bool,
    /// Implied mandatory prefix.
    pub pp: VexPp,
    /// Always use the three-byte form.
    pub force_long: bool,
}

impl VexPrefix {
    /// The two-byte `C5` form can express this prefix.
    pub fn is_two_byte(&self) -> bool {
        !self.x && !self.b && !self.w && self.map == VexMap::Map0F && !self.force_long
    }
}

// ─── ModR/M, SIB, fields ────────────────────────────────────────────────

/// ModR/M byte fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModRm {
    /// Addressing mode, 2 bits.
    pub mode: u8,
    /// Register or opcode extension, 3 bits.
    pub reg: u8,
    /// Register or memory form, 3 bits.
    pub rm: u8,
}

impl ModRm {
    /// `rm` value that escapes to a SIB byte.
    pub const SIB_ESCAPE: u8 = 0b100;
    /// `rm` (and SIB.base) value that escapes to RIP/disp32.
    pub const DISP_ESCAPE: u8 = 0b101;
    /// Register-direct mode.
    pub const DIRECT: u8 = 0b11;

    /// Build from fields; each is masked to its width.
    pub const fn new(mode: u8, reg: u8, rm: u8) -> Self {
        Self {
            mode: mode & 0x03,
            reg: reg & 0x07,
            rm: rm & 0x07,
        }
    }

    /// Packed byte. Out-of-range fields are truncated.
    pub const fn byte(&self) -> u8 {
        ((self.mode & 0x03) << 6) | ((self.reg & 0x07) << 3) | (self.rm & 0x07)
    }

    /// Every field fits its bit width.
    pub const fn is_well_formed(&self) -> bool {
        self.mode <= 0x03 && self.reg <= 0x07 && self.rm <= 0x07
    }

    /// A SIB byte follows.
    pub const fn needs_sib(&self) -> bool {
        self.mode != Self::DIRECT && self.rm == Self::SIB_ESCAPE
    }
}

/// SIB byte fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sib {
    /// Scale code, 2 bits.
    pub scale: u8,
    /// Index register low bits; `100` means no index.
    pub index: u8,
    /// Base register low bits; `101` with mode `00` means no base.
    pub base: u8,
}

impl Sib {
    /// Build from fields; each is masked to its width.
    pub const fn new(scale: u8, index: u8, base: u8) -> Self {
        Self {
            scale: scale & 0x03,
            index: index & 0x07,
            base: base & 0x07,
        }
    }

    /// Packed byte. Out-of-range fields are truncated.
    pub const fn byte(&self) -> u8 {
        ((self.scale & 0x03) << 6) | ((self.index & 0x07) << 3) | (self.base & 0x07)
    }

    /// Every field fits its bit width.
    pub const fn is_well_formed(&self) -> bool {
        self.scale <= 0x03 && self.index <= 0x07 && self.base <= 0x07
    }
}

/// A size-tagged little-endian field (displacement or immediate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Field {
    /// Absent.
    #[default]
    None,
    /// One byte.
    U8(u8),
    /// Two bytes.
    U16(u16),
    /// Four bytes.
    U32(u32),
    /// Eight bytes.
    U64(u64),
}

impl Field {
    /// Encoded length in bytes.
    pub const fn len(&self) -> usize {
        match self {
            Field::None => 0,
            Field::U8(_) => 1,
            Field::U16(_) => 2,
            Field::U32(_) => 4,
            Field::U64(_) => 8,
        }
    }

    /// Whether the field is absent.
    pub const fn is_none(&self) -> bool {
        matches!(self, Field::None)
    }
}

// ─── Instance ───────────────────────────────────────────────────────────

/// Which builder produced an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InstanceKind {
    /// Legacy / REX encoding.
    Legacy,
    /// VEX encoding.
    Vex,
    /// 3DNow! `0F 0F` encoding.
    ThreeDNow,
    /// Canonical no-op padding.
    Nop,
}

/// Prefix payload, tagged by instance kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Form {
    /// Legacy prefixes and REX.
    Legacy(LegacyPrefixes),
    /// VEX prefix in place of all legacy prefixes.
    Vex(VexPrefix),
    /// Legacy prefixes, `0F 0F` escape, opcode as suffix.
    ThreeDNow(LegacyPrefixes),
    /// Fixed no-op pattern.
    Nop(LegacyPrefixes),
}

/// A resolved instruction encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instance {
    /// Opcode bytes. A zero length marks an invalid instance.
    pub opcode: Opcode,
    /// Prefixes.
    pub form: Form,
    /// ModR/M byte.
    pub modrm: Option<ModRm>,
    /// SIB byte.
    pub sib: Option<Sib>,
    /// Displacement.
    pub disp: Field,
    /// Immediate.
    pub imm: Field,
}

impl Instance {
    /// An instance with the given opcode and prefixes and no operand bytes.
    pub const fn new(opcode: Opcode, form: Form) -> Self {
        Self {
            opcode,
            form,
            modrm: None,
            sib: None,
            disp: Field::None,
            imm: Field::None,
        }
    }

    /// The invalid instance; serializes to nothing.
    pub const fn invalid() -> Self {
        Self::new(
            Opcode::INVALID,
            Form::Legacy(LegacyPrefixes {
                group1: None,
                segment: None,
                operand_size: false,
                address_size: false,
                rex: Rex {
                    present: false,
                    w: false,
                    r: false,
                    x: false,
                    b: false,
                },
            }),
        )
    }

    /// Valid iff the opcode has at least one byte.
    pub const fn is_valid(&self) -> bool {
        self.opcode.len != 0
    }

    /// Builder kind.
    pub const fn kind(&self) -> InstanceKind {
        match self.form {
            Form::Legacy(_) => InstanceKind::Legacy,
            Form::Vex(_) => InstanceKind::Vex,
            Form::ThreeDNow(_) => InstanceKind::ThreeDNow,
            Form::Nop(_) => InstanceKind::Nop,
        }
    }

    /// Legacy prefixes, for every kind but VEX.
    pub const fn legacy_prefixes(&self) -> Option<&LegacyPrefixes> {
        match &self.form {
            Form::Legacy(p) | Form::ThreeDNow(p) | Form::Nop(p) => Some(p),
            Form::Vex(_) => None,
        }
    }

    /// VEX prefix, for VEX instances.
    pub const fn vex_prefix(&self) -> Option<&VexPrefix> {
        match &self.form {
            Form::Vex(v) => Some(v),
            _ => None,
        }
    }
}
