//! Instruction → instance dispatch and instance → bytes serialization.
//!
//! [`instantiate`] routes an instruction to the legacy, VEX, 3DNow! or
//! no-op builder. [`serialize`] walks an [`Instance`] in fixed field order:
//!
//! ```text
//! group1 · group2 · 66 · 67 · REX | VEX  opcode  ModR/M  SIB  disp  imm
//! ```

use alloc::string::String;
use alloc::vec::Vec;

use crate::buffer::CodeBuffer;
use crate::error::EncodeError;
use crate::instance::{segment_prefix, Field, Form, Instance, LegacyPrefixes, VexPrefix};
use crate::ir::{Instruction, Mnemonic};
use crate::schema::{match_schema, Encoding};
use crate::{legacy, nop, vex};

// ─── InstrBytes: stack-allocated instruction buffer ────────────────────

/// Stack-allocated instruction byte buffer. A whole instruction is
/// serialized here before any byte reaches the output buffer.
///
/// The longest instance the serializer can produce (four legacy prefixes,
/// REX, three opcode bytes, ModR/M, SIB, 64-bit displacement and 64-bit
/// immediate) is 26 bytes.
#[derive(Clone, Copy)]
pub struct InstrBytes {
    data: [u8; 32],
    len: u8,
}

impl InstrBytes {
    /// Create an empty buffer.
    #[inline]
    pub const fn new() -> Self {
        Self {
            data: [0; 32],
            len: 0,
        }
    }

    /// Append a single byte.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is already full (32 bytes).
    #[inline]
    pub fn push(&mut self, byte: u8) {
        assert!(
            (self.len as usize) < 32,
            "InstrBytes overflow: cannot push beyond 32 bytes"
        );
        self.data[self.len as usize] = byte;
        self.len += 1;
    }

    /// Append a slice of bytes.
    ///
    /// # Panics
    ///
    /// Panics if appending would exceed the 32-byte capacity.
    #[inline]
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        let start = self.len as usize;
        let end = start + bytes.len();
        assert!(
            end <= 32,
            "InstrBytes overflow: {} + {} exceeds 32-byte capacity",
            start,
            bytes.len()
        );
        self.data[start..end].copy_from_slice(bytes);
        self.len = end as u8;
    }

    /// Append a little-endian field.
    #[inline]
    fn push_field(&mut self, field: Field) {
        match field {
            Field::None => {}
            Field::U8(v) => self.push(v),
            Field::U16(v) => self.extend_from_slice(&v.to_le_bytes()),
            Field::U32(v) => self.extend_from_slice(&v.to_le_bytes()),
            Field::U64(v) => self.extend_from_slice(&v.to_le_bytes()),
        }
    }
}

impl Default for InstrBytes {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl core::ops::Deref for InstrBytes {
    type Target = [u8];
    #[inline]
    fn deref(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

impl AsRef<[u8]> for InstrBytes {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl core::fmt::Debug for InstrBytes {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl PartialEq for InstrBytes {
    fn eq(&self, other: &Self) -> bool {
        **self == **other
    }
}

impl Eq for InstrBytes {}

impl PartialEq<[u8]> for InstrBytes {
    fn eq(&self, other: &[u8]) -> bool {
        **self == *other
    }
}

impl PartialEq<Vec<u8>> for InstrBytes {
    fn eq(&self, other: &Vec<u8>) -> bool {
        **self == **other
    }
}

// ─── Dispatch ───────────────────────────────────────────────────────────

/// Resolve `instr` into an [`Instance`].
pub fn instantiate(instr: &Instruction) -> Result<Instance, EncodeError> {
    let result = if instr.mnemonic == Mnemonic::Nop {
        nop::instantiate_nop(instr)
    } else {
        match_schema(instr.mnemonic, &instr.args).and_then(|schema| match schema.encoding {
            Encoding::Legacy { order, digit } => legacy::instantiate(instr, schema, order, digit),
            Encoding::Vex { map, pp, w } => vex::instantiate_vex(instr, schema, map, pp, w),
            Encoding::ThreeDNow => vex::instantiate_3dnow(instr, schema),
        })
    };
    match &result {
        Ok(inst) => log::trace!("{} => {:?}", instr, inst),
        Err(e) => log::debug!("cannot encode `{}`: {}", instr, e),
    }
    result
}

// ─── Serialization ──────────────────────────────────────────────────────

fn internal(detail: &str) -> EncodeError {
    EncodeError::Internal {
        detail: String::from(detail),
    }
}

fn emit_legacy_prefixes(out: &mut InstrBytes, p: &LegacyPrefixes) {
    if let Some(g1) = p.group1 {
        out.push(g1.byte());
    }
    if let Some(seg) = p.segment {
        out.push(segment_prefix(seg));
    }
    if p.operand_size {
        out.push(0x66);
    }
    if p.address_size {
        out.push(0x67);
    }
    if p.rex.is_required() {
        out.push(p.rex.byte());
    }
}

/// Emit a 2-byte VEX prefix: C5 [R̄ v̄v̄v̄v̄ L pp]
fn emit_vex2(out: &mut InstrBytes, v: &VexPrefix) {
    let byte1 = (if v.r { 0 } else { 0x80 })
        | (((!v.vvvv) & 0x0F) << 3)
        | (if v.l { 0x04 } else { 0 })
        | v.pp.bits();
    out.push(0xC5);
    out.push(byte1);
}

/// Emit a 3-byte VEX prefix: C4 [R̄ X̄ B̄ mmmmm] [W v̄v̄v̄v̄ L pp]
fn emit_vex3(out: &mut InstrBytes, v: &VexPrefix) {
    let byte1 = (if v.r { 0 } else { 0x80 })
        | (if v.x { 0 } else { 0x40 })
        | (if v.b { 0 } else { 0x20 })
        | v.map.mmmmm();
    let byte2 = (if v.w { 0x80 } else { 0 })
        | (((!v.vvvv) & 0x0F) << 3)
        | (if v.l { 0x04 } else { 0 })
        | v.pp.bits();
    out.push(0xC4);
    out.push(byte1);
    out.push(byte2);
}

fn emit_opcode(out: &mut InstrBytes, inst: &Instance) {
    for i in 0..inst.opcode.len {
        if let Some(b) = inst.opcode.byte(i) {
            out.push(b);
        }
    }
}

fn emit_operand_bytes(out: &mut InstrBytes, inst: &Instance) -> Result<(), EncodeError> {
    if let Some(modrm) = inst.modrm {
        if !modrm.is_well_formed() {
            return Err(internal("ModR/M field out of range"));
        }
        if inst.sib.map_or(false, |sib| !sib.is_well_formed()) {
            return Err(internal("SIB field out of range"));
        }
        out.push(modrm.byte());
        match (modrm.needs_sib(), inst.sib) {
            (true, Some(sib)) => out.push(sib.byte()),
            (false, None) => {}
            (true, None) => return Err(internal("ModR/M selects a SIB byte but none is present")),
            (false, Some(_)) => return Err(internal("SIB byte present but ModR/M does not select it")),
        }
    } else if inst.sib.is_some() || !inst.disp.is_none() {
        return Err(internal("SIB or displacement without a ModR/M byte"));
    }
    out.push_field(inst.disp);
    Ok(())
}

/// Serialize `inst` into a stack buffer.
///
/// An invalid instance yields an empty buffer.
pub fn serialize(inst: &Instance) -> Result<InstrBytes, EncodeError> {
    let mut out = InstrBytes::new();
    if !inst.is_valid() {
        return Ok(out);
    }
    if inst.opcode.len > 3 {
        return Err(internal("opcode longer than three bytes"));
    }
    match &inst.form {
        Form::Legacy(p) | Form::Nop(p) => {
            emit_legacy_prefixes(&mut out, p);
            emit_opcode(&mut out, inst);
            emit_operand_bytes(&mut out, inst)?;
            out.push_field(inst.imm);
        }
        Form::Vex(v) => {
            if v.is_two_byte() {
                emit_vex2(&mut out, v);
            } else {
                emit_vex3(&mut out, v);
            }
            emit_opcode(&mut out, inst);
            emit_operand_bytes(&mut out, inst)?;
            out.push_field(inst.imm);
        }
        Form::ThreeDNow(p) => {
            if inst.modrm.is_none() {
                return Err(internal("3DNow! instance without ModR/M"));
            }
            emit_legacy_prefixes(&mut out, p);
            out.extend_from_slice(&[0x0F, 0x0F]);
            emit_operand_bytes(&mut out, inst)?;
            emit_opcode(&mut out, inst);
        }
    }
    Ok(out)
}

/// Append the bytes of `inst` to `buf`, returning the number written.
///
/// Nothing is written when the instance is invalid or does not fit.
pub fn write_instance(inst: &Instance, buf: &mut CodeBuffer) -> Result<usize, EncodeError> {
    let bytes = serialize(inst)?;
    buf.write_bytes(&bytes)?;
    Ok(bytes.len())
}

/// Encode one instruction to a fresh byte vector.
pub fn encode(instr: &Instruction) -> Result<Vec<u8>, EncodeError> {
    let inst = instantiate(instr)?;
    Ok(serialize(&inst)?.to_vec())
}

/// Encode one instruction and append it to `buf`.
pub fn encode_into(instr: &Instruction, buf: &mut CodeBuffer) -> Result<usize, EncodeError> {
    let inst = instantiate(instr)?;
    write_instance(&inst, buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{ModRm, Rex, Sib};
    use crate::ir::{mm, xmm, ymm, Argument, MemoryOperand, OperandSize, Prefix, Register};
    use crate::schema::{Opcode, VexMap, VexPp};
    use alloc::vec;

    fn enc(m: Mnemonic, args: Vec<Argument>) -> Vec<u8> {
        encode(&Instruction::with_args(m, &args).unwrap()).unwrap()
    }

    fn imm(v: u64, size: OperandSize) -> Argument {
        Argument::imm(v, size).unwrap()
    }

    fn nop(n: u64) -> Vec<u8> {
        enc(Mnemonic::Nop, vec![imm(n, OperandSize::Byte)])
    }

    // ── end-to-end vectors ──

    #[test]
    fn nop_padding_1_to_3() {
        assert_eq!(nop(1), vec![0x90]);
        assert_eq!(nop(2), vec![0x66, 0x90]);
        assert_eq!(nop(3), vec![0x0F, 0x1F, 0x00]);
    }

    #[test]
    fn nop_padding_4_to_9() {
        assert_eq!(nop(4), vec![0x0F, 0x1F, 0x40, 0x00]);
        assert_eq!(nop(5), vec![0x0F, 0x1F, 0x44, 0x00, 0x00]);
        assert_eq!(nop(6), vec![0x66, 0x0F, 0x1F, 0x44, 0x00, 0x00]);
        assert_eq!(nop(7), vec![0x0F, 0x1F, 0x80, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(nop(8), vec![0x0F, 0x1F, 0x84, 0x00, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(
            nop(9),
            vec![0x66, 0x0F, 0x1F, 0x84, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
        for n in 1..=9 {
            assert_eq!(nop(n).len() as u64, n);
        }
    }

    #[test]
    fn add_accumulator_forms() {
        assert_eq!(
            enc(Mnemonic::Add, vec![Register::AL.into(), imm(0xFF, OperandSize::Byte)]),
            vec![0x04, 0xFF]
        );
        assert_eq!(
            enc(Mnemonic::Add, vec![Register::AX.into(), imm(0xFFFF, OperandSize::Word)]),
            vec![0x66, 0x05, 0xFF, 0xFF]
        );
        assert_eq!(
            enc(Mnemonic::Add, vec![Register::EAX.into(), imm(0xFFFF_FFFF, OperandSize::Dword)]),
            vec![0x05, 0xFF, 0xFF, 0xFF, 0xFF]
        );
        assert_eq!(
            enc(Mnemonic::Add, vec![Register::RAX.into(), imm(0xFFFF_FFFF, OperandSize::Dword)]),
            vec![0x48, 0x05, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn add_rip_relative_imm32() {
        let mem = MemoryOperand::rip(0xFFFF_FFFF, OperandSize::Qword).unwrap();
        assert_eq!(
            enc(Mnemonic::Add, vec![mem.into(), imm(0xFFFF_FFFF, OperandSize::Dword)]),
            vec![0x48, 0x81, 0x05, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn add_byte_registers() {
        assert_eq!(
            enc(Mnemonic::Add, vec![Register::DL.into(), imm(0xFF, OperandSize::Byte)]),
            vec![0x80, 0xC2, 0xFF]
        );
        assert_eq!(
            enc(Mnemonic::Add, vec![Register::R8B.into(), imm(0xFF, OperandSize::Byte)]),
            vec![0x41, 0x80, 0xC0, 0xFF]
        );
        assert_eq!(
            enc(Mnemonic::Add, vec![Register::SPL.into(), imm(0xFF, OperandSize::Byte)]),
            vec![0x40, 0x80, 0xC4, 0xFF]
        );
    }

    #[test]
    fn add_memory_register() {
        let mem = MemoryOperand::base(Register::RAX, OperandSize::Byte).unwrap();
        assert_eq!(enc(Mnemonic::Add, vec![mem.into(), Register::AL.into()]), vec![0x00, 0x00]);
    }

    #[test]
    fn vex_vectors() {
        let x = |a, b, c| vec![Argument::from(xmm(a)), xmm(b).into(), xmm(c).into()];
        assert_eq!(enc(Mnemonic::Vaddps, x(0, 1, 2)), vec![0xC5, 0xF0, 0x58, 0xC2]);
        assert_eq!(enc(Mnemonic::Vaddpd, x(0, 1, 2)), vec![0xC5, 0xF1, 0x58, 0xC2]);
        assert_eq!(
            enc(Mnemonic::Vaddps, vec![ymm(0).into(), ymm(1).into(), ymm(2).into()]),
            vec![0xC5, 0xF4, 0x58, 0xC2]
        );
        assert_eq!(enc(Mnemonic::Vxorps, x(8, 9, 10)), vec![0xC4, 0x41, 0x30, 0x57, 0xC2]);
        assert_eq!(enc(Mnemonic::Vpermilps, x(0, 1, 2)), vec![0xC4, 0xE2, 0x71, 0x0C, 0xC2]);
        assert_eq!(enc(Mnemonic::Vpsllvq, x(0, 1, 2)), vec![0xC4, 0xE2, 0xF1, 0x47, 0xC2]);
    }

    #[test]
    fn vex_memory_source() {
        let mem = MemoryOperand::base(Register::RAX, OperandSize::Xmmword).unwrap();
        assert_eq!(
            enc(Mnemonic::Vxorps, vec![xmm(0).into(), xmm(1).into(), mem.into()]),
            vec![0xC5, 0xF0, 0x57, 0x00]
        );
    }

    #[test]
    fn vex3_forced() {
        let instr = Instruction::with_args(
            Mnemonic::Vaddps,
            &[xmm(0).into(), xmm(1).into(), xmm(2).into()],
        )
        .unwrap()
        .prefixed(Prefix::Vex3);
        assert_eq!(encode(&instr).unwrap(), vec![0xC4, 0xE1, 0x70, 0x58, 0xC2]);
    }

    #[test]
    fn three_dnow_layout() {
        assert_eq!(
            enc(Mnemonic::Pfadd, vec![mm(0).into(), mm(1).into()]),
            vec![0x0F, 0x0F, 0xC1, 0x9E]
        );
        let mem = MemoryOperand::new(
            Some(Register::RBX),
            None,
            crate::ir::Scale::X1,
            0x10,
            crate::ir::DispSize::Byte,
            OperandSize::Qword,
        )
        .unwrap();
        assert_eq!(
            enc(Mnemonic::Pfmul, vec![mm(3).into(), mem.into()]),
            vec![0x0F, 0x0F, 0x5B, 0x10, 0xB4]
        );
    }

    // ── serializer ──

    #[test]
    fn invalid_instance_writes_nothing() {
        let mut buf = CodeBuffer::with_capacity(16);
        assert_eq!(write_instance(&Instance::invalid(), &mut buf), Ok(0));
        assert_eq!(buf.position(), 0);
    }

    #[test]
    fn prefix_order() {
        let mut inst = Instance::new(
            Opcode::one(0x01),
            Form::Legacy(LegacyPrefixes {
                group1: Some(crate::instance::LockRep::Lock),
                segment: Some(Register::FS),
                operand_size: true,
                address_size: true,
                rex: Rex {
                    b: true,
                    ..Rex::default()
                },
            }),
        );
        inst.modrm = Some(ModRm::new(0, 0, 0));
        assert_eq!(
            serialize(&inst).unwrap(),
            vec![0xF0, 0x64, 0x66, 0x67, 0x41, 0x01, 0x00]
        );
    }

    #[test]
    fn multi_byte_opcode_msb_first() {
        let inst = Instance::new(Opcode::three(0x0F, 0x38, 0xF0), Form::Legacy(LegacyPrefixes::default()));
        assert_eq!(serialize(&inst).unwrap(), vec![0x0F, 0x38, 0xF0]);
    }

    #[test]
    fn disp_and_imm_little_endian() {
        let mut inst = Instance::new(Opcode::one(0xC7), Form::Legacy(LegacyPrefixes::default()));
        inst.modrm = Some(ModRm::new(0b10, 0, 0));
        inst.disp = Field::U32(0x1122_3344);
        inst.imm = Field::U16(0xAABB);
        assert_eq!(
            serialize(&inst).unwrap(),
            vec![0xC7, 0x80, 0x44, 0x33, 0x22, 0x11, 0xBB, 0xAA]
        );
    }

    #[test]
    fn sib_without_escape_is_internal_error() {
        let mut inst = Instance::new(Opcode::one(0x01), Form::Legacy(LegacyPrefixes::default()));
        inst.modrm = Some(ModRm::new(0, 0, 0));
        inst.sib = Some(Sib::new(0, 0, 0));
        assert!(matches!(serialize(&inst), Err(EncodeError::Internal { .. })));
        inst.modrm = Some(ModRm::new(0, 0, 4));
        inst.sib = None;
        assert!(matches!(serialize(&inst), Err(EncodeError::Internal { .. })));
    }

    #[test]
    fn out_of_range_fields_are_internal_errors() {
        let mut inst = Instance::new(Opcode::one(0x01), Form::Legacy(LegacyPrefixes::default()));
        inst.modrm = Some(ModRm { mode: 0, reg: 9, rm: 0 });
        assert!(matches!(serialize(&inst), Err(EncodeError::Internal { .. })));
        inst.modrm = Some(ModRm::new(0, 0, 4));
        inst.sib = Some(Sib { scale: 0, index: 4, base: 8 });
        assert!(matches!(serialize(&inst), Err(EncodeError::Internal { .. })));
        inst.sib = Some(Sib::new(0, 4, 0));
        assert_eq!(serialize(&inst).unwrap(), vec![0x01, 0x04, 0x20]);
    }

    #[test]
    fn vex_prefix_selection() {
        let mut v = VexPrefix {
            r: false,
            x: false,
            b: false,
            w: false,
            map: VexMap::Map0F,
            vvvv: 0,
            l: false,
            pp: VexPp::None,
            force_long: false,
        };
        let mut out = InstrBytes::new();
        emit_vex2(&mut out, &v);
        assert_eq!(out, vec![0xC5, 0xF8]);
        v.map = VexMap::Map0F3A;
        v.w = true;
        let mut out = InstrBytes::new();
        emit_vex3(&mut out, &v);
        assert_eq!(out, vec![0xC4, 0xE3, 0xF8]);
    }

    #[test]
    fn full_buffer_leaves_cursor() {
        let mut buf = CodeBuffer::with_capacity(4);
        let mem = MemoryOperand::rip(0, OperandSize::Qword).unwrap();
        let instr = Instruction::with_args(Mnemonic::Add, &[mem.into(), imm(1, OperandSize::Dword)]).unwrap();
        assert!(matches!(
            encode_into(&instr, &mut buf),
            Err(EncodeError::BufferFull { needed: 11, remaining: 4 })
        ));
        assert_eq!(buf.position(), 0);
    }
}
