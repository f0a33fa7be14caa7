//! VEX and 3DNow! instance builders.

use alloc::format;

use crate::addressing::{encode_memory, needs_address_override};
use crate::error::{EncodeError, WidthOf};
use crate::instance::{Form, Instance, LegacyPrefixes, ModRm, VexPrefix};
use crate::ir::{Argument, Instruction, Prefix, Register, RegisterClass};
use crate::legacy::group1;
use crate::schema::{Schema, VexMap, VexPp};

fn conflict(detail: alloc::string::String) -> EncodeError {
    EncodeError::RoleConflict { detail }
}

fn register_arg(instr: &Instruction, i: usize) -> Result<Register, EncodeError> {
    match instr.args.get(i) {
        Some(Argument::Register(r)) => Ok(*r),
        Some(other) => Err(conflict(format!(
            "operand {} of {} must be a register, got {}",
            i + 1,
            instr.mnemonic,
            other
        ))),
        None => Err(EncodeError::Arity {
            mnemonic: instr.mnemonic,
            count: instr.args.len(),
        }),
    }
}

// ─── VEX ────────────────────────────────────────────────────────────────

/// Build a VEX instance: `dest, src1, src2/mem`.
///
/// `dest` goes to ModR/M.reg, `src1` to VEX.vvvv, `src2` to ModR/M.rm.
pub(crate) fn instantiate_vex(
    instr: &Instruction,
    schema: &Schema,
    map: VexMap,
    pp: VexPp,
    w: bool,
) -> Result<Instance, EncodeError> {
    if instr.args.len() != 3 {
        return Err(EncodeError::Arity {
            mnemonic: instr.mnemonic,
            count: instr.args.len(),
        });
    }
    for p in [Prefix::Lock, Prefix::Rep, Prefix::Repne] {
        if instr.prefixes.contains(p) {
            return Err(conflict(format!("{:?} prefix cannot precede a VEX prefix", p)));
        }
    }

    let dest = register_arg(instr, 0)?;
    let src1 = register_arg(instr, 1)?;

    let mut vex = VexPrefix {
        r: dest.is_extended(),
        x: false,
        b: false,
        w,
        map,
        vvvv: src1.index(),
        l: dest.class() == RegisterClass::Ymm,
        pp,
        force_long: instr.prefixes.contains(Prefix::Vex3),
    };
    let mut inst = Instance::new(schema.opcode, Form::Vex(vex));

    match instr.args[2] {
        Argument::Register(r) => {
            vex.b = r.is_extended();
            inst.modrm = Some(ModRm::new(ModRm::DIRECT, dest.low_bits(), r.low_bits()));
        }
        Argument::Memory(mem) => {
            if mem.segment().is_some() {
                return Err(conflict(format!(
                    "segment override on {} is not supported with VEX",
                    mem
                )));
            }
            if needs_address_override(&mem)? {
                return Err(EncodeError::UnsupportedWidth {
                    what: WidthOf::Address,
                    bits: 32,
                });
            }
            let enc = encode_memory(&mem, dest.low_bits())?;
            vex.x = enc.x;
            vex.b = enc.b;
            inst.modrm = Some(enc.modrm);
            inst.sib = enc.sib;
            inst.disp = enc.disp;
        }
        other => {
            return Err(conflict(format!(
                "operand 3 of {} must be a register or memory, got {}",
                instr.mnemonic, other
            )))
        }
    }

    inst.form = Form::Vex(vex);
    Ok(inst)
}

// ─── 3DNow! ─────────────────────────────────────────────────────────────

/// MMX has no extension bit; `mm8`..`mm15` do not exist.
fn mmx_register(r: Register) -> Result<Register, EncodeError> {
    if r.index() > RegisterClass::Mmx.max_index() {
        return Err(EncodeError::InvalidOperand {
            detail: format!("mm{} is not an MMX register", r.index()),
        });
    }
    Ok(r)
}

/// Build a 3DNow! instance: `mm, mm/m64`, opcode emitted as suffix.
pub(crate) fn instantiate_3dnow(instr: &Instruction, schema: &Schema) -> Result<Instance, EncodeError> {
    if instr.args.len() != 2 {
        return Err(EncodeError::Arity {
            mnemonic: instr.mnemonic,
            count: instr.args.len(),
        });
    }
    let mut prefixes = LegacyPrefixes {
        group1: group1(instr.prefixes)?,
        ..LegacyPrefixes::default()
    };
    if prefixes.group1.is_some() {
        return Err(conflict(format!("{} takes no lock/rep prefix", instr.mnemonic)));
    }

    let dest = mmx_register(register_arg(instr, 0)?)?;
    let mut inst = Instance::new(schema.opcode, Form::ThreeDNow(prefixes));

    match instr.args[1] {
        Argument::Register(r) => {
            let r = mmx_register(r)?;
            inst.modrm = Some(ModRm::new(ModRm::DIRECT, dest.low_bits(), r.low_bits()));
        }
        Argument::Memory(mem) => {
            prefixes.address_size = needs_address_override(&mem)?;
            prefixes.segment = mem.segment();
            let enc = encode_memory(&mem, dest.low_bits())?;
            prefixes.rex.x = enc.x;
            prefixes.rex.b = enc.b;
            inst.modrm = Some(enc.modrm);
            inst.sib = enc.sib;
            inst.disp = enc.disp;
        }
        other => {
            return Err(conflict(format!(
                "operand 2 of {} must be a register or memory, got {}",
                instr.mnemonic, other
            )))
        }
    }

    inst.form = Form::ThreeDNow(prefixes);
    Ok(inst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Sib;
    use crate::ir::{mm, xmm, ymm, DispSize, MemoryOperand, Mnemonic, OperandSize, Scale};
    use crate::schema::{match_schema, Encoding};

    fn build(instr: &Instruction) -> Result<Instance, EncodeError> {
        let schema = match_schema(instr.mnemonic, &instr.args)?;
        match schema.encoding {
            Encoding::Vex { map, pp, w } => instantiate_vex(instr, schema, map, pp, w),
            Encoding::ThreeDNow => instantiate_3dnow(instr, schema),
            Encoding::Legacy { .. } => panic!("legacy schema"),
        }
    }

    fn instr(m: Mnemonic, args: &[Argument]) -> Instruction {
        Instruction::with_args(m, args).unwrap()
    }

    #[test]
    fn vex_register_roles() {
        let inst = build(&instr(
            Mnemonic::Vaddps,
            &[xmm(0).into(), xmm(1).into(), xmm(2).into()],
        ))
        .unwrap();
        let vex = inst.vex_prefix().unwrap();
        assert_eq!(vex.vvvv, 1);
        assert!(!vex.r && !vex.b && !vex.l);
        assert!(vex.is_two_byte());
        assert_eq!(inst.modrm, Some(ModRm::new(0b11, 0, 2)));
    }

    #[test]
    fn vex_ymm_sets_l() {
        let inst = build(&instr(
            Mnemonic::Vmulps,
            &[ymm(3).into(), ymm(4).into(), ymm(5).into()],
        ))
        .unwrap();
        assert!(inst.vex_prefix().unwrap().l);
    }

    #[test]
    fn vex_extended_registers() {
        let inst = build(&instr(
            Mnemonic::Vxorps,
            &[xmm(8).into(), xmm(9).into(), xmm(10).into()],
        ))
        .unwrap();
        let vex = inst.vex_prefix().unwrap();
        assert!(vex.r && vex.b && !vex.x);
        assert_eq!(vex.vvvv, 9);
        assert!(!vex.is_two_byte());
    }

    #[test]
    fn vex_memory_operand() {
        let mem = MemoryOperand::new(
            Some(Register::RAX),
            Some(Register::R9),
            Scale::X8,
            0x20,
            DispSize::Byte,
            OperandSize::Xmmword,
        )
        .unwrap();
        let inst = build(&instr(Mnemonic::Vandps, &[xmm(1).into(), xmm(2).into(), mem.into()])).unwrap();
        let vex = inst.vex_prefix().unwrap();
        assert!(vex.x && !vex.b);
        assert_eq!(inst.sib, Some(Sib::new(0b11, 1, 0)));
    }

    #[test]
    fn vex_rejects_legacy_prefixes() {
        let i = instr(Mnemonic::Vaddps, &[xmm(0).into(), xmm(1).into(), xmm(2).into()])
            .prefixed(Prefix::Lock);
        assert!(matches!(build(&i), Err(EncodeError::RoleConflict { .. })));
    }

    #[test]
    fn vex_rejects_32bit_addressing() {
        let mem = MemoryOperand::base(Register::EAX, OperandSize::Xmmword).unwrap();
        let i = instr(Mnemonic::Vaddps, &[xmm(0).into(), xmm(1).into(), mem.into()]);
        assert!(matches!(build(&i), Err(EncodeError::UnsupportedWidth { .. })));
    }

    #[test]
    fn vex3_override() {
        let i = instr(Mnemonic::Vaddps, &[xmm(0).into(), xmm(1).into(), xmm(2).into()])
            .prefixed(Prefix::Vex3);
        let inst = build(&i).unwrap();
        assert!(inst.vex_prefix().unwrap().force_long);
        assert!(!inst.vex_prefix().unwrap().is_two_byte());
    }

    #[test]
    fn three_dnow_register_form() {
        let inst = build(&instr(Mnemonic::Pfadd, &[mm(0).into(), mm(1).into()])).unwrap();
        assert_eq!(inst.modrm, Some(ModRm::new(0b11, 0, 1)));
        assert_eq!(inst.opcode.value, 0x9E);
    }

    #[test]
    fn three_dnow_memory_form() {
        let mem = MemoryOperand::base(Register::R8, OperandSize::Qword).unwrap();
        let inst = build(&instr(Mnemonic::Pfmul, &[mm(2).into(), mem.into()])).unwrap();
        let p = inst.legacy_prefixes().unwrap();
        assert!(p.rex.b);
        assert_eq!(inst.modrm, Some(ModRm::new(0b00, 2, 0)));
    }

    #[test]
    fn three_dnow_rejects_extended_mmx() {
        let mm9 = Register::new(RegisterClass::Mmx, 9);
        for args in [[mm9.into(), mm(1).into()], [mm(0).into(), mm9.into()]] {
            let err = build(&instr(Mnemonic::Pfadd, &args)).unwrap_err();
            assert_eq!(err.kind(), "invalid-operand");
        }
    }

    #[test]
    fn three_dnow_rejects_lock() {
        let i = instr(Mnemonic::Pfsub, &[mm(0).into(), mm(1).into()]).prefixed(Prefix::Lock);
        assert!(build(&i).is_err());
    }
}
