//! Canonical multi-byte no-op builder.
//!
//! `nop` takes a single 8-bit immediate: the number of padding bytes.
//! Lengths 1..=9 map onto the recommended `90` / `0F 1F /0` sequences.

use crate::error::EncodeError;
use crate::instance::{Field, Form, Instance, LegacyPrefixes, ModRm, Sib};
use crate::ir::{Argument, Instruction, OperandSize};
use crate::schema::Opcode;

/// Longest canonical no-op.
pub const MAX_NOP_LEN: u64 = 9;

/// `0F 1F /0` with the given mode, optional zero SIB and zero displacement.
fn long_nop(operand_size: bool, mode: u8, with_sib: bool) -> Instance {
    let prefixes = LegacyPrefixes {
        operand_size,
        ..LegacyPrefixes::default()
    };
    let mut inst = Instance::new(Opcode::two(0x0F, 0x1F), Form::Nop(prefixes));
    let rm = if with_sib { ModRm::SIB_ESCAPE } else { 0b000 };
    inst.modrm = Some(ModRm::new(mode, 0, rm));
    inst.sib = with_sib.then(|| Sib::new(0, 0, 0));
    inst.disp = match mode {
        0b01 => Field::U8(0),
        0b10 => Field::U32(0),
        _ => Field::None,
    };
    inst
}

/// Instance for a no-op of exactly `length` bytes.
pub fn nop_of_length(length: u64) -> Result<Instance, EncodeError> {
    let short = |operand_size| {
        Instance::new(
            Opcode::one(0x90),
            Form::Nop(LegacyPrefixes {
                operand_size,
                ..LegacyPrefixes::default()
            }),
        )
    };
    Ok(match length {
        1 => short(false),
        2 => short(true),
        3 => long_nop(false, 0b00, false),
        4 => long_nop(false, 0b01, false),
        5 => long_nop(false, 0b01, true),
        6 => long_nop(true, 0b01, true),
        7 => long_nop(false, 0b10, false),
        8 => long_nop(false, 0b10, true),
        9 => long_nop(true, 0b10, true),
        _ => return Err(EncodeError::NopLength { length }),
    })
}

/// Build the `nop` instance for `instr`.
pub(crate) fn instantiate_nop(instr: &Instruction) -> Result<Instance, EncodeError> {
    if instr.args.len() != 1 {
        return Err(EncodeError::Arity {
            mnemonic: instr.mnemonic,
            count: instr.args.len(),
        });
    }
    if !instr.prefixes.is_empty() {
        return Err(EncodeError::RoleConflict {
            detail: alloc::string::String::from("nop takes no prefixes"),
        });
    }
    match instr.args[0] {
        Argument::Immediate(imm) if imm.size() == OperandSize::Byte => nop_of_length(imm.value()),
        other => Err(EncodeError::InvalidOperand {
            detail: alloc::format!("nop length must be an 8-bit immediate, got {}", other),
        }),
    }
}
