//! Legacy (REX-era) instance builder.
//!
//! Turns a matched [`Schema`] plus the caller's arguments into an
//! [`Instance`]: operand/address-size prefixes, REX, ModR/M, SIB,
//! displacement and immediate.

use alloc::format;
use alloc::string::String;

use crate::addressing::{encode_memory, needs_address_override};
use crate::error::{EncodeError, WidthOf};
use crate::instance::{Field, Form, Instance, LegacyPrefixes, LockRep, ModRm};
use crate::ir::{Argument, Immediate, Instruction, OperandSize, Prefix, PrefixSet, Register};
use crate::schema::{Order, Schema};

fn conflict(detail: impl Into<String>) -> EncodeError {
    EncodeError::RoleConflict {
        detail: detail.into(),
    }
}

// ─── Sizing ─────────────────────────────────────────────────────────────

/// Operand size: the common width of all register arguments, or the
/// declared size of the memory argument when there is no register.
fn operand_size(args: &[Argument]) -> Result<Option<OperandSize>, EncodeError> {
    let mut reg_size: Option<OperandSize> = None;
    let mut mem_size = None;
    for arg in args {
        match arg {
            Argument::Register(r) => match reg_size {
                Some(s) if s != r.size() => {
                    return Err(conflict(format!(
                        "register {} disagrees with {}-bit operand size",
                        r,
                        s.bits()
                    )))
                }
                _ => reg_size = Some(r.size()),
            },
            Argument::Memory(m) => {
                if mem_size.is_some() {
                    return Err(conflict("two memory operands"));
                }
                mem_size = Some(m.size());
            }
            Argument::Immediate(_) | Argument::None => {}
        }
    }
    Ok(reg_size.or(mem_size))
}

/// Apply operand-size and address-size rules to `prefixes`.
fn apply_sizes(prefixes: &mut LegacyPrefixes, args: &[Argument]) -> Result<(), EncodeError> {
    if let Some(mem) = args.iter().find_map(Argument::as_memory) {
        prefixes.address_size = needs_address_override(mem)?;
        prefixes.segment = mem.segment();
    }
    match operand_size(args)? {
        None | Some(OperandSize::Byte) | Some(OperandSize::Dword) => {}
        Some(OperandSize::Word) => prefixes.operand_size = true,
        Some(OperandSize::Qword) => {
            prefixes.rex.w = true;
            prefixes.rex.present = true;
        }
        Some(other) => {
            return Err(EncodeError::UnsupportedWidth {
                what: WidthOf::Operand,
                bits: other.bits(),
            })
        }
    }
    Ok(())
}

/// Map explicit prefixes onto group 1.
pub(crate) fn group1(prefixes: PrefixSet) -> Result<Option<LockRep>, EncodeError> {
    if prefixes.contains(Prefix::Vex3) {
        return Err(conflict("{vex3} applies only to VEX instructions"));
    }
    let mut found = None;
    for (p, lr) in [
        (Prefix::Lock, LockRep::Lock),
        (Prefix::Rep, LockRep::Rep),
        (Prefix::Repne, LockRep::Repne),
    ] {
        if prefixes.contains(p) {
            if found.is_some() {
                return Err(conflict("more than one lock/rep prefix"));
            }
            found = Some(lr);
        }
    }
    Ok(found)
}

/// `ah`..`bh` cannot be encoded once a REX byte is emitted.
pub(crate) fn check_high_byte(args: &[Argument], rex_required: bool) -> Result<(), EncodeError> {
    if !rex_required {
        return Ok(());
    }
    match args
        .iter()
        .filter_map(Argument::as_register)
        .find(|r| r.is_high_byte())
    {
        Some(r) => Err(conflict(format!(
            "{} cannot be encoded with a REX prefix",
            r
        ))),
        None => Ok(()),
    }
}

fn immediate_field(imm: Immediate) -> Field {
    match imm.size() {
        OperandSize::Byte => Field::U8(imm.value() as u8),
        OperandSize::Word => Field::U16(imm.value() as u16),
        OperandSize::Dword => Field::U32(imm.value() as u32),
        _ => Field::U64(imm.value()),
    }
}

// ─── Roles ──────────────────────────────────────────────────────────────

/// Operands after role assignment: at most one register for ModR/M.reg,
/// one register-or-memory for ModR/M.rm, one immediate.
#[derive(Debug, Default)]
struct Roles {
    reg: Option<Register>,
    rm: Option<Argument>,
    imm: Option<Immediate>,
}

fn assign_roles(
    instr: &Instruction,
    schema: &Schema,
    order: Order,
) -> Result<Roles, EncodeError> {
    let args = instr.args.as_slice();
    if args.len() > 3 {
        return Err(EncodeError::Arity {
            mnemonic: instr.mnemonic,
            count: args.len(),
        });
    }
    let slot = |i: usize| -> Option<Argument> {
        let fixed = schema.args.get(i).map_or(false, |p| p.is_fixed());
        args.get(i).copied().filter(|_| !fixed)
    };
    let dest = slot(0);
    let mut src = slot(1);
    let mut imm = None;

    if let Some(third) = args.get(2) {
        match third {
            Argument::Immediate(i) => imm = Some(*i),
            _ => return Err(conflict("third operand must be an immediate")),
        }
    }
    if let Some(Argument::Immediate(i)) = src {
        if imm.is_some() {
            return Err(conflict("two immediate operands"));
        }
        imm = Some(i);
        src = None;
    }
    let dest = match dest {
        Some(Argument::Immediate(_)) => return Err(conflict("immediate destination")),
        Some(Argument::None) => None,
        other => other,
    };
    let src = src.filter(|a| *a != Argument::None);

    let mut roles = Roles {
        imm,
        ..Roles::default()
    };
    match (dest, src) {
        (None, None) => {}
        (Some(one), None) | (None, Some(one)) => roles.rm = Some(one),
        (Some(d), Some(s)) => {
            let (reg_side, rm_side) = match order {
                Order::Mr => (s, d),
                Order::Rm => (d, s),
            };
            match reg_side {
                Argument::Register(r) => roles.reg = Some(r),
                Argument::Memory(_) if matches!(rm_side, Argument::Memory(_)) => {
                    return Err(conflict("two memory operands"))
                }
                _ => return Err(conflict(format!("{} cannot occupy ModR/M.reg", reg_side))),
            }
            roles.rm = Some(rm_side);
        }
    }
    Ok(roles)
}

// ─── Builder ────────────────────────────────────────────────────────────

/// Build a legacy instance for `instr` matched against `schema`.
pub(crate) fn instantiate(
    instr: &Instruction,
    schema: &Schema,
    order: Order,
    digit: u8,
) -> Result<Instance, EncodeError> {
    let args = instr.args.as_slice();
    let roles = assign_roles(instr, schema, order)?;

    let mut prefixes = LegacyPrefixes {
        group1: group1(instr.prefixes)?,
        ..LegacyPrefixes::default()
    };
    apply_sizes(&mut prefixes, args)?;

    if prefixes.group1 == Some(LockRep::Lock) && !matches!(args.first(), Some(Argument::Memory(_))) {
        return Err(conflict("lock requires a memory destination"));
    }

    let mut inst = Instance::new(schema.opcode, Form::Legacy(prefixes));
    let rex = &mut prefixes.rex;

    let reg_field = match roles.reg {
        Some(r) => {
            rex.r = r.is_extended();
            r.low_bits()
        }
        None => digit,
    };

    match roles.rm {
        Some(Argument::Register(r)) => {
            rex.b = r.is_extended();
            inst.modrm = Some(ModRm::new(ModRm::DIRECT, reg_field, r.low_bits()));
        }
        Some(Argument::Memory(mem)) => {
            let enc = encode_memory(&mem, reg_field)?;
            rex.x = enc.x;
            rex.b = enc.b;
            inst.modrm = Some(enc.modrm);
            inst.sib = enc.sib;
            inst.disp = enc.disp;
        }
        Some(other) => return Err(conflict(format!("{} cannot occupy ModR/M.rm", other))),
        None => {}
    }

    if args
        .iter()
        .filter_map(Argument::as_register)
        .any(|r| r.requires_rex() || r.is_extended())
    {
        rex.present = true;
    }
    check_high_byte(args, rex.is_required())?;

    inst.imm = roles.imm.map_or(Field::None, immediate_field);
    inst.form = Form::Legacy(prefixes);
    Ok(inst)
}
