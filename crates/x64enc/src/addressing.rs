//! Memory-operand encoding: ModR/M, SIB and displacement for one
//! `[base + index*scale + disp]` operand.
//!
//! Shared by the legacy, VEX and 3DNow! builders. The caller supplies the
//! value destined for ModR/M.reg (a register number or a `/digit`).

use alloc::format;

use crate::error::{EncodeError, WidthOf};
use crate::instance::{Field, ModRm, Sib};
use crate::ir::{DispSize, MemoryOperand, Register};

/// Encoded addressing bytes of a memory operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EncodedMemory {
    pub modrm: ModRm,
    pub sib: Option<Sib>,
    pub disp: Field,
    /// SIB.index is r8–r15.
    pub x: bool,
    /// ModR/M.rm or SIB.base is r8–r15.
    pub b: bool,
}

/// Architectural ModR/M.mod for a displacement width.
pub(crate) const fn mode_for(disp: DispSize) -> u8 {
    match disp {
        DispSize::None => 0b00,
        DispSize::Byte => 0b01,
        DispSize::Dword => 0b10,
    }
}

fn disp_field(mem: &MemoryOperand) -> Field {
    match mem.disp_size() {
        DispSize::None => Field::None,
        DispSize::Byte => Field::U8(mem.disp() as u8),
        DispSize::Dword => Field::U32(mem.disp() as u32),
    }
}

/// `rsp`/`esp` cannot be a SIB index: index `100` means "no index".
fn check_index(index: Register) -> Result<(), EncodeError> {
    if index.low_bits() == ModRm::SIB_ESCAPE && !index.is_extended() {
        return Err(EncodeError::AmbiguousAddressing {
            detail: format!("{} cannot be used as an index register", index),
        });
    }
    Ok(())
}

/// Encode `mem` with `reg` in ModR/M.reg.
///
/// Cases, in precedence order: instruction-pointer relative, no base,
/// base only, base plus index.
pub(crate) fn encode_memory(mem: &MemoryOperand, reg: u8) -> Result<EncodedMemory, EncodeError> {
    let disp_size = mem.disp_size();
    let disp = disp_field(mem);

    match (mem.base_register(), mem.index_register()) {
        (Some(base), index) if base.class().is_instruction_pointer() => {
            if let Some(index) = index {
                return Err(EncodeError::AmbiguousAddressing {
                    detail: format!("{}-relative address cannot take index {}", base, index),
                });
            }
            if disp_size != DispSize::Dword {
                return Err(EncodeError::UnsupportedWidth {
                    what: WidthOf::Displacement,
                    bits: disp_size.bits(),
                });
            }
            Ok(EncodedMemory {
                modrm: ModRm::new(0b00, reg, ModRm::DISP_ESCAPE),
                sib: None,
                disp,
                x: false,
                b: false,
            })
        }
        (None, index) => {
            if disp_size != DispSize::Dword {
                return Err(EncodeError::UnsupportedWidth {
                    what: WidthOf::Displacement,
                    bits: disp_size.bits(),
                });
            }
            let (index_bits, x) = match index {
                Some(i) => {
                    check_index(i)?;
                    (i.low_bits(), i.is_extended())
                }
                None => (ModRm::SIB_ESCAPE, false),
            };
            Ok(EncodedMemory {
                modrm: ModRm::new(0b00, reg, ModRm::SIB_ESCAPE),
                sib: Some(Sib::new(mem.scale().code(), index_bits, ModRm::DISP_ESCAPE)),
                disp,
                x,
                b: false,
            })
        }
        (Some(base), None) => {
            if base.low_bits() == ModRm::DISP_ESCAPE && disp_size == DispSize::None {
                return Err(EncodeError::AmbiguousAddressing {
                    detail: format!("[{}] without displacement aliases [rip+disp32]", base),
                });
            }
            let sib = (base.low_bits() == ModRm::SIB_ESCAPE).then(|| {
                Sib::new(0, ModRm::SIB_ESCAPE, ModRm::SIB_ESCAPE)
            });
            Ok(EncodedMemory {
                modrm: ModRm::new(mode_for(disp_size), reg, base.low_bits()),
                sib,
                disp,
                x: false,
                b: base.is_extended(),
            })
        }
        (Some(base), Some(index)) => {
            check_index(index)?;
            if base.low_bits() == ModRm::DISP_ESCAPE && disp_size == DispSize::None {
                return Err(EncodeError::AmbiguousAddressing {
                    detail: format!("[{}+index] without displacement aliases [disp32+index]", base),
                });
            }
            Ok(EncodedMemory {
                modrm: ModRm::new(mode_for(disp_size), reg, ModRm::SIB_ESCAPE),
                sib: Some(Sib::new(mem.scale().code(), index.low_bits(), base.low_bits())),
                disp,
                x: index.is_extended(),
                b: base.is_extended(),
            })
        }
    }
}

/// Address-size override needed for `mem`, or an error for widths that
/// 64-bit mode cannot address with.
pub(crate) fn needs_address_override(mem: &MemoryOperand) -> Result<bool, EncodeError> {
    match mem.address_bits() {
        None | Some(64) => Ok(false),
        Some(32) => Ok(true),
        Some(bits) => Err(EncodeError::UnsupportedWidth {
            what: WidthOf::Address,
            bits,
        }),
    }
}
