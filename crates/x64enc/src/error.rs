//! Error types for operand construction, schema matching and encoding.

use alloc::string::String;
use core::fmt;

use crate::ir::Mnemonic;

/// The operand part an [`EncodeError::UnsupportedWidth`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WidthOf {
    /// Address computation (base/index register width).
    Address,
    /// Memory displacement.
    Displacement,
    /// Operand size.
    Operand,
    /// Immediate payload.
    Immediate,
}

impl fmt::Display for WidthOf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WidthOf::Address => "address",
            WidthOf::Displacement => "displacement",
            WidthOf::Operand => "operand",
            WidthOf::Immediate => "immediate",
        })
    }
}

/// Encoding error with a structured reason.
///
/// Every failure of the pipeline lands here: operand construction,
/// schema matching, instance building, serialization into a
/// [`CodeBuffer`](crate::buffer::CodeBuffer).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EncodeError {
    /// Text that names no known mnemonic.
    UnknownMnemonic {
        /// The unrecognized text.
        name: String,
    },

    /// No schema of the mnemonic accepts the operand shapes.
    NoMatchingSchema {
        /// The mnemonic whose table was searched.
        mnemonic: Mnemonic,
    },

    /// Argument count outside what the instance builder accepts.
    Arity {
        /// The offending mnemonic.
        mnemonic: Mnemonic,
        /// Number of arguments supplied.
        count: usize,
    },

    /// Conflicting or duplicate operand roles.
    RoleConflict {
        /// Description of the conflict.
        detail: String,
    },

    /// A width the encoding cannot express.
    UnsupportedWidth {
        /// What carried the width.
        what: WidthOf,
        /// The width in bits.
        bits: u16,
    },

    /// Addressing form that aliases an escape encoding.
    AmbiguousAddressing {
        /// Description of the aliasing.
        detail: String,
    },

    /// Malformed operand rejected at construction.
    InvalidOperand {
        /// Description of why the operand is malformed.
        detail: String,
    },

    /// No canonical no-op exists for the requested padding length.
    NopLength {
        /// The requested length in bytes.
        length: u64,
    },

    /// The output buffer cannot hold the instruction.
    BufferFull {
        /// Bytes the instruction needs.
        needed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },

    /// An instance whose fields contradict each other.
    Internal {
        /// Description of the inconsistency.
        detail: String,
    },
}

impl EncodeError {
    /// Short machine-friendly name of the failure category.
    pub fn kind(&self) -> &'static str {
        match self {
            EncodeError::UnknownMnemonic { .. } => "unknown-mnemonic",
            EncodeError::NoMatchingSchema { .. } => "no-match",
            EncodeError::Arity { .. } => "arity",
            EncodeError::RoleConflict { .. } => "role-conflict",
            EncodeError::UnsupportedWidth { .. } => "unsupported-width",
            EncodeError::AmbiguousAddressing { .. } => "ambiguous-addressing",
            EncodeError::InvalidOperand { .. } => "invalid-operand",
            EncodeError::NopLength { .. } => "nop-length",
            EncodeError::BufferFull { .. } => "buffer-full",
            EncodeError::Internal { .. } => "internal",
        }
    }
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::UnknownMnemonic { name } => write!(f, "unknown mnemonic '{}'", name),
            EncodeError::NoMatchingSchema { mnemonic } => {
                write!(f, "no encoding of '{}' accepts these operands", mnemonic)
            }
            EncodeError::Arity { mnemonic, count } => {
                write!(f, "'{}' cannot take {} operands", mnemonic, count)
            }
            EncodeError::RoleConflict { detail } => write!(f, "operand conflict: {}", detail),
            EncodeError::UnsupportedWidth { what, bits } => {
                write!(f, "unsupported {} width: {} bits", what, bits)
            }
            EncodeError::AmbiguousAddressing { detail } => {
                write!(f, "ambiguous addressing: {}", detail)
            }
            EncodeError::InvalidOperand { detail } => write!(f, "invalid operand: {}", detail),
            EncodeError::NopLength { length } => {
                write!(f, "no canonical nop of {} bytes (expected 1..=9)", length)
            }
            EncodeError::BufferFull { needed, remaining } => write!(
                f,
                "output buffer full: need {} bytes, {} remaining",
                needed, remaining
            ),
            EncodeError::Internal { detail } => write!(f, "internal encoder error: {}", detail),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EncodeError {}
