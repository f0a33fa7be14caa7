//! # x64enc — schema-driven x86-64 machine-code encoder
//!
//! `x64enc` turns a structured instruction (mnemonic plus typed operands)
//! into the exact bytes a CPU executes. It picks an encoding from an
//! ordered per-mnemonic schema table and derives every prefix and
//! addressing field: REX, operand/address-size overrides, segment
//! overrides, VEX, ModR/M, SIB, displacement and immediate.
//!
//! ## Quick Start
//!
//! ```rust
//! use x64enc::{encode, Argument, Instruction, MemoryOperand, Mnemonic, OperandSize};
//!
//! // add qword ptr [rip-1], 0xffffffff
//! let mem = MemoryOperand::rip(0xFFFF_FFFF, OperandSize::Qword)?;
//! let imm = Argument::imm(0xFFFF_FFFF, OperandSize::Dword)?;
//! let instr = Instruction::with_args(Mnemonic::Add, &[mem.into(), imm])?;
//! assert_eq!(
//!     encode(&instr)?,
//!     vec![0x48, 0x81, 0x05, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
//! );
//! # Ok::<(), x64enc::EncodeError>(())
//! ```
//!
//! ## Pipeline
//!
//! ```text
//! Instruction ─► schema match ─► legacy | VEX | 3DNow! | nop builder ─► Instance ─► serializer ─► CodeBuffer
//! ```
//!
//! - **`no_std` + `alloc`**: disable the default `std` feature.
//! - **`serde`**: `Serialize`/`Deserialize` for operands, instructions,
//!   instances and errors.
//! - Diagnostics go through the [`log`] facade; the crate never installs
//!   a logger.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
#![warn(missing_docs)]
// ── Pedantic lint policy ─────────────────────────────────────────────────
// An encoder narrows integers into bit fields all the time (u64→u8,
// i64→u32) and writes dense hex literals; the lints below are expected.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::cast_possible_wrap,
    clippy::unreadable_literal,
    clippy::match_same_arms,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::uninlined_format_args,
    clippy::doc_markdown,
    clippy::similar_names,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::len_without_is_empty,
    clippy::new_without_default,
    clippy::precedence
)]

extern crate alloc;

/// Memory-operand ModR/M, SIB and displacement encoding.
pub(crate) mod addressing;
/// Builder API over a [`CodeBuffer`].
pub mod assembler;
/// Fixed-capacity output buffer.
pub mod buffer;
/// Dispatch and serialization.
pub mod encoder;
/// Error types.
pub mod error;
/// Resolved instruction instances.
pub mod instance;
/// Operand model: registers, memory, immediates, instructions.
pub mod ir;
/// Legacy/REX instance builder.
pub(crate) mod legacy;
/// Canonical no-op builder.
pub mod nop;
/// Schema tables and matcher.
pub mod schema;
/// VEX and 3DNow! instance builders.
pub(crate) mod vex;

pub use assembler::Assembler;
pub use buffer::CodeBuffer;
pub use encoder::{encode, encode_into, instantiate, serialize, write_instance, InstrBytes};
pub use error::{EncodeError, WidthOf};
pub use instance::{Field, Form, Instance, InstanceKind, LegacyPrefixes, LockRep, ModRm, Rex, Sib, VexPrefix};
pub use ir::{
    cr, dr, mm, st, xmm, ymm, Argument, ArgumentList, DispSize, Immediate, Instruction,
    MemoryOperand, Mnemonic, OperandSize, Prefix, PrefixSet, Register, RegisterClass, Scale,
};
pub use schema::{match_schema, Opcode, Schema};
