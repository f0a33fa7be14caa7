//! Builder that encodes a stream of instructions into one [`CodeBuffer`].

use crate::buffer::CodeBuffer;
use crate::encoder;
use crate::error::EncodeError;
use crate::ir::Instruction;

/// Incremental encoder over a fixed-capacity buffer.
///
/// ```rust
/// use x64enc::{Argument, Assembler, Instruction, Mnemonic, OperandSize, Register};
///
/// let mut asm = Assembler::new();
/// asm.emit(&Instruction::with_args(
///     Mnemonic::Add,
///     &[Register::AL.into(), Argument::imm(0xFF, OperandSize::Byte)?],
/// )?)?;
/// assert_eq!(asm.finish().as_bytes(), &[0x04, 0xFF]);
/// # Ok::<(), x64enc::EncodeError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Assembler {
    buf: CodeBuffer,
    emitted: usize,
}

impl Assembler {
    /// Assembler over a [`CodeBuffer::DEFAULT_CAPACITY`]-byte buffer.
    pub fn new() -> Self {
        Self::with_capacity(CodeBuffer::DEFAULT_CAPACITY)
    }

    /// Assembler over a buffer of `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: CodeBuffer::with_capacity(capacity),
            emitted: 0,
        }
    }

    /// Encode one instruction and append it.
    ///
    /// On error the buffer is left exactly as it was.
    pub fn emit(&mut self, instr: &Instruction) -> Result<&mut Self, EncodeError> {
        let at = self.buf.position();
        let n = encoder::encode_into(instr, &mut self.buf)?;
        log::trace!("{:#06x}: {} ({} bytes)", at, instr, n);
        self.emitted += 1;
        Ok(self)
    }

    /// Encode every instruction in order, stopping at the first failure.
    pub fn emit_all<'a, I>(&mut self, instrs: I) -> Result<&mut Self, EncodeError>
    where
        I: IntoIterator<Item = &'a Instruction>,
    {
        for instr in instrs {
            self.emit(instr)?;
        }
        Ok(self)
    }

    /// Pad with zero bytes to a multiple of `alignment`.
    pub fn align(&mut self, alignment: usize) -> Result<&mut Self, EncodeError> {
        self.buf.align_to(alignment)?;
        Ok(self)
    }

    /// Current write position.
    pub fn position(&self) -> usize {
        self.buf.position()
    }

    /// Number of instructions emitted so far.
    pub fn instruction_count(&self) -> usize {
        self.emitted
    }

    /// Consume the assembler and return its buffer.
    pub fn finish(self) -> CodeBuffer {
        self.buf
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}
