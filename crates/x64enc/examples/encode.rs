//! Encoding walkthrough: no-op padding, every `add` accumulator width,
//! REX byte registers, and base / RIP / EIP relative memory forms.
//!
//! Each instruction starts on a fresh 16-byte row so the hex dump lines
//! up one instruction per row.
//!
//! Run with: `cargo run --example encode`

use x64enc::{
    Argument, Assembler, DispSize, EncodeError, Instruction, MemoryOperand, Mnemonic,
    OperandSize, Register, Scale,
};

const ROW: usize = 16;

fn imm(value: u64, size: OperandSize) -> Result<Argument, EncodeError> {
    Argument::imm(value, size)
}

fn program() -> Result<Vec<Instruction>, EncodeError> {
    use Mnemonic::{Add, Nop};
    use OperandSize::{Byte, Dword, Qword, Word};

    let rip = MemoryOperand::rip(0xFFFF_FFFF, Qword)?;
    let eip = MemoryOperand::new(Some(Register::EIP), None, Scale::X1, 0, DispSize::Dword, Dword)?;
    let rax_disp32 =
        MemoryOperand::new(Some(Register::RAX), None, Scale::X1, 0, DispSize::Dword, Qword)?;

    Ok(vec![
        Instruction::with_args(Nop, &[imm(1, Byte)?])?,
        Instruction::with_args(Nop, &[imm(2, Byte)?])?,
        Instruction::with_args(Nop, &[imm(3, Byte)?])?,
        Instruction::with_args(Add, &[Register::AL.into(), imm(0xFF, Byte)?])?,
        Instruction::with_args(Add, &[Register::AX.into(), imm(0xFFFF, Word)?])?,
        Instruction::with_args(Add, &[Register::EAX.into(), imm(0xFFFF_FFFF, Dword)?])?,
        Instruction::with_args(Add, &[Register::RAX.into(), imm(0xFFFF_FFFF, Dword)?])?,
        Instruction::with_args(Add, &[Register::DL.into(), imm(0xFF, Byte)?])?,
        Instruction::with_args(Add, &[Register::R8B.into(), imm(0xFF, Byte)?])?,
        Instruction::with_args(Add, &[Register::SPL.into(), imm(0xFF, Byte)?])?,
        Instruction::with_args(
            Add,
            &[MemoryOperand::base(Register::RAX, Qword)?.into(), imm(0xFFFF_FFFF, Dword)?],
        )?,
        Instruction::with_args(Add, &[rip.into(), imm(0xFFFF_FFFF, Dword)?])?,
        Instruction::with_args(Add, &[eip.into(), imm(0xFFFF_FFFF, Dword)?])?,
        Instruction::with_args(Add, &[rax_disp32.into(), Register::RDX.into()])?,
        // Rejected: [rbp] without a displacement is the RIP-relative escape.
        Instruction::with_args(
            Add,
            &[MemoryOperand::base(Register::RBP, Qword)?.into(), Register::RCX.into()],
        )?,
    ])
}

fn main() -> Result<(), EncodeError> {
    println!("=== x64enc encode example ===\n");

    let mut asm = Assembler::new();
    for instr in program()? {
        match asm.emit(&instr) {
            Ok(_) => println!("good instr: {}", instr),
            Err(e) => println!("bad instr ({}): {}: {}", e.kind(), instr, e),
        }
        asm.align(ROW)?;
    }

    println!(
        "\n{} instructions, {} bytes:\n",
        asm.instruction_count(),
        asm.position()
    );
    print!("{}", asm.finish());
    Ok(())
}
