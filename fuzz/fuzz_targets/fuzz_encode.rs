#![no_main]
use libfuzzer_sys::fuzz_target;

use x64enc::{
    Argument, Assembler, DispSize, Instruction, MemoryOperand, Mnemonic, OperandSize, Prefix,
    Register, RegisterClass, Scale,
};

const CLASSES: [RegisterClass; 14] = [
    RegisterClass::Gpr8,
    RegisterClass::Gpr8Rex,
    RegisterClass::Gpr16,
    RegisterClass::Gpr32,
    RegisterClass::Gpr64,
    RegisterClass::Ip32,
    RegisterClass::Ip64,
    RegisterClass::X87,
    RegisterClass::Mmx,
    RegisterClass::Xmm,
    RegisterClass::Ymm,
    RegisterClass::Segment,
    RegisterClass::Control,
    RegisterClass::Debug,
];

const SIZES: [OperandSize; 7] = [
    OperandSize::Byte,
    OperandSize::Word,
    OperandSize::Dword,
    OperandSize::Qword,
    OperandSize::Tbyte,
    OperandSize::Xmmword,
    OperandSize::Ymmword,
];

/// Cursor over the fuzz input; reads past the end yield zero.
struct Bytes<'a>(&'a [u8]);

impl Bytes<'_> {
    fn u8(&mut self) -> u8 {
        match self.0.split_first() {
            Some((&b, rest)) => {
                self.0 = rest;
                b
            }
            None => 0,
        }
    }

    fn u64(&mut self) -> u64 {
        (0..8).fold(0, |acc, i| acc | u64::from(self.u8()) << (i * 8))
    }

    fn register(&mut self) -> Register {
        let class = CLASSES[usize::from(self.u8()) % CLASSES.len()];
        Register::new(class, self.u8())
    }

    fn size(&mut self) -> OperandSize {
        SIZES[usize::from(self.u8()) % SIZES.len()]
    }

    fn argument(&mut self) -> Option<Argument> {
        Some(match self.u8() % 4 {
            0 => Argument::None,
            1 => self.register().into(),
            2 => {
                let size = self.size();
                Argument::imm(self.u64(), size).ok()?
            }
            _ => {
                let flags = self.u8();
                let base = (flags & 1 != 0).then(|| self.register());
                let index = (flags & 2 != 0).then(|| self.register());
                let scale = Scale::from_factor(1 << ((flags >> 2) & 3)).ok()?;
                let disp_size = [DispSize::None, DispSize::Byte, DispSize::Dword][usize::from(flags >> 4) % 3];
                let disp = self.u64() as i32 as i64;
                let size = self.size();
                let mut mem = MemoryOperand::new(base, index, scale, disp, disp_size, size).ok()?;
                if flags & 0x80 != 0 {
                    mem = mem.with_segment(self.register()).ok()?;
                }
                mem.into()
            }
        })
    }

    fn instruction(&mut self) -> Option<Instruction> {
        let mnemonic = Mnemonic::ALL[usize::from(self.u8()) % Mnemonic::ALL.len()];
        let count = usize::from(self.u8() % 5);
        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            args.push(self.argument()?);
        }
        let mut instr = Instruction::with_args(mnemonic, &args).ok()?;
        let prefixes = self.u8();
        for (bit, p) in [Prefix::Lock, Prefix::Rep, Prefix::Repne, Prefix::Vex3].into_iter().enumerate() {
            if prefixes & (1 << bit) != 0 {
                instr = instr.prefixed(p);
            }
        }
        Some(instr)
    }
}

fuzz_target!(|data: &[u8]| {
    // Encoding arbitrary instructions must never panic, only return Ok/Err.
    let mut input = Bytes(data);
    let mut asm = Assembler::with_capacity(256);
    while !input.0.is_empty() {
        let Some(instr) = input.instruction() else { continue };
        let before = asm.position();
        if asm.emit(&instr).is_err() {
            assert_eq!(asm.position(), before);
        }
    }
    let _ = asm.finish().to_string();
});
