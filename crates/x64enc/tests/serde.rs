//! Serde round-trip tests for the public `x64enc` types.
//!
//! Every type that carries the `serde` derive must serialize to JSON and
//! deserialize back to an identical value; validated types must refuse
//! JSON that their constructors would reject.

#![cfg(feature = "serde")]

use x64enc::{
    encode, instantiate, mm, xmm, ymm, Argument, ArgumentList, CodeBuffer, DispSize, EncodeError,
    Immediate, Instance, Instruction, MemoryOperand, Mnemonic, OperandSize, Prefix, PrefixSet,
    Register, RegisterClass, Scale, WidthOf,
};

/// Helper: serialize to JSON, deserialize back, assert equality.
fn round_trip<T>(val: &T)
where
    T: serde::Serialize + serde::de::DeserializeOwned + PartialEq + core::fmt::Debug,
{
    let json = serde_json::to_string(val).expect("serialize");
    let back: T = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(val, &back, "round-trip mismatch for JSON: {json}");
}

fn sample_memory() -> MemoryOperand {
    MemoryOperand::new(
        Some(Register::R10),
        Some(Register::R11),
        Scale::X4,
        -0x10,
        DispSize::Byte,
        OperandSize::Dword,
    )
    .unwrap()
    .with_segment(Register::FS)
    .unwrap()
}

// ─── Registers ──────────────────────────────────────────────────────────────

#[test]
fn serde_register() {
    for reg in [
        Register::AL,
        Register::AH,
        Register::SPL,
        Register::R15W,
        Register::EAX,
        Register::R9,
        Register::RIP,
        Register::GS,
        xmm(7),
        ymm(12),
        mm(3),
    ] {
        round_trip(&reg);
    }
}

#[test]
fn serde_register_class() {
    for class in [
        RegisterClass::Gpr8,
        RegisterClass::Gpr8Rex,
        RegisterClass::Ip64,
        RegisterClass::X87,
        RegisterClass::Ymm,
        RegisterClass::Debug,
    ] {
        round_trip(&class);
    }
}

#[test]
fn serde_register_is_validated() {
    for json in [
        r#"{"class":"Gpr64","index":16}"#,
        r#"{"class":"Xmm","index":200}"#,
        r#"{"class":"Mmx","index":9}"#,
        r#"{"class":"X87","index":8}"#,
        r#"{"class":"Segment","index":6}"#,
    ] {
        assert!(serde_json::from_str::<Register>(json).is_err(), "{json}");
    }
    let r15: Register = serde_json::from_str(r#"{"class":"Gpr64","index":15}"#).unwrap();
    assert_eq!(r15, Register::R15);
}

#[test]
fn serde_memory_operand_rejects_bad_register() {
    let mut value = serde_json::to_value(sample_memory()).unwrap();
    value["base"]["index"] = serde_json::json!(16);
    assert!(serde_json::from_value::<MemoryOperand>(value).is_err());
}

#[test]
fn serde_instruction_rejects_bad_register() {
    let instr = Instruction::with_args(Mnemonic::Add, &[Register::RAX.into(), Register::RCX.into()])
        .unwrap();
    let json = serde_json::to_string(&instr)
        .unwrap()
        .replace(r#""index":0"#, r#""index":16"#);
    assert!(serde_json::from_str::<Instruction>(&json).is_err(), "{json}");
}

// ─── Operands ───────────────────────────────────────────────────────────────

#[test]
fn serde_sizes() {
    for size in [
        OperandSize::Byte,
        OperandSize::Word,
        OperandSize::Dword,
        OperandSize::Qword,
        OperandSize::Tbyte,
        OperandSize::Xmmword,
        OperandSize::Ymmword,
    ] {
        round_trip(&size);
    }
    for scale in [Scale::X1, Scale::X2, Scale::X4, Scale::X8] {
        round_trip(&scale);
    }
    for disp in [DispSize::None, DispSize::Byte, DispSize::Dword] {
        round_trip(&disp);
    }
}

#[test]
fn serde_memory_operand() {
    round_trip(&sample_memory());
    round_trip(&MemoryOperand::rip(-4, OperandSize::Qword).unwrap());
    round_trip(
        &MemoryOperand::new(
            None,
            Some(Register::RCX),
            Scale::X8,
            0x100,
            DispSize::Dword,
            OperandSize::Dword,
        )
        .unwrap(),
    );
}

#[test]
fn serde_memory_operand_is_validated() {
    let mut value = serde_json::to_value(sample_memory()).unwrap();
    value["index"] = serde_json::Value::Null;
    let err = serde_json::from_value::<MemoryOperand>(value).unwrap_err();
    assert!(err.to_string().contains("scale"), "{err}");
}

#[test]
fn serde_immediate() {
    round_trip(&Immediate::new(0xFF, OperandSize::Byte).unwrap());
    round_trip(&Immediate::signed(-1, OperandSize::Qword).unwrap());

    let json = r#"{"value":256,"size":"Byte"}"#;
    assert!(serde_json::from_str::<Immediate>(json).is_err());
    let json = r#"{"value":1,"size":"Xmmword"}"#;
    assert!(serde_json::from_str::<Immediate>(json).is_err());
}

#[test]
fn serde_argument() {
    round_trip(&Argument::None);
    round_trip(&Argument::from(Register::RDX));
    round_trip(&Argument::from(sample_memory()));
    round_trip(&Argument::imm(0x1234, OperandSize::Word).unwrap());
}

// ─── Instructions ───────────────────────────────────────────────────────────

#[test]
fn serde_mnemonic() {
    for m in Mnemonic::ALL {
        round_trip(m);
    }
}

#[test]
fn serde_prefixes() {
    for p in [Prefix::Lock, Prefix::Rep, Prefix::Repne, Prefix::Vex3] {
        round_trip(&p);
    }
    let mut set = PrefixSet::empty();
    set.insert(Prefix::Lock);
    set.insert(Prefix::Vex3);
    round_trip(&set);
}

#[test]
fn serde_argument_list() {
    round_trip(&ArgumentList::new());
    round_trip(
        &ArgumentList::from_slice(&[
            Register::RAX.into(),
            Register::RCX.into(),
            Argument::imm(7, OperandSize::Byte).unwrap(),
        ])
        .unwrap(),
    );
}

#[test]
fn serde_argument_list_rejects_overflow() {
    let json = r#"["None","None","None","None","None"]"#;
    assert!(serde_json::from_str::<ArgumentList>(json).is_err());
}

#[test]
fn serde_instruction() {
    let instr = Instruction::with_args(
        Mnemonic::Add,
        &[sample_memory().into(), Register::R8D.into()],
    )
    .unwrap()
    .prefixed(Prefix::Lock);
    round_trip(&instr);
}

#[test]
fn serde_instruction_encodes_identically() {
    let instr = Instruction::with_args(
        Mnemonic::Vxorps,
        &[xmm(8).into(), xmm(9).into(), xmm(10).into()],
    )
    .unwrap();
    let json = serde_json::to_string(&instr).unwrap();
    let back: Instruction = serde_json::from_str(&json).unwrap();
    assert_eq!(encode(&back).unwrap(), encode(&instr).unwrap());
}

// ─── Instances ──────────────────────────────────────────────────────────────

#[test]
fn serde_instance() {
    let samples = [
        Instruction::with_args(Mnemonic::Nop, &[Argument::imm(9, OperandSize::Byte).unwrap()]),
        Instruction::with_args(Mnemonic::Xor, &[Register::R9D.into(), sample_memory().into()]),
        Instruction::with_args(
            Mnemonic::Vpsllvq,
            &[ymm(1).into(), ymm(2).into(), ymm(3).into()],
        ),
        Instruction::with_args(Mnemonic::Pfadd, &[mm(0).into(), mm(1).into()]),
    ];
    for instr in samples {
        round_trip(&instantiate(&instr.unwrap()).unwrap());
    }
    round_trip(&Instance::invalid());
}

// ─── Errors and buffers ─────────────────────────────────────────────────────

#[test]
fn serde_errors() {
    round_trip(&EncodeError::NoMatchingSchema {
        mnemonic: Mnemonic::Add,
    });
    round_trip(&EncodeError::UnsupportedWidth {
        what: WidthOf::Displacement,
        bits: 8,
    });
    round_trip(&EncodeError::BufferFull {
        needed: 4,
        remaining: 1,
    });
    round_trip(&EncodeError::AmbiguousAddressing {
        detail: "rsp cannot be used as an index register".into(),
    });
}

#[test]
fn serde_code_buffer() {
    let mut buf = CodeBuffer::with_capacity(32);
    buf.write_bytes(&[0x48, 0x05, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap();
    round_trip(&buf);
}

#[test]
fn serde_code_buffer_rejects_overfull() {
    let json = r#"{"data":[1,2,3],"capacity":0}"#;
    assert!(serde_json::from_str::<CodeBuffer>(json).is_err());

    let buf: CodeBuffer = serde_json::from_str(r#"{"data":[1,2,3],"capacity":3}"#).unwrap();
    assert_eq!(buf.remaining(), 0);
}
