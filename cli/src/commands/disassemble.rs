use std::fs;

use anyhow::Result;

use diagnostics::{shared, ConsoleSink, Diagnostic, ErrorSink};
use memory::FunctionKind;
use vm::opcode::{instruction, Opcode};
use vm::CompiledUnit;

use crate::args::DisassembleArgs;

pub fn execute(args: &DisassembleArgs) -> Result<i32> {
    let sink = shared(ConsoleSink);

    let unit = if args.path.extension().map(|e| e == "orbc").unwrap_or(false) {
        let bytes = match fs::read(&args.path) {
            Ok(bytes) => bytes,
            Err(err) => {
                sink.borrow_mut()
                    .report(&Diagnostic::io(format!("{}: {}", args.path.display(), err)));
                return Ok(1);
            }
        };
        match vm::loader::load_executable(&mut bytes.as_slice()) {
            Ok(unit) => unit,
            Err(err) => {
                sink.borrow_mut()
                    .report(&Diagnostic::io(format!("{}: {}", args.path.display(), err)));
                return Ok(1);
            }
        }
    } else {
        let source = match fs::read_to_string(&args.path) {
            Ok(source) => source,
            Err(err) => {
                sink.borrow_mut()
                    .report(&Diagnostic::io(format!("{}: {}", args.path.display(), err)));
                return Ok(1);
            }
        };
        match compiler::Compiler::new(0).compile(&source) {
            Ok(unit) => unit,
            Err(err) => {
                sink.borrow_mut().report(&err.into_diagnostic(0));
                return Ok(1);
            }
        }
    };

    print_unit(&unit);
    Ok(0)
}

fn print_unit(unit: &CompiledUnit) {
    for (index, proto) in unit.protos.iter().enumerate() {
        let (arity, max_slots, chunk, constants) = match &proto.kind {
            FunctionKind::Bytecode {
                arity,
                max_slots,
                chunk,
                constants,
            } => (*arity, *max_slots, chunk, constants),
            _ => continue,
        };
        let name = proto.name.as_deref().unwrap_or("<main>");
        let tag = if index as u32 == unit.main { " (main)" } else { "" };
        println!(
            "proto {} `{}`{}: arity {}, {} slots",
            index, name, tag, arity, max_slots
        );
        for (slot, constant) in constants.iter().enumerate() {
            println!("  const {:>3}  {:?}", slot, constant);
        }
        for (offset, &word) in chunk.iter().enumerate() {
            println!("  {:>4}  {}", offset, render(word));
        }
        println!();
    }
}

/// Render one instruction word. Unknown opcodes can only come from a
/// hand-edited binary; the loader rejects them before execution.
fn render(word: u32) -> String {
    let op = match instruction::op(word) {
        Some(op) => op,
        None => return format!("??? {:#010x}", word),
    };
    let a = instruction::a(word);
    match op {
        Opcode::LoadConst
        | Opcode::Closure
        | Opcode::JumpIfFalse
        | Opcode::JumpIfTrue
        | Opcode::DefGlobal
        | Opcode::GetGlobal
        | Opcode::SetGlobal => {
            format!("{:<12} {:>3} {:>5}", mnemonic(op), a, instruction::bx(word))
        }
        Opcode::Jump => format!("{:<12}     {:>5}", mnemonic(op), instruction::bx(word)),
        Opcode::Nop => mnemonic(op).to_string(),
        _ => format!(
            "{:<12} {:>3} {:>3} {:>3}",
            mnemonic(op),
            a,
            instruction::b(word),
            instruction::c(word)
        ),
    }
}

fn mnemonic(op: Opcode) -> &'static str {
    match op {
        Opcode::LoadConst => "loadconst",
        Opcode::LoadTrue => "loadtrue",
        Opcode::LoadFalse => "loadfalse",
        Opcode::LoadNull => "loadnull",
        Opcode::Move => "move",
        Opcode::Add => "add",
        Opcode::Sub => "sub",
        Opcode::Mul => "mul",
        Opcode::Div => "div",
        Opcode::Mod => "mod",
        Opcode::Neg => "neg",
        Opcode::Eq => "eq",
        Opcode::Ne => "ne",
        Opcode::Lt => "lt",
        Opcode::Le => "le",
        Opcode::Gt => "gt",
        Opcode::Ge => "ge",
        Opcode::Not => "not",
        Opcode::Return => "return",
        Opcode::Call => "call",
        Opcode::Closure => "closure",
        Opcode::Jump => "jump",
        Opcode::JumpIfFalse => "jumpiffalse",
        Opcode::JumpIfTrue => "jumpiftrue",
        Opcode::DefGlobal => "defglobal",
        Opcode::GetGlobal => "getglobal",
        Opcode::SetGlobal => "setglobal",
        Opcode::GetMember => "getmember",
        Opcode::SetMember => "setmember",
        Opcode::Nop => "nop",
    }
}
