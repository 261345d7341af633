//! Instruction set and 32-bit instruction encoding.
//!
//! Every instruction is one `u32`: an 8-bit opcode followed by either
//! three 8-bit register/constant operands (ABC form) or one 8-bit operand
//! and a 16-bit immediate (ABx form). Which form an opcode uses is fixed
//! per opcode.

/// Operation codes. Discriminants are part of the `.orbc` binary format
/// and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    // Loads
    LoadConst = 0, // ABx: R[A] = constants[Bx]
    LoadTrue = 1,  // A:   R[A] = true
    LoadFalse = 2, // A:   R[A] = false
    LoadNull = 3,  // A:   R[A] = null
    Move = 5,      // AB:  R[A] = R[B]

    // Arithmetic
    Add = 10, // ABC: R[A] = R[B] + R[C]
    Sub = 11,
    Mul = 12,
    Div = 13,
    Mod = 14,
    Neg = 16, // AB: R[A] = -R[B]

    // Comparison and logic
    Eq = 20, // ABC: R[A] = R[B] == R[C]
    Ne = 21,
    Lt = 22,
    Le = 23,
    Gt = 24,
    Ge = 25,
    Not = 26, // AB: R[A] = !truthiness(R[B])

    // Calls
    Return = 54,  // AB: B == 1 returns R[A], B == 0 returns null
    Call = 55,    // ABC: callee R[B], receiver R[B+1], C args from R[B+2]; result R[A]
    Closure = 56, // ABx: R[A] = new closure over prototype Bx

    // Control flow; jump targets are absolute instruction indices
    Jump = 60,        // Bx
    JumpIfFalse = 61, // ABx: jump when R[A] is falsey
    JumpIfTrue = 62,  // ABx

    // Globals, addressed by string constant Bx
    DefGlobal = 99, // ABx: define constants[Bx] = R[A]
    GetGlobal = 100, // ABx: R[A] = global named constants[Bx]
    SetGlobal = 101, // ABx: global named constants[Bx] = R[A]

    // Members
    GetMember = 110, // ABC: R[A] = R[B].constants[C]
    SetMember = 111, // ABC: R[A].constants[B] = R[C]

    Nop = 255,
}

impl Opcode {
    pub fn from_u8(byte: u8) -> Option<Opcode> {
        let op = match byte {
            0 => Opcode::LoadConst,
            1 => Opcode::LoadTrue,
            2 => Opcode::LoadFalse,
            3 => Opcode::LoadNull,
            5 => Opcode::Move,
            10 => Opcode::Add,
            11 => Opcode::Sub,
            12 => Opcode::Mul,
            13 => Opcode::Div,
            14 => Opcode::Mod,
            16 => Opcode::Neg,
            20 => Opcode::Eq,
            21 => Opcode::Ne,
            22 => Opcode::Lt,
            23 => Opcode::Le,
            24 => Opcode::Gt,
            25 => Opcode::Ge,
            26 => Opcode::Not,
            54 => Opcode::Return,
            55 => Opcode::Call,
            56 => Opcode::Closure,
            60 => Opcode::Jump,
            61 => Opcode::JumpIfFalse,
            62 => Opcode::JumpIfTrue,
            99 => Opcode::DefGlobal,
            100 => Opcode::GetGlobal,
            101 => Opcode::SetGlobal,
            110 => Opcode::GetMember,
            111 => Opcode::SetMember,
            255 => Opcode::Nop,
            _ => return None,
        };
        Some(op)
    }
}

/// Instruction encode/decode helpers shared by the code generator, the
/// loader and the interpreter.
pub mod instruction {
    use super::Opcode;

    pub fn encode_abc(op: Opcode, a: u8, b: u8, c: u8) -> u32 {
        ((op as u32) << 24) | ((a as u32) << 16) | ((b as u32) << 8) | c as u32
    }

    pub fn encode_abx(op: Opcode, a: u8, bx: u16) -> u32 {
        ((op as u32) << 24) | ((a as u32) << 16) | bx as u32
    }

    pub fn op(word: u32) -> Option<Opcode> {
        Opcode::from_u8((word >> 24) as u8)
    }

    pub fn a(word: u32) -> u8 {
        (word >> 16) as u8
    }

    pub fn b(word: u32) -> u8 {
        (word >> 8) as u8
    }

    pub fn c(word: u32) -> u8 {
        word as u8
    }

    pub fn bx(word: u32) -> u16 {
        word as u16
    }

    /// Rewrite the 16-bit immediate of an already-emitted ABx
    /// instruction. Used to patch forward jumps.
    pub fn patch_bx(word: u32, bx: u16) -> u32 {
        (word & 0xFFFF_0000) | bx as u32
    }
}

#[cfg(test)]
mod tests {
    use super::instruction::*;
    use super::*;

    #[test]
    fn abc_roundtrip() {
        let word = encode_abc(Opcode::Add, 1, 2, 3);
        assert_eq!(op(word), Some(Opcode::Add));
        assert_eq!(a(word), 1);
        assert_eq!(b(word), 2);
        assert_eq!(c(word), 3);
    }

    #[test]
    fn abx_roundtrip() {
        let word = encode_abx(Opcode::LoadConst, 7, 0xBEEF);
        assert_eq!(op(word), Some(Opcode::LoadConst));
        assert_eq!(a(word), 7);
        assert_eq!(bx(word), 0xBEEF);
    }

    #[test]
    fn patch_replaces_only_the_immediate() {
        let word = encode_abx(Opcode::Jump, 0, 0xFFFF);
        let patched = patch_bx(word, 42);
        assert_eq!(op(patched), Some(Opcode::Jump));
        assert_eq!(bx(patched), 42);
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        assert_eq!(Opcode::from_u8(200), None);
        assert_eq!(Opcode::from_u8(255), Some(Opcode::Nop));
    }

    #[test]
    fn discriminants_are_stable() {
        assert_eq!(Opcode::LoadConst as u8, 0);
        assert_eq!(Opcode::Call as u8, 55);
        assert_eq!(Opcode::GetMember as u8, 110);
        assert_eq!(Opcode::SetMember as u8, 111);
    }
}
