// This file is part of albert16.
// Copyright (c) 2016-2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::fmt;

/// The Albert opcode map. Opcode words are full 16-bit values; anything
/// outside this table is reported as unknown and stops the simulation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Opcode {
    Nop = 1,
    DoLit = 2,
    Halt = 3,
    Bra = 4,
    Less = 5,
    PlusPlus = 6,
    Drop = 7,
    Store = 8,
    Fetch = 9,
    Jsr = 10,
    Ret = 11,
    Jmpf = 12,
    ToR = 13,
    FromR = 14,
    Sll = 15,
    RpFetch = 16,
    RpStore = 17,
    RFetch = 18,
    Dup = 19,
    SpFetch = 20,
    Swap = 21,
    Over = 22,
    SpStore = 23,
    Plus = 24,
    Sub = 25,
    Neg = 26,
    And = 27,
    Or = 28,
    Xor = 29,
    Mul = 30,
    Equal = 31,
    UmPlus = 32,
    Jsrint = 33,
    Reti = 34,
    Ei = 35,
    Sra = 36,
    Di = 37,
    Srl = 38,
    ToEs = 39,
    ToDs = 40,
    EsFetch = 41,
    DsFetch = 42,
    CsFetch = 43,
    LongFetch = 44,
    LongStore = 45,
    Syscall = 46,
    KSpStore = 47,
    Pushf = 48,
    Popf = 49,
    SLess = 50,
    LVar = 51,
    Store2 = 52,
}

impl Opcode {
    pub fn decode(word: u16) -> Option<Opcode> {
        match word {
            1 => Some(Opcode::Nop),
            2 => Some(Opcode::DoLit),
            3 => Some(Opcode::Halt),
            4 => Some(Opcode::Bra),
            5 => Some(Opcode::Less),
            6 => Some(Opcode::PlusPlus),
            7 => Some(Opcode::Drop),
            8 => Some(Opcode::Store),
            9 => Some(Opcode::Fetch),
            10 => Some(Opcode::Jsr),
            11 => Some(Opcode::Ret),
            12 => Some(Opcode::Jmpf),
            13 => Some(Opcode::ToR),
            14 => Some(Opcode::FromR),
            15 => Some(Opcode::Sll),
            16 => Some(Opcode::RpFetch),
            17 => Some(Opcode::RpStore),
            18 => Some(Opcode::RFetch),
            19 => Some(Opcode::Dup),
            20 => Some(Opcode::SpFetch),
            21 => Some(Opcode::Swap),
            22 => Some(Opcode::Over),
            23 => Some(Opcode::SpStore),
            24 => Some(Opcode::Plus),
            25 => Some(Opcode::Sub),
            26 => Some(Opcode::Neg),
            27 => Some(Opcode::And),
            28 => Some(Opcode::Or),
            29 => Some(Opcode::Xor),
            30 => Some(Opcode::Mul),
            31 => Some(Opcode::Equal),
            32 => Some(Opcode::UmPlus),
            33 => Some(Opcode::Jsrint),
            34 => Some(Opcode::Reti),
            35 => Some(Opcode::Ei),
            36 => Some(Opcode::Sra),
            37 => Some(Opcode::Di),
            38 => Some(Opcode::Srl),
            39 => Some(Opcode::ToEs),
            40 => Some(Opcode::ToDs),
            41 => Some(Opcode::EsFetch),
            42 => Some(Opcode::DsFetch),
            43 => Some(Opcode::CsFetch),
            44 => Some(Opcode::LongFetch),
            45 => Some(Opcode::LongStore),
            46 => Some(Opcode::Syscall),
            47 => Some(Opcode::KSpStore),
            48 => Some(Opcode::Pushf),
            49 => Some(Opcode::Popf),
            50 => Some(Opcode::SLess),
            51 => Some(Opcode::LVar),
            52 => Some(Opcode::Store2),
            _ => None,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Nop => "NOP",
            Opcode::DoLit => "DOLIT",
            Opcode::Halt => "HALT",
            Opcode::Bra => "BRA",
            Opcode::Less => "LESS",
            Opcode::PlusPlus => "++",
            Opcode::Drop => "DROP",
            Opcode::Store => "STORE",
            Opcode::Fetch => "FETCH",
            Opcode::Jsr => "JSR",
            Opcode::Ret => "RET",
            Opcode::Jmpf => "JMPF",
            Opcode::ToR => "TO_R",
            Opcode::FromR => "FROM_R",
            Opcode::Sll => "SLL",
            Opcode::RpFetch => "RP_FETCH",
            Opcode::RpStore => "RP_STORE",
            Opcode::RFetch => "R_FETCH",
            Opcode::Dup => "DUP",
            Opcode::SpFetch => "SP_FETCH",
            Opcode::Swap => "SWAP",
            Opcode::Over => "OVER",
            Opcode::SpStore => "SP_STORE",
            Opcode::Plus => "PLUS",
            Opcode::Sub => "SUB",
            Opcode::Neg => "NEG?",
            Opcode::And => "AND",
            Opcode::Or => "OR",
            Opcode::Xor => "XOR",
            Opcode::Mul => "MUL",
            Opcode::Equal => "EQUAL",
            Opcode::UmPlus => "UM+",
            Opcode::Jsrint => "JSRINT",
            Opcode::Reti => "RETI",
            Opcode::Ei => "EI",
            Opcode::Sra => "SRA",
            Opcode::Di => "DI",
            Opcode::Srl => "SRL",
            Opcode::ToEs => "TO_ES",
            Opcode::ToDs => "TO_DS",
            Opcode::EsFetch => "ES_FETCH",
            Opcode::DsFetch => "DS_FETCH",
            Opcode::CsFetch => "CS_FETCH",
            Opcode::LongFetch => "LONG_FETCH",
            Opcode::LongStore => "LONG_STORE",
            Opcode::Syscall => "SYSCALL",
            Opcode::KSpStore => "K_SP_STORE",
            Opcode::Pushf => "PUSHF",
            Opcode::Popf => "POPF",
            Opcode::SLess => "S_LESS",
            Opcode::LVar => "L_VAR",
            Opcode::Store2 => "STORE2",
        }
    }

    /// True for opcodes followed by an inline literal in the code stream.
    pub fn has_inline_operand(self) -> bool {
        match self {
            Opcode::DoLit | Opcode::Bra | Opcode::Jmpf | Opcode::Jsr | Opcode::LVar => true,
            _ => false,
        }
    }

    /// Number of parameter stack cells the opcode consumes, used by the
    /// disassembler to echo the operands that were on the stack.
    pub fn stack_arity(self) -> usize {
        match self {
            Opcode::Less
            | Opcode::SLess
            | Opcode::Plus
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::Equal
            | Opcode::UmPlus
            | Opcode::Store
            | Opcode::Store2
            | Opcode::LongStore
            | Opcode::Swap
            | Opcode::Over => 2,
            Opcode::Drop
            | Opcode::Dup
            | Opcode::Fetch
            | Opcode::LongFetch
            | Opcode::PlusPlus
            | Opcode::Neg
            | Opcode::ToR
            | Opcode::SpStore
            | Opcode::KSpStore
            | Opcode::ToDs
            | Opcode::ToEs
            | Opcode::Popf
            | Opcode::Sll
            | Opcode::Sra
            | Opcode::Srl
            | Opcode::Jmpf => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_known_opcodes() {
        assert_eq!(Some(Opcode::Nop), Opcode::decode(1));
        assert_eq!(Some(Opcode::UmPlus), Opcode::decode(32));
        assert_eq!(Some(Opcode::Store2), Opcode::decode(52));
    }

    #[test]
    fn decode_unknown_opcodes() {
        assert_eq!(None, Opcode::decode(0));
        assert_eq!(None, Opcode::decode(53));
        assert_eq!(None, Opcode::decode(0xffff));
    }

    #[test]
    fn inline_operands() {
        assert!(Opcode::DoLit.has_inline_operand());
        assert!(Opcode::Jsr.has_inline_operand());
        assert!(!Opcode::Plus.has_inline_operand());
    }
}
