//! Opcode decoding.

use std::fmt;

/// Base mnemonics indexed by the operation field (`byte & 0x1f`).
///
/// Index 0 is the immediate block; its real name depends on the mode bits
/// and is resolved in [`Instr::base_name`].
const NAMES: [&str; 32] = [
    "BRK", "INC", "POP", "NIP", "SWP", "ROT", "DUP", "OVR", "EQU", "NEQ", "GTH", "LTH", "JMP",
    "JCN", "JSR", "STH", "LDZ", "STZ", "LDR", "STR", "LDA", "STA", "DEI", "DEO", "ADD", "SUB",
    "MUL", "DIV", "AND", "ORA", "EOR", "SFT",
];

/// A decoded instruction byte.
///
/// The low five bits select one of 32 operations; the top three bits are
/// the short/return/keep mode flags. When the operation field is zero the
/// byte is an *immediate* (`BRK`, `JCI`, `JMI`, `JSI` or the `LIT`
/// family), selected by the mode bits instead of modified by them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instr {
    /// The raw instruction byte.
    pub byte: u8,
    /// Operation index, 0..=31.
    pub op: u8,
    /// `2` mode: operands and results are 16-bit.
    pub short: bool,
    /// `r` mode: the active stack is the return stack.
    pub ret: bool,
    /// `k` mode: operand reads do not consume the stack.
    pub keep: bool,
}

impl Instr {
    /// Split an instruction byte into operation and mode bits.
    #[must_use]
    pub fn decode(byte: u8) -> Self {
        Self {
            byte,
            op: byte & 0x1f,
            short: byte & 0x20 != 0,
            ret: byte & 0x40 != 0,
            keep: byte & 0x80 != 0,
        }
    }

    /// True for the immediate block (`op == 0`).
    #[must_use]
    pub fn is_immediate(&self) -> bool {
        self.op == 0
    }

    fn base_name(&self) -> &'static str {
        if self.is_immediate() {
            match self.byte & 0xe0 {
                0x00 => "BRK",
                0x20 => "JCI",
                0x40 => "JMI",
                0x60 => "JSI",
                _ => "LIT",
            }
        } else {
            NAMES[usize::from(self.op)]
        }
    }
}

impl fmt::Display for Instr {
    /// Canonical mnemonic with mode suffixes, e.g. `ADD2kr`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_name())?;
        // Immediates other than LIT have fixed behavior and no suffixes;
        // LIT always has the keep bit set, so only 2 and r are shown.
        let lit = self.is_immediate() && self.byte >= 0x80;
        if self.is_immediate() && !lit {
            return Ok(());
        }
        if self.short {
            write!(f, "2")?;
        }
        if self.keep && !lit {
            write!(f, "k")?;
        }
        if self.ret {
            write!(f, "r")?;
        }
        Ok(())
    }
}
