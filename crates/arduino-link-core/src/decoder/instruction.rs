//! Two-byte instruction token

use std::fmt;

/// One instruction: two consecutive bytes from the device, in arrival order
///
/// Bytes are shown as Latin-1 characters, so any byte value round-trips
/// through [`fmt::Display`] as exactly two `char`s.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instruction([u8; Instruction::LEN]);

impl Instruction {
    /// Bytes per instruction
    pub const LEN: usize = 2;

    /// Build from the two bytes in arrival order
    pub const fn new(first: u8, second: u8) -> Self {
        Instruction([first, second])
    }

    /// Build from a slice of exactly [`Instruction::LEN`] bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [a, b] => Some(Instruction::new(*a, *b)),
            _ => None,
        }
    }

    /// Raw bytes
    pub const fn bytes(&self) -> [u8; Instruction::LEN] {
        self.0
    }

    /// First character, which selects the command
    pub fn opcode(&self) -> char {
        self.0[0] as char
    }

    /// Second character
    pub fn operand(&self) -> char {
        self.0[1] as char
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.opcode(), self.operand())
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instruction({:?})", self.to_string())
    }
}

impl PartialEq<str> for Instruction {
    fn eq(&self, other: &str) -> bool {
        other.chars().eq(self.0.iter().map(|&b| b as char))
    }
}

impl PartialEq<&str> for Instruction {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl From<Instruction> for String {
    fn from(i: Instruction) -> Self {
        i.to_string()
    }
}
