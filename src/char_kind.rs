//! Kinds of the characters around an input position, used to resolve anchors.

use std::fmt::{Display, Formatter};

/// Kind of the character on one side of a position.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[repr(u32)]
pub enum CharKind {
    /// Any other character.
    General = 0,
    /// Start or end of the input.
    StartStop = 1,
    /// `\n`.
    Newline = 2,
    /// The final `\n` of the input (first in reverse mode); both `Newline` and `StartStop` bits are set.
    NewlineS = 3,
    /// A word letter.
    WordLetter = 4,
}

impl CharKind {
    fn from_bits(bits: u32) -> Self {
        match bits {
            1 => CharKind::StartStop,
            2 => CharKind::Newline,
            3 => CharKind::NewlineS,
            4 => CharKind::WordLetter,
            _ => CharKind::General,
        }
    }

    pub fn is_word_letter(self) -> bool {
        self == CharKind::WordLetter
    }

    /// `StartStop` or `NewlineS`.
    pub fn is_start_stop(self) -> bool {
        self as u32 & CharKind::StartStop as u32 != 0
    }

    /// `Newline` or `NewlineS`.
    pub fn is_newline(self) -> bool {
        self as u32 & CharKind::Newline as u32 != 0
    }
}

impl Display for CharKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CharKind::General => "",
            CharKind::StartStop => "\\A",
            CharKind::Newline => "\\n",
            CharKind::NewlineS => "\\A\\n",
            CharKind::WordLetter => "\\w",
        };
        write!(f, "{}", s)
    }
}

/// Pair of the previous and the next character kind, packed as `next << 3 | prev`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Context(u32);

impl Context {
    /// Number of distinct packed contexts.
    pub const COUNT: usize = 64;

    pub fn new(prev: CharKind, next: CharKind) -> Self {
        Context(((next as u32) << 3) | prev as u32)
    }

    pub fn prev(self) -> CharKind {
        CharKind::from_bits(self.0 & 0x7)
    }

    pub fn next(self) -> CharKind {
        CharKind::from_bits(self.0 >> 3)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for Context {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.next() {
            CharKind::General => write!(f, "{}", self.prev()),
            next => write!(f, "{}/{}", self.prev(), next),
        }
    }
}
