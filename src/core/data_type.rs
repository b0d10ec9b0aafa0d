use serde::{Deserialize, Serialize};

/// Maximum number of bytes a `Text` value may hold on disk.
pub const STRING_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 32-bit signed integer
    Int,
    /// Fixed-width string: length prefix + `STRING_LEN` bytes
    Text,
}

impl DataType {
    /// Number of bytes a value of this type occupies inside a page slot
    #[must_use]
    pub const fn len(self) -> usize {
        match self {
            Self::Int => 4,
            Self::Text => 4 + STRING_LEN,
        }
    }

    /// Types with a total order that supports arithmetic aggregates
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Int)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int => write!(f, "INT"),
            Self::Text => write!(f, "TEXT"),
        }
    }
}
