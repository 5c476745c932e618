// SPDX-License-Identifier: MIT

use core::fmt;

use ndmio::errors::*;

/// Unified error type for partition tools (GPT, MBR)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartError {
    IO(BlockIOError),
    Unsupported,
    NotFound,
    Invalid(&'static str),
    Other(&'static str),
}

impl PartError {
    pub fn msg(&self) -> &'static str {
        match self {
            PartError::IO(e) => e.msg(),
            PartError::Unsupported => "Unsupported",
            PartError::NotFound => "No partition table found",
            PartError::Invalid(msg) => msg,
            PartError::Other(msg) => msg,
        }
    }
}

impl From<&'static str> for PartError {
    fn from(s: &'static str) -> Self {
        PartError::Other(s)
    }
}

impl From<BlockIOError> for PartError {
    fn from(e: BlockIOError) -> Self {
        PartError::IO(e)
    }
}

impl fmt::Display for PartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartError::IO(e) => write!(f, "{e}"),
            _ => write!(f, "{}", self.msg()),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PartError {}

pub type PartResult<T = ()> = Result<T, PartError>;
