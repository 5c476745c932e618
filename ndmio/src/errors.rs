// SPDX-License-Identifier: MIT

use core::fmt;

/// Result type for BlockIO operations.
pub type BlockIOResult<T = ()> = core::result::Result<T, BlockIOError>;

/// Error type for BlockIO operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockIOError {
    /// Error reported by the operating system.
    #[cfg(feature = "std")]
    Io(std::io::ErrorKind),
    /// Read or write past the end of the device.
    OutOfBounds,
    Unsupported,
    Other(&'static str),
}

impl BlockIOError {
    pub fn msg(&self) -> &'static str {
        match self {
            #[cfg(feature = "std")]
            BlockIOError::Io(_) => "I/O error",
            BlockIOError::OutOfBounds => "Out of bounds",
            BlockIOError::Unsupported => "Unsupported operation",
            BlockIOError::Other(msg) => msg,
        }
    }
}

impl From<&'static str> for BlockIOError {
    #[inline]
    fn from(msg: &'static str) -> Self {
        BlockIOError::Other(msg)
    }
}

impl fmt::Display for BlockIOError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(feature = "std")]
            BlockIOError::Io(kind) => write!(f, "{}: {kind}", self.msg()),
            _ => write!(f, "{}", self.msg()),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BlockIOError {}

#[cfg(feature = "std")]
impl From<std::io::Error> for BlockIOError {
    #[cold]
    #[inline(never)]
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            // read_exact past the end of a device or image
            std::io::ErrorKind::UnexpectedEof => BlockIOError::OutOfBounds,
            kind => BlockIOError::Io(kind),
        }
    }
}
