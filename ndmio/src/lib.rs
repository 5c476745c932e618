// SPDX-License-Identifier: MIT
#![cfg_attr(not(feature = "std"), no_std)]

// Core modules
pub mod errors;
#[macro_use]
mod macros;

// Backend modules
#[cfg(feature = "mem")]
mod mem;

#[cfg(feature = "std")]
mod std;

// Prelude re-exports (central entrypoint)
pub mod prelude {
    pub use super::BlockIO;
    pub use super::BlockIOExt;
    pub use super::BlockIOStructExt;
    pub use super::errors::*;

    #[cfg(feature = "mem")]
    pub use super::mem::MemBlockIO;

    #[cfg(feature = "std")]
    pub use super::std::StdBlockIO;
}

// Internal use
use errors::*;

/// Maximum size of the stack scratch buffer used by struct reads.
/// 4 KiB = largest common logical sector size.
pub const BLOCK_BUF_SIZE: usize = 4096;

/// Block IO abstraction trait.
///
/// Allows read/write/flush at absolute byte offsets.
/// Implementations may target RAM, image files or block devices.
pub trait BlockIO {
    /// Writes `data` at `offset` (absolute).
    fn write_at(&mut self, offset: u64, data: &[u8]) -> BlockIOResult;

    /// Reads `buf.len()` bytes into `buf` from `offset` (absolute).
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> BlockIOResult;

    /// Flushes any buffered data (may be a no-op).
    fn flush(&mut self) -> BlockIOResult;

    /// Total addressable size of the backing storage, in bytes.
    fn size_bytes(&mut self) -> BlockIOResult<u64>;
}

impl<T: BlockIO + ?Sized> BlockIO for &mut T {
    #[inline]
    fn write_at(&mut self, offset: u64, data: &[u8]) -> BlockIOResult {
        (**self).write_at(offset, data)
    }

    #[inline]
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> BlockIOResult {
        (**self).read_at(offset, buf)
    }

    #[inline]
    fn flush(&mut self) -> BlockIOResult {
        (**self).flush()
    }

    #[inline]
    fn size_bytes(&mut self) -> BlockIOResult<u64> {
        (**self).size_bytes()
    }
}

/// Extension helpers for BlockIO.
///
/// - little-endian primitive reads/writes (`read_u16_at`, `write_u32_at`, ...)
/// - signature matching at a fixed offset
pub trait BlockIOExt: BlockIO {
    /// Returns `true` when the bytes at `offset` equal `magic`.
    ///
    /// Reads past the end of the device count as a mismatch, so probes can
    /// be run on devices smaller than the probed offset.
    fn matches_at(&mut self, offset: u64, magic: &[u8]) -> BlockIOResult<bool> {
        if magic.len() > BLOCK_BUF_SIZE {
            return Err(BlockIOError::Other("matches_at: magic too large"));
        }
        let mut buf = [0u8; BLOCK_BUF_SIZE];
        let buf = &mut buf[..magic.len()];
        match self.read_at(offset, buf) {
            Ok(()) => Ok(buf == magic),
            Err(BlockIOError::OutOfBounds) => Ok(false),
            Err(e) => Err(e),
        }
    }

    // Implements read/write helpers for primitive types (u16, u32, u64)
    blockio_impl_primitive_rw!(u16, u32, u64);
}

impl<T: BlockIO + ?Sized> BlockIOExt for T {}

/// Extension trait for reading and writing structs using zerocopy.
///
/// Requires the struct to implement zerocopy traits for safe conversion.
pub trait BlockIOStructExt: BlockIO {
    /// Reads a struct of type `T` from the given offset.
    fn read_struct<T: zerocopy::FromBytes + zerocopy::KnownLayout + zerocopy::Immutable>(
        &mut self,
        offset: u64,
    ) -> BlockIOResult<T> {
        let size = core::mem::size_of::<T>();
        if size > BLOCK_BUF_SIZE {
            return Err(BlockIOError::Other("read_struct: type too large"));
        }
        let mut buf = [0u8; BLOCK_BUF_SIZE];
        self.read_at(offset, &mut buf[..size])?;
        T::read_from_bytes(&buf[..size]).map_err(|_| BlockIOError::Other("read_struct failed"))
    }

    /// Writes a struct of type `T` at the given offset.
    fn write_struct<T: zerocopy::IntoBytes + zerocopy::KnownLayout + zerocopy::Immutable>(
        &mut self,
        offset: u64,
        val: &T,
    ) -> BlockIOResult {
        self.write_at(offset, val.as_bytes())
    }
}

impl<T: BlockIO + ?Sized> BlockIOStructExt for T {}
