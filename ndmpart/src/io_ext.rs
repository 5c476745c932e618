// SPDX-License-Identifier: MIT

//! LBA-aware BlockIO helpers to avoid `* sector_size` everywhere,
//! with overflow-check.

use ndmio::prelude::*;

/// Offset = LBA * sector_size (with overflow-check)
#[inline]
fn lba_offset(lba: u64, sector_size: u64) -> BlockIOResult<u64> {
    lba.checked_mul(sector_size)
        .ok_or(BlockIOError::Other("lba_offset overflow"))
}

/// LBA-aligned read/write
pub trait BlockIOLbaExt: BlockIO {
    /// Reads `buf.len()` bytes starting from an LBA (offset = lba * sector_size).
    #[inline]
    fn read_at_lba(&mut self, lba: u64, sector_size: u64, buf: &mut [u8]) -> BlockIOResult {
        let off = lba_offset(lba, sector_size)?;
        self.read_at(off, buf)
    }

    /// Writes `data` starting from an LBA (offset = lba * sector_size).
    #[inline]
    fn write_at_lba(&mut self, lba: u64, sector_size: u64, data: &[u8]) -> BlockIOResult {
        let off = lba_offset(lba, sector_size)?;
        self.write_at(off, data)
    }

    /// Reads a struct `T` starting from an LBA (size = size_of::<T>()).
    #[inline]
    fn read_struct_lba<T>(&mut self, lba: u64, sector_size: u64) -> BlockIOResult<T>
    where
        T: zerocopy::FromBytes + zerocopy::KnownLayout + zerocopy::Immutable,
    {
        let off = lba_offset(lba, sector_size)?;
        self.read_struct::<T>(off)
    }
}

impl<T: BlockIO + ?Sized> BlockIOLbaExt for T {}
