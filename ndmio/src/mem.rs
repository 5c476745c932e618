// SPDX-License-Identifier: MIT

use crate::{BlockIO, BlockIOError, BlockIOResult};

/// In-memory implementation of `BlockIO`.
///
/// Useful for tests and virtual disks.
#[derive(Debug)]
pub struct MemBlockIO<'a> {
    buffer: &'a mut [u8],
}

impl<'a> MemBlockIO<'a> {
    #[inline]
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer }
    }

    #[inline]
    fn check_bounds(&self, offset: u64, len: usize) -> BlockIOResult<core::ops::Range<usize>> {
        let end = offset
            .checked_add(len as u64)
            .ok_or(BlockIOError::OutOfBounds)?;
        if end > self.buffer.len() as u64 {
            return Err(BlockIOError::OutOfBounds);
        }
        Ok(offset as usize..end as usize)
    }
}

impl<'a> BlockIO for MemBlockIO<'a> {
    #[inline(always)]
    fn write_at(&mut self, offset: u64, data: &[u8]) -> BlockIOResult {
        let range = self.check_bounds(offset, data.len())?;
        self.buffer[range].copy_from_slice(data);
        Ok(())
    }

    #[inline(always)]
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> BlockIOResult {
        let range = self.check_bounds(offset, buf.len())?;
        buf.copy_from_slice(&self.buffer[range]);
        Ok(())
    }

    #[inline]
    fn flush(&mut self) -> BlockIOResult {
        Ok(())
    }

    #[inline]
    fn size_bytes(&mut self) -> BlockIOResult<u64> {
        Ok(self.buffer.len() as u64)
    }
}
