// SPDX-License-Identifier: MIT

use std::io::{Read, Seek, SeekFrom, Write};

use crate::{BlockIO, BlockIOResult};

/// `BlockIO` over anything seekable: image files, block device nodes, cursors.
#[derive(Debug)]
pub struct StdBlockIO<T: Read + Write + Seek> {
    io: T,
}

impl<T: Read + Write + Seek> StdBlockIO<T> {
    #[inline]
    pub fn new(io: T) -> Self {
        Self { io }
    }
}

impl<T: Read + Write + Seek> BlockIO for StdBlockIO<T> {
    fn write_at(&mut self, offset: u64, data: &[u8]) -> BlockIOResult {
        self.io.seek(SeekFrom::Start(offset))?;
        self.io.write_all(data)?;
        Ok(())
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> BlockIOResult {
        self.io.seek(SeekFrom::Start(offset))?;
        self.io.read_exact(buf)?;
        Ok(())
    }

    fn flush(&mut self) -> BlockIOResult {
        self.io.flush()?;
        Ok(())
    }

    /// Block device nodes report a zero metadata length, seeking to the end
    /// works for both devices and regular files.
    fn size_bytes(&mut self) -> BlockIOResult<u64> {
        let len = self.io.seek(SeekFrom::End(0))?;
        self.io.seek(SeekFrom::Start(0))?;
        Ok(len)
    }
}
