// SPDX-License-Identifier: MIT

//! Opening a device path and discovering its geometry.

use std::{
    fs::{self, File, OpenOptions},
    io,
    path::Path,
};

use ndmio::prelude::*;
use ndmpart::DEFAULT_SECTOR_SIZE;
use tracing::{debug, warn};

use crate::{
    disk::Disk,
    error::{NdmError, NdmResult},
};

#[cfg(target_os = "linux")]
const SYSFS_BLOCK: &str = "/sys/class/block";

/// Probe-time settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOptions {
    /// Logical block size assumed for regular image files.
    pub sector_size: Option<u64>,
    /// Open without write access.
    pub read_only: bool,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            sector_size: None,
            read_only: true,
        }
    }
}

impl ProbeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sector_size(mut self, sz: Option<u64>) -> Self {
        self.sector_size = sz;
        self
    }

    pub fn read_only(mut self, ro: bool) -> Self {
        self.read_only = ro;
        self
    }
}

pub type DeviceDisk = Disk<StdBlockIO<File>>;

/// Opens a block device or a regular image file.
///
/// Block sizes of block devices come from the kernel and win over
/// `opts.sector_size`; image files use `opts.sector_size` or 512.
pub fn open_device(path: &str, opts: &ProbeOptions) -> NdmResult<DeviceDisk> {
    if path.is_empty() {
        return Err(NdmError::device_open(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "no device path given"),
        ));
    }

    let meta = fs::metadata(path).map_err(|e| NdmError::device_open(path, e))?;
    let is_block = is_block_device(&meta);
    if !is_block && !meta.is_file() {
        return Err(NdmError::device_open(
            path,
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "neither a block device nor a regular file",
            ),
        ));
    }

    let file = OpenOptions::new()
        .read(true)
        .write(!opts.read_only)
        .open(path)
        .map_err(|e| NdmError::device_open(path, e))?;

    let (logical, physical) = if is_block {
        let (logical, physical) = kernel_block_sizes(Path::new(path));
        if let Some(sz) = opts.sector_size.filter(|&sz| sz != logical) {
            warn!(path, requested = sz, logical, "ignoring sector size override for block device");
        }
        (logical, physical)
    } else {
        let sz = opts.sector_size.unwrap_or(DEFAULT_SECTOR_SIZE);
        (sz, sz)
    };

    let disk = Disk::new(StdBlockIO::new(file), logical, physical)
        .map_err(|e| NdmError::device_open(path, io::Error::other(e)))?;
    debug!(path, block_device = is_block, geometry = ?disk.geometry(), "device opened");
    Ok(disk)
}

#[cfg(unix)]
fn is_block_device(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::FileTypeExt;
    meta.file_type().is_block_device()
}

#[cfg(not(unix))]
fn is_block_device(_meta: &fs::Metadata) -> bool {
    false
}

/// `(logical, physical)` block sizes, 512 when the kernel does not say.
#[cfg(target_os = "linux")]
fn kernel_block_sizes(dev: &Path) -> (u64, u64) {
    sysfs_block_sizes(Path::new(SYSFS_BLOCK), dev).unwrap_or_else(|| {
        warn!(device = %dev.display(), "block size not found in sysfs, assuming 512");
        (DEFAULT_SECTOR_SIZE, DEFAULT_SECTOR_SIZE)
    })
}

#[cfg(not(target_os = "linux"))]
fn kernel_block_sizes(dev: &Path) -> (u64, u64) {
    warn!(device = %dev.display(), "block size discovery unsupported, assuming 512");
    (DEFAULT_SECTOR_SIZE, DEFAULT_SECTOR_SIZE)
}

/// Reads `queue/{logical,physical}_block_size` for the device node `dev`.
///
/// Symlinks such as `/dev/disk/by-id/...` are resolved first. Partitions
/// have no `queue` directory of their own, so the parent disk is tried next.
#[cfg(any(target_os = "linux", test))]
fn sysfs_block_sizes(sysfs_root: &Path, dev: &Path) -> Option<(u64, u64)> {
    let real = fs::canonicalize(dev).unwrap_or_else(|_| dev.to_path_buf());
    let name = real.file_name()?;
    let base = sysfs_root.join(name);

    let queue = [base.join("queue"), base.join("..").join("queue")]
        .into_iter()
        .find(|q| q.is_dir())?;

    let logical = read_sysfs_u64(&queue.join("logical_block_size"))?;
    if logical == 0 {
        return None;
    }
    let physical = read_sysfs_u64(&queue.join("physical_block_size"))
        .filter(|&p| p != 0)
        .unwrap_or(logical);
    Some((logical, physical))
}

#[cfg(any(target_os = "linux", test))]
fn read_sysfs_u64(path: &Path) -> Option<u64> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}
