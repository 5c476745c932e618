// SPDX-License-Identifier: MIT
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(all(not(feature = "std"), feature = "alloc"))]
extern crate alloc;

// On-disk structures are (de)serialized with zerocopy as native integers.
#[cfg(target_endian = "big")]
compile_error!("ndmpart only supports little-endian targets");

#[macro_use]
mod macros;
mod io_ext;

pub mod errors;
/// GUID Partition Table (GPT) implementation.
#[cfg(feature = "alloc")]
pub mod gpt;
/// Common Partition Type GUIDs.
pub mod guids;
/// Master Boot Record (MBR) and Protective MBR implementation.
pub mod mbr;

#[cfg(feature = "alloc")]
pub mod scanner;
#[cfg(feature = "alloc")]
pub use scanner::{DiskScanOptions, TableKind, detect_table, scan_disk, validate_full_disk};

pub const DEFAULT_SECTOR_SIZE: u64 = 512;
