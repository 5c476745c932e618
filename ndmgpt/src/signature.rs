// SPDX-License-Identifier: MIT

//! Filesystem and volume signature probing.
//!
//! Only magic numbers at fixed offsets are checked, no superblock is parsed
//! beyond what is needed to tell ext2, ext3 and ext4 apart.

use core::fmt;

use ndmio::prelude::*;

/// Recognized on-disk signatures, displayed with their blkid `TYPE` names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsSignature {
    Ext2,
    Ext3,
    Ext4,
    Xfs,
    Btrfs,
    Fat,
    ExFat,
    Ntfs,
    Iso9660,
    Swap,
    Lvm2,
    Luks,
    F2fs,
    LinuxRaid,
}

impl fmt::Display for FsSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FsSignature::Ext2 => "ext2",
            FsSignature::Ext3 => "ext3",
            FsSignature::Ext4 => "ext4",
            FsSignature::Xfs => "xfs",
            FsSignature::Btrfs => "btrfs",
            FsSignature::Fat => "vfat",
            FsSignature::ExFat => "exfat",
            FsSignature::Ntfs => "ntfs",
            FsSignature::Iso9660 => "iso9660",
            FsSignature::Swap => "swap",
            FsSignature::Lvm2 => "LVM2_member",
            FsSignature::Luks => "crypto_LUKS",
            FsSignature::F2fs => "f2fs",
            FsSignature::LinuxRaid => "linux_raid_member",
        })
    }
}

/// Capability: list the filesystem signatures present on a device.
pub trait SignatureProbe {
    fn probe_signatures(&mut self) -> BlockIOResult<Vec<FsSignature>>;
}

const EXT_SUPERBLOCK: u64 = 1024;
const EXT_MAGIC: [u8; 2] = [0x53, 0xEF];
const EXT_FEATURE_COMPAT: u64 = EXT_SUPERBLOCK + 0x5C;
const EXT_FEATURE_INCOMPAT: u64 = EXT_SUPERBLOCK + 0x60;
const EXT3_COMPAT_HAS_JOURNAL: u32 = 0x0004;
// extents, 64bit, flex_bg
const EXT4_INCOMPAT_MASK: u32 = 0x0040 | 0x0080 | 0x0200;

const BOOT_SIGNATURE: [u8; 2] = [0x55, 0xAA];

/// `(signature, byte offset, magic)`, first match per signature wins.
const MAGICS: &[(FsSignature, u64, &[u8])] = &[
    (FsSignature::Xfs, 0, b"XFSB"),
    (FsSignature::Btrfs, 0x10040, b"_BHRfS_M"),
    (FsSignature::ExFat, 3, b"EXFAT   "),
    (FsSignature::Ntfs, 3, b"NTFS    "),
    (FsSignature::Iso9660, 0x8001, b"CD001"),
    (FsSignature::Swap, 4096 - 10, b"SWAPSPACE2"),
    (FsSignature::Swap, 4096 - 10, b"SWAP-SPACE"),
    (FsSignature::Swap, 8192 - 10, b"SWAPSPACE2"),
    (FsSignature::Swap, 16384 - 10, b"SWAPSPACE2"),
    (FsSignature::Swap, 65536 - 10, b"SWAPSPACE2"),
    (FsSignature::Lvm2, 0, b"LABELONE"),
    (FsSignature::Lvm2, 512, b"LABELONE"),
    (FsSignature::Lvm2, 1024, b"LABELONE"),
    (FsSignature::Lvm2, 1536, b"LABELONE"),
    (FsSignature::Luks, 0, b"LUKS\xBA\xBE"),
    (FsSignature::F2fs, 1024, &[0x10, 0x20, 0xF5, 0xF2]),
    // md superblock 1.1 at the start, 1.2 at 4KiB
    (FsSignature::LinuxRaid, 0, &[0xFC, 0x4E, 0x2B, 0xA9]),
    (FsSignature::LinuxRaid, 4096, &[0xFC, 0x4E, 0x2B, 0xA9]),
];

/// Probes every known signature, in a stable order, without duplicates.
///
/// Regions past the end of the device simply do not match.
pub fn probe_signatures<IO: BlockIO + ?Sized>(io: &mut IO) -> BlockIOResult<Vec<FsSignature>> {
    let mut found = Vec::new();

    if let Some(ext) = probe_ext(io)? {
        found.push(ext);
    }
    if probe_fat(io)? {
        found.push(FsSignature::Fat);
    }
    for &(sig, offset, magic) in MAGICS {
        if !found.contains(&sig) && io.matches_at(offset, magic)? {
            found.push(sig);
        }
    }

    Ok(found)
}

fn probe_ext<IO: BlockIO + ?Sized>(io: &mut IO) -> BlockIOResult<Option<FsSignature>> {
    if !io.matches_at(EXT_SUPERBLOCK + 0x38, &EXT_MAGIC)? {
        return Ok(None);
    }
    // a device cut short after the magic has no feature words, call it ext2
    let compat = match io.read_u32_at(EXT_FEATURE_COMPAT) {
        Err(BlockIOError::OutOfBounds) => return Ok(Some(FsSignature::Ext2)),
        r => r?,
    };
    let incompat = match io.read_u32_at(EXT_FEATURE_INCOMPAT) {
        Err(BlockIOError::OutOfBounds) => 0,
        r => r?,
    };

    let kind = if incompat & EXT4_INCOMPAT_MASK != 0 {
        FsSignature::Ext4
    } else if compat & EXT3_COMPAT_HAS_JOURNAL != 0 {
        FsSignature::Ext3
    } else {
        FsSignature::Ext2
    };
    Ok(Some(kind))
}

/// FAT12/16 keep their type string at 54, FAT32 at 82; both need 0x55AA.
fn probe_fat<IO: BlockIO + ?Sized>(io: &mut IO) -> BlockIOResult<bool> {
    if !io.matches_at(510, &BOOT_SIGNATURE)? {
        return Ok(false);
    }
    Ok(io.matches_at(82, b"FAT32   ")? || io.matches_at(54, b"FAT")?)
}
