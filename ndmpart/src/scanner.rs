// SPDX-License-Identifier: MIT

#[cfg(not(feature = "std"))]
use alloc::{format, string::String, string::ToString, vec::Vec};

use ndmio::prelude::*;

use crate::{
    DEFAULT_SECTOR_SIZE,
    errors::*,
    gpt::{self, GPT_SIGNATURE, GptHeader},
    guids::GptPartitionKind,
    mbr::{self, MbrKind},
};

/// Disk scan options
#[derive(Clone, Copy, Debug)]
pub struct DiskScanOptions {
    /// Logical sector (LBA) size in bytes
    pub sector_size: u64,
    /// Check partition bounds, alignment and overlaps
    pub validate_bounds: bool,
}

impl Default for DiskScanOptions {
    fn default() -> Self {
        Self {
            sector_size: DEFAULT_SECTOR_SIZE,
            validate_bounds: true,
        }
    }
}

impl DiskScanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_bounds(mut self) -> Self {
        self.validate_bounds = false;
        self
    }

    pub fn with_sector_size(mut self, sz: u64) -> Self {
        self.sector_size = sz;
        self
    }
}

/// Kind of partition table found on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// Protective MBR, or a primary/backup `EFI PART` header.
    Gpt,
    /// Legacy MBR with at least one well-formed entry.
    Mbr,
}

impl core::fmt::Display for TableKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TableKind::Gpt => f.write_str("gpt"),
            TableKind::Mbr => f.write_str("dos"),
        }
    }
}

/// Partition info
#[derive(Debug, Clone)]
pub struct PartitionInfo {
    /// 1-based, as numbered by the kernel
    pub number: usize,
    pub kind: GptPartitionKind,
    pub type_guid: [u8; 16],
    pub unique_guid: [u8; 16],
    pub start_lba: u64,
    pub end_lba: u64,
    pub start_bytes: u64,
    pub size_bytes: u64,
    pub attrs: u64,
    pub name: String,
}

/// Global scan result
#[derive(Debug, Clone)]
pub struct DiskInfo {
    pub mbr_kind: MbrKind,
    pub sector_size: u64,
    pub gpt_header: Option<GptHeader>,
    pub partitions: Vec<PartitionInfo>,
}

impl core::fmt::Display for DiskInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let gpt_state = if self.gpt_header.is_some() {
            "present"
        } else {
            "absent"
        };

        writeln!(
            f,
            "Disk layout • sector: {} • MBR: {:?} • GPT: {}",
            sep_u64(self.sector_size),
            self.mbr_kind,
            gpt_state
        )?;

        writeln!(
            f,
            "  ┌────┬──────────────────────────────┬──────────────────────────────┬──────────────┬──────────────┬───────────────┐"
        )?;
        writeln!(
            f,
            "  | Nr | Name                         | Type                         | Start LBA    | End LBA      | Size          |"
        )?;
        writeln!(
            f,
            "  ├────┼──────────────────────────────┼──────────────────────────────┼──────────────┼──────────────┼───────────────┤"
        )?;

        for p in &self.partitions {
            writeln!(
                f,
                "  | {:<2} | {:<28} | {:<28} | {:>12} | {:>12} | {:>13} |",
                p.number,
                truncate(&p.name, 28),
                truncate(&p.kind.to_string(), 28),
                sep_u64(p.start_lba),
                sep_u64(p.end_lba),
                pretty_bytes(p.size_bytes),
            )?;
        }

        write!(
            f,
            "  └────┴──────────────────────────────┴──────────────────────────────┴──────────────┴──────────────┴───────────────┘"
        )
    }
}

/// Looks for any partition table on the device without validating it.
///
/// Checks, in order: the `EFI PART` signature at LBA 1, the MBR at LBA 0
/// (an empty DOS label counts, a FAT/NTFS/exFAT boot sector does not),
/// and the backup `EFI PART` signature at the last LBA (a primary wiped by
/// hand still leaves the backup behind). Devices shorter than one sector
/// carry no table.
pub fn detect_table<IO: BlockIO + ?Sized>(
    io: &mut IO,
    sector_size: u64,
) -> PartResult<Option<TableKind>> {
    if gpt::has_gpt_signature(io, sector_size)? {
        return Ok(Some(TableKind::Gpt));
    }

    match mbr::read_mbr_raw(io) {
        Ok(m) => match m.kind() {
            MbrKind::Protective => return Ok(Some(TableKind::Gpt)),
            MbrKind::Legacy => return Ok(Some(TableKind::Mbr)),
            MbrKind::Empty if m.is_empty_label() && !is_fs_boot_sector(io)? => {
                return Ok(Some(TableKind::Mbr));
            }
            MbrKind::Empty => {}
        },
        Err(PartError::IO(BlockIOError::OutOfBounds)) => return Ok(None),
        Err(e) => return Err(e),
    }

    let total_sectors = io.size_bytes()? / sector_size;
    if total_sectors > gpt::GPT_PRIMARY_HEADER_LBA + 1 {
        let last = (total_sectors - 1) * sector_size;
        if io.matches_at(last, GPT_SIGNATURE)? {
            return Ok(Some(TableKind::Gpt));
        }
    }

    Ok(None)
}

/// FAT type string at 54 (FAT12/16) or 82 (FAT32), or an NTFS/exFAT OEM ID.
fn is_fs_boot_sector<IO: BlockIO + ?Sized>(io: &mut IO) -> PartResult<bool> {
    Ok(io.matches_at(54, b"FAT")?
        || io.matches_at(82, b"FAT32   ")?
        || io.matches_at(3, b"NTFS    ")?
        || io.matches_at(3, b"EXFAT   ")?)
}

/// Main scan: detects MBR (empty/protective/legacy), GPT and partitions
pub fn scan_disk<IO: BlockIO + ?Sized>(io: &mut IO, opts: DiskScanOptions) -> PartResult<DiskInfo> {
    // 1) Raw MBR (no failure if not protective)
    let mbr_kind = mbr::read_mbr_raw(io)?.kind();

    // 2) Protective MBR: read header + entries
    let mut gpt_header: Option<GptHeader> = None;
    let mut parts: Vec<PartitionInfo> = Vec::new();

    if matches!(mbr_kind, MbrKind::Protective) {
        let (header, entries) = gpt::read_gpt_with_sector(io, opts.sector_size)?;

        if opts.validate_bounds {
            header.validate_entries(&entries, opts.sector_size)?;
        }

        gpt_header = Some(header);

        for (idx, e) in entries.iter().enumerate() {
            let start_bytes = e
                .start_lba
                .checked_mul(opts.sector_size)
                .ok_or(PartError::Other("start_bytes overflow"))?;
            let size_lba = e
                .end_lba
                .checked_sub(e.start_lba)
                .and_then(|n| n.checked_add(1))
                .ok_or(PartError::Other("size_lba underflow"))?;
            let size_bytes = size_lba
                .checked_mul(opts.sector_size)
                .ok_or(PartError::Other("size_bytes overflow"))?;

            parts.push(PartitionInfo {
                number: idx + 1,
                kind: e.kind(),
                type_guid: e.type_guid,
                unique_guid: e.unique_guid,
                start_lba: e.start_lba,
                end_lba: e.end_lba,
                start_bytes,
                size_bytes,
                attrs: e.attributes,
                name: e.name_string(),
            });
        }
    }

    Ok(DiskInfo {
        mbr_kind,
        sector_size: opts.sector_size,
        gpt_header,
        partitions: parts,
    })
}

/// Full-disk validation:
/// - primary GPT header + entries (CRC, bounds, overlaps)
/// - backup GPT header + entries, identical entries to the primary
/// - protective MBR coherent with the disk size
pub fn validate_full_disk<IO: BlockIO + ?Sized>(io: &mut IO, sector_size: u64) -> PartResult<()> {
    let (header, parts) = gpt::read_gpt_with_sector(io, sector_size)?;
    header.validate_entries(&parts, sector_size)?;

    let total_sectors = header.backup_lba + 1;
    let (backup, backup_parts) =
        gpt::read_backup_gpt_with_sector(io, total_sectors, sector_size)?;
    if backup.entries_crc != header.entries_crc || backup_parts != parts {
        return Err(PartError::Invalid("GPT: backup table differs from primary"));
    }

    let m = mbr::read_mbr(io)?;
    m.validate_protective(total_sectors)?;

    Ok(())
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn pretty_bytes(n: u64) -> String {
    const UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];
    let mut val = n as f64;
    let mut idx = 0usize;
    while val >= 1024.0 && idx + 1 < UNITS.len() {
        val /= 1024.0;
        idx += 1;
    }
    if idx == 0 {
        format!("{} {}", sep_u64(n), UNITS[idx])
    } else {
        format!("{:.1} {}", val, UNITS[idx])
    }
}

fn sep_u64(mut n: u64) -> String {
    // thousands separator: 12 345 678
    if n < 1_000 {
        return n.to_string();
    }
    let mut parts: Vec<String> = Vec::new();
    while n >= 1_000 {
        parts.push(format!("{:03}", (n % 1_000)));
        n /= 1_000;
    }
    parts.push(n.to_string());
    parts.reverse();
    parts.join(" ")
}
