// SPDX-License-Identifier: MIT
#[cfg(all(not(feature = "std"), feature = "alloc"))]
extern crate alloc;
#[cfg(all(not(feature = "std"), feature = "alloc"))]
use alloc::{string::String, vec, vec::Vec};

use crate::guids::GptPartitionKind;
use crate::{errors::*, io_ext::BlockIOLbaExt};
use ndmio::prelude::*;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub const GPT_ENTRY_SIZE: usize = 128;
pub const GPT_PRIMARY_HEADER_LBA: u64 = 1;
pub const GPT_PRIMARY_ENTRIES_LBA: u64 = 2;
pub const GPT_DEFAULT_NUM_ENTRIES: usize = 128;
/// Bytes taken by the default partition entry array (128 * 128).
pub const GPT_ENTRIES_BYTES: u64 = (GPT_DEFAULT_NUM_ENTRIES * GPT_ENTRY_SIZE) as u64;
pub const GPT_HEADER_SIZE: u32 = 92;
pub const GPT_SIGNATURE: &[u8; 8] = b"EFI PART";
pub const GPT_REVISION: u32 = 0x00010000;
pub const GPT_NAME_UNITS: usize = 36;

/// Number of sectors in 1 MiB, at least 1.
#[inline]
pub fn align_lba_1m(sector_size: u64) -> u64 {
    ((1 << 20) / sector_size).max(1)
}

/// Sectors taken by an entry array of `num_entries * entry_size` bytes.
#[inline]
pub fn entries_sectors(num_entries: u32, entry_size: u32, sector_size: u64) -> u64 {
    (num_entries as u64 * entry_size as u64).div_ceil(sector_size)
}

pub fn encode_gpt_name(name: &str) -> [u16; GPT_NAME_UNITS] {
    let mut buf = [0u16; GPT_NAME_UNITS];
    for (i, c) in name.encode_utf16().take(GPT_NAME_UNITS).enumerate() {
        buf[i] = c;
    }
    buf
}

/// Decodes a GPT name (UTF-16LE) up to the first NUL, replacing invalid code points.
#[cfg(feature = "alloc")]
pub fn decode_gpt_name(name: &[u16; GPT_NAME_UNITS]) -> String {
    let end = name.iter().position(|&c| c == 0).unwrap_or(GPT_NAME_UNITS);
    String::from_utf16_lossy(&name[..end])
}

#[inline]
fn crc32(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes)
}

#[inline]
fn compute_header_crc32(mut header: GptHeader) -> u32 {
    header.header_crc = 0;
    let bytes = header.as_bytes();
    crc32(&bytes[..header.header_size as usize])
}

#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct GptEntry {
    pub type_guid: [u8; 16],
    pub unique_guid: [u8; 16],
    pub start_lba: u64,
    pub end_lba: u64,
    pub attributes: u64,
    pub name: [u16; GPT_NAME_UNITS],
}

impl GptEntry {
    pub fn new(
        type_guid: [u8; 16],
        unique_guid: [u8; 16],
        start_lba: u64,
        end_lba: u64,
        attributes: u64,
        name: &str,
    ) -> Self {
        Self {
            type_guid,
            unique_guid,
            start_lba,
            end_lba,
            attributes,
            name: encode_gpt_name(name),
        }
    }

    #[inline]
    pub fn kind(&self) -> GptPartitionKind {
        GptPartitionKind::from_guid(&self.type_guid)
    }

    #[cfg(feature = "alloc")]
    #[inline]
    pub fn name_string(&self) -> String {
        decode_gpt_name(&self.name)
    }

    pub fn is_empty(&self) -> bool {
        self.type_guid.iter().all(|&b| b == 0)
    }

    pub fn validate_basic(&self) -> PartResult<()> {
        if self.is_empty() {
            return Ok(());
        }
        if self.end_lba < self.start_lba {
            return Err(PartError::Invalid("GPT: partition ends before it starts"));
        }
        Ok(())
    }

    pub fn validate_in_bounds(
        &self,
        first_usable: u64,
        last_usable: u64,
        align: u64,
    ) -> PartResult<()> {
        if self.is_empty() {
            return Ok(());
        }
        if self.start_lba < first_usable {
            return Err(PartError::Invalid(
                "GPT: partition starts before first usable LBA",
            ));
        }
        if self.end_lba > last_usable {
            return Err(PartError::Invalid(
                "GPT: partition ends after last usable LBA",
            ));
        }
        if self.start_lba % align != 0 {
            return Err(PartError::Invalid("GPT: partition start not aligned"));
        }
        Ok(())
    }
}

#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C)]
pub struct GptHeader {
    pub signature: [u8; 8],
    pub revision: u32,
    pub header_size: u32,
    pub header_crc: u32,
    pub reserved: u32,
    pub current_lba: u64,
    pub backup_lba: u64,
    pub first_usable_lba: u64,
    pub last_usable_lba: u64,
    pub disk_guid: [u8; 16],
    pub entries_lba: u64,
    pub num_entries: u32,
    pub entry_size: u32,
    pub entries_crc: u32,
    pub reserved2: [u8; 420],
}

impl GptHeader {
    /// Primary header for a disk of `total_sectors`.
    ///
    /// Usable range is everything between the primary entry array and the
    /// backup entry array: `[2 + E, total - 2 - E]` where `E` is the entry
    /// array length in sectors.
    pub fn new_primary(
        total_sectors: u64,
        disk_guid: [u8; 16],
        num_entries: u32,
        entry_size: u32,
        sector_size: u64,
    ) -> PartResult<Self> {
        let entries_sectors = entries_sectors(num_entries, entry_size, sector_size);

        let entries_lba = GPT_PRIMARY_ENTRIES_LBA;
        let first_usable_lba = entries_lba + entries_sectors;
        let tail = 1 + entries_sectors;

        let last_usable_lba = total_sectors
            .checked_sub(1)
            .and_then(|x| x.checked_sub(tail))
            .ok_or(PartError::Invalid("GPT: disk too small (headers/tables)"))?;

        if first_usable_lba > last_usable_lba {
            return Err(PartError::Invalid("GPT: disk too small (headers/tables)"));
        }

        Ok(Self {
            signature: *GPT_SIGNATURE,
            revision: GPT_REVISION,
            header_size: GPT_HEADER_SIZE,
            header_crc: 0,
            reserved: 0,
            current_lba: GPT_PRIMARY_HEADER_LBA,
            backup_lba: total_sectors - 1,
            first_usable_lba,
            last_usable_lba,
            disk_guid,
            entries_lba,
            num_entries,
            entry_size,
            entries_crc: 0,
            reserved2: [0u8; 420],
        })
    }

    /// Mirror of a primary header, placed at the last LBA.
    pub fn to_backup(mut self, total_sectors: u64, backup_entries_lba: u64) -> Self {
        self.current_lba = total_sectors - 1;
        self.backup_lba = GPT_PRIMARY_HEADER_LBA;
        self.entries_lba = backup_entries_lba;
        self.header_crc = compute_header_crc32(self);
        self
    }

    pub fn compute_crc32(&mut self, entries: &[GptEntry]) {
        self.entries_crc =
            compute_entries_crc32(entries, self.num_entries as usize, self.entry_size as usize);
        self.header_crc = compute_header_crc32(*self);
    }

    pub fn has_valid_signature(&self) -> bool {
        &self.signature == GPT_SIGNATURE
    }

    pub fn validate_header(&self) -> PartResult<()> {
        if !self.has_valid_signature() {
            return Err(PartError::Invalid("GPT: invalid signature"));
        }
        if self.revision != GPT_REVISION {
            return Err(PartError::Invalid("GPT: unsupported revision"));
        }
        if self.header_size < GPT_HEADER_SIZE
            || self.header_size as usize > core::mem::size_of::<Self>()
        {
            return Err(PartError::Invalid("GPT: invalid header_size"));
        }
        let base = core::mem::size_of::<GptEntry>() as u32;
        if self.entry_size < base || (self.entry_size % 8) != 0 {
            return Err(PartError::Invalid("GPT: invalid entry_size"));
        }
        Ok(())
    }

    pub fn validate_crc(&self, entries: &[GptEntry]) -> PartResult<()> {
        if compute_header_crc32(*self) != self.header_crc {
            return Err(PartError::Invalid("GPT: header CRC mismatch"));
        }

        if compute_entries_crc32(entries, self.num_entries as usize, self.entry_size as usize)
            != self.entries_crc
        {
            return Err(PartError::Invalid("GPT: entries CRC mismatch"));
        }
        Ok(())
    }

    pub fn validate_entries(&self, entries: &[GptEntry], sector_size: u64) -> PartResult<()> {
        let align = align_lba_1m(sector_size);

        for e in entries {
            e.validate_basic()?;
            e.validate_in_bounds(self.first_usable_lba, self.last_usable_lba, align)?;
        }

        check_overlaps(entries)
    }
}

#[inline]
fn overlaps_inclusive(a_start: u64, a_end: u64, b_start: u64, b_end: u64) -> bool {
    a_start <= b_end && b_start <= a_end
}

fn check_overlaps(entries: &[GptEntry]) -> PartResult<()> {
    let mut segs: Vec<(u64, u64)> = entries
        .iter()
        .filter(|e| !e.is_empty())
        .map(|e| (e.start_lba, e.end_lba))
        .collect();

    if segs.len() <= 1 {
        return Ok(());
    }

    segs.sort_unstable_by(|a, b| a.0.cmp(&b.0));

    for pair in segs.windows(2) {
        let (prev, curr) = (pair[0], pair[1]);
        if overlaps_inclusive(prev.0, prev.1, curr.0, curr.1) {
            return Err(PartError::Invalid("GPT: partition overlap detected"));
        }
    }
    Ok(())
}

/// CRC32 over the full entry array, empty slots included as zeroes.
fn compute_entries_crc32(entries: &[GptEntry], num_entries: usize, entry_size: usize) -> u32 {
    let base = core::mem::size_of::<GptEntry>();
    let mut hasher = crc32fast::Hasher::new();
    let mut slot = vec![0u8; entry_size];
    for i in 0..num_entries {
        slot.fill(0);
        if let Some(e) = entries.get(i) {
            slot[..base].copy_from_slice(e.as_bytes());
        }
        hasher.update(&slot);
    }
    hasher.finalize()
}

fn write_entries<IO: BlockIO + ?Sized>(
    io: &mut IO,
    entries_lba: u64,
    sector_size: u64,
    entries: &[GptEntry],
    num_entries: usize,
    entry_size: usize,
) -> PartResult<()> {
    let base = core::mem::size_of::<GptEntry>();
    let per_sector = (sector_size as usize) / entry_size;
    if per_sector == 0 {
        return Err(PartError::Invalid("GPT: entry size exceeds sector size"));
    }
    let mut sector = vec![0u8; sector_size as usize];

    let mut idx = 0usize;
    let mut lba = entries_lba;
    while idx < num_entries {
        sector.fill(0);
        let take = core::cmp::min(per_sector, num_entries - idx);
        for s in 0..take {
            let dst = &mut sector[s * entry_size..(s + 1) * entry_size];
            if let Some(e) = entries.get(idx + s) {
                dst[..base].copy_from_slice(e.as_bytes());
            }
        }
        io.write_at_lba(lba, sector_size, &sector)?;
        lba += 1;
        idx += take;
    }
    Ok(())
}

/// Writes a header padded with zeroes to a full sector.
fn write_header<IO: BlockIO + ?Sized>(
    io: &mut IO,
    lba: u64,
    sector_size: u64,
    header: &GptHeader,
) -> PartResult<()> {
    let mut sector = vec![0u8; sector_size as usize];
    let bytes = header.as_bytes();
    sector[..bytes.len()].copy_from_slice(bytes);
    io.write_at_lba(lba, sector_size, &sector)?;
    Ok(())
}

// ---------------------------------------------------------------------
// Write GPT
// ---------------------------------------------------------------------

/// Writes primary entries + header, then backup entries + header, then flushes.
///
/// The protective MBR is not touched, see [`crate::mbr::write_mbr_protective`].
pub fn write_gpt_with_sector<IO: BlockIO + ?Sized>(
    io: &mut IO,
    entries: &[GptEntry],
    total_sectors: u64,
    disk_guid: [u8; 16],
    sector_size: u64,
) -> PartResult<()> {
    if sector_size < core::mem::size_of::<GptHeader>() as u64 {
        return Err(PartError::Invalid("GPT: sector size below 512 bytes"));
    }
    if entries.len() > GPT_DEFAULT_NUM_ENTRIES {
        return Err(PartError::Invalid("GPT: too many partition entries"));
    }

    let mut primary = GptHeader::new_primary(
        total_sectors,
        disk_guid,
        GPT_DEFAULT_NUM_ENTRIES as u32,
        GPT_ENTRY_SIZE as u32,
        sector_size,
    )?;
    primary.validate_entries(entries, sector_size)?;
    primary.compute_crc32(entries);

    write_entries(
        io,
        primary.entries_lba,
        sector_size,
        entries,
        primary.num_entries as usize,
        primary.entry_size as usize,
    )?;
    write_header(io, GPT_PRIMARY_HEADER_LBA, sector_size, &primary)?;

    let backup_entries_lba = (total_sectors - 1)
        - entries_sectors(primary.num_entries, primary.entry_size, sector_size);
    let secondary = primary.to_backup(total_sectors, backup_entries_lba);

    write_entries(
        io,
        backup_entries_lba,
        sector_size,
        entries,
        secondary.num_entries as usize,
        secondary.entry_size as usize,
    )?;
    write_header(io, total_sectors - 1, sector_size, &secondary)?;

    io.flush()?;
    Ok(())
}

pub fn write_gpt<IO: BlockIO + ?Sized>(
    io: &mut IO,
    entries: &[GptEntry],
    total_sectors: u64,
    disk_guid: [u8; 16],
) -> PartResult<()> {
    write_gpt_with_sector(
        io,
        entries,
        total_sectors,
        disk_guid,
        crate::DEFAULT_SECTOR_SIZE,
    )
}

// ---------------------------------------------------------------------
// Read GPT
// ---------------------------------------------------------------------

/// Decodes the non-empty slots of an entry array.
fn read_entries(buf: &[u8], entry_size: usize) -> PartResult<Vec<GptEntry>> {
    let base = core::mem::size_of::<GptEntry>();
    if entry_size < base || (entry_size % 8) != 0 {
        return Err(PartError::Invalid("GPT: invalid entry_size"));
    }

    let mut out = Vec::new();
    for slot in buf.chunks_exact(entry_size) {
        let e = GptEntry::read_from_bytes(&slot[..base])
            .map_err(|_| PartError::Invalid("GPT: invalid entry"))?;
        if !e.is_empty() {
            out.push(e);
        }
    }
    Ok(out)
}

/// Reads the header at `lba` and its entry array.
pub fn read_gpt_at<IO: BlockIO + ?Sized>(
    io: &mut IO,
    lba: u64,
    sector_size: u64,
) -> PartResult<(GptHeader, Vec<GptEntry>)> {
    let hdr: GptHeader = io.read_struct_lba(lba, sector_size)?;

    hdr.validate_header()?;
    if hdr.current_lba != lba {
        return Err(PartError::Invalid("GPT: header LBA mismatch"));
    }

    let es = hdr.entry_size as usize;
    let ne = hdr.num_entries as usize;
    if es > 512 {
        return Err(PartError::Invalid("GPT: entry_size too large"));
    }
    if ne == 0 || ne > 16_384 {
        return Err(PartError::Invalid("GPT: num_entries out of range"));
    }

    let mut buf = vec![0u8; ne * es];
    io.read_at_lba(hdr.entries_lba, sector_size, &mut buf)?;

    // CRC is computed over every slot, so keep empty ones while checking
    let all = read_all_entries(&buf, es)?;
    hdr.validate_crc(&all)?;

    let entries = read_entries(&buf, es)?;
    Ok((hdr, entries))
}

fn read_all_entries(buf: &[u8], entry_size: usize) -> PartResult<Vec<GptEntry>> {
    let base = core::mem::size_of::<GptEntry>();
    buf.chunks_exact(entry_size)
        .map(|slot| {
            GptEntry::read_from_bytes(&slot[..base])
                .map_err(|_| PartError::Invalid("GPT: invalid entry"))
        })
        .collect()
}

pub fn read_gpt_with_sector<IO: BlockIO + ?Sized>(
    io: &mut IO,
    sector_size: u64,
) -> PartResult<(GptHeader, Vec<GptEntry>)> {
    read_gpt_at(io, GPT_PRIMARY_HEADER_LBA, sector_size)
}

pub fn read_gpt<IO: BlockIO + ?Sized>(io: &mut IO) -> PartResult<(GptHeader, Vec<GptEntry>)> {
    read_gpt_with_sector(io, crate::DEFAULT_SECTOR_SIZE)
}

/// Reads the backup header (last LBA) and its entry array.
pub fn read_backup_gpt_with_sector<IO: BlockIO + ?Sized>(
    io: &mut IO,
    total_sectors: u64,
    sector_size: u64,
) -> PartResult<(GptHeader, Vec<GptEntry>)> {
    let last = total_sectors
        .checked_sub(1)
        .ok_or(PartError::Invalid("GPT: empty disk"))?;
    read_gpt_at(io, last, sector_size)
}

/// Cheap presence check: `EFI PART` at LBA 1, no CRC or bounds validation.
pub fn has_gpt_signature<IO: BlockIO + ?Sized>(io: &mut IO, sector_size: u64) -> PartResult<bool> {
    let off = GPT_PRIMARY_HEADER_LBA
        .checked_mul(sector_size)
        .ok_or(PartError::Other("lba_offset overflow"))?;
    Ok(io.matches_at(off, GPT_SIGNATURE)?)
}
