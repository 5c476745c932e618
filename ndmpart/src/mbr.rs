// SPDX-License-Identifier: MIT

use crate::errors::*;
use ndmio::prelude::*;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub const MBR_SIGNATURE: [u8; 2] = [0x55, 0xAA];
pub const PROTECTIVE_GPT: u8 = 0xEE;

#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug, PartialEq, Eq)]
#[repr(C)] // 16 bytes, correctly aligned
pub struct MbrEntry {
    pub boot_flag: u8,
    pub starting_chs: [u8; 3],
    pub part_type: u8,
    pub end_chs: [u8; 3],
    pub start_lba: u32,
    pub sectors: u32,
}

impl MbrEntry {
    #[inline]
    pub fn new(
        boot_flag: u8,
        starting_chs: [u8; 3],
        part_type: u8,
        end_chs: [u8; 3],
        start_lba: u32,
        sectors: u32,
    ) -> Self {
        Self {
            boot_flag,
            starting_chs,
            part_type,
            end_chs,
            start_lba,
            sectors,
        }
    }

    #[inline]
    pub fn new_empty() -> Self {
        Self::new(0x00, [0, 0, 0], 0x00, [0, 0, 0], 0, 0)
    }

    /// Single 0xEE entry covering LBA 1..end, clamped to 32 bits on disks > 2 TiB.
    #[inline]
    pub fn new_protective(total_sectors: u64) -> Self {
        let sectors = total_sectors.saturating_sub(1);
        Self::new(
            0x00,
            [0x00, 0x02, 0x00],
            PROTECTIVE_GPT,
            [0xFE, 0xFF, 0xFF],
            1,
            u32::try_from(sectors).unwrap_or(u32::MAX),
        )
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.part_type == 0
    }

    #[inline]
    pub fn is_protective(&self) -> bool {
        self.part_type == PROTECTIVE_GPT
    }

    #[inline]
    pub fn validate_basic(&self) -> PartResult<()> {
        if self.is_empty() {
            return Ok(());
        }
        if self.sectors == 0 {
            return Err(PartError::Invalid("MBR: partition entry with zero sectors"));
        }
        if !(self.boot_flag == 0x00 || self.boot_flag == 0x80) {
            return Err(PartError::Invalid("MBR: invalid boot flag"));
        }
        Ok(())
    }
}

#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct MbrEntryPacked {
    pub boot_flag: u8,
    pub starting_chs: [u8; 3],
    pub part_type: u8,
    pub end_chs: [u8; 3],
    pub start_lba: u32,
    pub sectors: u32,
}

impl MbrEntryPacked {
    #[inline]
    pub fn to_aligned(self) -> MbrEntry {
        MbrEntry {
            boot_flag: self.boot_flag,
            starting_chs: self.starting_chs,
            part_type: self.part_type,
            end_chs: self.end_chs,
            start_lba: u32::from_le(self.start_lba),
            sectors: u32::from_le(self.sectors),
        }
    }

    #[inline]
    pub fn from_aligned(e: &MbrEntry) -> Self {
        Self {
            boot_flag: e.boot_flag,
            starting_chs: e.starting_chs,
            part_type: e.part_type,
            end_chs: e.end_chs,
            start_lba: e.start_lba.to_le(),
            sectors: e.sectors.to_le(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbrKind {
    /// No signature, or a signature with four empty slots.
    Empty,
    Protective,
    Legacy,
}

#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct Mbr {
    pub boot_code: [u8; 446],
    pub entries: [MbrEntryPacked; 4],
    pub signature: [u8; 2],
}

impl Mbr {
    #[inline]
    pub fn new_from_entries(entries: [MbrEntry; 4]) -> Self {
        let packed = entries.map(|e| MbrEntryPacked::from_aligned(&e));
        Self {
            boot_code: [0u8; 446],
            entries: packed,
            signature: MBR_SIGNATURE,
        }
    }

    #[inline]
    pub fn new_empty() -> Self {
        Self::new_from_entries([MbrEntry::new_empty(); 4])
    }

    #[inline]
    pub fn new_protective(total_sectors: u64) -> Self {
        let mut es = [MbrEntry::new_empty(); 4];
        es[0] = MbrEntry::new_protective(total_sectors);
        Self::new_from_entries(es)
    }

    #[inline]
    pub fn has_valid_signature(&self) -> bool {
        self.signature == MBR_SIGNATURE
    }

    #[inline]
    pub fn aligned_entries(&self) -> [MbrEntry; 4] {
        let entries = self.entries;
        entries.map(MbrEntryPacked::to_aligned)
    }

    #[inline]
    pub fn first_non_empty(&self) -> Option<MbrEntry> {
        self.aligned_entries().into_iter().find(|e| !e.is_empty())
    }

    /// Classifies the sector.
    ///
    /// A boot sector whose slot area fails basic validation (filesystem boot
    /// code, random data) is reported as `Empty`: it is not a partition table.
    pub fn kind(&self) -> MbrKind {
        if !self.has_valid_signature() || self.validate_entries_basic().is_err() {
            return MbrKind::Empty;
        }
        let Some(first) = self.first_non_empty() else {
            return MbrKind::Empty;
        };
        if first.is_protective() {
            MbrKind::Protective
        } else {
            MbrKind::Legacy
        }
    }

    /// Valid signature and four empty slots: what `fdisk` leaves behind after
    /// creating a DOS label, or after deleting every partition.
    ///
    /// Filesystem boot sectors can look the same, callers must rule those out.
    pub fn is_empty_label(&self) -> bool {
        self.has_valid_signature() && self.aligned_entries().iter().all(MbrEntry::is_empty)
    }

    #[inline]
    pub fn validate_header(&self) -> PartResult<()> {
        if !self.has_valid_signature() {
            return Err(PartError::Invalid("MBR: invalid signature"));
        }
        Ok(())
    }

    #[inline]
    pub fn validate_entries_basic(&self) -> PartResult<()> {
        for e in self.aligned_entries().iter() {
            e.validate_basic()?;
        }
        Ok(())
    }

    pub fn validate_protective(&self, total_sectors: u64) -> PartResult<()> {
        self.validate_header()?;
        self.validate_entries_basic()?;

        let Some(first) = self.first_non_empty() else {
            return Err(PartError::Invalid("MBR: protective entry missing"));
        };
        if !first.is_protective() {
            return Err(PartError::Invalid("MBR: protective entry missing"));
        }
        if self.aligned_entries().iter().skip(1).any(|e| !e.is_empty()) {
            return Err(PartError::Invalid("MBR: protective MBR has extra entries"));
        }

        if total_sectors > 0 {
            let expected = u32::try_from(total_sectors - 1).unwrap_or(u32::MAX);
            if first.sectors != expected {
                return Err(PartError::Invalid("MBR: protective entry size mismatch"));
            }
        }

        Ok(())
    }
}

pub fn write_mbr<IO: BlockIO + ?Sized>(io: &mut IO, mbr: &Mbr) -> PartResult<()> {
    io.write_struct(0, mbr)?;
    io.flush()?;
    Ok(())
}

pub fn write_mbr_protective<IO: BlockIO + ?Sized>(
    io: &mut IO,
    total_sectors: u64,
) -> PartResult<()> {
    let mbr = Mbr::new_protective(total_sectors);
    write_mbr(io, &mbr)
}

/// Reads sector 0 without validating it.
pub fn read_mbr_raw<IO: BlockIO + ?Sized>(io: &mut IO) -> PartResult<Mbr> {
    Ok(io.read_struct(0)?)
}

pub fn read_mbr<IO: BlockIO + ?Sized>(io: &mut IO) -> PartResult<Mbr> {
    let mbr = read_mbr_raw(io)?;
    mbr.validate_header()?;
    Ok(mbr)
}
