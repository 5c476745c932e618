// SPDX-License-Identifier: MIT

use ndmio::prelude::*;
use ndmpart::{
    DiskScanOptions, TableKind, detect_table,
    errors::{PartError, PartResult},
    gpt::{self, GptEntry},
    mbr, scan_disk, validate_full_disk,
};
use tracing::{Level, debug, trace};
use uuid::Uuid;

use crate::{
    layout::{PartitionSpec, TableSpec},
    signature::{self, FsSignature, SignatureProbe},
};

/// Size and block sizes of a device, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub size_bytes: u64,
    pub logical_block_size: u64,
    pub physical_block_size: u64,
}

/// A partition table found on a device.
#[derive(Debug)]
pub struct ExistingTable {
    pub kind: TableKind,
    /// Decoded GPT partitions, or why they could not be decoded.
    /// Legacy MBR entries are not decoded.
    pub partitions: PartResult<Vec<PartitionSpec>>,
}

/// Capability: read and write the partition table of a device.
pub trait PartitionTableIO {
    /// `None` when the device carries no partition table at all.
    fn read_partition_table(&mut self, sector_size: u64) -> PartResult<Option<ExistingTable>>;

    fn write_partition_table(&mut self, table: &TableSpec) -> PartResult<()>;
}

/// An open device: block IO plus its geometry.
#[derive(Debug)]
pub struct Disk<IO: BlockIO> {
    io: IO,
    geometry: Geometry,
}

impl<IO: BlockIO> Disk<IO> {
    /// Wraps `io`, taking its size from the backing storage.
    pub fn new(mut io: IO, logical_block_size: u64, physical_block_size: u64) -> BlockIOResult<Self> {
        let size_bytes = io.size_bytes()?;
        Ok(Self {
            io,
            geometry: Geometry {
                size_bytes,
                logical_block_size,
                physical_block_size,
            },
        })
    }

    #[inline]
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    #[inline]
    pub fn io_mut(&mut self) -> &mut IO {
        &mut self.io
    }
}

impl<IO: BlockIO> PartitionTableIO for Disk<IO> {
    fn read_partition_table(&mut self, sector_size: u64) -> PartResult<Option<ExistingTable>> {
        let Some(kind) = detect_table(&mut self.io, sector_size)? else {
            return Ok(None);
        };

        let partitions = match kind {
            TableKind::Mbr => Ok(Vec::new()),
            TableKind::Gpt => {
                let opts = DiskScanOptions::new()
                    .with_sector_size(sector_size)
                    .no_bounds();
                scan_disk(&mut self.io, opts).map(|info| {
                    info.partitions
                        .into_iter()
                        .map(|p| PartitionSpec {
                            name: p.name,
                            kind: p.kind,
                            start: p.start_lba,
                            end: p.end_lba,
                            attributes: p.attrs,
                        })
                        .collect()
                })
            }
        };

        if let Err(e) = &partitions {
            debug!(%kind, error = %e, "partition table present but unreadable");
        }
        Ok(Some(ExistingTable { kind, partitions }))
    }

    fn write_partition_table(&mut self, table: &TableSpec) -> PartResult<()> {
        let sector_size = table.logical_sector_size;
        if sector_size == 0 || sector_size != self.geometry.logical_block_size {
            return Err(PartError::Invalid("sector size does not match the device"));
        }
        if !table.protective_mbr {
            return Err(PartError::Unsupported);
        }

        let total_sectors = self.geometry.size_bytes / sector_size;
        let entries: Vec<GptEntry> = table
            .partitions
            .iter()
            .map(|p| {
                GptEntry::new(
                    *p.kind.as_guid(),
                    Uuid::new_v4().to_bytes_le(),
                    p.start,
                    p.end,
                    p.attributes,
                    &p.name,
                )
            })
            .collect();
        let disk_guid = Uuid::new_v4();
        trace!(%disk_guid, total_sectors, sector_size, "writing GPT");

        mbr::write_mbr_protective(&mut self.io, total_sectors)?;
        gpt::write_gpt_with_sector(
            &mut self.io,
            &entries,
            total_sectors,
            disk_guid.to_bytes_le(),
            sector_size,
        )?;

        validate_full_disk(&mut self.io, sector_size)?;

        if tracing::enabled!(Level::DEBUG) {
            let opts = DiskScanOptions::new().with_sector_size(sector_size);
            let info = scan_disk(&mut self.io, opts)?;
            debug!("written layout\n{info}");
        }
        Ok(())
    }
}

impl<IO: BlockIO> SignatureProbe for Disk<IO> {
    fn probe_signatures(&mut self) -> BlockIOResult<Vec<FsSignature>> {
        signature::probe_signatures(&mut self.io)
    }
}
