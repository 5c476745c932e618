// SPDX-License-Identifier: MIT

use ndmpart::gpt::GPT_ENTRIES_BYTES;
use tracing::debug;

use crate::error::{NdmError, NdmResult};

use super::{PartitionSpec, TableSpec};

/// Byte offset of the partition start.
pub const PARTITION_ALIGN_BYTES: u64 = 1 << 20;

/// Block numbers behind a single-partition layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutPlan {
    pub start_block: u64,
    /// Entry array blocks plus one header block.
    pub primary_table_blocks: u64,
    pub end_block: u64,
    pub total_blocks: u64,
}

impl LayoutPlan {
    /// Computes the plan for a disk of `disk_size` bytes.
    ///
    /// The start is `1MiB / block_size` rounded down, so block sizes that do
    /// not divide 1MiB start slightly before the 1MiB mark. The end leaves
    /// room for the backup entry array and header, which makes it the last
    /// usable LBA of the GPT.
    pub fn new(block_size: u64, disk_size: u64) -> NdmResult<Self> {
        let invalid = |reason| NdmError::InvalidLayout {
            block_size,
            disk_size,
            reason,
        };

        if block_size == 0 {
            return Err(invalid("block size is zero"));
        }

        let start_block = PARTITION_ALIGN_BYTES / block_size;
        let primary_table_blocks = GPT_ENTRIES_BYTES.div_ceil(block_size) + 1;
        let total_blocks = disk_size / block_size;

        let end_block = total_blocks
            .checked_sub(primary_table_blocks)
            .and_then(|n| n.checked_sub(1))
            .ok_or(invalid("disk too small for GPT"))?;

        // protective MBR + primary header + entries come first
        if start_block < primary_table_blocks + 1 {
            return Err(invalid("block size too large for 1MiB alignment"));
        }
        if start_block >= end_block {
            return Err(invalid("disk too small for a partition"));
        }

        Ok(Self {
            start_block,
            primary_table_blocks,
            end_block,
            total_blocks,
        })
    }

    pub fn partition(&self) -> PartitionSpec {
        PartitionSpec::ndm(self.start_block, self.end_block)
    }
}

/// Single partition for the given geometry.
pub fn compute_partition(block_size: u64, disk_size: u64) -> NdmResult<PartitionSpec> {
    Ok(LayoutPlan::new(block_size, disk_size)?.partition())
}

/// Single-partition table with a protective MBR.
pub fn compute_table(block_size: u64, disk_size: u64) -> NdmResult<TableSpec> {
    let plan = LayoutPlan::new(block_size, disk_size)?;
    debug!(?plan, "layout computed");

    Ok(TableSpec {
        logical_sector_size: block_size,
        protective_mbr: true,
        partitions: vec![plan.partition()],
    })
}

#[cfg(test)]
mod tests {
    use ndmpart::guids::GptPartitionKind;

    use super::*;

    const GIB: u64 = 1 << 30;

    #[test]
    fn one_gib_512() {
        let plan = LayoutPlan::new(512, GIB).unwrap();
        assert_eq!(plan.start_block, 2048);
        assert_eq!(plan.primary_table_blocks, 33);
        assert_eq!(plan.total_blocks, 2_097_152);
        assert_eq!(plan.end_block, 2_097_118);
    }

    #[test]
    fn one_gib_4096() {
        let plan = LayoutPlan::new(4096, GIB).unwrap();
        assert_eq!(plan.start_block, 256);
        assert_eq!(plan.primary_table_blocks, 5);
        assert_eq!(plan.end_block, 262_138);
    }

    #[test]
    fn start_is_one_mib_for_dividing_sizes() {
        for bs in [512u64, 1024, 2048, 4096, 8192, 65536] {
            let p = compute_partition(bs, GIB).unwrap();
            assert_eq!(p.start * bs, PARTITION_ALIGN_BYTES, "block size {bs}");
            assert!(p.start < p.end);
            // backup entries + header fit after the partition
            let backup_blocks = GPT_ENTRIES_BYTES.div_ceil(bs) + 1;
            assert_eq!(p.end + backup_blocks, GIB / bs - 1);
        }
    }

    #[test]
    fn start_truncates_for_non_dividing_sizes() {
        let plan = LayoutPlan::new(3000, GIB).unwrap();
        assert_eq!(plan.start_block, 349);
        assert!(plan.start_block * 3000 < PARTITION_ALIGN_BYTES);
    }

    #[test]
    fn tiny_disk_is_invalid() {
        let err = compute_partition(512, 1 << 20).unwrap_err();
        assert!(matches!(err, NdmError::InvalidLayout { .. }), "{err}");

        // not even room for the trailing GPT
        let err = compute_partition(512, 4096).unwrap_err();
        assert!(matches!(err, NdmError::InvalidLayout { .. }), "{err}");

        let err = compute_partition(512, 0).unwrap_err();
        assert!(matches!(err, NdmError::InvalidLayout { .. }), "{err}");
    }

    #[test]
    fn zero_block_size_is_invalid() {
        let err = compute_partition(0, GIB).unwrap_err();
        assert!(matches!(err, NdmError::InvalidLayout { block_size: 0, .. }));
    }

    #[test]
    fn huge_block_size_is_invalid() {
        let err = compute_partition(2 << 20, 64 * GIB).unwrap_err();
        assert!(matches!(err, NdmError::InvalidLayout { .. }), "{err}");
    }

    #[test]
    fn smallest_valid_disk() {
        // start 2048, end must be at least 2049
        let min_blocks = 2049 + 33 + 1;
        assert!(compute_partition(512, min_blocks * 512).is_ok());
        assert!(compute_partition(512, (min_blocks - 1) * 512).is_err());
    }

    #[test]
    fn table_shape() {
        let table = compute_table(512, GIB).unwrap();
        assert_eq!(table.logical_sector_size, 512);
        assert!(table.protective_mbr);
        assert_eq!(table.partitions.len(), 1);

        let (number, p) = table.numbered().next().unwrap();
        assert_eq!(number, 1);
        assert_eq!(p.name, "OpenEBS_NDM");
        assert_eq!(p.kind, GptPartitionKind::LINUX_FS);
        assert_eq!(p.attributes, 0);
        assert_eq!((p.start, p.end), (2048, 2_097_118));
    }

    #[test]
    fn trailing_partial_block_is_ignored() {
        let a = compute_partition(512, GIB).unwrap();
        let b = compute_partition(512, GIB + 511).unwrap();
        assert_eq!(a, b);
    }
}
