// SPDX-License-Identifier: MIT

use ndmpart::guids::GptPartitionKind;

/// Name given to the single partition.
pub const PARTITION_NAME: &str = "OpenEBS_NDM";

/// One partition, bounds in logical blocks (inclusive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSpec {
    pub name: String,
    pub kind: GptPartitionKind,
    pub start: u64,
    pub end: u64,
    pub attributes: u64,
}

impl PartitionSpec {
    /// `OpenEBS_NDM` Linux filesystem partition over `[start, end]`.
    pub fn ndm(start: u64, end: u64) -> Self {
        Self {
            name: PARTITION_NAME.to_string(),
            kind: GptPartitionKind::LINUX_FS,
            start,
            end,
            attributes: 0,
        }
    }
}

/// Table handed to the writer. Partition number is position + 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub logical_sector_size: u64,
    pub protective_mbr: bool,
    pub partitions: Vec<PartitionSpec>,
}

impl TableSpec {
    pub fn numbered(&self) -> impl Iterator<Item = (usize, &PartitionSpec)> {
        self.partitions.iter().enumerate().map(|(i, p)| (i + 1, p))
    }
}
