// SPDX-License-Identifier: MIT

use ndmpart::{TableKind, errors::PartError};
use tracing::{debug, info};

use crate::{
    disk::PartitionTableIO,
    error::{NdmError, NdmResult},
    layout::TableSpec,
};

/// Writes `table` and reads it back.
///
/// The read-back must be a GPT holding exactly the partitions of `table`,
/// compared on bounds, name, type and attributes. Nothing is retried.
pub fn commit_table<D>(disk: &mut D, path: &str, table: &TableSpec) -> NdmResult<()>
where
    D: PartitionTableIO + ?Sized,
{
    debug!(path, partitions = table.partitions.len(), "writing partition table");
    disk.write_partition_table(table)
        .map_err(|e| NdmError::table_write(path, e))?;

    verify_table(disk, table).map_err(|e| NdmError::table_write(path, e))?;
    info!(path, "partition table written");
    Ok(())
}

fn verify_table<D>(disk: &mut D, table: &TableSpec) -> Result<(), PartError>
where
    D: PartitionTableIO + ?Sized,
{
    let existing = disk
        .read_partition_table(table.logical_sector_size)?
        .ok_or(PartError::NotFound)?;
    if existing.kind != TableKind::Gpt {
        return Err(PartError::Invalid("verify: table read back is not GPT"));
    }

    let partitions = existing.partitions?;
    if partitions.len() != table.partitions.len() {
        return Err(PartError::Invalid("verify: partition count differs"));
    }
    if partitions != table.partitions {
        return Err(PartError::Invalid("verify: partition read back differs"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use ndmio::prelude::*;
    use ndmpart::errors::PartResult;

    use super::*;
    use crate::{
        disk::{Disk, ExistingTable},
        layout::{PartitionSpec, compute_table},
    };

    #[test]
    fn commit_to_memory_disk() {
        let mut buf = vec![0u8; 4 << 20];
        let table = compute_table(512, 4 << 20).unwrap();
        {
            let mut disk = Disk::new(MemBlockIO::new(&mut buf), 512, 512).unwrap();
            commit_table(&mut disk, "mem", &table).unwrap();
        }
        assert_eq!(&buf[510..512], &[0x55, 0xAA]);
        assert_eq!(&buf[512..520], b"EFI PART");
    }

    /// Accepts writes, then reads back whatever it was told to.
    struct Liar {
        read_back: Option<(TableKind, Vec<PartitionSpec>)>,
        fail_write: bool,
    }

    impl PartitionTableIO for Liar {
        fn read_partition_table(&mut self, _sector_size: u64) -> PartResult<Option<ExistingTable>> {
            Ok(self.read_back.clone().map(|(kind, parts)| ExistingTable {
                kind,
                partitions: Ok(parts),
            }))
        }

        fn write_partition_table(&mut self, _table: &TableSpec) -> PartResult<()> {
            if self.fail_write {
                return Err(PartError::IO(BlockIOError::Unsupported));
            }
            Ok(())
        }
    }

    fn expect_table_write(mut liar: Liar) -> PartError {
        let table = compute_table(512, 1 << 30).unwrap();
        match commit_table(&mut liar, "/dev/sdb", &table) {
            Err(NdmError::TableWrite { source, .. }) => source,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn write_failure_is_table_write() {
        let source = expect_table_write(Liar {
            read_back: None,
            fail_write: true,
        });
        assert_eq!(source, PartError::IO(BlockIOError::Unsupported));
    }

    #[test]
    fn missing_table_after_write() {
        let source = expect_table_write(Liar {
            read_back: None,
            fail_write: false,
        });
        assert_eq!(source, PartError::NotFound);
    }

    #[test]
    fn mismatched_read_back() {
        let source = expect_table_write(Liar {
            read_back: Some((TableKind::Gpt, vec![PartitionSpec::ndm(2048, 4096)])),
            fail_write: false,
        });
        assert!(matches!(source, PartError::Invalid(_)));

        let source = expect_table_write(Liar {
            read_back: Some((TableKind::Mbr, Vec::new())),
            fail_write: false,
        });
        assert!(matches!(source, PartError::Invalid(_)));
    }

    #[test]
    fn exact_read_back_passes() {
        let table = compute_table(512, 1 << 30).unwrap();
        let mut liar = Liar {
            read_back: Some((TableKind::Gpt, table.partitions.clone())),
            fail_write: false,
        };
        commit_table(&mut liar, "/dev/sdb", &table).unwrap();
    }
}
