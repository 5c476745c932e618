// SPDX-License-Identifier: MIT

use std::io;

use tracing::{debug, info, warn};

use crate::{
    disk::{Geometry, PartitionTableIO},
    error::{NdmError, NdmResult},
    signature::SignatureProbe,
};

/// Snapshot of a probed device, sizes in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub path: String,
    pub size: u64,
    pub logical_block_size: u64,
    pub physical_block_size: u64,
}

/// Checks that the device is blank and describes it.
///
/// Fails when the geometry is unusable, when any partition table is found,
/// or when any filesystem signature is found, in that order. Nothing is
/// written.
pub fn probe<D>(disk: &mut D, path: &str, geometry: Geometry) -> NdmResult<DeviceDescriptor>
where
    D: PartitionTableIO + SignatureProbe + ?Sized,
{
    if geometry.size_bytes == 0 || geometry.logical_block_size == 0 {
        return Err(NdmError::device_open(
            path,
            io::Error::new(io::ErrorKind::InvalidData, "device reports a zero size"),
        ));
    }

    let table = disk
        .read_partition_table(geometry.logical_block_size)
        .map_err(|e| NdmError::device_open(path, io::Error::other(e)))?;
    if let Some(table) = table {
        info!(path, kind = %table.kind, "existing partition table found");
        return Err(NdmError::AlreadyPartitioned {
            path: path.to_string(),
            kind: table.kind,
        });
    }

    let found = disk
        .probe_signatures()
        .map_err(|e| NdmError::device_open(path, io::Error::other(e)))?;
    if !found.is_empty() {
        info!(path, ?found, "filesystem signature found");
        return Err(NdmError::FilesystemPresent {
            path: path.to_string(),
            found,
        });
    }

    if geometry.physical_block_size != geometry.logical_block_size {
        warn!(
            path,
            logical = geometry.logical_block_size,
            physical = geometry.physical_block_size,
            "physical block size differs from logical, the report shows the logical size"
        );
    }
    debug!(path, ?geometry, "device is blank");

    Ok(DeviceDescriptor {
        path: path.to_string(),
        size: geometry.size_bytes,
        logical_block_size: geometry.logical_block_size,
        physical_block_size: geometry.physical_block_size,
    })
}

#[cfg(test)]
mod tests {
    use ndmio::prelude::BlockIOResult;
    use ndmpart::{
        TableKind,
        errors::{PartError, PartResult},
    };

    use super::*;
    use crate::{
        disk::ExistingTable,
        layout::TableSpec,
        signature::FsSignature,
    };

    /// Scripted device: answers reads from fields, records writes.
    #[derive(Default)]
    struct FakeDisk {
        table: Option<TableKind>,
        signatures: Vec<FsSignature>,
        read_error: Option<PartError>,
        writes: usize,
    }

    impl PartitionTableIO for FakeDisk {
        fn read_partition_table(&mut self, _sector_size: u64) -> PartResult<Option<ExistingTable>> {
            if let Some(e) = self.read_error {
                return Err(e);
            }
            Ok(self.table.map(|kind| ExistingTable {
                kind,
                partitions: Ok(Vec::new()),
            }))
        }

        fn write_partition_table(&mut self, _table: &TableSpec) -> PartResult<()> {
            self.writes += 1;
            Ok(())
        }
    }

    impl SignatureProbe for FakeDisk {
        fn probe_signatures(&mut self) -> BlockIOResult<Vec<FsSignature>> {
            Ok(self.signatures.clone())
        }
    }

    fn geometry(size: u64, bs: u64) -> Geometry {
        Geometry {
            size_bytes: size,
            logical_block_size: bs,
            physical_block_size: bs,
        }
    }

    #[test]
    fn blank_device_is_described() {
        let mut disk = FakeDisk::default();
        let desc = probe(&mut disk, "/dev/sdb", geometry(1 << 30, 512)).unwrap();
        assert_eq!(
            desc,
            DeviceDescriptor {
                path: "/dev/sdb".into(),
                size: 1 << 30,
                logical_block_size: 512,
                physical_block_size: 512,
            }
        );
        assert_eq!(disk.writes, 0);
    }

    #[test]
    fn existing_table_wins_over_signatures() {
        let mut disk = FakeDisk {
            table: Some(TableKind::Gpt),
            signatures: vec![FsSignature::Ext4],
            ..Default::default()
        };
        let err = probe(&mut disk, "/dev/sdb", geometry(1 << 30, 512)).unwrap_err();
        assert!(matches!(
            err,
            NdmError::AlreadyPartitioned {
                kind: TableKind::Gpt,
                ..
            }
        ));
        assert_eq!(disk.writes, 0);
    }

    #[test]
    fn filesystem_is_named() {
        let mut disk = FakeDisk {
            signatures: vec![FsSignature::Ext4],
            ..Default::default()
        };
        match probe(&mut disk, "/dev/sdb", geometry(1 << 30, 512)) {
            Err(NdmError::FilesystemPresent { found, .. }) => {
                assert_eq!(found, vec![FsSignature::Ext4])
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn zero_geometry_is_device_open() {
        let mut disk = FakeDisk::default();
        for g in [geometry(0, 512), geometry(1 << 30, 0)] {
            let err = probe(&mut disk, "/dev/sdb", g).unwrap_err();
            assert!(matches!(err, NdmError::DeviceOpen { .. }));
        }
    }

    #[test]
    fn read_failure_is_device_open() {
        let mut disk = FakeDisk {
            read_error: Some(PartError::Other("medium error")),
            ..Default::default()
        };
        let err = probe(&mut disk, "/dev/sdb", geometry(1 << 30, 512)).unwrap_err();
        assert!(matches!(err, NdmError::DeviceOpen { .. }));
    }

    #[test]
    fn physical_block_size_is_kept() {
        let mut disk = FakeDisk::default();
        let g = Geometry {
            physical_block_size: 4096,
            ..geometry(1 << 30, 512)
        };
        let desc = probe(&mut disk, "/dev/sdb", g).unwrap();
        assert_eq!(desc.physical_block_size, 4096);
    }
}
