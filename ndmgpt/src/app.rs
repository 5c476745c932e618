// SPDX-License-Identifier: MIT

use std::io::Write;

use tracing::info;

use crate::{
    device::{ProbeOptions, open_device},
    disk::{Geometry, PartitionTableIO},
    error::NdmResult,
    layout::{TableSpec, compute_table},
    probe::{DeviceDescriptor, probe},
    report::write_report,
    signature::SignatureProbe,
    writer::commit_table,
};

/// What a run was asked to do.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Config {
    pub disk: String,
    pub create: bool,
    pub sector_size: Option<u64>,
}

/// What a successful run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub device: DeviceDescriptor,
    pub table: TableSpec,
    pub committed: bool,
}

/// Opens `config.disk`, then runs [`run_on`] against it.
pub fn run<W: Write + ?Sized>(config: &Config, out: &mut W) -> NdmResult<Outcome> {
    let opts = ProbeOptions::new()
        .with_sector_size(config.sector_size)
        .read_only(!config.create);

    let mut disk = open_device(&config.disk, &opts)?;
    let geometry = disk.geometry();
    run_on(&mut disk, &config.disk, geometry, config.create, out)
}

/// Probe, compute, report to `out`, then write the table if `create`.
///
/// The report is emitted before anything is written, so it is visible
/// even when the write fails.
pub fn run_on<D, W>(
    disk: &mut D,
    path: &str,
    geometry: Geometry,
    create: bool,
    out: &mut W,
) -> NdmResult<Outcome>
where
    D: PartitionTableIO + SignatureProbe + ?Sized,
    W: Write + ?Sized,
{
    let device = probe(disk, path, geometry)?;

    let table = compute_table(device.logical_block_size, device.size)?;
    write_report(out, &device, &table)?;

    if create {
        commit_table(disk, path, &table)?;
    } else {
        info!(path, "dry run, pass -create to write the table");
    }

    Ok(Outcome {
        device,
        table,
        committed: create,
    })
}

#[cfg(test)]
mod tests {
    use ndmio::prelude::BlockIOResult;
    use ndmpart::errors::{PartError, PartResult};

    use super::*;
    use crate::{disk::ExistingTable, error::NdmError, report::Report, signature::FsSignature};

    /// Blank device whose writes fail or succeed on demand.
    struct BlankDisk {
        fail_write: bool,
        written: Option<TableSpec>,
    }

    impl PartitionTableIO for BlankDisk {
        fn read_partition_table(&mut self, _sector_size: u64) -> PartResult<Option<ExistingTable>> {
            Ok(self.written.as_ref().map(|t| ExistingTable {
                kind: ndmpart::TableKind::Gpt,
                partitions: Ok(t.partitions.clone()),
            }))
        }

        fn write_partition_table(&mut self, table: &TableSpec) -> PartResult<()> {
            if self.fail_write {
                return Err(PartError::Other("write refused"));
            }
            self.written = Some(table.clone());
            Ok(())
        }
    }

    impl SignatureProbe for BlankDisk {
        fn probe_signatures(&mut self) -> BlockIOResult<Vec<FsSignature>> {
            Ok(Vec::new())
        }
    }

    const GEOMETRY: Geometry = Geometry {
        size_bytes: 1 << 30,
        logical_block_size: 512,
        physical_block_size: 512,
    };

    fn expected_report() -> String {
        let device = DeviceDescriptor {
            path: "/dev/sdb".into(),
            size: 1 << 30,
            logical_block_size: 512,
            physical_block_size: 512,
        };
        let table = compute_table(512, 1 << 30).unwrap();
        Report::new(&device, &table).render().unwrap()
    }

    #[test]
    fn report_is_out_before_a_failed_write() {
        let mut disk = BlankDisk {
            fail_write: true,
            written: None,
        };
        let mut out = Vec::new();

        let err = run_on(&mut disk, "/dev/sdb", GEOMETRY, true, &mut out).unwrap_err();
        assert!(matches!(
            err,
            NdmError::TableWrite {
                source: PartError::Other("write refused"),
                ..
            }
        ));
        assert_eq!(String::from_utf8(out).unwrap(), expected_report());
    }

    #[test]
    fn dry_run_never_writes() {
        let mut disk = BlankDisk {
            fail_write: true,
            written: None,
        };
        let mut out = Vec::new();

        let outcome = run_on(&mut disk, "/dev/sdb", GEOMETRY, false, &mut out).unwrap();
        assert!(!outcome.committed);
        assert_eq!(String::from_utf8(out).unwrap(), expected_report());
    }

    #[test]
    fn create_commits_the_reported_table() {
        let mut disk = BlankDisk {
            fail_write: false,
            written: None,
        };
        let outcome = run_on(&mut disk, "/dev/sdb", GEOMETRY, true, &mut Vec::new()).unwrap();
        assert!(outcome.committed);
        assert_eq!(disk.written, Some(outcome.table));
    }
}
