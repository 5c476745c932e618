// SPDX-License-Identifier: MIT

//! JSON report of the probed device and the computed table.

use std::io::Write;

use ndmpart::guids::GuidText;
use serde::{Serialize, Serializer};

use crate::{
    error::{NdmError, NdmResult},
    layout::TableSpec,
    probe::DeviceDescriptor,
};

fn decimal<S: Serializer>(n: &u64, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(n)
}

fn decimal_usize<S: Serializer>(n: &usize, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(n)
}

#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub device: DeviceReport<'a>,
    pub table: TableReport<'a>,
}

#[derive(Debug, Serialize)]
pub struct DeviceReport<'a> {
    pub path: &'a str,
    #[serde(serialize_with = "decimal")]
    pub size: u64,
    #[serde(serialize_with = "decimal")]
    pub logical_block_size: u64,
    #[serde(serialize_with = "decimal")]
    pub physical_block_size: u64,
    pub partition_table: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TableReport<'a> {
    #[serde(serialize_with = "decimal")]
    pub logical_sector_size: u64,
    pub partitions: Vec<PartitionReport<'a>>,
}

#[derive(Debug, Serialize)]
pub struct PartitionReport<'a> {
    pub name: &'a str,
    #[serde(rename = "type")]
    pub type_guid: String,
    #[serde(serialize_with = "decimal")]
    pub start: u64,
    #[serde(serialize_with = "decimal")]
    pub end: u64,
    #[serde(serialize_with = "decimal")]
    pub attributes: u64,
    #[serde(serialize_with = "decimal_usize")]
    pub number: usize,
}

impl<'a> Report<'a> {
    /// `physical_block_size` repeats the logical size, as consumers of this
    /// report have always seen it. The real value stays on the descriptor.
    pub fn new(device: &'a DeviceDescriptor, table: &'a TableSpec) -> Self {
        Self {
            device: DeviceReport {
                path: &device.path,
                size: device.size,
                logical_block_size: device.logical_block_size,
                physical_block_size: device.logical_block_size,
                partition_table: "gpt",
            },
            table: TableReport {
                logical_sector_size: table.logical_sector_size,
                partitions: table
                    .numbered()
                    .map(|(number, p)| PartitionReport {
                        name: &p.name,
                        type_guid: GuidText(p.kind.as_guid()).to_string(),
                        start: p.start,
                        end: p.end,
                        attributes: p.attributes,
                        number,
                    })
                    .collect(),
            },
        }
    }

    /// Two-space indented JSON, newline terminated.
    pub fn render(&self) -> NdmResult<String> {
        let mut out =
            serde_json::to_string_pretty(self).map_err(|e| NdmError::Report(e.into()))?;
        out.push('\n');
        Ok(out)
    }
}

/// Renders the report into `out` in one write.
pub fn write_report<W: Write + ?Sized>(
    out: &mut W,
    device: &DeviceDescriptor,
    table: &TableSpec,
) -> NdmResult<()> {
    let text = Report::new(device, table).render()?;
    out.write_all(text.as_bytes()).map_err(NdmError::Report)?;
    out.flush().map_err(NdmError::Report)
}
