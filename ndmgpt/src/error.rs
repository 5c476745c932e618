// SPDX-License-Identifier: MIT

use std::io;

use ndmpart::{TableKind, errors::PartError};
use thiserror::Error;

use crate::signature::FsSignature;

/// One variant per stage of the run.
#[derive(Debug, Error)]
pub enum NdmError {
    #[error("cannot open device {path:?}")]
    DeviceOpen {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("{path} already has a {kind} partition table")]
    AlreadyPartitioned { path: String, kind: TableKind },

    #[error("{path} already holds a filesystem signature ({})", join_signatures(.found))]
    FilesystemPresent {
        path: String,
        found: Vec<FsSignature>,
    },

    #[error("invalid layout for {disk_size} bytes with {block_size}-byte blocks: {reason}")]
    InvalidLayout {
        block_size: u64,
        disk_size: u64,
        reason: &'static str,
    },

    #[error("failed to write partition table to {path}")]
    TableWrite {
        path: String,
        #[source]
        source: PartError,
    },

    #[error("failed to write report")]
    Report(#[source] io::Error),
}

impl NdmError {
    pub(crate) fn device_open(path: &str, source: io::Error) -> Self {
        NdmError::DeviceOpen {
            path: path.to_string(),
            source,
        }
    }

    pub(crate) fn table_write(path: &str, source: PartError) -> Self {
        NdmError::TableWrite {
            path: path.to_string(),
            source,
        }
    }
}

fn join_signatures(found: &[FsSignature]) -> String {
    found
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub type NdmResult<T = ()> = Result<T, NdmError>;
