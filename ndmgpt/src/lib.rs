// SPDX-License-Identifier: MIT

//! Probe a blank disk, compute a single 1MiB-aligned `OpenEBS_NDM`
//! partition, report it as JSON and optionally write it as a GPT.

pub mod app;
pub mod cli;
pub mod device;
pub mod disk;
pub mod error;
pub mod layout;
pub mod probe;
pub mod report;
pub mod signature;
pub mod writer;

pub use app::{Config, Outcome, run, run_on};
pub use error::{NdmError, NdmResult};
