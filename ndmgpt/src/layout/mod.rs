// SPDX-License-Identifier: MIT

mod calculator;
mod partition;

pub use calculator::*;
pub use partition::*;
