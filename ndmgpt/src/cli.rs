// SPDX-License-Identifier: MIT

use std::ffi::OsString;

use clap::{ArgAction, Parser, builder::BoolishValueParser};

use crate::app::Config;

/// Long flags that older callers pass with a single dash.
const LEGACY_FLAGS: &[&str] = &["disk", "create"];

#[derive(Parser, Debug)]
#[command(
    name = "ndmgpt",
    version,
    about = "Create a single 1MiB-aligned OpenEBS_NDM GPT partition on a blank disk",
    long_about = None
)]
pub struct Cli {
    /// Device to probe and partition (e.g., /dev/sdX or a disk image)
    #[arg(long, default_value = "")]
    pub disk: String,

    /// Write the computed table after printing it
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value = "false",
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub create: bool,

    /// Logical block size of regular image files (default 512)
    #[arg(long, value_parser = parse_sector_size)]
    pub sector_size: Option<u64>,

    /// More diagnostics on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only errors on stderr
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Parses `args`, accepting `-disk` / `-create` spellings.
    pub fn parse_legacy<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::parse_from(normalize_legacy_flags(args))
    }

    pub fn try_parse_legacy<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::try_parse_from(normalize_legacy_flags(args))
    }

    pub fn config(&self) -> Config {
        Config {
            disk: self.disk.clone(),
            create: self.create,
            sector_size: self.sector_size,
        }
    }
}

/// Rewrites `-disk`, `-disk=x`, `-create`, `-create=false` to double-dash form.
///
/// The program name and anything after `--` are left alone.
pub fn normalize_legacy_flags<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut out = Vec::new();
    let mut passthrough = false;

    for (i, arg) in args.into_iter().map(Into::<OsString>::into).enumerate() {
        if i == 0 || passthrough {
            out.push(arg);
            continue;
        }
        if arg == "--" {
            passthrough = true;
            out.push(arg);
            continue;
        }

        let rewritten = arg.to_str().and_then(|s| {
            let flag = s.strip_prefix('-').filter(|f| !f.starts_with('-'))?;
            let name = flag.split_once('=').map_or(flag, |(n, _)| n);
            LEGACY_FLAGS
                .contains(&name)
                .then(|| OsString::from(format!("--{flag}")))
        });
        out.push(rewritten.unwrap_or(arg));
    }
    out
}

fn parse_sector_size(s: &str) -> Result<u64, String> {
    let sz: u64 = s.parse().map_err(|e| format!("{e}"))?;
    if sz < 512 || !sz.is_power_of_two() {
        return Err(format!("{sz} is not a power of two of at least 512"));
    }
    Ok(sz)
}
