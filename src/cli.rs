// Copyright 2025
// SPDX-License-Identifier: GPL-3.0-or-later

//! # Command line options for `snapshot-ingest` and `snapshot-serve`

use std::{net::SocketAddr, path::PathBuf, str::FromStr};

use clap::Parser;
use snapshot_model::timestamp::Timestamp;

/// A single `--timestamp` argument: either a literal timestamp or a
/// `lo:hi` range, with either side optionally empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampSelector {
    /// A single, fully-specified timestamp.
    Exact(Timestamp),
    /// A half-open-or-closed range `lo:hi`; `None` means unbounded.
    Range {
        /// Inclusive lower bound, if given.
        lo: Option<Timestamp>,
        /// Inclusive upper bound, if given.
        hi: Option<Timestamp>,
    },
}

/// Invalid `--timestamp` argument.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("invalid --timestamp argument, expected YYYYMMDDThhmmssZ or lo:hi")]
pub struct InvalidTimestampSelector;

impl FromStr for TimestampSelector {
    type Err = InvalidTimestampSelector;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((lo, hi)) = s.split_once(':') {
            let lo = if lo.is_empty() {
                None
            } else {
                Some(Timestamp::try_from(lo).map_err(|_| InvalidTimestampSelector)?)
            };
            let hi = if hi.is_empty() {
                None
            } else {
                Some(Timestamp::try_from(hi).map_err(|_| InvalidTimestampSelector)?)
            };
            Ok(Self::Range { lo, hi })
        } else {
            Ok(Self::Exact(
                Timestamp::try_from(s).map_err(|_| InvalidTimestampSelector)?,
            ))
        }
    }
}

/// Options shared by both binaries: where the replica lives and how to talk
/// to it.
#[derive(Debug, Parser)]
pub struct StoreOptions {
    /// Local replica root directory
    ///
    /// Falls back to `SNAPSHOT_ROOT` if not given.
    #[clap(long)]
    pub root: Option<PathBuf>,
    /// Upstream snapshot service root
    ///
    /// Falls back to `SNAPSHOT_UPSTREAM`, then to the public snapshot.debian.org service.
    #[clap(long)]
    pub upstream: Option<String>,
    /// Provenance database location
    ///
    /// A filesystem path to the SQLite database (or `:memory:`). Falls back
    /// to `SNAPSHOT_DB_URL`, then to `{root}/snapshot.sqlite3`.
    #[clap(long)]
    pub db_url: Option<String>,
}

/// `snapshot-ingest` command-line options.
#[derive(Debug, Parser)]
#[command(version, about = "Mirror a Debian snapshot archive and record its provenance")]
pub struct IngestOptions {
    #[clap(flatten)]
    pub store: StoreOptions,
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity,
    /// Print debug-level diagnostics in addition to `--verbose`
    #[clap(long)]
    pub debug: bool,
    /// Archive to ingest (repeatable)
    #[clap(long, default_value = "debian")]
    pub archive: Vec<String>,
    /// Suite to ingest (repeatable)
    #[clap(long, default_value = "unstable")]
    pub suite: Vec<String>,
    /// Component to ingest (repeatable)
    #[clap(long, default_value = "main")]
    pub component: Vec<String>,
    /// Architecture to ingest (repeatable); defaults to the release architectures
    #[clap(long)]
    pub arch: Vec<String>,
    /// Timestamp or `lo:hi` range to ingest (repeatable)
    #[clap(long, required = true)]
    pub timestamp: Vec<TimestampSelector>,
    /// Re-hash on-disk files against the DB, report drifts, do not download or write DB
    #[clap(long)]
    pub check_only: bool,
    /// Download and provision the DB (the default behaviour)
    #[clap(long)]
    pub provision_db: bool,
    /// Skip download, re-parse indices already on disk, (re)run DB upserts
    #[clap(long)]
    pub provision_db_only: bool,
    /// Re-download and re-provision even tuples already marked as provisioned
    #[clap(long)]
    pub ignore_provisioned: bool,
    /// Do not delete `.part` files left behind by aborted downloads
    #[clap(long)]
    pub no_clean_part_file: bool,
    /// Skip the `installer-{arch}/current/images` tree
    #[clap(long)]
    pub skip_installer_files: bool,
    /// Width of the concurrent download pool
    #[clap(long, default_value_t = 8)]
    pub jobs: usize,
}

/// `snapshot-serve` command-line options.
#[derive(Debug, Parser)]
#[command(version, about = "Serve provenance queries over a Debian snapshot archive replica")]
pub struct ServeOptions {
    #[clap(flatten)]
    pub store: StoreOptions,
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity,
    /// Address to listen on
    #[clap(long, default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_exact_timestamp() {
        let sel: TimestampSelector = "20210221T150011Z".parse().unwrap();
        assert_eq!(
            sel,
            TimestampSelector::Exact(Timestamp::try_from("20210221T150011Z").unwrap())
        );
    }

    #[test]
    fn parses_open_ranges() {
        let sel: TimestampSelector = ":20210221T150011Z".parse().unwrap();
        assert_eq!(
            sel,
            TimestampSelector::Range {
                lo: None,
                hi: Some(Timestamp::try_from("20210221T150011Z").unwrap())
            }
        );
        let sel: TimestampSelector = "20210221T150011Z:".parse().unwrap();
        assert_eq!(
            sel,
            TimestampSelector::Range {
                lo: Some(Timestamp::try_from("20210221T150011Z").unwrap()),
                hi: None
            }
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!("not-a-timestamp".parse::<TimestampSelector>().is_err());
    }
}
