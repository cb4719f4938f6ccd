// Copyright 2025
// SPDX-License-Identifier: GPL-3.0-or-later

//! `snapshot-ingest`: mirrors a Debian snapshot archive and records its
//! provenance. Exit codes: 0 on success, 1 on any irrecoverable
//! ingestion failure, 2 on invalid arguments.

use std::process::ExitCode;

use clap::Parser;
use snapshot_mirror::cli::IngestOptions;
use snapshot_mirror::config::Context;
use snapshot_mirror::ingest::Ingester;

#[tokio::main]
async fn main() -> ExitCode {
    let opts = IngestOptions::parse();

    let verbosity = if opts.debug {
        log::LevelFilter::Debug
    } else {
        opts.verbose.log_level_filter()
    };
    if let Err(err) = stderrlog::new().verbosity(verbosity).init() {
        eprintln!("failed to initialize logging: {err}");
        return ExitCode::from(2);
    }

    let ctx = match Context::resolve(opts.store.root.clone(), opts.store.upstream.clone(), opts.store.db_url.clone()) {
        Ok(ctx) => ctx,
        Err(err) => {
            log::error!("{err}");
            return ExitCode::from(2);
        }
    };

    let ingester = match Ingester::new(ctx, opts) {
        Ok(ingester) => ingester,
        Err(err) => {
            log::error!("failed to build HTTP client: {err}");
            return ExitCode::FAILURE;
        }
    };

    match ingester.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
