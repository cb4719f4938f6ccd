// Copyright 2025
// SPDX-License-Identifier: GPL-3.0-or-later

//! `snapshot-serve`: serves provenance and buildinfo-cover queries over a
//! local Debian snapshot archive replica.

use std::process::ExitCode;

use clap::Parser;
use snapshot_mirror::api;
use snapshot_mirror::cli::ServeOptions;
use snapshot_mirror::config::Context;

#[tokio::main]
async fn main() -> ExitCode {
    let opts = ServeOptions::parse();

    if let Err(err) = stderrlog::new().verbosity(opts.verbose.log_level_filter()).init() {
        eprintln!("failed to initialize logging: {err}");
        return ExitCode::from(2);
    }

    let ctx = match Context::resolve(opts.store.root, opts.store.upstream, opts.store.db_url) {
        Ok(ctx) => ctx,
        Err(err) => {
            log::error!("{err}");
            return ExitCode::from(2);
        }
    };

    let app = api::router(ctx);
    let listener = match tokio::net::TcpListener::bind(opts.listen).await {
        Ok(listener) => listener,
        Err(err) => {
            log::error!("failed to bind {}: {err}", opts.listen);
            return ExitCode::FAILURE;
        }
    };

    log::info!("listening on {}", opts.listen);
    if let Err(err) = axum::serve(listener, app).await {
        log::error!("{err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
