// Copyright 2025
// SPDX-License-Identifier: GPL-3.0-or-later

//! # Explicit pipeline context
//!
//! Threads an explicit [`Context`] (upstream root, local root, DB handle)
//! through the ingestion pipeline and through axum's `State`, rather than
//! keeping that state process-wide.

use std::path::PathBuf;

use crate::store::Store;

/// Environment variable carrying the database location (a filesystem path,
/// or `:memory:` for tests).
pub const ENV_DB_URL: &str = "SNAPSHOT_DB_URL";
/// Environment variable carrying the upstream snapshot service root.
pub const ENV_UPSTREAM: &str = "SNAPSHOT_UPSTREAM";
/// Environment variable carrying the local replica root directory.
pub const ENV_ROOT: &str = "SNAPSHOT_ROOT";

/// The default upstream snapshot service, used when neither `--upstream` nor
/// `SNAPSHOT_UPSTREAM` is set.
pub const DEFAULT_UPSTREAM: &str = "https://snapshot.debian.org";

/// Shared, explicit context threaded through the ingester pipeline and the
/// query server. Construct once per process via [`Context::resolve`].
#[derive(Clone)]
pub struct Context {
    /// Root of the local on-disk replica (`SNAPSHOT_ROOT` / `--root`).
    pub root: PathBuf,
    /// Root URL of the upstream snapshot service.
    pub upstream: String,
    /// Connection pool to the provenance store.
    pub store: Store,
}

impl Context {
    /// Build a [`Context`] from explicit CLI overrides, falling back to
    /// `SNAPSHOT_ROOT`/`SNAPSHOT_UPSTREAM`/`SNAPSHOT_DB_URL`. CLI values
    /// take precedence over the environment.
    pub fn resolve(
        root: Option<PathBuf>,
        upstream: Option<String>,
        db_url: Option<String>,
    ) -> anyhow::Result<Self> {
        let root = root
            .or_else(|| std::env::var_os(ENV_ROOT).map(PathBuf::from))
            .ok_or_else(|| anyhow::anyhow!("no local root given (pass it or set {ENV_ROOT})"))?;
        let upstream = upstream
            .or_else(|| std::env::var(ENV_UPSTREAM).ok())
            .unwrap_or_else(|| DEFAULT_UPSTREAM.to_owned());
        let db_url = db_url
            .or_else(|| std::env::var(ENV_DB_URL).ok())
            .unwrap_or_else(|| root.join("snapshot.sqlite3").to_string_lossy().into_owned());

        let store = Store::open(&db_url)?;
        Ok(Self {
            root,
            upstream,
            store,
        })
    }

    /// Path to the per-archive advisory lock file.
    pub fn lock_path(&self, archive: &snapshot_model::names::ArchiveName) -> PathBuf {
        self.root.join(".locks").join(format!("{archive}.lock"))
    }
}
