// Copyright 2025
// SPDX-License-Identifier: GPL-3.0-or-later

//! # Ingestion pipeline (C5)
//!
//! Drives one `snapshot-ingest` invocation: for every requested archive,
//! resolve the timestamps in scope, then for every (timestamp, suite,
//! component, architecture) tuple fetch the `Release` file and its
//! indices, download (or re-hash, under `--check-only`) every file they
//! reference, and reconcile the result into the provenance store inside
//! one short transaction per tuple.
//!
//! Structured as a pipeline object (built via `::new`, driven via `::run`),
//! async and resumable across per-tuple transactions, with progress
//! reported through an `indicatif::ProgressBar`.

use std::io::Read;

use fs2::FileExt;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use snapshot_model::{
    architectures::{Architecture, RELEASE_ARCHITECTURES},
    file::Sha256,
    index,
    names::{ArchiveName, ComponentName, SuiteName},
    package::PackageKind,
    timestamp::Timestamp,
};

use crate::{
    cli::{IngestOptions, TimestampSelector},
    config::Context,
    fetch::{FetchError, FetchOptions, FetchOutcome, Fetcher},
    hash::{self, HashError},
    layout,
    store::{StorageError, Store},
};

/// Errors raised while ingesting one archive. Most fetch/parse
/// failures are recorded per-file or per-paragraph and do not stop the run;
/// this type carries only the fatal ones (`LockHeld`, a fatal `Release`
/// parse, and `StorageError`, which aborts the current tuple).
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Another process already holds the archive's advisory lock.
    #[error("archive {0} is locked by another process")]
    LockHeld(ArchiveName),
    /// Fetching or parsing the top-level `Release`/`InRelease` failed; fatal
    /// for this (archive, timestamp).
    #[error("failed to fetch or parse Release for {archive}/{timestamp}: {source}")]
    Release {
        /// The archive being ingested.
        archive: ArchiveName,
        /// The timestamp being ingested.
        timestamp: Timestamp,
        /// The underlying error.
        #[source]
        source: ReleaseError,
    },
    /// The provenance store rejected a write; fatal for this tuple's
    /// transaction.
    #[error("{0}")]
    Storage(#[from] StorageError),
    /// Filesystem I/O outside of the hash/fetch modules.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A CLI-supplied name failed validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Why fetching/parsing a `Release` failed.
#[derive(Debug, thiserror::Error)]
pub enum ReleaseError {
    /// The fetch itself failed (network, status, retries exhausted).
    #[error("{0}")]
    Fetch(#[from] FetchError),
    /// The body fetched was not a valid `Release` paragraph.
    #[error("{0}")]
    Parse(#[from] rfc822_like::de::Error),
}

/// Per-file outcome recorded while ingesting one index.
/// `NetworkFatal`/`HashMismatch`/`SizeMismatch` are per-record failures that
/// do not abort the timestamp.
#[derive(Debug)]
pub struct FileFailure {
    /// Repo-relative path of the file that failed.
    pub repo_path: String,
    /// A human-readable description of the failure.
    pub reason: String,
}

/// Drives ingestion for one `snapshot-ingest` invocation.
pub struct Ingester {
    ctx: Context,
    fetcher: Fetcher,
    options: IngestOptions,
}

impl Ingester {
    /// Build an ingester from a resolved [`Context`] and parsed CLI options.
    pub fn new(ctx: Context, options: IngestOptions) -> reqwest::Result<Self> {
        let fetcher = Fetcher::new(options.jobs)?;
        Ok(Self { ctx, fetcher, options })
    }

    /// Run the pipeline for every archive named on the command line.
    pub async fn run(&self) -> Result<(), IngestError> {
        for archive in &self.options.archive {
            let archive = ArchiveName::try_from(archive.as_str())
                .map_err(|_| IngestError::InvalidArgument(format!("invalid --archive {archive:?}")))?;
            self.run_archive(&archive).await?;
        }
        Ok(())
    }

    fn requested_architectures(&self) -> Result<Vec<Architecture>, IngestError> {
        if self.options.arch.is_empty() {
            return Ok(RELEASE_ARCHITECTURES.to_vec());
        }
        self.options
            .arch
            .iter()
            .map(|a| {
                Architecture::try_from(a.as_str()).map_err(|_| IngestError::InvalidArgument(format!("invalid --arch {a:?}")))
            })
            .collect()
    }

    async fn run_archive(&self, archive: &ArchiveName) -> Result<(), IngestError> {
        let lock_path = self.ctx.lock_path(archive);
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let lock_file = std::fs::OpenOptions::new().create(true).write(true).open(&lock_path)?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| IngestError::LockHeld(archive.clone()))?;

        let result = self.run_archive_locked(archive).await;
        let _ = lock_file.unlock();
        result
    }

    async fn run_archive_locked(&self, archive: &ArchiveName) -> Result<(), IngestError> {
        let architectures = self.requested_architectures()?;
        let timestamps = self.resolve_timestamps(archive).await?;

        let progress = ProgressBar::new(timestamps.len() as u64);
        if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}") {
            progress.set_style(style);
        }

        for timestamp in &timestamps {
            progress.set_message(timestamp.as_str().to_owned());

            let release = match self.fetch_release(archive, timestamp).await {
                Ok(release) => release,
                Err(source) => {
                    return Err(IngestError::Release {
                        archive: archive.clone(),
                        timestamp: timestamp.clone(),
                        source,
                    })
                }
            };

            for suite in &self.options.suite {
                let suite = SuiteName::try_from(suite.as_str())
                    .map_err(|_| IngestError::InvalidArgument(format!("invalid --suite {suite:?}")))?;
                for component in &self.options.component {
                    let component = ComponentName::try_from(component.as_str())
                        .map_err(|_| IngestError::InvalidArgument(format!("invalid --component {component:?}")))?;
                    self.ingest_tuple(archive, timestamp, &suite, &component, &architectures, &release)
                        .await?;
                }
            }
            progress.inc(1);
        }
        progress.finish();
        Ok(())
    }

    /// Step 1: timestamp discovery. An exact selector is used as-is; a
    /// `lo:hi` range is resolved against the upstream's full timestamp list,
    /// fetched once per run.
    async fn resolve_timestamps(&self, archive: &ArchiveName) -> Result<Vec<Timestamp>, IngestError> {
        let mut needs_listing = false;
        for selector in &self.options.timestamp {
            if matches!(selector, TimestampSelector::Range { .. }) {
                needs_listing = true;
            }
        }

        let all: Vec<Timestamp> = if needs_listing {
            let url = layout::timestamp_list_url(&self.ctx.upstream, archive);
            let outcome = self
                .fetcher
                .fetch(
                    &url,
                    &FetchOptions {
                        use_cache: false,
                        ..Default::default()
                    },
                )
                .await
                .map_err(ReleaseError::Fetch)
                .map_err(|source| IngestError::Release {
                    archive: archive.clone(),
                    timestamp: Timestamp::sentinel(),
                    source,
                })?;
            let body = match outcome {
                FetchOutcome::Body(body) => body,
                _ => Default::default(),
            };
            serde_json::from_slice::<Vec<String>>(&body)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|v| Timestamp::try_from(v).ok())
                .collect()
        } else {
            Vec::new()
        };

        let mut selected = Vec::new();
        for selector in &self.options.timestamp {
            match selector {
                TimestampSelector::Exact(timestamp) => selected.push(timestamp.clone()),
                TimestampSelector::Range { lo, hi } => {
                    for timestamp in &all {
                        if lo.as_ref().is_some_and(|lo| timestamp < lo) {
                            continue;
                        }
                        if hi.as_ref().is_some_and(|hi| timestamp > hi) {
                            continue;
                        }
                        selected.push(timestamp.clone());
                    }
                }
            }
        }
        selected.sort();
        selected.dedup();
        Ok(selected)
    }

    /// Step 2-3: fetch and parse the top-level `Release`.
    async fn fetch_release(&self, archive: &ArchiveName, timestamp: &Timestamp) -> Result<index::ReleaseFile, ReleaseError> {
        // the suite path component of `Release` is resolved per-suite below;
        // here we only need one representative suite to locate it, since
        // every suite in this run shares the same (archive, timestamp).
        let repo_path = if layout::is_sentinel_archive(timestamp) {
            layout::qubes_release_path()
        } else {
            let suite = self.options.suite.first().map(String::as_str).unwrap_or("unstable");
            layout::release_path(suite, false)
        };
        let url = layout::upstream_url(&self.ctx.upstream, archive, timestamp, &repo_path);
        let outcome = self
            .fetcher
            .fetch(
                &url,
                &FetchOptions {
                    use_cache: false,
                    ..Default::default()
                },
            )
            .await?;
        let body = match outcome {
            FetchOutcome::Body(body) => body,
            _ => Default::default(),
        };
        let text = String::from_utf8_lossy(&body);
        Ok(index::release_from_str(&text)?)
    }

    /// Steps 4-7 for one (archive, timestamp, suite, component, arch*) tuple:
    /// fetch the Sources/Packages indices (and, unless `--skip-installer-
    /// files`, the installer image manifests), download every referenced
    /// file, and provision the DB in one transaction. Architectures already
    /// marked provisioned are skipped unless `--ignore-provisioned` is set.
    async fn ingest_tuple(
        &self,
        archive: &ArchiveName,
        timestamp: &Timestamp,
        suite: &SuiteName,
        component: &ComponentName,
        architectures: &[Architecture],
        release: &index::ReleaseFile,
    ) -> Result<(), IngestError> {
        let mut failures = Vec::new();
        let mut to_download: Vec<DownloadedFile> = Vec::new();

        let ids = self.resolve_tuple_ids(archive, timestamp, suite, component)?;
        let mut processed_architectures = Vec::new();

        if self.options.ignore_provisioned || !self.is_provisioned(&ids, Architecture::Source)? {
            processed_architectures.push(Architecture::Source);
            let sources = self
                .fetch_sources(archive, timestamp, suite, component, release)
                .await
                .unwrap_or_else(|err| {
                    warn!("skipping Sources for {suite}/{component}: {err}");
                    Vec::new()
                });
            for entry in &sources {
                for (filename, info) in &entry.checksums_sha256 {
                    to_download.push(DownloadedFile {
                        repo_path: format!("{}/{}", entry.directory, filename),
                        pool_path: layout::pool_path(component.as_ref(), entry.package.as_ref(), filename),
                        sha256: info.sha256,
                        size: Some(info.size),
                        package: Some((PackageKind::Source, entry.package.to_string(), entry.version.to_string())),
                        architecture: Architecture::Source,
                    });
                }
            }
        } else {
            info!("{suite}/{component}/source already provisioned at {timestamp}, skipping");
        }

        for architecture in architectures {
            if !self.options.ignore_provisioned && self.is_provisioned(&ids, *architecture)? {
                info!("{suite}/{component}/{architecture} already provisioned at {timestamp}, skipping");
                continue;
            }
            processed_architectures.push(*architecture);

            let packages = self
                .fetch_packages(archive, timestamp, suite, component, &architecture.to_string(), release)
                .await
                .unwrap_or_else(|err| {
                    warn!("skipping Packages for {suite}/{component}/{architecture}: {err}");
                    Vec::new()
                });
            for entry in packages {
                to_download.push(DownloadedFile {
                    repo_path: entry.filename.clone(),
                    pool_path: entry.filename.clone(),
                    sha256: entry.sha256,
                    size: Some(entry.size),
                    package: Some((PackageKind::Binary, entry.package.to_string(), entry.version.to_string())),
                    architecture: entry.architecture,
                });
            }

            if !self.options.skip_installer_files {
                to_download.extend(self.fetch_installer_files(archive, timestamp, *architecture).await);
            }
        }

        let mut placed: Vec<(&DownloadedFile, u64)> = Vec::new();
        for file in &to_download {
            match self.place_file(archive, timestamp, file).await {
                Ok(size) => placed.push((file, size)),
                Err(err) => {
                    failures.push(FileFailure {
                        repo_path: file.repo_path.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        for failure in &failures {
            warn!("failed to ingest {}: {}", failure.repo_path, failure.reason);
        }
        if self.options.check_only {
            info!("{archive}/{timestamp}/{suite}/{component}: {} files verified", placed.len());
            return Ok(());
        }

        self.provision(&ids, timestamp, &processed_architectures, &placed)?;
        Ok(())
    }

    /// Upserts (archive, timestamp, suite, component) outside any
    /// transaction so their ids are available for the `is_provisioned`
    /// fast-path checks ahead of the tuple's real work. Idempotent.
    fn resolve_tuple_ids(
        &self,
        archive: &ArchiveName,
        timestamp: &Timestamp,
        suite: &SuiteName,
        component: &ComponentName,
    ) -> Result<TupleIds, IngestError> {
        let conn = self.ctx.store.get()?;
        let archive_id = Store::upsert_archive(&conn, archive.as_ref()).map_err(StorageError::from)?;
        let timestamp_id = Store::upsert_timestamp(&conn, archive_id, timestamp.as_str())?;
        let suite_id = Store::upsert_suite(&conn, archive_id, suite.as_ref()).map_err(StorageError::from)?;
        let component_id = Store::upsert_component(&conn, suite_id, component.as_ref()).map_err(StorageError::from)?;
        Ok(TupleIds {
            archive_id,
            timestamp_id,
            suite_id,
            component_id,
        })
    }

    fn is_provisioned(&self, ids: &TupleIds, architecture: Architecture) -> Result<bool, IngestError> {
        let conn = self.ctx.store.get()?;
        let architecture_id = Store::upsert_architecture(&conn, architecture).map_err(StorageError::from)?;
        Store::is_provisioned(&conn, ids.archive_id, ids.timestamp_id, ids.suite_id, ids.component_id, architecture_id)
            .map_err(StorageError::from)
            .map_err(IngestError::from)
    }

    /// Fetches `installer-{arch}/current/images/SHA256SUMS` and every file
    /// it references. Absence of a manifest (no installer images for this
    /// architecture) is not an error.
    async fn fetch_installer_files(&self, archive: &ArchiveName, timestamp: &Timestamp, architecture: Architecture) -> Vec<DownloadedFile> {
        let manifest_path = if layout::is_sentinel_archive(timestamp) {
            layout::qubes_installer_manifest_path(&architecture.to_string())
        } else {
            layout::installer_manifest_path(&architecture.to_string())
        };
        let manifest_dir = manifest_path.strip_suffix("/SHA256SUMS").unwrap_or(&manifest_path);
        let url = layout::upstream_url(&self.ctx.upstream, archive, timestamp, &manifest_path);
        let outcome = match self
            .fetcher
            .fetch(
                &url,
                &FetchOptions {
                    use_cache: false,
                    ..Default::default()
                },
            )
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                debug!("no installer images for {architecture} at {timestamp}: {err}");
                return Vec::new();
            }
        };
        let body = match outcome {
            FetchOutcome::Body(body) => body,
            _ => Default::default(),
        };
        let text = String::from_utf8_lossy(&body);

        let mut files = Vec::new();
        for line in text.lines() {
            let mut fields = line.split_whitespace();
            let (Some(sha256_str), Some(filename)) = (fields.next(), fields.next()) else {
                continue;
            };
            let Ok(sha256) = Sha256::try_from(sha256_str) else {
                continue;
            };
            let repo_path = format!("{manifest_dir}/{filename}");
            files.push(DownloadedFile {
                repo_path: repo_path.clone(),
                pool_path: repo_path,
                sha256,
                size: None,
                package: None,
                architecture,
            });
        }
        files
    }

    async fn fetch_sources(
        &self,
        archive: &ArchiveName,
        timestamp: &Timestamp,
        suite: &SuiteName,
        component: &ComponentName,
        release: &index::ReleaseFile,
    ) -> Result<Vec<index::SourcesEntry>, FetchError> {
        let repo_path = if layout::is_sentinel_archive(timestamp) {
            layout::qubes_flat_path(component.as_ref(), "source/Sources.xz")
        } else {
            layout::sources_index_path(suite.as_ref(), component.as_ref())
        };
        let text = self.fetch_text_index(archive, timestamp, suite, &repo_path, release).await?;
        Ok(index::paragraphs(&text)
            .filter_map(|paragraph| match index::sources_entry_from_str(paragraph) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    debug!("skipping malformed Sources paragraph: {err}");
                    None
                }
            })
            .collect())
    }

    async fn fetch_packages(
        &self,
        archive: &ArchiveName,
        timestamp: &Timestamp,
        suite: &SuiteName,
        component: &ComponentName,
        arch: &str,
        release: &index::ReleaseFile,
    ) -> Result<Vec<index::PackagesEntry>, FetchError> {
        let repo_path = if layout::is_sentinel_archive(timestamp) {
            layout::qubes_flat_path(component.as_ref(), &format!("binary-{arch}/Packages.xz"))
        } else {
            layout::packages_index_path(suite.as_ref(), component.as_ref(), arch)
        };
        let text = self.fetch_text_index(archive, timestamp, suite, &repo_path, release).await?;
        Ok(index::paragraphs(&text)
            .filter_map(|paragraph| match index::packages_entry_from_str(paragraph) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    debug!("skipping malformed Packages paragraph: {err}");
                    None
                }
            })
            .collect())
    }

    /// Fetches and decompresses one `Sources`/`Packages` index, verifying it
    /// against the sha256/size `Release` advertises for it when present.
    /// `release.files` keys are paths relative to `dists/{suite}/`, so
    /// `repo_path` (rooted at the archive) has that prefix stripped before
    /// the lookup.
    async fn fetch_text_index(
        &self,
        archive: &ArchiveName,
        timestamp: &Timestamp,
        suite: &SuiteName,
        repo_path: &str,
        release: &index::ReleaseFile,
    ) -> Result<String, FetchError> {
        let url = layout::upstream_url(&self.ctx.upstream, archive, timestamp, repo_path);
        let release_relative = repo_path
            .strip_prefix(&format!("dists/{}/", suite.as_ref()))
            .unwrap_or(repo_path);
        let info = release.files.get(release_relative);
        let outcome = self
            .fetcher
            .fetch(
                &url,
                &FetchOptions {
                    expected_sha256: info.map(|info| info.sha256),
                    expected_size: info.map(|info| info.size),
                    use_cache: false,
                    ..Default::default()
                },
            )
            .await?;
        let body = match outcome {
            FetchOutcome::Body(body) => body,
            _ => Default::default(),
        };
        Ok(decompress(repo_path, &body))
    }

    /// Places one file under `by-hash` and hard-links it into its
    /// timestamped path. Returns its verified size — from `file.size` when
    /// the index gave one, otherwise (installer files) from what was
    /// actually downloaded or already on disk.
    async fn place_file(&self, archive: &ArchiveName, timestamp: &Timestamp, file: &DownloadedFile) -> Result<u64, IngestFileError> {
        let by_hash = layout::by_hash_path(&self.ctx.root, &file.sha256);
        let timestamped = layout::timestamped_path(&self.ctx.root, archive, timestamp, &file.pool_path);

        if self.options.check_only {
            let placement = hash::hash_file(&by_hash).await?;
            if let Some(expected) = file.size {
                if placement.size != expected {
                    return Err(IngestFileError::Hash(HashError::SizeMismatch {
                        expected,
                        actual: placement.size,
                    }));
                }
            }
            if placement.sha256 != file.sha256 {
                return Err(IngestFileError::Hash(HashError::HashMismatch {
                    expected: file.sha256,
                    actual: placement.sha256,
                }));
            }
            return Ok(placement.size);
        }

        if self.options.provision_db_only {
            let size = match tokio::fs::metadata(&by_hash).await {
                Ok(meta) => meta.len(),
                Err(_) => file.size.unwrap_or_default(),
            };
            return Ok(size);
        }

        let size = if by_hash.exists() {
            match tokio::fs::metadata(&by_hash).await {
                Ok(meta) => meta.len(),
                Err(_) => file.size.unwrap_or_default(),
            }
        } else {
            let url = layout::upstream_url(&self.ctx.upstream, archive, timestamp, &file.repo_path);
            let options = FetchOptions {
                expected_sha256: Some(file.sha256),
                expected_size: file.size,
                destination: Some(by_hash.clone()),
                use_cache: false,
                retain_part_on_failure: self.options.no_clean_part_file,
            };
            match self.fetcher.fetch(&url, &options).await? {
                FetchOutcome::Written(placement) => placement.size,
                _ => file.size.unwrap_or_default(),
            }
        };
        hash::link_into_place(&by_hash, &timestamped).await?;
        Ok(size)
    }

    /// Step 6-7: open a transaction scoped to this tuple, upsert every
    /// entity, record each Observation (running the coalescer for genuinely
    /// new ones), and mark the tuple provisioned.
    fn provision(
        &self,
        ids: &TupleIds,
        timestamp: &Timestamp,
        architectures: &[Architecture],
        placed: &[(&DownloadedFile, u64)],
    ) -> Result<(), IngestError> {
        let TupleIds {
            archive_id,
            timestamp_id,
            suite_id,
            component_id,
        } = *ids;

        let mut conn = self.ctx.store.get()?;
        let txn = conn.transaction().map_err(StorageError::from)?;

        for (file, size) in placed {
            Store::upsert_file(&txn, &file.sha256.to_hex(), *size)?;
            let architecture_id = Store::upsert_architecture(&txn, file.architecture).map_err(StorageError::from)?;
            let (path, name) = split_repo_path(&file.pool_path);
            let location_id =
                Store::upsert_location(&txn, archive_id, suite_id, component_id, &path, &name).map_err(StorageError::from)?;
            Store::record_observation(
                &txn,
                archive_id,
                &file.sha256.to_hex(),
                location_id,
                architecture_id,
                timestamp_id,
                timestamp.as_str(),
            )?;
            if let Some((kind, name, version)) = &file.package {
                let package_id = Store::upsert_package(&txn, *kind, name, version).map_err(StorageError::from)?;
                Store::link_package_file(&txn, package_id, &file.sha256.to_hex(), architecture_id).map_err(StorageError::from)?;
            }
        }

        for architecture in architectures {
            let architecture_id = Store::upsert_architecture(&txn, *architecture).map_err(StorageError::from)?;
            Store::mark_provisioned(&txn, archive_id, timestamp_id, suite_id, component_id, architecture_id)
                .map_err(StorageError::from)?;
        }

        txn.commit().map_err(StorageError::from)?;
        Ok(())
    }
}

fn split_repo_path(repo_path: &str) -> (String, String) {
    match repo_path.rsplit_once('/') {
        Some((path, name)) => (path.to_owned(), name.to_owned()),
        None => (String::new(), repo_path.to_owned()),
    }
}

struct DownloadedFile {
    repo_path: String,
    pool_path: String,
    sha256: Sha256,
    /// Size as given by the referencing index; `None` for installer files,
    /// whose manifest (`SHA256SUMS`) carries no size field.
    size: Option<u64>,
    package: Option<(PackageKind, String, String)>,
    architecture: Architecture,
}

/// Row ids for one (archive, timestamp, suite, component) tuple, resolved
/// once up front so the provisioned-skip check and the provisioning
/// transaction agree on the same ids.
#[derive(Debug, Clone, Copy)]
struct TupleIds {
    archive_id: i64,
    timestamp_id: i64,
    suite_id: i64,
    component_id: i64,
}

/// Per-file failure: `NetworkFatal`/`HashMismatch`/`SizeMismatch`.
#[derive(Debug, thiserror::Error)]
enum IngestFileError {
    #[error("{0}")]
    Fetch(#[from] FetchError),
    #[error("{0}")]
    Hash(#[from] HashError),
}

/// Decompress a fetched index body by its repo-relative path's extension.
/// Falls back to the raw bytes (lossily, as UTF-8) if the extension is
/// unrecognized or decompression fails, since a malformed index is a
/// per-paragraph parsing concern, not this function's.
fn decompress(repo_path: &str, body: &[u8]) -> String {
    let result: std::io::Result<Vec<u8>> = if repo_path.ends_with(".xz") {
        let mut out = Vec::new();
        xz2::read::XzDecoder::new(body).read_to_end(&mut out).map(|_| out)
    } else if repo_path.ends_with(".gz") {
        let mut out = Vec::new();
        flate2::read::GzDecoder::new(body).read_to_end(&mut out).map(|_| out)
    } else if repo_path.ends_with(".bz2") {
        let mut out = Vec::new();
        bzip2::read::BzDecoder::new(body).read_to_end(&mut out).map(|_| out)
    } else {
        Ok(body.to_vec())
    };
    match result {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) => {
            warn!("failed to decompress {repo_path}: {err}");
            String::new()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn split_repo_path_separates_directory_and_filename() {
        assert_eq!(
            split_repo_path("pool/main/h/hello/hello_2.10-2_amd64.deb"),
            ("pool/main/h/hello".to_owned(), "hello_2.10-2_amd64.deb".to_owned())
        );
        assert_eq!(split_repo_path("Release"), (String::new(), "Release".to_owned()));
    }

    #[test]
    fn decompress_passes_through_unknown_extensions() {
        assert_eq!(decompress("Release", b"hello"), "hello");
    }
}
