// Copyright 2025
// SPDX-License-Identifier: GPL-3.0-or-later

//! # Hash/IO utility (C1)
//!
//! Streams a downloaded body through SHA256 while writing to a sibling path
//! suffixed `.part`. On successful completion and hash/size match, the file
//! is atomically renamed into place; on mismatch or abort the `.part` file
//! is deleted unless the caller asked to retain it. Follows the usual
//! content-addressed-store idiom (write-temp, hash, atomic rename, delete on
//! failure), stripped of the compression/encryption a generic object store
//! would need.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use sha2::{Digest as _, Sha256 as Sha256Hasher};
use snapshot_model::file::Sha256;
use tokio::io::AsyncWriteExt;

/// Errors raised while placing or re-hashing a file on disk.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The streamed body's hash did not match what the caller expected.
    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// The hash the caller expected.
        expected: Sha256,
        /// The hash actually computed.
        actual: Sha256,
    },
    /// The streamed body's size did not match what the caller expected.
    #[error("size mismatch: expected {expected}, got {actual}")]
    SizeMismatch {
        /// The size the caller expected.
        expected: u64,
        /// The size actually observed.
        actual: u64,
    },
    /// The upstream body stream itself failed partway through.
    #[error("stream error: {0}")]
    Stream(#[from] reqwest::Error),
}

/// The outcome of successfully placing a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// The digest of the bytes actually written.
    pub sha256: Sha256,
    /// The size of the bytes actually written.
    pub size: u64,
}

/// The sibling `.part` path used while a file is being written.
pub fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Stream `body` to `dest.part`, hashing as it writes. On success (and, if
/// given, hash/size agreement) renames `dest.part` to `dest`. On any
/// failure the `.part` file is removed unless `retain_on_failure` is set.
pub async fn place_stream<S>(
    dest: &Path,
    mut body: S,
    expected_sha256: Option<Sha256>,
    expected_size: Option<u64>,
    retain_on_failure: bool,
) -> Result<Placement, HashError>
where
    S: futures_util::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Unpin,
{
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let part = part_path(dest);

    let result = async {
        let mut file = tokio::fs::File::create(&part).await?;
        let mut hasher = Sha256Hasher::new();
        let mut size: u64 = 0;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            hasher.update(&chunk);
            size += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        let sha256 = Sha256::from_bytes(hasher.finalize().into());

        if let Some(expected) = expected_size {
            if expected != size {
                return Err(HashError::SizeMismatch {
                    expected,
                    actual: size,
                });
            }
        }
        if let Some(expected) = expected_sha256 {
            if expected != sha256 {
                return Err(HashError::HashMismatch {
                    expected,
                    actual: sha256,
                });
            }
        }
        Ok(Placement { sha256, size })
    }
    .await;

    match result {
        Ok(placement) => {
            tokio::fs::rename(&part, dest).await?;
            Ok(placement)
        }
        Err(err) => {
            if !retain_on_failure {
                let _ = tokio::fs::remove_file(&part).await;
            }
            Err(err)
        }
    }
}

/// Compute the SHA256 and size of a file already on disk, used by
/// `--check-only` to re-verify the `by-hash` tree against the store.
pub async fn hash_file(path: &Path) -> Result<Placement, HashError> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256Hasher::new();
    let mut size: u64 = 0;
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = tokio::io::AsyncReadExt::read(&mut file, &mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    Ok(Placement {
        sha256: Sha256::from_bytes(hasher.finalize().into()),
        size,
    })
}

/// Verify an in-memory body against an expected sha256/size, used for
/// bodies fetched without a `destination` (small index files kept in
/// memory rather than streamed to disk).
pub fn verify_bytes(
    body: &[u8],
    expected_sha256: Option<Sha256>,
    expected_size: Option<u64>,
) -> Result<(), HashError> {
    if let Some(expected) = expected_size {
        let actual = body.len() as u64;
        if expected != actual {
            return Err(HashError::SizeMismatch { expected, actual });
        }
    }
    if let Some(expected) = expected_sha256 {
        let actual = Sha256::from_bytes(Sha256Hasher::digest(body).into());
        if expected != actual {
            return Err(HashError::HashMismatch { expected, actual });
        }
    }
    Ok(())
}

/// Hard-link `existing` (the `by-hash` physical copy) to `link`, the
/// timestamped pool/dists path. Creates `link`'s parent directories.
/// Succeeds without error if `link` already exists (idempotent re-ingestion:
/// coalescer idempotence extends to re-linking).
pub async fn link_into_place(existing: &Path, link: &Path) -> Result<(), HashError> {
    if let Some(parent) = link.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    match tokio::fs::hard_link(existing, link).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use futures_util::stream;

    #[tokio::test]
    async fn places_and_renames() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("file.bin");
        let body = stream::iter(vec![Ok(bytes::Bytes::from_static(b"hello world"))]);

        let placement = place_stream(&dest, body, None, Some(11), false)
            .await
            .unwrap();
        assert_eq!(placement.size, 11);
        assert!(dest.exists());
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn rejects_size_mismatch_and_cleans_part() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("file.bin");
        let body = stream::iter(vec![Ok(bytes::Bytes::from_static(b"hello world"))]);

        let err = place_stream(&dest, body, None, Some(999), false)
            .await
            .unwrap_err();
        assert!(matches!(err, HashError::SizeMismatch { .. }));
        assert!(!dest.exists());
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn retains_part_on_failure_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("file.bin");
        let body = stream::iter(vec![Ok(bytes::Bytes::from_static(b"hello world"))]);

        let _ = place_stream(&dest, body, None, Some(999), true)
            .await
            .unwrap_err();
        assert!(part_path(&dest).exists());
    }

    #[tokio::test]
    async fn hash_file_matches_streamed_placement() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("file.bin");
        let body = stream::iter(vec![Ok(bytes::Bytes::from_static(b"hello world"))]);
        let placement = place_stream(&dest, body, None, Some(11), false)
            .await
            .unwrap();

        let rehashed = hash_file(&dest).await.unwrap();
        assert_eq!(rehashed.sha256, placement.sha256);
        assert_eq!(rehashed.size, placement.size);
    }
}
