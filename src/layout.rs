// Copyright 2025
// SPDX-License-Identifier: GPL-3.0-or-later

//! # Repository layout (C4)
//!
//! Deterministic bijection between logical coordinates and upstream URLs /
//! on-disk paths. Two kinds of repository files exist:
//!
//! - metadata (`Release`, `Packages.xz`, …): mirrored at the same relative
//!   path under every timestamp it was observed at.
//! - pool files (`.deb`/`.dsc`/source tarballs): stored once physically
//!   under `by-hash/{sha256[0:2]}/{sha256}` and hard-linked into every
//!   timestamped path that references them (C1's `link_into_place`).
//!
//! Grounded on `rpm-repository`'s path-derivation style (coordinates in,
//! URL/path out, no I/O), adapted from RPM's `repodata`/package-path split
//! to Debian's `dists`/`pool`/`by-hash` layout.

use std::path::PathBuf;

use snapshot_model::{file::Sha256, names::ArchiveName, timestamp::Timestamp};

/// The upstream URL for a repo-relative path under a given (archive, timestamp).
pub fn upstream_url(upstream_root: &str, archive: &ArchiveName, timestamp: &Timestamp, repo_path: &str) -> String {
    format!(
        "{}/archive/{archive}/{timestamp}/{repo_path}",
        upstream_root.trim_end_matches('/')
    )
}

/// The upstream URL listing all known timestamps for an archive.
pub fn timestamp_list_url(upstream_root: &str, archive: &ArchiveName) -> String {
    format!("{}/mr/timestamp/{archive}", upstream_root.trim_end_matches('/'))
}

/// The on-disk path mirroring `repo_path` under a given (archive, timestamp).
/// Used for both metadata and the timestamped pool-file path that gets
/// hard-linked to the `by-hash` physical copy.
pub fn timestamped_path(root: &std::path::Path, archive: &ArchiveName, timestamp: &Timestamp, repo_path: &str) -> PathBuf {
    root.join("archive").join(archive.as_ref()).join(timestamp.as_str()).join(repo_path)
}

/// The single physical location of a file, keyed by its content hash.
pub fn by_hash_path(root: &std::path::Path, sha256: &Sha256) -> PathBuf {
    root.join("by-hash").join(sha256.prefix()).join(sha256.to_hex())
}

/// Repo-relative path of a suite's `Release`/`InRelease` file.
pub fn release_path(suite: &str, inrelease: bool) -> String {
    if inrelease {
        format!("dists/{suite}/InRelease")
    } else {
        format!("dists/{suite}/Release")
    }
}

/// Repo-relative path of a component/arch's compressed `Packages` index.
pub fn packages_index_path(suite: &str, component: &str, arch: &str) -> String {
    format!("dists/{suite}/{component}/binary-{arch}/Packages.xz")
}

/// Repo-relative path of a component's compressed `Sources` index.
pub fn sources_index_path(suite: &str, component: &str) -> String {
    format!("dists/{suite}/{component}/source/Sources.xz")
}

/// Repo-relative path of the installer image manifest for an architecture.
pub fn installer_manifest_path(arch: &str) -> String {
    format!("dists/installer-{arch}/current/images/SHA256SUMS")
}

/// Repo-relative pool path for a source-derived file (`.dsc`, `.tar.*`, `.deb`).
///
/// Debian's pool layout buckets by the first letter of the source package
/// name, with an extra `lib` + fourth-letter bucket for `lib*` packages
/// (e.g. `libf/libfoo`, but plain `hello` buckets under `h/hello`).
pub fn pool_path(component: &str, source_name: &str, filename: &str) -> String {
    let prefix = pool_prefix(source_name);
    format!("pool/{component}/{prefix}/{source_name}/{filename}")
}

fn pool_prefix(source_name: &str) -> String {
    if let Some(rest) = source_name.strip_prefix("lib") {
        let fourth = rest.chars().next().unwrap_or('_');
        format!("lib{fourth}")
    } else {
        let first = source_name.chars().next().unwrap_or('_');
        first.to_string()
    }
}

/// Whether `archive` uses the QubesOS flat, non-temporal layout: a single
/// sentinel timestamp and no `dists/{suite}` hierarchy.
pub fn is_sentinel_archive(timestamp: &Timestamp) -> bool {
    timestamp.is_sentinel()
}

/// Repo-relative path for a QubesOS-style flat repository file: no
/// `dists/{suite}` component prefix, just `{component}/{filename}` directly
/// under the archive root.
pub fn qubes_flat_path(component: &str, filename: &str) -> String {
    format!("{component}/{filename}")
}

/// Repo-relative path of `Release` under the flat layout: no `dists/{suite}`
/// prefix, since a flat archive has neither.
pub fn qubes_release_path() -> String {
    "Release".to_owned()
}

/// Repo-relative path of the installer image manifest under the flat
/// layout: no `dists/` prefix.
pub fn qubes_installer_manifest_path(arch: &str) -> String {
    format!("installer-{arch}/current/images/SHA256SUMS")
}

#[cfg(test)]
mod test {
    use super::*;

    fn archive(name: &str) -> ArchiveName {
        ArchiveName::try_from(name).unwrap()
    }

    fn ts(value: &str) -> Timestamp {
        Timestamp::try_from(value).unwrap()
    }

    #[test]
    fn upstream_url_joins_coordinates() {
        let url = upstream_url(
            "https://snapshot.debian.org",
            &archive("debian"),
            &ts("20210221T150011Z"),
            "dists/bullseye/Release",
        );
        assert_eq!(
            url,
            "https://snapshot.debian.org/archive/debian/20210221T150011Z/dists/bullseye/Release"
        );
    }

    #[test]
    fn upstream_url_trims_trailing_slash() {
        let url = upstream_url(
            "https://snapshot.debian.org/",
            &archive("debian"),
            &ts("20210221T150011Z"),
            "dists/bullseye/Release",
        );
        assert!(!url.contains("//archive"));
    }

    #[test]
    fn pool_prefix_plain_package() {
        assert_eq!(pool_prefix("hello"), "h");
    }

    #[test]
    fn pool_prefix_lib_package() {
        assert_eq!(pool_prefix("libfoo"), "libf");
    }

    #[test]
    fn pool_path_layout() {
        assert_eq!(
            pool_path("main", "hello", "hello_2.10-2_amd64.deb"),
            "pool/main/h/hello/hello_2.10-2_amd64.deb"
        );
        assert_eq!(
            pool_path("main", "libfoo", "libfoo1_1.0-1_amd64.deb"),
            "pool/main/libf/libfoo/libfoo1_1.0-1_amd64.deb"
        );
    }

    #[test]
    fn by_hash_path_buckets_on_first_byte() {
        let sha256 =
            Sha256::try_from("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")
                .unwrap();
        let path = by_hash_path(std::path::Path::new("/root"), &sha256);
        assert_eq!(
            path,
            std::path::PathBuf::from("/root/by-hash/aa/aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")
        );
    }

    #[test]
    fn sentinel_archive_is_detected() {
        assert!(is_sentinel_archive(&Timestamp::sentinel()));
        assert!(!is_sentinel_archive(&ts("20210221T150011Z")));
    }

    #[test]
    fn qubes_flat_path_drops_dists_suite_prefix() {
        assert_eq!(qubes_flat_path("main", "binary-amd64/Packages.xz"), "main/binary-amd64/Packages.xz");
        assert_eq!(qubes_release_path(), "Release");
        assert_eq!(
            qubes_installer_manifest_path("amd64"),
            "installer-amd64/current/images/SHA256SUMS"
        );
    }
}
