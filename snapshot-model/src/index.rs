// Copyright 2025
// SPDX-License-Identifier: LGPL-3.0-or-later

//! # Index file parsing (C3)
//!
//! Parses the RFC822-style paragraph format used by `Release`, `Sources`
//! and `Packages` index files. Each view is an explicit typed record,
//! built on the same `rfc822-like` + `serde` machinery
//! `assorted-debian-utils::release`/`buildinfo` already used.
//!
//! `Sources`/`Packages` files contain *multiple* paragraphs separated by a
//! blank line; [`paragraphs`] exposes those as a lazy iterator over
//! `&str` slices so a caller can parse (and discard) one paragraph at a
//! time instead of materializing the whole file into one `Vec`.

use std::collections::HashMap;
use std::fmt::Formatter;
use std::io::{BufRead, Cursor};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::architectures::Architecture;
use crate::file::Sha256;
use crate::names::ComponentName;
use crate::package::PackageName;
use crate::utils::{DateTimeVisitor, WhitespaceListVisitor};
use crate::version::PackageVersion;

/// Split an index file's contents into its constituent RFC822 paragraphs.
///
/// Paragraphs are separated by one or more blank lines; folded
/// continuation lines (starting with whitespace) remain part of the
/// paragraph they continue. The iterator is lazy: it scans forward over
/// `input` as the caller advances it, without copying `input` itself.
pub fn paragraphs(input: &str) -> impl Iterator<Item = &str> {
    let mut rest = input;
    // skip any leading blank lines
    while let Some(stripped) = rest.strip_prefix('\n') {
        rest = stripped;
    }
    std::iter::from_fn(move || {
        while rest.strip_prefix('\n').is_some() {
            rest = &rest[1..];
        }
        if rest.is_empty() {
            return None;
        }
        // find a blank line (two consecutive newlines) that ends this paragraph
        let end = find_paragraph_end(rest);
        let (paragraph, remainder) = rest.split_at(end);
        rest = remainder;
        Some(paragraph.trim_end_matches('\n'))
    })
}

fn find_paragraph_end(input: &str) -> usize {
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\n' {
            if i + 1 < bytes.len() && bytes[i + 1] == b'\n' {
                return i + 1;
            }
            if i + 1 == bytes.len() {
                return bytes.len();
            }
        }
        i += 1;
    }
    bytes.len()
}

#[derive(Debug)]
struct FileListVisitor;

impl serde::de::Visitor<'_> for FileListVisitor {
    type Value = HashMap<String, IndexFileInfo>;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        write!(formatter, "a list of sha256, size, path triples")
    }

    fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        let cursor = Cursor::new(s);
        let mut ret: HashMap<String, IndexFileInfo> = Default::default();
        for line in cursor.lines() {
            let Ok(line) = line else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let fields: Vec<_> = line.split_ascii_whitespace().collect();
            if fields.len() != 3 {
                return Err(E::invalid_value(serde::de::Unexpected::Str(line), &self));
            }

            let path = fields[2];
            let size = fields[1].parse().map_err(E::custom)?;
            let sha256 = Sha256::try_from(fields[0]).map_err(E::custom)?;

            ret.insert(path.to_string(), IndexFileInfo { sha256, size });
        }
        Ok(ret)
    }
}

fn deserialize_sha256_block<'de, D>(
    deserializer: D,
) -> Result<HashMap<String, IndexFileInfo>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    deserializer.deserialize_str(FileListVisitor)
}

fn deserialize_datetime<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    deserializer.deserialize_str(DateTimeVisitor("%a, %d %b %Y %H:%M:%S %Z"))
}

fn deserialize_datetime_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    deserialize_datetime(deserializer).map(Some)
}

fn deserialize_architectures<'de, D>(deserializer: D) -> Result<Vec<Architecture>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    deserializer.deserialize_str(WhitespaceListVisitor::<Architecture>::new())
}

fn deserialize_components<'de, D>(deserializer: D) -> Result<Vec<ComponentName>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct Visitor;
    impl serde::de::Visitor<'_> for Visitor {
        type Value = Vec<ComponentName>;
        fn expecting(&self, f: &mut Formatter) -> std::fmt::Result {
            write!(f, "a whitespace-separated list of components")
        }
        fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            s.split_whitespace()
                .map(|item| {
                    ComponentName::try_from(item)
                        .map_err(|_| E::invalid_value(serde::de::Unexpected::Str(item), &self))
                })
                .collect()
        }
    }
    deserializer.deserialize_str(Visitor)
}

/// File metadata as referenced by a `Release` file's checksum blocks.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
pub struct IndexFileInfo {
    /// The file's size in bytes.
    pub size: u64,
    /// The file's sha256 digest.
    pub sha256: Sha256,
}

/// The `Release` view of an index.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ReleaseFile {
    /// Suite, e.g. `unstable`.
    pub suite: Option<String>,
    /// Codename, e.g. `sid`.
    pub codename: Option<String>,
    /// Release date.
    #[serde(deserialize_with = "deserialize_datetime")]
    pub date: DateTime<Utc>,
    /// Validity of the release.
    #[serde(
        default,
        deserialize_with = "deserialize_datetime_option",
        rename = "Valid-Until"
    )]
    pub valid_until: Option<DateTime<Utc>>,
    /// Supported architectures.
    #[serde(deserialize_with = "deserialize_architectures")]
    pub architectures: Vec<Architecture>,
    /// Components advertised by this release.
    #[serde(deserialize_with = "deserialize_components")]
    pub components: Vec<ComponentName>,
    /// Referenced index files, keyed by their repo-relative path.
    #[serde(rename = "SHA256", deserialize_with = "deserialize_sha256_block")]
    pub files: HashMap<String, IndexFileInfo>,
}

/// Read a `Release` file from a reader.
pub fn release_from_reader(reader: impl BufRead) -> Result<ReleaseFile, rfc822_like::de::Error> {
    rfc822_like::from_reader(reader)
}

/// Read a `Release` file from a string.
pub fn release_from_str(data: &str) -> Result<ReleaseFile, rfc822_like::de::Error> {
    rfc822_like::from_str(data)
}

/// One paragraph of a `Sources` index.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct SourcesEntry {
    /// The source package name.
    pub package: PackageName,
    /// The source package version.
    pub version: PackageVersion,
    /// Pool-relative directory the listed files live in.
    pub directory: String,
    /// Referenced files, keyed by filename.
    #[serde(rename = "Checksums-Sha256", deserialize_with = "deserialize_sha256_block")]
    pub checksums_sha256: HashMap<String, IndexFileInfo>,
}

/// Parse one `Sources` paragraph.
pub fn sources_entry_from_str(data: &str) -> Result<SourcesEntry, rfc822_like::de::Error> {
    rfc822_like::from_str(data)
}

/// One paragraph of a `Packages` index.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct PackagesEntry {
    /// The binary package name.
    pub package: PackageName,
    /// The binary package version.
    pub version: PackageVersion,
    /// The binary package's architecture.
    pub architecture: Architecture,
    /// Pool-relative path to the `.deb`.
    pub filename: String,
    /// Size of the `.deb` in bytes.
    pub size: u64,
    /// sha256 of the `.deb`.
    #[serde(rename = "SHA256")]
    pub sha256: Sha256,
}

/// Parse one `Packages` paragraph.
pub fn packages_entry_from_str(data: &str) -> Result<PackagesEntry, rfc822_like::de::Error> {
    rfc822_like::from_str(data)
}

#[cfg(test)]
mod test {
    use super::*;

    const RELEASE: &str = r#"Origin: Debian
Label: Debian
Suite: unstable
Codename: sid
Date: Sun, 21 Feb 2021 15:00:11 UTC
Architectures: amd64 all
Components: main
Description: test
SHA256:
 efe2dafdf6a50f376af1dfc574d6bd3360558fde917555671b13832c89604d9 26187 main/binary-amd64/Packages
 97e06eefea86617e4abc8a647d0faebd0eaca7c87031423a4ae1d38e8f1c97bb 192 main/binary-amd64/Release"#;

    #[test]
    fn release_view() {
        let release = release_from_str(RELEASE).unwrap();
        assert_eq!(release.suite.as_deref(), Some("unstable"));
        assert_eq!(release.codename.as_deref(), Some("sid"));
        assert_eq!(release.components, vec![ComponentName::try_from("main").unwrap()]);
        assert_eq!(
            release.architectures,
            vec![Architecture::Amd64, Architecture::All]
        );
        assert!(release.files.contains_key("main/binary-amd64/Release"));
    }

    const PACKAGES: &str = "Package: hello\nVersion: 2.10-2\nArchitecture: all\nFilename: pool/main/h/hello/hello_2.10-2_all.deb\nSize: 12345\nSHA256: e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85\n\nPackage: world\nVersion: 1.0-1\nArchitecture: amd64\nFilename: pool/main/w/world/world_1.0-1_amd64.deb\nSize: 42\nSHA256: e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85\n";

    #[test]
    fn paragraph_iterator_splits_on_blank_lines() {
        let paras: Vec<_> = paragraphs(PACKAGES).collect();
        assert_eq!(paras.len(), 2);
        assert!(paras[0].starts_with("Package: hello"));
        assert!(paras[1].starts_with("Package: world"));
    }

    #[test]
    fn packages_view() {
        let paras: Vec<_> = paragraphs(PACKAGES).collect();
        let entry = packages_entry_from_str(paras[0]).unwrap();
        assert_eq!(entry.package, "hello");
        assert_eq!(entry.architecture, Architecture::All);
        assert_eq!(entry.size, 12345);
    }

    #[test]
    fn malformed_paragraph_does_not_panic() {
        let result = packages_entry_from_str("Package: incomplete\n");
        assert!(result.is_err());
    }
}
