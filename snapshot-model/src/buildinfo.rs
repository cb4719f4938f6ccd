// Copyright 2022-2025 Sebastian Ramacher
// SPDX-License-Identifier: LGPL-3.0-or-later

//! # Representation of `.buildinfo` files
//!
//! This module provides `Buildinfo` to represent the fields of a
//! `.buildinfo` file needed by the buildinfo solver: the
//! source/version/architecture header plus the full
//! `Installed-Build-Depends` list, parsed into structured
//! `(name, version, architecture qualifier)` entries.

use std::fmt::{self, Display};
use std::io::BufRead;

use serde::{de, Deserialize, Deserializer};

use crate::{
    architectures::Architecture, package::PackageName, utils::WhitespaceListVisitor,
    version::PackageVersion,
};

fn deserialize_architecture<'de, D>(deserializer: D) -> Result<Vec<Architecture>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_str(WhitespaceListVisitor::<Architecture>::new())
}

/// One entry of `Installed-Build-Depends`, e.g. `foo (= 1.0-1) [amd64]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildDependency {
    /// Dependency package name.
    pub name: PackageName,
    /// The exact version the build used.
    pub version: PackageVersion,
    /// Architecture qualifier, if the entry carried one (e.g. `:all`).
    /// Defaults to the buildinfo's host architecture when absent — that
    /// defaulting is the caller's job (the solver), since this type has
    /// no access to the enclosing `Buildinfo`.
    pub architecture_qualifier: Option<Architecture>,
}

#[derive(Debug)]
struct BuildDependencyError(String);

impl fmt::Display for BuildDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid Installed-Build-Depends entry: {}", self.0)
    }
}

fn parse_build_dependency(entry: &str) -> Result<BuildDependency, BuildDependencyError> {
    // `name (= version)` or `name:arch (= version)`
    let entry = entry.trim();
    let (head, version_part) = entry
        .split_once('(')
        .ok_or_else(|| BuildDependencyError(entry.to_owned()))?;
    let version_str = version_part
        .trim()
        .trim_start_matches('=')
        .trim()
        .trim_end_matches(')')
        .trim();
    let version = PackageVersion::try_from(version_str)
        .map_err(|_| BuildDependencyError(entry.to_owned()))?;

    let head = head.trim();
    let (name_str, arch_qualifier) = match head.split_once(':') {
        Some((name, arch)) => (name, Some(arch)),
        None => (head, None),
    };
    let name =
        PackageName::try_from(name_str).map_err(|_| BuildDependencyError(entry.to_owned()))?;
    let architecture_qualifier = arch_qualifier
        .map(Architecture::try_from)
        .transpose()
        .map_err(|_| BuildDependencyError(entry.to_owned()))?;

    Ok(BuildDependency {
        name,
        version,
        architecture_qualifier,
    })
}

fn deserialize_build_depends<'de, D>(deserializer: D) -> Result<Vec<BuildDependency>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;

    impl de::Visitor<'_> for Visitor {
        type Value = Vec<BuildDependency>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "a comma-separated list of build dependencies")
        }

        fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            s.split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(|entry| {
                    parse_build_dependency(entry)
                        .map_err(|err| de::Error::custom(err.to_string()))
                })
                .collect()
        }
    }

    deserializer.deserialize_str(Visitor)
}

/// A build info
#[derive(Debug, PartialEq, Eq, Deserialize, Hash)]
#[serde(rename_all = "PascalCase")]
pub struct Buildinfo {
    /// Source package
    pub source: PackageName,
    /// Version of the package
    pub version: PackageVersion,
    /// Architectures of the build
    #[serde(deserialize_with = "deserialize_architecture")]
    pub architecture: Vec<Architecture>,
    /// The exact package versions installed to perform this build.
    #[serde(
        rename = "Installed-Build-Depends",
        deserialize_with = "deserialize_build_depends",
        default
    )]
    pub installed_build_depends: Vec<BuildDependency>,
}

impl Buildinfo {
    /// The build's host architecture: the first non-`source` entry of
    /// `Architecture`, per dpkg convention.
    pub fn host_architecture(&self) -> Option<Architecture> {
        self.architecture
            .iter()
            .copied()
            .find(|arch| !arch.is_source())
    }

    /// `installed_build_depends` with any missing architecture qualifier
    /// resolved to the build's host architecture, and `:all` resolved to
    /// `Architecture::All`.
    pub fn resolved_build_depends(&self) -> Vec<(PackageName, PackageVersion, Architecture)> {
        let host = self.host_architecture().unwrap_or(Architecture::All);
        self.installed_build_depends
            .iter()
            .map(|dep| {
                let arch = dep.architecture_qualifier.unwrap_or(host);
                (dep.name.clone(), dep.version.clone(), arch)
            })
            .collect()
    }
}

impl Display for Buildinfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.source, self.version)
    }
}

/// Read buildinfo from a reader
pub fn from_reader(reader: impl BufRead) -> Result<Buildinfo, rfc822_like::de::Error> {
    rfc822_like::from_reader(reader)
}

/// Read buildinfo from a string
pub fn from_str(data: &str) -> Result<Buildinfo, rfc822_like::de::Error> {
    rfc822_like::from_str(data)
}

#[cfg(test)]
mod test {
    use crate::{architectures::Architecture, buildinfo::Buildinfo, version::PackageVersion};

    const DATA: &str = r#"Format: 1.0
Source: picnic
Binary: libpicnic-dev libpicnic3
Architecture: amd64 source
Version: 3.0.11-1
Checksums-Sha256:
 8b2a1969501be49fe11e8e8005bf9a3aac0e073d4c7fd97dcb8bfb6f8c9a222a 951 picnic_3.0.11-1.dsc
Build-Origin: Debian
Build-Architecture: amd64
Build-Date: Tue, 25 Jan 2022 21:54:55 +0000
Build-Path: /build/picnic-SQCH61/picnic-3.0.11
Installed-Build-Depends:
 autoconf (= 2.71-2),
 base-files (= 12.2),
 gcc-11:amd64 (= 11.2.0-14),
 libc6-dev:all (= 2.33-4)
Environment:
 DEB_BUILD_OPTIONS="parallel=5""#;

    #[test]
    fn deserialize() {
        let buildinfo: Buildinfo = super::from_str(DATA).unwrap();
        assert_eq!(buildinfo.source, "picnic");
        assert_eq!(
            buildinfo.version,
            PackageVersion::try_from("3.0.11-1").unwrap()
        );
        assert_eq!(
            buildinfo.architecture,
            vec![Architecture::Amd64, Architecture::Source]
        );
        assert_eq!(buildinfo.installed_build_depends.len(), 4);
        assert_eq!(buildinfo.installed_build_depends[0].name, "autoconf");
        assert_eq!(
            buildinfo.installed_build_depends[2].architecture_qualifier,
            Some(Architecture::Amd64)
        );
    }

    #[test]
    fn host_architecture() {
        let buildinfo: Buildinfo = super::from_str(DATA).unwrap();
        assert_eq!(buildinfo.host_architecture(), Some(Architecture::Amd64));
    }

    #[test]
    fn resolved_build_depends_defaults_qualifier() {
        let buildinfo: Buildinfo = super::from_str(DATA).unwrap();
        let resolved = buildinfo.resolved_build_depends();
        // autoconf had no qualifier, so it resolves to the host arch
        assert_eq!(resolved[0].2, Architecture::Amd64);
        // libc6-dev:all keeps its own qualifier
        assert_eq!(resolved[3].2, Architecture::All);
    }
}
