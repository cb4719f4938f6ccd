// Copyright 2025 Sebastian Ramacher
// SPDX-License-Identifier: LGPL-3.0-or-later

//! # Helpers to handle Debian packages
//!
//! A `Package`'s identity is the triple `(kind, name, version)`:
//! `kind` distinguishes a source package from a binary package, since the
//! archive allows the same name/version pair to exist as both.

use std::fmt::Display;

use serde::Deserialize;

use crate::{utils::TryFromStrVisitor, version::PackageVersion};

fn check_package_name(package: &str) -> Result<(), PackageError> {
    // package names must be at least 2 characters long
    if package.len() < 2 {
        return Err(PackageError::InvalidNameLength);
    }

    if !package.chars().enumerate().all(|(i, c)| {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            return true;
        }
        i > 0 && ".+-".contains(c)
    }) {
        return Err(PackageError::InvalidName);
    }

    Ok(())
}

/// Package errors
#[derive(Clone, Copy, Debug, thiserror::Error)]
pub enum PackageError {
    /// Package name is too short
    #[error("package name too short")]
    InvalidNameLength,
    /// Package name is invalid
    #[error("package name contains invalid character")]
    InvalidName,
}

/// Package name
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageName(String);

impl TryFrom<&str> for PackageName {
    type Error = PackageError;

    fn try_from(package: &str) -> Result<Self, Self::Error> {
        check_package_name(package).map(|_| Self(package.to_owned()))
    }
}

impl TryFrom<String> for PackageName {
    type Error = PackageError;

    fn try_from(package: String) -> Result<Self, Self::Error> {
        check_package_name(&package).map(|_| Self(package))
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq<&str> for PackageName {
    fn eq(&self, other: &&str) -> bool {
        self.0.eq(other)
    }
}

impl PartialEq<String> for PackageName {
    fn eq(&self, other: &String) -> bool {
        self.0.eq(other)
    }
}

impl Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for PackageName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_str(TryFromStrVisitor::new("a package name"))
    }
}

/// Whether a `Package` is a source package or a binary package.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PackageKind {
    /// A source package (a `.dsc` plus its tarballs).
    Source,
    /// A binary package (a `.deb`).
    Binary,
}

impl Display for PackageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PackageKind::Source => "source",
            PackageKind::Binary => "binary",
        })
    }
}

/// A package, identified by `(kind, name, version)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Package {
    /// Whether this is a source or binary package.
    pub kind: PackageKind,
    /// The package name.
    pub name: PackageName,
    /// The package version.
    pub version: PackageVersion,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn valid_package_names() {
        assert!(PackageName::try_from("zathura").is_ok());
        assert!(PackageName::try_from("0ad").is_ok());
        assert!(PackageName::try_from("zathura-pdf").is_ok());
    }

    #[test]
    fn invalid_package_names() {
        assert!(PackageName::try_from("z").is_err());
        assert!(PackageName::try_from("-ad").is_err());
    }

    #[test]
    fn package_identity() {
        let p1 = Package {
            kind: PackageKind::Binary,
            name: PackageName::try_from("hello").unwrap(),
            version: PackageVersion::try_from("2.10-2").unwrap(),
        };
        let p2 = Package {
            kind: PackageKind::Source,
            name: PackageName::try_from("hello").unwrap(),
            version: PackageVersion::try_from("2.10-2").unwrap(),
        };
        assert_ne!(p1, p2);
    }
}
