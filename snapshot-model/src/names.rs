// Copyright 2025
// SPDX-License-Identifier: LGPL-3.0-or-later

//! # Helpers to handle the names of archives, suites and components
//!
//! Unlike a single well-known archive (which only ever sees a handful of
//! suite/component names), a snapshot replica is administratively
//! namespaced: `debian`, `qubes-r4.1-vm`, and whatever else an operator
//! points the ingester at. So, unlike `assorted-debian-utils::archive`,
//! suite and component names here are validated strings, not a closed enum.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::utils::TryFromStrVisitor;

fn check_name(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || ".+-_".contains(c))
}

macro_rules! validated_name {
    ($name:ident, $error:ident, $what:literal) => {
        #[doc = concat!("A validated ", $what, " name.")]
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        #[doc = concat!("Invalid ", $what, " name.")]
        #[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
        #[error(concat!("invalid ", $what, " name"))]
        pub struct $error;

        impl TryFrom<&str> for $name {
            type Error = $error;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                if check_name(value) {
                    Ok(Self(value.to_owned()))
                } else {
                    Err($error)
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = $error;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                if check_name(&value) {
                    Ok(Self(value))
                } else {
                    Err($error)
                }
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.0.as_str()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                deserializer.deserialize_str(TryFromStrVisitor::new(concat!("a ", $what, " name")))
            }
        }
    };
}

validated_name!(ArchiveName, InvalidArchiveName, "archive");
validated_name!(SuiteName, InvalidSuiteName, "suite");
validated_name!(ComponentName, InvalidComponentName, "component");

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn valid() {
        assert!(ArchiveName::try_from("debian").is_ok());
        assert!(ArchiveName::try_from("qubes-r4.1-vm").is_ok());
        assert!(SuiteName::try_from("unstable").is_ok());
        assert!(ComponentName::try_from("main").is_ok());
    }

    #[test]
    fn invalid() {
        assert!(ArchiveName::try_from("").is_err());
        assert!(SuiteName::try_from("no spaces allowed").is_err());
    }

    #[test]
    fn display_roundtrip() {
        let archive = ArchiveName::try_from("debian").unwrap();
        assert_eq!(archive.to_string(), "debian");
        assert_eq!(archive.as_ref(), "debian");
    }
}
