// Copyright 2025
// SPDX-License-Identifier: LGPL-3.0-or-later

//! # Snapshot timestamps
//!
//! A `Timestamp` identifies one point-in-time snapshot of an archive, in
//! the upstream service's `YYYYMMDDThhmmssZ` form. The representation is
//! kept as the original string because it is compared lexicographically,
//! which (by construction of the format) is equivalent to chronological
//! order; there is no need to parse it into a `chrono` type for any
//! operation this crate performs.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::utils::TryFromStrVisitor;

/// The sentinel timestamp used by non-temporal, "multi-version" archives
/// such as QubesOS. It must never appear alongside a real timestamp for the
/// same archive.
pub const SENTINEL: &str = "99990101T000000Z";

fn check_timestamp(value: &str) -> bool {
    // YYYYMMDDThhmmssZ
    let bytes = value.as_bytes();
    bytes.len() == 16
        && bytes[..8].iter().all(u8::is_ascii_digit)
        && bytes[8] == b'T'
        && bytes[9..15].iter().all(u8::is_ascii_digit)
        && bytes[15] == b'Z'
}

/// A validated snapshot timestamp.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Timestamp(String);

/// Invalid timestamp string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid timestamp, expected YYYYMMDDThhmmssZ")]
pub struct InvalidTimestamp;

impl Timestamp {
    /// The sentinel timestamp for non-temporal archives.
    pub fn sentinel() -> Self {
        Self(SENTINEL.to_owned())
    }

    /// Whether this is the sentinel timestamp.
    pub fn is_sentinel(&self) -> bool {
        self.0 == SENTINEL
    }

    /// The raw `YYYYMMDDThhmmssZ` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Timestamp {
    type Error = InvalidTimestamp;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if check_timestamp(value) {
            Ok(Self(value.to_owned()))
        } else {
            Err(InvalidTimestamp)
        }
    }
}

impl TryFrom<String> for Timestamp {
    type Error = InvalidTimestamp;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if check_timestamp(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidTimestamp)
        }
    }
}

impl AsRef<str> for Timestamp {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_str(TryFromStrVisitor::new("a timestamp formatted as YYYYMMDDThhmmssZ"))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn valid() {
        assert!(Timestamp::try_from("20210221T150011Z").is_ok());
        assert!(Timestamp::try_from(SENTINEL).unwrap().is_sentinel());
    }

    #[test]
    fn invalid() {
        assert!(Timestamp::try_from("2021-02-21T15:00:11Z").is_err());
        assert!(Timestamp::try_from("20210221T150011").is_err());
        assert!(Timestamp::try_from("").is_err());
    }

    #[test]
    fn lexicographic_order_is_chronological() {
        let t1 = Timestamp::try_from("20210221T150011Z").unwrap();
        let t2 = Timestamp::try_from("20210222T150011Z").unwrap();
        let t3 = Timestamp::try_from("20210222T160000Z").unwrap();
        assert!(t1 < t2);
        assert!(t2 < t3);
    }
}
