// Copyright 2025
// SPDX-License-Identifier: LGPL-3.0-or-later

//! # Content-addressed file records
//!
//! A `File`'s identity is its sha256; `size` must be consistent
//! across every observation of that sha256 — a mismatch is a `StorageError`
//! at the store layer, not something this type itself enforces (it has no
//! way to see other observations).

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// A raw 32-byte SHA256 digest, canonically rendered as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sha256([u8; 32]);

/// Invalid SHA256 hex string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid sha256 hex digest")]
pub struct InvalidSha256;

impl Sha256 {
    /// Wrap a raw 32-byte digest.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw bytes of the digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The first byte, hex-encoded, used as the `by-hash` directory prefix.
    pub fn prefix(&self) -> String {
        hex::encode(&self.0[..1])
    }

    /// Lowercase hex representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Debug for Sha256 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sha256({})", self.to_hex())
    }
}

impl Display for Sha256 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl TryFrom<&str> for Sha256 {
    type Error = InvalidSha256;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let bytes = hex::decode(value).map_err(|_| InvalidSha256)?;
        let array: [u8; 32] = bytes.try_into().map_err(|_| InvalidSha256)?;
        Ok(Self(array))
    }
}

impl Serialize for Sha256 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Sha256 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Sha256::try_from(s.as_str()).map_err(serde::de::Error::custom)
    }
}

/// A file, identified by its sha256, with the size it was observed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct File {
    /// The file's sha256 digest.
    pub sha256: Sha256,
    /// The file's size in bytes.
    pub size: u64,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let hex = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85";
        let sha256 = Sha256::try_from(hex).unwrap();
        assert_eq!(sha256.to_hex(), hex);
        assert_eq!(sha256.prefix(), "e3");
    }

    #[test]
    fn invalid_hex() {
        assert!(Sha256::try_from("not-hex").is_err());
        assert!(Sha256::try_from("aaaa").is_err());
    }
}
