// Copyright 2025
// SPDX-License-Identifier: LGPL-3.0-or-later

//! # Logical file locations
//!
//! A `Location` is the logical position at which a `File` can be observed:
//! an (archive, suite, component, pool path, filename) tuple. `(path,
//! name)` together reconstruct the repo-relative URL; turning a
//! `Location` plus a timestamp into an actual URL or on-disk path is C4's
//! job (`snapshot-mirror::layout`), not this crate's.

use serde::{Deserialize, Serialize};

use crate::names::{ArchiveName, ComponentName, SuiteName};

/// The logical position at which a `File` can be observed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// The archive this location belongs to.
    pub archive: ArchiveName,
    /// The suite this location belongs to.
    pub suite: SuiteName,
    /// The component this location belongs to.
    pub component: ComponentName,
    /// The pool-relative directory, e.g. `main/h/hello`.
    pub path: String,
    /// The filename, e.g. `hello_2.10-2_amd64.deb`.
    pub name: String,
}

impl Location {
    /// The repo-relative path, i.e. `{path}/{name}`.
    pub fn repo_relative_path(&self) -> String {
        format!("{}/{}", self.path, self.name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn repo_relative_path() {
        let location = Location {
            archive: ArchiveName::try_from("debian").unwrap(),
            suite: SuiteName::try_from("bullseye").unwrap(),
            component: ComponentName::try_from("main").unwrap(),
            path: "main/h/hello".to_owned(),
            name: "hello_2.10-2_amd64.deb".to_owned(),
        };
        assert_eq!(
            location.repo_relative_path(),
            "main/h/hello/hello_2.10-2_amd64.deb"
        );
    }
}
