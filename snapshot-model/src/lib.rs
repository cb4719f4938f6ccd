// Copyright 2025
// SPDX-License-Identifier: LGPL-3.0-or-later

//! # Typed data model and index parser for a Debian snapshot archive replica
//!
//! This crate consists of the following modules:
//! * [architectures]: Helpers to handle Debian architectures
//! * [buildinfo]: Helpers to handle `.buildinfo` files
//! * [file]: Content-addressed file records
//! * [index]: Parsing of `Release`, `Sources` and `Packages` index files
//! * [location]: Logical file locations within an archive
//! * [names]: Validated archive/suite/component names
//! * [package]: Helpers to handle Debian packages
//! * [timestamp]: Snapshot timestamps
//! * [version]: Helpers to handle package versions

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod architectures;
pub mod buildinfo;
pub mod file;
pub mod index;
pub mod location;
pub mod names;
pub mod package;
pub mod timestamp;
mod utils;
pub mod version;
