// Copyright 2025
// SPDX-License-Identifier: GPL-3.0-or-later

//! # Buildinfo minimal-cover solver (C8)
//!
//! Given a `.buildinfo` file's `Installed-Build-Depends` list, finds — for
//! every `(archive, suite, component)` candidate in the store — a small set
//! of timestamps such that every required `(name, version, architecture)`
//! was present at one of them. NP-hard in general; we use the standard
//! greedy maximum-coverage approximation.

use serde::Serialize;
use snapshot_model::architectures::Architecture;
use snapshot_model::buildinfo::Buildinfo;
use snapshot_model::package::PackageName;
use snapshot_model::version::PackageVersion;

use crate::store::{CandidateLocation, Store, StorageError};

/// One required `(name, version, architecture)` dependency, with the set of
/// archive timestamps at which it was observed under a given candidate.
struct Requirement {
    name: PackageName,
    version: PackageVersion,
    architecture: Architecture,
    timestamps: Vec<String>,
}

/// The solver's result for one `(archive, suite, component)` candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationCover {
    /// Archive name.
    pub archive: String,
    /// Suite name.
    pub suite: String,
    /// Component name.
    pub component: String,
    /// Chosen timestamps, chronologically sorted, that together cover every
    /// coverable required package.
    pub timestamps: Vec<String>,
    /// Required packages (`name (= version)`) this location cannot cover at
    /// any timestamp.
    pub missing: Vec<String>,
}

/// Runs the buildinfo solver against every candidate location in `store`,
/// optionally restricted to `suite_name`.
pub fn solve(
    store: &Store,
    buildinfo: &Buildinfo,
    suite_name: Option<&str>,
) -> Result<Vec<LocationCover>, StorageError> {
    let required = buildinfo.resolved_build_depends();
    let candidates = store.candidate_locations(suite_name)?;

    let mut results = Vec::with_capacity(candidates.len());
    for candidate in &candidates {
        results.push(cover_one(store, candidate, &required)?);
    }
    Ok(results)
}

fn cover_one(
    store: &Store,
    candidate: &CandidateLocation,
    required: &[(PackageName, PackageVersion, Architecture)],
) -> Result<LocationCover, StorageError> {
    let mut requirements = Vec::with_capacity(required.len());
    for (name, version, architecture) in required {
        let version_str = version.to_string();
        let timestamps = store.timestamps_covering(candidate, name.as_ref(), &version_str, *architecture)?;
        requirements.push(Requirement {
            name: name.clone(),
            version: version.clone(),
            architecture: *architecture,
            timestamps,
        });
    }

    let (timestamps, missing) = greedy_cover(requirements);

    Ok(LocationCover {
        archive: candidate.archive.clone(),
        suite: candidate.suite.clone(),
        component: candidate.component.clone(),
        timestamps,
        missing,
    })
}

/// Greedy hitting-set cover: repeatedly pick the
/// timestamp covering the most still-uncovered requirements, tie-breaking
/// on the most recent timestamp, until every requirement is covered or no
/// remaining timestamp covers anything.
fn greedy_cover(requirements: Vec<Requirement>) -> (Vec<String>, Vec<String>) {
    let mut uncovered: Vec<usize> = (0..requirements.len())
        .filter(|&i| !requirements[i].timestamps.is_empty())
        .collect();
    let missing: Vec<String> = (0..requirements.len())
        .filter(|&i| requirements[i].timestamps.is_empty())
        .map(|i| describe(&requirements[i]))
        .collect();

    let mut chosen = Vec::new();
    while !uncovered.is_empty() {
        let mut best_timestamp: Option<&str> = None;
        let mut best_covers = 0usize;

        let mut candidate_timestamps: Vec<&str> =
            uncovered.iter().flat_map(|&i| requirements[i].timestamps.iter().map(String::as_str)).collect();
        candidate_timestamps.sort_unstable();
        candidate_timestamps.dedup();

        for ts in candidate_timestamps {
            let covers = uncovered.iter().filter(|&&i| requirements[i].timestamps.iter().any(|t| t == ts)).count();
            if covers > best_covers || (covers == best_covers && covers > 0 && Some(ts) > best_timestamp) {
                best_covers = covers;
                best_timestamp = Some(ts);
            }
        }

        let Some(ts) = best_timestamp else {
            // No remaining timestamp covers any uncovered requirement.
            break;
        };
        chosen.push(ts.to_owned());
        uncovered.retain(|&i| !requirements[i].timestamps.iter().any(|t| t == ts));
    }

    // Whatever stayed uncovered (either never observed, or no progress
    // possible) is reported as missing too.
    let mut missing = missing;
    missing.extend(uncovered.into_iter().map(|i| describe(&requirements[i])));
    missing.sort_unstable();
    missing.dedup();

    chosen.sort_unstable();
    (chosen, missing)
}

fn describe(req: &Requirement) -> String {
    format!("{} (= {}) [{}]", req.name, req.version, req.architecture)
}

#[cfg(test)]
mod test {
    use super::*;

    fn req(name: &str, timestamps: &[&str]) -> Requirement {
        Requirement {
            name: PackageName::try_from(name).unwrap(),
            version: PackageVersion::try_from("1.0-1").unwrap(),
            architecture: Architecture::Amd64,
            timestamps: timestamps.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn greedy_picks_largest_cover_first() {
        let requirements = vec![
            req("a", &["t1", "t2"]),
            req("b", &["t1"]),
            req("c", &["t2"]),
        ];
        let (chosen, missing) = greedy_cover(requirements);
        assert!(missing.is_empty());
        // t1 and t2 both cover 2/3; picking either first then the other
        // covers everything in 2 steps.
        assert_eq!(chosen.len(), 2);
    }

    #[test]
    fn single_timestamp_covering_everything_is_picked_alone() {
        let requirements = vec![req("a", &["t1"]), req("b", &["t1"]), req("c", &["t1"])];
        let (chosen, missing) = greedy_cover(requirements);
        assert_eq!(chosen, vec!["t1".to_string()]);
        assert!(missing.is_empty());
    }

    #[test]
    fn never_observed_package_is_reported_missing() {
        let requirements = vec![req("a", &["t1"]), req("b", &[])];
        let (chosen, missing) = greedy_cover(requirements);
        assert_eq!(chosen, vec!["t1".to_string()]);
        assert_eq!(missing.len(), 1);
        assert!(missing[0].starts_with("b "));
    }

    #[test]
    fn tie_break_prefers_most_recent_timestamp() {
        // Both t1 and t2 cover the same single requirement; greedy must
        // pick the lexicographically (== chronologically) greatest.
        let requirements = vec![req("a", &["t1", "t2"])];
        let (chosen, _) = greedy_cover(requirements);
        assert_eq!(chosen, vec!["t2".to_string()]);
    }
}
