// Copyright 2025
// SPDX-License-Identifier: GPL-3.0-or-later

//! # Provenance store & range coalescer (C6)
//!
//! The normalized relational schema (`schema.sql`) plus the upsert helpers
//! C5 drives and the read-only queries C7/C8 run. The coalescer
//! (`record_observation`/`coalesce`) is the one genuinely non-trivial piece:
//! given a newly inserted Observation it finds the archive's immediately
//! adjacent ingested timestamps and merges, extends, or inserts a
//! `timestamp_range` row accordingly.
//!
//! Grounded on `linux-package-analyzer`'s use of `rusqlite` for a local
//! package-metadata store (same shape of problem: a CLI-owned on-disk DB),
//! pooled via `r2d2`/`r2d2_sqlite` since the query server (C7) is
//! multi-threaded.

use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};
use snapshot_model::{architectures::Architecture, package::PackageKind, timestamp::SENTINEL};

/// Errors raised by the provenance store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Underlying SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to check out a pooled connection.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    /// A sha256 was observed with a size different from its first sighting:
    /// fatal for the tuple's transaction.
    #[error("size drift for {sha256}: expected {expected}, got {actual}")]
    SizeMismatch {
        /// The file's sha256.
        sha256: String,
        /// The size recorded at first sighting.
        expected: u64,
        /// The size just observed.
        actual: u64,
    },
    /// The sentinel timestamp was inserted alongside a real timestamp for
    /// the same archive.
    #[error("archive {archive_id} mixes the sentinel timestamp with real timestamps")]
    SentinelMixing {
        /// The offending archive's row id.
        archive_id: i64,
    },
}

/// A connection-pooled handle to the provenance store.
#[derive(Clone)]
pub struct Store {
    pool: r2d2::Pool<SqliteConnectionManager>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("state", &self.pool.state()).finish()
    }
}

impl Store {
    /// Open (and, on first use, create) the store at `db_url`: a filesystem
    /// path, or the literal `:memory:` for tests. The schema is applied
    /// idempotently (`CREATE TABLE IF NOT EXISTS`) on every new pooled
    /// connection.
    pub fn open(db_url: &str) -> anyhow::Result<Self> {
        let is_memory = db_url == ":memory:";
        let manager = if is_memory {
            SqliteConnectionManager::memory()
        } else {
            SqliteConnectionManager::file(db_url)
        }
        .with_init(move |conn| {
            conn.execute_batch(include_str!("schema.sql"))?;
            if !is_memory {
                conn.pragma_update(None, "journal_mode", "WAL")?;
            }
            Ok(())
        });

        // `:memory:` databases are per-connection; cap the pool at one
        // connection so every borrow reuses the same in-memory database.
        let pool = r2d2::Pool::builder()
            .max_size(if is_memory { 1 } else { 8 })
            .build(manager)?;
        Ok(Self { pool })
    }

    /// Check out a pooled connection.
    pub fn get(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>, StorageError> {
        self.pool.get().map_err(Into::into)
    }

    // ---- upserts (called from within a tuple-scoped transaction, C5) ----

    /// Upsert an Archive, returning its row id.
    pub fn upsert_archive(conn: &Connection, name: &str) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO archive (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
            params![name],
        )?;
        conn.query_row("SELECT id FROM archive WHERE name = ?1", params![name], |row| row.get(0))
    }

    /// Upsert a Timestamp under `archive_id`, returning its row id. Rejects
    /// mixing the sentinel timestamp with a real one for the same archive.
    pub fn upsert_timestamp(conn: &Connection, archive_id: i64, value: &str) -> Result<i64, StorageError> {
        let conflicting: i64 = if value == SENTINEL {
            conn.query_row(
                "SELECT COUNT(*) FROM timestamp WHERE archive_id = ?1 AND value != ?2",
                params![archive_id, SENTINEL],
                |row| row.get(0),
            )?
        } else {
            conn.query_row(
                "SELECT COUNT(*) FROM timestamp WHERE archive_id = ?1 AND value = ?2",
                params![archive_id, SENTINEL],
                |row| row.get(0),
            )?
        };
        if conflicting > 0 {
            return Err(StorageError::SentinelMixing { archive_id });
        }

        conn.execute(
            "INSERT INTO timestamp (archive_id, value) VALUES (?1, ?2) ON CONFLICT(archive_id, value) DO NOTHING",
            params![archive_id, value],
        )?;
        Ok(conn.query_row(
            "SELECT id FROM timestamp WHERE archive_id = ?1 AND value = ?2",
            params![archive_id, value],
            |row| row.get(0),
        )?)
    }

    /// Upsert a Suite under `archive_id`, returning its row id.
    pub fn upsert_suite(conn: &Connection, archive_id: i64, name: &str) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO suite (archive_id, name) VALUES (?1, ?2) ON CONFLICT(archive_id, name) DO NOTHING",
            params![archive_id, name],
        )?;
        conn.query_row(
            "SELECT id FROM suite WHERE archive_id = ?1 AND name = ?2",
            params![archive_id, name],
            |row| row.get(0),
        )
    }

    /// Upsert a Component under `suite_id`, returning its row id.
    pub fn upsert_component(conn: &Connection, suite_id: i64, name: &str) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO component (suite_id, name) VALUES (?1, ?2) ON CONFLICT(suite_id, name) DO NOTHING",
            params![suite_id, name],
        )?;
        conn.query_row(
            "SELECT id FROM component WHERE suite_id = ?1 AND name = ?2",
            params![suite_id, name],
            |row| row.get(0),
        )
    }

    /// Upsert an Architecture, returning its row id.
    pub fn upsert_architecture(conn: &Connection, architecture: Architecture) -> rusqlite::Result<i64> {
        let name = architecture.to_string();
        conn.execute(
            "INSERT INTO architecture (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
            params![name],
        )?;
        conn.query_row("SELECT id FROM architecture WHERE name = ?1", params![name], |row| row.get(0))
    }

    /// Upsert a Package `(kind, name, version)`, returning its row id.
    pub fn upsert_package(conn: &Connection, kind: PackageKind, name: &str, version: &str) -> rusqlite::Result<i64> {
        let kind = kind.to_string();
        conn.execute(
            "INSERT INTO package (kind, name, version) VALUES (?1, ?2, ?3)
             ON CONFLICT(kind, name, version) DO NOTHING",
            params![kind, name, version],
        )?;
        conn.query_row(
            "SELECT id FROM package WHERE kind = ?1 AND name = ?2 AND version = ?3",
            params![kind, name, version],
            |row| row.get(0),
        )
    }

    /// Upsert a File by sha256. Rejects a size that disagrees with a prior
    /// sighting of the same sha256.
    pub fn upsert_file(conn: &Connection, sha256: &str, size: u64) -> Result<(), StorageError> {
        let existing: Option<i64> = conn
            .query_row("SELECT size FROM file WHERE sha256 = ?1", params![sha256], |row| row.get(0))
            .optional()?;
        match existing {
            Some(existing) if existing as u64 != size => {
                return Err(StorageError::SizeMismatch {
                    sha256: sha256.to_owned(),
                    expected: existing as u64,
                    actual: size,
                })
            }
            Some(_) => return Ok(()),
            None => {}
        }
        conn.execute(
            "INSERT INTO file (sha256, size) VALUES (?1, ?2)",
            params![sha256, size as i64],
        )?;
        Ok(())
    }

    /// Upsert a Location, returning its row id.
    pub fn upsert_location(
        conn: &Connection,
        archive_id: i64,
        suite_id: i64,
        component_id: i64,
        path: &str,
        name: &str,
    ) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO location (archive_id, suite_id, component_id, path, name)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(archive_id, suite_id, component_id, path, name) DO NOTHING",
            params![archive_id, suite_id, component_id, path, name],
        )?;
        conn.query_row(
            "SELECT id FROM location
             WHERE archive_id = ?1 AND suite_id = ?2 AND component_id = ?3 AND path = ?4 AND name = ?5",
            params![archive_id, suite_id, component_id, path, name],
            |row| row.get(0),
        )
    }

    /// Link a Package to one of its Files (the Package↔File projection).
    pub fn link_package_file(
        conn: &Connection,
        package_id: i64,
        file_sha256: &str,
        architecture_id: i64,
    ) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT INTO package_file (package_id, file_sha256, architecture_id)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(package_id, file_sha256, architecture_id) DO NOTHING",
            params![package_id, file_sha256, architecture_id],
        )?;
        Ok(())
    }

    /// Insert an Observation `(file, location, arch, timestamp)` and, if it
    /// is genuinely new, run the coalescer against it. Returns whether a new
    /// row was inserted — re-inserting an already-recorded observation is a
    /// no-op.
    #[allow(clippy::too_many_arguments)]
    pub fn record_observation(
        conn: &Connection,
        archive_id: i64,
        file_sha256: &str,
        location_id: i64,
        architecture_id: i64,
        timestamp_id: i64,
        timestamp_value: &str,
    ) -> Result<bool, StorageError> {
        let inserted = conn.execute(
            "INSERT INTO observation (file_sha256, location_id, architecture_id, timestamp_id)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(file_sha256, location_id, architecture_id, timestamp_id) DO NOTHING",
            params![file_sha256, location_id, architecture_id, timestamp_id],
        )? > 0;
        if inserted {
            Self::coalesce(
                conn,
                archive_id,
                file_sha256,
                location_id,
                architecture_id,
                timestamp_id,
                timestamp_value,
            )?;
        }
        Ok(inserted)
    }

    /// The coalescer: merge/extend/insert the `timestamp_range`
    /// row for `(file, location, arch)` to account for a newly observed `T`.
    /// Only ever called for a genuinely new observation, so `T` cannot
    /// already lie inside an existing range for this key (a range can only
    /// contain timestamps that were already observed when it was formed).
    fn coalesce(
        conn: &Connection,
        archive_id: i64,
        file_sha256: &str,
        location_id: i64,
        architecture_id: i64,
        timestamp_id: i64,
        timestamp_value: &str,
    ) -> Result<(), StorageError> {
        let prev_id: Option<i64> = conn
            .query_row(
                "SELECT id FROM timestamp WHERE archive_id = ?1 AND value < ?2 ORDER BY value DESC LIMIT 1",
                params![archive_id, timestamp_value],
                |row| row.get(0),
            )
            .optional()?;
        let next_id: Option<i64> = conn
            .query_row(
                "SELECT id FROM timestamp WHERE archive_id = ?1 AND value > ?2 ORDER BY value ASC LIMIT 1",
                params![archive_id, timestamp_value],
                |row| row.get(0),
            )
            .optional()?;

        let left: Option<(i64, i64)> = match prev_id {
            Some(prev_id) => conn
                .query_row(
                    "SELECT id, begin_id FROM timestamp_range
                     WHERE file_sha256 = ?1 AND location_id = ?2 AND architecture_id = ?3 AND end_id = ?4",
                    params![file_sha256, location_id, architecture_id, prev_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?,
            None => None,
        };
        let right: Option<(i64, i64)> = match next_id {
            Some(next_id) => conn
                .query_row(
                    "SELECT id, end_id FROM timestamp_range
                     WHERE file_sha256 = ?1 AND location_id = ?2 AND architecture_id = ?3 AND begin_id = ?4",
                    params![file_sha256, location_id, architecture_id, next_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?,
            None => None,
        };

        match (left, right) {
            (Some((left_id, begin_id)), Some((right_id, end_id))) => {
                conn.execute(
                    "DELETE FROM timestamp_range WHERE id IN (?1, ?2)",
                    params![left_id, right_id],
                )?;
                conn.execute(
                    "INSERT INTO timestamp_range (file_sha256, location_id, architecture_id, begin_id, end_id)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![file_sha256, location_id, architecture_id, begin_id, end_id],
                )?;
            }
            (Some((left_id, _)), None) => {
                conn.execute(
                    "UPDATE timestamp_range SET end_id = ?1 WHERE id = ?2",
                    params![timestamp_id, left_id],
                )?;
            }
            (None, Some((right_id, _))) => {
                conn.execute(
                    "UPDATE timestamp_range SET begin_id = ?1 WHERE id = ?2",
                    params![timestamp_id, right_id],
                )?;
            }
            (None, None) => {
                conn.execute(
                    "INSERT INTO timestamp_range (file_sha256, location_id, architecture_id, begin_id, end_id)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![file_sha256, location_id, architecture_id, timestamp_id, timestamp_id],
                )?;
            }
        }
        Ok(())
    }

    /// Mark `(archive, timestamp, suite, component, arch)` as provisioned.
    pub fn mark_provisioned(
        conn: &Connection,
        archive_id: i64,
        timestamp_id: i64,
        suite_id: i64,
        component_id: i64,
        architecture_id: i64,
    ) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT INTO provisioned (archive_id, timestamp_id, suite_id, component_id, architecture_id)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT DO NOTHING",
            params![archive_id, timestamp_id, suite_id, component_id, architecture_id],
        )?;
        Ok(())
    }

    /// Whether `(archive, timestamp, suite, component, arch)` was already
    /// provisioned (used by `--ignore-provisioned` and step 5a's skip check).
    pub fn is_provisioned(
        conn: &Connection,
        archive_id: i64,
        timestamp_id: i64,
        suite_id: i64,
        component_id: i64,
        architecture_id: i64,
    ) -> rusqlite::Result<bool> {
        conn.query_row(
            "SELECT 1 FROM provisioned
             WHERE archive_id = ?1 AND timestamp_id = ?2 AND suite_id = ?3
               AND component_id = ?4 AND architecture_id = ?5",
            params![archive_id, timestamp_id, suite_id, component_id, architecture_id],
            |_| Ok(()),
        )
        .optional()
        .map(|found| found.is_some())
    }

    // ---- read-only queries (C7, C8) ----

    /// All distinct source package names, lexicographically sorted.
    pub fn source_package_names(&self) -> Result<Vec<String>, StorageError> {
        let conn = self.get()?;
        let mut stmt = conn.prepare("SELECT DISTINCT name FROM package WHERE kind = 'source' ORDER BY name")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// All distinct versions of `name`, sorted lexicographically.
    pub fn package_versions(&self, kind: PackageKind, name: &str) -> Result<Vec<String>, StorageError> {
        let conn = self.get()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT version FROM package WHERE kind = ?1 AND name = ?2 ORDER BY version",
        )?;
        let rows = stmt.query_map(params![kind.to_string(), name], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// The files realizing `(kind, name, version)`, each with its size and
    /// (for binaries) architecture.
    pub fn package_files(&self, kind: PackageKind, name: &str, version: &str) -> Result<Vec<PackageFileRow>, StorageError> {
        let conn = self.get()?;
        let mut stmt = conn.prepare(
            "SELECT pf.file_sha256, f.size, a.name
             FROM package p
             JOIN package_file pf ON pf.package_id = p.id
             JOIN file f ON f.sha256 = pf.file_sha256
             JOIN architecture a ON a.id = pf.architecture_id
             WHERE p.kind = ?1 AND p.name = ?2 AND p.version = ?3
             ORDER BY pf.file_sha256",
        )?;
        let rows = stmt.query_map(params![kind.to_string(), name, version], |row| {
            let architecture: String = row.get(2)?;
            Ok(PackageFileRow {
                sha256: row.get(0)?,
                size: row.get::<_, i64>(1)? as u64,
                architecture: (architecture != "source").then_some(architecture),
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Every sha256 known to the store, sorted lexicographically.
    pub fn all_file_hashes(&self) -> Result<Vec<String>, StorageError> {
        let conn = self.get()?;
        let mut stmt = conn.prepare("SELECT sha256 FROM file ORDER BY sha256")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// The recorded size of `sha256`, if known.
    pub fn file_size(&self, sha256: &str) -> Result<Option<u64>, StorageError> {
        let conn = self.get()?;
        let size: Option<i64> = conn
            .query_row("SELECT size FROM file WHERE sha256 = ?1", params![sha256], |row| row.get(0))
            .optional()?;
        Ok(size.map(|v| v as u64))
    }

    /// Every location `sha256` has been observed at, each with its
    /// materialized `timestamp_range` list (the `fileinfo=1` expansion).
    pub fn file_observations(&self, sha256: &str) -> Result<Vec<ObservationRow>, StorageError> {
        let conn = self.get()?;
        let size: Option<i64> = conn
            .query_row("SELECT size FROM file WHERE sha256 = ?1", params![sha256], |row| row.get(0))
            .optional()?;
        let Some(size) = size else {
            return Ok(Vec::new());
        };

        let mut location_stmt = conn.prepare(
            "SELECT DISTINCT l.id, l.name, l.path, ar.name, su.name, co.name
             FROM observation o
             JOIN location l ON l.id = o.location_id
             JOIN archive ar ON ar.id = l.archive_id
             JOIN suite su ON su.id = l.suite_id
             JOIN component co ON co.id = l.component_id
             WHERE o.file_sha256 = ?1
             ORDER BY ar.name, su.name, co.name, l.path, l.name",
        )?;
        let locations = location_stmt
            .query_map(params![sha256], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut range_stmt = conn.prepare(
            "SELECT tb.value, te.value
             FROM timestamp_range tr
             JOIN timestamp tb ON tb.id = tr.begin_id
             JOIN timestamp te ON te.id = tr.end_id
             WHERE tr.file_sha256 = ?1 AND tr.location_id = ?2
             ORDER BY tb.value",
        )?;

        let mut result = Vec::with_capacity(locations.len());
        for (location_id, name, path, archive, suite, component) in locations {
            let timestamp_ranges = range_stmt
                .query_map(params![sha256, location_id], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            result.push(ObservationRow {
                name,
                path,
                size: size as u64,
                archive,
                suite,
                component,
                timestamp_ranges,
            });
        }
        Ok(result)
    }

    /// All ingested timestamps for `archive`, chronologically sorted.
    pub fn archive_timestamps(&self, archive: &str) -> Result<Vec<String>, StorageError> {
        let conn = self.get()?;
        let mut stmt = conn.prepare(
            "SELECT t.value FROM timestamp t JOIN archive a ON a.id = t.archive_id
             WHERE a.name = ?1 ORDER BY t.value",
        )?;
        let rows = stmt.query_map(params![archive], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Exact match if present; otherwise the greatest timestamp strictly
    /// less than `query` ("closest timestamp" resolution).
    pub fn closest_timestamp(&self, archive: &str, query: &str) -> Result<Option<String>, StorageError> {
        let conn = self.get()?;
        let exact: Option<String> = conn
            .query_row(
                "SELECT t.value FROM timestamp t JOIN archive a ON a.id = t.archive_id
                 WHERE a.name = ?1 AND t.value = ?2",
                params![archive, query],
                |row| row.get(0),
            )
            .optional()?;
        if exact.is_some() {
            return Ok(exact);
        }
        conn.query_row(
            "SELECT t.value FROM timestamp t JOIN archive a ON a.id = t.archive_id
             WHERE a.name = ?1 AND t.value < ?2 ORDER BY t.value DESC LIMIT 1",
            params![archive, query],
            |row| row.get(0),
        )
        .optional()
        .map_err(Into::into)
    }

    /// The maximum timestamp for `archive`.
    pub fn latest_timestamp(&self, archive: &str) -> Result<Option<String>, StorageError> {
        let conn = self.get()?;
        conn.query_row(
            "SELECT t.value FROM timestamp t JOIN archive a ON a.id = t.archive_id
             WHERE a.name = ?1 ORDER BY t.value DESC LIMIT 1",
            params![archive],
            |row| row.get(0),
        )
        .optional()
        .map_err(Into::into)
    }

    /// `(archive, suite, component)` triples that can serve as a
    /// buildinfo-cover candidate (C8), optionally restricted to one suite.
    /// Distinct from the fine-grained `Location` entity.
    pub fn candidate_locations(&self, suite_name: Option<&str>) -> Result<Vec<CandidateLocation>, StorageError> {
        let conn = self.get()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT l.archive_id, a.name, l.suite_id, s.name, l.component_id, c.name
             FROM location l
             JOIN archive a ON a.id = l.archive_id
             JOIN suite s ON s.id = l.suite_id
             JOIN component c ON c.id = l.component_id
             WHERE (?1 IS NULL OR s.name = ?1)
             ORDER BY a.name, s.name, c.name",
        )?;
        let rows = stmt.query_map(params![suite_name], |row| {
            Ok(CandidateLocation {
                archive_id: row.get(0)?,
                archive: row.get(1)?,
                suite_id: row.get(2)?,
                suite: row.get(3)?,
                component_id: row.get(4)?,
                component: row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Every archive timestamp at which `(name, version, architecture)` was
    /// observed somewhere under `candidate`, expanded from the matching
    /// `timestamp_range` rows against the archive's full timestamp list.
    pub fn timestamps_covering(
        &self,
        candidate: &CandidateLocation,
        name: &str,
        version: &str,
        architecture: Architecture,
    ) -> Result<Vec<String>, StorageError> {
        let conn = self.get()?;
        let kind = if architecture.is_source() { "source" } else { "binary" };
        let arch_name = architecture.to_string();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT t.value
             FROM package p
             JOIN package_file pf ON pf.package_id = p.id
             JOIN architecture pa ON pa.id = pf.architecture_id
             JOIN timestamp_range tr ON tr.file_sha256 = pf.file_sha256
             JOIN location loc ON loc.id = tr.location_id
               AND loc.archive_id = ?1 AND loc.suite_id = ?2 AND loc.component_id = ?3
             JOIN architecture ra ON ra.id = tr.architecture_id
             JOIN timestamp tb ON tb.id = tr.begin_id
             JOIN timestamp te ON te.id = tr.end_id
             JOIN timestamp t ON t.archive_id = ?1 AND t.value BETWEEN tb.value AND te.value
             WHERE p.kind = ?4 AND p.name = ?5 AND p.version = ?6 AND pa.name = ?7 AND ra.name = ?7
             ORDER BY t.value",
        )?;
        let rows = stmt.query_map(
            params![
                candidate.archive_id,
                candidate.suite_id,
                candidate.component_id,
                kind,
                name,
                version,
                arch_name
            ],
            |row| row.get(0),
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

/// One file realizing a package version (`package_files`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFileRow {
    /// The file's sha256.
    pub sha256: String,
    /// The file's size.
    pub size: u64,
    /// The binary architecture, or `None` for a source file.
    pub architecture: Option<String>,
}

/// One location a file was observed at, with its materialized ranges
/// (`file_observations`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationRow {
    /// The filename at this location.
    pub name: String,
    /// The pool-relative directory at this location.
    pub path: String,
    /// The file's size.
    pub size: u64,
    /// The archive name.
    pub archive: String,
    /// The suite name.
    pub suite: String,
    /// The component name.
    pub component: String,
    /// `[begin, end]` timestamp pairs, chronologically sorted.
    pub timestamp_ranges: Vec<(String, String)>,
}

/// A candidate `(archive, suite, component)` for the buildinfo solver.
/// Coarser than the `Location` entity: it aggregates every `Location` row
/// sharing this triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLocation {
    /// The archive row id.
    pub archive_id: i64,
    /// The archive name.
    pub archive: String,
    /// The suite row id.
    pub suite_id: i64,
    /// The suite name.
    pub suite: String,
    /// The component row id.
    pub component_id: i64,
    /// The component name.
    pub component: String,
}

#[cfg(test)]
mod test {
    use super::*;

    fn observe(
        conn: &Connection,
        archive_id: i64,
        file_sha256: &str,
        location_id: i64,
        architecture_id: i64,
        value: &str,
    ) -> bool {
        let timestamp_id = Store::upsert_timestamp(conn, archive_id, value).unwrap();
        Store::record_observation(conn, archive_id, file_sha256, location_id, architecture_id, timestamp_id, value)
            .unwrap()
    }

    fn setup() -> (Store, i64, i64, i64) {
        let store = Store::open(":memory:").unwrap();
        let conn = store.get().unwrap();
        let archive_id = Store::upsert_archive(&conn, "debian").unwrap();
        let suite_id = Store::upsert_suite(&conn, archive_id, "bullseye").unwrap();
        let component_id = Store::upsert_component(&conn, suite_id, "main").unwrap();
        let location_id =
            Store::upsert_location(&conn, archive_id, suite_id, component_id, "main/h/hello", "hello_2.10-2_amd64.deb")
                .unwrap();
        let architecture_id = Store::upsert_architecture(&conn, Architecture::All).unwrap();
        Store::upsert_file(&conn, "aaaa", 12345).unwrap();
        (store, archive_id, location_id, architecture_id)
    }

    #[test]
    fn s1_single_observation_creates_singleton_range() {
        let (store, archive_id, location_id, architecture_id) = setup();
        let conn = store.get().unwrap();
        assert!(observe(&conn, archive_id, "aaaa", location_id, architecture_id, "20210221T150011Z"));

        let info = store.file_observations("aaaa").unwrap();
        assert_eq!(info.len(), 1);
        assert_eq!(
            info[0].timestamp_ranges,
            vec![("20210221T150011Z".to_owned(), "20210221T150011Z".to_owned())]
        );
    }

    #[test]
    fn s2_adjacent_observation_extends_range() {
        let (store, archive_id, location_id, architecture_id) = setup();
        let conn = store.get().unwrap();
        observe(&conn, archive_id, "aaaa", location_id, architecture_id, "20210221T150011Z");
        observe(&conn, archive_id, "aaaa", location_id, architecture_id, "20210222T150011Z");

        let info = store.file_observations("aaaa").unwrap();
        assert_eq!(
            info[0].timestamp_ranges,
            vec![("20210221T150011Z".to_owned(), "20210222T150011Z".to_owned())]
        );
    }

    #[test]
    fn s3_missing_timestamp_leaves_range_untouched() {
        let (store, archive_id, location_id, architecture_id) = setup();
        let conn = store.get().unwrap();
        observe(&conn, archive_id, "aaaa", location_id, architecture_id, "20210221T150011Z");
        observe(&conn, archive_id, "aaaa", location_id, architecture_id, "20210222T150011Z");
        // an archive timestamp is ingested (e.g. Release was fetched) but this file wasn't observed at it.
        Store::upsert_timestamp(&conn, archive_id, "20210223T150011Z").unwrap();

        let info = store.file_observations("aaaa").unwrap();
        assert_eq!(
            info[0].timestamp_ranges,
            vec![("20210221T150011Z".to_owned(), "20210222T150011Z".to_owned())]
        );
    }

    #[test]
    fn s4_reingesting_a_gap_merges_both_sides() {
        let (store, archive_id, location_id, architecture_id) = setup();
        let conn = store.get().unwrap();
        observe(&conn, archive_id, "aaaa", location_id, architecture_id, "20210221T150011Z");
        Store::upsert_timestamp(&conn, archive_id, "20210222T150011Z").unwrap();
        observe(&conn, archive_id, "aaaa", location_id, architecture_id, "20210223T150011Z");

        // two disjoint singleton ranges so far
        let info = store.file_observations("aaaa").unwrap();
        assert_eq!(info[0].timestamp_ranges.len(), 2);

        // filling the gap merges them into one range
        observe(&conn, archive_id, "aaaa", location_id, architecture_id, "20210222T150011Z");
        let info = store.file_observations("aaaa").unwrap();
        assert_eq!(
            info[0].timestamp_ranges,
            vec![("20210221T150011Z".to_owned(), "20210223T150011Z".to_owned())]
        );
    }

    #[test]
    fn idempotent_reinsertion_is_a_no_op() {
        let (store, archive_id, location_id, architecture_id) = setup();
        let conn = store.get().unwrap();
        observe(&conn, archive_id, "aaaa", location_id, architecture_id, "20210221T150011Z");
        observe(&conn, archive_id, "aaaa", location_id, architecture_id, "20210222T150011Z");
        let before = store.file_observations("aaaa").unwrap();

        let changed = observe(&conn, archive_id, "aaaa", location_id, architecture_id, "20210222T150011Z");
        let after = store.file_observations("aaaa").unwrap();

        assert!(!changed);
        assert_eq!(before, after);
    }

    #[test]
    fn size_drift_is_rejected() {
        let (store, ..) = setup();
        let conn = store.get().unwrap();
        let err = Store::upsert_file(&conn, "aaaa", 1).unwrap_err();
        assert!(matches!(err, StorageError::SizeMismatch { .. }));
    }

    #[test]
    fn sentinel_timestamp_cannot_mix_with_real_ones() {
        let store = Store::open(":memory:").unwrap();
        let conn = store.get().unwrap();
        let archive_id = Store::upsert_archive(&conn, "qubes-r4.1-vm").unwrap();
        Store::upsert_timestamp(&conn, archive_id, "20210221T150011Z").unwrap();
        let err = Store::upsert_timestamp(&conn, archive_id, SENTINEL).unwrap_err();
        assert!(matches!(err, StorageError::SentinelMixing { .. }));
    }

    #[test]
    fn closest_timestamp_resolution() {
        let (store, archive_id, ..) = setup();
        let conn = store.get().unwrap();
        Store::upsert_timestamp(&conn, archive_id, "20210221T150011Z").unwrap();
        Store::upsert_timestamp(&conn, archive_id, "20210222T150011Z").unwrap();

        assert_eq!(
            store.closest_timestamp("debian", "20210222T160000Z").unwrap(),
            Some("20210222T150011Z".to_owned())
        );
        assert_eq!(store.closest_timestamp("debian", "20210220T000000Z").unwrap(), None);
        assert_eq!(
            store.latest_timestamp("debian").unwrap(),
            Some("20210222T150011Z".to_owned())
        );
    }
}
