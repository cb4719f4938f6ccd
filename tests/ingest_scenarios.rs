// Copyright 2025
// SPDX-License-Identifier: GPL-3.0-or-later

//! End-to-end ingestion scenarios against a fake upstream: a file observed
//! at two adjacent timestamps coalesces into one range; a timestamp that
//! drops the package leaves the range closed rather than extended; and
//! re-ingesting an already-covered timestamp is a no-op.

use std::io::Write;

use snapshot_mirror::cli::{IngestOptions, StoreOptions, TimestampSelector};
use snapshot_mirror::config::Context;
use snapshot_mirror::ingest::Ingester;
use snapshot_mirror::store::Store;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const RELEASE: &[u8] = include_bytes!("fixtures/Release");
const SOURCES_XZ: &[u8] = include_bytes!("fixtures/Sources.xz");
const PACKAGES_XZ: &[u8] = include_bytes!("fixtures/Packages.xz");
const HELLO_DEB: &[u8] = include_bytes!("fixtures/hello_1.0-1_amd64.deb");
const HELLO_SHA256: &str = "ab2f22edb679ff4f8e589e0defef053f0bb0b06b00e11bf895d6d42f3dfd6ddd";

/// A fake upstream that serves a fixed body per exact repo-relative path
/// suffix, and 404s anything else — enough to drive one ingester run
/// without touching the network.
async fn spawn_fake_upstream(routes: &'static [(&'static str, &'static [u8])]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]);
                let path = request
                    .lines()
                    .next()
                    .and_then(|line| line.split_whitespace().nth(1))
                    .unwrap_or("/")
                    .to_owned();

                let body = routes.iter().find(|(suffix, _)| path.ends_with(suffix)).map(|(_, body)| *body);

                let mut response = Vec::new();
                match body {
                    Some(body) => {
                        write!(response, "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", body.len()).unwrap();
                        response.extend_from_slice(body);
                    }
                    None => {
                        write!(response, "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n").unwrap();
                    }
                }
                let _ = socket.write_all(&response).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{addr}")
}

fn ingest_options(upstream: String, root: std::path::PathBuf, db_url: String, timestamp: &str) -> IngestOptions {
    IngestOptions {
        store: StoreOptions {
            root: Some(root),
            upstream: Some(upstream),
            db_url: Some(db_url),
        },
        verbose: clap_verbosity_flag::Verbosity::new(0, 0),
        debug: false,
        archive: vec!["snaptest".to_owned()],
        suite: vec!["unstable".to_owned()],
        component: vec!["main".to_owned()],
        arch: vec!["amd64".to_owned()],
        timestamp: vec![TimestampSelector::Exact(snapshot_model::timestamp::Timestamp::try_from(timestamp).unwrap())],
        check_only: false,
        provision_db: false,
        provision_db_only: false,
        ignore_provisioned: false,
        no_clean_part_file: false,
        skip_installer_files: true,
        jobs: 2,
    }
}

async fn run_ingest(upstream: &str, root: &std::path::Path, db_url: &str, timestamp: &str) {
    let ctx = Context::resolve(Some(root.to_path_buf()), Some(upstream.to_owned()), Some(db_url.to_owned())).unwrap();
    let opts = ingest_options(upstream.to_owned(), root.to_path_buf(), db_url.to_owned(), timestamp);
    let ingester = Ingester::new(ctx, opts).unwrap();
    ingester.run().await.unwrap();
}

#[tokio::test]
async fn observations_at_adjacent_timestamps_coalesce_into_one_range() {
    let upstream = spawn_fake_upstream(&[
        ("/dists/unstable/Release", RELEASE),
        ("/dists/unstable/main/source/Sources.xz", SOURCES_XZ),
        ("/dists/unstable/main/binary-amd64/Packages.xz", PACKAGES_XZ),
        ("pool/main/h/hello/hello_1.0-1_amd64.deb", HELLO_DEB),
    ])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let db_url = dir.path().join("store.sqlite3").to_string_lossy().into_owned();

    run_ingest(&upstream, dir.path(), &db_url, "20210221T150011Z").await;
    run_ingest(&upstream, dir.path(), &db_url, "20210222T150011Z").await;

    let store = Store::open(&db_url).unwrap();
    let observations = store.file_observations(HELLO_SHA256).unwrap();
    assert_eq!(observations.len(), 1);
    let observation = &observations[0];
    assert_eq!(observation.name, "hello_1.0-1_amd64.deb");
    assert_eq!(observation.archive, "snaptest");
    assert_eq!(observation.suite, "unstable");
    assert_eq!(observation.component, "main");
    assert_eq!(
        observation.timestamp_ranges,
        vec![("20210221T150011Z".to_owned(), "20210222T150011Z".to_owned())]
    );

    let versions = store.package_versions(snapshot_model::package::PackageKind::Binary, "hello").unwrap();
    assert_eq!(versions, vec!["1.0-1".to_owned()]);

    let by_hash = dir.path().join("by-hash").join(&HELLO_SHA256[..2]).join(HELLO_SHA256);
    assert!(by_hash.exists());
    let t1_path = dir
        .path()
        .join("archive/snaptest/20210221T150011Z/pool/main/h/hello/hello_1.0-1_amd64.deb");
    let t2_path = dir
        .path()
        .join("archive/snaptest/20210222T150011Z/pool/main/h/hello/hello_1.0-1_amd64.deb");
    assert!(t1_path.exists());
    assert!(t2_path.exists());
}

#[tokio::test]
async fn a_timestamp_without_the_package_does_not_extend_the_range() {
    let upstream = spawn_fake_upstream(&[
        ("/dists/unstable/Release", RELEASE),
        ("/dists/unstable/main/source/Sources.xz", SOURCES_XZ),
        ("/dists/unstable/main/binary-amd64/Packages.xz", PACKAGES_XZ),
        ("pool/main/h/hello/hello_1.0-1_amd64.deb", HELLO_DEB),
    ])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let db_url = dir.path().join("store.sqlite3").to_string_lossy().into_owned();

    run_ingest(&upstream, dir.path(), &db_url, "20210221T150011Z").await;

    // A second upstream whose Packages.xz no longer lists `hello` (empty,
    // same as Sources.xz) simulates a timestamp where the package dropped
    // out of the suite.
    let later_upstream = spawn_fake_upstream(&[
        ("/dists/unstable/Release", RELEASE),
        ("/dists/unstable/main/source/Sources.xz", SOURCES_XZ),
        ("/dists/unstable/main/binary-amd64/Packages.xz", SOURCES_XZ),
    ])
    .await;
    run_ingest(&later_upstream, dir.path(), &db_url, "20210223T150011Z").await;

    let store = Store::open(&db_url).unwrap();
    let observations = store.file_observations(HELLO_SHA256).unwrap();
    assert_eq!(observations.len(), 1);
    assert_eq!(
        observations[0].timestamp_ranges,
        vec![("20210221T150011Z".to_owned(), "20210221T150011Z".to_owned())]
    );
}

#[tokio::test]
async fn re_ingesting_the_same_timestamp_is_idempotent() {
    let upstream = spawn_fake_upstream(&[
        ("/dists/unstable/Release", RELEASE),
        ("/dists/unstable/main/source/Sources.xz", SOURCES_XZ),
        ("/dists/unstable/main/binary-amd64/Packages.xz", PACKAGES_XZ),
        ("pool/main/h/hello/hello_1.0-1_amd64.deb", HELLO_DEB),
    ])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let db_url = dir.path().join("store.sqlite3").to_string_lossy().into_owned();

    run_ingest(&upstream, dir.path(), &db_url, "20210221T150011Z").await;
    run_ingest(&upstream, dir.path(), &db_url, "20210221T150011Z").await;

    let store = Store::open(&db_url).unwrap();
    let observations = store.file_observations(HELLO_SHA256).unwrap();
    assert_eq!(observations.len(), 1);
    assert_eq!(
        observations[0].timestamp_ranges,
        vec![("20210221T150011Z".to_owned(), "20210221T150011Z".to_owned())]
    );
}
