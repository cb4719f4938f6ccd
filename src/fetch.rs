// Copyright 2025
// SPDX-License-Identifier: GPL-3.0-or-later

//! # HTTP fetcher (C2)
//!
//! `fetch(url, options) -> {status, bytes_or_path, final_url}`: follows
//! redirects transparently (reqwest's default), retries retryable failures
//! with a capped exponential backoff plus jitter, enforces a concurrency
//! cap, and caches small index bodies by `(url, ETag or Last-Modified)` in
//! an in-memory LRU, using `reqwest` for requests and a `backoff` + `rand`
//! pairing for jittered retries.

use std::{
    collections::VecDeque,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use bytes::Bytes;
use rand::Rng;
use reqwest::{header, Client, StatusCode};
use snapshot_model::file::Sha256;
use tokio::sync::{Mutex, Semaphore};

use crate::hash::{self, HashError, Placement};

/// Errors a fetch attempt can fail with.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// A transport-level error (connection refused, timeout, TLS, etc).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    /// A non-retryable HTTP status (404, 410, 401, 403).
    #[error("http status {0}")]
    Status(StatusCode),
    /// All retries were exhausted against a retryable failure.
    #[error("exhausted retries against {url}: {source}")]
    RetriesExhausted {
        /// The URL being fetched.
        url: String,
        /// The last retryable error encountered.
        #[source]
        source: Box<FetchError>,
    },
    /// Placement of the downloaded body on disk failed (hash/size mismatch or I/O).
    #[error("{0}")]
    Hash(#[from] HashError),
}

impl FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(err) => !err.is_builder() && !err.is_redirect(),
            FetchError::Status(status) => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            FetchError::Hash(HashError::Stream(_)) => true,
            _ => false,
        }
    }
}

/// What a caller wants done with a fetched body.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Expected sha256, checked when writing to `destination`.
    pub expected_sha256: Option<Sha256>,
    /// Expected size, checked when writing to `destination`.
    pub expected_size: Option<u64>,
    /// If set, stream the body to this path via [`crate::hash::place_stream`].
    /// If unset, buffer the body in memory (small index files only).
    pub destination: Option<PathBuf>,
    /// Whether to consult/populate the in-memory LRU cache. Only applies
    /// when `destination` is unset.
    pub use_cache: bool,
    /// Keep the `.part` file on a failed write instead of deleting it
    /// (`--no-clean-part-file`). Only applies when `destination` is set.
    pub retain_part_on_failure: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            expected_sha256: None,
            expected_size: None,
            retain_part_on_failure: false,
            destination: None,
            use_cache: true,
        }
    }
}

/// The result of a successful fetch.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The body, buffered in memory.
    Body(Bytes),
    /// The body, already placed on disk.
    Written(Placement),
    /// The cached copy is still current (conditional GET returned 304).
    NotModified,
}

#[derive(Clone)]
struct CacheEntry {
    url: String,
    etag: Option<String>,
    last_modified: Option<String>,
    body: Bytes,
}

const CACHE_CAPACITY: usize = 128;

struct Cache {
    entries: VecDeque<CacheEntry>,
}

impl Cache {
    fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(CACHE_CAPACITY),
        }
    }

    fn get(&mut self, url: &str) -> Option<CacheEntry> {
        let pos = self.entries.iter().position(|e| e.url == url)?;
        let entry = self.entries.remove(pos)?;
        self.entries.push_front(entry.clone());
        Some(entry)
    }

    fn put(&mut self, entry: CacheEntry) {
        self.entries.retain(|e| e.url != entry.url);
        self.entries.push_front(entry);
        while self.entries.len() > CACHE_CAPACITY {
            self.entries.pop_back();
        }
    }
}

/// The HTTP fetcher: a `reqwest::Client`, a concurrency-limiting semaphore,
/// and a small conditional-GET cache.
pub struct Fetcher {
    client: Client,
    semaphore: Arc<Semaphore>,
    cache: Mutex<Cache>,
    max_elapsed: Duration,
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("available_permits", &self.semaphore.available_permits())
            .finish()
    }
}

impl Fetcher {
    /// Build a fetcher with the given concurrency cap.
    pub fn new(jobs: usize) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("snapshot-mirror/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            semaphore: Arc::new(Semaphore::new(jobs.max(1))),
            cache: Mutex::new(Cache::new()),
            max_elapsed: Duration::from_secs(180),
        })
    }

    /// Fetch `url`, honoring `options`. Retries retryable failures with
    /// capped exponential backoff plus jitter.
    pub async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchOutcome, FetchError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .expect("fetcher semaphore is never closed");

        let conditional = if options.destination.is_none() && options.use_cache {
            let mut cache = self.cache.lock().await;
            cache.get(url)
        } else {
            None
        };

        let mut backoff = backoff::ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(500))
            .with_max_interval(Duration::from_secs(30))
            .with_max_elapsed_time(Some(self.max_elapsed))
            .build();

        loop {
            match self.try_once(url, options, conditional.as_ref()).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) if err.is_retryable() => {
                    use backoff::backoff::Backoff;
                    match backoff.next_backoff() {
                        Some(delay) => {
                            let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..250));
                            log::debug!("retrying {url} after {:?} (+{:?} jitter): {err}", delay, jitter);
                            tokio::time::sleep(delay + jitter).await;
                        }
                        None => {
                            return Err(FetchError::RetriesExhausted {
                                url: url.to_owned(),
                                source: Box::new(err),
                            });
                        }
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn try_once(
        &self,
        url: &str,
        options: &FetchOptions,
        conditional: Option<&CacheEntry>,
    ) -> Result<FetchOutcome, FetchError> {
        let mut request = self.client.get(url);
        if let Some(entry) = conditional {
            if let Some(etag) = &entry.etag {
                request = request.header(header::IF_NONE_MATCH, etag);
            }
            if let Some(last_modified) = &entry.last_modified {
                request = request.header(header::IF_MODIFIED_SINCE, last_modified);
            }
        }

        let response = request.send().await?;
        if response.status() == StatusCode::NOT_MODIFIED {
            return Ok(FetchOutcome::NotModified);
        }
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        let etag = response
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let last_modified = response
            .headers()
            .get(header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        if let Some(destination) = &options.destination {
            let stream = response.bytes_stream();
            let placement = hash::place_stream(
                destination,
                stream,
                options.expected_sha256,
                options.expected_size,
                options.retain_part_on_failure,
            )
            .await?;
            Ok(FetchOutcome::Written(placement))
        } else {
            let body = response.bytes().await?;
            hash::verify_bytes(&body, options.expected_sha256, options.expected_size)?;
            if options.use_cache {
                self.cache.lock().await.put(CacheEntry {
                    url: url.to_owned(),
                    etag,
                    last_modified,
                    body: body.clone(),
                });
            }
            Ok(FetchOutcome::Body(body))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;
    use tokio::net::TcpListener;

    async fn spawn_fake_server(body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    use tokio::io::{AsyncReadExt, AsyncWriteExt};
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    let mut response = Vec::new();
                    write!(
                        response,
                        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n",
                        body.len()
                    )
                    .unwrap();
                    response.extend_from_slice(body);
                    let _ = socket.write_all(&response).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn buffers_small_bodies_in_memory() {
        let url = spawn_fake_server(b"hello").await;
        let fetcher = Fetcher::new(4).unwrap();
        let outcome = fetcher
            .fetch(&url, &FetchOptions::default())
            .await
            .unwrap();
        match outcome {
            FetchOutcome::Body(bytes) => assert_eq!(&bytes[..], b"hello"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn streams_to_destination_with_expected_size() {
        let url = spawn_fake_server(b"hello world").await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let fetcher = Fetcher::new(1).unwrap();
        let options = FetchOptions {
            destination: Some(dest.clone()),
            expected_size: Some(11),
            ..Default::default()
        };
        let outcome = fetcher.fetch(&url, &options).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Written(_)));
        assert!(dest.exists());
    }
}
