// Copyright 2025
// SPDX-License-Identifier: GPL-3.0-or-later

//! # Provenance query layer (C7) and buildinfo solver endpoint (C8)
//!
//! A read-only axum server over [`crate::store::Store`]. Every response is
//! wrapped in [`ApiEnvelope`] (`_api`/`_comment` plus the flattened
//! payload). List endpoints are sorted deterministically by the store's
//! own queries; this module adds no further sorting.
//!
//! Handlers follow the usual axum shape: `State<ServerState>` extraction,
//! `Json<T>` responses, `axum::extract::Multipart` for the buildinfo
//! upload, a shared `ErrorResponse`/`IntoResponse` error wrapper.

use std::collections::HashMap;

use axum::extract::{Multipart, Path, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use snapshot_model::package::PackageKind;

use crate::config::Context;
use crate::layout;
use crate::solver::{self, LocationCover};
use crate::store::{ObservationRow, PackageFileRow, StorageError};

const API_VERSION: u32 = 1;
const COMMENT: &str = "This service is provided as-is and without warranty of any kind. It is experimental and subject to change at any time.";

/// The envelope every response carries: `{"_api": version, "_comment":
/// string, …payload…}`.
#[derive(Debug, Serialize)]
struct ApiEnvelope<T> {
    #[serde(rename = "_api")]
    api: u32,
    #[serde(rename = "_comment")]
    comment: &'static str,
    #[serde(flatten)]
    payload: T,
}

impl<T: Serialize> ApiEnvelope<T> {
    fn new(payload: T) -> Self {
        Self {
            api: API_VERSION,
            comment: COMMENT,
            payload,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiEnvelope<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// The query layer's error type, per endpoint mapped to an HTTP status:
/// 404 when the named entity is unknown, 500 on store error.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The requested entity does not exist.
    #[error("not found")]
    NotFound,
    /// A malformed request (bad query parameter, bad multipart upload).
    #[error("bad request: {0}")]
    BadRequest(String),
    /// The underlying store failed.
    #[error("store error: {0}")]
    Store(#[from] StorageError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, ApiEnvelope::new(ErrorBody { error: self.to_string() })).into_response()
    }
}

/// Builds the `/mr/*` router over a resolved [`Context`].
pub fn router(ctx: Context) -> Router {
    Router::new()
        .route("/mr/package", get(source_packages))
        .route("/mr/package/{p}", get(source_versions))
        .route("/mr/package/{p}/{v}/srcfiles", get(source_files))
        .route("/mr/binary/{p}", get(binary_versions))
        .route("/mr/binary/{p}/{v}/binfiles", get(binary_files))
        .route("/mr/file", get(all_files))
        .route("/mr/file/{sha256}/info", get(file_info))
        .route("/mr/file/{sha256}/download", get(file_download))
        .route("/mr/timestamp/{archive}", get(archive_timestamps))
        .route("/mr/timestamp/{archive}/{value}", get(timestamp_resolve))
        .route("/mr/buildinfo", post(buildinfo_solve))
        .layer(middleware::from_fn(log_request))
        .with_state(ctx)
}

/// Logs every request's method, path and response status at `info`.
async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let response = next.run(req).await;
    log::info!("{method} {path} {}", response.status());
    response
}

#[derive(Serialize)]
struct NameList {
    result: Vec<String>,
}

async fn source_packages(State(ctx): State<Context>) -> Result<ApiEnvelope<NameList>, ApiError> {
    let result = ctx.store.source_package_names()?;
    Ok(ApiEnvelope::new(NameList { result }))
}

async fn source_versions(State(ctx): State<Context>, Path(p): Path<String>) -> Result<ApiEnvelope<NameList>, ApiError> {
    let result = ctx.store.package_versions(PackageKind::Source, &p)?;
    if result.is_empty() {
        return Err(ApiError::NotFound);
    }
    Ok(ApiEnvelope::new(NameList { result }))
}

async fn binary_versions(State(ctx): State<Context>, Path(p): Path<String>) -> Result<ApiEnvelope<NameList>, ApiError> {
    let result = ctx.store.package_versions(PackageKind::Binary, &p)?;
    if result.is_empty() {
        return Err(ApiError::NotFound);
    }
    Ok(ApiEnvelope::new(NameList { result }))
}

#[derive(Deserialize)]
struct FileInfoQuery {
    #[serde(default)]
    fileinfo: u8,
}

/// One entry of a `srcfiles`/`binfiles` `result` list: a file's hash, and
/// (for binaries) the architecture it was built for.
#[derive(Serialize)]
struct FilesEntry {
    hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    architecture: Option<String>,
}

/// The `fileinfo=1` expansion: sha256 → the observations realizing it.
#[derive(Serialize)]
struct FileInfoEntry {
    name: String,
    path: String,
    size: u64,
    archive_name: String,
    suite_name: String,
    component_name: String,
    timestamp_ranges: Vec<(String, String)>,
}

impl From<ObservationRow> for FileInfoEntry {
    fn from(row: ObservationRow) -> Self {
        Self {
            name: row.name,
            path: row.path,
            size: row.size,
            archive_name: row.archive,
            suite_name: row.suite,
            component_name: row.component,
            timestamp_ranges: row.timestamp_ranges,
        }
    }
}

#[derive(Serialize)]
struct FilesResponse {
    result: Vec<FilesEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fileinfo: Option<HashMap<String, Vec<FileInfoEntry>>>,
}

fn files_response(ctx: &Context, rows: Vec<PackageFileRow>, want_fileinfo: bool) -> Result<FilesResponse, ApiError> {
    let mut fileinfo = want_fileinfo.then(HashMap::new);
    if let Some(map) = fileinfo.as_mut() {
        for row in &rows {
            if !map.contains_key(&row.sha256) {
                let observations = ctx.store.file_observations(&row.sha256)?.into_iter().map(FileInfoEntry::from).collect();
                map.insert(row.sha256.clone(), observations);
            }
        }
    }
    let result = rows
        .into_iter()
        .map(|row| FilesEntry {
            hash: row.sha256,
            architecture: row.architecture,
        })
        .collect();
    Ok(FilesResponse { result, fileinfo })
}

async fn source_files(
    State(ctx): State<Context>,
    Path((p, v)): Path<(String, String)>,
    Query(q): Query<FileInfoQuery>,
) -> Result<ApiEnvelope<FilesResponse>, ApiError> {
    let rows = ctx.store.package_files(PackageKind::Source, &p, &v)?;
    if rows.is_empty() {
        return Err(ApiError::NotFound);
    }
    Ok(ApiEnvelope::new(files_response(&ctx, rows, q.fileinfo == 1)?))
}

async fn binary_files(
    State(ctx): State<Context>,
    Path((p, v)): Path<(String, String)>,
    Query(q): Query<FileInfoQuery>,
) -> Result<ApiEnvelope<FilesResponse>, ApiError> {
    let rows = ctx.store.package_files(PackageKind::Binary, &p, &v)?;
    if rows.is_empty() {
        return Err(ApiError::NotFound);
    }
    Ok(ApiEnvelope::new(files_response(&ctx, rows, q.fileinfo == 1)?))
}

async fn all_files(State(ctx): State<Context>) -> Result<ApiEnvelope<NameList>, ApiError> {
    let result = ctx.store.all_file_hashes()?;
    Ok(ApiEnvelope::new(NameList { result }))
}

#[derive(Serialize)]
struct FileInfoResponse {
    result: Vec<FileInfoEntry>,
}

async fn file_info(State(ctx): State<Context>, Path(sha256): Path<String>) -> Result<ApiEnvelope<FileInfoResponse>, ApiError> {
    let result: Vec<FileInfoEntry> = ctx.store.file_observations(&sha256)?.into_iter().map(FileInfoEntry::from).collect();
    if result.is_empty() {
        return Err(ApiError::NotFound);
    }
    Ok(ApiEnvelope::new(FileInfoResponse { result }))
}

async fn file_download(State(ctx): State<Context>, Path(sha256): Path<String>) -> Result<Response, ApiError> {
    let sha256_typed =
        snapshot_model::file::Sha256::try_from(sha256.as_str()).map_err(|_| ApiError::BadRequest("malformed sha256".to_owned()))?;
    if ctx.store.file_size(&sha256)?.is_none() {
        return Err(ApiError::NotFound);
    }
    let path = layout::by_hash_path(&ctx.root, &sha256_typed);
    Ok((StatusCode::FOUND, [(header::LOCATION, format!("file://{}", path.display()))]).into_response())
}

async fn archive_timestamps(State(ctx): State<Context>, Path(archive): Path<String>) -> Result<ApiEnvelope<NameList>, ApiError> {
    let result = ctx.store.archive_timestamps(&archive)?;
    if result.is_empty() {
        return Err(ApiError::NotFound);
    }
    Ok(ApiEnvelope::new(NameList { result }))
}

#[derive(Serialize)]
struct TimestampResponse {
    result: String,
}

async fn timestamp_resolve(
    State(ctx): State<Context>,
    Path((archive, value)): Path<(String, String)>,
) -> Result<ApiEnvelope<TimestampResponse>, ApiError> {
    let resolved = if value == "latest" {
        ctx.store.latest_timestamp(&archive)?
    } else {
        ctx.store.closest_timestamp(&archive, &value)?
    };
    let result = resolved.ok_or(ApiError::NotFound)?;
    Ok(ApiEnvelope::new(TimestampResponse { result }))
}

#[derive(Deserialize)]
struct BuildinfoQuery {
    suite_name: Option<String>,
}

#[derive(Serialize)]
struct BuildinfoResponse {
    result: Vec<LocationCover>,
}

async fn buildinfo_solve(
    State(ctx): State<Context>,
    Query(q): Query<BuildinfoQuery>,
    mut multipart: Multipart,
) -> Result<ApiEnvelope<BuildinfoResponse>, ApiError> {
    let field = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(err.to_string()))?
        .ok_or_else(|| ApiError::BadRequest("expected a \"buildinfo\" form field".to_owned()))?;
    if field.name() != Some("buildinfo") {
        return Err(ApiError::BadRequest(format!("expected field named \"buildinfo\", got {:?}", field.name())));
    }
    let bytes = field.bytes().await.map_err(|err| ApiError::BadRequest(err.to_string()))?;
    let text = String::from_utf8_lossy(&bytes);
    let buildinfo = snapshot_model::buildinfo::from_str(&text).map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let result = solver::solve(&ctx.store, &buildinfo, q.suite_name.as_deref())?;
    Ok(ApiEnvelope::new(BuildinfoResponse { result }))
}
