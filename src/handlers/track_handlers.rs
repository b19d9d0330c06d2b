//! HTTP handlers for tracks, their covers and bulk edits.
//! Streams stored payloads to avoid buffering in memory and delegates every
//! consistency concern to `MediaCatalog`.

use super::multipart::{file_part, read_file_field};
use crate::{
    errors::AppError,
    models::{
        cover::CoverRef,
        track::{AudioAsset, BulkUpdate, BulkUpdateOutcome, CoverUpload, TrackMetadataPatch},
    },
    services::catalog_service::{CascadeReport, CatalogSnapshot, MediaCatalog},
};
use axum::{
    Json,
    body::Body,
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio_util::io::ReaderStream;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
    pub filename: String,
    pub track: AudioAsset,
}

#[derive(Debug, Serialize)]
pub struct CoverResponse {
    pub message: &'static str,
    #[serde(flatten)]
    pub cover: CoverRef,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: &'static str,
    pub cascade: CascadeReport,
}

#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub message: String,
    #[serde(flatten)]
    pub outcome: BulkUpdateOutcome,
}

/// JSON form of a bulk update (no cover image).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateBody {
    pub filenames: Vec<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    #[serde(default)]
    pub remove_cover: bool,
}

impl From<BulkUpdateBody> for BulkUpdate {
    fn from(body: BulkUpdateBody) -> Self {
        BulkUpdate {
            filenames: body.filenames,
            artist: body.artist,
            album: body.album,
            cover: None,
            remove_cover: body.remove_cover,
        }
    }
}

/// `GET /api/music/files`
pub async fn list_tracks(State(catalog): State<MediaCatalog>) -> Json<Vec<AudioAsset>> {
    Json(catalog.list_tracks().await)
}

/// `GET /api/catalog`
///
/// Tracks, playlists and the cover count from one consistent read.
pub async fn catalog_snapshot(State(catalog): State<MediaCatalog>) -> Json<CatalogSnapshot> {
    Json(catalog.snapshot().await)
}

/// `POST /api/music/upload` — multipart field `music`.
pub async fn upload_track(
    State(catalog): State<MediaCatalog>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let part = read_file_field(&mut multipart, "music").await?;
    let track = catalog
        .upload_track(part.bytes, &part.file_name, &part.content_type)
        .await?;

    Ok(Json(UploadResponse {
        message: "File uploaded successfully",
        filename: track.filename.clone(),
        track,
    }))
}

/// `GET /api/music/{filename}`, the raw audio as a streaming response.
pub async fn stream_track(
    State(catalog): State<MediaCatalog>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let (track, file, size) = catalog.open_track(&filename).await?;
    Ok(stream_file(
        file,
        size,
        audio_content_type(&track.filename),
        track.etag.as_deref(),
    ))
}

/// `PUT /api/music/{filename}/metadata`
pub async fn update_metadata(
    State(catalog): State<MediaCatalog>,
    Path(filename): Path<String>,
    Json(patch): Json<TrackMetadataPatch>,
) -> Result<Json<AudioAsset>, AppError> {
    Ok(Json(catalog.update_track_metadata(&filename, &patch).await?))
}

/// `POST /api/music/{filename}/cover` — multipart field `cover`.
pub async fn upload_track_cover(
    State(catalog): State<MediaCatalog>,
    Path(filename): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<CoverResponse>, AppError> {
    let part = read_file_field(&mut multipart, "cover").await?;
    let cover = catalog
        .attach_track_cover(&filename, part.bytes, &part.content_type)
        .await?;
    Ok(Json(CoverResponse {
        message: "Cover uploaded successfully",
        cover,
    }))
}

/// `DELETE /api/music/{filename}/cover`
pub async fn remove_track_cover(
    State(catalog): State<MediaCatalog>,
    Path(filename): Path<String>,
) -> Result<Json<AudioAsset>, AppError> {
    Ok(Json(catalog.detach_track_cover(&filename).await?))
}

/// `DELETE /api/music/{filename}`
///
/// Cascades into playlists and covers; the response carries the cascade report.
pub async fn delete_track(
    State(catalog): State<MediaCatalog>,
    Path(filename): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let cascade = catalog.delete_track(&filename).await?;
    Ok(Json(DeleteResponse {
        message: "File deleted successfully",
        cascade,
    }))
}

/// `POST /api/music/bulk-update` — JSON, or multipart when a cover is sent.
pub async fn bulk_update(
    State(catalog): State<MediaCatalog>,
    request: Request,
) -> Result<Json<BulkResponse>, AppError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    let update = if is_multipart {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|rej| AppError::bad_request(rej.body_text()))?;
        bulk_from_multipart(multipart).await?
    } else {
        let Json(body) = Json::<BulkUpdateBody>::from_request(request, &())
            .await
            .map_err(|rej| AppError::bad_request(rej.body_text()))?;
        body.into()
    };

    let outcome = catalog.bulk_update_tracks(update).await?;
    Ok(Json(BulkResponse {
        message: format!("Updated {} tracks", outcome.updated),
        outcome,
    }))
}

async fn bulk_from_multipart(mut multipart: Multipart) -> Result<BulkUpdate, AppError> {
    let mut update = BulkUpdate::default();
    while let Some(part) = multipart.next_field().await? {
        let name = part.name().unwrap_or_default().to_string();
        match name.as_str() {
            "cover" => {
                let file = file_part(part).await?;
                if !file.bytes.is_empty() {
                    update.cover = Some(CoverUpload {
                        bytes: file.bytes,
                        mime_type: file.content_type,
                    });
                }
            }
            "filenames" | "filenames[]" => {
                let text = part.text().await?;
                if text.trim_start().starts_with('[') {
                    let names: Vec<String> = serde_json::from_str(&text)
                        .map_err(|e| AppError::bad_request(format!("invalid filenames: {}", e)))?;
                    update.filenames.extend(names);
                } else if !text.is_empty() {
                    update.filenames.push(text);
                }
            }
            "artist" => update.artist = Some(part.text().await?),
            "album" => update.album = Some(part.text().await?),
            "removeCover" => {
                let text = part.text().await?;
                update.remove_cover = matches!(text.trim(), "true" | "1" | "on");
            }
            _ => continue,
        }
    }
    Ok(update)
}

/// `GET /api/covers/{cover}`
pub async fn stream_cover(
    State(catalog): State<MediaCatalog>,
    Path(cover): Path<String>,
) -> Result<Response, AppError> {
    let (file, size) = catalog.open_cover(&cover).await?;
    Ok(stream_file(file, size, image_content_type(&cover), None))
}

fn stream_file(file: File, size: u64, content_type: &'static str, etag: Option<&str>) -> Response {
    let body = Body::from_stream(ReaderStream::new(file));
    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_blob_headers(response.headers_mut(), size, content_type, etag);
    response
}

fn set_blob_headers(headers: &mut HeaderMap, size: u64, content_type: &'static str, etag: Option<&str>) {
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
    if let Some(etag) = etag {
        let quoted = format!("\"{}\"", etag);
        if let Ok(value) = HeaderValue::from_str(&quoted) {
            headers.insert(header::ETAG, value);
        }
    }
}

fn extension(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

fn audio_content_type(filename: &str) -> &'static str {
    match extension(filename).as_str() {
        "mp3" | "mpeg" => "audio/mpeg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}

fn image_content_type(filename: &str) -> &'static str {
    match extension(filename).as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
