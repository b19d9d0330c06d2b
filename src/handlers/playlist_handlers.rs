//! HTTP handlers for playlists and playlist covers.

use super::{multipart::read_file_field, path::ApiPath};
use crate::{
    errors::AppError,
    models::playlist::{Playlist, PlaylistId},
    services::catalog_service::MediaCatalog,
};
use axum::{
    Json,
    extract::{Multipart, State},
};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/playlists` and `PUT /api/playlists/{id}`.
#[derive(Debug, Deserialize)]
pub struct PlaylistNameReq {
    pub name: String,
}

/// Body of `POST /api/playlists/{id}/tracks`.
#[derive(Debug, Deserialize)]
pub struct PlaylistTrackReq {
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// `GET /api/playlists`
pub async fn list_playlists(State(catalog): State<MediaCatalog>) -> Json<Vec<Playlist>> {
    Json(catalog.list_playlists().await)
}

/// `POST /api/playlists`
pub async fn create_playlist(
    State(catalog): State<MediaCatalog>,
    Json(req): Json<PlaylistNameReq>,
) -> Result<Json<Playlist>, AppError> {
    Ok(Json(catalog.create_playlist(&req.name).await?))
}

/// `GET /api/playlists/{id}`
pub async fn get_playlist(
    State(catalog): State<MediaCatalog>,
    ApiPath(id): ApiPath<PlaylistId>,
) -> Result<Json<Playlist>, AppError> {
    Ok(Json(catalog.get_playlist(id).await?))
}

/// `PUT /api/playlists/{id}` — rename.
pub async fn rename_playlist(
    State(catalog): State<MediaCatalog>,
    ApiPath(id): ApiPath<PlaylistId>,
    Json(req): Json<PlaylistNameReq>,
) -> Result<Json<Playlist>, AppError> {
    Ok(Json(catalog.rename_playlist(id, &req.name).await?))
}

/// `DELETE /api/playlists/{id}`
pub async fn delete_playlist(
    State(catalog): State<MediaCatalog>,
    ApiPath(id): ApiPath<PlaylistId>,
) -> Result<Json<MessageResponse>, AppError> {
    catalog.delete_playlist(id).await?;
    Ok(Json(MessageResponse {
        message: "Playlist deleted successfully",
    }))
}

/// `POST /api/playlists/{id}/tracks`
pub async fn add_track(
    State(catalog): State<MediaCatalog>,
    ApiPath(id): ApiPath<PlaylistId>,
    Json(req): Json<PlaylistTrackReq>,
) -> Result<Json<Playlist>, AppError> {
    Ok(Json(catalog.add_track_to_playlist(id, &req.filename).await?))
}

/// `DELETE /api/playlists/{id}/tracks/{filename}`
pub async fn remove_track(
    State(catalog): State<MediaCatalog>,
    ApiPath((id, filename)): ApiPath<(PlaylistId, String)>,
) -> Result<Json<Playlist>, AppError> {
    Ok(Json(catalog.remove_track_from_playlist(id, &filename).await?))
}

/// `POST /api/playlists/{id}/cover` — multipart field `cover`.
pub async fn upload_cover(
    State(catalog): State<MediaCatalog>,
    ApiPath(id): ApiPath<PlaylistId>,
    mut multipart: Multipart,
) -> Result<Json<Playlist>, AppError> {
    let part = read_file_field(&mut multipart, "cover").await?;
    Ok(Json(
        catalog
            .attach_playlist_cover(id, part.bytes, &part.content_type)
            .await?,
    ))
}

/// `DELETE /api/playlists/{id}/cover`
pub async fn remove_cover(
    State(catalog): State<MediaCatalog>,
    ApiPath(id): ApiPath<PlaylistId>,
) -> Result<Json<Playlist>, AppError> {
    Ok(Json(catalog.detach_playlist_cover(id).await?))
}
