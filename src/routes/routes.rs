//! Defines routes for all catalog operations.
//!
//! ## Structure
//! - **Track endpoints**
//!   - `GET    /api/music/files` — list tracks
//!   - `POST   /api/music/upload` — upload a track (multipart `music`)
//!   - `POST   /api/music/bulk-update` — bulk artist/album/cover edit
//!   - `GET    /api/music/{filename}` — stream the stored audio
//!   - `DELETE /api/music/{filename}` — delete, cascading into playlists and covers
//!   - `PUT    /api/music/{filename}/metadata` — edit title/artist/album
//!   - `POST   /api/music/{filename}/cover`, `DELETE` — attach/detach a cover
//!   - `GET    /api/covers/{cover}` — stream a cover image
//!   - `GET    /api/catalog` — tracks and playlists in one consistent read
//!
//! - **Playlist endpoints**
//!   - `GET    /api/playlists`, `POST` — list/create
//!   - `GET    /api/playlists/{id}`, `PUT`, `DELETE` — get/rename/delete
//!   - `POST   /api/playlists/{id}/tracks` — add a track
//!   - `DELETE /api/playlists/{id}/tracks/{filename}` — remove a track
//!   - `POST   /api/playlists/{id}/cover`, `DELETE` — attach/detach a cover

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        playlist_handlers, track_handlers,
    },
    services::catalog_service::MediaCatalog,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};

/// Build and return the router for the catalog API.
///
/// The router carries shared state (`MediaCatalog`) to all handlers; request
/// bodies are capped at `max_upload_bytes`.
pub fn routes(max_upload_bytes: usize) -> Router<MediaCatalog> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Track routes
        .route("/api/music/files", get(track_handlers::list_tracks))
        .route("/api/music/upload", post(track_handlers::upload_track))
        .route("/api/music/bulk-update", post(track_handlers::bulk_update))
        .route(
            "/api/music/{filename}",
            get(track_handlers::stream_track).delete(track_handlers::delete_track),
        )
        .route(
            "/api/music/{filename}/metadata",
            put(track_handlers::update_metadata),
        )
        .route(
            "/api/music/{filename}/cover",
            post(track_handlers::upload_track_cover).delete(track_handlers::remove_track_cover),
        )
        .route("/api/covers/{cover}", get(track_handlers::stream_cover))
        .route("/api/catalog", get(track_handlers::catalog_snapshot))
        // Playlist routes
        .route(
            "/api/playlists",
            get(playlist_handlers::list_playlists).post(playlist_handlers::create_playlist),
        )
        .route(
            "/api/playlists/{id}",
            get(playlist_handlers::get_playlist)
                .put(playlist_handlers::rename_playlist)
                .delete(playlist_handlers::delete_playlist),
        )
        .route("/api/playlists/{id}/tracks", post(playlist_handlers::add_track))
        .route(
            "/api/playlists/{id}/tracks/{filename}",
            delete(playlist_handlers::remove_track),
        )
        .route(
            "/api/playlists/{id}/cover",
            post(playlist_handlers::upload_cover).delete(playlist_handlers::remove_cover),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}
