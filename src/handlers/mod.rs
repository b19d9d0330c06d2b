//! HTTP handlers. They only translate between the wire and `MediaCatalog`.

pub mod health_handlers;
pub mod multipart;
pub mod path;
pub mod playlist_handlers;
pub mod track_handlers;
