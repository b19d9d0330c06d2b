//! Catalog services: blob storage, the three in-memory stores, and the
//! coordinator that keeps them consistent.

pub mod audio_catalog;
pub mod blob_store;
pub mod catalog_service;
pub mod cover_registry;
pub mod playlist_store;
pub mod probe;
