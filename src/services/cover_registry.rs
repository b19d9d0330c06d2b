//! Bookkeeping of which stored cover image belongs to which owner.
//!
//! Two indexes are kept in lockstep: owner → cover and cover → owner. Every
//! owner has at most one active cover and every cover blob has exactly one
//! owner, so no two owners can ever point at the same stored filename.

use super::catalog_service::{CatalogError, CatalogResult};
use crate::models::{cover::CoverOwner, playlist::PlaylistId};
use std::collections::HashMap;

const IMAGE_MIME_TYPES: [(&str, &str); 5] = [
    ("image/jpeg", "jpg"),
    ("image/jpg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

/// Validate a cover's MIME hint and return the file extension to store it under.
pub fn image_extension(mime_type: &str) -> CatalogResult<&'static str> {
    let essence = mime_type.split(';').next().unwrap_or("").trim();
    IMAGE_MIME_TYPES
        .iter()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(essence))
        .map(|(_, ext)| *ext)
        .ok_or_else(|| CatalogError::UnsupportedFormat(mime_type.to_string()))
}

#[derive(Debug, Default)]
pub struct CoverRegistry {
    tracks: HashMap<String, String>,
    playlists: HashMap<PlaylistId, String>,
    owners: HashMap<String, CoverOwner>,
}

impl CoverRegistry {
    pub fn cover_of(&self, owner: &CoverOwner) -> Option<&str> {
        match owner {
            CoverOwner::Track(filename) => self.track_cover(filename),
            CoverOwner::Playlist(id) => self.playlist_cover(*id),
        }
    }

    pub fn track_cover(&self, filename: &str) -> Option<&str> {
        self.tracks.get(filename).map(String::as_str)
    }

    pub fn playlist_cover(&self, id: PlaylistId) -> Option<&str> {
        self.playlists.get(&id).map(String::as_str)
    }

    pub fn owner_of(&self, cover: &str) -> Option<&CoverOwner> {
        self.owners.get(cover)
    }

    /// Number of covers currently attached.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Record `cover` as the owner's active cover and return the one it replaces.
    ///
    /// Fails without changing anything if `cover` already belongs to someone.
    pub fn bind(&mut self, owner: CoverOwner, cover: String) -> CatalogResult<Option<String>> {
        if let Some(existing) = self.owners.get(&cover) {
            return Err(CatalogError::InvalidArgument(format!(
                "cover `{}` is already attached to {}",
                cover, existing
            )));
        }
        let previous = match &owner {
            CoverOwner::Track(filename) => self.tracks.insert(filename.clone(), cover.clone()),
            CoverOwner::Playlist(id) => self.playlists.insert(*id, cover.clone()),
        };
        if let Some(previous) = &previous {
            self.owners.remove(previous);
        }
        self.owners.insert(cover, owner);
        Ok(previous)
    }

    /// Forget the owner's cover, returning the stored filename it pointed at.
    pub fn release(&mut self, owner: &CoverOwner) -> Option<String> {
        let cover = match owner {
            CoverOwner::Track(filename) => self.tracks.remove(filename),
            CoverOwner::Playlist(id) => self.playlists.remove(id),
        }?;
        self.owners.remove(&cover);
        Some(cover)
    }
}
