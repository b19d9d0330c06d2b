//! Playlist records: a name, creation time and an ordered, deduplicated
//! list of track filenames.

use super::catalog_service::{CatalogError, CatalogResult};
use crate::models::playlist::{Playlist, PlaylistId};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};

#[derive(Clone, Debug)]
struct PlaylistEntry {
    name: String,
    tracks: Vec<String>,
    // Mirrors `tracks` for constant-time membership checks.
    members: HashSet<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct PlaylistStore {
    next_id: u64,
    playlists: BTreeMap<PlaylistId, PlaylistEntry>,
}

impl Default for PlaylistStore {
    fn default() -> Self {
        Self {
            next_id: 1,
            playlists: BTreeMap::new(),
        }
    }
}

fn validate_name(name: &str) -> CatalogResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::InvalidArgument(
            "playlist name must not be empty".into(),
        ));
    }
    Ok(trimmed.to_string())
}

impl PlaylistStore {
    pub fn contains(&self, id: PlaylistId) -> bool {
        self.playlists.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = PlaylistId> + '_ {
        self.playlists.keys().copied()
    }

    pub fn create(&mut self, name: &str) -> CatalogResult<PlaylistId> {
        let name = validate_name(name)?;
        let id = PlaylistId(self.next_id);
        self.next_id += 1;
        self.playlists.insert(
            id,
            PlaylistEntry {
                name,
                tracks: Vec::new(),
                members: HashSet::new(),
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    /// Build a snapshot; `cover` is supplied by the cover registry.
    pub fn snapshot(&self, id: PlaylistId, cover: Option<&str>) -> CatalogResult<Playlist> {
        let entry = self.entry(id)?;
        Ok(Playlist {
            id,
            name: entry.name.clone(),
            tracks: entry.tracks.clone(),
            cover: cover.map(str::to_string),
            created_at: entry.created_at,
        })
    }

    pub fn rename(&mut self, id: PlaylistId, name: &str) -> CatalogResult<()> {
        let name = validate_name(name)?;
        self.entry_mut(id)?.name = name;
        Ok(())
    }

    /// Append `filename` unless it is already present. Returns whether the list changed.
    pub fn add_track(&mut self, id: PlaylistId, filename: &str) -> CatalogResult<bool> {
        let entry = self.entry_mut(id)?;
        if !entry.members.insert(filename.to_string()) {
            return Ok(false);
        }
        entry.tracks.push(filename.to_string());
        Ok(true)
    }

    /// Remove `filename` if present. Returns whether the list changed.
    pub fn remove_track(&mut self, id: PlaylistId, filename: &str) -> CatalogResult<bool> {
        let entry = self.entry_mut(id)?;
        if !entry.members.remove(filename) {
            return Ok(false);
        }
        entry.tracks.retain(|track| track != filename);
        Ok(true)
    }

    /// Playlists whose track list contains `filename`.
    pub fn containing(&self, filename: &str) -> Vec<PlaylistId> {
        self.playlists
            .iter()
            .filter(|(_, entry)| entry.members.contains(filename))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn remove(&mut self, id: PlaylistId) -> CatalogResult<()> {
        self.playlists
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| CatalogError::playlist_not_found(id))
    }

    fn entry(&self, id: PlaylistId) -> CatalogResult<&PlaylistEntry> {
        self.playlists
            .get(&id)
            .ok_or_else(|| CatalogError::playlist_not_found(id))
    }

    fn entry_mut(&mut self, id: PlaylistId) -> CatalogResult<&mut PlaylistEntry> {
        self.playlists
            .get_mut(&id)
            .ok_or_else(|| CatalogError::playlist_not_found(id))
    }
}
