//! Cover images and the owners they belong to.

use super::playlist::PlaylistId;
use serde::Serialize;
use std::fmt;

/// The single track or playlist a cover blob is attached to.
#[derive(Serialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum CoverOwner {
    Track(String),
    Playlist(PlaylistId),
}

impl CoverOwner {
    pub fn kind(&self) -> &'static str {
        match self {
            CoverOwner::Track(_) => "track",
            CoverOwner::Playlist(_) => "playlist",
        }
    }
}

impl fmt::Display for CoverOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverOwner::Track(filename) => write!(f, "track `{}`", filename),
            CoverOwner::Playlist(id) => write!(f, "playlist {}", id),
        }
    }
}

/// Reference to a stored cover image, returned after an attach.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct CoverRef {
    /// Stored image filename.
    pub cover: String,

    pub owner: CoverOwner,
}
