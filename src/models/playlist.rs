//! User playlists: ordered, duplicate-free lists of track filenames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Opaque playlist identifier, allocated from a process-wide counter.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct PlaylistId(pub u64);

impl fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PlaylistId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// A snapshot of a playlist.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: PlaylistId,

    /// Non-blank display name.
    pub name: String,

    /// Stored track filenames in insertion order, without duplicates.
    pub tracks: Vec<String>,

    /// Stored filename of the attached cover image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,

    pub created_at: DateTime<Utc>,
}
