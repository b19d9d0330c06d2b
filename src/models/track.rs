//! Represents an uploaded audio file and the requests that mutate its metadata.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Artist shown for tracks that have neither tags nor an edited artist.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// A snapshot of a single audio asset.
///
/// The stored filename is the asset's identity. Everything else is derived
/// from the stored blob, optionally refined by embedded tags, and finally
/// overridden by the editable overlay.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AudioAsset {
    /// Generated, immutable stored filename.
    pub filename: String,

    pub title: String,

    pub artist: String,

    /// Empty when unknown.
    pub album: String,

    /// Duration in seconds, `0.0` when the file could not be probed.
    pub duration: f64,

    /// Size of the stored blob in bytes.
    pub size: u64,

    /// MD5 digest of the payload, known for blobs written by this process.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    /// Stored filename of the attached cover image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
}

/// Partial metadata edit for a single track.
///
/// Absent or blank fields leave the current value untouched.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct TrackMetadataPatch {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
}

/// Raw image payload for a cover attachment.
#[derive(Clone, Debug)]
pub struct CoverUpload {
    pub bytes: Bytes,
    pub mime_type: String,
}

/// A metadata and/or cover change applied to many tracks at once.
#[derive(Clone, Debug, Default)]
pub struct BulkUpdate {
    pub filenames: Vec<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// New cover for every named track. Takes precedence over `remove_cover`.
    pub cover: Option<CoverUpload>,
    pub remove_cover: bool,
}

/// A track that existed but could not be updated.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct BulkFailure {
    pub filename: String,
    pub error: String,
}

/// Result of a bulk update.
#[derive(Serialize, Clone, Debug, Default)]
pub struct BulkUpdateOutcome {
    /// Number of tracks on which every requested change was applied.
    pub updated: usize,

    /// Requested filenames that did not name an existing track.
    pub skipped: Vec<String>,

    pub failed: Vec<BulkFailure>,

    /// Snapshots of the updated tracks, in request order.
    pub tracks: Vec<AudioAsset>,
}

/// Returns `value` trimmed, or `None` when it is absent or blank.
pub(crate) fn provided(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Strips the last extension from a filename, keeping dotfiles intact.
pub(crate) fn file_stem(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(0) | None => filename,
        Some(idx) => &filename[..idx],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stem_strips_only_the_last_extension() {
        assert_eq!(file_stem("1700-ab-song.mp3"), "1700-ab-song");
        assert_eq!(file_stem("live.at.home.flac"), "live.at.home");
        assert_eq!(file_stem("noext"), "noext");
        assert_eq!(file_stem(".hidden"), ".hidden");
    }

    #[test]
    fn blank_values_are_not_provided() {
        assert_eq!(provided(None), None);
        assert_eq!(provided(Some("")), None);
        assert_eq!(provided(Some("   ")), None);
        assert_eq!(provided(Some(" Queen ")), Some("Queen"));
    }

    #[test]
    fn snapshot_serializes_camel_case_and_hides_missing_cover() {
        let asset = AudioAsset {
            filename: "1-song.mp3".into(),
            title: "1-song".into(),
            artist: UNKNOWN_ARTIST.into(),
            album: String::new(),
            duration: 0.0,
            size: 3,
            etag: None,
            cover: None,
        };
        let json = serde_json::to_value(&asset).unwrap();
        assert_eq!(json["artist"], "Unknown Artist");
        assert!(json.get("cover").is_none());
        assert!(json.get("etag").is_none());
    }
}
