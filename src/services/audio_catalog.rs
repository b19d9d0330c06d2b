//! In-memory index of stored audio blobs and their editable metadata overlay.
//!
//! The index mirrors the audio content directory: an entry exists exactly
//! while its blob does. Snapshots merge three layers, weakest first:
//! filename-derived defaults, embedded tags, and the user overlay.

use super::blob_store::StoredBlob;
use super::catalog_service::{CatalogError, CatalogResult};
use super::probe::ProbedTags;
use crate::models::track::{AudioAsset, TrackMetadataPatch, UNKNOWN_ARTIST, file_stem, provided};
use std::collections::BTreeMap;

const AUDIO_MIME_TYPES: [&str; 6] = [
    "audio/mpeg",
    "audio/wav",
    "audio/mp3",
    "audio/flac",
    "audio/x-wav",
    "audio/x-flac",
];

/// Validate an upload's MIME hint against the audio allow-list.
///
/// Parameters such as `; codecs=...` are ignored; comparison is case-insensitive.
pub fn ensure_audio_mime(mime_type: &str) -> CatalogResult<()> {
    let essence = mime_type.split(';').next().unwrap_or("").trim();
    if AUDIO_MIME_TYPES
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(essence))
    {
        Ok(())
    } else {
        Err(CatalogError::UnsupportedFormat(mime_type.to_string()))
    }
}

#[derive(Clone, Debug, Default)]
struct Overlay {
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
}

#[derive(Clone, Debug)]
struct TrackEntry {
    blob: StoredBlob,
    tags: ProbedTags,
    overlay: Overlay,
}

impl TrackEntry {
    fn snapshot(&self, cover: Option<&str>) -> AudioAsset {
        let title = self
            .overlay
            .title
            .as_deref()
            .or(self.tags.title.as_deref())
            .unwrap_or_else(|| file_stem(&self.blob.name));
        let artist = self
            .overlay
            .artist
            .as_deref()
            .or(self.tags.artist.as_deref())
            .unwrap_or(UNKNOWN_ARTIST);
        let album = self
            .overlay
            .album
            .as_deref()
            .or(self.tags.album.as_deref())
            .unwrap_or_default();

        AudioAsset {
            filename: self.blob.name.clone(),
            title: title.to_string(),
            artist: artist.to_string(),
            album: album.to_string(),
            duration: self.tags.duration,
            size: self.blob.size,
            etag: self.blob.etag.clone(),
            cover: cover.map(str::to_string),
        }
    }
}

/// Track records keyed by stored filename.
///
/// The filename is only ever used as an opaque map key here.
#[derive(Debug, Default)]
pub struct AudioCatalog {
    tracks: BTreeMap<String, TrackEntry>,
}

impl AudioCatalog {
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.tracks.contains_key(filename)
    }

    /// Publish a freshly stored blob with an empty overlay.
    pub fn insert(&mut self, blob: StoredBlob, tags: ProbedTags) {
        self.tracks.insert(
            blob.name.clone(),
            TrackEntry {
                blob,
                tags,
                overlay: Overlay::default(),
            },
        );
    }

    pub fn snapshot(&self, filename: &str, cover: Option<&str>) -> CatalogResult<AudioAsset> {
        self.tracks
            .get(filename)
            .map(|entry| entry.snapshot(cover))
            .ok_or_else(|| CatalogError::track_not_found(filename))
    }

    /// Snapshots of every track in filename order. `cover_of` supplies the
    /// cover reference for each filename.
    pub fn snapshots<'a, F>(&'a self, cover_of: F) -> impl Iterator<Item = AudioAsset> + 'a
    where
        F: Fn(&str) -> Option<&'a str> + 'a,
    {
        self.tracks
            .iter()
            .map(move |(filename, entry)| entry.snapshot(cover_of(filename)))
    }

    /// Merge the provided fields into the overlay; blank fields are ignored.
    pub fn update_metadata(
        &mut self,
        filename: &str,
        patch: &TrackMetadataPatch,
    ) -> CatalogResult<()> {
        let entry = self
            .tracks
            .get_mut(filename)
            .ok_or_else(|| CatalogError::track_not_found(filename))?;
        if let Some(title) = provided(patch.title.as_deref()) {
            entry.overlay.title = Some(title.to_string());
        }
        if let Some(artist) = provided(patch.artist.as_deref()) {
            entry.overlay.artist = Some(artist.to_string());
        }
        if let Some(album) = provided(patch.album.as_deref()) {
            entry.overlay.album = Some(album.to_string());
        }
        Ok(())
    }

    /// Drop the record and its overlay, returning the stored blob facts.
    pub fn remove(&mut self, filename: &str) -> Option<StoredBlob> {
        self.tracks.remove(filename).map(|entry| entry.blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(name: &str) -> StoredBlob {
        StoredBlob {
            name: name.to_string(),
            size: 42,
            etag: None,
        }
    }

    #[test]
    fn audio_allow_list() {
        for ok in ["audio/mpeg", "AUDIO/FLAC", "audio/wav; rate=44100", "audio/mp3"] {
            ensure_audio_mime(ok).unwrap();
        }
        for bad in ["audio/ogg", "video/mp4", "image/png", ""] {
            assert!(matches!(
                ensure_audio_mime(bad),
                Err(CatalogError::UnsupportedFormat(_))
            ));
        }
    }

    #[test]
    fn defaults_come_from_the_filename() {
        let mut catalog = AudioCatalog::default();
        catalog.insert(blob("17-ab12cd34-song.mp3"), ProbedTags::default());

        let asset = catalog.snapshot("17-ab12cd34-song.mp3", None).unwrap();
        assert_eq!(asset.title, "17-ab12cd34-song");
        assert_eq!(asset.artist, UNKNOWN_ARTIST);
        assert_eq!(asset.album, "");
        assert_eq!(asset.size, 42);
        assert_eq!(asset.cover, None);
    }

    #[test]
    fn overlay_wins_over_tags_which_win_over_defaults() {
        let mut catalog = AudioCatalog::default();
        catalog.insert(blob("a.flac"), ProbedTags {
            title: Some("Tagged".into()),
            artist: Some("Tag Artist".into()),
            album: None,
            duration: 61.5,
        });

        let asset = catalog.snapshot("a.flac", Some("c.png")).unwrap();
        assert_eq!(asset.title, "Tagged");
        assert_eq!(asset.artist, "Tag Artist");
        assert_eq!(asset.duration, 61.5);
        assert_eq!(asset.cover.as_deref(), Some("c.png"));

        catalog
            .update_metadata("a.flac", &TrackMetadataPatch {
                title: None,
                artist: Some("Edited".into()),
                album: Some("Live".into()),
            })
            .unwrap();
        let asset = catalog.snapshot("a.flac", None).unwrap();
        assert_eq!(asset.title, "Tagged");
        assert_eq!(asset.artist, "Edited");
        assert_eq!(asset.album, "Live");
    }

    #[test]
    fn blank_patch_fields_leave_values_untouched() {
        let mut catalog = AudioCatalog::default();
        catalog.insert(blob("a.mp3"), ProbedTags::default());
        catalog
            .update_metadata("a.mp3", &TrackMetadataPatch {
                title: Some("Title".into()),
                artist: Some("Artist".into()),
                album: Some("Album".into()),
            })
            .unwrap();
        catalog
            .update_metadata("a.mp3", &TrackMetadataPatch {
                title: Some("  ".into()),
                artist: Some(String::new()),
                album: None,
            })
            .unwrap();

        let asset = catalog.snapshot("a.mp3", None).unwrap();
        assert_eq!(
            (asset.title.as_str(), asset.artist.as_str(), asset.album.as_str()),
            ("Title", "Artist", "Album")
        );
    }

    #[test]
    fn unknown_track_is_not_found() {
        let mut catalog = AudioCatalog::default();
        assert!(matches!(
            catalog.update_metadata("nope.mp3", &TrackMetadataPatch::default()),
            Err(CatalogError::NotFound { .. })
        ));
        assert!(catalog.remove("nope.mp3").is_none());
    }

    #[test]
    fn snapshots_are_ordered_and_restartable() {
        let mut catalog = AudioCatalog::default();
        catalog.insert(blob("b.mp3"), ProbedTags::default());
        catalog.insert(blob("a.mp3"), ProbedTags::default());

        let names = |c: &AudioCatalog| {
            c.snapshots(|_| None)
                .map(|a| a.filename)
                .collect::<Vec<_>>()
        };
        assert_eq!(names(&catalog), vec!["a.mp3", "b.mp3"]);
        assert_eq!(names(&catalog), vec!["a.mp3", "b.mp3"]);
        assert_eq!(catalog.len(), 2);
    }
}
