//! src/services/catalog_service.rs
//!
//! MediaCatalog — the single mutation entry point over the audio catalog,
//! playlist store and cover registry. It keeps on-disk blobs and in-memory
//! records consistent under uploads, edits, cover replacement, bulk updates
//! and cascading deletes.
//!
//! All three stores sit behind one `RwLock`. Writers are serialized; readers
//! always observe a state in which every cascade has either fully happened or
//! not at all. Blob payloads are written before the write lock is taken and
//! only published once the write succeeded.

use super::{
    audio_catalog::{AudioCatalog, ensure_audio_mime},
    blob_store::{BlobError, BlobStore, StoredBlob},
    cover_registry::{CoverRegistry, image_extension},
    playlist_store::PlaylistStore,
    probe::probe_audio,
};
use crate::models::{
    cover::{CoverOwner, CoverRef},
    playlist::{Playlist, PlaylistId},
    track::{
        AudioAsset, BulkFailure, BulkUpdate, BulkUpdateOutcome, TrackMetadataPatch, provided,
    },
};
use bytes::Bytes;
use serde::Serialize;
use std::{
    collections::{HashMap, HashSet},
    io,
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::File,
    sync::{RwLock, RwLockWriteGuard},
};
use tracing::{debug, info, warn};

/// What a track delete has already done to dependent state.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CascadeReport {
    pub filename: String,
    /// Playlists the track was removed from.
    pub playlists_updated: Vec<PlaylistId>,
    /// Cover blob released along with the track.
    pub cover_released: Option<String>,
    /// Whether the audio blob itself is gone.
    pub track_removed: bool,
}

/// Tracks and playlists as seen at a single point in time.
#[derive(Serialize, Clone, Debug)]
pub struct CatalogSnapshot {
    pub tracks: Vec<AudioAsset>,
    pub playlists: Vec<Playlist>,
    /// Number of attached cover images.
    pub covers: usize,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{kind} `{id}` not found")]
    NotFound { kind: &'static str, id: String },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unsupported format `{0}`")]
    UnsupportedFormat(String),
    #[error("storage failure while {context}: {source}")]
    StorageFailure {
        context: String,
        #[source]
        source: io::Error,
    },
    #[error("delete of `{}` was only partially applied: {source}", .report.filename)]
    PartialCascade {
        report: CascadeReport,
        #[source]
        source: io::Error,
    },
}

pub type CatalogResult<T> = Result<T, CatalogError>;

impl CatalogError {
    pub fn track_not_found(filename: &str) -> Self {
        Self::NotFound {
            kind: "track",
            id: filename.to_string(),
        }
    }

    pub fn playlist_not_found(id: PlaylistId) -> Self {
        Self::NotFound {
            kind: "playlist",
            id: id.to_string(),
        }
    }

    fn cover_not_found(owner: &CoverOwner) -> Self {
        Self::NotFound {
            kind: "cover",
            id: owner.to_string(),
        }
    }

    /// Map a blob store error, attaching what was being attempted.
    fn storage(context: impl Into<String>, err: BlobError) -> Self {
        let context = context.into();
        match err {
            BlobError::NotFound(name) => Self::NotFound {
                kind: "blob",
                id: name,
            },
            BlobError::InvalidName(name) => {
                Self::InvalidArgument(format!("invalid file name `{}`", name))
            }
            BlobError::NameExhausted(name) => Self::StorageFailure {
                context,
                source: io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("no free name for `{}`", name),
                ),
            },
            BlobError::Io(source) => Self::StorageFailure { context, source },
        }
    }

    fn into_io(self) -> io::Error {
        match self {
            Self::StorageFailure { source, .. } | Self::PartialCascade { source, .. } => source,
            other => io::Error::other(other.to_string()),
        }
    }
}

#[derive(Debug, Default)]
struct CatalogState {
    tracks: AudioCatalog,
    playlists: PlaylistStore,
    covers: CoverRegistry,
}

impl CatalogState {
    fn owner_exists(&self, owner: &CoverOwner) -> bool {
        match owner {
            CoverOwner::Track(filename) => self.tracks.contains(filename),
            CoverOwner::Playlist(id) => self.playlists.contains(*id),
        }
    }

    fn track(&self, filename: &str) -> CatalogResult<AudioAsset> {
        self.tracks
            .snapshot(filename, self.covers.track_cover(filename))
    }

    fn playlist(&self, id: PlaylistId) -> CatalogResult<Playlist> {
        self.playlists.snapshot(id, self.covers.playlist_cover(id))
    }

    fn all_tracks(&self) -> Vec<AudioAsset> {
        let covers = &self.covers;
        self.tracks
            .snapshots(|filename| covers.track_cover(filename))
            .collect()
    }

    fn all_playlists(&self) -> Vec<Playlist> {
        self.playlists
            .ids()
            .filter_map(|id| self.playlist(id).ok())
            .collect()
    }
}

/// Handle to the shared catalog. Cheap to clone.
#[derive(Clone, Debug)]
pub struct MediaCatalog {
    audio: BlobStore,
    images: BlobStore,
    state: Arc<RwLock<CatalogState>>,
}

impl MediaCatalog {
    /// Open the catalog over two content directories and rebuild the track
    /// index from whatever audio blobs are already on disk.
    pub async fn open(audio: BlobStore, images: BlobStore) -> CatalogResult<Self> {
        audio
            .ensure_root()
            .await
            .map_err(|e| CatalogError::storage("creating the music directory", e))?;
        images
            .ensure_root()
            .await
            .map_err(|e| CatalogError::storage("creating the covers directory", e))?;

        let mut tracks = AudioCatalog::default();
        let blobs = audio
            .scan()
            .await
            .map_err(|e| CatalogError::storage("scanning the music directory", e))?;
        for blob in blobs {
            let tags = match audio.path_of(&blob.name) {
                Ok(path) => probe_audio(path).await,
                Err(_) => Default::default(),
            };
            tracks.insert(blob, tags);
        }
        info!(tracks = tracks.len(), "catalog rebuilt from {}", audio.root().display());

        // Cover ownership does not survive a restart, so every image left on
        // disk is unreachable.
        let orphans = images
            .scan()
            .await
            .map_err(|e| CatalogError::storage("scanning the covers directory", e))?;
        for blob in &orphans {
            images.remove(&blob.name).await.map_err(|e| {
                CatalogError::storage(format!("releasing orphaned cover `{}`", blob.name), e)
            })?;
        }
        if !orphans.is_empty() {
            info!(
                covers = orphans.len(),
                "orphaned covers released from {}",
                images.root().display()
            );
        }

        Ok(Self {
            audio,
            images,
            state: Arc::new(RwLock::new(CatalogState {
                tracks,
                ..CatalogState::default()
            })),
        })
    }

    pub fn audio_store(&self) -> &BlobStore {
        &self.audio
    }

    pub fn image_store(&self) -> &BlobStore {
        &self.images
    }

    // ----- tracks -------------------------------------------------------

    /// Tracks and playlists read under one lock acquisition.
    pub async fn snapshot(&self) -> CatalogSnapshot {
        let state = self.state.read().await;
        CatalogSnapshot {
            tracks: state.all_tracks(),
            playlists: state.all_playlists(),
            covers: state.covers.len(),
        }
    }

    /// Consistent snapshot of every track, ordered by filename.
    pub async fn list_tracks(&self) -> Vec<AudioAsset> {
        self.state.read().await.all_tracks()
    }

    pub async fn get_track(&self, filename: &str) -> CatalogResult<AudioAsset> {
        self.state.read().await.track(filename)
    }

    /// Store a new audio blob and publish it as a track.
    ///
    /// The record only becomes visible after the payload is fully on disk.
    pub async fn upload_track(
        &self,
        bytes: Bytes,
        suggested_name: &str,
        mime_type: &str,
    ) -> CatalogResult<AudioAsset> {
        ensure_audio_mime(mime_type)?;

        let blob = self
            .audio
            .write(suggested_name, bytes)
            .await
            .map_err(|e| CatalogError::storage("writing an audio upload", e))?;
        let tags = match self.audio.path_of(&blob.name) {
            Ok(path) => probe_audio(path).await,
            Err(_) => Default::default(),
        };

        let mut state = self.state.write().await;
        let filename = blob.name.clone();
        state.tracks.insert(blob, tags);
        info!(filename = %filename, "track uploaded");
        state.track(&filename)
    }

    pub async fn update_track_metadata(
        &self,
        filename: &str,
        patch: &TrackMetadataPatch,
    ) -> CatalogResult<AudioAsset> {
        let mut state = self.state.write().await;
        state.tracks.update_metadata(filename, patch)?;
        debug!(filename = %filename, "track metadata updated");
        state.track(filename)
    }

    /// Remove a track and everything that depends on it.
    ///
    /// Order: release the cover blob, remove the audio blob, then drop the
    /// record and its playlist memberships. If the audio blob cannot be
    /// removed, the error carries what was already released and the track
    /// stays listed so the delete can be retried.
    pub async fn delete_track(&self, filename: &str) -> CatalogResult<CascadeReport> {
        let mut state = self.state.write().await;
        if !state.tracks.contains(filename) {
            return Err(CatalogError::track_not_found(filename));
        }

        let mut report = CascadeReport {
            filename: filename.to_string(),
            ..CascadeReport::default()
        };

        let owner = CoverOwner::Track(filename.to_string());
        if let Some(cover) = state.covers.cover_of(&owner).map(str::to_string) {
            self.images
                .remove(&cover)
                .await
                .map_err(|e| CatalogError::storage(format!("releasing cover `{}`", cover), e))?;
            state.covers.release(&owner);
            report.cover_released = Some(cover);
        }

        if let Err(err) = self.audio.remove(filename).await {
            warn!(filename = %filename, "audio blob could not be removed: {}", err);
            let source = CatalogError::storage("removing an audio blob", err).into_io();
            return Err(CatalogError::PartialCascade { report, source });
        }
        report.track_removed = true;
        state.tracks.remove(filename);

        for id in state.playlists.containing(filename) {
            state.playlists.remove_track(id, filename)?;
            report.playlists_updated.push(id);
        }

        info!(
            filename = %filename,
            playlists = report.playlists_updated.len(),
            cover_released = report.cover_released.is_some(),
            "track deleted"
        );
        Ok(report)
    }

    pub async fn attach_track_cover(
        &self,
        filename: &str,
        bytes: Bytes,
        mime_type: &str,
    ) -> CatalogResult<CoverRef> {
        let owner = CoverOwner::Track(filename.to_string());
        let (_state, cover) = self.attach_cover(owner.clone(), bytes, mime_type).await?;
        Ok(CoverRef { cover, owner })
    }

    pub async fn detach_track_cover(&self, filename: &str) -> CatalogResult<AudioAsset> {
        let owner = CoverOwner::Track(filename.to_string());
        let mut state = self.state.write().await;
        self.detach_locked(&mut state, &owner).await?;
        state.track(filename)
    }

    /// Apply an artist/album and/or cover change to many tracks.
    ///
    /// Unknown filenames are skipped. Each track either receives every
    /// requested change or none; `updated` counts exactly the tracks that
    /// received them. A new cover wins over `remove_cover`.
    pub async fn bulk_update_tracks(&self, request: BulkUpdate) -> CatalogResult<BulkUpdateOutcome> {
        let artist = provided(request.artist.as_deref()).map(str::to_string);
        let album = provided(request.album.as_deref()).map(str::to_string);
        let cover_ext = match &request.cover {
            Some(cover) => Some(image_extension(&cover.mime_type)?),
            None => None,
        };
        let remove_cover = request.remove_cover && request.cover.is_none();

        let mut seen = HashSet::new();
        let filenames: Vec<String> = request
            .filenames
            .into_iter()
            .filter(|name| seen.insert(name.clone()))
            .collect();
        if filenames.is_empty() {
            return Err(CatalogError::InvalidArgument(
                "at least one filename is required".into(),
            ));
        }
        if artist.is_none() && album.is_none() && request.cover.is_none() && !remove_cover {
            return Err(CatalogError::InvalidArgument(
                "no change requested".into(),
            ));
        }

        let mut outcome = BulkUpdateOutcome::default();
        let present: Vec<String> = {
            let state = self.state.read().await;
            filenames
                .into_iter()
                .filter(|name| {
                    let exists = state.tracks.contains(name);
                    if !exists {
                        outcome.skipped.push(name.clone());
                    }
                    exists
                })
                .collect()
        };

        // Covers are never shared, so every track gets its own copy, staged
        // before the lock is taken.
        let mut staged: HashMap<String, StoredBlob> = HashMap::new();
        if let (Some(cover), Some(ext)) = (&request.cover, cover_ext) {
            for name in &present {
                match self
                    .images
                    .write(&format!("cover-track.{}", ext), cover.bytes.clone())
                    .await
                {
                    Ok(blob) => {
                        staged.insert(name.clone(), blob);
                    }
                    Err(err) => outcome.failed.push(BulkFailure {
                        filename: name.clone(),
                        error: CatalogError::storage("writing a cover image", err).to_string(),
                    }),
                }
            }
        }
        let stage_failed: HashSet<String> =
            outcome.failed.iter().map(|f| f.filename.clone()).collect();

        let mut state = self.state.write().await;
        for name in present {
            if stage_failed.contains(&name) {
                continue;
            }
            if !state.tracks.contains(&name) {
                // Deleted while covers were being staged.
                if let Some(blob) = staged.remove(&name) {
                    self.discard_staged(&blob).await;
                }
                outcome.skipped.push(name);
                continue;
            }

            let owner = CoverOwner::Track(name.clone());
            let cover_step = if let Some(blob) = staged.remove(&name) {
                self.publish_cover_locked(&mut state, owner, blob)
                    .await
                    .map(|_| ())
            } else if remove_cover && state.covers.cover_of(&owner).is_some() {
                self.detach_locked(&mut state, &owner).await
            } else {
                Ok(())
            };
            if let Err(err) = cover_step {
                outcome.failed.push(BulkFailure {
                    filename: name,
                    error: err.to_string(),
                });
                continue;
            }

            state.tracks.update_metadata(
                &name,
                &TrackMetadataPatch {
                    title: None,
                    artist: artist.clone(),
                    album: album.clone(),
                },
            )?;
            outcome.updated += 1;
            outcome.tracks.push(state.track(&name)?);
        }

        info!(
            updated = outcome.updated,
            skipped = outcome.skipped.len(),
            failed = outcome.failed.len(),
            "bulk track update applied"
        );
        Ok(outcome)
    }

    /// Open a track's payload for streaming out.
    pub async fn open_track(&self, filename: &str) -> CatalogResult<(AudioAsset, File, u64)> {
        let asset = self.get_track(filename).await?;
        let (file, size) = self
            .audio
            .open(filename)
            .await
            .map_err(|e| CatalogError::storage("opening an audio blob", e))?;
        Ok((asset, file, size))
    }

    /// Open an attached cover image for streaming out.
    pub async fn open_cover(&self, cover: &str) -> CatalogResult<(File, u64)> {
        if self.state.read().await.covers.owner_of(cover).is_none() {
            return Err(CatalogError::NotFound {
                kind: "cover",
                id: cover.to_string(),
            });
        }
        self.images
            .open(cover)
            .await
            .map_err(|e| CatalogError::storage("opening a cover image", e))
    }

    // ----- playlists ----------------------------------------------------

    pub async fn list_playlists(&self) -> Vec<Playlist> {
        self.state.read().await.all_playlists()
    }

    pub async fn get_playlist(&self, id: PlaylistId) -> CatalogResult<Playlist> {
        self.state.read().await.playlist(id)
    }

    pub async fn create_playlist(&self, name: &str) -> CatalogResult<Playlist> {
        let mut state = self.state.write().await;
        let id = state.playlists.create(name)?;
        info!(playlist_id = %id, "playlist created");
        state.playlist(id)
    }

    pub async fn rename_playlist(&self, id: PlaylistId, name: &str) -> CatalogResult<Playlist> {
        let mut state = self.state.write().await;
        state.playlists.rename(id, name)?;
        state.playlist(id)
    }

    /// Add a track to a playlist. Only existing tracks may be referenced;
    /// adding one that is already present leaves the playlist unchanged.
    pub async fn add_track_to_playlist(
        &self,
        id: PlaylistId,
        filename: &str,
    ) -> CatalogResult<Playlist> {
        let mut state = self.state.write().await;
        if !state.playlists.contains(id) {
            return Err(CatalogError::playlist_not_found(id));
        }
        if !state.tracks.contains(filename) {
            return Err(CatalogError::track_not_found(filename));
        }
        if state.playlists.add_track(id, filename)? {
            debug!(playlist_id = %id, filename = %filename, "track added to playlist");
        }
        state.playlist(id)
    }

    pub async fn remove_track_from_playlist(
        &self,
        id: PlaylistId,
        filename: &str,
    ) -> CatalogResult<Playlist> {
        let mut state = self.state.write().await;
        state.playlists.remove_track(id, filename)?;
        state.playlist(id)
    }

    /// Attach a cover and return the playlist as it looks right after.
    pub async fn attach_playlist_cover(
        &self,
        id: PlaylistId,
        bytes: Bytes,
        mime_type: &str,
    ) -> CatalogResult<Playlist> {
        let (state, _cover) = self
            .attach_cover(CoverOwner::Playlist(id), bytes, mime_type)
            .await?;
        state.playlist(id)
    }

    pub async fn detach_playlist_cover(&self, id: PlaylistId) -> CatalogResult<Playlist> {
        let mut state = self.state.write().await;
        self.detach_locked(&mut state, &CoverOwner::Playlist(id))
            .await?;
        state.playlist(id)
    }

    /// Delete a playlist and release its cover. Tracks are never touched.
    pub async fn delete_playlist(&self, id: PlaylistId) -> CatalogResult<()> {
        let mut state = self.state.write().await;
        if !state.playlists.contains(id) {
            return Err(CatalogError::playlist_not_found(id));
        }
        let owner = CoverOwner::Playlist(id);
        if state.covers.cover_of(&owner).is_some() {
            self.detach_locked(&mut state, &owner).await?;
        }
        state.playlists.remove(id)?;
        info!(playlist_id = %id, "playlist deleted");
        Ok(())
    }

    // ----- covers -------------------------------------------------------

    /// Store `bytes` and publish them as the owner's cover. The write lock
    /// is handed back so callers can snapshot the owner in the same section.
    async fn attach_cover(
        &self,
        owner: CoverOwner,
        bytes: Bytes,
        mime_type: &str,
    ) -> CatalogResult<(RwLockWriteGuard<'_, CatalogState>, String)> {
        let ext = image_extension(mime_type)?;
        if !self.state.read().await.owner_exists(&owner) {
            return Err(owner_not_found(&owner));
        }

        let blob = self
            .images
            .write(&format!("cover-{}.{}", owner.kind(), ext), bytes)
            .await
            .map_err(|e| CatalogError::storage("writing a cover image", e))?;

        let mut state = self.state.write().await;
        if !state.owner_exists(&owner) {
            self.discard_staged(&blob).await;
            return Err(owner_not_found(&owner));
        }
        let cover = self.publish_cover_locked(&mut state, owner.clone(), blob).await?;
        info!(owner = %owner, cover = %cover, mime = %mime_type, "cover attached");
        Ok((state, cover))
    }

    /// Replace the owner's cover with an already stored blob.
    ///
    /// The previous blob is deleted first; if that fails the new blob is
    /// discarded and the old cover stays in place.
    async fn publish_cover_locked(
        &self,
        state: &mut CatalogState,
        owner: CoverOwner,
        blob: StoredBlob,
    ) -> CatalogResult<String> {
        if let Some(previous) = state.covers.cover_of(&owner).map(str::to_string) {
            if let Err(err) = self.images.remove(&previous).await {
                self.discard_staged(&blob).await;
                return Err(CatalogError::storage(
                    format!("releasing previous cover `{}`", previous),
                    err,
                ));
            }
            debug!(owner = %owner, cover = %previous, "previous cover released");
        }
        if let Err(err) = state.covers.bind(owner, blob.name.clone()) {
            self.discard_staged(&blob).await;
            return Err(err);
        }
        Ok(blob.name)
    }

    async fn detach_locked(&self, state: &mut CatalogState, owner: &CoverOwner) -> CatalogResult<()> {
        if !state.owner_exists(owner) {
            return Err(owner_not_found(owner));
        }
        let Some(cover) = state.covers.cover_of(owner).map(str::to_string) else {
            return Err(CatalogError::cover_not_found(owner));
        };
        self.images
            .remove(&cover)
            .await
            .map_err(|e| CatalogError::storage(format!("releasing cover `{}`", cover), e))?;
        state.covers.release(owner);
        debug!(owner = %owner, cover = %cover, "cover detached");
        Ok(())
    }

    async fn discard_staged(&self, blob: &StoredBlob) {
        if let Err(err) = self.images.remove(&blob.name).await {
            warn!("failed to discard staged cover {}: {}", blob.name, err);
        }
    }
}

fn owner_not_found(owner: &CoverOwner) -> CatalogError {
    match owner {
        CoverOwner::Track(filename) => CatalogError::track_not_found(filename),
        CoverOwner::Playlist(id) => CatalogError::playlist_not_found(*id),
    }
}
