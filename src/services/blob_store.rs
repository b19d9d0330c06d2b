//! src/services/blob_store.rs
//!
//! BlobStore — flat on-disk byte storage for one content directory. Blobs
//! are addressed by a generated unique name; payloads are streamed to a
//! temporary file, fsynced, and only then linked under their final name so
//! a partial write never becomes visible.

use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut, stream};
use md5::Context;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, warn};
use uuid::Uuid;

const MAX_BLOB_NAME_LEN: usize = 255;
const TMP_PREFIX: &str = ".tmp-";
const NAME_ATTEMPTS: usize = 8;
const FALLBACK_NAME: &str = "upload";

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob `{0}` not found")]
    NotFound(String),
    #[error("invalid blob name `{0}`")]
    InvalidName(String),
    #[error("could not allocate a unique name for `{0}`")]
    NameExhausted(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type BlobResult<T> = Result<T, BlobError>;

/// A blob as it exists on disk.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredBlob {
    pub name: String,
    pub size: u64,
    /// MD5 of the payload; only known for blobs written by this process.
    pub etag: Option<String>,
}

/// Byte storage rooted at a single directory.
#[derive(Clone, Debug)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the content directory if it does not exist yet.
    pub async fn ensure_root(&self) -> BlobResult<()> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Resolve a blob name to its payload path, rejecting traversal attempts.
    pub fn path_of(&self, name: &str) -> BlobResult<PathBuf> {
        ensure_name_safe(name)?;
        Ok(self.root.join(name))
    }

    /// Store an in-memory payload under a name derived from `suggested`.
    pub async fn write(&self, suggested: &str, bytes: Bytes) -> BlobResult<StoredBlob> {
        self.write_stream(suggested, stream::once(async move { Ok(bytes) }))
            .await
    }

    /// Stream a payload to disk and link it under a freshly generated name.
    ///
    /// - Writes chunks incrementally to a temporary file.
    /// - Computes MD5 and size while streaming.
    /// - Hard-links into the final location, which fails instead of
    ///   overwriting when the generated name is already taken.
    ///
    /// Cleans up the temporary file on every error path.
    pub async fn write_stream<S>(&self, suggested: &str, stream: S) -> BlobResult<StoredBlob>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        fs::create_dir_all(&self.root).await?;
        let tmp_path = self.root.join(format!("{}{}", TMP_PREFIX, Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size: u64 = 0;
        let mut digest = Context::new();
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(BlobError::Io(err));
                }
            };
            size += chunk.len() as u64;
            digest.consume(&chunk);
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(BlobError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(BlobError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(BlobError::Io(err));
        }
        drop(file);

        let name = match self.link_unique(&tmp_path, suggested).await {
            Ok(name) => name,
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(err);
            }
        };
        if let Err(err) = fs::remove_file(&tmp_path).await {
            warn!("failed to remove staging file {}: {}", tmp_path.display(), err);
        }

        Ok(StoredBlob {
            name,
            size,
            etag: Some(format!("{:x}", digest.compute())),
        })
    }

    async fn link_unique(&self, tmp_path: &Path, suggested: &str) -> BlobResult<String> {
        for _ in 0..NAME_ATTEMPTS {
            let name = generate_name(suggested);
            match fs::hard_link(tmp_path, self.root.join(&name)).await {
                Ok(()) => return Ok(name),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    debug!("generated name {} already taken, retrying", name);
                }
                Err(err) => return Err(BlobError::Io(err)),
            }
        }
        Err(BlobError::NameExhausted(suggested.to_string()))
    }

    /// Open a blob for streaming out, together with its current size.
    pub async fn open(&self, name: &str) -> BlobResult<(File, u64)> {
        let path = self.path_of(name)?;
        let file = File::open(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                BlobError::NotFound(name.to_string())
            } else {
                BlobError::Io(err)
            }
        })?;
        let size = file.metadata().await?.len();
        Ok((file, size))
    }

    /// Remove a blob payload. A payload that is already gone counts as removed.
    pub async fn remove(&self, name: &str) -> BlobResult<()> {
        let path = self.path_of(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => debug!("removed blob {}", path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("blob {} already missing", path.display());
            }
            Err(err) => return Err(BlobError::Io(err)),
        }
        Ok(())
    }

    /// Enumerate every blob currently in the content directory.
    ///
    /// Hidden files and subdirectories are ignored; leftover staging files
    /// from an interrupted write are removed.
    pub async fn scan(&self) -> BlobResult<Vec<StoredBlob>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(BlobError::Io(err)),
        };

        let mut blobs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                debug!("skipping non UTF-8 entry {}", entry.path().display());
                continue;
            };
            if name.starts_with(TMP_PREFIX) {
                if let Err(err) = fs::remove_file(entry.path()).await {
                    warn!("failed to remove stale staging file {}: {}", name, err);
                }
                continue;
            }
            if name.starts_with('.') || ensure_name_safe(&name).is_err() {
                continue;
            }
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            blobs.push(StoredBlob {
                name,
                size: meta.len(),
                etag: None,
            });
        }
        blobs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(blobs)
    }

    /// Best-effort write/read/delete round trip used by the readiness probe.
    pub async fn probe_writable(&self) -> Result<(), String> {
        let tmp_path = self.root.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&tmp_path, b"readyz")
            .await
            .map_err(|e| format!("could not write tmp file: {}", e))?;
        let result = match fs::read(&tmp_path).await {
            Ok(bytes) if bytes == b"readyz" => Ok(()),
            Ok(_) => Err("file content mismatch".to_string()),
            Err(e) => Err(format!("could not read tmp file: {}", e)),
        };
        let _ = fs::remove_file(&tmp_path).await;
        result
    }
}

/// Reject names that could escape the content directory.
pub fn ensure_name_safe(name: &str) -> BlobResult<()> {
    let invalid = name.is_empty()
        || name.len() > MAX_BLOB_NAME_LEN
        || name == "."
        || name.contains("..")
        || name
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'/' || b == b'\\');
    if invalid {
        return Err(BlobError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Build `<unix-millis>-<8 random hex>-<sanitised suggestion>`.
///
/// Overlong suggestions lose the end of their stem, never their extension.
fn generate_name(suggested: &str) -> String {
    let token = Uuid::new_v4().simple().to_string();
    let prefix = format!("{}-{}-", Utc::now().timestamp_millis(), &token[..8]);
    let budget = MAX_BLOB_NAME_LEN.saturating_sub(prefix.len());
    format!("{}{}", prefix, fit_name(sanitize(suggested), budget))
}

fn fit_name(name: String, max: usize) -> String {
    if name.len() <= max {
        return name;
    }
    match name.rfind('.') {
        Some(idx) if idx > 0 && name.len() - idx < max => {
            let ext = name[idx..].to_string();
            let mut stem = truncate_to_boundary(name[..idx].to_string(), max - ext.len());
            stem.push_str(&ext);
            stem
        }
        _ => truncate_to_boundary(name, max),
    }
}

/// Reduce a client-supplied name to a safe last path component.
fn sanitize(suggested: &str) -> String {
    let last = suggested
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(suggested);
    let mut cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    while cleaned.contains("..") {
        cleaned = cleaned.replace("..", ".");
    }
    let cleaned = cleaned.trim().trim_start_matches('.');
    if cleaned.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

fn truncate_to_boundary(mut name: String, max: usize) -> String {
    if name.len() > max {
        let mut end = max;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        name.truncate(end);
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, BlobStore) {
        let dir = TempDir::new().unwrap();
        let store = BlobStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn sanitize_keeps_only_the_last_component() {
        assert_eq!(sanitize("song.mp3"), "song.mp3");
        assert_eq!(sanitize("../../etc/passwd"), "passwd");
        assert_eq!(sanitize("C:\\music\\track.flac"), "track.flac");
        assert_eq!(sanitize("a..b.mp3"), "a.b.mp3");
        assert_eq!(sanitize("a...b.mp3"), "a.b.mp3");
        assert_eq!(sanitize("   "), FALLBACK_NAME);
        assert_eq!(sanitize(".."), FALLBACK_NAME);
    }

    #[test]
    fn generated_names_are_safe_and_distinct() {
        let a = generate_name("song.mp3");
        let b = generate_name("song.mp3");
        assert_ne!(a, b);
        assert!(a.ends_with("-song.mp3"));
        ensure_name_safe(&a).unwrap();
        let long = generate_name(&"é".repeat(400));
        assert!(long.len() <= MAX_BLOB_NAME_LEN);
        ensure_name_safe(&long).unwrap();
    }

    #[test]
    fn overlong_names_keep_their_extension() {
        let name = generate_name(&format!("{}.flac", "é".repeat(300)));
        assert!(name.len() <= MAX_BLOB_NAME_LEN);
        assert!(name.ends_with("é.flac"));
        ensure_name_safe(&name).unwrap();

        assert_eq!(fit_name("abcdef.mp3".into(), 8), "abcd.mp3");
        assert_eq!(fit_name("short.mp3".into(), 20), "short.mp3");
        assert_eq!(fit_name("noextension".into(), 4), "noex");
        assert_eq!(fit_name("a.verylongextension".into(), 6), "a.very");
    }

    #[test]
    fn unsafe_names_are_rejected() {
        for name in ["", ".", "../x", "a/b", "a\\b", "nul\0", "tab\tname"] {
            assert!(matches!(
                ensure_name_safe(name),
                Err(BlobError::InvalidName(_))
            ));
        }
    }

    #[tokio::test]
    async fn write_publishes_payload_and_leaves_no_staging_file() {
        let (_dir, store) = store();
        let blob = store
            .write("song.mp3", Bytes::from_static(b"abc"))
            .await
            .unwrap();
        assert_eq!(blob.size, 3);
        assert_eq!(blob.etag.as_deref(), Some("900150983cd24fb0d6963f7d28e17f72"));

        let on_disk = fs::read(store.root().join(&blob.name)).await.unwrap();
        assert_eq!(on_disk, b"abc");
        assert_eq!(store.scan().await.unwrap(), vec![StoredBlob {
            name: blob.name.clone(),
            size: 3,
            etag: None,
        }]);
    }

    #[tokio::test]
    async fn failed_stream_publishes_nothing() {
        let (_dir, store) = store();
        let chunks = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::other("client went away")),
        ]);
        let err = store.write_stream("song.mp3", chunks).await.unwrap_err();
        assert!(matches!(err, BlobError::Io(_)));

        let mut entries = fs::read_dir(store.root()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_is_tolerant_of_missing_payloads() {
        let (_dir, store) = store();
        let blob = store.write("a.png", Bytes::from_static(b"x")).await.unwrap();
        store.remove(&blob.name).await.unwrap();
        store.remove(&blob.name).await.unwrap();
        assert!(matches!(
            store.open(&blob.name).await,
            Err(BlobError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn scan_skips_hidden_entries_and_purges_stale_staging_files() {
        let (dir, store) = store();
        fs::write(dir.path().join(".tmp-stale"), b"junk").await.unwrap();
        fs::write(dir.path().join(".DS_Store"), b"junk").await.unwrap();
        fs::create_dir(dir.path().join("nested")).await.unwrap();
        fs::write(dir.path().join("1-track.wav"), b"wave").await.unwrap();

        let blobs = store.scan().await.unwrap();
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].name, "1-track.wav");
        assert!(!dir.path().join(".tmp-stale").exists());
    }

    #[tokio::test]
    async fn scan_of_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = BlobStore::new(dir.path().join("absent"));
        assert!(store.scan().await.unwrap().is_empty());
    }
}
