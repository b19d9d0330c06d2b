//! Best-effort audio property and tag reader built on `lofty`.

use lofty::file::{AudioFile, TaggedFileExt};
use lofty::tag::Accessor;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Whatever could be learned from the file itself.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProbedTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Seconds, `0.0` when unknown.
    pub duration: f64,
}

/// Probe a stored audio file on the blocking pool.
///
/// Never fails: unreadable or unrecognised files yield empty tags and a
/// zero duration.
pub async fn probe_audio(path: PathBuf) -> ProbedTags {
    match tokio::task::spawn_blocking(move || probe_blocking(&path)).await {
        Ok(tags) => tags,
        Err(err) => {
            debug!("audio probe task failed: {}", err);
            ProbedTags::default()
        }
    }
}

fn probe_blocking(path: &Path) -> ProbedTags {
    let tagged = match lofty::read_from_path(path) {
        Ok(tagged) => tagged,
        Err(err) => {
            debug!("no readable audio properties in {}: {}", path.display(), err);
            return ProbedTags::default();
        }
    };

    let mut probed = ProbedTags {
        duration: tagged.properties().duration().as_secs_f64(),
        ..ProbedTags::default()
    };
    if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
        probed.title = non_blank(tag.title().as_deref());
        probed.artist = non_blank(tag.artist().as_deref());
        probed.album = non_blank(tag.album().as_deref());
    }
    probed
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
