//! Title/duration probing for local audio files.

use std::path::Path;

use lofty::file::{AudioFile, TaggedFileExt};
use lofty::prelude::Accessor;
use lofty::read_from_path;

/// The two fields the playlist derives from a file at song creation.
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub title: Option<String>,
    pub duration_secs: f64,
}

/// Reads title and duration from an audio file. Failure here fails the one
/// song being created, never a whole batch.
pub fn probe_file(path: &Path) -> Result<FileMetadata, String> {
    let tagged = read_from_path(path)
        .map_err(|err| format!("failed to read metadata from {}: {}", path.display(), err))?;
    let title = tagged
        .primary_tag()
        .or_else(|| tagged.first_tag())
        .and_then(|tag| tag.title().map(|title| title.into_owned()))
        .filter(|title| !title.is_empty());
    let duration_secs = tagged.properties().duration().as_secs_f64();
    Ok(FileMetadata {
        title,
        duration_secs,
    })
}
