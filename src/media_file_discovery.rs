use std::path::{Path, PathBuf};

use log::debug;

pub const SUPPORTED_AUDIO_EXTENSIONS: [&str; 7] =
    ["mp3", "flac", "wav", "ogg", "wma", "aac", "alac"];

pub const SUPPORTED_VIDEO_EXTENSIONS: [&str; 6] = ["mp4", "flv", "mkv", "avi", "mov", "3gp"];

fn has_extension_in(path: &Path, supported: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            supported
                .iter()
                .any(|candidate| ext.eq_ignore_ascii_case(candidate))
        })
        .unwrap_or(false)
}

pub fn is_supported_audio_file(path: &Path) -> bool {
    has_extension_in(path, &SUPPORTED_AUDIO_EXTENSIONS)
}

/// Audio or video: the shapes a remote fetch can drop into the download
/// directory before transcoding.
pub fn is_supported_media_file(path: &Path) -> bool {
    has_extension_in(path, &SUPPORTED_AUDIO_EXTENSIONS)
        || has_extension_in(path, &SUPPORTED_VIDEO_EXTENSIONS)
}

/// Walks a folder tree and returns every playable audio file, sorted for a
/// stable insertion order. Unreadable directories are skipped, not fatal.
pub fn collect_audio_files_from_folder(folder_path: &Path) -> Vec<PathBuf> {
    let mut pending_directories = vec![folder_path.to_path_buf()];
    let mut tracks = Vec::new();

    while let Some(directory) = pending_directories.pop() {
        let entries = match std::fs::read_dir(&directory) {
            Ok(entries) => entries,
            Err(err) => {
                debug!("Failed to read directory {}: {}", directory.display(), err);
                continue;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!(
                        "Failed to read a directory entry in {}: {}",
                        directory.display(),
                        err
                    );
                    continue;
                }
            };

            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(err) => {
                    debug!("Failed to inspect {}: {}", path.display(), err);
                    continue;
                }
            };

            if file_type.is_dir() {
                pending_directories.push(path);
                continue;
            }

            if file_type.is_file() && is_supported_audio_file(&path) {
                tracks.push(path);
            }
        }
    }

    tracks.sort_unstable();
    tracks
}
