//! The line-oriented playlist file format.
//!
//! One song per line:
//! `path::<path>;name::<name>;tags::<tag1>, <tag2>, ...;weight::<int>`
//! Fields split on `;`, key and value split on the first `::`. The format
//! round-trips bit-for-bit through save and load.

use std::path::Path;

use log::{error, warn};

use crate::playlist::{Playlist, Song};

pub const PLAYLIST_EXTENSION: &str = "rpl";

/// Fields recovered from one playlist line before the file is probed.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistEntry {
    pub path: String,
    pub name: String,
    pub tags: Vec<String>,
    pub weight: u32,
}

pub fn format_entry(song: &Song) -> String {
    format!(
        "path::{};name::{};tags::{};weight::{}",
        song.path,
        song.name,
        song.tags.join(", "),
        song.weight
    )
}

/// Parses one line; `None` means the line is malformed and should be
/// skipped.
pub fn parse_line(line: &str) -> Option<PlaylistEntry> {
    let mut path = None;
    let mut name = None;
    let mut tags = Vec::new();
    let mut weight = 1u32;
    for field in line.split(';') {
        let (key, value) = field.split_once("::")?;
        match key {
            "path" => path = Some(value.to_string()),
            "name" => name = Some(value.to_string()),
            "tags" => {
                tags = value
                    .split(", ")
                    .filter(|tag| !tag.is_empty())
                    .map(str::to_string)
                    .collect()
            }
            "weight" => weight = value.parse().ok()?,
            _ => {}
        }
    }
    Some(PlaylistEntry {
        path: path?,
        name: name?,
        tags,
        weight,
    })
}

/// Writes the canonical list, one line per song.
pub fn save(playlist: &Playlist, path: &Path) -> Result<(), String> {
    let mut contents = String::new();
    for song in playlist.iter_all() {
        contents.push_str(&format_entry(song));
        contents.push('\n');
    }
    std::fs::write(path, contents)
        .map_err(|err| format!("failed to write playlist {}: {}", path.display(), err))
}

/// Loads a playlist file into an existing playlist. A malformed line or an
/// entry whose file is gone fails that entry alone; the rest of the file
/// still loads. Returns how many songs were added.
pub fn load_into(playlist: &mut Playlist, path: &Path) -> Result<usize, String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read playlist {}: {}", path.display(), err))?;
    let mut loaded = 0;
    for line in contents.lines() {
        if line.is_empty() {
            continue;
        }
        let Some(entry) = parse_line(line) else {
            warn!("Skipping malformed playlist line: {}", line);
            continue;
        };
        match Song::from_file(&entry.path, Some(entry.name), entry.weight, entry.tags) {
            Ok(song) => {
                playlist.add(song, None);
                loaded += 1;
            }
            Err(err) => error!("Skipping playlist entry: {}", err),
        }
    }
    Ok(loaded)
}
