//! Persistent application configuration.
//!
//! The on-disk format is one `key:value` pair per line with the first `:`
//! as the separator. The `downloadconfig` value packs the download dialog
//! defaults as a `;`-joined list of `k:v` pairs, and `folders` is a
//! `;`-joined list of file-dialog shortcut directories.

use std::path::Path;

use log::warn;

use crate::protocol::LoopMode;

/// Root configuration persisted to `config.txt`.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory transcoded songs land in.
    pub song_dir: String,
    /// Directory remote fetches download into before transcoding.
    pub download_dir: String,
    /// Extra directories offered as file-dialog shortcuts.
    pub folders: Vec<String>,
    pub loop_mode: LoopMode,
    /// Last playlist file used by save/load.
    pub save_dir: String,
    pub download: DownloadDefaults,
}

/// Remembered values for the download dialog.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadDefaults {
    pub url: String,
    pub name: String,
    pub start: String,
    pub end: String,
    pub tags: String,
    pub file_type: String,
    pub fetch_args: String,
    pub input_args: String,
    pub output_args: String,
    pub weight: u32,
    pub delete_source: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            song_dir: "music/".to_string(),
            download_dir: "downloads/".to_string(),
            folders: Vec::new(),
            loop_mode: LoopMode::ListLoop,
            save_dir: String::new(),
            download: DownloadDefaults::default(),
        }
    }
}

impl Default for DownloadDefaults {
    fn default() -> DownloadDefaults {
        DownloadDefaults {
            url: String::new(),
            name: String::new(),
            start: String::new(),
            end: String::new(),
            tags: String::new(),
            file_type: "mp3".to_string(),
            fetch_args: String::new(),
            input_args: String::new(),
            output_args: String::new(),
            weight: 1,
            delete_source: true,
        }
    }
}

impl DownloadDefaults {
    /// Renders the `;`-joined blob stored under the `downloadconfig` key.
    pub fn to_blob(&self) -> String {
        [
            format!("url:{}", self.url),
            format!("name:{}", self.name),
            format!("start:{}", self.start),
            format!("end:{}", self.end),
            format!("tags:{}", self.tags),
            format!("ftype:{}", self.file_type),
            format!("yargs:{}", self.fetch_args),
            format!("fiargs:{}", self.input_args),
            format!("foargs:{}", self.output_args),
            format!("weight:{}", self.weight),
            format!("deletevid:{}", self.delete_source),
        ]
        .join(";")
    }

    pub fn from_blob(blob: &str) -> DownloadDefaults {
        let mut defaults = DownloadDefaults::default();
        for pair in blob.split(';') {
            let Some((key, value)) = pair.split_once(':') else {
                continue;
            };
            match key {
                "url" => defaults.url = value.to_string(),
                "name" => defaults.name = value.to_string(),
                "start" => defaults.start = value.to_string(),
                "end" => defaults.end = value.to_string(),
                "tags" => defaults.tags = value.to_string(),
                "ftype" => defaults.file_type = value.to_string(),
                "yargs" => defaults.fetch_args = value.to_string(),
                "fiargs" => defaults.input_args = value.to_string(),
                "foargs" => defaults.output_args = value.to_string(),
                "weight" => defaults.weight = value.parse().unwrap_or(1),
                "deletevid" => defaults.delete_source = value == "true" || value == "True",
                _ => {}
            }
        }
        defaults
    }
}

impl Config {
    pub fn parse(contents: &str) -> Config {
        let mut config = Config::default();
        for line in contents.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            match key {
                "songdir" => config.song_dir = value.to_string(),
                "downloaddir" => config.download_dir = value.to_string(),
                "downloadconfig" => config.download = DownloadDefaults::from_blob(value),
                "folders" => {
                    config.folders = value
                        .split(';')
                        .filter(|folder| !folder.is_empty())
                        .map(str::to_string)
                        .collect()
                }
                "loopmode" => {
                    config.loop_mode = value
                        .parse()
                        .ok()
                        .and_then(LoopMode::from_index)
                        .unwrap_or_else(|| {
                            warn!("Unknown loopmode value in config: {}", value);
                            LoopMode::ListLoop
                        })
                }
                "savedir" => config.save_dir = value.to_string(),
                other => warn!("Ignoring unknown config key: {}", other),
            }
        }
        config
    }

    pub fn render(&self) -> String {
        format!(
            "songdir:{}\ndownloaddir:{}\ndownloadconfig:{}\nfolders:{}\nloopmode:{}\nsavedir:{}\n",
            self.song_dir,
            self.download_dir,
            self.download.to_blob(),
            self.folders.join(";"),
            self.loop_mode.index(),
            self.save_dir,
        )
    }
}

pub fn load(path: &Path) -> Result<Config, String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {}", path.display(), err))?;
    Ok(Config::parse(&contents))
}

pub fn save(path: &Path, config: &Config) -> Result<(), String> {
    std::fs::write(path, config.render())
        .map_err(|err| format!("failed to write config {}: {}", path.display(), err))
}

/// Rewrites a single key in place, appending it when missing. Lines for
/// other keys pass through untouched, so concurrent hand edits survive.
pub fn edit_key(path: &Path, key: &str, value: &str) -> Result<(), String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {}", path.display(), err))?;
    let prefix = format!("{}:", key);
    let mut found = false;
    let mut lines: Vec<String> = contents
        .lines()
        .map(|line| {
            if line.starts_with(&prefix) {
                found = true;
                format!("{}{}", prefix, value)
            } else {
                line.to_string()
            }
        })
        .collect();
    if !found {
        lines.push(format!("{}{}", prefix, value));
    }
    let mut rendered = lines.join("\n");
    rendered.push('\n');
    std::fs::write(path, rendered)
        .map_err(|err| format!("failed to write config {}: {}", path.display(), err))
}
