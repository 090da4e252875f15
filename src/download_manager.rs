use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};
use tokio::sync::broadcast::{Receiver, Sender};

use crate::config::{self, DownloadDefaults};
use crate::media_file_discovery::is_supported_media_file;
use crate::protocol::{ConfigMessage, DownloadMessage, DownloadRequest, Message};

/// Characters the target filesystem cannot take in a file name.
const FORBIDDEN_NAME_CHARS: [char; 9] = [':', '*', '/', '\\', '<', '>', '|', '"', '?'];

/// A request that passed validation, with argument strings tokenized.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchJob {
    pub url: String,
    pub name: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub tags: Vec<String>,
    pub file_type: String,
    pub fetch_args: Vec<String>,
    pub input_args: Vec<String>,
    pub output_args: Vec<String>,
    pub weight: u32,
    pub delete_source: bool,
}

/// Strips characters that cannot appear in the output file name.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .filter(|ch| !FORBIDDEN_NAME_CHARS.contains(ch))
        .collect()
}

/// Accepts an empty string (no trim) or an `m:ss` time code.
pub fn parse_timecode(text: &str) -> Result<Option<String>, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() != 2 || parts.iter().any(|part| part.parse::<u32>().is_err()) {
        return Err(format!("invalid time code: {}", trimmed));
    }
    Ok(Some(trimmed.to_string()))
}

/// Splits a user-entered argument string on spaces, honoring double quotes
/// and `\"` escapes. Unbalanced quotes reject the whole request.
pub fn parse_extra_args(text: &str) -> Result<Vec<String>, String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;
    for ch in text.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '"' => in_quotes = !in_quotes,
            ' ' if !in_quotes => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }
    if in_quotes {
        return Err("unbalanced quotation marks in extra arguments".to_string());
    }
    if escaped {
        current.push('\\');
    }
    if !current.is_empty() {
        args.push(current);
    }
    Ok(args)
}

/// Validates a raw request into a runnable job without touching any state.
pub fn validate_request(request: &DownloadRequest) -> Result<FetchJob, String> {
    let name = sanitize_name(request.name.trim());
    if name.is_empty() {
        return Err("no song name entered".to_string());
    }
    if request.url.trim().is_empty() {
        return Err("no URL entered".to_string());
    }
    Ok(FetchJob {
        url: request.url.trim().to_string(),
        name,
        start: parse_timecode(&request.start)?,
        end: parse_timecode(&request.end)?,
        tags: request.tags.clone(),
        file_type: request.file_type.clone(),
        fetch_args: parse_extra_args(&request.fetch_args)?,
        input_args: parse_extra_args(&request.input_args)?,
        output_args: parse_extra_args(&request.output_args)?,
        weight: request.weight.max(1),
        delete_source: request.delete_source,
    })
}

// Fetches remote media into the library. Each accepted request runs on its
// own worker thread to completion; completed work comes back to the playlist
// thread as a bus message, never as a direct mutation.
pub struct DownloadManager {
    bus_consumer: Receiver<Message>,
    bus_producer: Sender<Message>,
    song_dir: String,
    download_dir: String,
    config_path: PathBuf,
    workers: Vec<JoinHandle<()>>,
}

impl DownloadManager {
    pub fn new(
        bus_consumer: Receiver<Message>,
        bus_producer: Sender<Message>,
        config_path: PathBuf,
    ) -> Self {
        Self {
            bus_consumer,
            bus_producer,
            song_dir: String::new(),
            download_dir: String::new(),
            config_path,
            workers: Vec::new(),
        }
    }

    pub fn run(&mut self) {
        while let Ok(message) = self.bus_consumer.blocking_recv() {
            match message {
                Message::Download(DownloadMessage::Request(request)) => {
                    self.handle_request(request);
                }
                Message::Config(ConfigMessage::ConfigChanged(config)) => {
                    self.song_dir = config.song_dir;
                    self.download_dir = config.download_dir;
                }
                _ => {}
            }
        }
    }

    fn handle_request(&mut self, request: DownloadRequest) {
        let job = match validate_request(&request) {
            Ok(job) => job,
            Err(reason) => {
                warn!("DownloadManager: rejecting request: {}", reason);
                let _ = self
                    .bus_producer
                    .send(Message::Download(DownloadMessage::Rejected(reason)));
                return;
            }
        };

        if request.save_defaults {
            self.persist_defaults(&request);
        }

        self.reap_finished_workers();

        debug!("DownloadManager: starting fetch of {}", job.url);
        let song_dir = self.song_dir.clone();
        let download_dir = self.download_dir.clone();
        let bus_producer = self.bus_producer.clone();
        self.workers.push(thread::spawn(move || {
            execute_fetch(job, &song_dir, &download_dir, &bus_producer);
        }));
    }

    fn persist_defaults(&self, request: &DownloadRequest) {
        let defaults = DownloadDefaults {
            url: request.url.clone(),
            name: request.name.clone(),
            start: request.start.clone(),
            end: request.end.clone(),
            tags: request.tags.join(","),
            file_type: request.file_type.clone(),
            fetch_args: request.fetch_args.clone(),
            input_args: request.input_args.clone(),
            output_args: request.output_args.clone(),
            weight: request.weight,
            delete_source: request.delete_source,
        };
        if let Err(err) = config::edit_key(&self.config_path, "downloadconfig", &defaults.to_blob())
        {
            error!("Failed to persist download defaults: {}", err);
        }
    }

    fn reap_finished_workers(&mut self) {
        let before = self.workers.len();
        self.workers.retain(|worker| !worker.is_finished());
        let reaped = before - self.workers.len();
        if reaped > 0 {
            debug!("DownloadManager: reaped {} finished workers", reaped);
        }
    }
}

fn execute_fetch(job: FetchJob, song_dir: &str, download_dir: &str, bus: &Sender<Message>) {
    let fail = |reason: String| {
        error!("Download failed for {}: {}", job.url, reason);
        let _ = bus.send(Message::Download(DownloadMessage::Failed {
            url: job.url.clone(),
            reason,
        }));
    };

    let files_before = list_dir(download_dir);
    let output_template = format!(
        "{}/{}.%(ext)s",
        download_dir.trim_end_matches('/'),
        job.name
    );
    let mut fetch = Command::new("yt-dlp");
    fetch
        .args(&job.fetch_args)
        .args(["--no-playlist", "-o", &output_template])
        .arg(&job.url);
    match fetch.output() {
        Ok(output) if output.status.success() => {}
        Ok(output) => {
            return fail(String::from_utf8_lossy(&output.stderr).trim().to_string());
        }
        Err(err) => return fail(format!("could not run yt-dlp: {}", err)),
    }

    let Some(source) = find_downloaded_file(download_dir, &job.name, &files_before) else {
        return fail("fetch produced no media file".to_string());
    };

    let target = format!(
        "{}/{}.{}",
        song_dir.trim_end_matches('/'),
        job.name,
        job.file_type
    );
    let mut transcode = Command::new("ffmpeg");
    transcode.arg("-y").args(&job.input_args);
    if let Some(start) = &job.start {
        transcode.args(["-ss", start]);
    }
    if let Some(end) = &job.end {
        transcode.args(["-to", end]);
    }
    let source_text = source.to_string_lossy().to_string();
    transcode
        .args(["-i", source_text.as_str()])
        .args(&job.output_args)
        .arg(&target);
    match transcode.output() {
        Ok(output) if output.status.success() => {}
        Ok(output) => {
            return fail(String::from_utf8_lossy(&output.stderr).trim().to_string());
        }
        Err(err) => return fail(format!("could not run ffmpeg: {}", err)),
    }

    if job.delete_source && source != Path::new(&target) {
        if let Err(err) = std::fs::remove_file(&source) {
            warn!("Could not delete fetched file {}: {}", source.display(), err);
        }
    }

    info!("Download finished: {}", target);
    let _ = bus.send(Message::Download(DownloadMessage::Completed {
        path: target,
        name: job.name,
        weight: job.weight,
        tags: job.tags,
    }));
}

fn list_dir(dir: &str) -> HashSet<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.flatten().map(|entry| entry.path()).collect(),
        Err(_) => HashSet::new(),
    }
}

/// Picks the fetched media file out of the download directory: a file whose
/// stem is the requested name, preferring one that was not there before the
/// fetch started.
fn find_downloaded_file(
    download_dir: &str,
    name: &str,
    files_before: &HashSet<PathBuf>,
) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = list_dir(download_dir)
        .into_iter()
        .filter(|path| {
            let stem_matches = path
                .file_stem()
                .map(|stem| stem.to_string_lossy() == name)
                .unwrap_or(false);
            stem_matches && is_supported_media_file(path)
        })
        .collect();
    candidates.sort();
    candidates
        .iter()
        .find(|path| !files_before.contains(*path))
        .cloned()
        .or_else(|| candidates.into_iter().next())
}
