//! Event-bus protocol shared by all runtime components.
//!
//! This module defines all message payloads exchanged between the playlist
//! engine, the audio player, the download workers, and the external display
//! layer. The display layer renders from the notification messages and never
//! touches engine state directly.

use std::path::PathBuf;

use crate::{config::Config, filter::TagRule, playlist::SongSelector};

/// What happens when the current song runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Repeat,      // Replay the current song from the start
    ListLoop,    // Advance through the list, wrapping at the end
    ShuffleLoop, // Weighted-random pick excluding the current song
    StopAtEnd,   // Clear "now playing" and halt
}

impl LoopMode {
    /// Integer encoding used by the config file.
    pub fn index(self) -> u32 {
        match self {
            LoopMode::Repeat => 0,
            LoopMode::ListLoop => 1,
            LoopMode::ShuffleLoop => 2,
            LoopMode::StopAtEnd => 3,
        }
    }

    pub fn from_index(index: u32) -> Option<LoopMode> {
        match index {
            0 => Some(LoopMode::Repeat),
            1 => Some(LoopMode::ListLoop),
            2 => Some(LoopMode::ShuffleLoop),
            3 => Some(LoopMode::StopAtEnd),
            _ => None,
        }
    }

    pub fn cycled(self) -> LoopMode {
        LoopMode::from_index((self.index() + 1) % 4).unwrap_or(LoopMode::Repeat)
    }
}

/// Top-level envelope for all bus traffic.
#[derive(Debug, Clone)]
pub enum Message {
    Playlist(PlaylistMessage),
    Playback(PlaybackMessage),
    Download(DownloadMessage),
    Config(ConfigMessage),
}

/// Filter fields as edited by the user, compiled by the playlist manager.
#[derive(Debug, Clone)]
pub struct FilterSpec {
    pub pattern: String,
    pub rules: Vec<TagRule>,
    pub strict: bool,
}

/// One rendered playlist row, in filtered-view order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongRow {
    pub name: String,
    pub length: String,
    pub tags: String,
    pub artist: String,
    pub weight: u32,
}

/// Playlist-domain commands and notifications.
#[derive(Debug, Clone)]
pub enum PlaylistMessage {
    AddSong {
        path: String,
        name: Option<String>,
        weight: u32,
        tags: Vec<String>,
    },
    AddFolder(PathBuf),
    DeleteSong(SongSelector),
    DeleteSelected,
    UpdateSong {
        selector: SongSelector,
        name: Option<String>,
        tags: Option<Vec<String>>,
        weight: Option<u32>,
    },
    SetFilter(FilterSpec),
    ClearFilter,
    /// Select songs resolved from free-form user input (names or indices).
    SelectSongs(Vec<SongSelector>),
    /// Single-click on a rendered row: replace the selection.
    ReselectRow(usize),
    /// Shift-click on a rendered row: toggle membership.
    ToggleSelectRow(usize),
    ClearSelection,
    MoveSelectedUp {
        step: usize,
        to_top: bool,
    },
    MoveSelectedDown {
        step: usize,
        to_bottom: bool,
    },
    SavePlaylist(PathBuf),
    LoadPlaylist(PathBuf),
    ClearPlaylist,
    /// Re-render request: the filtered view changed.
    ViewChanged(Vec<SongRow>),
    /// Re-render request: selected rows (filtered-view indices) changed.
    SelectionChanged(Vec<usize>),
    /// A validated user action was refused; nothing was mutated.
    OperationRejected(String),
}

/// Identity of the song currently loaded into the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub name: String,
}

/// Playback-domain commands and notifications.
#[derive(Debug, Clone)]
pub enum PlaybackMessage {
    /// Play the song at a filtered-view index.
    PlayRow(usize),
    Next,
    Previous,
    TogglePause,
    Seek(f64),
    /// Volume is a linear factor in `0.0..=1.0`.
    SetVolume(f32),
    ToggleMute,
    CycleLoopMode,
    SetLoopMode(LoopMode),
    /// Engine command issued by the playlist manager: load a file.
    EngineLoad(PathBuf),
    /// Engine command issued by the playlist manager: start playback.
    EnginePlay,
    /// Engine command issued by the playlist manager: unload and halt.
    EngineStop,
    /// The engine reached end-of-media; drives auto-advance.
    TrackFinished,
    NowPlayingChanged(Option<NowPlaying>),
    Progress {
        elapsed_secs: f64,
        duration_secs: f64,
    },
    LoopModeChanged(LoopMode),
}

/// Remote fetch-and-transcode request as entered by the user.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub name: String,
    /// Trim start, `m:ss`; empty means the beginning of the media.
    pub start: String,
    /// Trim end, `m:ss`; empty means the end of the media.
    pub end: String,
    pub tags: Vec<String>,
    pub file_type: String,
    /// Extra arguments appended to the fetch tool invocation.
    pub fetch_args: String,
    /// Extra transcoder arguments applied before the input file.
    pub input_args: String,
    /// Extra transcoder arguments applied to the output file.
    pub output_args: String,
    pub weight: u32,
    pub delete_source: bool,
    pub save_defaults: bool,
}

/// Download-domain commands and notifications.
#[derive(Debug, Clone)]
pub enum DownloadMessage {
    Request(DownloadRequest),
    /// A fetch task finished; the playlist manager turns this into an add.
    Completed {
        path: String,
        name: String,
        weight: u32,
        tags: Vec<String>,
    },
    Failed {
        url: String,
        reason: String,
    },
    /// The request failed validation and no task was started.
    Rejected(String),
}

/// Runtime configuration updates.
#[derive(Debug, Clone)]
pub enum ConfigMessage {
    ConfigChanged(Config),
}
