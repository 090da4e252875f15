use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use tokio::sync::broadcast::{Receiver, Sender};

use crate::{
    config::{self, Config},
    filter::Filter,
    media_file_discovery,
    playlist::{Playlist, Song, SongSelector},
    playlist_file,
    protocol::{
        DownloadMessage, LoopMode, Message, NowPlaying, PlaybackMessage, PlaylistMessage, SongRow,
    },
    session::{Advance, PlaybackSession},
};

// Owns the playlist and the playback session. Every mutation in the
// application funnels through this manager's thread, so the playlist and its
// derived structures can never be observed mid-update. The audio engine and
// the download workers only talk to it through bus messages.
pub struct PlaylistManager {
    playlist: Playlist,
    session: PlaybackSession,
    bus_consumer: Receiver<Message>,
    bus_producer: Sender<Message>,
    config: Config,
    config_path: PathBuf,
}

impl PlaylistManager {
    pub fn new(
        playlist: Playlist,
        bus_consumer: Receiver<Message>,
        bus_producer: Sender<Message>,
        config: Config,
        config_path: PathBuf,
    ) -> Self {
        let session = PlaybackSession::new(config.loop_mode);
        Self {
            playlist,
            session,
            bus_consumer,
            bus_producer,
            config,
            config_path,
        }
    }

    pub fn run(&mut self) {
        self.broadcast_view();
        let _ = self.bus_producer.send(Message::Playback(
            PlaybackMessage::LoopModeChanged(self.session.loop_mode()),
        ));

        while let Ok(message) = self.bus_consumer.blocking_recv() {
            self.handle_message(message);
        }
        info!("PlaylistManager: bus closed, shutting down");
    }

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::Playlist(message) => self.handle_playlist_message(message),
            Message::Playback(message) => self.handle_playback_message(message),
            Message::Download(DownloadMessage::Completed {
                path,
                name,
                weight,
                tags,
            }) => {
                debug!("PlaylistManager: adding downloaded song {}", name);
                match Song::from_file(&path, Some(name), weight, tags) {
                    Ok(song) => {
                        self.playlist.add(song, None);
                        self.broadcast_view();
                    }
                    Err(err) => error!("Could not add downloaded song: {}", err),
                }
            }
            _ => {} // Ignore other messages
        }
    }

    fn handle_playlist_message(&mut self, message: PlaylistMessage) {
        match message {
            PlaylistMessage::AddSong {
                path,
                name,
                weight,
                tags,
            } => {
                match Song::from_file(&path, name, weight, tags) {
                    Ok(song) => {
                        self.playlist.add(song, None);
                        self.broadcast_view();
                    }
                    Err(err) => error!("Could not add song: {}", err),
                }
            }
            PlaylistMessage::AddFolder(folder) => {
                let files = media_file_discovery::collect_audio_files_from_folder(&folder);
                info!(
                    "PlaylistManager: adding {} files from {}",
                    files.len(),
                    folder.display()
                );
                for file in files {
                    match Song::from_file(&file.to_string_lossy(), None, 1, Vec::new()) {
                        Ok(song) => self.playlist.add(song, None),
                        Err(err) => error!("Skipping file: {}", err),
                    }
                }
                self.broadcast_view();
            }
            PlaylistMessage::DeleteSong(selector) => {
                self.delete_songs(std::slice::from_ref(&selector));
            }
            PlaylistMessage::DeleteSelected => {
                let selectors: Vec<SongSelector> = self
                    .playlist
                    .selected_ids()
                    .iter()
                    .map(|id| SongSelector::ById(id.clone()))
                    .collect();
                self.delete_songs(&selectors);
            }
            PlaylistMessage::UpdateSong {
                selector,
                name,
                tags,
                weight,
            } => match self.playlist.update(&selector, name, tags, weight) {
                Ok(()) => self.broadcast_view(),
                Err(reason) => {
                    warn!("PlaylistManager: refusing update: {}", reason);
                    let _ = self.bus_producer.send(Message::Playlist(
                        PlaylistMessage::OperationRejected(reason),
                    ));
                }
            },
            PlaylistMessage::SetFilter(spec) => {
                match Filter::new(&spec.pattern, spec.rules, spec.strict) {
                    Ok(filter) => self.apply_filter(filter),
                    Err(reason) => {
                        warn!("PlaylistManager: refusing filter: {}", reason);
                        let _ = self.bus_producer.send(Message::Playlist(
                            PlaylistMessage::OperationRejected(reason),
                        ));
                    }
                }
            }
            PlaylistMessage::ClearFilter => self.apply_filter(Filter::match_all()),
            PlaylistMessage::SelectSongs(selectors) => {
                for selector in &selectors {
                    self.playlist.select(selector);
                }
                self.broadcast_selection();
            }
            PlaylistMessage::ReselectRow(row) => {
                self.playlist.reselect_row(row);
                self.broadcast_selection();
            }
            PlaylistMessage::ToggleSelectRow(row) => {
                self.playlist.toggle_select_row(row);
                self.broadcast_selection();
            }
            PlaylistMessage::ClearSelection => {
                self.playlist.clear_select();
                self.broadcast_selection();
            }
            PlaylistMessage::MoveSelectedUp { step, to_top } => {
                for id in self.playlist.selected_ids().to_vec() {
                    if let Some(index) = self.playlist.get_index(&SongSelector::ById(id)) {
                        self.playlist.move_up(index, step, to_top, false);
                    }
                }
                self.broadcast_view();
                self.broadcast_selection();
            }
            PlaylistMessage::MoveSelectedDown { step, to_bottom } => {
                for id in self.playlist.selected_ids().to_vec().into_iter().rev() {
                    if let Some(index) = self.playlist.get_index(&SongSelector::ById(id)) {
                        self.playlist.move_down(index, step, to_bottom, false);
                    }
                }
                self.broadcast_view();
                self.broadcast_selection();
            }
            PlaylistMessage::SavePlaylist(path) => {
                match playlist_file::save(&self.playlist, &path) {
                    Ok(()) => {
                        info!("Saved playlist to {}", path.display());
                        self.remember_save_path(&path);
                    }
                    Err(err) => error!("{}", err),
                }
            }
            PlaylistMessage::LoadPlaylist(path) => {
                match playlist_file::load_into(&mut self.playlist, &path) {
                    Ok(count) => {
                        info!("Loaded {} songs from {}", count, path.display());
                        self.remember_save_path(&path);
                        self.broadcast_view();
                        self.broadcast_selection();
                    }
                    Err(err) => error!("{}", err),
                }
            }
            PlaylistMessage::ClearPlaylist => {
                self.stop_engine_playback();
                self.session.clear();
                self.playlist.clear();
                self.broadcast_view();
                self.broadcast_selection();
            }
            _ => {} // Notifications we emitted ourselves
        }
    }

    fn handle_playback_message(&mut self, message: PlaybackMessage) {
        match message {
            PlaybackMessage::PlayRow(row) => {
                let advance = self.session.jump(row, &self.playlist);
                self.apply_advance(advance);
            }
            PlaybackMessage::Next => {
                let advance = self.session.next(&mut self.playlist);
                self.apply_advance(advance);
            }
            PlaybackMessage::Previous => {
                let advance = self.session.previous();
                self.apply_advance(advance);
            }
            // End-of-media reported by the engine: auto-advance.
            PlaybackMessage::TrackFinished => {
                let advance = self.session.next(&mut self.playlist);
                self.apply_advance(advance);
            }
            PlaybackMessage::CycleLoopMode => {
                let mode = self.session.cycle_loop_mode();
                self.persist_loop_mode(mode);
            }
            PlaybackMessage::SetLoopMode(mode) => {
                self.session.set_loop_mode(mode);
                self.persist_loop_mode(mode);
            }
            _ => {} // Engine commands and notifications
        }
    }

    fn apply_advance(&mut self, advance: Advance) {
        match advance {
            Advance::Play(id) => {
                let Some(song) = self.playlist.song_by_id(&id) else {
                    return;
                };
                let path = PathBuf::from(&song.path);
                let name = song.name.clone();
                debug!("PlaylistManager: playing {}", name);
                let _ = self
                    .bus_producer
                    .send(Message::Playback(PlaybackMessage::EngineLoad(path)));
                let _ = self
                    .bus_producer
                    .send(Message::Playback(PlaybackMessage::EnginePlay));
                let _ = self
                    .bus_producer
                    .send(Message::Playback(PlaybackMessage::Seek(0.0)));
                let _ = self.bus_producer.send(Message::Playback(
                    PlaybackMessage::NowPlayingChanged(Some(NowPlaying { name })),
                ));
            }
            Advance::Stop => {
                let _ = self
                    .bus_producer
                    .send(Message::Playback(PlaybackMessage::EngineStop));
                let _ = self.bus_producer.send(Message::Playback(
                    PlaybackMessage::NowPlayingChanged(None),
                ));
            }
            Advance::Idle => {}
        }
    }

    fn delete_songs(&mut self, selectors: &[SongSelector]) {
        let ids: Vec<String> = selectors
            .iter()
            .filter_map(|selector| self.playlist.get(selector).map(|song| song.id.clone()))
            .collect();
        if ids.is_empty() {
            return;
        }
        let playing_removed = self
            .session
            .playing()
            .map(|playing| ids.iter().any(|id| id == playing))
            .unwrap_or(false);
        if playing_removed {
            self.stop_engine_playback();
        }
        let selectors: Vec<SongSelector> = ids.into_iter().map(SongSelector::ById).collect();
        self.playlist.delete_many(&selectors);
        self.broadcast_view();
        self.broadcast_selection();
    }

    fn apply_filter(&mut self, filter: Filter) {
        if let Some(playing) = self.session.playing() {
            let still_visible = self
                .playlist
                .song_by_id(playing)
                .map(|song| filter.check(&song.name, &song.tags))
                .unwrap_or(false);
            if !still_visible {
                self.stop_engine_playback();
            }
        }
        // Old history rows point into a view that no longer exists.
        self.session.reset_history();
        self.playlist.set_filter(filter);
        self.broadcast_view();
        self.broadcast_selection();
    }

    fn stop_engine_playback(&mut self) {
        self.session.stop_playing();
        let _ = self
            .bus_producer
            .send(Message::Playback(PlaybackMessage::EngineStop));
        let _ = self
            .bus_producer
            .send(Message::Playback(PlaybackMessage::NowPlayingChanged(None)));
    }

    fn persist_loop_mode(&mut self, mode: LoopMode) {
        self.config.loop_mode = mode;
        if let Err(err) = config::edit_key(&self.config_path, "loopmode", &mode.index().to_string())
        {
            error!("Failed to persist loop mode: {}", err);
        }
        let _ = self
            .bus_producer
            .send(Message::Playback(PlaybackMessage::LoopModeChanged(mode)));
    }

    fn remember_save_path(&mut self, path: &Path) {
        let value = path.to_string_lossy().to_string();
        self.config.save_dir = value.clone();
        if let Err(err) = config::edit_key(&self.config_path, "savedir", &value) {
            error!("Failed to persist save path: {}", err);
        }
    }

    fn broadcast_view(&self) {
        let rows: Vec<SongRow> = self.playlist.iter_filtered().map(SongRow::from_song).collect();
        let _ = self
            .bus_producer
            .send(Message::Playlist(PlaylistMessage::ViewChanged(rows)));
    }

    fn broadcast_selection(&self) {
        let _ = self.bus_producer.send(Message::Playlist(
            PlaylistMessage::SelectionChanged(self.playlist.selected_rows()),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{TagLiteral, TagRule};
    use crate::protocol::FilterSpec;
    use tokio::sync::broadcast::{self, error::TryRecvError};

    struct Harness {
        manager: PlaylistManager,
        receiver: Receiver<Message>,
        config_path: PathBuf,
    }

    impl Harness {
        fn new() -> Harness {
            let (bus_sender, _) = broadcast::channel(256);
            let receiver = bus_sender.subscribe();
            let manager_receiver = bus_sender.subscribe();
            let config_path = std::env::temp_dir().join(format!(
                "resin_manager_test_{}.txt",
                uuid::Uuid::new_v4()
            ));
            std::fs::write(&config_path, Config::default().render()).unwrap();
            let manager = PlaylistManager::new(
                Playlist::from_seed([5u8; 32]),
                manager_receiver,
                bus_sender,
                Config::default(),
                config_path.clone(),
            );
            Harness {
                manager,
                receiver,
                config_path,
            }
        }

        fn seed_song(&mut self, name: &str, weight: u32, tags: &[&str]) {
            self.manager.playlist.add(
                Song::with_metadata(
                    &format!("/music/{}.mp3", name),
                    name,
                    weight,
                    tags.iter().map(|tag| tag.to_string()).collect(),
                    60.0,
                ),
                None,
            );
        }

        fn drain(&mut self) -> Vec<Message> {
            let mut messages = Vec::new();
            loop {
                match self.receiver.try_recv() {
                    Ok(message) => messages.push(message),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Lagged(_)) => continue,
                    Err(TryRecvError::Closed) => break,
                }
            }
            messages
        }

        fn view_names(&mut self) -> Option<Vec<String>> {
            let mut latest = None;
            for message in self.drain() {
                if let Message::Playlist(PlaylistMessage::ViewChanged(rows)) = message {
                    latest = Some(rows.iter().map(|row| row.name.clone()).collect());
                }
            }
            latest
        }
    }

    impl Drop for Harness {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.config_path);
        }
    }

    /// A tiny but complete PCM wav so metadata probing works on real files.
    fn write_test_wav(path: &Path) {
        let sample_rate = 8000u32;
        let samples: Vec<i16> = (0..64).map(|value| (value * 100) as i16).collect();
        let data_len = (samples.len() * 2) as u32;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
        bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        std::fs::write(path, bytes).unwrap();
    }

    fn tag_spec(tag: &str) -> FilterSpec {
        FilterSpec {
            pattern: String::new(),
            rules: vec![TagRule {
                literals: vec![TagLiteral {
                    tag: tag.to_string(),
                    required: true,
                }],
            }],
            strict: true,
        }
    }

    #[test]
    fn test_play_row_issues_load_play_seek_and_now_playing() {
        let mut harness = Harness::new();
        harness.seed_song("A", 1, &[]);
        harness.seed_song("B", 1, &[]);
        harness.drain();

        harness
            .manager
            .handle_message(Message::Playback(PlaybackMessage::PlayRow(1)));

        let messages = harness.drain();
        let mut saw_load = false;
        let mut saw_play = false;
        let mut saw_seek = false;
        let mut saw_now_playing = false;
        for message in &messages {
            match message {
                Message::Playback(PlaybackMessage::EngineLoad(path)) => {
                    assert!(!saw_play, "load must come before play");
                    assert_eq!(path, &PathBuf::from("/music/B.mp3"));
                    saw_load = true;
                }
                Message::Playback(PlaybackMessage::EnginePlay) => saw_play = true,
                Message::Playback(PlaybackMessage::Seek(seconds)) => {
                    assert_eq!(*seconds, 0.0);
                    saw_seek = true;
                }
                Message::Playback(PlaybackMessage::NowPlayingChanged(Some(playing))) => {
                    assert_eq!(playing.name, "B");
                    saw_now_playing = true;
                }
                _ => {}
            }
        }
        assert!(saw_load && saw_play && saw_seek && saw_now_playing);
    }

    #[test]
    fn test_play_row_out_of_view_is_a_noop() {
        let mut harness = Harness::new();
        harness.seed_song("A", 1, &[]);
        harness.drain();
        harness
            .manager
            .handle_message(Message::Playback(PlaybackMessage::PlayRow(7)));
        assert!(harness.drain().is_empty());
    }

    #[test]
    fn test_track_finished_advances_and_wraps_in_list_loop() {
        let mut harness = Harness::new();
        harness.seed_song("A", 1, &[]);
        harness.seed_song("B", 1, &[]);
        harness
            .manager
            .handle_message(Message::Playback(PlaybackMessage::SetLoopMode(
                LoopMode::ListLoop,
            )));
        harness
            .manager
            .handle_message(Message::Playback(PlaybackMessage::PlayRow(1)));
        harness.drain();

        // End of media on the last song wraps to the first.
        harness
            .manager
            .handle_message(Message::Playback(PlaybackMessage::TrackFinished));
        let loaded: Vec<PathBuf> = harness
            .drain()
            .into_iter()
            .filter_map(|message| match message {
                Message::Playback(PlaybackMessage::EngineLoad(path)) => Some(path),
                _ => None,
            })
            .collect();
        assert_eq!(loaded, [PathBuf::from("/music/A.mp3")]);
    }

    #[test]
    fn test_stop_at_end_halts_after_the_current_song() {
        let mut harness = Harness::new();
        harness.seed_song("A", 1, &[]);
        harness
            .manager
            .handle_message(Message::Playback(PlaybackMessage::SetLoopMode(
                LoopMode::StopAtEnd,
            )));
        harness
            .manager
            .handle_message(Message::Playback(PlaybackMessage::PlayRow(0)));
        harness.drain();

        harness
            .manager
            .handle_message(Message::Playback(PlaybackMessage::TrackFinished));
        let messages = harness.drain();
        assert!(messages.iter().any(|message| matches!(
            message,
            Message::Playback(PlaybackMessage::EngineStop)
        )));
        assert!(messages.iter().any(|message| matches!(
            message,
            Message::Playback(PlaybackMessage::NowPlayingChanged(None))
        )));
    }

    #[test]
    fn test_delete_selected_stops_the_engine_when_playing_is_removed() {
        let mut harness = Harness::new();
        harness.seed_song("A", 1, &[]);
        harness.seed_song("B", 1, &[]);
        harness
            .manager
            .handle_message(Message::Playback(PlaybackMessage::PlayRow(0)));
        harness
            .manager
            .handle_message(Message::Playlist(PlaylistMessage::ReselectRow(0)));
        harness.drain();

        harness
            .manager
            .handle_message(Message::Playlist(PlaylistMessage::DeleteSelected));
        let messages = harness.drain();
        assert!(messages.iter().any(|message| matches!(
            message,
            Message::Playback(PlaybackMessage::EngineStop)
        )));
        assert_eq!(harness.manager.playlist.total_len(), 1);
        assert_eq!(harness.manager.session.playing(), None);
    }

    #[test]
    fn test_delete_with_unresolved_selector_changes_nothing() {
        let mut harness = Harness::new();
        harness.seed_song("A", 1, &[]);
        harness.drain();
        harness
            .manager
            .handle_message(Message::Playlist(PlaylistMessage::DeleteSong(
                SongSelector::ByName("missing".to_string()),
            )));
        assert!(harness.drain().is_empty());
        assert_eq!(harness.manager.playlist.total_len(), 1);
    }

    #[test]
    fn test_set_filter_prunes_view_and_stops_excluded_playing_song() {
        let mut harness = Harness::new();
        harness.seed_song("A", 1, &["x"]);
        harness.seed_song("B", 3, &["y"]);
        harness
            .manager
            .handle_message(Message::Playback(PlaybackMessage::PlayRow(1)));
        harness.drain();

        harness
            .manager
            .handle_message(Message::Playlist(PlaylistMessage::SetFilter(tag_spec("x"))));
        let messages = harness.drain();
        assert!(messages.iter().any(|message| matches!(
            message,
            Message::Playback(PlaybackMessage::EngineStop)
        )));
        let view: Vec<String> = harness
            .manager
            .playlist
            .iter_filtered()
            .map(|song| song.name.clone())
            .collect();
        assert_eq!(view, ["A"]);
    }

    #[test]
    fn test_invalid_filter_pattern_is_rejected_without_mutation() {
        let mut harness = Harness::new();
        harness.seed_song("A", 1, &[]);
        harness.drain();

        harness
            .manager
            .handle_message(Message::Playlist(PlaylistMessage::SetFilter(FilterSpec {
                pattern: "(unclosed".to_string(),
                rules: Vec::new(),
                strict: true,
            })));
        let messages = harness.drain();
        assert!(messages.iter().any(|message| matches!(
            message,
            Message::Playlist(PlaylistMessage::OperationRejected(_))
        )));
        assert!(harness.manager.playlist.filter().is_match_all());
        assert_eq!(harness.manager.playlist.len(), 1);
    }

    #[test]
    fn test_update_name_clash_is_rejected() {
        let mut harness = Harness::new();
        harness.seed_song("A", 1, &[]);
        harness.seed_song("B", 1, &[]);
        harness.drain();

        harness
            .manager
            .handle_message(Message::Playlist(PlaylistMessage::UpdateSong {
                selector: SongSelector::ByName("B".to_string()),
                name: Some("A".to_string()),
                tags: None,
                weight: None,
            }));
        let messages = harness.drain();
        assert!(messages.iter().any(|message| matches!(
            message,
            Message::Playlist(PlaylistMessage::OperationRejected(_))
        )));
    }

    #[test]
    fn test_move_selected_down_matches_the_offset_arithmetic() {
        let mut harness = Harness::new();
        for name in ["A", "B", "C", "D", "E"] {
            harness.seed_song(name, 1, &[]);
        }
        harness
            .manager
            .handle_message(Message::Playlist(PlaylistMessage::ReselectRow(0)));
        harness.drain();

        harness
            .manager
            .handle_message(Message::Playlist(PlaylistMessage::MoveSelectedDown {
                step: 2,
                to_bottom: false,
            }));
        assert_eq!(
            harness.view_names().unwrap(),
            ["B", "C", "D", "A", "E"]
        );
    }

    #[test]
    fn test_add_song_from_a_real_file_uses_the_stem_as_name() {
        let mut harness = Harness::new();
        let wav = std::env::temp_dir().join("resin_added_song.wav");
        write_test_wav(&wav);
        harness.drain();

        harness
            .manager
            .handle_message(Message::Playlist(PlaylistMessage::AddSong {
                path: wav.to_string_lossy().to_string(),
                name: None,
                weight: 2,
                tags: vec!["Artist".to_string()],
            }));
        let names = harness.view_names().unwrap();
        let _ = std::fs::remove_file(&wav);
        assert_eq!(names, ["resin_added_song"]);
        let song = harness
            .manager
            .playlist
            .get(&SongSelector::ByIndex(0))
            .unwrap();
        assert_eq!(song.weight, 2);
        assert_eq!(song.artist(), "Artist");
    }

    #[test]
    fn test_add_song_with_missing_file_fails_that_song_only() {
        let mut harness = Harness::new();
        harness.drain();
        harness
            .manager
            .handle_message(Message::Playlist(PlaylistMessage::AddSong {
                path: "/nonexistent/ghost.mp3".to_string(),
                name: None,
                weight: 1,
                tags: Vec::new(),
            }));
        assert_eq!(harness.manager.playlist.total_len(), 0);
        // No view change was broadcast for a failed add.
        assert!(harness.view_names().is_none());
    }

    #[test]
    fn test_download_completed_lands_in_the_playlist() {
        let mut harness = Harness::new();
        let wav = std::env::temp_dir().join("resin_downloaded.wav");
        write_test_wav(&wav);
        harness.drain();

        harness
            .manager
            .handle_message(Message::Download(DownloadMessage::Completed {
                path: wav.to_string_lossy().to_string(),
                name: "Fetched".to_string(),
                weight: 3,
                tags: vec!["Remote".to_string()],
            }));
        let names = harness.view_names().unwrap();
        let _ = std::fs::remove_file(&wav);
        assert_eq!(names, ["Fetched"]);
    }

    #[test]
    fn test_save_then_load_roundtrips_the_playlist() {
        let mut harness = Harness::new();
        let dir = std::env::temp_dir();
        let wavs: Vec<PathBuf> = ["one", "two", "three"]
            .iter()
            .map(|name| dir.join(format!("resin_rt_{}.wav", name)))
            .collect();
        for wav in &wavs {
            write_test_wav(wav);
        }
        for (index, wav) in wavs.iter().enumerate() {
            harness.manager.playlist.add(
                Song::with_metadata(
                    &wav.to_string_lossy(),
                    &format!("Song {}", index),
                    (index + 1) as u32,
                    vec![format!("tag{}", index)],
                    0.0,
                ),
                None,
            );
        }
        let saved: Vec<(String, String, Vec<String>, u32)> = harness
            .manager
            .playlist
            .iter_all()
            .map(|song| {
                (
                    song.path.clone(),
                    song.name.clone(),
                    song.tags.clone(),
                    song.weight,
                )
            })
            .collect();

        let list_path = dir.join("resin_rt_list.rpl");
        harness
            .manager
            .handle_message(Message::Playlist(PlaylistMessage::SavePlaylist(
                list_path.clone(),
            )));
        harness
            .manager
            .handle_message(Message::Playlist(PlaylistMessage::ClearPlaylist));
        assert_eq!(harness.manager.playlist.total_len(), 0);

        harness
            .manager
            .handle_message(Message::Playlist(PlaylistMessage::LoadPlaylist(
                list_path.clone(),
            )));
        let reloaded: Vec<(String, String, Vec<String>, u32)> = harness
            .manager
            .playlist
            .iter_all()
            .map(|song| {
                (
                    song.path.clone(),
                    song.name.clone(),
                    song.tags.clone(),
                    song.weight,
                )
            })
            .collect();
        for wav in &wavs {
            let _ = std::fs::remove_file(wav);
        }
        let _ = std::fs::remove_file(&list_path);
        assert_eq!(reloaded, saved);
    }

    #[test]
    fn test_cycle_loop_mode_persists_to_the_config_file() {
        let mut harness = Harness::new();
        harness.drain();
        harness
            .manager
            .handle_message(Message::Playback(PlaybackMessage::CycleLoopMode));

        let messages = harness.drain();
        assert!(messages.iter().any(|message| matches!(
            message,
            Message::Playback(PlaybackMessage::LoopModeChanged(LoopMode::ShuffleLoop))
        )));
        let contents = std::fs::read_to_string(&harness.config_path).unwrap();
        assert!(contents.contains("loopmode:2\n"));
    }
}
