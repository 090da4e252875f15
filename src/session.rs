use log::debug;

use crate::playlist::{Playlist, SongSelector};
use crate::protocol::LoopMode;

/// Where the session currently sits inside its play history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryCursor {
    /// At the live end; `next` consults the loop mode.
    Live,
    /// Scrolled back `n >= 1` entries; `next` replays forward instead.
    Back(usize),
}

/// What the playlist manager should do after a session transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Load and play the song with this id.
    Play(String),
    /// Clear the engine; nothing is playing anymore.
    Stop,
    /// Nothing to do.
    Idle,
}

/// Tracks what is playing, the loop mode, and the append-only play history
/// with a bounded cursor for back/forward navigation. The session never
/// touches the engine itself; every transition returns an [`Advance`]
/// directive for the caller to act on.
pub struct PlaybackSession {
    playing: Option<String>,
    loop_mode: LoopMode,
    history: Vec<String>,
    cursor: HistoryCursor,
}

impl PlaybackSession {
    pub fn new(loop_mode: LoopMode) -> PlaybackSession {
        PlaybackSession {
            playing: None,
            loop_mode,
            history: Vec::new(),
            cursor: HistoryCursor::Live,
        }
    }

    pub fn playing(&self) -> Option<&str> {
        self.playing.as_deref()
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn set_loop_mode(&mut self, mode: LoopMode) {
        self.loop_mode = mode;
    }

    pub fn cycle_loop_mode(&mut self) -> LoopMode {
        self.loop_mode = self.loop_mode.cycled();
        self.loop_mode
    }

    /// Forgets the playing song without touching history; used when the song
    /// is removed from under the session.
    pub fn stop_playing(&mut self) {
        self.playing = None;
    }

    /// Drops the history; used when the view is refiltered and old positions
    /// stop meaning anything.
    pub fn reset_history(&mut self) {
        self.history.clear();
        self.cursor = HistoryCursor::Live;
    }

    pub fn clear(&mut self) {
        self.playing = None;
        self.reset_history();
    }

    /// Direct jump to a filtered-view row. Scrolled-back forward history is
    /// discarded, the song is appended, and the cursor returns to live.
    pub fn jump(&mut self, row: usize, playlist: &Playlist) -> Advance {
        let Some(song) = playlist.filtered_get(row) else {
            return Advance::Idle;
        };
        let id = song.id.clone();
        if let HistoryCursor::Back(offset) = self.cursor {
            let keep = self.history.len().saturating_sub(offset + 1);
            self.history.truncate(keep);
            self.cursor = HistoryCursor::Live;
        }
        self.history.push(id.clone());
        self.playing = Some(id.clone());
        Advance::Play(id)
    }

    /// Advances playback. Scrolled back, this replays forward through
    /// history; live, it dispatches on the loop mode. Also the auto-advance
    /// entry point when the engine reports end-of-media.
    pub fn next(&mut self, playlist: &mut Playlist) -> Advance {
        if let HistoryCursor::Back(offset) = self.cursor {
            let Some(id) = self
                .history
                .len()
                .checked_sub(offset)
                .and_then(|index| self.history.get(index).cloned())
            else {
                return Advance::Idle;
            };
            self.cursor = if offset == 1 {
                HistoryCursor::Live
            } else {
                HistoryCursor::Back(offset - 1)
            };
            self.playing = Some(id.clone());
            return Advance::Play(id);
        }

        let Some(playing) = self.playing.clone() else {
            return Advance::Idle;
        };
        if playlist.is_empty() || playlist.filtered_row_of(&playing).is_none() {
            return Advance::Idle;
        }

        match self.loop_mode {
            LoopMode::Repeat => {
                self.history.push(playing.clone());
                Advance::Play(playing)
            }
            LoopMode::ListLoop => {
                let Some(current) = playlist.get_index(&SongSelector::ById(playing)) else {
                    return Advance::Idle;
                };
                let next_index = (current + 1) % playlist.total_len();
                let Some(song) = playlist.get(&SongSelector::ByIndex(next_index)) else {
                    return Advance::Idle;
                };
                let id = song.id.clone();
                self.history.push(id.clone());
                self.playing = Some(id.clone());
                Advance::Play(id)
            }
            LoopMode::ShuffleLoop => {
                let exclude = playlist.filtered_row_of(&playing);
                match playlist.random(exclude) {
                    Some((_, song)) => {
                        let id = song.id.clone();
                        self.history.push(id.clone());
                        self.playing = Some(id.clone());
                        Advance::Play(id)
                    }
                    None => {
                        debug!("PlaybackSession: no shuffle candidate besides the current song");
                        Advance::Idle
                    }
                }
            }
            LoopMode::StopAtEnd => {
                self.playing = None;
                Advance::Stop
            }
        }
    }

    /// Steps back through history. With nothing further back, playback
    /// clears instead of failing.
    pub fn previous(&mut self) -> Advance {
        let offset = match self.cursor {
            HistoryCursor::Live => 1,
            HistoryCursor::Back(offset) => offset + 1,
        };
        if self.history.len() > offset {
            let id = self.history[self.history.len() - 1 - offset].clone();
            self.cursor = HistoryCursor::Back(offset);
            self.playing = Some(id.clone());
            Advance::Play(id)
        } else {
            self.playing = None;
            Advance::Stop
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::Song;

    fn song(name: &str, weight: u32, tags: &[&str]) -> Song {
        Song::with_metadata(
            &format!("/music/{}.mp3", name),
            name,
            weight,
            tags.iter().map(|tag| tag.to_string()).collect(),
            60.0,
        )
    }

    fn playlist_of(names: &[&str]) -> Playlist {
        let mut playlist = Playlist::from_seed([3u8; 32]);
        for name in names {
            playlist.add(song(name, 1, &[]), None);
        }
        playlist
    }

    fn id_of(playlist: &Playlist, name: &str) -> String {
        playlist
            .get(&SongSelector::ByName(name.to_string()))
            .unwrap()
            .id
            .clone()
    }

    #[test]
    fn test_next_without_anything_playing_is_idle() {
        let mut playlist = playlist_of(&["A"]);
        let mut session = PlaybackSession::new(LoopMode::ListLoop);
        assert_eq!(session.next(&mut playlist), Advance::Idle);
    }

    #[test]
    fn test_next_on_empty_playlist_is_idle() {
        let mut playlist = playlist_of(&[]);
        let mut session = PlaybackSession::new(LoopMode::ListLoop);
        session.jump(0, &playlist);
        assert_eq!(session.next(&mut playlist), Advance::Idle);
    }

    #[test]
    fn test_list_loop_advances_and_wraps() {
        let mut playlist = playlist_of(&["A", "B", "C"]);
        let mut session = PlaybackSession::new(LoopMode::ListLoop);
        assert_eq!(
            session.jump(2, &playlist),
            Advance::Play(id_of(&playlist, "C"))
        );
        // Playing the last song wraps to the first.
        assert_eq!(
            session.next(&mut playlist),
            Advance::Play(id_of(&playlist, "A"))
        );
        assert_eq!(
            session.next(&mut playlist),
            Advance::Play(id_of(&playlist, "B"))
        );
    }

    #[test]
    fn test_repeat_replays_the_current_song() {
        let mut playlist = playlist_of(&["A", "B"]);
        let mut session = PlaybackSession::new(LoopMode::Repeat);
        session.jump(1, &playlist);
        let expected = id_of(&playlist, "B");
        assert_eq!(session.next(&mut playlist), Advance::Play(expected.clone()));
        assert_eq!(session.next(&mut playlist), Advance::Play(expected));
    }

    #[test]
    fn test_stop_at_end_clears_playback() {
        let mut playlist = playlist_of(&["A"]);
        let mut session = PlaybackSession::new(LoopMode::StopAtEnd);
        session.jump(0, &playlist);
        assert_eq!(session.next(&mut playlist), Advance::Stop);
        assert_eq!(session.playing(), None);
        // A second advance with nothing playing stays idle.
        assert_eq!(session.next(&mut playlist), Advance::Idle);
    }

    #[test]
    fn test_shuffle_never_picks_the_playing_song() {
        let mut playlist = playlist_of(&["A", "B", "C"]);
        let mut session = PlaybackSession::new(LoopMode::ShuffleLoop);
        session.jump(0, &playlist);
        let first = id_of(&playlist, "A");
        for _ in 0..50 {
            session.jump(0, &playlist);
            match session.next(&mut playlist) {
                Advance::Play(id) => assert_ne!(id, first),
                other => panic!("expected a song, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_shuffle_with_no_other_candidate_is_idle() {
        let mut playlist = playlist_of(&["A"]);
        let mut session = PlaybackSession::new(LoopMode::ShuffleLoop);
        session.jump(0, &playlist);
        assert_eq!(session.next(&mut playlist), Advance::Idle);
    }

    #[test]
    fn test_previous_walks_back_then_clears() {
        let mut playlist = playlist_of(&["A", "B", "C"]);
        let mut session = PlaybackSession::new(LoopMode::ListLoop);
        session.jump(0, &playlist);
        session.jump(1, &playlist);
        session.jump(2, &playlist);

        assert_eq!(session.previous(), Advance::Play(id_of(&playlist, "B")));
        assert_eq!(session.previous(), Advance::Play(id_of(&playlist, "A")));
        // Nothing earlier: playback clears rather than erroring.
        assert_eq!(session.previous(), Advance::Stop);
        assert_eq!(session.playing(), None);
    }

    #[test]
    fn test_next_replays_forward_history_before_loop_mode() {
        let mut playlist = playlist_of(&["A", "B", "C"]);
        let mut session = PlaybackSession::new(LoopMode::StopAtEnd);
        session.jump(0, &playlist);
        session.jump(1, &playlist);
        session.jump(2, &playlist);
        session.previous();
        session.previous();

        // Forward through history, ignoring StopAtEnd until live again.
        assert_eq!(
            session.next(&mut playlist),
            Advance::Play(id_of(&playlist, "B"))
        );
        assert_eq!(
            session.next(&mut playlist),
            Advance::Play(id_of(&playlist, "C"))
        );
        assert_eq!(session.next(&mut playlist), Advance::Stop);
    }

    #[test]
    fn test_jump_while_scrolled_back_discards_forward_history() {
        let mut playlist = playlist_of(&["A", "B", "C", "D"]);
        let mut session = PlaybackSession::new(LoopMode::ListLoop);
        session.jump(0, &playlist);
        session.jump(1, &playlist);
        session.jump(2, &playlist);
        session.previous(); // back at B

        session.jump(3, &playlist); // history forward of B is gone
        assert_eq!(session.previous(), Advance::Play(id_of(&playlist, "A")));
    }

    #[test]
    fn test_next_skips_a_song_deleted_from_the_view() {
        let mut playlist = playlist_of(&["A", "B"]);
        let mut session = PlaybackSession::new(LoopMode::ListLoop);
        session.jump(0, &playlist);
        playlist.delete(&SongSelector::ByName("A".to_string()));
        assert_eq!(session.next(&mut playlist), Advance::Idle);
    }
}
