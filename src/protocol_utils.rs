//! Helper implementations for protocol display types.

use crate::playlist::Song;
use crate::protocol::SongRow;

/// Formats a duration in seconds as `mm:ss`, or `h:mm:ss` past one hour.
pub fn format_time(seconds: f64) -> String {
    let total = seconds.round().max(0.0) as u64;
    let minutes = total / 60;
    let secs = total % 60;
    if minutes >= 60 {
        format!("{}:{:02}:{:02}", minutes / 60, minutes % 60, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

impl SongRow {
    pub fn from_song(song: &Song) -> SongRow {
        SongRow {
            name: song.name.clone(),
            length: format_time(song.length_secs),
            tags: song.tags.join(", "),
            artist: song.artist().to_string(),
            weight: song.weight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time_pads_minutes_and_seconds() {
        assert_eq!(format_time(0.0), "00:00");
        assert_eq!(format_time(61.0), "01:01");
        assert_eq!(format_time(599.0), "09:59");
    }

    #[test]
    fn test_format_time_switches_to_hours_past_sixty_minutes() {
        assert_eq!(format_time(3600.0), "1:00:00");
        assert_eq!(format_time(3661.0), "1:01:01");
    }

    #[test]
    fn test_format_time_rounds_fractional_seconds() {
        assert_eq!(format_time(59.6), "01:00");
        assert_eq!(format_time(-3.0), "00:00");
    }

    #[test]
    fn test_song_row_from_song() {
        let song = Song::with_metadata(
            "/music/a.mp3",
            "Song A",
            2,
            vec!["Artist".to_string(), "calm".to_string()],
            75.0,
        );
        let row = SongRow::from_song(&song);
        assert_eq!(row.name, "Song A");
        assert_eq!(row.length, "01:15");
        assert_eq!(row.tags, "Artist, calm");
        assert_eq!(row.artist, "Artist");
        assert_eq!(row.weight, 2);
    }
}
