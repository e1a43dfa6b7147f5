//! Reads "now playing" events as JSON lines from an async reader.
//!
//! Each line is either a track object or `null` (an empty line counts as
//! `null`) when playback stops:
//!
//! ```text
//! {"title":"Song","artists":["A","B"],"album":"Album","cover_url":"https://...","duration_ms":215000}
//! null
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::presence::{NowPlaying, TrackInformation};

#[derive(Debug, Deserialize)]
struct TrackLine {
    title: String,
    #[serde(default)]
    artists: Vec<String>,
    #[serde(default)]
    album: String,
    #[serde(default)]
    cover_url: String,
    #[serde(default)]
    duration_ms: u64,
}

impl From<TrackLine> for TrackInformation {
    fn from(line: TrackLine) -> Self {
        Self {
            title: line.title,
            artists: line.artists,
            album: line.album,
            cover_url: line.cover_url,
            duration: Duration::from_millis(line.duration_ms),
        }
    }
}

/// Parse one feed line into a track event
pub fn parse_line(line: &str) -> Result<Option<TrackInformation>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let parsed: Option<TrackLine> = serde_json::from_str(line)?;
    Ok(parsed.map(TrackInformation::from))
}

/// Publish every event read from `reader` until it reaches end of input
pub async fn run_feed<R>(reader: R, now_playing: Arc<NowPlaying>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Failed to read track feed: {}", e);
                break;
            }
        };

        match parse_line(&line) {
            Ok(track) => now_playing.publish(track),
            Err(e) => tracing::warn!("Skipping malformed track line: {}", e),
        }
    }

    tracing::info!("Track feed closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_track_line() {
        let track = parse_line(
            r#"{"title":"Roygbiv","artists":["Boards of Canada"],"album":"Music Has the Right to Children","cover_url":"https://img.example/c.jpg","duration_ms":151000}"#,
        )
        .unwrap()
        .unwrap();

        assert_eq!(track.title, "Roygbiv");
        assert_eq!(track.artists, vec!["Boards of Canada"]);
        assert_eq!(track.duration, Duration::from_secs(151));
    }

    #[test]
    fn test_parse_nothing_playing() {
        assert!(parse_line("null").unwrap().is_none());
        assert!(parse_line("   ").unwrap().is_none());
    }

    #[test]
    fn test_parse_missing_optional_fields() {
        let track = parse_line(r#"{"title":"Untitled"}"#).unwrap().unwrap();
        assert!(track.artists.is_empty());
        assert_eq!(track.duration, Duration::ZERO);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_line("{not json").is_err());
        assert!(parse_line(r#"{"artists":[]}"#).is_err());
    }

    #[tokio::test]
    async fn test_feed_publishes_last_event() {
        let input: &[u8] = b"{\"title\":\"One\"}\ngarbage\n{\"title\":\"Two\",\"artists\":[\"A\"]}\n";
        let now_playing = Arc::new(NowPlaying::new());

        run_feed(input, Arc::clone(&now_playing)).await;

        assert_eq!(now_playing.current().unwrap().title, "Two");
    }
}
