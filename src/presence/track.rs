//! Track information and the "now playing" event source

use std::time::{Duration, SystemTime};

use tokio::sync::watch;

use super::traits::{Activity, ActivityKind};

/// The track currently playing in the music player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInformation {
    pub title: String,
    pub artists: Vec<String>,
    pub album: String,
    pub cover_url: String,
    pub duration: Duration,
}

impl TrackInformation {
    /// Artists joined the way they are shown in the status line
    pub fn joined_artists(&self) -> String {
        self.artists.join(", ")
    }
}

/// Build the listening activity for `track`, starting at `now`
pub fn build_activity(track: &TrackInformation, now: SystemTime) -> Activity {
    Activity {
        kind: ActivityKind::Listening,
        details: track.title.clone(),
        state: track.joined_artists(),
        start: now,
        end: now + track.duration,
        large_image: track.cover_url.clone(),
        large_text: track.album.clone(),
    }
}

/// Observable slot holding the latest track, `None` when nothing is playing.
///
/// Subscribers see every change made after they subscribe. Bursts of updates
/// collapse into the most recent value.
#[derive(Debug)]
pub struct NowPlaying {
    tx: watch::Sender<Option<TrackInformation>>,
}

impl NowPlaying {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn publish(&self, track: Option<TrackInformation>) {
        tracing::debug!(
            "Now playing: {}",
            track.as_ref().map(|t| t.title.as_str()).unwrap_or("<nothing>")
        );
        self.tx.send_replace(track);
    }

    pub fn current(&self) -> Option<TrackInformation> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<TrackInformation>> {
        self.tx.subscribe()
    }
}

impl Default for NowPlaying {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) fn sample_track(artists: &[&str]) -> TrackInformation {
    TrackInformation {
        title: "Windowlicker".to_string(),
        artists: artists.iter().map(|a| a.to_string()).collect(),
        album: "Windowlicker EP".to_string(),
        cover_url: "https://resources.example.com/images/cover.jpg".to_string(),
        duration: Duration::from_secs(367),
    }
}
