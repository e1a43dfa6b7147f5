pub mod discord;
pub mod feed;
pub mod logging;
pub mod presence;
pub mod settings;

pub use presence::{
    ConnectionState, CoordinatorConfig, NowPlaying, PresenceCoordinator, TrackInformation,
};
pub use settings::{AppSettings, SettingsStore};
