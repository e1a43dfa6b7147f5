mod coordinator;
mod state;
mod track;
mod traits;

pub use coordinator::{CoordinatorConfig, PresenceCoordinator, DEFAULT_APP_ID};
pub use state::ConnectionState;
pub use track::{build_activity, NowPlaying, TrackInformation};
pub use traits::{
    Activity, ActivityKind, ConnectParams, LogHook, LogLevel, PresenceClient, PresenceConnector,
    PresenceError,
};
