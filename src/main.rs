use std::sync::Arc;

use nowplaying_presence::discord::DiscordConnector;
use nowplaying_presence::settings::{load_settings, save_settings, AppSettings};
use nowplaying_presence::{feed, logging, NowPlaying, PresenceCoordinator, SettingsStore};

#[tokio::main]
async fn main() {
    let _log_guard = logging::init_logging();

    let settings = load_settings().unwrap_or_else(|e| {
        tracing::warn!("Failed to load settings, using defaults: {}", e);
        AppSettings::default()
    });
    if let Err(e) = save_settings(&settings) {
        tracing::warn!("Failed to save settings: {}", e);
    }

    let store = Arc::new(SettingsStore::new());
    let now_playing = Arc::new(NowPlaying::new());

    tokio::spawn(feed::run_feed(
        tokio::io::BufReader::new(tokio::io::stdin()),
        Arc::clone(&now_playing),
    ));

    let mut connected_user = store.watch_connected_user();
    tokio::spawn(async move {
        while connected_user.changed().await.is_ok() {
            let user = connected_user.borrow_and_update().clone();
            if user.is_empty() {
                tracing::info!("No Discord user connected");
            } else {
                tracing::info!("Connected to Discord as {}", user);
            }
        }
    });

    let coordinator = PresenceCoordinator::new(
        DiscordConnector,
        settings.coordinator_config(),
        Arc::clone(&store),
    );
    coordinator.init(&now_playing).await;

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }

    tracing::info!("Shutting down");
    coordinator.shutdown().await;
}
