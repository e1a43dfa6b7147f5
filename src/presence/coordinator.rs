//! Keeps the published presence in step with the current track and
//! reconnects whenever the chat client goes away

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;

use super::state::ConnectionState;
use super::track::{build_activity, NowPlaying, TrackInformation};
use super::traits::{ConnectParams, LogLevel, PresenceClient, PresenceConnector};
use crate::logging::forward_client_log;
use crate::settings::SettingsStore;

/// Discord application the presence is published under
pub const DEFAULT_APP_ID: i64 = 1038582701680230550;

const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// The client library treats the connection as dead if callbacks are not
/// processed at roughly this rate
const DEFAULT_PUMP_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub app_id: i64,
    pub reconnect_delay: Duration,
    pub pump_interval: Duration,
    pub client_log_level: LogLevel,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            app_id: DEFAULT_APP_ID,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            pump_interval: DEFAULT_PUMP_INTERVAL,
            client_log_level: LogLevel::Verbose,
        }
    }
}

/// Owns the presence client handle for the lifetime of the process.
///
/// Track events are turned into activity updates. Any failure to connect,
/// publish or pump callbacks closes the handle and schedules a fresh connect
/// attempt after `reconnect_delay`, forever.
pub struct PresenceCoordinator<C: PresenceConnector> {
    inner: Arc<Inner<C>>,
}

struct Inner<C: PresenceConnector> {
    connector: C,
    config: CoordinatorConfig,
    store: Arc<SettingsStore>,
    /// The single live handle; every read and write goes through this lock
    client: tokio::sync::Mutex<Option<C::Client>>,
    last_track: Mutex<Option<TrackInformation>>,
    pump: Mutex<Option<AbortHandle>>,
    tasks: Mutex<Vec<AbortHandle>>,
    retry_armed: AtomicBool,
    shut_down: AtomicBool,
    retry_tx: mpsc::UnboundedSender<()>,
    retry_rx: Mutex<Option<mpsc::UnboundedReceiver<()>>>,
}

impl<C: PresenceConnector> PresenceCoordinator<C> {
    pub fn new(connector: C, config: CoordinatorConfig, store: Arc<SettingsStore>) -> Self {
        let (retry_tx, retry_rx) = mpsc::unbounded_channel();

        Self {
            inner: Arc::new(Inner {
                connector,
                config,
                store,
                client: tokio::sync::Mutex::new(None),
                last_track: Mutex::new(None),
                pump: Mutex::new(None),
                tasks: Mutex::new(Vec::new()),
                retry_armed: AtomicBool::new(false),
                shut_down: AtomicBool::new(false),
                retry_tx,
                retry_rx: Mutex::new(Some(retry_rx)),
            }),
        }
    }

    /// Subscribe to track changes and make the first connect attempt
    pub async fn init(&self, now_playing: &NowPlaying) {
        let Some(retry_rx) = lock(&self.inner.retry_rx).take() else {
            tracing::warn!("Presence coordinator already initialized");
            return;
        };

        let listener = tokio::spawn(listen_for_tracks(
            Arc::clone(&self.inner),
            now_playing.subscribe(),
        ));
        let supervisor = tokio::spawn(run_reconnect_loop(Arc::clone(&self.inner), retry_rx));

        lock(&self.inner.tasks).extend([listener.abort_handle(), supervisor.abort_handle()]);

        // The subscription only reports later changes
        *lock(&self.inner.last_track) = now_playing.current();

        self.inner.start().await;
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.client.lock().await.is_some()
    }

    pub fn store(&self) -> &Arc<SettingsStore> {
        &self.inner.store
    }

    /// Stop every background task and release the client
    pub async fn shutdown(&self) {
        self.inner.shut_down.store(true, Ordering::SeqCst);
        self.inner.abort_tasks();

        let client = self.inner.client.lock().await.take();
        if let Some(mut client) = client {
            client.close().await;
        }

        self.inner.store.set_connected_user("");
        self.inner.store.set_connection_state(ConnectionState::Closed);
        tracing::info!("Discord RPC stopped");
    }
}

impl<C: PresenceConnector> Drop for PresenceCoordinator<C> {
    fn drop(&mut self) {
        self.inner.abort_tasks();
    }
}

async fn listen_for_tracks<C: PresenceConnector>(
    inner: Arc<Inner<C>>,
    mut tracks: watch::Receiver<Option<TrackInformation>>,
) {
    while tracks.changed().await.is_ok() {
        let track = tracks.borrow_and_update().clone();
        inner.update_presence(track).await;
    }
    tracing::debug!("Track source closed");
}

async fn run_reconnect_loop<C: PresenceConnector>(
    inner: Arc<Inner<C>>,
    mut retry_rx: mpsc::UnboundedReceiver<()>,
) {
    while retry_rx.recv().await.is_some() {
        tokio::time::sleep(inner.config.reconnect_delay).await;
        inner.retry_armed.store(false, Ordering::SeqCst);
        inner.start().await;
    }
}

impl<C: PresenceConnector> Inner<C> {
    async fn start(self: &Arc<Self>) {
        let params = ConnectParams {
            app_id: self.config.app_id,
            log_level: self.config.client_log_level,
            log_hook: Arc::new(forward_client_log),
        };

        tracing::debug!("Connecting to Discord with {:?}", params);

        let client = match self.connector.connect(&params).await {
            Ok(client) => client,
            Err(e) => {
                tracing::error!("Unable to start Discord RPC: {}", e);
                self.try_again_later().await;
                return;
            }
        };

        let stale = self.client.lock().await.replace(client);
        if let Some(mut stale) = stale {
            stale.close().await;
        }

        self.update_connected_user().await;
        self.store.set_connection_state(ConnectionState::Opened);
        self.spawn_pump();

        tracing::info!("Discord RPC successfully started");

        // Bring a fresh connection up to date with whatever is playing
        let latest = lock(&self.last_track).clone();
        if latest.is_some() {
            self.update_presence(latest).await;
        }
    }

    async fn update_connected_user(&self) {
        let username = self
            .client
            .lock()
            .await
            .as_ref()
            .and_then(|client| client.current_user())
            .unwrap_or_default();

        self.store.set_connected_user(username);
    }

    fn spawn_pump(self: &Arc<Self>) {
        let inner = Arc::clone(self);

        let pump = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.config.pump_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let result = match inner.client.lock().await.as_mut() {
                    Some(client) => client.run_callbacks(),
                    None => break,
                };

                if let Err(e) = result {
                    tracing::error!(
                        "Discord callbacks failed. Assuming Discord has been closed: {}",
                        e
                    );
                    // Teardown aborts this task, so it has to run elsewhere
                    let teardown = {
                        let inner = Arc::clone(&inner);
                        tokio::spawn(async move { inner.try_again_later().await })
                    };
                    let mut tasks = lock(&inner.tasks);
                    tasks.retain(|task| !task.is_finished());
                    tasks.push(teardown.abort_handle());
                    break;
                }
            }
        });

        if let Some(previous) = lock(&self.pump).replace(pump.abort_handle()) {
            previous.abort();
        }
    }

    async fn update_presence(&self, track: Option<TrackInformation>) {
        *lock(&self.last_track) = track.clone();

        let result = {
            let mut guard = self.client.lock().await;
            let Some(client) = guard.as_mut() else {
                return;
            };

            match &track {
                None => client
                    .clear_activity()
                    .await
                    .map(|()| ConnectionState::Opened),
                Some(track) => client
                    .set_activity(build_activity(track, SystemTime::now()))
                    .await
                    .map(|()| ConnectionState::Playing),
            }
        };

        match result {
            Ok(state) => {
                tracing::debug!("Presence updated, state is now {:?}", state);
                self.store.set_connection_state(state);
            }
            Err(e) => {
                tracing::error!(
                    "An error occurred while updating Discord RPC. Assuming Discord has been closed: {}",
                    e
                );
                self.try_again_later().await;
            }
        }
    }

    /// Tear the handle down and arm the reconnect timer if it is not already
    async fn try_again_later(&self) {
        if self.shut_down.load(Ordering::SeqCst) {
            tracing::debug!("Coordinator is shut down, not reconnecting");
            return;
        }

        if let Some(pump) = lock(&self.pump).take() {
            pump.abort();
        }

        let stale = self.client.lock().await.take();
        if let Some(mut client) = stale {
            client.close().await;
        }

        self.update_connected_user().await;
        self.store.set_connection_state(ConnectionState::Error);

        if self.retry_armed.swap(true, Ordering::SeqCst) {
            tracing::debug!("Reconnect already scheduled");
            return;
        }

        tracing::warn!(
            "Discord is unavailable, retrying in {:?}",
            self.config.reconnect_delay
        );
        if self.retry_tx.send(()).is_err() {
            tracing::error!("Reconnect loop is not running");
        }
    }

    fn abort_tasks(&self) {
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
        if let Some(pump) = lock(&self.pump).take() {
            pump.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
