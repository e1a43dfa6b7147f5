use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;

/// Severity of a log line emitted by the presence client library
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    #[default]
    Verbose,
}

/// Callback the client library uses to hand its log lines to the host
pub type LogHook = Arc<dyn Fn(LogLevel, &str) + Send + Sync>;

/// Parameters for a single connect attempt
#[derive(Clone)]
pub struct ConnectParams {
    pub app_id: i64,
    /// Lines more verbose than this are dropped before reaching the hook
    pub log_level: LogLevel,
    pub log_hook: LogHook,
}

impl ConnectParams {
    /// Forward a client log line to the hook if it passes the level filter
    pub fn log(&self, level: LogLevel, message: &str) {
        if level <= self.log_level {
            (self.log_hook)(level, message);
        }
    }
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("app_id", &self.app_id)
            .field("log_level", &self.log_level)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Playing,
    Listening,
    Watching,
}

/// The presence payload sent to the chat client
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub kind: ActivityKind,
    pub details: String,
    pub state: String,
    pub start: SystemTime,
    pub end: SystemTime,
    pub large_image: String,
    pub large_text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    #[error("Chat client is not available: {0}")]
    Unavailable(String),

    #[error("Timed out waiting for the chat client handshake")]
    HandshakeTimeout,

    #[error("Connection to the chat client was lost: {0}")]
    Disconnected(String),

    #[error("Presence client is closed")]
    Closed,

    #[error("Chat client rejected the request: {0}")]
    Rejected(String),
}

/// Factory for presence client handles
#[async_trait]
pub trait PresenceConnector: Send + Sync + 'static {
    type Client: PresenceClient;

    /// Create a live handle, or fail if the chat client cannot be reached
    async fn connect(&self, params: &ConnectParams) -> Result<Self::Client, PresenceError>;
}

/// A live handle to the chat client's local presence API.
///
/// Every operation may fail to signal that the connection is gone.
#[async_trait]
pub trait PresenceClient: Send + 'static {
    /// Username of the authenticated user, if the client knows one
    fn current_user(&self) -> Option<String>;

    async fn set_activity(&mut self, activity: Activity) -> Result<(), PresenceError>;

    async fn clear_activity(&mut self) -> Result<(), PresenceError>;

    /// Process pending client callbacks; must be called regularly
    fn run_callbacks(&mut self) -> Result<(), PresenceError>;

    /// Release the connection. Calling it twice is harmless.
    async fn close(&mut self);
}
