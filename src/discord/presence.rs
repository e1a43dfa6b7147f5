//! Discord Rich Presence client using discord-sdk

use std::time::Duration;

use async_trait::async_trait;
use discord_sdk::{
    activity::{self, ActivityBuilder, Assets},
    user::User,
    wheel::{UserSpoke, UserState, Wheel},
    Discord, Subscriptions,
};

use crate::presence::{
    Activity, ActivityKind, ConnectParams, LogLevel, PresenceClient, PresenceConnector,
    PresenceError,
};

/// Timeout for waiting for Discord handshake
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens connections to the local Discord client
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscordConnector;

/// A live connection to the local Discord client
pub struct DiscordClient {
    discord: Option<Discord>,
    user_spoke: UserSpoke,
    // Spokes stop receiving updates once the wheel is dropped
    _wheel: Wheel,
}

#[async_trait]
impl PresenceConnector for DiscordConnector {
    type Client = DiscordClient;

    async fn connect(&self, params: &ConnectParams) -> Result<DiscordClient, PresenceError> {
        let hook = params.clone();
        let (wheel, handler) = Wheel::new(Box::new(move |err| {
            hook.log(LogLevel::Warn, &format!("Discord error: {:?}", err));
        }));

        let mut user_spoke = wheel.user();

        let discord = Discord::new(params.app_id, Subscriptions::ACTIVITY, Box::new(handler))
            .map_err(|e| PresenceError::Unavailable(format!("{:?}", e)))?;

        params.log(LogLevel::Info, "Discord connecting...");

        let handshake = tokio::time::timeout(HANDSHAKE_TIMEOUT, wait_for_user(&mut user_spoke))
            .await
            .unwrap_or(Err(PresenceError::HandshakeTimeout));

        let user = match handshake {
            Ok(user) => user,
            Err(e) => {
                discord.disconnect().await;
                return Err(e);
            }
        };

        params.log(
            LogLevel::Info,
            &format!(
                "Discord Rich Presence connected as {}#{}",
                user.username,
                user.discriminator.unwrap_or(0)
            ),
        );

        Ok(DiscordClient {
            discord: Some(discord),
            user_spoke,
            _wheel: wheel,
        })
    }
}

async fn wait_for_user(user_spoke: &mut UserSpoke) -> Result<User, PresenceError> {
    if user_spoke.0.changed().await.is_err() {
        return Err(PresenceError::Disconnected(
            "Discord connection closed".to_string(),
        ));
    }

    match &*user_spoke.0.borrow() {
        UserState::Connected(user) => Ok(user.clone()),
        UserState::Disconnected(err) => Err(PresenceError::Disconnected(format!("{:?}", err))),
    }
}

fn sdk_kind(kind: ActivityKind) -> activity::ActivityKind {
    match kind {
        ActivityKind::Playing => activity::ActivityKind::Playing,
        ActivityKind::Listening => activity::ActivityKind::Listening,
        ActivityKind::Watching => activity::ActivityKind::Watching,
    }
}

fn activity_builder(activity: Activity) -> ActivityBuilder {
    let mut builder = ActivityBuilder::new()
        .kind(sdk_kind(activity.kind))
        .details(activity.details)
        .start_timestamp(activity.start)
        .end_timestamp(activity.end)
        .assets(Assets::default().large(activity.large_image, Some(activity.large_text)));

    // Discord rejects empty status lines
    if !activity.state.is_empty() {
        builder = builder.state(activity.state);
    }

    builder
}

impl DiscordClient {
    fn discord(&self) -> Result<&Discord, PresenceError> {
        self.discord.as_ref().ok_or(PresenceError::Closed)
    }
}

#[async_trait]
impl PresenceClient for DiscordClient {
    fn current_user(&self) -> Option<String> {
        match &*self.user_spoke.0.borrow() {
            UserState::Connected(user) => Some(user.username.clone()),
            UserState::Disconnected(_) => None,
        }
    }

    async fn set_activity(&mut self, activity: Activity) -> Result<(), PresenceError> {
        self.discord()?
            .update_activity(activity_builder(activity))
            .await
            .map(|_| ())
            .map_err(|e| PresenceError::Rejected(format!("{:?}", e)))
    }

    async fn clear_activity(&mut self) -> Result<(), PresenceError> {
        self.discord()?
            .clear_activity()
            .await
            .map(|_| ())
            .map_err(|e| PresenceError::Rejected(format!("{:?}", e)))
    }

    fn run_callbacks(&mut self) -> Result<(), PresenceError> {
        self.discord()?;

        match &*self.user_spoke.0.borrow() {
            UserState::Connected(_) => Ok(()),
            UserState::Disconnected(err) => Err(PresenceError::Disconnected(format!("{:?}", err))),
        }
    }

    async fn close(&mut self) {
        if let Some(discord) = self.discord.take() {
            discord.disconnect().await;
            tracing::info!("Discord Rich Presence disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn payload(activity: Activity) -> serde_json::Value {
        serde_json::to_value(activity::ActivityArgs::from(activity_builder(activity))).unwrap()
    }

    fn listening(state: &str) -> Activity {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        Activity {
            kind: ActivityKind::Listening,
            details: "Roygbiv".to_string(),
            state: state.to_string(),
            start,
            end: start + Duration::from_secs(151),
            large_image: "https://img.example/c.jpg".to_string(),
            large_text: "Music Has the Right to Children".to_string(),
        }
    }

    #[test]
    fn test_builder_sends_listening_kind() {
        let json = payload(listening("Boards of Canada")).to_string();

        assert!(json.contains(r#""type":2"#), "payload was {}", json);
        assert!(json.contains(r#""details":"Roygbiv""#));
        assert!(json.contains(r#""state":"Boards of Canada""#));
        assert!(json.contains("https://img.example/c.jpg"));
    }

    #[test]
    fn test_builder_omits_empty_state() {
        let json = payload(listening("")).to_string();

        assert!(json.contains(r#""type":2"#));
        assert!(
            !json.contains(r#""state":"#) || json.contains(r#""state":null"#),
            "payload was {}",
            json
        );
    }

    #[test]
    fn test_kind_mapping() {
        assert!(matches!(
            sdk_kind(ActivityKind::Playing),
            activity::ActivityKind::Playing
        ));
        assert!(matches!(
            sdk_kind(ActivityKind::Watching),
            activity::ActivityKind::Watching
        ));
    }
}
