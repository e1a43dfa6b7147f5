mod presence;

pub use presence::{DiscordClient, DiscordConnector};
