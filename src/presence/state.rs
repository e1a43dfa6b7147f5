use std::cmp::Ordering;

/// Relationship between the coordinator and the chat client, as reported to
/// the settings store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    #[default]
    Closed,
    Opened,
    Playing,
    Error,
}

impl ConnectionState {
    /// Rank used when two reported states compete; higher wins.
    pub const fn importance(self) -> u8 {
        match self {
            ConnectionState::Closed => 1,
            ConnectionState::Opened => 2,
            ConnectionState::Playing => 3,
            ConnectionState::Error => 4,
        }
    }

    /// Returns whichever of the two states is more important.
    pub fn prioritize(self, other: ConnectionState) -> ConnectionState {
        if other > self {
            other
        } else {
            self
        }
    }
}

impl PartialOrd for ConnectionState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ConnectionState {
    fn cmp(&self, other: &Self) -> Ordering {
        self.importance().cmp(&other.importance())
    }
}
