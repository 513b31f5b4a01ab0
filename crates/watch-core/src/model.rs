use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Placeholder name the flash feed uses when a player withheld their identity.
pub const ANONYMOUS_PLAYER: &str = "ANONYMOUS";

/// Lowest rank tracked by a snapshot.
pub const MAX_TRACKED_RANK: u32 = 50;

/// One ranked leaderboard entry.
///
/// Identity is structural: two entries are equal iff `name`, `score` and
/// `invaders_count` all match. `rank` and `city_count` are excluded so a
/// player can move rank without counting as changed. Known limitation: the
/// upstream API exposes no stable player id, so two real-world players with
/// coincidentally identical (name, score, invaders) are indistinguishable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerEntry {
    pub name: String,
    pub score: i64,
    pub invaders_count: i64,
    pub rank: u32,
    pub city_count: u32,
}

impl PlayerEntry {
    /// Per-player notification channel id: lowercased, non-alphanumerics
    /// stripped (Slack channel naming rules).
    pub fn channel_name(&self) -> String {
        self.name
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect()
    }
}

impl PartialEq for PlayerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.score == other.score
            && self.invaders_count == other.invaders_count
    }
}

impl Eq for PlayerEntry {}

impl Hash for PlayerEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.score.hash(state);
        self.invaders_count.hash(state);
    }
}

impl fmt::Display for PlayerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}. {} {} pts ({})",
            self.rank, self.name, self.score, self.invaders_count
        )
    }
}

/// A captured top-50 leaderboard state, produced atomically from one API
/// response. Entries above rank 50 are dropped at construction; the snapshot
/// is never mutated afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    entries: Vec<PlayerEntry>,
}

impl Snapshot {
    pub fn from_entries(entries: Vec<PlayerEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .filter(|e| e.rank <= MAX_TRACKED_RANK)
                .collect(),
        }
    }

    pub fn entries(&self) -> &[PlayerEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A player-reported capture from the secondary "flash" feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashEvent {
    pub player: String,
    pub city: String,
    /// Epoch seconds, on the feed server's clock.
    pub timestamp: i64,
    #[serde(rename = "img")]
    pub image_ref: String,
}

impl FlashEvent {
    pub fn is_anonymous(&self) -> bool {
        self.player == ANONYMOUS_PLAYER
    }
}

/// The flash feed captured alongside a leaderboard snapshot. The server
/// timestamp is the reference "now" for recency filtering and doubles as the
/// persistence path seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashFeedSnapshot {
    pub server_timestamp: i64,
    pub events: Vec<FlashEvent>,
}
