use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Play counters of a single song.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongAnalytics {
    pub song_id: String,
    pub total_plays: u64,
    pub plays_last_7_days: u64,
    pub plays_last_30_days: u64,
    pub updated_at: DateTime<Utc>,
}

/// Where a play originated from (search, playlist, artist page...).
/// Free-form, as reported by the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrafficSource(pub String);

impl TrafficSource {
    /// Normalizes a client-provided source: trimmed, lowercased, and `None`
    /// when blank.
    pub fn from_client(raw: Option<&str>) -> Option<Self> {
        raw.map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .map(TrafficSource)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
