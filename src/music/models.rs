//! Song, artist and community data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public profile of an artist. Owned by a platform user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistProfile {
    pub id: String,
    pub stage_name: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: String,
    pub title: String,
    pub artist_id: String,
    pub is_draft: bool,
    pub is_published: bool,
    pub is_scheduled: bool,
    pub scheduled_release_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub cover_image_url: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Song {
    /// Scheduled, not yet published, and its release time has passed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_scheduled
            && !self.is_published
            && self.scheduled_release_at.is_some_and(|at| at <= now)
    }
}

/// Input for creating a song.
#[derive(Debug, Clone, Default)]
pub struct NewSong {
    /// Caller-provided id, a UUID is generated when absent.
    pub id: Option<String>,
    pub title: String,
    pub artist_id: String,
    pub cover_image_url: Option<String>,
    pub description: Option<String>,
    /// When set the song is created scheduled, otherwise as a draft.
    pub scheduled_release_at: Option<DateTime<Utc>>,
}

/// A due song joined with the profile of its artist.
#[derive(Debug, Clone, PartialEq)]
pub struct DueSong {
    pub song: Song,
    pub artist: ArtistProfile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityPost {
    pub id: String,
    pub artist_id: String,
    pub song_id: Option<String>,
    pub content: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a community post.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCommunityPost {
    pub artist_id: String,
    pub song_id: Option<String>,
    pub content: String,
    pub image_url: Option<String>,
}
