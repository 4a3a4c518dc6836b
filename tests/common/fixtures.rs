//! Test data seeding

use super::constants::*;
use chrono::{DateTime, Utc};
use greenbox_server::music::{NewSong, ReleaseStore, Song};
use greenbox_server::SqliteGreenboxStore;

/// Creates the seeded artist and its two followers.
pub fn seed_artist(store: &SqliteGreenboxStore) -> anyhow::Result<()> {
    store.create_artist(Some(ARTIST_ID), ARTIST_STAGE_NAME, ARTIST_OWNER_ID)?;
    store.follow_artist(FOLLOWER_1_ID, ARTIST_ID)?;
    store.follow_artist(FOLLOWER_2_ID, ARTIST_ID)?;
    Ok(())
}

/// Creates a song by the seeded artist, scheduled at `release_at` when given.
pub fn seed_song(
    store: &SqliteGreenboxStore,
    id: &str,
    title: &str,
    release_at: Option<DateTime<Utc>>,
) -> Song {
    store
        .create_song(NewSong {
            id: Some(id.to_string()),
            title: title.to_string(),
            artist_id: ARTIST_ID.to_string(),
            scheduled_release_at: release_at,
            ..Default::default()
        })
        .expect("Failed to seed song")
}

pub fn seed_follower(store: &SqliteGreenboxStore, user_id: &str) {
    store
        .follow_artist(user_id, ARTIST_ID)
        .expect("Failed to seed follower");
}
