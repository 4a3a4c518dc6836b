use anyhow::Result;
use chrono::{DateTime, Utc};

use super::models::{ArtistProfile, CommunityPost, DueSong, NewCommunityPost, NewSong, Song};

/// Storage for artists, songs, follows and community posts.
pub trait ReleaseStore: Send + Sync {
    /// Creates an artist profile. Returns the stored profile.
    fn create_artist(&self, id: Option<&str>, stage_name: &str, user_id: &str)
        -> Result<ArtistProfile>;

    fn get_artist(&self, artist_id: &str) -> Result<Option<ArtistProfile>>;

    /// Creates a song together with its (zeroed) analytics row.
    fn create_song(&self, song: NewSong) -> Result<Song>;

    fn get_song(&self, song_id: &str) -> Result<Option<Song>>;

    /// Songs that are scheduled, unpublished and whose release time is at or
    /// before `now`, joined with their artist, oldest release first.
    fn get_due_songs(&self, now: DateTime<Utc>) -> Result<Vec<DueSong>>;

    /// Flips a due song to published.
    ///
    /// The update only applies while the song is still scheduled and
    /// unpublished. Returns false when no row changed, meaning some other run
    /// already published it (or it was unscheduled in the meantime).
    fn publish_song(&self, song_id: &str, published_at: DateTime<Utc>) -> Result<bool>;

    fn create_community_post(&self, post: NewCommunityPost) -> Result<CommunityPost>;

    /// Community posts of an artist, newest first.
    fn get_artist_posts(&self, artist_id: &str) -> Result<Vec<CommunityPost>>;

    /// Follows an artist. Following twice is a no-op.
    fn follow_artist(&self, user_id: &str, artist_id: &str) -> Result<()>;

    fn unfollow_artist(&self, user_id: &str, artist_id: &str) -> Result<()>;

    /// Ids of all users following the artist.
    fn get_follower_ids(&self, artist_id: &str) -> Result<Vec<String>>;
}
