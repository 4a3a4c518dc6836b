//! Artists, songs, follows and community posts

mod models;
mod store;

pub use models::{ArtistProfile, CommunityPost, DueSong, NewCommunityPost, NewSong, Song};
pub use store::ReleaseStore;
