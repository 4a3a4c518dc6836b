//! Session-scoped play counting.
//!
//! A [`PlayTracker`] waits until a song has been listened to for the play
//! threshold, then asks its [`PlayCounter`] to record the play.

mod counter;
mod http_counter;
mod tracker;

pub use counter::{PlayCounter, StorePlayCounter};
pub use http_counter::{HttpPlayCounter, INCREMENT_PLAY_COUNT_PATH};
pub use tracker::{PlayTracker, DEFAULT_PLAY_THRESHOLD};
