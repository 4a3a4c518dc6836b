//! Scheduled release publishing.
//!
//! A run selects every due song, claims it with a conditional update, then
//! posts the release to the artist's community feed and notifies the
//! artist's followers. Side-effect failures are logged and counted but never
//! undo a publish.

mod auth;
mod publisher;

pub use auth::{TriggerAuthError, TriggerAuthenticator, TriggerCredential, TriggerSecrets};
pub use publisher::{
    build_release_notifications, release_post_content, PublishError, PublishReport,
    ReleasePublisher,
};
