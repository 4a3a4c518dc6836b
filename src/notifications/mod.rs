//! User notifications module

mod models;
mod store;

pub use models::{NewNotification, NewReleaseData, Notification, NotificationType};
pub use store::NotificationStore;
