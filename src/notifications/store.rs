//! Notification storage trait

use anyhow::Result;

use super::models::{NewNotification, Notification};

/// Trait for notification storage operations
pub trait NotificationStore: Send + Sync {
    /// Insert a batch of notifications atomically: either all rows are
    /// stored or none. Returns the stored notifications in input order.
    fn insert_notifications(&self, batch: Vec<NewNotification>) -> Result<Vec<Notification>>;

    /// Get all notifications for a user, newest first.
    fn get_user_notifications(&self, user_id: &str) -> Result<Vec<Notification>>;

    /// Mark a notification as read. Returns false if it doesn't exist or
    /// doesn't belong to the user.
    fn mark_notification_read(&self, notification_id: &str, user_id: &str) -> Result<bool>;

    /// Delete a notification owned by the user. Returns false if nothing was deleted.
    fn delete_notification(&self, notification_id: &str, user_id: &str) -> Result<bool>;

    fn get_unread_count(&self, user_id: &str) -> Result<usize>;
}
