//! Notification data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notification type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    NewRelease,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::NewRelease => "new_release",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new_release" => Some(NotificationType::NewRelease),
            _ => None,
        }
    }
}

/// A user notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub metadata: serde_json::Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// A notification about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: String,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub metadata: serde_json::Value,
}

/// Metadata payload for NewRelease notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReleaseData {
    pub song_id: String,
    pub artist_id: String,
    pub artist_name: String,
}
