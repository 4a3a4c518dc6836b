//! SQLite schema definitions for the GreenBox database.
//!
//! Holds artists, songs, follows, community posts, notifications and
//! per-song play analytics.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, ForeignKey, SqlType, Table, VersionedSchema};

const ARTIST_FK: ForeignKey = ForeignKey {
    foreign_table: "artist_profiles",
    foreign_column: "id",
    cascade_on_delete: true,
};

const SONG_FK: ForeignKey = ForeignKey {
    foreign_table: "songs",
    foreign_column: "id",
    cascade_on_delete: true,
};

// =============================================================================
// Version 1 - Catalog, social and analytics
// =============================================================================

const ARTIST_PROFILES_TABLE_V1: Table = Table {
    name: "artist_profiles",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("stage_name", &SqlType::Text, non_null = true),
        sqlite_column!("user_id", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_artist_profiles_user", "user_id")],
    unique_constraints: &[],
};

const SONGS_TABLE_V1: Table = Table {
    name: "songs",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!(
            "artist_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ARTIST_FK)
        ),
        sqlite_column!("is_draft", &SqlType::Integer, non_null = true, default_value = Some("1")),
        sqlite_column!("is_published", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("is_scheduled", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("scheduled_release_at", &SqlType::Text),
        sqlite_column!("published_at", &SqlType::Text),
        sqlite_column!("cover_image_url", &SqlType::Text),
        sqlite_column!("description", &SqlType::Text),
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
    ],
    indices: &[
        ("idx_songs_artist", "artist_id"),
        (
            "idx_songs_schedule",
            "is_scheduled, is_published, scheduled_release_at",
        ),
    ],
    unique_constraints: &[],
};

const FOLLOWS_TABLE_V1: Table = Table {
    name: "follows",
    columns: &[
        sqlite_column!("user_id", &SqlType::Text, non_null = true),
        sqlite_column!(
            "artist_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ARTIST_FK)
        ),
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_follows_artist", "artist_id")],
    unique_constraints: &[&["user_id", "artist_id"]],
};

const COMMUNITY_POSTS_TABLE_V1: Table = Table {
    name: "community_posts",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!(
            "artist_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ARTIST_FK)
        ),
        sqlite_column!("song_id", &SqlType::Text),
        sqlite_column!("content", &SqlType::Text, non_null = true),
        sqlite_column!("image_url", &SqlType::Text),
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_community_posts_artist", "artist_id, created_at DESC")],
    unique_constraints: &[],
};

const NOTIFICATIONS_TABLE_V1: Table = Table {
    name: "notifications",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("user_id", &SqlType::Text, non_null = true),
        sqlite_column!("notification_type", &SqlType::Text, non_null = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("message", &SqlType::Text, non_null = true),
        sqlite_column!("link", &SqlType::Text),
        sqlite_column!("metadata", &SqlType::Text, non_null = true),
        sqlite_column!("is_read", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_notifications_user", "user_id, created_at DESC")],
    unique_constraints: &[],
};

const SONG_ANALYTICS_TABLE_V1: Table = Table {
    name: "song_analytics",
    columns: &[
        sqlite_column!(
            "song_id",
            &SqlType::Text,
            is_primary_key = true,
            foreign_key = Some(&SONG_FK)
        ),
        sqlite_column!("total_plays", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!(
            "plays_last_7_days",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "plays_last_30_days",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("updated_at", &SqlType::Text, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[],
};

// =============================================================================
// Version 2 - Play events with traffic source
// =============================================================================

const PLAY_EVENTS_TABLE_V2: Table = Table {
    name: "play_events",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "song_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&SONG_FK)
        ),
        sqlite_column!("traffic_source", &SqlType::Text),
        sqlite_column!("played_at", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_play_events_song", "song_id, played_at")],
    unique_constraints: &[],
};

/// Migration from version 1 to version 2: add play_events table
fn migrate_v1_to_v2(conn: &rusqlite::Connection) -> anyhow::Result<()> {
    PLAY_EVENTS_TABLE_V2.create(conn)
}

pub const GREENBOX_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 1,
        tables: &[
            ARTIST_PROFILES_TABLE_V1,
            SONGS_TABLE_V1,
            FOLLOWS_TABLE_V1,
            COMMUNITY_POSTS_TABLE_V1,
            NOTIFICATIONS_TABLE_V1,
            SONG_ANALYTICS_TABLE_V1,
        ],
        migration: None,
    },
    VersionedSchema {
        version: 2,
        tables: &[
            ARTIST_PROFILES_TABLE_V1,
            SONGS_TABLE_V1,
            FOLLOWS_TABLE_V1,
            COMMUNITY_POSTS_TABLE_V1,
            NOTIFICATIONS_TABLE_V1,
            SONG_ANALYTICS_TABLE_V1,
            PLAY_EVENTS_TABLE_V2,
        ],
        migration: Some(migrate_v1_to_v2),
    },
];
