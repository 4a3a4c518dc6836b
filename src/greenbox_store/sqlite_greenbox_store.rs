use super::schema::GREENBOX_VERSIONED_SCHEMAS;
use crate::analytics::{AnalyticsStore, IncrementError, SongAnalytics, TrafficSource};
use crate::music::{
    ArtistProfile, CommunityPost, DueSong, NewCommunityPost, NewSong, ReleaseStore, Song,
};
use crate::notifications::{NewNotification, Notification, NotificationStore, NotificationType};
use crate::sqlite_persistence::open_versioned_db;
use anyhow::{anyhow, Result};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const SONG_COLUMNS: &str = "s.id, s.title, s.artist_id, s.is_draft, s.is_published, \
     s.is_scheduled, s.scheduled_release_at, s.published_at, s.cover_image_url, \
     s.description, s.created_at";

/// Fixed-width RFC 3339 so that timestamps compare correctly as text.
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time at the precision timestamps are stored with.
fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

fn parse_datetime(row: &Row, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            let index = row.as_ref().column_index(column).unwrap_or(0);
            rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
        })
}

fn parse_optional_datetime(row: &Row, column: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(column)?;
    match raw {
        None => Ok(None),
        Some(_) => parse_datetime(row, column).map(Some),
    }
}

pub struct SqliteGreenboxStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteGreenboxStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned_db(db_path, GREENBOX_VERSIONED_SCHEMAS, "greenbox")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("greenbox database mutex poisoned"))
    }

    fn row_to_song(row: &Row) -> rusqlite::Result<Song> {
        Ok(Song {
            id: row.get("id")?,
            title: row.get("title")?,
            artist_id: row.get("artist_id")?,
            is_draft: row.get("is_draft")?,
            is_published: row.get("is_published")?,
            is_scheduled: row.get("is_scheduled")?,
            scheduled_release_at: parse_optional_datetime(row, "scheduled_release_at")?,
            published_at: parse_optional_datetime(row, "published_at")?,
            cover_image_url: row.get("cover_image_url")?,
            description: row.get("description")?,
            created_at: parse_datetime(row, "created_at")?,
        })
    }

    fn row_to_post(row: &Row) -> rusqlite::Result<CommunityPost> {
        Ok(CommunityPost {
            id: row.get("id")?,
            artist_id: row.get("artist_id")?,
            song_id: row.get("song_id")?,
            content: row.get("content")?,
            image_url: row.get("image_url")?,
            created_at: parse_datetime(row, "created_at")?,
        })
    }

    fn row_to_notification(row: &Row) -> rusqlite::Result<Notification> {
        let type_str: String = row.get("notification_type")?;
        let notification_type = NotificationType::parse(&type_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                Type::Text,
                format!("unknown notification type {}", type_str).into(),
            )
        })?;
        let metadata: String = row.get("metadata")?;

        Ok(Notification {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            notification_type,
            title: row.get("title")?,
            message: row.get("message")?,
            link: row.get("link")?,
            metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
            is_read: row.get("is_read")?,
            created_at: parse_datetime(row, "created_at")?,
        })
    }

    fn row_to_analytics(row: &Row) -> rusqlite::Result<SongAnalytics> {
        Ok(SongAnalytics {
            song_id: row.get("song_id")?,
            total_plays: row.get::<_, i64>("total_plays")? as u64,
            plays_last_7_days: row.get::<_, i64>("plays_last_7_days")? as u64,
            plays_last_30_days: row.get::<_, i64>("plays_last_30_days")? as u64,
            updated_at: parse_datetime(row, "updated_at")?,
        })
    }

    fn query_analytics(conn: &Connection, song_id: &str) -> Result<Option<SongAnalytics>> {
        Ok(conn
            .query_row(
                "SELECT * FROM song_analytics WHERE song_id = ?1",
                params![song_id],
                Self::row_to_analytics,
            )
            .optional()?)
    }

    fn try_increment(
        &self,
        song_id: &str,
        traffic_source: Option<&TrafficSource>,
    ) -> Result<Option<SongAnalytics>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = format_datetime(&Utc::now());

        let changed = tx.execute(
            "UPDATE song_analytics SET \
                total_plays = total_plays + 1, \
                plays_last_7_days = plays_last_7_days + 1, \
                plays_last_30_days = plays_last_30_days + 1, \
                updated_at = ?2 \
             WHERE song_id = ?1",
            params![song_id, now],
        )?;
        if changed == 0 {
            return Ok(None);
        }

        tx.execute(
            "INSERT INTO play_events (song_id, traffic_source, played_at) VALUES (?1, ?2, ?3)",
            params![song_id, traffic_source.map(|s| s.as_str()), now],
        )?;
        let analytics = Self::query_analytics(&tx, song_id)?;
        tx.commit()?;
        Ok(analytics)
    }
}

impl ReleaseStore for SqliteGreenboxStore {
    fn create_artist(
        &self,
        id: Option<&str>,
        stage_name: &str,
        user_id: &str,
    ) -> Result<ArtistProfile> {
        let artist = ArtistProfile {
            id: id
                .map(|s| s.to_string())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            stage_name: stage_name.to_string(),
            user_id: user_id.to_string(),
        };
        self.conn()?.execute(
            "INSERT INTO artist_profiles (id, stage_name, user_id) VALUES (?1, ?2, ?3)",
            params![artist.id, artist.stage_name, artist.user_id],
        )?;
        Ok(artist)
    }

    fn get_artist(&self, artist_id: &str) -> Result<Option<ArtistProfile>> {
        Ok(self
            .conn()?
            .query_row(
                "SELECT id, stage_name, user_id FROM artist_profiles WHERE id = ?1",
                params![artist_id],
                |row| {
                    Ok(ArtistProfile {
                        id: row.get(0)?,
                        stage_name: row.get(1)?,
                        user_id: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    fn create_song(&self, new_song: NewSong) -> Result<Song> {
        let now = now_millis();
        let is_scheduled = new_song.scheduled_release_at.is_some();
        let song = Song {
            id: new_song
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            title: new_song.title,
            artist_id: new_song.artist_id,
            is_draft: !is_scheduled,
            is_published: false,
            is_scheduled,
            scheduled_release_at: new_song.scheduled_release_at.map(|at| at.trunc_subsecs(3)),
            published_at: None,
            cover_image_url: new_song.cover_image_url,
            description: new_song.description,
            created_at: now,
        };

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO songs (id, title, artist_id, is_draft, is_published, is_scheduled, \
             scheduled_release_at, published_at, cover_image_url, description, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                song.id,
                song.title,
                song.artist_id,
                song.is_draft,
                song.is_published,
                song.is_scheduled,
                song.scheduled_release_at.as_ref().map(format_datetime),
                song.published_at.as_ref().map(format_datetime),
                song.cover_image_url,
                song.description,
                format_datetime(&song.created_at),
            ],
        )?;
        tx.execute(
            "INSERT INTO song_analytics (song_id, updated_at) VALUES (?1, ?2)",
            params![song.id, format_datetime(&now)],
        )?;
        tx.commit()?;
        Ok(song)
    }

    fn get_song(&self, song_id: &str) -> Result<Option<Song>> {
        Ok(self
            .conn()?
            .query_row(
                &format!("SELECT {} FROM songs s WHERE s.id = ?1", SONG_COLUMNS),
                params![song_id],
                Self::row_to_song,
            )
            .optional()?)
    }

    fn get_due_songs(&self, now: DateTime<Utc>) -> Result<Vec<DueSong>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {}, a.stage_name AS artist_stage_name, a.user_id AS artist_user_id \
             FROM songs s JOIN artist_profiles a ON a.id = s.artist_id \
             WHERE s.is_scheduled = 1 AND s.is_published = 0 \
               AND s.scheduled_release_at IS NOT NULL AND s.scheduled_release_at <= ?1 \
             ORDER BY s.scheduled_release_at ASC, s.id ASC",
            SONG_COLUMNS
        ))?;
        let due = stmt
            .query_map(params![format_datetime(&now)], |row| {
                let song = Self::row_to_song(row)?;
                let artist = ArtistProfile {
                    id: song.artist_id.clone(),
                    stage_name: row.get("artist_stage_name")?,
                    user_id: row.get("artist_user_id")?,
                };
                Ok(DueSong { song, artist })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        debug!("Found {} due songs at {}", due.len(), now);
        Ok(due)
    }

    fn publish_song(&self, song_id: &str, published_at: DateTime<Utc>) -> Result<bool> {
        let changed = self.conn()?.execute(
            "UPDATE songs SET is_published = 1, is_scheduled = 0, is_draft = 0, published_at = ?2 \
             WHERE id = ?1 AND is_scheduled = 1 AND is_published = 0",
            params![song_id, format_datetime(&published_at)],
        )?;
        Ok(changed == 1)
    }

    fn create_community_post(&self, post: NewCommunityPost) -> Result<CommunityPost> {
        let post = CommunityPost {
            id: uuid::Uuid::new_v4().to_string(),
            artist_id: post.artist_id,
            song_id: post.song_id,
            content: post.content,
            image_url: post.image_url,
            created_at: now_millis(),
        };
        self.conn()?.execute(
            "INSERT INTO community_posts (id, artist_id, song_id, content, image_url, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                post.id,
                post.artist_id,
                post.song_id,
                post.content,
                post.image_url,
                format_datetime(&post.created_at),
            ],
        )?;
        Ok(post)
    }

    fn get_artist_posts(&self, artist_id: &str) -> Result<Vec<CommunityPost>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM community_posts WHERE artist_id = ?1 \
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let posts = stmt
            .query_map(params![artist_id], Self::row_to_post)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(posts)
    }

    fn follow_artist(&self, user_id: &str, artist_id: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT OR IGNORE INTO follows (user_id, artist_id, created_at) VALUES (?1, ?2, ?3)",
            params![user_id, artist_id, format_datetime(&Utc::now())],
        )?;
        Ok(())
    }

    fn unfollow_artist(&self, user_id: &str, artist_id: &str) -> Result<()> {
        self.conn()?.execute(
            "DELETE FROM follows WHERE user_id = ?1 AND artist_id = ?2",
            params![user_id, artist_id],
        )?;
        Ok(())
    }

    fn get_follower_ids(&self, artist_id: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT user_id FROM follows WHERE artist_id = ?1 ORDER BY created_at, user_id",
        )?;
        let ids = stmt
            .query_map(params![artist_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }
}

impl NotificationStore for SqliteGreenboxStore {
    fn insert_notifications(&self, batch: Vec<NewNotification>) -> Result<Vec<Notification>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let created_at = now_millis();
        let mut stored = Vec::with_capacity(batch.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO notifications \
                 (id, user_id, notification_type, title, message, link, metadata, is_read, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8)",
            )?;
            for new in batch {
                let notification = Notification {
                    id: uuid::Uuid::new_v4().to_string(),
                    user_id: new.user_id,
                    notification_type: new.notification_type,
                    title: new.title,
                    message: new.message,
                    link: new.link,
                    metadata: new.metadata,
                    is_read: false,
                    created_at,
                };
                stmt.execute(params![
                    notification.id,
                    notification.user_id,
                    notification.notification_type.as_str(),
                    notification.title,
                    notification.message,
                    notification.link,
                    notification.metadata.to_string(),
                    format_datetime(&notification.created_at),
                ])?;
                stored.push(notification);
            }
        }
        tx.commit()?;
        Ok(stored)
    }

    fn get_user_notifications(&self, user_id: &str) -> Result<Vec<Notification>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM notifications WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
        )?;
        let notifications = stmt
            .query_map(params![user_id], Self::row_to_notification)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notifications)
    }

    fn mark_notification_read(&self, notification_id: &str, user_id: &str) -> Result<bool> {
        let changed = self.conn()?.execute(
            "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
            params![notification_id, user_id],
        )?;
        Ok(changed > 0)
    }

    fn delete_notification(&self, notification_id: &str, user_id: &str) -> Result<bool> {
        let changed = self.conn()?.execute(
            "DELETE FROM notifications WHERE id = ?1 AND user_id = ?2",
            params![notification_id, user_id],
        )?;
        Ok(changed > 0)
    }

    fn get_unread_count(&self, user_id: &str) -> Result<usize> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl AnalyticsStore for SqliteGreenboxStore {
    fn get_song_analytics(&self, song_id: &str) -> Result<Option<SongAnalytics>> {
        let conn = self.conn()?;
        Self::query_analytics(&conn, song_id)
    }

    fn increment_play_count(
        &self,
        song_id: &str,
        traffic_source: Option<&TrafficSource>,
    ) -> Result<SongAnalytics, IncrementError> {
        self.try_increment(song_id, traffic_source)?
            .ok_or_else(|| IncrementError::NotFound(song_id.to_string()))
    }

    fn get_traffic_breakdown(&self, song_id: &str) -> Result<Vec<(String, u64)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT COALESCE(traffic_source, 'unknown') AS source, COUNT(*) AS plays \
             FROM play_events WHERE song_id = ?1 \
             GROUP BY source ORDER BY plays DESC, source ASC",
        )?;
        let breakdown = stmt
            .query_map(params![song_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(breakdown)
    }
}
