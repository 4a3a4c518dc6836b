//! Shared constants for end-to-end tests
//!
//! Seeded ids and trigger secrets. When test data changes, update only this
//! file.

// ============================================================================
// Trigger Secrets
// ============================================================================

pub const CRON_SECRET: &str = "test-cron-secret";

pub const SERVICE_ROLE_KEY: &str = "test-service-role-key";

pub const ANON_KEY: &str = "test-anon-key";

// ============================================================================
// Seeded Data
// ============================================================================

/// Artist owned by `ARTIST_OWNER_ID`, present in every test server
pub const ARTIST_ID: &str = "artist-1";

pub const ARTIST_STAGE_NAME: &str = "The Test Band";

pub const ARTIST_OWNER_ID: &str = "user-owner";

/// Users following `ARTIST_ID`
pub const FOLLOWER_1_ID: &str = "user-follower-1";

pub const FOLLOWER_2_ID: &str = "user-follower-2";

/// Play threshold advertised by test servers
pub const PLAY_THRESHOLD_SECS: u64 = 5;

// ============================================================================
// Timeouts
// ============================================================================

pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;

pub const REQUEST_TIMEOUT_SECS: u64 = 10;
