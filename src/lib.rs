//! GreenBox release server library
//!
//! Exposes the internal modules for the binary and the end-to-end tests.

pub mod analytics;
pub mod background_jobs;
pub mod config;
pub mod greenbox_store;
pub mod music;
pub mod notifications;
pub mod play_tracking;
pub mod publishing;
pub mod server;
pub mod server_store;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use greenbox_store::SqliteGreenboxStore;
pub use server::{run_server, RequestsLoggingLevel};
pub use server_store::{ServerStore, SqliteServerStore};
