//! Song play analytics

mod models;
mod store;

pub use models::{SongAnalytics, TrafficSource};
pub use store::{AnalyticsStore, IncrementError};
