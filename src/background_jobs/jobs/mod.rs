//! Specific background job implementations.

pub mod scheduled_release;

pub use scheduled_release::ScheduledReleaseJob;
