//! Background job scheduling and execution.
//!
//! Runs periodic and hook-triggered jobs, currently the scheduled release
//! publisher, and records every run in the server store.

mod context;
mod job;
pub mod jobs;
mod scheduler;

pub use context::JobContext;
pub use job::{BackgroundJob, HookEvent, JobError, JobSchedule, ShutdownBehavior};
pub use scheduler::JobScheduler;
