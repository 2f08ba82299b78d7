// crates/server/src/jobs/mod.rs
//! Background job system for external-tool work.
//!
//! Provides:
//! - `JobRegistry`: id → job record map with per-job change notification
//! - `JobRunner`: bounded worker pool that drives a `JobTask` to its terminal state
//! - `progress_stream`: de-duplicated progress values for SSE

pub mod registry;
pub mod runner;
pub mod stream;
pub mod types;

pub use registry::{JobRegistry, RegistryError};
pub use runner::{JobContext, JobRunner, JobTask, SubmitError};
pub use stream::progress_stream;
pub use types::{Job, JobId, JobKind, JobOutcome, JobStatus};
