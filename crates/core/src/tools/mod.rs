// crates/core/src/tools/mod.rs
//! Wrappers around the external programs the server orchestrates.
//!
//! Each wrapper owns its command line and its output contract; none of them
//! touch job state. Callers decide what a failure means for a job.

pub mod analyzer;
pub mod downloader;
pub mod probe;
pub mod separator;
pub mod transcoder;

pub use analyzer::{Analyzer, KeyTempo, Mode};
pub use downloader::{Downloader, VideoInfo};
pub use probe::DurationProbe;
pub use separator::Separator;
pub use transcoder::Transcoder;
