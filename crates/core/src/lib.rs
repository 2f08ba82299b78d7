// crates/core/src/lib.rs
//! Tool orchestration primitives for the stemsplit server.
//!
//! Everything that touches an external program lives here: configuration,
//! the line-based progress protocol, subprocess plumbing, and thin wrappers
//! around the separator, transcoder, probe, downloader, and analyzer.

pub mod config;
pub mod error;
pub mod media;
pub mod paths;
pub mod process;
pub mod progress;
pub mod tools;

pub use config::*;
pub use error::*;
pub use media::*;
pub use paths::StoragePaths;
pub use progress::*;
