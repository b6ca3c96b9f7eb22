//! Core domain types for the motion generation dispatcher.
//!
//! This crate contains shared types used across all packages:
//! - Job and result records exchanged with the generation worker
//! - Caller requests and queue entries
//! - Notices and events reported back to callers
//! - Dispatcher configuration and the error taxonomy

mod config;
mod error;
mod events;
mod job;
mod request;

pub use config::DispatcherConfig;
pub use error::DispatchError;
pub use events::{DispatchEvent, Notice};
pub use job::{GenerationJob, GenerationResult, JobId, JobStatus};
pub use request::{GenerationRequest, OriginId, QueueEntry, Requirements};
