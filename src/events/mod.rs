//! # Run Events
//!
//! Per-task progress published while a run executes. The engine never waits
//! for subscribers, and publishing with nobody listening is not an error.

pub mod publisher;

pub use publisher::{EventPublisher, PublishedEvent};
