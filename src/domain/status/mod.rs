//! Lifecycle status shared by the orchestrator, fetchers and the status endpoint

mod tracker;

pub use tracker::{LifecycleState, StatusSnapshot, StatusTracker};
