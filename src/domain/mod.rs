//! Domain layer - provisioning requests, status model and tool seams

pub mod artifact;
pub mod command;
pub mod error;
pub mod manifest;
pub mod status;

pub use artifact::{ArtifactLocation, RepositoryRequest, RepositoryWeightRequest, WeightRequest};
pub use command::{CommandOutput, CommandRunner, CommandSpec};
pub use error::ProvisionError;
pub use manifest::Manifest;
pub use status::{LifecycleState, StatusSnapshot, StatusTracker};
