//! Infrastructure services

mod provisioning_service;

pub use provisioning_service::{ArtifactOutcome, ProvisioningService, ProvisioningServiceTrait};

#[cfg(test)]
pub use provisioning_service::MockProvisioningServiceTrait;
