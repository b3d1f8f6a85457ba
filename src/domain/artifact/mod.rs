//! Artifact requests, their validation and on-disk locations

mod location;
mod request;
mod validation;

pub use location::ArtifactLocation;
pub use request::{RepositoryRequest, RepositoryWeightRequest, WeightRequest};
pub use validation::{
    model_repository_name, parse_source_url, repository_dir_name, validate_destination,
    validate_file_name, weight_file_name,
};
