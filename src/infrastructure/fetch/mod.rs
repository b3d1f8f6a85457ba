//! Artifact fetchers and the helpers they share

mod copy;
mod in_flight;
mod partial;
mod repository;
mod weight;

pub use copy::copy_regular_file;
pub use in_flight::{Dispatch, InFlightRegistry};
pub use repository::RepositoryFetcher;
pub use weight::WeightFetcher;
