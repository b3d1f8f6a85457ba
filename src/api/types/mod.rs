//! Request and response types shared by the API handlers

pub mod error;
pub mod json;
pub mod pull;

pub use error::{ApiError, ApiErrorResponse};
pub use json::Json;
pub use pull::PullResponse;
