//! Infrastructure layer - external tools, HTTP, fetchers and orchestration

pub mod command;
pub mod fetch;
pub mod http;
pub mod logging;
pub mod orchestrator;
pub mod services;
