//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, BackendConfig, FetchConfig, InstallerConfig, LogFormat, LoggingConfig, PathsConfig,
    ServerConfig,
};
