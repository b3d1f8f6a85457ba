use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub paths: PathsConfig,
    pub fetch: FetchConfig,
    pub installer: InstallerConfig,
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Filesystem layout of the sandbox
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub models_dir: PathBuf,
    pub custom_nodes_dir: PathBuf,
    /// Scratch space for repository-derived weights
    pub scratch_dir: PathBuf,
    pub nodes_manifest: PathBuf,
    pub models_manifest: PathBuf,
    pub index_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Upper bound for a single artifact, clone/download and install included
    pub timeout_secs: u64,
    pub copy_buffer_size: usize,
    /// Repository URLs must start with this prefix
    pub repository_host: String,
}

/// Dependency installers run inside a fetched repository
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    pub requirements_file: String,
    /// Primary installer; the requirements file is appended as last argument
    pub pip: Vec<String>,
    pub fallback_interpreter: String,
    pub fallback_script: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Base URL the `/proxy` prefix forwards to
    pub proxy_url: String,
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models"),
            custom_nodes_dir: PathBuf::from("custom_nodes"),
            scratch_dir: std::env::temp_dir(),
            nodes_manifest: PathBuf::from("custom_nodes.txt"),
            models_manifest: PathBuf::from("custom_models.json"),
            index_file: PathBuf::from("index.html"),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 3600,
            copy_buffer_size: 10 * 1024 * 1024,
            repository_host: "https://github.com/".to_string(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            requirements_file: "requirements.txt".to_string(),
            pip: vec!["pip".to_string(), "install".to_string(), "-r".to_string()],
            fallback_interpreter: "python3".to_string(),
            fallback_script: "install.py".to_string(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            command: "/comfyui/entrypoint.sh".to_string(),
            args: Vec::new(),
            working_dir: None,
            proxy_url: "http://127.0.0.1:8188".to_string(),
            shutdown_grace_secs: 30,
        }
    }
}

impl BackendConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
