//! CLI module for the provisioning sidecar
//!
//! - `serve`: provision, start the backend and serve the gateway
//! - `provision`: run the startup fetch phases only and exit

pub mod provision;
pub mod serve;

use clap::{Parser, Subcommand};

/// Provisioning sidecar for a ComfyUI backend
#[derive(Parser)]
#[command(name = "comfy-sidecar")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Provision artifacts, supervise the backend and serve the gateway
    Serve,

    /// Provision artifacts from the manifests and exit
    Provision,
}
