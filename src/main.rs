use clap::Parser;
use comfy_sidecar::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Serve => cli::serve::run().await,
        Command::Provision => cli::provision::run().await,
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Fatal error");
    }

    result
}
