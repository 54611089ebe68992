//! sbproj CLI library

pub mod commands;
pub mod error;

pub use error::{Error, Result};

use clap::{Parser, Subcommand};
use servicebinding_common::telemetry::LogFormat;

/// sbproj - project service bindings into workload manifests
#[derive(Parser, Debug)]
#[command(name = "sbproj")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log output format (text or json)
    #[arg(long, global = true, env = "SBPROJ_LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Project a binding into a workload and print the result
    Project(commands::project::ProjectArgs),

    /// Remove a binding's projection from a workload and print the result
    Unproject(commands::project::ProjectArgs),

    /// Report whether a binding is projected into a workload
    Status(commands::status::StatusArgs),

    /// Print the CustomResourceDefinitions
    Crd(commands::crd::CrdArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Project(args) => {
                commands::project::run(args, commands::project::Operation::Project).await
            }
            Commands::Unproject(args) => {
                commands::project::run(args, commands::project::Operation::Unproject).await
            }
            Commands::Status(args) => commands::status::run(args),
            Commands::Crd(args) => commands::crd::run(args),
        }
    }
}
